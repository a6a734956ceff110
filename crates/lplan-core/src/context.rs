//! Per-compilation rewrite context.
//!
//! The context is handed to every rule invocation. The only thing rules use from it
//! is the identifier allocator; everything else about the surrounding compilation
//! stays opaque to the core.

use crate::error::Result;
use crate::id::{ExprId, ExprIdGenerator};
use crate::plan::Plan;
use std::sync::Arc;

/// Handle passed through every rule invocation of one compilation.
#[derive(Debug, Clone, Default)]
pub struct RewriteContext {
    ids: Arc<ExprIdGenerator>,
}

impl RewriteContext {
    /// A context with its own allocator starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context drawing identifiers from a (possibly shared) allocator.
    pub fn with_id_generator(ids: Arc<ExprIdGenerator>) -> Self {
        Self { ids }
    }

    /// A context whose allocator starts above every identifier already in `plan`.
    ///
    /// Fails with `IdSpaceExhausted` if the plan already uses the largest id.
    pub fn for_plan(plan: &Plan) -> Result<Self> {
        let ids = match plan.max_expr_id() {
            Some(max) => ExprIdGenerator::starting_after(max)?,
            None => ExprIdGenerator::new(),
        };
        Ok(Self::with_id_generator(Arc::new(ids)))
    }

    pub fn id_generator(&self) -> &ExprIdGenerator {
        &self.ids
    }

    pub fn next_expr_id(&self) -> Result<ExprId> {
        self.ids.next_id()
    }
}
