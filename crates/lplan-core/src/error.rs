//! # Rewrite Errors
//!
//! Every failure the core can report. There are two families:
//!
//! - **Structural errors** (`ArityMismatch`, `IndexOutOfRange`): a caller broke the
//!   fixed-arity contract of the tree model. These are programming errors in a rule,
//!   never data-dependent, and abort the current rewrite pass.
//! - **Resolution errors** (`UnresolvedReference`): a slot points at an identifier
//!   that no child produces. This means a rule failed to preserve output identifiers.
//!
//! A rule that does not match is *not* an error; it is reported as `Ok(None)`.

use crate::id::ExprId;

/// Errors raised by the tree model, the catalog boundary and the rewrite driver.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RewriteError {
    /// `with_children` was called with the wrong number of children.
    #[error("{node} expects {expected} children, got {actual}")]
    ArityMismatch {
        node: String,
        expected: usize,
        actual: usize,
    },
    /// `child(i)` was called with `i` outside `[0, arity)`.
    #[error("child index {index} out of range for {node} with {arity} children")]
    IndexOutOfRange {
        node: String,
        index: usize,
        arity: usize,
    },
    /// A slot reference whose identifier is not produced by any input of its node.
    #[error("unresolved reference {name}#{expr_id} in {node}")]
    UnresolvedReference {
        expr_id: ExprId,
        name: String,
        node: String,
    },
    /// The catalog has no table with this name.
    #[error("table not found: {0}")]
    TableNotFound(String),
    /// The allocator cannot hand out an id above this one.
    #[error("expression id space exhausted after #{0}")]
    IdSpaceExhausted(ExprId),
}

impl RewriteError {
    /// True for errors caused by violating the fixed-arity contract.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            RewriteError::ArityMismatch { .. } | RewriteError::IndexOutOfRange { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, RewriteError>;
