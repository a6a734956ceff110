//! Reference validation.
//!
//! Every slot a node reads must be produced by one of its children, matched by
//! `ExprId`. A slot that no child produces is an `UnresolvedReference`; after a
//! rewrite it means some rule dropped or renumbered an output its parent still uses.

use crate::error::{Result, RewriteError};
use crate::id::ExprId;
use crate::plan::Plan;
use crate::tree::TreeNode;
use std::collections::HashSet;

/// Check every node of `plan`, children before parents.
pub fn validate_references(plan: &Plan) -> Result<()> {
    for child in plan.children() {
        validate_references(child)?;
    }

    let available: HashSet<ExprId> = plan
        .children()
        .into_iter()
        .flat_map(Plan::output)
        .map(|s| s.expr_id)
        .collect();

    match plan
        .input_slots()
        .into_iter()
        .find(|slot| !available.contains(&slot.expr_id))
    {
        Some(slot) => Err(RewriteError::UnresolvedReference {
            expr_id: slot.expr_id,
            name: slot.name.clone(),
            node: plan.node_name().to_string(),
        }),
        None => Ok(()),
    }
}
