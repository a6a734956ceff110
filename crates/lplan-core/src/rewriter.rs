//! # Plan Rewriter
//!
//! The traversal driver that applies a [`RuleSet`] to a plan tree.
//!
//! ## Top-Down Strategy
//!
//! At each node, starting from the root:
//!
//! 1. Try every rule in registration order. A rule is skipped when its guard does not
//!    match or when `apply` returns `None`. The first rule that returns a replacement
//!    wins and the node is replaced; no further rules are tried on that node.
//! 2. Recurse into the children of the (possibly replaced) node with the same rules.
//! 3. Rebuild the node over the rewritten children with `with_children`.
//!
//! A pass is a single sweep. The driver does not loop to a fixed point; that is the
//! job of whatever schedules rule batches around it.
//!
//! ## Bottom-Up Strategy
//!
//! Children are rewritten first; rules are then tried on the rebuilt node. Useful for
//! rules that expect their inputs to be in final form already.
//!
//! ## Failure
//!
//! There is no partial success. Structural errors from rules or from `with_children`
//! abort the pass. When `validate_references` is enabled the finished tree is checked
//! and a dangling slot fails the pass with `UnresolvedReference`.

use crate::context::RewriteContext;
use crate::error::Result;
use crate::plan::Plan;
use crate::rule::RuleSet;
use crate::tree::TreeNode;
use crate::validate::validate_references;
use tracing::{debug, trace};

/// Configuration knobs for the rewrite driver.
#[derive(Debug, Clone)]
pub struct RewriterConfig {
    /// Check the rewritten tree for dangling slot references.
    pub validate_references: bool,
}

impl Default for RewriterConfig {
    fn default() -> Self {
        Self {
            validate_references: true,
        }
    }
}

/// Applies rule sets to plan trees.
#[derive(Debug, Clone, Default)]
pub struct PlanRewriter {
    pub config: RewriterConfig,
}

impl PlanRewriter {
    pub fn new(config: RewriterConfig) -> Self {
        Self { config }
    }

    /// Rewrite `plan` with one top-down sweep of `rules`.
    pub fn top_down_rewrite(
        &self,
        plan: Plan,
        ctx: &RewriteContext,
        rules: &RuleSet,
    ) -> Result<Plan> {
        debug!("Starting top-down rewrite with rule set '{}'", rules.name);
        let mut applied = 0;
        let result = self.rewrite_top_down(plan, ctx, rules, &mut applied)?;
        self.finish(result, applied)
    }

    /// Rewrite `plan` with one bottom-up sweep of `rules`.
    pub fn bottom_up_rewrite(
        &self,
        plan: Plan,
        ctx: &RewriteContext,
        rules: &RuleSet,
    ) -> Result<Plan> {
        debug!("Starting bottom-up rewrite with rule set '{}'", rules.name);
        let mut applied = 0;
        let result = self.rewrite_bottom_up(plan, ctx, rules, &mut applied)?;
        self.finish(result, applied)
    }

    fn finish(&self, result: Plan, applied: usize) -> Result<Plan> {
        if self.config.validate_references {
            validate_references(&result)?;
        }
        debug!("Rewrite complete: {} rule applications", applied);
        Ok(result)
    }

    fn rewrite_top_down(
        &self,
        plan: Plan,
        ctx: &RewriteContext,
        rules: &RuleSet,
        applied: &mut usize,
    ) -> Result<Plan> {
        let current = apply_first_match(plan, ctx, rules, applied)?;
        if current.arity() == 0 {
            return Ok(current);
        }
        let mut new_children = Vec::with_capacity(current.arity());
        for child in current.children() {
            new_children.push(self.rewrite_top_down(child.clone(), ctx, rules, applied)?);
        }
        current.with_children(new_children)
    }

    fn rewrite_bottom_up(
        &self,
        plan: Plan,
        ctx: &RewriteContext,
        rules: &RuleSet,
        applied: &mut usize,
    ) -> Result<Plan> {
        let rebuilt = if plan.arity() == 0 {
            plan
        } else {
            let mut new_children = Vec::with_capacity(plan.arity());
            for child in plan.children() {
                new_children.push(self.rewrite_bottom_up(child.clone(), ctx, rules, applied)?);
            }
            plan.with_children(new_children)?
        };
        apply_first_match(rebuilt, ctx, rules, applied)
    }
}

/// Replace `plan` with the output of the first rule that produces one.
fn apply_first_match(
    plan: Plan,
    ctx: &RewriteContext,
    rules: &RuleSet,
    applied: &mut usize,
) -> Result<Plan> {
    for rule in rules.iter() {
        if !rule.matches(&plan) {
            continue;
        }
        if let Some(replacement) = rule.apply(&plan, ctx)? {
            trace!("Rule '{}' rewrote {}", rule.name(), plan.node_name());
            *applied += 1;
            return Ok(replacement);
        }
    }
    Ok(plan)
}

/// Rewrite `plan` top-down with the default driver configuration.
///
/// This is the entry point the surrounding optimizer calls.
pub fn top_down_rewrite(plan: Plan, ctx: &RewriteContext, rules: &RuleSet) -> Result<Plan> {
    PlanRewriter::default().top_down_rewrite(plan, ctx, rules)
}

/// Rewrite `plan` bottom-up with the default driver configuration.
pub fn bottom_up_rewrite(plan: Plan, ctx: &RewriteContext, rules: &RuleSet) -> Result<Plan> {
    PlanRewriter::default().bottom_up_rewrite(plan, ctx, rules)
}
