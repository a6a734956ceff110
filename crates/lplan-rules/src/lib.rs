//! # Built-in Rewrite Rules
//!
//! This crate provides the rules the logical rewriter runs before physical planning.
//!
//! ## Rules
//!
//! - **`AggregateDisassembleRule`**: Splits a global aggregate into a local
//!   (partial) aggregate feeding a global (merge) aggregate, so partial results can
//!   be computed next to the data. Output identifiers of the original aggregate are
//!   preserved, so parents need no rewriting.
//!
//! Rules are pure functions of the plan and the identifier allocator; they can be
//! shared across threads and compilations.

pub mod aggregate_disassemble;

pub use aggregate_disassemble::AggregateDisassembleRule;

use lplan_core::rule::RuleSet;

/// Create the default rewrite rule set with all built-in rules.
///
/// This is the set the rewrite service runs, top-down, once per plan.
pub fn default_rule_set() -> RuleSet {
    let mut rules = RuleSet::new("rewrite");
    rules.add_rule(Box::new(AggregateDisassembleRule));
    rules
}
