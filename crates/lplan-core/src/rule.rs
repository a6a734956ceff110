//! # Rule System
//!
//! This module defines the rewrite rule contract and the ordered rule set the driver
//! walks at every node.
//!
//! ## Rule Contract
//!
//! A rule is a guarded, pure tree-to-tree function:
//!
//! - `pattern()` declares the plan shape the rule can handle.
//! - `matches(plan)` is the full guard. The default checks the pattern only; rules
//!   override it to also inspect node payload.
//! - `apply(plan, ctx)` returns `Ok(Some(replacement))`, or `Ok(None)` for "no match".
//!   `None` is ordinary control flow, not an error. `Err` is reserved for broken
//!   structural invariants and aborts the whole rewrite pass.
//!
//! Rules never mutate their input. The only side effect allowed is drawing fresh
//! identifiers from the context's allocator.
//!
//! ## Rule Sets
//!
//! A `RuleSet` keeps rules in registration order. The driver tries them in that order
//! and the first rule that produces a replacement wins.

use crate::context::RewriteContext;
use crate::error::Result;
use crate::pattern::Pattern;
use crate::plan::Plan;

/// A guarded rewrite of one plan node (and possibly its subtree).
pub trait Rule: Send + Sync {
    /// Unique name of this rule.
    fn name(&self) -> &str;

    /// Pattern that this rule matches against.
    fn pattern(&self) -> Pattern;

    /// Whether the rule applies to `plan`.
    fn matches(&self, plan: &Plan) -> bool {
        self.pattern().matches(plan)
    }

    /// Rewrite a matching plan. `Ok(None)` leaves the node unchanged.
    fn apply(&self, plan: &Plan, ctx: &RewriteContext) -> Result<Option<Plan>>;
}

/// A named, ordered collection of rules.
pub struct RuleSet {
    pub name: String,
    rules: Vec<Box<dyn Rule>>,
}

impl RuleSet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
        }
    }

    /// A set holding exactly one rule, named after it.
    pub fn single(rule: Box<dyn Rule>) -> Self {
        let mut set = Self::new(rule.name().to_string());
        set.add_rule(rule);
        set
    }

    pub fn add_rule(&mut self, rule: Box<dyn Rule>) {
        self.rules.push(rule);
    }

    pub fn with_rule(mut self, rule: Box<dyn Rule>) -> Self {
        self.add_rule(rule);
        self
    }

    /// Rules in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Rule> {
        self.rules.iter().map(|r| r.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.iter().map(|r| r.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl std::fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleSet")
            .field("name", &self.name)
            .field("rules", &self.names())
            .finish()
    }
}
