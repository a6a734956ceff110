//! # Declarative Pattern Matching for Rewrite Rules
//!
//! Each rule declares a `Pattern` describing the shape of plan it can rewrite. The
//! driver checks the pattern before asking the rule for anything else, so most
//! non-matching nodes are rejected without touching rule code.
//!
//! ## Pattern Language
//!
//! - `Pattern::Node(kind, children)`: matches a plan of the given kind whose children
//!   match the child patterns one by one (the child count must be equal).
//! - `Pattern::Any`: matches any subtree. The common child pattern.
//! - `Pattern::Leaf`: matches only plans without children (scans).
//!
//! Patterns only look at shape. Conditions on node payload (e.g. "aggregate in the
//! global phase") belong in the rule's own `matches` override.

use crate::plan::{Plan, PlanKind};
use crate::tree::TreeNode;

/// Pattern for matching plan trees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    /// Match a node kind with child patterns.
    Node(PlanKind, Vec<Pattern>),
    /// Match any subtree.
    Any,
    /// Match a leaf node (no children).
    Leaf,
}

impl Pattern {
    /// Match a logical aggregate over any child.
    pub fn aggregate() -> Self {
        Pattern::Node(PlanKind::Aggregate, vec![Pattern::Any])
    }

    /// Match an aggregate directly over another aggregate.
    pub fn aggregate_aggregate() -> Self {
        Pattern::Node(PlanKind::Aggregate, vec![Pattern::aggregate()])
    }

    pub fn project() -> Self {
        Pattern::Node(PlanKind::Project, vec![Pattern::Any])
    }

    pub fn filter() -> Self {
        Pattern::Node(PlanKind::Filter, vec![Pattern::Any])
    }

    pub fn join() -> Self {
        Pattern::Node(PlanKind::Join, vec![Pattern::Any, Pattern::Any])
    }

    pub fn scan() -> Self {
        Pattern::Node(PlanKind::OlapScan, vec![])
    }

    /// Check if `plan` matches this pattern.
    pub fn matches(&self, plan: &Plan) -> bool {
        match self {
            Pattern::Any => true,
            Pattern::Leaf => plan.arity() == 0,
            Pattern::Node(kind, child_patterns) => {
                if plan.kind() != *kind {
                    return false;
                }
                let children = plan.children();
                children.len() == child_patterns.len()
                    && children
                        .into_iter()
                        .zip(child_patterns)
                        .all(|(child, pattern)| pattern.matches(child))
            }
        }
    }
}
