//! # lplan-core: Logical Plan Rewrite Core
//!
//! This crate implements the data model and driver of a rule-based logical plan
//! rewriter. It is the foundation the rewrite rules in `lplan-rules` build on.
//!
//! ## Module Overview
//!
//! - **`tree`**: The fixed-arity immutable tree contract shared by expressions and plans.
//! - **`id`**: Expression identifiers and their allocator.
//! - **`expr`**: Expression variants, named expressions, type derivation.
//! - **`plan`**: Logical plan variants and their output schema.
//! - **`catalog`**: Catalog trait for table definitions that seed scans.
//! - **`context`**: The per-compilation handle passed to every rule.
//! - **`pattern`**: Declarative shape matching for rule guards.
//! - **`rule`**: The `Rule` trait and ordered `RuleSet`.
//! - **`rewriter`**: Top-down and bottom-up rewrite drivers.
//! - **`validate`**: Detection of slot references no child produces.
//! - **`error`**: The error type shared by everything above.

pub mod catalog;
pub mod context;
pub mod error;
pub mod expr;
pub mod id;
pub mod pattern;
pub mod plan;
pub mod rewriter;
pub mod rule;
pub mod tree;
pub mod validate;

pub use context::RewriteContext;
pub use error::{Result, RewriteError};
pub use id::{ExprId, ExprIdGenerator};
pub use rewriter::{bottom_up_rewrite, top_down_rewrite, PlanRewriter, RewriterConfig};
pub use tree::TreeNode;
