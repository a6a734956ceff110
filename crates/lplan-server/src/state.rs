//! # Application State
//!
//! Shared state available to all HTTP request handlers. It is created once at startup
//! and shared via `Arc` across concurrent requests.
//!
//! ## Components
//!
//! - **Rule Set**: The rules every rewrite request runs. Shared, not cloned per
//!   request, because rules are stateless.
//! - **Rewriter**: The driver with its configuration (reference validation).
//! - **Service Config**: Where to listen and how to rewrite.
//!
//! Identifier allocators are not part of the state: each request seeds its own from
//! the plan it receives.

use crate::error::ServiceError;
use lplan_core::rule::RuleSet;
use lplan_core::{PlanRewriter, RewriterConfig};
use std::net::SocketAddr;
use std::sync::Arc;

pub const BIND_ADDR_VAR: &str = "LPLAN_BIND_ADDR";
pub const VALIDATE_VAR: &str = "LPLAN_VALIDATE_REFERENCES";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// Server-level configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    pub rewriter: RewriterConfig,
}

impl ServiceConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ServiceError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`, falling back to defaults for unset keys.
    ///
    /// `LPLAN_VALIDATE_REFERENCES` accepts `false`/`0`/`off` to disable validation.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ServiceError> {
        let addr = lookup(BIND_ADDR_VAR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = addr
            .parse()
            .map_err(|source| ServiceError::InvalidBindAddr {
                addr: addr.clone(),
                source,
            })?;

        let validate_references = lookup(VALIDATE_VAR)
            .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "false" | "0" | "off"))
            .unwrap_or(true);

        Ok(Self {
            bind_addr,
            rewriter: RewriterConfig {
                validate_references,
            },
        })
    }
}

/// Shared application state, accessible by all request handlers via Axum's State extractor.
pub struct AppState {
    pub rules: Arc<RuleSet>,
    pub rewriter: PlanRewriter,
    pub config: ServiceConfig,
}

impl AppState {
    /// State running the built-in rule set under `config`.
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            rules: Arc::new(lplan_rules::default_rule_set()),
            rewriter: PlanRewriter::new(config.rewriter.clone()),
            config,
        }
    }
}
