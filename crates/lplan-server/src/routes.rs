//! # HTTP Route Handlers
//!
//! This module defines the Axum route handlers for the rewrite service.
//!
//! ## Rewrite Pipeline
//!
//! 1. **Decode**: The JSON body is deserialized into a `Plan` by the extractor.
//! 2. **Seed**: A fresh `RewriteContext` is allocated for the request, starting above
//!    the largest identifier already in the plan.
//! 3. **Rewrite**: One top-down sweep of the shared rule set.
//! 4. **Encode**: The rewritten plan is returned together with its indented rendering.
//!
//! ## Error Handling
//!
//! - 400/415/422 from the extractor: malformed JSON or a body that is not a plan.
//! - 422 Unprocessable Entity: the plan decoded but the rewrite failed (arity mismatch,
//!   unresolved reference, ...).

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use lplan_core::plan::Plan;
use lplan_core::RewriteContext;

use crate::error::ServiceError;
use crate::state::AppState;

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// GET /rules: list active rules in the order they are tried.
pub async fn list_rules(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(RulesResponse {
        rule_set: state.rules.name.clone(),
        rules: state.rules.names().into_iter().map(String::from).collect(),
        validate_references: state.config.rewriter.validate_references,
    })
}

#[derive(Serialize)]
pub struct RulesResponse {
    pub rule_set: String,
    pub rules: Vec<String>,
    pub validate_references: bool,
}

#[derive(Deserialize)]
pub struct RewriteRequest {
    pub plan: Plan,
}

#[derive(Serialize)]
pub struct RewriteResponse {
    pub plan: Plan,
    /// Indented tree rendering of `plan`.
    pub explain: String,
}

/// POST /rewrite: run the rule set over a JSON plan.
pub async fn rewrite(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RewriteRequest>,
) -> Result<Json<RewriteResponse>, ServiceError> {
    let plan = run_rewrite(&state, req.plan)?;
    let explain = plan.display(0);
    Ok(Json(RewriteResponse { plan, explain }))
}

/// Rewrite one plan with a context private to this request.
fn run_rewrite(state: &AppState, plan: Plan) -> Result<Plan, ServiceError> {
    let ctx = RewriteContext::for_plan(&plan).inspect_err(|e| info!("Rewrite rejected: {}", e))?;
    debug!(
        "Rewriting {} with ids from {}",
        plan.describe(),
        ctx.id_generator().peek()
    );

    let result = state
        .rewriter
        .top_down_rewrite(plan, &ctx, &state.rules)
        .inspect_err(|e| info!("Rewrite rejected: {}", e))?;
    Ok(result)
}
