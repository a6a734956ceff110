//! # lplan-server: HTTP Service for the Logical Plan Rewriter
//!
//! This binary exposes the rule-based rewriter as a network service so a planner
//! running in another process can hand over a logical plan and get the rewritten plan
//! back.
//!
//! ## Architecture
//!
//! ```text
//! Planner process
//!   |
//!   | HTTP POST /rewrite (JSON plan)
//!   v
//! lplan-server (this binary)
//!   |
//!   +-> seed identifier allocator from the plan
//!   +-> top-down rewrite with the default rule set
//!   +-> reference validation
//!   |
//!   | HTTP response (rewritten JSON plan + explain text)
//!   v
//! Planner process
//! ```
//!
//! ## Endpoints
//!
//! - `GET  /health`   - Health check
//! - `GET  /rules`    - List active rewrite rules
//! - `POST /rewrite`  - Rewrite a JSON plan
//!
//! ## Configuration
//!
//! The server listens on `LPLAN_BIND_ADDR` (default `0.0.0.0:3000`).
//! `LPLAN_VALIDATE_REFERENCES=false` turns off reference validation. Logging is
//! controlled by the `RUST_LOG` environment variable (defaults to `lplan=debug`).

mod error;
mod routes;
mod state;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::error::ServiceError;
use crate::state::{AppState, ServiceConfig};

const DEFAULT_LOG_FILTER: &str = "lplan=debug";

#[tokio::main]
async fn main() -> Result<(), ServiceError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let config = ServiceConfig::from_env()?;
    let bind_addr = config.bind_addr;
    let state = Arc::new(AppState::new(config));

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("lplan-server listening on http://{}", bind_addr);
    axum::serve(listener, app(state)).await?;
    Ok(())
}

/// Build the router with all endpoints.
fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/rules", get(routes::list_rules))
        .route("/rewrite", post(routes::rewrite))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use lplan_core::catalog::{ColumnDef, TableDef, TableRef};
    use lplan_core::expr::{Alias, DataType, Expression, SlotReference};
    use lplan_core::plan::{AggPhase, LogicalOlapScan, Plan};
    use lplan_core::{ExprId, ExprIdGenerator};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn test_app() -> Router {
        let config = ServiceConfig::from_vars(|_| None).unwrap();
        app(Arc::new(AppState::new(config)))
    }

    /// SELECT age, sum(id) AS s FROM db.student GROUP BY age
    fn student_aggregate() -> Plan {
        let ids = ExprIdGenerator::new();
        let def = TableDef::new(
            TableRef::new("db", "student"),
            vec![
                ColumnDef::new("id", DataType::Int, true),
                ColumnDef::new("age", DataType::Int, true),
            ],
        );
        let scan = LogicalOlapScan::new(
            Arc::new(def),
            vec!["db".into(), "student".into()],
            &ids,
        ).unwrap();
        let id = scan.output[0].clone();
        let age = scan.output[1].clone();
        let sum = Alias::new(&ids, Expression::sum(id.into()), "s").unwrap();
        Plan::aggregate(
            vec![age.clone().into()],
            vec![age.into(), sum.into()],
            Plan::scan(scan),
        )
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_json(uri: &str, body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(test_app(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_list_rules() {
        let request = Request::builder().uri("/rules").body(Body::empty()).unwrap();
        let (status, body) = send(test_app(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["rule_set"], "rewrite");
        assert_eq!(body["rules"], json!(["AggregateDisassemble"]));
        assert_eq!(body["validate_references"], true);
    }

    #[tokio::test]
    async fn test_rewrite_splits_aggregate() {
        let plan = student_aggregate();
        let request = post_json("/rewrite", json!({ "plan": plan }).to_string());
        let (status, body) = send(test_app(), request).await;
        assert_eq!(status, StatusCode::OK);

        let rewritten: Plan = serde_json::from_value(body["plan"].clone()).unwrap();
        let global = rewritten.as_aggregate().unwrap();
        assert_eq!(global.phase, AggPhase::Global);
        assert_eq!(global.child.as_aggregate().unwrap().phase, AggPhase::Local);

        let original = plan.as_aggregate().unwrap();
        for (new, old) in global.output.iter().zip(&original.output) {
            assert_eq!(new.expr_id(), old.expr_id());
        }

        let explain = body["explain"].as_str().unwrap();
        assert!(explain.starts_with("LogicalAggregate(phase=GLOBAL"));
        assert!(explain.contains("+--LogicalAggregate(phase=LOCAL"));
    }

    #[tokio::test]
    async fn test_rewrite_rejects_dangling_reference() {
        let plan = student_aggregate();
        let ghost = SlotReference::new(ExprId(1000), "ghost", DataType::Int, true);
        let project = Plan::project(vec![ghost.into()], plan);
        let request = post_json("/rewrite", json!({ "plan": project }).to_string());

        let (status, body) = send(test_app(), request).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].as_str().unwrap().contains("ghost"));
    }

    #[tokio::test]
    async fn test_rewrite_rejects_plan_using_largest_id() {
        let plan = student_aggregate();
        let last = SlotReference::new(ExprId(u64::MAX), "last", DataType::Int, true);
        let project = Plan::project(vec![last.into()], plan);
        let request = post_json("/rewrite", json!({ "plan": project }).to_string());

        let (status, body) = send(test_app(), request).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].as_str().unwrap().contains("exhausted"));
    }

    #[tokio::test]
    async fn test_rewrite_rejects_malformed_json() {
        let request = post_json("/rewrite", "{ not json".to_string());
        let response = test_app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
