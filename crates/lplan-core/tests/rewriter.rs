//! End-to-end tests for the rewrite driver.
//!
//! Uses small purpose-built rules over `db.t(a INT, b INT)` to pin down traversal
//! order, rule precedence, recursion after replacement, and failure behavior.

use lplan_core::catalog::{ColumnDef, InMemoryCatalog, TableDef, TableRef};
use lplan_core::expr::{ComparisonOp, DataType, Expression};
use lplan_core::pattern::Pattern;
use lplan_core::plan::{JoinType, LogicalOlapScan, Plan, PlanKind};
use lplan_core::rule::{Rule, RuleSet};
use lplan_core::{
    bottom_up_rewrite, top_down_rewrite, PlanRewriter, RewriteContext, RewriteError,
    RewriterConfig, Result, TreeNode,
};
use std::sync::{Arc, Mutex};

fn catalog() -> InMemoryCatalog {
    let mut catalog = InMemoryCatalog::new();
    catalog.add_table(TableDef::new(
        TableRef::new("db", "t"),
        vec![
            ColumnDef::new("a", DataType::Int, false),
            ColumnDef::new("b", DataType::Int, false),
        ],
    ));
    catalog
}

fn scan(ctx: &RewriteContext) -> Plan {
    Plan::scan(
        LogicalOlapScan::from_catalog(&catalog(), &TableRef::new("db", "t"), ctx.id_generator())
            .unwrap(),
    )
}

fn a_gt(child: &Plan, v: i32) -> Expression {
    Expression::comparison(
        ComparisonOp::Gt,
        child.output()[0].clone().into(),
        Expression::int(v),
    )
}

/// Project(Filter(Scan)) over column `a`.
fn project_filter_scan(ctx: &RewriteContext) -> Plan {
    let scan = scan(ctx);
    let a = scan.output()[0].clone();
    let filter = Plan::filter(a_gt(&scan, 1), scan);
    Plan::project(vec![a.into()], filter)
}

/// Records every node it is asked about; never rewrites.
struct RecordingRule {
    seen: Arc<Mutex<Vec<&'static str>>>,
}

impl Rule for RecordingRule {
    fn name(&self) -> &str {
        "Recording"
    }

    fn pattern(&self) -> Pattern {
        Pattern::Any
    }

    fn apply(&self, plan: &Plan, _ctx: &RewriteContext) -> Result<Option<Plan>> {
        self.seen.lock().unwrap().push(plan.node_name());
        Ok(None)
    }
}

/// Filter(x) -> x.
struct DropFilterRule;

impl Rule for DropFilterRule {
    fn name(&self) -> &str {
        "DropFilter"
    }

    fn pattern(&self) -> Pattern {
        Pattern::filter()
    }

    fn apply(&self, plan: &Plan, _ctx: &RewriteContext) -> Result<Option<Plan>> {
        Ok(Some(plan.child(0)?.clone()))
    }
}

/// Filter(p, x) -> Filter(NOT p, x).
struct NegateFilterRule;

impl Rule for NegateFilterRule {
    fn name(&self) -> &str {
        "NegateFilter"
    }

    fn pattern(&self) -> Pattern {
        Pattern::filter()
    }

    fn apply(&self, plan: &Plan, _ctx: &RewriteContext) -> Result<Option<Plan>> {
        let Plan::Filter(filter) = plan else {
            return Ok(None);
        };
        Ok(Some(Plan::filter(
            Expression::Not(Box::new(filter.predicate.clone())),
            (*filter.child).clone(),
        )))
    }
}

/// Matches every filter but always declines.
struct DecliningRule;

impl Rule for DecliningRule {
    fn name(&self) -> &str {
        "Declining"
    }

    fn pattern(&self) -> Pattern {
        Pattern::filter()
    }

    fn apply(&self, _plan: &Plan, _ctx: &RewriteContext) -> Result<Option<Plan>> {
        Ok(None)
    }
}

/// Re-scans the table under fresh identifiers, breaking every parent reference.
struct RenumberScanRule;

impl Rule for RenumberScanRule {
    fn name(&self) -> &str {
        "RenumberScan"
    }

    fn pattern(&self) -> Pattern {
        Pattern::scan()
    }

    fn apply(&self, plan: &Plan, ctx: &RewriteContext) -> Result<Option<Plan>> {
        let Plan::OlapScan(scan) = plan else {
            return Ok(None);
        };
        Ok(Some(Plan::scan(LogicalOlapScan::new(
            scan.table.clone(),
            scan.qualifier.clone(),
            ctx.id_generator(),
        )?)))
    }
}

/// Rebuilds a filter with a bogus child list.
struct BrokenRule;

impl Rule for BrokenRule {
    fn name(&self) -> &str {
        "Broken"
    }

    fn pattern(&self) -> Pattern {
        Pattern::filter()
    }

    fn apply(&self, plan: &Plan, _ctx: &RewriteContext) -> Result<Option<Plan>> {
        plan.with_children(vec![]).map(Some)
    }
}

#[test]
fn test_top_down_visit_order() {
    let ctx = RewriteContext::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let rules = RuleSet::single(Box::new(RecordingRule { seen: seen.clone() }));

    let plan = project_filter_scan(&ctx);
    let result = top_down_rewrite(plan.clone(), &ctx, &rules).unwrap();

    assert_eq!(result, plan);
    assert_eq!(
        *seen.lock().unwrap(),
        vec!["LogicalProject", "LogicalFilter", "LogicalOlapScan"]
    );
}

#[test]
fn test_bottom_up_visit_order() {
    let ctx = RewriteContext::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let rules = RuleSet::single(Box::new(RecordingRule { seen: seen.clone() }));

    let plan = project_filter_scan(&ctx);
    bottom_up_rewrite(plan, &ctx, &rules).unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec!["LogicalOlapScan", "LogicalFilter", "LogicalProject"]
    );
}

#[test]
fn test_join_children_visited_left_to_right() {
    let ctx = RewriteContext::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let rules = RuleSet::single(Box::new(RecordingRule { seen: seen.clone() }));

    let left = scan(&ctx);
    let right = Plan::filter(a_gt(&left, 0), left.clone());
    let join = Plan::join(JoinType::Cross, None, left.clone(), right);
    assert!(top_down_rewrite(join, &ctx, &rules).is_ok());
    assert_eq!(
        *seen.lock().unwrap(),
        vec!["LogicalJoin", "LogicalOlapScan", "LogicalFilter", "LogicalOlapScan"]
    );
}

#[test]
fn test_first_matching_rule_wins() {
    let ctx = RewriteContext::new();
    let plan = project_filter_scan(&ctx);

    let rules = RuleSet::new("test")
        .with_rule(Box::new(NegateFilterRule))
        .with_rule(Box::new(DropFilterRule));
    let result = top_down_rewrite(plan, &ctx, &rules).unwrap();

    let filter = result.child(0).unwrap();
    assert_eq!(filter.kind(), PlanKind::Filter);
    let Plan::Filter(filter) = filter else {
        unreachable!()
    };
    assert!(matches!(filter.predicate, Expression::Not(_)));
}

#[test]
fn test_declined_rule_falls_through() {
    let ctx = RewriteContext::new();
    let plan = project_filter_scan(&ctx);

    let rules = RuleSet::new("test")
        .with_rule(Box::new(DecliningRule))
        .with_rule(Box::new(DropFilterRule));
    let result = top_down_rewrite(plan, &ctx, &rules).unwrap();

    assert_eq!(result.kind(), PlanKind::Project);
    assert_eq!(result.child(0).unwrap().kind(), PlanKind::OlapScan);
}

#[test]
fn test_replacement_is_not_revisited_but_its_children_are() {
    let ctx = RewriteContext::new();
    let scan = scan(&ctx);
    let a = scan.output()[0].clone();
    // Filter(Filter(Project(Filter(Scan))))
    let inner = Plan::filter(a_gt(&scan, 3), scan.clone());
    let project = Plan::project(vec![a.into()], inner);
    let plan = Plan::filter(a_gt(&scan, 2), Plan::filter(a_gt(&scan, 1), project));

    let rules = RuleSet::single(Box::new(DropFilterRule));
    let result = top_down_rewrite(plan, &ctx, &rules).unwrap();

    // The root filter is replaced by the second filter, which is not tried again
    // in this sweep; the filter below the project is dropped.
    assert_eq!(result.kind(), PlanKind::Filter);
    let project = result.child(0).unwrap();
    assert_eq!(project.kind(), PlanKind::Project);
    assert_eq!(project.child(0).unwrap().kind(), PlanKind::OlapScan);
}

#[test]
fn test_dangling_reference_fails_the_pass() {
    let ctx = RewriteContext::new();
    let plan = project_filter_scan(&ctx);
    let rules = RuleSet::single(Box::new(RenumberScanRule));

    let err = top_down_rewrite(plan.clone(), &ctx, &rules).unwrap_err();
    assert!(matches!(
        err,
        RewriteError::UnresolvedReference { ref node, .. } if node == "LogicalFilter"
    ));
    assert!(!err.is_structural());

    let lenient = PlanRewriter::new(RewriterConfig {
        validate_references: false,
    });
    assert!(lenient.top_down_rewrite(plan, &ctx, &rules).is_ok());
}

#[test]
fn test_structural_error_propagates() {
    let ctx = RewriteContext::new();
    let plan = project_filter_scan(&ctx);
    let rules = RuleSet::new("test")
        .with_rule(Box::new(BrokenRule))
        .with_rule(Box::new(DropFilterRule));

    let err = top_down_rewrite(plan, &ctx, &rules).unwrap_err();
    assert_eq!(
        err,
        RewriteError::ArityMismatch {
            node: "LogicalFilter".into(),
            expected: 1,
            actual: 0,
        }
    );
    assert!(err.is_structural());
}

#[test]
fn test_unknown_table() {
    let ctx = RewriteContext::new();
    let err = LogicalOlapScan::from_catalog(
        &catalog(),
        &TableRef::new("db", "missing"),
        ctx.id_generator(),
    )
    .unwrap_err();
    assert_eq!(err, RewriteError::TableNotFound("db.missing".into()));
}

#[test]
fn test_empty_rule_set_is_identity() {
    let ctx = RewriteContext::new();
    let plan = project_filter_scan(&ctx);
    let result = top_down_rewrite(plan.clone(), &ctx, &RuleSet::new("empty")).unwrap();
    assert_eq!(result, plan);
}
