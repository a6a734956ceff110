//! # Logical Plan Model
//!
//! Logical plan nodes describe *what* to compute. They share the [`TreeNode`] contract
//! with expressions, but their children are plans.
//!
//! ## Node Shapes
//!
//! | node               | arity | payload                                          |
//! |--------------------|-------|--------------------------------------------------|
//! | `LogicalOlapScan`  | 0     | table definition, qualifier, one slot per column |
//! | `LogicalAggregate` | 1     | group-by expressions, named outputs, phase       |
//! | `LogicalProject`   | 1     | named projections                                |
//! | `LogicalFilter`    | 1     | predicate                                        |
//! | `LogicalJoin`      | 2     | join type, optional condition                    |
//!
//! "Unary" and "binary" are not separate node types: they are the capability views
//! `as_unary()` / `as_binary()` from the tree model.
//!
//! ## Output Schema
//!
//! `Plan::output()` returns the slots a node produces. A parent reads those values by
//! holding slots with the same `ExprId`; see the [`validate`](crate::validate) module
//! for how that wiring is checked.
//!
//! ## Aggregation Phase
//!
//! A freshly built aggregate is `Global`: it computes final results from raw input.
//! Two-phase execution splits it into a `Local` aggregate (partial results per
//! execution fragment) under a `Global` aggregate (merge of partial results).

use crate::catalog::{Catalog, TableDef, TableRef};
use crate::error::{Result, RewriteError};
use crate::expr::{Expression, NamedExpression, SlotReference};
use crate::id::{ExprId, ExprIdGenerator};
use crate::tree::TreeNode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Phase of an aggregate in a distributed plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggPhase {
    /// Partial aggregation close to the data.
    Local,
    /// Final aggregation (or merge of partial results).
    #[default]
    Global,
}

impl fmt::Display for AggPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggPhase::Local => f.write_str("LOCAL"),
            AggPhase::Global => f.write_str("GLOBAL"),
        }
    }
}

/// SQL join types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    /// Left rows with at least one match; produces left columns only.
    Semi,
    /// Left rows with no match; produces left columns only.
    Anti,
    Cross,
}

/// Leaf scan over an OLAP table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogicalOlapScan {
    pub table: Arc<TableDef>,
    pub qualifier: Vec<String>,
    /// One slot per column, in column order.
    pub output: Vec<SlotReference>,
}

impl LogicalOlapScan {
    /// Build a scan, drawing a fresh identifier for every column.
    pub fn new(
        table: Arc<TableDef>,
        qualifier: Vec<String>,
        ids: &ExprIdGenerator,
    ) -> Result<Self> {
        let output = table
            .columns
            .iter()
            .map(|c| {
                Ok(
                    SlotReference::new(ids.next_id()?, c.name.clone(), c.data_type, c.nullable)
                        .with_qualifier(qualifier.clone()),
                )
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            table,
            qualifier,
            output,
        })
    }

    /// Build a scan of `table` as defined by `catalog`.
    pub fn from_catalog(
        catalog: &dyn Catalog,
        table: &TableRef,
        ids: &ExprIdGenerator,
    ) -> Result<Self> {
        let def = catalog
            .get_table(table)
            .ok_or_else(|| RewriteError::TableNotFound(table.to_string()))?;
        let qualifier = vec![table.schema.clone(), table.name.clone()];
        Self::new(def, qualifier, ids)
    }
}

/// Grouping and aggregation over one child.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogicalAggregate {
    /// Grouping keys; arbitrary expressions, not necessarily named.
    pub group_by: Vec<Expression>,
    pub output: Vec<NamedExpression>,
    #[serde(default)]
    pub phase: AggPhase,
    pub child: Box<Plan>,
}

impl LogicalAggregate {
    /// A `Global` aggregate.
    pub fn new(group_by: Vec<Expression>, output: Vec<NamedExpression>, child: Plan) -> Self {
        Self {
            group_by,
            output,
            phase: AggPhase::Global,
            child: Box::new(child),
        }
    }

    pub fn with_phase(mut self, phase: AggPhase) -> Self {
        self.phase = phase;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogicalProject {
    pub projections: Vec<NamedExpression>,
    pub child: Box<Plan>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogicalFilter {
    pub predicate: Expression,
    pub child: Box<Plan>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogicalJoin {
    pub join_type: JoinType,
    /// `None` for cross joins.
    pub condition: Option<Expression>,
    pub left: Box<Plan>,
    pub right: Box<Plan>,
}

/// Logical plan nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Plan {
    OlapScan(LogicalOlapScan),
    Aggregate(LogicalAggregate),
    Project(LogicalProject),
    Filter(LogicalFilter),
    Join(LogicalJoin),
}

/// Kind discriminant for pattern matching (without data).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlanKind {
    OlapScan,
    Aggregate,
    Project,
    Filter,
    Join,
}

impl Plan {
    pub fn scan(scan: LogicalOlapScan) -> Self {
        Plan::OlapScan(scan)
    }

    pub fn aggregate(group_by: Vec<Expression>, output: Vec<NamedExpression>, child: Plan) -> Self {
        Plan::Aggregate(LogicalAggregate::new(group_by, output, child))
    }

    pub fn project(projections: Vec<NamedExpression>, child: Plan) -> Self {
        Plan::Project(LogicalProject {
            projections,
            child: Box::new(child),
        })
    }

    pub fn filter(predicate: Expression, child: Plan) -> Self {
        Plan::Filter(LogicalFilter {
            predicate,
            child: Box::new(child),
        })
    }

    pub fn join(join_type: JoinType, condition: Option<Expression>, left: Plan, right: Plan) -> Self {
        Plan::Join(LogicalJoin {
            join_type,
            condition,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn kind(&self) -> PlanKind {
        match self {
            Plan::OlapScan(_) => PlanKind::OlapScan,
            Plan::Aggregate(_) => PlanKind::Aggregate,
            Plan::Project(_) => PlanKind::Project,
            Plan::Filter(_) => PlanKind::Filter,
            Plan::Join(_) => PlanKind::Join,
        }
    }

    pub fn as_aggregate(&self) -> Option<&LogicalAggregate> {
        match self {
            Plan::Aggregate(agg) => Some(agg),
            _ => None,
        }
    }

    /// The slots this node produces, in order.
    pub fn output(&self) -> Vec<SlotReference> {
        match self {
            Plan::OlapScan(scan) => scan.output.clone(),
            Plan::Aggregate(agg) => agg.output.iter().map(NamedExpression::to_slot).collect(),
            Plan::Project(project) => project
                .projections
                .iter()
                .map(NamedExpression::to_slot)
                .collect(),
            Plan::Filter(filter) => filter.child.output(),
            Plan::Join(join) => match join.join_type {
                JoinType::Semi | JoinType::Anti => join.left.output(),
                _ => {
                    let mut out = join.left.output();
                    out.extend(join.right.output());
                    out
                }
            },
        }
    }

    /// Slots read by this node's own expressions (not its children's).
    pub fn input_slots(&self) -> Vec<&SlotReference> {
        match self {
            Plan::OlapScan(_) => vec![],
            Plan::Aggregate(agg) => agg
                .group_by
                .iter()
                .flat_map(Expression::input_slots)
                .chain(agg.output.iter().flat_map(NamedExpression::input_slots))
                .collect(),
            Plan::Project(project) => project
                .projections
                .iter()
                .flat_map(NamedExpression::input_slots)
                .collect(),
            Plan::Filter(filter) => filter.predicate.input_slots(),
            Plan::Join(join) => join
                .condition
                .as_ref()
                .map(Expression::input_slots)
                .unwrap_or_default(),
        }
    }

    /// Largest identifier anywhere in the tree.
    pub fn max_expr_id(&self) -> Option<ExprId> {
        let own = match self {
            Plan::OlapScan(scan) => scan.output.iter().map(|s| s.expr_id).max(),
            Plan::Aggregate(agg) => agg
                .group_by
                .iter()
                .filter_map(Expression::max_expr_id)
                .chain(agg.output.iter().filter_map(NamedExpression::max_expr_id))
                .max(),
            Plan::Project(project) => project
                .projections
                .iter()
                .filter_map(NamedExpression::max_expr_id)
                .max(),
            Plan::Filter(filter) => filter.predicate.max_expr_id(),
            Plan::Join(join) => join.condition.as_ref().and_then(Expression::max_expr_id),
        };
        self.children()
            .into_iter()
            .filter_map(Plan::max_expr_id)
            .chain(own)
            .max()
    }

    /// Indented multi-line rendering of the tree.
    pub fn display(&self, indent: usize) -> String {
        let pad = "   ".repeat(indent.saturating_sub(1));
        let branch = if indent == 0 { "" } else { "+--" };
        let mut s = format!("{}{}{}\n", pad, branch, self.describe());
        for child in self.children() {
            s.push_str(&child.display(indent + 1));
        }
        s
    }

    /// One-line description of this node alone.
    pub fn describe(&self) -> String {
        match self {
            Plan::OlapScan(scan) => format!(
                "LogicalOlapScan(table={}, output=[{}])",
                scan.table.table,
                join_display(&scan.output)
            ),
            Plan::Aggregate(agg) => format!(
                "LogicalAggregate(phase={}, groupBy=[{}], output=[{}])",
                agg.phase,
                join_display(&agg.group_by),
                join_display(&agg.output)
            ),
            Plan::Project(project) => format!(
                "LogicalProject(projections=[{}])",
                join_display(&project.projections)
            ),
            Plan::Filter(filter) => format!("LogicalFilter(predicate={})", filter.predicate),
            Plan::Join(join) => match &join.condition {
                Some(cond) => format!("LogicalJoin(type={:?}, condition={})", join.join_type, cond),
                None => format!("LogicalJoin(type={:?})", join.join_type),
            },
        }
    }
}

fn join_display<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display(0))
    }
}

impl TreeNode for Plan {
    fn node_name(&self) -> &'static str {
        match self {
            Plan::OlapScan(_) => "LogicalOlapScan",
            Plan::Aggregate(_) => "LogicalAggregate",
            Plan::Project(_) => "LogicalProject",
            Plan::Filter(_) => "LogicalFilter",
            Plan::Join(_) => "LogicalJoin",
        }
    }

    fn children(&self) -> Vec<&Plan> {
        match self {
            Plan::OlapScan(_) => vec![],
            Plan::Aggregate(agg) => vec![agg.child.as_ref()],
            Plan::Project(project) => vec![project.child.as_ref()],
            Plan::Filter(filter) => vec![filter.child.as_ref()],
            Plan::Join(join) => vec![join.left.as_ref(), join.right.as_ref()],
        }
    }

    fn with_children(&self, children: Vec<Plan>) -> Result<Plan> {
        Ok(match self {
            Plan::OlapScan(_) => {
                let [] = take::<0>(self, children)?;
                self.clone()
            }
            Plan::Aggregate(agg) => {
                let [child] = take(self, children)?;
                Plan::Aggregate(LogicalAggregate {
                    group_by: agg.group_by.clone(),
                    output: agg.output.clone(),
                    phase: agg.phase,
                    child,
                })
            }
            Plan::Project(project) => {
                let [child] = take(self, children)?;
                Plan::Project(LogicalProject {
                    projections: project.projections.clone(),
                    child,
                })
            }
            Plan::Filter(filter) => {
                let [child] = take(self, children)?;
                Plan::Filter(LogicalFilter {
                    predicate: filter.predicate.clone(),
                    child,
                })
            }
            Plan::Join(join) => {
                let [left, right] = take(self, children)?;
                Plan::Join(LogicalJoin {
                    join_type: join.join_type,
                    condition: join.condition.clone(),
                    left,
                    right,
                })
            }
        })
    }
}

fn take<const N: usize>(node: &Plan, children: Vec<Plan>) -> Result<[Box<Plan>; N]> {
    let actual = children.len();
    let children: [Plan; N] = children
        .try_into()
        .map_err(|_| RewriteError::ArityMismatch {
            node: node.node_name().to_string(),
            expected: N,
            actual,
        })?;
    Ok(children.map(Box::new))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ColumnDef, InMemoryCatalog};
    use crate::expr::{Alias, DataType};

    fn student() -> TableDef {
        TableDef::new(
            TableRef::new("db", "student"),
            vec![
                ColumnDef::new("id", DataType::Int, true),
                ColumnDef::new("name", DataType::String, true),
                ColumnDef::new("age", DataType::Int, true),
            ],
        )
    }

    fn scan(ids: &ExprIdGenerator) -> Plan {
        Plan::scan(LogicalOlapScan::new(
            Arc::new(student()),
            vec!["student".into()],
            ids,
        ).unwrap())
    }

    #[test]
    fn test_scan_allocates_fresh_ids() {
        let ids = ExprIdGenerator::new();
        let a = scan(&ids);
        let b = scan(&ids);
        let a_ids: Vec<_> = a.output().iter().map(|s| s.expr_id).collect();
        let b_ids: Vec<_> = b.output().iter().map(|s| s.expr_id).collect();
        assert_eq!(a_ids, vec![ExprId(0), ExprId(1), ExprId(2)]);
        assert_eq!(b_ids, vec![ExprId(3), ExprId(4), ExprId(5)]);
        assert_eq!(a.output()[2].name, "age");
        assert_eq!(a.output()[2].qualifier, vec!["student".to_string()]);
    }

    #[test]
    fn test_from_catalog() {
        let ids = ExprIdGenerator::new();
        let mut catalog = InMemoryCatalog::new();
        catalog.add_table(student());

        let scan = LogicalOlapScan::from_catalog(&catalog, &TableRef::new("db", "student"), &ids)
            .unwrap();
        assert_eq!(scan.output.len(), 3);

        let missing = LogicalOlapScan::from_catalog(&catalog, &TableRef::new("db", "nope"), &ids);
        assert_eq!(missing.unwrap_err(), RewriteError::TableNotFound("db.nope".into()));
    }

    #[test]
    fn test_arity_views() {
        let ids = ExprIdGenerator::new();
        let child = scan(&ids);
        let agg = Plan::aggregate(vec![], vec![], child.clone());
        assert!(child.as_unary().is_none());
        assert_eq!(agg.as_unary().unwrap().first().unwrap(), &child);

        let join = Plan::join(JoinType::Cross, None, child.clone(), scan(&ids));
        assert!(join.as_unary().is_none());
        assert_eq!(join.as_binary().unwrap().first().unwrap(), &child);
    }

    #[test]
    fn test_with_children_checks_arity() {
        let ids = ExprIdGenerator::new();
        let child = scan(&ids);
        let agg = Plan::aggregate(vec![], vec![], child.clone());

        let err = agg.with_children(vec![]).unwrap_err();
        assert!(matches!(err, RewriteError::ArityMismatch { expected: 1, actual: 0, .. }));
        let err = child.with_children(vec![agg.clone()]).unwrap_err();
        assert!(matches!(err, RewriteError::ArityMismatch { expected: 0, actual: 1, .. }));
        assert!(matches!(
            agg.child(1),
            Err(RewriteError::IndexOutOfRange { index: 1, arity: 1, .. })
        ));

        let other = scan(&ids);
        let rebuilt = agg.with_children(vec![other.clone()]).unwrap();
        assert_eq!(rebuilt.children(), vec![&other]);
        assert_eq!(rebuilt.as_aggregate().unwrap().phase, AggPhase::Global);
    }

    #[test]
    fn test_output_and_max_id() {
        let ids = ExprIdGenerator::new();
        let child = scan(&ids);
        let id = child.output()[0].clone();
        let sum = Alias::new(&ids, Expression::sum(id.into()), "sum").unwrap();
        let agg = Plan::aggregate(vec![], vec![sum.clone().into()], child);

        assert_eq!(agg.output(), vec![sum.to_slot()]);
        assert_eq!(agg.max_expr_id(), Some(ExprId(3)));
    }

    #[test]
    fn test_semi_join_output_is_left_only() {
        let ids = ExprIdGenerator::new();
        let left = scan(&ids);
        let right = scan(&ids);
        let semi = Plan::join(JoinType::Semi, None, left.clone(), right.clone());
        let inner = Plan::join(JoinType::Inner, None, left.clone(), right);
        assert_eq!(semi.output(), left.output());
        assert_eq!(inner.output().len(), 6);
    }

    #[test]
    fn test_display_tree() {
        let ids = ExprIdGenerator::new();
        let agg = Plan::aggregate(vec![], vec![], scan(&ids));
        let text = agg.display(0);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("LogicalAggregate(phase=GLOBAL"));
        assert_eq!(
            lines[1],
            "+--LogicalOlapScan(table=db.student, output=[id#0, name#1, age#2])"
        );
    }
}
