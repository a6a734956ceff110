//! # Aggregate Disassembly Rule
//!
//! Splits a single-phase aggregate into a two-phase pair for distributed execution:
//!
//! ```text
//! Aggregate(GLOBAL, groupBy=[age + 1], output=[(age + 1) AS key, sum(id) AS s])
//! +--child
//!
//!   becomes
//!
//! Aggregate(GLOBAL, groupBy=[a], output=[a AS key, sum(b) AS s])
//! +--Aggregate(LOCAL, groupBy=[age + 1], output=[(age + 1) AS a, sum(id) AS b])
//!    +--child
//! ```
//!
//! The local aggregate computes partial results per fragment; the global aggregate
//! merges them. `a` and `b` are new aliases with fresh identifiers. `key` and `s` keep
//! their original identifiers and names, so every parent of the original aggregate
//! still resolves against the new global aggregate without further rewriting.
//!
//! ## Algorithm
//!
//! 1. **Group keys.** A slot key is emitted by the local layer as-is and maps to
//!    itself. An alias key is emitted as-is; both the alias and the expression it
//!    names map to its slot. Any other key is wrapped in a fresh alias whose slot
//!    becomes the global key.
//! 2. **Aggregate functions.** Each distinct aggregate function found in the output
//!    list becomes a fresh local alias. It maps to the merge function applied to that
//!    alias's slot (`sum`/`min`/`max` merge with themselves, counts are summed).
//! 3. **Global layer.** The original group-by and output expressions are rewritten by
//!    structural substitution through the map from steps 1 and 2. Output aliases keep
//!    their identifier and name.
//!
//! The local group-by list is the original one, so both layers have as many keys as
//! the original aggregate. A key missing from the output list still appears in the
//! local output and the global group-by; it just produces no global output column.
//!
//! ## Applicability
//!
//! The rule fires on a `GLOBAL` aggregate whose child is not a `LOCAL` aggregate, so it
//! is a no-op on its own output. Aggregates whose partial results cannot be merged by
//! a single aggregate (`avg`, anything `DISTINCT`) are left alone.

use lplan_core::expr::{Alias, AggregateFunction, Expression, NamedExpression};
use lplan_core::pattern::Pattern;
use lplan_core::plan::{AggPhase, LogicalAggregate, Plan};
use lplan_core::rule::Rule;
use lplan_core::{RewriteContext, Result};
use std::collections::HashMap;
use tracing::trace;

/// Two-phase split of a global aggregate.
pub struct AggregateDisassembleRule;

impl Rule for AggregateDisassembleRule {
    fn name(&self) -> &str {
        "AggregateDisassemble"
    }

    fn pattern(&self) -> Pattern {
        Pattern::aggregate()
    }

    fn matches(&self, plan: &Plan) -> bool {
        if !self.pattern().matches(plan) {
            return false;
        }
        let Plan::Aggregate(agg) = plan else {
            return false;
        };
        agg.phase == AggPhase::Global && !is_local_aggregate(&agg.child) && all_decomposable(agg)
    }

    fn apply(&self, plan: &Plan, ctx: &RewriteContext) -> Result<Option<Plan>> {
        let Plan::Aggregate(agg) = plan else {
            return Ok(None);
        };
        let Some((local, global)) = disassemble(agg, ctx)? else {
            return Ok(None);
        };
        trace!(
            "Disassembled aggregate: local={}, global={}",
            local.output.len(),
            global.output.len()
        );
        Ok(Some(Plan::Aggregate(global)))
    }
}

fn is_local_aggregate(plan: &Plan) -> bool {
    matches!(plan, Plan::Aggregate(child) if child.phase == AggPhase::Local)
}

fn all_decomposable(agg: &LogicalAggregate) -> bool {
    agg.output
        .iter()
        .filter_map(NamedExpression::aliased)
        .flat_map(Expression::aggregates)
        .all(AggregateFunction::is_decomposable)
}

/// Build the (local, global) pair, or `None` if some aggregate cannot be merged.
fn disassemble(
    agg: &LogicalAggregate,
    ctx: &RewriteContext,
) -> Result<Option<(LogicalAggregate, LogicalAggregate)>> {
    // Checked up front so a refusal allocates no ids.
    if !all_decomposable(agg) {
        return Ok(None);
    }
    let ids = ctx.id_generator();

    // Original expression -> the expression the global layer uses in its place.
    let mut substitution: HashMap<Expression, Expression> = HashMap::new();
    let mut local_output: Vec<NamedExpression> = Vec::new();

    for key in &agg.group_by {
        if substitution.contains_key(key) {
            continue;
        }
        let local = match key {
            Expression::Slot(slot) => NamedExpression::Slot(slot.clone()),
            Expression::Alias(alias) => {
                // Outputs may repeat the aliased expression under another name.
                substitution
                    .entry((*alias.child).clone())
                    .or_insert_with(|| alias.to_slot().into());
                NamedExpression::Alias(alias.clone())
            }
            other => Alias::new(ids, other.clone(), other.to_sql())?.into(),
        };
        substitution.insert(key.clone(), local.to_slot().into());
        local_output.push(local);
    }

    for output in &agg.output {
        let Some(expr) = output.aliased() else {
            continue;
        };
        for func in expr.aggregates() {
            let partial = Expression::Aggregate(func.clone());
            if substitution.contains_key(&partial) {
                continue;
            }
            let Some(merge) = func.func.merge_function().filter(|_| !func.distinct) else {
                return Ok(None);
            };
            let local = Alias::new(ids, partial.clone(), partial.to_sql())?;
            let merged = Expression::aggregate(merge, local.to_slot().into());
            substitution.insert(partial, merged);
            local_output.push(local.into());
        }
    }

    let global_group_by = agg
        .group_by
        .iter()
        .map(|key| key.substitute(&substitution))
        .collect::<Result<Vec<_>>>()?;
    let global_output = agg
        .output
        .iter()
        .map(|output| substitute_named(output, &substitution))
        .collect::<Result<Vec<_>>>()?;

    let local = LogicalAggregate {
        group_by: agg.group_by.clone(),
        output: local_output,
        phase: AggPhase::Local,
        child: agg.child.clone(),
    };
    let global = LogicalAggregate {
        group_by: global_group_by,
        output: global_output,
        phase: AggPhase::Global,
        child: Box::new(Plan::Aggregate(local.clone())),
    };
    Ok(Some((local, global)))
}

/// Substitute inside an output entry while keeping its identifier and name.
fn substitute_named(
    output: &NamedExpression,
    substitution: &HashMap<Expression, Expression>,
) -> Result<NamedExpression> {
    match output {
        // A slot read through a different local column keeps its own id and name.
        NamedExpression::Slot(slot) => Ok(match substitution.get(&output.to_expression()) {
            Some(Expression::Slot(local)) if local.expr_id == slot.expr_id => {
                NamedExpression::Slot(slot.clone())
            }
            Some(replacement) => {
                Alias::with_id(slot.expr_id, replacement.clone(), slot.name.clone()).into()
            }
            None => NamedExpression::Slot(slot.clone()),
        }),
        NamedExpression::Alias(alias) => {
            // An alias that is itself a group key is read back through its slot.
            if substitution.contains_key(&output.to_expression()) {
                return Ok(NamedExpression::Slot(alias.to_slot()));
            }
            let child = alias.child.substitute(substitution)?;
            Ok(Alias::with_id(alias.expr_id, child, alias.name.clone()).into())
        }
    }
}
