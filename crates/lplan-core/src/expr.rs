//! # Expression Model
//!
//! Scalar and aggregate expressions that appear inside plan nodes: group-by keys,
//! output lists, filter predicates and join conditions. `Expression` is a closed sum
//! type; every consumer matches it exhaustively instead of testing runtime types.
//!
//! ## Named Expressions
//!
//! Two variants carry a stable identity:
//!
//! - **`SlotReference`**: a leaf that denotes "the value already produced under this
//!   `ExprId`". Slots are how one plan layer reads the output of another.
//! - **`Alias`**: gives an identifier and a name to an arbitrary child expression.
//!
//! Plan output lists hold [`NamedExpression`], a two-variant enum, so the invariant
//! "every output entry is named" is carried by the type. `to_slot()` projects a named
//! expression to a reference-only slot with the same id, name, type and nullability.
//!
//! ## Aggregate Functions
//!
//! `Expression::Aggregate` wraps exactly one argument. Whether an aggregate is the
//! first phase (over raw rows) or the second phase (over partial results) is visible
//! only through the argument it wraps; there is no separate type per phase.
//!
//! ## Equality
//!
//! Equality and hashing are structural and derived: two expressions are equal iff
//! they have the same variant, payload and children. Slots compare by their whole
//! payload, which includes the `ExprId`.

use crate::error::{Result, RewriteError};
use crate::id::{ExprId, ExprIdGenerator};
use crate::tree::TreeNode;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Semantic type of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Type of the untyped NULL literal.
    Null,
    Boolean,
    /// 32-bit signed integer.
    Int,
    /// 64-bit signed integer.
    BigInt,
    Double,
    String,
}

impl DataType {
    pub fn is_numeric(self) -> bool {
        matches!(self, DataType::Int | DataType::BigInt | DataType::Double)
    }

    /// Common type of two numeric operands (`Int < BigInt < Double`).
    fn widen(self, other: DataType) -> DataType {
        use DataType::*;
        match (self, other) {
            (Null, t) | (t, Null) => t,
            (Double, _) | (_, Double) => Double,
            (BigInt, _) | (_, BigInt) => BigInt,
            (Int, Int) => Int,
            (t, _) => t,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DataType::Null => "NULL",
            DataType::Boolean => "BOOLEAN",
            DataType::Int => "INT",
            DataType::BigInt => "BIGINT",
            DataType::Double => "DOUBLE",
            DataType::String => "STRING",
        };
        f.write_str(s)
    }
}

/// Constant value of a literal.
///
/// Uses `OrderedFloat` for doubles so that literals (and therefore whole expressions)
/// can derive `Eq` and `Hash` and be used as substitution-map keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarValue {
    Null,
    Boolean(bool),
    Int(i32),
    BigInt(i64),
    Double(OrderedFloat<f64>),
    String(String),
}

impl ScalarValue {
    pub fn data_type(&self) -> DataType {
        match self {
            ScalarValue::Null => DataType::Null,
            ScalarValue::Boolean(_) => DataType::Boolean,
            ScalarValue::Int(_) => DataType::Int,
            ScalarValue::BigInt(_) => DataType::BigInt,
            ScalarValue::Double(_) => DataType::Double,
            ScalarValue::String(_) => DataType::String,
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Null => f.write_str("NULL"),
            ScalarValue::Boolean(v) => write!(f, "{}", v),
            ScalarValue::Int(v) => write!(f, "{}", v),
            ScalarValue::BigInt(v) => write!(f, "{}", v),
            ScalarValue::Double(v) => write!(f, "{}", v),
            ScalarValue::String(v) => write!(f, "'{}'", v),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Mod,
}

impl ArithmeticOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Subtract => "-",
            ArithmeticOp::Multiply => "*",
            ArithmeticOp::Divide => "/",
            ArithmeticOp::Mod => "%",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl ComparisonOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ComparisonOp::Eq => "=",
            ComparisonOp::NotEq => "<>",
            ComparisonOp::Lt => "<",
            ComparisonOp::LtEq => "<=",
            ComparisonOp::Gt => ">",
            ComparisonOp::GtEq => ">=",
        }
    }
}

/// Aggregate function kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggFunc {
    Sum,
    Count,
    Min,
    Max,
    Avg,
}

impl AggFunc {
    pub fn name(self) -> &'static str {
        match self {
            AggFunc::Sum => "sum",
            AggFunc::Count => "count",
            AggFunc::Min => "min",
            AggFunc::Max => "max",
            AggFunc::Avg => "avg",
        }
    }

    /// The function that merges partial results of `self` into a final result.
    ///
    /// `sum`, `min` and `max` merge with themselves; partial counts are summed.
    /// `avg` has no single-function merge and returns `None`.
    pub fn merge_function(self) -> Option<AggFunc> {
        match self {
            AggFunc::Sum | AggFunc::Count => Some(AggFunc::Sum),
            AggFunc::Min => Some(AggFunc::Min),
            AggFunc::Max => Some(AggFunc::Max),
            AggFunc::Avg => None,
        }
    }

    fn result_type(self, arg: DataType) -> DataType {
        match self {
            AggFunc::Sum => match arg {
                DataType::Double => DataType::Double,
                _ => DataType::BigInt,
            },
            AggFunc::Count => DataType::BigInt,
            AggFunc::Min | AggFunc::Max => arg,
            AggFunc::Avg => DataType::Double,
        }
    }
}

/// A reference to a value produced under `expr_id` by some input of the node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotReference {
    pub expr_id: ExprId,
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    /// Table qualifier (e.g. `["db", "student"]`). Empty for computed values.
    #[serde(default)]
    pub qualifier: Vec<String>,
}

impl SlotReference {
    pub fn new(
        expr_id: ExprId,
        name: impl Into<String>,
        data_type: DataType,
        nullable: bool,
    ) -> Self {
        Self {
            expr_id,
            name: name.into(),
            data_type,
            nullable,
            qualifier: Vec::new(),
        }
    }

    pub fn with_qualifier(mut self, qualifier: Vec<String>) -> Self {
        self.qualifier = qualifier;
        self
    }
}

impl fmt::Display for SlotReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.expr_id)
    }
}

/// Names an arbitrary expression under its own identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Alias {
    pub expr_id: ExprId,
    pub name: String,
    pub child: Box<Expression>,
}

impl Alias {
    /// Alias `child` as `name` under a freshly allocated identifier.
    pub fn new(ids: &ExprIdGenerator, child: Expression, name: impl Into<String>) -> Result<Self> {
        Ok(Self::with_id(ids.next_id()?, child, name))
    }

    /// Alias `child` as `name` reusing an existing identifier.
    pub fn with_id(expr_id: ExprId, child: Expression, name: impl Into<String>) -> Self {
        Self {
            expr_id,
            name: name.into(),
            child: Box::new(child),
        }
    }

    pub fn to_slot(&self) -> SlotReference {
        SlotReference::new(
            self.expr_id,
            self.name.clone(),
            self.child.data_type(),
            self.child.nullable(),
        )
    }
}

impl fmt::Display for Alias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} AS {}#{}", self.child, self.name, self.expr_id)
    }
}

/// An aggregate function applied to one argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AggregateFunction {
    pub func: AggFunc,
    #[serde(default)]
    pub distinct: bool,
    pub arg: Box<Expression>,
}

impl AggregateFunction {
    pub fn new(func: AggFunc, arg: Expression) -> Self {
        Self {
            func,
            distinct: false,
            arg: Box::new(arg),
        }
    }

    /// Partial results of this aggregate can be merged by a second aggregate.
    pub fn is_decomposable(&self) -> bool {
        !self.distinct && self.func.merge_function().is_some()
    }

    /// Same function and flags over a different argument.
    pub fn with_arg(&self, arg: Expression) -> Self {
        Self {
            func: self.func,
            distinct: self.distinct,
            arg: Box::new(arg),
        }
    }
}

/// Scalar and aggregate expressions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Expression {
    Literal(ScalarValue),
    Slot(SlotReference),
    Alias(Alias),
    /// `left op right` for `+ - * / %`.
    Arithmetic {
        op: ArithmeticOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Comparison {
        op: ComparisonOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
    Not(Box<Expression>),
    /// `value BETWEEN lower AND upper`, the only three-child expression.
    Between {
        value: Box<Expression>,
        lower: Box<Expression>,
        upper: Box<Expression>,
    },
    Aggregate(AggregateFunction),
}

impl Expression {
    pub fn int(v: i32) -> Self {
        Expression::Literal(ScalarValue::Int(v))
    }

    pub fn bigint(v: i64) -> Self {
        Expression::Literal(ScalarValue::BigInt(v))
    }

    pub fn string(v: impl Into<String>) -> Self {
        Expression::Literal(ScalarValue::String(v.into()))
    }

    pub fn arithmetic(op: ArithmeticOp, left: Expression, right: Expression) -> Self {
        Expression::Arithmetic {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn add(left: Expression, right: Expression) -> Self {
        Self::arithmetic(ArithmeticOp::Add, left, right)
    }

    pub fn comparison(op: ComparisonOp, left: Expression, right: Expression) -> Self {
        Expression::Comparison {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn between(value: Expression, lower: Expression, upper: Expression) -> Self {
        Expression::Between {
            value: Box::new(value),
            lower: Box::new(lower),
            upper: Box::new(upper),
        }
    }

    pub fn aggregate(func: AggFunc, arg: Expression) -> Self {
        Expression::Aggregate(AggregateFunction::new(func, arg))
    }

    pub fn sum(arg: Expression) -> Self {
        Self::aggregate(AggFunc::Sum, arg)
    }

    pub fn count(arg: Expression) -> Self {
        Self::aggregate(AggFunc::Count, arg)
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Expression::Literal(v) => v.data_type(),
            Expression::Slot(s) => s.data_type,
            Expression::Alias(a) => a.child.data_type(),
            Expression::Arithmetic { op, left, right } => {
                let t = left.data_type().widen(right.data_type());
                if *op == ArithmeticOp::Divide {
                    DataType::Double
                } else {
                    t
                }
            }
            Expression::Comparison { .. }
            | Expression::And(..)
            | Expression::Or(..)
            | Expression::Not(_)
            | Expression::Between { .. } => DataType::Boolean,
            Expression::Aggregate(agg) => agg.func.result_type(agg.arg.data_type()),
        }
    }

    pub fn nullable(&self) -> bool {
        match self {
            Expression::Literal(v) => *v == ScalarValue::Null,
            Expression::Slot(s) => s.nullable,
            Expression::Alias(a) => a.child.nullable(),
            // x / 0 and x % 0 yield NULL
            Expression::Arithmetic {
                op: ArithmeticOp::Divide | ArithmeticOp::Mod,
                ..
            } => true,
            Expression::Aggregate(agg) => agg.func != AggFunc::Count,
            other => other.children().into_iter().any(|c| c.nullable()),
        }
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, Expression::Aggregate(_))
    }

    pub fn contains_aggregate(&self) -> bool {
        self.any(&|e: &Expression| e.is_aggregate())
    }

    /// Every aggregate function in this expression, in pre-order.
    pub fn aggregates(&self) -> Vec<&AggregateFunction> {
        self.collect(|e| match e {
            Expression::Aggregate(agg) => Some(agg),
            _ => None,
        })
    }

    /// Every slot this expression reads, in pre-order.
    pub fn input_slots(&self) -> Vec<&SlotReference> {
        self.collect(|e| match e {
            Expression::Slot(s) => Some(s),
            _ => None,
        })
    }

    pub fn as_named(&self) -> Option<NamedExpression> {
        match self {
            Expression::Slot(s) => Some(NamedExpression::Slot(s.clone())),
            Expression::Alias(a) => Some(NamedExpression::Alias(a.clone())),
            _ => None,
        }
    }

    /// Largest identifier mentioned anywhere in this expression.
    pub fn max_expr_id(&self) -> Option<ExprId> {
        self.collect(|e| match e {
            Expression::Slot(s) => Some(s.expr_id),
            Expression::Alias(a) => Some(a.expr_id),
            _ => None,
        })
        .into_iter()
        .max()
    }

    /// Replace subtrees by structural lookup in `map`.
    ///
    /// The lookup is tried on a node before its children; a replaced node is not
    /// descended into.
    pub fn substitute(&self, map: &HashMap<Expression, Expression>) -> Result<Expression> {
        if let Some(replacement) = map.get(self) {
            return Ok(replacement.clone());
        }
        let children = self.children();
        if children.is_empty() {
            return Ok(self.clone());
        }
        let new_children = children
            .into_iter()
            .map(|c| c.substitute(map))
            .collect::<Result<Vec<_>>>()?;
        self.with_children(new_children)
    }

    /// Render without identifiers, as the expression would be written in SQL.
    pub fn to_sql(&self) -> String {
        match self {
            Expression::Literal(v) => v.to_string(),
            Expression::Slot(s) => s.name.clone(),
            Expression::Alias(a) => format!("{} AS {}", a.child.to_sql(), a.name),
            Expression::Arithmetic { op, left, right } => {
                format!("({} {} {})", left.to_sql(), op.symbol(), right.to_sql())
            }
            Expression::Comparison { op, left, right } => {
                format!("({} {} {})", left.to_sql(), op.symbol(), right.to_sql())
            }
            Expression::And(l, r) => format!("({} AND {})", l.to_sql(), r.to_sql()),
            Expression::Or(l, r) => format!("({} OR {})", l.to_sql(), r.to_sql()),
            Expression::Not(e) => format!("(NOT {})", e.to_sql()),
            Expression::Between { value, lower, upper } => format!(
                "({} BETWEEN {} AND {})",
                value.to_sql(),
                lower.to_sql(),
                upper.to_sql()
            ),
            Expression::Aggregate(agg) => format!(
                "{}({}{})",
                agg.func.name(),
                if agg.distinct { "DISTINCT " } else { "" },
                agg.arg.to_sql()
            ),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(v) => write!(f, "{}", v),
            Expression::Slot(s) => write!(f, "{}", s),
            Expression::Alias(a) => write!(f, "{}", a),
            Expression::Arithmetic { op, left, right } => {
                write!(f, "({} {} {})", left, op.symbol(), right)
            }
            Expression::Comparison { op, left, right } => {
                write!(f, "({} {} {})", left, op.symbol(), right)
            }
            Expression::And(l, r) => write!(f, "({} AND {})", l, r),
            Expression::Or(l, r) => write!(f, "({} OR {})", l, r),
            Expression::Not(e) => write!(f, "(NOT {})", e),
            Expression::Between { value, lower, upper } => {
                write!(f, "({} BETWEEN {} AND {})", value, lower, upper)
            }
            Expression::Aggregate(agg) => write!(
                f,
                "{}({}{})",
                agg.func.name(),
                if agg.distinct { "DISTINCT " } else { "" },
                agg.arg
            ),
        }
    }
}

impl TreeNode for Expression {
    fn node_name(&self) -> &'static str {
        match self {
            Expression::Literal(_) => "Literal",
            Expression::Slot(_) => "SlotReference",
            Expression::Alias(_) => "Alias",
            Expression::Arithmetic { .. } => "Arithmetic",
            Expression::Comparison { .. } => "Comparison",
            Expression::And(..) => "And",
            Expression::Or(..) => "Or",
            Expression::Not(_) => "Not",
            Expression::Between { .. } => "Between",
            Expression::Aggregate(_) => "AggregateFunction",
        }
    }

    fn children(&self) -> Vec<&Expression> {
        match self {
            Expression::Literal(_) | Expression::Slot(_) => vec![],
            Expression::Alias(a) => vec![a.child.as_ref()],
            Expression::Arithmetic { left, right, .. }
            | Expression::Comparison { left, right, .. }
            | Expression::And(left, right)
            | Expression::Or(left, right) => vec![left.as_ref(), right.as_ref()],
            Expression::Not(e) => vec![e.as_ref()],
            Expression::Between { value, lower, upper } => {
                vec![value.as_ref(), lower.as_ref(), upper.as_ref()]
            }
            Expression::Aggregate(agg) => vec![agg.arg.as_ref()],
        }
    }

    fn with_children(&self, children: Vec<Expression>) -> Result<Expression> {
        Ok(match self {
            Expression::Literal(_) | Expression::Slot(_) => {
                let [] = take::<0>(self, children)?;
                self.clone()
            }
            Expression::Alias(a) => {
                let [child] = take(self, children)?;
                Expression::Alias(Alias {
                    expr_id: a.expr_id,
                    name: a.name.clone(),
                    child,
                })
            }
            Expression::Arithmetic { op, .. } => {
                let [left, right] = take(self, children)?;
                Expression::Arithmetic { op: *op, left, right }
            }
            Expression::Comparison { op, .. } => {
                let [left, right] = take(self, children)?;
                Expression::Comparison { op: *op, left, right }
            }
            Expression::And(..) => {
                let [left, right] = take(self, children)?;
                Expression::And(left, right)
            }
            Expression::Or(..) => {
                let [left, right] = take(self, children)?;
                Expression::Or(left, right)
            }
            Expression::Not(_) => {
                let [child] = take(self, children)?;
                Expression::Not(child)
            }
            Expression::Between { .. } => {
                let [value, lower, upper] = take(self, children)?;
                Expression::Between { value, lower, upper }
            }
            Expression::Aggregate(agg) => {
                let [arg] = take(self, children)?;
                Expression::Aggregate(AggregateFunction {
                    func: agg.func,
                    distinct: agg.distinct,
                    arg,
                })
            }
        })
    }
}

/// Move exactly `N` children into boxes, or fail with `ArityMismatch`.
fn take<const N: usize>(
    node: &Expression,
    children: Vec<Expression>,
) -> Result<[Box<Expression>; N]> {
    let actual = children.len();
    let children: [Expression; N] = children
        .try_into()
        .map_err(|_| RewriteError::ArityMismatch {
            node: node.node_name().to_string(),
            expected: N,
            actual,
        })?;
    Ok(children.map(Box::new))
}

/// An expression that produces a stable identifier and an output name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamedExpression {
    Slot(SlotReference),
    Alias(Alias),
}

impl NamedExpression {
    pub fn expr_id(&self) -> ExprId {
        match self {
            NamedExpression::Slot(s) => s.expr_id,
            NamedExpression::Alias(a) => a.expr_id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            NamedExpression::Slot(s) => &s.name,
            NamedExpression::Alias(a) => &a.name,
        }
    }

    pub fn to_slot(&self) -> SlotReference {
        match self {
            NamedExpression::Slot(s) => s.clone(),
            NamedExpression::Alias(a) => a.to_slot(),
        }
    }

    pub fn is_slot(&self) -> bool {
        matches!(self, NamedExpression::Slot(_))
    }

    pub fn is_alias(&self) -> bool {
        matches!(self, NamedExpression::Alias(_))
    }

    pub fn to_expression(&self) -> Expression {
        self.clone().into()
    }

    /// Slots this entry reads from its input: itself for a slot, the aliased
    /// expression's slots for an alias.
    pub fn input_slots(&self) -> Vec<&SlotReference> {
        match self {
            NamedExpression::Slot(s) => vec![s],
            NamedExpression::Alias(a) => a.child.input_slots(),
        }
    }

    pub fn max_expr_id(&self) -> Option<ExprId> {
        match self {
            NamedExpression::Slot(s) => Some(s.expr_id),
            NamedExpression::Alias(a) => Some(
                a.child
                    .max_expr_id()
                    .map_or(a.expr_id, |m| m.max(a.expr_id)),
            ),
        }
    }

    /// The aliased child, or `None` for a slot.
    pub fn aliased(&self) -> Option<&Expression> {
        match self {
            NamedExpression::Slot(_) => None,
            NamedExpression::Alias(a) => Some(&a.child),
        }
    }
}

impl fmt::Display for NamedExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamedExpression::Slot(s) => write!(f, "{}", s),
            NamedExpression::Alias(a) => write!(f, "{}", a),
        }
    }
}

impl From<SlotReference> for Expression {
    fn from(s: SlotReference) -> Self {
        Expression::Slot(s)
    }
}

impl From<Alias> for Expression {
    fn from(a: Alias) -> Self {
        Expression::Alias(a)
    }
}

impl From<NamedExpression> for Expression {
    fn from(n: NamedExpression) -> Self {
        match n {
            NamedExpression::Slot(s) => Expression::Slot(s),
            NamedExpression::Alias(a) => Expression::Alias(a),
        }
    }
}

impl From<SlotReference> for NamedExpression {
    fn from(s: SlotReference) -> Self {
        NamedExpression::Slot(s)
    }
}

impl From<Alias> for NamedExpression {
    fn from(a: Alias) -> Self {
        NamedExpression::Alias(a)
    }
}

impl TryFrom<Expression> for NamedExpression {
    /// The expression is handed back when it has no identity.
    type Error = Expression;

    fn try_from(e: Expression) -> std::result::Result<Self, Self::Error> {
        match e {
            Expression::Slot(s) => Ok(NamedExpression::Slot(s)),
            Expression::Alias(a) => Ok(NamedExpression::Alias(a)),
            other => Err(other),
        }
    }
}
