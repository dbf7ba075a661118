//! Scalar conditions attached to joins and WHERE clauses.
//!
//! The hypergraph builder only needs a handful of questions answered about a condition: which
//! tables it references, on which tables it rejects NULLs, how it splits into conjuncts, and
//! whether a weaker condition can be derived for a subset of the tables. [`ScalarExpr`] answers
//! them for a small SQL-like expression language.

use std::cmp::Ordering;
use std::convert::Infallible;
use std::fmt::{Display, Formatter};

use derive_more::Display;
use itertools::Itertools;

use crate::bit_utils::{is_subset, table_bitmap, TableMap};

mod multi_equal;
pub use multi_equal::*;
mod rewrite;
pub use rewrite::*;

/// Table number inside one query block, also the bit index in a [`TableMap`].
pub type TableId = usize;

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Display)]
pub enum DataType {
    #[display(fmt = "null")]
    Null,
    #[display(fmt = "bool")]
    Bool,
    #[display(fmt = "int")]
    Int,
    #[display(fmt = "double")]
    Double,
    #[display(fmt = "varchar")]
    Varchar,
}

impl DataType {
    /// The type both sides of a comparison between `self` and `other` are converted to, if any.
    pub fn common_type(self, other: DataType) -> Option<DataType> {
        use DataType::*;
        match (self, other) {
            (a, b) if a == b => Some(a),
            (Null, t) | (t, Null) => Some(t),
            (Bool, Int) | (Int, Bool) => Some(Int),
            (Int | Bool | Varchar, Double) | (Double, Int | Bool | Varchar) => Some(Double),
            (Varchar, Int) | (Int, Varchar) => Some(Double),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ScalarValue {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    Varchar(String),
}

impl ScalarValue {
    pub fn data_type(&self) -> DataType {
        match self {
            ScalarValue::Null => DataType::Null,
            ScalarValue::Bool(_) => DataType::Bool,
            ScalarValue::Int(_) => DataType::Int,
            ScalarValue::Double(_) => DataType::Double,
            ScalarValue::Varchar(_) => DataType::Varchar,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ScalarValue::Null)
    }

    /// Truth value when used as a condition; `None` is SQL UNKNOWN.
    pub fn truth_value(&self) -> Option<bool> {
        match self {
            ScalarValue::Null => None,
            ScalarValue::Bool(b) => Some(*b),
            ScalarValue::Int(v) => Some(*v != 0),
            ScalarValue::Double(v) => Some(*v != 0.0),
            ScalarValue::Varchar(s) => Some(s.trim().parse::<f64>().map_or(false, |v| v != 0.0)),
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            ScalarValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            ScalarValue::Int(v) => Some(*v as f64),
            ScalarValue::Double(v) => Some(*v),
            ScalarValue::Varchar(s) => s.trim().parse().ok(),
            ScalarValue::Null => None,
        }
    }

    /// Compares two constants the way SQL would; `None` if either is NULL or they are not
    /// comparable.
    pub fn sql_cmp(&self, other: &ScalarValue) -> Option<Ordering> {
        match (self, other) {
            (ScalarValue::Null, _) | (_, ScalarValue::Null) => None,
            (ScalarValue::Varchar(a), ScalarValue::Varchar(b)) => Some(a.cmp(b)),
            (ScalarValue::Int(a), ScalarValue::Int(b)) => Some(a.cmp(b)),
            (a, b) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        }
    }
}

impl Display for ScalarValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ScalarValue::Null => write!(f, "NULL"),
            ScalarValue::Bool(true) => write!(f, "TRUE"),
            ScalarValue::Bool(false) => write!(f, "FALSE"),
            ScalarValue::Int(v) => write!(f, "{}", v),
            ScalarValue::Double(v) => write!(f, "{}", v),
            ScalarValue::Varchar(s) => write!(f, "'{}'", s),
        }
    }
}

impl From<i64> for ScalarValue {
    fn from(v: i64) -> Self {
        ScalarValue::Int(v)
    }
}

impl From<bool> for ScalarValue {
    fn from(v: bool) -> Self {
        ScalarValue::Bool(v)
    }
}

impl From<f64> for ScalarValue {
    fn from(v: f64) -> Self {
        ScalarValue::Double(v)
    }
}

impl From<&str> for ScalarValue {
    fn from(v: &str) -> Self {
        ScalarValue::Varchar(v.to_string())
    }
}

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Display)]
pub enum CompareOp {
    #[display(fmt = "=")]
    Eq,
    #[display(fmt = "<=>")]
    NullSafeEq,
    #[display(fmt = "<>")]
    NotEq,
    #[display(fmt = "<")]
    Lt,
    #[display(fmt = "<=")]
    LtEq,
    #[display(fmt = ">")]
    Gt,
    #[display(fmt = ">=")]
    GtEq,
}

impl CompareOp {
    /// Evaluates the comparison on two constants; `None` is SQL UNKNOWN.
    pub fn evaluate(self, left: &ScalarValue, right: &ScalarValue) -> Option<bool> {
        if self == CompareOp::NullSafeEq {
            return match (left.is_null(), right.is_null()) {
                (true, true) => Some(true),
                (true, false) | (false, true) => Some(false),
                (false, false) => left.sql_cmp(right).map(|o| o == Ordering::Equal),
            };
        }
        let ordering = left.sql_cmp(right)?;
        Some(match self {
            CompareOp::Eq | CompareOp::NullSafeEq => ordering == Ordering::Equal,
            CompareOp::NotEq => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::LtEq => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::GtEq => ordering != Ordering::Less,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ColumnRef {
    pub table: TableId,
    pub table_alias: String,
    pub name: String,
    pub data_type: DataType,
}

impl Display for ColumnRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.table_alias, self.name)
    }
}

/// A scalar condition or value expression.
#[derive(Clone, Debug, PartialEq)]
pub enum ScalarExpr {
    Column(ColumnRef),
    Literal(ScalarValue),
    Compare {
        op: CompareOp,
        left: Box<ScalarExpr>,
        right: Box<ScalarExpr>,
    },
    /// `(l1, l2, ...) = (r1, r2, ...)`, evaluated with one comparator per column.
    RowEq {
        left: Vec<ScalarExpr>,
        right: Vec<ScalarExpr>,
    },
    /// All members are equal to each other. Produced by equality propagation upstream and
    /// replaced by plain equalities before the hypergraph is built.
    MultipleEqual(Vec<ScalarExpr>),
    And(Vec<ScalarExpr>),
    Or(Vec<ScalarExpr>),
    Not(Box<ScalarExpr>),
    IsNull(Box<ScalarExpr>),
    Function {
        name: String,
        args: Vec<ScalarExpr>,
        return_type: DataType,
    },
    Cast {
        expr: Box<ScalarExpr>,
        to: DataType,
    },
    /// A constant sub-expression evaluated once per execution.
    Cached(Box<ScalarExpr>),
}

impl ScalarExpr {
    pub fn column<A: Into<String>, N: Into<String>>(
        table: TableId,
        table_alias: A,
        name: N,
        data_type: DataType,
    ) -> Self {
        ScalarExpr::Column(ColumnRef {
            table,
            table_alias: table_alias.into(),
            name: name.into(),
            data_type,
        })
    }

    pub fn literal<V: Into<ScalarValue>>(value: V) -> Self {
        ScalarExpr::Literal(value.into())
    }

    pub fn compare(self, op: CompareOp, other: ScalarExpr) -> Self {
        ScalarExpr::Compare {
            op,
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    pub fn eq(self, other: ScalarExpr) -> Self {
        self.compare(CompareOp::Eq, other)
    }

    pub fn null_safe_eq(self, other: ScalarExpr) -> Self {
        self.compare(CompareOp::NullSafeEq, other)
    }

    pub fn lt(self, other: ScalarExpr) -> Self {
        self.compare(CompareOp::Lt, other)
    }

    pub fn gt(self, other: ScalarExpr) -> Self {
        self.compare(CompareOp::Gt, other)
    }

    pub fn is_null(self) -> Self {
        ScalarExpr::IsNull(Box::new(self))
    }

    pub fn negate(self) -> Self {
        ScalarExpr::Not(Box::new(self))
    }

    /// Conjunction of `args`; a single argument is returned as is.
    pub fn and(mut args: Vec<ScalarExpr>) -> Self {
        if args.len() == 1 {
            return args.remove(0);
        }
        ScalarExpr::And(args)
    }

    /// Disjunction of `args`; a single argument is returned as is.
    pub fn or(mut args: Vec<ScalarExpr>) -> Self {
        if args.len() == 1 {
            return args.remove(0);
        }
        ScalarExpr::Or(args)
    }

    pub fn as_column(&self) -> Option<&ColumnRef> {
        match self {
            ScalarExpr::Column(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<&ScalarValue> {
        match self {
            ScalarExpr::Literal(v) => Some(v),
            _ => None,
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            ScalarExpr::Column(c) => c.data_type,
            ScalarExpr::Literal(v) => v.data_type(),
            ScalarExpr::Function { return_type, .. } => *return_type,
            ScalarExpr::Cast { to, .. } => *to,
            ScalarExpr::Cached(e) => e.data_type(),
            ScalarExpr::Compare { .. }
            | ScalarExpr::RowEq { .. }
            | ScalarExpr::MultipleEqual(_)
            | ScalarExpr::And(_)
            | ScalarExpr::Or(_)
            | ScalarExpr::Not(_)
            | ScalarExpr::IsNull(_) => DataType::Bool,
        }
    }

    /// Direct sub-expressions, left to right.
    pub fn children(&self) -> Vec<&ScalarExpr> {
        match self {
            ScalarExpr::Column(_) | ScalarExpr::Literal(_) => vec![],
            ScalarExpr::Compare { left, right, .. } => vec![left, right],
            ScalarExpr::RowEq { left, right } => left.iter().chain(right.iter()).collect(),
            ScalarExpr::MultipleEqual(args)
            | ScalarExpr::And(args)
            | ScalarExpr::Or(args)
            | ScalarExpr::Function { args, .. } => args.iter().collect(),
            ScalarExpr::Not(e)
            | ScalarExpr::IsNull(e)
            | ScalarExpr::Cast { expr: e, .. }
            | ScalarExpr::Cached(e) => vec![e],
        }
    }

    /// Rebuilds this expression with every direct child replaced by `f(child)`.
    pub fn try_map_children<E, F>(self, mut f: F) -> Result<ScalarExpr, E>
    where
        F: FnMut(ScalarExpr) -> Result<ScalarExpr, E>,
    {
        let mut map_vec = |args: Vec<ScalarExpr>| -> Result<Vec<ScalarExpr>, E> {
            args.into_iter().map(&mut f).collect()
        };
        Ok(match self {
            e @ (ScalarExpr::Column(_) | ScalarExpr::Literal(_)) => e,
            ScalarExpr::Compare { op, left, right } => ScalarExpr::Compare {
                op,
                left: Box::new(f(*left)?),
                right: Box::new(f(*right)?),
            },
            ScalarExpr::RowEq { left, right } => ScalarExpr::RowEq {
                left: map_vec(left)?,
                right: map_vec(right)?,
            },
            ScalarExpr::MultipleEqual(args) => ScalarExpr::MultipleEqual(map_vec(args)?),
            ScalarExpr::And(args) => ScalarExpr::And(map_vec(args)?),
            ScalarExpr::Or(args) => ScalarExpr::Or(map_vec(args)?),
            ScalarExpr::Function {
                name,
                args,
                return_type,
            } => ScalarExpr::Function {
                name,
                args: map_vec(args)?,
                return_type,
            },
            ScalarExpr::Not(e) => ScalarExpr::Not(Box::new(f(*e)?)),
            ScalarExpr::IsNull(e) => ScalarExpr::IsNull(Box::new(f(*e)?)),
            ScalarExpr::Cast { expr, to } => ScalarExpr::Cast {
                expr: Box::new(f(*expr)?),
                to,
            },
            ScalarExpr::Cached(e) => ScalarExpr::Cached(Box::new(f(*e)?)),
        })
    }

    pub fn map_children<F>(self, mut f: F) -> ScalarExpr
    where
        F: FnMut(ScalarExpr) -> ScalarExpr,
    {
        match self.try_map_children(|e| Ok::<_, Infallible>(f(e))) {
            Ok(e) => e,
            Err(never) => match never {},
        }
    }

    /// Tables referenced anywhere in this expression, i.e. its syntactic eligibility set.
    pub fn used_tables(&self) -> TableMap {
        match self {
            ScalarExpr::Column(c) => table_bitmap(c.table),
            other => other
                .children()
                .into_iter()
                .fold(0, |acc, child| acc | child.used_tables()),
        }
    }

    /// Tables for which the expression is guaranteed to be FALSE or UNKNOWN if all of their
    /// columns are NULL.
    pub fn not_null_tables(&self) -> TableMap {
        match self {
            ScalarExpr::Column(c) => table_bitmap(c.table),
            ScalarExpr::Compare {
                op: CompareOp::NullSafeEq,
                ..
            } => 0,
            ScalarExpr::Compare { left, right, .. } => {
                left.not_null_tables() | right.not_null_tables()
            }
            ScalarExpr::RowEq { .. } | ScalarExpr::MultipleEqual(_) | ScalarExpr::And(_) => self
                .children()
                .into_iter()
                .fold(0, |acc, child| acc | child.not_null_tables()),
            ScalarExpr::Or(args) => args
                .iter()
                .map(ScalarExpr::not_null_tables)
                .reduce(|a, b| a & b)
                .unwrap_or(0),
            ScalarExpr::Cast { expr, .. } | ScalarExpr::Cached(expr) => expr.not_null_tables(),
            ScalarExpr::Literal(_)
            | ScalarExpr::Not(_)
            | ScalarExpr::IsNull(_)
            | ScalarExpr::Function { .. } => 0,
        }
    }

    /// Whether the expression can be evaluated without reading any table.
    pub fn is_const(&self) -> bool {
        self.used_tables() == 0
    }

    pub fn is_equality(&self) -> bool {
        matches!(
            self,
            ScalarExpr::Compare {
                op: CompareOp::Eq,
                ..
            } | ScalarExpr::RowEq { .. }
        )
    }

    /// Number of per-column comparators a row comparison needs; zero for scalar comparisons.
    pub fn child_comparator_count(&self) -> usize {
        match self {
            ScalarExpr::RowEq { left, .. } => left.len(),
            _ => 0,
        }
    }

    /// Splits nested `AND`s into a flat list of conjuncts.
    pub fn into_conjuncts(self) -> Vec<ScalarExpr> {
        let mut conditions = vec![];
        self.extract_conditions(&mut conditions);
        conditions
    }

    pub fn extract_conditions(self, conditions: &mut Vec<ScalarExpr>) {
        match self {
            ScalarExpr::And(args) => {
                for arg in args {
                    arg.extract_conditions(conditions);
                }
            }
            other => conditions.push(other),
        }
    }

    /// Derives a condition that only references `tables` and is implied by `self`.
    ///
    /// The result is necessary but not sufficient, so it can be used for early filtering while
    /// the original condition still has to be evaluated later. E.g. `(t1.x = 1 AND t2.y = 2) OR
    /// (t1.x = 3 AND t2.y = 4)` restricted to `t1` is `t1.x = 1 OR t1.x = 3`.
    pub fn restrict_to_tables(&self, tables: TableMap) -> Option<ScalarExpr> {
        match self {
            ScalarExpr::And(args) => {
                let mut parts: Vec<ScalarExpr> = args
                    .iter()
                    .filter_map(|arg| arg.restrict_to_tables(tables))
                    .collect();
                match parts.len() {
                    0 => None,
                    1 => parts.pop(),
                    _ => Some(ScalarExpr::And(parts)),
                }
            }
            ScalarExpr::Or(args) => args
                .iter()
                .map(|arg| arg.restrict_to_tables(tables))
                .collect::<Option<Vec<_>>>()
                .map(ScalarExpr::or),
            other if is_subset(other.used_tables(), tables) => Some(other.clone()),
            _ => None,
        }
    }
}

impl Display for ScalarExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ScalarExpr::Column(c) => write!(f, "{}", c),
            ScalarExpr::Literal(v) => write!(f, "{}", v),
            ScalarExpr::Compare { op, left, right } => write!(f, "({} {} {})", left, op, right),
            ScalarExpr::RowEq { left, right } => write!(
                f,
                "(({}) = ({}))",
                left.iter().join(", "),
                right.iter().join(", ")
            ),
            ScalarExpr::MultipleEqual(args) => {
                write!(f, "multiple equal({})", args.iter().join(", "))
            }
            ScalarExpr::And(args) => write!(f, "({})", args.iter().join(" and ")),
            ScalarExpr::Or(args) => write!(f, "({})", args.iter().join(" or ")),
            ScalarExpr::Not(e) => write!(f, "(not({}))", e),
            ScalarExpr::IsNull(e) => write!(f, "({} is null)", e),
            ScalarExpr::Function { name, args, .. } => {
                write!(f, "{}({})", name, args.iter().join(", "))
            }
            ScalarExpr::Cast { expr, to } => write!(f, "cast({} as {})", expr, to),
            ScalarExpr::Cached(e) => write!(f, "<cache>({})", e),
        }
    }
}

/// Formats a list of conditions joined by `AND`, the way they read in a WHERE clause.
pub fn conditions_to_string(conditions: &[ScalarExpr]) -> String {
    if conditions.is_empty() {
        return "(none)".to_string();
    }
    conditions.iter().join(" and ")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn col(table: TableId, name: &str) -> ScalarExpr {
        ScalarExpr::column(table, format!("t{}", table), name, DataType::Int)
    }

    pub(crate) fn int(v: i64) -> ScalarExpr {
        ScalarExpr::literal(v)
    }

    #[test]
    fn test_used_tables() {
        let cond = ScalarExpr::and(vec![col(0, "x").eq(col(2, "x")), col(5, "y").is_null()]);
        assert_eq!(0b100101, cond.used_tables());
        assert_eq!(0, int(3).eq(int(4)).used_tables());
    }

    #[test]
    fn test_not_null_tables() {
        assert_eq!(0b11, col(0, "x").eq(col(1, "x")).not_null_tables());
        assert_eq!(0, col(0, "x").null_safe_eq(col(1, "x")).not_null_tables());
        assert_eq!(0, col(1, "x").is_null().not_null_tables());

        // Only tables rejected by every disjunct survive an OR.
        let or = ScalarExpr::or(vec![
            col(0, "x").eq(col(1, "x")),
            col(0, "y").eq(col(2, "y")),
        ]);
        assert_eq!(0b1, or.not_null_tables());

        let and = ScalarExpr::and(vec![col(0, "x").eq(int(1)), col(1, "y").is_null()]);
        assert_eq!(0b1, and.not_null_tables());
    }

    #[test]
    fn test_extract_conditions() {
        let cond = ScalarExpr::and(vec![
            col(0, "x").eq(int(1)),
            ScalarExpr::and(vec![col(1, "x").eq(int(2)), col(2, "x").eq(int(3))]),
        ]);
        let conjuncts = cond.into_conjuncts();
        assert_eq!(3, conjuncts.len());
        assert_eq!(col(2, "x").eq(int(3)), conjuncts[2]);
    }

    #[test]
    fn test_restrict_or_of_ands() {
        let cond = ScalarExpr::or(vec![
            ScalarExpr::and(vec![col(0, "x").eq(int(1)), col(1, "y").eq(int(2))]),
            ScalarExpr::and(vec![col(0, "x").eq(int(3)), col(1, "y").eq(int(4))]),
        ]);
        let restricted = cond.restrict_to_tables(0b1).unwrap();
        assert_eq!(
            ScalarExpr::or(vec![col(0, "x").eq(int(1)), col(0, "x").eq(int(3))]),
            restricted
        );
        assert_eq!(0b1, restricted.used_tables());

        // A disjunct without anything on t2 makes the restriction impossible.
        let cond = ScalarExpr::or(vec![col(0, "x").eq(int(1)), col(1, "y").eq(int(2))]);
        assert_eq!(None, cond.restrict_to_tables(0b10));
        assert_eq!(None, col(0, "x").eq(col(1, "x")).restrict_to_tables(0b1));
    }

    #[test]
    fn test_display() {
        let cond = ScalarExpr::and(vec![
            col(0, "x").eq(col(1, "x")),
            col(1, "y").gt(ScalarExpr::literal("abc")),
        ]);
        assert_eq!("((t0.x = t1.x) and (t1.y > 'abc'))", cond.to_string());
    }

    #[test]
    fn test_compare_evaluate() {
        use ScalarValue::*;
        assert_eq!(Some(true), CompareOp::Eq.evaluate(&Int(1), &Double(1.0)));
        assert_eq!(None, CompareOp::Eq.evaluate(&Null, &Int(1)));
        assert_eq!(Some(true), CompareOp::NullSafeEq.evaluate(&Null, &Null));
        assert_eq!(Some(false), CompareOp::Lt.evaluate(&Int(3), &Int(2)));
        assert_eq!(
            Some(true),
            CompareOp::GtEq.evaluate(&Varchar("b".into()), &Varchar("a".into()))
        );
    }
}
