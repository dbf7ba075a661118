use anyhow::{bail, Result};

use crate::expr::{DataType, ScalarExpr};

/// Final touch-up applied to every join condition and predicate before planning.
///
/// Implementations may fail, e.g. when two arguments of a comparison cannot be converted to a
/// common type; the failure aborts hypergraph construction for the query block.
pub trait ConditionRewriter {
    fn rewrite(&self, condition: ScalarExpr) -> Result<ScalarExpr>;
}

/// Inserts casts for comparisons between different types, then caches constant arguments.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultConditionRewriter;

impl ConditionRewriter for DefaultConditionRewriter {
    fn rewrite(&self, condition: ScalarExpr) -> Result<ScalarExpr> {
        let condition = cast_incompatible_args(condition)?;
        Ok(cache_const_exprs(condition))
    }
}

/// Walks the expression bottom up, wrapping comparison arguments in [`ScalarExpr::Cast`] where
/// their types differ.
pub fn cast_incompatible_args(expr: ScalarExpr) -> Result<ScalarExpr> {
    let expr = expr.try_map_children(cast_incompatible_args)?;
    match expr {
        ScalarExpr::Compare { op, left, right } => {
            let (left, right) = cast_to_common_type(*left, *right)?;
            Ok(ScalarExpr::Compare {
                op,
                left: Box::new(left),
                right: Box::new(right),
            })
        }
        ScalarExpr::RowEq { left, right } => {
            if left.len() != right.len() {
                bail!(
                    "row comparison with {} and {} columns",
                    left.len(),
                    right.len()
                );
            }
            let (left, right): (Vec<_>, Vec<_>) = left
                .into_iter()
                .zip(right)
                .map(|(l, r)| cast_to_common_type(l, r))
                .collect::<Result<Vec<_>>>()?
                .into_iter()
                .unzip();
            Ok(ScalarExpr::RowEq { left, right })
        }
        other => Ok(other),
    }
}

fn cast_to_common_type(left: ScalarExpr, right: ScalarExpr) -> Result<(ScalarExpr, ScalarExpr)> {
    let (left_type, right_type) = (left.data_type(), right.data_type());
    if left_type == right_type {
        return Ok((left, right));
    }
    let target = match left_type.common_type(right_type) {
        Some(t) => t,
        None => bail!(
            "cannot compare {} of type {} with {} of type {}",
            left,
            left_type,
            right,
            right_type
        ),
    };
    Ok((cast_to(left, target), cast_to(right, target)))
}

fn cast_to(expr: ScalarExpr, to: DataType) -> ScalarExpr {
    match expr.data_type() {
        t if t == to || t == DataType::Null => expr,
        _ => ScalarExpr::Cast {
            expr: Box::new(expr),
            to,
        },
    }
}

/// Wraps every maximal constant, non-literal argument in [`ScalarExpr::Cached`] so it is only
/// evaluated once. The condition itself is never cached.
pub fn cache_const_exprs(expr: ScalarExpr) -> ScalarExpr {
    expr.map_children(cache_const_arg)
}

fn cache_const_arg(expr: ScalarExpr) -> ScalarExpr {
    match expr {
        e @ (ScalarExpr::Literal(_) | ScalarExpr::Cached(_)) => e,
        e if e.is_const() => ScalarExpr::Cached(Box::new(e)),
        e => e.map_children(cache_const_arg),
    }
}
