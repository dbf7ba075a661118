//! Selectivity estimation for join conditions and predicates.

use std::collections::HashMap;

use crate::expr::{CompareOp, ScalarExpr};

/// Selectivity used for equality comparisons without further statistics.
pub const COND_FILTER_EQUALITY: f64 = 0.1;
/// Selectivity used for range comparisons without further statistics.
pub const COND_FILTER_INEQUALITY: f64 = 0.3333;
/// Selectivity used for anything else.
pub const COND_FILTER_FALLBACK: f64 = 0.1;

lazy_static! {
    static ref COMPARE_SELECTIVITY: HashMap<CompareOp, f64> = {
        let mut m = HashMap::new();
        m.insert(CompareOp::Eq, COND_FILTER_EQUALITY);
        m.insert(CompareOp::NullSafeEq, COND_FILTER_EQUALITY);
        m.insert(CompareOp::NotEq, 1.0 - COND_FILTER_EQUALITY);
        m.insert(CompareOp::Lt, COND_FILTER_INEQUALITY);
        m.insert(CompareOp::LtEq, COND_FILTER_INEQUALITY);
        m.insert(CompareOp::Gt, COND_FILTER_INEQUALITY);
        m.insert(CompareOp::GtEq, COND_FILTER_INEQUALITY);
        m
    };
}

/// Estimates the fraction of rows a condition lets through.
///
/// The result is always in `(0, 1]`. If `trace` is given, implementations append a line
/// explaining the estimate.
pub trait SelectivityEstimator {
    fn estimate(&self, condition: &ScalarExpr, trace: Option<&mut String>) -> f64;
}

/// Estimator based on fixed per-operator selectivities.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultSelectivityEstimator;

impl SelectivityEstimator for DefaultSelectivityEstimator {
    fn estimate(&self, condition: &ScalarExpr, trace: Option<&mut String>) -> f64 {
        let selectivity = estimate_selectivity(condition).clamp(f64::MIN_POSITIVE, 1.0);
        if let Some(trace) = trace {
            trace.push_str(&format!(
                " - fallback selectivity for {} = {:.3}\n",
                condition, selectivity
            ));
        }
        selectivity
    }
}

fn estimate_selectivity(condition: &ScalarExpr) -> f64 {
    match condition {
        ScalarExpr::Compare { op, .. } => COMPARE_SELECTIVITY
            .get(op)
            .copied()
            .unwrap_or(COND_FILTER_FALLBACK),
        ScalarExpr::RowEq { left, .. } => COND_FILTER_EQUALITY.powi(left.len() as i32),
        ScalarExpr::MultipleEqual(members) => {
            COND_FILTER_EQUALITY.powi(members.len().saturating_sub(1) as i32)
        }
        ScalarExpr::IsNull(_) => COND_FILTER_EQUALITY,
        ScalarExpr::Not(inner) => 1.0 - estimate_selectivity(inner),
        ScalarExpr::And(args) => args.iter().map(estimate_selectivity).product(),
        ScalarExpr::Or(args) => args
            .iter()
            .map(estimate_selectivity)
            .fold(0.0, |acc, s| acc + s - acc * s),
        ScalarExpr::Literal(value) => match value.truth_value() {
            Some(true) => 1.0,
            _ => 0.0,
        },
        ScalarExpr::Cached(inner) => estimate_selectivity(inner),
        ScalarExpr::Column(_)
        | ScalarExpr::Function { .. }
        | ScalarExpr::Cast { .. } => COND_FILTER_FALLBACK,
    }
}
