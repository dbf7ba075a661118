//! Replaces multiple equalities with plain equalities and folds constant conditions.

use log::trace;

use crate::expr::{CompareOp, ScalarExpr, ScalarValue};

/// Outcome of simplifying one condition.
#[derive(Clone, Debug, PartialEq)]
pub enum CondResult {
    /// The condition always holds and can be dropped.
    True,
    /// The condition never holds.
    False,
    /// The condition, possibly split into several conjuncts.
    Conditions(Vec<ScalarExpr>),
}

/// Simplifies `condition`: multiple equalities become plain equalities, constant comparisons and
/// literals are evaluated, and nested `AND`s are flattened.
pub fn remove_eq_conds(condition: ScalarExpr) -> CondResult {
    match condition {
        ScalarExpr::MultipleEqual(members) => concretize_multiple_equal(members),
        ScalarExpr::And(args) => {
            let mut parts = vec![];
            for arg in args {
                match remove_eq_conds(arg) {
                    CondResult::True => {}
                    CondResult::False => return CondResult::False,
                    CondResult::Conditions(p) => parts.extend(p),
                }
            }
            if parts.is_empty() {
                CondResult::True
            } else {
                CondResult::Conditions(parts)
            }
        }
        ScalarExpr::Literal(value) => match value.truth_value() {
            Some(true) => CondResult::True,
            // UNKNOWN filters out the row just like FALSE.
            _ => CondResult::False,
        },
        ScalarExpr::Compare { op, left, right } => {
            if let (Some(l), Some(r)) = (left.as_literal(), right.as_literal()) {
                return match op.evaluate(l, r) {
                    Some(true) => CondResult::True,
                    _ => CondResult::False,
                };
            }
            CondResult::Conditions(vec![ScalarExpr::Compare { op, left, right }])
        }
        other => CondResult::Conditions(vec![expand_nested_multiple_equals(other)]),
    }
}

/// Simplifies every condition in the list in place.
///
/// Always-true conditions are removed. If any condition can never hold, the whole list is
/// replaced by a single `FALSE` literal.
pub fn concretize_multiple_equals(conditions: &mut Vec<ScalarExpr>) {
    let input = std::mem::take(conditions);
    for condition in input {
        match remove_eq_conds(condition) {
            CondResult::True => {}
            CondResult::False => {
                trace!("Contradiction found, condition list collapses to FALSE");
                conditions.clear();
                conditions.push(ScalarExpr::literal(false));
                return;
            }
            CondResult::Conditions(parts) => conditions.extend(parts),
        }
    }
}

/// Multiple equalities below `OR`/`NOT` etc. cannot be split into conjuncts; they are replaced by
/// the conjunction of their equalities instead.
fn expand_nested_multiple_equals(expr: ScalarExpr) -> ScalarExpr {
    match expr {
        ScalarExpr::MultipleEqual(members) => match concretize_multiple_equal(members) {
            CondResult::True => ScalarExpr::literal(true),
            CondResult::False => ScalarExpr::literal(false),
            CondResult::Conditions(parts) => ScalarExpr::and(parts),
        },
        other => other.map_children(expand_nested_multiple_equals),
    }
}

fn concretize_multiple_equal(members: Vec<ScalarExpr>) -> CondResult {
    let (constants, fields): (Vec<ScalarExpr>, Vec<ScalarExpr>) =
        members.into_iter().partition(|m| m.as_literal().is_some());

    let mut constant: Option<&ScalarValue> = None;
    for value in constants.iter().filter_map(ScalarExpr::as_literal) {
        if value.is_null() {
            return CondResult::False;
        }
        match constant {
            None => constant = Some(value),
            Some(c) if CompareOp::Eq.evaluate(c, value) != Some(true) => {
                return CondResult::False
            }
            Some(_) => {}
        }
    }

    if let Some(c) = constant {
        if fields.is_empty() {
            return CondResult::True;
        }
        return CondResult::Conditions(
            fields
                .into_iter()
                .map(|field| field.eq(ScalarExpr::Literal(c.clone())))
                .collect(),
        );
    }

    let mut fields = fields.into_iter();
    match fields.next() {
        None => CondResult::True,
        Some(head) => {
            let equalities: Vec<ScalarExpr> =
                fields.map(|field| head.clone().eq(field)).collect();
            if equalities.is_empty() {
                // A lone member is only equal to itself when it is not NULL.
                CondResult::Conditions(vec![head.is_null().negate()])
            } else {
                CondResult::Conditions(equalities)
            }
        }
    }
}
