use log::trace;

use crate::bit_utils::{is_subset, TableMap};
use crate::expr::ScalarExpr;
use crate::operator::JoinType;
use crate::plan::{ExprId, RelationalTree};

/// Tries to push `condition` as far down the tree under `expr` as possible.
///
/// `condition` is either a join condition of `expr` (`is_join_condition_for_expr`) or a filter
/// applied somewhere above it. Returns `true` if the condition remains the caller's to keep,
/// `false` if it was placed lower in the tree, i.e. as a table filter or as the join condition of
/// a lower join.
///
/// Besides regular pushdown, two kinds of copies are pushed that never affect the result:
///
/// * Partial pushdown: a condition spanning both sides of a join may still imply a weaker
///   condition on one side, e.g. `(t1.x = 1 AND t2.y = 2) OR (t1.x = 3 AND t2.y = 4)` implies
///   `t1.x = 1 OR t1.x = 3`. Those are pushed for earlier filtering; the original condition
///   stays.
/// * Sargable pushdown: a join condition like `t1.x = t2.x` could be evaluated as an index
///   lookup on either table, taking the other table's columns as parameters. Such copies are
///   pushed with `parameter_tables` set to the tables on the other side, and end up in the
///   table's `join_conditions_pushable_to_this`. A copy that does not reach a table is dropped.
pub fn push_down_condition(
    tree: &mut RelationalTree,
    condition: &ScalarExpr,
    expr: ExprId,
    is_join_condition_for_expr: bool,
    parameter_tables: TableMap,
) -> bool {
    let join = match tree.join(expr) {
        Some(join) => join,
        None => {
            let table = &mut tree[expr];
            let target = if parameter_tables == 0 {
                &mut table.table_filters
            } else {
                &mut table.join_conditions_pushable_to_this
            };
            if !target.contains(condition) {
                target.push(condition.clone());
            }
            return false;
        }
    };

    let left_tables = tree[join.left()].tables_in_subtree;
    let right_tables = tree[join.right()].tables_in_subtree;
    let used_tables = condition.used_tables();
    let join_type = join.join_type();

    // Filters may go into the left side of any join but a full outer join, while a join's own
    // condition must stay on an outer join or antijoin, since it would remove rows that are to be
    // NULL-complemented. Pushing into the right side is exactly the opposite. Semijoins are
    // treated like inner joins, as conditions hoisted above them during semijoin conversion must
    // be pushed back through them.
    // Unlike a left join, a full outer join also NULL-complements its left side, so nothing is
    // pushed into it.
    let can_push_left = join_type.is_inner_like()
        || (!is_join_condition_for_expr && join_type != JoinType::FullOuter);
    let can_push_right = join_type.is_inner_like()
        || (is_join_condition_for_expr && join_type != JoinType::FullOuter);

    if is_subset(used_tables, left_tables | parameter_tables) {
        if !can_push_left {
            return true;
        }
        return push_down_condition(tree, condition, join.left(), false, parameter_tables);
    }
    if is_subset(used_tables, right_tables | parameter_tables) {
        if !can_push_right {
            return true;
        }
        return push_down_condition(tree, condition, join.right(), false, parameter_tables);
    }

    // The condition spans both sides; try partial pushdown first.
    let sides = [
        (can_push_left, join.left(), left_tables, right_tables),
        (can_push_right, join.right(), right_tables, left_tables),
    ];
    for &(can_push, child, child_tables, _) in &sides {
        if !can_push {
            continue;
        }
        if let Some(partial) = condition.restrict_to_tables(child_tables) {
            trace!("Partial pushdown of {} as {}", condition, partial);
            push_down_condition(tree, &partial, child, false, parameter_tables);
        }
    }

    // Then see if it could be an index lookup on either side.
    for &(can_push, child, _, other_tables) in &sides {
        if !can_push {
            continue;
        }
        let mut parameters = used_tables & other_tables;
        if parameters == 0 {
            // Degenerate condition, so add everything just to be safe.
            parameters = other_tables;
        }
        push_down_condition(tree, condition, child, false, parameter_tables | parameters);
    }

    if parameter_tables != 0 {
        // A sargable copy must never become a join condition.
        return false;
    }
    if is_join_condition_for_expr {
        return true;
    }
    if join_type.is_outer_like() {
        return true;
    }

    // Promote the filter to a join condition. Equi-join classification runs later.
    debug_assert!(tree[expr].equijoin_conditions.is_empty());
    trace!(
        "Promoting {} to join condition of {}",
        condition,
        tree.generate_expression_label(expr)
    );
    tree[expr].join_conditions.push(condition.clone());
    false
}

/// Pushes each of `conditions` as far down under `expr` as possible and returns the ones that
/// could not be pushed.
///
/// If `is_join_condition_for_expr` is set, the conditions are join conditions of `expr` itself
/// and are returned when `expr` is their final place.
pub fn push_down_as_much_as_possible(
    tree: &mut RelationalTree,
    conditions: Vec<ScalarExpr>,
    expr: ExprId,
    is_join_condition_for_expr: bool,
) -> Vec<ScalarExpr> {
    conditions
        .into_iter()
        .filter(|condition| {
            push_down_condition(tree, condition, expr, is_join_condition_for_expr, 0)
        })
        .collect()
}

/// Pushes the join conditions of every join under `expr` as far down as possible.
///
/// Earlier stages hoist join conditions up as far as they can, so e.g. `a LEFT JOIN (b JOIN c ON
/// b.x = c.x)` arrives as `a LEFT JOIN (b JOIN c) ON b.x = c.x`. This moves `b.x = c.x` back to
/// the inner join.
pub fn push_down_join_conditions(tree: &mut RelationalTree, expr: ExprId) {
    let join = match tree.join(expr) {
        Some(join) => join,
        None => return,
    };
    // Equi-join classification has not run yet.
    debug_assert!(tree[expr].equijoin_conditions.is_empty());
    let conditions = std::mem::take(&mut tree[expr].join_conditions);
    if !conditions.is_empty() {
        let remaining = push_down_as_much_as_possible(tree, conditions, expr, true);
        tree[expr].join_conditions.extend(remaining);
    }
    push_down_join_conditions(tree, join.left());
    push_down_join_conditions(tree, join.right());
}
