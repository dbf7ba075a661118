//! Conflict detection for join reordering, following the CD-C algorithm of [Moe13].
//!
//! Every join is compared with every join below it. Whenever the pair cannot be reordered by
//! associativity or l-/r-asscom, a conflict rule is recorded that blocks exactly that rewrite.
//! Rules are then folded into the join's hyperedge where possible; the rest stay on the join and
//! must be checked by the enumerator.
//!
//! In the presence of degenerate conditions or cartesian products the resulting hyperedges may
//! be wider than necessary. This may rule out valid plans, but never admits invalid ones.
//!
//! [Moe13]: Moerkotte, Fender, Eich: "On the correct and complete enumeration of the core
//! search space", SIGMOD 2013.

use derive_more::Display;
use log::trace;
use smallvec::SmallVec;

use crate::bit_utils::{is_subset, overlaps, NodeMap, TableMap};
use crate::hypergraph::Hyperedge;
use crate::operator::{Join, JoinType};
use crate::plan::{ExprId, RelationalTree};

/// If any node in `activates` is present in a join, all nodes in `requires` must be as well.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
#[display(fmt = "{:#b} -> {:#b}", activates, requires)]
pub struct ConflictRule {
    pub activates: NodeMap,
    pub requires: NodeMap,
}

pub type ConflictRules = SmallVec<[ConflictRule; 4]>;

/// Whether some join condition of `expr` is FALSE or UNKNOWN whenever all of `tables` are NULL.
pub fn is_null_rejecting(tree: &RelationalTree, expr: ExprId, tables: TableMap) -> bool {
    tree[expr]
        .all_join_conditions()
        .any(|cond| overlaps(tables, cond.not_null_tables()))
}

fn tables_in(tree: &RelationalTree, expr: ExprId) -> TableMap {
    tree[expr].tables_in_subtree
}

fn join_pair(tree: &RelationalTree, a: ExprId, b: ExprId) -> Option<(Join, Join)> {
    Some((tree.join(a)?, tree.join(b)?))
}

/// Whether `(t1 a t2) b t3 == t1 a (t2 b t3)`.
///
/// `a` need not be a direct child of `b`, so null-rejection of `b` is checked against all of
/// `b.left`. Checking only `a.right` could reject valid plans when `b` references a table below
/// `a` that is not in `a.right`.
pub fn operators_are_associative(tree: &RelationalTree, a: ExprId, b: ExprId) -> bool {
    let (ja, jb) = match join_pair(tree, a, b) {
        Some(pair) => pair,
        None => return true,
    };
    use JoinType::*;
    match (ja.join_type(), jb.join_type()) {
        (Left | FullOuter, Left) => is_null_rejecting(tree, b, tables_in(tree, jb.left())),
        (FullOuter, FullOuter) => {
            is_null_rejecting(tree, a, tables_in(tree, ja.right()))
                && is_null_rejecting(tree, b, tables_in(tree, jb.left()))
        }
        (Inner, FullOuter) => false,
        (Inner, _) => true,
        (Left | Semi | Anti | FullOuter, _) => false,
    }
}

/// Whether `(t1 a t2) b t3 == (t1 b t3) a t2`.
pub fn operators_are_left_asscom(tree: &RelationalTree, a: ExprId, b: ExprId) -> bool {
    let (ja, jb) = match join_pair(tree, a, b) {
        Some(pair) => pair,
        None => return true,
    };
    use JoinType::*;
    match (ja.join_type(), jb.join_type()) {
        (Left, FullOuter) => is_null_rejecting(tree, a, tables_in(tree, ja.left())),
        (Left, _) => true,
        (FullOuter, Left) => is_null_rejecting(tree, b, tables_in(tree, jb.right())),
        (FullOuter, FullOuter) => {
            is_null_rejecting(tree, a, tables_in(tree, ja.left()))
                && is_null_rejecting(tree, b, tables_in(tree, jb.left()))
        }
        (FullOuter, _) => false,
        (Inner | Semi | Anti, FullOuter) => false,
        (Inner | Semi | Anti, _) => true,
    }
}

/// Whether `t1 a (t2 b t3) == t2 b (t1 a t3)`.
pub fn operators_are_right_asscom(tree: &RelationalTree, a: ExprId, b: ExprId) -> bool {
    let (ja, jb) = match join_pair(tree, a, b) {
        Some(pair) => pair,
        None => return true,
    };
    use JoinType::*;
    match (ja.join_type(), jb.join_type()) {
        (FullOuter, FullOuter) => {
            is_null_rejecting(tree, a, tables_in(tree, ja.right()))
                && is_null_rejecting(tree, b, tables_in(tree, jb.right()))
        }
        (Inner, Inner) => true,
        _ => false,
    }
}

/// All join operators in the subtree rooted at `expr`, children before parents.
pub fn join_operators(
    tree: &RelationalTree,
    expr: ExprId,
) -> impl Iterator<Item = (ExprId, Join)> + '_ {
    tree.post_order(expr)
        .filter_map(move |id| tree.join(id).map(|join| (id, join)))
}

/// `used_nodes ∩ available_nodes`, or all of `available_nodes` if the two do not overlap.
pub fn intersect_if_not_degenerate(used_nodes: NodeMap, available_nodes: NodeMap) -> NodeMap {
    if overlaps(used_nodes, available_nodes) {
        used_nodes & available_nodes
    } else {
        available_nodes
    }
}

/// Grows the total eligibility set with every rule that is always active, and drops rules made
/// obsolete by it, until a fixed point is reached.
///
/// A rule is always active once its `activates` side overlaps the TES, so its `requires` side can
/// be added unconditionally. A rule whose `requires` side is already within the TES can never
/// block anything.
pub fn absorb_conflict_rules_into_tes(
    mut total_eligibility_set: NodeMap,
    conflict_rules: &mut ConflictRules,
) -> NodeMap {
    loop {
        let prev_total_eligibility_set = total_eligibility_set;
        for rule in conflict_rules.iter() {
            if overlaps(rule.activates, total_eligibility_set) {
                total_eligibility_set |= rule.requires;
            }
        }
        conflict_rules.retain(|rule| !is_subset(rule.requires, total_eligibility_set));
        if total_eligibility_set == prev_total_eligibility_set || conflict_rules.is_empty() {
            return total_eligibility_set;
        }
    }
}

/// Builds the hyperedge of the join `expr`, whose own conditions reference `used_nodes`.
///
/// Conflict rules that cannot be folded into the hyperedge are stored on `expr`. Children must
/// already have `nodes_in_subtree` and `conditions_used_nodes` set.
pub fn find_hyperedge_and_join_conflicts(
    tree: &mut RelationalTree,
    used_nodes: NodeMap,
    expr: ExprId,
    join: Join,
) -> Hyperedge {
    let mut conflict_rules = ConflictRules::new();
    let nodes = |tree: &RelationalTree, id: ExprId| tree[id].nodes_in_subtree;

    for (child, child_join) in join_operators(tree, join.left()) {
        let (child_left, child_right) = (child_join.left(), child_join.right());
        let used = tree[child].conditions_used_nodes;
        if !operators_are_associative(tree, child, expr) {
            // No node from the child's right side until everything its condition needs from the
            // left side is there.
            conflict_rules.push(ConflictRule {
                activates: nodes(tree, child_right),
                requires: intersect_if_not_degenerate(used, nodes(tree, child_left)),
            });
        }
        if !operators_are_left_asscom(tree, child, expr) {
            conflict_rules.push(ConflictRule {
                activates: nodes(tree, child_left),
                requires: intersect_if_not_degenerate(used, nodes(tree, child_right)),
            });
        }
    }

    for (child, child_join) in join_operators(tree, join.right()) {
        let (child_left, child_right) = (child_join.left(), child_join.right());
        let used = tree[child].conditions_used_nodes;
        if !operators_are_associative(tree, expr, child) {
            conflict_rules.push(ConflictRule {
                activates: nodes(tree, child_left),
                requires: intersect_if_not_degenerate(used, nodes(tree, child_right)),
            });
        }
        if !operators_are_right_asscom(tree, expr, child) {
            conflict_rules.push(ConflictRule {
                activates: nodes(tree, child_right),
                requires: intersect_if_not_degenerate(used, nodes(tree, child_left)),
            });
        }
    }

    for rule in &conflict_rules {
        trace!("Conflict rule on {}: {}", tree.generate_expression_label(expr), rule);
    }

    let mut total_eligibility_set = absorb_conflict_rules_into_tes(used_nodes, &mut conflict_rules);

    // Degenerate conditions and cartesian products; endpoints must not be empty.
    let (left_nodes, right_nodes) = (nodes(tree, join.left()), nodes(tree, join.right()));
    if !overlaps(total_eligibility_set, left_nodes) {
        total_eligibility_set |= left_nodes;
        total_eligibility_set =
            absorb_conflict_rules_into_tes(total_eligibility_set, &mut conflict_rules);
    }
    if !overlaps(total_eligibility_set, right_nodes) {
        total_eligibility_set |= right_nodes;
        total_eligibility_set =
            absorb_conflict_rules_into_tes(total_eligibility_set, &mut conflict_rules);
    }
    tree[expr].conflict_rules = conflict_rules;

    Hyperedge {
        left: total_eligibility_set & left_nodes,
        right: total_eligibility_set & right_nodes,
    }
}
