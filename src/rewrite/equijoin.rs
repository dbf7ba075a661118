use crate::bit_utils::{overlaps, TableMap};
use crate::expr::ScalarExpr;
use crate::plan::{ExprId, RelationalTree};

/// Records on every join under `expr` the tables its join conditions reference.
pub fn find_conditions_used_tables(tree: &mut RelationalTree, expr: ExprId) {
    let joins: Vec<ExprId> = tree
        .post_order(expr)
        .filter(|id| tree.join(*id).is_some())
        .collect();
    for id in joins {
        let node = &mut tree[id];
        // Equi-join classification has not run yet.
        debug_assert!(node.equijoin_conditions.is_empty());
        node.conditions_used_tables = node
            .join_conditions
            .iter()
            .fold(0, |acc, c| acc | c.used_tables());
    }
}

/// Whether `condition` can be used as a hash join key between `left_tables` and `right_tables`:
/// an equality referencing both sides, comparing a single column pair.
pub fn is_hash_join_condition(
    condition: &ScalarExpr,
    left_tables: TableMap,
    right_tables: TableMap,
) -> bool {
    let used_tables = condition.used_tables();
    condition.is_equality()
        && overlaps(used_tables, left_tables)
        && overlaps(used_tables, right_tables)
        && condition.child_comparator_count() < 2
}

/// Moves hash-joinable join conditions of every join under `expr` into
/// `equijoin_conditions`. Row value equalities over more than one column stay as extra
/// conditions.
pub fn make_hash_join_conditions(tree: &mut RelationalTree, expr: ExprId) {
    let join = match tree.join(expr) {
        Some(join) => join,
        None => return,
    };
    let left_tables = tree[join.left()].tables_in_subtree;
    let right_tables = tree[join.right()].tables_in_subtree;

    let node = &mut tree[expr];
    if !node.join_conditions.is_empty() {
        debug_assert!(node.equijoin_conditions.is_empty());
        let (equijoin, extra): (Vec<_>, Vec<_>) = std::mem::take(&mut node.join_conditions)
            .into_iter()
            .partition(|c| is_hash_join_condition(c, left_tables, right_tables));
        node.equijoin_conditions = equijoin;
        node.join_conditions = extra;
    }
    make_hash_join_conditions(tree, join.left());
    make_hash_join_conditions(tree, join.right());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::tests::{col, int};
    use crate::operator::JoinType;
    use crate::plan::tests::t;

    #[test]
    fn test_classification() {
        let mut tree = RelationalTree::new();
        let (a, b) = (tree.add_table(t(0)), tree.add_table(t(1)));
        let row_eq = ScalarExpr::RowEq {
            left: vec![col(0, "x"), col(0, "y")],
            right: vec![col(1, "x"), col(1, "y")],
        };
        let single_row_eq = ScalarExpr::RowEq {
            left: vec![col(0, "z")],
            right: vec![col(1, "z")],
        };
        let root = tree.add_join(
            JoinType::Inner,
            a,
            b,
            vec![
                col(0, "x").eq(col(1, "x")),
                col(0, "y").lt(col(1, "y")),
                row_eq.clone(),
                single_row_eq.clone(),
                col(0, "w").null_safe_eq(col(1, "w")),
                ScalarExpr::literal(false),
            ],
        );
        find_conditions_used_tables(&mut tree, root);
        assert_eq!(0b11, tree[root].conditions_used_tables);

        make_hash_join_conditions(&mut tree, root);
        assert_eq!(
            vec![col(0, "x").eq(col(1, "x")), single_row_eq],
            tree[root].equijoin_conditions
        );
        assert_eq!(
            vec![
                col(0, "y").lt(col(1, "y")),
                row_eq,
                col(0, "w").null_safe_eq(col(1, "w")),
                ScalarExpr::literal(false),
            ],
            tree[root].join_conditions
        );
    }

    #[test]
    fn test_degenerate_equality_is_not_a_hash_key() {
        assert!(!is_hash_join_condition(&col(0, "x").eq(int(1)), 0b01, 0b10));
        assert!(!is_hash_join_condition(&col(0, "x").eq(col(2, "x")), 0b01, 0b10));
        assert!(is_hash_join_condition(&col(0, "x").eq(col(1, "x")), 0b01, 0b10));
    }

    #[test]
    fn test_classification_recurses() {
        let mut tree = RelationalTree::new();
        let (a, b, c) = (tree.add_table(t(0)), tree.add_table(t(1)), tree.add_table(t(2)));
        let ab = tree.add_join(JoinType::Inner, a, b, vec![col(0, "x").eq(col(1, "x"))]);
        let root = tree.add_join(JoinType::Left, ab, c, vec![col(1, "y").eq(col(2, "y"))]);
        make_hash_join_conditions(&mut tree, root);
        assert_eq!(1, tree[ab].equijoin_conditions.len());
        assert_eq!(1, tree[root].equijoin_conditions.len());
        assert!(tree[ab].join_conditions.is_empty());
    }
}
