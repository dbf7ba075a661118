use log::debug;

use crate::error::{OptError, OptResult};
use crate::expr::{concretize_multiple_equals, ConditionRewriter, ScalarExpr};
use crate::plan::{ExprId, RelationalTree};

/// Replaces multiple equalities in the join conditions of every join under `expr` by plain
/// equalities. A join whose conditions contradict each other ends up with the single condition
/// `FALSE`.
pub fn concretize_all_multiple_equals(tree: &mut RelationalTree, expr: ExprId) {
    let joins: Vec<ExprId> = tree
        .post_order(expr)
        .filter(|id| tree.join(*id).is_some())
        .collect();
    for id in joins {
        // Equi-join classification has not run yet.
        debug_assert!(tree[id].equijoin_conditions.is_empty());
        concretize_multiple_equals(&mut tree[id].join_conditions);
    }
}

/// Runs `rewriter` on one condition, attaching the condition to any failure.
pub fn rewrite_condition(
    rewriter: &dyn ConditionRewriter,
    condition: ScalarExpr,
) -> OptResult<ScalarExpr> {
    let text = condition.to_string();
    rewriter
        .rewrite(condition)
        .map_err(|source| OptError::Rewrite {
            condition: text,
            source,
        })
}

fn rewrite_all(
    rewriter: &dyn ConditionRewriter,
    conditions: &mut Vec<ScalarExpr>,
) -> OptResult<()> {
    let rewritten = std::mem::take(conditions)
        .into_iter()
        .map(|c| rewrite_condition(rewriter, c))
        .collect::<OptResult<Vec<_>>>()?;
    *conditions = rewritten;
    Ok(())
}

/// Runs `rewriter` on every join condition under `expr`, children before parents, as well as on
/// the conditions registered for index lookups on tables.
///
/// Other table filters and WHERE predicates are rewritten once they have become predicates of
/// the hypergraph.
pub fn canonicalize_join_conditions(
    tree: &mut RelationalTree,
    expr: ExprId,
    rewriter: &dyn ConditionRewriter,
) -> OptResult<()> {
    let ids: Vec<ExprId> = tree.post_order(expr).collect();
    for id in ids {
        let node = &mut tree[id];
        if node.join().is_some() {
            debug_assert!(node.equijoin_conditions.is_empty());
            rewrite_all(rewriter, &mut node.join_conditions)?;
        } else {
            rewrite_all(rewriter, &mut node.join_conditions_pushable_to_this)?;
        }
    }
    debug!("Canonicalized join conditions below {}", tree.generate_expression_label(expr));
    Ok(())
}

#[cfg(test)]
mod tests {
    use anyhow::bail;

    use super::*;
    use crate::expr::tests::{col, int};
    use crate::expr::{DataType, DefaultConditionRewriter};
    use crate::operator::JoinType;
    use crate::plan::tests::t;

    struct FailingRewriter;

    impl ConditionRewriter for FailingRewriter {
        fn rewrite(&self, condition: ScalarExpr) -> anyhow::Result<ScalarExpr> {
            if condition.used_tables() == 0b11 {
                bail!("out of memory");
            }
            Ok(condition)
        }
    }

    #[test]
    fn test_concretize_nested_joins() {
        let mut tree = RelationalTree::new();
        let (a, b, c) = (tree.add_table(t(0)), tree.add_table(t(1)), tree.add_table(t(2)));
        let bc = tree.add_join(
            JoinType::Inner,
            b,
            c,
            vec![ScalarExpr::MultipleEqual(vec![col(1, "x"), col(2, "x")])],
        );
        let root = tree.add_join(
            JoinType::Left,
            a,
            bc,
            vec![ScalarExpr::MultipleEqual(vec![col(0, "y"), int(1), int(2)])],
        );
        concretize_all_multiple_equals(&mut tree, root);
        assert_eq!(vec![col(1, "x").eq(col(2, "x"))], tree[bc].join_conditions);
        assert_eq!(vec![ScalarExpr::literal(false)], tree[root].join_conditions);
    }

    #[test]
    fn test_canonicalize_inserts_casts() {
        let mut tree = RelationalTree::new();
        let (a, b) = (tree.add_table(t(0)), tree.add_table(t(1)));
        let double = ScalarExpr::column(1, "t1", "d", DataType::Double);
        let root = tree.add_join(JoinType::Inner, a, b, vec![col(0, "x").eq(double)]);
        canonicalize_join_conditions(&mut tree, root, &DefaultConditionRewriter).unwrap();
        assert_eq!(
            "(cast(t0.x as double) = t1.d)",
            tree[root].join_conditions[0].to_string()
        );
    }

    #[test]
    fn test_rewrite_failure_aborts() {
        let mut tree = RelationalTree::new();
        let (a, b) = (tree.add_table(t(0)), tree.add_table(t(1)));
        let root = tree.add_join(JoinType::Inner, a, b, vec![col(0, "x").eq(col(1, "x"))]);
        let err = canonicalize_join_conditions(&mut tree, root, &FailingRewriter).unwrap_err();
        assert!(matches!(err, OptError::Rewrite { ref condition, .. } if condition == "(t0.x = t1.x)"));
    }
}
