use anyhow::bail;
use join_hypergraph::bit_utils::{is_subset, overlaps};
use join_hypergraph::error::OptError;
use join_hypergraph::expr::{ConditionRewriter, DataType, ScalarExpr};
use join_hypergraph::hypergraph::{Hyperedge, JoinHypergraph};
use join_hypergraph::join_list::{JoinListBuilder, QueryBlock};
use join_hypergraph::operator::TableScan;
use join_hypergraph::optimizer::{make_join_hypergraph, JoinHypergraphBuilder, OptimizerContext};

fn t(id: usize) -> TableScan {
    TableScan::new(id, format!("t{}", id))
}

fn col(table: usize, name: &str) -> ScalarExpr {
    ScalarExpr::column(table, format!("t{}", table), name, DataType::Int)
}

fn int(v: i64) -> ScalarExpr {
    ScalarExpr::literal(v)
}

/// Edges in one direction only, sorted.
fn simple_edges(graph: &JoinHypergraph) -> Vec<(u64, u64)> {
    let mut edges: Vec<(u64, u64)> = graph
        .graph
        .edges
        .iter()
        .step_by(2)
        .map(|e| (e.left.min(e.right), e.left.max(e.right)))
        .collect();
    edges.sort_unstable();
    edges
}

#[test]
fn test_inner_join_pushdown() {
    // SELECT ... FROM t0 JOIN t1 WHERE t0.x = t1.x AND t1.y = 3
    let join_list = JoinListBuilder::new(t(0)).inner_join(t(1), None).build();
    let query_block = QueryBlock::new(join_list).with_where(ScalarExpr::and(vec![
        col(0, "x").eq(col(1, "x")),
        col(1, "y").eq(int(3)),
    ]));
    let graph = make_join_hypergraph(&query_block, None).unwrap();

    assert_eq!(2, graph.nodes.len());
    let root = graph.tree.root();
    assert_eq!(
        vec![col(0, "x").eq(col(1, "x"))],
        graph.tree[root].equijoin_conditions
    );
    assert!(graph.tree[root].join_conditions.is_empty());

    // No residual WHERE predicate, only the table filter.
    assert_eq!(1, graph.num_where_predicates);
    assert_eq!(col(1, "y").eq(int(3)), graph.predicates[0].condition);
    assert_eq!(0b10, graph.predicates[0].total_eligibility_set);
    assert_eq!(
        vec![Hyperedge {
            left: 0b01,
            right: 0b10
        }],
        graph.graph.edges.iter().step_by(2).copied().collect::<Vec<_>>()
    );
}

#[test]
fn test_left_join_below_inner_join() {
    // t0 LEFT JOIN t1 ON t0.x = t1.x JOIN t2 ON t1.y = t2.y
    let join_list = JoinListBuilder::new(t(0))
        .left_join(t(1), col(0, "x").eq(col(1, "x")))
        .inner_join(t(2), Some(col(1, "y").eq(col(2, "y"))))
        .build();
    let graph = make_join_hypergraph(&QueryBlock::new(join_list), None).unwrap();

    assert_eq!(
        Hyperedge {
            left: 0b001,
            right: 0b010
        },
        graph.graph.edges[0]
    );
    // t1 JOIN t2 may not happen before the left join, since that would drop the
    // NULL-complemented rows of t1.
    assert_eq!(
        Hyperedge {
            left: 0b011,
            right: 0b100
        },
        graph.graph.edges[2]
    );
}

#[test]
fn test_inner_joins_associate() {
    let c1 = || col(0, "x").eq(col(1, "x"));
    let c2 = || col(1, "y").eq(col(2, "y"));

    // (t0 JOIN t1) JOIN t2
    let left_deep = JoinListBuilder::new(t(0))
        .inner_join(t(1), Some(c1()))
        .inner_join(t(2), Some(c2()))
        .build();
    // t0 JOIN (t1 JOIN t2)
    let nest = JoinListBuilder::new(t(1)).inner_join(t(2), Some(c2())).build();
    let right_deep = JoinListBuilder::new(t(0)).inner_join(nest, Some(c1())).build();

    let a = make_join_hypergraph(&QueryBlock::new(left_deep), None).unwrap();
    let b = make_join_hypergraph(&QueryBlock::new(right_deep), None).unwrap();
    assert_eq!(vec![(0b001, 0b010), (0b010, 0b100)], simple_edges(&a));
    assert_eq!(simple_edges(&a), simple_edges(&b));
    assert!(a.graph.edges.iter().all(Hyperedge::is_simple));
}

#[test]
fn test_tes_contains_ses() {
    // t0 LEFT JOIN t1 ON t0.x = t1.x WHERE t1.y IS NULL AND t0.z = t1.z AND t0.w = 1
    let join_list = JoinListBuilder::new(t(0))
        .left_join(t(1), col(0, "x").eq(col(1, "x")))
        .build();
    let query_block = QueryBlock::new(join_list).with_where(ScalarExpr::and(vec![
        col(1, "y").is_null(),
        col(0, "z").eq(col(1, "z")),
        col(0, "w").eq(int(1)),
    ]));
    let graph = make_join_hypergraph(&query_block, None).unwrap();

    for predicate in &graph.predicates {
        let ses = graph.node_map_from_table_map(predicate.condition.used_tables());
        assert!(is_subset(ses, predicate.total_eligibility_set));
    }
    // Neither condition on t1 may be applied before the left join.
    assert_eq!(col(1, "y").is_null(), graph.predicates[0].condition);
    assert_eq!(0b11, graph.predicates[0].total_eligibility_set);
    assert_eq!(0b11, graph.predicates[1].total_eligibility_set);
    assert_eq!(col(0, "w").eq(int(1)), graph.predicates[2].condition);
    assert_eq!(0b01, graph.predicates[2].total_eligibility_set);
    assert_eq!(3, graph.num_where_predicates);
}

#[test]
fn test_subtrees_are_disjoint() {
    let nest = JoinListBuilder::new(t(2)).inner_join(t(3), None).build();
    let sub = JoinListBuilder::new(t(4)).build();
    let join_list = JoinListBuilder::new(t(0))
        .inner_join(t(1), Some(col(0, "x").eq(col(1, "x"))))
        .left_join(nest, col(1, "y").eq(col(2, "y")))
        .semi_join(sub, col(3, "z").eq(col(4, "z")))
        .build();
    let graph = make_join_hypergraph(&QueryBlock::new(join_list), None).unwrap();

    assert_eq!(5, graph.nodes.len());
    assert_eq!(4, graph.edges.len());
    for edge in &graph.edges {
        let join = graph.tree.join(edge.expr).unwrap();
        let left = &graph.tree[join.left()];
        let right = &graph.tree[join.right()];
        assert!(!overlaps(left.tables_in_subtree, right.tables_in_subtree));
        assert!(!overlaps(left.nodes_in_subtree, right.nodes_in_subtree));
    }
    for edge in &graph.graph.edges {
        assert!(edge.left != 0 && edge.right != 0);
        assert!(!overlaps(edge.left, edge.right));
    }
}

#[test]
fn test_trace_contains_dot() {
    let join_list = JoinListBuilder::new(t(0))
        .left_join(t(1), col(0, "x").eq(col(1, "x")))
        .build();
    let mut trace = String::new();
    make_join_hypergraph(&QueryBlock::new(join_list), Some(&mut trace)).unwrap();
    assert!(trace.contains("digraph"));
    assert!(trace.contains("⟕ (t0.x = t1.x)"));
}

#[test]
fn test_too_many_predicates() {
    let join_list = JoinListBuilder::new(t(0)).build();
    let where_cond = ScalarExpr::and(
        (0..65)
            .map(|i| col(0, &format!("c{}", i)).eq(int(i)))
            .collect(),
    );
    let query_block = QueryBlock::new(join_list).with_where(where_cond);
    let err = make_join_hypergraph(&query_block, None).unwrap_err();
    assert!(matches!(
        err,
        OptError::TooManyPredicates {
            found: 65,
            limit: 64
        }
    ));
}

#[test]
fn test_too_many_tables() {
    let join_list = JoinListBuilder::new(t(0))
        .inner_join(t(1), None)
        .inner_join(t(2), None)
        .build();
    let ctx = OptimizerContext::default().with_max_tables(2);
    let err = JoinHypergraphBuilder::new(ctx)
        .build(&QueryBlock::new(join_list), None)
        .unwrap_err();
    assert!(matches!(
        err,
        OptError::TooManyTables { found: 3, limit: 2 }
    ));
}

struct RejectingRewriter;

impl ConditionRewriter for RejectingRewriter {
    fn rewrite(&self, _condition: ScalarExpr) -> anyhow::Result<ScalarExpr> {
        bail!("cannot rewrite")
    }
}

#[test]
fn test_rewrite_failure() {
    let join_list = JoinListBuilder::new(t(0))
        .inner_join(t(1), Some(col(0, "x").eq(col(1, "x"))))
        .build();
    let err = JoinHypergraphBuilder::new(OptimizerContext::default())
        .with_rewriter(&RejectingRewriter)
        .build(&QueryBlock::new(join_list), None)
        .unwrap_err();
    assert!(matches!(err, OptError::Rewrite { .. }));
    assert_eq!("failed to rewrite condition (t0.x = t1.x)", err.to_string());
}
