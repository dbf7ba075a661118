use std::collections::HashMap;

use crate::bit_utils::{bits_set_in, table_bitmap, NodeMap, TableMap};
use crate::expr::{ScalarExpr, TableId};
use crate::hypergraph::{find_hyperedge_and_join_conflicts, Hypergraph, SargablePredicate};
use crate::operator::TableScan;
use crate::plan::{ExprId, RelationalTree};
use crate::stat::SelectivityEstimator;

/// A table in the join hypergraph.
#[derive(Clone, Debug)]
pub struct Node {
    pub table: TableScan,
    /// Join conditions that could be evaluated as index lookups on this table.
    pub join_conditions_pushable_to_this: Vec<ScalarExpr>,
    /// Filled in by sargable predicate discovery.
    pub sargable_predicates: Vec<SargablePredicate>,
}

/// The join behind a hyperedge. Edge `i` of this list corresponds to the hypergraph edges `2i`
/// and `2i + 1`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JoinPredicate {
    pub expr: ExprId,
    pub selectivity: f64,
}

/// A filter to be applied as soon as all nodes in its total eligibility set are joined.
#[derive(Clone, Debug, PartialEq)]
pub struct Predicate {
    pub condition: ScalarExpr,
    pub total_eligibility_set: NodeMap,
    pub selectivity: f64,
}

/// Join hypergraph of one query block, as consumed by join enumeration.
///
/// The relational tree it was built from stays owned by the graph, since every edge refers to a
/// join in it.
#[derive(Clone, Debug, Default)]
pub struct JoinHypergraph {
    pub graph: Hypergraph,
    pub nodes: Vec<Node>,
    pub edges: Vec<JoinPredicate>,
    /// WHERE predicates first, then table filters, then predicates added for sargable join
    /// conditions.
    pub predicates: Vec<Predicate>,
    /// Number of leading entries of `predicates` that came from WHERE or table filters.
    pub num_where_predicates: usize,
    /// Join conditions registered as sargable, with their index in `predicates`.
    pub sargable_join_predicates: Vec<(ScalarExpr, usize)>,
    pub table_num_to_node_num: HashMap<TableId, usize>,
    pub tree: RelationalTree,
}

impl JoinHypergraph {
    pub fn new(tree: RelationalTree) -> Self {
        Self {
            tree,
            ..Default::default()
        }
    }

    /// Translates a set of tables into the set of their nodes. Tables without a node are ignored.
    pub fn node_map_from_table_map(&self, tables: TableMap) -> NodeMap {
        bits_set_in(tables)
            .filter_map(|table| self.table_num_to_node_num.get(&table))
            .fold(0, |acc, node| acc | table_bitmap(*node))
    }

    /// Comma separated aliases of `nodes`.
    pub fn node_aliases(&self, nodes: NodeMap) -> String {
        bits_set_in(nodes)
            .filter_map(|node| self.nodes.get(node))
            .map(|node| node.table.alias())
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn sargable_join_predicate(&self, condition: &ScalarExpr) -> Option<usize> {
        self.sargable_join_predicates
            .iter()
            .find(|(c, _)| c == condition)
            .map(|(_, idx)| *idx)
    }
}

fn add_table_node(graph: &mut JoinHypergraph, expr: ExprId) {
    let table = match graph.tree[expr].table() {
        Some(table) => table.clone(),
        None => return,
    };
    let node_idx = graph.graph.add_node();
    graph.table_num_to_node_num.insert(table.table_id(), node_idx);
    let pushable = graph.tree[expr].join_conditions_pushable_to_this.clone();
    graph.nodes.push(Node {
        table,
        join_conditions_pushable_to_this: pushable,
        sargable_predicates: vec![],
    });
    graph.tree[expr].nodes_in_subtree = table_bitmap(node_idx);
}

/// Adds nodes for all tables under `expr` and one hyperedge for every join, children first.
///
/// Nodes are numbered in the order tables are met, left to right.
pub fn make_join_graph_from_relational_expression(
    graph: &mut JoinHypergraph,
    expr: ExprId,
    estimator: &dyn SelectivityEstimator,
    mut trace: Option<&mut String>,
) {
    let join = match graph.tree.join(expr) {
        Some(join) => join,
        None => {
            add_table_node(graph, expr);
            return;
        }
    };

    for child in [join.left(), join.right()] {
        make_join_graph_from_relational_expression(graph, child, estimator, trace.as_deref_mut());
    }

    let nodes_in_subtree =
        graph.tree[join.left()].nodes_in_subtree | graph.tree[join.right()].nodes_in_subtree;
    let used_nodes = graph.node_map_from_table_map(graph.tree[expr].join_conditions_used_tables());
    let conditions_used_nodes =
        graph.node_map_from_table_map(graph.tree[expr].conditions_used_tables);
    {
        let node = &mut graph.tree[expr];
        node.nodes_in_subtree = nodes_in_subtree;
        node.conditions_used_nodes = conditions_used_nodes;
    }

    let edge = find_hyperedge_and_join_conflicts(&mut graph.tree, used_nodes, expr, join);
    graph.graph.add_edge(edge.left, edge.right);

    if let Some(trace) = trace.as_deref_mut() {
        trace.push_str(&format!(
            "Selectivity of join {}:\n",
            graph.tree.generate_expression_label(expr)
        ));
    }
    let mut selectivity = 1.0;
    let mut num_conditions = 0;
    for condition in graph.tree[expr].all_join_conditions() {
        selectivity *= estimator.estimate(condition, trace.as_deref_mut());
        num_conditions += 1;
    }
    if num_conditions > 1 {
        if let Some(trace) = trace.as_deref_mut() {
            trace.push_str(&format!("  - total: {:.3}\n", selectivity));
        }
    }
    graph.edges.push(JoinPredicate { expr, selectivity });
}
