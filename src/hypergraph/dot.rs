use petgraph::dot::Dot;
use petgraph::graph::{EdgeReference, Graph, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::bit_utils::bits_set_in;
use crate::hypergraph::JoinHypergraph;

fn edge_label(graph: &JoinHypergraph, edge_idx: usize) -> String {
    let expr = graph.edges[edge_idx].expr;
    let mut label = graph.tree.generate_expression_label(expr);
    for rule in &graph.tree[expr].conflict_rules {
        label.push_str(&format!(
            " [conflict rule: {{{}}} -> {{{}}}]",
            graph.node_aliases(rule.activates),
            graph.node_aliases(rule.requires)
        ));
    }
    label
}

/// Renders the hypergraph in Graphviz format.
///
/// Simple edges are drawn as plain edges. Hyperedges go through an unlabeled point-like node,
/// from every node on their left side into it and from it to every node on their right side.
pub fn print_dotty_hypergraph(graph: &JoinHypergraph) -> String {
    let mut dot: Graph<String, String> = Graph::new();
    let node_indexes: Vec<NodeIndex> = graph
        .nodes
        .iter()
        .map(|node| dot.add_node(node.table.alias().to_string()))
        .collect();

    for (edge_idx, edge) in graph.graph.edges.iter().step_by(2).enumerate() {
        let label = edge_label(graph, edge_idx);
        if edge.is_simple() {
            for (left, right) in bits_set_in(edge.left).zip(bits_set_in(edge.right)) {
                dot.add_edge(node_indexes[left], node_indexes[right], label.clone());
            }
            continue;
        }

        let virtual_node = dot.add_node(String::new());
        for left in bits_set_in(edge.left) {
            dot.add_edge(node_indexes[left], virtual_node, String::new());
        }
        for (i, right) in bits_set_in(edge.right).enumerate() {
            let label = if i == 0 { label.clone() } else { String::new() };
            dot.add_edge(virtual_node, node_indexes[right], label);
        }
    }

    let edge_attributes = |g: &Graph<String, String>, e: EdgeReference<'_, String>| {
        if g[e.target()].is_empty() {
            "arrowhead = none".to_string()
        } else {
            String::new()
        }
    };
    let node_attributes = |_: &Graph<String, String>, (_, name): (NodeIndex, &String)| {
        if name.is_empty() {
            "shape = circle, width = .001, height = .001".to_string()
        } else {
            String::new()
        }
    };
    format!(
        "{}",
        Dot::with_attr_getters(&dot, &[], &edge_attributes, &node_attributes)
    )
}
