use crate::bit_utils::{bits_set_in, find_lowest_bit_set, is_single_bit_set, overlaps, NodeMap};

/// An edge between two disjoint, non-empty node sets. Edges between single nodes are called
/// simple edges, all others complex edges.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct Hyperedge {
    pub left: NodeMap,
    pub right: NodeMap,
}

impl Hyperedge {
    pub fn is_simple(&self) -> bool {
        is_single_bit_set(self.left) && is_single_bit_set(self.right)
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct HypergraphNode {
    /// Nodes reachable through a simple edge.
    pub simple_neighborhood: NodeMap,
    /// Indexes into [`Hypergraph::edges`] of the simple edges starting at this node.
    pub simple_edges: Vec<usize>,
    /// Indexes into [`Hypergraph::edges`] of the complex edges whose left side contains this
    /// node.
    pub complex_edges: Vec<usize>,
}

/// Adjacency structure consumed by subgraph enumeration.
///
/// Every edge is stored twice: `(left, right)` at index `2i` and `(right, left)` at `2i + 1`, so
/// that enumeration can always follow edges from left to right.
#[derive(Clone, Debug, Default)]
pub struct Hypergraph {
    pub nodes: Vec<HypergraphNode>,
    pub edges: Vec<Hyperedge>,
}

impl Hypergraph {
    pub fn add_node(&mut self) -> usize {
        self.nodes.push(HypergraphNode::default());
        self.nodes.len() - 1
    }

    pub fn add_edge(&mut self, left: NodeMap, right: NodeMap) {
        debug_assert!(left != 0 && right != 0, "hyperedge endpoints must not be empty");
        debug_assert!(!overlaps(left, right), "hyperedge endpoints must be disjoint");

        let edge_idx = self.edges.len();
        self.edges.push(Hyperedge { left, right });
        self.edges.push(Hyperedge {
            left: right,
            right: left,
        });

        if is_single_bit_set(left) && is_single_bit_set(right) {
            let (left_node, right_node) = (find_lowest_bit_set(left), find_lowest_bit_set(right));
            self.nodes[left_node].simple_neighborhood |= right;
            self.nodes[right_node].simple_neighborhood |= left;
            self.nodes[left_node].simple_edges.push(edge_idx);
            self.nodes[right_node].simple_edges.push(edge_idx + 1);
        } else {
            for node in bits_set_in(left) {
                self.nodes[node].complex_edges.push(edge_idx);
            }
            for node in bits_set_in(right) {
                self.nodes[node].complex_edges.push(edge_idx + 1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_edge() {
        let mut graph = Hypergraph::default();
        for _ in 0..3 {
            graph.add_node();
        }
        graph.add_edge(0b001, 0b100);

        assert_eq!(2, graph.edges.len());
        assert_eq!(
            Hyperedge {
                left: 0b100,
                right: 0b001
            },
            graph.edges[1]
        );
        assert_eq!(0b100, graph.nodes[0].simple_neighborhood);
        assert_eq!(0b001, graph.nodes[2].simple_neighborhood);
        assert_eq!(vec![0], graph.nodes[0].simple_edges);
        assert_eq!(vec![1], graph.nodes[2].simple_edges);
        assert!(graph.nodes[1].simple_edges.is_empty());
    }

    #[test]
    fn test_complex_edge() {
        let mut graph = Hypergraph::default();
        for _ in 0..3 {
            graph.add_node();
        }
        graph.add_edge(0b001, 0b010);
        graph.add_edge(0b011, 0b100);

        assert!(graph.edges[0].is_simple());
        assert!(!graph.edges[2].is_simple());
        assert_eq!(vec![2], graph.nodes[0].complex_edges);
        assert_eq!(vec![2], graph.nodes[1].complex_edges);
        assert_eq!(vec![3], graph.nodes[2].complex_edges);
        assert_eq!(0, graph.nodes[2].simple_neighborhood);
    }
}
