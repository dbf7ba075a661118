use log::trace;

use crate::bit_utils::{is_single_bit_set, overlaps, table_bitmap};
use crate::expr::{ColumnRef, CompareOp, ScalarExpr};
use crate::hypergraph::{JoinHypergraph, Predicate};
use crate::stat::SelectivityEstimator;

/// An equality `field = other_side` that could be evaluated as an index lookup on `field`'s
/// table, with `other_side` as the lookup key.
#[derive(Clone, Debug, PartialEq)]
pub struct SargablePredicate {
    /// Index into [`JoinHypergraph::predicates`].
    pub predicate_index: usize,
    pub field: ColumnRef,
    pub other_side: ScalarExpr,
}

/// Registers `condition` on the nodes of every column it compares for equality with something
/// that does not depend on that column's table. With `force_node`, only that node is considered.
fn possibly_add_sargable_condition(
    graph: &mut JoinHypergraph,
    condition: &ScalarExpr,
    force_node: Option<usize>,
    predicate_index: usize,
    mut trace: Option<&mut String>,
) {
    let (left, right) = match condition {
        ScalarExpr::Compare {
            op: CompareOp::Eq,
            left,
            right,
        } => (left.as_ref(), right.as_ref()),
        _ => return,
    };

    for (field_side, other_side) in [(left, right), (right, left)] {
        let field = match field_side.as_column() {
            Some(field) => field,
            None => continue,
        };
        let node_idx = match graph.table_num_to_node_num.get(&field.table) {
            Some(node_idx) => *node_idx,
            None => continue,
        };
        if force_node.map_or(false, |forced| forced != node_idx) {
            continue;
        }
        if overlaps(other_side.used_tables(), table_bitmap(field.table)) {
            continue;
        }

        let node = &mut graph.nodes[node_idx];
        let duplicate = node
            .sargable_predicates
            .iter()
            .any(|p| p.predicate_index == predicate_index && p.field == *field);
        if duplicate {
            continue;
        }
        node.sargable_predicates.push(SargablePredicate {
            predicate_index,
            field: field.clone(),
            other_side: other_side.clone(),
        });
        trace!("Sargable condition {} on {}", condition, node.table.alias());
        if let Some(trace) = trace.as_deref_mut() {
            trace.push_str(&format!("Found sargable condition {}\n", condition));
        }
    }
}

/// Finds predicates that could be evaluated as index lookups.
///
/// WHERE predicates and table filters are candidates if they can be applied at a single node.
/// Join conditions that were pushed down to a table for this purpose are added as extra
/// predicates first, so that the lookup can refer to them by index; they never act as filters
/// on their own. Discovery stops adding predicates once `max_predicates` is reached.
pub fn find_sargable_predicates(
    graph: &mut JoinHypergraph,
    estimator: &dyn SelectivityEstimator,
    max_predicates: usize,
    mut trace: Option<&mut String>,
) {
    for idx in 0..graph.num_where_predicates {
        let predicate = &graph.predicates[idx];
        if is_single_bit_set(predicate.total_eligibility_set) {
            let condition = predicate.condition.clone();
            possibly_add_sargable_condition(graph, &condition, None, idx, trace.as_deref_mut());
        }
    }

    for node_idx in 0..graph.nodes.len() {
        let conditions = graph.nodes[node_idx].join_conditions_pushable_to_this.clone();
        for condition in conditions {
            let predicate_index = match graph.sargable_join_predicate(&condition) {
                Some(idx) => idx,
                None => {
                    if graph.predicates.len() >= max_predicates {
                        trace!("Too many predicates, skipping sargable {}", condition);
                        continue;
                    }
                    let idx = graph.predicates.len();
                    let total_eligibility_set =
                        graph.node_map_from_table_map(condition.used_tables());
                    let selectivity = estimator.estimate(&condition, trace.as_deref_mut());
                    graph.predicates.push(Predicate {
                        condition: condition.clone(),
                        total_eligibility_set,
                        selectivity,
                    });
                    graph.sargable_join_predicates.push((condition.clone(), idx));
                    idx
                }
            };
            possibly_add_sargable_condition(
                graph,
                &condition,
                Some(node_idx),
                predicate_index,
                trace.as_deref_mut(),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::tests::{col, int};
    use crate::hypergraph::Node;
    use crate::plan::RelationalTree;
    use crate::plan::tests::t;
    use crate::stat::DefaultSelectivityEstimator;

    fn two_nodes() -> JoinHypergraph {
        let mut graph = JoinHypergraph::new(RelationalTree::new());
        for id in 0..2 {
            let node = graph.graph.add_node();
            graph.table_num_to_node_num.insert(id, node);
            graph.nodes.push(Node {
                table: t(id),
                join_conditions_pushable_to_this: vec![],
                sargable_predicates: vec![],
            });
        }
        graph
    }

    fn where_predicate(condition: ScalarExpr, total_eligibility_set: u64) -> Predicate {
        Predicate {
            condition,
            total_eligibility_set,
            selectivity: 0.1,
        }
    }

    #[test]
    fn test_where_predicates() {
        let mut graph = two_nodes();
        graph.predicates = vec![
            where_predicate(col(0, "x").eq(int(3)), 0b01),
            where_predicate(col(1, "y").lt(int(3)), 0b10),
            where_predicate(col(0, "x").eq(col(1, "x")), 0b11),
            where_predicate(int(3).eq(col(1, "z")), 0b10),
            where_predicate(col(1, "a").eq(col(1, "b")), 0b10),
        ];
        graph.num_where_predicates = graph.predicates.len();
        find_sargable_predicates(&mut graph, &DefaultSelectivityEstimator, 64, None);

        assert_eq!(
            vec![SargablePredicate {
                predicate_index: 0,
                field: col(0, "x").as_column().unwrap().clone(),
                other_side: int(3),
            }],
            graph.nodes[0].sargable_predicates
        );
        let indexes: Vec<usize> = graph.nodes[1]
            .sargable_predicates
            .iter()
            .map(|p| p.predicate_index)
            .collect();
        assert_eq!(vec![3], indexes);
    }

    #[test]
    fn test_join_conditions_share_one_predicate() {
        let mut graph = two_nodes();
        let cond = col(0, "x").eq(col(1, "x"));
        graph.nodes[0].join_conditions_pushable_to_this = vec![cond.clone()];
        graph.nodes[1].join_conditions_pushable_to_this = vec![cond.clone()];
        let mut trace = String::new();
        find_sargable_predicates(&mut graph, &DefaultSelectivityEstimator, 64, Some(&mut trace));

        assert_eq!(1, graph.predicates.len());
        assert_eq!(0b11, graph.predicates[0].total_eligibility_set);
        assert_eq!(Some(0), graph.sargable_join_predicate(&cond));
        assert_eq!(col(1, "x"), graph.nodes[0].sargable_predicates[0].other_side);
        assert_eq!(col(0, "x"), graph.nodes[1].sargable_predicates[0].other_side);
        assert!(trace.contains("Found sargable condition (t0.x = t1.x)"));
    }

    #[test]
    fn test_stops_at_capacity() {
        let mut graph = two_nodes();
        graph.nodes[0].join_conditions_pushable_to_this = vec![col(0, "x").eq(col(1, "x"))];
        graph.predicates = vec![where_predicate(col(0, "y").gt(int(1)), 0b01)];
        graph.num_where_predicates = 1;
        find_sargable_predicates(&mut graph, &DefaultSelectivityEstimator, 1, None);
        assert_eq!(1, graph.predicates.len());
        assert!(graph.nodes[0].sargable_predicates.is_empty());
    }

    #[test]
    fn test_known_conditions_registered_after_capacity() {
        let mut graph = two_nodes();
        let (first, second) = (col(0, "x").eq(col(1, "x")), col(0, "y").eq(col(1, "y")));
        graph.nodes[0].join_conditions_pushable_to_this = vec![first.clone(), second.clone()];
        graph.nodes[1].join_conditions_pushable_to_this = vec![second.clone(), first.clone()];
        find_sargable_predicates(&mut graph, &DefaultSelectivityEstimator, 1, None);

        assert_eq!(1, graph.predicates.len());
        assert_eq!(None, graph.sargable_join_predicate(&second));
        // `second` is skipped on both nodes, `first` still reaches the second node.
        assert_eq!(
            vec![SargablePredicate {
                predicate_index: 0,
                field: col(1, "x").as_column().unwrap().clone(),
                other_side: col(0, "x"),
            }],
            graph.nodes[1].sargable_predicates
        );
    }
}
