use log::debug;
use prettytable::Table;

use crate::bit_utils::{NodeMap, MAX_BITMAP_BITS};
use crate::error::{OptError, OptResult};
use crate::expr::{
    concretize_multiple_equals, conditions_to_string, ConditionRewriter, DefaultConditionRewriter,
    ScalarExpr,
};
use crate::hypergraph::{
    find_sargable_predicates, find_tes_for_condition, make_join_graph_from_relational_expression,
    print_dotty_hypergraph, JoinHypergraph, Predicate,
};
use crate::join_list::{print_join_list, QueryBlock};
use crate::plan::{ExprId, RelationalTree};
use crate::rewrite::{
    canonicalize_join_conditions, concretize_all_multiple_equals, find_conditions_used_tables,
    make_hash_join_conditions, push_down_as_much_as_possible, push_down_join_conditions,
    rewrite_condition,
};
use crate::stat::{DefaultSelectivityEstimator, SelectivityEstimator};

/// Limits and switches for hypergraph construction.
#[derive(Clone, Debug)]
pub struct OptimizerContext {
    /// Maximum number of tables in one query block.
    pub max_tables: usize,
    /// Maximum number of WHERE predicates and table filters.
    pub max_predicates: usize,
    pub find_sargable_predicates: bool,
    /// Whether the trace lists which node each table became.
    pub trace_node_mappings: bool,
}

impl Default for OptimizerContext {
    fn default() -> Self {
        Self {
            max_tables: 61,
            max_predicates: 64,
            find_sargable_predicates: true,
            trace_node_mappings: false,
        }
    }
}

impl OptimizerContext {
    pub fn with_max_tables(mut self, max_tables: usize) -> Self {
        self.max_tables = max_tables;
        self
    }

    pub fn with_max_predicates(mut self, max_predicates: usize) -> Self {
        self.max_predicates = max_predicates;
        self
    }

    pub fn with_find_sargable_predicates(mut self, enabled: bool) -> Self {
        self.find_sargable_predicates = enabled;
        self
    }

    pub fn with_trace_node_mappings(mut self, enabled: bool) -> Self {
        self.trace_node_mappings = enabled;
        self
    }
}

/// Builds the join hypergraph of a query block.
///
/// ```
/// use join_hypergraph::expr::{DataType, ScalarExpr};
/// use join_hypergraph::join_list::{JoinListBuilder, QueryBlock};
/// use join_hypergraph::operator::TableScan;
/// use join_hypergraph::optimizer::{JoinHypergraphBuilder, OptimizerContext};
///
/// let x = |table, alias: &str| ScalarExpr::column(table, alias, "x", DataType::Int);
/// let join_list = JoinListBuilder::new(TableScan::new(0, "a"))
///     .left_join(TableScan::new(1, "b"), x(0, "a").eq(x(1, "b")))
///     .build();
/// let graph = JoinHypergraphBuilder::new(OptimizerContext::default())
///     .build(&QueryBlock::new(join_list), None)
///     .unwrap();
/// assert_eq!(2, graph.nodes.len());
/// assert_eq!(1, graph.edges.len());
/// ```
pub struct JoinHypergraphBuilder<'a> {
    context: OptimizerContext,
    rewriter: &'a dyn ConditionRewriter,
    estimator: &'a dyn SelectivityEstimator,
}

impl<'a> JoinHypergraphBuilder<'a> {
    pub fn new(context: OptimizerContext) -> Self {
        Self {
            context,
            rewriter: &DefaultConditionRewriter,
            estimator: &DefaultSelectivityEstimator,
        }
    }

    pub fn with_rewriter(mut self, rewriter: &'a dyn ConditionRewriter) -> Self {
        self.rewriter = rewriter;
        self
    }

    pub fn with_estimator(mut self, estimator: &'a dyn SelectivityEstimator) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn context(&self) -> &OptimizerContext {
        &self.context
    }

    /// Turns `query_block` into a join hypergraph.
    ///
    /// Join conditions and WHERE conditions are first pushed as far down the join tree as
    /// possible. Each join then becomes a hyperedge, and whatever could not be pushed into a
    /// join becomes a predicate. If `trace` is given, a human readable account of every step is
    /// appended to it.
    pub fn build(
        &self,
        query_block: &QueryBlock,
        mut trace: Option<&mut String>,
    ) -> OptResult<JoinHypergraph> {
        self.check_table_count(query_block)?;

        if let Some(trace) = trace.as_deref_mut() {
            trace.push_str("Join list after simplification:\n");
            trace.push_str(&print_join_list(&query_block.top_join_list, 0));
        }

        let mut tree = RelationalTree::from_join_list(&query_block.top_join_list);
        let root = tree.root();
        let mut where_conditions = query_block
            .where_cond
            .clone()
            .map(ScalarExpr::into_conjuncts)
            .unwrap_or_default();
        if let Some(trace) = trace.as_deref_mut() {
            trace.push_str(&format!(
                "\nMade this relational tree; WHERE condition is {}:\n",
                conditions_to_string(&where_conditions)
            ));
            trace.push_str(&tree.print(root, 2));
            trace.push_str("\nPushing conditions down.\n");
        }

        concretize_all_multiple_equals(&mut tree, root);
        push_down_join_conditions(&mut tree, root);
        concretize_multiple_equals(&mut where_conditions);
        let where_conditions =
            push_down_as_much_as_possible(&mut tree, where_conditions, root, false);
        canonicalize_join_conditions(&mut tree, root, self.rewriter)?;
        find_conditions_used_tables(&mut tree, root);
        make_hash_join_conditions(&mut tree, root);
        debug!(
            "Pushed down conditions, {} WHERE conditions remain",
            where_conditions.len()
        );

        if let Some(trace) = trace.as_deref_mut() {
            let table_filters: Vec<ScalarExpr> = tree
                .tables(root)
                .flat_map(|(id, _)| tree[id].table_filters.iter().cloned())
                .collect();
            trace.push_str(&format!(
                "\nAfter pushdown; remaining WHERE conditions are {}, table filters are {}:\n",
                conditions_to_string(&where_conditions),
                conditions_to_string(&table_filters)
            ));
            trace.push_str(&tree.print(root, 2));
            trace.push('\n');
        }

        let mut graph = JoinHypergraph::new(tree);
        make_join_graph_from_relational_expression(
            &mut graph,
            root,
            self.estimator,
            trace.as_deref_mut(),
        );
        debug!(
            "Made hypergraph with {} nodes and {} edges",
            graph.nodes.len(),
            graph.edges.len()
        );

        if let Some(trace) = trace.as_deref_mut() {
            trace.push_str(&format!(
                "\nConstructed hypergraph:\n{}\n",
                print_dotty_hypergraph(&graph)
            ));
            if self.context.trace_node_mappings {
                trace.push_str("Node mappings, for reference:\n");
                for (idx, node) in graph.nodes.iter().enumerate() {
                    trace.push_str(&format!("  R{} = {}\n", idx + 1, node.table.alias()));
                }
            }
            trace.push('\n');
        }

        for condition in where_conditions {
            let tes = find_tes_for_condition(&graph.tree, condition.used_tables(), root);
            let total_eligibility_set = graph.node_map_from_table_map(tes);
            if let Some(trace) = trace.as_deref_mut() {
                trace.push_str(&format!(
                    "Total eligibility set for {}: {{{}}}\n",
                    condition,
                    graph.node_aliases(total_eligibility_set)
                ));
            }
            self.add_predicate(
                &mut graph,
                condition,
                total_eligibility_set,
                trace.as_deref_mut(),
            )?;
        }

        let table_exprs: Vec<ExprId> = graph.tree.tables(root).map(|(id, _)| id).collect();
        for id in table_exprs {
            let node = graph.tree[id].nodes_in_subtree;
            let filters = graph.tree[id].table_filters.clone();
            for condition in filters {
                let total_eligibility_set =
                    graph.node_map_from_table_map(condition.used_tables()) | node;
                self.add_predicate(
                    &mut graph,
                    condition,
                    total_eligibility_set,
                    trace.as_deref_mut(),
                )?;
            }
        }

        // Predicates are referred to by bit in predicate bitmaps.
        let max_predicates = self.context.max_predicates.min(MAX_BITMAP_BITS);
        graph.num_where_predicates = graph.predicates.len();
        if graph.num_where_predicates > max_predicates {
            return Err(OptError::TooManyPredicates {
                found: graph.num_where_predicates,
                limit: max_predicates,
            });
        }

        if self.context.find_sargable_predicates {
            find_sargable_predicates(
                &mut graph,
                self.estimator,
                max_predicates,
                trace.as_deref_mut(),
            );
        }

        if let Some(trace) = trace.as_deref_mut() {
            trace.push_str(&predicate_table(&graph));
        }
        debug!(
            "Made {} predicates, {} of them from WHERE or table filters",
            graph.predicates.len(),
            graph.num_where_predicates
        );
        Ok(graph)
    }

    /// Table numbers index into table bitmaps, so the highest one decides.
    fn check_table_count(&self, query_block: &QueryBlock) -> OptResult<()> {
        let found = query_block
            .top_join_list
            .leaf_tables()
            .iter()
            .map(|table| table.table_id() + 1)
            .max()
            .unwrap_or(0);
        let limit = self.context.max_tables.min(MAX_BITMAP_BITS);
        if found > limit {
            return Err(OptError::TooManyTables { found, limit });
        }
        Ok(())
    }

    fn add_predicate(
        &self,
        graph: &mut JoinHypergraph,
        condition: ScalarExpr,
        total_eligibility_set: NodeMap,
        trace: Option<&mut String>,
    ) -> OptResult<()> {
        let condition = rewrite_condition(self.rewriter, condition)?;
        let selectivity = self.estimator.estimate(&condition, trace);
        graph.predicates.push(Predicate {
            condition,
            total_eligibility_set,
            selectivity,
        });
        Ok(())
    }
}

fn predicate_table(graph: &JoinHypergraph) -> String {
    let mut table = Table::new();
    table.set_titles(row!["#", "Condition", "TES", "Selectivity"]);
    for (idx, predicate) in graph.predicates.iter().enumerate() {
        let kind = if idx < graph.num_where_predicates {
            idx.to_string()
        } else {
            format!("{} (sargable)", idx)
        };
        let tes = graph.node_aliases(predicate.total_eligibility_set);
        let selectivity = format!("{:.3}", predicate.selectivity);
        table.add_row(row![kind, predicate.condition, tes, selectivity]);
    }
    table.to_string()
}

/// Builds the join hypergraph of `query_block` with default settings.
pub fn make_join_hypergraph(
    query_block: &QueryBlock,
    trace: Option<&mut String>,
) -> OptResult<JoinHypergraph> {
    JoinHypergraphBuilder::new(OptimizerContext::default()).build(query_block, trace)
}
