use std::ops::{Index, IndexMut};

use itertools::Itertools;

use crate::bit_utils::{overlaps, NodeMap, TableMap};
use crate::expr::{conditions_to_string, ScalarExpr};
use crate::hypergraph::ConflictRules;
use crate::join_list::{JoinList, JoinListItem, NestKind, NestedJoin};
use crate::operator::{Join, JoinType, RelationalOperator, TableScan};

/// Index of a [`RelationalExpression`] in its [`RelationalTree`].
pub type ExprId = usize;

/// One node in a join tree.
///
/// The tree is built once per query block, then mutated in place by predicate pushdown,
/// canonicalization and equi-join classification before it is turned into a hypergraph. After
/// that it is only kept around for diagnostics.
#[derive(Clone, Debug)]
pub struct RelationalExpression {
    pub operator: RelationalOperator,
    pub tables_in_subtree: TableMap,
    /// Same as `tables_in_subtree`, but in hypergraph node numbering. Only valid after nodes
    /// have been assigned.
    pub nodes_in_subtree: NodeMap,
    /// Join conditions that are not equijoin conditions.
    pub join_conditions: Vec<ScalarExpr>,
    /// Equalities usable as hash join keys; filled in by equi-join classification.
    pub equijoin_conditions: Vec<ScalarExpr>,
    /// Tables referenced by `join_conditions` before classification.
    pub conditions_used_tables: TableMap,
    pub conditions_used_nodes: NodeMap,
    /// Conflict rules that could not be folded into this join's hyperedge and must be checked
    /// when the join is applied.
    pub conflict_rules: ConflictRules,
    /// Table only: join conditions that could be evaluated as index lookups on this table.
    pub join_conditions_pushable_to_this: Vec<ScalarExpr>,
    /// Table only: filters evaluable on this table alone.
    pub table_filters: Vec<ScalarExpr>,
}

impl RelationalExpression {
    fn new(operator: RelationalOperator, tables_in_subtree: TableMap) -> Self {
        Self {
            operator,
            tables_in_subtree,
            nodes_in_subtree: 0,
            join_conditions: vec![],
            equijoin_conditions: vec![],
            conditions_used_tables: 0,
            conditions_used_nodes: 0,
            conflict_rules: ConflictRules::new(),
            join_conditions_pushable_to_this: vec![],
            table_filters: vec![],
        }
    }

    pub fn join(&self) -> Option<Join> {
        self.operator.as_join().copied()
    }

    pub fn join_type(&self) -> Option<JoinType> {
        self.join().map(|j| j.join_type())
    }

    pub fn table(&self) -> Option<&TableScan> {
        self.operator.as_table()
    }

    /// Equijoin conditions followed by the remaining join conditions.
    pub fn all_join_conditions(&self) -> impl Iterator<Item = &ScalarExpr> {
        self.equijoin_conditions
            .iter()
            .chain(self.join_conditions.iter())
    }

    /// Union of the tables referenced by all join conditions.
    pub fn join_conditions_used_tables(&self) -> TableMap {
        self.all_join_conditions()
            .fold(0, |acc, c| acc | c.used_tables())
    }
}

/// Arena of [`RelationalExpression`]s forming a binary join tree.
#[derive(Clone, Debug, Default)]
pub struct RelationalTree {
    exprs: Vec<RelationalExpression>,
    root: ExprId,
}

/// Post order iterator over a subtree: left child, right child, then the node itself.
pub struct PostOrderIter<'a> {
    tree: &'a RelationalTree,
    stack: Vec<(ExprId, bool)>,
}

impl<'a> Iterator for PostOrderIter<'a> {
    type Item = ExprId;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((id, expanded)) = self.stack.pop() {
            if expanded {
                return Some(id);
            }
            self.stack.push((id, true));
            if let Some(join) = self.tree.join(id) {
                self.stack.push((join.right(), false));
                self.stack.push((join.left(), false));
            }
        }
        None
    }
}

impl RelationalTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the join tree for a join list. Each entry after the first is joined to everything
    /// before it, so the result is a left-deep spine with nested joins on the right.
    pub fn from_join_list(join_list: &JoinList) -> Self {
        let mut tree = Self::new();
        tree.root = tree.add_join_list(join_list);
        tree
    }

    fn add_join_list(&mut self, join_list: &JoinList) -> ExprId {
        // The list goes backwards.
        let (first, rest) = match join_list.entries().split_last() {
            Some(split) => split,
            None => unreachable!("join lists are never empty"),
        };
        let mut ret = self.add_join_list_item(&first.item);
        for entry in rest.iter().rev() {
            let (join_type, right) = match &entry.item {
                JoinListItem::Nest(NestedJoin {
                    kind: NestKind::Semijoin,
                    join_list,
                }) => (JoinType::Semi, self.add_join_list(join_list)),
                JoinListItem::Nest(NestedJoin {
                    kind: NestKind::Antijoin,
                    join_list,
                }) => (JoinType::Anti, self.add_join_list(join_list)),
                item if entry.outer_join => (JoinType::Left, self.add_join_list_item(item)),
                item => (JoinType::Inner, self.add_join_list_item(item)),
            };
            let join_conditions = entry
                .join_cond
                .clone()
                .map(ScalarExpr::into_conjuncts)
                .unwrap_or_default();
            ret = self.add_join(join_type, ret, right, join_conditions);
        }
        ret
    }

    fn add_join_list_item(&mut self, item: &JoinListItem) -> ExprId {
        match item {
            JoinListItem::Table(table) => self.add_table(table.clone()),
            JoinListItem::Nest(nest) => self.add_join_list(&nest.join_list),
        }
    }

    /// Adds a table leaf and makes it the root.
    pub fn add_table(&mut self, table: TableScan) -> ExprId {
        let tables = table.table_map();
        self.push(RelationalExpression::new(
            RelationalOperator::Table(table),
            tables,
        ))
    }

    /// Adds a join of two existing subtrees and makes it the root.
    pub fn add_join(
        &mut self,
        join_type: JoinType,
        left: ExprId,
        right: ExprId,
        join_conditions: Vec<ScalarExpr>,
    ) -> ExprId {
        let (left_tables, right_tables) = (
            self.exprs[left].tables_in_subtree,
            self.exprs[right].tables_in_subtree,
        );
        debug_assert!(
            !overlaps(left_tables, right_tables),
            "join children must not share tables"
        );
        let mut expr = RelationalExpression::new(
            RelationalOperator::Join(Join::new(join_type, left, right)),
            left_tables | right_tables,
        );
        expr.join_conditions = join_conditions;
        self.push(expr)
    }

    fn push(&mut self, expr: RelationalExpression) -> ExprId {
        self.exprs.push(expr);
        self.root = self.exprs.len() - 1;
        self.root
    }

    pub fn set_root(&mut self, root: ExprId) {
        self.root = root;
    }

    pub fn root(&self) -> ExprId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }

    pub fn join(&self, id: ExprId) -> Option<Join> {
        self.exprs[id].join()
    }

    pub fn post_order(&self, id: ExprId) -> PostOrderIter<'_> {
        PostOrderIter {
            tree: self,
            stack: vec![(id, false)],
        }
    }

    /// Table leaves of the subtree rooted at `id`, left to right.
    pub fn tables(&self, id: ExprId) -> impl Iterator<Item = (ExprId, &TableScan)> + '_ {
        self.post_order(id)
            .filter_map(move |e| self.exprs[e].table().map(|t| (e, t)))
    }

    /// Indented, one line per node rendering of the subtree.
    pub fn print(&self, id: ExprId, level: usize) -> String {
        let expr = &self.exprs[id];
        let mut result = " ".repeat(level * 2);
        let join = match &expr.operator {
            RelationalOperator::Table(table) => {
                result.push_str(&format!("* {}\n", table.alias()));
                return result;
            }
            RelationalOperator::Join(join) => join,
        };

        result.push_str(&format!("* {}", join.join_type()));
        match (
            expr.equijoin_conditions.is_empty(),
            expr.join_conditions.is_empty(),
        ) {
            (true, true) => result.push_str(" (no join conditions)"),
            (false, true) => result.push_str(&format!(
                " (equijoin condition = {})",
                conditions_to_string(&expr.equijoin_conditions)
            )),
            (true, false) => result.push_str(&format!(
                " (extra join condition = {})",
                conditions_to_string(&expr.join_conditions)
            )),
            (false, false) => result.push_str(&format!(
                " (equijoin condition = {}, extra = {})",
                conditions_to_string(&expr.equijoin_conditions),
                conditions_to_string(&expr.join_conditions)
            )),
        }
        result.push('\n');

        result.push_str(&self.print(join.left(), level + 1));
        result.push_str(&self.print(join.right(), level + 1));
        result
    }

    /// Short label of a join, e.g. `⟕ (t1.x = t2.x)`, or `×` for a cartesian product.
    pub fn generate_expression_label(&self, id: ExprId) -> String {
        let expr = &self.exprs[id];
        let conditions = expr.all_join_conditions().join(" and ");
        match (expr.join_type(), conditions.is_empty()) {
            (None, _) => expr.table().map(|t| t.alias().to_string()).unwrap_or_default(),
            (Some(JoinType::Inner), true) => "×".to_string(),
            (Some(JoinType::Inner), false) => conditions,
            (Some(join_type), true) => join_type.symbol().to_string(),
            (Some(join_type), false) => format!("{} {}", join_type.symbol(), conditions),
        }
    }
}

impl Index<ExprId> for RelationalTree {
    type Output = RelationalExpression;

    fn index(&self, id: ExprId) -> &Self::Output {
        &self.exprs[id]
    }
}

impl IndexMut<ExprId> for RelationalTree {
    fn index_mut(&mut self, id: ExprId) -> &mut Self::Output {
        &mut self.exprs[id]
    }
}
