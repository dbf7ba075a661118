//! Join lists as produced by query simplification.
//!
//! A join list is the flattened FROM clause of a query block: an ordered list of tables and
//! nested joins, each optionally carrying the condition of the join that attaches it to
//! everything before it. Like the parser output it mirrors, the list is stored in reverse order,
//! i.e. the last entry is the leftmost table.

use itertools::Itertools;

use crate::expr::ScalarExpr;
use crate::operator::TableScan;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NestKind {
    /// Parenthesized join, e.g. `t1 LEFT JOIN (t2 JOIN t3)`.
    Plain,
    /// Semijoin nest created from `IN`/`EXISTS` subqueries.
    Semijoin,
    /// Antijoin nest created from `NOT IN`/`NOT EXISTS` subqueries.
    Antijoin,
}

#[derive(Clone, Debug)]
pub struct NestedJoin {
    pub kind: NestKind,
    pub join_list: JoinList,
}

#[derive(Clone, Debug)]
pub enum JoinListItem {
    Table(TableScan),
    Nest(NestedJoin),
}

impl From<TableScan> for JoinListItem {
    fn from(table: TableScan) -> Self {
        JoinListItem::Table(table)
    }
}

/// A plain nested join.
impl From<JoinList> for JoinListItem {
    fn from(join_list: JoinList) -> Self {
        JoinListItem::Nest(NestedJoin {
            kind: NestKind::Plain,
            join_list,
        })
    }
}

/// One entry of a join list.
#[derive(Clone, Debug)]
pub struct TableList {
    pub item: JoinListItem,
    pub join_cond: Option<ScalarExpr>,
    pub outer_join: bool,
}

impl TableList {
    pub fn is_sj_or_aj_nest(&self) -> bool {
        matches!(
            &self.item,
            JoinListItem::Nest(NestedJoin {
                kind: NestKind::Semijoin | NestKind::Antijoin,
                ..
            })
        )
    }

    /// Display name of the entry; nests have no alias of their own.
    pub fn alias(&self) -> String {
        match &self.item {
            JoinListItem::Table(t) => t.alias().to_string(),
            JoinListItem::Nest(n) => match n.kind {
                NestKind::Plain => "(nest)".to_string(),
                NestKind::Semijoin => "(sj-nest)".to_string(),
                NestKind::Antijoin => "(aj-nest)".to_string(),
            },
        }
    }
}

/// A non-empty, reverse-ordered join list. Built with [`JoinListBuilder`].
#[derive(Clone, Debug)]
pub struct JoinList {
    entries: Vec<TableList>,
}

impl JoinList {
    /// Entries in stored (reverse) order.
    pub fn entries(&self) -> &[TableList] {
        &self.entries
    }

    /// All base tables below this list, ordered by table id.
    pub fn leaf_tables(&self) -> Vec<&TableScan> {
        let mut tables = vec![];
        self.collect_leaf_tables(&mut tables);
        tables.into_iter().sorted_by_key(|t| t.table_id()).collect()
    }

    fn collect_leaf_tables<'a>(&'a self, tables: &mut Vec<&'a TableScan>) {
        for entry in &self.entries {
            match &entry.item {
                JoinListItem::Table(t) => tables.push(t),
                JoinListItem::Nest(n) => n.join_list.collect_leaf_tables(tables),
            }
        }
    }
}

/// Builds a join list from left to right, the way the FROM clause reads.
///
/// ```
/// use join_hypergraph::join_list::JoinListBuilder;
/// use join_hypergraph::operator::TableScan;
///
/// let list = JoinListBuilder::new(TableScan::new(0, "t1"))
///     .inner_join(TableScan::new(1, "t2"), None)
///     .build();
/// assert_eq!("t1", list.entries()[1].alias());
/// ```
pub struct JoinListBuilder {
    entries: Vec<TableList>,
}

impl JoinListBuilder {
    pub fn new<I: Into<JoinListItem>>(first: I) -> Self {
        Self {
            entries: vec![TableList {
                item: first.into(),
                join_cond: None,
                outer_join: false,
            }],
        }
    }

    fn add(mut self, item: JoinListItem, join_cond: Option<ScalarExpr>, outer_join: bool) -> Self {
        self.entries.push(TableList {
            item,
            join_cond,
            outer_join,
        });
        self
    }

    /// Inner join with `item`; a missing condition makes it a cartesian product.
    pub fn inner_join<I: Into<JoinListItem>>(self, item: I, cond: Option<ScalarExpr>) -> Self {
        self.add(item.into(), cond, false)
    }

    pub fn left_join<I: Into<JoinListItem>>(self, item: I, cond: ScalarExpr) -> Self {
        self.add(item.into(), Some(cond), true)
    }

    pub fn semi_join(self, join_list: JoinList, cond: ScalarExpr) -> Self {
        let nest = NestedJoin {
            kind: NestKind::Semijoin,
            join_list,
        };
        self.add(JoinListItem::Nest(nest), Some(cond), false)
    }

    pub fn anti_join(self, join_list: JoinList, cond: ScalarExpr) -> Self {
        let nest = NestedJoin {
            kind: NestKind::Antijoin,
            join_list,
        };
        self.add(JoinListItem::Nest(nest), Some(cond), false)
    }

    pub fn build(mut self) -> JoinList {
        self.entries.reverse();
        JoinList {
            entries: self.entries,
        }
    }
}

/// One line per entry, nested entries indented below their nest.
pub fn print_join_list(join_list: &JoinList, level: usize) -> String {
    let mut result = String::new();
    for entry in join_list.entries() {
        result.push_str(&" ".repeat(level * 2));
        let join_type = if entry.outer_join { "left" } else { "inner" };
        match &entry.join_cond {
            Some(cond) => result.push_str(&format!(
                "* {} {}  join_type={}\n",
                entry.alias(),
                cond,
                join_type
            )),
            None => result.push_str(&format!("* {}  join_type={}\n", entry.alias(), join_type)),
        }
        if let JoinListItem::Nest(nest) = &entry.item {
            result.push_str(&print_join_list(&nest.join_list, level + 1));
        }
    }
    result
}

/// The parts of a query block the hypergraph is built from.
#[derive(Clone, Debug)]
pub struct QueryBlock {
    pub top_join_list: JoinList,
    pub where_cond: Option<ScalarExpr>,
}

impl QueryBlock {
    pub fn new(top_join_list: JoinList) -> Self {
        Self {
            top_join_list,
            where_cond: None,
        }
    }

    pub fn with_where(mut self, where_cond: ScalarExpr) -> Self {
        self.where_cond = Some(where_cond);
        self
    }
}
