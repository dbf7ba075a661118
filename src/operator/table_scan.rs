use crate::bit_utils::{table_bitmap, TableMap};
use crate::expr::TableId;

/// A base table in the join tree.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct TableScan {
    table_id: TableId,
    alias: String,
}

impl TableScan {
    pub fn new<S: Into<String>>(table_id: TableId, alias: S) -> Self {
        Self {
            table_id,
            alias: alias.into(),
        }
    }

    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn table_map(&self) -> TableMap {
        table_bitmap(self.table_id)
    }
}
