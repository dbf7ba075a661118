//! Relational operators appearing in a join tree.

use enum_as_inner::EnumAsInner;

mod join;
pub use join::*;
mod table_scan;
pub use table_scan::*;

/// Operator of one node in a [`RelationalTree`](crate::plan::RelationalTree).
#[derive(Clone, Debug, EnumAsInner)]
pub enum RelationalOperator {
    Table(TableScan),
    Join(Join),
}
