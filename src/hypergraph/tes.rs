use crate::bit_utils::{overlaps, TableMap};
use crate::operator::JoinType;
use crate::plan::{ExprId, RelationalTree};

/// Finds the total eligibility set (TES) of a condition with syntactic eligibility set (SES)
/// `used_tables`, i.e. all tables that must be joined in before the condition may be evaluated.
///
/// The TES always contains the SES, but may be larger. Given `a LEFT JOIN b`, the condition
/// `b.x IS NULL` has SES `{b}` but TES `{a, b}`, since joining in `a` may produce NULLs for `b`.
/// For `a JOIN b` the TES would be `{b}`.
///
/// The result is in table numbering.
pub fn find_tes_for_condition(
    tree: &RelationalTree,
    used_tables: TableMap,
    expr: ExprId,
) -> TableMap {
    let (join, node) = match tree.join(expr) {
        Some(join) => (join, &tree[expr]),
        None => return used_tables,
    };
    let left_tables = tree[join.left()].tables_in_subtree;
    let right_tables = tree[join.right()].tables_in_subtree;

    let mut tes = used_tables;
    if overlaps(used_tables, left_tables) {
        tes |= find_tes_for_condition(tree, used_tables, join.left());
    }
    if overlaps(used_tables, right_tables) {
        tes |= find_tes_for_condition(tree, used_tables, join.right());
        if matches!(join.join_type(), JoinType::Left | JoinType::Anti) {
            // The join may NULL-complement or remove rows of the right side, so wait until it
            // has happened, i.e. until everything its conditions reference is present.
            tes |= node.join_conditions_used_tables();

            // Degenerate conditions only referencing the right side; require the entire left
            // side so the condition is never pushed into the right side.
            if !overlaps(tes, left_tables) {
                tes |= left_tables;
            }
        }
    }
    tes
}
