use enumset::{enum_set, EnumSet, EnumSetType};
use strum_macros::{Display, EnumIter};

use crate::plan::ExprId;

/// Kind of a binary join.
#[derive(Debug, Hash, EnumSetType, EnumIter, Display)]
pub enum JoinType {
    #[strum(serialize = "Inner join")]
    Inner,
    #[strum(serialize = "Left join")]
    Left,
    #[strum(serialize = "Semijoin")]
    Semi,
    #[strum(serialize = "Antijoin")]
    Anti,
    #[strum(serialize = "Full outer join")]
    FullOuter,
}

/// Joins through which any condition may be pushed into either side.
pub const INNER_LIKE_JOINS: EnumSet<JoinType> = enum_set!(JoinType::Inner | JoinType::Semi);

/// Joins that may NULL-complement or drop rows, so outside filters can not be promoted to their
/// join conditions.
pub const OUTER_LIKE_JOINS: EnumSet<JoinType> =
    enum_set!(JoinType::Left | JoinType::Anti | JoinType::FullOuter);

impl JoinType {
    pub fn is_inner_like(self) -> bool {
        INNER_LIKE_JOINS.contains(self)
    }

    pub fn is_outer_like(self) -> bool {
        OUTER_LIKE_JOINS.contains(self)
    }

    /// Symbol used in expression labels.
    pub fn symbol(self) -> &'static str {
        match self {
            JoinType::Inner => "⋈",
            JoinType::Left => "⟕",
            JoinType::Semi => "⋉",
            JoinType::Anti => "▷",
            JoinType::FullOuter => "⟗",
        }
    }
}

/// Logical join operator. Children are addressed by their index in the owning tree.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct Join {
    join_type: JoinType,
    left: ExprId,
    right: ExprId,
}

impl Join {
    pub fn new(join_type: JoinType, left: ExprId, right: ExprId) -> Self {
        Self {
            join_type,
            left,
            right,
        }
    }

    pub fn join_type(&self) -> JoinType {
        self.join_type
    }

    pub fn left(&self) -> ExprId {
        self.left
    }

    pub fn right(&self) -> ExprId {
        self.right
    }
}
