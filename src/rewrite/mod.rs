//! Passes that rewrite a [`RelationalTree`](crate::plan::RelationalTree) in place before it is
//! turned into a hypergraph.
//!
//! Earlier stages hoist conditions as far up as possible, usually all the way to WHERE. These
//! passes push them back down as far as join semantics allow, replace multiple equalities by
//! plain ones, run the final condition rewrite and split join conditions into hash join keys and
//! extra conditions.

mod canonicalize;
pub use canonicalize::*;
mod equijoin;
pub use equijoin::*;
mod pushdown;
pub use pushdown::*;
