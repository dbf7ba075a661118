//! Join hypergraph construction.
//!
//! Every table of a query block becomes a node, and every join becomes a hyperedge between the
//! node sets that must be present on either side before the join may be applied. Join
//! enumeration (DPhyp) then only ever considers joins along these edges, so the edges encode all
//! reordering restrictions of outer joins, semijoins and antijoins.
//!
//! Filters that could not be pushed down into the tree become predicates, each with the set of
//! nodes that must be joined before it can be applied.

mod conflict;
pub use conflict::*;
mod dot;
pub use dot::*;
mod graph;
pub use graph::*;
mod join_graph;
pub use join_graph::*;
mod sargable;
pub use sargable::*;
mod tes;
pub use tes::*;
