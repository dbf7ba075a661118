//! ## Background
//!
//! A cost based optimizer has to decide in which order the tables of a query are joined. For
//! inner joins any order is valid, but outer joins, semijoins and antijoins only commute with
//! each other under certain conditions. Enumerating orders on the join tree directly and checking
//! every candidate is expensive, so instead the query is turned into a hypergraph once: tables
//! become nodes, and each join becomes a hyperedge connecting the node sets that must be present
//! on either side before the join may be applied. A graph based enumeration algorithm such as
//! DPhyp [1] then only produces valid join orders by construction.
//!
//! Constructing the hyperedges for non-inner joins is done with the conflict detection algorithm
//! CD-C from [2]. Conflicts that can not be expressed as a plain hyperedge are kept as conflict
//! rules on the join.
//!
//! ## Design
//!
//! Hypergraph construction runs once per query block and consists of the following steps:
//!
//! 1. The query block's join list is turned into a binary [`plan::RelationalTree`].
//! 2. Join conditions and WHERE conditions are pushed as far down the tree as possible, see
//!    [`rewrite`]. Conditions that end up on a single table become table filters, conditions that
//!    could be used for index lookups are recorded on their tables.
//! 3. Join conditions are canonicalized and split into equijoin and extra conditions.
//! 4. Every table becomes a node and every join a hyperedge, see [`hypergraph`].
//! 5. Conditions left over become predicates, each with the set of nodes that must be joined
//!    before it can be applied.
//!
//! The entry point is [`optimizer::JoinHypergraphBuilder`].
//!
//! ## Reference
//!
//! 1. Moerkotte, G. and Neumann, T., 2008. Dynamic programming strikes back. In Proceedings of the
//! 2008 ACM SIGMOD international conference on Management of data (pp. 539-552).
//! 2. Moerkotte, G., Fender, P. and Eich, M., 2013. On the correct and complete enumeration of the
//! core search space. In Proceedings of the 2013 ACM SIGMOD International Conference on
//! Management of Data (pp. 493-504).

#[macro_use]
extern crate prettytable;
#[macro_use]
extern crate lazy_static;

pub mod bit_utils;
pub mod error;
pub mod expr;
pub mod hypergraph;
pub mod join_list;
pub mod operator;
pub mod optimizer;
pub mod plan;
pub mod rewrite;
pub mod stat;
