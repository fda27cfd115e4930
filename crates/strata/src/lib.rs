//! Query compiler and row-hydration layer for record-mapping runtimes:
//! filter trees with per-field lookup validation, arithmetic expression
//! trees, an immutable query-specification builder, a join/prefetch
//! planner, and the hydration engine that rebuilds typed object graphs
//! from whatever row shape the execution engine returns.
//!
//! The execution engine itself is an external collaborator behind the
//! [`session::ExecuteEngine`] capability; everything on this side of that
//! boundary is synchronous and pure.
#![warn(unreachable_pub)]

pub mod error;
pub mod hydrate;
pub mod model;
pub mod plan;
pub mod query;
pub mod session;
pub mod value;

#[cfg(test)]
pub(crate) mod test_fixtures;

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

///
/// Prelude
///
/// Domain vocabulary only; errors and internals stay behind their modules.
///

pub mod prelude {
    pub use crate::{
        hydrate::{Hydrated, RawResult, RelatedNode, RelationSlot},
        model::{
            ColumnModel, EntityKind, EntityModel, FieldCategory, ForeignKeyModel, Registry,
            RelationKind, RelationModel,
        },
        query::{AggregateSpec, Assign, Expression, Filter, QuerySpec, col},
        session::ExecuteEngine,
        value::{Row, RowExt, Value},
    };
}
