pub mod field;
pub mod registry;
pub mod relation;

pub use field::{ColumnModel, FieldCategory, ForeignKeyModel};
pub use registry::Registry;
pub use relation::{RelationKind, RelationModel};

use crate::{error::HydrateError, query::spec::QuerySpec, value::Row};

///
/// EntityModel
///
/// Minimal runtime model for one entity. Constructed as `&'static` data at
/// registration time and treated as read-only at query-compile time; field
/// resolution is a table lookup, never reflection.
///

#[derive(Debug, Eq, PartialEq)]
pub struct EntityModel {
    /// Stable external name used in registry keys and relation targets.
    pub entity_name: &'static str,
    /// Backing table named in the emitted IR.
    pub table: &'static str,
    /// Ordered field list (authoritative for projections).
    pub fields: &'static [ColumnModel],
    pub relations: &'static [RelationModel],
}

impl EntityModel {
    /// Look up a field by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnModel> {
        self.fields.iter().find(|column| column.name == name)
    }

    /// The primary-key field, if one is declared.
    #[must_use]
    pub fn primary_key(&self) -> Option<&ColumnModel> {
        self.fields.iter().find(|column| column.primary_key)
    }

    /// Look up a declared relation by name.
    #[must_use]
    pub fn relation(&self, name: &str) -> Option<&RelationModel> {
        self.relations.iter().find(|relation| relation.name == name)
    }

    /// Field names in declaration order.
    #[must_use]
    pub fn field_names(&self) -> Vec<String> {
        self.fields
            .iter()
            .map(|column| column.name.to_string())
            .collect()
    }
}

///
/// EntityKind
///
/// Implemented by typed records. `MODEL` is the finalized catalog entry;
/// `from_row` reconstructs one record from an engine row, ignoring columns
/// it does not know about (join payloads ride along in the same row).
///

pub trait EntityKind {
    const MODEL: &'static EntityModel;

    fn from_row(row: &Row) -> Result<Self, HydrateError>
    where
        Self: Sized;

    /// Fresh query specification for this entity.
    #[must_use]
    fn query() -> QuerySpec<Self>
    where
        Self: Sized,
    {
        QuerySpec::new()
    }
}
