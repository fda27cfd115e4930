///
/// ColumnModel
///
/// Runtime field metadata used by lookup validation, path traversal, and
/// hydration. Built once at registration; immutable after finalization.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ColumnModel {
    /// Field name as used in filter keys and projections.
    pub name: &'static str,
    /// Lookup category deciding which lookup suffixes are legal.
    pub category: FieldCategory,
    pub nullable: bool,
    pub primary_key: bool,
    /// Present when this field references another entity.
    pub foreign_key: Option<ForeignKeyModel>,
}

///
/// FieldCategory
///
/// Lossy projection of the storage type onto the lookup system. Only the
/// category matters for deciding which lookups a field accepts.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldCategory {
    Text,
    Numeric,
    DateTime,
    Bool,
    Generic,
}

///
/// ForeignKeyModel
///
/// Target of a foreign-key field: which entity, which field on it, and the
/// column name the join condition binds on.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ForeignKeyModel {
    pub target_entity: &'static str,
    pub target_field: &'static str,
    pub join_column: &'static str,
}
