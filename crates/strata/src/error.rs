use thiserror::Error as ThisError;

///
/// FieldError
///
/// A field or relation segment named in a query does not exist, or exists
/// with the wrong shape for the way it was used.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum FieldError {
    #[error("entity '{entity}' is not registered")]
    UnknownEntity { entity: String },

    #[error("entity '{entity}' has no field '{field}'")]
    UnknownField { entity: String, field: String },

    #[error("field '{field}' on entity '{entity}' is not a foreign key; cannot traverse through it")]
    NotAForeignKey { entity: String, field: String },

    #[error("entity '{entity}' has no relation '{name}'")]
    NotARelation { entity: String, name: String },
}

///
/// LookupError
///
/// The lookup suffix itself is unknown or not legal for the field's
/// type category. Value-shape problems are `LookupValueError` instead.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum LookupError {
    #[error("lookup '{lookup}' is not supported for field '{field}'")]
    Unsupported { field: String, lookup: String },

    #[error("lookup key '{key}' has an empty field name")]
    EmptyField { key: String },
}

///
/// LookupValueError
///
/// The lookup is legal for the field, but the supplied value has the wrong
/// shape, type, or range. Raised at build time, never at execution time.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error("invalid value for lookup '{lookup}' on field '{field}': {reason}")]
pub struct LookupValueError {
    pub field: String,
    pub lookup: String,
    pub reason: String,
}

impl LookupValueError {
    pub(crate) fn new(
        field: impl Into<String>,
        lookup: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            lookup: lookup.into(),
            reason: reason.into(),
        }
    }
}

///
/// ManagerError
///
/// Contract violations at the manager/query surface: single-row operations
/// that did not find exactly one row, data-requiring operations called with
/// no data, and registry lifecycle misuse.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum ManagerError {
    #[error("expected exactly one row, found none")]
    NotFound,

    #[error("expected exactly one row, found {count}")]
    MultipleRows { count: usize },

    #[error("update requires at least one assignment")]
    EmptyUpdate,

    #[error("flat value mode requires exactly one selected column, got {count}")]
    FlatWidth { count: usize },

    #[error("entity '{entity}' is already registered with a different model")]
    DuplicateEntity { entity: String },

    #[error("registry finalize failed; unresolved forward references: {names}")]
    UnresolvedReferences { names: String },

    #[error("registry is not finalized; register all entities, then call finalize()")]
    NotFinalized,
}

///
/// HydrateError
///
/// A row returned by the engine cannot be reconstructed into a typed
/// record or relation. Hydration fails loudly rather than leaving a
/// relation silently unset.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum HydrateError {
    #[error("row is missing column '{column}'")]
    MissingColumn { column: String },

    #[error("column '{column}' holds an unexpected type; expected {expected}")]
    ColumnType {
        column: String,
        expected: &'static str,
    },

    #[error("columnar result row has {got} values for {want} columns")]
    ColumnarWidth { got: usize, want: usize },

    #[error("relation '{relation}' payload is malformed: {reason}")]
    RelationPayload { relation: String, reason: String },

    #[error("node holds entity '{actual}', cannot decode as '{requested}'")]
    EntityMismatch {
        actual: &'static str,
        requested: &'static str,
    },
}

///
/// EngineError
///
/// Opaque failure raised by the execution capability. Propagated unchanged;
/// this layer performs no retry and no recovery.
///

#[derive(Debug, ThisError)]
#[error(transparent)]
pub struct EngineError(Box<dyn std::error::Error + Send + Sync>);

impl EngineError {
    pub fn new(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self(source.into())
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self(message.into().into())
    }
}

///
/// Error
///
/// Umbrella error for the query layer. The individual kinds stay public so
/// callers can catch a `LookupValueError` separately from a `LookupError`.
///

#[derive(Debug, ThisError)]
pub enum Error {
    #[error(transparent)]
    Field(#[from] FieldError),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    LookupValue(#[from] LookupValueError),

    #[error(transparent)]
    Manager(#[from] ManagerError),

    #[error(transparent)]
    Hydrate(#[from] HydrateError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}
