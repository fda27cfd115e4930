use crate::{
    error::{Error, FieldError},
    model::{EntityModel, Registry},
};
use serde::Serialize;

///
/// JoinSpec
///
/// One eager join derived from a relation path. The alias equals the path,
/// so distinct filter branches naming the same path share one alias by
/// construction.
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct JoinSpec {
    pub path: String,
    pub alias: String,
    pub source_column: String,
    pub target_entity: &'static str,
    pub target_table: String,
    /// Target columns requested from the joined entity.
    pub columns: Vec<String>,
    /// Path of the join this one hangs off, for nested joins.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_path: Option<String>,
}

impl JoinSpec {
    /// Number of path segments; hydration orders specs shallowest-first.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.path.split("__").count()
    }

    /// Final path segment: the relation name the hydrated node attaches under.
    #[must_use]
    pub fn attr_name(&self) -> &str {
        self.path.rsplit("__").next().unwrap_or(&self.path)
    }
}

///
/// JoinMap
///
/// Insertion-ordered join collection, deduplicated by path across the whole
/// query (filter traversal and explicit `join` calls feed the same map).
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct JoinMap {
    specs: Vec<JoinSpec>,
}

impl JoinMap {
    #[must_use]
    pub const fn new() -> Self {
        Self { specs: Vec::new() }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    #[must_use]
    pub fn specs(&self) -> &[JoinSpec] {
        &self.specs
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.specs.iter().any(|spec| spec.path == path)
    }

    /// Insert unless a spec for the same path already exists.
    pub fn ensure(&mut self, spec: JoinSpec) {
        if !self.contains(&spec.path) {
            self.specs.push(spec);
        }
    }
}

/// Walk a `__`-separated relation path from `entity`, emitting one join per
/// segment. Every segment must be a foreign-key field; the terminal target
/// entity is returned so callers can resolve leaf fields against it.
pub fn resolve_join_path(
    entity: &'static EntityModel,
    path: &str,
    registry: &Registry,
    joins: &mut JoinMap,
) -> Result<&'static EntityModel, Error> {
    let mut current = entity;
    let mut walked: Vec<&str> = Vec::new();
    let mut parent_path: Option<String> = None;

    for segment in path.split("__") {
        let column = current
            .column(segment)
            .ok_or_else(|| FieldError::UnknownField {
                entity: current.entity_name.to_string(),
                field: segment.to_string(),
            })?;
        let fk = column
            .foreign_key
            .as_ref()
            .ok_or_else(|| FieldError::NotAForeignKey {
                entity: current.entity_name.to_string(),
                field: segment.to_string(),
            })?;
        let target = registry.entity(fk.target_entity)?;

        walked.push(segment);
        let full_path = walked.join("__");
        joins.ensure(JoinSpec {
            path: full_path.clone(),
            alias: full_path.clone(),
            source_column: fk.join_column.to_string(),
            target_entity: target.entity_name,
            target_table: target.table.to_string(),
            columns: target.field_names(),
            parent_path: parent_path.clone(),
        });

        parent_path = Some(full_path);
        current = target;
    }

    Ok(current)
}
