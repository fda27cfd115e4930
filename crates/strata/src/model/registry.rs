use crate::{
    error::{FieldError, ManagerError},
    model::{ColumnModel, EntityModel, RelationKind},
};
use std::{
    collections::BTreeMap,
    sync::{OnceLock, RwLock},
};

///
/// Registry
///
/// Process-wide catalog of finalized entity models.
///
/// Lifecycle: `register` each entity (idempotent for the same model), then
/// `finalize` once every entity is in. Finalization is idempotent and fails
/// fast if any foreign-key or relation target is still unresolved. After
/// finalization the registry is read-only; query compilation only performs
/// lookups against it.
///
/// `clear` exists for tests that exercise the lifecycle itself; production
/// code registers once at startup and never clears.
///

#[derive(Debug, Default)]
pub struct Registry {
    state: RwLock<RegistryState>,
}

#[derive(Debug, Default)]
struct RegistryState {
    entities: BTreeMap<&'static str, &'static EntityModel>,
    finalized: bool,
}

static GLOBAL: OnceLock<Registry> = OnceLock::new();

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry instance.
    pub fn global() -> &'static Self {
        GLOBAL.get_or_init(Self::new)
    }

    /// Add an entity model.
    ///
    /// Registering the same model twice is a no-op. Registering a different
    /// model under an already-taken name is an error. Registering after
    /// finalization re-opens the registry; `finalize` must run again.
    pub fn register(&self, model: &'static EntityModel) -> Result<(), ManagerError> {
        let mut state = self.state.write().expect("registry lock poisoned");
        if let Some(existing) = state.entities.get(model.entity_name) {
            if std::ptr::eq(*existing, model) {
                return Ok(());
            }
            return Err(ManagerError::DuplicateEntity {
                entity: model.entity_name.to_string(),
            });
        }
        state.entities.insert(model.entity_name, model);
        state.finalized = false;
        Ok(())
    }

    /// Check every forward reference and seal the registry.
    ///
    /// Idempotent: finalizing an already-finalized registry succeeds without
    /// re-checking. On failure the registry stays open and the error names
    /// every unresolved reference.
    pub fn finalize(&self) -> Result<(), ManagerError> {
        let mut state = self.state.write().expect("registry lock poisoned");
        if state.finalized {
            return Ok(());
        }

        let mut unresolved: Vec<String> = Vec::new();
        for model in state.entities.values() {
            for column in model.fields {
                if let Some(fk) = &column.foreign_key {
                    match state.entities.get(fk.target_entity) {
                        None => unresolved.push(format!(
                            "{}.{} -> {}",
                            model.entity_name, column.name, fk.target_entity
                        )),
                        Some(target) if target.column(fk.target_field).is_none() => unresolved
                            .push(format!(
                                "{}.{} -> {}.{}",
                                model.entity_name, column.name, fk.target_entity, fk.target_field
                            )),
                        Some(_) => {}
                    }
                }
            }
            for relation in model.relations {
                check_relation_targets(&state.entities, model, relation, &mut unresolved);
            }
        }

        if unresolved.is_empty() {
            state.finalized = true;
            Ok(())
        } else {
            Err(ManagerError::UnresolvedReferences {
                names: unresolved.join(", "),
            })
        }
    }

    /// Drop every entity and re-open the registry. Test lifecycle helper.
    pub fn clear(&self) {
        let mut state = self.state.write().expect("registry lock poisoned");
        state.entities.clear();
        state.finalized = false;
    }

    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.state.read().expect("registry lock poisoned").finalized
    }

    /// Look up a registered entity by name.
    pub fn entity(&self, name: &str) -> Result<&'static EntityModel, FieldError> {
        let state = self.state.read().expect("registry lock poisoned");
        state
            .entities
            .get(name)
            .copied()
            .ok_or_else(|| FieldError::UnknownEntity {
                entity: name.to_string(),
            })
    }

    /// Resolve a field on a registered entity.
    pub fn resolve(&self, entity: &str, field: &str) -> Result<&'static ColumnModel, FieldError> {
        let model = self.entity(entity)?;
        model
            .column(field)
            .ok_or_else(|| FieldError::UnknownField {
                entity: entity.to_string(),
                field: field.to_string(),
            })
    }

    /// Fail unless `finalize` has run since the last registration.
    pub fn ensure_finalized(&self) -> Result<(), ManagerError> {
        if self.is_finalized() {
            Ok(())
        } else {
            Err(ManagerError::NotFinalized)
        }
    }
}

fn check_relation_targets(
    entities: &BTreeMap<&'static str, &'static EntityModel>,
    model: &EntityModel,
    relation: &crate::model::RelationModel,
    unresolved: &mut Vec<String>,
) {
    let describe = |target: &str| format!("{}.{} -> {}", model.entity_name, relation.name, target);

    let Some(target) = entities.get(relation.target_entity) else {
        unresolved.push(describe(relation.target_entity));
        return;
    };

    match relation.kind {
        RelationKind::ManyToOne { source_column } => {
            if model.column(source_column).is_none() {
                unresolved.push(format!(
                    "{}.{} -> {}.{source_column}",
                    model.entity_name, relation.name, model.entity_name
                ));
            }
        }
        RelationKind::OneToMany { remote_field } => {
            if target.column(remote_field).is_none() {
                unresolved.push(format!(
                    "{}.{} -> {}.{remote_field}",
                    model.entity_name, relation.name, relation.target_entity
                ));
            }
        }
        RelationKind::ManyToMany {
            through,
            source_key,
            target_key,
        } => match entities.get(through) {
            None => unresolved.push(describe(through)),
            Some(link) => {
                for key in [source_key, target_key] {
                    if link.column(key).is_none() {
                        unresolved.push(format!(
                            "{}.{} -> {through}.{key}",
                            model.entity_name, relation.name
                        ));
                    }
                }
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldCategory, ForeignKeyModel, RelationModel};

    static PARENT: EntityModel = EntityModel {
        entity_name: "parent",
        table: "parents",
        fields: &[ColumnModel {
            name: "id",
            category: FieldCategory::Numeric,
            nullable: false,
            primary_key: true,
            foreign_key: None,
        }],
        relations: &[RelationModel {
            name: "children",
            target_entity: "child",
            kind: RelationKind::OneToMany {
                remote_field: "parent_id",
            },
        }],
    };

    static CHILD: EntityModel = EntityModel {
        entity_name: "child",
        table: "children",
        fields: &[
            ColumnModel {
                name: "id",
                category: FieldCategory::Numeric,
                nullable: false,
                primary_key: true,
                foreign_key: None,
            },
            ColumnModel {
                name: "parent",
                category: FieldCategory::Numeric,
                nullable: false,
                primary_key: false,
                foreign_key: Some(ForeignKeyModel {
                    target_entity: "parent",
                    target_field: "id",
                    join_column: "parent_id",
                }),
            },
            ColumnModel {
                name: "parent_id",
                category: FieldCategory::Numeric,
                nullable: false,
                primary_key: false,
                foreign_key: None,
            },
        ],
        relations: &[],
    };

    #[test]
    fn finalize_fails_fast_on_unresolved_target() {
        let registry = Registry::new();
        registry.register(&CHILD).expect("register");

        let err = registry.finalize().expect_err("parent is missing");
        let ManagerError::UnresolvedReferences { names } = err else {
            panic!("expected unresolved references, got {err:?}");
        };
        assert!(names.contains("child.parent -> parent"));
        assert!(!registry.is_finalized());
    }

    #[test]
    fn finalize_is_idempotent_once_resolved() {
        let registry = Registry::new();
        registry.register(&CHILD).expect("register");
        registry.register(&PARENT).expect("register");

        registry.finalize().expect("all targets resolve");
        registry.finalize().expect("second finalize is a no-op");
        assert!(registry.is_finalized());
    }

    #[test]
    fn register_same_model_twice_is_noop() {
        let registry = Registry::new();
        registry.register(&PARENT).expect("register");
        registry.register(&PARENT).expect("same model again");
        assert_eq!(registry.entity("parent").expect("registered").table, "parents");
    }

    #[test]
    fn registering_after_finalize_reopens() {
        let registry = Registry::new();
        registry.register(&PARENT).expect("register");
        registry.register(&CHILD).expect("register");
        registry.finalize().expect("finalize");

        static LATE: EntityModel = EntityModel {
            entity_name: "late",
            table: "lates",
            fields: &[],
            relations: &[],
        };
        registry.register(&LATE).expect("register");
        assert!(registry.ensure_finalized().is_err());
    }

    #[test]
    fn clear_resets_lifecycle() {
        let registry = Registry::new();
        registry.register(&PARENT).expect("register");
        registry.clear();
        assert!(registry.entity("parent").is_err());
    }
}
