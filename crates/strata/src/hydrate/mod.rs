pub mod graph;
pub mod shape;

pub use graph::{Hydrated, RelatedNode, RelationMap, RelationSlot};
pub use shape::{DedupRelations, RawResult};

use crate::{
    error::{Error, HydrateError, ManagerError},
    model::{EntityKind, Registry, RelationKind},
    plan::JoinSpec,
    value::{Row, Value},
};
use std::{collections::BTreeMap, rc::Rc};
use tracing::trace;

/// Reconstruct typed root records plus their relation graphs from
/// normalized rows.
///
/// Join specs are processed shallowest-first so nested joins find their
/// parent already hydrated. The dedup payload, when present, reuses exactly
/// one node per distinct key across all rows sharing it.
pub(crate) fn hydrate_records<E: EntityKind>(
    rows: Vec<Row>,
    joins: &[JoinSpec],
    dedup: Option<&DedupRelations>,
    registry: &Registry,
) -> Result<Vec<Hydrated<E>>, Error> {
    let mut ordered: Vec<&JoinSpec> = joins.iter().collect();
    ordered.sort_by_key(|spec| spec.depth());

    // Identity caches for the dedup shape: relation name → key → node.
    let mut caches: BTreeMap<&str, BTreeMap<Value, Rc<RelatedNode>>> = BTreeMap::new();

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let mut hydrated = Hydrated::new(E::from_row(&row)?, row);

        if let Some(relations) = dedup {
            for (name, keyed_rows) in relations {
                let slot = dedup_slot::<E>(
                    name,
                    keyed_rows,
                    &hydrated.row,
                    caches.entry(name.as_str()).or_default(),
                    registry,
                )?;
                hydrated.attach(name.clone(), slot);
            }
        }

        for spec in &ordered {
            hydrate_join(&mut hydrated, spec, registry)?;
        }

        records.push(hydrated);
    }

    trace!(count = records.len(), "hydrated record graph");
    Ok(records)
}

/// Hydrate one join spec onto one record, attaching under the join path's
/// final segment — on the root for depth-1 joins, on the parent node for
/// nested ones.
fn hydrate_join<E: EntityKind>(
    hydrated: &mut Hydrated<E>,
    spec: &JoinSpec,
    registry: &Registry,
) -> Result<(), Error> {
    let target = registry.entity(spec.target_entity)?;

    // Extract the sub-payload by alias prefix; absent keys read as null.
    let mut payload = Row::new();
    let mut all_null = true;
    for column in &spec.columns {
        let value = hydrated
            .row
            .get(&format!("{}__{column}", spec.alias))
            .cloned()
            .unwrap_or(Value::Null);
        all_null &= value.is_null();
        payload.insert(column.clone(), value);
    }

    let slot = if all_null {
        RelationSlot::One(None)
    } else {
        RelationSlot::One(Some(Rc::new(RelatedNode::new(target, payload))))
    };

    match &spec.parent_path {
        None => hydrated.attach(spec.attr_name(), slot),
        Some(parent_path) => {
            // A nested join whose parent hydrated to null is itself null
            // by construction; there is nothing to attach to.
            if let Some(parent) = resolve_parent(hydrated.relations(), parent_path) {
                parent.attach(spec.attr_name(), slot);
            }
        }
    }
    Ok(())
}

/// Walk a `__`-separated parent path through already-hydrated to-one slots.
fn resolve_parent(relations: &RelationMap, parent_path: &str) -> Option<Rc<RelatedNode>> {
    let mut segments = parent_path.split("__");
    let first = segments.next()?;
    let mut current = match relations.get(first)? {
        RelationSlot::One(node) => node.clone()?,
        RelationSlot::Many(_) => return None,
    };
    for segment in segments {
        current = match current.related(segment)? {
            RelationSlot::One(node) => node?,
            RelationSlot::Many(_) => return None,
        };
    }
    Some(current)
}

/// Resolve one dedup-shape relation for one main row, reusing cached nodes
/// so rows sharing a key share the same instance.
fn dedup_slot<E: EntityKind>(
    name: &str,
    keyed_rows: &BTreeMap<Value, Row>,
    row: &Row,
    cache: &mut BTreeMap<Value, Rc<RelatedNode>>,
    registry: &Registry,
) -> Result<RelationSlot, Error> {
    let relation = E::MODEL
        .relation(name)
        .ok_or_else(|| HydrateError::RelationPayload {
            relation: name.to_string(),
            reason: format!("entity '{}' declares no such relation", E::MODEL.entity_name),
        })?;
    let RelationKind::ManyToOne { source_column } = relation.kind else {
        return Err(HydrateError::RelationPayload {
            relation: name.to_string(),
            reason: "deduplicated payloads describe to-one relations".to_string(),
        }
        .into());
    };
    let target = registry.entity(relation.target_entity)?;

    let key = row.get(source_column).cloned().unwrap_or(Value::Null);
    if key.is_null() {
        return Ok(RelationSlot::One(None));
    }

    if let Some(node) = cache.get(&key) {
        return Ok(RelationSlot::One(Some(node.clone())));
    }
    let related_row = keyed_rows
        .get(&key)
        .ok_or_else(|| HydrateError::RelationPayload {
            relation: name.to_string(),
            reason: format!("no related row for key {key:?}"),
        })?;
    let node = Rc::new(RelatedNode::new(target, related_row.clone()));
    cache.insert(key, node.clone());
    Ok(RelationSlot::One(Some(node)))
}

// ------------------------------------------------------------------
// Row transforms for the non-record result shapes
// ------------------------------------------------------------------

/// Mapping rows, optionally projected to the selected columns.
pub(crate) fn rows_to_mappings(rows: Vec<Row>, cols: Option<&[String]>) -> Vec<Row> {
    match cols {
        None => rows,
        Some(cols) => rows
            .into_iter()
            .map(|row| {
                cols.iter()
                    .map(|col| {
                        let value = row.get(col).cloned().unwrap_or(Value::Null);
                        (col.clone(), value)
                    })
                    .collect()
            })
            .collect(),
    }
}

/// Tuple rows in selected-column order; without a selection, the row's own
/// key order is used.
pub(crate) fn rows_to_tuples(rows: Vec<Row>, cols: Option<&[String]>) -> Vec<Vec<Value>> {
    rows.into_iter()
        .map(|row| match cols {
            Some(cols) => cols
                .iter()
                .map(|col| row.get(col).cloned().unwrap_or(Value::Null))
                .collect(),
            None => row.into_values().collect(),
        })
        .collect()
}

/// Flat values: exactly one selected column.
pub(crate) fn rows_to_flat(
    rows: Vec<Row>,
    cols: Option<&[String]>,
) -> Result<Vec<Value>, ManagerError> {
    let column = match cols {
        Some([column]) => column,
        Some(other) => return Err(ManagerError::FlatWidth { count: other.len() }),
        None => return Err(ManagerError::FlatWidth { count: 0 }),
    };
    Ok(rows
        .into_iter()
        .map(|row| row.get(column).cloned().unwrap_or(Value::Null))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        plan::{JoinMap, resolve_join_path},
        test_fixtures::{self, POST, Post, User, row},
    };

    fn joins_for(path: &str) -> JoinMap {
        test_fixtures::init();
        let mut joins = JoinMap::new();
        resolve_join_path(&POST, path, Registry::global(), &mut joins).expect("path resolves");
        joins
    }

    fn post_row(id: i64, author_id: i64) -> Row {
        row([
            ("id", Value::Int(id)),
            ("title", Value::from("hello")),
            ("author_id", Value::Int(author_id)),
        ])
    }

    #[test]
    fn flat_join_rows_hydrate_related_nodes_by_alias_prefix() {
        let joins = joins_for("author");
        let mut main = post_row(1, 100);
        main.insert("author__id".to_string(), Value::Int(100));
        main.insert("author__name".to_string(), Value::from("ada"));
        main.insert("author__age".to_string(), Value::Int(36));

        let records = hydrate_records::<Post>(vec![main], joins.specs(), None, Registry::global())
            .expect("hydrates");
        let author = records[0].one("author").expect("author hydrated");
        assert_eq!(author.field("name"), Some(Value::from("ada")));

        let user: User = author.decode().expect("decodes");
        assert_eq!(user.name, "ada");
        assert_eq!(user.id, 100);
    }

    #[test]
    fn all_null_join_payload_hydrates_to_none() {
        let joins = joins_for("author");
        // No author__* columns at all: every extracted value reads as null.
        let records = hydrate_records::<Post>(
            vec![post_row(1, 100)],
            joins.specs(),
            None,
            Registry::global(),
        )
        .expect("hydrates");

        assert!(records[0].one("author").is_none());
        // The slot itself exists and is the documented null case.
        assert!(matches!(
            records[0].related("author"),
            Some(RelationSlot::One(None))
        ));
    }

    #[test]
    fn nested_joins_attach_shallowest_first() {
        let joins = joins_for("author__company");
        let mut main = post_row(1, 100);
        main.insert("author__id".to_string(), Value::Int(100));
        main.insert("author__name".to_string(), Value::from("ada"));
        main.insert("author__age".to_string(), Value::Int(36));
        main.insert("author__company__id".to_string(), Value::Int(7));
        main.insert("author__company__name".to_string(), Value::from("acme"));

        let records = hydrate_records::<Post>(vec![main], joins.specs(), None, Registry::global())
            .expect("hydrates");
        let author = records[0].one("author").expect("author");
        let Some(RelationSlot::One(Some(company))) = author.related("company") else {
            panic!("company must hang off the author node");
        };
        assert_eq!(company.field("name"), Some(Value::from("acme")));
    }

    #[test]
    fn separate_flat_rows_construct_separate_instances() {
        let joins = joins_for("author");
        let mut a = post_row(1, 100);
        a.insert("author__id".to_string(), Value::Int(100));
        a.insert("author__name".to_string(), Value::from("ada"));
        a.insert("author__age".to_string(), Value::Int(36));
        let mut b = post_row(2, 100);
        b.insert("author__id".to_string(), Value::Int(100));
        b.insert("author__name".to_string(), Value::from("ada"));
        b.insert("author__age".to_string(), Value::Int(36));

        let records = hydrate_records::<Post>(vec![a, b], joins.specs(), None, Registry::global())
            .expect("hydrates");
        let first = records[0].one("author").expect("author");
        let second = records[1].one("author").expect("author");
        assert!(!Rc::ptr_eq(&first, &second));
    }

    #[test]
    fn dedup_shape_shares_one_instance_per_key() {
        test_fixtures::init();
        let user_row = |id: i64, name: &str| {
            row([
                ("id", Value::Int(id)),
                ("name", Value::from(name)),
                ("age", Value::Int(40)),
            ])
        };
        let mut relations = DedupRelations::new();
        relations.insert(
            "author".to_string(),
            [
                (Value::Int(100), user_row(100, "ada")),
                (Value::Int(200), user_row(200, "grace")),
            ]
            .into_iter()
            .collect(),
        );

        let rows = vec![post_row(1, 100), post_row(2, 100), post_row(3, 200)];
        let records =
            hydrate_records::<Post>(rows, &[], Some(&relations), Registry::global())
                .expect("hydrates");

        let first = records[0].one("author").expect("author");
        let second = records[1].one("author").expect("author");
        let third = records[2].one("author").expect("author");

        // Identity, not value equality.
        assert!(Rc::ptr_eq(&first, &second));
        assert!(!Rc::ptr_eq(&first, &third));
        assert_eq!(third.field("name"), Some(Value::from("grace")));
    }

    #[test]
    fn dedup_shape_with_missing_key_fails_loudly() {
        test_fixtures::init();
        let mut relations = DedupRelations::new();
        relations.insert("author".to_string(), BTreeMap::new());

        let err = hydrate_records::<Post>(
            vec![post_row(1, 100)],
            &[],
            Some(&relations),
            Registry::global(),
        )
        .expect_err("author 100 has no related row");
        assert!(matches!(
            err,
            Error::Hydrate(HydrateError::RelationPayload { .. })
        ));
    }

    #[test]
    fn mapping_tuple_and_flat_transforms() {
        let rows = vec![
            row([("id", Value::Int(1)), ("name", Value::from("ada"))]),
            row([("id", Value::Int(2)), ("name", Value::from("grace"))]),
        ];

        let cols = vec!["id".to_string()];
        let mapped = rows_to_mappings(rows.clone(), Some(&cols));
        assert_eq!(mapped[0].len(), 1);
        assert_eq!(mapped[0]["id"], Value::Int(1));

        let cols = vec!["name".to_string(), "id".to_string()];
        let tuples = rows_to_tuples(rows.clone(), Some(&cols));
        assert_eq!(tuples[0], vec![Value::from("ada"), Value::Int(1)]);

        let cols = vec!["id".to_string()];
        let flat = rows_to_flat(rows.clone(), Some(&cols)).expect("one column");
        assert_eq!(flat, vec![Value::Int(1), Value::Int(2)]);

        let cols = vec!["id".to_string(), "name".to_string()];
        assert_eq!(
            rows_to_flat(rows, Some(&cols)).expect_err("two columns"),
            ManagerError::FlatWidth { count: 2 }
        );
    }
}

