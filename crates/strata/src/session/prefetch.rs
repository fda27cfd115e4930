use crate::{
    error::{Error, HydrateError},
    hydrate::{Hydrated, RelatedNode, RelationSlot},
    model::{EntityKind, Registry, RelationKind},
    plan::{PrefetchPlan, PrefetchSegment},
    query::{Condition, FilterNode, Operation, Operator, QueryIr},
    session::ExecuteEngine,
    value::{Row, Value},
};
use std::{
    collections::{BTreeMap, BTreeSet},
    rc::Rc,
};
use tracing::debug;

///
/// Prefetch runner
///
/// Walks each resolved prefetch path level by level: batch one lookup for
/// the current parent set, group the children by the remote key, attach a
/// possibly-empty ordered sequence (never null) to every parent, then use
/// the attached children as the next level's parents. Levels run
/// sequentially; each depends on the previous level's reconstruction.
///

pub(crate) async fn run_prefetch<E: EntityKind>(
    parents: &mut [Hydrated<E>],
    plans: &[PrefetchPlan],
    engine: &impl ExecuteEngine,
    registry: &Registry,
) -> Result<(), Error> {
    for plan in plans {
        debug!(path = %plan.path, "prefetching relation path");
        let mut levels = plan.segments.iter();
        let Some(first) = levels.next() else {
            continue;
        };
        let mut current = prefetch_roots(parents, first, engine, registry).await?;
        for segment in levels {
            if current.is_empty() {
                break;
            }
            current = prefetch_nodes(&current, segment, engine, registry).await?;
        }
    }
    Ok(())
}

/// Children grouped by parent key. To-one relations share one node per key
/// (identity), to-many relations keep engine row order per key.
enum Grouped {
    One(BTreeMap<Value, Rc<RelatedNode>>),
    Many(BTreeMap<Value, Vec<Rc<RelatedNode>>>),
}

impl Grouped {
    const fn empty_for(kind: &RelationKind) -> Self {
        match kind {
            RelationKind::ManyToOne { .. } => Self::One(BTreeMap::new()),
            RelationKind::OneToMany { .. } | RelationKind::ManyToMany { .. } => {
                Self::Many(BTreeMap::new())
            }
        }
    }

    /// All fetched children, each once, for the next prefetch level.
    fn children(&self) -> Vec<Rc<RelatedNode>> {
        match self {
            Self::One(map) => map.values().cloned().collect(),
            Self::Many(map) => map.values().flatten().cloned().collect(),
        }
    }

    fn slot_for(&self, key: &Value) -> RelationSlot {
        match self {
            Self::One(map) => {
                let node = if key.is_null() {
                    None
                } else {
                    map.get(key).cloned()
                };
                RelationSlot::One(node)
            }
            Self::Many(map) => RelationSlot::Many(map.get(key).cloned().unwrap_or_default()),
        }
    }
}

async fn prefetch_roots<E: EntityKind>(
    parents: &mut [Hydrated<E>],
    segment: &PrefetchSegment,
    engine: &impl ExecuteEngine,
    registry: &Registry,
) -> Result<Vec<Rc<RelatedNode>>, Error> {
    let key_field = parent_key_field(segment)?;
    let ids = distinct_ids(parents.iter().map(|p| p.field(key_field).unwrap_or(Value::Null)));
    let grouped = fetch_grouped(segment, ids, engine, registry).await?;

    for parent in parents.iter_mut() {
        let key = parent.field(key_field).unwrap_or(Value::Null);
        parent.attach(segment.relation, grouped.slot_for(&key));
    }
    Ok(grouped.children())
}

async fn prefetch_nodes(
    parents: &[Rc<RelatedNode>],
    segment: &PrefetchSegment,
    engine: &impl ExecuteEngine,
    registry: &Registry,
) -> Result<Vec<Rc<RelatedNode>>, Error> {
    let key_field = parent_key_field(segment)?;
    let ids = distinct_ids(
        parents
            .iter()
            .map(|node| node.field(key_field).unwrap_or(Value::Null)),
    );
    let grouped = fetch_grouped(segment, ids, engine, registry).await?;

    for node in parents {
        let key = node.field(key_field).unwrap_or(Value::Null);
        node.attach(segment.relation, grouped.slot_for(&key));
    }
    Ok(grouped.children())
}

/// Issue the batched lookup(s) for one level and group the children.
/// One-to-many and many-to-one need one round trip; many-to-many needs the
/// link rows first, then the targets, grouped back through the link pairs.
async fn fetch_grouped(
    segment: &PrefetchSegment,
    parent_ids: Vec<Value>,
    engine: &impl ExecuteEngine,
    registry: &Registry,
) -> Result<Grouped, Error> {
    if parent_ids.is_empty() {
        return Ok(Grouped::empty_for(&segment.kind));
    }

    match segment.kind {
        RelationKind::OneToMany { remote_field } => {
            let rows = select_in(engine, segment.target_entity.table, remote_field, parent_ids)
                .await?;
            let mut groups: BTreeMap<Value, Vec<Rc<RelatedNode>>> = BTreeMap::new();
            for row in rows {
                let key = row.get(remote_field).cloned().unwrap_or(Value::Null);
                if key.is_null() {
                    continue;
                }
                groups
                    .entry(key)
                    .or_default()
                    .push(Rc::new(RelatedNode::new(segment.target_entity, row)));
            }
            Ok(Grouped::Many(groups))
        }
        RelationKind::ManyToOne { .. } => {
            let pk = target_pk(segment)?;
            let rows = select_in(engine, segment.target_entity.table, pk, parent_ids).await?;
            let mut map: BTreeMap<Value, Rc<RelatedNode>> = BTreeMap::new();
            for row in rows {
                let key = row.get(pk).cloned().unwrap_or(Value::Null);
                if key.is_null() {
                    continue;
                }
                map.insert(key, Rc::new(RelatedNode::new(segment.target_entity, row)));
            }
            Ok(Grouped::One(map))
        }
        RelationKind::ManyToMany {
            through,
            source_key,
            target_key,
        } => {
            let link_model = registry.entity(through)?;
            let links = select_in(engine, link_model.table, source_key, parent_ids).await?;

            let pk = target_pk(segment)?;
            let target_ids =
                distinct_ids(links.iter().map(|l| l.get(target_key).cloned().unwrap_or(Value::Null)));
            let targets = if target_ids.is_empty() {
                Vec::new()
            } else {
                select_in(engine, segment.target_entity.table, pk, target_ids).await?
            };

            let mut by_id: BTreeMap<Value, Rc<RelatedNode>> = BTreeMap::new();
            for row in targets {
                let key = row.get(pk).cloned().unwrap_or(Value::Null);
                if !key.is_null() {
                    by_id.insert(key, Rc::new(RelatedNode::new(segment.target_entity, row)));
                }
            }

            let mut groups: BTreeMap<Value, Vec<Rc<RelatedNode>>> = BTreeMap::new();
            for link in links {
                let pid = link.get(source_key).cloned().unwrap_or(Value::Null);
                let tid = link.get(target_key).cloned().unwrap_or(Value::Null);
                if pid.is_null() || tid.is_null() {
                    continue;
                }
                let node = by_id
                    .get(&tid)
                    .ok_or_else(|| HydrateError::RelationPayload {
                        relation: segment.relation.to_string(),
                        reason: format!("link row references missing target {tid:?}"),
                    })?;
                groups.entry(pid).or_default().push(node.clone());
            }
            Ok(Grouped::Many(groups))
        }
    }
}

/// `remote key IN {identifiers}` follow-up select.
async fn select_in(
    engine: &impl ExecuteEngine,
    table: &str,
    field: &str,
    ids: Vec<Value>,
) -> Result<Vec<Row>, Error> {
    let mut ir = QueryIr::new(Operation::Select, table);
    ir.filter_tree = Some(FilterNode::Condition(Condition {
        field: field.to_string(),
        column: None,
        operator: Operator::In,
        value: Value::List(ids),
    }));
    let (rows, _) = engine.execute(&ir).await?.into_rows()?;
    Ok(rows)
}

/// Which parent field keys this level: the referencing column for forward
/// relations, the primary key otherwise.
fn parent_key_field(segment: &PrefetchSegment) -> Result<&'static str, Error> {
    match segment.kind {
        RelationKind::ManyToOne { source_column } => Ok(source_column),
        RelationKind::OneToMany { .. } | RelationKind::ManyToMany { .. } => segment
            .source_entity
            .primary_key()
            .map(|column| column.name)
            .ok_or_else(|| {
                HydrateError::RelationPayload {
                    relation: segment.relation.to_string(),
                    reason: format!(
                        "entity '{}' has no primary key to batch on",
                        segment.source_entity.entity_name
                    ),
                }
                .into()
            }),
    }
}

fn target_pk(segment: &PrefetchSegment) -> Result<&'static str, Error> {
    segment
        .target_entity
        .primary_key()
        .map(|column| column.name)
        .ok_or_else(|| {
            HydrateError::RelationPayload {
                relation: segment.relation.to_string(),
                reason: format!(
                    "entity '{}' has no primary key to batch on",
                    segment.target_entity.entity_name
                ),
            }
            .into()
        })
}

/// Distinct non-null identifiers, first-seen order preserved.
fn distinct_ids(values: impl Iterator<Item = Value>) -> Vec<Value> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for value in values {
        if value.is_null() {
            continue;
        }
        if seen.insert(value.clone()) {
            out.push(value);
        }
    }
    out
}
