use crate::{
    error::Error,
    model::{EntityModel, Registry},
    plan::{JoinMap, resolve_join_path},
    query::lookup::{split_lookup_key, validate_and_build},
    value::Value,
};
use serde::{Serialize, Serializer, ser::SerializeMap};
use std::ops::{BitAnd, BitOr, Not};

///
/// Operator
///
/// Comparison operators carried on compiled conditions. The wire form is
/// the operator string the execution engine expects.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, derive_more::Display)]
pub enum Operator {
    #[display("=")]
    Eq,
    #[display(">")]
    Gt,
    #[display(">=")]
    Gte,
    #[display("<")]
    Lt,
    #[display("<=")]
    Lte,
    #[display("IN")]
    In,
    #[display("LIKE")]
    Like,
    #[display("ILIKE")]
    ILike,
    #[display("BETWEEN")]
    Between,
    #[display("IS NULL")]
    IsNull,
    #[display("IS NOT NULL")]
    IsNotNull,
}

impl Serialize for Operator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

///
/// Condition
///
/// One compiled leaf predicate. `column` is set only when foreign-key
/// traversal rewrote the target to an alias-qualified column.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Condition {
    pub field: String,
    pub column: Option<String>,
    pub operator: Operator,
    pub value: Value,
}

///
/// FilterNode
///
/// Compiled boolean predicate tree.
///
/// Invariants (enforced by `Filter::resolve`, preserved here):
/// - `Or` always has ≥2 children; fewer collapses to the lone child or None.
/// - `And` with a single child collapses to the child.
/// - `Not` wraps exactly one child; double negation is preserved, never
///   simplified away.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FilterNode {
    Condition(Condition),
    And(Vec<Self>),
    Or(Vec<Self>),
    Not(Box<Self>),
}

impl Serialize for FilterNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Condition(c) => {
                let len = if c.column.is_some() { 5 } else { 4 };
                let mut map = serializer.serialize_map(Some(len))?;
                map.serialize_entry("type", "condition")?;
                map.serialize_entry("field", &c.field)?;
                if let Some(column) = &c.column {
                    map.serialize_entry("column", column)?;
                }
                map.serialize_entry("operator", &c.operator)?;
                map.serialize_entry("value", &c.value)?;
                map.end()
            }
            Self::And(children) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", "and")?;
                map.serialize_entry("conditions", children)?;
                map.end()
            }
            Self::Or(children) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", "or")?;
                map.serialize_entry("conditions", children)?;
                map.end()
            }
            Self::Not(child) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", "not")?;
                map.serialize_entry("condition", child)?;
                map.end()
            }
        }
    }
}

///
/// Filter
///
/// Lazily resolved boolean filter value (the `Q` of the fluent surface).
///
/// A filter is either a leaf of `field[__lookup] = value` pairs or a
/// boolean combination of other filters. Construction never touches the
/// catalog; `resolve` validates against one entity and compiles to a
/// `FilterNode`, emitting join specs for any traversed foreign-key path.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub enum Filter {
    #[default]
    Empty,
    /// Lookup pairs in insertion order; they compile to an implicit And.
    Leaf(Vec<(String, Value)>),
    And(Vec<Self>),
    Or(Vec<Self>),
    Not(Box<Self>),
}

impl Filter {
    #[must_use]
    pub const fn new() -> Self {
        Self::Empty
    }

    /// Single `key = value` leaf.
    #[must_use]
    pub fn key(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Leaf(vec![(key.into(), value.into())])
    }

    /// Multi-pair leaf; pairs keep insertion order.
    #[must_use]
    pub fn pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::Leaf(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Explicit And combinator; `a & b` does the same.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        Self::And(vec![self, other])
    }

    /// Explicit Or combinator; `a | b` does the same.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        Self::Or(vec![self, other])
    }

    /// Explicit Not combinator; `!a` does the same.
    #[must_use]
    pub fn not_(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Validate against `entity` and compile to a predicate tree.
    ///
    /// Returns `None` for an empty filter. Foreign-key paths in leaf keys
    /// are rewritten to alias-qualified columns, with their joins collected
    /// into `joins` (deduplicated by path across the whole tree).
    pub fn resolve(
        &self,
        entity: &'static EntityModel,
        registry: &Registry,
        joins: &mut JoinMap,
    ) -> Result<Option<FilterNode>, Error> {
        match self {
            Self::Empty => Ok(None),
            Self::Leaf(pairs) => resolve_leaf(pairs, entity, registry, joins),
            Self::And(children) => {
                let resolved = resolve_children(children, entity, registry, joins)?;
                Ok(match resolved.len() {
                    0 => None,
                    1 => resolved.into_iter().next(),
                    _ => Some(FilterNode::And(resolved)),
                })
            }
            Self::Or(children) => {
                let resolved = resolve_children(children, entity, registry, joins)?;
                // An Or that resolves to fewer than two children passes the
                // lone child through unchanged.
                Ok(match resolved.len() {
                    0 => None,
                    1 => resolved.into_iter().next(),
                    _ => Some(FilterNode::Or(resolved)),
                })
            }
            Self::Not(child) => {
                let resolved = child.resolve(entity, registry, joins)?;
                Ok(resolved.map(|node| FilterNode::Not(Box::new(node))))
            }
        }
    }
}

fn resolve_children(
    children: &[Filter],
    entity: &'static EntityModel,
    registry: &Registry,
    joins: &mut JoinMap,
) -> Result<Vec<FilterNode>, Error> {
    let mut resolved = Vec::with_capacity(children.len());
    for child in children {
        if let Some(node) = child.resolve(entity, registry, joins)? {
            resolved.push(node);
        }
    }
    Ok(resolved)
}

/// Compile one leaf: each pair may expand to several conditions (date-part
/// lookups), all joined by an implicit And in insertion order.
fn resolve_leaf(
    pairs: &[(String, Value)],
    entity: &'static EntityModel,
    registry: &Registry,
    joins: &mut JoinMap,
) -> Result<Option<FilterNode>, Error> {
    let mut conditions: Vec<FilterNode> = Vec::new();

    for (key, value) in pairs {
        let (field_path, lookup) = split_lookup_key(key)?;

        let built = match field_path.rsplit_once("__") {
            // Traversal: every leading segment is a foreign-key hop; the
            // leaf condition binds on the terminal field of the last target.
            Some((relation_path, terminal)) => {
                let target = resolve_join_path(entity, relation_path, registry, joins)?;
                let meta = target.column(terminal).ok_or_else(|| {
                    crate::error::FieldError::UnknownField {
                        entity: target.entity_name.to_string(),
                        field: terminal.to_string(),
                    }
                })?;
                let column = format!("{relation_path}.{terminal}");
                validate_and_build(meta, terminal, Some(column), lookup, value.clone())?
            }
            None => {
                let meta = entity.column(field_path).ok_or_else(|| {
                    crate::error::FieldError::UnknownField {
                        entity: entity.entity_name.to_string(),
                        field: field_path.to_string(),
                    }
                })?;
                validate_and_build(meta, field_path, None, lookup, value.clone())?
            }
        };
        conditions.extend(built.into_iter().map(FilterNode::Condition));
    }

    Ok(match conditions.len() {
        0 => None,
        1 => conditions.into_iter().next(),
        _ => Some(FilterNode::And(conditions)),
    })
}

impl BitAnd for Filter {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        self.and(rhs)
    }
}

impl BitOr for Filter {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.or(rhs)
    }
}

impl Not for Filter {
    type Output = Self;

    fn not(self) -> Self::Output {
        self.not_()
    }
}
