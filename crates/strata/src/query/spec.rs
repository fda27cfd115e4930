use crate::{
    error::{Error, ManagerError},
    model::{EntityKind, EntityModel, Registry},
    plan::{JoinMap, PrefetchPlan, resolve_join_path},
    query::{
        expr::Assign,
        filter::{Filter, FilterNode},
        ir::{AggregateSpec, LockMode, Operation, OrderDirection, QueryIr},
    },
};
use std::{collections::BTreeMap, marker::PhantomData, ops::Range};
use tracing::debug;

///
/// ResultShape
///
/// How fetched rows are surfaced: typed records with relation hydration,
/// or plain mappings / tuples / flat values without it.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ResultShape {
    Records,
    Mappings,
    Tuples,
    Flat,
}

///
/// QuerySpec
///
/// Immutable query specification for entity `E`.
///
/// Every mutator borrows the receiver, deep-copies its state, and returns a
/// new instance; branching several queries off one ancestor never shares
/// mutable substructure. Validation happens inside the mutators, so an
/// invalid filter or path never survives long enough to reach the engine.
///

#[derive(Debug, PartialEq)]
pub struct QuerySpec<E: EntityKind> {
    pub(crate) filter_nodes: Vec<FilterNode>,
    pub(crate) joins: JoinMap,
    pub(crate) prefetch: Vec<PrefetchPlan>,
    pub(crate) order: Vec<(String, OrderDirection)>,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
    pub(crate) distinct: bool,
    pub(crate) cols: Option<Vec<String>>,
    pub(crate) shape: ResultShape,
    pub(crate) aggregates: Vec<AggregateSpec>,
    pub(crate) group_by: Vec<String>,
    pub(crate) having_nodes: Vec<FilterNode>,
    pub(crate) lock: Option<LockMode>,
    _marker: PhantomData<fn() -> E>,
}

impl<E: EntityKind> Clone for QuerySpec<E> {
    fn clone(&self) -> Self {
        Self {
            filter_nodes: self.filter_nodes.clone(),
            joins: self.joins.clone(),
            prefetch: self.prefetch.clone(),
            order: self.order.clone(),
            limit: self.limit,
            offset: self.offset,
            distinct: self.distinct,
            cols: self.cols.clone(),
            shape: self.shape,
            aggregates: self.aggregates.clone(),
            group_by: self.group_by.clone(),
            having_nodes: self.having_nodes.clone(),
            lock: self.lock,
            _marker: PhantomData,
        }
    }
}

impl<E: EntityKind> Default for QuerySpec<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: EntityKind> QuerySpec<E> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            filter_nodes: Vec::new(),
            joins: JoinMap::new(),
            prefetch: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
            distinct: false,
            cols: None,
            shape: ResultShape::Records,
            aggregates: Vec::new(),
            group_by: Vec::new(),
            having_nodes: Vec::new(),
            lock: None,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub const fn entity() -> &'static EntityModel {
        E::MODEL
    }

    /// Which fetch surface this query was shaped for.
    #[must_use]
    pub const fn shape(&self) -> ResultShape {
        self.shape
    }

    // Entities resolve against the process-wide catalog.
    fn registry() -> &'static Registry {
        Registry::global()
    }

    /// Add a filter, AND-ed with anything already applied.
    ///
    /// Validation and foreign-key traversal happen here; joins required by
    /// traversed paths are merged into the query, deduplicated by path.
    pub fn filter(&self, filter: Filter) -> Result<Self, Error> {
        let mut next = self.clone();
        if let Some(node) = filter.resolve(E::MODEL, Self::registry(), &mut next.joins)? {
            next.filter_nodes.push(node);
        }
        Ok(next)
    }

    /// Single `key = value` filter sugar.
    pub fn filter_by(
        &self,
        key: impl Into<String>,
        value: impl Into<crate::value::Value>,
    ) -> Result<Self, Error> {
        self.filter(Filter::key(key, value))
    }

    /// Add a negated filter: the whole resolved leaf is wrapped in a single
    /// Not, rather than negating each lookup's operator individually.
    pub fn exclude(&self, filter: Filter) -> Result<Self, Error> {
        let mut next = self.clone();
        if let Some(node) = filter.resolve(E::MODEL, Self::registry(), &mut next.joins)? {
            next.filter_nodes.push(FilterNode::Not(Box::new(node)));
        }
        Ok(next)
    }

    /// Append an ascending sort key.
    #[must_use]
    pub fn order_by(&self, field: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.order.push((field.into(), OrderDirection::Asc));
        next
    }

    /// Append a descending sort key.
    #[must_use]
    pub fn order_by_desc(&self, field: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.order.push((field.into(), OrderDirection::Desc));
        next
    }

    /// Flip every existing sort direction; with no explicit order, fall
    /// back to primary-key descending.
    #[must_use]
    pub fn reversed(&self) -> Self {
        let mut next = self.clone();
        if next.order.is_empty() {
            if let Some(pk) = E::MODEL.primary_key() {
                next.order.push((pk.name.to_string(), OrderDirection::Desc));
            }
        } else {
            for (_, direction) in &mut next.order {
                *direction = direction.flipped();
            }
        }
        next
    }

    #[must_use]
    pub fn limit(&self, n: u64) -> Self {
        let mut next = self.clone();
        next.limit = Some(n);
        next
    }

    #[must_use]
    pub fn offset(&self, n: u64) -> Self {
        let mut next = self.clone();
        next.offset = Some(n);
        next
    }

    /// `[start..stop]` slice sugar: offset = start, limit = stop − start.
    #[must_use]
    pub fn slice(&self, range: Range<u64>) -> Self {
        let mut next = self.clone();
        next.offset = Some(range.start);
        next.limit = Some(range.end.saturating_sub(range.start));
        next
    }

    /// `[i]` sugar: offset = i, limit = 1.
    #[must_use]
    pub fn nth(&self, index: u64) -> Self {
        let mut next = self.clone();
        next.offset = Some(index);
        next.limit = Some(1);
        next
    }

    #[must_use]
    pub fn distinct(&self) -> Self {
        let mut next = self.clone();
        next.distinct = true;
        next
    }

    /// Restrict the selected columns without changing the result shape.
    #[must_use]
    pub fn select<S: Into<String>>(&self, cols: impl IntoIterator<Item = S>) -> Self {
        let mut next = self.clone();
        next.cols = Some(cols.into_iter().map(Into::into).collect());
        next
    }

    /// Switch to mapping rows; an empty column list means all columns.
    #[must_use]
    pub fn values<S: Into<String>>(&self, cols: impl IntoIterator<Item = S>) -> Self {
        let mut next = self.clone();
        let cols: Vec<String> = cols.into_iter().map(Into::into).collect();
        next.cols = if cols.is_empty() { None } else { Some(cols) };
        next.shape = ResultShape::Mappings;
        next
    }

    /// Switch to tuple rows, or flat values with exactly one column.
    pub fn values_list<S: Into<String>>(
        &self,
        cols: impl IntoIterator<Item = S>,
        flat: bool,
    ) -> Result<Self, Error> {
        let cols: Vec<String> = cols.into_iter().map(Into::into).collect();
        if flat && cols.len() != 1 {
            return Err(ManagerError::FlatWidth { count: cols.len() }.into());
        }
        let mut next = self.clone();
        next.cols = if cols.is_empty() { None } else { Some(cols) };
        next.shape = if flat {
            ResultShape::Flat
        } else {
            ResultShape::Tuples
        };
        Ok(next)
    }

    /// Eager-join a relation path for single-round-trip loading.
    pub fn join(&self, path: &str) -> Result<Self, Error> {
        let mut next = self.clone();
        resolve_join_path(E::MODEL, path, Self::registry(), &mut next.joins)?;
        Ok(next)
    }

    /// Load a relation path via follow-up queries instead of a join.
    pub fn prefetch(&self, path: &str) -> Result<Self, Error> {
        let mut next = self.clone();
        let plan = PrefetchPlan::resolve(E::MODEL, path, Self::registry())?;
        if !next.prefetch.iter().any(|existing| existing.path == plan.path) {
            next.prefetch.push(plan);
        }
        Ok(next)
    }

    /// Annotate the query with an aggregate.
    #[must_use]
    pub fn annotate(&self, aggregate: AggregateSpec) -> Self {
        let mut next = self.clone();
        next.aggregates.push(aggregate);
        next
    }

    /// Group by the given fields. Aggregate compatibility is the engine's
    /// concern, not validated here.
    #[must_use]
    pub fn group_by<S: Into<String>>(&self, fields: impl IntoIterator<Item = S>) -> Self {
        let mut next = self.clone();
        next.group_by = fields.into_iter().map(Into::into).collect();
        next
    }

    /// Add a having filter, AND-ed with anything already applied.
    pub fn having(&self, filter: Filter) -> Result<Self, Error> {
        let mut next = self.clone();
        if let Some(node) = filter.resolve(E::MODEL, Self::registry(), &mut next.joins)? {
            next.having_nodes.push(node);
        }
        Ok(next)
    }

    /// Request `FOR UPDATE` row locking; the last lock request wins.
    #[must_use]
    pub fn for_update(&self) -> Self {
        let mut next = self.clone();
        next.lock = Some(LockMode::Update);
        next
    }

    /// Request `FOR SHARE` row locking; the last lock request wins.
    #[must_use]
    pub fn for_share(&self) -> Self {
        let mut next = self.clone();
        next.lock = Some(LockMode::Share);
        next
    }

    // ------------------------------------------------------------------
    // IR emission
    // ------------------------------------------------------------------

    fn merged(nodes: &[FilterNode]) -> Option<FilterNode> {
        match nodes.len() {
            0 => None,
            1 => Some(nodes[0].clone()),
            _ => Some(FilterNode::And(nodes.to_vec())),
        }
    }

    /// Emit the canonical select IR.
    #[must_use]
    pub fn to_ir(&self) -> QueryIr {
        let mut ir = QueryIr::new(Operation::Select, E::MODEL.table);
        ir.filter_tree = Self::merged(&self.filter_nodes);
        ir.joins = (!self.joins.is_empty()).then(|| self.joins.specs().to_vec());
        ir.aggregates = (!self.aggregates.is_empty()).then(|| self.aggregates.clone());
        ir.group_by = (!self.group_by.is_empty()).then(|| self.group_by.clone());
        ir.having = Self::merged(&self.having_nodes);
        ir.order_by = (!self.order.is_empty()).then(|| self.order.clone());
        ir.limit = self.limit;
        ir.offset = self.offset;
        ir.distinct = self.distinct.then_some(true);
        ir.cols = self.cols.clone();
        ir.lock = self.lock;
        debug!(table = E::MODEL.table, "compiled select IR");
        ir
    }

    /// Emit an update IR; assignment values may embed expression trees.
    pub fn update_ir(
        &self,
        assigns: impl IntoIterator<Item = (String, Assign)>,
    ) -> Result<QueryIr, Error> {
        let values: BTreeMap<String, Assign> = assigns.into_iter().collect();
        if values.is_empty() {
            return Err(ManagerError::EmptyUpdate.into());
        }
        let mut ir = QueryIr::new(Operation::Update, E::MODEL.table);
        ir.filter_tree = Self::merged(&self.filter_nodes);
        ir.values = Some(values);
        Ok(ir)
    }

    /// Emit a delete IR for the current filter.
    #[must_use]
    pub fn delete_ir(&self) -> QueryIr {
        let mut ir = QueryIr::new(Operation::Delete, E::MODEL.table);
        ir.filter_tree = Self::merged(&self.filter_nodes);
        ir
    }

    /// Emit a count IR: same shape as select, flagged for a count result.
    #[must_use]
    pub fn count_ir(&self) -> QueryIr {
        let mut ir = self.to_ir();
        ir.count = Some(true);
        ir.order_by = None;
        ir.limit = None;
        ir.offset = None;
        ir
    }

    /// Emit a minimal existence probe: filter and joins only, limit 1.
    #[must_use]
    pub fn exists_ir(&self) -> QueryIr {
        let mut ir = QueryIr::new(Operation::Select, E::MODEL.table);
        ir.filter_tree = Self::merged(&self.filter_nodes);
        ir.joins = (!self.joins.is_empty()).then(|| self.joins.specs().to_vec());
        ir.limit = Some(1);
        ir.exists = Some(true);
        ir
    }
}
