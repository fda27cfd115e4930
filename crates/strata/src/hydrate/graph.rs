use crate::{
    error::HydrateError,
    model::{EntityKind, EntityModel},
    value::{Row, Value},
};
use std::{cell::RefCell, collections::BTreeMap, rc::Rc};

/// Relation name → hydrated slot.
pub type RelationMap = BTreeMap<String, RelationSlot>;

///
/// RelationSlot
///
/// Hydrated value of one relation. To-one slots hold None when every
/// extracted join value was null; to-many slots are possibly empty but
/// never absent once their relation was loaded.
///

#[derive(Clone, Debug)]
pub enum RelationSlot {
    One(Option<Rc<RelatedNode>>),
    Many(Vec<Rc<RelatedNode>>),
}

///
/// RelatedNode
///
/// One reconstructed related record. Nodes are shared by reference where
/// the result shape deduplicates (identity, not value equality), and carry
/// their own relation slots so nested joins and prefetch levels can hang
/// children off them.
///

#[derive(Debug)]
pub struct RelatedNode {
    pub entity: &'static EntityModel,
    pub row: Row,
    children: RefCell<RelationMap>,
}

impl RelatedNode {
    #[must_use]
    pub fn new(entity: &'static EntityModel, row: Row) -> Self {
        Self {
            entity,
            row,
            children: RefCell::new(RelationMap::new()),
        }
    }

    /// Decode this node as a typed record.
    pub fn decode<T: EntityKind>(&self) -> Result<T, HydrateError> {
        if !std::ptr::eq(self.entity, T::MODEL) {
            return Err(HydrateError::EntityMismatch {
                actual: self.entity.entity_name,
                requested: T::MODEL.entity_name,
            });
        }
        T::from_row(&self.row)
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<Value> {
        self.row.get(name).cloned()
    }

    /// A hydrated relation of this node, if that relation was loaded.
    #[must_use]
    pub fn related(&self, name: &str) -> Option<RelationSlot> {
        self.children.borrow().get(name).cloned()
    }

    pub(crate) fn attach(&self, name: impl Into<String>, slot: RelationSlot) {
        self.children.borrow_mut().insert(name.into(), slot);
    }
}

///
/// Hydrated
///
/// One typed root record plus its hydrated relation graph. The raw row is
/// kept so prefetch levels can extract identifiers without re-decoding.
///

#[derive(Debug)]
pub struct Hydrated<E> {
    pub record: E,
    pub(crate) row: Row,
    relations: RelationMap,
}

impl<E> Hydrated<E> {
    pub(crate) fn new(record: E, row: Row) -> Self {
        Self {
            record,
            row,
            relations: RelationMap::new(),
        }
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<Value> {
        self.row.get(name).cloned()
    }

    #[must_use]
    pub fn related(&self, name: &str) -> Option<&RelationSlot> {
        self.relations.get(name)
    }

    /// To-one relation shortcut: the node, if loaded and non-null.
    #[must_use]
    pub fn one(&self, name: &str) -> Option<Rc<RelatedNode>> {
        match self.relations.get(name)? {
            RelationSlot::One(node) => node.clone(),
            RelationSlot::Many(_) => None,
        }
    }

    /// To-many relation shortcut: the ordered children, if loaded.
    #[must_use]
    pub fn many(&self, name: &str) -> Option<&[Rc<RelatedNode>]> {
        match self.relations.get(name)? {
            RelationSlot::Many(nodes) => Some(nodes),
            RelationSlot::One(_) => None,
        }
    }

    pub(crate) fn attach(&mut self, name: impl Into<String>, slot: RelationSlot) {
        self.relations.insert(name.into(), slot);
    }

    pub(crate) fn relations(&self) -> &RelationMap {
        &self.relations
    }
}
