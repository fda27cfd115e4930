///
/// RelationModel
///
/// Declared relation from one entity to another, used by the join/prefetch
/// planner and the hydration engine.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RelationModel {
    /// Relation name as used in join/prefetch paths and on hydrated graphs.
    pub name: &'static str,
    pub target_entity: &'static str,
    pub kind: RelationKind,
}

///
/// RelationKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RelationKind {
    /// Forward foreign key: this entity holds the referencing column.
    ManyToOne { source_column: &'static str },
    /// Reverse foreign key: the target entity holds `remote_field`.
    OneToMany { remote_field: &'static str },
    /// Link through a join entity carrying both keys.
    ManyToMany {
        through: &'static str,
        source_key: &'static str,
        target_key: &'static str,
    },
}
