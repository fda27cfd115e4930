use crate::{
    error::{Error, FieldError},
    model::{EntityModel, Registry, RelationKind},
};

///
/// PrefetchSegment
///
/// One resolved level of a prefetch path.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PrefetchSegment {
    /// Relation name; also the slot the children attach under.
    pub relation: &'static str,
    pub kind: RelationKind,
    pub source_entity: &'static EntityModel,
    pub target_entity: &'static EntityModel,
}

///
/// PrefetchPlan
///
/// A prefetch path resolved against the catalog at build time. Execution
/// walks the segments level by level, each level batching one follow-up
/// query (three for many-to-many) keyed on the previous level's parents.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PrefetchPlan {
    pub path: String,
    pub segments: Vec<PrefetchSegment>,
}

impl PrefetchPlan {
    /// Resolve every segment of `path` against declared relations.
    pub fn resolve(
        entity: &'static EntityModel,
        path: &str,
        registry: &Registry,
    ) -> Result<Self, Error> {
        let mut current = entity;
        let mut segments = Vec::new();

        for segment in path.split("__") {
            let relation = current
                .relation(segment)
                .ok_or_else(|| FieldError::NotARelation {
                    entity: current.entity_name.to_string(),
                    name: segment.to_string(),
                })?;
            let target = registry.entity(relation.target_entity)?;

            segments.push(PrefetchSegment {
                relation: relation.name,
                kind: relation.kind,
                source_entity: current,
                target_entity: target,
            });
            current = target;
        }

        Ok(Self {
            path: path.to_string(),
            segments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::Error,
        model::Registry,
        test_fixtures::{self, POST},
    };

    #[test]
    fn resolves_each_level_against_declared_relations() {
        test_fixtures::init();
        let plan = PrefetchPlan::resolve(&POST, "comments__replies", Registry::global())
            .expect("resolves");

        assert_eq!(plan.segments.len(), 2);
        assert_eq!(plan.segments[0].relation, "comments");
        assert_eq!(plan.segments[0].target_entity.entity_name, "comment");
        assert_eq!(plan.segments[1].relation, "replies");
        assert_eq!(plan.segments[1].source_entity.entity_name, "comment");
    }

    #[test]
    fn unknown_segment_is_a_field_error() {
        test_fixtures::init();
        let err = PrefetchPlan::resolve(&POST, "comments__nonsense", Registry::global())
            .expect_err("reply level does not exist");
        assert!(matches!(
            err,
            Error::Field(FieldError::NotARelation { .. })
        ));
    }
}
