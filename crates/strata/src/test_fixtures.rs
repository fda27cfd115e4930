//! Shared test schema: a small blog domain with forward, reverse, and
//! many-to-many relations, registered once into the global registry, plus
//! a scripted stub engine.

use crate::{
    error::{EngineError, HydrateError},
    hydrate::RawResult,
    model::{
        ColumnModel, EntityKind, EntityModel, FieldCategory, ForeignKeyModel, Registry,
        RelationKind, RelationModel,
    },
    query::QueryIr,
    session::ExecuteEngine,
    value::{Row, RowExt, Value},
};
use std::{
    cell::RefCell,
    collections::VecDeque,
    sync::Once,
};

const fn scalar(name: &'static str, category: FieldCategory) -> ColumnModel {
    ColumnModel {
        name,
        category,
        nullable: false,
        primary_key: false,
        foreign_key: None,
    }
}

const fn nullable(name: &'static str, category: FieldCategory) -> ColumnModel {
    ColumnModel {
        name,
        category,
        nullable: true,
        primary_key: false,
        foreign_key: None,
    }
}

const fn pk(name: &'static str) -> ColumnModel {
    ColumnModel {
        name,
        category: FieldCategory::Numeric,
        nullable: false,
        primary_key: true,
        foreign_key: None,
    }
}

const fn fk(
    name: &'static str,
    target_entity: &'static str,
    join_column: &'static str,
    nullable: bool,
) -> ColumnModel {
    ColumnModel {
        name,
        category: FieldCategory::Numeric,
        nullable,
        primary_key: false,
        foreign_key: Some(ForeignKeyModel {
            target_entity,
            target_field: "id",
            join_column,
        }),
    }
}

pub(crate) static COMPANY: EntityModel = EntityModel {
    entity_name: "company",
    table: "companies",
    fields: &[pk("id"), scalar("name", FieldCategory::Text)],
    relations: &[],
};

pub(crate) static USER: EntityModel = EntityModel {
    entity_name: "user",
    table: "users",
    fields: &[
        pk("id"),
        scalar("name", FieldCategory::Text),
        nullable("email", FieldCategory::Text),
        scalar("age", FieldCategory::Numeric),
        scalar("is_active", FieldCategory::Bool),
        scalar("created_at", FieldCategory::DateTime),
        nullable("birth_date", FieldCategory::DateTime),
        fk("company", "company", "company_id", true),
        nullable("company_id", FieldCategory::Numeric),
    ],
    relations: &[RelationModel {
        name: "posts",
        target_entity: "post",
        kind: RelationKind::OneToMany {
            remote_field: "author_id",
        },
    }],
};

pub(crate) static POST: EntityModel = EntityModel {
    entity_name: "post",
    table: "posts",
    fields: &[
        pk("id"),
        scalar("title", FieldCategory::Text),
        fk("author", "user", "author_id", false),
        scalar("author_id", FieldCategory::Numeric),
    ],
    relations: &[
        RelationModel {
            name: "author",
            target_entity: "user",
            kind: RelationKind::ManyToOne {
                source_column: "author_id",
            },
        },
        RelationModel {
            name: "comments",
            target_entity: "comment",
            kind: RelationKind::OneToMany {
                remote_field: "post_id",
            },
        },
        RelationModel {
            name: "tags",
            target_entity: "tag",
            kind: RelationKind::ManyToMany {
                through: "post_tag",
                source_key: "post_id",
                target_key: "tag_id",
            },
        },
    ],
};

pub(crate) static COMMENT: EntityModel = EntityModel {
    entity_name: "comment",
    table: "comments",
    fields: &[
        pk("id"),
        fk("post", "post", "post_id", false),
        scalar("post_id", FieldCategory::Numeric),
        scalar("body", FieldCategory::Text),
    ],
    relations: &[RelationModel {
        name: "replies",
        target_entity: "reply",
        kind: RelationKind::OneToMany {
            remote_field: "comment_id",
        },
    }],
};

pub(crate) static REPLY: EntityModel = EntityModel {
    entity_name: "reply",
    table: "replies",
    fields: &[
        pk("id"),
        scalar("comment_id", FieldCategory::Numeric),
        scalar("text", FieldCategory::Text),
    ],
    relations: &[],
};

pub(crate) static TAG: EntityModel = EntityModel {
    entity_name: "tag",
    table: "tags",
    fields: &[pk("id"), scalar("label", FieldCategory::Text)],
    relations: &[],
};

pub(crate) static POST_TAG: EntityModel = EntityModel {
    entity_name: "post_tag",
    table: "post_tags",
    fields: &[
        pk("id"),
        scalar("post_id", FieldCategory::Numeric),
        scalar("tag_id", FieldCategory::Numeric),
    ],
    relations: &[],
};

/// Register the fixture schema into the global registry, once per process,
/// and wire up test logging (`RUST_LOG` controls verbosity).
pub(crate) fn init() {
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();

        let registry = Registry::global();
        for model in [
            &COMPANY, &USER, &POST, &COMMENT, &REPLY, &TAG, &POST_TAG,
        ] {
            registry.register(model).expect("fixture registers");
        }
        registry.finalize().expect("fixture schema finalizes");
    });
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct User {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub age: i64,
}

impl EntityKind for User {
    const MODEL: &'static EntityModel = &USER;

    fn from_row(row: &Row) -> Result<Self, HydrateError> {
        Ok(Self {
            id: row.int("id")?,
            name: row.text("name")?,
            email: row.opt_text("email")?,
            age: row.int("age")?,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Post {
    pub id: i64,
    pub title: String,
    pub author_id: Option<i64>,
}

impl EntityKind for Post {
    const MODEL: &'static EntityModel = &POST;

    fn from_row(row: &Row) -> Result<Self, HydrateError> {
        Ok(Self {
            id: row.int("id")?,
            title: row.text("title")?,
            author_id: row.opt_int("author_id")?,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub body: String,
}

impl EntityKind for Comment {
    const MODEL: &'static EntityModel = &COMMENT;

    fn from_row(row: &Row) -> Result<Self, HydrateError> {
        Ok(Self {
            id: row.int("id")?,
            post_id: row.int("post_id")?,
            body: row.text("body")?,
        })
    }
}

/// Build a row from literal pairs.
pub(crate) fn row<const N: usize>(pairs: [(&str, Value); N]) -> Row {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

///
/// StubEngine
///
/// Scripted execution capability: records every IR it receives and replays
/// queued responses in order. An exhausted queue answers with empty rows;
/// a queued error propagates as an engine failure.
///

pub(crate) struct StubEngine {
    responses: RefCell<VecDeque<Result<RawResult, String>>>,
    pub(crate) calls: RefCell<Vec<QueryIr>>,
}

impl StubEngine {
    pub(crate) fn new(responses: impl IntoIterator<Item = RawResult>) -> Self {
        Self {
            responses: RefCell::new(responses.into_iter().map(Ok).collect()),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn empty() -> Self {
        Self::new([])
    }

    pub(crate) fn failing(message: &str) -> Self {
        Self {
            responses: RefCell::new(VecDeque::from([Err(message.to_string())])),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl ExecuteEngine for StubEngine {
    async fn execute(&self, ir: &QueryIr) -> Result<RawResult, EngineError> {
        self.calls.borrow_mut().push(ir.clone());
        match self.responses.borrow_mut().pop_front() {
            None => Ok(RawResult::Rows(Vec::new())),
            Some(Ok(result)) => Ok(result),
            Some(Err(message)) => Err(EngineError::message(message)),
        }
    }
}
