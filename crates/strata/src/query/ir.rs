use crate::{
    plan::JoinSpec,
    query::{expr::Assign, filter::FilterNode},
};
use serde::Serialize;
use std::collections::BTreeMap;

///
/// Operation
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Select,
    Update,
    Delete,
}

///
/// LockMode
///
/// Row-lock request forwarded verbatim to the engine.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LockMode {
    Update,
    Share,
}

///
/// OrderDirection
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl OrderDirection {
    #[must_use]
    pub const fn flipped(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

///
/// AggregateOp
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, derive_more::Display)]
#[serde(rename_all = "lowercase")]
pub enum AggregateOp {
    #[display("count")]
    Count,
    #[display("sum")]
    Sum,
    #[display("avg")]
    Avg,
    #[display("min")]
    Min,
    #[display("max")]
    Max,
}

///
/// AggregateSpec
///
/// One annotated aggregate. The default alias is `<field>__<op>`; `alias`
/// overrides it.
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct AggregateSpec {
    pub op: AggregateOp,
    pub field: String,
    pub alias: String,
    #[serde(skip_serializing_if = "is_false")]
    pub distinct: bool,
}

#[expect(clippy::trivially_copy_pass_by_ref)]
fn is_false(v: &bool) -> bool {
    !*v
}

impl AggregateSpec {
    fn new(op: AggregateOp, field: impl Into<String>) -> Self {
        let field = field.into();
        let alias = format!("{field}__{op}");
        Self {
            op,
            field,
            alias,
            distinct: false,
        }
    }

    #[must_use]
    pub fn count(field: impl Into<String>) -> Self {
        Self::new(AggregateOp::Count, field)
    }

    #[must_use]
    pub fn sum(field: impl Into<String>) -> Self {
        Self::new(AggregateOp::Sum, field)
    }

    #[must_use]
    pub fn avg(field: impl Into<String>) -> Self {
        Self::new(AggregateOp::Avg, field)
    }

    #[must_use]
    pub fn min(field: impl Into<String>) -> Self {
        Self::new(AggregateOp::Min, field)
    }

    #[must_use]
    pub fn max(field: impl Into<String>) -> Self {
        Self::new(AggregateOp::Max, field)
    }

    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    #[must_use]
    pub const fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }
}

///
/// QueryIr
///
/// Canonical engine-agnostic representation of one operation. Plain nested
/// data: optional sections are omitted from the wire form entirely rather
/// than serialized as null.
///

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QueryIr {
    pub op: Operation,
    pub table: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_tree: Option<FilterNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub joins: Option<Vec<JoinSpec>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregates: Option<Vec<AggregateSpec>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_by: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub having: Option<FilterNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_by: Option<Vec<(String, OrderDirection)>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distinct: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cols: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock: Option<LockMode>,
    /// Update assignments; values may embed expression trees.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<BTreeMap<String, Assign>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exists: Option<bool>,
}

impl QueryIr {
    /// Empty IR skeleton for `op` on `table`.
    #[must_use]
    pub fn new(op: Operation, table: impl Into<String>) -> Self {
        Self {
            op,
            table: table.into(),
            filter_tree: None,
            joins: None,
            aggregates: None,
            group_by: None,
            having: None,
            order_by: None,
            limit: None,
            offset: None,
            distinct: None,
            cols: None,
            lock: None,
            values: None,
            count: None,
            exists: None,
        }
    }
}
