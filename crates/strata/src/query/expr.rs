use crate::value::Value;
use serde::{Serialize, Serializer, ser::SerializeMap};
use std::collections::BTreeMap;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Marker key distinguishing an embedded expression from a literal mapping
/// when assignments are flattened into the IR.
pub const EXPR_MARKER: &str = "__expr__";

///
/// ArithOp
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, derive_more::Display)]
pub enum ArithOp {
    #[display("add")]
    Add,
    #[display("sub")]
    Sub,
    #[display("mul")]
    Mul,
    #[display("div")]
    Div,
}

///
/// Expression
///
/// Purely structural arithmetic tree over columns and values, used in
/// update assignments and computed projections. Never evaluated locally;
/// division by a literal zero is the engine's problem, not ours.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Expression {
    Column(String),
    Value(Value),
    Binary {
        op: ArithOp,
        lhs: Box<Self>,
        rhs: Box<Self>,
    },
    Neg(Box<Self>),
}

/// Reference a column by name (the `F` of the fluent surface).
#[must_use]
pub fn col(name: impl Into<String>) -> Expression {
    Expression::Column(name.into())
}

impl Expression {
    /// Wrap a literal.
    #[must_use]
    pub fn value(v: impl Into<Value>) -> Self {
        Self::Value(v.into())
    }

    fn binary(op: ArithOp, lhs: Self, rhs: Self) -> Self {
        Self::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Explicit combinators, mirrored by the `std::ops` overloads.
    #[must_use]
    pub fn add(self, rhs: impl Into<Self>) -> Self {
        Self::binary(ArithOp::Add, self, rhs.into())
    }

    #[must_use]
    pub fn sub(self, rhs: impl Into<Self>) -> Self {
        Self::binary(ArithOp::Sub, self, rhs.into())
    }

    #[must_use]
    pub fn mul(self, rhs: impl Into<Self>) -> Self {
        Self::binary(ArithOp::Mul, self, rhs.into())
    }

    #[must_use]
    pub fn div(self, rhs: impl Into<Self>) -> Self {
        Self::binary(ArithOp::Div, self, rhs.into())
    }

    #[must_use]
    pub fn negate(self) -> Self {
        Self::Neg(Box::new(self))
    }
}

impl Serialize for Expression {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Column(name) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", "column")?;
                map.serialize_entry("name", name)?;
                map.end()
            }
            Self::Value(value) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", "value")?;
                map.serialize_entry("value", value)?;
                map.end()
            }
            Self::Binary { op, lhs, rhs } => {
                let mut map = serializer.serialize_map(Some(4))?;
                map.serialize_entry("type", "op")?;
                map.serialize_entry("op", &op.to_string())?;
                map.serialize_entry("lhs", lhs)?;
                map.serialize_entry("rhs", rhs)?;
                map.end()
            }
            Self::Neg(operand) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", "neg")?;
                map.serialize_entry("operand", operand)?;
                map.end()
            }
        }
    }
}

impl From<Value> for Expression {
    fn from(v: Value) -> Self {
        Self::Value(v)
    }
}

impl From<i64> for Expression {
    fn from(v: i64) -> Self {
        Self::Value(v.into())
    }
}

impl From<i32> for Expression {
    fn from(v: i32) -> Self {
        Self::Value(v.into())
    }
}

impl From<f64> for Expression {
    fn from(v: f64) -> Self {
        Self::Value(v.into())
    }
}

impl From<&str> for Expression {
    fn from(v: &str) -> Self {
        Self::Value(v.into())
    }
}

impl<R: Into<Expression>> Add<R> for Expression {
    type Output = Self;

    fn add(self, rhs: R) -> Self::Output {
        Self::binary(ArithOp::Add, self, rhs.into())
    }
}

impl<R: Into<Expression>> Sub<R> for Expression {
    type Output = Self;

    fn sub(self, rhs: R) -> Self::Output {
        Self::binary(ArithOp::Sub, self, rhs.into())
    }
}

impl<R: Into<Expression>> Mul<R> for Expression {
    type Output = Self;

    fn mul(self, rhs: R) -> Self::Output {
        Self::binary(ArithOp::Mul, self, rhs.into())
    }
}

impl<R: Into<Expression>> Div<R> for Expression {
    type Output = Self;

    fn div(self, rhs: R) -> Self::Output {
        Self::binary(ArithOp::Div, self, rhs.into())
    }
}

impl Neg for Expression {
    type Output = Self;

    fn neg(self) -> Self::Output {
        self.negate()
    }
}

///
/// Assign
///
/// Update-assignment value: a plain scalar, an expression tree, or a
/// container mixing both. Serialization wraps every embedded expression
/// under the marker key so the IR consumer can tell structure from data.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Assign {
    Value(Value),
    Expr(Expression),
    List(Vec<Self>),
    Map(BTreeMap<String, Self>),
}

impl Serialize for Assign {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Value(value) => value.serialize(serializer),
            Self::Expr(expr) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(EXPR_MARKER, expr)?;
                map.end()
            }
            Self::List(items) => items.serialize(serializer),
            Self::Map(entries) => entries.serialize(serializer),
        }
    }
}

impl From<Expression> for Assign {
    fn from(expr: Expression) -> Self {
        Self::Expr(expr)
    }
}

impl From<Value> for Assign {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<i64> for Assign {
    fn from(v: i64) -> Self {
        Self::Value(v.into())
    }
}

impl From<&str> for Assign {
    fn from(v: &str) -> Self {
        Self::Value(v.into())
    }
}

impl From<bool> for Assign {
    fn from(v: bool) -> Self {
        Self::Value(v.into())
    }
}
