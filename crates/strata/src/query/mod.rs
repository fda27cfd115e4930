pub mod expr;
pub mod filter;
pub mod ir;
pub mod lookup;
pub mod spec;


pub use expr::{Assign, EXPR_MARKER, Expression, col};
pub use filter::{Condition, Filter, FilterNode, Operator};
pub use ir::{AggregateOp, AggregateSpec, LockMode, Operation, OrderDirection, QueryIr};
pub use lookup::{allowed_lookups, split_lookup_key};
pub use spec::{QuerySpec, ResultShape};
