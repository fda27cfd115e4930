pub mod join;
pub mod prefetch;

pub use join::{JoinMap, JoinSpec, resolve_join_path};
pub use prefetch::{PrefetchPlan, PrefetchSegment};
