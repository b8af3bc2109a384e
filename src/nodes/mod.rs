//! Built-in node kinds and the registry that creates them by name.

pub mod filter;
pub mod movie;
pub(crate) mod params;
pub mod pattern;
pub mod registry;

pub use filter::{FilterNode, FilterOp, FilterParams};
pub use movie::{MovieNode, MovieParams, MovieStatus};
pub use pattern::{PatternKind, PatternNode, PatternParams};
pub use registry::{NodeFactory, NodeRegistry};
