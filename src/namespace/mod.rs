//! Hierarchical names and the resolution of wildcard paths into resources.

pub mod names;
pub mod resolver;

pub use names::*;
pub use resolver::*;
