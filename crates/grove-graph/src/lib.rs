//! Dependency graphs for grove.
//!
//! A builder runs an ordered list of transformers over an empty graph:
//! materialise configuration -> add imports -> resolve providers -> attach
//! provider configuration -> validate -> add root -> reduce.

pub mod builder;
pub mod diagnostics;
mod dot;
pub mod errors;
pub mod graph;
pub mod import;
pub mod lint;
pub mod nodes;
pub mod transforms;

pub use builder::*;
pub use diagnostics::*;
pub use errors::*;
pub use graph::*;
pub use import::*;
pub use lint::*;
pub use nodes::*;
pub use transforms::*;
