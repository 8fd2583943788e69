//! Configuration model for grove: module trees, resource addresses and the
//! expressions found in provider and resource blocks.

pub mod address;
pub mod error;
pub mod expr;
pub mod load;
pub mod path;
pub mod tree;

pub use address::{ResourceAddress, ResourceMode, resource_provider_type};
pub use error::ConfigError;
pub use expr::{Expression, Reference, Template, TemplatePart};
pub use path::ModulePath;
pub use tree::{
    ModuleCall, ModuleConfig, ModuleTree, ProviderConfig, ResourceConfig, VariableConfig,
};
