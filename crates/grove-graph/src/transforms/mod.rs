//! Graph transformers. Each one takes the graph built so far and mutates it;
//! builders run them in a fixed order.

use crate::{Graph, GraphError};
use grove_config::ModulePath;

mod config;
mod import_state;
mod import_validate;
mod provider;
mod reduction;
mod root;

pub use config::ConfigTransformer;
pub use import_state::ImportStateTransformer;
pub use import_validate::ImportProviderValidateTransformer;
pub use provider::{
    AttachProviderConfigTransformer, DisableProviderTransformer, MissingProviderTransformer,
    PruneProviderTransformer, ProviderTransformer,
};
pub use reduction::TransitiveReductionTransformer;
pub use root::RootTransformer;

pub trait GraphTransformer {
    fn name(&self) -> &str;
    fn transform(&self, graph: &mut Graph, path: &ModulePath) -> Result<(), GraphError>;
}

impl<T: GraphTransformer + ?Sized> GraphTransformer for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn transform(&self, graph: &mut Graph, path: &ModulePath) -> Result<(), GraphError> {
        (**self).transform(graph, path)
    }
}

/// Ids of nodes that need a provider, in identity order.
pub(crate) fn provider_consumers(graph: &Graph) -> Vec<(String, String, ModulePath)> {
    graph
        .nodes()
        .filter_map(|node| {
            let (provider, path) = node.kind.provided_by()?;
            Some((node.id.clone(), provider, path.clone()))
        })
        .collect()
}

/// Nearest provider node called `name`, searching from `path` up to the root.
pub(crate) fn find_provider(graph: &Graph, name: &str, path: &ModulePath) -> Option<String> {
    path.ancestors()
        .map(|ancestor| crate::provider_node_name(name, &ancestor))
        .find(|id| {
            graph
                .get(id)
                .is_some_and(|node| node.kind.as_provider().is_some())
        })
}

/// Fail fast when a step runs after the root sentinel was inserted.
pub(crate) fn require_no_root(graph: &Graph, step: &str) -> Result<(), GraphError> {
    if graph.nodes().any(|node| node.kind.is_root()) {
        return Err(GraphError::structural(crate::Diagnostic::error(
            "step_order",
            format!("{step} must run before the root transformer"),
        )));
    }
    Ok(())
}
