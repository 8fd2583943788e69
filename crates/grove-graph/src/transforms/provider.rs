use super::{GraphTransformer, find_provider, provider_consumers, require_no_root};
use crate::{
    Diagnostic, DiagnosticReport, Graph, GraphError, NodeKind, ProviderFactory, provider_type,
};
use grove_config::{ModulePath, ModuleTree};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, trace};

/// Adds a provider node for every provider a consumer needs that no enclosing
/// module already has, as long as the provider type is available.
#[derive(Clone)]
pub struct MissingProviderTransformer {
    pub providers: Vec<String>,
    pub factory: ProviderFactory,
}

impl MissingProviderTransformer {
    pub fn new(providers: Vec<String>, factory: ProviderFactory) -> Self {
        Self { providers, factory }
    }
}

impl GraphTransformer for MissingProviderTransformer {
    fn name(&self) -> &str {
        "MissingProviderTransformer"
    }

    fn transform(&self, graph: &mut Graph, _path: &ModulePath) -> Result<(), GraphError> {
        let supported: BTreeSet<&str> = self.providers.iter().map(String::as_str).collect();

        for (consumer, provider, path) in provider_consumers(graph) {
            if find_provider(graph, &provider, &path).is_some() {
                continue;
            }
            if !supported.contains(provider_type(&provider)) {
                // Left for the provider transformer to report.
                trace!(node = %consumer, provider = %provider, "provider type is not available");
                continue;
            }

            let id = graph.add(NodeKind::Provider((self.factory)(&provider, &path)))?;
            debug!(node = %id, consumer = %consumer, "added missing provider");
        }

        Ok(())
    }
}

/// Connects every consumer to the nearest provider node it names.
#[derive(Clone, Debug, Default)]
pub struct ProviderTransformer;

impl GraphTransformer for ProviderTransformer {
    fn name(&self) -> &str {
        "ProviderTransformer"
    }

    fn transform(&self, graph: &mut Graph, _path: &ModulePath) -> Result<(), GraphError> {
        require_no_root(graph, self.name())?;

        let mut diagnostics = Vec::new();
        for (consumer, provider, path) in provider_consumers(graph) {
            match find_provider(graph, &provider, &path) {
                Some(target) => graph.connect(&consumer, &target)?,
                None => diagnostics.push(
                    Diagnostic::error(
                        "provider_resolution",
                        format!("{consumer}: provider {provider} couldn't be found"),
                    )
                    .with_node_id(consumer)
                    .with_fix(format!(
                        "make provider type '{}' available or configure the provider",
                        provider_type(&provider)
                    )),
                ),
            }
        }

        if diagnostics.is_empty() {
            Ok(())
        } else {
            Err(GraphError::Resolution(DiagnosticReport::new(diagnostics)))
        }
    }
}

/// Legacy form: marks provider nodes nothing depends on as disabled, leaving
/// them in place.
#[derive(Clone, Debug, Default)]
pub struct DisableProviderTransformer;

impl GraphTransformer for DisableProviderTransformer {
    fn name(&self) -> &str {
        "DisableProviderTransformer"
    }

    fn transform(&self, graph: &mut Graph, _path: &ModulePath) -> Result<(), GraphError> {
        let unused: Vec<String> = graph
            .nodes_of(NodeKind::as_provider)
            .map(|(id, _)| id)
            .filter(|id| graph.up_edges(id).is_empty())
            .map(str::to_string)
            .collect();

        for id in unused {
            if let Some(provider) = graph.get_mut(&id).and_then(|node| node.kind.as_provider_mut()) {
                provider.disabled = true;
                debug!(node = %id, "disabled provider with no dependents");
            }
        }
        Ok(())
    }
}

/// Removes provider nodes that nothing depends on.
#[derive(Clone, Debug, Default)]
pub struct PruneProviderTransformer;

impl GraphTransformer for PruneProviderTransformer {
    fn name(&self) -> &str {
        "PruneProviderTransformer"
    }

    fn transform(&self, graph: &mut Graph, _path: &ModulePath) -> Result<(), GraphError> {
        let prunable: Vec<(String, bool)> = graph
            .nodes_of(NodeKind::as_provider)
            .filter(|(id, _)| graph.up_edges(id).is_empty())
            .map(|(id, provider)| (id.to_string(), provider.disabled))
            .collect();

        for (id, disabled) in prunable {
            graph.remove(&id);
            debug!(node = %id, disabled, "pruned provider with no dependents");
        }
        Ok(())
    }
}

/// Attaches each provider node's configuration block, inherited from the
/// nearest enclosing module that declares it. Providers without a block keep
/// no configuration.
#[derive(Clone, Debug)]
pub struct AttachProviderConfigTransformer {
    pub module: Arc<ModuleTree>,
}

impl AttachProviderConfigTransformer {
    pub fn new(module: Arc<ModuleTree>) -> Self {
        Self { module }
    }
}

impl GraphTransformer for AttachProviderConfigTransformer {
    fn name(&self) -> &str {
        "AttachProviderConfigTransformer"
    }

    fn transform(&self, graph: &mut Graph, _path: &ModulePath) -> Result<(), GraphError> {
        for node in graph.nodes_mut() {
            let Some(provider) = node.kind.as_provider_mut() else {
                continue;
            };
            provider.config = self
                .module
                .provider_config(&provider.name, &provider.path)
                .map(|(_, config)| config.clone());
            trace!(
                node = %node.id,
                configured = provider.config.is_some(),
                "attached provider configuration"
            );
        }
        Ok(())
    }
}
