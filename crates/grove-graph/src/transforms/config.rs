use super::GraphTransformer;
use crate::{Graph, GraphError, NodeKind, ProviderFactory, ResourceNode};
use grove_config::{ModulePath, ModuleTree};
use std::sync::Arc;
use tracing::debug;

/// Legacy configuration loader: one resource node per resource block in the
/// scoped module and its descendants, plus a provider node per provider block
/// when a factory is given. Counted resources stay a single node.
#[derive(Clone)]
pub struct ConfigTransformer {
    pub module: Arc<ModuleTree>,
    pub provider_factory: Option<ProviderFactory>,
}

impl ConfigTransformer {
    pub fn new(module: Arc<ModuleTree>) -> Self {
        Self {
            module,
            provider_factory: None,
        }
    }

    pub fn with_provider_factory(mut self, factory: ProviderFactory) -> Self {
        self.provider_factory = Some(factory);
        self
    }
}

impl GraphTransformer for ConfigTransformer {
    fn name(&self) -> &str {
        "ConfigTransformer"
    }

    fn transform(&self, graph: &mut Graph, path: &ModulePath) -> Result<(), GraphError> {
        if self.module.is_empty() {
            return Ok(());
        }
        self.module.validate()?;

        let Some(scope) = self.module.child(path) else {
            return Err(GraphError::Input(format!(
                "module {path} is not present in the configuration"
            )));
        };

        for module in scope.descendants() {
            for resource in &module.config.resources {
                let id = graph.add(NodeKind::Resource(ResourceNode {
                    address: resource.address(&module.path),
                    provider: resource.provider.clone(),
                }))?;
                debug!(node = %id, "added resource from configuration");
            }

            let Some(factory) = &self.provider_factory else {
                continue;
            };
            for provider in &module.config.providers {
                let id = graph.add(NodeKind::Provider(factory(
                    &provider.full_name(),
                    &module.path,
                )))?;
                debug!(node = %id, "added configured provider");
            }
        }

        Ok(())
    }
}
