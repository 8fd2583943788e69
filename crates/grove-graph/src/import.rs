use crate::builder::{BasicGraphBuilder, GraphBuilder};
use crate::transforms::{
    AttachProviderConfigTransformer, ConfigTransformer, DisableProviderTransformer,
    GraphTransformer, ImportProviderValidateTransformer, ImportStateTransformer,
    MissingProviderTransformer, PruneProviderTransformer, ProviderTransformer, RootTransformer,
    TransitiveReductionTransformer,
};
use crate::{Graph, GraphError, ImportTarget, ProviderFlavor, provider_factory};
use grove_config::{ModulePath, ModuleTree};
use std::sync::Arc;

pub const IMPORT_GRAPH_BUILDER: &str = "ImportGraphBuilder";

/// Builds the graph used to import existing objects into state.
#[derive(Clone, Debug, Default)]
pub struct ImportGraphBuilder {
    /// Objects to import.
    pub targets: Vec<ImportTarget>,
    /// Configuration; `None` builds against the empty module tree.
    pub module: Option<Arc<ModuleTree>>,
    /// Provider types that can be instantiated.
    pub providers: Vec<String>,
}

impl ImportGraphBuilder {
    pub fn new(targets: Vec<ImportTarget>, providers: Vec<String>) -> Self {
        Self {
            targets,
            module: None,
            providers,
        }
    }

    pub fn with_module(mut self, module: Arc<ModuleTree>) -> Self {
        self.module = Some(module);
        self
    }

    /// The pipeline, in the order it runs.
    pub fn steps(&self) -> Vec<Box<dyn GraphTransformer>> {
        let module = self
            .module
            .clone()
            .unwrap_or_else(|| Arc::new(ModuleTree::empty()));
        // Import only writes state, so providers take part in apply.
        let factory = provider_factory(ProviderFlavor::Apply);

        vec![
            Box::new(ConfigTransformer::new(Arc::clone(&module)).with_provider_factory(Arc::clone(&factory))),
            Box::new(ImportStateTransformer::new(self.targets.clone())),
            Box::new(MissingProviderTransformer::new(self.providers.clone(), factory)),
            Box::new(ProviderTransformer),
            Box::new(DisableProviderTransformer),
            Box::new(PruneProviderTransformer),
            Box::new(AttachProviderConfigTransformer::new(module)),
            Box::new(ImportProviderValidateTransformer),
            Box::new(RootTransformer),
            Box::new(TransitiveReductionTransformer),
        ]
    }
}

impl GraphBuilder for ImportGraphBuilder {
    fn build(&self, path: &ModulePath) -> Result<Graph, GraphError> {
        BasicGraphBuilder::new(IMPORT_GRAPH_BUILDER, self.steps())
            .with_validation(true)
            .build(path)
    }
}
