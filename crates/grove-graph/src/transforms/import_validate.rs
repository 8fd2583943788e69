use super::GraphTransformer;
use crate::{Diagnostic, DiagnosticReport, Graph, GraphError, NodeKind};
use grove_config::ModulePath;

/// Import runs before anything is planned, so provider configuration may only
/// use input variables and literals. Every offending reference is reported.
#[derive(Clone, Debug, Default)]
pub struct ImportProviderValidateTransformer;

impl GraphTransformer for ImportProviderValidateTransformer {
    fn name(&self) -> &str {
        "ImportProviderValidateTransformer"
    }

    fn transform(&self, graph: &mut Graph, _path: &ModulePath) -> Result<(), GraphError> {
        let mut diagnostics = Vec::new();

        for (id, provider) in graph.nodes_of(NodeKind::as_provider) {
            if provider.disabled {
                continue;
            }
            let Some(config) = &provider.config else {
                continue;
            };
            for reference in config.references() {
                if reference.is_variable() {
                    continue;
                }
                diagnostics.push(
                    Diagnostic::error(
                        "import_provider_variables",
                        format!(
                            "Provider {:?} depends on non-var {:?}. Providers for import can currently \
                             only depend on variables or must be hardcoded.",
                            provider.name,
                            reference.full_key()
                        ),
                    )
                    .with_node_id(id)
                    .with_fix("build the import graph without configuration to skip provider config"),
                );
            }
        }

        if diagnostics.is_empty() {
            Ok(())
        } else {
            Err(GraphError::Validation(DiagnosticReport::new(diagnostics)))
        }
    }
}
