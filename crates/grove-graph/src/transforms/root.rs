use super::GraphTransformer;
use crate::{Graph, GraphError, NodeKind};
use grove_config::ModulePath;

/// Adds the root sentinel depending on every node nothing else depends on.
/// Does nothing when a root is already present.
#[derive(Clone, Debug, Default)]
pub struct RootTransformer;

impl GraphTransformer for RootTransformer {
    fn name(&self) -> &str {
        "RootTransformer"
    }

    fn transform(&self, graph: &mut Graph, _path: &ModulePath) -> Result<(), GraphError> {
        if graph.nodes().any(|node| node.kind.is_root()) {
            return Ok(());
        }

        let roots: Vec<String> = graph.roots().into_iter().map(str::to_string).collect();
        let root = graph.add(NodeKind::Root)?;
        for id in roots {
            graph.connect(&root, &id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ProviderFlavor, ProviderNode, ROOT_NODE_NAME};

    #[test]
    fn root_transformer_empty_graph_expected_only_root() {
        let mut graph = Graph::new();
        RootTransformer
            .transform(&mut graph, &ModulePath::root())
            .expect("transform should succeed");
        assert_eq!(graph.to_string(), "root\n");
    }

    #[test]
    fn root_transformer_twice_expected_no_change() {
        let mut graph = Graph::new();
        graph
            .add(NodeKind::Provider(ProviderNode::new(
                "aws",
                ModulePath::root(),
                ProviderFlavor::Apply,
            )))
            .expect("add provider");

        RootTransformer
            .transform(&mut graph, &ModulePath::root())
            .expect("first run");
        let once = graph.clone();
        RootTransformer
            .transform(&mut graph, &ModulePath::root())
            .expect("second run");

        assert_eq!(graph, once);
        assert_eq!(graph.roots(), vec![ROOT_NODE_NAME]);
        assert!(graph.has_edge("root", "provider.aws"));
    }
}
