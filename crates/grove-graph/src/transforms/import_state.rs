use super::GraphTransformer;
use crate::{Graph, GraphError, ImportNode, ImportTarget, NodeKind};
use grove_config::{ModulePath, ResourceMode};
use std::collections::BTreeMap;
use tracing::debug;

/// Adds one import node per target, in target order. An import depends on the
/// configured resource it lands in when configuration declares one.
#[derive(Clone, Debug, Default)]
pub struct ImportStateTransformer {
    pub targets: Vec<ImportTarget>,
}

impl ImportStateTransformer {
    pub fn new(targets: Vec<ImportTarget>) -> Self {
        Self { targets }
    }

    fn check_targets(&self) -> Result<(), GraphError> {
        let mut problems = Vec::new();
        let mut seen: BTreeMap<String, usize> = BTreeMap::new();

        for target in &self.targets {
            if target.addr.mode == ResourceMode::Data {
                problems.push(format!("{}: data sources cannot be imported", target.addr));
            }
            if target.id.trim().is_empty() {
                problems.push(format!("{}: import id must not be empty", target.addr));
            }
            *seen.entry(target.addr.to_string()).or_default() += 1;
        }
        for (addr, count) in seen {
            if count > 1 {
                problems.push(format!("{addr}: imported {count} times, each address may be imported once"));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(GraphError::Input(problems.join("; ")))
        }
    }

    /// A target naming a provider must agree with the provider its configured
    /// resource already uses.
    fn check_providers(&self, graph: &Graph) -> Result<(), GraphError> {
        let problems: Vec<String> = self
            .targets
            .iter()
            .filter_map(|target| {
                let requested = target.provider.as_deref()?;
                let resource_id = target.addr.without_index().to_string();
                let node = graph.get(&resource_id)?;
                if !matches!(node.kind, NodeKind::Resource(_)) {
                    return None;
                }
                let (configured, _) = node.kind.provided_by()?;
                (configured != requested).then(|| {
                    format!(
                        "{}: import provider {requested} conflicts with provider {configured} of {resource_id}",
                        target.addr
                    )
                })
            })
            .collect();

        if problems.is_empty() {
            Ok(())
        } else {
            Err(GraphError::Input(problems.join("; ")))
        }
    }
}

impl GraphTransformer for ImportStateTransformer {
    fn name(&self) -> &str {
        "ImportStateTransformer"
    }

    fn transform(&self, graph: &mut Graph, _path: &ModulePath) -> Result<(), GraphError> {
        self.check_targets()?;
        self.check_providers(graph)?;

        for target in &self.targets {
            let resource_id = target.addr.without_index().to_string();
            let resource = match graph.get(&resource_id).map(|node| &node.kind) {
                Some(NodeKind::Resource(resource)) => Some(resource),
                _ => None,
            };
            let configured = resource.is_some();

            // An import goes through the provider its configured resource uses.
            let mut target = target.clone();
            if target.provider.is_none() {
                target.provider = resource.and_then(|resource| resource.provider.clone());
            }

            let id = graph.add(NodeKind::Import(ImportNode { target }))?;
            if configured {
                graph.connect(&id, &resource_id)?;
            }
            debug!(node = %id, configured, "added import node");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ResourceNode;
    use grove_config::ResourceAddress;

    fn target(addr: &str, id: &str) -> ImportTarget {
        ImportTarget::new(addr.parse::<ResourceAddress>().expect("address should parse"), id)
    }

    #[test]
    fn import_state_configured_resource_expected_edge_to_resource() {
        let mut graph = Graph::new();
        graph
            .add(NodeKind::Resource(ResourceNode {
                address: "aws_instance.web".parse().expect("address should parse"),
                provider: None,
            }))
            .expect("add resource");

        ImportStateTransformer::new(vec![target("aws_instance.web[1]", "i-123")])
            .transform(&mut graph, &ModulePath::root())
            .expect("transform should succeed");

        assert!(graph.has_edge("aws_instance.web[1] (import id: i-123)", "aws_instance.web"));
    }

    #[test]
    fn import_state_resource_with_alias_expected_target_inherits_provider() {
        let mut graph = Graph::new();
        graph
            .add(NodeKind::Resource(ResourceNode {
                address: "aws_instance.web".parse().expect("address should parse"),
                provider: Some("aws.west".to_string()),
            }))
            .expect("add resource");

        ImportStateTransformer::new(vec![target("aws_instance.web", "i-123")])
            .transform(&mut graph, &ModulePath::root())
            .expect("transform should succeed");

        let provider = graph
            .get("aws_instance.web (import id: i-123)")
            .and_then(|node| node.kind.provided_by())
            .map(|(name, _)| name);
        assert_eq!(provider.as_deref(), Some("aws.west"));
    }

    #[test]
    fn import_state_target_provider_conflicts_with_resource_expected_input_error() {
        let mut graph = Graph::new();
        graph
            .add(NodeKind::Resource(ResourceNode {
                address: "aws_instance.web".parse().expect("address should parse"),
                provider: Some("aws.west".to_string()),
            }))
            .expect("add resource");

        let error = ImportStateTransformer::new(vec![
            target("aws_instance.web", "i-123").with_provider("aws.east"),
        ])
        .transform(&mut graph, &ModulePath::root())
        .expect_err("conflicting provider should fail");

        assert_eq!(error.kind(), crate::ErrorKind::Input);
        assert_eq!(
            error.to_string(),
            "input error: aws_instance.web: import provider aws.east conflicts with provider aws.west of aws_instance.web"
        );
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn import_state_target_provider_matches_default_expected_accepted() {
        let mut graph = Graph::new();
        graph
            .add(NodeKind::Resource(ResourceNode {
                address: "aws_instance.web".parse().expect("address should parse"),
                provider: None,
            }))
            .expect("add resource");

        ImportStateTransformer::new(vec![target("aws_instance.web", "i-123").with_provider("aws")])
            .transform(&mut graph, &ModulePath::root())
            .expect("matching provider should succeed");

        assert!(graph.has_edge("aws_instance.web (import id: i-123)", "aws_instance.web"));
    }

    #[test]
    fn import_state_unconfigured_expected_standalone_node() {
        let mut graph = Graph::new();
        ImportStateTransformer::new(vec![target("aws_instance.web", "i-123")])
            .transform(&mut graph, &ModulePath::root())
            .expect("transform should succeed");

        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn import_state_duplicate_destination_expected_input_error() {
        let mut graph = Graph::new();
        let error = ImportStateTransformer::new(vec![
            target("aws_instance.web", "i-1"),
            target("aws_instance.web", "i-2"),
        ])
        .transform(&mut graph, &ModulePath::root())
        .expect_err("duplicates should fail");

        assert_eq!(error.kind(), crate::ErrorKind::Input);
        assert!(error.to_string().contains("aws_instance.web: imported 2 times"));
        assert!(graph.is_empty());
    }

    #[test]
    fn import_state_data_source_expected_input_error() {
        let mut graph = Graph::new();
        let error = ImportStateTransformer::new(vec![target("data.aws_ami.ubuntu", "ami-1")])
            .transform(&mut graph, &ModulePath::root())
            .expect_err("data source import should fail");
        assert!(error.to_string().contains("data sources cannot be imported"));
    }
}
