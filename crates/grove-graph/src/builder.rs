use crate::lint::validate_structure_or_raise;
use crate::transforms::GraphTransformer;
use crate::{Graph, GraphError};
use grove_config::ModulePath;
use std::fmt;
use tracing::{debug, info_span, warn};

/// Lifecycle of a single build. `Failed` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildState {
    Initialising,
    Stepping,
    Validating,
    Ready,
    Failed,
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Initialising => "initialising",
            Self::Stepping => "stepping",
            Self::Validating => "validating",
            Self::Ready => "ready",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

pub trait GraphBuilder {
    fn build(&self, path: &ModulePath) -> Result<Graph, GraphError>;
}

/// Runs an ordered list of transformers against an empty graph, stopping at
/// the first failure.
pub struct BasicGraphBuilder {
    pub steps: Vec<Box<dyn GraphTransformer>>,
    pub validate: bool,
    pub name: String,
}

impl BasicGraphBuilder {
    pub fn new(name: impl Into<String>, steps: Vec<Box<dyn GraphTransformer>>) -> Self {
        Self {
            steps,
            validate: false,
            name: name.into(),
        }
    }

    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    fn enter(&self, state: &mut BuildState, next: BuildState) {
        debug!(builder = %self.name, from = %state, to = %next, "build state changed");
        *state = next;
    }

    fn fail(&self, state: &mut BuildState, step: &str, error: GraphError) -> GraphError {
        self.enter(state, BuildState::Failed);
        warn!(builder = %self.name, step, error = %error, "graph build failed");
        GraphError::step(self.name.clone(), step, error)
    }
}

impl GraphBuilder for BasicGraphBuilder {
    fn build(&self, path: &ModulePath) -> Result<Graph, GraphError> {
        let span = info_span!("graph_build", builder = %self.name, path = %path);
        let _entered = span.enter();

        let mut state = BuildState::Initialising;
        let mut graph = Graph::new();

        self.enter(&mut state, BuildState::Stepping);
        for step in &self.steps {
            debug!(step = step.name(), nodes = graph.node_count(), "running step");
            if let Err(error) = step.transform(&mut graph, path) {
                return Err(self.fail(&mut state, step.name(), error));
            }
        }

        if self.validate {
            self.enter(&mut state, BuildState::Validating);
            match validate_structure_or_raise(&graph, &[]) {
                Ok(warnings) => {
                    for warning in &warnings {
                        warn!(builder = %self.name, rule = %warning.rule, "{}", warning.message);
                    }
                }
                Err(error) => return Err(self.fail(&mut state, "validate", error)),
            }
        }

        self.enter(&mut state, BuildState::Ready);
        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "graph build complete"
        );
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        DisableProviderTransformer, ErrorKind, Node, NodeKind, ProviderFlavor, ProviderNode,
        RootTransformer,
    };
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Record {
        label: &'static str,
        log: Rc<RefCell<Vec<&'static str>>>,
    }

    impl GraphTransformer for Record {
        fn name(&self) -> &str {
            self.label
        }

        fn transform(&self, _graph: &mut Graph, _path: &ModulePath) -> Result<(), GraphError> {
            self.log.borrow_mut().push(self.label);
            Ok(())
        }
    }

    struct Fail;

    impl GraphTransformer for Fail {
        fn name(&self) -> &str {
            "Fail"
        }

        fn transform(&self, _graph: &mut Graph, _path: &ModulePath) -> Result<(), GraphError> {
            Err(GraphError::Input("bad input".to_string()))
        }
    }

    struct AddProvider(&'static str);

    impl GraphTransformer for AddProvider {
        fn name(&self) -> &str {
            "AddProvider"
        }

        fn transform(&self, graph: &mut Graph, _path: &ModulePath) -> Result<(), GraphError> {
            graph.add(NodeKind::Provider(ProviderNode::new(
                self.0,
                ModulePath::root(),
                ProviderFlavor::Apply,
            )))?;
            Ok(())
        }
    }

    #[test]
    fn basic_builder_steps_expected_declared_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let steps: Vec<Box<dyn GraphTransformer>> = ["first", "second", "third"]
            .into_iter()
            .map(|label| {
                Box::new(Record {
                    label,
                    log: Rc::clone(&log),
                }) as Box<dyn GraphTransformer>
            })
            .collect();

        BasicGraphBuilder::new("Test", steps)
            .build(&ModulePath::root())
            .expect("build should succeed");
        assert_eq!(*log.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn basic_builder_failing_step_expected_abort_with_attribution() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let steps: Vec<Box<dyn GraphTransformer>> = vec![
            Box::new(Fail),
            Box::new(Record {
                label: "after",
                log: Rc::clone(&log),
            }),
        ];

        let error = BasicGraphBuilder::new("Test", steps)
            .build(&ModulePath::root())
            .expect_err("build should fail");
        assert_eq!(error.to_string(), "Test: Fail: input error: bad input");
        assert_eq!(error.kind(), ErrorKind::Input);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn basic_builder_validation_multiple_roots_expected_structural_error() {
        let steps: Vec<Box<dyn GraphTransformer>> =
            vec![Box::new(AddProvider("aws")), Box::new(AddProvider("gcp"))];

        let error = BasicGraphBuilder::new("Test", steps)
            .with_validation(true)
            .build(&ModulePath::root())
            .expect_err("two roots should fail validation");
        assert_eq!(error.kind(), ErrorKind::Structural);
        assert!(error.to_string().starts_with("Test: validate: "));
        assert_eq!(error.diagnostics()[0].rule, "single_root");
    }

    #[test]
    fn basic_builder_without_validation_expected_graph_returned() {
        let steps: Vec<Box<dyn GraphTransformer>> =
            vec![Box::new(AddProvider("aws")), Box::new(AddProvider("gcp"))];
        let graph = BasicGraphBuilder::new("Test", steps)
            .build(&ModulePath::root())
            .expect("unvalidated build should succeed");
        assert_eq!(graph.node_count(), 2);
    }

    #[test]
    fn basic_builder_with_root_expected_valid() {
        let steps: Vec<Box<dyn GraphTransformer>> = vec![
            Box::new(AddProvider("aws")),
            Box::new(AddProvider("gcp")),
            Box::new(RootTransformer),
        ];
        let graph = BasicGraphBuilder::new("Test", steps)
            .with_validation(true)
            .build(&ModulePath::root())
            .expect("rooted build should validate");
        assert_eq!(graph.roots(), vec!["root"]);
    }

    /// Stores a provider under an identity that does not match its kind.
    struct Misfile;

    impl GraphTransformer for Misfile {
        fn name(&self) -> &str {
            "Misfile"
        }

        fn transform(&self, graph: &mut Graph, _path: &ModulePath) -> Result<(), GraphError> {
            let kind = NodeKind::Provider(ProviderNode::new(
                "aws",
                ModulePath::root(),
                ProviderFlavor::Apply,
            ));
            let slot = graph.dag.add_node(Node {
                id: "provider.gcp".to_string(),
                kind,
            });
            graph.index.insert("provider.gcp".to_string(), slot);
            Ok(())
        }
    }

    #[test]
    fn basic_builder_validation_mismatched_identity_expected_node_identity_error() {
        let steps: Vec<Box<dyn GraphTransformer>> = vec![Box::new(Misfile)];

        let error = BasicGraphBuilder::new("Test", steps)
            .with_validation(true)
            .build(&ModulePath::root())
            .expect_err("misfiled node should fail validation");
        assert_eq!(error.kind(), ErrorKind::Structural);
        let identity = error
            .diagnostics()
            .iter()
            .find(|d| d.rule == "node_identity")
            .expect("node_identity should be reported");
        assert_eq!(identity.node_id.as_deref(), Some("provider.gcp"));
        assert_eq!(
            identity.message,
            "node stored as 'provider.gcp' is identified as 'provider.aws'"
        );
    }

    #[test]
    fn basic_builder_validation_disabled_provider_expected_warning_not_failure() {
        let steps: Vec<Box<dyn GraphTransformer>> = vec![
            Box::new(AddProvider("aws")),
            Box::new(DisableProviderTransformer),
            Box::new(RootTransformer),
        ];
        let graph = BasicGraphBuilder::new("Test", steps)
            .with_validation(true)
            .build(&ModulePath::root())
            .expect("warnings should not fail validation");

        let aws = graph
            .get("provider.aws")
            .and_then(|node| node.kind.as_provider())
            .expect("provider.aws should remain");
        assert!(aws.disabled);
    }
}
