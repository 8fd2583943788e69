use super::GraphTransformer;
use crate::lint::{rule_acyclic, rule_self_reference};
use crate::{Diagnostic, DiagnosticReport, Edge, Graph, GraphError};
use grove_config::ModulePath;
use petgraph::algo::toposort;
use petgraph::algo::tred::{dag_to_toposorted_adjacency_list, dag_transitive_reduction_closure};
use petgraph::graph::DefaultIx;
use petgraph::visit::EdgeRef;
use tracing::{debug, trace};

/// Removes every edge `u -> w` for which another path from `u` to `w` exists.
///
/// The graph must be a DAG: self-loops and cycles are reported as structural
/// errors instead of being reduced.
#[derive(Clone, Debug, Default)]
pub struct TransitiveReductionTransformer;

impl TransitiveReductionTransformer {
    fn check_acyclic(graph: &Graph) -> Result<(), GraphError> {
        let mut diagnostics = rule_self_reference(graph);
        diagnostics.extend(rule_acyclic(graph));
        if diagnostics.is_empty() {
            Ok(())
        } else {
            Err(GraphError::Structural(DiagnosticReport::new(diagnostics)))
        }
    }
}

impl GraphTransformer for TransitiveReductionTransformer {
    fn name(&self) -> &str {
        "TransitiveReductionTransformer"
    }

    fn transform(&self, graph: &mut Graph, _path: &ModulePath) -> Result<(), GraphError> {
        Self::check_acyclic(graph)?;

        let order = toposort(&graph.dag, None).map_err(|cycle| {
            let id = &graph.dag[cycle.node_id()].id;
            GraphError::structural(
                Diagnostic::error("acyclic", format!("Cycle: {id}")).with_node_id(id.clone()),
            )
        })?;
        let (adjacency, revmap) =
            dag_to_toposorted_adjacency_list::<_, DefaultIx>(&graph.dag, &order);
        let (reduction, _) = dag_transitive_reduction_closure(&adjacency);

        let redundant: Vec<Edge> = graph
            .dag
            .edge_references()
            .filter(|edge| {
                !reduction.contains_edge(
                    revmap[edge.source().index()],
                    revmap[edge.target().index()],
                )
            })
            .map(|edge| Edge::new(&graph.dag[edge.source()].id, &graph.dag[edge.target()].id))
            .collect();

        for edge in &redundant {
            trace!(from = %edge.from, to = %edge.to, "removing redundant edge");
            graph.disconnect(&edge.from, &edge.to);
        }
        debug!(removed = redundant.len(), "transitive reduction complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NodeKind, ProviderFlavor, ProviderNode};

    fn graph_with(names: &[&str], edges: &[(&str, &str)]) -> Graph {
        let mut graph = Graph::new();
        for name in names {
            graph
                .add(NodeKind::Provider(ProviderNode::new(
                    *name,
                    ModulePath::root(),
                    ProviderFlavor::Apply,
                )))
                .expect("add node");
        }
        for (from, to) in edges {
            graph
                .connect(&format!("provider.{from}"), &format!("provider.{to}"))
                .expect("connect");
        }
        graph
    }

    #[test]
    fn transitive_reduction_shortcut_expected_removed() {
        let mut graph = graph_with(&["a", "b", "c"], &[("a", "b"), ("b", "c"), ("a", "c")]);
        TransitiveReductionTransformer
            .transform(&mut graph, &ModulePath::root())
            .expect("reduction should succeed");

        assert!(!graph.has_edge("provider.a", "provider.c"));
        assert!(graph.has_edge("provider.a", "provider.b"));
        assert!(graph.has_edge("provider.b", "provider.c"));
    }

    #[test]
    fn transitive_reduction_long_path_expected_reachability_preserved() {
        let mut graph = graph_with(
            &["a", "b", "c", "d"],
            &[("a", "b"), ("b", "c"), ("c", "d"), ("a", "d"), ("b", "d")],
        );
        let reachable_before: Vec<_> = graph.node_ids().map(|id| graph.descendants(id)).collect();

        TransitiveReductionTransformer
            .transform(&mut graph, &ModulePath::root())
            .expect("reduction should succeed");

        let reachable_after: Vec<_> = graph.node_ids().map(|id| graph.descendants(id)).collect();
        assert_eq!(reachable_before, reachable_after);
        assert_eq!(graph.edge_count(), 3);
    }

    #[test]
    fn transitive_reduction_on_own_output_expected_noop() {
        let mut graph = graph_with(
            &["a", "b", "c", "d"],
            &[("a", "b"), ("a", "c"), ("b", "d"), ("c", "d"), ("a", "d")],
        );
        TransitiveReductionTransformer
            .transform(&mut graph, &ModulePath::root())
            .expect("first reduction");
        let once = graph.clone();
        TransitiveReductionTransformer
            .transform(&mut graph, &ModulePath::root())
            .expect("second reduction");
        assert_eq!(graph, once);
        assert_eq!(graph.edge_count(), 4);
    }

    #[test]
    fn transitive_reduction_cycle_expected_structural_error() {
        let mut graph = graph_with(&["a", "b"], &[("a", "b"), ("b", "a")]);
        let error = TransitiveReductionTransformer
            .transform(&mut graph, &ModulePath::root())
            .expect_err("cycles should be rejected");
        assert_eq!(error.kind(), crate::ErrorKind::Structural);
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn transitive_reduction_self_loop_expected_structural_error() {
        let mut graph = graph_with(&["a"], &[]);
        let a = graph.index["provider.a"];
        graph.dag.add_edge(a, a, ());
        let error = TransitiveReductionTransformer
            .transform(&mut graph, &ModulePath::root())
            .expect_err("self loops should be rejected");
        assert_eq!(error.diagnostics()[0].rule, "self_reference");
    }

    #[test]
    fn transitive_reduction_long_chain_with_shortcuts_expected_chain() {
        let names: Vec<String> = (0..2_000).map(|i| format!("p{i:05}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let mut edges: Vec<(&str, &str)> = refs.windows(2).map(|pair| (pair[0], pair[1])).collect();
        edges.extend(refs.windows(3).step_by(100).map(|triple| (triple[0], triple[2])));
        let mut graph = graph_with(&refs, &edges);

        TransitiveReductionTransformer
            .transform(&mut graph, &ModulePath::root())
            .expect("reduction should succeed");

        assert_eq!(graph.edge_count(), refs.len() - 1);
        assert!(!graph.has_edge("provider.p00000", "provider.p00002"));
    }
}
