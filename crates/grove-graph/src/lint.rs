use crate::{Diagnostic, DiagnosticReport, Graph, GraphError, NodeKind};
use petgraph::algo::tarjan_scc;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;

pub trait LintRule {
    fn name(&self) -> &str;
    fn apply(&self, graph: &Graph) -> Vec<Diagnostic>;
}

/// Structural checks run after the last build step.
pub fn validate_structure(graph: &Graph, extra_rules: &[&dyn LintRule]) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    diagnostics.extend(rule_node_identity(graph));
    diagnostics.extend(rule_edge_endpoints(graph));
    diagnostics.extend(rule_self_reference(graph));
    diagnostics.extend(rule_acyclic(graph));
    diagnostics.extend(rule_single_root(graph));
    diagnostics.extend(rule_reachability(graph));
    diagnostics.extend(rule_disabled_provider(graph));

    for rule in extra_rules {
        diagnostics.extend(rule.apply(graph));
    }

    diagnostics
}

pub fn validate_structure_or_raise(
    graph: &Graph,
    extra_rules: &[&dyn LintRule],
) -> Result<Vec<Diagnostic>, GraphError> {
    let diagnostics = validate_structure(graph, extra_rules);
    if diagnostics.iter().any(Diagnostic::is_error) {
        return Err(GraphError::Structural(DiagnosticReport::new(diagnostics)));
    }
    Ok(diagnostics)
}

fn rule_node_identity(graph: &Graph) -> Vec<Diagnostic> {
    let mut diagnostics: Vec<Diagnostic> = graph
        .index
        .iter()
        .filter_map(|(key, slot)| {
            let message = match graph.dag.node_weight(*slot) {
                None => format!("node '{key}' points at an empty slot"),
                Some(node) if *key != node.id || node.kind.name() != node.id => format!(
                    "node stored as '{key}' is identified as '{}'",
                    node.kind.name()
                ),
                Some(_) => return None,
            };
            Some(Diagnostic::error("node_identity", message).with_node_id(key.clone()))
        })
        .collect();

    diagnostics.extend(
        graph
            .dag
            .node_indices()
            .filter(|slot| !is_indexed(graph, *slot))
            .map(|slot| {
                let id = &graph.dag[slot].id;
                Diagnostic::error("node_identity", format!("node '{id}' is not indexed"))
                    .with_node_id(id.clone())
            }),
    );
    diagnostics
}

fn is_indexed(graph: &Graph, slot: NodeIndex) -> bool {
    graph.index.get(&graph.dag[slot].id) == Some(&slot)
}

fn rule_edge_endpoints(graph: &Graph) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for edge in graph.dag.edge_references() {
        let from = &graph.dag[edge.source()].id;
        let to = &graph.dag[edge.target()].id;
        for (endpoint, slot) in [(from, edge.source()), (to, edge.target())] {
            if !is_indexed(graph, slot) {
                diagnostics.push(
                    Diagnostic::error(
                        "edge_endpoints",
                        format!("edge endpoint '{endpoint}' does not exist"),
                    )
                    .with_edge(from.clone(), to.clone()),
                );
            }
        }
    }
    diagnostics
}

pub(crate) fn rule_self_reference(graph: &Graph) -> Vec<Diagnostic> {
    graph
        .dag
        .edge_references()
        .filter(|edge| edge.source() == edge.target())
        .map(|edge| {
            let id = &graph.dag[edge.source()].id;
            Diagnostic::error("self_reference", format!("{id} cannot depend on itself"))
                .with_edge(id.clone(), id.clone())
        })
        .collect()
}

pub(crate) fn rule_acyclic(graph: &Graph) -> Vec<Diagnostic> {
    strongly_connected_components(graph)
        .into_iter()
        .filter(|component| component.len() > 1)
        .map(|component| {
            Diagnostic::error("acyclic", format!("Cycle: {}", component.join(", ")))
                .with_node_id(component[0].clone())
        })
        .collect()
}

fn rule_single_root(graph: &Graph) -> Vec<Diagnostic> {
    if graph.is_empty() {
        return Vec::new();
    }
    let roots = graph.roots();
    match roots.len() {
        1 => Vec::new(),
        0 => vec![Diagnostic::error("single_root", "no roots found")],
        _ => vec![Diagnostic::error(
            "single_root",
            format!("multiple roots: {}", roots.join(", ")),
        )],
    }
}

fn rule_reachability(graph: &Graph) -> Vec<Diagnostic> {
    let roots = graph.roots();
    let [root] = roots.as_slice() else {
        return Vec::new();
    };
    let reachable = graph.descendants(root);

    graph
        .node_ids()
        .filter(|id| id != root && !reachable.contains(*id))
        .map(|id| {
            Diagnostic::error("reachability", format!("{id} is unreachable from {root}"))
                .with_node_id(id)
        })
        .collect()
}

/// Disabled providers are expected to be pruned before the build finishes.
fn rule_disabled_provider(graph: &Graph) -> Vec<Diagnostic> {
    graph
        .nodes_of(NodeKind::as_provider)
        .filter(|(_, provider)| provider.disabled)
        .map(|(id, _)| {
            Diagnostic::warning("disabled_provider", format!("{id} is disabled but still in the graph"))
                .with_node_id(id)
                .with_fix("prune providers nothing depends on")
        })
        .collect()
}

/// Components in petgraph's discovery order; members sorted by identity.
pub fn strongly_connected_components(graph: &Graph) -> Vec<Vec<String>> {
    tarjan_scc(&graph.dag)
        .into_iter()
        .map(|component| {
            let mut members: Vec<String> = component
                .into_iter()
                .map(|slot| graph.dag[slot].id.clone())
                .collect();
            members.sort();
            members
        })
        .collect()
}
