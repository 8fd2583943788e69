use crate::{Diagnostic, GraphError, NodeKind};
use petgraph::Direction;
use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, EdgeRef};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
}

/// `from` depends on `to`: `to` must be visited before `from`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
}

impl Edge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Dependency graph keyed by node identity.
///
/// Storage is a petgraph `DiGraph`; `index` maps each identity to its slot and
/// fixes the iteration order used for every listing and rendering.
#[derive(Clone, Debug, Default)]
pub struct Graph {
    pub(crate) dag: DiGraph<Node, ()>,
    pub(crate) index: BTreeMap<String, NodeIndex>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node, returning its identity.
    pub fn add(&mut self, kind: NodeKind) -> Result<String, GraphError> {
        let id = kind.name();
        if self.index.contains_key(&id) {
            return Err(GraphError::structural(
                Diagnostic::error("duplicate_node", format!("node '{id}' already exists"))
                    .with_node_id(id),
            ));
        }
        let slot = self.dag.add_node(Node { id: id.clone(), kind });
        self.index.insert(id.clone(), slot);
        Ok(id)
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.index.get(id).and_then(|slot| self.dag.node_weight(*slot))
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Node> {
        let slot = *self.index.get(id)?;
        self.dag.node_weight_mut(slot)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Remove a node together with every edge touching it.
    pub fn remove(&mut self, id: &str) -> Option<Node> {
        let slot = self.index.remove(id)?;
        let node = self.dag.remove_node(slot)?;
        // The last node moves into the freed slot.
        if let Some(moved) = self.dag.node_weight(slot) {
            self.index.insert(moved.id.clone(), slot);
        }
        Some(node)
    }

    /// Record that `from` depends on `to`. Connecting twice is a no-op.
    pub fn connect(&mut self, from: &str, to: &str) -> Result<(), GraphError> {
        if from == to {
            return Err(GraphError::structural(
                Diagnostic::error("self_reference", format!("node '{from}' cannot depend on itself"))
                    .with_edge(from, to),
            ));
        }
        let source = self.slot_of_endpoint(from, (from, to))?;
        let target = self.slot_of_endpoint(to, (from, to))?;
        self.dag.update_edge(source, target, ());
        Ok(())
    }

    fn slot_of_endpoint(&self, endpoint: &str, edge: (&str, &str)) -> Result<NodeIndex, GraphError> {
        self.index.get(endpoint).copied().ok_or_else(|| {
            GraphError::structural(
                Diagnostic::error(
                    "edge_endpoints",
                    format!("edge endpoint '{endpoint}' does not exist"),
                )
                .with_edge(edge.0, edge.1),
            )
        })
    }

    pub fn disconnect(&mut self, from: &str, to: &str) -> bool {
        let Some(edge) = self.edge_between(from, to) else {
            return false;
        };
        self.dag.remove_edge(edge).is_some()
    }

    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        self.edge_between(from, to).is_some()
    }

    fn edge_between(&self, from: &str, to: &str) -> Option<petgraph::graph::EdgeIndex> {
        let source = self.index.get(from)?;
        let target = self.index.get(to)?;
        self.dag.find_edge(*source, *target)
    }

    pub fn node_count(&self) -> usize {
        self.index.len()
    }

    pub fn edge_count(&self) -> usize {
        self.dag.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Nodes in identity order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.index
            .values()
            .filter_map(|slot| self.dag.node_weight(*slot))
    }

    /// Identities in order.
    pub fn node_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.index.keys().map(String::as_str)
    }

    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> + '_ {
        self.dag.node_weights_mut()
    }

    /// Every edge, sorted.
    pub fn edges(&self) -> Vec<Edge> {
        let mut edges: Vec<Edge> = self
            .dag
            .edge_references()
            .map(|edge| Edge::new(&self.dag[edge.source()].id, &self.dag[edge.target()].id))
            .collect();
        edges.sort();
        edges
    }

    fn neighbors(&self, id: &str, direction: Direction) -> Vec<&str> {
        let Some(slot) = self.index.get(id) else {
            return Vec::new();
        };
        let mut ids: Vec<&str> = self
            .dag
            .neighbors_directed(*slot, direction)
            .map(|next| self.dag[next].id.as_str())
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Nodes `id` depends on, sorted.
    pub fn down_edges(&self, id: &str) -> Vec<&str> {
        self.neighbors(id, Direction::Outgoing)
    }

    /// Nodes that depend on `id`, sorted.
    pub fn up_edges(&self, id: &str) -> Vec<&str> {
        self.neighbors(id, Direction::Incoming)
    }

    /// Nodes nothing depends on.
    pub fn roots(&self) -> Vec<&str> {
        self.index
            .iter()
            .filter(|(_, slot)| {
                self.dag
                    .neighbors_directed(**slot, Direction::Incoming)
                    .next()
                    .is_none()
            })
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Whether `to` is reachable from `from` along dependency edges.
    pub fn has_path(&self, from: &str, to: &str) -> bool {
        if from == to {
            return self.descendants(from).contains(to);
        }
        match (self.index.get(from), self.index.get(to)) {
            (Some(source), Some(target)) => has_path_connecting(&self.dag, *source, *target, None),
            _ => false,
        }
    }

    /// Every node reachable from `id`, excluding `id` unless it lies on a cycle.
    pub fn descendants(&self, id: &str) -> BTreeSet<String> {
        let Some(slot) = self.index.get(id) else {
            return BTreeSet::new();
        };
        let mut dfs = Dfs::empty(&self.dag);
        dfs.stack
            .extend(self.dag.neighbors_directed(*slot, Direction::Outgoing));

        let mut seen = BTreeSet::new();
        while let Some(next) = dfs.next(&self.dag) {
            seen.insert(self.dag[next].id.clone());
        }
        seen
    }

    pub fn nodes_of<'a, T>(
        &'a self,
        select: impl Fn(&'a NodeKind) -> Option<T> + 'a,
    ) -> impl Iterator<Item = (&'a str, T)> + 'a {
        self.nodes()
            .filter_map(move |node| select(&node.kind).map(|value| (node.id.as_str(), value)))
    }

    /// Hash of the canonical rendering; equal for equal graphs.
    pub fn content_hash(&self) -> String {
        blake3::hash(self.to_string().as_bytes()).to_hex().to_string()
    }
}

impl PartialEq for Graph {
    fn eq(&self, other: &Self) -> bool {
        self.nodes().eq(other.nodes()) && self.edges() == other.edges()
    }
}

/// Serialized as `{ "nodes": { id: node }, "edges": [edge] }`.
impl Serialize for Graph {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Listing<'a> {
            nodes: BTreeMap<&'a str, &'a Node>,
            edges: Vec<Edge>,
        }

        Listing {
            nodes: self.nodes().map(|node| (node.id.as_str(), node)).collect(),
            edges: self.edges(),
        }
        .serialize(serializer)
    }
}

/// One line per node in identity order, each followed by its indented
/// dependencies.
impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for id in self.node_ids() {
            writeln!(f, "{id}")?;
            for dependency in self.down_edges(id) {
                writeln!(f, "  {dependency}")?;
            }
        }
        Ok(())
    }
}
