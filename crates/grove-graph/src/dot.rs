use crate::Graph;
use graphviz_rust::dot_structures::{
    Attribute, Edge as DotEdge, EdgeTy, Graph as DotGraph, Id, Node as DotNode, NodeId, Stmt,
    Vertex,
};
use graphviz_rust::printer::PrinterContext;

fn quoted(value: &str) -> Id {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    Id::Escaped(format!("\"{escaped}\""))
}

fn node_id(id: &str) -> NodeId {
    NodeId(quoted(id), None)
}

impl Graph {
    /// DOT rendering of the graph, nodes and edges in identity order.
    pub fn to_dot(&self) -> String {
        let mut stmts = Vec::with_capacity(self.node_count() + self.edge_count());

        for node in self.nodes() {
            let mut attributes = vec![Attribute(
                Id::Plain("kind".to_string()),
                quoted(node.kind.kind_label()),
            )];
            if node.kind.as_provider().is_some_and(|provider| provider.disabled) {
                attributes.push(Attribute(
                    Id::Plain("style".to_string()),
                    quoted("dashed"),
                ));
            }
            stmts.push(Stmt::Node(DotNode {
                id: node_id(&node.id),
                attributes,
            }));
        }

        for edge in self.edges() {
            stmts.push(Stmt::Edge(DotEdge {
                ty: EdgeTy::Pair(Vertex::N(node_id(&edge.from)), Vertex::N(node_id(&edge.to))),
                attributes: Vec::new(),
            }));
        }

        let dot = DotGraph::DiGraph {
            id: Id::Plain("grove".to_string()),
            strict: false,
            stmts,
        };
        graphviz_rust::print(dot, &mut PrinterContext::default())
    }
}
