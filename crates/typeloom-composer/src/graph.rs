use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::Serialize;
use std::collections::HashMap;

use crate::arena::DeclId;

/// Node index in the type graph
pub type TypeNodeId = NodeIndex;

/// Direct supertype edges between canonical declarations
#[derive(Debug, Clone, Default)]
pub struct TypeGraph {
    /// Edges point from a declaration to its direct supertype
    graph: DiGraph<DeclId, RelationKind>,

    /// Map from declaration to node index
    decl_to_node: HashMap<DeclId, TypeNodeId>,
}

/// Kind of a supertype edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// Class inheritance
    Inherits,

    /// Protocol or composition conformance
    Implements,

    /// Supertype that is neither (struct, enum, unknown extension)
    Based,
}

/// Serializable edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeEdge {
    pub from: DeclId,
    pub to: DeclId,
    pub kind: RelationKind,
}

impl TypeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a declaration node, reusing the existing one
    pub fn add_declaration(&mut self, id: DeclId) -> TypeNodeId {
        if let Some(&node) = self.decl_to_node.get(&id) {
            return node;
        }
        let node = self.graph.add_node(id);
        self.decl_to_node.insert(id, node);
        node
    }

    /// Record that `from` directly extends `to`
    pub fn add_relation(&mut self, from: DeclId, to: DeclId, kind: RelationKind) {
        let a = self.add_declaration(from);
        let b = self.add_declaration(to);
        if self.graph.find_edge(a, b).is_none() {
            self.graph.add_edge(a, b, kind);
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Direct supertypes of `id`
    pub fn supertypes(&self, id: DeclId) -> Vec<(DeclId, RelationKind)> {
        self.neighbors(id, Direction::Outgoing)
    }

    /// Declarations that directly extend `id`
    pub fn subtypes(&self, id: DeclId) -> Vec<(DeclId, RelationKind)> {
        self.neighbors(id, Direction::Incoming)
    }

    fn neighbors(&self, id: DeclId, direction: Direction) -> Vec<(DeclId, RelationKind)> {
        let Some(&node) = self.decl_to_node.get(&id) else {
            return Vec::new();
        };
        let mut found: Vec<(DeclId, RelationKind)> = self
            .graph
            .edges_directed(node, direction)
            .map(|edge| {
                let other = match direction {
                    Direction::Outgoing => edge.target(),
                    Direction::Incoming => edge.source(),
                };
                (self.graph[other], *edge.weight())
            })
            .collect();
        found.sort_by_key(|(id, _)| *id);
        found
    }

    /// Declarations ordered so supertypes come before their subtypes
    pub fn topological_order(&self) -> Result<Vec<DeclId>, Vec<DeclId>> {
        use petgraph::algo::toposort;

        match toposort(&self.graph, None) {
            // edges point at supertypes, so reverse
            Ok(order) => Ok(order.into_iter().rev().map(|n| self.graph[n]).collect()),
            Err(cycle) => {
                let at = self.graph[cycle.node_id()];
                tracing::warn!("Cycle detected in type graph at: {:?}", at);
                Err(self.cycles().into_iter().next().unwrap_or_else(|| vec![at]))
            }
        }
    }

    pub fn has_cycle(&self) -> bool {
        petgraph::algo::is_cyclic_directed(&self.graph)
    }

    /// Every set of declarations that reach each other through supertype edges
    pub fn cycles(&self) -> Vec<Vec<DeclId>> {
        let mut cycles: Vec<Vec<DeclId>> = petgraph::algo::tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || component
                        .first()
                        .map(|n| self.graph.find_edge(*n, *n).is_some())
                        .unwrap_or(false)
            })
            .map(|component| {
                let mut ids: Vec<DeclId> = component.into_iter().map(|n| self.graph[n]).collect();
                ids.sort();
                ids
            })
            .collect();
        cycles.sort();
        cycles
    }

    /// All edges, sorted
    pub fn edges(&self) -> Vec<TypeEdge> {
        let mut edges: Vec<TypeEdge> = self
            .graph
            .edge_indices()
            .filter_map(|e| {
                let (a, b) = self.graph.edge_endpoints(e)?;
                Some(TypeEdge {
                    from: self.graph[a],
                    to: self.graph[b],
                    kind: self.graph[e],
                })
            })
            .collect();
        edges.sort_by_key(|e| (e.from, e.to));
        edges
    }
}

impl Serialize for TypeGraph {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.edges())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_creation() {
        let graph = TypeGraph::new();
        assert_eq!(graph.node_count(), 0);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_add_declaration_is_idempotent() {
        let mut graph = TypeGraph::new();
        let a = graph.add_declaration(DeclId(0));
        let b = graph.add_declaration(DeclId(0));
        assert_eq!(a, b);
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn test_relations() {
        let mut graph = TypeGraph::new();
        graph.add_relation(DeclId(2), DeclId(1), RelationKind::Inherits);
        graph.add_relation(DeclId(1), DeclId(0), RelationKind::Implements);
        graph.add_relation(DeclId(2), DeclId(1), RelationKind::Inherits);

        assert_eq!(graph.edge_count(), 2);
        assert_eq!(
            graph.supertypes(DeclId(2)),
            vec![(DeclId(1), RelationKind::Inherits)]
        );
        assert_eq!(
            graph.subtypes(DeclId(0)),
            vec![(DeclId(1), RelationKind::Implements)]
        );
        assert_eq!(
            graph.topological_order().unwrap(),
            vec![DeclId(0), DeclId(1), DeclId(2)]
        );
        assert!(!graph.has_cycle());
    }

    #[test]
    fn test_cycle_detection() {
        let mut graph = TypeGraph::new();
        graph.add_relation(DeclId(0), DeclId(1), RelationKind::Inherits);
        graph.add_relation(DeclId(1), DeclId(0), RelationKind::Inherits);
        graph.add_relation(DeclId(2), DeclId(2), RelationKind::Implements);

        assert!(graph.has_cycle());
        assert_eq!(
            graph.cycles(),
            vec![vec![DeclId(0), DeclId(1)], vec![DeclId(2)]]
        );
        assert!(graph.topological_order().is_err());
    }
}
