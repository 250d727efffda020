use crate::core::entity::EntityName;
use crate::graph::flow_graph::AggregatedEdge;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, BTreeSet};

/// A group of entities whose flows lead back to each other.
///
/// Any cycle in a flow graph lies entirely inside one such component, so
/// the components tell the user which part of a selection is circular.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircularComponent {
    /// Member names, sorted.
    pub members: Vec<EntityName>,
}

impl CircularComponent {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, name: &EntityName) -> bool {
        self.members.binary_search(name).is_ok()
    }
}

/// Find every strongly connected component with more than one member,
/// using Tarjan's algorithm. Components are sorted by their first member.
pub fn find_circular_components(
    nodes: &[EntityName],
    edges: &[AggregatedEdge],
) -> Vec<CircularComponent> {
    let names: BTreeSet<&EntityName> = nodes
        .iter()
        .chain(edges.iter().flat_map(|e| [&e.source, &e.target]))
        .collect();

    let mut graph: DiGraph<&EntityName, ()> = DiGraph::with_capacity(names.len(), edges.len());
    let index: BTreeMap<&EntityName, NodeIndex> =
        names.iter().map(|n| (*n, graph.add_node(*n))).collect();
    for edge in edges {
        graph.add_edge(index[&edge.source], index[&edge.target], ());
    }

    let mut components: Vec<CircularComponent> = tarjan_scc(&graph)
        .into_iter()
        .filter(|component| component.len() > 1)
        .map(|component| {
            let mut members: Vec<EntityName> =
                component.into_iter().map(|i| graph[i].clone()).collect();
            members.sort();
            CircularComponent { members }
        })
        .collect();
    components.sort_by(|a, b| a.members.cmp(&b.members));
    components
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn edge(source: &str, target: &str) -> AggregatedEdge {
        AggregatedEdge::new(source, target, dec!(1))
    }

    #[test]
    fn test_single_component() {
        let edges = vec![edge("A", "B"), edge("B", "C"), edge("C", "A"), edge("C", "D")];
        let components = find_circular_components(&[], &edges);
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].len(), 3);
        assert!(components[0].contains(&EntityName::new("B")));
        assert!(!components[0].contains(&EntityName::new("D")));
    }

    #[test]
    fn test_disjoint_components() {
        let edges = vec![
            edge("A", "B"),
            edge("B", "C"),
            edge("C", "A"),
            edge("W", "X"),
            edge("X", "Y"),
            edge("Y", "W"),
        ];
        let components = find_circular_components(&[], &edges);
        assert_eq!(components.len(), 2);
        assert_eq!(components[0].members[0].as_str(), "A");
        assert_eq!(components[1].members[0].as_str(), "W");
    }

    #[test]
    fn test_acyclic_has_no_components() {
        let edges = vec![edge("A", "B"), edge("B", "C")];
        let nodes = vec![EntityName::new("Z")];
        assert!(find_circular_components(&nodes, &edges).is_empty());
    }
}
