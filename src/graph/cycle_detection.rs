use crate::core::entity::EntityName;
use crate::graph::flow_graph::AggregatedEdge;
use std::collections::{BTreeMap, BTreeSet};

/// Find one directed cycle among `nodes` and `edges`, if any exists.
///
/// Depth-first search from every unvisited node, keeping an on-stack
/// marker per node; reaching a node that is still on the stack closes a
/// cycle. The traversal is iterative, and nodes and neighbours are visited
/// in name order so the reported cycle is reproducible.
///
/// Edge endpoints missing from `nodes` are still traversed.
///
/// Returns the cycle's nodes in traversal order; the last one flows back to
/// the first.
pub fn find_cycle(nodes: &[EntityName], edges: &[AggregatedEdge]) -> Option<Vec<EntityName>> {
    let names: Vec<&EntityName> = nodes
        .iter()
        .chain(edges.iter().flat_map(|e| [&e.source, &e.target]))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let index: BTreeMap<&EntityName, usize> =
        names.iter().enumerate().map(|(i, n)| (*n, i)).collect();

    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); names.len()];
    for edge in edges {
        adjacency[index[&edge.source]].push(index[&edge.target]);
    }
    for neighbours in &mut adjacency {
        neighbours.sort_unstable();
        neighbours.dedup();
    }

    let mut visited = vec![false; names.len()];
    let mut on_stack = vec![false; names.len()];

    for start in 0..names.len() {
        if visited[start] {
            continue;
        }
        // (node, index of the next neighbour to explore)
        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
        visited[start] = true;
        on_stack[start] = true;

        while let Some(top) = stack.last_mut() {
            let node = top.0;
            if let Some(&neighbour) = adjacency[node].get(top.1) {
                top.1 += 1;
                if on_stack[neighbour] {
                    let from = stack
                        .iter()
                        .position(|(n, _)| *n == neighbour)
                        .unwrap_or(0);
                    return Some(stack[from..].iter().map(|(n, _)| names[*n].clone()).collect());
                }
                if !visited[neighbour] {
                    visited[neighbour] = true;
                    on_stack[neighbour] = true;
                    stack.push((neighbour, 0));
                }
            } else {
                on_stack[node] = false;
                stack.pop();
            }
        }
    }

    None
}

/// Whether the edges contain any directed cycle.
pub fn has_cycle(edges: &[AggregatedEdge]) -> bool {
    find_cycle(&[], edges).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn edge(source: &str, target: &str) -> AggregatedEdge {
        AggregatedEdge::new(source, target, dec!(1))
    }

    fn names(list: &[&str]) -> Vec<EntityName> {
        list.iter().map(|n| EntityName::new(*n)).collect()
    }

    #[test]
    fn test_simple_cycle() {
        let edges = vec![edge("A", "B"), edge("B", "C"), edge("C", "A")];
        assert_eq!(find_cycle(&[], &edges), Some(names(&["A", "B", "C"])));
    }

    #[test]
    fn test_no_cycle() {
        let edges = vec![edge("A", "B"), edge("B", "C"), edge("A", "C")];
        assert!(find_cycle(&names(&["A", "B", "C"]), &edges).is_none());
        assert!(!has_cycle(&edges));
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        // D is reached twice but never while still on the stack.
        let edges = vec![
            edge("A", "B"),
            edge("A", "C"),
            edge("B", "D"),
            edge("C", "D"),
        ];
        assert!(!has_cycle(&edges));
    }

    #[test]
    fn test_cycle_off_the_first_branch() {
        let edges = vec![
            edge("A", "B"),
            edge("C", "D"),
            edge("D", "E"),
            edge("E", "C"),
        ];
        assert_eq!(find_cycle(&[], &edges), Some(names(&["C", "D", "E"])));
    }

    #[test]
    fn test_two_node_cycle() {
        let edges = vec![edge("B", "A"), edge("A", "B")];
        assert_eq!(find_cycle(&[], &edges), Some(names(&["A", "B"])));
    }

    #[test]
    fn test_isolated_nodes() {
        assert!(find_cycle(&names(&["A", "B"]), &[]).is_none());
    }
}
