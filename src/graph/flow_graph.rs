use crate::core::entity::EntityName;
use crate::graph::cycle_detection::find_cycle;
use crate::graph::netting::net_bilateral;
use crate::graph::scc::find_circular_components;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A time-collapsed flow between two entities, keyed by display name.
///
/// This is the unit the flow graph builder consumes and emits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AggregatedEdge {
    pub source: EntityName,
    pub target: EntityName,
    pub value: Decimal,
}

impl AggregatedEdge {
    pub fn new(
        source: impl Into<EntityName>,
        target: impl Into<EntityName>,
        value: Decimal,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            value,
        }
    }

    /// A self-loop, a non-positive value or a blank endpoint makes an edge
    /// unusable.
    pub fn is_valid(&self) -> bool {
        self.source != self.target
            && self.value > Decimal::ZERO
            && !self.source.is_blank()
            && !self.target.is_blank()
    }
}

/// Ranking order for edges: value descending, then source and target names
/// ascending.
pub(crate) fn rank_order(a: &AggregatedEdge, b: &AggregatedEdge) -> Ordering {
    b.value
        .cmp(&a.value)
        .then_with(|| a.source.cmp(&b.source))
        .then_with(|| a.target.cmp(&b.target))
}

/// A cycle-free, netted flow graph ready for a Sankey renderer.
///
/// Only [`build_graph`] creates these, so every instance holds:
/// no directed cycle, at most one edge per unordered node pair, and no
/// duplicate nodes.
///
/// # Examples
///
/// ```
/// use flow_atlas::graph::flow_graph::{build_graph, AggregatedEdge};
/// use rust_decimal_macros::dec;
///
/// let outcome = build_graph(
///     &[
///         AggregatedEdge::new("Syria", "Turkey", dec!(100)),
///         AggregatedEdge::new("Turkey", "Syria", dec!(40)),
///     ],
///     10,
/// );
///
/// let graph = outcome.graph().unwrap();
/// assert_eq!(graph.node_count(), 2);
/// assert_eq!(graph.edge_count(), 1);
/// assert_eq!(graph.edges()[0].value, dec!(60));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowGraph {
    nodes: Vec<EntityName>,
    edges: Vec<AggregatedEdge>,
}

impl FlowGraph {
    /// Node names, sorted.
    pub fn nodes(&self) -> &[EntityName] {
        &self.nodes
    }

    /// Edges in ranking order.
    pub fn edges(&self) -> &[AggregatedEdge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edge_value(&self, source: &EntityName, target: &EntityName) -> Option<Decimal> {
        self.edges
            .iter()
            .find(|e| &e.source == source && &e.target == target)
            .map(|e| e.value)
    }

    /// Sum of all edge values, saturating at `Decimal::MAX`.
    pub fn total_flow(&self) -> Decimal {
        saturating_total(self.edges.iter().map(|e| e.value))
    }
}

/// Why a selection could not be drawn as a flow graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// One directed cycle, in traversal order. The last node flows back to
    /// the first.
    pub cycle: Vec<EntityName>,
    /// Every group of nodes that can reach each other, sorted.
    pub components: Vec<Vec<EntityName>>,
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path: Vec<&str> = self.cycle.iter().map(|n| n.as_str()).collect();
        write!(f, "selection produces a circular flow graph: {}", path.join(" → "))?;
        if let Some(first) = self.cycle.first() {
            write!(f, " → {}", first)?;
        }
        Ok(())
    }
}

/// Result of building a flow graph.
///
/// A cycle is a legitimate outcome, not an error: the caller shows a
/// dedicated empty state instead of a partial graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GraphOutcome {
    Graph(FlowGraph),
    CycleDetected(CycleReport),
}

impl GraphOutcome {
    pub fn graph(&self) -> Option<&FlowGraph> {
        match self {
            GraphOutcome::Graph(graph) => Some(graph),
            GraphOutcome::CycleDetected(_) => None,
        }
    }

    pub fn is_cycle(&self) -> bool {
        matches!(self, GraphOutcome::CycleDetected(_))
    }
}

/// Sum edge values without overflowing; very large inputs clamp to
/// `Decimal::MAX`.
pub(crate) fn saturating_total(values: impl IntoIterator<Item = Decimal>) -> Decimal {
    values
        .into_iter()
        .fold(Decimal::ZERO, |acc, v| acc.saturating_add(v))
}

/// Build a Sankey-ready flow graph from aggregated edges.
///
/// # Algorithm
///
/// 1. Drop self-loops, non-positive values and blank names, then sum
///    repeated (source, target) pairs.
/// 2. Rank by value (ties by source, then target name) and keep `top_k`.
/// 3. Net opposing edges between the same pair: the larger direction
///    survives carrying the difference; equal flows cancel out.
/// 4. Search the netted edges for a directed cycle. If one exists the
///    outcome is [`GraphOutcome::CycleDetected`]; no edge is ever dropped
///    to break it.
///
/// Nodes are every endpoint of the ranked edges, including pairs that
/// cancelled during netting. The result depends only on the input as a
/// set, never on its order.
pub fn build_graph(edges: &[AggregatedEdge], top_k: usize) -> GraphOutcome {
    let mut merged: BTreeMap<(EntityName, EntityName), Decimal> = BTreeMap::new();
    let mut dropped = 0usize;
    for edge in edges {
        if !edge.is_valid() {
            dropped += 1;
            continue;
        }
        let value = merged
            .entry((edge.source.clone(), edge.target.clone()))
            .or_insert(Decimal::ZERO);
        *value = value.saturating_add(edge.value);
    }

    let mut ranked: Vec<AggregatedEdge> = merged
        .into_iter()
        .map(|((source, target), value)| AggregatedEdge {
            source,
            target,
            value,
        })
        .collect();
    ranked.sort_by(rank_order);
    ranked.truncate(top_k);

    let nodes: Vec<EntityName> = ranked
        .iter()
        .flat_map(|e| [e.source.clone(), e.target.clone()])
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let netting = net_bilateral(&ranked);
    log::debug!(
        "flow graph: {} input edges, {} invalid, {} ranked, {} after netting ({} pairs cancelled)",
        edges.len(),
        dropped,
        ranked.len(),
        netting.edges.len(),
        netting.cancelled.len()
    );

    if let Some(cycle) = find_cycle(&nodes, &netting.edges) {
        let components = find_circular_components(&nodes, &netting.edges)
            .into_iter()
            .map(|c| c.members)
            .collect();
        let report = CycleReport { cycle, components };
        log::debug!("{}", report);
        return GraphOutcome::CycleDetected(report);
    }

    GraphOutcome::Graph(FlowGraph {
        nodes,
        edges: netting.edges,
    })
}
