use crate::core::entity::EntityName;
use crate::graph::flow_graph::{rank_order, saturating_total, AggregatedEdge};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Result of netting opposing flows between one pair of entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BilateralNettingResult {
    pub party_a: EntityName,
    pub party_b: EntityName,
    /// Gross flow from A to B.
    pub gross_a_to_b: Decimal,
    /// Gross flow from B to A.
    pub gross_b_to_a: Decimal,
    /// Positive means the net flow runs A → B, negative B → A.
    pub net_amount: Decimal,
}

impl BilateralNettingResult {
    /// The surviving directed edge, or `None` when the flows cancel out.
    pub fn net_edge(&self) -> Option<AggregatedEdge> {
        if self.net_amount > Decimal::ZERO {
            Some(AggregatedEdge::new(
                self.party_a.clone(),
                self.party_b.clone(),
                self.net_amount,
            ))
        } else if self.net_amount < Decimal::ZERO {
            Some(AggregatedEdge::new(
                self.party_b.clone(),
                self.party_a.clone(),
                -self.net_amount,
            ))
        } else {
            None
        }
    }

    /// Flow that disappears by drawing only the net direction.
    pub fn offset(&self) -> Decimal {
        self.gross_a_to_b
            .saturating_add(self.gross_b_to_a)
            .saturating_sub(self.net_amount.abs())
    }
}

/// Result of netting a whole edge list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NettingResult {
    /// Net edges in ranking order.
    pub edges: Vec<AggregatedEdge>,
    /// Pairs whose opposing flows were exactly equal, (smaller, larger name).
    pub cancelled: Vec<(EntityName, EntityName)>,
    /// Sum of the input edge values.
    pub gross_total: Decimal,
    /// Sum of the net edge values.
    pub net_total: Decimal,
}

/// Net the flows between two specific entities.
///
/// Bilateral netting offsets opposing flows between a pair. If A sends 100
/// to B and B sends 60 to A, the net flow is 40 from A to B.
pub fn bilateral_net(
    edges: &[AggregatedEdge],
    party_a: &EntityName,
    party_b: &EntityName,
) -> BilateralNettingResult {
    let mut a_to_b = Decimal::ZERO;
    let mut b_to_a = Decimal::ZERO;

    for edge in edges {
        if &edge.source == party_a && &edge.target == party_b {
            a_to_b = a_to_b.saturating_add(edge.value);
        } else if &edge.source == party_b && &edge.target == party_a {
            b_to_a = b_to_a.saturating_add(edge.value);
        }
    }

    BilateralNettingResult {
        party_a: party_a.clone(),
        party_b: party_b.clone(),
        gross_a_to_b: a_to_b,
        gross_b_to_a: b_to_a,
        net_amount: a_to_b.saturating_sub(b_to_a),
    }
}

/// Net every pair of opposing edges in the list.
///
/// Pairs are keyed by their names in sorted order, so the outcome does not
/// depend on which direction appears first. Edges without an opposite pass
/// through unchanged.
pub fn net_bilateral(edges: &[AggregatedEdge]) -> NettingResult {
    let mut pairs: BTreeMap<(EntityName, EntityName), (Decimal, Decimal)> = BTreeMap::new();
    let gross_total = saturating_total(edges.iter().map(|e| e.value));

    for edge in edges {
        if edge.source <= edge.target {
            let entry = pairs
                .entry((edge.source.clone(), edge.target.clone()))
                .or_insert((Decimal::ZERO, Decimal::ZERO));
            entry.0 = entry.0.saturating_add(edge.value);
        } else {
            let entry = pairs
                .entry((edge.target.clone(), edge.source.clone()))
                .or_insert((Decimal::ZERO, Decimal::ZERO));
            entry.1 = entry.1.saturating_add(edge.value);
        }
    }

    let mut netted = Vec::with_capacity(pairs.len());
    let mut cancelled = Vec::new();
    for ((a, b), (a_to_b, b_to_a)) in pairs {
        let result = BilateralNettingResult {
            party_a: a,
            party_b: b,
            gross_a_to_b: a_to_b,
            gross_b_to_a: b_to_a,
            net_amount: a_to_b.saturating_sub(b_to_a),
        };
        match result.net_edge() {
            Some(edge) => netted.push(edge),
            None => cancelled.push((result.party_a, result.party_b)),
        }
    }
    netted.sort_by(rank_order);

    let net_total = saturating_total(netted.iter().map(|e| e.value));
    NettingResult {
        edges: netted,
        cancelled,
        gross_total,
        net_total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn edge(source: &str, target: &str, value: Decimal) -> AggregatedEdge {
        AggregatedEdge::new(source, target, value)
    }

    #[test]
    fn test_bilateral_netting() {
        let edges = vec![edge("A", "B", dec!(100)), edge("B", "A", dec!(60))];
        let result = bilateral_net(&edges, &"A".into(), &"B".into());
        assert_eq!(result.gross_a_to_b, dec!(100));
        assert_eq!(result.gross_b_to_a, dec!(60));
        assert_eq!(result.net_amount, dec!(40));
        assert_eq!(result.offset(), dec!(120));
        assert_eq!(result.net_edge(), Some(edge("A", "B", dec!(40))));
    }

    #[test]
    fn test_larger_reverse_direction_wins() {
        let edges = vec![edge("A", "B", dec!(10)), edge("B", "A", dec!(70))];
        let result = net_bilateral(&edges);
        assert_eq!(result.edges, vec![edge("B", "A", dec!(60))]);
        assert_eq!(result.gross_total, dec!(80));
        assert_eq!(result.net_total, dec!(60));
    }

    #[test]
    fn test_equal_flows_cancel() {
        let edges = vec![edge("B", "A", dec!(50)), edge("A", "B", dec!(50))];
        let result = net_bilateral(&edges);
        assert!(result.edges.is_empty());
        assert_eq!(
            result.cancelled,
            vec![(EntityName::new("A"), EntityName::new("B"))]
        );
        assert_eq!(result.net_total, Decimal::ZERO);
    }

    #[test]
    fn test_netting_is_commutative() {
        let forward = vec![edge("A", "B", dec!(100)), edge("B", "A", dec!(40))];
        let backward = vec![edge("B", "A", dec!(40)), edge("A", "B", dec!(100))];
        assert_eq!(net_bilateral(&forward), net_bilateral(&backward));
    }

    #[test]
    fn test_totals_saturate_on_huge_values() {
        let edges = vec![
            edge("A", "B", Decimal::MAX),
            edge("C", "D", Decimal::MAX),
            edge("B", "A", dec!(1)),
        ];
        let result = net_bilateral(&edges);
        assert_eq!(result.gross_total, Decimal::MAX);
        assert_eq!(result.net_total, Decimal::MAX);
        assert_eq!(result.edges.len(), 2);

        let pair = bilateral_net(&edges, &"A".into(), &"B".into());
        assert_eq!(pair.net_amount, Decimal::MAX - dec!(1));
    }

    #[test]
    fn test_unpaired_edges_pass_through() {
        let edges = vec![edge("C", "D", dec!(5)), edge("Z", "A", dec!(9))];
        let result = net_bilateral(&edges);
        assert_eq!(
            result.edges,
            vec![edge("Z", "A", dec!(9)), edge("C", "D", dec!(5))]
        );
        assert!(result.cancelled.is_empty());
    }
}
