use chrono::Datelike;
use flow_atlas::aggregation::stats::{rank_corridors, summarize};
use flow_atlas::core::entity::{EntityCode, EntityName};
use flow_atlas::core::filter::{normalize, RawFilterInput};
use flow_atlas::core::flow::FlowRecord;
use flow_atlas::core::period::{CalendarMonth, Granularity};
use flow_atlas::graph::cycle_detection::has_cycle;
use flow_atlas::graph::flow_graph::{build_graph, AggregatedEdge, GraphOutcome};
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::collections::BTreeSet;

/// Node names from a small pool, to make opposing edges and cycles likely.
fn arb_name() -> impl Strategy<Value = EntityName> {
    prop::sample::select(vec!["A", "B", "C", "D", "E", "F"]).prop_map(EntityName::new)
}

fn arb_value() -> impl Strategy<Value = Decimal> {
    (1u64..1_000_000u64).prop_map(Decimal::from)
}

fn arb_edge() -> impl Strategy<Value = AggregatedEdge> {
    (arb_name(), arb_name(), arb_value())
        .prop_map(|(source, target, value)| AggregatedEdge::new(source, target, value))
}

/// An edge list together with a shuffled copy of it.
fn arb_edges_and_shuffle() -> impl Strategy<Value = (Vec<AggregatedEdge>, Vec<AggregatedEdge>)> {
    prop::collection::vec(arb_edge(), 0..30)
        .prop_flat_map(|edges| (Just(edges.clone()), Just(edges).prop_shuffle()))
}

fn arb_month() -> impl Strategy<Value = CalendarMonth> {
    (2019i32..2023, 1u32..=12).prop_map(|(y, m)| CalendarMonth::new(y, m).unwrap())
}

fn arb_record() -> impl Strategy<Value = FlowRecord> {
    let code = prop::sample::select(vec!["VE", "CO", "PE", "US", "MX"]);
    (code.clone(), code, arb_month(), 0u64..5_000).prop_map(|(from, to, month, count)| {
        FlowRecord::new(EntityCode::new(from), EntityCode::new(to), month, count)
    })
}

/// Date strings in every accepted shape plus some garbage.
fn arb_date_text() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        arb_month().prop_map(|m| Some(m.to_string())),
        (arb_month(), 1u32..=28).prop_map(|(m, d)| Some(format!("{}-{:02}", m, d))),
        "[a-z0-9 -]{0,10}".prop_map(Some),
    ]
}

fn arb_bound_text() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        (0u64..10_000).prop_map(|v| Some(v.to_string())),
        Just(Some("no_limit".to_string())),
        Just(Some("-3".to_string())),
    ]
}

fn arb_list(pool: Vec<&'static str>) -> impl Strategy<Value = Option<Vec<String>>> {
    prop::option::of(prop::collection::vec(
        prop::sample::select(pool).prop_map(String::from),
        0..4,
    ))
}

fn arb_raw_filter() -> impl Strategy<Value = RawFilterInput> {
    (
        arb_date_text(),
        arb_date_text(),
        arb_bound_text(),
        arb_bound_text(),
        arb_list(vec!["ve", "CO", " PE", "US"]),
        arb_list(vec!["VE", "co", "MX"]),
        arb_list(vec!["Europe", "South America"]),
        arb_list(vec!["South America", "Asia"]),
        prop::option::of(prop::sample::select(vec!["monthly", "Quarterly", "yearly", "weekly"])),
    )
        .prop_map(
            |(start, end, min, max, include_c, exclude_c, include_r, exclude_r, granularity)| {
                RawFilterInput {
                    period_start: start,
                    period_end: end,
                    min_flow: min,
                    max_flow: max,
                    include_countries: include_c,
                    exclude_countries: exclude_c,
                    include_regions: include_r,
                    exclude_regions: exclude_r,
                    granularity: granularity.map(String::from),
                    ..Default::default()
                }
            },
        )
}

proptest! {
    // ===================================================================
    // The builder sees its input as a set: order never shows in the output.
    // ===================================================================
    #[test]
    fn build_graph_ignores_input_order(
        (edges, shuffled) in arb_edges_and_shuffle(),
        top_k in 0usize..20,
    ) {
        prop_assert_eq!(build_graph(&edges, top_k), build_graph(&shuffled, top_k));
    }

    // ===================================================================
    // A returned graph is acyclic, within top-K, and has at most one edge
    // per unordered pair.
    // ===================================================================
    #[test]
    fn graphs_are_acyclic_and_netted(
        edges in prop::collection::vec(arb_edge(), 0..30),
        top_k in 0usize..20,
    ) {
        match build_graph(&edges, top_k) {
            GraphOutcome::Graph(graph) => {
                prop_assert!(!has_cycle(graph.edges()));
                prop_assert!(graph.edge_count() <= top_k);

                let mut pairs = BTreeSet::new();
                for edge in graph.edges() {
                    prop_assert!(edge.value > Decimal::ZERO);
                    prop_assert!(edge.source != edge.target);
                    let pair = if edge.source < edge.target {
                        (edge.source.clone(), edge.target.clone())
                    } else {
                        (edge.target.clone(), edge.source.clone())
                    };
                    prop_assert!(pairs.insert(pair), "pair appears twice");
                    prop_assert!(graph.nodes().contains(&edge.source));
                    prop_assert!(graph.nodes().contains(&edge.target));
                }
            }
            GraphOutcome::CycleDetected(report) => {
                // Two-node cycles are netted away before detection.
                prop_assert!(report.cycle.len() >= 3);
            }
        }
    }

    // ===================================================================
    // Edges that only run "forward" in name order can never cycle, and
    // pass through unchanged when top-K keeps them all.
    // ===================================================================
    #[test]
    fn forward_edges_pass_through(edges in prop::collection::vec(arb_edge(), 0..30)) {
        let forward: Vec<AggregatedEdge> = edges
            .into_iter()
            .filter(|e| e.source < e.target)
            .collect();
        let pairs: BTreeSet<(EntityName, EntityName)> = forward
            .iter()
            .map(|e| (e.source.clone(), e.target.clone()))
            .collect();

        let outcome = build_graph(&forward, forward.len());
        let graph = outcome.graph().expect("forward edges cannot cycle");
        prop_assert_eq!(graph.edge_count(), pairs.len());
        let gross: Decimal = forward.iter().map(|e| e.value).sum();
        prop_assert_eq!(graph.total_flow(), gross);
    }

    // ===================================================================
    // Corridor ranking respects its limit and never increases.
    // ===================================================================
    #[test]
    fn top_corridors_sorted_and_limited(
        records in prop::collection::vec(arb_record(), 0..60),
        limit in 0usize..10,
    ) {
        let valid: Vec<&FlowRecord> = records.iter().filter(|r| r.is_valid()).collect();
        let ranked = rank_corridors(&valid, limit);
        prop_assert!(ranked.len() <= limit);
        for pair in ranked.windows(2) {
            prop_assert!(pair[0].total >= pair[1].total);
        }
        // Deterministic across calls.
        prop_assert_eq!(ranked, rank_corridors(&valid, limit));
    }

    // ===================================================================
    // Summary never divides by zero and its average scales back to the total.
    // ===================================================================
    #[test]
    fn summary_average_is_total_over_periods(
        records in prop::collection::vec(arb_record(), 0..40),
    ) {
        let refs: Vec<&FlowRecord> = records.iter().collect();
        let summary = summarize(&refs, Granularity::Quarterly);
        if summary.active_period_count == 0 {
            prop_assert_eq!(summary.average_per_period, Decimal::ZERO);
        } else {
            let back = summary.average_per_period
                * Decimal::from(summary.active_period_count as u64);
            prop_assert!((back - Decimal::from(summary.total_flow)).abs() < Decimal::new(1, 6));
        }
    }

    // ===================================================================
    // Normalizing a descriptor's own input form reproduces it.
    // ===================================================================
    #[test]
    fn normalize_is_idempotent(raw in arb_raw_filter()) {
        let once = normalize(&raw);
        let twice = normalize(&RawFilterInput::from(&once));
        prop_assert!(once.period_start() <= once.period_end());
        prop_assert!(once.max_flow().admits(once.min_flow()));
        prop_assert_eq!(once, twice);
    }

    // ===================================================================
    // A bare end month resolves to the last day of that month.
    // ===================================================================
    #[test]
    fn end_month_resolves_to_last_day(year in 1900i32..2100, month in 1u32..=12) {
        let raw = RawFilterInput {
            period_start: Some(format!("{}-01", year)),
            period_end: Some(format!("{}-{:02}", year, month)),
            ..Default::default()
        };
        let end = normalize(&raw).period_end();
        prop_assert_eq!(end.month(), month);
        prop_assert_eq!(end.succ_opt().map(|d| d.day()), Some(1));
    }
}
