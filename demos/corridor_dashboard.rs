//! Corridor dashboard example.
//!
//! Loads a small set of monthly flows into the in-memory source, narrows
//! the view with a selection and a filter, and renders every dashboard
//! panel plus the Sankey graph.

use flow_atlas::aggregation::engine::{AggregationEngine, DashboardRequest};
use flow_atlas::aggregation::source::InMemoryFlowSource;
use flow_atlas::aggregation::stats::{growth_rates, rolling_average};
use flow_atlas::core::entity::{CatalogEntry, EntityCode, RegionName};
use flow_atlas::core::filter::{normalize, RawFilterInput};
use flow_atlas::core::flow::{FlowRecord, FlowRecordSet};
use flow_atlas::core::period::CalendarMonth;
use flow_atlas::graph::flow_graph::GraphOutcome;
use flow_atlas::selection::{CorridorSelection, Side};
use std::sync::Arc;

fn flows() -> FlowRecordSet {
    let corridors = [
        ("VE", "CO", 2_400u64),
        ("VE", "PE", 1_300),
        ("VE", "EC", 600),
        ("CO", "VE", 350),
        ("CO", "EC", 200),
        ("EC", "PE", 150),
        ("MX", "US", 5_000),
    ];

    let mut set = FlowRecordSet::new();
    let mut month = CalendarMonth::new(2019, 1).expect("valid month");
    for step in 0..36u64 {
        for (from, to, base) in corridors {
            // A slow rise with a bump every July.
            let bump = if month.month() == 7 { base / 4 } else { 0 };
            set.add(FlowRecord::new(
                EntityCode::new(from),
                EntityCode::new(to),
                month,
                base + base * step / 50 + bump,
            ));
        }
        month = month.succ();
    }
    set
}

#[tokio::main]
async fn main() {
    env_logger::init();

    println!("╔══════════════════════════════════════════╗");
    println!("║  flow-atlas: Corridor Dashboard Example  ║");
    println!("╚══════════════════════════════════════════╝\n");

    let source = InMemoryFlowSource::new(
        flows(),
        vec![
            CatalogEntry::new("VE", "Venezuela", Some("South America")),
            CatalogEntry::new("CO", "Colombia", Some("South America")),
            CatalogEntry::new("PE", "Peru", Some("South America")),
            CatalogEntry::new("EC", "Ecuador", Some("South America")),
            CatalogEntry::new("MX", "Mexico", Some("North America")),
            CatalogEntry::new("US", "United States", Some("North America")),
        ],
    );
    let engine = AggregationEngine::new(Arc::new(source));
    let catalog = engine.entity_catalog().await.into_data();

    // --- Selection: South American origins, anywhere as destination ---
    let mut selection = CorridorSelection::new();
    selection
        .select_region(Side::Origin, &RegionName::new("South America"), &catalog)
        .expect("region is in the catalog");
    let offered: Vec<String> = selection
        .offers(Side::Destination, &catalog)
        .iter()
        .map(|e| e.display_name.to_string())
        .collect();
    println!("Destinations on offer: {}\n", offered.join(", "));

    let raw = RawFilterInput {
        period_start: Some("2020-01".into()),
        period_end: Some("2021-12".into()),
        granularity: Some("quarterly".into()),
        ..Default::default()
    };
    let descriptor = normalize(&raw).with_corridor(selection.resolve(&catalog));

    let dashboard = engine
        .dashboard(&descriptor, &DashboardRequest::new(5))
        .await;

    println!("━━━ Summary ━━━\n");
    let summary = &dashboard.summary.data;
    println!("Total flow:         {}", summary.total_flow);
    println!("Corridors:          {}", summary.unique_corridor_count);
    println!("Quarters:           {}", summary.active_period_count);
    println!("Average / quarter:  {}\n", summary.average_per_period.round_dp(1));

    println!("━━━ Top corridors ━━━\n");
    for row in &dashboard.top_corridors.data {
        println!(
            "  {:<10} → {:<10} {:>8}",
            catalog.display_name(&row.origin).to_string(),
            catalog.display_name(&row.destination).to_string(),
            row.total
        );
    }
    println!();

    println!("━━━ Seasonal pattern ━━━\n");
    for row in &dashboard.seasonal_pattern.data {
        println!(
            "  {}  avg {:>8}  max {:>6}  min {:>6}",
            row.period_label,
            row.average.round_dp(0),
            row.max,
            row.min
        );
    }
    println!();

    println!("━━━ Leading corridor trend ━━━\n");
    let leading: Vec<_> = dashboard
        .top_corridors
        .data
        .iter()
        .take(1)
        .map(|row| row.key())
        .collect();
    let series = engine
        .corridor_time_series(&leading, &descriptor)
        .await
        .into_data();
    let rolling = rolling_average(&series, 2);
    for (point, growth) in rolling.iter().zip(growth_rates(&series)) {
        println!(
            "  {}  {:>6}  rolling {:>8}  change {:>7}",
            point.period,
            point.value,
            point
                .rolling
                .map(|v| v.round_dp(1).to_string())
                .unwrap_or_else(|| "-".into()),
            growth
                .growth_percent
                .map(|v| format!("{}%", v.round_dp(1)))
                .unwrap_or_else(|| "-".into())
        );
    }
    println!();

    println!("━━━ Sankey graph ━━━\n");
    let outcome = engine
        .flow_graph(&descriptor, &catalog, 20, 10)
        .await
        .into_data();
    match outcome {
        GraphOutcome::Graph(graph) => {
            for edge in graph.edges() {
                println!("  {} → {}: {}", edge.source, edge.target, edge.value);
            }
        }
        GraphOutcome::CycleDetected(report) => println!("  {}", report),
    }
}
