use async_trait::async_trait;
use flow_atlas::aggregation::engine::{AggregationEngine, DashboardRequest};
use flow_atlas::aggregation::latest::LatestRequest;
use flow_atlas::aggregation::source::{FlowSource, InMemoryFlowSource, SourceError};
use flow_atlas::aggregation::stats::{
    net_flows, CorridorPoint, CorridorTotal, CorridorVolatility, FlowSummary, PeriodTotal,
    SeasonalRow,
};
use flow_atlas::core::entity::{CatalogEntry, EntityCode, EntityName, RegionName};
use flow_atlas::core::filter::{normalize, normalize_with, FilterDescriptor, RawFilterInput};
use flow_atlas::core::flow::{CorridorKey, FlowRecord, FlowRecordSet};
use flow_atlas::graph::flow_graph::{build_graph, AggregatedEdge, GraphOutcome};
use flow_atlas::selection::{CorridorSelection, Side};
use flow_atlas::simulation::generator::{generate_dataset, DatasetConfig};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn record(from: &str, to: &str, month: &str, count: u64) -> FlowRecord {
    FlowRecord::new(
        EntityCode::new(from),
        EntityCode::new(to),
        month.parse().unwrap(),
        count,
    )
}

fn andean_source() -> InMemoryFlowSource {
    let records: FlowRecordSet = vec![
        record("VE", "CO", "2019-01", 1_000),
        record("VE", "CO", "2019-07", 1_400),
        record("VE", "CO", "2020-01", 900),
        record("CO", "VE", "2019-01", 300),
        record("VE", "PE", "2019-04", 800),
        record("VE", "PE", "2020-04", 600),
        record("CO", "EC", "2020-02", 200),
        record("EC", "US", "2021-06", 450),
        record("MX", "US", "2021-06", 2_000),
    ]
    .into_iter()
    .collect();

    InMemoryFlowSource::new(
        records,
        vec![
            CatalogEntry::new("VE", "Venezuela", Some("South America")),
            CatalogEntry::new("CO", "Colombia", Some("South America")),
            CatalogEntry::new("PE", "Peru", Some("South America")),
            CatalogEntry::new("EC", "Ecuador", Some("South America")),
            CatalogEntry::new("US", "United States", Some("North America")),
            CatalogEntry::new("MX", "Mexico", Some("North America")),
        ],
    )
}

/// Full pipeline: selection → constraints → descriptor → ranking → graph.
#[tokio::test]
async fn full_pipeline_south_american_corridors() {
    let engine = AggregationEngine::new(Arc::new(andean_source()));
    let catalog = engine.entity_catalog().await.into_data();
    assert_eq!(catalog.len(), 6);

    let mut selection = CorridorSelection::new();
    selection
        .select_region(Side::Origin, &RegionName::new("South America"), &catalog)
        .unwrap();
    selection
        .select_region(Side::Destination, &RegionName::new("South America"), &catalog)
        .unwrap();

    let raw = RawFilterInput {
        period_start: Some("2019-01".into()),
        period_end: Some("2020-12".into()),
        ..Default::default()
    };
    let descriptor = normalize(&raw).with_corridor(selection.resolve(&catalog));

    let summary = engine.summary(&descriptor).await;
    assert!(summary.is_ok());
    // Everything except the two flows into the United States.
    assert_eq!(summary.data.total_flow, 5_200);
    assert_eq!(summary.data.unique_corridor_count, 4);

    let ranked = engine.top_corridors(&descriptor, 10).await.into_data();
    assert_eq!(ranked[0].key().to_string(), "VE → CO");
    assert_eq!(ranked[0].total, 3_300);

    let outcome = engine
        .flow_graph(&descriptor, &catalog, 10, 10)
        .await
        .into_data();
    let graph = outcome.graph().expect("corridors form no cycle");
    assert_eq!(graph.node_count(), 4);
    // VE → CO 3300 netted against CO → VE 300.
    assert_eq!(
        graph.edge_value(&EntityName::new("Venezuela"), &EntityName::new("Colombia")),
        Some(dec!(3000))
    );
    assert_eq!(
        graph.edge_value(&EntityName::new("Colombia"), &EntityName::new("Venezuela")),
        None
    );
}

#[tokio::test]
async fn dashboard_over_generated_dataset() {
    let dataset = generate_dataset(&DatasetConfig {
        entity_count: 12,
        months: 24,
        seed: Some(3),
        ..Default::default()
    });
    let engine = AggregationEngine::new(Arc::new(InMemoryFlowSource::new(
        dataset.records.clone(),
        dataset.catalog,
    )));

    let raw = RawFilterInput {
        granularity: Some("quarterly".into()),
        ..Default::default()
    };
    let descriptor = normalize(&raw);
    let dashboard = engine
        .dashboard(&descriptor, &DashboardRequest::new(5))
        .await;

    assert!(dashboard.is_complete());
    assert_eq!(dashboard.summary.data.total_flow, dataset.records.total());
    assert_eq!(dashboard.period_totals.data.len(), 8);
    assert!(dashboard.top_corridors.data.len() <= 5);
    assert!(dashboard
        .top_corridors
        .data
        .windows(2)
        .all(|w| w[0].total >= w[1].total));
    let labels: Vec<&str> = dashboard
        .seasonal_pattern
        .data
        .iter()
        .map(|r| r.period_label.as_str())
        .collect();
    assert_eq!(labels, vec!["Q1", "Q2", "Q3", "Q4"]);
}

#[test]
fn graph_builder_examples() {
    let single = build_graph(&[AggregatedEdge::new("A", "B", dec!(100))], 10);
    let graph = single.graph().unwrap();
    assert_eq!(graph.node_count(), 2);
    assert_eq!(graph.edges(), &[AggregatedEdge::new("A", "B", dec!(100))]);

    let netted = build_graph(
        &[
            AggregatedEdge::new("A", "B", dec!(100)),
            AggregatedEdge::new("B", "A", dec!(40)),
        ],
        10,
    );
    assert_eq!(
        netted.graph().unwrap().edges(),
        &[AggregatedEdge::new("A", "B", dec!(60))]
    );

    let cancelled = build_graph(
        &[
            AggregatedEdge::new("A", "B", dec!(50)),
            AggregatedEdge::new("B", "A", dec!(50)),
        ],
        10,
    );
    let graph = cancelled.graph().unwrap();
    assert_eq!(graph.node_count(), 2);
    assert_eq!(graph.edge_count(), 0);

    let circular = build_graph(
        &[
            AggregatedEdge::new("A", "B", dec!(10)),
            AggregatedEdge::new("B", "C", dec!(10)),
            AggregatedEdge::new("C", "A", dec!(10)),
        ],
        10,
    );
    match circular {
        GraphOutcome::CycleDetected(report) => {
            assert_eq!(report.cycle.len(), 3);
            assert!(report
                .to_string()
                .starts_with("selection produces a circular flow graph"));
        }
        GraphOutcome::Graph(_) => panic!("expected a cycle verdict"),
    }
}

#[test]
fn net_flows_match_graph_netting() {
    let source = andean_source();
    let rows = vec![
        CorridorTotal {
            origin: EntityCode::new("VE"),
            destination: EntityCode::new("CO"),
            total: 3_300,
        },
        CorridorTotal {
            origin: EntityCode::new("CO"),
            destination: EntityCode::new("VE"),
            total: 300,
        },
    ];
    let netting = net_flows(&rows, source.catalog());
    assert_eq!(netting.gross_total, dec!(3600));
    assert_eq!(netting.net_total, dec!(3000));
    assert_eq!(netting.edges.len(), 1);
}

#[test]
fn normalization_reports_bad_input_without_failing() {
    let raw = RawFilterInput {
        period_start: Some("last spring".into()),
        min_flow: Some("-5".into()),
        max_flow: Some("no limit".into()),
        ..Default::default()
    };
    let normalized = normalize_with(&raw, &Default::default());
    assert_eq!(normalized.issues.len(), 2);
    let descriptor = normalized.descriptor;
    assert_eq!(descriptor.period_start().to_string(), "2019-01-01");
    assert_eq!(descriptor.min_flow(), 0);

    // Stable under a second pass.
    assert_eq!(normalize(&RawFilterInput::from(&descriptor)), descriptor);
}

#[test]
fn region_rollup_feeds_graph() {
    let source = andean_source();
    let regional = source.records().rollup_to_regions(source.catalog());
    // Only EC → US crosses regions; MX → US stays inside North America.
    assert_eq!(regional.len(), 1);
    assert_eq!(regional.total(), 450);
}

/// A source that sleeps before answering, failing the seasonal query.
struct SlowSource {
    delay: Duration,
}

#[async_trait]
impl FlowSource for SlowSource {
    async fn query_period_totals(
        &self,
        _: &FilterDescriptor,
    ) -> Result<Vec<PeriodTotal>, SourceError> {
        tokio::time::sleep(self.delay).await;
        Ok(Vec::new())
    }

    async fn query_summary(&self, _: &FilterDescriptor) -> Result<FlowSummary, SourceError> {
        tokio::time::sleep(self.delay).await;
        Ok(FlowSummary {
            total_flow: 7,
            ..Default::default()
        })
    }

    async fn query_top_corridors(
        &self,
        _: &FilterDescriptor,
        _: usize,
    ) -> Result<Vec<CorridorTotal>, SourceError> {
        tokio::time::sleep(self.delay).await;
        Ok(Vec::new())
    }

    async fn query_corridor_time_series(
        &self,
        _: &[CorridorKey],
        _: &FilterDescriptor,
    ) -> Result<Vec<CorridorPoint>, SourceError> {
        tokio::time::sleep(self.delay).await;
        Ok(Vec::new())
    }

    async fn query_seasonal_pattern(
        &self,
        _: &FilterDescriptor,
    ) -> Result<Vec<SeasonalRow>, SourceError> {
        tokio::time::sleep(self.delay).await;
        Err(SourceError::query("seasonal pattern", "warehouse timeout"))
    }

    async fn query_corridor_volatility(
        &self,
        _: &FilterDescriptor,
        _: usize,
    ) -> Result<Vec<CorridorVolatility>, SourceError> {
        tokio::time::sleep(self.delay).await;
        Ok(Vec::new())
    }

    async fn query_entity_catalog(&self) -> Result<Vec<CatalogEntry>, SourceError> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn dashboard_queries_run_concurrently_and_fail_softly() {
    let delay = Duration::from_millis(100);
    let engine = AggregationEngine::new(Arc::new(SlowSource { delay }));
    let descriptor = normalize(&RawFilterInput::default());
    let request = DashboardRequest::new(5).with_series(vec![CorridorKey::new(
        EntityCode::new("VE"),
        EntityCode::new("CO"),
    )]);

    let started = Instant::now();
    let dashboard = engine.dashboard(&descriptor, &request).await;
    let elapsed = started.elapsed();

    // Six queries of 100ms each; run one after another they take 600ms.
    assert!(elapsed < Duration::from_millis(400), "took {:?}", elapsed);
    assert_eq!(dashboard.failed_panels(), 1);
    assert_eq!(
        dashboard.seasonal_pattern.error.as_deref(),
        Some("seasonal pattern query failed: warehouse timeout")
    );
    assert_eq!(dashboard.summary.data.total_flow, 7);
}

#[tokio::test]
async fn stale_dashboard_is_discarded() {
    let engine = AggregationEngine::new(Arc::new(andean_source()));
    let latest = LatestRequest::new();

    let first = latest.begin();
    let second = latest.begin();

    let descriptor = normalize(&RawFilterInput::default());
    let summary = engine.summary(&descriptor).await;

    assert!(first.accept(summary.clone()).is_none());
    assert_eq!(second.accept(summary).map(|p| p.data.total_flow), Some(7_650));
}
