//! Aggregation queries with soft failure.
//!
//! Each query goes to the [`FlowSource`] exactly once. A failing query is
//! logged and recovered into a [`Panel`] holding the empty result plus the
//! error text, so the remaining panels of a view still render.

use crate::aggregation::source::{FlowSource, SourceError};
use crate::aggregation::stats::{
    corridor_edges, corridor_rank_order, CorridorPoint, CorridorTotal, CorridorVolatility,
    FlowSummary, PeriodTotal, SeasonalRow,
};
use crate::core::catalog::EntityCatalog;
use crate::core::filter::FilterDescriptor;
use crate::core::flow::CorridorKey;
use crate::graph::flow_graph::{build_graph, GraphOutcome};
use serde::Serialize;
use std::sync::Arc;

/// Result of one query as a view panel sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Panel<T> {
    /// The query result, or the empty fallback when the query failed.
    pub data: T,
    /// Set when the query failed.
    pub error: Option<String>,
}

impl<T> Panel<T> {
    pub fn ok(data: T) -> Self {
        Self { data, error: None }
    }

    pub fn failed(data: T, error: impl ToString) -> Self {
        Self {
            data,
            error: Some(error.to_string()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_data(self) -> T {
        self.data
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Panel<U> {
        Panel {
            data: f(self.data),
            error: self.error,
        }
    }
}

fn recover<T: Default>(operation: &str, result: Result<T, SourceError>) -> Panel<T> {
    match result {
        Ok(data) => Panel::ok(data),
        Err(e) => {
            log::warn!("{} query failed, using empty result: {}", operation, e);
            Panel::failed(T::default(), e)
        }
    }
}

/// What a dashboard view needs besides the filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardRequest {
    pub corridor_limit: usize,
    pub volatility_limit: usize,
    /// Corridors whose time series the view charts.
    pub series: Vec<CorridorKey>,
}

impl DashboardRequest {
    pub fn new(corridor_limit: usize) -> Self {
        Self {
            corridor_limit,
            volatility_limit: corridor_limit,
            series: Vec::new(),
        }
    }

    pub fn with_series(mut self, series: Vec<CorridorKey>) -> Self {
        self.series = series;
        self
    }
}

/// All panels of one dashboard view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub period_totals: Panel<Vec<PeriodTotal>>,
    pub summary: Panel<FlowSummary>,
    pub top_corridors: Panel<Vec<CorridorTotal>>,
    pub corridor_series: Panel<Vec<CorridorPoint>>,
    pub seasonal_pattern: Panel<Vec<SeasonalRow>>,
    pub volatility: Panel<Vec<CorridorVolatility>>,
}

impl Dashboard {
    pub fn failed_panels(&self) -> usize {
        [
            self.period_totals.is_ok(),
            self.summary.is_ok(),
            self.top_corridors.is_ok(),
            self.corridor_series.is_ok(),
            self.seasonal_pattern.is_ok(),
            self.volatility.is_ok(),
        ]
        .iter()
        .filter(|ok| !**ok)
        .count()
    }

    pub fn is_complete(&self) -> bool {
        self.failed_panels() == 0
    }
}

/// Issues aggregation queries against a flow source.
pub struct AggregationEngine<S: FlowSource> {
    source: Arc<S>,
}

impl<S: FlowSource> AggregationEngine<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    pub async fn period_totals(&self, descriptor: &FilterDescriptor) -> Panel<Vec<PeriodTotal>> {
        recover(
            "period totals",
            self.source.query_period_totals(descriptor).await,
        )
    }

    pub async fn summary(&self, descriptor: &FilterDescriptor) -> Panel<FlowSummary> {
        recover("summary", self.source.query_summary(descriptor).await)
    }

    /// Ranked corridors. The result is re-sorted and cut to `limit` here, so
    /// the ordering and size guarantees hold for any source.
    pub async fn top_corridors(
        &self,
        descriptor: &FilterDescriptor,
        limit: usize,
    ) -> Panel<Vec<CorridorTotal>> {
        recover(
            "top corridors",
            self.source.query_top_corridors(descriptor, limit).await,
        )
        .map(|mut rows| {
            rows.sort_by(corridor_rank_order);
            rows.truncate(limit);
            rows
        })
    }

    pub async fn corridor_time_series(
        &self,
        corridors: &[CorridorKey],
        descriptor: &FilterDescriptor,
    ) -> Panel<Vec<CorridorPoint>> {
        if corridors.is_empty() {
            return Panel::ok(Vec::new());
        }
        recover(
            "corridor time series",
            self.source
                .query_corridor_time_series(corridors, descriptor)
                .await,
        )
    }

    pub async fn seasonal_pattern(&self, descriptor: &FilterDescriptor) -> Panel<Vec<SeasonalRow>> {
        recover(
            "seasonal pattern",
            self.source.query_seasonal_pattern(descriptor).await,
        )
    }

    pub async fn corridor_volatility(
        &self,
        descriptor: &FilterDescriptor,
        limit: usize,
    ) -> Panel<Vec<CorridorVolatility>> {
        recover(
            "corridor volatility",
            self.source.query_corridor_volatility(descriptor, limit).await,
        )
        .map(|mut rows| {
            rows.truncate(limit);
            rows
        })
    }

    /// Fetch the entity catalog and build the lookup cache from it.
    pub async fn entity_catalog(&self) -> Panel<EntityCatalog> {
        recover("entity catalog", self.source.query_entity_catalog().await)
            .map(EntityCatalog::from_entries)
    }

    /// Run every dashboard query concurrently and collect the panels.
    pub async fn dashboard(
        &self,
        descriptor: &FilterDescriptor,
        request: &DashboardRequest,
    ) -> Dashboard {
        let (period_totals, summary, top_corridors, corridor_series, seasonal_pattern, volatility) = tokio::join!(
            self.period_totals(descriptor),
            self.summary(descriptor),
            self.top_corridors(descriptor, request.corridor_limit),
            self.corridor_time_series(&request.series, descriptor),
            self.seasonal_pattern(descriptor),
            self.corridor_volatility(descriptor, request.volatility_limit),
        );

        let dashboard = Dashboard {
            period_totals,
            summary,
            top_corridors,
            corridor_series,
            seasonal_pattern,
            volatility,
        };
        if !dashboard.is_complete() {
            log::warn!(
                "dashboard rendered with {} failed panel(s)",
                dashboard.failed_panels()
            );
        }
        dashboard
    }

    /// Rank corridors and build the flow graph for them.
    ///
    /// A failed ranking query yields an empty graph with the error set.
    pub async fn flow_graph(
        &self,
        descriptor: &FilterDescriptor,
        catalog: &EntityCatalog,
        corridor_limit: usize,
        top_k: usize,
    ) -> Panel<GraphOutcome> {
        self.top_corridors(descriptor, corridor_limit)
            .await
            .map(|rows| build_graph(&corridor_edges(&rows, catalog), top_k))
    }
}
