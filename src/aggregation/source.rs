//! The external flow-record source and an in-memory implementation.

use crate::aggregation::stats::{
    self, CorridorPoint, CorridorTotal, CorridorVolatility, FlowSummary, PeriodTotal, SeasonalRow,
};
use crate::core::catalog::EntityCatalog;
use crate::core::entity::{CatalogEntry, EntityCode};
use crate::core::filter::FilterDescriptor;
use crate::core::flow::{CorridorKey, FlowRecord, FlowRecordSet};
use async_trait::async_trait;
use std::collections::BTreeSet;
use thiserror::Error;

/// Failure reported by a flow source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("flow source unavailable: {0}")]
    Unavailable(String),

    #[error("{operation} query failed: {message}")]
    Query {
        operation: &'static str,
        message: String,
    },
}

impl SourceError {
    pub fn query(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Query {
            operation,
            message: message.into(),
        }
    }
}

/// Analytical store holding flow records.
///
/// Every query receives a normalized [`FilterDescriptor`] and returns
/// results already aggregated by the store. Implementations do no retries;
/// the caller decides what a failure means.
///
/// # Implementations
///
/// - [`InMemoryFlowSource`] - evaluates queries over a record set in memory
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FlowSource: Send + Sync {
    /// Period totals in chronological order at the descriptor's granularity.
    async fn query_period_totals(
        &self,
        descriptor: &FilterDescriptor,
    ) -> Result<Vec<PeriodTotal>, SourceError>;

    async fn query_summary(&self, descriptor: &FilterDescriptor)
        -> Result<FlowSummary, SourceError>;

    /// The `limit` largest corridors, total descending.
    async fn query_top_corridors(
        &self,
        descriptor: &FilterDescriptor,
        limit: usize,
    ) -> Result<Vec<CorridorTotal>, SourceError>;

    async fn query_corridor_time_series(
        &self,
        corridors: &[CorridorKey],
        descriptor: &FilterDescriptor,
    ) -> Result<Vec<CorridorPoint>, SourceError>;

    /// One row per sub-year slot, aggregated across the years in range.
    async fn query_seasonal_pattern(
        &self,
        descriptor: &FilterDescriptor,
    ) -> Result<Vec<SeasonalRow>, SourceError>;

    /// The `limit` most volatile corridors.
    async fn query_corridor_volatility(
        &self,
        descriptor: &FilterDescriptor,
        limit: usize,
    ) -> Result<Vec<CorridorVolatility>, SourceError>;

    async fn query_entity_catalog(&self) -> Result<Vec<CatalogEntry>, SourceError>;
}

/// A flow source over records held in memory.
///
/// Catalog rows have their data-availability flags recomputed from the
/// records, and codes that appear only in records get a row of their own
/// named after the code.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFlowSource {
    records: FlowRecordSet,
    catalog: EntityCatalog,
}

impl InMemoryFlowSource {
    pub fn new(records: FlowRecordSet, entries: impl IntoIterator<Item = CatalogEntry>) -> Self {
        let origins: BTreeSet<&EntityCode> = records.records().iter().map(|r| r.origin()).collect();
        let destinations: BTreeSet<&EntityCode> =
            records.records().iter().map(|r| r.destination()).collect();

        let mut rows: Vec<CatalogEntry> = entries.into_iter().collect();
        let known: BTreeSet<EntityCode> = rows.iter().map(|e| e.code.clone()).collect();
        for code in records.entities() {
            if !known.contains(&code) {
                rows.push(CatalogEntry::new(code.as_str(), code.as_str(), None));
            }
        }
        for row in &mut rows {
            row.has_outbound = origins.contains(&row.code);
            row.has_inbound = destinations.contains(&row.code);
        }

        let catalog = EntityCatalog::from_entries(rows);
        Self { records, catalog }
    }

    /// A source whose catalog is derived from the record codes alone.
    pub fn from_records(records: FlowRecordSet) -> Self {
        Self::new(records, Vec::new())
    }

    pub fn records(&self) -> &FlowRecordSet {
        &self.records
    }

    pub fn catalog(&self) -> &EntityCatalog {
        &self.catalog
    }

    fn matching(&self, descriptor: &FilterDescriptor) -> Vec<&FlowRecord> {
        self.records
            .records()
            .iter()
            .filter(|r| descriptor.matches(r, &self.catalog))
            .collect()
    }
}

#[async_trait]
impl FlowSource for InMemoryFlowSource {
    async fn query_period_totals(
        &self,
        descriptor: &FilterDescriptor,
    ) -> Result<Vec<PeriodTotal>, SourceError> {
        Ok(stats::period_totals(
            &self.matching(descriptor),
            descriptor.granularity(),
        ))
    }

    async fn query_summary(
        &self,
        descriptor: &FilterDescriptor,
    ) -> Result<FlowSummary, SourceError> {
        Ok(stats::summarize(
            &self.matching(descriptor),
            descriptor.granularity(),
        ))
    }

    async fn query_top_corridors(
        &self,
        descriptor: &FilterDescriptor,
        limit: usize,
    ) -> Result<Vec<CorridorTotal>, SourceError> {
        Ok(stats::rank_corridors(&self.matching(descriptor), limit))
    }

    async fn query_corridor_time_series(
        &self,
        corridors: &[CorridorKey],
        descriptor: &FilterDescriptor,
    ) -> Result<Vec<CorridorPoint>, SourceError> {
        Ok(stats::corridor_series(
            &self.matching(descriptor),
            corridors,
            descriptor.granularity(),
        ))
    }

    async fn query_seasonal_pattern(
        &self,
        descriptor: &FilterDescriptor,
    ) -> Result<Vec<SeasonalRow>, SourceError> {
        Ok(stats::seasonal_pattern(
            &self.matching(descriptor),
            descriptor.granularity(),
        ))
    }

    async fn query_corridor_volatility(
        &self,
        descriptor: &FilterDescriptor,
        limit: usize,
    ) -> Result<Vec<CorridorVolatility>, SourceError> {
        Ok(stats::corridor_volatility(
            &self.matching(descriptor),
            descriptor.granularity(),
            limit,
        ))
    }

    async fn query_entity_catalog(&self) -> Result<Vec<CatalogEntry>, SourceError> {
        Ok(self.catalog.entries().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::filter::{normalize, RawFilterInput};
    use crate::core::period::CalendarMonth;

    fn record(from: &str, to: &str, month: &str, count: u64) -> FlowRecord {
        FlowRecord::new(
            EntityCode::new(from),
            EntityCode::new(to),
            month.parse::<CalendarMonth>().unwrap(),
            count,
        )
    }

    fn source() -> InMemoryFlowSource {
        let records: FlowRecordSet = vec![
            record("VE", "CO", "2019-03", 500),
            record("VE", "CO", "2021-03", 700),
            record("CO", "US", "2020-06", 80),
            record("MX", "US", "2020-06", 300),
        ]
        .into_iter()
        .collect();
        InMemoryFlowSource::new(
            records,
            vec![
                CatalogEntry::new("VE", "Venezuela", Some("South America")),
                CatalogEntry::new("CO", "Colombia", Some("South America")),
                CatalogEntry::new("US", "United States", Some("North America")),
                CatalogEntry::new("BR", "Brazil", Some("South America")),
            ],
        )
    }

    #[test]
    fn test_catalog_flags_follow_records() {
        let source = source();
        let catalog = source.catalog();
        let us = catalog.get(&EntityCode::new("US")).unwrap();
        assert!(!us.has_outbound);
        assert!(us.has_inbound);
        let brazil = catalog.get(&EntityCode::new("BR")).unwrap();
        assert!(!brazil.has_outbound && !brazil.has_inbound);
        // MX appears only in records.
        assert_eq!(catalog.display_name(&EntityCode::new("MX")).as_str(), "MX");
    }

    #[tokio::test]
    async fn test_queries_respect_descriptor() {
        let source = source();
        let raw = RawFilterInput {
            period_start: Some("2020-01".into()),
            include_regions: Some(vec!["North America".into()]),
            ..Default::default()
        };
        let descriptor = normalize(&raw);

        let summary = source.query_summary(&descriptor).await.unwrap();
        // VE→CO lies outside North America; MX has no region but reaches US.
        assert_eq!(summary.total_flow, 380);
        assert_eq!(summary.unique_corridor_count, 2);

        let top = source.query_top_corridors(&descriptor, 1).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].origin.as_str(), "MX");
    }

    #[tokio::test]
    async fn test_loaded_self_loops_do_not_reach_aggregates() {
        let records: FlowRecordSet = serde_json::from_str(
            r#"{ "records": [
                { "origin": "FR", "destination": "FR", "month": "2020-01", "count": 10 },
                { "origin": "FR", "destination": "ES", "month": "2020-01", "count": 5 }
            ] }"#,
        )
        .unwrap();
        let source = InMemoryFlowSource::from_records(records);
        let summary = source
            .query_summary(&normalize(&RawFilterInput::default()))
            .await
            .unwrap();
        assert_eq!(summary.total_flow, 5);
        assert_eq!(summary.unique_corridor_count, 1);
    }

    #[tokio::test]
    async fn test_catalog_query() {
        let entries = source().query_entity_catalog().await.unwrap();
        let codes: Vec<&str> = entries.iter().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, vec!["BR", "CO", "MX", "US", "VE"]);
    }

    #[test]
    fn test_error_display() {
        let err = SourceError::query("summary", "timeout");
        assert_eq!(err.to_string(), "summary query failed: timeout");
    }
}
