//! # flow-atlas
//!
//! Aggregation and flow-graph construction for bilateral migration flows.
//!
//! Given monthly origin → destination flow counts, this crate normalizes
//! filter input, runs aggregation queries against an analytical source
//! with soft failure, resolves origin/destination selections, and turns
//! ranked corridors into a netted, acyclic graph for Sankey rendering.
//!
//! ## Architecture
//!
//! - **core** — Foundational types: entities, calendar months, flow records, filters
//! - **graph** — Flow graph builder, bilateral netting, cycle detection, strongly connected components
//! - **aggregation** — Flow source trait, statistic kernels, aggregation engine
//! - **selection** — Origin/destination selection model and resolver
//! - **simulation** — Synthetic dataset generation
//! - **config** — Explorer defaults and JSON overrides

pub mod aggregation;
pub mod config;
pub mod core;
pub mod graph;
pub mod selection;
pub mod simulation;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::aggregation::engine::{AggregationEngine, Dashboard, DashboardRequest, Panel};
    pub use crate::aggregation::latest::{LatestRequest, RequestTicket};
    pub use crate::aggregation::source::{FlowSource, InMemoryFlowSource, SourceError};
    pub use crate::config::ExplorerConfig;
    pub use crate::core::catalog::EntityCatalog;
    pub use crate::core::entity::{CatalogEntry, EntityCode, EntityName, RegionName};
    pub use crate::core::filter::{normalize, FilterDescriptor, RawFilterInput};
    pub use crate::core::flow::{CorridorKey, FlowRecord, FlowRecordSet};
    pub use crate::core::period::{CalendarMonth, Granularity, PeriodKey};
    pub use crate::graph::flow_graph::{build_graph, AggregatedEdge, FlowGraph, GraphOutcome};
    pub use crate::selection::{resolve_selection, CorridorSelection, Side, SideSelection};
}
