//! Synthetic flow data for benchmarks, demos and the `generate` command.
//!
//! Each generated corridor carries a base monthly volume, modulated by a
//! yearly seasonal swing and some noise, so the seasonal and volatility
//! tables have something to show.

use crate::core::entity::{CatalogEntry, EntityCode};
use crate::core::flow::{FlowRecord, FlowRecordSet};
use crate::core::period::CalendarMonth;
use crate::graph::flow_graph::AggregatedEdge;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::f64::consts::PI;

/// Shape of a generated dataset.
#[derive(Debug, Clone)]
pub struct DatasetConfig {
    pub entity_count: usize,
    /// Entities are spread round-robin over this many regions.
    pub region_count: usize,
    pub start: CalendarMonth,
    pub months: usize,
    /// Distinct outbound corridors per entity.
    pub corridors_per_entity: usize,
    /// Range of a corridor's base monthly volume.
    pub min_count: u64,
    pub max_count: u64,
    /// Peak-to-mean ratio of the yearly swing, 0 for none.
    pub seasonal_amplitude: f64,
    /// Fixed seed for reproducible output.
    pub seed: Option<u64>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            entity_count: 10,
            region_count: 3,
            start: CalendarMonth::from_valid(2019, 1),
            months: 48,
            corridors_per_entity: 3,
            min_count: 10,
            max_count: 10_000,
            seasonal_amplitude: 0.3,
            seed: None,
        }
    }
}

/// Generated catalog rows and flow records.
#[derive(Debug, Clone)]
pub struct GeneratedDataset {
    pub catalog: Vec<CatalogEntry>,
    pub records: FlowRecordSet,
}

fn rng_for(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

fn entity_code(i: usize) -> EntityCode {
    EntityCode::new(format!("E{:03}", i))
}

/// Generate a random dataset.
pub fn generate_dataset(config: &DatasetConfig) -> GeneratedDataset {
    let mut rng = rng_for(config.seed);
    let regions = config.region_count.max(1);

    let catalog: Vec<CatalogEntry> = (0..config.entity_count)
        .map(|i| {
            let region = format!("Region {}", i % regions);
            CatalogEntry::new(
                entity_code(i).as_str(),
                format!("Entity {:03}", i),
                Some(region.as_str()),
            )
        })
        .collect();

    let mut corridors: BTreeSet<(usize, usize, u64)> = BTreeSet::new();
    if config.entity_count >= 2 {
        let per_entity = config.corridors_per_entity.min(config.entity_count - 1);
        let low = config.min_count.max(1);
        let high = config.max_count.max(low);
        for origin in 0..config.entity_count {
            let mut targets = BTreeSet::new();
            while targets.len() < per_entity {
                let target = rng.gen_range(0..config.entity_count);
                if target != origin {
                    targets.insert(target);
                }
            }
            for target in targets {
                corridors.insert((origin, target, rng.gen_range(low..=high)));
            }
        }
    }

    let mut records = FlowRecordSet::new();
    for (origin, target, base) in corridors {
        // Each corridor peaks in its own month.
        let phase = rng.gen_range(0.0..(2.0 * PI));
        let mut month = config.start;
        for _ in 0..config.months {
            let angle = 2.0 * PI * f64::from(month.month() - 1) / 12.0 + phase;
            let seasonal = 1.0 + config.seasonal_amplitude * angle.sin();
            let noise = rng.gen_range(0.8..1.2);
            let count = (base as f64 * seasonal * noise).round().max(0.0) as u64;
            if count > 0 {
                records.add(FlowRecord::new(
                    entity_code(origin),
                    entity_code(target),
                    month,
                    count,
                ));
            }
            month = month.succ();
        }
    }

    log::debug!(
        "generated {} records over {} entities",
        records.len(),
        config.entity_count
    );
    GeneratedDataset { catalog, records }
}

/// Generate `edge_count` random graph edges between `node_count` named
/// nodes. Self-loops are skipped, so fewer edges may come back.
pub fn generate_edges(node_count: usize, edge_count: usize, seed: Option<u64>) -> Vec<AggregatedEdge> {
    let mut rng = rng_for(seed);
    let mut edges = Vec::with_capacity(edge_count);
    if node_count < 2 {
        return edges;
    }
    for _ in 0..edge_count {
        let source = rng.gen_range(0..node_count);
        let target = rng.gen_range(0..node_count);
        if source == target {
            continue;
        }
        edges.push(AggregatedEdge::new(
            format!("N{:04}", source),
            format!("N{:04}", target),
            Decimal::from(rng.gen_range(1u64..1_000_000)),
        ));
    }
    edges
}
