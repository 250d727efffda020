//! Statistic kernels over already-filtered flow records.
//!
//! These are the computations a data source performs server-side. The
//! in-memory source runs them directly; the derived-series helpers
//! (`rolling_average`, `growth_rates`, `trend_slopes`) also run client-side
//! over a corridor time series.
//!
//! Counts are summed with saturating arithmetic.


use crate::core::catalog::EntityCatalog;
use crate::core::entity::EntityCode;
use crate::core::flow::{CorridorKey, FlowRecord};
use crate::core::period::{Granularity, PeriodKey};
use crate::graph::flow_graph::AggregatedEdge;
use crate::graph::netting::{net_bilateral, NettingResult};
use rust_decimal::Decimal;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Total flow in one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodTotal {
    pub period: PeriodKey,
    pub total: u64,
}

/// Headline numbers for a filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlowSummary {
    pub total_flow: u64,
    pub unique_corridor_count: usize,
    pub active_period_count: usize,
    pub average_per_period: Decimal,
}

/// Total flow along one corridor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorridorTotal {
    pub origin: EntityCode,
    pub destination: EntityCode,
    pub total: u64,
}

impl CorridorTotal {
    pub fn key(&self) -> CorridorKey {
        CorridorKey::new(self.origin.clone(), self.destination.clone())
    }
}

/// Corridor ranking order: total descending, then origin and destination
/// codes ascending.
pub fn corridor_rank_order(a: &CorridorTotal, b: &CorridorTotal) -> Ordering {
    b.total
        .cmp(&a.total)
        .then_with(|| a.origin.cmp(&b.origin))
        .then_with(|| a.destination.cmp(&b.destination))
}

/// Flow along one corridor in one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorridorPoint {
    pub corridor: CorridorKey,
    pub period: PeriodKey,
    pub value: u64,
}

/// Distribution of period totals for one sub-year slot across years.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeasonalRow {
    pub period_label: String,
    pub average: Decimal,
    pub max: u64,
    pub min: u64,
}

/// How much a corridor's flow swings from period to period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorridorVolatility {
    pub corridor: CorridorKey,
    /// Periods in which the corridor carried any flow.
    pub periods: usize,
    pub mean: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    /// `std_dev / mean`, zero when the mean is zero.
    pub coefficient_of_variation: f64,
}

/// A corridor time-series point with its trailing average.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollingPoint {
    pub corridor: CorridorKey,
    pub period: PeriodKey,
    pub value: u64,
    /// Mean of this and the preceding `window - 1` points; `None` until
    /// the window is full.
    pub rolling: Option<Decimal>,
}

/// A corridor time-series point with its change from the previous point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GrowthPoint {
    pub corridor: CorridorKey,
    pub period: PeriodKey,
    pub value: u64,
    /// Percentage change; `None` for the first point or after a zero.
    pub growth_percent: Option<Decimal>,
    /// Change in `growth_percent` from the previous point, in percentage
    /// points; `None` unless both growth values exist.
    pub growth_velocity: Option<Decimal>,
}

/// Least-squares trend of a corridor's most recent points.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorridorTrend {
    pub corridor: CorridorKey,
    /// Points the corridor has in the series.
    pub points: usize,
    /// Change in flow per period; `None` when the corridor has fewer
    /// points than the trend window.
    pub slope: Option<f64>,
}

/// A corridor's standing among all corridors in one year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorridorRanking {
    pub year: i32,
    pub origin: EntityCode,
    pub destination: EntityCode,
    pub total: u64,
    /// Dense rank, 1 for the largest total; equal totals share a rank.
    pub rank: usize,
    /// Share of the year's corridors at or below this total, in percent,
    /// with ties taking their average position.
    pub percentile: f64,
}

/// Add `count` into a running total, saturating at `u64::MAX`.
fn accumulate(total: &mut u64, count: u64) {
    *total = total.saturating_add(count);
}

fn saturating_sum(values: impl IntoIterator<Item = u64>) -> u64 {
    values.into_iter().fold(0, u64::saturating_add)
}

/// Period totals in chronological order.
pub fn period_totals(records: &[&FlowRecord], granularity: Granularity) -> Vec<PeriodTotal> {
    let mut totals: BTreeMap<PeriodKey, u64> = BTreeMap::new();
    for record in records {
        accumulate(
            totals.entry(record.month().bucket(granularity)).or_insert(0),
            record.count(),
        );
    }
    totals
        .into_iter()
        .map(|(period, total)| PeriodTotal { period, total })
        .collect()
}

pub fn summarize(records: &[&FlowRecord], granularity: Granularity) -> FlowSummary {
    let total_flow = saturating_sum(records.iter().map(|r| r.count()));
    let corridors: BTreeSet<CorridorKey> = records.iter().map(|r| r.corridor()).collect();
    let periods: BTreeSet<PeriodKey> = records
        .iter()
        .map(|r| r.month().bucket(granularity))
        .collect();

    let average_per_period = if periods.is_empty() {
        Decimal::ZERO
    } else {
        Decimal::from(total_flow) / Decimal::from(periods.len() as u64)
    };

    FlowSummary {
        total_flow,
        unique_corridor_count: corridors.len(),
        active_period_count: periods.len(),
        average_per_period,
    }
}

/// The `limit` largest corridors by total flow.
pub fn rank_corridors(records: &[&FlowRecord], limit: usize) -> Vec<CorridorTotal> {
    let mut totals: BTreeMap<CorridorKey, u64> = BTreeMap::new();
    for record in records {
        accumulate(totals.entry(record.corridor()).or_insert(0), record.count());
    }
    let mut ranked: Vec<CorridorTotal> = totals
        .into_iter()
        .map(|(key, total)| CorridorTotal {
            origin: key.origin,
            destination: key.destination,
            total,
        })
        .collect();
    ranked.sort_by(corridor_rank_order);
    ranked.truncate(limit);
    ranked
}

/// Per-period flow for the requested corridors, grouped in request order
/// and chronological within each corridor. Periods without flow are
/// omitted.
pub fn corridor_series(
    records: &[&FlowRecord],
    corridors: &[CorridorKey],
    granularity: Granularity,
) -> Vec<CorridorPoint> {
    let mut wanted: Vec<&CorridorKey> = Vec::new();
    for key in corridors {
        if !wanted.contains(&key) {
            wanted.push(key);
        }
    }

    let mut values: BTreeMap<(&EntityCode, &EntityCode), BTreeMap<PeriodKey, u64>> =
        BTreeMap::new();
    for record in records {
        accumulate(
            values
                .entry((record.origin(), record.destination()))
                .or_default()
                .entry(record.month().bucket(granularity))
                .or_insert(0),
            record.count(),
        );
    }

    let mut points = Vec::new();
    for key in wanted {
        if let Some(periods) = values.get(&(&key.origin, &key.destination)) {
            points.extend(periods.iter().map(|(period, value)| CorridorPoint {
                corridor: key.clone(),
                period: *period,
                value: *value,
            }));
        }
    }
    points
}

/// Average, maximum and minimum of the period totals that fall in each
/// sub-year slot ("Jan", "Q3", ...), across every year with any flow. A
/// year in which a slot carried nothing counts as 0 for that slot. Yearly
/// granularity yields one row per year.
pub fn seasonal_pattern(records: &[&FlowRecord], granularity: Granularity) -> Vec<SeasonalRow> {
    let mut years: BTreeSet<i32> = BTreeSet::new();
    let mut slots: BTreeMap<i64, (String, BTreeMap<i32, u64>)> = BTreeMap::new();
    for PeriodTotal { period, total } in period_totals(records, granularity) {
        years.insert(period.year());
        slots
            .entry(period.season_index())
            .or_insert_with(|| (period.season_label(), BTreeMap::new()))
            .1
            .insert(period.year(), total);
    }

    slots
        .into_values()
        .map(|(period_label, by_year)| {
            let totals: Vec<u64> = if granularity == Granularity::Yearly {
                by_year.into_values().collect()
            } else {
                years
                    .iter()
                    .map(|year| by_year.get(year).copied().unwrap_or(0))
                    .collect()
            };
            let sum = saturating_sum(totals.iter().copied());
            SeasonalRow {
                period_label,
                average: Decimal::from(sum) / Decimal::from(totals.len() as u64),
                max: totals.iter().copied().max().unwrap_or(0),
                min: totals.iter().copied().min().unwrap_or(0),
            }
        })
        .collect()
}

/// Volatility of every corridor over the periods in which it carried flow,
/// most volatile first, ties by corridor. At most `limit` rows.
pub fn corridor_volatility(
    records: &[&FlowRecord],
    granularity: Granularity,
    limit: usize,
) -> Vec<CorridorVolatility> {
    let mut series: BTreeMap<CorridorKey, BTreeMap<PeriodKey, u64>> = BTreeMap::new();
    for record in records {
        accumulate(
            series
                .entry(record.corridor())
                .or_default()
                .entry(record.month().bucket(granularity))
                .or_insert(0),
            record.count(),
        );
    }

    let mut rows: Vec<CorridorVolatility> = series
        .into_iter()
        .map(|(corridor, periods)| {
            let n = periods.len() as f64;
            let mean = periods.values().map(|v| *v as f64).sum::<f64>() / n;
            let variance = periods
                .values()
                .map(|v| (*v as f64 - mean).powi(2))
                .sum::<f64>()
                / n;
            let std_dev = variance.sqrt();
            CorridorVolatility {
                corridor,
                periods: periods.len(),
                mean,
                std_dev,
                coefficient_of_variation: if mean > 0.0 { std_dev / mean } else { 0.0 },
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        b.coefficient_of_variation
            .total_cmp(&a.coefficient_of_variation)
            .then_with(|| a.corridor.cmp(&b.corridor))
    });
    rows.truncate(limit);
    rows
}

/// Split a series into per-corridor runs, keeping the corridors' first
/// appearance order and sorting each run chronologically.
fn runs(series: &[CorridorPoint]) -> Vec<Vec<&CorridorPoint>> {
    let mut order: HashMap<&CorridorKey, usize> = HashMap::new();
    let mut runs: Vec<Vec<&CorridorPoint>> = Vec::new();
    for point in series {
        let slot = *order.entry(&point.corridor).or_insert_with(|| {
            runs.push(Vec::new());
            runs.len() - 1
        });
        runs[slot].push(point);
    }
    for run in &mut runs {
        run.sort_by_key(|p| p.period);
    }
    runs
}

/// Trailing mean over `window` consecutive points of each corridor.
pub fn rolling_average(series: &[CorridorPoint], window: usize) -> Vec<RollingPoint> {
    let mut out = Vec::with_capacity(series.len());
    for run in runs(series) {
        for (i, point) in run.iter().enumerate() {
            let rolling = (window > 0 && i + 1 >= window).then(|| {
                let sum = saturating_sum(run[i + 1 - window..=i].iter().map(|p| p.value));
                Decimal::from(sum) / Decimal::from(window as u64)
            });
            out.push(RollingPoint {
                corridor: point.corridor.clone(),
                period: point.period,
                value: point.value,
                rolling,
            });
        }
    }
    out
}

/// Period-over-period percentage change for each corridor, and the
/// change of that change.
pub fn growth_rates(series: &[CorridorPoint]) -> Vec<GrowthPoint> {
    let mut out = Vec::with_capacity(series.len());
    for run in runs(series) {
        let mut previous: Option<u64> = None;
        let mut previous_growth: Option<Decimal> = None;
        for point in run {
            let growth_percent = previous.filter(|p| *p > 0).map(|p| {
                (Decimal::from(point.value) - Decimal::from(p)) / Decimal::from(p)
                    * Decimal::ONE_HUNDRED
            });
            let growth_velocity = match (growth_percent, previous_growth) {
                (Some(now), Some(before)) => now.checked_sub(before),
                _ => None,
            };
            out.push(GrowthPoint {
                corridor: point.corridor.clone(),
                period: point.period,
                value: point.value,
                growth_percent,
                growth_velocity,
            });
            previous = Some(point.value);
            previous_growth = growth_percent;
        }
    }
    out
}

/// Slope of the least-squares line through `values` at x = 0, 1, 2, ...
fn least_squares_slope(values: &[u64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = values.iter().map(|v| *v as f64).sum::<f64>() / n;
    let (mut covariance, mut spread) = (0.0, 0.0);
    for (i, v) in values.iter().enumerate() {
        let dx = i as f64 - mean_x;
        covariance += dx * (*v as f64 - mean_y);
        spread += dx * dx;
    }
    Some(covariance / spread)
}

/// Linear trend over the last `window` points of each corridor, in the
/// corridors' first-appearance order.
pub fn trend_slopes(series: &[CorridorPoint], window: usize) -> Vec<CorridorTrend> {
    runs(series)
        .into_iter()
        .filter_map(|run| {
            let corridor = run.first()?.corridor.clone();
            let slope = if window >= 2 && run.len() >= window {
                let recent: Vec<u64> = run[run.len() - window..].iter().map(|p| p.value).collect();
                least_squares_slope(&recent)
            } else {
                None
            };
            Some(CorridorTrend {
                corridor,
                points: run.len(),
                slope,
            })
        })
        .collect()
}

/// Rank every corridor within each calendar year by its yearly total.
///
/// Rows come out by year, then rank, then corridor.
pub fn rank_corridors_by_year(records: &[&FlowRecord]) -> Vec<CorridorRanking> {
    let mut by_year: BTreeMap<i32, BTreeMap<CorridorKey, u64>> = BTreeMap::new();
    for record in records {
        accumulate(
            by_year
                .entry(record.month().year())
                .or_default()
                .entry(record.corridor())
                .or_insert(0),
            record.count(),
        );
    }

    let mut rankings = Vec::new();
    for (year, totals) in by_year {
        let mut ascending: Vec<u64> = totals.values().copied().collect();
        ascending.sort_unstable();
        let distinct: BTreeSet<u64> = ascending.iter().copied().collect();
        let n = ascending.len() as f64;

        let mut rows: Vec<CorridorRanking> = totals
            .into_iter()
            .map(|(key, total)| {
                let below = ascending.partition_point(|v| *v < total);
                let through = ascending.partition_point(|v| *v <= total);
                // Average of the 1-based positions below..through.
                let position = (below + 1 + through) as f64 / 2.0;
                CorridorRanking {
                    year,
                    origin: key.origin,
                    destination: key.destination,
                    total,
                    rank: distinct.range(total..).count(),
                    percentile: position / n * 100.0,
                }
            })
            .collect();
        rows.sort_by(|a, b| {
            a.rank
                .cmp(&b.rank)
                .then_with(|| a.origin.cmp(&b.origin))
                .then_with(|| a.destination.cmp(&b.destination))
        });
        rankings.extend(rows);
    }
    rankings
}

/// Turn ranked corridors into graph edges keyed by display name.
pub fn corridor_edges(rows: &[CorridorTotal], catalog: &EntityCatalog) -> Vec<AggregatedEdge> {
    rows.iter()
        .map(|row| {
            AggregatedEdge::new(
                catalog.display_name(&row.origin),
                catalog.display_name(&row.destination),
                Decimal::from(row.total),
            )
        })
        .collect()
}

/// Net opposing corridors into one directed flow per entity pair.
pub fn net_flows(rows: &[CorridorTotal], catalog: &EntityCatalog) -> NettingResult {
    let edges: Vec<AggregatedEdge> = corridor_edges(rows, catalog)
        .into_iter()
        .filter(|e| e.is_valid())
        .collect();
    net_bilateral(&edges)
}
