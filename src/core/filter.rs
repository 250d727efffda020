//! Filter normalization.
//!
//! Turns whatever the filter form currently holds into a [`FilterDescriptor`]
//! that every aggregation query consumes. Normalization never fails: a value
//! that cannot be used is replaced by its default and reported as a
//! [`FilterIssue`] next to the descriptor.

use crate::config::ExplorerConfig;
use crate::core::catalog::EntityCatalog;
use crate::core::entity::{EntityCode, RegionName};
use crate::core::flow::FlowRecord;
use crate::core::period::{CalendarMonth, Granularity, PeriodParseError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// Spellings of the "no limit" option for the upper flow bound.
const NO_LIMIT: [&str; 5] = ["no_limit", "no limit", "unlimited", "none", "any"];

/// Upper bound on a single record's count.
///
/// `Unbounded` orders above every finite bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowBound {
    Finite(u64),
    Unbounded,
}

impl FlowBound {
    pub fn admits(&self, count: u64) -> bool {
        match self {
            FlowBound::Finite(max) => count <= *max,
            FlowBound::Unbounded => true,
        }
    }
}

impl fmt::Display for FlowBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowBound::Finite(v) => write!(f, "{}", v),
            FlowBound::Unbounded => f.write_str("no_limit"),
        }
    }
}

/// Constraint on one side (origin or destination) of a corridor.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideConstraint {
    /// "World": any entity.
    #[default]
    Unrestricted,
    /// Entities that are one of `countries` or belong to one of `regions`.
    /// Both sets empty admits nothing.
    Members {
        countries: BTreeSet<EntityCode>,
        regions: BTreeSet<RegionName>,
    },
}

impl SideConstraint {
    pub fn is_unrestricted(&self) -> bool {
        matches!(self, SideConstraint::Unrestricted)
    }

    pub fn admits(&self, code: &EntityCode, region: Option<&RegionName>) -> bool {
        match self {
            SideConstraint::Unrestricted => true,
            SideConstraint::Members { countries, regions } => {
                countries.contains(code) || region.map_or(false, |r| regions.contains(r))
            }
        }
    }
}

/// Origin and destination constraints produced by the selection resolver.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CorridorConstraints {
    pub origin: SideConstraint,
    pub destination: SideConstraint,
}

impl CorridorConstraints {
    pub fn unrestricted() -> Self {
        Self::default()
    }

    pub fn admits(&self, record: &FlowRecord, catalog: &EntityCatalog) -> bool {
        self.origin
            .admits(record.origin(), catalog.region_of(record.origin()))
            && self
                .destination
                .admits(record.destination(), catalog.region_of(record.destination()))
    }
}

/// Filter values as they arrive from the filter form. Everything is
/// optional and stringly typed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawFilterInput {
    /// `YYYY-MM` or `YYYY-MM-DD`.
    pub period_start: Option<String>,
    /// `YYYY-MM` or `YYYY-MM-DD`.
    pub period_end: Option<String>,
    pub include_regions: Option<Vec<String>>,
    pub include_countries: Option<Vec<String>>,
    pub exclude_countries: Option<Vec<String>>,
    pub exclude_regions: Option<Vec<String>>,
    pub min_flow: Option<String>,
    /// A number or one of the "no limit" spellings.
    pub max_flow: Option<String>,
    pub granularity: Option<String>,
    pub corridor: CorridorConstraints,
}

/// A filter value that had to be replaced or adjusted during normalization.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterIssue {
    #[error("{field} '{value}' is not a date: {reason}")]
    MalformedDate {
        field: &'static str,
        value: String,
        reason: PeriodParseError,
    },
    #[error("period start {start} is after period end {end}; bounds swapped")]
    InvertedPeriod { start: NaiveDate, end: NaiveDate },
    #[error("{field} '{value}' is not a non-negative integer")]
    InvalidFlowBound { field: &'static str, value: String },
    #[error("min flow {min} exceeds max flow {max}; bounds swapped")]
    InvertedFlowBounds { min: u64, max: u64 },
    #[error("unknown granularity '{0}'; using monthly")]
    UnknownGranularity(String),
    #[error("{dimension} {entries:?} both included and excluded; exclusion wins")]
    IncludeExcludeOverlap {
        dimension: &'static str,
        entries: Vec<String>,
    },
}

/// Canonical, fully specified query parameters.
///
/// Built fresh on every filter change and never mutated afterwards.
///
/// Include sets are `None` when the dimension is not restricted. `Some` of an
/// empty set means the caller did restrict the dimension but nothing is left
/// after exclusions, so the descriptor matches no record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterDescriptor {
    period_start: NaiveDate,
    period_end: NaiveDate,
    include_regions: Option<BTreeSet<RegionName>>,
    include_countries: Option<BTreeSet<EntityCode>>,
    exclude_countries: BTreeSet<EntityCode>,
    exclude_regions: BTreeSet<RegionName>,
    min_flow: u64,
    max_flow: FlowBound,
    granularity: Granularity,
    corridor: CorridorConstraints,
}

impl FilterDescriptor {
    pub fn period_start(&self) -> NaiveDate {
        self.period_start
    }

    pub fn period_end(&self) -> NaiveDate {
        self.period_end
    }

    pub fn include_regions(&self) -> Option<&BTreeSet<RegionName>> {
        self.include_regions.as_ref()
    }

    pub fn include_countries(&self) -> Option<&BTreeSet<EntityCode>> {
        self.include_countries.as_ref()
    }

    pub fn exclude_countries(&self) -> &BTreeSet<EntityCode> {
        &self.exclude_countries
    }

    pub fn exclude_regions(&self) -> &BTreeSet<RegionName> {
        &self.exclude_regions
    }

    pub fn min_flow(&self) -> u64 {
        self.min_flow
    }

    pub fn max_flow(&self) -> FlowBound {
        self.max_flow
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn corridor(&self) -> &CorridorConstraints {
        &self.corridor
    }

    /// A copy of this descriptor scoped to the given corridor constraints.
    pub fn with_corridor(&self, corridor: CorridorConstraints) -> Self {
        Self {
            corridor,
            ..self.clone()
        }
    }

    /// A copy of this descriptor rolled up at another granularity.
    pub fn with_granularity(&self, granularity: Granularity) -> Self {
        Self {
            granularity,
            ..self.clone()
        }
    }

    /// Whether a record falls inside this filter.
    ///
    /// A record's month is matched by its first day against the inclusive
    /// period bounds. Exclusions apply to either endpoint; inclusions are
    /// satisfied by either endpoint.
    pub fn matches(&self, record: &FlowRecord, catalog: &EntityCatalog) -> bool {
        let day = record.month().first_day();
        if day < self.period_start || day > self.period_end {
            return false;
        }
        if record.count() < self.min_flow || !self.max_flow.admits(record.count()) {
            return false;
        }

        let endpoints = [record.origin(), record.destination()];
        let excluded = endpoints.iter().any(|code| {
            self.exclude_countries.contains(*code)
                || catalog
                    .region_of(code)
                    .map_or(false, |r| self.exclude_regions.contains(r))
        });
        if excluded {
            return false;
        }

        if self.include_countries.is_some() || self.include_regions.is_some() {
            let included = endpoints.iter().any(|code| {
                self.include_countries
                    .as_ref()
                    .map_or(false, |set| set.contains(*code))
                    || catalog.region_of(code).map_or(false, |r| {
                        self.include_regions
                            .as_ref()
                            .map_or(false, |set| set.contains(r))
                    })
            });
            if !included {
                return false;
            }
        }

        self.corridor.admits(record, catalog)
    }
}

impl From<&FilterDescriptor> for RawFilterInput {
    /// Express a descriptor as filter input again, so that normalizing the
    /// result reproduces the descriptor.
    ///
    /// An include set emptied by exclusions is written back as the
    /// exclusions of that dimension, which normalization empties again.
    fn from(d: &FilterDescriptor) -> Self {
        fn strings<T: ToString>(set: &BTreeSet<T>) -> Vec<String> {
            set.iter().map(|v| v.to_string()).collect()
        }
        let include_countries = d.include_countries.as_ref().map(|set| {
            if set.is_empty() {
                strings(&d.exclude_countries)
            } else {
                strings(set)
            }
        });
        let include_regions = d.include_regions.as_ref().map(|set| {
            if set.is_empty() {
                strings(&d.exclude_regions)
            } else {
                strings(set)
            }
        });
        RawFilterInput {
            period_start: Some(d.period_start.format("%Y-%m-%d").to_string()),
            period_end: Some(d.period_end.format("%Y-%m-%d").to_string()),
            include_regions,
            include_countries,
            exclude_countries: Some(strings(&d.exclude_countries)),
            exclude_regions: Some(strings(&d.exclude_regions)),
            min_flow: Some(d.min_flow.to_string()),
            max_flow: Some(d.max_flow.to_string()),
            granularity: Some(d.granularity.as_str().to_string()),
            corridor: d.corridor.clone(),
        }
    }
}

/// A descriptor together with the adjustments made while building it.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub descriptor: FilterDescriptor,
    pub issues: Vec<FilterIssue>,
}

impl Normalized {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Normalize filter input against the default dataset bounds.
///
/// Adjustments are logged at warn level; use [`normalize_with`] to receive
/// them.
///
/// # Examples
///
/// ```
/// use flow_atlas::core::filter::{normalize, RawFilterInput};
///
/// let raw = RawFilterInput {
///     period_end: Some("2022-02".into()),
///     ..Default::default()
/// };
/// let descriptor = normalize(&raw);
/// assert_eq!(descriptor.period_end().to_string(), "2022-02-28");
/// ```
pub fn normalize(raw: &RawFilterInput) -> FilterDescriptor {
    normalize_with(raw, &ExplorerConfig::default()).descriptor
}

/// Normalize filter input, using `config` for dataset bounds.
pub fn normalize_with(raw: &RawFilterInput, config: &ExplorerConfig) -> Normalized {
    let mut issues = Vec::new();

    let mut period_start = parse_date_bound(
        "period start",
        raw.period_start.as_deref(),
        Edge::Start,
        config.dataset_start.first_day(),
        &mut issues,
    );
    let mut period_end = parse_date_bound(
        "period end",
        raw.period_end.as_deref(),
        Edge::End,
        config.dataset_end.last_day(),
        &mut issues,
    );
    if period_start > period_end {
        issues.push(FilterIssue::InvertedPeriod {
            start: period_start,
            end: period_end,
        });
        std::mem::swap(&mut period_start, &mut period_end);
    }

    let mut min_flow = parse_min_flow(raw.min_flow.as_deref(), &mut issues);
    let mut max_flow = parse_max_flow(raw.max_flow.as_deref(), &mut issues);
    if let FlowBound::Finite(max) = max_flow {
        if min_flow > max {
            issues.push(FilterIssue::InvertedFlowBounds { min: min_flow, max });
            max_flow = FlowBound::Finite(min_flow);
            min_flow = max;
        }
    }

    let granularity = match raw.granularity.as_deref().map(str::trim) {
        None | Some("") => Granularity::Monthly,
        Some(value) => value.parse().unwrap_or_else(|_| {
            issues.push(FilterIssue::UnknownGranularity(value.to_string()));
            Granularity::Monthly
        }),
    };

    let exclude_countries: BTreeSet<EntityCode> = country_set(raw.exclude_countries.as_deref())
        .unwrap_or_default();
    let exclude_regions: BTreeSet<RegionName> =
        region_set(raw.exclude_regions.as_deref()).unwrap_or_default();
    let include_countries = country_set(raw.include_countries.as_deref())
        .map(|set| subtract("countries", set, &exclude_countries, &mut issues));
    let include_regions = region_set(raw.include_regions.as_deref())
        .map(|set| subtract("regions", set, &exclude_regions, &mut issues));

    for issue in &issues {
        log::warn!("filter input adjusted: {}", issue);
    }

    Normalized {
        descriptor: FilterDescriptor {
            period_start,
            period_end,
            include_regions,
            include_countries,
            exclude_countries,
            exclude_regions,
            min_flow,
            max_flow,
            granularity,
            corridor: raw.corridor.clone(),
        },
        issues,
    }
}

#[derive(Clone, Copy)]
enum Edge {
    Start,
    End,
}

/// Full dates are taken as given. A bare month resolves to its first day
/// for a start bound and to its last day for an end bound.
fn parse_date(value: &str, edge: Edge) -> Result<NaiveDate, PeriodParseError> {
    let value = value.trim();
    if value.matches('-').count() == 2 {
        return NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map_err(|_| PeriodParseError::InvalidDate(value.to_string()));
    }
    let month: CalendarMonth = value.parse()?;
    Ok(match edge {
        Edge::Start => month.first_day(),
        Edge::End => month.last_day(),
    })
}

fn parse_date_bound(
    field: &'static str,
    value: Option<&str>,
    edge: Edge,
    default: NaiveDate,
    issues: &mut Vec<FilterIssue>,
) -> NaiveDate {
    match value.map(str::trim) {
        None | Some("") => default,
        Some(v) => parse_date(v, edge).unwrap_or_else(|reason| {
            issues.push(FilterIssue::MalformedDate {
                field,
                value: v.to_string(),
                reason,
            });
            default
        }),
    }
}

fn parse_min_flow(value: Option<&str>, issues: &mut Vec<FilterIssue>) -> u64 {
    match value.map(str::trim) {
        None | Some("") => 0,
        Some(v) => v.parse::<u64>().unwrap_or_else(|_| {
            issues.push(FilterIssue::InvalidFlowBound {
                field: "min flow",
                value: v.to_string(),
            });
            0
        }),
    }
}

fn parse_max_flow(value: Option<&str>, issues: &mut Vec<FilterIssue>) -> FlowBound {
    match value.map(str::trim) {
        None | Some("") => FlowBound::Unbounded,
        Some(v) if NO_LIMIT.contains(&v.to_ascii_lowercase().as_str()) => FlowBound::Unbounded,
        Some(v) => match v.parse::<u64>() {
            Ok(max) => FlowBound::Finite(max),
            Err(_) => {
                issues.push(FilterIssue::InvalidFlowBound {
                    field: "max flow",
                    value: v.to_string(),
                });
                FlowBound::Unbounded
            }
        },
    }
}

/// Absent and empty lists both mean "not specified".
fn country_set(values: Option<&[String]>) -> Option<BTreeSet<EntityCode>> {
    let set: BTreeSet<EntityCode> = values?
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(|v| EntityCode::new(v.to_ascii_uppercase()))
        .collect();
    (!set.is_empty()).then_some(set)
}

fn region_set(values: Option<&[String]>) -> Option<BTreeSet<RegionName>> {
    let set: BTreeSet<RegionName> = values?
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(RegionName::new)
        .collect();
    (!set.is_empty()).then_some(set)
}

fn subtract<T: Ord + Clone + ToString>(
    dimension: &'static str,
    include: BTreeSet<T>,
    exclude: &BTreeSet<T>,
    issues: &mut Vec<FilterIssue>,
) -> BTreeSet<T> {
    let overlap: Vec<String> = include
        .intersection(exclude)
        .map(|v| v.to_string())
        .collect();
    if overlap.is_empty() {
        return include;
    }
    issues.push(FilterIssue::IncludeExcludeOverlap {
        dimension,
        entries: overlap,
    });
    include.difference(exclude).cloned().collect()
}
