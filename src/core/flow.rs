use crate::core::catalog::EntityCatalog;
use crate::core::entity::EntityCode;
use crate::core::period::CalendarMonth;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A monthly count of people moving from one entity to another.
///
/// This is the atomic fact of the dataset. Records are immutable once
/// created; every statistic in the crate is derived from collections of
/// them.
///
/// # Examples
///
/// ```
/// use flow_atlas::core::flow::FlowRecord;
/// use flow_atlas::core::entity::EntityCode;
///
/// let record = FlowRecord::new(
///     EntityCode::new("VE"),
///     EntityCode::new("CO"),
///     "2021-06".parse().unwrap(),
///     12_400,
/// );
///
/// assert_eq!(record.count(), 12_400);
/// assert!(record.is_valid());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowRecord {
    origin: EntityCode,
    destination: EntityCode,
    #[serde(alias = "migration_month")]
    month: CalendarMonth,
    #[serde(alias = "num_migrants")]
    count: u64,
}

impl FlowRecord {
    pub fn new(
        origin: EntityCode,
        destination: EntityCode,
        month: CalendarMonth,
        count: u64,
    ) -> Self {
        Self {
            origin,
            destination,
            month,
            count,
        }
    }

    pub fn origin(&self) -> &EntityCode {
        &self.origin
    }

    pub fn destination(&self) -> &EntityCode {
        &self.destination
    }

    pub fn month(&self) -> CalendarMonth {
        self.month
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// The corridor this record belongs to.
    pub fn corridor(&self) -> CorridorKey {
        CorridorKey::new(self.origin.clone(), self.destination.clone())
    }

    /// Origin and destination must differ.
    pub fn is_valid(&self) -> bool {
        self.origin != self.destination
    }
}

/// An ordered (origin, destination) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CorridorKey {
    pub origin: EntityCode,
    pub destination: EntityCode,
}

impl CorridorKey {
    pub fn new(origin: EntityCode, destination: EntityCode) -> Self {
        Self {
            origin,
            destination,
        }
    }

    /// The same pair travelled the other way.
    pub fn reversed(&self) -> Self {
        Self::new(self.destination.clone(), self.origin.clone())
    }
}

impl std::fmt::Display for CorridorKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} → {}", self.origin, self.destination)
    }
}

/// A collection of flow records.
///
/// Deserialized sets go through [`FlowRecordSet::add`], so self-loops
/// never survive loading.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "RecordList")]
pub struct FlowRecordSet {
    records: Vec<FlowRecord>,
}

#[derive(Deserialize)]
struct RecordList {
    records: Vec<FlowRecord>,
}

impl From<RecordList> for FlowRecordSet {
    fn from(list: RecordList) -> Self {
        list.records.into_iter().collect()
    }
}

impl FlowRecordSet {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Add a record. Self-loops are rejected and logged; returns whether
    /// the record was kept.
    pub fn add(&mut self, record: FlowRecord) -> bool {
        if !record.is_valid() {
            log::warn!(
                "dropping self-loop flow record {} in {}",
                record.origin(),
                record.month()
            );
            return false;
        }
        self.records.push(record);
        true
    }

    pub fn records(&self) -> &[FlowRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sum of all counts, saturating at `u64::MAX`.
    pub fn total(&self) -> u64 {
        self.records
            .iter()
            .fold(0u64, |acc, r| acc.saturating_add(r.count()))
    }

    /// All entity codes referenced, sorted.
    pub fn entities(&self) -> Vec<EntityCode> {
        let codes: BTreeSet<EntityCode> = self
            .records
            .iter()
            .flat_map(|r| [r.origin().clone(), r.destination().clone()])
            .collect();
        codes.into_iter().collect()
    }

    /// First and last month present, if any.
    pub fn month_range(&self) -> Option<(CalendarMonth, CalendarMonth)> {
        let first = self.records.iter().map(|r| r.month()).min()?;
        let last = self.records.iter().map(|r| r.month()).max()?;
        Some((first, last))
    }

    /// Roll country-to-country records up to region-to-region records.
    ///
    /// Region names become the entity codes of the result. Records whose
    /// origin or destination has no region in the catalog are dropped, as
    /// are intra-region movements, which would be self-loops.
    pub fn rollup_to_regions(&self, catalog: &EntityCatalog) -> FlowRecordSet {
        let mut totals: BTreeMap<(EntityCode, EntityCode, CalendarMonth), u64> = BTreeMap::new();
        for record in &self.records {
            let (Some(from), Some(to)) = (
                catalog.region_of(record.origin()),
                catalog.region_of(record.destination()),
            ) else {
                continue;
            };
            if from == to {
                continue;
            }
            let total = totals
                .entry((
                    EntityCode::new(from.as_str()),
                    EntityCode::new(to.as_str()),
                    record.month(),
                ))
                .or_insert(0);
            *total = total.saturating_add(record.count());
        }

        totals
            .into_iter()
            .map(|((origin, destination, month), count)| {
                FlowRecord::new(origin, destination, month, count)
            })
            .collect()
    }
}

impl FromIterator<FlowRecord> for FlowRecordSet {
    fn from_iter<T: IntoIterator<Item = FlowRecord>>(iter: T) -> Self {
        let mut set = Self::new();
        for record in iter {
            set.add(record);
        }
        set
    }
}
