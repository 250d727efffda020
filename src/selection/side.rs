use crate::core::catalog::EntityCatalog;
use crate::core::entity::{CatalogEntry, EntityCode, RegionName};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// One end of a corridor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Origin,
    Destination,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Origin => Side::Destination,
            Side::Destination => Side::Origin,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Origin => f.write_str("origin"),
            Side::Destination => f.write_str("destination"),
        }
    }
}

/// Why a selection change was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionRejected {
    #[error("unknown entity: {0}")]
    UnknownEntity(EntityCode),

    #[error("unknown region: {0}")]
    UnknownRegion(RegionName),

    #[error("{code} has no {side} data")]
    NoData { code: EntityCode, side: Side },

    #[error("{code} is already selected as {side}")]
    SelectedOnOtherSide { code: EntityCode, side: Side },
}

/// Selection for one side: the whole world, or a non-empty set of countries
/// and regions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideSelection {
    #[default]
    World,
    Explicit {
        countries: BTreeSet<EntityCode>,
        regions: BTreeSet<RegionName>,
    },
}

impl SideSelection {
    /// An explicit selection, or `World` when both sets are empty.
    pub fn explicit(
        countries: impl IntoIterator<Item = EntityCode>,
        regions: impl IntoIterator<Item = RegionName>,
    ) -> Self {
        let countries: BTreeSet<EntityCode> = countries.into_iter().collect();
        let regions: BTreeSet<RegionName> = regions.into_iter().collect();
        if countries.is_empty() && regions.is_empty() {
            SideSelection::World
        } else {
            SideSelection::Explicit { countries, regions }
        }
    }

    pub fn is_world(&self) -> bool {
        matches!(self, SideSelection::World)
    }

    pub fn contains_country(&self, code: &EntityCode) -> bool {
        match self {
            SideSelection::World => false,
            SideSelection::Explicit { countries, .. } => countries.contains(code),
        }
    }

    pub fn contains_region(&self, region: &RegionName) -> bool {
        match self {
            SideSelection::World => false,
            SideSelection::Explicit { regions, .. } => regions.contains(region),
        }
    }

    /// Explicitly selected countries; empty for `World`.
    pub fn countries(&self) -> impl Iterator<Item = &EntityCode> {
        let set = match self {
            SideSelection::World => None,
            SideSelection::Explicit { countries, .. } => Some(countries),
        };
        set.into_iter().flatten()
    }

    /// Explicitly selected regions; empty for `World`.
    pub fn regions(&self) -> impl Iterator<Item = &RegionName> {
        let set = match self {
            SideSelection::World => None,
            SideSelection::Explicit { regions, .. } => Some(regions),
        };
        set.into_iter().flatten()
    }

    fn insert_country(&mut self, code: EntityCode) {
        match self {
            SideSelection::World => {
                *self = SideSelection::Explicit {
                    countries: BTreeSet::from([code]),
                    regions: BTreeSet::new(),
                }
            }
            SideSelection::Explicit { countries, .. } => {
                countries.insert(code);
            }
        }
    }

    fn insert_region(&mut self, region: RegionName) {
        match self {
            SideSelection::World => {
                *self = SideSelection::Explicit {
                    countries: BTreeSet::new(),
                    regions: BTreeSet::from([region]),
                }
            }
            SideSelection::Explicit { regions, .. } => {
                regions.insert(region);
            }
        }
    }

    fn collapse_if_empty(&mut self) {
        if let SideSelection::Explicit { countries, regions } = self {
            if countries.is_empty() && regions.is_empty() {
                *self = SideSelection::World;
            }
        }
    }
}

/// Origin and destination selections of one corridor query.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CorridorSelection {
    pub origin: SideSelection,
    pub destination: SideSelection,
}

impl CorridorSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn side(&self, side: Side) -> &SideSelection {
        match side {
            Side::Origin => &self.origin,
            Side::Destination => &self.destination,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut SideSelection {
        match side {
            Side::Origin => &mut self.origin,
            Side::Destination => &mut self.destination,
        }
    }

    /// Catalog entries that may be added on `side`: they have data in that
    /// direction and are not explicitly selected on the other side.
    pub fn offers<'a>(&self, side: Side, catalog: &'a EntityCatalog) -> Vec<&'a CatalogEntry> {
        let other = self.side(side.opposite());
        catalog
            .entries()
            .filter(|entry| has_data(entry, side) && !other.contains_country(&entry.code))
            .collect()
    }

    /// Add a country to `side`.
    pub fn select_country(
        &mut self,
        side: Side,
        code: &EntityCode,
        catalog: &EntityCatalog,
    ) -> Result<(), SelectionRejected> {
        let entry = catalog
            .get(code)
            .ok_or_else(|| SelectionRejected::UnknownEntity(code.clone()))?;
        if !has_data(entry, side) {
            return Err(SelectionRejected::NoData {
                code: code.clone(),
                side,
            });
        }
        if self.side(side.opposite()).contains_country(code) {
            return Err(SelectionRejected::SelectedOnOtherSide {
                code: code.clone(),
                side: side.opposite(),
            });
        }
        self.side_mut(side).insert_country(code.clone());
        Ok(())
    }

    /// Add a region to `side`.
    pub fn select_region(
        &mut self,
        side: Side,
        region: &RegionName,
        catalog: &EntityCatalog,
    ) -> Result<(), SelectionRejected> {
        if !catalog.has_region(region) {
            return Err(SelectionRejected::UnknownRegion(region.clone()));
        }
        self.side_mut(side).insert_region(region.clone());
        Ok(())
    }

    /// Remove a country; the side reverts to `World` once nothing is left.
    pub fn deselect_country(&mut self, side: Side, code: &EntityCode) {
        let selection = self.side_mut(side);
        if let SideSelection::Explicit { countries, .. } = selection {
            countries.remove(code);
        }
        selection.collapse_if_empty();
    }

    pub fn deselect_region(&mut self, side: Side, region: &RegionName) {
        let selection = self.side_mut(side);
        if let SideSelection::Explicit { regions, .. } = selection {
            regions.remove(region);
        }
        selection.collapse_if_empty();
    }

    /// Select "World" on `side`, clearing its explicit selections.
    pub fn select_world(&mut self, side: Side) {
        *self.side_mut(side) = SideSelection::World;
    }
}

fn has_data(entry: &CatalogEntry, side: Side) -> bool {
    match side {
        Side::Origin => entry.has_outbound,
        Side::Destination => entry.has_inbound,
    }
}
