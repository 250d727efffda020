use crate::core::catalog::EntityCatalog;
use crate::core::entity::{EntityCode, RegionName};
use crate::core::filter::{CorridorConstraints, SideConstraint};
use crate::selection::side::{CorridorSelection, Side, SideSelection};
use std::collections::BTreeSet;

/// Turn origin and destination selections into query constraints.
///
/// `World` becomes an unrestricted side. Explicit selections keep only
/// codes and regions the catalog knows. A country explicitly selected on
/// both sides is dropped from both; the selection model never produces
/// one, but a hand-built selection can.
///
/// A side whose members are all dropped admits nothing rather than
/// falling back to `World`.
pub fn resolve_selection(
    origin: &SideSelection,
    destination: &SideSelection,
    catalog: &EntityCatalog,
) -> CorridorConstraints {
    let shared: BTreeSet<&EntityCode> = origin
        .countries()
        .filter(|code| destination.contains_country(code))
        .collect();
    for code in &shared {
        log::warn!(
            "{} selected as both origin and destination, dropping it from both",
            code
        );
    }

    CorridorConstraints {
        origin: resolve_side(Side::Origin, origin, &shared, catalog),
        destination: resolve_side(Side::Destination, destination, &shared, catalog),
    }
}

fn resolve_side(
    side: Side,
    selection: &SideSelection,
    shared: &BTreeSet<&EntityCode>,
    catalog: &EntityCatalog,
) -> SideConstraint {
    if selection.is_world() {
        return SideConstraint::Unrestricted;
    }

    let mut countries = BTreeSet::new();
    for code in selection.countries() {
        if shared.contains(code) {
            continue;
        }
        if catalog.contains(code) {
            countries.insert(code.clone());
        } else {
            log::warn!("ignoring unknown {} entity {}", side, code);
        }
    }

    let mut regions: BTreeSet<RegionName> = BTreeSet::new();
    for region in selection.regions() {
        if catalog.has_region(region) {
            regions.insert(region.clone());
        } else {
            log::warn!("ignoring unknown {} region {}", side, region);
        }
    }

    SideConstraint::Members { countries, regions }
}

impl CorridorSelection {
    /// Constraints for this selection against `catalog`.
    pub fn resolve(&self, catalog: &EntityCatalog) -> CorridorConstraints {
        resolve_selection(&self.origin, &self.destination, catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entity::CatalogEntry;
    use crate::core::filter::{normalize, RawFilterInput};
    use crate::core::flow::FlowRecord;

    fn catalog() -> EntityCatalog {
        EntityCatalog::from_entries(vec![
            CatalogEntry::new("VE", "Venezuela", Some("South America")),
            CatalogEntry::new("CO", "Colombia", Some("South America")),
            CatalogEntry::new("US", "United States", Some("North America")),
            CatalogEntry::new("ES", "Spain", Some("Europe")),
        ])
    }

    fn codes(list: &[&str]) -> BTreeSet<EntityCode> {
        list.iter().map(|c| EntityCode::new(*c)).collect()
    }

    #[test]
    fn test_world_is_unrestricted() {
        let constraints = resolve_selection(&SideSelection::World, &SideSelection::World, &catalog());
        assert_eq!(constraints, CorridorConstraints::unrestricted());
    }

    #[test]
    fn test_explicit_sides() {
        let origin = SideSelection::explicit(
            vec![EntityCode::new("VE")],
            vec![RegionName::new("Europe")],
        );
        let constraints = resolve_selection(&origin, &SideSelection::World, &catalog());
        assert_eq!(
            constraints.origin,
            SideConstraint::Members {
                countries: codes(&["VE"]),
                regions: BTreeSet::from([RegionName::new("Europe")]),
            }
        );
        assert!(constraints.destination.is_unrestricted());
    }

    #[test]
    fn test_unknown_members_are_dropped() {
        let origin = SideSelection::explicit(
            vec![EntityCode::new("XX")],
            vec![RegionName::new("Atlantis")],
        );
        let constraints = resolve_selection(&origin, &SideSelection::World, &catalog());
        // Specified but resolving to nothing: admits no origin at all.
        assert_eq!(
            constraints.origin,
            SideConstraint::Members {
                countries: BTreeSet::new(),
                regions: BTreeSet::new(),
            }
        );
        assert!(!constraints
            .origin
            .admits(&EntityCode::new("VE"), None));
    }

    #[test]
    fn test_overlap_is_stripped_from_both_sides() {
        let origin = SideSelection::explicit(codes(&["VE", "CO"]), vec![]);
        let destination = SideSelection::explicit(codes(&["CO", "US"]), vec![]);
        let constraints = resolve_selection(&origin, &destination, &catalog());

        let SideConstraint::Members { countries, .. } = &constraints.origin else {
            panic!("origin should be explicit");
        };
        assert_eq!(countries, &codes(&["VE"]));
        let SideConstraint::Members { countries, .. } = &constraints.destination else {
            panic!("destination should be explicit");
        };
        assert_eq!(countries, &codes(&["US"]));
    }

    #[test]
    fn test_resolved_constraints_filter_records() {
        let catalog = catalog();
        let mut selection = CorridorSelection::new();
        selection
            .select_region(Side::Origin, &RegionName::new("South America"), &catalog)
            .unwrap();
        selection
            .select_country(Side::Destination, &EntityCode::new("US"), &catalog)
            .unwrap();

        let descriptor =
            normalize(&RawFilterInput::default()).with_corridor(selection.resolve(&catalog));
        let month = "2021-01".parse().unwrap();
        let record = |from: &str, to: &str| {
            FlowRecord::new(EntityCode::new(from), EntityCode::new(to), month, 10)
        };

        assert!(descriptor.matches(&record("VE", "US"), &catalog));
        assert!(!descriptor.matches(&record("ES", "US"), &catalog));
        assert!(!descriptor.matches(&record("US", "VE"), &catalog));
    }
}
