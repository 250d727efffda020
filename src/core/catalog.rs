use crate::core::entity::{CatalogEntry, EntityCode, EntityName, RegionName};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Lookup cache over the entity catalog.
///
/// Built once from the rows returned by the data source and then shared by
/// reference (usually behind an `Arc`) with everything that needs to turn a
/// code into a display name or region. There is no process-wide instance;
/// whoever loads the catalog owns its lifetime.
///
/// # Examples
///
/// ```
/// use flow_atlas::core::catalog::EntityCatalog;
/// use flow_atlas::core::entity::{CatalogEntry, EntityCode};
///
/// let catalog = EntityCatalog::from_entries(vec![
///     CatalogEntry::new("MX", "Mexico", Some("Americas")),
///     CatalogEntry::new("DE", "Germany", Some("Europe")),
/// ]);
///
/// assert_eq!(catalog.display_name(&EntityCode::new("MX")).as_str(), "Mexico");
/// assert_eq!(catalog.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct EntityCatalog {
    entries: BTreeMap<EntityCode, CatalogEntry>,
    by_name: HashMap<EntityName, EntityCode>,
    regions: BTreeMap<RegionName, BTreeSet<EntityCode>>,
}

impl EntityCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the cache. Later rows win when a code repeats.
    pub fn from_entries(entries: impl IntoIterator<Item = CatalogEntry>) -> Self {
        let mut catalog = Self::new();
        for entry in entries {
            catalog.insert(entry);
        }
        catalog
    }

    fn insert(&mut self, entry: CatalogEntry) {
        if let Some(previous) = self.entries.remove(&entry.code) {
            if self.by_name.get(&previous.display_name) == Some(&previous.code) {
                self.by_name.remove(&previous.display_name);
                // Hand the name to another entry that still carries it.
                if let Some(other) = self
                    .entries
                    .values()
                    .find(|e| e.display_name == previous.display_name)
                {
                    self.by_name
                        .insert(other.display_name.clone(), other.code.clone());
                }
            }
            if let Some(region) = &previous.region {
                if let Some(members) = self.regions.get_mut(region) {
                    members.remove(&previous.code);
                    if members.is_empty() {
                        self.regions.remove(region);
                    }
                }
            }
        }
        self.by_name
            .insert(entry.display_name.clone(), entry.code.clone());
        if let Some(region) = &entry.region {
            self.regions
                .entry(region.clone())
                .or_default()
                .insert(entry.code.clone());
        }
        self.entries.insert(entry.code.clone(), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, code: &EntityCode) -> Option<&CatalogEntry> {
        self.entries.get(code)
    }

    pub fn contains(&self, code: &EntityCode) -> bool {
        self.entries.contains_key(code)
    }

    /// Entries in code order.
    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }

    /// Display name for a code, falling back to the code itself for
    /// entities the catalog does not know.
    pub fn display_name(&self, code: &EntityCode) -> EntityName {
        self.entries
            .get(code)
            .map(|e| e.display_name.clone())
            .unwrap_or_else(|| EntityName::new(code.as_str()))
    }

    pub fn code_for_name(&self, name: &EntityName) -> Option<&EntityCode> {
        self.by_name.get(name)
    }

    pub fn region_of(&self, code: &EntityCode) -> Option<&RegionName> {
        self.entries.get(code).and_then(|e| e.region.as_ref())
    }

    pub fn has_region(&self, region: &RegionName) -> bool {
        self.regions.contains_key(region)
    }

    /// All known regions, sorted.
    pub fn regions(&self) -> impl Iterator<Item = &RegionName> {
        self.regions.keys()
    }

    /// Country codes belonging to a region, sorted.
    pub fn members_of(&self, region: &RegionName) -> Vec<&EntityCode> {
        self.regions
            .get(region)
            .map(|members| members.iter().collect())
            .unwrap_or_default()
    }
}
