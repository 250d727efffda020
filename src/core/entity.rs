use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable code identifying a country or region in the flow dataset.
///
/// Country codes follow ISO 3166-1 alpha-2 ("US", "MX"). Region roll-ups
/// reuse the region name as their code.
///
/// # Examples
///
/// ```
/// use flow_atlas::core::entity::EntityCode;
///
/// let mexico = EntityCode::new("MX");
/// let usa = EntityCode::new("US");
/// assert_ne!(mexico, usa);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityCode(String);

impl EntityCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EntityCode {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Name of a geographic region (UN M49 top-level region, e.g. "Europe").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionName(String);

impl RegionName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RegionName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Display name of an entity. Flow graphs are keyed by display name,
/// not by code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityName(String);

impl EntityName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the name is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for EntityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EntityName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for EntityName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One row of the entity catalog served by the data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub code: EntityCode,
    pub display_name: EntityName,
    #[serde(default)]
    pub region: Option<RegionName>,
    /// The entity appears as an origin somewhere in the dataset.
    #[serde(default)]
    pub has_outbound: bool,
    /// The entity appears as a destination somewhere in the dataset.
    #[serde(default)]
    pub has_inbound: bool,
}

impl CatalogEntry {
    pub fn new(
        code: impl Into<String>,
        display_name: impl Into<String>,
        region: Option<&str>,
    ) -> Self {
        Self {
            code: EntityCode::new(code),
            display_name: EntityName::new(display_name),
            region: region.map(RegionName::new),
            has_outbound: true,
            has_inbound: true,
        }
    }

    /// Override the data-availability flags.
    pub fn with_data(mut self, has_outbound: bool, has_inbound: bool) -> Self {
        self.has_outbound = has_outbound;
        self.has_inbound = has_inbound;
        self
    }
}
