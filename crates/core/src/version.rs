use std::fmt;

use crate::catalog::Catalog;
use crate::error::{Error, Result};

/// Name of the `meta` row holding the catalog format version.
pub const VERSION_KEY: &str = "F-Spot Database Version";

/// First catalog format version that stores percent-escaped URIs.
pub const ENCODED_THRESHOLD: u32 = 18;

/// Structural version of a catalog, e.g. `17` or `16.5` (major part kept).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SchemaVersion(pub u32);

impl SchemaVersion {
    /// Parse a stored version string. Minor components (`16.5`) must be
    /// numeric too but only the major number decides the era.
    pub fn parse(value: &str) -> Result<Self> {
        let malformed = || Error::MetadataMalformed {
            value: value.to_string(),
        };
        let mut parts = value.trim().split('.');
        let major = parts
            .next()
            .and_then(|p| p.parse::<u32>().ok())
            .ok_or_else(malformed)?;
        if parts.any(|p| p.parse::<u32>().is_err()) {
            return Err(malformed());
        }
        Ok(Self(major))
    }

    pub fn era(self) -> SchemaEra {
        SchemaEra::from_version(self)
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Path-encoding convention in force for a catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaEra {
    /// URIs are stored as raw text.
    Legacy,
    /// URIs are stored percent-escaped.
    Encoded,
}

impl SchemaEra {
    pub fn from_version(version: SchemaVersion) -> Self {
        if is_encoded_era(version) {
            SchemaEra::Encoded
        } else {
            SchemaEra::Legacy
        }
    }

    pub fn is_encoded(self) -> bool {
        self == SchemaEra::Encoded
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SchemaEra::Legacy => "legacy",
            SchemaEra::Encoded => "encoded",
        }
    }
}

impl fmt::Display for SchemaEra {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn is_encoded_era(version: SchemaVersion) -> bool {
    version.0 >= ENCODED_THRESHOLD
}

/// Read the catalog format version from the `meta` table.
pub fn detect(catalog: &Catalog) -> Result<SchemaVersion> {
    let value = catalog
        .meta_value(VERSION_KEY)?
        .ok_or_else(|| Error::MetadataMissing(VERSION_KEY.to_string()))?;
    SchemaVersion::parse(&value)
}
