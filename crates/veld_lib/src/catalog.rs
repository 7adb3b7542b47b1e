//! The per-library catalog file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::LibError;

/// Name of the catalog file inside a library directory.
pub const CATALOG_FILE: &str = "catalog.json";

/// Metadata recorded for each unit in a library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitMeta {
    /// Generation of the unit's serialized arena.
    pub generation: u32,
}

/// The catalog of a design library: one entry per persisted unit.
///
/// Loading is fail-safe: a missing or unreadable catalog yields an empty
/// one, so a fresh library directory needs no initialization step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    /// Tool version that last wrote this catalog.
    pub tool_version: String,
    /// Units by name.
    pub units: BTreeMap<String, UnitMeta>,
}

impl Catalog {
    /// Creates an empty catalog for the given tool version.
    pub fn new(tool_version: &str) -> Self {
        Self {
            tool_version: tool_version.to_string(),
            units: BTreeMap::new(),
        }
    }

    /// Loads the catalog from a library directory, or `None` if absent or
    /// unreadable.
    pub fn load(dir: &Path) -> Option<Self> {
        let bytes = std::fs::read(dir.join(CATALOG_FILE)).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Persists the catalog into a library directory.
    pub fn save(&self, dir: &Path) -> Result<(), LibError> {
        std::fs::create_dir_all(dir).map_err(|e| LibError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let path = dir.join(CATALOG_FILE);
        let json = serde_json::to_vec_pretty(self).expect("catalog serializes");
        std::fs::write(&path, json).map_err(|e| LibError::Io { path, source: e })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_catalog_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Catalog::load(dir.path()).is_none());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = Catalog::new("0.1.0");
        catalog
            .units
            .insert("top".to_string(), UnitMeta { generation: 3 });
        catalog.save(dir.path()).unwrap();

        let loaded = Catalog::load(dir.path()).unwrap();
        assert_eq!(loaded.tool_version, "0.1.0");
        assert_eq!(loaded.units["top"].generation, 3);
    }

    #[test]
    fn corrupt_catalog_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CATALOG_FILE), b"{not json").unwrap();
        assert!(Catalog::load(dir.path()).is_none());
    }

    #[test]
    fn save_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let lib_dir = dir.path().join("work");
        Catalog::new("0.1.0").save(&lib_dir).unwrap();
        assert!(lib_dir.join(CATALOG_FILE).exists());
    }
}
