//! Static item catalog, loaded once per run and read-only afterwards

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug)]
pub enum CatalogError {
    Io(std::io::Error),
    Malformed(String),
}

impl From<std::io::Error> for CatalogError {
    fn from(err: std::io::Error) -> Self {
        CatalogError::Io(err)
    }
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogError::Io(e) => write!(f, "Catalog IO error: {}", e),
            CatalogError::Malformed(e) => write!(f, "Malformed catalog: {}", e),
        }
    }
}

impl std::error::Error for CatalogError {}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    #[serde(default)]
    pub category: String,
}

/// Mapping from item identifier to display name and category.
pub struct ItemCatalog {
    entries: BTreeMap<String, CatalogEntry>,
}

impl ItemCatalog {
    /// Load the catalog file. A missing or unparseable catalog is a
    /// run-level failure, the caller aborts before emitting any output.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = fs::read_to_string(path)?;
        let entries: BTreeMap<String, CatalogEntry> =
            serde_json::from_str(&content).map_err(|e| CatalogError::Malformed(e.to_string()))?;

        log::info!("📋 Loaded {} item catalog entries", entries.len());
        Ok(Self { entries })
    }

    #[cfg(test)]
    pub fn from_entries(entries: BTreeMap<String, CatalogEntry>) -> Self {
        Self { entries }
    }

    pub fn display_name(&self, item_id: &str) -> String {
        match self.entries.get(item_id) {
            Some(entry) => entry.name.clone(),
            None => format!("Item #{}", item_id),
        }
    }

    pub fn category(&self, item_id: &str) -> String {
        self.entries
            .get(item_id)
            .map(|e| e.category.clone())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| "unknown".to_string())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
