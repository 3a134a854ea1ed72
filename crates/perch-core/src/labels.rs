//! Species label table
//!
//! A static JSON file maps class indices to species names:
//! `{"0": "House Sparrow", "1": "Northern Cardinal", ...}`. The table is
//! loaded once at startup and never mutated; an index the table does not
//! know answers "Unknown".

use std::collections::HashMap;
use std::path::Path;

use crate::error::{PerchError, Result};

/// Label returned for class indices absent from the table
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Immutable class index → species name mapping
#[derive(Debug, Clone)]
pub struct LabelTable {
    labels: HashMap<usize, String>,
}

impl LabelTable {
    /// Load the table from a JSON file.
    ///
    /// Keys must be string-encoded integers (the format produced when the
    /// table is exported alongside the model).
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PerchError::LabelTable(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&contents)
    }

    /// Parse the table from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: HashMap<String, String> = serde_json::from_str(json)
            .map_err(|e| PerchError::LabelTable(e.to_string()))?;

        let mut labels = HashMap::with_capacity(raw.len());
        for (key, value) in raw {
            let index: usize = key.parse().map_err(|_| {
                PerchError::LabelTable(format!("Non-integer class index: {:?}", key))
            })?;
            // "1" and "01" parse to the same index; last-wins would hide
            // a broken export, so refuse the table outright.
            if labels.insert(index, value).is_some() {
                return Err(PerchError::LabelTable(format!(
                    "Duplicate class index: {}",
                    index
                )));
            }
        }

        Ok(Self { labels })
    }

    /// Species name for a class index, or [`UNKNOWN_LABEL`]
    pub fn get(&self, index: usize) -> &str {
        self.labels
            .get(&index)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_LABEL)
    }

    /// Number of known classes
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
