//! Model catalog: public checkpoint identifiers mapped to weight files.
//!
//! The catalog is data, not code. Deployments can point at a JSON file
//! (an array of `{id, checkpoint}` entries); without one, the built-in
//! table is used. An identifier absent from the catalog is an explicit
//! validation error — never a silent pass-through.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// One catalog row: a public identifier and the checkpoint file it
/// selects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Identifier callers use in `checkpoint_model`.
    pub id: String,
    /// Checkpoint filename written into the loader node.
    pub checkpoint: String,
}

/// Closed set of selectable checkpoint models.
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    entries: Vec<CatalogEntry>,
}

impl ModelCatalog {
    /// Build a catalog from entries. Must be non-empty with unique ids.
    pub fn from_entries(entries: Vec<CatalogEntry>) -> Result<Self, CoreError> {
        if entries.is_empty() {
            return Err(CoreError::Validation(
                "Model catalog must contain at least one entry".to_string(),
            ));
        }
        for (i, entry) in entries.iter().enumerate() {
            if entries[..i].iter().any(|e| e.id == entry.id) {
                return Err(CoreError::Validation(format!(
                    "Duplicate catalog id '{}'",
                    entry.id
                )));
            }
        }
        Ok(Self { entries })
    }

    /// Load a catalog from a JSON file on disk.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Internal(format!(
                "Failed to read model catalog {}: {e}",
                path.display()
            ))
        })?;
        let entries: Vec<CatalogEntry> = serde_json::from_str(&raw).map_err(|e| {
            CoreError::Validation(format!(
                "Model catalog {} is not a valid entry array: {e}",
                path.display()
            ))
        })?;
        Self::from_entries(entries)
    }

    /// The built-in catalog shipped with the service.
    pub fn builtin() -> Self {
        let entries = vec![
            CatalogEntry {
                id: "default".to_string(),
                checkpoint: "dreamshaperXL_lightningDPMSDE.safetensors".to_string(),
            },
            CatalogEntry {
                id: "artistic".to_string(),
                checkpoint: "ProteusV0.4-Lighting.safetensors".to_string(),
            },
            CatalogEntry {
                id: "realistic".to_string(),
                checkpoint: "Juggernaut_RunDiffusionPhoto2_Lightning_4Steps.safetensors"
                    .to_string(),
            },
        ];
        Self { entries }
    }

    /// Identifier of the first entry, used when a request names no model.
    pub fn default_model(&self) -> &str {
        &self.entries[0].id
    }

    /// Resolve an identifier to its checkpoint filename.
    ///
    /// Unknown identifiers fail loudly. The source system left the
    /// checkpoint field untouched in this case; that no-op hid typos,
    /// so it is rejected here instead.
    pub fn checkpoint_for(&self, id: &str) -> Result<&str, CoreError> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.checkpoint.as_str())
            .ok_or_else(|| {
                let known: Vec<&str> = self.entries.iter().map(|e| e.id.as_str()).collect();
                CoreError::Validation(format!(
                    "Unknown checkpoint model '{id}'. Must be one of: {}",
                    known.join(", ")
                ))
            })
    }

    /// All checkpoint filenames, for startup weights preparation.
    pub fn checkpoints(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.checkpoint.as_str())
    }
}
