//! Export record persistence
//!
//! File-backed store with one JSON document per campaign holding the four
//! nullable export fields, so "has this campaign ever been exported" is a
//! single read. All writes are last-writer-wins merges scoped to one
//! campaign id; no cross-campaign state exists.

use crate::error::{ExportError, Result};
use export_types::{Destination, ExportRecord, ExportRecordPatch};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// The four persisted fields attached to a campaign
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredRecord {
    external_id: Option<String>,
    destination: Option<Destination>,
    exported_at: Option<chrono::DateTime<chrono::Utc>>,
    status: Option<export_types::ExportStatus>,
}

/// Campaign ids come from the URL path; keep them filesystem-safe
pub fn is_valid_campaign_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

pub struct ExportRepository {
    root_path: PathBuf,
}

impl ExportRepository {
    /// Create a repository rooted at the given directory
    pub fn new<P: AsRef<Path>>(root_path: P) -> Result<Self> {
        let root_path = root_path.as_ref().to_path_buf();
        fs::create_dir_all(&root_path)?;
        Ok(Self { root_path })
    }

    fn record_path(&self, campaign_id: &str) -> Result<PathBuf> {
        if !is_valid_campaign_id(campaign_id) {
            return Err(ExportError::Storage(format!(
                "Invalid campaign id: {:?}",
                campaign_id
            )));
        }
        Ok(self.root_path.join(format!("campaign_{}.json", campaign_id)))
    }

    fn read(&self, path: &Path) -> Result<StoredRecord> {
        if !path.exists() {
            return Ok(StoredRecord::default());
        }

        let json = fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| ExportError::Storage(format!("Failed to deserialize export record: {}", e)))
    }

    fn write(&self, path: &Path, stored: &StoredRecord) -> Result<()> {
        let json = serde_json::to_string_pretty(stored)
            .map_err(|e| ExportError::Storage(format!("Failed to serialize export record: {}", e)))?;

        fs::write(path, json)?;
        Ok(())
    }

    /// Read the export record; all fields null when never exported
    pub fn get_record(&self, campaign_id: &str) -> Result<ExportRecord> {
        let path = self.record_path(campaign_id)?;
        let stored = self.read(&path)?;

        Ok(ExportRecord {
            campaign_id: campaign_id.to_string(),
            external_id: stored.external_id,
            destination: stored.destination,
            exported_at: stored.exported_at,
            status: stored.status,
        })
    }

    /// Merge the provided fields into the record, leaving the rest unchanged
    ///
    /// Enforces the record invariant: `external_id` and `destination` end up
    /// both set or both null.
    pub fn upsert(&self, campaign_id: &str, patch: ExportRecordPatch) -> Result<ExportRecord> {
        let path = self.record_path(campaign_id)?;
        let mut stored = self.read(&path)?;

        if let Some(external_id) = patch.external_id {
            stored.external_id = Some(external_id);
        }
        if let Some(destination) = patch.destination {
            stored.destination = Some(destination);
        }
        if let Some(exported_at) = patch.exported_at {
            stored.exported_at = Some(exported_at);
        }
        if let Some(status) = patch.status {
            stored.status = Some(status);
        }

        if stored.external_id.is_some() != stored.destination.is_some() {
            return Err(ExportError::Storage(
                "external_id and destination must be set together".to_string(),
            ));
        }

        self.write(&path, &stored)?;
        log::debug!("Upserted export record for campaign {}", campaign_id);

        Ok(ExportRecord {
            campaign_id: campaign_id.to_string(),
            external_id: stored.external_id,
            destination: stored.destination,
            exported_at: stored.exported_at,
            status: stored.status,
        })
    }

    /// Forget the export: reset all four fields atomically so a re-export
    /// creates a logically new remote campaign
    pub fn clear(&self, campaign_id: &str) -> Result<()> {
        let path = self.record_path(campaign_id)?;
        self.write(&path, &StoredRecord::default())?;
        log::info!("Cleared export record for campaign {}", campaign_id);
        Ok(())
    }

    /// Campaign ids already linked to the given remote campaign
    ///
    /// Duplicate-detection diagnostics only; not on the orchestrator's
    /// critical path.
    pub fn find_by_external_id(
        &self,
        external_id: &str,
        destination: Destination,
    ) -> Result<Vec<String>> {
        let mut matches = Vec::new();

        for entry in fs::read_dir(&self.root_path)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }

            let stored = match self.read(&path) {
                Ok(s) => s,
                Err(_) => continue,
            };

            if stored.external_id.as_deref() == Some(external_id)
                && stored.destination == Some(destination)
            {
                if let Some(name) = path.file_stem().and_then(|s| s.to_str()) {
                    if let Some(id) = name.strip_prefix("campaign_") {
                        matches.push(id.to_string());
                    }
                }
            }
        }

        matches.sort_unstable();
        Ok(matches)
    }
}
