use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::models::JobRecord;
use crate::sync::KeySet;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct MirrorReport {
    pub added: usize,
    pub total: usize,
}

/// Local JSON backup of every record ever discovered, rewritten in full on
/// each save.
pub struct JsonMirror {
    path: PathBuf,
}

impl JsonMirror {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records currently in the file; a missing file is an empty mirror. A file
    /// that does not parse is an error so that a save never overwrites it.
    pub fn load(&self) -> Result<Vec<JobRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let data = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        if data.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse {}", self.path.display()))
    }

    /// Existing records first, then the new ones not already present by job
    /// id or link.
    pub fn merge(&self, records: &[JobRecord]) -> Result<MirrorReport> {
        let mut all = self.load()?;
        let mut keys = KeySet::default();
        for existing in &all {
            keys.add(existing);
        }

        let before = all.len();
        for record in records {
            if !keys.contains(record) {
                keys.add(record);
                all.push(record.clone());
            }
        }

        let json = serde_json::to_string_pretty(&all).context("Failed to serialize jobs")?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;

        let report = MirrorReport {
            added: all.len() - before,
            total: all.len(),
        };
        info!(
            "Saved {} new jobs to {} ({} total)",
            report.added,
            self.path.display(),
            report.total
        );
        Ok(report)
    }
}
