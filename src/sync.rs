//! Merges discovered records into the tracking sheet without duplicates.
//!
//! A record is a duplicate when either its job id or its link already appears
//! in the sheet: ids may fail to parse or change format between runs, links
//! cover for that. Writes are append-only, so existing rows keep their order
//! and content; the only in-place write is extending the header.

use std::collections::HashSet;
use tracing::{debug, info};

use crate::models::{COL_JOB_ID, COL_LINK, JobRecord, RECORD_COLUMNS};
use crate::sheet::{Result, TableStore};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub appended: usize,
    pub duplicates: usize,
    pub added_columns: Vec<String>,
}

/// Job ids and links already present; both live in one set.
#[derive(Debug, Default)]
pub struct KeySet {
    keys: HashSet<String>,
}

impl KeySet {
    pub fn from_values(values: &[Vec<String>]) -> Self {
        let mut set = Self::default();
        let Some((header, rows)) = values.split_first() else {
            return set;
        };
        let columns: Vec<usize> = [COL_JOB_ID, COL_LINK]
            .iter()
            .filter_map(|name| header.iter().position(|h| h == name))
            .collect();
        for row in rows {
            for &col in &columns {
                if let Some(value) = row.get(col) {
                    set.insert(value);
                }
            }
        }
        set
    }

    fn insert(&mut self, value: &str) {
        let value = value.trim();
        if !value.is_empty() {
            self.keys.insert(value.to_string());
        }
    }

    pub fn contains(&self, record: &JobRecord) -> bool {
        record
            .job_id
            .as_deref()
            .is_some_and(|id| self.keys.contains(id.trim()))
            || self.keys.contains(record.link.trim())
    }

    pub fn add(&mut self, record: &JobRecord) {
        if let Some(id) = &record.job_id {
            self.insert(id);
        }
        self.insert(&record.link);
    }
}

/// Makes sure the header row carries every column in `columns`. Missing ones
/// are written after the last existing header cell; rows already in the sheet
/// simply read as empty for them. An empty sheet gets a fresh header.
///
/// Returns the header as it stands afterwards and the names that were added.
pub fn ensure_columns(
    store: &mut dyn TableStore,
    columns: &[&str],
) -> Result<(Vec<String>, Vec<String>)> {
    let values = store.get_all_values()?;
    let Some(existing) = values.first() else {
        let header: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        store.append_rows(std::slice::from_ref(&header))?;
        info!("Wrote header row with {} columns", header.len());
        return Ok((header.clone(), header));
    };

    let mut header = existing.clone();
    while header.last().is_some_and(|h| h.trim().is_empty()) {
        header.pop();
    }
    let mut added = Vec::new();
    for column in columns {
        if header.iter().any(|h| h == column) {
            continue;
        }
        header.push(column.to_string());
        store.update_cell(1, header.len(), column)?;
        info!("Added missing column '{}' at position {}", column, header.len());
        added.push(column.to_string());
    }
    Ok((header, added))
}

/// Appends the records that are not in the sheet yet, in their given order.
pub fn sync_records(store: &mut dyn TableStore, records: &[JobRecord]) -> Result<SyncReport> {
    let (header, added_columns) = ensure_columns(store, &RECORD_COLUMNS)?;
    let values = store.get_all_values()?;
    let mut keys = KeySet::from_values(&values);

    let mut report = SyncReport {
        added_columns,
        ..Default::default()
    };
    let mut rows = Vec::new();
    for record in records {
        if keys.contains(record) {
            debug!("Skipping duplicate: {} ({})", record.title, record.link);
            report.duplicates += 1;
            continue;
        }
        keys.add(record);
        rows.push(record.to_row(&header));
    }

    if !rows.is_empty() {
        store.append_rows(&rows)?;
    }
    report.appended = rows.len();
    info!(
        "Sheet sync: {} appended, {} already tracked",
        report.appended, report.duplicates
    );
    Ok(report)
}

/// 1-based sheet row of the record with this id, or failing that this link.
pub fn find_row(store: &dyn TableStore, job_id: Option<&str>, link: &str) -> Result<Option<usize>> {
    let records = store.get_all_records()?;
    let job_id = job_id.map(str::trim).filter(|id| !id.is_empty());
    if let Some(id) = job_id {
        if let Some(found) = records.iter().find(|r| r.get(COL_JOB_ID).trim() == id) {
            return Ok(Some(found.row));
        }
    }
    let link = link.trim();
    if link.is_empty() {
        return Ok(None);
    }
    Ok(records
        .iter()
        .find(|r| r.get(COL_LINK).trim() == link)
        .map(|r| r.row))
}

/// 1-based column of `name` in the header row.
pub fn column_index(store: &dyn TableStore, name: &str) -> Result<Option<usize>> {
    let values = store.get_all_values()?;
    Ok(values
        .first()
        .and_then(|header| header.iter().position(|h| h == name))
        .map(|i| i + 1))
}
