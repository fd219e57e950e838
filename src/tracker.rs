//! The discovery pipeline: search, extract, filter, optionally describe, then
//! record every new listing in the sheet and the JSON mirror.

use anyhow::Result;
use tracing::{error, info, warn};

use crate::cards::extract_cards;
use crate::description::extract_description;
use crate::fetcher::{JobBoard, PageSource, SearchQuery, StopReason};
use crate::filter::KeywordFilter;
use crate::mirror::{JsonMirror, MirrorReport};
use crate::models::{
    COL_DESCRIPTION, COL_JOB_ID, COL_LINK, FOUND_DATE_FORMAT, JobRecord, RECORD_COLUMNS,
};
use crate::sheet::TableStore;
use crate::sync::{KeySet, SyncReport, column_index, ensure_columns, sync_records};

#[derive(Debug, Clone)]
pub struct ScrapeOptions {
    pub query: SearchQuery,
    pub with_descriptions: bool,
}

#[derive(Debug)]
pub struct ScrapeSummary {
    pub pages: usize,
    pub cards: usize,
    pub extracted: usize,
    pub matched: usize,
    pub described: usize,
    pub stop: StopReason,
    /// `None` when the sink was disabled or failed.
    pub sync: Option<SyncReport>,
    pub mirror: Option<MirrorReport>,
}

pub fn run_scrape<S: PageSource>(
    board: &JobBoard<S>,
    filter: &KeywordFilter,
    options: &ScrapeOptions,
    store: Option<&mut dyn TableStore>,
    mirror: Option<&JsonMirror>,
) -> ScrapeSummary {
    let results = board.search(&options.query);
    let found_date = chrono::Local::now().format(FOUND_DATE_FORMAT).to_string();

    let extracted = extract_cards(&results.fragments, &found_date);
    let extracted_count = extracted.len();
    let mut records = filter.apply(extracted);
    info!(
        "{} of {} extracted jobs match the role filter",
        records.len(),
        extracted_count
    );

    let described = if options.with_descriptions {
        let tracked = tracked_keys(store.as_deref(), mirror);
        describe_records(board, &mut records, &tracked)
    } else {
        0
    };

    let sync = store.and_then(|store| match sync_records(store, &records) {
        Ok(report) => Some(report),
        Err(e) => {
            error!("Sheet sync failed: {}", e);
            None
        }
    });

    let mirror = mirror.and_then(|mirror| match mirror.merge(&records) {
        Ok(report) => Some(report),
        Err(e) => {
            error!("JSON mirror not saved: {:#}", e);
            None
        }
    });

    ScrapeSummary {
        pages: results.pages,
        cards: results.fragments.len(),
        extracted: extracted_count,
        matched: records.len(),
        described,
        stop: results.stop,
        sync,
        mirror,
    }
}

/// Keys already held by each enabled sink. A sink that cannot be read counts
/// as empty, so its records are all treated as new.
fn tracked_keys(store: Option<&dyn TableStore>, mirror: Option<&JsonMirror>) -> Vec<KeySet> {
    let mut tracked = Vec::new();
    if let Some(store) = store {
        match store.get_all_values() {
            Ok(values) => tracked.push(KeySet::from_values(&values)),
            Err(e) => {
                warn!("Could not read sheet keys: {}", e);
                tracked.push(KeySet::default());
            }
        }
    }
    if let Some(mirror) = mirror {
        let mut keys = KeySet::default();
        match mirror.load() {
            Ok(existing) => existing.iter().for_each(|r| keys.add(r)),
            Err(e) => warn!("Could not read mirror keys: {:#}", e),
        }
        tracked.push(keys);
    }
    tracked
}

/// Fetches the detail page of each record that some sink does not hold yet
/// and fills in its description where one can be extracted. Records every
/// sink already tracks are left alone, as are repeats within the batch.
fn describe_records<S: PageSource>(
    board: &JobBoard<S>,
    records: &mut [JobRecord],
    tracked: &[KeySet],
) -> usize {
    let mut seen = KeySet::default();
    let mut fetched = 0;
    let mut described = 0;
    for record in records.iter_mut() {
        let known = !tracked.is_empty() && tracked.iter().all(|keys| keys.contains(record));
        if known || seen.contains(record) {
            continue;
        }
        seen.add(record);
        if fetched > 0 {
            board.pause_between_details();
        }
        fetched += 1;
        info!("[{}] Fetching description: {}", fetched, record.title);
        match fetch_description(board, record.job_id.as_deref(), &record.link) {
            Some(text) => {
                record.description = Some(text);
                described += 1;
            }
            None => warn!("No description for {}", record.link),
        }
    }
    info!("Fetched {} of {} descriptions", described, fetched);
    described
}

/// Detail page by job id when there is one, else the listing link itself.
pub fn fetch_description<S: PageSource>(
    board: &JobBoard<S>,
    job_id: Option<&str>,
    link: &str,
) -> Option<String> {
    let page = match job_id.map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) => board.fetch_detail(id),
        None if !link.trim().is_empty() => board.fetch_page(link.trim()),
        None => None,
    }?;
    extract_description(&page)
}

// --- Lazy enrichment ---

#[derive(Debug, Default, PartialEq, Eq)]
pub struct DescribeSummary {
    pub pending: usize,
    pub updated: usize,
    pub missing: usize,
    pub failed: usize,
}

/// Fills the `Description` cell of stored rows that have none, up to `limit`
/// rows. Each row is fetched and written on its own; a failure moves on to
/// the next row.
pub fn run_describe<S: PageSource>(
    board: &JobBoard<S>,
    store: &mut dyn TableStore,
    limit: Option<usize>,
) -> Result<DescribeSummary> {
    ensure_columns(store, &RECORD_COLUMNS)?;
    let Some(col) = column_index(store, COL_DESCRIPTION)? else {
        return Ok(DescribeSummary::default());
    };

    let mut pending: Vec<_> = store
        .get_all_records()?
        .into_iter()
        .filter(|r| r.get(COL_DESCRIPTION).trim().is_empty())
        .collect();
    if let Some(limit) = limit {
        pending.truncate(limit);
    }
    info!("{} rows without a description", pending.len());

    let mut summary = DescribeSummary {
        pending: pending.len(),
        ..Default::default()
    };
    for (i, row) in pending.iter().enumerate() {
        if i > 0 {
            board.pause_between_details();
        }
        let Some(text) = fetch_description(board, Some(row.get(COL_JOB_ID)), row.get(COL_LINK))
        else {
            warn!("Row {}: no description found", row.row);
            summary.missing += 1;
            continue;
        };
        match store.update_cell(row.row, col, &text) {
            Ok(()) => {
                info!("Row {}: saved {} characters", row.row, text.chars().count());
                summary.updated += 1;
            }
            Err(e) => {
                error!("Row {}: could not write description: {}", row.row, e);
                summary.failed += 1;
            }
        }
    }
    Ok(summary)
}
