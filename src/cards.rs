//! Turns one search-result card into a `JobRecord`.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use tracing::debug;

use crate::models::{JobRecord, JobStatus, UNKNOWN};

// Tried in order; the first selector with non-empty text wins.
const TITLE_SELECTORS: [&str; 3] = [
    "h3.base-search-card__title",
    ".base-search-card__title",
    ".job-search-card__title",
];

const LINK_SELECTORS: [&str; 3] = [
    "a.base-card__full-link",
    "a.base-search-card--link",
    "a[href*='/jobs/view/']",
];

const COMPANY_SELECTORS: [&str; 3] = [
    "h4.base-search-card__subtitle",
    ".base-search-card__subtitle a",
    ".job-search-card__company-name",
];

const LOCATION_SELECTORS: [&str; 2] = [
    "span.job-search-card__location",
    ".base-search-card__metadata .job-search-card__location",
];

static ID_AFTER_HYPHEN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"-(\d+)/?$").ok());
static ID_AFTER_SLASH: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"/(\d+)/?$").ok());

/// Parses one card fragment. Title and link are mandatory; company and
/// location fall back to `UNKNOWN`.
pub fn extract_card(fragment: &str, found_date: &str) -> Option<JobRecord> {
    let document = Html::parse_fragment(fragment);
    let root = document.root_element();

    let title = first_text(root, &TITLE_SELECTORS)?;
    let href = first_attr(root, &LINK_SELECTORS, "href")?;
    let link = normalize_link(&href);
    if link.is_empty() {
        return None;
    }

    let company = first_text(root, &COMPANY_SELECTORS).unwrap_or_else(|| UNKNOWN.to_string());
    let location = first_text(root, &LOCATION_SELECTORS).unwrap_or_else(|| UNKNOWN.to_string());
    let job_id = extract_job_id(&link);

    Some(JobRecord {
        job_id,
        title,
        company,
        location,
        link,
        found_date: found_date.to_string(),
        status: JobStatus::New,
        notes: String::new(),
        description: None,
    })
}

/// Extracts every card, skipping the ones that cannot be parsed. The whole
/// batch shares one discovery timestamp.
pub fn extract_cards(fragments: &[String], found_date: &str) -> Vec<JobRecord> {
    let mut records = Vec::with_capacity(fragments.len());
    for (i, fragment) in fragments.iter().enumerate() {
        match extract_card(fragment, found_date) {
            Some(record) => records.push(record),
            None => debug!("Rejected card #{}: missing title or link", i),
        }
    }
    records
}

/// Strips tracking parameters: everything from the first `?` on.
pub fn normalize_link(href: &str) -> String {
    let href = href.trim();
    match href.find('?') {
        Some(idx) => href[..idx].to_string(),
        None => href.to_string(),
    }
}

/// Trailing numeric id of a listing URL, e.g. `.../product-manager-at-acme-4354633276`.
pub fn extract_job_id(link: &str) -> Option<String> {
    [&*ID_AFTER_HYPHEN, &*ID_AFTER_SLASH]
        .into_iter()
        .flatten()
        .find_map(|re| re.captures(link)?.get(1).map(|m| m.as_str().to_string()))
}

fn first_text(root: ElementRef, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|s| {
        let selector = Selector::parse(s).ok()?;
        root.select(&selector)
            .map(|el| clean_text(&el.text().collect::<Vec<_>>().join(" ")))
            .find(|text| !text.is_empty())
    })
}

fn first_attr(root: ElementRef, selectors: &[&str], attr: &str) -> Option<String> {
    selectors.iter().find_map(|s| {
        let selector = Selector::parse(s).ok()?;
        root.select(&selector)
            .filter_map(|el| el.value().attr(attr))
            .map(str::trim)
            .find(|value| !value.is_empty())
            .map(String::from)
    })
}

fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
