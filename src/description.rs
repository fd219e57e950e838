//! Recovers the free-text job description from a detail page.
//!
//! The posting markup differs between listings and changes over time, so
//! extraction runs through tiers, strictest first:
//!
//! 1. a known description container with at least [`CONTAINER_MIN_CHARS`],
//! 2. the page text between a section heading and a trailing marker, at least
//!    [`MARKER_MIN_CHARS`],
//! 3. the whole body, at least [`BODY_MIN_CHARS`] and mentioning a domain
//!    keyword,
//!
//! and gives up with `None` otherwise.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use tracing::debug;

pub const CONTAINER_MIN_CHARS: usize = 100;
pub const MARKER_MIN_CHARS: usize = 200;
pub const BODY_MIN_CHARS: usize = 500;

const CONTAINER_SELECTORS: [&str; 7] = [
    "div.description__text",
    "div.show-more-less-html__markup",
    "section.show-more-less-html",
    "div.decorated-job-posting__details",
    "div.jobs-description__content",
    "div.jobs-box__html-content",
    "#job-details",
];

const HEADING_MARKERS: [&str; 3] = ["Job Description", "Job Overview", "About the job"];

const TRAILING_MARKERS: [&str; 7] = [
    "Show more",
    "Show less",
    "Seniority level",
    "Employment type",
    "Job function",
    "Industries",
    "Referrals increase",
];

const DOMAIN_KEYWORDS: [&str; 6] = [
    "responsibilities",
    "experience",
    "product",
    "skills",
    "requirements",
    "qualifications",
];

static MARKER_SECTION: LazyLock<Option<Regex>> = LazyLock::new(|| {
    let headings = alternation(&HEADING_MARKERS);
    let trailing = alternation(&TRAILING_MARKERS);
    Regex::new(&format!(r"(?is)(?:{headings}).*?({trailing})")).ok()
});

fn alternation(markers: &[&str]) -> String {
    markers
        .iter()
        .map(|m| regex::escape(m))
        .collect::<Vec<_>>()
        .join("|")
}

/// Which strategy produced the description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Container,
    Marker,
    Body,
}

/// Best-effort description of a detail page, or `None` if no tier accepts it.
pub fn extract_description(html: &str) -> Option<String> {
    extract_with_tier(html).map(|(_, text)| text)
}

pub fn extract_with_tier(html: &str) -> Option<(Tier, String)> {
    let document = Html::parse_document(html);

    if let Some(text) = from_container(&document) {
        debug!("Description from container ({} chars)", char_len(&text));
        return Some((Tier::Container, text));
    }

    let page_text = element_text(document.root_element());
    if let Some(text) = from_markers(&page_text) {
        debug!("Description from section markers ({} chars)", char_len(&text));
        return Some((Tier::Marker, text));
    }

    if let Some(text) = from_body(&document) {
        debug!("Description from page body ({} chars)", char_len(&text));
        return Some((Tier::Body, text));
    }

    debug!("No description found");
    None
}

// --- Tier 1 ---

fn from_container(document: &Html) -> Option<String> {
    for selector_str in &CONTAINER_SELECTORS {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        for element in document.select(&selector) {
            let text = element_text(element);
            if char_len(&text) >= CONTAINER_MIN_CHARS {
                return Some(text);
            }
        }
    }
    None
}

// --- Tier 2 ---

/// Text from the first heading marker up to (not including) the nearest
/// trailing marker after it. Matching is case-insensitive.
fn from_markers(page_text: &str) -> Option<String> {
    let re = MARKER_SECTION.as_ref()?;
    let captures = re.captures(page_text)?;
    let whole = captures.get(0)?;
    let trailing = captures.get(1)?;
    let section = page_text[whole.start()..trailing.start()].trim();
    (char_len(section) >= MARKER_MIN_CHARS).then(|| section.to_string())
}

// --- Tier 3 ---

fn from_body(document: &Html) -> Option<String> {
    let selector = Selector::parse("body").ok()?;
    let body = document.select(&selector).next()?;
    let text = element_text(body);
    if char_len(&text) < BODY_MIN_CHARS {
        return None;
    }
    let lower = text.to_lowercase();
    DOMAIN_KEYWORDS
        .iter()
        .any(|keyword| lower.contains(keyword))
        .then_some(text)
}

/// Visible text of an element: text nodes trimmed, blanks dropped, one per
/// line. Script and style contents are skipped.
fn element_text(element: ElementRef) -> String {
    element
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let parent_is_code = node
                .parent()
                .and_then(|p| p.value().as_element().map(|e| e.name()))
                .is_some_and(|name| matches!(name, "script" | "style" | "noscript"));
            (!parent_is_code).then_some(&**text)
        })
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
