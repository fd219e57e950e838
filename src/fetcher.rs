use scraper::{Html, Selector};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::FetchConfig;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },
    #[error("body from {url} too short ({len} chars)")]
    ShortBody { url: String, len: usize },
}

/// A raw HTTP response: status code and body text.
#[derive(Debug, Clone)]
pub struct Page {
    pub status: u16,
    pub body: String,
}

// --- Source trait ---

/// Issues one blocking GET. Non-200 statuses are returned as a `Page`; only
/// transport failures are errors.
pub trait PageSource {
    fn get(&self, url: &str, query: &[(&str, String)]) -> Result<Page, FetchError>;
}

pub struct HttpSource {
    client: reqwest::blocking::Client,
}

impl HttpSource {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            reqwest::header::HeaderValue::from_static("en-US,en;q=0.9"),
        );
        let client = reqwest::blocking::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl PageSource for HttpSource {
    fn get(&self, url: &str, query: &[(&str, String)]) -> Result<Page, FetchError> {
        let response = self.client.get(url).query(query).send()?;
        let status = response.status().as_u16();
        let body = response.text()?;
        Ok(Page { status, body })
    }
}

// --- Search ---

#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub keywords: String,
    /// A single location. List-valued locations must be resolved by the caller
    /// because the endpoint mishandles repeated `location` parameters.
    pub location: Option<String>,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    TargetReached,
    /// A page came back with fewer cards than the page size.
    Exhausted,
    HttpStatus(u16),
    Transport,
}

/// Card fragments gathered before pagination stopped, in discovery order.
#[derive(Debug)]
pub struct SearchResults {
    pub fragments: Vec<String>,
    pub pages: usize,
    pub stop: StopReason,
}

pub struct JobBoard<S: PageSource> {
    source: S,
    config: FetchConfig,
}

impl<S: PageSource> JobBoard<S> {
    pub fn new(source: S, config: FetchConfig) -> Self {
        Self { source, config }
    }

    #[cfg(test)]
    pub(crate) fn source(&self) -> &S {
        &self.source
    }

    pub fn search(&self, query: &SearchQuery) -> SearchResults {
        info!(
            "Searching '{}' in '{}' for up to {} jobs",
            query.keywords,
            query.location.as_deref().unwrap_or(""),
            query.count
        );

        let page_size = self.config.page_size.max(1);
        let mut fragments: Vec<String> = Vec::new();
        let mut pages = 0;
        let mut start = 0;

        let stop = loop {
            if fragments.len() >= query.count {
                break StopReason::TargetReached;
            }
            if pages > 0 {
                pause(self.config.page_delay);
            }

            let params = self.search_params(query, start);
            pages += 1;
            let page = match self.source.get(&self.config.search_url, &params) {
                Ok(page) => page,
                Err(e) => {
                    warn!("Search request failed at start={}: {}", start, e);
                    break StopReason::Transport;
                }
            };
            if page.status != 200 {
                warn!("Search returned status {} at start={}", page.status, start);
                break StopReason::HttpStatus(page.status);
            }

            let cards = split_cards(&page.body);
            debug!("Page at start={} returned {} cards", start, cards.len());
            let short_page = cards.len() < page_size;
            fragments.extend(cards);
            if short_page {
                break if fragments.len() >= query.count {
                    StopReason::TargetReached
                } else {
                    StopReason::Exhausted
                };
            }
            start += page_size;
        };

        fragments.truncate(query.count);
        info!(
            "Collected {} cards from {} page(s), stopped: {:?}",
            fragments.len(),
            pages,
            stop
        );
        SearchResults {
            fragments,
            pages,
            stop,
        }
    }

    fn search_params(&self, query: &SearchQuery, start: usize) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("keywords", query.keywords.clone()),
            ("location", query.location.clone().unwrap_or_default()),
            ("start", start.to_string()),
        ];
        if let Some(range) = &self.config.time_range {
            params.push(("f_TPR", range.clone()));
        }
        params
    }

    // --- Detail pages ---

    /// Full posting page for one job id, or `None` when there is no usable data.
    pub fn fetch_detail(&self, job_id: &str) -> Option<String> {
        let url = format!("{}/{}", self.config.detail_url.trim_end_matches('/'), job_id);
        self.fetch_page(&url)
    }

    /// Same contract as `fetch_detail`, for an arbitrary listing URL.
    pub fn fetch_page(&self, url: &str) -> Option<String> {
        match self.try_fetch(url) {
            Ok(body) => {
                debug!("Fetched {} characters from {}", body.chars().count(), url);
                Some(body)
            }
            Err(e) => {
                warn!("No detail data: {}", e);
                None
            }
        }
    }

    fn try_fetch(&self, url: &str) -> Result<String, FetchError> {
        let page = self.source.get(url, &[])?;
        if page.status != 200 {
            return Err(FetchError::Status {
                status: page.status,
                url: url.to_string(),
            });
        }
        let len = page.body.trim().chars().count();
        if len < self.config.min_detail_len {
            return Err(FetchError::ShortBody {
                url: url.to_string(),
                len,
            });
        }
        Ok(page.body)
    }

    /// Courtesy throttle between consecutive detail fetches.
    pub fn pause_between_details(&self) {
        pause(self.config.detail_delay);
    }
}

pub(crate) fn pause(delay: Duration) {
    if !delay.is_zero() {
        thread::sleep(delay);
    }
}

/// Outer HTML of every top-level `<li>` in a search response.
pub fn split_cards(body: &str) -> Vec<String> {
    let document = Html::parse_document(body);
    let Ok(selector) = Selector::parse("li") else {
        return Vec::new();
    };
    document
        .select(&selector)
        .filter(|li| {
            !li.ancestors()
                .any(|node| node.value().as_element().is_some_and(|e| e.name() == "li"))
        })
        .map(|li| li.html())
        .collect()
}
