use crate::models::JobRecord;

/// Role-family synonyms and abbreviations for product management titles.
pub const PM_KEYWORDS: [&str; 15] = [
    "product manager",
    "product management",
    "product owner",
    "product lead",
    "group product manager",
    "senior product manager",
    "principal product manager",
    "associate product manager",
    "apm",
    "gpm",
    "spm",
    "head of product",
    "director of product",
    "vp product",
    "chief product officer",
];

/// Keeps records whose title contains one of the keywords, ignoring case.
#[derive(Debug, Clone)]
pub struct KeywordFilter {
    keywords: Vec<String>,
}

impl KeywordFilter {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { keywords }
    }

    pub fn product_management() -> Self {
        Self::new(PM_KEYWORDS)
    }

    pub fn matches(&self, title: &str) -> bool {
        let title_lower = title.to_lowercase();
        self.keywords.iter().any(|k| title_lower.contains(k.as_str()))
    }

    pub fn apply(&self, records: Vec<JobRecord>) -> Vec<JobRecord> {
        records.into_iter().filter(|r| self.matches(&r.title)).collect()
    }
}
