use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder for card fields the markup did not provide.
pub const UNKNOWN: &str = "Unknown";

pub const FOUND_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// Column names of the tracking sheet, in their canonical order.
pub const COL_JOB_ID: &str = "Job ID";
pub const COL_TITLE: &str = "Title";
pub const COL_COMPANY: &str = "Company";
pub const COL_LOCATION: &str = "Location";
pub const COL_LINK: &str = "Link";
pub const COL_FOUND_DATE: &str = "Found Date";
pub const COL_STATUS: &str = "Status";
pub const COL_NOTES: &str = "Notes";
pub const COL_DESCRIPTION: &str = "Description";
pub const COL_MATCH_SCORE: &str = "Match Score";
pub const COL_RESUME_PATH: &str = "Resume Path";

/// Columns every discovery sync expects to find in the header.
pub const RECORD_COLUMNS: [&str; 9] = [
    COL_JOB_ID,
    COL_TITLE,
    COL_COMPANY,
    COL_LOCATION,
    COL_LINK,
    COL_FOUND_DATE,
    COL_STATUS,
    COL_NOTES,
    COL_DESCRIPTION,
];

/// Columns added once the customize pipeline has touched the sheet.
pub const RESULT_COLUMNS: [&str; 2] = [COL_MATCH_SCORE, COL_RESUME_PATH];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobStatus {
    New,
    ResumeReady,
    /// Anything typed into the sheet by hand ("Applied", "Rejected", ...).
    Other(String),
}

impl JobStatus {
    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::New => "New",
            JobStatus::ResumeReady => "Resume Ready",
            JobStatus::Other(s) => s,
        }
    }
}

impl From<&str> for JobStatus {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "new" => JobStatus::New,
            "resume ready" => JobStatus::ResumeReady,
            _ => JobStatus::Other(s.trim().to_string()),
        }
    }
}

impl From<String> for JobStatus {
    fn from(s: String) -> Self {
        JobStatus::from(s.as_str())
    }
}

impl From<JobStatus> for String {
    fn from(status: JobStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One discovered listing, as stored in the sheet and the JSON mirror.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Numeric id parsed from the link; `None` when the link had no
    /// recognizable id, in which case dedup relies on `link`.
    pub job_id: Option<String>,
    pub title: String,
    pub company: String,
    pub location: String,
    pub link: String,
    pub found_date: String,
    pub status: JobStatus,
    #[serde(default)]
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl JobRecord {
    /// Value of this record for a sheet column; unknown columns are empty.
    pub fn column_value(&self, column: &str) -> String {
        match column {
            COL_JOB_ID => self.job_id.clone().unwrap_or_default(),
            COL_TITLE => self.title.clone(),
            COL_COMPANY => self.company.clone(),
            COL_LOCATION => self.location.clone(),
            COL_LINK => self.link.clone(),
            COL_FOUND_DATE => self.found_date.clone(),
            COL_STATUS => self.status.to_string(),
            COL_NOTES => self.notes.clone(),
            COL_DESCRIPTION => self.description.clone().unwrap_or_default(),
            _ => String::new(),
        }
    }

    /// Lays the record out as a sheet row following `header`.
    pub fn to_row(&self, header: &[String]) -> Vec<String> {
        header.iter().map(|col| self.column_value(col)).collect()
    }
}

/// Structured summary of a job description. Built once per job and only read
/// afterwards by the scorer and the document emitter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobAnalysis {
    pub required_skills: Vec<String>,
    pub keywords: Vec<String>,
    pub responsibilities: Vec<String>,
    pub seniority: String,
    pub domain: String,
}

impl JobAnalysis {
    /// A parsed response with neither skills nor keywords carries nothing the
    /// scorer can use.
    pub fn is_usable(&self) -> bool {
        !self.required_skills.is_empty() || !self.keywords.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> JobRecord {
        JobRecord {
            job_id: Some("4354633276".to_string()),
            title: "Product Manager".to_string(),
            company: "Macy's".to_string(),
            location: "New York, NY".to_string(),
            link: "https://www.linkedin.com/jobs/view/product-manager-at-macy-s-4354633276".to_string(),
            found_date: "2026-10-19 09:00:00".to_string(),
            status: JobStatus::New,
            notes: String::new(),
            description: None,
        }
    }

    #[test]
    fn test_status_parsing_is_case_insensitive() {
        assert_eq!(JobStatus::from("new"), JobStatus::New);
        assert_eq!(JobStatus::from(" NEW "), JobStatus::New);
        assert_eq!(JobStatus::from("resume ready"), JobStatus::ResumeReady);
        assert_eq!(JobStatus::from("Applied"), JobStatus::Other("Applied".to_string()));
        assert_eq!(JobStatus::ResumeReady.to_string(), "Resume Ready");
    }

    #[test]
    fn test_to_row_follows_header_order() {
        let header: Vec<String> = ["Link", "Job ID", "Extra", "Status"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let row = record().to_row(&header);
        assert_eq!(row[0], record().link);
        assert_eq!(row[1], "4354633276");
        assert_eq!(row[2], "");
        assert_eq!(row[3], "New");
    }

    #[test]
    fn test_record_json_shape() {
        let json = serde_json::to_value(record()).unwrap();
        assert_eq!(json["status"], "New");
        assert_eq!(json["job_id"], "4354633276");
        assert!(json.get("description").is_none());

        let mut missing_id = record();
        missing_id.job_id = None;
        let json = serde_json::to_value(&missing_id).unwrap();
        assert!(json["job_id"].is_null());

        let back: JobRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, missing_id);
    }

    #[test]
    fn test_analysis_usable() {
        assert!(!JobAnalysis::default().is_usable());
        let analysis = JobAnalysis {
            keywords: vec!["roadmap".to_string()],
            ..Default::default()
        };
        assert!(analysis.is_usable());
    }
}
