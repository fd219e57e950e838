use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const SEARCH_URL: &str =
    "https://www.linkedin.com/jobs-guest/jobs/api/seeMoreJobPostings/search";
pub const DETAIL_URL: &str = "https://www.linkedin.com/jobs-guest/jobs/api/jobPosting";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Request pacing and endpoints for the job board.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub search_url: String,
    pub detail_url: String,
    pub user_agent: String,
    pub page_size: usize,
    pub page_delay: Duration,
    pub detail_delay: Duration,
    pub timeout: Duration,
    /// Detail bodies shorter than this are treated as "no data".
    pub min_detail_len: usize,
    /// Value of the `f_TPR` search parameter, e.g. `r86400` for the past day.
    pub time_range: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            search_url: SEARCH_URL.to_string(),
            detail_url: DETAIL_URL.to_string(),
            user_agent: USER_AGENT.to_string(),
            page_size: 25,
            page_delay: Duration::from_secs(2),
            detail_delay: Duration::from_secs(2),
            timeout: Duration::from_secs(15),
            min_detail_len: 100,
            time_range: Some("r86400".to_string()),
        }
    }
}

/// Where the tracking data lives.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// `None` disables the sheet entirely and leaves only the JSON mirror.
    pub sheet_db: Option<PathBuf>,
    pub sheet_name: String,
    pub json_mirror: PathBuf,
}

/// Settings for the resume customization pipeline.
#[derive(Debug, Clone)]
pub struct CustomizeConfig {
    pub master_resume: PathBuf,
    pub output_dir: PathBuf,
    pub min_match_score: u32,
    pub max_jobs_per_run: usize,
    pub job_delay: Duration,
    pub candidate_name: String,
    pub candidate_summary: String,
}

impl Default for CustomizeConfig {
    fn default() -> Self {
        Self {
            master_resume: PathBuf::from("resume_master.md"),
            output_dir: PathBuf::from("customized_resumes"),
            min_match_score: 50,
            max_jobs_per_run: 20,
            job_delay: Duration::from_secs(3),
            candidate_name: "Candidate".to_string(),
            candidate_summary: "a Senior Product Manager with 6+ years of experience in \
                B2B SaaS, consumer apps, e-commerce and AI/ML products"
                .to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AiConfig {
    pub model: String,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    /// Per-request limit for generator calls.
    pub timeout: Duration,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            openai_api_key: None,
            anthropic_api_key: None,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Built once in `main` and handed to every stage by reference.
#[derive(Debug, Clone)]
pub struct Config {
    pub fetch: FetchConfig,
    pub store: StoreConfig,
    pub customize: CustomizeConfig,
    pub ai: AiConfig,
}

impl Config {
    /// Defaults overlaid with environment variables (a `.env` file is loaded
    /// by the caller before this runs).
    pub fn from_env() -> Self {
        let mut customize = CustomizeConfig::default();
        if let Some(path) = env_var("JOBTRACK_RESUME") {
            customize.master_resume = PathBuf::from(path);
        }
        if let Some(path) = env_var("JOBTRACK_OUTPUT_DIR") {
            customize.output_dir = PathBuf::from(path);
        }
        if let Some(name) = env_var("JOBTRACK_CANDIDATE_NAME") {
            customize.candidate_name = name;
        }
        if let Some(summary) = env_var("JOBTRACK_CANDIDATE_SUMMARY") {
            customize.candidate_summary = summary;
        }

        let store = StoreConfig {
            sheet_db: Some(
                env_var("JOBTRACK_SHEET_DB")
                    .map(PathBuf::from)
                    .unwrap_or_else(default_sheet_path),
            ),
            sheet_name: env_var("JOBTRACK_SHEET_NAME")
                .unwrap_or_else(|| "LinkedIn PM Jobs".to_string()),
            json_mirror: PathBuf::from("linkedin_pm_jobs.json"),
        };

        let mut ai = AiConfig {
            openai_api_key: env_var("OPENAI_API_KEY"),
            anthropic_api_key: env_var("ANTHROPIC_API_KEY"),
            ..AiConfig::default()
        };
        if let Some(model) = env_var("JOBTRACK_MODEL") {
            ai.model = model;
        }
        if let Some(secs) = env_var("JOBTRACK_AI_TIMEOUT_SECS").and_then(|s| s.parse().ok()) {
            ai.timeout = Duration::from_secs(secs);
        }

        Self {
            fetch: FetchConfig::default(),
            store,
            customize,
            ai,
        }
    }
}

fn env_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn default_sheet_path() -> PathBuf {
    // Use XDG data directory or fallback
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "jobtrack") {
        proj_dirs.data_dir().join("sheets.db")
    } else {
        PathBuf::from("sheets.db")
    }
}
