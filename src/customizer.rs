use anyhow::Result;
use std::fmt;
use std::fs;
use tracing::{error, info, warn};

use crate::ai::TextGenerator;
use crate::analyzer::JobAnalyzer;
use crate::config::CustomizeConfig;
use crate::documents::{DocumentEmitter, EmitReport, Posting};
use crate::fetcher::{JobBoard, PageSource, pause};
use crate::models::{
    COL_COMPANY, COL_DESCRIPTION, COL_JOB_ID, COL_LINK, COL_MATCH_SCORE, COL_RESUME_PATH,
    COL_STATUS, COL_TITLE, JobStatus, RESULT_COLUMNS,
};
use crate::scoring::match_score;
use crate::sheet::{SheetRecord, TableStore};
use crate::sync::{ensure_columns, find_row};
use crate::tracker::fetch_description;

/// Descriptions shorter than this are not worth analyzing.
pub const MIN_DESCRIPTION_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NoDescription,
    BelowThreshold { score: u32, min: u32 },
    ResumeNotEmitted(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoDescription => write!(f, "job description too short or missing"),
            SkipReason::BelowThreshold { score, min } => {
                write!(f, "score {}% below minimum ({}%)", score, min)
            }
            SkipReason::ResumeNotEmitted(reason) => write!(f, "resume not created: {}", reason),
        }
    }
}

#[derive(Debug)]
pub enum JobOutcome {
    Processed { score: u32, report: EmitReport },
    Skipped(SkipReason),
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct CustomizeSummary {
    pub candidates: usize,
    pub processed: usize,
    /// Processed jobs that also got a cover letter.
    pub cover_letters: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct Customizer<'a, S: PageSource> {
    config: &'a CustomizeConfig,
    board: &'a JobBoard<S>,
    store: &'a mut dyn TableStore,
    generator: Option<&'a dyn TextGenerator>,
}

impl<'a, S: PageSource> Customizer<'a, S> {
    pub fn new(
        config: &'a CustomizeConfig,
        board: &'a JobBoard<S>,
        store: &'a mut dyn TableStore,
        generator: Option<&'a dyn TextGenerator>,
    ) -> Self {
        Self {
            config,
            board,
            store,
            generator,
        }
    }

    /// Rows still marked `New`, in sheet order, capped per run.
    pub fn pending_jobs(&self) -> Result<Vec<SheetRecord>> {
        let mut rows: Vec<_> = self
            .store
            .get_all_records()?
            .into_iter()
            .filter(|r| JobStatus::from(r.get(COL_STATUS)) == JobStatus::New)
            .collect();
        info!("Found {} jobs to process", rows.len());
        rows.truncate(self.config.max_jobs_per_run);
        Ok(rows)
    }

    pub fn run(&mut self) -> Result<CustomizeSummary> {
        let jobs = self.pending_jobs()?;
        let mut summary = CustomizeSummary {
            candidates: jobs.len(),
            ..Default::default()
        };
        if jobs.is_empty() {
            info!("No jobs to process");
            return Ok(summary);
        }

        let resume_text = self.master_resume_text();
        for (i, job) in jobs.iter().enumerate() {
            if i > 0 {
                pause(self.config.job_delay);
            }
            match self.process_job(job, &resume_text) {
                Ok(JobOutcome::Processed { score, report }) => {
                    info!(
                        "Row {}: processed with match score {}%, documents in {}",
                        job.row,
                        score,
                        report.folder.display()
                    );
                    summary.processed += 1;
                    if report.cover_letter.ok {
                        summary.cover_letters += 1;
                    } else {
                        warn!(
                            "Row {}: no cover letter, {}",
                            job.row,
                            report.cover_letter.reason.as_deref().unwrap_or("unknown reason")
                        );
                    }
                }
                Ok(JobOutcome::Skipped(reason)) => {
                    warn!("Row {}: skipped, {}", job.row, reason);
                    summary.skipped += 1;
                }
                Err(e) => {
                    error!("Row {}: error processing job: {:#}", job.row, e);
                    summary.failed += 1;
                }
            }
        }

        info!(
            "Processed {} out of {} jobs, output folder: {}",
            summary.processed,
            summary.candidates,
            self.config.output_dir.display()
        );
        Ok(summary)
    }

    fn master_resume_text(&self) -> String {
        match fs::read_to_string(&self.config.master_resume) {
            Ok(text) => text,
            Err(e) => {
                warn!(
                    "Could not read {}, scoring against an empty resume: {}",
                    self.config.master_resume.display(),
                    e
                );
                String::new()
            }
        }
    }

    pub fn process_job(&mut self, job: &SheetRecord, resume_text: &str) -> Result<JobOutcome> {
        let job_id = non_blank(job.get(COL_JOB_ID)).unwrap_or("unknown");
        let title = non_blank(job.get(COL_TITLE)).unwrap_or("Unknown Title");
        let company = non_blank(job.get(COL_COMPANY)).unwrap_or("Unknown Company");
        let link = job.get(COL_LINK).trim();
        info!("Processing: {} at {}", title, company);

        let description = match non_blank(job.get(COL_DESCRIPTION)) {
            Some(text) => Some(text.to_string()),
            None => fetch_description(self.board, non_blank(job.get(COL_JOB_ID)), link),
        };
        let Some(description) = description
            .filter(|d| d.trim().chars().count() >= MIN_DESCRIPTION_CHARS)
        else {
            return Ok(JobOutcome::Skipped(SkipReason::NoDescription));
        };

        let analysis = JobAnalyzer::new(self.generator).analyze(title, company, &description);
        let score = match_score(&analysis, resume_text);
        info!("Match score: {}%", score);
        if score < self.config.min_match_score {
            return Ok(JobOutcome::Skipped(SkipReason::BelowThreshold {
                score,
                min: self.config.min_match_score,
            }));
        }

        let posting = Posting {
            job_id,
            title,
            company,
        };
        let report = DocumentEmitter::new(self.config, self.generator).emit(&posting, &analysis);
        let Some(resume_path) = report.resume.path.clone().filter(|_| report.resume.ok) else {
            let reason = report.resume.reason.clone().unwrap_or_default();
            return Ok(JobOutcome::Skipped(SkipReason::ResumeNotEmitted(reason)));
        };

        self.record_result(
            non_blank(job.get(COL_JOB_ID)),
            link,
            score,
            &resume_path.display().to_string(),
        )?;
        Ok(JobOutcome::Processed { score, report })
    }

    /// Marks the row `Resume Ready` and writes its score and resume path.
    fn record_result(
        &mut self,
        job_id: Option<&str>,
        link: &str,
        score: u32,
        resume_path: &str,
    ) -> Result<()> {
        let Some(row) = find_row(&*self.store, job_id, link)? else {
            warn!("Job {} is no longer in the sheet", job_id.unwrap_or(link));
            return Ok(());
        };
        let (header, _) = ensure_columns(self.store, &RESULT_COLUMNS)?;
        let col = |name: &str| header.iter().position(|h| h == name).map(|i| i + 1);

        let updates = [
            (COL_STATUS, JobStatus::ResumeReady.to_string()),
            (COL_MATCH_SCORE, format!("{}%", score)),
            (COL_RESUME_PATH, resume_path.to_string()),
        ];
        for (name, value) in updates {
            match col(name) {
                Some(c) => self.store.update_cell(row, c, &value)?,
                None => warn!("Sheet has no '{}' column", name),
            }
        }
        info!("Updated sheet row {}", row);
        Ok(())
    }
}

fn non_blank(s: &str) -> Option<&str> {
    let s = s.trim();
    (!s.is_empty()).then_some(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::tests::CannedGenerator;
    use crate::fetcher::tests::{ScriptedSource, card_html, test_config};
    use crate::models::JobRecord;
    use crate::sheet::{MemorySheet, StoreError};
    use crate::sync::sync_records;
    use std::path::Path;
    use std::time::Duration;

    const RESUME: &str = "Jane Doe, Senior Product Manager. SQL, Agile delivery. Owned the \
                          product roadmap, stakeholder management and user research.";

    fn description(extra: &str) -> String {
        format!(
            "Responsibilities: drive the product roadmap across checkout, partner with \
             engineering and design, and report on outcomes every quarter. {}",
            extra
        )
    }

    fn record(id: u64, title: &str, description: Option<String>) -> JobRecord {
        let mut record =
            crate::cards::extract_card(&card_html(id, title), "2026-10-19 09:00:00").unwrap();
        record.description = description;
        record
    }

    fn config(dir: &Path, resume: &str) -> CustomizeConfig {
        let master = dir.join("resume_master.md");
        fs::write(&master, resume).unwrap();
        CustomizeConfig {
            master_resume: master,
            output_dir: dir.join("out"),
            job_delay: Duration::ZERO,
            candidate_name: "Jane Doe".to_string(),
            ..CustomizeConfig::default()
        }
    }

    fn sheet_with(records: &[JobRecord]) -> MemorySheet {
        let mut sheet = MemorySheet::new();
        sync_records(&mut sheet, records).unwrap();
        sheet
    }

    #[test]
    fn test_processes_matching_job() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), RESUME);
        let mut sheet = sheet_with(&[record(
            1,
            "Product Manager",
            Some(description("SQL and Agile.")),
        )]);
        let board = JobBoard::new(ScriptedSource::new(vec![]), test_config());

        let summary = Customizer::new(&config, &board, &mut sheet, None).run().unwrap();
        assert_eq!(
            summary,
            CustomizeSummary {
                candidates: 1,
                processed: 1,
                cover_letters: 0,
                skipped: 0,
                failed: 0,
            }
        );

        let values = sheet.get_all_values().unwrap();
        assert_eq!(&values[0][9..], ["Match Score", "Resume Path"]);
        let row = &sheet.get_all_records().unwrap()[0];
        assert_eq!(row.get(COL_STATUS), "Resume Ready");
        assert_eq!(row.get(COL_MATCH_SCORE), "100%");
        let resume_path = row.get(COL_RESUME_PATH);
        assert!(resume_path.ends_with("Resume_JaneDoe_Acme1.md"));
        assert_eq!(fs::read_to_string(resume_path).unwrap(), RESUME);
        assert!(board.source().requests.borrow().is_empty());
    }

    #[test]
    fn test_low_score_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), "Junior designer. Figma.");
        let mut sheet = sheet_with(&[record(1, "Product Manager", Some(description("SQL.")))]);
        let board = JobBoard::new(ScriptedSource::new(vec![]), test_config());

        let mut customizer = Customizer::new(&config, &board, &mut sheet, None);
        let job = customizer.pending_jobs().unwrap().remove(0);
        let outcome = customizer.process_job(&job, "Junior designer. Figma.").unwrap();
        assert!(matches!(
            outcome,
            JobOutcome::Skipped(SkipReason::BelowThreshold { score: 0, min: 50 })
        ));

        let row = &sheet.get_all_records().unwrap()[0];
        assert_eq!(row.get(COL_STATUS), "New");
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_missing_description_is_fetched_or_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), RESUME);
        let fetched = description("We use SQL daily.");
        let mut sheet = sheet_with(&[
            record(1, "Product Manager", None),
            record(2, "Product Owner", Some("Too short".to_string())),
            record(3, "Product Lead", None),
        ]);
        let board = JobBoard::new(
            ScriptedSource::new(vec![
                ScriptedSource::ok(format!(
                    r#"<html><body><div class="show-more-less-html__markup">{}</div></body></html>"#,
                    fetched
                )),
                Ok(crate::fetcher::Page {
                    status: 404,
                    body: String::new(),
                }),
            ]),
            test_config(),
        );

        let summary = Customizer::new(&config, &board, &mut sheet, None).run().unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.skipped, 2);

        let rows = sheet.get_all_records().unwrap();
        assert_eq!(rows[0].get(COL_STATUS), "Resume Ready");
        assert_eq!(rows[1].get(COL_STATUS), "New");
        assert_eq!(rows[2].get(COL_STATUS), "New");

        let requests = board.source().requests.borrow();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].0.ends_with("/jobPosting/1"));
        assert!(requests[1].0.ends_with("/jobPosting/3"));
    }

    #[test]
    fn test_only_new_rows_up_to_cap() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path(), RESUME);
        config.max_jobs_per_run = 2;
        let mut done = record(1, "Product Manager", Some(description("SQL")));
        done.status = JobStatus::Other("Applied".to_string());
        let mut shouting = record(2, "Product Manager", Some(description("SQL")));
        shouting.status = JobStatus::Other("NEW".to_string());
        let mut sheet = sheet_with(&[
            done,
            shouting,
            record(3, "Product Manager", Some(description("SQL"))),
            record(4, "Product Manager", Some(description("SQL"))),
        ]);
        let board = JobBoard::new(ScriptedSource::new(vec![]), test_config());

        let customizer = Customizer::new(&config, &board, &mut sheet, None);
        let pending = customizer.pending_jobs().unwrap();
        let ids: Vec<_> = pending.iter().map(|r| r.get(COL_JOB_ID)).collect();
        assert_eq!(ids, ["2", "3"]);
    }

    #[test]
    fn test_writes_cover_letter_with_generator() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), RESUME);
        let mut sheet = sheet_with(&[record(7, "Product Manager", Some(description("")))]);
        let board = JobBoard::new(ScriptedSource::new(vec![]), test_config());
        let generator = CannedGenerator::new(vec![
            Ok(r#"{"required_skills": ["SQL"], "keywords": ["user research"],
                  "responsibilities": ["Own checkout"], "seniority": "Senior",
                  "domain": "E-commerce"}"#
                .to_string()),
            Ok("Dear team,\n\nI would love to help.".to_string()),
        ]);

        let mut customizer = Customizer::new(&config, &board, &mut sheet, Some(&generator));
        let job = customizer.pending_jobs().unwrap().remove(0);
        let outcome = customizer.process_job(&job, RESUME).unwrap();
        let JobOutcome::Processed { score, report } = outcome else {
            panic!("expected the job to be processed");
        };
        assert_eq!(score, 100);
        assert!(report.cover_letter.ok);
        assert!(report.folder.ends_with("7_Acme_7_Product_Manager"));
        assert!(generator.prompts.borrow()[1].contains("Domain: E-commerce"));
    }

    const ANALYSIS: &str = r#"{"required_skills": ["SQL"], "keywords": ["user research"],
        "responsibilities": ["Own checkout"], "seniority": "Senior", "domain": "Payments"}"#;

    #[test]
    fn test_run_counts_cover_letters() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), RESUME);
        let mut sheet = sheet_with(&[
            record(1, "Product Manager", Some(description("SQL and Agile."))),
            record(2, "Product Manager", Some(description("SQL and Agile."))),
        ]);
        let board = JobBoard::new(ScriptedSource::new(vec![]), test_config());
        let generator = CannedGenerator::new(vec![
            Ok(ANALYSIS.to_string()),
            Ok("Dear team,\n\nI would love to help.".to_string()),
            Ok(ANALYSIS.to_string()),
            Err(anyhow::anyhow!("rate limited")),
        ]);

        let summary = Customizer::new(&config, &board, &mut sheet, Some(&generator))
            .run()
            .unwrap();
        assert_eq!(
            summary,
            CustomizeSummary {
                candidates: 2,
                processed: 2,
                cover_letters: 1,
                skipped: 0,
                failed: 0,
            }
        );
    }

    /// Delegates to a `MemorySheet` but refuses to write one row.
    struct StuckRow {
        inner: MemorySheet,
        row: usize,
    }

    impl TableStore for StuckRow {
        fn get_all_values(&self) -> crate::sheet::Result<Vec<Vec<String>>> {
            self.inner.get_all_values()
        }

        fn append_rows(&mut self, rows: &[Vec<String>]) -> crate::sheet::Result<()> {
            self.inner.append_rows(rows)
        }

        fn update_cell(&mut self, row: usize, col: usize, value: &str) -> crate::sheet::Result<()> {
            if row == self.row {
                return Err(StoreError::OutOfRange { row, col });
            }
            self.inner.update_cell(row, col, value)
        }
    }

    #[test]
    fn test_one_failing_job_does_not_stop_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), RESUME);
        let mut sheet = StuckRow {
            inner: sheet_with(&[
                record(1, "Product Manager", Some(description("SQL"))),
                record(2, "Product Manager", Some(description("SQL"))),
            ]),
            row: 2,
        };
        let board = JobBoard::new(ScriptedSource::new(vec![]), test_config());

        let summary = Customizer::new(&config, &board, &mut sheet, None).run().unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.processed, 1);

        let rows = sheet.get_all_records().unwrap();
        assert_eq!(rows[0].get(COL_STATUS), "New");
        assert_eq!(rows[1].get(COL_STATUS), "Resume Ready");
    }
}
