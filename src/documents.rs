use anyhow::{Context, Result, anyhow};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::ai::{GenerationRequest, TextGenerator};
use crate::config::CustomizeConfig;
use crate::models::JobAnalysis;

const TITLE_CHARS: usize = 20;
const LETTER_WIDTH: usize = 80;

/// Result of writing one artifact. `reason` is set whenever `ok` is false.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emitted {
    pub ok: bool,
    pub path: Option<PathBuf>,
    pub reason: Option<String>,
}

impl Emitted {
    fn written(path: PathBuf) -> Self {
        Self {
            ok: true,
            path: Some(path),
            reason: None,
        }
    }

    fn failed(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            path: None,
            reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmitReport {
    pub folder: PathBuf,
    pub resume: Emitted,
    pub cover_letter: Emitted,
}

/// The listing a set of documents is written for.
#[derive(Debug, Clone, Copy)]
pub struct Posting<'a> {
    pub job_id: &'a str,
    pub title: &'a str,
    pub company: &'a str,
}

/// Drops characters that are not allowed in file names on common platforms.
pub fn sanitize(s: &str) -> String {
    s.chars()
        .filter(|c| {
            !c.is_control()
                && !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*')
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// `{id}_{company}_{title}` with spaces as underscores and the title cut to 20
/// characters.
pub fn job_folder_name(job_id: &str, company: &str, title: &str) -> String {
    let title: String = sanitize(title)
        .replace(' ', "_")
        .chars()
        .take(TITLE_CHARS)
        .collect();
    format!(
        "{}_{}_{}",
        sanitize(job_id),
        sanitize(company).replace(' ', "_"),
        title
    )
}

fn compact(s: &str) -> String {
    sanitize(s).replace(' ', "")
}

pub struct DocumentEmitter<'a> {
    config: &'a CustomizeConfig,
    generator: Option<&'a dyn TextGenerator>,
}

impl<'a> DocumentEmitter<'a> {
    pub fn new(config: &'a CustomizeConfig, generator: Option<&'a dyn TextGenerator>) -> Self {
        Self { config, generator }
    }

    pub fn job_folder(&self, posting: &Posting<'_>) -> PathBuf {
        self.config.output_dir.join(job_folder_name(
            posting.job_id,
            posting.company,
            posting.title,
        ))
    }

    /// Writes the resume and cover letter for one job. Never fails; each
    /// artifact reports its own outcome.
    pub fn emit(&self, posting: &Posting<'_>, analysis: &JobAnalysis) -> EmitReport {
        let folder = self.job_folder(posting);
        if let Err(e) = fs::create_dir_all(&folder) {
            error!("Could not create {}: {}", folder.display(), e);
            let reason = format!("output folder unavailable: {}", e);
            return EmitReport {
                folder,
                resume: Emitted::failed(reason.clone()),
                cover_letter: Emitted::failed(reason),
            };
        }

        let resume = match self.write_resume(&folder, posting) {
            Ok(path) => {
                info!("Saved resume to {}", path.display());
                Emitted::written(path)
            }
            Err(e) => {
                error!("Error creating resume: {:#}", e);
                Emitted::failed(format!("{:#}", e))
            }
        };

        let cover_letter = match self.generator {
            None => {
                warn!("Skipping cover letter (no AI)");
                Emitted::failed("no text generator configured")
            }
            Some(generator) => {
                match self.write_cover_letter(generator, &folder, posting, analysis) {
                    Ok(path) => {
                        info!("Cover letter saved to {}", path.display());
                        Emitted::written(path)
                    }
                    Err(e) => {
                        error!("Error generating cover letter: {:#}", e);
                        Emitted::failed(format!("{:#}", e))
                    }
                }
            }
        };

        EmitReport {
            folder,
            resume,
            cover_letter,
        }
    }

    // Content customization is not done yet: the artifact is the master file.
    fn write_resume(&self, folder: &Path, posting: &Posting<'_>) -> Result<PathBuf> {
        let master = &self.config.master_resume;
        let ext = master
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("md");
        let path = folder.join(format!(
            "Resume_{}_{}.{}",
            compact(&self.config.candidate_name),
            compact(posting.company),
            ext
        ));
        fs::copy(master, &path)
            .with_context(|| format!("Failed to copy {}", master.display()))?;
        Ok(path)
    }

    fn write_cover_letter(
        &self,
        generator: &dyn TextGenerator,
        folder: &Path,
        posting: &Posting<'_>,
        analysis: &JobAnalysis,
    ) -> Result<PathBuf> {
        let request = GenerationRequest::new(self.cover_letter_prompt(posting, analysis))
            .temperature(0.8);
        let body = generator.generate(&request)?;
        if body.trim().is_empty() {
            return Err(anyhow!("generator returned an empty letter"));
        }

        let date = chrono::Local::now().format("%B %d, %Y").to_string();
        let letter = render_cover_letter(
            &date,
            posting.company,
            posting.title,
            &body,
            &self.config.candidate_name,
        );
        let path = folder.join(format!("CoverLetter_{}.md", compact(posting.company)));
        fs::write(&path, letter)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    fn cover_letter_prompt(&self, posting: &Posting<'_>, analysis: &JobAnalysis) -> String {
        format!(
            "Write a professional cover letter for this job:\n\n\
            Job Title: {}\n\
            Company: {}\n\
            Required Skills: {}\n\
            Domain: {}\n\n\
            The candidate is {}, {}.\n\n\
            Write a compelling 3-paragraph cover letter that:\n\
            1. Opens with enthusiasm for the role\n\
            2. Highlights relevant experience and skills\n\
            3. Closes with interest in discussing further\n\n\
            Keep it professional but warm. Max 250 words. \
            Separate paragraphs with a blank line and do not add a greeting or signature.",
            posting.title,
            posting.company,
            analysis.required_skills.join(", "),
            analysis.domain,
            self.config.candidate_name,
            self.config.candidate_summary
        )
    }
}

/// Fixed header, the generated paragraphs wrapped to a readable width, then
/// the signature.
pub fn render_cover_letter(
    date: &str,
    company: &str,
    title: &str,
    body: &str,
    name: &str,
) -> String {
    let mut letter = String::new();
    letter.push_str(&format!("Date: {}\n\n", date));
    letter.push_str(&format!("To: Hiring Manager\n{}\n\n", company));
    letter.push_str(&format!("Re: Application for {}\n\n", title));

    for paragraph in body.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        letter.push_str(&textwrap::fill(paragraph, LETTER_WIDTH));
        letter.push_str("\n\n");
    }

    letter.push_str(&format!("Sincerely,\n{}\n", name));
    letter
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::tests::CannedGenerator;
    use crate::analyzer::fallback_analysis;

    const POSTING: Posting<'static> = Posting {
        job_id: "4354633276",
        title: "Senior Product Manager, Payments",
        company: "Acme Corp",
    };

    fn setup(dir: &Path) -> CustomizeConfig {
        let master = dir.join("resume_master.md");
        fs::write(&master, "# Jane Doe\nSenior Product Manager").unwrap();
        CustomizeConfig {
            master_resume: master,
            output_dir: dir.join("out"),
            candidate_name: "Jane Doe".to_string(),
            ..CustomizeConfig::default()
        }
    }

    #[test]
    fn test_job_folder_name() {
        assert_eq!(
            job_folder_name("4354633276", "Acme Corp", "Senior Product Manager, Payments"),
            "4354633276_Acme_Corp_Senior_Product_Manag"
        );
        assert_eq!(job_folder_name("1", "A/B: Co?", "PM"), "1_AB_Co_PM");
    }

    #[test]
    fn test_emit_without_generator_copies_resume_only() {
        let dir = tempfile::tempdir().unwrap();
        let config = setup(dir.path());
        let emitter = DocumentEmitter::new(&config, None);

        let report = emitter.emit(&POSTING, &fallback_analysis(""));
        assert!(report.resume.ok);
        assert!(!report.cover_letter.ok);
        assert!(report.cover_letter.reason.is_some());

        let resume = report.resume.path.unwrap();
        assert_eq!(resume.file_name().unwrap(), "Resume_JaneDoe_AcmeCorp.md");
        assert_eq!(resume.parent().unwrap(), report.folder);
        assert_eq!(
            fs::read_to_string(resume).unwrap(),
            "# Jane Doe\nSenior Product Manager"
        );
    }

    #[test]
    fn test_emit_with_generator_writes_letter() {
        let dir = tempfile::tempdir().unwrap();
        let config = setup(dir.path());
        let generator = CannedGenerator::replying(
            "I am excited to apply.\n\nI shipped payments products.\n\nLet's talk.",
        );
        let emitter = DocumentEmitter::new(&config, Some(&generator));

        let report = emitter.emit(&POSTING, &fallback_analysis("SQL"));
        assert!(report.resume.ok);
        assert!(report.cover_letter.ok);

        let letter_path = report.cover_letter.path.unwrap();
        assert_eq!(letter_path.file_name().unwrap(), "CoverLetter_AcmeCorp.md");
        let letter = fs::read_to_string(letter_path).unwrap();
        assert!(letter.starts_with("Date: "));
        assert!(letter.contains("To: Hiring Manager\nAcme Corp\n"));
        assert!(letter.contains("Re: Application for Senior Product Manager, Payments"));
        assert!(letter.contains("I shipped payments products.\n\nLet's talk."));
        assert!(letter.ends_with("Sincerely,\nJane Doe\n"));

        let prompts = generator.prompts.borrow();
        assert!(prompts[0].contains("Required Skills: SQL"));
        assert!(prompts[0].contains("The candidate is Jane Doe"));
    }

    #[test]
    fn test_failures_are_reported_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = setup(dir.path());
        config.master_resume = dir.path().join("missing.md");
        let generator = CannedGenerator::new(vec![Err(anyhow!("rate limited"))]);
        let emitter = DocumentEmitter::new(&config, Some(&generator));

        let report = emitter.emit(&POSTING, &fallback_analysis(""));
        assert!(!report.resume.ok);
        assert!(report.resume.reason.unwrap().contains("missing.md"));
        assert!(!report.cover_letter.ok);
        assert!(report.cover_letter.reason.unwrap().contains("rate limited"));
    }

    #[test]
    fn test_render_wraps_long_paragraphs() {
        let body = "word ".repeat(60);
        let letter = render_cover_letter("October 19, 2026", "Acme", "PM", &body, "Jane");
        assert!(letter.lines().all(|line| line.chars().count() <= LETTER_WIDTH));
        assert!(letter.starts_with(
            "Date: October 19, 2026\n\nTo: Hiring Manager\nAcme\n\nRe: Application for PM\n\n"
        ));
    }
}
