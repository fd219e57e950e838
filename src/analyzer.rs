use anyhow::{Result, anyhow};
use tracing::{debug, info, warn};

use crate::ai::{GenerationRequest, TextGenerator};
use crate::models::JobAnalysis;

/// Skills looked for when no generator is available, in reporting order.
pub const FALLBACK_SKILLS: [&str; 5] = ["SQL", "Python", "A/B testing", "Agile", "data analysis"];
const FALLBACK_KEYWORDS: [&str; 3] = ["product roadmap", "stakeholder management", "user research"];
const FALLBACK_RESPONSIBILITIES: [&str; 2] = ["Product strategy", "Team leadership"];
const FALLBACK_SENIORITY: &str = "Senior";
const FALLBACK_DOMAIN: &str = "General";

/// Turns a posting into a [`JobAnalysis`]. Always produces one: anything that
/// goes wrong with the generator lands on the keyword heuristic.
pub struct JobAnalyzer<'a> {
    generator: Option<&'a dyn TextGenerator>,
}

impl<'a> JobAnalyzer<'a> {
    pub fn new(generator: Option<&'a dyn TextGenerator>) -> Self {
        Self { generator }
    }

    pub fn analyze(&self, title: &str, company: &str, description: &str) -> JobAnalysis {
        let Some(generator) = self.generator else {
            info!("No AI configured, using basic analysis");
            return fallback_analysis(description);
        };

        match self.analyze_with(generator, title, company, description) {
            Ok(analysis) => {
                info!(
                    "AI analysis complete: {} skills, {} keywords",
                    analysis.required_skills.len(),
                    analysis.keywords.len()
                );
                analysis
            }
            Err(e) => {
                warn!("AI analysis failed, using basic analysis: {}", e);
                fallback_analysis(description)
            }
        }
    }

    fn analyze_with(
        &self,
        generator: &dyn TextGenerator,
        title: &str,
        company: &str,
        description: &str,
    ) -> Result<JobAnalysis> {
        let request = GenerationRequest::new(analysis_prompt(title, company, description));
        let response = generator.generate(&request)?;
        debug!("Analysis response: {} chars", response.len());

        let json = extract_json_object(&response)
            .ok_or_else(|| anyhow!("no JSON object in response"))?;
        let analysis: JobAnalysis = serde_json::from_str(json)?;
        if !analysis.is_usable() {
            return Err(anyhow!("response has neither skills nor keywords"));
        }
        Ok(analysis)
    }
}

fn analysis_prompt(title: &str, company: &str, description: &str) -> String {
    format!(
        "Analyze this job posting and extract key information:\n\n\
        Job Title: {}\n\
        Company: {}\n\n\
        Job Description:\n{}\n\n\
        Please provide:\n\
        1. Top 5 required skills (be specific)\n\
        2. Top 5 keywords to include in resume\n\
        3. Key responsibilities\n\
        4. Seniority level (Junior/Mid/Senior/Principal)\n\
        5. Domain focus (e.g., B2B SaaS, Fintech, AI/ML, etc.)\n\n\
        Format as JSON:\n\
        {{\n  \"required_skills\": [\"skill1\", \"skill2\"],\n  \
        \"keywords\": [\"keyword1\", \"keyword2\"],\n  \
        \"responsibilities\": [\"resp1\", \"resp2\"],\n  \
        \"seniority\": \"Senior\",\n  \
        \"domain\": \"B2B SaaS\"\n}}",
        title, company, description
    )
}

/// Span from the first `{` to the last `}`, if both exist in that order.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Vocabulary hits in vocabulary order, plus fixed placeholders.
pub fn fallback_analysis(description: &str) -> JobAnalysis {
    let description_lower = description.to_lowercase();
    let mut skills: Vec<String> = FALLBACK_SKILLS
        .iter()
        .filter(|skill| description_lower.contains(&skill.to_lowercase()))
        .map(|s| s.to_string())
        .collect();
    if skills.is_empty() {
        skills = FALLBACK_SKILLS[..3].iter().map(|s| s.to_string()).collect();
    }

    JobAnalysis {
        required_skills: skills,
        keywords: FALLBACK_KEYWORDS.iter().map(|s| s.to_string()).collect(),
        responsibilities: FALLBACK_RESPONSIBILITIES
            .iter()
            .map(|s| s.to_string())
            .collect(),
        seniority: FALLBACK_SENIORITY.to_string(),
        domain: FALLBACK_DOMAIN.to_string(),
    }
}
