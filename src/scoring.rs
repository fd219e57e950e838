use crate::models::JobAnalysis;

const SKILLS_WEIGHT: f64 = 40.0;
const KEYWORDS_WEIGHT: f64 = 30.0;
const SENIORITY_POINTS: f64 = 30.0;

/// How well the master resume covers a job, 0..=100.
///
/// Skills and keywords score by the fraction found in the resume, seniority
/// is all or nothing. Matching is case-insensitive substring containment and
/// the sum is truncated, not rounded.
pub fn match_score(analysis: &JobAnalysis, resume_text: &str) -> u32 {
    let resume_lower = resume_text.to_lowercase();

    let score = SKILLS_WEIGHT * coverage(&analysis.required_skills, &resume_lower)
        + KEYWORDS_WEIGHT * coverage(&analysis.keywords, &resume_lower)
        + if contains_term(&resume_lower, &analysis.seniority) {
            SENIORITY_POINTS
        } else {
            0.0
        };

    (score as u32).min(100)
}

fn coverage(terms: &[String], resume_lower: &str) -> f64 {
    if terms.is_empty() {
        return 0.0;
    }
    let found = terms
        .iter()
        .filter(|term| contains_term(resume_lower, term))
        .count();
    found as f64 / terms.len() as f64
}

// A blank term would be "found" in any text.
fn contains_term(resume_lower: &str, term: &str) -> bool {
    let term = term.trim();
    !term.is_empty() && resume_lower.contains(&term.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis(skills: &[&str], keywords: &[&str], seniority: &str) -> JobAnalysis {
        JobAnalysis {
            required_skills: skills.iter().map(|s| s.to_string()).collect(),
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            responsibilities: Vec::new(),
            seniority: seniority.to_string(),
            domain: "General".to_string(),
        }
    }

    const RESUME: &str = "Senior Product Manager. SQL, Python. Owned the product roadmap \
                          and user research for a B2B SaaS platform.";

    #[test]
    fn test_full_match_is_100() {
        let a = analysis(&["sql", "PYTHON"], &["product roadmap"], "senior");
        assert_eq!(match_score(&a, RESUME), 100);
    }

    #[test]
    fn test_partial_match_truncates() {
        // 40 * 2/3 = 26.67, 30 * 2/3 = 20, seniority 30
        let a = analysis(
            &["SQL", "Python", "Tableau"],
            &["product roadmap", "user research", "stakeholder management"],
            "Senior",
        );
        assert_eq!(match_score(&a, RESUME), 76);
    }

    #[test]
    fn test_empty_lists_contribute_nothing() {
        let a = analysis(&[], &[], "Senior");
        assert_eq!(match_score(&a, RESUME), 30);
        let a = analysis(&[], &["product roadmap"], "");
        assert_eq!(match_score(&a, RESUME), 30);
    }

    #[test]
    fn test_seniority_is_all_or_nothing() {
        let a = analysis(&["SQL"], &["user research"], "Principal");
        assert_eq!(match_score(&a, RESUME), 70);
    }

    #[test]
    fn test_blank_terms_never_match() {
        let a = analysis(&["", "  "], &[""], "  ");
        assert_eq!(match_score(&a, RESUME), 0);
        assert_eq!(match_score(&analysis(&["SQL"], &[], "Senior"), ""), 0);
    }

    #[test]
    fn test_score_bounds() {
        let cases = [
            analysis(&["SQL"], &["x"], "Senior"),
            analysis(&["a", "b", "c", "d", "e", "f", "g"], &[], "Junior"),
            analysis(&["SQL"; 3], &["roadmap"; 4], "senior product manager"),
        ];
        for a in &cases {
            let score = match_score(a, RESUME);
            assert!(score <= 100, "{:?} scored {}", a, score);
        }
    }
}
