use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::QualificationCriteria;
use crate::extractor::JobRecord;

const SALARY_MARKERS: &[&str] = &["salary", "compensation", "pay range", "€", "$"];
const SPONSORSHIP_MARKERS: &[&str] = &[
    "visa sponsorship",
    "sponsorship",
    "work permit",
    "relocation",
];

const HYBRID_MARKERS: &[&str] = &["hybrid"];
const ON_SITE_MARKERS: &[&str] = &["on-site", "on site", "office"];
const REMOTE_MARKERS: &[&str] = &["remote", "work from home"];

/// Where the work happens, as declared by the posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkArrangement {
    Remote,
    Hybrid,
    OnSite,
    Unknown,
}

impl WorkArrangement {
    pub fn label(&self) -> &'static str {
        match self {
            WorkArrangement::Remote => "remote",
            WorkArrangement::Hybrid => "hybrid",
            WorkArrangement::OnSite => "on-site",
            WorkArrangement::Unknown => "unknown",
        }
    }

    /// LinkedIn `f_WT` filter code; `Unknown` cannot be filtered on.
    pub fn filter_code(&self) -> Option<&'static str> {
        match self {
            WorkArrangement::OnSite => Some("1"),
            WorkArrangement::Remote => Some("2"),
            WorkArrangement::Hybrid => Some("3"),
            WorkArrangement::Unknown => None,
        }
    }
}

/// Read-only annotations attached to a [`JobRecord`] after scoring.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualificationVerdict {
    pub english_score: f64,
    pub english_qualified: bool,
    pub work_arrangement: WorkArrangement,
    pub matched_skills: Vec<String>,
    pub missing_skills: Vec<String>,
    pub skill_match_ratio: f64,
    pub salary_mentioned: bool,
    pub sponsorship_mentioned: bool,
    pub qualified: bool,
    pub rejection_reason: String,
}

/// Scores descriptions against the configured criteria. All keyword matchers
/// are compiled once up front; `qualify` itself is pure.
pub struct Qualifier {
    criteria: QualificationCriteria,
    english_matchers: Vec<Regex>,
    skill_matchers: Vec<(String, Regex)>,
}

impl Qualifier {
    pub fn new(criteria: QualificationCriteria) -> Self {
        let english_matchers = criteria.english_keywords.iter().map(|k| whole_word(k)).collect();
        let skill_matchers = criteria
            .required_skills
            .iter()
            .map(|s| (s.clone(), whole_word(s)))
            .collect();
        Qualifier {
            criteria,
            english_matchers,
            skill_matchers,
        }
    }

    /// Deterministic for identical inputs; no side effects.
    pub fn qualify(&self, record: &JobRecord) -> QualificationVerdict {
        let text = normalize(&record.description);
        let arrangement_text = format!("{} {}", text, record.location.to_lowercase());
        let work_arrangement = classify_arrangement(&arrangement_text);

        if text.is_empty() {
            return QualificationVerdict {
                english_score: 0.0,
                english_qualified: false,
                work_arrangement,
                matched_skills: Vec::new(),
                missing_skills: self.criteria.required_skills.clone(),
                skill_match_ratio: 0.0,
                salary_mentioned: false,
                sponsorship_mentioned: false,
                qualified: false,
                rejection_reason: "no description available".to_string(),
            };
        }

        let english_score = self.english_score(&text);
        let english_qualified = english_score >= self.criteria.min_english_score;

        // English gate short-circuits skill scoring but still reports the score.
        if self.criteria.english_only && !english_qualified {
            return QualificationVerdict {
                english_score,
                english_qualified,
                work_arrangement,
                matched_skills: Vec::new(),
                missing_skills: self.criteria.required_skills.clone(),
                skill_match_ratio: 0.0,
                salary_mentioned: false,
                sponsorship_mentioned: false,
                qualified: false,
                rejection_reason: "not English description".to_string(),
            };
        }

        let (matched_skills, missing_skills) = self.partition_skills(&text);
        let skill_match_ratio = if self.skill_matchers.is_empty() {
            1.0
        } else {
            matched_skills.len() as f64 / self.skill_matchers.len() as f64
        };
        let salary_mentioned = SALARY_MARKERS.iter().any(|m| text.contains(m));
        let sponsorship_mentioned = SPONSORSHIP_MARKERS.iter().any(|m| text.contains(m));

        let mut reasons = Vec::new();
        if !english_qualified {
            reasons.push("not English description".to_string());
        }
        if skill_match_ratio < self.criteria.min_skill_match_ratio {
            reasons.push(format!(
                "skill match {:.2} below required {:.2}",
                skill_match_ratio, self.criteria.min_skill_match_ratio
            ));
        }
        if self.criteria.require_salary_mention && !salary_mentioned {
            reasons.push("no salary information".to_string());
        }
        if self.criteria.require_sponsorship_mention && !sponsorship_mentioned {
            reasons.push("no sponsorship mention".to_string());
        }

        let qualified = reasons.is_empty();
        QualificationVerdict {
            english_score,
            english_qualified,
            work_arrangement,
            matched_skills,
            missing_skills,
            skill_match_ratio,
            salary_mentioned,
            sponsorship_mentioned,
            qualified,
            rejection_reason: if qualified {
                "Qualified".to_string()
            } else {
                reasons.join("; ")
            },
        }
    }

    fn english_score(&self, text: &str) -> f64 {
        if self.english_matchers.is_empty() {
            return 0.0;
        }
        let matches = self
            .english_matchers
            .iter()
            .filter(|re| re.is_match(text))
            .count();
        matches as f64 / self.english_matchers.len() as f64
    }

    fn partition_skills(&self, text: &str) -> (Vec<String>, Vec<String>) {
        let mut matched = Vec::new();
        let mut missing = Vec::new();
        for (skill, matcher) in &self.skill_matchers {
            if matcher.is_match(text) {
                matched.push(skill.clone());
            } else {
                missing.push(skill.clone());
            }
        }
        (matched, missing)
    }
}

fn whole_word(word: &str) -> Regex {
    Regex::new(&format!(r"\b{}\b", regex::escape(&word.to_lowercase()))).unwrap()
}

/// Lowercases and strips any markup so keyword matching sees plain prose.
fn normalize(description: &str) -> String {
    let trimmed = description.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    if trimmed.contains('<') {
        let fragment = scraper::Html::parse_fragment(trimmed);
        let text = fragment.root_element().text().collect::<Vec<_>>().join(" ");
        text.split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    } else {
        trimmed.to_lowercase()
    }
}

/// Fixed precedence: hybrid beats on-site beats remote. A posting saying
/// "remote-friendly but hybrid preferred" classifies as hybrid.
fn classify_arrangement(text: &str) -> WorkArrangement {
    if HYBRID_MARKERS.iter().any(|m| text.contains(m)) {
        WorkArrangement::Hybrid
    } else if ON_SITE_MARKERS.iter().any(|m| text.contains(m)) {
        WorkArrangement::OnSite
    } else if REMOTE_MARKERS.iter().any(|m| text.contains(m)) {
        WorkArrangement::Remote
    } else {
        WorkArrangement::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(description: &str, location: &str) -> JobRecord {
        JobRecord {
            title: "Backend Engineer".to_string(),
            company: "TechCorp".to_string(),
            location: location.to_string(),
            description: description.to_string(),
            url: "https://jobs.example/view/1".to_string(),
            captured_at: "2026-01-01 12:00:00".to_string(),
        }
    }

    fn criteria_with_keywords(keywords: &[&str], min_score: f64) -> QualificationCriteria {
        QualificationCriteria {
            english_keywords: keywords.iter().map(|s| s.to_string()).collect(),
            min_english_score: min_score,
            ..QualificationCriteria::default()
        }
    }

    #[test]
    fn test_qualify_is_deterministic() {
        let qualifier = Qualifier::new(QualificationCriteria::default());
        let rec = record("We value experience, skills and team development.", "Berlin");
        assert_eq!(qualifier.qualify(&rec), qualifier.qualify(&rec));
    }

    #[test]
    fn test_empty_description_is_rejected() {
        let qualifier = Qualifier::new(QualificationCriteria::default());
        let verdict = qualifier.qualify(&record("", "Berlin"));
        assert_eq!(verdict.english_score, 0.0);
        assert!(!verdict.qualified);
        assert!(verdict.rejection_reason.contains("no description"));
    }

    #[test]
    fn test_english_threshold_boundary() {
        let keywords = [
            "alpha", "bravo", "charlie", "delta", "echo", "foxtrot", "golf", "hotel", "india",
        ];
        let qualifier = Qualifier::new(criteria_with_keywords(&keywords, 0.7));

        // 6 of 9 distinct keywords: 0.67, below the 0.7 threshold.
        let six = qualifier.qualify(&record("alpha bravo charlie delta echo foxtrot", ""));
        assert!(!six.english_qualified);
        assert!((six.english_score - 6.0 / 9.0).abs() < 1e-9);

        // 7 of 9: 0.78, above.
        let seven = qualifier.qualify(&record("alpha bravo charlie delta echo foxtrot golf", ""));
        assert!(seven.english_qualified);
        assert!((seven.english_score - 7.0 / 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_keywords_match_whole_words_only() {
        let qualifier = Qualifier::new(criteria_with_keywords(&["team"], 0.5));
        let verdict = qualifier.qualify(&record("teamwork makes the steam work", ""));
        assert_eq!(verdict.english_score, 0.0);
    }

    #[test]
    fn test_arrangement_precedence() {
        assert_eq!(
            classify_arrangement("remote possible but hybrid preferred"),
            WorkArrangement::Hybrid
        );
        assert_eq!(classify_arrangement("work from our office"), WorkArrangement::OnSite);
        assert_eq!(classify_arrangement("fully remote role"), WorkArrangement::Remote);
        assert_eq!(classify_arrangement("great benefits"), WorkArrangement::Unknown);
    }

    #[test]
    fn test_arrangement_uses_location_when_description_is_empty() {
        let qualifier = Qualifier::new(QualificationCriteria::default());
        let verdict = qualifier.qualify(&record("", "Berlin (Hybrid)"));
        assert_eq!(verdict.work_arrangement, WorkArrangement::Hybrid);
    }

    #[test]
    fn test_skill_partition_and_ratio_gate() {
        let criteria = QualificationCriteria {
            english_only: false,
            required_skills: vec!["python".to_string(), "django".to_string(), "aws".to_string()],
            min_skill_match_ratio: 0.5,
            ..QualificationCriteria::default()
        };
        let qualifier = Qualifier::new(criteria);
        let verdict = qualifier.qualify(&record("strong python background required", ""));
        assert_eq!(verdict.matched_skills, vec!["python"]);
        assert_eq!(verdict.missing_skills, vec!["django", "aws"]);
        assert!((verdict.skill_match_ratio - 1.0 / 3.0).abs() < 1e-9);
        assert!(!verdict.qualified);
        assert!(verdict.rejection_reason.contains("skill match"));
    }

    #[test]
    fn test_english_short_circuit_skips_skill_scoring() {
        let criteria = QualificationCriteria {
            required_skills: vec!["python".to_string()],
            ..QualificationCriteria::default()
        };
        let qualifier = Qualifier::new(criteria);
        // German-ish text with python present: the skill must not be counted.
        let verdict = qualifier.qualify(&record("wir suchen python entwickler", ""));
        assert!(!verdict.english_qualified);
        assert_eq!(verdict.rejection_reason, "not English description");
        assert!(verdict.matched_skills.is_empty());
    }

    #[test]
    fn test_salary_gate() {
        let criteria = QualificationCriteria {
            english_only: false,
            require_salary_mention: true,
            min_english_score: 0.0,
            ..QualificationCriteria::default()
        };
        let qualifier = Qualifier::new(criteria);

        let without = qualifier.qualify(&record("experience with skills and team", ""));
        assert!(!without.qualified);
        assert!(without.rejection_reason.contains("no salary information"));

        let with = qualifier.qualify(&record("experience with skills, salary range listed", ""));
        assert!(with.salary_mentioned);
    }

    #[test]
    fn test_markup_is_stripped_before_matching() {
        let qualifier = Qualifier::new(criteria_with_keywords(&["experience", "python"], 0.5));
        let verdict =
            qualifier.qualify(&record("<p>Solid <b>experience</b> with <i>Python</i></p>", ""));
        assert_eq!(verdict.english_score, 1.0);
    }

    #[test]
    fn test_no_required_skills_means_full_ratio() {
        let criteria = QualificationCriteria {
            english_only: false,
            min_english_score: 0.0,
            ..QualificationCriteria::default()
        };
        let qualifier = Qualifier::new(criteria);
        let verdict = qualifier.qualify(&record("any description at all", ""));
        assert_eq!(verdict.skill_match_ratio, 1.0);
        assert!(verdict.qualified);
        assert_eq!(verdict.rejection_reason, "Qualified");
    }
}
