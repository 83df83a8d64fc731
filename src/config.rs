use std::fs::File;
use std::io::Read;
use std::path::Path;

use log::{error, info};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::qualifier::WorkArrangement;

const LINKEDIN_JOBS_URL: &str = "https://www.linkedin.com/jobs/search/";

/// Default keyword set used to recognise English job descriptions.
const ENGLISH_KEYWORDS: &[&str] = &[
    "experience",
    "skills",
    "development",
    "team",
    "project",
    "requirements",
    "responsibilities",
    "software",
    "engineering",
    "design",
    "implementation",
    "analysis",
    "management",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub search: SearchQuery,
    pub safety: SafetyBudget,
    pub criteria: QualificationCriteria,
    pub browser: BrowserOptions,
    /// Optional CSV/XLSX file holding one search query per row.
    pub queries_file: Option<String>,
    pub output_dir: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            search: SearchQuery::default(),
            safety: SafetyBudget::default(),
            criteria: QualificationCriteria::default(),
            browser: BrowserOptions::default(),
            queries_file: None,
            output_dir: "outputs".to_string(),
        }
    }
}

impl Settings {
    /// Loads settings from a JSON file, falling back to defaults when the
    /// file is absent or unreadable.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            info!("No settings file at {:?}. Using defaults.", path);
            return Settings::default();
        }
        let mut content = String::new();
        match File::open(path).and_then(|mut f| f.read_to_string(&mut content)) {
            Ok(_) => {}
            Err(e) => {
                error!("Failed to read settings file {:?}: {}. Using defaults.", path, e);
                return Settings::default();
            }
        }
        match serde_json::from_str::<Settings>(&content) {
            Ok(settings) => {
                info!("Loaded settings from {:?}", path);
                settings
            }
            Err(e) => {
                error!("Failed to parse settings file {:?}: {}. Using defaults.", path, e);
                Settings::default()
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchQuery {
    pub keywords: String,
    pub location: String,
    pub recency: PostingRecency,
    /// Empty set means "do not filter by arrangement".
    pub work_arrangements: Vec<WorkArrangement>,
    pub employment_type: Option<EmploymentType>,
    pub experience_level: Option<ExperienceLevel>,
}

impl Default for SearchQuery {
    fn default() -> Self {
        SearchQuery {
            keywords: "software engineer".to_string(),
            location: "United States".to_string(),
            recency: PostingRecency::PastDay,
            work_arrangements: vec![WorkArrangement::Remote],
            employment_type: Some(EmploymentType::FullTime),
            experience_level: None,
        }
    }
}

impl SearchQuery {
    /// Renders the LinkedIn job-search URL for this query.
    pub fn to_url(&self) -> String {
        let mut url = Url::parse(LINKEDIN_JOBS_URL).unwrap();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("keywords", &self.keywords);
            pairs.append_pair("location", &self.location);
            if let Some(code) = self.recency.param() {
                pairs.append_pair("f_TPR", code);
            }
            let arrangement_codes: Vec<&str> = self
                .work_arrangements
                .iter()
                .filter_map(|w| w.filter_code())
                .collect();
            if !arrangement_codes.is_empty() {
                pairs.append_pair("f_WT", &arrangement_codes.join(","));
            }
            if let Some(jt) = &self.employment_type {
                pairs.append_pair("f_JT", jt.code());
            }
            if let Some(level) = &self.experience_level {
                pairs.append_pair("f_E", level.code());
            }
        }
        url.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PostingRecency {
    PastDay,
    PastWeek,
    PastMonth,
    Any,
}

impl PostingRecency {
    /// LinkedIn `f_TPR` values are seconds since posting.
    pub fn param(&self) -> Option<&'static str> {
        match self {
            PostingRecency::PastDay => Some("r86400"),
            PostingRecency::PastWeek => Some("r604800"),
            PostingRecency::PastMonth => Some("r2592000"),
            PostingRecency::Any => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmploymentType {
    FullTime,
    PartTime,
    Contract,
    Temporary,
    Internship,
}

impl EmploymentType {
    pub fn code(&self) -> &'static str {
        match self {
            EmploymentType::FullTime => "F",
            EmploymentType::PartTime => "P",
            EmploymentType::Contract => "C",
            EmploymentType::Temporary => "T",
            EmploymentType::Internship => "I",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExperienceLevel {
    Internship,
    EntryLevel,
    Associate,
    MidSenior,
    Director,
    Executive,
}

impl ExperienceLevel {
    pub fn code(&self) -> &'static str {
        match self {
            ExperienceLevel::Internship => "1",
            ExperienceLevel::EntryLevel => "2",
            ExperienceLevel::Associate => "3",
            ExperienceLevel::MidSenior => "4",
            ExperienceLevel::Director => "5",
            ExperienceLevel::Executive => "6",
        }
    }
}

/// Hard limits that keep one session's request cadence inside safe bounds.
/// All delay bounds are seconds, drawn uniformly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyBudget {
    pub max_jobs_per_session: usize,
    pub delay_between_jobs: (f64, f64),
    pub short_pause: (f64, f64),
    pub detail_settle: (f64, f64),
    pub initial_settle: (f64, f64),
    pub error_backoff: (f64, f64),
    /// Take a longer break after every N processed jobs.
    pub break_after: usize,
    pub break_duration: (f64, f64),
    pub max_sessions_per_day: u32,
    pub min_session_interval_secs: u64,
}

impl Default for SafetyBudget {
    fn default() -> Self {
        SafetyBudget {
            max_jobs_per_session: 20,
            delay_between_jobs: (3.0, 6.0),
            short_pause: (1.0, 3.0),
            detail_settle: (3.0, 5.0),
            initial_settle: (5.0, 8.0),
            error_backoff: (5.0, 8.0),
            break_after: 10,
            break_duration: (45.0, 90.0),
            max_sessions_per_day: 3,
            min_session_interval_secs: 4 * 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualificationCriteria {
    pub english_only: bool,
    pub min_english_score: f64,
    pub english_keywords: Vec<String>,
    pub required_skills: Vec<String>,
    pub min_skill_match_ratio: f64,
    pub require_salary_mention: bool,
    pub require_sponsorship_mention: bool,
}

impl Default for QualificationCriteria {
    fn default() -> Self {
        QualificationCriteria {
            english_only: true,
            min_english_score: 0.7,
            english_keywords: ENGLISH_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            required_skills: Vec::new(),
            min_skill_match_ratio: 0.5,
            require_salary_mention: false,
            require_sponsorship_mention: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserOptions {
    pub headless: bool,
    /// Bounded wait for the result list to render.
    pub wait_timeout_secs: u64,
    /// Bounded wait for a listing's detail view to render.
    pub detail_timeout_secs: u64,
    pub window_size: (u32, u32),
    pub user_agent: String,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        BrowserOptions {
            headless: false,
            wait_timeout_secs: 25,
            detail_timeout_secs: 10,
            window_size: (1280, 900),
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_query_url() {
        let query = SearchQuery::default();
        let url = query.to_url();
        assert!(url.starts_with("https://www.linkedin.com/jobs/search/?"));
        assert!(url.contains("keywords=software+engineer"));
        assert!(url.contains("f_TPR=r86400"));
        assert!(url.contains("f_WT=2"));
        assert!(url.contains("f_JT=F"));
    }

    #[test]
    fn test_arrangement_filter_set_is_joined() {
        let query = SearchQuery {
            work_arrangements: vec![WorkArrangement::OnSite, WorkArrangement::Hybrid],
            ..SearchQuery::default()
        };
        let url = query.to_url();
        // Url encodes the comma separating the two codes.
        assert!(url.contains("f_WT=1%2C3"));
    }

    #[test]
    fn test_unknown_arrangement_never_filters() {
        let query = SearchQuery {
            work_arrangements: vec![WorkArrangement::Unknown],
            ..SearchQuery::default()
        };
        assert!(!query.to_url().contains("f_WT"));
    }

    #[test]
    fn test_settings_missing_file_falls_back_to_defaults() {
        let settings = Settings::load("definitely-not-a-real-settings-file.json");
        assert_eq!(settings.safety.max_jobs_per_session, 20);
        assert!(settings.criteria.english_only);
        assert_eq!(settings.criteria.english_keywords.len(), 13);
    }

    #[test]
    fn test_settings_roundtrip() {
        let mut settings = Settings::default();
        settings.safety.max_jobs_per_session = 5;
        settings.criteria.required_skills = vec!["rust".to_string(), "sql".to_string()];
        let json = serde_json::to_string(&settings).unwrap();
        let back: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.safety.max_jobs_per_session, 5);
        assert_eq!(back.criteria.required_skills, vec!["rust", "sql"]);
    }
}
