use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::qualifier::WorkArrangement;
use crate::session::ScreenedJob;

/// Fixed preferred column order for every table.
const COLUMNS: [&str; 15] = [
    "title",
    "company",
    "location",
    "work_arrangement",
    "qualified",
    "english_qualified",
    "english_score",
    "skill_match_ratio",
    "matched_skills",
    "missing_skills",
    "salary_mentioned",
    "sponsorship_mentioned",
    "rejection_reason",
    "job_url",
    "captured_at",
];

/// Writes the session's records as a directory of CSV tables: all jobs plus
/// derived views (English, qualified, per-arrangement). Empty derived views
/// are omitted. Returns the written file paths.
pub fn write_workbook(jobs: &[ScreenedJob], dir: &Path) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    if jobs.is_empty() {
        warn!("No records to write.");
        return Ok(Vec::new());
    }

    fs::create_dir_all(dir)?;
    let mut written = Vec::new();

    let all: Vec<&ScreenedJob> = jobs.iter().collect();
    written.push(write_table(&all, dir, "all_jobs.csv")?);

    let english: Vec<&ScreenedJob> = jobs.iter().filter(|j| j.verdict.english_qualified).collect();
    if !english.is_empty() {
        written.push(write_table(&english, dir, "english_jobs.csv")?);
    }

    let qualified: Vec<&ScreenedJob> = jobs.iter().filter(|j| j.verdict.qualified).collect();
    if !qualified.is_empty() {
        written.push(write_table(&qualified, dir, "qualified_jobs.csv")?);
    }

    for (arrangement, file_name) in [
        (WorkArrangement::Hybrid, "hybrid_jobs.csv"),
        (WorkArrangement::OnSite, "on_site_jobs.csv"),
        (WorkArrangement::Remote, "remote_jobs.csv"),
    ] {
        let subset: Vec<&ScreenedJob> = english
            .iter()
            .copied()
            .filter(|j| j.verdict.work_arrangement == arrangement)
            .collect();
        if !subset.is_empty() {
            written.push(write_table(&subset, dir, file_name)?);
        }
    }

    info!("Wrote {} tables to {:?}", written.len(), dir);
    Ok(written)
}

fn write_table(
    jobs: &[&ScreenedJob],
    dir: &Path,
    file_name: &str,
) -> Result<PathBuf, Box<dyn Error>> {
    let path = dir.join(file_name);
    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record(COLUMNS)?;
    for job in jobs {
        writer.write_record(render_row(job))?;
    }
    writer.flush()?;
    Ok(path)
}

fn render_row(job: &ScreenedJob) -> Vec<String> {
    vec![
        job.record.title.clone(),
        job.record.company.clone(),
        job.record.location.clone(),
        job.verdict.work_arrangement.label().to_string(),
        job.verdict.qualified.to_string(),
        job.verdict.english_qualified.to_string(),
        format!("{:.2}", job.verdict.english_score),
        format!("{:.2}", job.verdict.skill_match_ratio),
        job.verdict.matched_skills.join("; "),
        job.verdict.missing_skills.join("; "),
        job.verdict.salary_mentioned.to_string(),
        job.verdict.sponsorship_mentioned.to_string(),
        job.verdict.rejection_reason.clone(),
        job.record.url.clone(),
        job.record.captured_at.clone(),
    ]
}

/// Post-write operator summary, mirroring the per-arrangement counts the
/// session log ends with.
pub fn log_summary(jobs: &[ScreenedJob]) {
    let english = jobs.iter().filter(|j| j.verdict.english_qualified).count();
    let qualified = jobs.iter().filter(|j| j.verdict.qualified).count();
    info!(
        "Session results: {} total, {} English, {} qualified",
        jobs.len(),
        english,
        qualified
    );
    for arrangement in [
        WorkArrangement::Hybrid,
        WorkArrangement::OnSite,
        WorkArrangement::Remote,
        WorkArrangement::Unknown,
    ] {
        let count = jobs
            .iter()
            .filter(|j| j.verdict.work_arrangement == arrangement)
            .count();
        if count > 0 {
            info!("   {}: {}", arrangement.label(), count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::JobRecord;
    use crate::qualifier::QualificationVerdict;

    fn job(title: &str, english: bool, qualified: bool, arrangement: WorkArrangement) -> ScreenedJob {
        ScreenedJob {
            record: JobRecord {
                title: title.to_string(),
                company: "TechCorp".to_string(),
                location: "Berlin, Germany".to_string(),
                description: "text".to_string(),
                url: "https://jobs.example/view/1".to_string(),
                captured_at: "2026-01-01 12:00:00".to_string(),
            },
            verdict: QualificationVerdict {
                english_score: if english { 0.9 } else { 0.1 },
                english_qualified: english,
                work_arrangement: arrangement,
                matched_skills: vec!["python".to_string()],
                missing_skills: Vec::new(),
                skill_match_ratio: 1.0,
                salary_mentioned: false,
                sponsorship_mentioned: false,
                qualified,
                rejection_reason: if qualified {
                    "Qualified".to_string()
                } else {
                    "not English description".to_string()
                },
            },
        }
    }

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("sink_test_{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_workbook_layout_and_derived_tables() {
        let jobs = vec![
            job("A", true, true, WorkArrangement::Hybrid),
            job("B", false, false, WorkArrangement::Remote),
        ];
        let dir = temp_dir();
        let written = write_workbook(&jobs, &dir).unwrap();

        assert!(dir.join("all_jobs.csv").exists());
        assert!(dir.join("english_jobs.csv").exists());
        assert!(dir.join("qualified_jobs.csv").exists());
        assert!(dir.join("hybrid_jobs.csv").exists());
        // The only remote job is not English, so no remote table is derived.
        assert!(!dir.join("remote_jobs.csv").exists());
        assert_eq!(written.len(), 4);

        let mut reader = csv::Reader::from_path(dir.join("all_jobs.csv")).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[0], "title");
        assert_eq!(&headers[3], "work_arrangement");
        assert_eq!(reader.records().count(), 2);

        let mut english = csv::Reader::from_path(dir.join("english_jobs.csv")).unwrap();
        assert_eq!(english.records().count(), 1);

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_empty_input_writes_nothing() {
        let dir = temp_dir();
        let written = write_workbook(&[], &dir).unwrap();
        assert!(written.is_empty());
        assert!(!dir.exists());
    }
}
