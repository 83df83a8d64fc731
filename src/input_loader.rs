use std::fs::File;
use std::path::Path;

use calamine::{open_workbook, DataType, Reader, Xlsx};
use log::{error, info, warn};
use serde::Deserialize;

use crate::config::{EmploymentType, ExperienceLevel, PostingRecency, SearchQuery};
use crate::qualifier::WorkArrangement;

/// One row of a queries file. Only keywords and location are required; the
/// remaining filters fall back to the configured default query.
#[derive(Debug, Deserialize, Clone)]
pub struct QueryRow {
    #[serde(rename = "Keywords", alias = "keywords", alias = "Search", alias = "search")]
    pub keywords: String,
    #[serde(rename = "Location", alias = "location", alias = "Country", alias = "country")]
    pub location: String,
    #[serde(rename = "Recency", alias = "recency", default)]
    pub recency: Option<String>,
    #[serde(
        rename = "Arrangements",
        alias = "arrangements",
        alias = "Work Types",
        alias = "work types",
        default
    )]
    pub arrangements: Option<String>,
    #[serde(rename = "Employment", alias = "employment", default)]
    pub employment: Option<String>,
    #[serde(rename = "Experience", alias = "experience", default)]
    pub experience: Option<String>,
}

impl QueryRow {
    pub fn to_query(&self, base: &SearchQuery) -> SearchQuery {
        let mut query = base.clone();
        query.keywords = self.keywords.trim().to_string();
        query.location = self.location.trim().to_string();
        if let Some(recency) = self.recency.as_deref().and_then(parse_recency) {
            query.recency = recency;
        }
        if let Some(raw) = self.arrangements.as_deref() {
            let parsed: Vec<WorkArrangement> = raw
                .split(|c| c == ',' || c == ';')
                .filter_map(|token| parse_arrangement(token.trim()))
                .collect();
            if !parsed.is_empty() {
                query.work_arrangements = parsed;
            }
        }
        if let Some(employment) = self.employment.as_deref().and_then(parse_employment) {
            query.employment_type = Some(employment);
        }
        if let Some(experience) = self.experience.as_deref().and_then(parse_experience) {
            query.experience_level = Some(experience);
        }
        query
    }
}

/// Loads search queries from a CSV or Excel file. Rows that cannot be parsed
/// are logged and skipped; a missing file yields an empty list.
pub fn load_queries<P: AsRef<Path>>(filename: P, base: &SearchQuery) -> Vec<SearchQuery> {
    let path = filename.as_ref();
    if !path.exists() {
        error!("Queries file {:?} does not exist.", path);
        return Vec::new();
    }

    let is_excel = path
        .extension()
        .map_or(false, |ext| ext == "xlsx" || ext == "xls");

    if is_excel {
        load_excel(path, base)
    } else {
        load_csv(path, base)
    }
}

fn load_csv(path: &Path, base: &SearchQuery) -> Vec<SearchQuery> {
    let mut queries = Vec::new();
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            error!("Could not open queries file: {}", e);
            return queries;
        }
    };

    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(file);

    for result in rdr.deserialize::<QueryRow>() {
        match result {
            Ok(row) if !row.keywords.trim().is_empty() => queries.push(row.to_query(base)),
            Ok(_) => {}
            Err(e) => {
                error!("Error parsing query row: {}", e);
            }
        }
    }
    info!("Loaded {} queries from CSV {:?}", queries.len(), path);
    queries
}

fn load_excel(path: &Path, base: &SearchQuery) -> Vec<SearchQuery> {
    let mut queries = Vec::new();
    let mut excel: Xlsx<_> = match open_workbook(path) {
        Ok(wb) => wb,
        Err(e) => {
            error!("Could not open Excel file: {}", e);
            return queries;
        }
    };

    let worksheets = excel.worksheets();
    if let Some((_name, range)) = worksheets.first() {
        let mut keywords_idx = None;
        let mut location_idx = None;
        let mut recency_idx = None;
        let mut arrangements_idx = None;
        let mut employment_idx = None;
        let mut experience_idx = None;

        for (row_idx, row) in range.rows().enumerate() {
            if row_idx == 0 {
                for (col_idx, cell) in row.iter().enumerate() {
                    let header = cell.to_string().to_lowercase();
                    if header.contains("keyword") || header.contains("search") {
                        keywords_idx = Some(col_idx);
                    } else if header.contains("location") || header.contains("country") {
                        location_idx = Some(col_idx);
                    } else if header.contains("recency") {
                        recency_idx = Some(col_idx);
                    } else if header.contains("arrangement") || header.contains("work") {
                        arrangements_idx = Some(col_idx);
                    } else if header.contains("employment") {
                        employment_idx = Some(col_idx);
                    } else if header.contains("experience") {
                        experience_idx = Some(col_idx);
                    }
                }

                if keywords_idx.is_none() {
                    error!("Excel header missing a 'Keywords' column");
                    return queries;
                }
                continue;
            }

            let cell_at = |idx: Option<usize>| -> Option<String> {
                idx.and_then(|i| row.get(i))
                    .map(|c| c.to_string())
                    .filter(|s| !s.trim().is_empty())
            };

            let keywords = cell_at(keywords_idx).unwrap_or_default();
            if keywords.is_empty() {
                continue;
            }

            let parsed = QueryRow {
                keywords,
                location: cell_at(location_idx).unwrap_or_else(|| base.location.clone()),
                recency: cell_at(recency_idx),
                arrangements: cell_at(arrangements_idx),
                employment: cell_at(employment_idx),
                experience: cell_at(experience_idx),
            };
            queries.push(parsed.to_query(base));
        }
    }

    info!("Loaded {} queries from Excel {:?}", queries.len(), path);
    queries
}

fn parse_recency(token: &str) -> Option<PostingRecency> {
    match token.to_lowercase().replace(' ', "-").as_str() {
        "past-day" | "24h" | "day" => Some(PostingRecency::PastDay),
        "past-week" | "week" => Some(PostingRecency::PastWeek),
        "past-month" | "month" => Some(PostingRecency::PastMonth),
        "any" => Some(PostingRecency::Any),
        other => {
            warn!("Unrecognized recency '{}'", other);
            None
        }
    }
}

fn parse_arrangement(token: &str) -> Option<WorkArrangement> {
    match token.to_lowercase().replace(' ', "-").as_str() {
        "remote" => Some(WorkArrangement::Remote),
        "hybrid" => Some(WorkArrangement::Hybrid),
        "on-site" | "onsite" | "office" => Some(WorkArrangement::OnSite),
        "" => None,
        other => {
            warn!("Unrecognized work arrangement '{}'", other);
            None
        }
    }
}

fn parse_employment(token: &str) -> Option<EmploymentType> {
    match token.to_lowercase().replace(' ', "-").as_str() {
        "full-time" | "fulltime" => Some(EmploymentType::FullTime),
        "part-time" | "parttime" => Some(EmploymentType::PartTime),
        "contract" => Some(EmploymentType::Contract),
        "temporary" => Some(EmploymentType::Temporary),
        "internship" => Some(EmploymentType::Internship),
        other => {
            warn!("Unrecognized employment type '{}'", other);
            None
        }
    }
}

fn parse_experience(token: &str) -> Option<ExperienceLevel> {
    match token.to_lowercase().replace(' ', "-").as_str() {
        "internship" => Some(ExperienceLevel::Internship),
        "entry" | "entry-level" => Some(ExperienceLevel::EntryLevel),
        "associate" => Some(ExperienceLevel::Associate),
        "mid-senior" | "senior" => Some(ExperienceLevel::MidSenior),
        "director" => Some(ExperienceLevel::Director),
        "executive" => Some(ExperienceLevel::Executive),
        other => {
            warn!("Unrecognized experience level '{}'", other);
            None
        }
    }
}
