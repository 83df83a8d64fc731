use std::time::Duration;

use chrono::Local;
use log::warn;
use serde::Serialize;

use crate::browser::PageAccessor;
use crate::config::BrowserOptions;

pub const RESULT_LIST: &str = ".jobs-search-results-list";
pub const RESULT_ITEM: &str = "li.jobs-search-results__list-item";
pub const DETAIL_PANEL: &str =
    ".jobs-search__job-details--container, .job-view-layout, .jobs-details";

const TITLE_LOCATORS: &[&str] = &[
    ".job-details-jobs-unified-top-card__job-title",
    "h2.job-details-jobs-unified-top-card__job-title",
    "h1.top-card-layout__title",
    ".jobs-unified-top-card__job-title",
];

const COMPANY_LOCATORS: &[&str] = &[
    ".job-details-jobs-unified-top-card__company-name a",
    ".job-details-jobs-unified-top-card__company-name",
    ".jobs-unified-top-card__company-name",
];

const LOCATION_LOCATORS: &[&str] = &[
    ".job-details-jobs-unified-top-card__primary-description-container",
    ".job-details-jobs-unified-top-card__bullet",
    ".jobs-unified-top-card__bullet",
];

const DESCRIPTION_LOCATORS: &[&str] = &[
    "#job-details",
    ".jobs-description",
    ".jobs-description-content",
];

pub const SHOW_MORE: &str = "button[aria-label='Show more']";
pub const DETAIL_LINK: &str = "a.jobs-search__job-details--container-embedded-link";

pub const UNKNOWN_TITLE: &str = "Unknown Title";
pub const UNKNOWN_COMPANY: &str = "Unknown Company";
pub const UNKNOWN_LOCATION: &str = "Unknown Location";

/// One captured listing. Fields that could not be extracted carry an explicit
/// "unknown" sentinel (empty string for the description), never an absence.
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub title: String,
    pub company: String,
    pub location: String,
    pub description: String,
    pub url: String,
    pub captured_at: String,
}

/// Reads the currently selected listing's detail view. Each field is tried
/// against an ordered list of locators; the first non-empty match wins.
pub struct JobExtractor {
    detail_timeout: Duration,
}

impl JobExtractor {
    pub fn new(options: &BrowserOptions) -> Self {
        JobExtractor {
            detail_timeout: Duration::from_secs(options.detail_timeout_secs),
        }
    }

    /// Returns `None` only when the detail view itself never renders.
    /// Missing individual fields are a normal outcome.
    pub fn extract(&self, page: &dyn PageAccessor) -> Option<JobRecord> {
        if let Err(e) = page.wait_for(DETAIL_PANEL, self.detail_timeout) {
            warn!("Detail view did not render: {}", e);
            return None;
        }

        self.expand_description(page);

        let title = first_text(page, TITLE_LOCATORS).unwrap_or_else(|| UNKNOWN_TITLE.to_string());
        let company =
            first_text(page, COMPANY_LOCATORS).unwrap_or_else(|| UNKNOWN_COMPANY.to_string());
        let location = first_text(page, LOCATION_LOCATORS)
            .map(|raw| split_location(&raw))
            .unwrap_or_else(|| UNKNOWN_LOCATION.to_string());
        let description = first_text(page, DESCRIPTION_LOCATORS).unwrap_or_default();
        let url = page
            .find_first(DETAIL_LINK)
            .and_then(|link| page.attribute(&link, "href"))
            .unwrap_or_else(|| page.current_url());

        Some(JobRecord {
            title,
            company,
            location,
            description,
            url,
            captured_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        })
    }

    /// Clicks any "show more" affordance so the full description is in the DOM.
    /// Absence or click failure is not an error.
    fn expand_description(&self, page: &dyn PageAccessor) {
        for button in page.find_all(SHOW_MORE) {
            if page.click(&button).is_err() {
                break;
            }
        }
    }
}

fn first_text(page: &dyn PageAccessor, locators: &[&str]) -> Option<String> {
    for locator in locators {
        if let Some(handle) = page.find_first(locator) {
            if let Some(text) = page.text(&handle) {
                let text = text.trim();
                if !text.is_empty() {
                    return Some(text.to_string());
                }
            }
        }
    }
    None
}

/// Composite location strings come through as "Company · Location · ...".
/// The segment after the first delimiter is the location; a plain string is
/// used verbatim.
fn split_location(raw: &str) -> String {
    match raw.split_once('·') {
        Some((_, rest)) => rest.split('·').next().unwrap_or(rest).trim().to_string(),
        None => raw.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{FakeListing, FakePage};
    use crate::config::BrowserOptions;

    fn extractor() -> JobExtractor {
        JobExtractor::new(&BrowserOptions::default())
    }

    fn select_first(page: &FakePage) {
        page.selected.set(Some(0));
    }

    #[test]
    fn test_secondary_locator_wins_over_sentinel() {
        let mut listing = FakeListing::default();
        // Primary title locators yield nothing; a later alternative matches.
        listing
            .fields
            .insert("h1.top-card-layout__title", "Backend Engineer".to_string());
        let page = FakePage::with_listings(vec![listing]);
        select_first(&page);

        let record = extractor().extract(&page).unwrap();
        assert_eq!(record.title, "Backend Engineer");
    }

    #[test]
    fn test_missing_fields_take_sentinels() {
        let page = FakePage::with_listings(vec![FakeListing::default()]);
        select_first(&page);

        let record = extractor().extract(&page).unwrap();
        assert_eq!(record.title, UNKNOWN_TITLE);
        assert_eq!(record.company, UNKNOWN_COMPANY);
        assert_eq!(record.location, UNKNOWN_LOCATION);
        assert_eq!(record.description, "");
        // No embedded link present, so the page URL is the fallback.
        assert_eq!(record.url, page.url);
    }

    #[test]
    fn test_composite_location_is_split() {
        let mut listing = FakeListing::default();
        listing.fields.insert(
            ".job-details-jobs-unified-top-card__primary-description-container",
            "TechCorp GmbH · Berlin, Germany · Reposted 3 days ago".to_string(),
        );
        let page = FakePage::with_listings(vec![listing]);
        select_first(&page);

        let record = extractor().extract(&page).unwrap();
        assert_eq!(record.location, "Berlin, Germany");
    }

    #[test]
    fn test_plain_location_used_verbatim() {
        let mut listing = FakeListing::default();
        listing.fields.insert(
            ".job-details-jobs-unified-top-card__bullet",
            "Munich, Germany".to_string(),
        );
        let page = FakePage::with_listings(vec![listing]);
        select_first(&page);

        let record = extractor().extract(&page).unwrap();
        assert_eq!(record.location, "Munich, Germany");
    }

    #[test]
    fn test_unreadable_detail_view_yields_none() {
        let mut listing = FakeListing::default();
        listing.fail_detail = true;
        let page = FakePage::with_listings(vec![listing]);
        select_first(&page);

        assert!(extractor().extract(&page).is_none());
    }

    #[test]
    fn test_embedded_link_preferred_over_page_url() {
        let mut listing = FakeListing::default();
        listing.href = Some("https://jobs.example/view/123".to_string());
        let page = FakePage::with_listings(vec![listing]);
        select_first(&page);

        let record = extractor().extract(&page).unwrap();
        assert_eq!(record.url, "https://jobs.example/view/123");
    }
}
