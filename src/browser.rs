use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;

use headless_chrome::{Browser, LaunchOptions, Tab};
use log::{info, warn};
use thiserror::Error;

use crate::config::BrowserOptions;

#[derive(Debug, Error)]
pub enum BrowseError {
    #[error("failed to launch browser: {0}")]
    Launch(String),
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("timed out waiting for '{locator}' after {seconds}s")]
    RenderTimeout { locator: String, seconds: u64 },
    #[error("element '{0}' is gone from the page")]
    StaleElement(String),
    #[error("interaction failed: {0}")]
    Interaction(String),
}

/// A (locator, index) reference into the current page. Handles are re-resolved
/// on every operation, so a re-rendered list invalidates nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElemHandle {
    pub locator: String,
    pub index: usize,
}

impl ElemHandle {
    pub fn new(locator: &str, index: usize) -> Self {
        ElemHandle {
            locator: locator.to_string(),
            index,
        }
    }
}

/// The browsing surface the session drives. Read operations treat missing
/// elements as a normal outcome; only navigation and interaction can fail.
pub trait PageAccessor {
    fn navigate(&self, url: &str) -> Result<(), BrowseError>;
    fn wait_for(&self, locator: &str, timeout: Duration) -> Result<(), BrowseError>;
    fn find_all(&self, locator: &str) -> Vec<ElemHandle>;
    fn find_first(&self, locator: &str) -> Option<ElemHandle>;
    fn text(&self, handle: &ElemHandle) -> Option<String>;
    fn attribute(&self, handle: &ElemHandle, name: &str) -> Option<String>;
    fn click(&self, handle: &ElemHandle) -> Result<(), BrowseError>;
    fn scroll_into_view(&self, handle: &ElemHandle) -> Result<(), BrowseError>;
    fn current_url(&self) -> String;
    fn close(&mut self);
}

/// Headless Chrome implementation of [`PageAccessor`].
pub struct ChromePage {
    browser: Option<Browser>,
    tab: Arc<Tab>,
}

impl ChromePage {
    pub fn launch(options: &BrowserOptions) -> Result<Self, BrowseError> {
        info!(
            "Launching Chrome (headless: {}, window: {}x{})",
            options.headless, options.window_size.0, options.window_size.1
        );

        let ua_arg = format!("--user-agent={}", options.user_agent);
        let args: Vec<&OsStr> = vec![
            OsStr::new("--disable-blink-features=AutomationControlled"),
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new(&ua_arg),
        ];

        let launch = LaunchOptions {
            headless: options.headless,
            sandbox: false,
            window_size: Some(options.window_size),
            // Breaks between jobs can run well past the default idle timeout.
            idle_browser_timeout: Duration::from_secs(600),
            args,
            ..Default::default()
        };

        let browser = Browser::new(launch).map_err(|e| BrowseError::Launch(e.to_string()))?;
        let tab = browser
            .new_tab()
            .map_err(|e| BrowseError::Launch(e.to_string()))?;

        // Masks the automation flag the same way the driver-managed setup did.
        // Best effort; some Chrome builds reject the override.
        if let Err(e) = tab.evaluate(
            "Object.defineProperty(navigator, 'webdriver', {get: () => undefined})",
            false,
        ) {
            warn!("Could not mask navigator.webdriver: {}", e);
        }

        info!("Browser session ready.");
        Ok(ChromePage {
            browser: Some(browser),
            tab,
        })
    }
}

impl PageAccessor for ChromePage {
    fn navigate(&self, url: &str) -> Result<(), BrowseError> {
        self.tab
            .navigate_to(url)
            .map_err(|e| BrowseError::Navigation(e.to_string()))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| BrowseError::Navigation(e.to_string()))?;
        Ok(())
    }

    fn wait_for(&self, locator: &str, timeout: Duration) -> Result<(), BrowseError> {
        self.tab
            .wait_for_element_with_custom_timeout(locator, timeout)
            .map(|_| ())
            .map_err(|_| BrowseError::RenderTimeout {
                locator: locator.to_string(),
                seconds: timeout.as_secs(),
            })
    }

    fn find_all(&self, locator: &str) -> Vec<ElemHandle> {
        match self.tab.find_elements(locator) {
            Ok(elements) => (0..elements.len())
                .map(|i| ElemHandle::new(locator, i))
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    fn find_first(&self, locator: &str) -> Option<ElemHandle> {
        self.tab
            .find_element(locator)
            .ok()
            .map(|_| ElemHandle::new(locator, 0))
    }

    fn text(&self, handle: &ElemHandle) -> Option<String> {
        let elements = self.tab.find_elements(&handle.locator).ok()?;
        let element = elements.get(handle.index)?;
        let text = element.get_inner_text().ok()?;
        let text = text.trim().to_string();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    fn attribute(&self, handle: &ElemHandle, name: &str) -> Option<String> {
        let elements = self.tab.find_elements(&handle.locator).ok()?;
        let element = elements.get(handle.index)?;
        // DevTools returns attributes as a flat [name, value, ...] list.
        let attrs = element.get_attributes().ok()??;
        attrs
            .chunks(2)
            .find(|pair| pair.len() == 2 && pair[0] == name)
            .map(|pair| pair[1].clone())
    }

    fn click(&self, handle: &ElemHandle) -> Result<(), BrowseError> {
        let elements = self
            .tab
            .find_elements(&handle.locator)
            .map_err(|e| BrowseError::Interaction(e.to_string()))?;
        let element = elements
            .get(handle.index)
            .ok_or_else(|| BrowseError::StaleElement(handle.locator.clone()))?;
        element
            .click()
            .map(|_| ())
            .map_err(|e| BrowseError::Interaction(e.to_string()))
    }

    fn scroll_into_view(&self, handle: &ElemHandle) -> Result<(), BrowseError> {
        let elements = self
            .tab
            .find_elements(&handle.locator)
            .map_err(|e| BrowseError::Interaction(e.to_string()))?;
        let element = elements
            .get(handle.index)
            .ok_or_else(|| BrowseError::StaleElement(handle.locator.clone()))?;
        element
            .scroll_into_view()
            .map(|_| ())
            .map_err(|e| BrowseError::Interaction(e.to_string()))
    }

    fn current_url(&self) -> String {
        self.tab.get_url()
    }

    fn close(&mut self) {
        if let Some(browser) = self.browser.take() {
            drop(browser);
            info!("Browser session closed.");
        }
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::{BrowseError, ElemHandle, PageAccessor};
    use crate::extractor::{DETAIL_LINK, DETAIL_PANEL, RESULT_ITEM, RESULT_LIST};
    use std::cell::Cell;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// One synthetic listing: locator string -> rendered text.
    #[derive(Default, Clone)]
    pub struct FakeListing {
        pub fields: HashMap<&'static str, String>,
        pub href: Option<String>,
        pub fail_click: bool,
        pub fail_detail: bool,
    }

    /// In-memory [`PageAccessor`] backing the extractor and session tests.
    /// Clicking a result item selects it; reads resolve against the selection.
    pub struct FakePage {
        pub listings: Vec<FakeListing>,
        pub result_list_renders: bool,
        pub selected: Cell<Option<usize>>,
        pub clicks: Arc<Mutex<Vec<usize>>>,
        pub close_calls: Arc<AtomicUsize>,
        pub url: String,
    }

    impl FakePage {
        pub fn with_listings(listings: Vec<FakeListing>) -> Self {
            FakePage {
                listings,
                result_list_renders: true,
                selected: Cell::new(None),
                clicks: Arc::new(Mutex::new(Vec::new())),
                close_calls: Arc::new(AtomicUsize::new(0)),
                url: "https://www.linkedin.com/jobs/search/?current".to_string(),
            }
        }

        fn current(&self) -> Option<&FakeListing> {
            self.selected.get().and_then(|i| self.listings.get(i))
        }
    }

    impl PageAccessor for FakePage {
        fn navigate(&self, _url: &str) -> Result<(), BrowseError> {
            Ok(())
        }

        fn wait_for(&self, locator: &str, timeout: Duration) -> Result<(), BrowseError> {
            let timed_out = || BrowseError::RenderTimeout {
                locator: locator.to_string(),
                seconds: timeout.as_secs(),
            };
            if locator == RESULT_LIST {
                return if self.result_list_renders {
                    Ok(())
                } else {
                    Err(timed_out())
                };
            }
            if locator == DETAIL_PANEL {
                return match self.current() {
                    Some(listing) if !listing.fail_detail => Ok(()),
                    _ => Err(timed_out()),
                };
            }
            Ok(())
        }

        fn find_all(&self, locator: &str) -> Vec<ElemHandle> {
            if locator == RESULT_ITEM {
                (0..self.listings.len())
                    .map(|i| ElemHandle::new(locator, i))
                    .collect()
            } else {
                Vec::new()
            }
        }

        fn find_first(&self, locator: &str) -> Option<ElemHandle> {
            let listing = self.current()?;
            if listing.fields.contains_key(locator) {
                return Some(ElemHandle::new(locator, 0));
            }
            if locator == DETAIL_LINK && listing.href.is_some() {
                return Some(ElemHandle::new(locator, 0));
            }
            None
        }

        fn text(&self, handle: &ElemHandle) -> Option<String> {
            self.current()?.fields.get(handle.locator.as_str()).cloned()
        }

        fn attribute(&self, handle: &ElemHandle, name: &str) -> Option<String> {
            if handle.locator == DETAIL_LINK && name == "href" {
                return self.current()?.href.clone();
            }
            None
        }

        fn click(&self, handle: &ElemHandle) -> Result<(), BrowseError> {
            if handle.locator == RESULT_ITEM {
                let listing = self
                    .listings
                    .get(handle.index)
                    .ok_or_else(|| BrowseError::StaleElement(handle.locator.clone()))?;
                if listing.fail_click {
                    return Err(BrowseError::Interaction("click intercepted".to_string()));
                }
                self.selected.set(Some(handle.index));
                self.clicks.lock().unwrap().push(handle.index);
            }
            Ok(())
        }

        fn scroll_into_view(&self, _handle: &ElemHandle) -> Result<(), BrowseError> {
            Ok(())
        }

        fn current_url(&self) -> String {
            self.url.clone()
        }

        fn close(&mut self) {
            self.close_calls.fetch_add(1, Ordering::SeqCst);
        }
    }
}
