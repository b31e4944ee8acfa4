use crate::delay_manager;
use headless_chrome::Tab;
use log::debug;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("input interaction failed: {0}")]
    Input(String),

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("javascript execution failed: {0}")]
    JavaScript(String),
}

/// One result card as the page currently renders it: its visible text and
/// the hrefs of the links inside it. Captured in a single DOM pass so text
/// and links cannot drift apart between calls.
#[derive(Debug, Clone, Deserialize)]
pub struct CardSnapshot {
    pub text: String,
    pub links: Vec<String>,
}

/// Everything the scrape loop needs from a browser page. The scraper and
/// orchestrator only ever see this trait; `ChromeDriver` is the sole
/// production adapter.
pub trait PageDriver {
    fn navigate(&self, url: &str) -> Result<(), DriverError>;

    fn current_url(&self) -> Result<String, DriverError>;

    /// Locate the search input by its placeholder attribute, clear it, type
    /// `query` and submit it with an Enter keypress.
    fn submit_search(&self, placeholder: &str, query: &str) -> Result<(), DriverError>;

    /// Snapshot all elements matching `card_selector`, collecting each one's
    /// inner text and the hrefs of its `link_selector` descendants.
    fn find_cards(
        &self,
        card_selector: &str,
        link_selector: &str,
    ) -> Result<Vec<CardSnapshot>, DriverError>;

    fn scroll_by(&self, pixels: u32) -> Result<(), DriverError>;
}

const SEARCH_INPUT_TIMEOUT: Duration = Duration::from_secs(5);

/// CDP-backed adapter over one Chrome tab.
pub struct ChromeDriver {
    tab: Arc<Tab>,
}

impl ChromeDriver {
    pub fn new(tab: Arc<Tab>) -> Self {
        ChromeDriver { tab }
    }

    fn evaluate(&self, script: &str) -> Result<Option<serde_json::Value>, DriverError> {
        let result = self
            .tab
            .evaluate(script, false)
            .map_err(|e| DriverError::JavaScript(e.to_string()))?;
        Ok(result.value)
    }
}

impl PageDriver for ChromeDriver {
    fn navigate(&self, url: &str) -> Result<(), DriverError> {
        self.tab
            .navigate_to(url)
            .map_err(|e| DriverError::Navigation(format!("{}: {}", url, e)))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| DriverError::Navigation(format!("{}: {}", url, e)))?;
        Ok(())
    }

    fn current_url(&self) -> Result<String, DriverError> {
        Ok(self.tab.get_url())
    }

    fn submit_search(&self, placeholder: &str, query: &str) -> Result<(), DriverError> {
        let selector = format!("input[placeholder='{}']", placeholder);
        let input = self
            .tab
            .wait_for_element_with_custom_timeout(&selector, SEARCH_INPUT_TIMEOUT)
            .map_err(|e| DriverError::ElementNotFound(format!("{}: {}", selector, e)))?;

        input
            .click()
            .map_err(|e| DriverError::Input(e.to_string()))?;
        input
            .call_js_fn("function() { this.value = ''; }", vec![], false)
            .map_err(|e| DriverError::Input(e.to_string()))?;

        // Keystroke by keystroke with jitter; pasting the whole query is a
        // known automation fingerprint on the target site.
        let mut buf = [0u8; 4];
        for ch in query.chars() {
            self.tab
                .type_str(ch.encode_utf8(&mut buf))
                .map_err(|e| DriverError::Input(e.to_string()))?;
            delay_manager::typing_delay();
        }
        self.tab
            .press_key("Enter")
            .map_err(|e| DriverError::Input(e.to_string()))?;
        Ok(())
    }

    fn find_cards(
        &self,
        card_selector: &str,
        link_selector: &str,
    ) -> Result<Vec<CardSnapshot>, DriverError> {
        let script = format!(
            r#"JSON.stringify(Array.from(document.querySelectorAll("{card}")).map(function(card) {{
                return {{
                    text: card.innerText || "",
                    links: Array.from(card.querySelectorAll("{link}")).map(function(a) {{
                        return a.getAttribute("href") || "";
                    }})
                }};
            }}))"#,
            card = card_selector.replace('"', "\\\""),
            link = link_selector.replace('"', "\\\"")
        );

        let value = self.evaluate(&script)?;
        let json = value
            .as_ref()
            .and_then(|v| v.as_str())
            .ok_or_else(|| DriverError::Extraction("card snapshot returned no value".into()))?;
        let cards: Vec<CardSnapshot> = serde_json::from_str(json)
            .map_err(|e| DriverError::Extraction(format!("card snapshot JSON: {}", e)))?;
        debug!("Snapshot of {} result cards", cards.len());
        Ok(cards)
    }

    fn scroll_by(&self, pixels: u32) -> Result<(), DriverError> {
        self.evaluate(&format!("window.scrollBy(0, {});", pixels))?;
        Ok(())
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    /// Scripted stand-in for `ChromeDriver`: serves canned card snapshots and
    /// can be told to fail at a given navigation or at search submission.
    /// The url cell is shared so a test's login prompt can flip it.
    pub struct MockDriver {
        pub url: Rc<RefCell<String>>,
        pub cards: Vec<CardSnapshot>,
        pub fail_navigate_on: Option<usize>,
        pub fail_submit: bool,
        pub navigate_count: Cell<usize>,
        pub submitted: RefCell<Vec<String>>,
    }

    impl MockDriver {
        pub fn new() -> Self {
            MockDriver {
                url: Rc::new(RefCell::new(
                    "https://www.linkedin.com/sales/home".to_string(),
                )),
                cards: Vec::new(),
                fail_navigate_on: None,
                fail_submit: false,
                navigate_count: Cell::new(0),
                submitted: RefCell::new(Vec::new()),
            }
        }

        pub fn with_cards(cards: Vec<CardSnapshot>) -> Self {
            MockDriver {
                cards,
                ..Self::new()
            }
        }

        pub fn card(text: &str, links: &[&str]) -> CardSnapshot {
            CardSnapshot {
                text: text.to_string(),
                links: links.iter().map(|l| l.to_string()).collect(),
            }
        }
    }

    impl PageDriver for MockDriver {
        fn navigate(&self, _url: &str) -> Result<(), DriverError> {
            let call = self.navigate_count.get();
            self.navigate_count.set(call + 1);
            if self.fail_navigate_on == Some(call) {
                return Err(DriverError::Navigation("scripted failure".into()));
            }
            Ok(())
        }

        fn current_url(&self) -> Result<String, DriverError> {
            Ok(self.url.borrow().clone())
        }

        fn submit_search(&self, _placeholder: &str, query: &str) -> Result<(), DriverError> {
            if self.fail_submit {
                return Err(DriverError::ElementNotFound("scripted failure".into()));
            }
            self.submitted.borrow_mut().push(query.to_string());
            Ok(())
        }

        fn find_cards(
            &self,
            _card_selector: &str,
            _link_selector: &str,
        ) -> Result<Vec<CardSnapshot>, DriverError> {
            Ok(self.cards.clone())
        }

        fn scroll_by(&self, _pixels: u32) -> Result<(), DriverError> {
            Ok(())
        }
    }
}
