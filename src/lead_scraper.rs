use crate::delay_manager::Pacing;
use crate::driver::{CardSnapshot, DriverError, PageDriver};
use log::{info, warn};
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use url::Url;

pub const MAX_CONTACTS_PER_COMPANY: usize = 3;

const SEARCH_URL: &str = "https://www.linkedin.com/sales/search/people";
const SITE_BASE: &str = "https://www.linkedin.com";

/// The search box carries no stable id or class, only its placeholder.
const SEARCH_INPUT_PLACEHOLDER: &str = "Keywords für Suche";

const CARD_SELECTOR: &str = "li.artdeco-list__item";
const LEAD_LINK_SELECTOR: &str = "a[href*='/sales/lead/']";
const LEAD_LINK_PATTERN: &str = r"/sales/lead/";

/// Broad department disjunction used when no role keywords were selected.
const FALLBACK_DEPARTMENTS: &str =
    "HR OR Personal OR Marketing OR IT OR Geschäftsleitung OR Einkauf OR Finanzen OR Produktion";

const MAX_SCROLLS: usize = 10;
const SCROLL_STEP_PX: u32 = 1000;

#[derive(Debug, Clone, Serialize)]
pub struct Contact {
    pub name: String,
    pub position: String,
    pub profile_url: String,
}

/// Runs one company's people search and pulls up to
/// `MAX_CONTACTS_PER_COMPANY` unique contacts out of the result list.
pub struct LeadScraper {
    pacing: Pacing,
    lead_link: Regex,
    base: Url,
}

impl LeadScraper {
    pub fn new() -> Self {
        Self::with_pacing(Pacing::standard())
    }

    pub fn with_pacing(pacing: Pacing) -> Self {
        LeadScraper {
            pacing,
            lead_link: Regex::new(LEAD_LINK_PATTERN).unwrap(),
            base: Url::parse(SITE_BASE).unwrap(),
        }
    }

    /// Quoted company name AND'ed with the keyword disjunction, or with the
    /// broad department fallback when no keywords were resolved.
    pub fn build_query(company: &str, keywords: &[String]) -> String {
        if keywords.is_empty() {
            format!("\"{}\" AND ({})", company, FALLBACK_DEPARTMENTS)
        } else {
            format!("\"{}\" AND ({})", company, keywords.join(" OR "))
        }
    }

    /// A failed search submission is not an error: the row just proceeds
    /// without contacts. Navigation and extraction failures bubble up and are
    /// absorbed per-row by the orchestrator.
    pub fn scrape(
        &self,
        driver: &dyn PageDriver,
        company: &str,
        keywords: &[String],
    ) -> Result<Vec<Contact>, DriverError> {
        let query = Self::build_query(company, keywords);
        info!("Searching: {}", query);

        driver.navigate(SEARCH_URL)?;
        self.pacing.search_settle_delay();

        if let Err(e) = driver.submit_search(SEARCH_INPUT_PLACEHOLDER, &query) {
            warn!("Search input unavailable for '{}': {}", company, e);
            return Ok(Vec::new());
        }
        self.pacing.results_settle_delay();

        let mut contacts = Vec::new();
        let mut seen_names = HashSet::new();
        let mut scrolls = 0;

        while scrolls < MAX_SCROLLS && contacts.len() < MAX_CONTACTS_PER_COMPANY {
            let cards = driver.find_cards(CARD_SELECTOR, LEAD_LINK_SELECTOR)?;
            for card in &cards {
                if let Some(contact) = self.parse_card(card, &mut seen_names, keywords) {
                    contacts.push(contact);
                    if contacts.len() >= MAX_CONTACTS_PER_COMPANY {
                        break;
                    }
                }
            }
            if contacts.len() >= MAX_CONTACTS_PER_COMPANY {
                break;
            }
            driver.scroll_by(SCROLL_STEP_PX)?;
            self.pacing.scroll_settle_delay();
            scrolls += 1;
        }

        info!("Company '{}': {} contact(s) found", company, contacts.len());
        Ok(contacts)
    }

    /// The first three non-empty lines of a card are name, position and
    /// company line. Cards with fewer lines, repeated names, non-matching
    /// positions or no lead link are skipped.
    fn parse_card(
        &self,
        card: &CardSnapshot,
        seen_names: &mut HashSet<String>,
        keywords: &[String],
    ) -> Option<Contact> {
        let lines: Vec<&str> = card
            .text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        if lines.len() < 3 {
            return None;
        }
        let (name, position) = (lines[0], lines[1]);

        if !seen_names.insert(name.to_string()) {
            return None;
        }
        if !position_matches(position, keywords) {
            return None;
        }

        let href = card.links.iter().find(|h| self.lead_link.is_match(h))?;
        let profile_url = self.base.join(href).ok()?.to_string();

        Some(Contact {
            name: name.to_string(),
            position: position.to_string(),
            profile_url,
        })
    }
}

impl Default for LeadScraper {
    fn default() -> Self {
        Self::new()
    }
}

/// Case-insensitive substring relevance check; no keywords accepts all.
fn position_matches(position: &str, keywords: &[String]) -> bool {
    if keywords.is_empty() {
        return true;
    }
    let position = position.to_lowercase();
    keywords
        .iter()
        .any(|kw| position.contains(&kw.to_lowercase()))
}
