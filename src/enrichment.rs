use crate::delay_manager::Pacing;
use crate::driver::{DriverError, PageDriver};
use crate::error::EnrichmentError;
use crate::lead_scraper::{Contact, LeadScraper, MAX_CONTACTS_PER_COMPANY};
use crate::roles;
use crate::session::{PauseSchedule, Session, SessionController};
use crate::table_loader::{self, Table};
use log::{info, warn};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Field names appended per contact slot, in output order.
pub const CONTACT_FIELDS: &[&str] = &["Name", "Position", "LinkedIn Profil"];

/// On-disk browser profile, reused across runs to keep the login alive.
pub const PROFILE_DIR: &str = "profile";

/// What one input row produced: the output rows to write, and the scrape
/// error (if any) that made them contactless. Explicit value instead of
/// exception control flow; the loop never aborts on it.
pub struct RowOutcome {
    pub rows: Vec<Vec<String>>,
    pub error: Option<DriverError>,
}

/// Append `Name i` / `Position i` / `LinkedIn Profil i` for each contact
/// slot, skipping columns the input already carries. No duplicates afterward.
pub fn extend_headers(headers: &mut Vec<String>) {
    for i in 1..=MAX_CONTACTS_PER_COMPANY {
        for field in CONTACT_FIELDS {
            let column = format!("{} {}", field, i);
            if !headers.contains(&column) {
                headers.push(column);
            }
        }
    }
}

fn pad_row(row: &[String], width: usize) -> Vec<String> {
    let mut padded = row.to_vec();
    padded.resize(width, String::new());
    padded
}

/// One output row per contact: the i-th row is a copy of the input row with
/// contact i's fields in slot i. Zero contacts yield one unchanged row.
pub fn merge_contacts(
    headers: &[String],
    row: &[String],
    contacts: &[Contact],
) -> Vec<Vec<String>> {
    if contacts.is_empty() {
        return vec![pad_row(row, headers.len())];
    }

    contacts
        .iter()
        .take(MAX_CONTACTS_PER_COMPANY)
        .enumerate()
        .map(|(idx, contact)| {
            let mut out = pad_row(row, headers.len());
            let slot = idx + 1;
            let values = [&contact.name, &contact.position, &contact.profile_url];
            for (field, value) in CONTACT_FIELDS.iter().zip(values) {
                let column = format!("{} {}", field, slot);
                if let Some(col) = headers.iter().position(|h| *h == column) {
                    out[col] = value.clone();
                }
            }
            out
        })
        .collect()
}

pub fn enrich_row(
    scraper: &LeadScraper,
    driver: &dyn PageDriver,
    headers: &[String],
    row: &[String],
    company: &str,
    keywords: &[String],
) -> RowOutcome {
    match scraper.scrape(driver, company, keywords) {
        Ok(contacts) => RowOutcome {
            rows: merge_contacts(headers, row, &contacts),
            error: None,
        },
        Err(e) => RowOutcome {
            rows: vec![pad_row(row, headers.len())],
            error: Some(e),
        },
    }
}

/// The sequential per-row loop: pause check, blank-company short-circuit,
/// scrape with per-row fault isolation, write and flush every produced row,
/// inter-company delay after each scrape attempt.
#[allow(clippy::too_many_arguments)]
pub fn process_rows<W: io::Write>(
    controller: &SessionController,
    driver: &dyn PageDriver,
    scraper: &LeadScraper,
    pacing: &Pacing,
    headers: &[String],
    rows: &[Vec<String>],
    company_idx: usize,
    keywords: &[String],
    writer: &mut csv::Writer<W>,
    mut schedule: PauseSchedule,
) -> Result<(), EnrichmentError> {
    for (i, row) in rows.iter().enumerate() {
        schedule = controller.maybe_pause(driver, schedule);

        let company = row.get(company_idx).map(|c| c.trim()).unwrap_or("");
        if company.is_empty() {
            writer.write_record(&pad_row(row, headers.len()))?;
            writer.flush()?;
            continue;
        }

        info!("Processing company {}/{}: {}", i + 1, rows.len(), company);
        let outcome = enrich_row(scraper, driver, headers, row, company, keywords);
        if let Some(e) = &outcome.error {
            warn!(
                "Scrape failed for '{}': {} - row written unchanged",
                company, e
            );
        }
        for out_row in &outcome.rows {
            writer.write_record(out_row)?;
            writer.flush()?;
        }

        pacing.between_companies_delay();
    }
    Ok(())
}

/// Full pipeline: load and detect, resolve roles, extend the header schema,
/// gate on login, drive the row loop, and always tear the session down.
/// Returns the result file path.
pub fn run_enrichment(
    input: &Path,
    role_tags: &[String],
    result_dir: &Path,
) -> Result<PathBuf, EnrichmentError> {
    let Table {
        mut headers,
        rows,
        delimiter,
    } = table_loader::load(input)?;

    let keywords = roles::resolve(role_tags);
    let company_idx =
        table_loader::detect_company_column(&headers).ok_or(EnrichmentError::NoCompanyColumn)?;
    info!(
        "Enriching {} row(s), company column '{}', {} keyword(s)",
        rows.len(),
        headers[company_idx],
        keywords.len()
    );
    extend_headers(&mut headers);

    std::fs::create_dir_all(result_dir)?;
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("upload");
    let output_path = result_dir.join(format!("{}_result.csv", stem));

    let controller = SessionController::new();
    let session = controller.start(Path::new(PROFILE_DIR))?;

    let result = run_with_session(
        &controller,
        &session,
        &headers,
        &rows,
        company_idx,
        &keywords,
        delimiter,
        &output_path,
    );
    controller.stop(session);
    result?;

    info!("Enrichment finished: {:?}", output_path);
    Ok(output_path)
}

#[allow(clippy::too_many_arguments)]
fn run_with_session(
    controller: &SessionController,
    session: &Session,
    headers: &[String],
    rows: &[Vec<String>],
    company_idx: usize,
    keywords: &[String],
    delimiter: u8,
    output_path: &Path,
) -> Result<(), EnrichmentError> {
    if !controller.ensure_logged_in(session.driver()) {
        return Err(EnrichmentError::LoginFailed);
    }

    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(output_path)?;
    writer.write_record(headers)?;
    writer.flush()?;

    let scraper = LeadScraper::new();
    let pacing = Pacing::standard();
    let schedule = PauseSchedule::starting_at(Instant::now());

    process_rows(
        controller,
        session.driver(),
        &scraper,
        &pacing,
        headers,
        rows,
        company_idx,
        keywords,
        &mut writer,
        schedule,
    )?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::mock::MockDriver;
    use std::time::{Duration, Instant};

    fn owned(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn contact(name: &str) -> Contact {
        Contact {
            name: name.to_string(),
            position: "Personalleitung".to_string(),
            profile_url: "https://www.linkedin.com/sales/lead/a,b".to_string(),
        }
    }

    fn extended(headers: &[&str]) -> Vec<String> {
        let mut headers = owned(headers);
        extend_headers(&mut headers);
        headers
    }

    fn col<'a>(headers: &[String], row: &'a [String], name: &str) -> &'a str {
        let idx = headers.iter().position(|h| h == name).unwrap();
        &row[idx]
    }

    #[test]
    fn extension_appends_nine_unique_columns() {
        let headers = extended(&["ID", "Firma"]);
        assert_eq!(headers.len(), 2 + 9);
        assert_eq!(headers[2], "Name 1");
        assert_eq!(headers.last().unwrap(), "LinkedIn Profil 3");
        let unique: std::collections::HashSet<_> = headers.iter().collect();
        assert_eq!(unique.len(), headers.len());
    }

    #[test]
    fn extension_skips_columns_already_present() {
        let mut headers = owned(&["Firma", "Name 1"]);
        extend_headers(&mut headers);
        assert_eq!(headers.iter().filter(|h| *h == "Name 1").count(), 1);
        assert_eq!(headers.len(), 2 + 8);
    }

    #[test]
    fn two_contacts_yield_two_rows_with_third_slot_blank() {
        let headers = extended(&["ID", "Firma"]);
        let row = owned(&["7", "Acme"]);
        let merged = merge_contacts(&headers, &row, &[contact("Erika"), contact("Max")]);

        assert_eq!(merged.len(), 2);
        assert_eq!(col(&headers, &merged[0], "Name 1"), "Erika");
        assert_eq!(col(&headers, &merged[0], "LinkedIn Profil 3"), "");
        assert_eq!(col(&headers, &merged[1], "Name 2"), "Max");
        assert_eq!(col(&headers, &merged[1], "Name 1"), "");
        assert_eq!(merged[1][0], "7");
        assert_eq!(merged[1][1], "Acme");
    }

    #[test]
    fn zero_contacts_yield_one_unchanged_row() {
        let headers = extended(&["ID", "Firma"]);
        let row = owned(&["7", "Acme"]);
        let merged = merge_contacts(&headers, &row, &[]);
        assert_eq!(merged.len(), 1);
        assert_eq!(&merged[0][..2], &row[..]);
        assert!(merged[0][2..].iter().all(|v| v.is_empty()));
    }

    #[test]
    fn merge_respects_preexisting_contact_columns() {
        let headers = extended(&["Name 1", "Firma"]);
        let row = owned(&["", "Acme"]);
        let merged = merge_contacts(&headers, &row, &[contact("Erika")]);
        assert_eq!(merged[0][0], "Erika");
    }

    #[test]
    fn scrape_error_yields_unchanged_row_and_error() {
        let mut mock = MockDriver::new();
        mock.fail_navigate_on = Some(0);
        let scraper = LeadScraper::with_pacing(Pacing::none());
        let headers = extended(&["Firma"]);
        let row = owned(&["Acme"]);

        let outcome = enrich_row(&scraper, &mock, &headers, &row, "Acme", &[]);
        assert!(outcome.error.is_some());
        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.rows[0][0], "Acme");
    }

    fn far_future_schedule() -> PauseSchedule {
        PauseSchedule::with_next_pause_at(Instant::now() + Duration::from_secs(3600), 0)
    }

    fn run_loop(mock: &MockDriver, rows: &[Vec<String>], headers: &[String]) -> Vec<Vec<String>> {
        let controller = SessionController::with_login_prompt(Box::new(|| true));
        let scraper = LeadScraper::with_pacing(Pacing::none());
        let pacing = Pacing::none();
        let mut writer = csv::Writer::from_writer(Vec::new());

        process_rows(
            &controller,
            mock,
            &scraper,
            &pacing,
            headers,
            rows,
            0,
            &[],
            &mut writer,
            far_future_schedule(),
        )
        .unwrap();

        let bytes = writer.into_inner().ok().unwrap();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(bytes.as_slice());
        reader
            .records()
            .map(|r| r.unwrap().iter().map(|f| f.to_string()).collect())
            .collect()
    }

    #[test]
    fn one_failing_company_does_not_block_the_rest() {
        let mut mock = MockDriver::with_cards(vec![MockDriver::card(
            "Erika Muster\nPersonalleitung\nAcme",
            &["/sales/lead/a,b"],
        )]);
        // Second company's navigation blows up; first and third still scrape.
        mock.fail_navigate_on = Some(1);

        let headers = extended(&["Firma"]);
        let rows = vec![owned(&["Alpha"]), owned(&["Beta"]), owned(&["Gamma"])];
        let written = run_loop(&mock, &rows, &headers);

        assert_eq!(written.len(), 3);
        assert_eq!(col(&headers, &written[0], "Name 1"), "Erika Muster");
        assert_eq!(col(&headers, &written[1], "Name 1"), "");
        assert_eq!(written[1][0], "Beta");
        assert_eq!(col(&headers, &written[2], "Name 1"), "Erika Muster");
    }

    #[test]
    fn blank_company_rows_are_written_unchanged_without_scraping() {
        let mock = MockDriver::with_cards(vec![MockDriver::card(
            "Erika Muster\nPersonalleitung\nAcme",
            &["/sales/lead/a,b"],
        )]);
        let headers = extended(&["Firma"]);
        let rows = vec![owned(&["  "]), owned(&["Acme"])];
        let written = run_loop(&mock, &rows, &headers);

        assert_eq!(written.len(), 2);
        assert!(written[0].iter().all(|v| v.trim().is_empty()));
        // Only the non-blank company triggered a navigation.
        assert_eq!(mock.navigate_count.get(), 1);
    }

    #[test]
    fn output_never_has_fewer_rows_than_input() {
        let mut mock = MockDriver::new();
        mock.fail_navigate_on = Some(0);
        let headers = extended(&["Firma"]);
        let rows = vec![owned(&["Alpha"]), owned(&[""]), owned(&["Gamma"])];
        let written = run_loop(&mock, &rows, &headers);
        assert!(written.len() >= rows.len());
    }
}
