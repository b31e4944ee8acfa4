use thiserror::Error;

/// Fatal conditions that abort a whole enrichment run. Anything recoverable
/// (a single company's scrape failing, a relogin that does not come back)
/// stays inside the row loop and never surfaces here.
#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("input file is empty")]
    EmptyFile,

    #[error("header row contains no usable column names")]
    NoHeader,

    #[error("no company column could be detected in the header row")]
    NoCompanyColumn,

    #[error("browser launch failed: {0}")]
    BrowserLaunch(String),

    #[error("login was not completed")]
    LoginFailed,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}
