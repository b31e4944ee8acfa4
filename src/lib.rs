pub mod delay_manager;
pub mod driver;
pub mod enrichment;
pub mod error;
pub mod lead_scraper;
pub mod logger;
pub mod roles;
pub mod session;
pub mod table_loader;

// Exporting types for convenience
pub use driver::{ChromeDriver, PageDriver};
pub use enrichment::run_enrichment;
pub use error::EnrichmentError;
pub use lead_scraper::{Contact, LeadScraper};
pub use session::{PauseSchedule, Session, SessionController};
pub use table_loader::Table;
