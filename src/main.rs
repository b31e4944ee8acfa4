use lead_enricher_lib::{enrichment, logger};
use log::{error, info};
use std::env;
use std::path::Path;
use std::process::ExitCode;

const RESULT_DIR: &str = "results";

/// Local runner: `lead-enricher <input.csv> [roles,comma,separated]`.
/// Same pipeline as the upload endpoint, without the HTTP layer.
fn main() -> ExitCode {
    logger::init();

    let args: Vec<String> = env::args().collect();
    let input = match args.get(1) {
        Some(path) => path,
        None => {
            eprintln!("Usage: lead-enricher <input.csv> [roles,comma,separated]");
            return ExitCode::FAILURE;
        }
    };
    let role_tags: Vec<String> = args
        .get(2)
        .map(|raw| {
            raw.split(',')
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .collect()
        })
        .unwrap_or_default();

    info!("Starting enrichment of {} with roles {:?}", input, role_tags);
    match enrichment::run_enrichment(Path::new(input), &role_tags, Path::new(RESULT_DIR)) {
        Ok(output) => {
            info!("Result written to {:?}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Enrichment failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
