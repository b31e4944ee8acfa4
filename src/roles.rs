//! Role tags and their search keywords.
//!
//! A role tag is a department bucket the caller selects in the upload form.
//! Each known tag maps to a fixed list of job-title keywords used both to
//! build the search query and to filter result cards by position text.

/// Role tags offered to the frontend. Tags without a keyword mapping are
/// accepted and simply contribute nothing to the search.
pub const SUPPORTED_ROLES: &[&str] = &[
    "Marketing",
    "Vertrieb",
    "HR",
    "IT",
    "Geschäftsführung",
    "Einkauf",
    "Logistik",
    "Produktmanagement",
];

const KEYWORD_TABLE: &[(&str, &[&str])] = &[
    (
        "Marketing",
        &[
            "Marketingleitung",
            "Leitung Performance Marketing",
            "Leitung Online Marketing",
            "Leitung Brand Management",
            "Leitung Digitale Projekte",
            "E-Commerce Leitung",
            "Personalmarketingleitung",
            "Leitung Employer Branding",
        ],
    ),
    (
        "IT",
        &[
            "IT-Leitung",
            "Leitung IT-Innovation",
            "IT-Prozessleitung",
            "Datenschutzbeauftragter",
            "IT-Admin",
            "Leitung Controlling",
            "EDV-Leitung",
            "Leitung IT-Sicherheit",
            "IT Projektleitung",
            "SAP-Leitung",
            "Chief Information Officer (CIO)",
        ],
    ),
    (
        "HR",
        &[
            "Personalleitung",
            "Leitung Personal Entwicklung",
            "BGM - Leitung",
            "Büroleitung",
            "Leitung Recruiting",
            "Leitung Buchhaltung",
        ],
    ),
    (
        "GF",
        &[
            "Geschäftsleitung",
            "Technische Geschäftsleitung",
            "Kaufmännische Geschäftsleitung",
            "Prokurist",
            "Assistenz der Geschäftsleitung",
            "COO (Chief Operating Officer)",
            "Geschäftsleitung (Stellvertretung)",
        ],
    ),
    (
        "Produktion",
        &[
            "Fertigungsleitung",
            "Lagerleitung",
            "Leitung Materialwirtschaft",
            "Leitung Produktion",
            "Leitung Produktion (Stellvertretung)",
            "Qualitätsleiter",
            "Leitung Fuhrpark",
            "Leitung Konfektionierung",
            "Leitung Versand",
            "Leitung Digital Transformation",
        ],
    ),
];

/// Flatten the keyword lists of all known tags, input order first, table
/// order within a tag. Unknown tags contribute nothing; duplicates survive.
/// An empty result tells the scraper to run keyword-free.
pub fn resolve(role_tags: &[String]) -> Vec<String> {
    let mut keywords = Vec::new();
    for tag in role_tags {
        let tag = tag.trim();
        if let Some((_, list)) = KEYWORD_TABLE.iter().find(|(name, _)| *name == tag) {
            keywords.extend(list.iter().map(|kw| kw.to_string()));
        }
    }
    keywords
}
