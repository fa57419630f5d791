//! Open-access evaluation
//!
//! An ordered rule cascade over a record's links, property flags, and venue;
//! the first matching tier wins and within a tier the first qualifying link
//! wins, so the result is stable for a given record. Pure function, no I/O;
//! records with missing or malformed link data simply fall through.

use novaharvest_common::model::{BiblioRecord, OaReason, OpenAccessResult};

const ADS_UI: &str = "https://ui.adsabs.harvard.edu/abs/";

/// Venue stems whose entries are circulars regardless of doctype.
pub const CIRCULAR_STEMS: [&str; 3] = ["atel", "cbet", "iauc"];

/// Venue stems whose entries are catalogs regardless of doctype.
pub const CATALOG_STEMS: [&str; 1] = ["ycat"];

/// Decide open-access status, best retrievable URL, and the route taken.
pub fn evaluate_open_access(record: &BiblioRecord) -> OpenAccessResult {
    // 1) Circulars are public HTML; no link inspection needed.
    if is_circular(record) {
        return OpenAccessResult::open(
            Some(circular_landing_url(record)),
            OaReason::CircularHtml,
        );
    }

    // 2) arXiv PDF
    for link in &record.links {
        let url = link.url.to_lowercase();
        if (link.label.contains("arxiv") || url.contains("arxiv.org")) && url.contains("pdf") {
            return OpenAccessResult::open(Some(link.url.clone()), OaReason::Arxiv);
        }
    }

    // 3) ADS-hosted PDFs and scans
    for link in &record.links {
        if link.label.contains("ads pdf")
            || link.label.contains("ads scanned")
            || link.label.contains("ads full text")
        {
            return OpenAccessResult::open(Some(link.url.clone()), OaReason::AdsScan);
        }
    }

    // 4) Publisher OA, only when the record is flagged open access
    let oa_flagged = record.properties.contains("openaccess")
        || record.properties.contains("eprint_openaccess");
    if oa_flagged {
        for link in &record.links {
            let url = link.url.to_lowercase();
            if link.label.contains("publisher")
                && (url.contains("pdf")
                    || link.label.contains("article")
                    || link.label.contains("html"))
            {
                return OpenAccessResult::open(Some(link.url.clone()), OaReason::PublisherOa);
            }
        }
        // 5) Flagged OA but no link we can use
        return OpenAccessResult::open(None, OaReason::PropertyOnly);
    }

    // 6) Nothing matched
    OpenAccessResult::closed()
}

/// True for circular doctypes and circular venue stems.
pub fn is_circular(record: &BiblioRecord) -> bool {
    record.doctype_lower() == "circular" || CIRCULAR_STEMS.contains(&record.venue_lower().as_str())
}

/// True for catalog doctypes and catalog venue stems.
pub fn is_catalog(record: &BiblioRecord) -> bool {
    record.doctype_lower() == "catalog" || CATALOG_STEMS.contains(&record.venue_lower().as_str())
}

/// Landing URL for a circular. Circular numbering is not derivable from a
/// bibcode alone, so the abstract page stands in; it is always publicly
/// readable.
fn circular_landing_url(record: &BiblioRecord) -> String {
    format!("{ADS_UI}{}/abstract", record.source_code)
}
