//! Data model for the harvest pipeline
//!
//! - [`record`]: normalized bibliographic input records
//! - [`decision`]: derived open-access and eligibility results
//! - [`candidate`]: the harvest queue candidate with derived registry keys

pub mod candidate;
pub mod decision;
pub mod record;

pub use candidate::{expand_with_variants, CandidateRecord, CandidateStatus};
pub use decision::{EligibilityDecision, OaReason, OpenAccessResult};
pub use record::{parse_flexible_date, BiblioRecord, LinkEntry};

use chrono::Utc;

/// Current UTC timestamp, ISO-8601 at second precision.
pub fn now_iso() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_iso_second_precision() {
        let ts = now_iso();
        // e.g. 2025-09-07T12:34:56Z
        assert_eq!(ts.len(), 20);
        assert!(ts.ends_with('Z'));
        assert!(!ts.contains('.'));
    }
}
