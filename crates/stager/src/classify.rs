//! Eligibility & priority classification
//!
//! Rules run in order; the exclusion check is unconditional and short-circuits
//! everything else. Tier bases come from configuration and a recency bonus
//! (scaled linearly inside a configured window) lowers the numeric priority
//! for freshly indexed records. All date ambiguity degrades to a zero bonus,
//! never an error.

use crate::oa::{is_catalog, is_circular};
use chrono::NaiveDate;
use novaharvest_common::config::EligibilityConfig;
use novaharvest_common::model::{
    parse_flexible_date, BiblioRecord, EligibilityDecision, OpenAccessResult,
};

/// Decide whether a record qualifies for harvesting and at what priority.
pub fn classify(
    record: &BiblioRecord,
    oa: &OpenAccessResult,
    config: &EligibilityConfig,
    today: NaiveDate,
) -> EligibilityDecision {
    let doctype = record.doctype_lower();

    // 1) Hard exclusions, regardless of anything else
    if config.excluded_doctypes.contains(doctype) {
        return EligibilityDecision::ineligible();
    }

    let authors_ok = record.author_count > 0;
    let is_top = config.top_doctypes.contains(doctype) || is_circular(record) || is_catalog(record);

    // 2) Top category: circulars, catalogs, datasets
    if is_top && authors_ok && (record.has_abstract || oa.is_open_access) {
        return accept(config.tier0_base, "p0-top-doctype", record, config, today);
    }

    // 3) Major-venue articles, OA with authors
    if doctype == "article"
        && config.major_venues.contains(&record.venue_lower())
        && oa.is_open_access
        && authors_ok
    {
        return accept(config.tier1_base, "p1-major-venue-oa", record, config, today);
    }

    // 4) Anything else that is OA with authors
    if oa.is_open_access && authors_ok {
        return accept(config.tier2_base, "p2-open-access", record, config, today);
    }

    EligibilityDecision::ineligible()
}

fn accept(
    base: u32,
    reason: &str,
    record: &BiblioRecord,
    config: &EligibilityConfig,
    today: NaiveDate,
) -> EligibilityDecision {
    let bonus = recency_bonus(record, config, today);
    // Never promote past 1; priority 0 is reserved
    let priority = base.saturating_sub(bonus).max(1);
    EligibilityDecision::accept(priority, reason)
}

/// Bonus subtracted from the tier base, scaled linearly by how recent the
/// record is inside the configured window. Entry date is preferred over
/// publication date; unparseable or missing dates yield zero.
pub fn recency_bonus(record: &BiblioRecord, config: &EligibilityConfig, today: NaiveDate) -> u32 {
    let raw = record
        .entry_date
        .as_deref()
        .or(record.publication_date.as_deref());
    let Some(date) = raw.and_then(parse_flexible_date) else {
        return 0;
    };

    let window = i64::from(config.recency_window_days);
    // Future-dated entries count as age zero
    let age_days = (today - date).num_days().max(0);
    if age_days >= window {
        return 0;
    }

    let fraction = 1.0 - age_days as f64 / window as f64;
    let bonus = (f64::from(config.recency_max_bonus) * fraction).round() as u32;
    bonus.min(config.recency_max_bonus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use novaharvest_common::model::{OaReason, OpenAccessResult};
    use serde_json::json;

    fn record(doc: serde_json::Value) -> BiblioRecord {
        BiblioRecord::from_value(&doc).unwrap()
    }

    fn oa_open() -> OpenAccessResult {
        OpenAccessResult::open(Some("https://arxiv.org/pdf/x.pdf".into()), OaReason::Arxiv)
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 7).unwrap()
    }

    #[test]
    fn test_excluded_doctype_always_ineligible() {
        let config = EligibilityConfig::default();
        let rec = record(json!({
            "bibcode": "2010proposal....ZZ",
            "doctype": "proposal",
            "author_count": 5,
            "abstract": "text"
        }));
        let decision = classify(&rec, &oa_open(), &config, today());
        assert!(!decision.eligible);
        assert_eq!(decision.priority, None);
    }

    #[test]
    fn test_circular_gets_tier0() {
        let config = EligibilityConfig::default();
        let rec = record(json!({
            "bibcode": "2012ATel.4321....1B",
            "bibstem": "ATel",
            "doctype": "circular",
            "entry_date": "2012-05-01T12:34:56Z",
            "author_count": 2
        }));
        let oa = OpenAccessResult::open(None, OaReason::CircularHtml);
        let decision = classify(&rec, &oa, &config, today());
        assert!(decision.eligible);
        // entry from 2012: no recency bonus
        assert_eq!(decision.priority, Some(10));
        assert!(decision.reason.unwrap().starts_with("p0"));
    }

    #[test]
    fn test_circular_without_authors_is_ineligible() {
        let config = EligibilityConfig::default();
        let rec = record(json!({
            "bibcode": "2012ATel.4321....1B",
            "bibstem": "ATel",
            "doctype": "circular",
            "author_count": 0
        }));
        let oa = OpenAccessResult::open(None, OaReason::CircularHtml);
        assert!(!classify(&rec, &oa, &config, today()).eligible);
    }

    #[test]
    fn test_major_venue_article_gets_tier1_with_bonus() {
        let config = EligibilityConfig::default();
        let entry = (today() - Duration::days(5)).format("%Y-%m-%d").to_string();
        let rec = record(json!({
            "bibcode": "2025MNRAS.0000..123X",
            "bibstem": "MNRAS",
            "doctype": "article",
            "entry_date": entry,
            "author_count": 3
        }));
        let decision = classify(&rec, &oa_open(), &config, today());
        assert!(decision.eligible);
        // base 50 - bonus 5 (5 days inside a 365-day window rounds to 5)
        assert_eq!(decision.priority, Some(45));
        assert!(decision.reason.unwrap().starts_with("p1"));
    }

    #[test]
    fn test_other_doctype_oa_with_authors_gets_tier2() {
        let config = EligibilityConfig::default();
        let rec = record(json!({
            "bibcode": "2015JAVSO..43..123B",
            "bibstem": "JAVSO",
            "doctype": "article",
            "entry_date": "2015-01-01",
            "author_count": 1
        }));
        let decision = classify(&rec, &oa_open(), &config, today());
        assert!(decision.eligible);
        assert_eq!(decision.priority, Some(90));
        assert!(decision.reason.unwrap().starts_with("p2"));
    }

    #[test]
    fn test_closed_record_without_top_category_is_ineligible() {
        let config = EligibilityConfig::default();
        let rec = record(json!({
            "bibcode": "b",
            "bibstem": "Obs",
            "doctype": "article",
            "author_count": 4
        }));
        let decision = classify(&rec, &OpenAccessResult::closed(), &config, today());
        assert!(!decision.eligible);
    }

    #[test]
    fn test_recency_bonus_boundaries() {
        let config = EligibilityConfig::default();

        let at = |days_ago: i64| {
            let entry = (today() - Duration::days(days_ago))
                .format("%Y-%m-%d")
                .to_string();
            let rec = record(json!({"bibcode": "b", "entry_date": entry}));
            recency_bonus(&rec, &config, today())
        };

        assert_eq!(at(0), 5, "age zero gets the full bonus");
        assert_eq!(at(365), 0, "window boundary gets none");
        assert_eq!(at(400), 0, "beyond the window gets none");
        assert_eq!(at(182), 3, "mid-window scales linearly");
        assert_eq!(at(183), 2);
    }

    #[test]
    fn test_recency_bonus_unparseable_date_is_zero() {
        let config = EligibilityConfig::default();
        let rec = record(json!({"bibcode": "b", "entry_date": "not-a-date"}));
        assert_eq!(recency_bonus(&rec, &config, today()), 0);
    }

    #[test]
    fn test_recency_bonus_falls_back_to_publication_date() {
        let config = EligibilityConfig::default();
        let date = (today() - Duration::days(10)).format("%Y-%m-%d").to_string();
        let rec = record(json!({"bibcode": "b", "date": date}));
        assert!(recency_bonus(&rec, &config, today()) > 0);
    }

    #[test]
    fn test_priority_never_drops_below_one() {
        let mut config = EligibilityConfig::default();
        config.tier0_base = 3;
        config.tier1_base = 4;
        config.tier2_base = 5;
        config.recency_max_bonus = 10;
        let entry = today().format("%Y-%m-%d").to_string();
        let rec = record(json!({
            "bibcode": "2025ATel.9999....1X",
            "bibstem": "ATel",
            "doctype": "circular",
            "entry_date": entry,
            "author_count": 1,
            "abstract": "x"
        }));
        let oa = OpenAccessResult::open(None, OaReason::CircularHtml);
        let decision = classify(&rec, &oa, &config, today());
        assert_eq!(decision.priority, Some(1));
    }
}
