//! Batch staging pipeline
//!
//! Takes one subject's raw record batch and drives every record through
//! normalize -> open-access evaluation -> classification -> registry upsert.
//! Malformed records are skipped and counted, never fatal; registry failures
//! propagate so the orchestration layer can retry the whole batch.

use crate::classify::classify;
use crate::oa::evaluate_open_access;
use chrono::Utc;
use novaharvest_common::config::EligibilityConfig;
use novaharvest_common::errors::{AppError, Result};
use novaharvest_common::model::{expand_with_variants, BiblioRecord, CandidateRecord};
use novaharvest_common::registry::{upsert, CandidateStore};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Counters for one staged batch.
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Records examined, malformed ones included
    pub processed: usize,
    /// Records that failed normalization and were skipped
    pub malformed: usize,
    /// Records rejected by classification
    pub ineligible: usize,
    /// Candidates written (variants included)
    pub eligible: usize,
    /// Registry entries newly created
    pub created: usize,
    /// Existing entries whose priority improved
    pub updated: usize,
    /// Existing entries seen again with no priority change
    pub priority_unchanged: usize,
}

/// Stage one subject's record batch into the registry.
///
/// Every accepted candidate is expanded into itself plus its per-data-tag
/// variants before upserting, so a single literature record can seed several
/// harvest entries.
#[tracing::instrument(skip(raw_records, config, store), fields(records = raw_records.len()))]
pub async fn stage_records(
    subject_id: &str,
    raw_records: &[Value],
    snapshot_key: Option<&str>,
    config: &EligibilityConfig,
    store: &dyn CandidateStore,
) -> Result<BatchSummary> {
    let subject_id = subject_id.trim();
    if subject_id.is_empty() {
        return Err(AppError::MissingField {
            field: "subject_id".into(),
        });
    }

    let today = Utc::now().date_naive();
    let mut summary = BatchSummary::default();

    for raw in raw_records {
        summary.processed += 1;

        let record = match BiblioRecord::from_value(raw) {
            Ok(record) => record,
            Err(e) => {
                warn!(subject_id, error = %e, "skipping malformed record");
                metrics::counter!("harvest_records_malformed_total").increment(1);
                summary.malformed += 1;
                continue;
            }
        };

        let oa = evaluate_open_access(&record);
        let decision = classify(&record, &oa, config, today);
        let (Some(priority), Some(reason)) = (decision.priority, decision.reason.as_deref())
        else {
            debug!(
                subject_id,
                source = %record.source_code,
                "record ineligible"
            );
            metrics::counter!("harvest_records_ineligible_total").increment(1);
            summary.ineligible += 1;
            continue;
        };

        let base = CandidateRecord::new(subject_id, &record, &oa, priority, reason)?;
        for candidate in expand_with_variants(base, config.data_variant_priority) {
            let outcome = upsert(store, &candidate, snapshot_key, &config.rule_version).await?;
            summary.eligible += 1;
            metrics::counter!("harvest_candidates_eligible_total").increment(1);
            if outcome.created {
                summary.created += 1;
                metrics::counter!("harvest_candidates_created_total").increment(1);
            } else if outcome.priority_improved {
                summary.updated += 1;
                metrics::counter!("harvest_candidates_updated_total").increment(1);
            } else {
                summary.priority_unchanged += 1;
            }
        }
    }

    info!(
        subject_id,
        processed = summary.processed,
        malformed = summary.malformed,
        ineligible = summary.ineligible,
        eligible = summary.eligible,
        created = summary.created,
        "batch staged"
    );
    metrics::counter!("harvest_records_processed_total").increment(summary.processed as u64);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use novaharvest_common::registry::MemoryRegistry;
    use serde_json::json;

    fn atel_record() -> Value {
        json!({
            "bibcode": "2023ATel15925....1K",
            "bibstem": ["ATel"],
            "doctype": "circular",
            "author": ["Kuin, N. P. M."],
            "abstract": "Swift observations of the nova.",
            "entry_date": "2023-02-20T00:00:00Z"
        })
    }

    fn proposal_record() -> Value {
        json!({
            "bibcode": "2020hst..prop16222W",
            "bibstem": ["hst..prop"],
            "doctype": "proposal",
            "author": ["Walter, F."]
        })
    }

    #[tokio::test]
    async fn test_circular_is_staged_ready_at_top_priority() {
        let store = MemoryRegistry::new();
        let config = EligibilityConfig::default();
        let summary = stage_records(
            "V1324 Sco",
            &[atel_record()],
            Some("staging/ads/2025/09/07/v1324-sco.json"),
            &config,
            &store,
        )
        .await
        .unwrap();

        assert_eq!(summary.processed, 1);
        assert_eq!(summary.eligible, 1);
        assert_eq!(summary.created, 1);
        assert_eq!(store.len(), 1);

        let entry = store
            .get(
                &store_pk(&store),
                "NOVA#V1324 Sco#BIB#2023ATel15925....1K",
            )
            .unwrap();
        assert!(entry.pk.starts_with("SNAP#"));
        assert_eq!(entry.status, "READY");
        // Top tier base, no recency bonus left for a 2023 entry date
        assert_eq!(entry.priority, 10);
        assert_eq!(entry.gsi1_pk, "STATUS#READY");
        assert!(entry.gsi1_sk.starts_with("010|SNAP#"));
        assert_eq!(
            entry.snapshot_key.as_deref(),
            Some("staging/ads/2025/09/07/v1324-sco.json")
        );
    }

    #[tokio::test]
    async fn test_proposal_is_ineligible_and_nothing_is_written() {
        let store = MemoryRegistry::new();
        let config = EligibilityConfig::default();
        let summary = stage_records("V1324 Sco", &[proposal_record()], None, &config, &store)
            .await
            .unwrap();

        assert_eq!(summary.processed, 1);
        assert_eq!(summary.ineligible, 1);
        assert_eq!(summary.eligible, 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_recent_major_venue_article_gets_bonus() {
        let store = MemoryRegistry::new();
        let config = EligibilityConfig::default();
        let entry_date = Utc::now().format("%Y-%m-%dT00:00:00Z").to_string();
        let record = json!({
            "bibcode": "2025MNRAS.540.1234S",
            "bibstem": ["MNRAS"],
            "doctype": "article",
            "author": ["Starrfield, S.", "Woodward, C. E."],
            "abstract": "Spectroscopy of the eruption.",
            "entry_date": entry_date,
            "links_data": [
                {"title": "arXiv PDF", "url": "https://arxiv.org/pdf/2501.01234.pdf"}
            ]
        });

        let summary = stage_records("V1324 Sco", &[record], None, &config, &store)
            .await
            .unwrap();
        assert_eq!(summary.created, 1);

        let entry = store
            .get(&store_pk(&store), "NOVA#V1324 Sco#BIB#2025MNRAS.540.1234S")
            .unwrap();
        // Tier-1 base 50 minus the full recency bonus of 5
        assert_eq!(entry.priority, 45);
    }

    #[tokio::test]
    async fn test_data_tags_expand_into_variant_candidates() {
        let store = MemoryRegistry::new();
        let config = EligibilityConfig::default();
        let record = json!({
            "bibcode": "2023ATel15925....1K",
            "bibstem": ["ATel"],
            "doctype": "circular",
            "author": ["Kuin, N. P. M."],
            "abstract": "Photometry.",
            "data": ["MAST:3", "SIMBAD:1", "CDS:2"]
        });

        let summary = stage_records("V1324 Sco", &[record], None, &config, &store)
            .await
            .unwrap();
        // Base candidate plus MAST and CDS variants; SIMBAD tags are skipped
        assert_eq!(summary.eligible, 3);
        assert_eq!(summary.created, 3);
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn test_malformed_records_are_counted_not_fatal() {
        let store = MemoryRegistry::new();
        let config = EligibilityConfig::default();
        let batch = [json!({"doctype": "circular"}), atel_record(), json!(42)];

        let summary = stage_records("V1324 Sco", &batch, None, &config, &store)
            .await
            .unwrap();
        assert_eq!(summary.processed, 3);
        assert_eq!(summary.malformed, 2);
        assert_eq!(summary.created, 1);
    }

    #[tokio::test]
    async fn test_summary_accounts_for_every_record() {
        let store = MemoryRegistry::new();
        let config = EligibilityConfig::default();
        let batch = [atel_record(), proposal_record(), json!({"doctype": "x"})];

        let summary = stage_records("V1324 Sco", &batch, None, &config, &store)
            .await
            .unwrap();
        // Every record lands in exactly one bucket, and every eligible
        // candidate lands in exactly one upsert outcome.
        assert_eq!(summary.processed, 3);
        assert_eq!(
            summary.malformed + summary.ineligible + 1, // 1 record yielded candidates
            summary.processed
        );
        assert_eq!(
            summary.created + summary.updated + summary.priority_unchanged,
            summary.eligible
        );
    }

    #[tokio::test]
    async fn test_blank_subject_is_rejected() {
        let store = MemoryRegistry::new();
        let config = EligibilityConfig::default();
        let err = stage_records("   ", &[atel_record()], None, &config, &store)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::MissingField { .. }));
    }

    #[tokio::test]
    async fn test_restaging_same_batch_is_idempotent() {
        let store = MemoryRegistry::new();
        let config = EligibilityConfig::default();
        let first = stage_records("V1324 Sco", &[atel_record()], None, &config, &store)
            .await
            .unwrap();
        let second = stage_records("V1324 Sco", &[atel_record()], None, &config, &store)
            .await
            .unwrap();

        assert_eq!(first.created, 1);
        assert_eq!(second.created, 0);
        assert_eq!(second.priority_unchanged, 1);
        assert_eq!(store.len(), 1);
    }

    /// Single-entry stores in these tests; fish out the generated pk.
    fn store_pk(store: &MemoryRegistry) -> String {
        store
            .entries()
            .into_iter()
            .map(|e| e.pk)
            .next()
            .expect("store has at least one entry")
    }
}
