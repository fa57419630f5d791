//! Harvest candidate record
//!
//! One candidate per (subject, bibliographic source) variant to be harvested.
//! Registry keys are pure functions of the record's fields and are recomputed,
//! never stored independently of what they derive from.

use super::decision::{OaReason, OpenAccessResult};
use super::now_iso;
use super::record::BiblioRecord;
use crate::errors::{AppError, Result};
use crate::identity::{candidate_content_id, fingerprint};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Candidate lifecycle status. Unknown strings are rejected at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    Created,
    Queued,
    Processing,
    Completed,
    Failed,
}

impl CandidateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateStatus::Created => "created",
            CandidateStatus::Queued => "queued",
            CandidateStatus::Processing => "processing",
            CandidateStatus::Completed => "completed",
            CandidateStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for CandidateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CandidateStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "created" => Ok(CandidateStatus::Created),
            "queued" => Ok(CandidateStatus::Queued),
            "processing" => Ok(CandidateStatus::Processing),
            "completed" => Ok(CandidateStatus::Completed),
            "failed" => Ok(CandidateStatus::Failed),
            other => Err(AppError::Validation {
                message: format!("invalid candidate status: {other:?}"),
            }),
        }
    }
}

/// One harvestable (subject, source) candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub subject_id: String,
    pub source_code: String,
    pub venue_code: Option<String>,
    pub document_type: String,

    /// Registry dedup key for the (subject, source) pair
    pub fingerprint: String,

    /// Content id distinguishing variants of one source
    pub candidate_id: String,

    pub status: CandidateStatus,

    /// Lower = more urgent
    pub priority: u32,

    pub is_open_access: bool,
    pub open_access_url: Option<String>,
    pub oa_reason: OaReason,

    /// Route tag explaining the eligibility decision
    pub eligibility_reason: String,

    pub data_tags: Vec<String>,
    pub has_data: bool,

    pub entry_date: Option<String>,

    /// Set once at construction, never mutated afterwards
    pub created_at: String,

    /// Refreshed on every mutation
    pub updated_at: String,
}

impl CandidateRecord {
    /// Build the overall candidate for a record that passed classification.
    pub fn new(
        subject_id: &str,
        record: &BiblioRecord,
        oa: &OpenAccessResult,
        priority: u32,
        reason: &str,
    ) -> Result<Self> {
        let subject_id = subject_id.trim();
        if subject_id.is_empty() {
            return Err(AppError::MissingField {
                field: "subject_id".into(),
            });
        }
        let document_type = record.doctype_lower().to_string();
        let now = now_iso();

        Ok(Self {
            subject_id: subject_id.to_string(),
            source_code: record.source_code.clone(),
            venue_code: record.venue_code.clone(),
            fingerprint: fingerprint(subject_id, &record.source_code),
            candidate_id: candidate_content_id(
                &record.source_code,
                &document_type,
                oa.best_url.as_deref(),
                &record.data_tags,
            ),
            document_type,
            status: CandidateStatus::Created,
            priority,
            is_open_access: oa.is_open_access,
            open_access_url: oa.best_url.clone(),
            oa_reason: oa.reason,
            eligibility_reason: reason.to_string(),
            data_tags: record.data_tags.clone(),
            has_data: !record.data_tags.is_empty(),
            entry_date: record.entry_date.clone(),
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Derive a per-data-tag variant of this candidate. The variant carries a
    /// single tag, doctype `data`, its own content id, and fresh timestamps.
    pub fn data_variant(&self, tag: &str, priority: u32) -> Self {
        let tags = vec![tag.to_string()];
        let now = now_iso();
        Self {
            candidate_id: candidate_content_id(
                &self.source_code,
                "data",
                self.open_access_url.as_deref(),
                &tags,
            ),
            document_type: "data".to_string(),
            priority,
            data_tags: tags,
            has_data: true,
            created_at: now.clone(),
            updated_at: now,
            ..self.clone()
        }
    }

    /// Partition key: `SNAP#<candidate_id>`
    pub fn pk(&self) -> String {
        format!("SNAP#{}", self.candidate_id)
    }

    /// Sort key: `NOVA#<subject>#BIB#<source>`
    pub fn sk(&self) -> String {
        format!("NOVA#{}#BIB#{}", self.subject_id, self.source_code)
    }

    /// Status-based secondary partition: `STATUS#<status>`
    pub fn gsi1_pk(&self) -> String {
        format!("STATUS#{}", self.status)
    }

    /// Priority-ordered secondary sort: `<priority 3-digit>|<pk>`
    pub fn gsi1_sk(&self) -> String {
        format!("{:03}|{}", self.priority, self.pk())
    }

    /// Refresh the mutation timestamp.
    pub fn touch(&mut self) {
        self.updated_at = now_iso();
    }
}

/// Expand one accepted candidate into itself plus per-data-tag variants.
/// Tags referencing the resolution-source catalog are skipped so harvesting
/// never loops back into the catalog that produced the subject itself.
pub fn expand_with_variants(base: CandidateRecord, variant_priority: u32) -> Vec<CandidateRecord> {
    let mut out = Vec::with_capacity(1 + base.data_tags.len());
    let tags = base.data_tags.clone();
    out.push(base);
    for tag in tags {
        if tag.to_lowercase().contains("simbad") {
            continue;
        }
        let variant = out[0].data_variant(&tag, variant_priority);
        out.push(variant);
    }
    out
}
