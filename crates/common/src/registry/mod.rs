//! Registry upsert protocol
//!
//! The registry is the only synchronization point in the pipeline: multiple
//! invocations may race to stage the same candidate, and correctness rests on
//! the backing store's conditional-write primitive, never on in-process
//! locking. The store abstraction exposes exactly three operations so any
//! backend (DynamoDB in production, an in-memory map in tests) can implement
//! the same optimistic protocol:
//!
//! 1. create-if-absent,
//! 2. update-priority-only-if-better,
//! 3. unconditional refresh of volatile descriptive fields.

pub mod dynamo;
pub mod memory;

pub use dynamo::DynamoRegistry;
pub use memory::MemoryRegistry;

use crate::errors::Result;
use crate::model::{now_iso, CandidateRecord};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Composite key addressing one registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryKey {
    pub pk: String,
    pub sk: String,
}

/// Persisted form of a candidate plus store-only bookkeeping.
///
/// Owned exclusively by this module; no other component writes entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub pk: String,
    pub sk: String,

    pub fingerprint: String,
    pub candidate_id: String,
    pub subject_id: String,
    pub source_code: String,
    pub venue_code: Option<String>,
    pub document_type: String,

    /// Queue state of the entry; entries start ready for pickup.
    pub status: String,
    pub priority: u32,
    pub reason: String,

    pub entry_date: Option<String>,
    pub open_access_url: Option<String>,
    pub oa_reason: String,
    pub data_tags: Vec<String>,
    pub has_data: bool,

    /// Pointer to the latest raw source snapshot in staging storage
    pub snapshot_key: Option<String>,
    pub rule_version: String,

    /// At-most-once processing bookkeeping
    pub attempts: u32,
    pub lease_expires_at: i64,

    pub created_at: String,
    pub updated_at: String,

    pub gsi1_pk: String,
    pub gsi1_sk: String,
}

/// Initial queue state for newly created entries.
pub const STATUS_READY: &str = "READY";

impl RegistryEntry {
    /// Build the persisted form of a candidate.
    pub fn from_candidate(
        candidate: &CandidateRecord,
        snapshot_key: Option<&str>,
        rule_version: &str,
    ) -> Self {
        let now = now_iso();
        Self {
            pk: candidate.pk(),
            sk: candidate.sk(),
            fingerprint: candidate.fingerprint.clone(),
            candidate_id: candidate.candidate_id.clone(),
            subject_id: candidate.subject_id.clone(),
            source_code: candidate.source_code.clone(),
            venue_code: candidate.venue_code.clone(),
            document_type: candidate.document_type.clone(),
            status: STATUS_READY.to_string(),
            priority: candidate.priority,
            reason: candidate.eligibility_reason.clone(),
            entry_date: candidate.entry_date.clone(),
            open_access_url: candidate.open_access_url.clone(),
            oa_reason: candidate.oa_reason.to_string(),
            data_tags: candidate.data_tags.clone(),
            has_data: candidate.has_data,
            snapshot_key: snapshot_key.map(str::to_string),
            rule_version: rule_version.to_string(),
            attempts: 0,
            lease_expires_at: 0,
            created_at: now.clone(),
            updated_at: now,
            gsi1_pk: format!("STATUS#{STATUS_READY}"),
            gsi1_sk: candidate.gsi1_sk(),
        }
    }

    pub fn key(&self) -> EntryKey {
        EntryKey {
            pk: self.pk.clone(),
            sk: self.sk.clone(),
        }
    }
}

/// Descriptive fields that always reflect the most recent observation,
/// refreshed even when the stored priority does not improve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolatileFields {
    pub open_access_url: Option<String>,
    pub oa_reason: String,
    pub snapshot_key: Option<String>,
    pub updated_at: String,
}

/// Result of one upsert call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UpsertOutcome {
    pub created: bool,
    pub enqueued: bool,
    pub priority_improved: bool,
    pub priority: u32,
}

/// Optimistic store operations every registry backend must provide.
#[async_trait]
pub trait CandidateStore: Send + Sync {
    /// Write the entry only if no entry exists for its key.
    /// Returns `false` when the key is already taken (not an error).
    async fn create_if_absent(&self, entry: &RegistryEntry) -> Result<bool>;

    /// Lower the stored priority to `priority` only if it is strictly better
    /// (numerically lower) than the stored one, or none is stored. Also
    /// rewrites the priority-derived sort key. Returns `false` when the
    /// stored priority was already at least as good.
    async fn update_priority_if_better(
        &self,
        key: &EntryKey,
        priority: u32,
        gsi1_sk: &str,
        reason: &str,
        updated_at: &str,
    ) -> Result<bool>;

    /// Unconditionally refresh volatile descriptive fields of an existing
    /// entry. The entry must exist; its absence indicates concurrent
    /// deletion and is surfaced as a hard error.
    async fn refresh_volatile(&self, key: &EntryKey, fields: &VolatileFields) -> Result<()>;
}

/// Idempotent claim-or-update of one candidate against the registry.
///
/// Calling twice with identical inputs yields `created=true` then
/// `created=false` with no field changes besides `updated_at`.
pub async fn upsert(
    store: &dyn CandidateStore,
    candidate: &CandidateRecord,
    snapshot_key: Option<&str>,
    rule_version: &str,
) -> Result<UpsertOutcome> {
    let entry = RegistryEntry::from_candidate(candidate, snapshot_key, rule_version);
    let key = entry.key();

    if store.create_if_absent(&entry).await? {
        debug!(pk = %key.pk, priority = candidate.priority, "registry entry created");
        return Ok(UpsertOutcome {
            created: true,
            enqueued: true,
            priority_improved: false,
            priority: candidate.priority,
        });
    }

    let now = now_iso();
    let improved = store
        .update_priority_if_better(
            &key,
            candidate.priority,
            &candidate.gsi1_sk(),
            &entry.reason,
            &now,
        )
        .await?;

    // Volatile fields track the latest observation regardless of whether
    // the priority moved.
    store
        .refresh_volatile(
            &key,
            &VolatileFields {
                open_access_url: candidate.open_access_url.clone(),
                oa_reason: candidate.oa_reason.to_string(),
                snapshot_key: snapshot_key.map(str::to_string),
                updated_at: now,
            },
        )
        .await?;

    debug!(pk = %key.pk, improved, "registry entry updated");
    Ok(UpsertOutcome {
        created: false,
        enqueued: true,
        priority_improved: improved,
        priority: candidate.priority,
    })
}
