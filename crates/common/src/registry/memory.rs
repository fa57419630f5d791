//! In-memory registry backend
//!
//! Implements the same conditional-write semantics as the DynamoDB backend
//! against a plain map, so the upsert protocol can be exercised in tests
//! without any AWS dependency.

use super::{CandidateStore, EntryKey, RegistryEntry, VolatileFields};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct MemoryRegistry {
    entries: Mutex<HashMap<(String, String), RegistryEntry>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a stored entry (test inspection).
    pub fn get(&self, pk: &str, sk: &str) -> Option<RegistryEntry> {
        self.entries
            .lock()
            .expect("registry lock poisoned")
            .get(&(pk.to_string(), sk.to_string()))
            .cloned()
    }

    /// Number of stored entries (test inspection).
    pub fn len(&self) -> usize {
        self.entries.lock().expect("registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all stored entries (test inspection).
    pub fn entries(&self) -> Vec<RegistryEntry> {
        self.entries
            .lock()
            .expect("registry lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    /// Remove an entry, simulating concurrent deletion.
    pub fn remove(&self, pk: &str, sk: &str) {
        self.entries
            .lock()
            .expect("registry lock poisoned")
            .remove(&(pk.to_string(), sk.to_string()));
    }
}

#[async_trait]
impl CandidateStore for MemoryRegistry {
    async fn create_if_absent(&self, entry: &RegistryEntry) -> Result<bool> {
        let mut entries = self.entries.lock().expect("registry lock poisoned");
        let key = (entry.pk.clone(), entry.sk.clone());
        if entries.contains_key(&key) {
            return Ok(false);
        }
        entries.insert(key, entry.clone());
        Ok(true)
    }

    async fn update_priority_if_better(
        &self,
        key: &EntryKey,
        priority: u32,
        gsi1_sk: &str,
        reason: &str,
        updated_at: &str,
    ) -> Result<bool> {
        let mut entries = self.entries.lock().expect("registry lock poisoned");
        let Some(entry) = entries.get_mut(&(key.pk.clone(), key.sk.clone())) else {
            return Ok(false);
        };
        if entry.priority <= priority {
            return Ok(false);
        }
        entry.priority = priority;
        entry.gsi1_sk = gsi1_sk.to_string();
        entry.reason = reason.to_string();
        entry.updated_at = updated_at.to_string();
        Ok(true)
    }

    async fn refresh_volatile(&self, key: &EntryKey, fields: &VolatileFields) -> Result<()> {
        let mut entries = self.entries.lock().expect("registry lock poisoned");
        let Some(entry) = entries.get_mut(&(key.pk.clone(), key.sk.clone())) else {
            return Err(AppError::RegistryEntryVanished {
                key: key.pk.clone(),
            });
        };
        entry.open_access_url = fields.open_access_url.clone();
        entry.oa_reason = fields.oa_reason.clone();
        entry.snapshot_key = fields.snapshot_key.clone();
        entry.updated_at = fields.updated_at.clone();
        Ok(())
    }
}
