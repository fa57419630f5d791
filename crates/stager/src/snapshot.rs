//! Staging snapshots
//!
//! Raw record batches are written to object storage under immutable,
//! date-partitioned keys, with an optional `latest/` pointer per subject.
//! The sink is a trait so the handler can be tested against an in-memory
//! map instead of S3.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Timelike, Utc};
use novaharvest_common::errors::{AppError, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

/// Storage-safe slug from an arbitrary subject name: lowercase ASCII
/// alphanumerics with runs of everything else collapsed to single dashes,
/// capped at 80 characters.
pub fn slugify(name: &str) -> String {
    let mut out = String::new();
    let mut last_dash = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    let trimmed = out.trim_matches('-');
    let capped: String = trimmed.chars().take(80).collect();
    if capped.is_empty() {
        "unknown".to_string()
    } else {
        capped
    }
}

/// Date-partitioned snapshot key: `{prefix}/{yyyy}/{mm}/{dd}/{slug}-{ts}.json`
pub fn snapshot_key(prefix: &str, slug: &str, at: DateTime<Utc>) -> String {
    format!(
        "{prefix}/{:04}/{:02}/{:02}/{slug}-{}.json",
        at.year(),
        at.month(),
        at.day(),
        compact_ts(at),
    )
}

/// Per-subject pointer key: `{prefix}/latest/{slug}.json`
pub fn latest_key(prefix: &str, slug: &str) -> String {
    format!("{prefix}/latest/{slug}.json")
}

fn compact_ts(at: DateTime<Utc>) -> String {
    format!(
        "{:04}{:02}{:02}T{:02}{:02}{:02}Z",
        at.year(),
        at.month(),
        at.day(),
        at.hour(),
        at.minute(),
        at.second(),
    )
}

/// Destination for JSON snapshots.
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    async fn put_json(&self, key: &str, body: &Value) -> Result<()>;
}

/// S3-backed sink.
pub struct S3SnapshotSink {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3SnapshotSink {
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    pub async fn from_env(bucket: impl Into<String>) -> Self {
        let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(aws_sdk_s3::Client::new(&aws_config), bucket)
    }
}

#[async_trait]
impl SnapshotSink for S3SnapshotSink {
    async fn put_json(&self, key: &str, body: &Value) -> Result<()> {
        let bytes = serde_json::to_vec(body)?;
        let size = bytes.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(bytes.into())
            .content_type("application/json; charset=utf-8")
            .send()
            .await
            .map_err(|e| AppError::StorageError {
                message: format!("put_object {key}: {e}"),
            })?;
        debug!(key, size, "snapshot written");
        Ok(())
    }
}

/// In-memory sink for tests.
#[derive(Default)]
pub struct MemorySnapshotSink {
    objects: Mutex<HashMap<String, Value>>,
}

impl MemorySnapshotSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.objects
            .lock()
            .expect("snapshot lock poisoned")
            .get(key)
            .cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .expect("snapshot lock poisoned")
            .keys()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl SnapshotSink for MemorySnapshotSink {
    async fn put_json(&self, key: &str, body: &Value) -> Result<()> {
        self.objects
            .lock()
            .expect("snapshot lock poisoned")
            .insert(key.to_string(), body.clone());
        Ok(())
    }
}
