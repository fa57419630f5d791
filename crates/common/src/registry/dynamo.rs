//! DynamoDB registry backend
//!
//! Conditional expressions carry the whole protocol:
//! - create:  `attribute_not_exists(pk)`
//! - improve: `attribute_not_exists(#p) OR #p > :p`
//! - refresh: `attribute_exists(pk)` (failure means concurrent deletion)
//!
//! A `ConditionalCheckFailedException` on the first two operations is the
//! expected non-error outcome; every other SDK error is reported as a
//! transient registry failure for the orchestration layer to retry.

use super::{CandidateStore, EntryKey, RegistryEntry, VolatileFields};
use crate::config::RegistryConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use std::collections::HashMap;

pub struct DynamoRegistry {
    client: Client,
    table: String,
}

impl DynamoRegistry {
    pub fn new(client: Client, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }

    /// Build a registry from the ambient AWS environment.
    pub async fn from_config(config: &RegistryConfig) -> Result<Self> {
        if config.table_name.trim().is_empty() {
            return Err(AppError::Configuration {
                message: "registry.table_name is not set".into(),
            });
        }
        let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let client = match &config.endpoint_url {
            Some(endpoint) => {
                let conf = aws_sdk_dynamodb::config::Builder::from(&aws_config)
                    .endpoint_url(endpoint)
                    .build();
                Client::from_conf(conf)
            }
            None => Client::new(&aws_config),
        };
        Ok(Self::new(client, config.table_name.clone()))
    }
}

fn s(value: impl Into<String>) -> AttributeValue {
    AttributeValue::S(value.into())
}

fn n(value: impl ToString) -> AttributeValue {
    AttributeValue::N(value.to_string())
}

/// Map an entry to a DynamoDB item. `None` fields are omitted rather than
/// written as NULL, matching how the readers probe for attribute presence.
fn to_item(entry: &RegistryEntry) -> HashMap<String, AttributeValue> {
    let mut item = HashMap::new();
    item.insert("pk".into(), s(&entry.pk));
    item.insert("sk".into(), s(&entry.sk));
    item.insert("fingerprint".into(), s(&entry.fingerprint));
    item.insert("candidate_id".into(), s(&entry.candidate_id));
    item.insert("subject_id".into(), s(&entry.subject_id));
    item.insert("bibcode".into(), s(&entry.source_code));
    if let Some(venue) = &entry.venue_code {
        item.insert("bibstem".into(), s(venue));
    }
    item.insert("doctype".into(), s(&entry.document_type));
    item.insert("status".into(), s(&entry.status));
    item.insert("priority".into(), n(entry.priority));
    item.insert("reason".into(), s(&entry.reason));
    if let Some(entry_date) = &entry.entry_date {
        item.insert("entry_date".into(), s(entry_date));
    }
    if let Some(url) = &entry.open_access_url {
        item.insert("open_access_url".into(), s(url));
    }
    item.insert("oa_reason".into(), s(&entry.oa_reason));
    if !entry.data_tags.is_empty() {
        item.insert(
            "data".into(),
            AttributeValue::L(entry.data_tags.iter().map(s).collect()),
        );
    }
    item.insert("has_data".into(), AttributeValue::Bool(entry.has_data));
    if let Some(key) = &entry.snapshot_key {
        item.insert("snapshot_key".into(), s(key));
    }
    item.insert("rule_version".into(), s(&entry.rule_version));
    item.insert("attempts".into(), n(entry.attempts));
    item.insert("lease_expires_at".into(), n(entry.lease_expires_at));
    item.insert("created_at".into(), s(&entry.created_at));
    item.insert("updated_at".into(), s(&entry.updated_at));
    item.insert("gsi1_pk".into(), s(&entry.gsi1_pk));
    item.insert("gsi1_sk".into(), s(&entry.gsi1_sk));
    item
}

#[async_trait]
impl CandidateStore for DynamoRegistry {
    async fn create_if_absent(&self, entry: &RegistryEntry) -> Result<bool> {
        let result = self
            .client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(to_item(entry)))
            .condition_expression("attribute_not_exists(pk)")
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(err) => {
                let conditional = err
                    .as_service_error()
                    .map(|e| e.is_conditional_check_failed_exception())
                    .unwrap_or(false);
                if conditional {
                    Ok(false)
                } else {
                    Err(AppError::RegistryUnavailable {
                        message: err.to_string(),
                    })
                }
            }
        }
    }

    async fn update_priority_if_better(
        &self,
        key: &EntryKey,
        priority: u32,
        gsi1_sk: &str,
        reason: &str,
        updated_at: &str,
    ) -> Result<bool> {
        let result = self
            .client
            .update_item()
            .table_name(&self.table)
            .key("pk", s(&key.pk))
            .key("sk", s(&key.sk))
            .update_expression("SET #p = :p, reason = :r, updated_at = :t, gsi1_sk = :g1")
            .condition_expression("attribute_not_exists(#p) OR #p > :p")
            .expression_attribute_names("#p", "priority")
            .expression_attribute_values(":p", n(priority))
            .expression_attribute_values(":r", s(reason))
            .expression_attribute_values(":t", s(updated_at))
            .expression_attribute_values(":g1", s(gsi1_sk))
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(err) => {
                let conditional = err
                    .as_service_error()
                    .map(|e| e.is_conditional_check_failed_exception())
                    .unwrap_or(false);
                if conditional {
                    Ok(false)
                } else {
                    Err(AppError::RegistryUnavailable {
                        message: err.to_string(),
                    })
                }
            }
        }
    }

    async fn refresh_volatile(&self, key: &EntryKey, fields: &VolatileFields) -> Result<()> {
        let result = self
            .client
            .update_item()
            .table_name(&self.table)
            .key("pk", s(&key.pk))
            .key("sk", s(&key.sk))
            .update_expression(
                "SET open_access_url = :o, oa_reason = :r, snapshot_key = :k, updated_at = :t",
            )
            .condition_expression("attribute_exists(pk)")
            .expression_attribute_values(":o", s(fields.open_access_url.as_deref().unwrap_or("")))
            .expression_attribute_values(":r", s(&fields.oa_reason))
            .expression_attribute_values(":k", s(fields.snapshot_key.as_deref().unwrap_or("")))
            .expression_attribute_values(":t", s(&fields.updated_at))
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) => {
                let conditional = err
                    .as_service_error()
                    .map(|e| e.is_conditional_check_failed_exception())
                    .unwrap_or(false);
                if conditional {
                    // The entry existed moments ago during the create/improve
                    // steps; its absence now means someone deleted it.
                    Err(AppError::RegistryEntryVanished {
                        key: key.pk.clone(),
                    })
                } else {
                    Err(AppError::RegistryUnavailable {
                        message: err.to_string(),
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BiblioRecord, CandidateRecord, OaReason, OpenAccessResult};
    use serde_json::json;

    #[test]
    fn test_to_item_omits_absent_fields() {
        let record = BiblioRecord::from_value(&json!({
            "bibcode": "2012ATel.4321....1B",
            "doctype": "circular"
        }))
        .unwrap();
        let oa = OpenAccessResult::open(None, OaReason::PropertyOnly);
        let candidate = CandidateRecord::new("nova-001", &record, &oa, 10, "p0").unwrap();
        let entry = RegistryEntry::from_candidate(&candidate, None, "v");

        let item = to_item(&entry);
        assert!(!item.contains_key("bibstem"));
        assert!(!item.contains_key("open_access_url"));
        assert!(!item.contains_key("snapshot_key"));
        assert!(!item.contains_key("data"));
        assert_eq!(item["status"], AttributeValue::S("READY".into()));
        assert_eq!(item["priority"], AttributeValue::N("10".into()));
        assert_eq!(item["has_data"], AttributeValue::Bool(false));
    }

    #[test]
    fn test_to_item_keys_match_entry() {
        let record = BiblioRecord::from_value(&json!({
            "bibcode": "2025MNRAS.0000..123X",
            "bibstem": "MNRAS",
            "doctype": "article",
            "author_count": 3
        }))
        .unwrap();
        let oa = OpenAccessResult::open(Some("https://arxiv.org/pdf/x.pdf".into()), OaReason::Arxiv);
        let candidate = CandidateRecord::new("nova-001", &record, &oa, 45, "p1").unwrap();
        let entry = RegistryEntry::from_candidate(&candidate, Some("staging/ads/k.json"), "v");

        let item = to_item(&entry);
        assert_eq!(item["pk"], AttributeValue::S(entry.pk.clone()));
        assert_eq!(item["sk"], AttributeValue::S(entry.sk.clone()));
        assert_eq!(item["gsi1_pk"], AttributeValue::S("STATUS#READY".into()));
        assert_eq!(item["gsi1_sk"], AttributeValue::S(entry.gsi1_sk.clone()));
        assert_eq!(
            item["snapshot_key"],
            AttributeValue::S("staging/ads/k.json".into())
        );
    }
}
