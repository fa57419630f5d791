//! State-machine event handler
//!
//! Consumes the accumulated event from the upstream catalog-query step, writes
//! the raw record batch to staging storage, stages candidates into the
//! registry, and returns the event enriched with an `enqueue` summary. Heavy
//! record payloads never travel forward in the event; downstream steps follow
//! the snapshot key instead.
//!
//! Malformed events (wrong shape, bad upstream status, missing subject) are
//! reported as a `BAD_REQUEST` outcome in the returned payload, not as errors;
//! only infrastructure failures propagate.

use crate::processor::stage_records;
use crate::snapshot::{latest_key, slugify, snapshot_key, SnapshotSink};
use chrono::Utc;
use novaharvest_common::config::HarvestConfig;
use novaharvest_common::errors::Result;
use novaharvest_common::model::now_iso;
use novaharvest_common::registry::CandidateStore;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

/// Handle one upstream event end to end.
#[tracing::instrument(skip_all)]
pub async fn handle_event(
    event: &Value,
    config: &HarvestConfig,
    store: &dyn CandidateStore,
    sink: Option<&dyn SnapshotSink>,
) -> Result<Value> {
    let Some(obj) = event.as_object() else {
        return Ok(bad_request("expected a JSON object event", None));
    };

    let upstream_status = obj.get("status").and_then(Value::as_str);
    if let Some(status) = upstream_status {
        if status != "OK" {
            warn!(status, "rejecting event with bad upstream status");
            return Ok(bad_request(
                "expected upstream status=OK",
                Some(json!({ "status": status })),
            ));
        }
    }

    let Some(subject_id) = subject_of(obj) else {
        return Ok(bad_request("missing nova_id", None));
    };

    let preferred = obj
        .get("preferred_name")
        .or_else(|| obj.get("candidate_name"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(&subject_id)
        .to_string();
    let slug = obj
        .get("name_norm")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| slugify(&preferred));

    let records: Vec<Value> = obj
        .get("ads")
        .and_then(|ads| ads.get("records"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    // Snapshot the heavy record batch before staging, so every registry
    // entry can point at the exact bytes it was derived from.
    let mut ads_snapshot_key = None;
    if let Some(sink) = sink {
        if !records.is_empty() {
            let key = snapshot_key(&config.staging.records_prefix, &slug, Utc::now());
            sink.put_json(&key, &json!({ "records": records })).await?;
            ads_snapshot_key = Some(key);
        }
    }

    let summary = stage_records(
        &subject_id,
        &records,
        ads_snapshot_key.as_deref(),
        &config.eligibility,
        store,
    )
    .await?;

    let mut out = obj.clone();
    out.insert("status".into(), json!("OK"));
    out.insert("preferred_name".into(), json!(preferred));
    out.insert("name_norm".into(), json!(slug));
    out.insert("enqueue".into(), serde_json::to_value(summary)?);
    if let Some(ads) = out.get_mut("ads").and_then(Value::as_object_mut) {
        ads.remove("records");
        ads.remove("raw");
        let bibcodes: Vec<&str> = records
            .iter()
            .filter_map(|r| r.get("bibcode").and_then(Value::as_str))
            .collect();
        if !bibcodes.is_empty() {
            ads.insert("bibcodes".into(), json!(bibcodes));
        }
        if let Some(key) = &ads_snapshot_key {
            ads.insert("ads_snapshot_key".into(), json!(key));
        }
    }

    if let Some(sink) = sink {
        if config.staging.write_latest {
            let pointer_key = latest_key(&config.staging.meta_prefix, &slug);
            sink.put_json(
                &pointer_key,
                &json!({
                    "preferred_name": preferred,
                    "name_norm": slug,
                    "ads_snapshot_key": ads_snapshot_key,
                    "updated_at": now_iso(),
                }),
            )
            .await?;
            out.insert("latest_pointer_key".into(), json!(pointer_key));
        }
    }

    info!(
        nova_id = %subject_id,
        records = records.len(),
        created = summary.created,
        "event handled"
    );
    Ok(Value::Object(out))
}

/// Subject identity; upstream emits `nova_id` as either a string or a number.
fn subject_of(obj: &Map<String, Value>) -> Option<String> {
    match obj.get("nova_id") {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn bad_request(reason: &str, input: Option<Value>) -> Value {
    let mut out = json!({ "status": "BAD_REQUEST", "reason": reason });
    if let Some(input) = input {
        out["input"] = input;
    }
    out
}
