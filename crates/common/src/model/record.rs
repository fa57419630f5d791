//! Normalized bibliographic record
//!
//! Catalog search responses are loosely typed: venue stems arrive as a string
//! or a one-element list, links live under two different keys with several
//! label/url spellings, and most fields are optional. Normalization maps all
//! accepted shapes into one fixed struct at the boundary; anything that fails
//! is rejected with a `Validation` error so the caller can skip and count it.

use crate::errors::{AppError, Result};
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// One (label, url) link attached to a record. Labels are stored lowercased
/// since all downstream matching is case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEntry {
    pub label: String,
    pub url: String,
}

/// A bibliographic record normalized from one raw catalog document.
/// Immutable for the duration of a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiblioRecord {
    /// Unique catalog id (ADS bibcode)
    pub source_code: String,

    /// Venue stem (bibstem), normalized to the first value when multi-valued
    pub venue_code: Option<String>,

    /// Document type, lowercased
    pub document_type: Option<String>,

    /// Publication date, raw string as received
    pub publication_date: Option<String>,

    /// Index entry date, raw string as received
    pub entry_date: Option<String>,

    pub author_count: u32,

    pub has_abstract: bool,

    /// Ordered link entries; order matters for the OA cascade
    pub links: Vec<LinkEntry>,

    /// Property flags, lowercased
    pub properties: HashSet<String>,

    /// External identifiers (DOIs, arXiv ids, ...)
    pub identifiers: Vec<String>,

    /// Associated data resource tags
    pub data_tags: Vec<String>,
}

impl BiblioRecord {
    /// Normalize one raw catalog document.
    pub fn from_value(doc: &Value) -> Result<Self> {
        let obj = doc.as_object().ok_or_else(|| AppError::Validation {
            message: "record is not a JSON object".into(),
        })?;

        let source_code = obj
            .get("bibcode")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::MissingField {
                field: "bibcode".into(),
            })?
            .to_string();

        let venue_code = first_string(obj.get("bibstem"));

        let document_type = obj
            .get("doctype")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        let author_count = match obj.get("author") {
            Some(Value::Array(authors)) => authors.len() as u32,
            _ => obj
                .get("author_count")
                .and_then(Value::as_u64)
                .unwrap_or(0) as u32,
        };

        let has_abstract = obj
            .get("abstract")
            .and_then(Value::as_str)
            .map(|s| !s.trim().is_empty())
            .unwrap_or(false);

        let properties = string_list(obj.get("property"))
            .into_iter()
            .map(|s| s.to_lowercase())
            .collect();

        Ok(Self {
            source_code,
            venue_code,
            document_type,
            publication_date: opt_string(obj.get("date")),
            entry_date: opt_string(obj.get("entry_date")),
            author_count,
            has_abstract,
            links: collect_links(obj.get("links_data").or_else(|| obj.get("link"))),
            properties,
            identifiers: string_list(obj.get("identifier")),
            data_tags: string_list(obj.get("data")),
        })
    }

    /// True if any external identifier looks like an arXiv id.
    pub fn has_arxiv_id(&self) -> bool {
        self.identifiers
            .iter()
            .any(|s| s.to_lowercase().contains("arxiv"))
    }

    pub fn doctype_lower(&self) -> &str {
        self.document_type.as_deref().unwrap_or("")
    }

    pub fn venue_lower(&self) -> String {
        self.venue_code
            .as_deref()
            .unwrap_or("")
            .to_lowercase()
    }
}

/// Extract (label, url) pairs from the raw link field.
/// Accepts a list of maps, a single map, or bare URL strings; entries with
/// no url are dropped.
fn collect_links(raw: Option<&Value>) -> Vec<LinkEntry> {
    let items: Vec<&Value> = match raw {
        Some(Value::Array(arr)) => arr.iter().collect(),
        Some(v @ Value::Object(_)) | Some(v @ Value::String(_)) => vec![v],
        _ => Vec::new(),
    };

    let mut out = Vec::new();
    for item in items {
        let (label, url) = match item {
            Value::Object(map) => {
                let label = map
                    .get("title")
                    .or_else(|| map.get("type"))
                    .or_else(|| map.get("link_type"))
                    .and_then(Value::as_str)
                    .unwrap_or("");
                let url = map
                    .get("url")
                    .or_else(|| map.get("link"))
                    .or_else(|| map.get("value"))
                    .and_then(Value::as_str)
                    .unwrap_or("");
                (label, url)
            }
            Value::String(s) => ("", s.as_str()),
            _ => continue,
        };
        let url = url.trim();
        if url.is_empty() {
            continue;
        }
        out.push(LinkEntry {
            label: label.trim().to_lowercase(),
            url: url.to_string(),
        });
    }
    out
}

fn opt_string(v: Option<&Value>) -> Option<String> {
    v.and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn first_string(v: Option<&Value>) -> Option<String> {
    match v {
        Some(Value::String(s)) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Some(Value::Array(arr)) => arr.first().and_then(|x| first_string(Some(x))),
        _ => None,
    }
}

fn string_list(v: Option<&Value>) -> Vec<String> {
    match v {
        Some(Value::Array(arr)) => arr
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

/// Flexible date coercion: accepts `YYYY`, `YYYY-MM`, `YYYY-MM-DD`, and full
/// ISO timestamps (with or without a trailing `Z`). Partial dates pad to the
/// first day. Unparseable input yields `None`, never an error.
pub fn parse_flexible_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if s.len() == 4 {
        let year: i32 = s.parse().ok()?;
        return NaiveDate::from_ymd_opt(year, 1, 1);
    }
    if s.len() == 7 {
        let (y, m) = s.split_once('-')?;
        return NaiveDate::from_ymd_opt(y.parse().ok()?, m.parse().ok()?, 1);
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|dt| dt.date())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_full_record() {
        let doc = json!({
            "bibcode": "2025MNRAS.0000..123X",
            "bibstem": ["MNRAS", "MNRAS.L"],
            "doctype": "Article",
            "date": "2025-08-20",
            "entry_date": "2025-08-25T00:00:00Z",
            "author": ["Author A", "Author B", "Author C"],
            "abstract": "We report...",
            "property": ["OPENACCESS", "REFEREED"],
            "identifier": ["arXiv:2508.01234", "10.1093/mnras/xyz"],
            "links_data": [
                {"title": "arXiv PDF", "url": "https://arxiv.org/pdf/2508.01234.pdf"}
            ],
            "data": ["CDS:J/MNRAS/000/123"]
        });

        let rec = BiblioRecord::from_value(&doc).unwrap();
        assert_eq!(rec.source_code, "2025MNRAS.0000..123X");
        assert_eq!(rec.venue_code.as_deref(), Some("MNRAS"));
        assert_eq!(rec.document_type.as_deref(), Some("article"));
        assert_eq!(rec.author_count, 3);
        assert!(rec.has_abstract);
        assert!(rec.properties.contains("openaccess"));
        assert!(rec.has_arxiv_id());
        assert_eq!(rec.links.len(), 1);
        assert_eq!(rec.links[0].label, "arxiv pdf");
        assert_eq!(rec.data_tags.len(), 1);
    }

    #[test]
    fn test_normalize_scalar_bibstem_and_author_count() {
        let doc = json!({
            "bibcode": "2012ATel.4321....1B",
            "bibstem": "ATel",
            "doctype": "circular",
            "author_count": 2
        });
        let rec = BiblioRecord::from_value(&doc).unwrap();
        assert_eq!(rec.venue_code.as_deref(), Some("ATel"));
        assert_eq!(rec.author_count, 2);
        assert!(!rec.has_abstract);
        assert!(rec.links.is_empty());
    }

    #[test]
    fn test_missing_bibcode_is_rejected() {
        let doc = json!({"bibstem": "ATel"});
        let err = BiblioRecord::from_value(&doc).unwrap_err();
        assert!(err.to_string().contains("bibcode"));

        let doc = json!({"bibcode": "   "});
        assert!(BiblioRecord::from_value(&doc).is_err());
    }

    #[test]
    fn test_non_object_record_is_rejected() {
        assert!(BiblioRecord::from_value(&json!("just a string")).is_err());
        assert!(BiblioRecord::from_value(&json!(null)).is_err());
    }

    #[test]
    fn test_link_shapes() {
        let doc = json!({
            "bibcode": "b",
            "link": [
                {"type": "PUB_PDF", "link": "https://pub.example/1.pdf"},
                "https://bare.example/page",
                {"title": "no url here"},
                42
            ]
        });
        let rec = BiblioRecord::from_value(&doc).unwrap();
        assert_eq!(rec.links.len(), 2);
        assert_eq!(rec.links[0].label, "pub_pdf");
        assert_eq!(rec.links[1].url, "https://bare.example/page");
    }

    #[test]
    fn test_parse_flexible_date() {
        assert_eq!(
            parse_flexible_date("1998"),
            NaiveDate::from_ymd_opt(1998, 1, 1)
        );
        assert_eq!(
            parse_flexible_date("2012-05"),
            NaiveDate::from_ymd_opt(2012, 5, 1)
        );
        assert_eq!(
            parse_flexible_date("2012-05-01"),
            NaiveDate::from_ymd_opt(2012, 5, 1)
        );
        assert_eq!(
            parse_flexible_date("2012-05-01T12:34:56Z"),
            NaiveDate::from_ymd_opt(2012, 5, 1)
        );
        assert_eq!(parse_flexible_date(""), None);
        assert_eq!(parse_flexible_date("not-a-date"), None);
        assert_eq!(parse_flexible_date("2012-05-00"), None);
    }
}
