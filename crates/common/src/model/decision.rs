//! Derived per-record results: open-access status and eligibility
//!
//! Neither type is persisted on its own; both are folded into the candidate
//! record when one is constructed.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Route by which a record was judged open access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OaReason {
    Arxiv,
    AdsScan,
    PublisherOa,
    PropertyOnly,
    CircularHtml,
    None,
}

impl fmt::Display for OaReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OaReason::Arxiv => "arxiv",
            OaReason::AdsScan => "ads_scan",
            OaReason::PublisherOa => "publisher_oa",
            OaReason::PropertyOnly => "property_only",
            OaReason::CircularHtml => "circular_html",
            OaReason::None => "none",
        };
        f.write_str(s)
    }
}

/// Outcome of the open-access cascade for one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenAccessResult {
    pub is_open_access: bool,
    pub best_url: Option<String>,
    pub reason: OaReason,
}

impl OpenAccessResult {
    pub fn closed() -> Self {
        Self {
            is_open_access: false,
            best_url: None,
            reason: OaReason::None,
        }
    }

    pub fn open(url: Option<String>, reason: OaReason) -> Self {
        Self {
            is_open_access: true,
            best_url: url,
            reason,
        }
    }
}

/// Outcome of the eligibility & priority rules for one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityDecision {
    pub eligible: bool,
    pub priority: Option<u32>,
    pub reason: Option<String>,
}

impl EligibilityDecision {
    pub fn ineligible() -> Self {
        Self {
            eligible: false,
            priority: None,
            reason: None,
        }
    }

    pub fn accept(priority: u32, reason: impl Into<String>) -> Self {
        Self {
            eligible: true,
            priority: Some(priority),
            reason: Some(reason.into()),
        }
    }
}
