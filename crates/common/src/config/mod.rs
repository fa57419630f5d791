//! Configuration management for NovaHarvest services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with NOVA__)
//! - Configuration files (config.toml)
//! - Default values
//!
//! Configuration is validated before any record is processed: a service with
//! an unset registry table must fail at startup, not on the first upsert.

use crate::errors::{AppError, Result};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HarvestConfig {
    /// Registry (DynamoDB) configuration
    pub registry: RegistryConfig,

    /// Staging (S3) configuration
    pub staging: StagingConfig,

    /// Eligibility & priority rules
    pub eligibility: EligibilityConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegistryConfig {
    /// DynamoDB table holding the harvest queue
    #[serde(default)]
    pub table_name: String,

    /// Optional endpoint override (e.g., LocalStack)
    pub endpoint_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StagingConfig {
    /// S3 bucket for snapshots
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Prefix for metadata snapshots
    #[serde(default = "default_meta_prefix")]
    pub meta_prefix: String,

    /// Prefix for raw record snapshots
    #[serde(default = "default_records_prefix")]
    pub records_prefix: String,

    /// Whether to maintain a latest/ pointer per subject
    #[serde(default = "default_write_latest")]
    pub write_latest: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EligibilityConfig {
    /// Document types excluded from harvesting entirely (lowercase)
    #[serde(default = "default_excluded_doctypes")]
    pub excluded_doctypes: HashSet<String>,

    /// Top-category document types (lowercase)
    #[serde(default = "default_top_doctypes")]
    pub top_doctypes: HashSet<String>,

    /// Major journal venue stems (lowercase)
    #[serde(default = "default_major_venues")]
    pub major_venues: HashSet<String>,

    /// Tier base priorities; lower = more urgent
    #[serde(default = "default_tier0")]
    pub tier0_base: u32,

    #[serde(default = "default_tier1")]
    pub tier1_base: u32,

    #[serde(default = "default_tier2")]
    pub tier2_base: u32,

    /// Priority assigned to per-data-tag variant candidates
    #[serde(default = "default_data_variant")]
    pub data_variant_priority: u32,

    /// Maximum recency bonus subtracted from a tier base
    #[serde(default = "default_recency_max_bonus")]
    pub recency_max_bonus: u32,

    /// Recency window in days; entries older than this get no bonus
    #[serde(default = "default_recency_window_days")]
    pub recency_window_days: u32,

    /// Version stamp written to every registry entry
    #[serde(default = "default_rule_version")]
    pub rule_version: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_bucket() -> String { "nova-catalog".to_string() }
fn default_meta_prefix() -> String { "staging/metadata".to_string() }
fn default_records_prefix() -> String { "staging/ads".to_string() }
fn default_write_latest() -> bool { true }
fn default_excluded_doctypes() -> HashSet<String> {
    [
        "proposal", "book", "bookreview", "editorial", "inbook", "obituary",
        "inproceedings", "phdthesis", "talk", "software",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_top_doctypes() -> HashSet<String> {
    ["circular", "catalog", "dataset"].iter().map(|s| s.to_string()).collect()
}
fn default_major_venues() -> HashSet<String> {
    ["mnras", "aj", "apj", "a&a", "pasp"].iter().map(|s| s.to_string()).collect()
}
fn default_tier0() -> u32 { 10 }
fn default_tier1() -> u32 { 50 }
fn default_tier2() -> u32 { 90 }
fn default_data_variant() -> u32 { 200 }
fn default_recency_max_bonus() -> u32 { 5 }
fn default_recency_window_days() -> u32 { 365 }
fn default_rule_version() -> String { "2025-09-07".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_service_name() -> String { "novaharvest".to_string() }

impl HarvestConfig {
    /// Load configuration from environment and files
    pub fn load() -> std::result::Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables with NOVA__ prefix
            // e.g., NOVA__REGISTRY__TABLE_NAME=nova-ingest-ads-queue
            .add_source(
                Environment::with_prefix("NOVA")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Fail-fast validation, called before any record is processed.
    pub fn validate(&self) -> Result<()> {
        if self.registry.table_name.trim().is_empty() {
            return Err(AppError::Configuration {
                message: "registry.table_name is not set".into(),
            });
        }
        if self.staging.bucket.trim().is_empty() {
            return Err(AppError::Configuration {
                message: "staging.bucket is not set".into(),
            });
        }
        if self.eligibility.recency_window_days == 0 {
            return Err(AppError::Configuration {
                message: "eligibility.recency_window_days must be > 0".into(),
            });
        }
        if !(self.eligibility.tier0_base < self.eligibility.tier1_base
            && self.eligibility.tier1_base < self.eligibility.tier2_base)
        {
            return Err(AppError::Configuration {
                message: "eligibility tier bases must be strictly increasing".into(),
            });
        }
        // The priority-ordered sort key zero-pads to 3 digits; anything
        // past 999 would sort lexicographically out of order.
        if self.eligibility.tier2_base > 999 || self.eligibility.data_variant_priority > 999 {
            return Err(AppError::Configuration {
                message: "eligibility priorities must not exceed 999".into(),
            });
        }
        Ok(())
    }
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            registry: RegistryConfig {
                table_name: String::new(),
                endpoint_url: None,
            },
            staging: StagingConfig {
                bucket: default_bucket(),
                meta_prefix: default_meta_prefix(),
                records_prefix: default_records_prefix(),
                write_latest: default_write_latest(),
            },
            eligibility: EligibilityConfig::default(),
            observability: ObservabilityConfig {
                log_level: default_log_level(),
                json_logging: default_json_logging(),
                service_name: default_service_name(),
            },
        }
    }
}

impl Default for EligibilityConfig {
    fn default() -> Self {
        Self {
            excluded_doctypes: default_excluded_doctypes(),
            top_doctypes: default_top_doctypes(),
            major_venues: default_major_venues(),
            tier0_base: default_tier0(),
            tier1_base: default_tier1(),
            tier2_base: default_tier2(),
            data_variant_priority: default_data_variant(),
            recency_max_bonus: default_recency_max_bonus(),
            recency_window_days: default_recency_window_days(),
            rule_version: default_rule_version(),
        }
    }
}
