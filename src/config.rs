//! Settings file and runtime-mutable configuration.
//!
//! [`Settings`] is read once from an optional YAML file; every field has a
//! default so an empty file (or no file) is a valid configuration.
//! [`RuntimeConfig`] holds the two knobs that may change while the process
//! runs; a [`RuntimeSnapshot`] is taken at the start of each batch so one
//! batch never sees a mix of old and new values.

use crate::api::RetryPolicy;
use crate::error::ConfigError;
use crate::models::SCHEDULED_ACTIVITIES;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Only URLs on this domain (or its subdomains) are accepted.
    pub allowed_domain: String,
    pub primary: PrimarySettings,
    pub fallback: FallbackSettings,
    pub retry: RetrySettings,
    pub scrape: ScrapeSettings,
    pub classification: ClassificationSettings,
    pub topics: TopicSettings,
    pub crisis: CrisisSettings,
    pub mentions: MentionSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            allowed_domain: "ejes.com".to_string(),
            primary: PrimarySettings::default(),
            fallback: FallbackSettings::default(),
            retry: RetrySettings::default(),
            scrape: ScrapeSettings::default(),
            classification: ClassificationSettings::default(),
            topics: TopicSettings::default(),
            crisis: CrisisSettings::default(),
            mentions: MentionSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from `path`, or defaults when no path is given.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            info!("No config file given; using defaults");
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        let settings = Self::from_yaml(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })?;
        info!(path, "Loaded configuration");
        Ok(settings)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }
}

/// Hosted (paid) model reached through an OpenAI-compatible chat API.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PrimarySettings {
    pub enabled: bool,
    pub api_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for PrimarySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            api_url: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 15,
        }
    }
}

/// Locally hosted model served by Ollama.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FallbackSettings {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for FallbackSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3:8b".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 2000,
            max_delay_ms: 30_000,
            jitter_ms: 0,
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            jitter: Duration::from_millis(self.jitter_ms),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScrapeSettings {
    pub timeout_secs: u64,
    pub max_retries: usize,
    pub concurrency: usize,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            max_retries: 3,
            concurrency: 8,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassificationSettings {
    /// Texts longer than this (in characters) are never sent to a model.
    pub max_text_len: usize,
    /// Articles classified concurrently.
    pub concurrency: usize,
    /// Evaluate the opinion-note stage before defaulting to "Nota".
    pub detect_opinion_notes: bool,
}

impl Default for ClassificationSettings {
    fn default() -> Self {
        Self {
            max_text_len: 14_900,
            concurrency: 4,
            detect_opinion_notes: true,
        }
    }
}

/// What a topic classification falls back to when nothing in the catalog fits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedTopic {
    ScheduledActivities,
    ManualReview,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TopicSettings {
    /// How many nearest-dated catalog entries are offered to the model as recent topics.
    pub temporal_window: usize,
    pub unmatched: UnmatchedTopic,
}

impl Default for TopicSettings {
    fn default() -> Self {
        Self {
            temporal_window: 7,
            unmatched: UnmatchedTopic::ScheduledActivities,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrisisSettings {
    /// Negative articles on one topic needed to call it a crisis.
    pub threshold: usize,
    /// High-volume topics never considered for crisis.
    pub fixed_topics: Vec<String>,
    /// JSON file with historical (topic, valuation) records.
    pub history_path: Option<String>,
}

impl Default for CrisisSettings {
    fn default() -> Self {
        Self {
            threshold: 5,
            fixed_topics: vec![SCHEDULED_ACTIVITIES.to_string()],
            history_path: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MentionSettings {
    /// Maximum number of mentions reported per article.
    pub max: usize,
}

impl Default for MentionSettings {
    fn default() -> Self {
        Self { max: 5 }
    }
}

/// Knobs that may change between batches without a restart.
#[derive(Debug)]
pub struct RuntimeConfig {
    primary_enabled: AtomicBool,
    max_text_len: AtomicUsize,
}

/// Values of [`RuntimeConfig`] frozen for one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeSnapshot {
    pub primary_enabled: bool,
    pub max_text_len: usize,
}

impl RuntimeConfig {
    pub fn new(primary_enabled: bool, max_text_len: usize) -> Result<Self, ConfigError> {
        validate_max_text_len(max_text_len)?;
        Ok(Self {
            primary_enabled: AtomicBool::new(primary_enabled),
            max_text_len: AtomicUsize::new(max_text_len),
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        Self::new(
            settings.primary.enabled,
            settings.classification.max_text_len,
        )
    }

    pub fn set_primary_enabled(&self, enabled: bool) {
        self.primary_enabled.store(enabled, Ordering::SeqCst);
        info!(enabled, "Primary backend toggled");
    }

    pub fn set_max_text_len(&self, max_text_len: usize) -> Result<(), ConfigError> {
        validate_max_text_len(max_text_len)?;
        self.max_text_len.store(max_text_len, Ordering::SeqCst);
        info!(max_text_len, "Maximum text length updated");
        Ok(())
    }

    pub fn snapshot(&self) -> RuntimeSnapshot {
        RuntimeSnapshot {
            primary_enabled: self.primary_enabled.load(Ordering::SeqCst),
            max_text_len: self.max_text_len.load(Ordering::SeqCst),
        }
    }
}

fn validate_max_text_len(value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid {
            field: "max_text_len",
            reason: "must be a positive integer".to_string(),
        });
    }
    Ok(())
}
