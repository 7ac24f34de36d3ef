//! Model backends able to answer a [`ClassificationTask`].
//!
//! Two implementations exist: [`OpenAiBackend`] (hosted, primary) and
//! [`OllamaBackend`] (local, fallback). Both only produce raw completions;
//! mapping output to an allowed label is shared and lives in [`labels`].

pub mod labels;
pub mod ollama;
pub mod openai;

use crate::api::Transport;
use crate::config::{RuntimeSnapshot, Settings};
use crate::error::ClassifyError;
use crate::tasks::ClassificationTask;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

pub use ollama::OllamaBackend;
pub use openai::OpenAiBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Primary,
    Fallback,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BackendKind::Primary => "primary",
            BackendKind::Fallback => "fallback",
        })
    }
}

/// A label produced by one backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendResult {
    pub label: String,
    pub backend: BackendKind,
    pub raw: String,
}

#[async_trait]
pub trait ClassifierBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Human-readable name for logs, e.g. `ollama:llama3:8b`.
    fn name(&self) -> &str;

    /// Raw completion for `task`.
    async fn complete(&self, task: &ClassificationTask) -> Result<String, ClassifyError>;

    /// Completion mapped onto the task's allowed labels.
    async fn classify(&self, task: &ClassificationTask) -> Result<BackendResult, ClassifyError> {
        let raw = self.complete(task).await?;
        match labels::normalize_label(&raw, &task.constraints) {
            Some(label) => Ok(BackendResult {
                label,
                backend: self.kind(),
                raw,
            }),
            None => Err(ClassifyError::Unparseable { raw }),
        }
    }
}

/// Reachability of one backend, checked once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Ready,
    Unconfigured(String),
    Unreachable(String),
}

impl Availability {
    pub fn is_ready(&self) -> bool {
        matches!(self, Availability::Ready)
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Availability::Ready => f.write_str("ready"),
            Availability::Unconfigured(why) => write!(f, "unconfigured ({why})"),
            Availability::Unreachable(why) => write!(f, "unreachable ({why})"),
        }
    }
}

/// The backends usable for this run, in attempt order.
#[derive(Clone)]
pub struct BackendRoster {
    primary: Option<Arc<dyn ClassifierBackend>>,
    fallback: Option<Arc<dyn ClassifierBackend>>,
}

impl BackendRoster {
    pub fn new(
        primary: Option<Arc<dyn ClassifierBackend>>,
        fallback: Option<Arc<dyn ClassifierBackend>>,
    ) -> Self {
        Self { primary, fallback }
    }

    /// Build the backends the startup probe found usable. The primary
    /// backend also needs an API key; anything not ready is left out.
    pub fn from_settings<T>(
        settings: &Settings,
        api_key: Option<&str>,
        transport: T,
        health: &BackendHealth,
    ) -> Self
    where
        T: Transport + Clone + 'static,
    {
        let policy = settings.retry.policy();
        let fallback = if health.fallback.is_ready() {
            let backend: Arc<dyn ClassifierBackend> = Arc::new(OllamaBackend::new(
                transport.clone(),
                policy.clone(),
                &settings.fallback,
            ));
            Some(backend)
        } else {
            warn!(status = %health.fallback, "Fallback backend left out of the roster");
            None
        };
        let key = api_key.map(str::trim).filter(|k| !k.is_empty());
        let primary = match key {
            Some(key) if health.primary.is_ready() => {
                let backend: Arc<dyn ClassifierBackend> = Arc::new(OpenAiBackend::new(
                    transport,
                    policy,
                    &settings.primary,
                    key,
                ));
                Some(backend)
            }
            _ => None,
        };
        Self { primary, fallback }
    }

    pub fn has_primary(&self) -> bool {
        self.primary.is_some()
    }

    /// Backends to try for one batch: the primary first when enabled and
    /// configured, then the fallback when it was reachable at startup.
    pub fn ordered(&self, snapshot: &RuntimeSnapshot) -> Vec<Arc<dyn ClassifierBackend>> {
        let mut out = Vec::with_capacity(2);
        if snapshot.primary_enabled {
            match &self.primary {
                Some(p) => out.push(Arc::clone(p)),
                None => warn!("Primary backend enabled but not configured"),
            }
        }
        if let Some(f) = &self.fallback {
            out.push(Arc::clone(f));
        }
        if out.is_empty() {
            warn!("No backend available; every task gets its safe default");
        }
        out
    }
}

/// Startup health of both backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendHealth {
    pub primary: Availability,
    pub fallback: Availability,
}

impl BackendHealth {
    pub fn log(&self) {
        if self.primary.is_ready() {
            info!(status = %self.primary, "Primary backend");
        } else {
            warn!(status = %self.primary, "Primary backend");
        }
        if self.fallback.is_ready() {
            info!(status = %self.fallback, "Fallback backend");
        } else {
            warn!(status = %self.fallback, "Fallback backend");
        }
    }
}

/// Check both backends once. An unconfigured primary is reported, not probed.
pub async fn probe_health<T: Transport>(
    settings: &Settings,
    api_key: Option<&str>,
    transport: &T,
) -> BackendHealth {
    let primary = if api_key.is_some_and(|k| !k.trim().is_empty()) {
        Availability::Ready
    } else {
        Availability::Unconfigured("no API key".to_string())
    };
    let fallback = ollama::probe(transport, &settings.fallback).await;
    BackendHealth { primary, fallback }
}
