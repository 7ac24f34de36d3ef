//! Local model served by Ollama (`/api/generate`, non-streaming).

use super::{Availability, BackendKind, ClassifierBackend};
use crate::api::{HttpRequest, RetryPolicy, RetryingCaller, Transport};
use crate::config::FallbackSettings;
use crate::error::ClassifyError;
use crate::tasks::ClassificationTask;
use crate::utils::truncate_for_log;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

pub struct OllamaBackend<T> {
    caller: RetryingCaller<T>,
    endpoint: String,
    model: String,
    timeout: Duration,
    name: String,
}

impl<T: Transport> OllamaBackend<T> {
    pub fn new(transport: T, policy: RetryPolicy, settings: &FallbackSettings) -> Self {
        Self {
            caller: RetryingCaller::new(transport, policy),
            endpoint: format!("{}/api/generate", settings.base_url.trim_end_matches('/')),
            model: settings.model.clone(),
            timeout: Duration::from_secs(settings.timeout_secs),
            name: format!("ollama:{}", settings.model),
        }
    }
}

#[async_trait]
impl<T: Transport> ClassifierBackend for OllamaBackend<T> {
    fn kind(&self) -> BackendKind {
        BackendKind::Fallback
    }

    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(level = "debug", skip_all, fields(backend = %self.name, task = %task.kind))]
    async fn complete(&self, task: &ClassificationTask) -> Result<String, ClassifyError> {
        let body = GenerateRequest {
            model: &self.model,
            system: &task.system,
            prompt: &task.instruction,
            stream: false,
            options: GenerateOptions {
                temperature: task.constraints.temperature,
                num_predict: task.constraints.max_tokens,
            },
        };
        let body = serde_json::to_value(&body).map_err(|e| ClassifyError::Malformed(e.to_string()))?;
        let request = HttpRequest::post_json(&self.endpoint, body, self.timeout);

        let response = self.caller.call(&request).await?;
        let parsed: GenerateResponse = response
            .json()
            .map_err(|e| ClassifyError::Malformed(e.to_string()))?;

        debug!(output = %truncate_for_log(&parsed.response, 120), "Completion received");
        Ok(parsed.response.trim().to_string())
    }
}

/// One-shot reachability check against `/api/tags`.
pub async fn probe<T: Transport>(transport: &T, settings: &FallbackSettings) -> Availability {
    let url = format!("{}/api/tags", settings.base_url.trim_end_matches('/'));
    match transport.execute(&HttpRequest::get(url, PROBE_TIMEOUT)).await {
        Ok(_) => Availability::Ready,
        Err(e) => Availability::Unreachable(e.to_string()),
    }
}
