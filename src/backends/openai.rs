//! Hosted model reached through an OpenAI-compatible chat completions API.

use super::{BackendKind, ClassifierBackend};
use crate::api::{HttpRequest, RetryPolicy, RetryingCaller, Transport};
use crate::config::PrimarySettings;
use crate::error::ClassifyError;
use crate::tasks::ClassificationTask;
use crate::utils::truncate_for_log;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiBackend<T> {
    caller: RetryingCaller<T>,
    api_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
    name: String,
}

impl<T: Transport> OpenAiBackend<T> {
    pub fn new(transport: T, policy: RetryPolicy, settings: &PrimarySettings, api_key: &str) -> Self {
        Self {
            caller: RetryingCaller::new(transport, policy),
            api_url: settings.api_url.clone(),
            api_key: api_key.to_string(),
            model: settings.model.clone(),
            timeout: Duration::from_secs(settings.timeout_secs),
            name: format!("openai:{}", settings.model),
        }
    }
}

#[async_trait]
impl<T: Transport> ClassifierBackend for OpenAiBackend<T> {
    fn kind(&self) -> BackendKind {
        BackendKind::Primary
    }

    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(level = "debug", skip_all, fields(backend = %self.name, task = %task.kind))]
    async fn complete(&self, task: &ClassificationTask) -> Result<String, ClassifyError> {
        if self.api_key.trim().is_empty() {
            return Err(ClassifyError::NotConfigured("missing API key".to_string()));
        }

        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &task.system,
                },
                ChatMessage {
                    role: "user",
                    content: &task.instruction,
                },
            ],
            temperature: task.constraints.temperature,
            max_tokens: task.constraints.max_tokens,
        };
        let body = serde_json::to_value(&body).map_err(|e| ClassifyError::Malformed(e.to_string()))?;
        let request = HttpRequest::post_json(&self.api_url, body, self.timeout)
            .header("Authorization", format!("Bearer {}", self.api_key));

        let response = self.caller.call(&request).await?;
        let parsed: ChatResponse = response
            .json()
            .map_err(|e| ClassifyError::Malformed(e.to_string()))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ClassifyError::Malformed("no choices in response".to_string()))?;

        debug!(output = %truncate_for_log(&content, 120), "Completion received");
        Ok(content.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests::{ScriptedTransport, ok, status};
    use crate::tasks::NEGATIVE;
    use std::sync::Arc;

    fn backend(transport: Arc<ScriptedTransport>, key: &str) -> OpenAiBackend<Arc<ScriptedTransport>> {
        let policy = RetryPolicy {
            max_retries: 1,
            base_delay: Duration::from_millis(10),
            ..RetryPolicy::default()
        };
        OpenAiBackend::new(transport, policy, &PrimarySettings::default(), key)
    }

    #[tokio::test]
    async fn test_sends_chat_request_and_reads_first_choice() {
        let transport = Arc::new(ScriptedTransport::always(ok(
            r#"{"choices":[{"message":{"role":"assistant","content":" NEGATIVA \n"}}]}"#,
        )));
        let b = backend(transport.clone(), "sk-test");

        let result = b
            .classify(&ClassificationTask::valuation("Denuncian fallas"))
            .await
            .unwrap();
        assert_eq!(result.label, NEGATIVE);
        assert_eq!(result.backend, BackendKind::Primary);

        let requests = transport.requests.lock().unwrap();
        let req = &requests[0];
        assert!(req.headers.contains(&("Authorization".to_string(), "Bearer sk-test".to_string())));
        let body = req.body.as_ref().unwrap();
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["max_tokens"], 10);
    }

    #[tokio::test]
    async fn test_missing_key_is_not_configured() {
        let transport = Arc::new(ScriptedTransport::always(ok("{}")));
        let b = backend(transport.clone(), "");
        let err = b.complete(&ClassificationTask::agenda("x")).await.unwrap_err();
        assert!(matches!(err, ClassifyError::NotConfigured(_)));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_after_retries() {
        let transport = Arc::new(ScriptedTransport::always(status(429)));
        let b = backend(transport.clone(), "sk-test");
        let err = b.complete(&ClassificationTask::agenda("x")).await.unwrap_err();
        assert!(matches!(err, ClassifyError::Unavailable(_)));
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn test_empty_choices_is_malformed() {
        let transport = Arc::new(ScriptedTransport::always(ok(r#"{"choices":[]}"#)));
        let b = backend(transport, "sk-test");
        let err = b.complete(&ClassificationTask::agenda("x")).await.unwrap_err();
        assert!(matches!(err, ClassifyError::Malformed(_)));
    }
}
