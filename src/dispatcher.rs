//! Ordered fallback across classifier backends.

use crate::backends::{BackendKind, ClassifierBackend};
use crate::tasks::{ClassificationTask, YES};
use crate::utils::truncate_for_log;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Outcome of one dispatched task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub label: String,
    /// Backend that produced the label; `None` when the safe default was used.
    pub backend: Option<BackendKind>,
}

impl Dispatch {
    pub fn is_yes(&self) -> bool {
        self.label == YES
    }
}

/// Tries each backend in order and returns the first label produced.
///
/// Never fails: when every backend errors the task's safe default is
/// returned and a warning is logged.
#[derive(Clone)]
pub struct FallbackDispatcher {
    backends: Vec<Arc<dyn ClassifierBackend>>,
}

impl FallbackDispatcher {
    pub fn new(backends: Vec<Arc<dyn ClassifierBackend>>) -> Self {
        Self { backends }
    }

    pub fn backend_count(&self) -> usize {
        self.backends.len()
    }

    #[instrument(level = "debug", skip_all, fields(task = %task.kind))]
    pub async fn dispatch(&self, task: &ClassificationTask) -> Dispatch {
        for backend in &self.backends {
            match backend.classify(task).await {
                Ok(result) => {
                    debug!(backend = backend.name(), label = %result.label, "Task classified");
                    return Dispatch {
                        label: result.label,
                        backend: Some(result.backend),
                    };
                }
                Err(e) => {
                    warn!(backend = backend.name(), error = %e, "Backend failed; trying next");
                }
            }
        }

        warn!(
            default = %task.safe_default,
            backends = self.backends.len(),
            input = %truncate_for_log(&task.input, 80),
            "All backends failed; using safe default"
        );
        Dispatch {
            label: task.safe_default.clone(),
            backend: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::tests::{MockBackend, as_backends};
    use crate::tasks::NO;

    #[tokio::test]
    async fn test_primary_success_skips_fallback() {
        let primary = Arc::new(MockBackend::answering(BackendKind::Primary, "SI"));
        let fallback = Arc::new(MockBackend::answering(BackendKind::Fallback, "NO"));
        let d = FallbackDispatcher::new(as_backends(&[&primary, &fallback]));

        let out = d.dispatch(&ClassificationTask::agenda("x")).await;
        assert_eq!(out.label, YES);
        assert_eq!(out.backend, Some(BackendKind::Primary));
        assert_eq!(primary.call_count(), 1);
        assert_eq!(fallback.call_count(), 0);
    }

    #[tokio::test]
    async fn test_primary_failure_falls_back() {
        let primary = Arc::new(MockBackend::failing(BackendKind::Primary));
        let fallback = Arc::new(MockBackend::answering(BackendKind::Fallback, "Sí"));
        let d = FallbackDispatcher::new(as_backends(&[&primary, &fallback]));

        let out = d.dispatch(&ClassificationTask::interview("x")).await;
        assert_eq!(out.label, YES);
        assert_eq!(out.backend, Some(BackendKind::Fallback));
        assert_eq!(primary.call_count(), 1);
        assert_eq!(fallback.call_count(), 1);
    }

    #[tokio::test]
    async fn test_all_failures_give_safe_default() {
        let primary = Arc::new(MockBackend::failing(BackendKind::Primary));
        let fallback = Arc::new(MockBackend::failing(BackendKind::Fallback));
        let d = FallbackDispatcher::new(as_backends(&[&primary, &fallback]));

        let out = d.dispatch(&ClassificationTask::agenda("x")).await;
        assert_eq!(out.label, NO);
        assert_eq!(out.backend, None);
        assert!(!out.is_yes());
    }

    #[tokio::test]
    async fn test_unparseable_output_moves_to_next_backend() {
        let catalog = vec![crate::tasks::TopicOption {
            name: "Mecenazgo".into(),
            date: None,
        }];
        let task = ClassificationTask::topic("x", &catalog, &[], None, "Actividades programadas");
        let primary = Arc::new(MockBackend::answering(BackendKind::Primary, "Otra cosa"));
        let fallback = Arc::new(MockBackend::answering(BackendKind::Fallback, "mecenazgo"));
        let d = FallbackDispatcher::new(as_backends(&[&primary, &fallback]));

        let out = d.dispatch(&task).await;
        assert_eq!(out.label, "Mecenazgo");
        assert_eq!(fallback.call_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_backend_list_gives_safe_default() {
        let d = FallbackDispatcher::new(Vec::new());
        let out = d.dispatch(&ClassificationTask::valuation("x")).await;
        assert_eq!(out.label, crate::tasks::NOT_NEGATIVE);
        assert_eq!(out.backend, None);
    }
}
