use crate::dispatcher::FallbackDispatcher;
use crate::tasks::{ClassificationTask, NOT_IDENTIFIED};

/// Name of the person interviewed, if a backend could identify one.
pub async fn extract_interviewee(dispatcher: &FallbackDispatcher, text: &str) -> Option<String> {
    let dispatch = dispatcher
        .dispatch(&ClassificationTask::interviewee(text))
        .await;
    // A backend answering "not identified" is final; so is the safe default.
    match dispatch.backend {
        Some(_) if dispatch.label != NOT_IDENTIFIED => Some(dispatch.label),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::BackendKind;
    use crate::backends::tests::{MockBackend, as_backends};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_extracts_name() {
        let b = Arc::new(MockBackend::answering(BackendKind::Fallback, "Gabriela Ricardes"));
        let d = FallbackDispatcher::new(as_backends(&[&b]));
        assert_eq!(
            extract_interviewee(&d, "texto").await.as_deref(),
            Some("Gabriela Ricardes")
        );
    }

    #[tokio::test]
    async fn test_not_identified_is_none() {
        let b = Arc::new(MockBackend::answering(BackendKind::Fallback, "No identificado"));
        let d = FallbackDispatcher::new(as_backends(&[&b]));
        assert_eq!(extract_interviewee(&d, "texto").await, None);
    }

    #[tokio::test]
    async fn test_not_identified_answer_is_final() {
        let primary = Arc::new(MockBackend::answering(BackendKind::Primary, "Ninguno"));
        let fallback = Arc::new(MockBackend::answering(BackendKind::Fallback, "Jorge Macri"));
        let d = FallbackDispatcher::new(as_backends(&[&primary, &fallback]));

        assert_eq!(extract_interviewee(&d, "texto").await, None);
        assert_eq!(primary.call_count(), 1);
        assert_eq!(fallback.call_count(), 0);
    }

    #[tokio::test]
    async fn test_all_backends_failing_is_none() {
        let b = Arc::new(MockBackend::failing(BackendKind::Fallback));
        let d = FallbackDispatcher::new(as_backends(&[&b]));
        assert_eq!(extract_interviewee(&d, "texto").await, None);
    }
}
