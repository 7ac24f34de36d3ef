use crate::dispatcher::FallbackDispatcher;
use crate::tasks::ClassificationTask;

/// Whether the article carries electoral or partisan content.
pub async fn detect_political(dispatcher: &FallbackDispatcher, text: &str) -> bool {
    if text.trim().is_empty() {
        return false;
    }
    dispatcher
        .dispatch(&ClassificationTask::political(text))
        .await
        .is_yes()
}
