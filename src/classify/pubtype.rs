//! Publication type by fixed priority.
//!
//! Stages run in order and the first "yes" wins:
//! Declaration, Agenda, Interview, Opinion note (optional), otherwise Note.
//! A failed stage counts as "no", so the worst case is always Note.

use crate::dispatcher::FallbackDispatcher;
use crate::models::PublicationType;
use crate::tasks::ClassificationTask;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct PublicationTypeClassifier {
    actors: Vec<String>,
    detect_opinion_notes: bool,
}

impl PublicationTypeClassifier {
    /// `actors` are the tracked people and institutions whose quotes make a
    /// declaration.
    pub fn new(actors: Vec<String>, detect_opinion_notes: bool) -> Self {
        Self {
            actors,
            detect_opinion_notes,
        }
    }

    pub async fn classify(
        &self,
        dispatcher: &FallbackDispatcher,
        text: &str,
        author: Option<&str>,
    ) -> PublicationType {
        if text.trim().is_empty() {
            return PublicationType::Note;
        }

        if !self.actors.is_empty()
            && dispatcher
                .dispatch(&ClassificationTask::declaration(text, &self.actors))
                .await
                .is_yes()
        {
            return self.decided(PublicationType::Declaration);
        }
        if dispatcher.dispatch(&ClassificationTask::agenda(text)).await.is_yes() {
            return self.decided(PublicationType::Agenda);
        }
        if dispatcher.dispatch(&ClassificationTask::interview(text)).await.is_yes() {
            return self.decided(PublicationType::Interview);
        }
        if self.detect_opinion_notes
            && !self.actors.is_empty()
            && dispatcher
                .dispatch(&ClassificationTask::opinion_note(text, &self.actors, author))
                .await
                .is_yes()
        {
            return self.decided(PublicationType::OpinionNote);
        }
        self.decided(PublicationType::Note)
    }

    fn decided(&self, kind: PublicationType) -> PublicationType {
        debug!(publication_type = %kind, "Publication type decided");
        kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::BackendKind;
    use crate::backends::tests::{MockBackend, as_backends};
    use crate::tasks::TaskKind;
    use std::sync::Arc;

    /// Backend that says "SI" only for the listed task kinds.
    fn yes_for(kinds: &'static [TaskKind]) -> Arc<MockBackend> {
        Arc::new(MockBackend::new(BackendKind::Fallback, move |task| {
            Ok(if kinds.contains(&task.kind) { "SI" } else { "NO" }.to_string())
        }))
    }

    fn classifier() -> PublicationTypeClassifier {
        PublicationTypeClassifier::new(vec!["Gabriela Ricardes".into()], true)
    }

    #[tokio::test]
    async fn test_declaration_wins_over_interview() {
        let backend = yes_for(&[TaskKind::Declaration, TaskKind::Interview]);
        let d = FallbackDispatcher::new(as_backends(&[&backend]));
        let kind = classifier().classify(&d, "texto", None).await;
        assert_eq!(kind, PublicationType::Declaration);
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_agenda_before_interview() {
        let backend = yes_for(&[TaskKind::Agenda, TaskKind::Interview]);
        let d = FallbackDispatcher::new(as_backends(&[&backend]));
        assert_eq!(
            classifier().classify(&d, "texto", None).await,
            PublicationType::Agenda
        );
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn test_opinion_note_stage_can_be_disabled() {
        let backend = yes_for(&[TaskKind::OpinionNote]);
        let d = FallbackDispatcher::new(as_backends(&[&backend]));
        assert_eq!(
            classifier().classify(&d, "texto", Some("Por Gabriela Ricardes")).await,
            PublicationType::OpinionNote
        );

        let off = PublicationTypeClassifier::new(vec!["Gabriela Ricardes".into()], false);
        assert_eq!(off.classify(&d, "texto", None).await, PublicationType::Note);
    }

    #[tokio::test]
    async fn test_all_backends_down_gives_note() {
        let backend = Arc::new(MockBackend::failing(BackendKind::Fallback));
        let d = FallbackDispatcher::new(as_backends(&[&backend]));
        assert_eq!(
            classifier().classify(&d, "texto", None).await,
            PublicationType::Note
        );
        // Declaration, Agenda, Interview, Opinion note: one call each.
        assert_eq!(backend.call_count(), 4);
    }

    #[tokio::test]
    async fn test_empty_text_is_note_without_calls() {
        let backend = yes_for(&[TaskKind::Agenda]);
        let d = FallbackDispatcher::new(as_backends(&[&backend]));
        assert_eq!(classifier().classify(&d, " ", None).await, PublicationType::Note);
        assert_eq!(backend.call_count(), 0);
    }
}
