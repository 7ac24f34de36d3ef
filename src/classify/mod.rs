//! Per-article classification.
//!
//! [`ArticleClassifier`] runs every stage for one article against one
//! frozen backend order and fills in the classification fields. Crisis
//! flags are not set here; they need the whole batch.

pub mod interviewee;
pub mod mentions;
pub mod political;
pub mod pubtype;
pub mod topic;
pub mod valuation;

use crate::config::{RuntimeSnapshot, Settings};
use crate::dispatcher::FallbackDispatcher;
use crate::models::{Article, PublicationType, Topic, Valuation};
use mentions::MentionDetector;
use pubtype::PublicationTypeClassifier;
use topic::{TopicCatalog, TopicMatcher};
use tracing::{info, instrument, warn};

/// Request-level inputs shared by every article of a batch.
#[derive(Debug, Clone, Default)]
pub struct ClassificationContext {
    pub catalog: TopicCatalog,
    pub minister_keywords: Vec<String>,
    pub ministry_keywords: Vec<String>,
    pub mention_keywords: Vec<String>,
}

impl ClassificationContext {
    /// Minister and ministry keywords together.
    pub fn actor_keywords(&self) -> Vec<String> {
        self.minister_keywords
            .iter()
            .chain(&self.ministry_keywords)
            .cloned()
            .collect()
    }
}

pub struct ArticleClassifier {
    dispatcher: FallbackDispatcher,
    pubtype: PublicationTypeClassifier,
    topics: TopicMatcher,
    catalog: TopicCatalog,
    actor_keywords: Vec<String>,
    mentions: MentionDetector,
    max_text_len: usize,
}

impl ArticleClassifier {
    pub fn new(
        dispatcher: FallbackDispatcher,
        context: ClassificationContext,
        settings: &Settings,
        snapshot: &RuntimeSnapshot,
    ) -> Self {
        let actor_keywords = context.actor_keywords();
        Self {
            dispatcher,
            pubtype: PublicationTypeClassifier::new(
                actor_keywords.clone(),
                settings.classification.detect_opinion_notes,
            ),
            topics: TopicMatcher::new(&settings.topics),
            mentions: MentionDetector::new(&context.mention_keywords, settings.mentions.max),
            catalog: context.catalog,
            actor_keywords,
            max_text_len: snapshot.max_text_len,
        }
    }

    /// Whether `text` may be sent to a model.
    pub fn within_limit(&self, text: &str) -> bool {
        !text.trim().is_empty() && text.chars().count() <= self.max_text_len
    }

    #[instrument(level = "info", skip_all, fields(url = %article.url))]
    pub async fn classify(&self, article: &mut Article) {
        article.mentions = self.mentions.detect(&article.text);

        if !self.within_limit(&article.text) {
            warn!(
                chars = article.text.chars().count(),
                max = self.max_text_len,
                "Text empty or over the size limit; flagged for manual review"
            );
            mark_for_manual_review(article);
            return;
        }

        let text = article.text.as_str();
        let publication_type = self
            .pubtype
            .classify(&self.dispatcher, text, article.fields.author.as_deref())
            .await;
        let political = political::detect_political(&self.dispatcher, text).await;
        let base = valuation::base_sentiment(&self.dispatcher, text).await;
        let valuation = valuation::valuate(base, text, &self.actor_keywords);
        let topic = self
            .topics
            .match_topic(
                &self.dispatcher,
                text,
                &self.catalog,
                publication_type,
                article.fields.date,
            )
            .await;
        let interviewee = if publication_type == PublicationType::Interview {
            interviewee::extract_interviewee(&self.dispatcher, text).await
        } else {
            None
        };

        info!(
            publication_type = %publication_type,
            topic = %topic,
            valuation = %valuation,
            political,
            "Article classified"
        );
        article.publication_type = publication_type;
        article.political = political;
        article.valuation = valuation;
        article.topic = topic;
        article.interviewee = interviewee;
    }
}

/// Classification fields for an article no model may look at.
pub fn mark_for_manual_review(article: &mut Article) {
    article.publication_type = PublicationType::Note;
    article.topic = Topic::ManualReview;
    article.valuation = Valuation::ManualReview;
    article.political = false;
    article.interviewee = None;
}
