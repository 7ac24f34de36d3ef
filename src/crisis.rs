//! Crisis detection over the current batch plus historical records.
//!
//! A topic is in crisis when the number of negative articles about it,
//! counted over history and the current batch together, reaches the
//! threshold. Fixed (high-volume) topics and the manual-review sentinel are
//! never in crisis.

use crate::config::CrisisSettings;
use crate::models::{Article, OutputRecord, Topic, Valuation};
use crate::utils::normalize_text;
use chrono::NaiveDate;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

/// A previously classified article, as stored in the history file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalRecord {
    pub topic: Topic,
    pub valuation: Valuation,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub link: Option<String>,
}

impl From<&OutputRecord> for HistoricalRecord {
    fn from(record: &OutputRecord) -> Self {
        Self {
            topic: record.topic.clone(),
            valuation: record.valuation,
            date: record
                .date
                .as_deref()
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
            link: Some(record.link.clone()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CrisisAggregator {
    threshold: usize,
    fixed_topics: HashSet<String>,
}

impl CrisisAggregator {
    pub fn new(threshold: usize, fixed_topics: impl IntoIterator<Item = String>) -> Self {
        if threshold == 0 {
            warn!("Crisis threshold is 0; every topic with a negative article is a crisis");
        }
        Self {
            threshold,
            fixed_topics: fixed_topics.into_iter().map(|t| normalize_text(t.trim())).collect(),
        }
    }

    pub fn from_settings(settings: &CrisisSettings) -> Self {
        Self::new(settings.threshold, settings.fixed_topics.iter().cloned())
    }

    fn counts(&self, topic: &Topic) -> bool {
        !matches!(topic, Topic::ManualReview)
            && !self.fixed_topics.contains(&normalize_text(topic.label()))
    }

    /// Topic labels in crisis given the batch and the history.
    pub fn crisis_topics(&self, current: &[Article], history: &[HistoricalRecord]) -> HashSet<String> {
        let negatives = history
            .iter()
            .map(|r| (&r.topic, r.valuation))
            .chain(current.iter().map(|a| (&a.topic, a.valuation)))
            .filter(|(topic, valuation)| *valuation == Valuation::Negative && self.counts(topic))
            .map(|(topic, _)| topic.label().to_string());

        let counts: HashMap<String, usize> = negatives.counts();
        counts
            .into_iter()
            .filter(|(_, n)| *n >= self.threshold.max(1))
            .map(|(topic, _)| topic)
            .collect()
    }

    /// Set the crisis flag on every article of the batch and return the
    /// topics in crisis.
    pub fn aggregate(&self, current: &mut [Article], history: &[HistoricalRecord]) -> HashSet<String> {
        let topics = self.crisis_topics(current, history);
        for article in current.iter_mut() {
            article.crisis = self.counts(&article.topic) && topics.contains(article.topic.label());
        }
        if !topics.is_empty() {
            info!(topics = ?topics.iter().sorted().collect::<Vec<_>>(), "Crisis topics detected");
        }
        topics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExtractedFields, SCHEDULED_ACTIVITIES};

    fn article(topic: Topic, valuation: Valuation) -> Article {
        let mut a = Article::new("https://x.ejes.com", "t", ExtractedFields::default());
        a.topic = topic;
        a.valuation = valuation;
        a
    }

    fn negatives(topic: &str, n: usize) -> Vec<Article> {
        (0..n)
            .map(|_| article(Topic::from_label(topic), Valuation::Negative))
            .collect()
    }

    fn aggregator() -> CrisisAggregator {
        CrisisAggregator::from_settings(&CrisisSettings::default())
    }

    #[test]
    fn test_four_negatives_is_not_a_crisis() {
        let mut batch = negatives("Subte", 4);
        let topics = aggregator().aggregate(&mut batch, &[]);
        assert!(topics.is_empty());
        assert!(batch.iter().all(|a| !a.crisis));
    }

    #[test]
    fn test_five_negatives_is_a_crisis() {
        let mut batch = negatives("Subte", 5);
        batch.push(article(Topic::Catalog("Subte".into()), Valuation::Neutral));
        batch.push(article(Topic::Catalog("Museos".into()), Valuation::Negative));
        let topics = aggregator().aggregate(&mut batch, &[]);
        assert_eq!(topics, HashSet::from(["Subte".to_string()]));
        // Every article on the topic is flagged, whatever its own valuation.
        assert_eq!(batch.iter().filter(|a| a.crisis).count(), 6);
        assert!(!batch[6].crisis);
    }

    #[test]
    fn test_history_counts_toward_threshold() {
        let mut batch = negatives("Subte", 2);
        let history: Vec<HistoricalRecord> = (0..3)
            .map(|_| HistoricalRecord {
                topic: Topic::Catalog("Subte".into()),
                valuation: Valuation::Negative,
                date: None,
                link: None,
            })
            .collect();
        let topics = aggregator().aggregate(&mut batch, &history);
        assert!(topics.contains("Subte"));
        assert!(batch.iter().all(|a| a.crisis));
    }

    #[test]
    fn test_fixed_topic_never_in_crisis() {
        let mut batch = negatives(SCHEDULED_ACTIVITIES, 100);
        let topics = aggregator().aggregate(&mut batch, &[]);
        assert!(topics.is_empty());
        assert!(batch.iter().all(|a| !a.crisis));
    }

    #[test]
    fn test_fixed_topics_match_ignoring_case_and_accents() {
        let aggregator = CrisisAggregator::new(
            5,
            ["actividades programadas".to_string(), " MUSEOS ".to_string(), "Gestión".to_string()],
        );
        let mut batch = negatives(SCHEDULED_ACTIVITIES, 6);
        batch.extend(negatives("Museos", 6));
        batch.extend(negatives("gestion", 6));
        batch.extend(negatives("Subte", 5));

        let topics = aggregator.aggregate(&mut batch, &[]);
        assert_eq!(topics, HashSet::from(["Subte".to_string()]));
        assert_eq!(batch.iter().filter(|a| a.crisis).count(), 5);
    }

    #[test]
    fn test_manual_review_never_in_crisis() {
        let mut batch: Vec<Article> = (0..10)
            .map(|_| article(Topic::ManualReview, Valuation::Negative))
            .collect();
        assert!(aggregator().aggregate(&mut batch, &[]).is_empty());
    }

    #[test]
    fn test_history_record_json() {
        let json = r#"[{"topic":"Subte","valuation":"NEGATIVA","date":"2025-04-01"},
                       {"topic":"Actividades programadas","valuation":"NEUTRA"}]"#;
        let records: Vec<HistoricalRecord> = serde_json::from_str(json).unwrap();
        assert_eq!(records[0].topic, Topic::Catalog("Subte".into()));
        assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2025, 4, 1));
        assert_eq!(records[1].topic, Topic::ScheduledActivities);
        assert_eq!(records[1].link, None);
    }
}
