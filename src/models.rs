//! Data models for clippings and their classified representations.
//!
//! - [`Article`]: one URL travelling through the pipeline, filled in stage by stage
//! - [`ExtractedFields`]: structured fields scraped from the clipping page
//! - [`PublicationType`], [`Topic`], [`Valuation`]: classification results
//! - [`OutputRecord`] / [`BatchResponse`]: what the run writes out
//!
//! Labels serialise to the Spanish strings the monitoring team works with.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Topic assigned to agenda listings and to unmatched articles.
pub const SCHEDULED_ACTIVITIES: &str = "Actividades programadas";
/// Out-of-band label meaning "could not classify automatically".
pub const MANUAL_REVIEW: &str = "REVISAR MANUAL";

const TITLE_MARK: &str = "[TÍTULO]:";
const BODY_MARK: &str = "[BODY]:";

/// Build the plain text handed to classifiers.
pub fn compose_text(title: Option<&str>, body: &str) -> String {
    match title {
        Some(t) if !t.trim().is_empty() => format!("{TITLE_MARK} {}\n{BODY_MARK} {}", t.trim(), body),
        _ => body.to_string(),
    }
}

/// The headline part of a classifier text: the `[TÍTULO]` section when
/// present, else the first line.
pub fn title_portion(text: &str) -> &str {
    if let Some(rest) = text.strip_prefix(TITLE_MARK) {
        let end = rest.find(BODY_MARK).unwrap_or(rest.len());
        return rest[..end].trim();
    }
    text.lines().next().unwrap_or("").trim()
}

/// Publication type, decided once per article by fixed priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PublicationType {
    #[serde(rename = "Declaración")]
    Declaration,
    #[serde(rename = "Agenda")]
    Agenda,
    #[serde(rename = "Entrevista")]
    Interview,
    #[serde(rename = "Nota de opinión")]
    OpinionNote,
    #[serde(rename = "Nota")]
    Note,
}

impl PublicationType {
    pub fn label(&self) -> &'static str {
        match self {
            PublicationType::Declaration => "Declaración",
            PublicationType::Agenda => "Agenda",
            PublicationType::Interview => "Entrevista",
            PublicationType::OpinionNote => "Nota de opinión",
            PublicationType::Note => "Nota",
        }
    }
}

impl fmt::Display for PublicationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Final sentiment valuation of an article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Valuation {
    #[serde(rename = "NEGATIVA")]
    Negative,
    #[serde(rename = "POSITIVA")]
    Positive,
    #[serde(rename = "NEUTRA")]
    Neutral,
    #[serde(rename = "REVISAR MANUAL")]
    ManualReview,
}

impl fmt::Display for Valuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Valuation::Negative => "NEGATIVA",
            Valuation::Positive => "POSITIVA",
            Valuation::Neutral => "NEUTRA",
            Valuation::ManualReview => MANUAL_REVIEW,
        })
    }
}

/// Topic of an article: a catalog member or one of the two sentinels.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    Catalog(String),
    ScheduledActivities,
    ManualReview,
}

impl Topic {
    pub fn label(&self) -> &str {
        match self {
            Topic::Catalog(name) => name,
            Topic::ScheduledActivities => SCHEDULED_ACTIVITIES,
            Topic::ManualReview => MANUAL_REVIEW,
        }
    }

    pub fn from_label(label: &str) -> Self {
        match label {
            SCHEDULED_ACTIVITIES => Topic::ScheduledActivities,
            MANUAL_REVIEW => Topic::ManualReview,
            other => Topic::Catalog(other.to_string()),
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Topic {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for Topic {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(Topic::from_label(&label))
    }
}

/// Structured fields scraped from a clipping page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedFields {
    pub title: Option<String>,
    pub date: Option<NaiveDate>,
    pub outlet: Option<String>,
    /// "WEB" or "GRÁFICA".
    pub support: Option<String>,
    pub section: Option<String>,
    pub author: Option<String>,
    /// Audience figure as printed by the clipping service.
    pub reach: Option<String>,
    /// Advertising-equivalent monetary figure, e.g. "$97.500".
    pub valuation_figure: Option<String>,
}

/// One clipping travelling through the pipeline.
#[derive(Debug, Clone)]
pub struct Article {
    pub url: String,
    /// Plain text handed to classifiers, see [`compose_text`].
    pub text: String,
    pub fields: ExtractedFields,
    pub publication_type: PublicationType,
    pub topic: Topic,
    pub valuation: Valuation,
    pub political: bool,
    pub crisis: bool,
    pub mentions: Vec<String>,
    pub interviewee: Option<String>,
}

impl Article {
    pub fn new(url: impl Into<String>, text: impl Into<String>, fields: ExtractedFields) -> Self {
        Self {
            url: url.into(),
            text: text.into(),
            fields,
            publication_type: PublicationType::Note,
            topic: Topic::ManualReview,
            valuation: Valuation::ManualReview,
            political: false,
            crisis: false,
            mentions: Vec::new(),
            interviewee: None,
        }
    }
}

/// Serialized record for one classified article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub title: Option<String>,
    pub publication_type: PublicationType,
    pub date: Option<String>,
    pub support: Option<String>,
    pub outlet: Option<String>,
    pub section: Option<String>,
    pub author: Option<String>,
    pub interviewee: Option<String>,
    pub topic: Topic,
    pub link: String,
    pub reach: Option<String>,
    pub valuation_figure: Option<String>,
    pub valuation: Valuation,
    pub political: bool,
    pub crisis: bool,
    pub mentions: Vec<String>,
}

impl From<&Article> for OutputRecord {
    fn from(article: &Article) -> Self {
        let f = &article.fields;
        Self {
            title: f.title.clone(),
            publication_type: article.publication_type,
            date: f.date.map(|d| d.format("%Y-%m-%d").to_string()),
            support: f.support.clone(),
            outlet: f.outlet.clone(),
            section: f.section.clone(),
            author: f.author.clone(),
            interviewee: article.interviewee.clone(),
            topic: article.topic.clone(),
            link: article.url.clone(),
            reach: f.reach.clone(),
            valuation_figure: f.valuation_figure.clone(),
            valuation: article.valuation,
            political: article.political,
            crisis: article.crisis,
            mentions: article.mentions.clone(),
        }
    }
}

/// A URL that was not turned into a record, with the reason why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlError {
    pub url: String,
    pub reason: String,
}

impl UrlError {
    pub fn new(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

/// Overall outcome of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// At least one article was classified.
    Ok,
    /// No URL passed validation.
    Unprocessable,
    /// URLs were valid but none yielded usable content.
    Failed,
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BatchStatus::Ok => "ok",
            BatchStatus::Unprocessable => "unprocessable",
            BatchStatus::Failed => "failed",
        })
    }
}

/// Envelope written at the end of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResponse {
    pub status: BatchStatus,
    pub received: usize,
    pub processed: usize,
    pub errors: Vec<UrlError>,
    /// Wall time as `H:MM:SS`.
    pub processing_time: String,
    pub data: Vec<OutputRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_and_title_portion() {
        let text = compose_text(Some("Reabre el Teatro"), "El ministerio anunció...");
        assert_eq!(text, "[TÍTULO]: Reabre el Teatro\n[BODY]: El ministerio anunció...");
        assert_eq!(title_portion(&text), "Reabre el Teatro");

        let bare = compose_text(None, "Primera línea\nsegunda");
        assert_eq!(title_portion(&bare), "Primera línea");
    }

    #[test]
    fn test_publication_type_serialization() {
        let json = serde_json::to_string(&PublicationType::Declaration).unwrap();
        assert_eq!(json, "\"Declaración\"");
        let back: PublicationType = serde_json::from_str("\"Entrevista\"").unwrap();
        assert_eq!(back, PublicationType::Interview);
    }

    #[test]
    fn test_topic_sentinels_round_trip_by_label() {
        assert_eq!(Topic::from_label(SCHEDULED_ACTIVITIES), Topic::ScheduledActivities);
        assert_eq!(Topic::from_label(MANUAL_REVIEW), Topic::ManualReview);
        assert_eq!(Topic::from_label("Mecenazgo"), Topic::Catalog("Mecenazgo".into()));

        let json = serde_json::to_string(&Topic::ScheduledActivities).unwrap();
        assert_eq!(json, "\"Actividades programadas\"");
    }

    #[test]
    fn test_output_record_from_article() {
        let fields = ExtractedFields {
            title: Some("Título".into()),
            date: NaiveDate::from_ymd_opt(2025, 4, 4),
            valuation_figure: Some("$97.500".into()),
            ..Default::default()
        };
        let mut article = Article::new("https://x.ejes.com/1", "texto", fields);
        article.valuation = Valuation::Negative;
        article.topic = Topic::Catalog("Mecenazgo".into());

        let record = OutputRecord::from(&article);
        assert_eq!(record.date.as_deref(), Some("2025-04-04"));
        assert_eq!(record.link, "https://x.ejes.com/1");
        assert_eq!(record.valuation, Valuation::Negative);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["valuation"], "NEGATIVA");
        assert_eq!(json["topic"], "Mecenazgo");
        assert_eq!(json["publication_type"], "Nota");
    }

    #[test]
    fn test_batch_status_serialization() {
        assert_eq!(
            serde_json::to_string(&BatchStatus::Unprocessable).unwrap(),
            "\"unprocessable\""
        );
    }
}
