//! Batch request parsing and URL validation.
//!
//! The request is the JSON document handed to the CLI. Keyword fields
//! accept arbitrarily nested string lists; they are flattened here once so
//! no later stage sees the nesting.

use crate::classify::ClassificationContext;
use crate::classify::topic::{TopicCatalog, TopicEntry};
use crate::error::ValidationError;
use crate::models::UrlError;
use crate::utils::parse_loose_date;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

/// A string or a (possibly nested) list of strings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum KeywordInput {
    One(String),
    Many(Vec<KeywordInput>),
}

impl KeywordInput {
    /// Depth-first flattening; blank strings are dropped.
    pub fn flatten(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.flatten_into(&mut out);
        out
    }

    fn flatten_into(&self, out: &mut Vec<String>) {
        match self {
            KeywordInput::One(s) => {
                let s = s.trim();
                if !s.is_empty() {
                    out.push(s.to_string());
                }
            }
            KeywordInput::Many(items) => items.iter().for_each(|i| i.flatten_into(out)),
        }
    }
}

/// A catalog entry as written in the request.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum TopicInput {
    /// `"Name;d/m/yyyy"` or just `"Name"`.
    Line(String),
    Entry {
        #[serde(alias = "nombre", alias = "tema")]
        name: String,
        #[serde(default, alias = "fecha")]
        date: Option<String>,
    },
}

impl TopicInput {
    fn to_entry(&self) -> Option<TopicEntry> {
        match self {
            TopicInput::Line(line) => TopicEntry::parse_line(line),
            TopicInput::Entry { name, date } => {
                let name = name.trim();
                (!name.is_empty()).then(|| TopicEntry {
                    name: name.to_string(),
                    date: date.as_deref().and_then(parse_loose_date),
                })
            }
        }
    }
}

/// Raw batch request. Field names also accept the Spanish keys used by
/// the monitoring team's tooling.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchRequest {
    #[serde(default)]
    pub urls: Option<Vec<Value>>,
    #[serde(default, alias = "temas")]
    pub topics: Option<Vec<TopicInput>>,
    #[serde(default, alias = "menciones")]
    pub mentions: Option<KeywordInput>,
    #[serde(default, alias = "ministro_key_words")]
    pub minister_keywords: Option<KeywordInput>,
    #[serde(default, alias = "ministerios_key_words")]
    pub ministry_keywords: Option<KeywordInput>,
}

/// A request that passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    pub urls: Vec<Value>,
    pub context: ClassificationContext,
}

impl BatchRequest {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn validate(self) -> Result<ValidatedRequest, ValidationError> {
        let urls = self.urls.ok_or(ValidationError::Missing("urls"))?;
        if urls.is_empty() {
            return Err(ValidationError::Empty("urls"));
        }

        let topics = self.topics.ok_or(ValidationError::Missing("topics"))?;
        let catalog = TopicCatalog::new(topics.iter().filter_map(TopicInput::to_entry));
        if catalog.is_empty() {
            return Err(ValidationError::Empty("topics"));
        }

        let minister_keywords = required_keywords(self.minister_keywords, "minister_keywords")?;
        let ministry_keywords = required_keywords(self.ministry_keywords, "ministry_keywords")?;
        let mention_keywords = self.mentions.map(|m| m.flatten()).unwrap_or_default();

        info!(
            urls = urls.len(),
            topics = catalog.len(),
            ministers = minister_keywords.len(),
            ministries = ministry_keywords.len(),
            mentions = mention_keywords.len(),
            "Request validated"
        );
        Ok(ValidatedRequest {
            urls,
            context: ClassificationContext {
                catalog,
                minister_keywords,
                ministry_keywords,
                mention_keywords,
            },
        })
    }
}

fn required_keywords(
    input: Option<KeywordInput>,
    field: &'static str,
) -> Result<Vec<String>, ValidationError> {
    let keywords = input.ok_or(ValidationError::Missing(field))?.flatten();
    if keywords.is_empty() {
        return Err(ValidationError::Empty(field));
    }
    Ok(keywords)
}

/// Outcome of validating the URL list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlValidation {
    pub valid: Vec<String>,
    pub rejected: Vec<UrlError>,
}

/// Validate one URL against the allowed domain. Returns the reason on rejection.
pub fn check_url(raw: &str, allowed_domain: &str) -> Result<(), String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("URL vacía".to_string());
    }
    let url = Url::parse(raw).map_err(|_| "URL con formato inválido".to_string())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!(
            "Protocolo no permitido: {} (solo http o https)",
            url.scheme()
        ));
    }
    let host = url
        .host_str()
        .map(|h| h.trim_end_matches('.').to_ascii_lowercase())
        .filter(|h| !h.is_empty())
        .ok_or_else(|| "URL sin dominio".to_string())?;
    let allowed = allowed_domain.trim().trim_end_matches('.').to_ascii_lowercase();
    let on_domain = host == allowed || host.ends_with(&format!(".{allowed}"));
    if !on_domain {
        return Err(format!("Dominio no permitido: {host} (solo {allowed})"));
    }
    Ok(())
}

/// Split `urls` into valid URLs and rejections, keeping input order.
pub fn validate_urls(urls: &[Value], allowed_domain: &str) -> UrlValidation {
    let mut out = UrlValidation::default();
    for value in urls {
        match value {
            Value::String(s) => match check_url(s, allowed_domain) {
                Ok(()) => out.valid.push(s.trim().to_string()),
                Err(reason) => {
                    debug!(url = %s, %reason, "URL rejected");
                    out.rejected.push(UrlError::new(s.clone(), reason));
                }
            },
            Value::Null => out
                .rejected
                .push(UrlError::new("null", "URL vacía")),
            other => out
                .rejected
                .push(UrlError::new(other.to_string(), "URL no es un texto")),
        }
    }
    info!(
        valid = out.valid.len(),
        rejected = out.rejected.len(),
        "URLs validated"
    );
    out
}
