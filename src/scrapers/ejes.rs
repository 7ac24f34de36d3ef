//! Clipping-service page scraper.
//!
//! Clipping pages are minimal HTML with a fixed set of `span` classes:
//!
//! | Selector | Content |
//! |----------|---------|
//! | `span.titulo` | headline (falls back to `<title>`) |
//! | `span.canal` | `dd/mm/yyyy Outlet - Nota - Section - Pag N` |
//! | `span.detalleFull` | article body |
//! | `span.medicion` | `Audiencia: N` and `Cotización: $N` lines |
//! | `span.entrevistado` | author byline, only valid before the body |

use super::{ArticleSource, ScrapedPage};
use crate::api::{HttpRequest, RetryPolicy, RetryingCaller, Transport};
use crate::config::ScrapeSettings;
use crate::error::ScrapeError;
use crate::models::{ExtractedFields, compose_text};
use crate::utils::{parse_loose_date, truncate_for_log};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

const DEFAULT_AUTHOR: &str = "Redacción";
const DEFAULT_SECTION: &str = "Sitio";

static TITLE: Lazy<Selector> = Lazy::new(|| selector("span.titulo"));
static PAGE_TITLE: Lazy<Selector> = Lazy::new(|| selector("title"));
static CHANNEL: Lazy<Selector> = Lazy::new(|| selector("span.canal"));
static BODY: Lazy<Selector> = Lazy::new(|| selector("span.detalleFull"));
static DOC_BODY: Lazy<Selector> = Lazy::new(|| selector("body"));
static MEASURE: Lazy<Selector> = Lazy::new(|| selector("span.medicion"));
static BYLINE_OR_BODY: Lazy<Selector> =
    Lazy::new(|| selector("span.entrevistado, span.detalleFull"));
static LINK: Lazy<Selector> = Lazy::new(|| selector("a[href]"));

static DATE_RE: Lazy<Regex> = Lazy::new(|| regex(r"(\d{2}/\d{2}/\d{4})"));
static OUTLET_RE: Lazy<Regex> = Lazy::new(|| regex(r"\d{2}/\d{2}/\d{4}\s+([^-]+?)\s*-\s*"));
static SECTION_RE: Lazy<Regex> = Lazy::new(|| regex(r"Nota\s*-\s*([^-]+?)(?:\s*-\s*Pag|\s*$)"));
static SECTION_URL_RE: Lazy<Regex> = Lazy::new(|| regex(r"\.com(?:\.ar)?/([^/]+)/"));
static REACH_RE: Lazy<Regex> = Lazy::new(|| regex(r"Audiencia:\s*([^\s=]+)"));
static FIGURE_RE: Lazy<Regex> = Lazy::new(|| regex(r"\$\s*[\d.,]+"));
static BYLINE_PREFIX_RE: Lazy<Regex> = Lazy::new(|| regex(r"(?i)^por(?:\s*:\s*|\s+)"));
static CAMEL_RE: Lazy<Regex> = Lazy::new(|| regex(r"([a-z])([A-Z])"));
static LETTER_DIGIT_RE: Lazy<Regex> = Lazy::new(|| regex(r"([a-zA-Z])(\d)"));

// Patterns are literals; `test_static_patterns_compile` forces them all.
fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

fn regex(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static regex")
}

/// Fetches and parses clipping pages.
pub struct EjesScraper<T> {
    caller: RetryingCaller<T>,
    timeout: Duration,
}

impl<T: Transport> EjesScraper<T> {
    pub fn new(transport: T, settings: &ScrapeSettings, base_policy: &RetryPolicy) -> Self {
        let policy = RetryPolicy {
            max_retries: settings.max_retries,
            ..base_policy.clone()
        };
        Self {
            caller: RetryingCaller::new(transport, policy),
            timeout: Duration::from_secs(settings.timeout_secs),
        }
    }
}

#[async_trait]
impl<T: Transport> ArticleSource for EjesScraper<T> {
    #[instrument(level = "info", skip_all, fields(%url))]
    async fn fetch(&self, url: &str) -> Result<ScrapedPage, ScrapeError> {
        let response = self.caller.call(&HttpRequest::get(url, self.timeout)).await?;
        let page = parse_page(&response.body)?;
        info!(
            chars = page.text.chars().count(),
            date = ?page.fields.date,
            outlet = ?page.fields.outlet,
            "Parsed clipping page"
        );
        Ok(page)
    }
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty())
}

/// Parse a clipping page into classifier text and fields.
pub fn parse_page(html: &str) -> Result<ScrapedPage, ScrapeError> {
    if !html.trim_start().starts_with('<') {
        return Err(ScrapeError::Parse(format!(
            "response is not HTML: {}",
            truncate_for_log(html.trim(), 60)
        )));
    }
    let document = Html::parse_document(html);

    let title = first_text(&document, &TITLE).or_else(|| first_text(&document, &PAGE_TITLE));
    let body = first_text(&document, &BODY)
        .or_else(|| first_text(&document, &DOC_BODY))
        .unwrap_or_default();
    if body.is_empty() && title.is_none() {
        return Err(ScrapeError::Empty);
    }

    let channel = first_text(&document, &CHANNEL);
    let raw_outlet = channel.as_deref().and_then(extract_outlet);
    if channel.is_none() {
        debug!("No channel span on page");
    }

    let fields = ExtractedFields {
        date: channel.as_deref().and_then(extract_date),
        support: raw_outlet.as_deref().map(support_for),
        outlet: raw_outlet.as_deref().map(normalize_outlet),
        section: Some(extract_section(channel.as_deref(), &document)),
        author: Some(extract_author(&document)),
        reach: measures(&document, "Audiencia:").find_map(|t| {
            REACH_RE
                .captures(&t)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
        }),
        valuation_figure: measures(&document, "Cotizaci")
            .find_map(|t| FIGURE_RE.find(&t).map(|m| m.as_str().to_string())),
        title: title.clone(),
    };

    Ok(ScrapedPage {
        text: compose_text(title.as_deref(), &body),
        fields,
    })
}

fn measures<'a>(document: &'a Html, marker: &'a str) -> impl Iterator<Item = String> + 'a {
    document
        .select(&MEASURE)
        .map(element_text)
        .filter(move |t| t.contains(marker))
}

fn extract_date(channel: &str) -> Option<chrono::NaiveDate> {
    DATE_RE
        .captures(channel)
        .and_then(|c| c.get(1))
        .and_then(|m| parse_loose_date(m.as_str()))
}

fn extract_outlet(channel: &str) -> Option<String> {
    let outlet = OUTLET_RE.captures(channel)?.get(1)?.as_str().trim();
    (!outlet.is_empty()).then(|| outlet.to_string())
}

/// "WEB" for online outlets, "GRÁFICA" for print.
pub fn support_for(raw_outlet: &str) -> String {
    if raw_outlet.to_lowercase().contains(".com") {
        "WEB".to_string()
    } else {
        "GRÁFICA".to_string()
    }
}

fn extract_section(channel: Option<&str>, document: &Html) -> String {
    if let Some(section) = channel
        .and_then(|c| SECTION_RE.captures(c))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
    {
        return section;
    }
    document
        .select(&LINK)
        .next()
        .and_then(|a| a.value().attr("href"))
        .and_then(|href| SECTION_URL_RE.captures(href))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| DEFAULT_SECTION.to_string())
}

/// Byline from `span.entrevistado`, only when it precedes the body.
fn extract_author(document: &Html) -> String {
    let first = document.select(&BYLINE_OR_BODY).next();
    let byline = first
        .filter(|el| el.value().classes().any(|c| c == "entrevistado"))
        .map(element_text)
        .map(|t| clean_author(&t))
        .filter(|t| !t.is_empty());
    match byline {
        Some(author) => author,
        None => {
            if document.select(&BYLINE_OR_BODY).count() > 1 {
                warn!("Byline found after the article body; ignored");
            }
            DEFAULT_AUTHOR.to_string()
        }
    }
}

/// Strip a leading "Por" / "Por:" from a byline.
pub fn clean_author(raw: &str) -> String {
    BYLINE_PREFIX_RE.replace(raw.trim(), "").trim().to_string()
}

/// Canonical outlet name: no accents, domain suffix or parenthesised
/// notes, camelCase split, title case.
pub fn normalize_outlet(raw: &str) -> String {
    let mut name: String = raw.trim().nfd().filter(|c| !is_combining_mark(*c)).collect();

    for suffix in [".com", ".ar", ".net"] {
        if let Some(idx) = name.to_ascii_lowercase().find(suffix) {
            name.truncate(idx);
        }
    }
    if let Some(idx) = name.find('(') {
        name.truncate(idx);
    }

    let name = CAMEL_RE.replace_all(&name, "$1 $2");
    let name = LETTER_DIGIT_RE.replace_all(&name, "$1 $2");
    title_case(&name)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if prev_alpha {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        prev_alpha = c.is_alphabetic();
    }
    out
}
