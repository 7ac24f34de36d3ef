//! Article sources: turning a validated URL into classifier text plus
//! structured clipping fields.
//!
//! Every source implements [`ArticleSource`]. The only production source is
//! the clipping-service page scraper in [`ejes`]; tests plug in their own.
//!
//! Sources follow the same pattern:
//! - Fetch through [`crate::api::RetryingCaller`] (transient failures retried)
//! - Parse with `scraper` selectors and `regex` captures built once in statics
//! - Report an empty page as [`ScrapeError::Empty`], never as an empty article

pub mod ejes;

use crate::error::ScrapeError;
use crate::models::ExtractedFields;
use async_trait::async_trait;

pub use ejes::EjesScraper;

/// What a source extracted from one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapedPage {
    /// `[TÍTULO]: ...\n[BODY]: ...` text handed to classifiers.
    pub text: String,
    pub fields: ExtractedFields,
}

impl ScrapedPage {
    /// A page is a news item when it carries a date or a monetary valuation.
    pub fn is_valid_news(&self) -> bool {
        self.fields.date.is_some() || self.fields.valuation_figure.is_some()
    }
}

#[async_trait]
pub trait ArticleSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<ScrapedPage, ScrapeError>;
}
