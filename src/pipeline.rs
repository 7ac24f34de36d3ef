//! Batch orchestration.
//!
//! ```text
//! validate URLs -> fetch pages (concurrent) -> content check
//!   -> classify articles (concurrent) -> barrier -> crisis -> response
//! ```
//!
//! Output records keep input URL order. Crisis flags are computed only
//! after every article of the batch has a final topic and valuation.

use crate::classify::{ArticleClassifier, mark_for_manual_review};
use crate::crisis::{CrisisAggregator, HistoricalRecord};
use crate::models::{Article, BatchResponse, BatchStatus, OutputRecord, UrlError};
use crate::scrapers::ArticleSource;
use crate::utils::format_elapsed;
use crate::validation::validate_urls;
use futures::FutureExt;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

pub const EXTRACTION_FAILED: &str =
    "No se pudo extraer contenido (servidor no disponible o contenido vacío)";
pub const INVALID_CONTENT: &str =
    "Contenido extraído no es una noticia válida (fecha y cotización son null)";

/// Concurrency limits for one batch.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub fetch: usize,
    pub classify: usize,
}

pub struct Pipeline<S> {
    source: S,
    classifier: ArticleClassifier,
    crisis: CrisisAggregator,
    allowed_domain: String,
    limits: Limits,
}

impl<S: ArticleSource> Pipeline<S> {
    pub fn new(
        source: S,
        classifier: ArticleClassifier,
        crisis: CrisisAggregator,
        allowed_domain: impl Into<String>,
        limits: Limits,
    ) -> Self {
        Self {
            source,
            classifier,
            crisis,
            allowed_domain: allowed_domain.into(),
            limits: Limits {
                fetch: limits.fetch.max(1),
                classify: limits.classify.max(1),
            },
        }
    }

    #[instrument(level = "info", skip_all, fields(received = urls.len()))]
    pub async fn run(&self, urls: &[Value], history: &[HistoricalRecord]) -> BatchResponse {
        let started = Instant::now();
        let validation = validate_urls(urls, &self.allowed_domain);
        let mut errors = validation.rejected;

        if validation.valid.is_empty() {
            warn!("No URL passed validation");
            return self.response(BatchStatus::Unprocessable, urls.len(), errors, Vec::new(), started);
        }

        let (mut articles, extraction_errors, content_errors) = self.fetch_all(validation.valid).await;
        errors.extend(extraction_errors);
        errors.extend(content_errors);

        if articles.is_empty() {
            error!("No URL produced usable content");
            return self.response(BatchStatus::Failed, urls.len(), errors, Vec::new(), started);
        }

        articles = self.classify_all(articles).await;

        // Barrier: every article is classified before crisis is evaluated.
        self.crisis.aggregate(&mut articles, history);

        let data: Vec<OutputRecord> = articles.iter().map(OutputRecord::from).collect();
        self.response(BatchStatus::Ok, urls.len(), errors, data, started)
    }

    /// Fetch pages in input order. Returns articles, extraction failures
    /// and pages that are not news items.
    async fn fetch_all(&self, urls: Vec<String>) -> (Vec<Article>, Vec<UrlError>, Vec<UrlError>) {
        let results: Vec<(String, Result<_, _>)> = stream::iter(urls)
            .map(|url| async move {
                let result = self.source.fetch(&url).await;
                (url, result)
            })
            .buffered(self.limits.fetch)
            .collect()
            .await;

        let mut articles = Vec::new();
        let mut extraction_errors = Vec::new();
        let mut content_errors = Vec::new();
        for (url, result) in results {
            match result {
                Ok(page) if page.is_valid_news() => {
                    articles.push(Article::new(url, page.text, page.fields));
                }
                Ok(_) => {
                    warn!(%url, "Page is not a news item");
                    content_errors.push(UrlError::new(url, INVALID_CONTENT));
                }
                Err(e) => {
                    warn!(%url, error = %e, "Extraction failed");
                    extraction_errors.push(UrlError::new(url, EXTRACTION_FAILED));
                }
            }
        }
        info!(
            articles = articles.len(),
            extraction_errors = extraction_errors.len(),
            content_errors = content_errors.len(),
            "Fetch phase finished"
        );
        (articles, extraction_errors, content_errors)
    }

    async fn classify_all(&self, articles: Vec<Article>) -> Vec<Article> {
        stream::iter(articles)
            .map(|mut article| async move {
                let outcome = AssertUnwindSafe(self.classifier.classify(&mut article))
                    .catch_unwind()
                    .await;
                if outcome.is_err() {
                    error!(url = %article.url, "Classification panicked; flagged for manual review");
                    mark_for_manual_review(&mut article);
                }
                article
            })
            .buffered(self.limits.classify)
            .collect()
            .await
    }

    fn response(
        &self,
        status: BatchStatus,
        received: usize,
        errors: Vec<UrlError>,
        data: Vec<OutputRecord>,
        started: Instant,
    ) -> BatchResponse {
        let response = BatchResponse {
            status,
            received,
            processed: data.len(),
            errors,
            processing_time: format_elapsed(started.elapsed()),
            data,
        };
        info!(
            status = %response.status,
            received = response.received,
            processed = response.processed,
            errors = response.errors.len(),
            processing_time = %response.processing_time,
            "Batch finished"
        );
        response
    }
}
