//! # prensai
//!
//! Classifies press clippings for a government communications team: each
//! clipping URL is scraped, labelled by language models (publication type,
//! topic, sentiment, political content) and checked for crisis topics
//! across the batch.
//!
//! ## Usage
//!
//! ```sh
//! prensai -r ./request.json -o ./out
//! ```
//!
//! ## Architecture
//!
//! 1. **Validation**: request fields and URLs (only the clipping domain)
//! 2. **Fetching**: download and parse clipping pages (concurrent, retried)
//! 3. **Classification**: hosted model first when enabled, local model as
//!    fallback, safe default labels when both fail
//! 4. **Aggregation**: crisis flags once the whole batch is classified
//! 5. **Output**: batch response JSON, optional crisis history update

use chrono::Local;
use clap::Parser;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod backends;
mod classify;
mod cli;
mod config;
mod crisis;
mod dispatcher;
mod error;
mod models;
mod outputs;
mod pipeline;
mod scrapers;
mod tasks;
mod utils;
mod validation;

use api::ReqwestTransport;
use backends::{BackendRoster, probe_health};
use classify::ArticleClassifier;
use cli::Cli;
use config::{RuntimeConfig, Settings};
use crisis::CrisisAggregator;
use dispatcher::FallbackDispatcher;
use error::AppError;
use models::BatchStatus;
use outputs::{history, json};
use pipeline::{Limits, Pipeline};
use scrapers::EjesScraper;
use utils::ensure_writable_dir;
use validation::BatchRequest;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();

    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = Instant::now();
    info!("prensai starting up");

    let args = Cli::parse();
    debug!(?args.request, ?args.output_dir, ?args.config, "Parsed CLI arguments");

    // Early check: the output directory must be writable before any work is done.
    ensure_writable_dir(&args.output_dir)
        .await
        .map_err(|source| AppError::Io {
            path: args.output_dir.clone(),
            source,
        })?;

    // ---- Configuration ----
    let mut settings = Settings::load(args.config.as_deref())?;
    if let Some(model) = &args.ollama_model {
        settings.fallback.model = model.clone();
    }
    let runtime = RuntimeConfig::from_settings(&settings)?;
    if let Some(enabled) = args.primary_override() {
        runtime.set_primary_enabled(enabled);
    }
    if let Some(max) = args.max_text_len {
        runtime.set_max_text_len(max)?;
    }

    // ---- Request ----
    let raw = tokio::fs::read_to_string(&args.request)
        .await
        .map_err(|source| AppError::Io {
            path: args.request.clone(),
            source,
        })?;
    let request = BatchRequest::from_json(&raw)?.validate()?;

    // ---- Backends ----
    let transport = ReqwestTransport::new().map_err(|e| AppError::Client(e.to_string()))?;
    let api_key = args.openai_api_key.as_deref();
    let health = probe_health(&settings, api_key, &transport).await;
    health.log();
    let roster = BackendRoster::from_settings(&settings, api_key, transport.clone(), &health);

    // One snapshot per batch: toggles never change mid-batch.
    let snapshot = runtime.snapshot();
    let dispatcher = FallbackDispatcher::new(roster.ordered(&snapshot));
    info!(
        primary_enabled = snapshot.primary_enabled,
        primary_configured = roster.has_primary(),
        backends = dispatcher.backend_count(),
        max_text_len = snapshot.max_text_len,
        fallback_model = %settings.fallback.model,
        "Backend order fixed for this batch"
    );

    let classifier = ArticleClassifier::new(dispatcher, request.context, &settings, &snapshot);
    let scraper = EjesScraper::new(transport, &settings.scrape, &settings.retry.policy());
    let pipeline = Pipeline::new(
        scraper,
        classifier,
        CrisisAggregator::from_settings(&settings.crisis),
        settings.allowed_domain.clone(),
        Limits {
            fetch: settings.scrape.concurrency,
            classify: settings.classification.concurrency,
        },
    );

    // ---- Run ----
    let history_path = args.history_path(settings.crisis.history_path.as_deref());
    let past = history::load_history(&history_path).await?;
    let response = pipeline.run(&request.urls, &past).await;

    for e in &response.errors {
        warn!(url = %e.url, reason = %e.reason, "URL not processed");
    }

    // ---- Output ----
    let path = json::write_response(&response, &args.output_dir, Local::now()).await?;
    info!(%path, "Batch response written");

    if args.append_history && response.status == BatchStatus::Ok {
        history::append_history(&history_path, &response.data).await?;
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        status = %response.status,
        "Execution complete"
    );

    if response.status != BatchStatus::Ok {
        return Err(AppError::BatchStatus(response.status.to_string()));
    }
    Ok(())
}
