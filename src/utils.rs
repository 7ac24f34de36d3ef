//! Utility functions for text normalisation, dates, logging and the file system.
//!
//! This module provides helpers used throughout the application:
//! - Case and diacritic folding for keyword and topic matching
//! - Loose date parsing for catalog entries and clipping headers
//! - String truncation for logging
//! - Output directory validation

use chrono::NaiveDate;
use std::fs as stdfs;
use std::time::Duration;
use tokio::fs;
use tracing::{info, instrument};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Lowercase `text` and strip diacritics ("Ministerio de Cultura" and
/// "MINISTÉRIO DE CULTURA" normalise to the same string).
pub fn normalize_text(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Case/diacritic-insensitive substring test.
pub fn contains_normalized(haystack: &str, needle: &str) -> bool {
    let needle = normalize_text(needle.trim());
    !needle.is_empty() && normalize_text(haystack).contains(&needle)
}

/// Parse `d/m/yyyy`-style dates with `/`, `.` or `-` separators.
///
/// Two-digit years up to 30 map to 20xx, the rest to 19xx. ISO
/// `yyyy-mm-dd` is accepted too.
pub fn parse_loose_date(raw: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = raw.trim().split(['/', '.', '-']).collect();
    if parts.len() != 3 {
        return None;
    }
    if parts[0].len() == 4 {
        return NaiveDate::from_ymd_opt(
            parts[0].parse().ok()?,
            parts[1].parse().ok()?,
            parts[2].parse().ok()?,
        );
    }
    let day: u32 = parts[0].parse().ok()?;
    let month: u32 = parts[1].parse().ok()?;
    let year: i32 = match parts[2].len() {
        2 => {
            let yy: i32 = parts[2].parse().ok()?;
            if yy <= 30 { 2000 + yy } else { 1900 + yy }
        }
        4 => parts[2].parse().ok()?,
        _ => return None,
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Format an elapsed duration as `H:MM:SS`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut at a character boundary at or before `max` bytes
/// and an ellipsis with the number of dropped bytes is appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then writes and removes a probe file.
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> std::io::Result<()> {
    fs::create_dir_all(path).await?;
    let probe_path = format!("{}/..__probe_write__", path.trim_end_matches('/'));
    stdfs::File::create(&probe_path)?;
    let _ = stdfs::remove_file(&probe_path);
    info!("Output directory is writable");
    Ok(())
}
