use crate::utils::normalize_text;
use itertools::Itertools;

/// Finds which of the requested mention keywords appear in a text.
#[derive(Debug, Clone, Default)]
pub struct MentionDetector {
    keywords: Vec<(String, String)>,
    max: usize,
}

impl MentionDetector {
    pub fn new(keywords: &[String], max: usize) -> Self {
        let keywords = keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(|k| (k.to_string(), normalize_text(k)))
            .unique_by(|(_, folded)| folded.clone())
            .collect();
        Self { keywords, max }
    }

    /// Keywords present in `text`, in request order, at most `max`.
    pub fn detect(&self, text: &str) -> Vec<String> {
        if self.keywords.is_empty() || self.max == 0 {
            return Vec::new();
        }
        let haystack = normalize_text(text);
        self.keywords
            .iter()
            .filter(|(_, folded)| haystack.contains(folded.as_str()))
            .map(|(original, _)| original.clone())
            .take(self.max)
            .collect()
    }
}
