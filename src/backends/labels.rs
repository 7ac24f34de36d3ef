//! Turning free-form model output into one allowed label.
//!
//! Rules run in order and the first hit wins:
//! 1. exact match against an allowed label, ignoring case, accents,
//!    surrounding quotes and trailing punctuation
//! 2. keyword rules of the task, in their listed order
//! 3. the task's conservative fallback label
//!
//! Open tasks (no label set) accept the first non-empty line. A "nothing
//! found" answer is a valid result and comes back as the task's first
//! reject phrase.

use crate::tasks::{Anchor, Constraints};
use crate::utils::normalize_text;

/// Longest answer accepted for an open extraction task.
const MAX_OPEN_ANSWER_CHARS: usize = 80;

/// Normalised comparison form: folded case and accents, `_` as space,
/// surrounding punctuation trimmed, inner whitespace collapsed.
fn fold(s: &str) -> String {
    let folded = normalize_text(s).replace('_', " ");
    let trimmed = folded.trim_matches(|c: char| {
        c.is_whitespace() || matches!(c, '"' | '\'' | '*' | '.' | ':' | '`' | '«' | '»' | '“' | '”')
    });
    trimmed.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn first_word(folded: &str) -> &str {
    folded
        .split(|c: char| !c.is_alphanumeric())
        .find(|w| !w.is_empty())
        .unwrap_or("")
}

/// Map `raw` model output to a label allowed by `constraints`.
pub fn normalize_label(raw: &str, constraints: &Constraints) -> Option<String> {
    if constraints.is_open() {
        return normalize_open(raw, constraints);
    }

    let folded = fold(raw);
    if folded.is_empty() {
        return None;
    }

    if let Some(label) = constraints.labels.iter().find(|l| fold(l) == folded) {
        return Some(label.clone());
    }

    let head = first_word(&folded);
    for rule in &constraints.keywords {
        let needle = fold(&rule.needle);
        if needle.is_empty() {
            continue;
        }
        let hit = match rule.anchor {
            Anchor::FirstWord => head == needle,
            Anchor::Anywhere => folded.contains(&needle),
        };
        if hit {
            return Some(rule.label.clone());
        }
    }

    constraints.fallback_label.clone()
}

fn normalize_open(raw: &str, constraints: &Constraints) -> Option<String> {
    let line = raw.lines().map(str::trim).find(|l| !l.is_empty())?;
    let answer = line
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '*' | '.' | '`' | '«' | '»' | '“' | '”'))
        .trim();
    if answer.is_empty() || answer.chars().count() > MAX_OPEN_ANSWER_CHARS {
        return None;
    }
    let folded = fold(answer);
    if constraints.rejects.iter().any(|r| fold(r) == folded) {
        return constraints.rejects.first().cloned();
    }
    Some(answer.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::{
        ClassificationTask, NEGATIVE, NO, NOT_IDENTIFIED, NOT_NEGATIVE, TopicOption, YES,
    };

    fn yes_no() -> Constraints {
        ClassificationTask::agenda("x").constraints
    }

    #[test]
    fn test_exact_match_ignores_case_accents_and_punctuation() {
        let c = yes_no();
        assert_eq!(normalize_label("SI", &c).as_deref(), Some(YES));
        assert_eq!(normalize_label("  sí.", &c).as_deref(), Some(YES));
        assert_eq!(normalize_label("\"No\"", &c).as_deref(), Some(NO));
    }

    #[test]
    fn test_first_word_rule() {
        let c = yes_no();
        assert_eq!(
            normalize_label("Sí, el texto enumera actividades", &c).as_deref(),
            Some(YES)
        );
        assert_eq!(
            normalize_label("No, es una crónica", &c).as_deref(),
            Some(NO)
        );
        // "Sin" must not read as "Si".
        assert_eq!(
            normalize_label("Sin duda es una agenda", &c).as_deref(),
            Some(NO)
        );
    }

    #[test]
    fn test_valuation_keywords_prefer_not_negative() {
        let c = ClassificationTask::valuation("x").constraints;
        assert_eq!(normalize_label("NEGATIVA", &c).as_deref(), Some(NEGATIVE));
        assert_eq!(normalize_label("no_negativa", &c).as_deref(), Some(NOT_NEGATIVE));
        assert_eq!(normalize_label("NO NEGATIVA", &c).as_deref(), Some(NOT_NEGATIVE));
        assert_eq!(
            normalize_label("La noticia es negativa para el gobierno", &c).as_deref(),
            Some(NEGATIVE)
        );
        assert_eq!(normalize_label("Positiva", &c).as_deref(), Some(NOT_NEGATIVE));
        assert_eq!(normalize_label("???", &c).as_deref(), Some(NOT_NEGATIVE));
    }

    #[test]
    fn test_political_keyword_fallback() {
        let c = ClassificationTask::political("x").constraints;
        assert_eq!(
            normalize_label("Menciona la CAMPAÑA electoral", &c).as_deref(),
            Some(YES)
        );
        assert_eq!(normalize_label("Habla de teatro", &c).as_deref(), Some(NO));
    }

    #[test]
    fn test_topic_output_must_name_a_catalog_entry() {
        let catalog = vec![
            TopicOption {
                name: "Festival Tango BA 2025".into(),
                date: None,
            },
            TopicOption {
                name: "Mecenazgo".into(),
                date: None,
            },
        ];
        let c = ClassificationTask::topic("x", &catalog, &[], None, "Actividades programadas")
            .constraints;
        assert_eq!(
            normalize_label("festival tango ba 2025", &c).as_deref(),
            Some("Festival Tango BA 2025")
        );
        assert_eq!(
            normalize_label("El tema es: Mecenazgo.", &c).as_deref(),
            Some("Mecenazgo")
        );
        assert_eq!(
            normalize_label("Actividades programadas.", &c).as_deref(),
            Some("Actividades programadas")
        );
        assert_eq!(normalize_label("Presupuesto universitario", &c), None);
        assert_eq!(normalize_label("", &c), None);
    }

    #[test]
    fn test_open_answers() {
        let c = ClassificationTask::interviewee("x").constraints;
        assert_eq!(
            normalize_label("\"Gabriela Ricardes\"\n", &c).as_deref(),
            Some("Gabriela Ricardes")
        );
        assert_eq!(normalize_label("No identificado", &c).as_deref(), Some(NOT_IDENTIFIED));
        assert_eq!(normalize_label("ninguno.", &c).as_deref(), Some(NOT_IDENTIFIED));
        assert_eq!(normalize_label("   ", &c), None);
        assert_eq!(normalize_label(&"x".repeat(200), &c), None);
    }
}
