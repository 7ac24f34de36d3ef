//! Sentiment valuation: a model decides negative vs. not, keyword rules
//! refine the rest.

use crate::dispatcher::FallbackDispatcher;
use crate::models::Valuation;
use crate::tasks::{ClassificationTask, NEGATIVE};
use crate::utils::contains_normalized;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseSentiment {
    Negative,
    NotNegative,
}

pub async fn base_sentiment(dispatcher: &FallbackDispatcher, text: &str) -> BaseSentiment {
    let dispatch = dispatcher.dispatch(&ClassificationTask::valuation(text)).await;
    if dispatch.label == NEGATIVE {
        BaseSentiment::Negative
    } else {
        BaseSentiment::NotNegative
    }
}

/// Final valuation from the base sentiment and the actor keywords.
///
/// Negative is never overridden. A not-negative article is positive only
/// when it names one of the actors.
pub fn valuate<S: AsRef<str>>(base: BaseSentiment, text: &str, actor_keywords: &[S]) -> Valuation {
    match base {
        BaseSentiment::Negative => Valuation::Negative,
        BaseSentiment::NotNegative => {
            if actor_keywords
                .iter()
                .any(|k| contains_normalized(text, k.as_ref()))
            {
                Valuation::Positive
            } else {
                Valuation::Neutral
            }
        }
    }
}
