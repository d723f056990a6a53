//! Token counting with an exact/approximate flag

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::domain::llm::Usage;

/// Characters per token assumed for Anthropic models
const CHARS_PER_TOKEN: f64 = 4.0;

/// Words per token assumed when no vendor heuristic is known
const WORDS_PER_TOKEN: f64 = 0.75;

/// Token counts for one provider call
///
/// `exact` is false when the counts were estimated from text length because the
/// provider did not report usage. Cost alerts built on approximate counts should
/// treat them accordingly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCount {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub exact: bool,
}

impl TokenCount {
    pub fn exact(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            exact: true,
        }
    }

    pub fn approximate(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            exact: false,
        }
    }

    pub fn total(&self) -> u32 {
        self.prompt_tokens.saturating_add(self.completion_tokens)
    }

    pub fn is_approximate(&self) -> bool {
        !self.exact
    }

    /// Uses provider-reported usage when present, otherwise estimates from text
    pub fn resolve(usage: Option<&Usage>, provider: &str, prompt: &str, completion: &str) -> Self {
        match usage {
            Some(usage) => Self::exact(usage.prompt_tokens, usage.completion_tokens),
            None => Self::approximate(
                TokenCounter::approximate(provider, prompt),
                TokenCounter::approximate(provider, completion),
            ),
        }
    }
}

impl From<Usage> for TokenCount {
    fn from(usage: Usage) -> Self {
        Self::exact(usage.prompt_tokens, usage.completion_tokens)
    }
}

/// Length-based token estimation for providers without a tokenizer
pub struct TokenCounter;

impl TokenCounter {
    pub fn approximate(provider: &str, text: &str) -> u32 {
        if text.is_empty() {
            return 0;
        }

        if provider.eq_ignore_ascii_case("anthropic") {
            Self::by_characters(text)
        } else {
            Self::by_words(text)
        }
    }

    fn by_characters(text: &str) -> u32 {
        (text.chars().count() as f64 / CHARS_PER_TOKEN).ceil() as u32
    }

    fn by_words(text: &str) -> u32 {
        let words = text.unicode_words().count();
        (words as f64 / WORDS_PER_TOKEN).ceil() as u32
    }
}
