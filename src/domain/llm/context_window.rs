//! Per-model context window limits

use crate::domain::usage::TokenCounter;
use crate::domain::DomainError;

/// Model name prefixes and their windows in tokens, longest prefix first
const WINDOWS: &[(&str, u32)] = &[
    ("gpt-3.5-turbo-16k", 16_385),
    ("gpt-4o-mini", 128_000),
    ("gpt-4-turbo", 128_000),
    ("gpt-3.5-turbo", 16_385),
    ("gpt-4-32k", 32_768),
    ("gpt-4o", 128_000),
    ("gpt-4", 8_192),
    ("claude-3", 200_000),
];

/// Tokens kept free when computing the largest allowed completion
pub const RESERVED_TOKENS: u32 = 100;

/// Window for `model`, or `None` when the model is not in the table.
/// Unknown models are left to the vendor to enforce.
pub fn window_for(model: &str) -> Option<u32> {
    let model = model.trim().to_ascii_lowercase();
    WINDOWS
        .iter()
        .find(|(prefix, _)| model.starts_with(prefix))
        .map(|(_, window)| *window)
}

/// Reject a request whose estimated prompt plus `max_tokens` exceeds the window
pub fn check_fits(
    provider: &str,
    model: &str,
    prompt: &str,
    max_tokens: u32,
) -> Result<(), DomainError> {
    let Some(window) = window_for(model) else {
        return Ok(());
    };

    let prompt_tokens = TokenCounter::approximate(provider, prompt);
    let total = prompt_tokens.saturating_add(max_tokens);

    if total > window {
        let room = max_completion_tokens(provider, model, prompt).unwrap_or(0);
        return Err(DomainError::validation(format!(
            "request needs about {} tokens ({} prompt + {} max_tokens), {} allows {}; \
             use max_tokens of at most {}",
            total, prompt_tokens, max_tokens, model, window, room
        )));
    }

    tracing::trace!(model, prompt_tokens, total, window, "Request fits context window");
    Ok(())
}

/// Largest completion that still fits after the prompt and a small reserve
pub fn max_completion_tokens(provider: &str, model: &str, prompt: &str) -> Option<u32> {
    let window = window_for(model)?;
    let prompt_tokens = TokenCounter::approximate(provider, prompt);
    Some(window.saturating_sub(prompt_tokens).saturating_sub(RESERVED_TOKENS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_longest_prefix_wins() {
        assert_eq!(window_for("gpt-4"), Some(8_192));
        assert_eq!(window_for("gpt-4-0613"), Some(8_192));
        assert_eq!(window_for("gpt-4o-mini-2024-07-18"), Some(128_000));
        assert_eq!(window_for("gpt-4-32k"), Some(32_768));
        assert_eq!(window_for("GPT-3.5-Turbo"), Some(16_385));
        assert_eq!(window_for("claude-3-haiku-20240307"), Some(200_000));
        assert_eq!(window_for("mock-model"), None);
    }

    #[test]
    fn test_oversized_request_rejected() {
        let prompt = "a ".repeat(5_000);

        let err = check_fits("openai", "gpt-4", &prompt, 4_000).unwrap_err();
        assert!(matches!(err, DomainError::Validation { .. }));
        assert!(err.to_string().contains("gpt-4 allows 8192"));

        assert!(check_fits("openai", "gpt-4o", &prompt, 4_000).is_ok());
        assert!(check_fits("openai", "unknown-model", &prompt, 4_000).is_ok());
    }

    #[test]
    fn test_max_completion_tokens() {
        // 3 words -> 4 tokens
        assert_eq!(
            max_completion_tokens("openai", "gpt-4", "What is AI"),
            Some(8_192 - 4 - RESERVED_TOKENS)
        );
        assert_eq!(max_completion_tokens("openai", "mystery", "hi"), None);

        let huge = "a ".repeat(7_000);
        assert_eq!(max_completion_tokens("openai", "gpt-4", &huge), Some(0));
    }
}
