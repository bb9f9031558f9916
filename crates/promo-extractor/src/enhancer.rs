//! Taste label enhancement.
//!
//! A short label like "ps5" embeds poorly against promotion text. The
//! enhancer asks the model for related keywords and indexes those instead,
//! keeping the original label alongside for display.

use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::completion::{CompletionProvider, CompletionRequest};
use crate::json::{extract_json, strip_code_fences};
use crate::prompt::{label_messages, LABEL_MAX_TOKENS, LABEL_TEMPERATURE};

const MAX_KEYWORDS: usize = 32;
const MAX_KEYWORD_LENGTH: usize = 60;

/// Prompt fragments that show up when a model echoes instructions back.
const ECHO_PATTERNS: &[&str] = &[
    "return json",
    "type taste",
    "given the user",
    "rule:",
    "rules:",
    "example output",
    "keywords",
];

/// Original label plus the text that gets embedded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMetadata {
    pub original_label: String,
    pub search_label: String,
}

impl LabelMetadata {
    /// Metadata that indexes the label as-is.
    pub fn passthrough(label: &str) -> Self {
        let label = label.trim().to_string();
        Self {
            original_label: label.clone(),
            search_label: label,
        }
    }
}

pub struct TasteLabelEnhancer {
    provider: Arc<dyn CompletionProvider>,
    model: String,
}

impl TasteLabelEnhancer {
    pub fn new(provider: Arc<dyn CompletionProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// Expand `label` into a `" | "`-joined keyword list.
    ///
    /// Never fails: on a provider error the label itself is indexed.
    pub async fn enhance(&self, label: &str) -> LabelMetadata {
        let cleaned = label.trim();
        if cleaned.is_empty() {
            return LabelMetadata::passthrough(cleaned);
        }

        let request = CompletionRequest {
            model: self.model.clone(),
            temperature: LABEL_TEMPERATURE,
            max_tokens: Some(LABEL_MAX_TOKENS),
            messages: label_messages(cleaned),
        };

        match self.provider.complete(request).await {
            Ok(raw) => {
                let keywords = extract_keywords(&raw);
                debug!(label = cleaned, keywords = keywords.len(), "Enhanced taste label");
                LabelMetadata {
                    original_label: cleaned.to_string(),
                    search_label: join_keywords(cleaned, keywords),
                }
            }
            Err(e) => {
                warn!(error = %e, label = cleaned, "Label enhancement failed, using original label");
                LabelMetadata::passthrough(cleaned)
            }
        }
    }
}

/// Keywords from a `{"keywords": [...]}` answer, or from loose text.
pub fn extract_keywords(raw: &str) -> Vec<String> {
    match extract_json(raw) {
        Some(Value::Object(obj)) => obj
            .get("keywords")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|k| k.trim().to_lowercase())
                    .filter(|k| !k.is_empty() && k.chars().count() <= MAX_KEYWORD_LENGTH)
                    .collect()
            })
            .unwrap_or_default(),
        _ => {
            debug!("Taste label answer is not JSON, splitting text");
            fallback_split(strip_code_fences(raw))
        }
    }
}

fn fallback_split(raw: &str) -> Vec<String> {
    raw.split(['|', ',', '\n'])
        .map(sanitize_token)
        .filter(|t| !t.is_empty() && t.chars().count() <= MAX_KEYWORD_LENGTH)
        .filter(|t| ECHO_PATTERNS.iter().all(|p| !t.contains(p)))
        .collect()
}

fn sanitize_token(value: &str) -> String {
    let token: String = value
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, '{' | '}' | '(' | ')' | '[' | ']'))
        .collect();
    let token = token.trim_matches(|c| matches!(c, '\'' | '"' | '`'));
    token.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn join_keywords(label: &str, keywords: Vec<String>) -> String {
    let values = if keywords.is_empty() {
        vec![label.to_lowercase()]
    } else {
        keywords
    };

    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|k| seen.insert(k.clone()))
        .take(MAX_KEYWORDS)
        .collect::<Vec<_>>()
        .join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockCompletion;

    #[tokio::test]
    async fn test_enhance_with_json_keywords() {
        let mock = Arc::new(MockCompletion::always(
            r#"{"keywords":["Games","ps5","games"," Xbox "]}"#,
        ));
        let enhancer = TasteLabelEnhancer::new(mock.clone(), "gpt-4o-mini");

        let meta = enhancer.enhance("  Games ").await;
        assert_eq!(meta.original_label, "Games");
        assert_eq!(meta.search_label, "games | ps5 | xbox");

        let request = &mock.requests()[0];
        assert_eq!(request.temperature, LABEL_TEMPERATURE);
        assert_eq!(request.max_tokens, Some(LABEL_MAX_TOKENS));
    }

    #[tokio::test]
    async fn test_enhance_falls_back_on_error() {
        let mock = Arc::new(MockCompletion::new());
        mock.push_error("timeout");
        let enhancer = TasteLabelEnhancer::new(mock, "m");

        let meta = enhancer.enhance("Board Games").await;
        assert_eq!(meta, LabelMetadata::passthrough("Board Games"));
    }

    #[tokio::test]
    async fn test_empty_keywords_use_lowercased_label() {
        let mock = Arc::new(MockCompletion::always(r#"{"keywords":[]}"#));
        let enhancer = TasteLabelEnhancer::new(mock, "m");

        let meta = enhancer.enhance("Board Games").await;
        assert_eq!(meta.search_label, "board games");
    }

    #[test]
    fn test_fallback_split_drops_prompt_echo() {
        let raw = "Here are keywords:\n\"games\", (consoles) | [ps5]\nRules: lowercase\nvideo   games";
        assert_eq!(
            extract_keywords(raw),
            vec!["games", "consoles", "ps5", "video games"]
        );
    }

    #[test]
    fn test_fallback_split_length_limit() {
        let long = "x".repeat(61);
        let raw = format!("short, {}", long);
        assert_eq!(extract_keywords(&raw), vec!["short"]);
    }

    #[test]
    fn test_keyword_cap() {
        let keywords: Vec<String> = (0..40).map(|i| format!("k{}", i)).collect();
        let joined = join_keywords("label", keywords);
        assert_eq!(joined.split(" | ").count(), MAX_KEYWORDS);
    }
}
