//! # Text Processing Module
//!
//! This module cleans the raw text returned by the OCR engine.
//!
//! ## Features
//!
//! - Whitespace collapsing: every run of whitespace becomes a single space
//! - Layout mode: line breaks kept, lines trimmed, blank lines dropped
//! - Literal character substitutions for common engine misreads (`|` read for `l`)
//!
//! Normalization is pure and idempotent: normalizing an already normalized
//! string returns it unchanged.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::errors::{AppError, AppResult};

// Lazy static regexes to avoid recompilation
lazy_static! {
    static ref WHITESPACE_RUN: Regex =
        Regex::new(r"\s+").expect("Whitespace pattern should be valid");
    static ref INLINE_WHITESPACE_RUN: Regex =
        Regex::new(r"[^\S\n]+").expect("Inline whitespace pattern should be valid");
}

/// A literal replacement applied after whitespace handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Substitution {
    pub pattern: String,
    pub replacement: String,
}

impl Substitution {
    pub fn new(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            replacement: replacement.into(),
        }
    }
}

/// Configuration options for text normalization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizerConfig {
    /// Collapse all whitespace, line breaks included, into single spaces
    pub collapse_whitespace: bool,
    /// Replacements applied in order
    pub substitutions: Vec<Substitution>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            collapse_whitespace: true,
            substitutions: vec![Substitution::new("|", "l")],
        }
    }
}

impl NormalizerConfig {
    /// Validate normalization parameters
    ///
    /// Each pattern must be a single non-whitespace character, and no
    /// replacement may contain whitespace or any pattern character. Once a
    /// pass has run, no pattern character is left in the text, so a second
    /// pass changes nothing.
    pub fn validate(&self) -> AppResult<()> {
        let pattern_chars: Vec<char> = self
            .substitutions
            .iter()
            .filter_map(|substitution| single_char(&substitution.pattern))
            .collect();

        for substitution in &self.substitutions {
            match single_char(&substitution.pattern) {
                Some(c) if !c.is_whitespace() => {}
                _ => {
                    return Err(AppError::Config(format!(
                        "substitution pattern '{}' must be a single non-whitespace character",
                        substitution.pattern
                    )));
                }
            }
            if substitution.replacement.is_empty() {
                return Err(AppError::Config(format!(
                    "substitution for '{}' cannot have an empty replacement",
                    substitution.pattern
                )));
            }
            if substitution.replacement.chars().any(char::is_whitespace) {
                return Err(AppError::Config(format!(
                    "substitution replacement '{}' cannot contain whitespace",
                    substitution.replacement
                )));
            }
            if let Some(clash) = substitution
                .replacement
                .chars()
                .find(|c| pattern_chars.contains(c))
            {
                return Err(AppError::Config(format!(
                    "substitution replacement '{}' contains pattern '{}'",
                    substitution.replacement, clash
                )));
            }
        }
        Ok(())
    }
}

fn single_char(s: &str) -> Option<char> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

/// Cleans raw OCR output.
///
/// # Examples
///
/// ```
/// use scantext::text_processing::TextNormalizer;
///
/// let normalizer = TextNormalizer::default();
/// assert_eq!(normalizer.normalize("He||o   wor|d\n"), "Hello world");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextNormalizer {
    config: NormalizerConfig,
}

impl TextNormalizer {
    /// Create a normalizer after validating `config`.
    pub fn new(config: NormalizerConfig) -> AppResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Normalize whitespace, then apply substitutions.
    pub fn normalize(&self, raw: &str) -> String {
        let spaced = if self.config.collapse_whitespace {
            WHITESPACE_RUN.replace_all(raw, " ").trim().to_string()
        } else {
            raw.lines()
                .map(|line| INLINE_WHITESPACE_RUN.replace_all(line, " ").trim().to_string())
                .filter(|line| !line.is_empty())
                .collect::<Vec<_>>()
                .join("\n")
        };

        let normalized = self
            .config
            .substitutions
            .iter()
            .fold(spaced, |text, substitution| {
                text.replace(&substitution.pattern, &substitution.replacement)
            });

        trace!(
            input_chars = raw.len(),
            output_chars = normalized.len(),
            "Normalized OCR text"
        );

        normalized
    }
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self {
            config: NormalizerConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_whitespace() {
        let normalizer = TextNormalizer::default();
        assert_eq!(normalizer.normalize("  a \t b\n\n c  "), "a b c");
        assert_eq!(normalizer.normalize(""), "");
        assert_eq!(normalizer.normalize(" \n\t "), "");
    }

    #[test]
    fn test_pipe_becomes_l() {
        let normalizer = TextNormalizer::default();
        assert_eq!(normalizer.normalize("|ine"), "line");
        assert!(!normalizer.normalize("a|b|c||").contains('|'));
    }

    #[test]
    fn test_layout_mode_keeps_lines() {
        let normalizer = TextNormalizer::new(NormalizerConfig {
            collapse_whitespace: false,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            normalizer.normalize("  Tota|   12.50 \n\n\nVAT\t 2.10\r\n"),
            "Total 12.50\nVAT 2.10"
        );
    }

    #[test]
    fn test_idempotent() {
        let normalizer = TextNormalizer::default();
        for input in ["INVOICE  2024\n", " |a|  b ", "x\u{a0}\u{2003}y"] {
            let once = normalizer.normalize(input);
            assert_eq!(normalizer.normalize(&once), once);
        }
    }

    #[test]
    fn test_rejects_unstable_substitutions() {
        let chained = NormalizerConfig {
            collapse_whitespace: true,
            substitutions: vec![Substitution::new("b", "c"), Substitution::new("a", "b")],
        };
        assert!(TextNormalizer::new(chained).is_err());

        let spaced = NormalizerConfig {
            collapse_whitespace: true,
            substitutions: vec![Substitution::new("_", "a b")],
        };
        assert!(spaced.validate().is_err());

        let empty = NormalizerConfig {
            collapse_whitespace: true,
            substitutions: vec![Substitution::new("", "x")],
        };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_rejects_multi_character_patterns() {
        // "aaaa" -> "aa" -> "a" would keep shrinking on every pass
        let shrinking = NormalizerConfig {
            collapse_whitespace: true,
            substitutions: vec![Substitution::new("aa", "a")],
        };
        assert!(matches!(shrinking.validate(), Err(AppError::Config(_))));

        let tab = NormalizerConfig {
            collapse_whitespace: false,
            substitutions: vec![Substitution::new("\t", "_")],
        };
        assert!(tab.validate().is_err());

        let accepted = NormalizerConfig {
            collapse_whitespace: true,
            substitutions: vec![Substitution::new("|", "l"), Substitution::new("O", "0")],
        };
        assert!(accepted.validate().is_ok());
    }
}
