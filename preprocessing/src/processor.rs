use crate::{config::NormalizerConfig, entities::decode_entities, models::TextFeatures, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

// Scheme, then the authority/path/query class. `$-_` is a range and covers
// digits, upper case, `/`, `:`, `?`, `=` and most other URL punctuation.
static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"https?://(?:[a-zA-Z0-9$-_@.&+!*(),\\]|%[0-9a-fA-F]{2})+")
        .expect("url pattern must compile")
});

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b")
        .expect("email pattern must compile")
});

// Word characters are letters, numbers and `_`. The regex crate's `\w` also
// admits combining marks and zero-width joiners, which would leave invisible
// tokens behind emoji sequences.
static MENTION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@[\p{L}\p{N}_]+").expect("mention pattern must compile"));

static HASHTAG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#[\p{L}\p{N}_]+").expect("hashtag pattern must compile"));

static SPECIAL_CHARS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"[^\p{L}\p{N}_\s.,!?'"-]"#).expect("special chars pattern must compile")
});

static WHITESPACE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern must compile"));

/// Normalize `text` with default settings and the given length cap.
pub fn normalize(text: &str, max_length: usize) -> String {
    TextNormalizer::new(max_length).normalize(text)
}

/// Deterministic text cleaning pipeline applied before scoring.
///
/// Holds only immutable configuration; the compiled patterns are shared
/// process-wide, so a normalizer can be cloned or shared across threads freely.
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    config: NormalizerConfig,
}

impl TextNormalizer {
    pub fn new(max_length: usize) -> Self {
        Self {
            config: NormalizerConfig::new(max_length),
        }
    }

    pub fn from_config(config: NormalizerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn with_lowercase(mut self, lowercase: bool) -> Self {
        self.config.lowercase = lowercase;
        self
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    pub fn max_length(&self) -> usize {
        self.config.max_length
    }

    /// Run the full pipeline. Stage order matters: later stages assume the
    /// earlier ones already removed entities, URLs and mentions.
    pub fn normalize(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }

        let decoded = decode_entities(text);
        let canonical = canonicalize_unicode(&decoded);
        let without_urls = URL_PATTERN.replace_all(&canonical, " ");
        let without_emails = EMAIL_PATTERN.replace_all(&without_urls, " ");
        let without_mentions = MENTION_PATTERN.replace_all(&without_emails, " ");
        let without_hashes = without_mentions.replace('#', " ");
        let cleaned = SPECIAL_CHARS_PATTERN.replace_all(&without_hashes, " ");
        let collapsed = WHITESPACE_PATTERN.replace_all(&cleaned, " ");

        let cased = if self.config.lowercase {
            collapsed.to_lowercase()
        } else {
            collapsed.into_owned()
        };

        truncate_on_word_boundary(&cased, self.config.max_length)
            .trim()
            .to_string()
    }

    pub fn normalize_batch<S: AsRef<str>>(&self, texts: &[S]) -> Vec<String> {
        texts.iter().map(|text| self.normalize(text.as_ref())).collect()
    }

    pub fn extract_features(&self, text: &str) -> TextFeatures {
        let processed = self.normalize(text);
        let words: Vec<&str> = processed.split_whitespace().collect();

        let avg_word_length = if words.is_empty() {
            0.0
        } else {
            let total_chars: usize = words.iter().map(|word| word.chars().count()).sum();
            total_chars as f64 / words.len() as f64
        };

        TextFeatures {
            original_length: text.chars().count(),
            processed_length: processed.chars().count(),
            word_count: words.len(),
            avg_word_length,
            has_urls: URL_PATTERN.is_match(text),
            has_mentions: MENTION_PATTERN.is_match(text),
            has_hashtags: HASHTAG_PATTERN.is_match(text),
        }
    }
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self {
            config: NormalizerConfig::default(),
        }
    }
}

/// NFKC, then drop control characters other than newline and tab.
fn canonicalize_unicode(text: &str) -> String {
    text.nfkc()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\t'))
        .collect()
}

/// Cut `text` to at most `max_length` characters without splitting a word,
/// unless the window holds no usable space, in which case it is hard-cut.
fn truncate_on_word_boundary(text: &str, max_length: usize) -> &str {
    let cut = match text.char_indices().nth(max_length) {
        Some((byte_idx, _)) => byte_idx,
        None => return text,
    };

    tracing::trace!(max_length, "truncating normalized text");
    let window = &text[..cut];
    match window.rfind(' ') {
        Some(space) if space > 0 => &window[..space],
        _ => window,
    }
}
