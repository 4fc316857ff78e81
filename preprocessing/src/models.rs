use serde::{Deserialize, Serialize};

/// Basic statistics about a piece of text before and after normalization.
///
/// Lengths are counted in characters, not bytes. The `has_*` flags are probed
/// against the raw input, since normalization strips exactly those patterns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFeatures {
    pub original_length: usize,
    pub processed_length: usize,
    pub word_count: usize,
    pub avg_word_length: f64,
    pub has_urls: bool,
    pub has_mentions: bool,
    pub has_hashtags: bool,
}
