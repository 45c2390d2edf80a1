//! Partial masking of an answer for the hint view.
//!
//! The segmentation is deterministic; which segments get masked is random. Text with word
//! boundaries is masked word by word, text without them (or very long tokens) in groups
//! of two characters.

use rand::Rng;

pub const WORD_PLACEHOLDER: &str = "_____";
pub const SEGMENT_PLACEHOLDER: &str = "____";

const SEGMENT_SIZE: usize = 2;
const SHORT_WORD_LEN: usize = 3;
const LONG_WORD_LEN: usize = 8;
const SHORT_TEXT_LEN: usize = 20;

fn is_ideograph(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}

fn contains_cjk(text: &str) -> bool {
    text.chars()
        .any(|c| is_ideograph(c) || ('\u{3000}'..='\u{303f}').contains(&c))
}

fn is_punctuation_only(segment: &str) -> bool {
    !segment
        .chars()
        .any(|c| c.is_alphanumeric() || c == '_' || is_ideograph(c))
}

fn mask_segments<R: Rng + ?Sized>(text: &str, difficulty: f64, rng: &mut R) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut masked = String::with_capacity(text.len());
    for chunk in chars.chunks(SEGMENT_SIZE) {
        let segment: String = chunk.iter().collect();
        if chunk.len() <= 1 || is_punctuation_only(&segment) || !rng.gen_bool(difficulty) {
            masked.push_str(&segment);
        } else {
            masked.push_str(SEGMENT_PLACEHOLDER);
        }
    }
    masked
}

fn mask_word<R: Rng + ?Sized>(word: &str, difficulty: f64, rng: &mut R) -> String {
    let len = word.chars().count();
    if len <= SHORT_WORD_LEN || is_punctuation_only(word) {
        return word.to_string();
    }
    // A long "word" is usually a whole sentence in a script without spaces.
    if len > LONG_WORD_LEN {
        return mask_segments(word, difficulty, rng);
    }
    if rng.gen_bool(difficulty) {
        WORD_PLACEHOLDER.to_string()
    } else {
        word.to_string()
    }
}

/// Masks each eligible segment of `text` with probability `difficulty` (clamped to 0..=1).
///
/// Every call draws new positions; callers wanting a stable hint must keep the first result.
pub fn mask<R: Rng + ?Sized>(text: &str, difficulty: f64, rng: &mut R) -> String {
    let difficulty = if difficulty.is_nan() {
        0.0
    } else {
        difficulty.clamp(0.0, 1.0)
    };
    let trimmed = text.trim();
    if difficulty <= 0.0 || trimmed.is_empty() {
        return text.to_string();
    }

    let has_spaces = trimmed.chars().any(char::is_whitespace);
    let len = trimmed.chars().count();
    if !has_spaces || (len <= SHORT_TEXT_LEN && (contains_cjk(trimmed) || len > LONG_WORD_LEN)) {
        return mask_segments(trimmed, difficulty, rng);
    }

    trimmed
        .split_whitespace()
        .map(|word| mask_word(word, difficulty, rng))
        .collect::<Vec<_>>()
        .join(" ")
}
