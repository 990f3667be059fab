//! Title normalization used to key tracks for clique detection.
//!
//! Two keys are derived from a raw `track_title`:
//! - the grouping key, `hard_clean_text(strip_trailing_parenthetical(title))`
//! - the disentanglement key, `hard_clean_text(title)`
//!
//! CRITICAL: both keys decide which tracks may ever be compared. Changing them
//! changes every clique id downstream. Run tests after changes.

use any_ascii::any_ascii_char;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// Single leading article, only when followed by whitespace ("a" alone stays).
pub static LEADING_ARTICLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:the|a|an)\s").unwrap());

/// Ampersand between words: "rock & roll" -> "rock and roll"
pub static SPACED_AMPERSAND: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s&\s").unwrap());

/// Anything that is not a letter, a number, an underscore or whitespace.
pub static PUNCTUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\p{L}\p{N}_\s]").unwrap());

/// Regex to collapse multiple whitespace into single space
pub static MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").unwrap());

/// Trailing parenthetical (and everything after the first " (" that reaches
/// the end): "Song (Live)" -> "Song", "Song (Part 1) (Edit)" -> "Song"
pub static TRAILING_PARENTHETICAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s\(.*?\)$").unwrap());

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Latin letters eligible for diacritic folding: Basic Latin letters,
/// Latin-1 Supplement letters (minus × and ÷), Latin Extended-A and -B.
pub fn is_latin_character(c: char) -> bool {
    matches!(c as u32,
        0x0041..=0x005A
        | 0x0061..=0x007A
        | 0x00C0..=0x00D6
        | 0x00D8..=0x00F6
        | 0x00F8..=0x00FF
        | 0x0100..=0x017F
        | 0x0180..=0x024F)
}

/// Remove diacritics from Latin letters and leave every other character alone.
/// e.g., "beyoncé" -> "beyonce", "straße" -> "strasse", "кино" -> "кино"
pub fn remove_latin_diacritics(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.nfc() {
        if c.is_ascii() || !(c.is_alphabetic() && is_latin_character(c)) {
            out.push(c);
        } else {
            out.push_str(any_ascii_char(c));
        }
    }
    out
}

// ============================================================================
// NORMALIZATION FUNCTIONS
// ============================================================================

/// Strip a trailing parenthetical, e.g. "Praise You (Radio Edit)" -> "Praise You".
pub fn strip_trailing_parenthetical(title: &str) -> String {
    TRAILING_PARENTHETICAL.replace(title, "").into_owned()
}

/// Hard-clean a title for comparison.
///
/// Lowercase, strip one leading article, "&" -> "and", drop punctuation,
/// collapse whitespace, fold Latin diacritics. Works on code points and
/// never consults the locale.
pub fn hard_clean_text(text: &str) -> String {
    let lowered: String = text.nfc().collect::<String>().to_lowercase();

    let mut result = LEADING_ARTICLE.replace(&lowered, "").into_owned();
    result = SPACED_AMPERSAND.replace_all(&result, " and ").into_owned();
    result = PUNCTUATION.replace_all(&result, "").into_owned();
    result = MULTI_SPACE.replace_all(&result, " ").into_owned();

    remove_latin_diacritics(result.trim())
}

/// Grouping key for a raw track title.
pub fn title_key(title: &str) -> String {
    hard_clean_text(&strip_trailing_parenthetical(title))
}

/// Second, independent key used to split falsely merged versions.
/// Keeps trailing parentheticals, so "Song (Part 1)" and "Song (Part 2)" differ.
pub fn disentangle_key(title: &str) -> String {
    hard_clean_text(title)
}

// ============================================================================
// TESTS
// ============================================================================
