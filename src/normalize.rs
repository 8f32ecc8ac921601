// 🔤 Text Normalizer
// Every comparison in the engine goes through here: trim, case-fold, strip diacritics

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Maximum length (in characters) of a group label
pub const GROUP_LABEL_MAX_CHARS: usize = 60;

/// Normalize a text value for matching
///
/// "  Altíssimo " → "altissimo"
/// "Operação"     → "operacao"
pub fn normalize_text(value: &str) -> String {
    value
        .trim()
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect()
}

/// Normalize a possibly-absent value (absent → empty string)
pub fn normalize_opt(value: Option<&str>) -> String {
    value.map(normalize_text).unwrap_or_default()
}

/// Trim and cap a group label at `GROUP_LABEL_MAX_CHARS` characters
pub fn clean_group_label(value: &str) -> String {
    value
        .trim()
        .chars()
        .take(GROUP_LABEL_MAX_CHARS)
        .collect::<String>()
        .trim_end()
        .to_string()
}

// ============================================================================
// TESTS
// ============================================================================
