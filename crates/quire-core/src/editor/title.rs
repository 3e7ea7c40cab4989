//! Note title helpers

use std::collections::HashSet;

/// Title given to notes the user has not named yet
pub const DEFAULT_TITLE: &str = "New Note";

/// Titles that count as "not named yet"
pub const PLACEHOLDER_TITLES: [&str; 3] = ["", "Untitled", DEFAULT_TITLE];

/// Whether `title` still needs a real, collision-free name
pub fn is_placeholder(title: &str) -> bool {
    let title = title.trim();
    PLACEHOLDER_TITLES
        .iter()
        .any(|placeholder| title.eq_ignore_ascii_case(placeholder))
}

/// Pick a title for `base` that no sibling in `existing` already uses.
///
/// The default title is shortened to `Note` and every result carries a
/// numeric suffix starting at 1. Comparison ignores case.
pub fn unique_title<'a>(base: &str, existing: impl IntoIterator<Item = &'a str>) -> String {
    let base = base.trim();
    let base = if base.is_empty() || base.eq_ignore_ascii_case(DEFAULT_TITLE) {
        "Note"
    } else {
        base
    };

    let taken: HashSet<String> = existing
        .into_iter()
        .map(|title| title.trim().to_lowercase())
        .collect();

    (1_u32..)
        .map(|suffix| format!("{base}{suffix}"))
        .find(|candidate| !taken.contains(&candidate.to_lowercase()))
        .unwrap_or_else(|| base.to_string())
}

/// Title derived from the first non-blank line of `plain_text`.
pub fn derive_title(plain_text: &str, max_chars: usize) -> String {
    plain_text
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.chars().take(max_chars).collect::<String>())
        .map(|title| title.trim_end().to_string())
        .unwrap_or_default()
}
