//! Street cleaning.
//!
//! Placeholder values collapse to an empty street; everything else loses
//! unit designators, trailing `#...` fragments, `, NH ...` suffixes, and
//! any character outside `[A-Za-z0-9.\s]`. Letter case is preserved since
//! the assembled address is uppercased anyway.

use regex::Regex;
use std::sync::LazyLock;

/// Unit markers, `#` fragments, and `, nh` suffixes, each through the end
/// of the string. `unit` only counts when a number or `#` follows it.
static TRAILING_NOISE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:apartment|apt)(?:[\s.#\d]|$).*|\bunit\s*[.#\d].*|#.*|,\s*nh\b.*")
        .expect("valid regex")
});

/// Anything that is not a letter, digit, `.`, or whitespace.
static DISALLOWED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9.\s]").expect("valid regex"));

/// Cleans a raw street value.
///
/// Returns an empty string for missing, blank, or placeholder values
/// (see [`is_placeholder`]). The result is a fixed point:
/// `clean_street(Some(&clean_street(s))) == clean_street(s)`.
#[must_use]
pub fn clean_street(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return String::new();
    };
    let street = raw.trim();

    if street.is_empty() || is_placeholder(street) {
        return String::new();
    }

    let street = TRAILING_NOISE_RE.replace_all(street, "");
    let street = DISALLOWED_RE.replace_all(&street, "");
    // Stripping punctuation can expose a unit marker ("a-pt 5" -> "apt 5").
    let street = TRAILING_NOISE_RE.replace_all(&street, "");
    let street = street.trim();

    if street.is_empty() || is_placeholder(street) {
        return String::new();
    }

    street.to_string()
}

/// Whether a street value is a stand-in for "no address".
///
/// Checked case-insensitively: anything containing `unk` or `n/a`, or
/// exactly `same` / `none`.
#[must_use]
pub fn is_placeholder(street: &str) -> bool {
    let lower = street.trim().to_lowercase();
    lower.contains("unk") || lower.contains("n/a") || lower == "same" || lower == "none"
}
