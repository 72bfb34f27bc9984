//! Small utility helpers shared across the crate.

use std::env;

/// Return the first non-empty environment variable from `keys`, or `None`.
pub fn env_first(keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Ok(value) = env::var(key) {
            if !value.trim().is_empty() {
                return Some(value);
            }
        }
    }
    None
}

/// Interpret an on/off environment toggle. Unset means `default`.
pub fn env_flag(key: &str, default: bool) -> bool {
    match env_first(&[key]) {
        Some(value) => {
            let value = value.trim().to_ascii_lowercase();
            !(value == "0" || value == "false" || value == "no" || value == "off")
        }
        None => default,
    }
}

/// Normalise a URL by prepending `http://` or `https://` when the scheme is missing.
pub fn normalize_url(raw: &str) -> String {
    let raw = raw.trim().trim_end_matches('/');
    if raw.contains("://") {
        return raw.to_string();
    }
    let scheme = if raw.starts_with("localhost") || raw.starts_with("127.") || raw.contains(":80") {
        "http"
    } else {
        "https"
    };
    format!("{scheme}://{raw}")
}

/// Mask a secret for display: first 8 and last 4 characters, `***` when short.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 12 {
        return "***".to_string();
    }
    let head: String = chars[..8].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

/// Truncate to at most `max` characters without splitting a code point.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_url_adds_scheme_and_trims_slash() {
        assert_eq!(normalize_url("altary.web-ts.dev/"), "https://altary.web-ts.dev");
        assert_eq!(normalize_url("localhost:8080"), "http://localhost:8080");
        assert_eq!(normalize_url("http://127.0.0.1:9/"), "http://127.0.0.1:9");
    }

    #[test]
    fn mask_token_hides_the_middle() {
        assert_eq!(mask_token("abcdefgh12345678wxyz"), "abcdefgh...wxyz");
        assert_eq!(mask_token("short"), "***");
        assert_eq!(mask_token("exactly12chr"), "***");
    }

    #[test]
    fn truncate_chars_respects_code_points() {
        assert_eq!(truncate_chars("エラーが発生", 3), "エラー");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn unset_flags_use_the_default() {
        assert!(env_flag("ALTARY_UNSET_FLAG_FOR_TESTS", true));
        assert!(!env_flag("ALTARY_UNSET_FLAG_FOR_TESTS", false));
        assert_eq!(env_first(&["ALTARY_UNSET_FLAG_FOR_TESTS"]), None);
    }
}
