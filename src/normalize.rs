//! URL canonicalization for pattern matching.
//!
//! Navigation URLs are reduced to a scheme-less, `www.`-less form before they
//! are tested against rule patterns, so `https://www.example.com/` and
//! `example.com` compare equal.

/// Normalize a URL into the form rule patterns are written against.
///
/// Steps, applied once each and in this order:
/// 1. Strip a single trailing `/`
/// 2. Strip a leading `http://` or `https://` (case-sensitive)
/// 3. Strip a leading `www.`
///
/// Total over all strings; the empty string normalizes to itself.
pub fn normalize(url: &str) -> String {
    let url = url.strip_suffix('/').unwrap_or(url);
    let url = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))
        .unwrap_or(url);
    let url = url.strip_prefix("www.").unwrap_or(url);
    url.to_string()
}

/// Normalize an optional URL; an absent URL becomes the empty string.
pub fn normalize_opt(url: Option<&str>) -> String {
    url.map(normalize).unwrap_or_default()
}
