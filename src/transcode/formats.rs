//! Containers browsers cannot play natively.

use regex::Regex;
use std::sync::LazyLock;

static NEEDS_TRANSCODING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(mkv|avi|wmv|mov|flv|webm|m4v)(?:[?#/]|$)").expect("valid container regex")
});

/// Whether `url` names a container that has to be transcoded before a
/// browser engine can play it.
pub fn needs_transcoding(url: &str) -> bool {
    NEEDS_TRANSCODING_RE.is_match(url)
}
