//! Stream classification
//!
//! Maps a source reference to a coarse format hypothesis that picks the
//! initial engine. Pure: no I/O, no state.
//!
//! Decision order, first match wins:
//! 1. container the sink cannot decode (mkv, avi, wmv, flv, mov)
//! 2. local `file://` reference
//! 3. adaptive manifest (`.m3u8`)
//! 4. transport stream: provider stream-id path or extension-less HTTP URL,
//!    then `.ts` segment suffix or `/live/` path
//! 5. everything else plays natively

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

use crate::source::SourceReference;

/// Containers the media sink cannot decode natively.
const UNSUPPORTED_CONTAINERS: &[&str] = &["mkv", "avi", "wmv", "flv", "mov"];

/// Extensions that mark a URL as something other than a provider stream.
const KNOWN_MEDIA_EXTENSIONS: &[&str] = &[
    "m3u8", "mp4", "webm", "ts", "mkv", "avi", "wmv", "flv", "mov",
];

/// Xtream-style provider path: `host:port/<digits>/<token>/<stream id>`.
static PROVIDER_PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r":\d+/\d+/[a-z0-9]+/\d+$").expect("provider path pattern is valid")
});

/// Which transport-stream rule matched. Selects the engine tuning profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportOrigin {
    /// `.ts` suffix or `/live/` path: a known live segment stream
    SegmentPath,
    /// Numeric stream-id path or extension-less HTTP URL: an IPTV provider
    /// default whose real format is uncertain
    ProviderPath,
}

/// Classifier output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "format")]
pub enum FormatHypothesis {
    NativePlayable,
    AdaptiveManifest,
    TransportStream { origin: TransportOrigin },
    UnsupportedContainer,
    Undetermined,
}

/// Classify a source reference.
pub fn classify(source: &SourceReference) -> FormatHypothesis {
    if source.is_empty() {
        return FormatHypothesis::Undetermined;
    }

    let uri = source.uri().to_ascii_lowercase();
    let path = strip_query(&uri);

    if UNSUPPORTED_CONTAINERS.iter().any(|ext| has_extension(path, ext)) {
        return FormatHypothesis::UnsupportedContainer;
    }

    if source.is_local_file() {
        return FormatHypothesis::NativePlayable;
    }

    if uri.contains(".m3u8") {
        return FormatHypothesis::AdaptiveManifest;
    }

    if is_provider_stream(&uri, path) {
        return FormatHypothesis::TransportStream {
            origin: TransportOrigin::ProviderPath,
        };
    }

    if has_extension(path, "ts") || path.contains("/live/") {
        return FormatHypothesis::TransportStream {
            origin: TransportOrigin::SegmentPath,
        };
    }

    FormatHypothesis::NativePlayable
}

fn is_provider_stream(uri: &str, path: &str) -> bool {
    if PROVIDER_PATH_RE.is_match(path) {
        return true;
    }
    uri.starts_with("http") && !KNOWN_MEDIA_EXTENSIONS.iter().any(|ext| has_extension(path, ext))
}

/// The uri without its query string or fragment.
fn strip_query(uri: &str) -> &str {
    match uri.find(['?', '#']) {
        Some(idx) => &uri[..idx],
        None => uri,
    }
}

fn has_extension(path: &str, ext: &str) -> bool {
    path.len() > ext.len()
        && path.ends_with(ext)
        && path.as_bytes()[path.len() - ext.len() - 1] == b'.'
}
