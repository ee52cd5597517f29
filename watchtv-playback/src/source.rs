//! Source references
//!
//! A [`SourceReference`] is the opaque descriptor of something playable: a
//! remote URL, a `file://` path, or a URL handed out by the transcode server.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::view_state::LastViewed;

const FILE_SCHEME: &str = "file://";

static QUALITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\((\d+p)\)").expect("quality pattern is valid"));

/// Display metadata for the selected channel or title.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub name: String,
    pub category: Option<String>,
    pub logo: Option<String>,
    /// Quality label such as `1080p`, parsed from the name
    pub quality: Option<String>,
}

impl ChannelInfo {
    /// Build channel info from a display name, extracting a `(720p)` style
    /// quality label when the name carries one.
    pub fn from_name(name: impl Into<String>) -> Self {
        let name = name.into();
        let quality = extract_quality(&name);
        Self {
            name,
            category: None,
            logo: None,
            quality,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_logo(mut self, logo: impl Into<String>) -> Self {
        self.logo = Some(logo.into());
        self
    }
}

/// Extract the quality label from a channel name, e.g. `"News (1080p)"` -> `1080p`.
pub fn extract_quality(name: &str) -> Option<String> {
    QUALITY_RE
        .captures(name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Immutable descriptor of playable content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceReference {
    uri: String,
    is_live: bool,
    channel: Option<ChannelInfo>,
    view: Option<LastViewed>,
}

impl SourceReference {
    /// A live broadcast.
    pub fn live(uri: impl Into<String>) -> Self {
        Self::new(uri, true)
    }

    /// A seekable on-demand asset.
    pub fn on_demand(uri: impl Into<String>) -> Self {
        Self::new(uri, false)
    }

    pub fn new(uri: impl Into<String>, is_live: bool) -> Self {
        Self {
            uri: uri.into().trim().to_string(),
            is_live,
            channel: None,
            view: None,
        }
    }

    pub fn with_channel(mut self, channel: ChannelInfo) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Attach the catalog selection this source came from, so the player can
    /// persist it as the last viewed state.
    pub fn with_view_context(mut self, view: LastViewed) -> Self {
        self.view = Some(view);
        self
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn is_live(&self) -> bool {
        self.is_live
    }

    pub fn channel(&self) -> Option<&ChannelInfo> {
        self.channel.as_ref()
    }

    pub fn view_context(&self) -> Option<&LastViewed> {
        self.view.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.uri.is_empty()
    }

    pub fn is_local_file(&self) -> bool {
        self.uri.starts_with(FILE_SCHEME)
    }

    /// The input handed to the transcoder: the uri with any `file://` prefix
    /// stripped so ffmpeg receives a plain filesystem path.
    pub fn transcode_input(&self) -> &str {
        self.uri.strip_prefix(FILE_SCHEME).unwrap_or(&self.uri)
    }

    /// Same content, played from a different location. Used when the
    /// transcode server hands back a playable URL.
    pub(crate) fn redirected(&self, uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            is_live: self.is_live,
            channel: self.channel.clone(),
            view: None,
        }
    }
}
