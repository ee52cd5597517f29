//! JSON RPC client for the transcode server.

use std::time::Duration;

use crate::error::{PlaybackError, Result};

use super::{ErrorBody, TranscodeRequest, TranscodeResponse, Transcoder};

/// Transcode startup waits for ffmpeg to write its first playlist.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct HttpTranscoder {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTranscoder {
    /// `base_url` is the server root, e.g. `http://127.0.0.1:3000`.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("watchtv-playback/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn start_url(&self) -> String {
        format!("{}/api/transcode", self.base_url)
    }

    pub fn stop_url(&self) -> String {
        format!("{}/api/transcode/stop", self.base_url)
    }
}

/// Turn a non-success response into an error carrying the server's message.
async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => format!("HTTP error: {}", status),
    };
    Err(PlaybackError::Transcode(message))
}

impl Transcoder for HttpTranscoder {
    async fn start(&self, source_path: &str) -> Result<String> {
        let request = TranscodeRequest {
            source_path: source_path.to_string(),
        };
        let response = self
            .client
            .post(self.start_url())
            .json(&request)
            .send()
            .await?;
        let body: TranscodeResponse = check(response).await?.json().await?;
        tracing::debug!(session = %body.session_id, url = %body.url, "Transcode session ready");
        Ok(body.url)
    }

    async fn stop(&self) -> Result<()> {
        let response = self.client.post(self.stop_url()).send().await?;
        check(response).await?;
        Ok(())
    }
}
