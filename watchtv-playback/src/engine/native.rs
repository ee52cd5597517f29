//! Native pass-through: the sink decodes the URL itself.

use crate::config::RetryConfig;
use crate::error::{ErrorKind, ErrorRecord};
use crate::sink::{MediaErrorCode, MediaSink};

use super::{sink_failure, EngineOutcome};

#[derive(Debug)]
pub struct NativeEngine {
    url: String,
    network_budget: u32,
    network_retries_left: u32,
}

impl NativeEngine {
    pub fn new(url: &str, retry: &RetryConfig) -> Self {
        Self {
            url: url.to_string(),
            network_budget: retry.network_retry_budget,
            network_retries_left: retry.network_retry_budget,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn attach(&mut self, sink: &mut dyn MediaSink) {
        tracing::info!(url = %self.url, "Attaching native pass-through");
        sink.set_source(&self.url);
        sink.load();
    }

    pub fn detach(self, sink: &mut dyn MediaSink) {
        tracing::debug!(url = %self.url, "Detaching native pass-through");
        sink.clear_source();
    }

    pub fn on_sink_error(&mut self, code: MediaErrorCode, sink: &mut dyn MediaSink) -> EngineOutcome {
        match code {
            MediaErrorCode::Network if self.network_retries_left > 0 => {
                self.network_retries_left -= 1;
                tracing::warn!(
                    url = %self.url,
                    retries_left = self.network_retries_left,
                    "Network error, reloading source"
                );
                sink.set_source(&self.url);
                sink.load();
                EngineOutcome::Absorbed
            }
            MediaErrorCode::Network => EngineOutcome::Escalate(ErrorRecord::new(
                ErrorKind::NetworkTransient,
                MediaErrorCode::Network.message(),
            )),
            other => EngineOutcome::Escalate(sink_failure(other)),
        }
    }

    pub fn note_progress(&mut self) {
        self.network_retries_left = self.network_budget;
    }
}
