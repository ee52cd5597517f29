//! Tokio-backed bridge: one worker task, requests processed in order.
//!
//! Ordering matters: a `stop` queued behind a `start` must not overtake it
//! and kill the session that replaced it.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::orchestrator::{Input, Notifier};

use super::{TranscodeBridge, TranscodeTicket, Transcoder};

#[derive(Debug)]
enum BridgeRequest {
    Start {
        ticket: TranscodeTicket,
        source_path: String,
    },
    Stop,
}

pub struct TokioTranscodeBridge {
    tx: mpsc::UnboundedSender<BridgeRequest>,
    worker: JoinHandle<()>,
}

impl TokioTranscodeBridge {
    /// Spawn the worker on the current runtime. Results are delivered
    /// through `notifier`.
    pub fn spawn<T: Transcoder>(transcoder: T, notifier: Notifier) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(transcoder, rx, notifier));
        Self { tx, worker }
    }

    /// Whether the worker has exited.
    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    fn send(&self, request: BridgeRequest) {
        if self.tx.send(request).is_err() {
            tracing::warn!("Transcode worker is gone, request dropped");
        }
    }
}

impl TranscodeBridge for TokioTranscodeBridge {
    fn start(&mut self, ticket: TranscodeTicket, source_path: &str) {
        self.send(BridgeRequest::Start {
            ticket,
            source_path: source_path.to_string(),
        });
    }

    fn stop(&mut self) {
        self.send(BridgeRequest::Stop);
    }
}

// Dropping the bridge closes the queue; the worker drains what is left
// (including the final stop) and exits.
async fn run_worker<T: Transcoder>(
    transcoder: T,
    mut rx: mpsc::UnboundedReceiver<BridgeRequest>,
    notifier: Notifier,
) {
    while let Some(request) = rx.recv().await {
        match request {
            BridgeRequest::Start {
                ticket,
                source_path,
            } => {
                tracing::info!(%ticket, source = %source_path, "Starting transcode");
                let result = transcoder
                    .start(&source_path)
                    .await
                    .map_err(|e| e.to_string());
                if let Err(e) = &result {
                    tracing::error!(%ticket, "Failed to start transcode: {}", e);
                }
                notifier(Input::TranscodeFinished { ticket, result });
            }
            BridgeRequest::Stop => {
                if let Err(e) = transcoder.stop().await {
                    tracing::warn!("Failed to stop transcode: {}", e);
                }
            }
        }
    }
    tracing::debug!("Transcode worker finished");
}
