//! Auto-hiding playback controls.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::ControlsConfig;

/// Shows the controls on pointer activity and hides them after a quiet
/// period. At most one hide timer is pending at a time.
pub struct ControlsAutoHide {
    hide_after: Duration,
    visible: Arc<watch::Sender<bool>>,
    timer: Option<JoinHandle<()>>,
}

impl ControlsAutoHide {
    pub fn new(hide_after: Duration) -> Self {
        let (visible, _) = watch::channel(true);
        Self {
            hide_after,
            visible: Arc::new(visible),
            timer: None,
        }
    }

    pub fn from_config(config: &ControlsConfig) -> Self {
        Self::new(config.hide_after())
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.visible.subscribe()
    }

    pub fn is_visible(&self) -> bool {
        *self.visible.borrow()
    }

    /// Show the controls and restart the hide timer. Must be called within
    /// a tokio runtime.
    pub fn pointer_moved(&mut self) {
        self.cancel();
        self.visible.send_replace(true);

        let visible = Arc::clone(&self.visible);
        let hide_after = self.hide_after;
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(hide_after).await;
            visible.send_replace(false);
        }));
    }

    /// Hide immediately.
    pub fn pointer_left(&mut self) {
        self.cancel();
        self.visible.send_replace(false);
    }

    fn cancel(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl Drop for ControlsAutoHide {
    fn drop(&mut self) {
        self.cancel();
    }
}
