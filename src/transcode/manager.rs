//! ffmpeg session management
//!
//! At most one session runs at a time. Starting a session stops the previous
//! one; each session writes into its own directory below the output root,
//! which is removed again when the session stops.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::TranscodeConfig;
use crate::error::TranscodeError;

/// Playlist written by ffmpeg in each session directory
pub const PLAYLIST_NAME: &str = "stream.m3u8";

const SEGMENT_PATTERN: &str = "segment%03d.ts";

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Public view of the running session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    pub id: String,
    pub source: String,
    pub url: String,
    pub started_at: DateTime<Utc>,
}

struct Session {
    status: SessionStatus,
    output_dir: PathBuf,
    child: Child,
}

impl Session {
    async fn shutdown(mut self) {
        tracing::info!(session = %self.status.id, "Stopping transcode");
        if let Err(e) = self.child.kill().await {
            tracing::debug!(session = %self.status.id, "ffmpeg already gone: {}", e);
        }
        remove_output(&self.output_dir).await;
    }
}

async fn remove_output(dir: &Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove {}: {}", dir.display(), e),
    }
}

pub struct TranscodeManager {
    config: TranscodeConfig,
    base_url: String,
    active: Mutex<Option<Session>>,
}

impl TranscodeManager {
    /// `base_url` is the address players reach this server on.
    pub fn new(config: TranscodeConfig, base_url: impl Into<String>) -> Self {
        Self {
            config,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            active: Mutex::new(None),
        }
    }

    pub fn output_root(&self) -> &Path {
        &self.config.output_root
    }

    /// Start transcoding `source`, replacing any running session. Resolves
    /// once ffmpeg has written its playlist.
    pub async fn start(&self, source: &str) -> Result<SessionStatus, TranscodeError> {
        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            previous.shutdown().await;
        }

        let id = Uuid::new_v4().to_string();
        let output_dir = self.config.output_root.join(&id);
        tokio::fs::create_dir_all(&output_dir).await?;

        tracing::info!(session = %id, source, "Starting ffmpeg");
        let mut child = match self.command(source, &output_dir).spawn() {
            Ok(child) => child,
            Err(e) => {
                remove_output(&output_dir).await;
                return Err(TranscodeError::Spawn(e));
            }
        };

        let playlist = output_dir.join(PLAYLIST_NAME);
        if let Err(e) = wait_for_playlist(&mut child, &playlist, self.config.ready_timeout()).await {
            tracing::error!(session = %id, "Transcode failed to start: {}", e);
            let _ = child.kill().await;
            remove_output(&output_dir).await;
            return Err(e);
        }

        let status = SessionStatus {
            url: format!("{}/transcode/{}/{}", self.base_url, id, PLAYLIST_NAME),
            id,
            source: source.to_string(),
            started_at: Utc::now(),
        };
        tracing::info!(session = %status.id, url = %status.url, "Transcode ready");

        *active = Some(Session {
            status: status.clone(),
            output_dir,
            child,
        });
        Ok(status)
    }

    /// Stop the running session. Returns whether there was one.
    pub async fn stop(&self) -> bool {
        let session = self.active.lock().await.take();
        match session {
            Some(session) => {
                session.shutdown().await;
                true
            }
            None => false,
        }
    }

    pub async fn status(&self) -> Option<SessionStatus> {
        self.active.lock().await.as_ref().map(|s| s.status.clone())
    }

    fn command(&self, source: &str, output_dir: &Path) -> Command {
        let mut command = Command::new(&self.config.ffmpeg_path);
        command
            .args(ffmpeg_args(&self.config, source, output_dir))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        command
    }
}

/// Arguments for an HLS re-encode of `source` into `output_dir`.
pub fn ffmpeg_args(config: &TranscodeConfig, source: &str, output_dir: &Path) -> Vec<OsString> {
    let segment_secs = config.segment_secs.to_string();
    let mut args: Vec<OsString> = [
        "-i",
        source,
        "-c:v",
        "libx264",
        "-preset",
        config.preset.as_str(),
        "-tune",
        "zerolatency",
        "-c:a",
        "aac",
        "-b:a",
        config.audio_bitrate.as_str(),
        "-f",
        "hls",
        "-hls_time",
        segment_secs.as_str(),
        "-hls_list_size",
        "0",
        "-hls_segment_filename",
    ]
    .into_iter()
    .map(OsString::from)
    .collect();

    args.push(output_dir.join(SEGMENT_PATTERN).into_os_string());
    args.push("-y".into());
    args.push(output_dir.join(PLAYLIST_NAME).into_os_string());
    args
}

async fn wait_for_playlist(child: &mut Child, playlist: &Path, timeout: Duration) -> Result<(), TranscodeError> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if tokio::fs::try_exists(playlist).await? {
            return Ok(());
        }
        if let Some(status) = child.try_wait()? {
            return Err(TranscodeError::ExitedEarly(status.to_string()));
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(TranscodeError::Timeout(timeout));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(root: &Path, ffmpeg: &Path) -> TranscodeConfig {
        TranscodeConfig {
            ffmpeg_path: ffmpeg.to_string_lossy().to_string(),
            output_root: root.join("out"),
            ready_timeout_secs: 1,
            ..Default::default()
        }
    }

    #[cfg(unix)]
    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn test_ffmpeg_args() {
        let config = TranscodeConfig::default();
        let args = ffmpeg_args(&config, "/movies/x.mkv", Path::new("/tmp/s1"));
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().to_string()).collect();

        assert_eq!(&args[..2], &["-i", "/movies/x.mkv"]);
        assert!(args.windows(2).any(|w| w == ["-preset", "ultrafast"]));
        assert!(args.windows(2).any(|w| w == ["-b:a", "128k"]));
        assert!(args.windows(2).any(|w| w == ["-hls_time", "4"]));
        assert!(args.windows(2).any(|w| w == ["-hls_list_size", "0"]));
        assert_eq!(args[args.len() - 3], "/tmp/s1/segment%03d.ts");
        assert_eq!(args[args.len() - 1], "/tmp/s1/stream.m3u8");
    }

    #[tokio::test]
    async fn test_stop_without_session() {
        let manager = TranscodeManager::new(TranscodeConfig::default(), "http://127.0.0.1:3000");
        assert!(!manager.stop().await);
        assert!(!manager.stop().await);
        assert!(manager.status().await.is_none());
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let dir = TempDir::new().unwrap();
        let manager = TranscodeManager::new(
            config(dir.path(), &dir.path().join("no-such-ffmpeg")),
            "http://127.0.0.1:3000",
        );

        let err = manager.start("/movies/x.mkv").await.unwrap_err();
        assert!(matches!(err, TranscodeError::Spawn(_)));
        assert!(manager.status().await.is_none());
        // The session directory is cleaned up again.
        let leftovers = std::fs::read_dir(dir.path().join("out")).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    // All process-spawning cases share one test so that no other test forks
    // while a script is still open for writing.
    #[cfg(unix)]
    #[tokio::test]
    async fn test_session_lifecycle() {
        let dir = TempDir::new().unwrap();
        let working = script(
            dir.path(),
            "ffmpeg-ok",
            "for last; do :; done\necho '#EXTM3U' > \"$last\"\nexec sleep 30",
        );
        let crashing = script(dir.path(), "ffmpeg-crash", "exit 3");
        let silent = script(dir.path(), "ffmpeg-silent", "exec sleep 30");

        // Success, replacement and stop.
        let manager = TranscodeManager::new(config(dir.path(), &working), "http://127.0.0.1:3000/");
        let first = manager.start("/movies/a.mkv").await.unwrap();
        assert_eq!(
            first.url,
            format!("http://127.0.0.1:3000/transcode/{}/stream.m3u8", first.id)
        );
        let first_dir = dir.path().join("out").join(&first.id);
        assert!(first_dir.join(PLAYLIST_NAME).exists());

        let second = manager.start("/movies/b.avi").await.unwrap();
        assert_ne!(first.id, second.id);
        assert!(!first_dir.exists());
        assert_eq!(manager.status().await.unwrap().source, "/movies/b.avi");

        assert!(manager.stop().await);
        assert!(!dir.path().join("out").join(&second.id).exists());
        assert!(!manager.stop().await);

        // ffmpeg dies before writing anything.
        let manager = TranscodeManager::new(config(dir.path(), &crashing), "http://127.0.0.1:3000");
        let err = manager.start("/movies/a.mkv").await.unwrap_err();
        assert!(matches!(err, TranscodeError::ExitedEarly(_)));
        assert!(manager.status().await.is_none());

        // ffmpeg hangs.
        let manager = TranscodeManager::new(config(dir.path(), &silent), "http://127.0.0.1:3000");
        let err = manager.start("/movies/a.mkv").await.unwrap_err();
        assert!(matches!(err, TranscodeError::Timeout(_)));
        assert!(manager.status().await.is_none());
    }
}
