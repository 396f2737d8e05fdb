//! Clipboard monitoring
//!
//! Polls a [`ClipboardSource`] and feeds every observation through one
//! [`CapturePolicy`], one capture at a time, with a periodic retention sweep.

use crate::capture::{CaptureOutcome, CapturePolicy, ClipboardSnapshot};
use crate::config::AppConfig;
use crate::interface::{ClipStashError, ClipboardStoreApi};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Read access to a clipboard
pub trait ClipboardSource: Send + Sync {
    fn read_text(&self) -> Option<String>;

    fn read_files(&self) -> Vec<PathBuf>;

    fn snapshot(&self) -> ClipboardSnapshot {
        ClipboardSnapshot {
            text: self.read_text(),
            files: self.read_files(),
        }
    }
}

/// The OS clipboard via arboard
pub struct SystemClipboard {
    clipboard: Mutex<arboard::Clipboard>,
}

impl SystemClipboard {
    pub fn new() -> Result<Self, ClipStashError> {
        let clipboard = arboard::Clipboard::new().map_err(|e| ClipStashError::Clipboard(e.to_string()))?;
        Ok(Self { clipboard: Mutex::new(clipboard) })
    }

    /// Put `text` on the clipboard.
    ///
    /// On Linux the selection is served by this process, so the call blocks until
    /// another application takes clipboard ownership.
    pub fn set_text(&self, text: &str) -> Result<(), ClipStashError> {
        let mut clipboard = self.clipboard.lock();
        #[cfg(target_os = "linux")]
        let result = {
            use arboard::SetExtLinux;
            clipboard.set().wait().text(text.to_owned())
        };
        #[cfg(not(target_os = "linux"))]
        let result = clipboard.set_text(text.to_owned());
        result.map_err(|e| ClipStashError::Clipboard(e.to_string()))
    }
}

impl ClipboardSource for SystemClipboard {
    fn read_text(&self) -> Option<String> {
        // ContentNotAvailable is the normal "clipboard holds something else" case
        self.clipboard.lock().get_text().ok()
    }

    fn read_files(&self) -> Vec<PathBuf> {
        self.clipboard.lock().get().file_list().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    pub poll_interval: Duration,
    pub purge_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        (&AppConfig::default()).into()
    }
}

impl From<&AppConfig> for MonitorConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            purge_interval: config.purge_interval(),
        }
    }
}

/// Run until `token` is cancelled.
///
/// Returns early with the error when the store becomes unusable. Rejections and
/// unreadable file batches are logged and monitoring continues.
pub async fn run_monitor<S>(
    store: Arc<S>,
    source: Arc<dyn ClipboardSource>,
    policy: CapturePolicy,
    config: MonitorConfig,
    token: CancellationToken,
) -> Result<(), ClipStashError>
where
    S: ClipboardStoreApi + 'static,
{
    let policy = Arc::new(Mutex::new(policy));

    let mut poll = tokio::time::interval(config.poll_interval);
    poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut sweep = tokio::time::interval(config.purge_interval);
    sweep.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        poll_ms = config.poll_interval.as_millis() as u64,
        purge_secs = config.purge_interval.as_secs(),
        "Clipboard monitor started"
    );

    loop {
        tokio::select! {
            biased;

            _ = token.cancelled() => {
                info!("Clipboard monitor stopped");
                return Ok(());
            }

            _ = sweep.tick() => {
                let store = Arc::clone(&store);
                match tokio::task::spawn_blocking(move || store.purge_expired()).await {
                    Ok(Ok(summary)) => debug!(removed = summary.total(), "Retention sweep finished"),
                    Ok(Err(e)) => {
                        error!(error = %e, "Retention sweep failed");
                        return Err(e);
                    }
                    Err(e) => error!(error = %e, "Retention sweep task panicked"),
                }
            }

            _ = poll.tick() => {
                let store = Arc::clone(&store);
                let source = Arc::clone(&source);
                let policy = Arc::clone(&policy);
                let joined = tokio::task::spawn_blocking(move || {
                    let snapshot = source.snapshot();
                    policy.lock().capture(store.as_ref(), snapshot)
                })
                .await;

                match joined {
                    Ok(Ok(CaptureOutcome::Rejected(rejection))) => {
                        warn!(reason = %rejection, "Copied files were not recorded");
                    }
                    Ok(Ok(_)) => {}
                    Ok(Err(ClipStashError::FileRead(message))) => {
                        warn!(error = %message, "Copied files could not be read");
                    }
                    Ok(Err(e)) => {
                        error!(error = %e, "Clipboard capture failed");
                        return Err(e);
                    }
                    Err(e) => error!(error = %e, "Clipboard capture task panicked"),
                }
            }
        }
    }
}
