use std::fs;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use preview::{ShaderLanguage, ShaderSourceText};
use tracing::{debug, info, warn};

/// Polls a shader file and publishes its text whenever it changes.
///
/// The polling thread stops when the watcher is dropped.
pub struct FileWatcher {
    updates: Receiver<ShaderSourceText>,
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl FileWatcher {
    /// Starts polling `path`. `initial` is the text the caller already has;
    /// only differing contents are published.
    pub fn spawn(
        path: PathBuf,
        language: ShaderLanguage,
        initial: String,
        interval: Duration,
    ) -> Result<Self> {
        let (update_tx, update_rx) = unbounded();
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let handle = thread::Builder::new()
            .name("shaderlab-watch".into())
            .spawn(move || poll_loop(&path, language, initial, interval, &update_tx, &stop_rx))
            .context("failed to spawn file watcher thread")?;

        Ok(Self {
            updates: update_rx,
            stop: Some(stop_tx),
            handle: Some(handle),
        })
    }

    pub fn updates(&self) -> Receiver<ShaderSourceText> {
        self.updates.clone()
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        // Disconnecting the stop channel wakes the poll loop.
        self.stop.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("file watcher thread panicked");
            }
        }
    }
}

fn poll_loop(
    path: &Path,
    language: ShaderLanguage,
    mut last: String,
    interval: Duration,
    updates: &Sender<ShaderSourceText>,
    stop: &Receiver<()>,
) {
    debug!(path = %path.display(), ?interval, "watching shader file");
    let mut failing = false;
    loop {
        match stop.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }

        match fs::read_to_string(path) {
            Ok(text) => {
                failing = false;
                if text == last {
                    continue;
                }
                info!(path = %path.display(), bytes = text.len(), "shader file changed");
                last.clone_from(&text);
                if updates.send(ShaderSourceText::new(language, text)).is_err() {
                    break;
                }
            }
            Err(err) => {
                if !failing {
                    warn!(path = %path.display(), error = %err, "failed to read watched shader");
                }
                failing = true;
            }
        }
    }
    debug!(path = %path.display(), "stopped watching shader file");
}
