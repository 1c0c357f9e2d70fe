// Eidos by Bryan Emmanuel

use crate::manifest::ManifestRules;
use crate::scheduler::BackupScheduler;
use log::{debug, error, info, warn};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

// Upper bound on how long the debounce loop sleeps between shutdown checks
const IDLE_POLL: Duration = Duration::from_secs(1);

/// An active watch: the notify handle plus the debounce thread it feeds.
struct WatchRun {
    watcher: RecommendedWatcher,
    shutdown: Arc<AtomicBool>,
    worker: JoinHandle<()>,
}

/// Requests a backup whenever the data directory settles after a change.
///
/// Once [`DataWatcher::stop`] returns, no further backup is requested.
#[derive(Default)]
pub struct DataWatcher {
    run: Mutex<Option<WatchRun>>,
}

impl DataWatcher {
    /// Creates a new, inactive DataWatcher instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts watching `data_dir` recursively, replacing any previous watch.
    ///
    /// One backup is requested right away to cover changes made while nothing
    /// was watching. Afterwards a backup is requested once no relevant change
    /// has been seen for `debounce`.
    pub fn start(
        &self,
        data_dir: PathBuf,
        rules: ManifestRules,
        debounce: Duration,
        scheduler: Arc<dyn BackupScheduler + Send + Sync>,
    ) -> Result<(), String> {
        self.stop();

        if !data_dir.is_dir() {
            return Err(format!("Watch target does not exist: {:?}", data_dir));
        }
        // Event paths arrive canonicalized on some platforms
        let data_dir = data_dir
            .canonicalize()
            .map_err(|e| format!("Invalid watch target: {}", e))?;

        let (tx, rx) = channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })
        .map_err(|e| e.to_string())?;
        watcher
            .watch(&data_dir, RecursiveMode::Recursive)
            .map_err(|e| format!("Failed to watch path: {}", e))?;

        info!("Started watching: {:?} (debounce: {:?})", data_dir, debounce);

        let shutdown = Arc::new(AtomicBool::new(false));
        let worker = {
            let shutdown = shutdown.clone();
            thread::Builder::new()
                .name("eidos-watch".to_string())
                .spawn(move || debounce_loop(rx, data_dir, rules, shutdown, debounce, scheduler))
                .map_err(|e| format!("Failed to spawn debounce thread: {}", e))?
        };

        let mut run = self
            .run
            .lock()
            .map_err(|_| "Failed to lock watcher state".to_string())?;
        *run = Some(WatchRun {
            watcher,
            shutdown,
            worker,
        });
        Ok(())
    }

    /// Stops the current watch, if any, and waits for the debounce thread to exit.
    pub fn stop(&self) {
        let run = match self.run.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => {
                warn!("Watcher state lock poisoned, stopping anyway");
                poisoned.into_inner().take()
            }
        };
        let Some(run) = run else {
            return;
        };

        run.shutdown.store(true, Ordering::SeqCst);
        // Dropping the notify handle disconnects the event channel
        drop(run.watcher);
        if run.worker.join().is_err() {
            error!("Debounce thread panicked");
        }
        info!("Stopped watching");
    }

    /// Returns true while a watch is active.
    pub fn is_running(&self) -> bool {
        match self.run.lock() {
            Ok(guard) => guard.is_some(),
            Err(poisoned) => poisoned.into_inner().is_some(),
        }
    }
}

impl Drop for DataWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Returns true if a change at `path` can alter the manifest of `root`.
///
/// Changes below an excluded name never can.
pub(crate) fn is_relevant_path(root: &Path, path: &Path, rules: &ManifestRules) -> bool {
    let Ok(relative) = path.strip_prefix(root) else {
        return false;
    };
    !relative
        .components()
        .any(|c| c.as_os_str().to_str().is_some_and(|name| rules.is_excluded(name)))
}

/// Returns true if the event describes a change to the tree.
fn is_relevant_event(root: &Path, event: &Event, rules: &ManifestRules) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) && event
        .paths
        .iter()
        .any(|path| is_relevant_path(root, path, rules))
}

fn request(scheduler: &dyn BackupScheduler) {
    if let Err(e) = scheduler.request_backup() {
        error!("Failed to request backup: {}", e);
    }
}

/// Turns bursts of change events into single backup requests.
fn debounce_loop(
    rx: Receiver<notify::Result<Event>>,
    data_dir: PathBuf,
    rules: ManifestRules,
    shutdown: Arc<AtomicBool>,
    debounce: Duration,
    scheduler: Arc<dyn BackupScheduler + Send + Sync>,
) {
    request(scheduler.as_ref());

    let mut last_change = Instant::now();
    let mut pending = false;

    while !shutdown.load(Ordering::SeqCst) {
        let timeout = match pending {
            true if last_change.elapsed() >= debounce => {
                info!("Data directory settled, requesting backup.");
                request(scheduler.as_ref());
                pending = false;
                IDLE_POLL
            }
            true => (debounce - last_change.elapsed()).min(IDLE_POLL),
            false => IDLE_POLL,
        };

        match rx.recv_timeout(timeout) {
            Ok(Ok(event)) if is_relevant_event(&data_dir, &event, &rules) => {
                debug!("Change detected: {:?}", event.paths);
                pending = true;
                last_change = Instant::now();
            }
            Ok(Ok(_)) | Err(RecvTimeoutError::Timeout) => {}
            Ok(Err(e)) => error!("Watch error: {:?}", e),
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!("Debounce loop for {:?} exited", data_dir);
}
