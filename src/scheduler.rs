// Eidos by Bryan Emmanuel

use chrono::{DateTime, Local};
use log::{debug, error, info};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

/// Receives progress of a requested restore.
pub trait RestoreObserver: Send {
    /// Called on the worker thread right before the restore job runs.
    fn restore_starting(&self) {}

    /// Called on the worker thread with the outcome of the restore job.
    fn restore_finished(&self, _result: &Result<(), String>) {}
}

/// Observer used when the caller does not supply one.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentObserver;

impl RestoreObserver for SilentObserver {}

/// Signals that a backup or restore should happen at the scheduler's discretion.
pub trait BackupScheduler {
    /// Requests a backup. Returns once the request is queued, not when it ran.
    fn request_backup(&self) -> Result<(), String>;

    /// Requests a restore, optionally reporting progress to `observer`.
    fn request_restore(&self, observer: Option<Box<dyn RestoreObserver>>) -> Result<(), String>;
}

/// A unit of work run by the scheduler's worker thread.
pub type Job = Box<dyn Fn() -> Result<(), String> + Send + 'static>;

enum Request {
    Backup,
    Restore(Box<dyn RestoreObserver>),
}

/// Outcome counters and timestamps of completed jobs.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerStatus {
    /// When the last successful backup finished.
    pub last_backup: Option<DateTime<Local>>,
    /// When the last successful restore finished.
    pub last_restore: Option<DateTime<Local>>,
    pub backups_completed: u64,
    pub restores_completed: u64,
    pub failures: u64,
}

/// Runs requested backups and restores one at a time on a worker thread.
///
/// Backup requests that arrive while an earlier one is still queued are
/// folded into it. A request that arrives while a backup is running queues
/// one more run.
pub struct ThreadScheduler {
    sender: Mutex<Option<Sender<Request>>>,
    backup_pending: Arc<AtomicBool>,
    status: Arc<Mutex<SchedulerStatus>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ThreadScheduler {
    /// Starts the worker thread.
    pub fn start(backup_job: Job, restore_job: Job) -> Self {
        let (tx, rx) = channel();
        let backup_pending = Arc::new(AtomicBool::new(false));
        let status = Arc::new(Mutex::new(SchedulerStatus::default()));

        let worker = {
            let backup_pending = backup_pending.clone();
            let status = status.clone();
            thread::spawn(move || {
                worker_loop(rx, backup_pending, status, backup_job, restore_job);
            })
        };

        info!("Backup scheduler started");
        Self {
            sender: Mutex::new(Some(tx)),
            backup_pending,
            status,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Returns a snapshot of the completed job counters.
    pub fn status(&self) -> SchedulerStatus {
        match self.status.lock() {
            Ok(status) => status.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Stops accepting requests, lets queued ones finish and joins the worker.
    pub fn shutdown(&self) {
        let sender = match self.sender.lock() {
            Ok(mut guard) => guard.take(),
            Err(e) => {
                error!("Failed to lock scheduler sender during shutdown: {}", e);
                return;
            }
        };
        drop(sender);

        let worker = match self.worker.lock() {
            Ok(mut guard) => guard.take(),
            Err(e) => {
                error!("Failed to lock scheduler worker during shutdown: {}", e);
                None
            }
        };
        if let Some(handle) = worker {
            if handle.join().is_err() {
                error!("Backup scheduler worker panicked");
            }
            info!("Backup scheduler stopped");
        }
    }

    fn send(&self, request: Request) -> Result<(), String> {
        let guard = self
            .sender
            .lock()
            .map_err(|_| "Failed to lock scheduler sender".to_string())?;
        match guard.as_ref() {
            Some(tx) => tx
                .send(request)
                .map_err(|_| "Backup scheduler worker is gone".to_string()),
            None => Err("Backup scheduler has been shut down".to_string()),
        }
    }
}

impl BackupScheduler for ThreadScheduler {
    fn request_backup(&self) -> Result<(), String> {
        if self.backup_pending.swap(true, Ordering::SeqCst) {
            debug!("Backup already pending, request coalesced");
            return Ok(());
        }
        self.send(Request::Backup).inspect_err(|_| {
            self.backup_pending.store(false, Ordering::SeqCst);
        })
    }

    fn request_restore(&self, observer: Option<Box<dyn RestoreObserver>>) -> Result<(), String> {
        let observer = observer.unwrap_or_else(|| Box::new(SilentObserver));
        self.send(Request::Restore(observer))
    }
}

impl Drop for ThreadScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn record<F: FnOnce(&mut SchedulerStatus)>(status: &Mutex<SchedulerStatus>, update: F) {
    match status.lock() {
        Ok(mut guard) => update(&mut *guard),
        Err(poisoned) => update(&mut *poisoned.into_inner()),
    }
}

/// Processes requests until every sender is gone.
fn worker_loop(
    rx: Receiver<Request>,
    backup_pending: Arc<AtomicBool>,
    status: Arc<Mutex<SchedulerStatus>>,
    backup_job: Job,
    restore_job: Job,
) {
    for request in rx {
        match request {
            Request::Backup => {
                // Cleared first so changes made during the run queue another one.
                backup_pending.store(false, Ordering::SeqCst);
                info!("Running requested backup");
                match backup_job() {
                    Ok(()) => record(&status, |s| {
                        s.last_backup = Some(Local::now());
                        s.backups_completed += 1;
                    }),
                    Err(e) => {
                        error!("Requested backup failed: {}", e);
                        record(&status, |s| s.failures += 1);
                    }
                }
            }
            Request::Restore(observer) => {
                info!("Running requested restore");
                observer.restore_starting();
                let result = restore_job();
                match &result {
                    Ok(()) => record(&status, |s| {
                        s.last_restore = Some(Local::now());
                        s.restores_completed += 1;
                    }),
                    Err(e) => {
                        error!("Requested restore failed: {}", e);
                        record(&status, |s| s.failures += 1);
                    }
                }
                observer.restore_finished(&result);
            }
        }
    }
}
