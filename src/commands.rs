use crate::config::{self, AgentConfig};
use crate::coordinator::{BackupAgent, BackupCoordinator, BackupLock, TransferMechanism};
use crate::manifest::{Manifest, ManifestBuilder};
use crate::scheduler::{BackupScheduler, Job, SchedulerStatus, ThreadScheduler};
use crate::watcher::DataWatcher;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};

/// JSON report printed by the `manifest` command.
#[derive(Debug, Serialize)]
pub struct ManifestReport {
    pub root: String,
    pub generated_at: DateTime<Local>,
    pub fingerprint: String,
    pub manifest: Manifest,
}

/// Transfer mechanism that only logs what a real one would move.
///
/// The state token is the manifest fingerprint, so a backup whose previous
/// state matches reports the data directory as unchanged.
#[derive(Debug, Default)]
pub struct DryRunTransfer;

impl TransferMechanism for DryRunTransfer {
    type State = String;
    type Sink = Vec<String>;
    type Source = Vec<String>;
    type Error = String;

    fn backup(
        &self,
        manifest: &Manifest,
        previous_state: Option<&String>,
        data: &mut Vec<String>,
        new_state: &mut String,
    ) -> Result<(), String> {
        let fingerprint = manifest.fingerprint();
        if previous_state == Some(&fingerprint) {
            log::info!("Manifest unchanged since previous backup ({})", fingerprint);
        }
        for entry in manifest.entries() {
            log::debug!("Would back up {}: {}", entry.group, entry.path);
            data.push(format!("{}/{}", entry.group.key(), entry.path));
        }
        *new_state = fingerprint;
        Ok(())
    }

    fn restore(
        &self,
        manifest: &Manifest,
        data: &mut Vec<String>,
        app_version_code: u32,
        new_state: &mut String,
    ) -> Result<(), String> {
        log::info!(
            "Would restore {} record(s) from app version {} over {} entries",
            data.len(),
            app_version_code,
            manifest.len()
        );
        *new_state = manifest.fingerprint();
        Ok(())
    }
}

/// Picks the directory given on the command line, falling back to the configured one.
pub fn resolve_data_dir(arg: Option<&Path>, config: &AgentConfig) -> Result<PathBuf, String> {
    match arg {
        Some(dir) => Ok(dir.to_path_buf()),
        None => config
            .data_dir_path()
            .ok_or_else(|| "Data directory not configured".to_string()),
    }
}

/// Builds the manifest of `data_dir` and renders it as pretty JSON.
pub fn manifest_command(data_dir: &Path, config: &AgentConfig) -> Result<String, String> {
    let manifest = ManifestBuilder::new(config.rules()).build(data_dir);
    let report = ManifestReport {
        root: data_dir.to_string_lossy().to_string(),
        generated_at: Local::now(),
        fingerprint: manifest.fingerprint(),
        manifest,
    };
    serde_json::to_string_pretty(&report).map_err(|e| format!("Failed to render manifest: {}", e))
}

/// Renders the effective configuration as pretty JSON.
pub fn config_show_command(config: &AgentConfig) -> Result<String, String> {
    serde_json::to_string_pretty(config).map_err(|e| format!("Failed to render config: {}", e))
}

/// Stores `dir` as the data directory in the configuration file at `config_path`.
///
/// The directory must exist. It is stored as an absolute path so the setting
/// does not depend on the working directory of later runs.
pub fn set_data_dir_command(
    config_path: &Path,
    mut config: AgentConfig,
    dir: &Path,
) -> Result<AgentConfig, String> {
    let absolute = std::path::absolute(dir).map_err(|e| format!("Invalid path {:?}: {}", dir, e))?;
    let absolute = absolute
        .to_str()
        .ok_or_else(|| format!("Path is not valid UTF-8: {:?}", absolute))?
        .to_string();

    config::set_data_dir(&mut config, absolute)?;
    config::save_config_to_path(config_path, &config)?;
    Ok(config)
}

/// Running watcher, scheduler and coordinator wired together.
pub struct WatchSession {
    pub watcher: DataWatcher,
    pub scheduler: Arc<ThreadScheduler>,
    pub coordinator: Arc<BackupCoordinator<DryRunTransfer>>,
}

impl WatchSession {
    /// Stops watching and waits for queued jobs to finish.
    ///
    /// The watcher joins its debounce thread before the scheduler shuts down,
    /// so no backup is requested from a closed scheduler.
    pub fn stop(&self) {
        self.watcher.stop();
        self.scheduler.shutdown();
    }
}

/// Installs a SIGINT and SIGTERM handler and returns the channel it signals.
///
/// Only one handler can be installed per process.
pub fn stop_signal() -> Result<Receiver<()>, String> {
    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .map_err(|e| format!("Failed to install signal handler: {}", e))?;
    Ok(rx)
}

/// Blocks until `stop` fires, then stops the session and reports its status.
///
/// A channel whose senders are all gone counts as a stop request.
pub fn run_until_stopped(session: &WatchSession, stop: &Receiver<()>) -> SchedulerStatus {
    if stop.recv().is_err() {
        log::warn!("Stop channel closed, shutting down");
    }
    session.stop();
    session.scheduler.status()
}

/// Starts watching `data_dir`, running a dry-run backup whenever it settles.
pub fn watch_command(data_dir: &Path, config: &AgentConfig) -> Result<WatchSession, String> {
    let mut coordinator = BackupCoordinator::new(
        BackupLock::new(),
        ManifestBuilder::new(config.rules()),
        DryRunTransfer,
    );
    coordinator.on_create(data_dir);
    let coordinator = Arc::new(coordinator);

    let last_state: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));

    let backup_job: Job = {
        let coordinator = coordinator.clone();
        let last_state = last_state.clone();
        Box::new(move || {
            let mut state = last_state
                .lock()
                .map_err(|_| "Failed to lock backup state".to_string())?;
            let mut sink = Vec::new();
            let mut new_state = String::new();
            coordinator.on_backup(state.as_ref(), &mut sink, &mut new_state)?;
            log::info!("Dry-run backup covered {} entries", sink.len());
            *state = Some(new_state);
            Ok(())
        })
    };

    let restore_job: Job = {
        let coordinator = coordinator.clone();
        let last_state = last_state.clone();
        Box::new(move || {
            let mut state = last_state
                .lock()
                .map_err(|_| "Failed to lock backup state".to_string())?;
            let mut new_state = String::new();
            coordinator.on_restore(&mut Vec::new(), 0, &mut new_state)?;
            *state = Some(new_state);
            Ok(())
        })
    };

    let scheduler = Arc::new(ThreadScheduler::start(backup_job, restore_job));
    let watcher = DataWatcher::new();
    let requester: Arc<dyn BackupScheduler + Send + Sync> = scheduler.clone();
    watcher.start(
        data_dir.to_path_buf(),
        config.rules(),
        config.debounce(),
        requester,
    )?;

    Ok(WatchSession {
        watcher,
        scheduler,
        coordinator,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{Duration, Instant};
    use tempfile::tempdir;

    /// Tests that the manifest command renders entries and the fingerprint.
    #[test]
    fn test_manifest_command_json() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a"), "a").unwrap();
        fs::create_dir_all(dir.path().join("shared_prefs")).unwrap();
        fs::write(dir.path().join("shared_prefs").join("p.xml"), "<map/>").unwrap();

        let json = manifest_command(dir.path(), &AgentConfig::default()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        let expected = ManifestBuilder::default().build(dir.path()).fingerprint();
        assert_eq!(value["fingerprint"], serde_json::Value::String(expected));
        assert_eq!(value["manifest"]["entries"].as_array().unwrap().len(), 2);
        assert!(value["generated_at"].is_string());
    }

    /// Tests that a missing directory renders an empty manifest instead of failing.
    #[test]
    fn test_manifest_command_missing_dir() {
        let dir = tempdir().unwrap();
        let json = manifest_command(&dir.path().join("missing"), &AgentConfig::default()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value["manifest"]["entries"].as_array().unwrap().is_empty());
    }

    /// Tests data directory resolution from arguments and configuration.
    #[test]
    fn test_resolve_data_dir() {
        let dir = tempdir().unwrap();
        let mut config = AgentConfig::default();

        assert!(resolve_data_dir(None, &config).is_err());
        assert_eq!(
            resolve_data_dir(Some(Path::new("explicit")), &config).unwrap(),
            PathBuf::from("explicit")
        );

        config.data_dir = Some(dir.path().to_string_lossy().to_string());
        assert_eq!(
            resolve_data_dir(None, &config).unwrap(),
            dir.path().to_path_buf()
        );
    }

    /// Tests that the dry-run transfer recognizes an unchanged manifest by its state.
    #[test]
    fn test_dry_run_transfer_state() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a"), "a").unwrap();

        let mut coordinator =
            BackupCoordinator::new(BackupLock::new(), ManifestBuilder::default(), DryRunTransfer);
        coordinator.on_create(dir.path());

        let mut sink = Vec::new();
        let mut first = String::new();
        coordinator.on_backup(None, &mut sink, &mut first).unwrap();
        assert_eq!(sink, vec!["files/a".to_string()]);

        let mut second = String::new();
        coordinator
            .on_backup(Some(&first), &mut Vec::new(), &mut second)
            .unwrap();
        assert_eq!(first, second);
    }

    /// Tests that a watch session runs the initial backup through the coordinator.
    #[test]
    fn test_watch_session_runs_initial_backup() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a"), "a").unwrap();
        let config = AgentConfig {
            debounce_secs: 1,
            ..AgentConfig::default()
        };

        let session = watch_command(dir.path(), &config).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while session.scheduler.status().backups_completed == 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(50));
        }
        session.stop();

        assert!(session.scheduler.status().backups_completed >= 1);
        assert!(session.coordinator.lock().try_acquire().is_some());
    }

    /// Tests that the session keeps running until the stop channel fires.
    #[test]
    fn test_run_until_stopped_waits_for_stop() {
        let dir = tempdir().unwrap();
        let config = AgentConfig {
            debounce_secs: 1,
            ..AgentConfig::default()
        };
        let session = watch_command(dir.path(), &config).unwrap();
        let (tx, rx) = mpsc::channel();

        let started = Instant::now();
        let sender = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(300));
            tx.send(()).unwrap();
        });

        let status = run_until_stopped(&session, &rx);
        sender.join().unwrap();

        assert!(started.elapsed() >= Duration::from_millis(300));
        assert!(!session.watcher.is_running());
        assert_eq!(status.failures, 0);
    }

    /// Tests that setting the data directory validates it and persists it.
    #[test]
    fn test_set_data_dir_command() {
        let dir = tempdir().unwrap();
        let data_dir = dir.path().join("data");
        fs::create_dir_all(&data_dir).unwrap();
        let config_path = dir.path().join("eidos.json");

        let missing = set_data_dir_command(
            &config_path,
            AgentConfig::default(),
            &dir.path().join("missing"),
        );
        assert!(missing.is_err());
        assert!(!config_path.exists());

        let updated = set_data_dir_command(&config_path, AgentConfig::default(), &data_dir).unwrap();
        assert_eq!(updated.data_dir_path(), Some(data_dir.clone()));

        let reloaded = config::load_config_from_path(&config_path);
        assert_eq!(reloaded, updated);
        assert_eq!(resolve_data_dir(None, &reloaded).unwrap(), data_dir);
    }

    /// Tests that the config show command renders every field.
    #[test]
    fn test_config_show_command() {
        let json = config_show_command(&AgentConfig::default()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["preferences_dir"], "shared_prefs");
        assert_eq!(value["debounce_secs"], 2);
        assert!(value["data_dir"].is_null());
    }
}
