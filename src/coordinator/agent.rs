// Eidos by Bryan Emmanuel

use super::lock::BackupLock;
use super::transfer::TransferMechanism;
use crate::manifest::{Manifest, ManifestBuilder};
use std::path::{Path, PathBuf};

/// Lifecycle callbacks invoked by the backup harness.
pub trait BackupAgent {
    type State;
    type Sink;
    type Source;
    type Error;

    /// Called once before any backup or restore, with the data directory to cover.
    fn on_create(&mut self, data_dir: &Path);

    fn on_backup(
        &self,
        previous_state: Option<&Self::State>,
        data: &mut Self::Sink,
        new_state: &mut Self::State,
    ) -> Result<(), Self::Error>;

    fn on_restore(
        &self,
        data: &mut Self::Source,
        app_version_code: u32,
        new_state: &mut Self::State,
    ) -> Result<(), Self::Error>;
}

/// Runs backup and restore one at a time over a freshly built manifest.
///
/// Both operations hold the [`BackupLock`] from entry to exit, including the
/// manifest walk and the delegated transfer. The lock only orders this
/// coordinator's own operations and those of writers that take the same
/// lock; writers that ignore it are not held back.
pub struct BackupCoordinator<T> {
    lock: BackupLock,
    builder: ManifestBuilder,
    transfer: T,
    data_dir: Option<PathBuf>,
}

impl<T: TransferMechanism> BackupCoordinator<T> {
    pub fn new(lock: BackupLock, builder: ManifestBuilder, transfer: T) -> Self {
        Self {
            lock,
            builder,
            transfer,
            data_dir: None,
        }
    }

    /// Returns the lock shared with cooperating database writers.
    pub fn lock(&self) -> &BackupLock {
        &self.lock
    }

    pub fn transfer(&self) -> &T {
        &self.transfer
    }

    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    /// Builds the manifest of the data directory without taking the lock.
    pub fn manifest(&self) -> Manifest {
        match &self.data_dir {
            Some(dir) => self.builder.build(dir),
            None => {
                log::warn!("No data directory registered yet, manifest is empty.");
                Manifest::new()
            }
        }
    }

    /// Backs up the data directory while holding the lock.
    ///
    /// Transfer failures are returned unmodified. The lock is released on
    /// every exit path.
    pub fn perform_backup(
        &self,
        previous_state: Option<&T::State>,
        data: &mut T::Sink,
        new_state: &mut T::State,
    ) -> Result<(), T::Error> {
        let _guard = self.lock.acquire();
        log::debug!("Backup lock acquired");

        let manifest = self.manifest();
        log::info!(
            "Starting backup of {} entries (previous state: {})",
            manifest.len(),
            if previous_state.is_some() { "present" } else { "none" }
        );

        let result = self
            .transfer
            .backup(&manifest, previous_state, data, new_state);
        match &result {
            Ok(()) => log::info!("Backup finished"),
            Err(_) => log::error!("Backup transfer failed"),
        }
        result
    }

    /// Restores into the data directory while holding the lock.
    pub fn perform_restore(
        &self,
        data: &mut T::Source,
        app_version_code: u32,
        new_state: &mut T::State,
    ) -> Result<(), T::Error> {
        let _guard = self.lock.acquire();
        log::debug!("Restore lock acquired");

        let manifest = self.manifest();
        log::info!(
            "Starting restore of {} entries from app version {}",
            manifest.len(),
            app_version_code
        );

        let result = self
            .transfer
            .restore(&manifest, data, app_version_code, new_state);
        match &result {
            Ok(()) => log::info!("Restore finished"),
            Err(_) => log::error!("Restore transfer failed"),
        }
        result
    }
}

impl<T: TransferMechanism> BackupAgent for BackupCoordinator<T> {
    type State = T::State;
    type Sink = T::Sink;
    type Source = T::Source;
    type Error = T::Error;

    fn on_create(&mut self, data_dir: &Path) {
        log::info!("Registering data directory {:?}", data_dir);
        self.data_dir = Some(data_dir.to_path_buf());
    }

    fn on_backup(
        &self,
        previous_state: Option<&Self::State>,
        data: &mut Self::Sink,
        new_state: &mut Self::State,
    ) -> Result<(), Self::Error> {
        self.perform_backup(previous_state, data, new_state)
    }

    fn on_restore(
        &self,
        data: &mut Self::Source,
        app_version_code: u32,
        new_state: &mut Self::State,
    ) -> Result<(), Self::Error> {
        self.perform_restore(data, app_version_code, new_state)
    }
}
