pub mod agent;
pub mod lock;
pub mod transfer;


pub use agent::{BackupAgent, BackupCoordinator};
pub use lock::{BackupGuard, BackupLock};
pub use transfer::TransferMechanism;
