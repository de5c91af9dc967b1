//! Snapshot persistence
//!
//! The learning store never touches storage. It raises a [`SaveSignal`]; the
//! [`PersistenceCoordinator`] debounces those requests into single saves and
//! writes the snapshot to the primary file, the durable mirror, rotated
//! backups and any remote backends.

pub mod backend;
pub mod coordinator;
pub mod file;
pub mod kv;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use backend::SnapshotBackend;
pub use coordinator::{LoadedSnapshot, PersistenceCoordinator, SaveSignal, SaveState, StorageSet};
pub use file::{write_atomic, write_atomic_sync, BackupRotation, FileBackend};
pub use kv::KvBackend;
#[cfg(feature = "postgres")]
pub use postgres::PostgresBackend;
