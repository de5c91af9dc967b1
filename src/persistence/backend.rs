//! Pluggable snapshot storage
//!
//! Every place a snapshot can live (local file, durable mirror, key-value
//! store, relational table) implements `SnapshotBackend`. The coordinator only
//! ever sees serialized bytes; parsing and validation stay in the learning core.

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;

/// Storage capability for one serialized snapshot blob.
#[async_trait]
pub trait SnapshotBackend: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Fetch the stored blob, `None` if nothing has been stored yet.
    async fn load(&self) -> Result<Option<Bytes>>;

    /// Replace the stored blob.
    async fn save(&self, data: Bytes) -> Result<()>;

    /// Release connections. Called once at shutdown.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
