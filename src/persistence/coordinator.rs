//! Save scheduling, multi-backend fan-out and shutdown flush
//!
//! ## Save state machine
//!
//! ```text
//!            request                debounce
//!   Idle ─────────────▶ Scheduled ─────────▶ Saving
//!    ▲                    ▲   │ request        │
//!    │                    │   └─(coalesced)    │ request
//!    │                    └────────────────────┤
//!    └──────────────── save done ──────────────┘
//! ```
//!
//! A request that lands while a save is running moves the state back to
//! `Scheduled`, so the worker runs once more with the newer state. At most one
//! save is in flight.

use super::backend::SnapshotBackend;
use super::file::{write_atomic_sync, BackupRotation, FileBackend};
use super::kv::KvBackend;
use crate::config::{ParleyConfig, StorageConfig};
use crate::error::{Error, Result};
use crate::learning::{MemorySnapshot, SharedStore};
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

/// Scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveState {
    /// Nothing pending
    Idle,
    /// A save will start after the debounce delay
    Scheduled,
    /// A save is being written
    Saving,
}

/// Cheap, cloneable handle for requesting saves.
///
/// Requesting never blocks and never performs I/O.
#[derive(Clone)]
pub struct SaveSignal {
    state: Arc<watch::Sender<SaveState>>,
}

impl Default for SaveSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl SaveSignal {
    /// Create a signal in the `Idle` state
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SaveState::Idle);
        Self {
            state: Arc::new(tx),
        }
    }

    /// Ask for a save. Idle and Saving move to Scheduled; Scheduled coalesces.
    pub fn request(&self) {
        self.state.send_if_modified(|state| match state {
            SaveState::Scheduled => false,
            SaveState::Idle | SaveState::Saving => {
                *state = SaveState::Scheduled;
                true
            }
        });
    }

    /// Current state
    pub fn state(&self) -> SaveState {
        *self.state.borrow()
    }

    /// Whether a save is scheduled or running
    pub fn is_pending(&self) -> bool {
        self.state() != SaveState::Idle
    }

    fn subscribe(&self) -> watch::Receiver<SaveState> {
        self.state.subscribe()
    }

    fn begin_save(&self) {
        self.state.send_replace(SaveState::Saving);
    }

    /// Back to Idle unless a request arrived during the save.
    /// Returns `false` when another save is needed.
    fn finish_save(&self) -> bool {
        self.state.send_if_modified(|state| {
            if *state == SaveState::Saving {
                *state = SaveState::Idle;
                true
            } else {
                false
            }
        })
    }

    /// Wait until no save is scheduled or running
    async fn wait_idle(&self) {
        let mut rx = self.subscribe();
        // The sender lives as long as `self`, so this cannot fail
        let _ = rx.wait_for(|state| *state == SaveState::Idle).await;
    }
}

/// Where the startup snapshot came from
#[derive(Debug)]
pub struct LoadedSnapshot {
    /// The snapshot, or defaults when nothing valid was found
    pub snapshot: MemorySnapshot,
    /// Name of the backend it was read from
    pub source: Option<String>,
}

/// Every location a snapshot is written to or read from
pub struct StorageSet {
    primary: FileBackend,
    durable: Option<FileBackend>,
    remotes: Vec<Arc<dyn SnapshotBackend>>,
    backups: BackupRotation,
    debounce: Duration,
    save_interval: Duration,
    remote_timeout: Duration,
}

impl StorageSet {
    /// Local files only
    pub fn new(storage: &StorageConfig, remote_timeout: Duration) -> Self {
        Self {
            primary: FileBackend::new("primary", &storage.primary_path),
            durable: storage
                .durable_path
                .as_ref()
                .map(|path| FileBackend::new("durable", path)),
            remotes: Vec::new(),
            backups: BackupRotation::new(storage.backup_dir(), storage.backup_retention),
            debounce: storage.debounce(),
            save_interval: storage.save_interval(),
            remote_timeout,
        }
    }

    /// Local files plus every configured remote backend
    pub fn from_config(config: &ParleyConfig) -> Result<Self> {
        let remote = &config.remote;
        let mut set = Self::new(&config.storage, remote.timeout());

        if let Some(kv) = &remote.kv {
            set = set.with_remote(Arc::new(KvBackend::new(kv, remote.timeout())?));
        }

        if let Some(pg) = &remote.postgres {
            #[cfg(feature = "postgres")]
            {
                let backend = super::postgres::PostgresBackend::new(pg, remote.timeout())?;
                set = set.with_remote(Arc::new(backend));
            }
            #[cfg(not(feature = "postgres"))]
            {
                tracing::warn!(
                    table = %pg.table,
                    "Postgres backend configured but the `postgres` feature is disabled, ignoring"
                );
            }
        }

        Ok(set)
    }

    /// Add a remote backend
    pub fn with_remote(mut self, backend: Arc<dyn SnapshotBackend>) -> Self {
        self.remotes.push(backend);
        self
    }

    /// Names of all backends in load order
    pub fn backend_names(&self) -> Vec<String> {
        self.load_order()
            .map(|(backend, _)| backend.name().to_string())
            .collect()
    }

    fn load_order(&self) -> impl Iterator<Item = (&dyn SnapshotBackend, bool)> + '_ {
        std::iter::once((&self.primary as &dyn SnapshotBackend, false))
            .chain(
                self.durable
                    .iter()
                    .map(|d| (d as &dyn SnapshotBackend, false)),
            )
            .chain(
                self.remotes
                    .iter()
                    .map(|r| (r.as_ref() as &dyn SnapshotBackend, true)),
            )
    }

    /// Read the first structurally valid snapshot: primary, durable mirror,
    /// then each remote. Falls back to an empty snapshot.
    pub async fn load(&self) -> LoadedSnapshot {
        for (backend, remote) in self.load_order() {
            let name = backend.name();
            let result = if remote {
                match tokio::time::timeout(self.remote_timeout, backend.load()).await {
                    Ok(result) => result,
                    Err(_) => Err(Error::backend(name, "load timed out")),
                }
            } else {
                backend.load().await
            };

            match result {
                Ok(Some(data)) => match MemorySnapshot::from_slice(&data) {
                    Ok(snapshot) => {
                        tracing::info!(
                            backend = %name,
                            context_pairs = snapshot.context_pairs.len(),
                            clusters = snapshot.semantic_clusters.len(),
                            "Loaded memory snapshot"
                        );
                        return LoadedSnapshot {
                            snapshot,
                            source: Some(name.to_string()),
                        };
                    }
                    Err(e) => {
                        tracing::warn!(backend = %name, error = %e, "Ignoring unusable snapshot");
                    }
                },
                Ok(None) => tracing::debug!(backend = %name, "No snapshot stored"),
                Err(e) => tracing::warn!(backend = %name, error = %e, "Failed to read snapshot"),
            }
        }

        tracing::warn!("No valid memory snapshot found, starting empty");
        LoadedSnapshot {
            snapshot: MemorySnapshot::default(),
            source: None,
        }
    }
}

struct RemoteTarget {
    backend: Arc<dyn SnapshotBackend>,
    /// Generation of the newest snapshot this backend accepted
    written: Arc<Mutex<u64>>,
}

struct Inner {
    store: SharedStore,
    signal: SaveSignal,
    primary: FileBackend,
    durable: Option<FileBackend>,
    remotes: Vec<RemoteTarget>,
    backups: BackupRotation,
    debounce: Duration,
    remote_timeout: Duration,
    pending_pushes: Mutex<Vec<JoinHandle<()>>>,
    generation: AtomicU64,
    completed_saves: AtomicU64,
}

impl Inner {
    async fn perform_save(&self) -> Result<()> {
        let snapshot = self.store.read().await.snapshot();
        let data = snapshot.to_bytes()?;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let primary = self.primary.save(data.clone()).await;
        if let Err(e) = &primary {
            tracing::error!(
                path = %self.primary.path().display(),
                error = %e,
                "Primary snapshot write failed"
            );
        }

        if let Some(durable) = &self.durable {
            if let Err(e) = durable.save(data.clone()).await {
                tracing::warn!(
                    path = %durable.path().display(),
                    error = %e,
                    "Durable mirror write failed"
                );
            }
        }

        self.push_remotes(&data, generation).await;

        if let Err(e) = self.backups.rotate(&data).await {
            tracing::warn!(error = %e, "Backup rotation failed");
        }

        self.completed_saves.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(generation, bytes = data.len(), "Snapshot saved");
        primary.map_err(|e| Error::Persistence(e.to_string()))
    }

    /// Spawn one time-boxed push per remote. A push never overwrites a newer
    /// generation that already reached the same backend.
    async fn push_remotes(&self, data: &Bytes, generation: u64) {
        if self.remotes.is_empty() {
            return;
        }
        let mut pending = self.pending_pushes.lock().await;
        pending.retain(|handle| !handle.is_finished());

        for target in &self.remotes {
            let backend = Arc::clone(&target.backend);
            let written = Arc::clone(&target.written);
            let data = data.clone();
            let timeout = self.remote_timeout;

            pending.push(tokio::spawn(async move {
                let mut newest = written.lock().await;
                if *newest >= generation {
                    return;
                }
                match tokio::time::timeout(timeout, backend.save(data)).await {
                    Ok(Ok(())) => {
                        *newest = generation;
                        tracing::debug!(backend = %backend.name(), generation, "Remote push done");
                    }
                    Ok(Err(e)) => {
                        tracing::warn!(backend = %backend.name(), error = %e, "Remote push failed");
                    }
                    Err(_) => {
                        tracing::warn!(
                            backend = %backend.name(),
                            timeout_ms = timeout.as_millis() as u64,
                            "Remote push timed out"
                        );
                    }
                }
            }));
        }
    }

    async fn drain_remote_pushes(&self) {
        let handles: Vec<JoinHandle<()>> = self.pending_pushes.lock().await.drain(..).collect();
        if handles.is_empty() {
            return;
        }
        // Each push is already time-boxed; the outer bound covers queued pushes
        let bound = self.remote_timeout * 2;
        if tokio::time::timeout(bound, futures::future::join_all(handles))
            .await
            .is_err()
        {
            tracing::warn!("Remote pushes still pending at shutdown, abandoning them");
        }
    }

    async fn run_worker(self: Arc<Self>) {
        let mut rx = self.signal.subscribe();
        loop {
            let closed = rx
                .wait_for(|state| *state == SaveState::Scheduled)
                .await
                .is_err();
            if closed {
                break;
            }
            tokio::time::sleep(self.debounce).await;

            self.signal.begin_save();
            if let Err(e) = self.perform_save().await {
                tracing::warn!(error = %e, "Save completed with errors");
            }
            if !self.signal.finish_save() {
                tracing::debug!("Save requested during save, running again");
            }
        }
    }
}

/// Owns the save worker, the periodic timer and every storage backend.
pub struct PersistenceCoordinator {
    inner: Arc<Inner>,
    worker: Mutex<Option<JoinHandle<()>>>,
    timer: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl PersistenceCoordinator {
    /// Start the save worker and periodic timer for `store`.
    ///
    /// `signal` must be the one attached to the store.
    pub fn start(storage: StorageSet, store: SharedStore, signal: SaveSignal) -> Self {
        let save_interval = storage.save_interval;
        let inner = Arc::new(Inner {
            store,
            signal,
            primary: storage.primary,
            durable: storage.durable,
            remotes: storage
                .remotes
                .into_iter()
                .map(|backend| RemoteTarget {
                    backend,
                    written: Arc::new(Mutex::new(0)),
                })
                .collect(),
            backups: storage.backups,
            debounce: storage.debounce,
            remote_timeout: storage.remote_timeout,
            pending_pushes: Mutex::new(Vec::new()),
            generation: AtomicU64::new(0),
            completed_saves: AtomicU64::new(0),
        });

        let worker = tokio::spawn(Arc::clone(&inner).run_worker());

        let timer_signal = inner.signal.clone();
        let timer = tokio::spawn(async move {
            let mut interval = tokio::time::interval(save_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                tracing::debug!("Periodic save");
                timer_signal.request();
            }
        });

        tracing::info!(
            primary = %inner.primary.path().display(),
            durable = inner.durable.is_some(),
            remotes = inner.remotes.len(),
            "Persistence coordinator started"
        );

        Self {
            inner,
            worker: Mutex::new(Some(worker)),
            timer: Mutex::new(Some(timer)),
            closed: AtomicBool::new(false),
        }
    }

    /// Schedule a save; never blocks
    pub fn request_save(&self) {
        self.inner.signal.request();
    }

    /// Current scheduler state
    pub fn state(&self) -> SaveState {
        self.inner.signal.state()
    }

    /// Number of saves the worker has finished
    pub fn completed_saves(&self) -> u64 {
        self.inner.completed_saves.load(Ordering::SeqCst)
    }

    /// Wait until no save is scheduled or running
    pub async fn flush(&self) {
        self.inner.signal.wait_idle().await;
    }

    /// Blocking temp-write + rename of the primary file, bypassing the worker.
    pub fn save_sync(&self, snapshot: &MemorySnapshot) -> Result<()> {
        let data = snapshot.to_bytes()?;
        write_atomic_sync(self.inner.primary.path(), &data)
            .map_err(|e| Error::Persistence(e.to_string()))
    }

    /// Flush everything and release backends.
    ///
    /// Order: pending save, final async save, `save_sync`, remote pushes
    /// (bounded), backend close, worker stop. Calling it twice is a no-op.
    pub async fn shutdown(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::info!("Flushing memory before shutdown");

        if let Some(timer) = self.timer.lock().await.take() {
            timer.abort();
        }

        self.flush().await;
        self.request_save();
        self.flush().await;

        let snapshot = self.inner.store.read().await.snapshot();
        let sync_result = self.save_sync(&snapshot);
        if let Err(e) = &sync_result {
            tracing::error!(error = %e, "Final synchronous save failed");
        }

        self.inner.drain_remote_pushes().await;

        let closes = self.inner.remotes.iter().map(|target| {
            let backend = Arc::clone(&target.backend);
            async move { (backend.name().to_string(), backend.close().await) }
        });
        for (name, result) in futures::future::join_all(closes).await {
            if let Err(e) = result {
                tracing::warn!(backend = %name, error = %e, "Failed to close backend");
            }
        }

        if let Some(worker) = self.worker.lock().await.take() {
            worker.abort();
        }

        tracing::info!(saves = self.completed_saves(), "Persistence shut down");
        sync_result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LearningConfig;
    use crate::learning::{LearnSource, PatternStore};
    use async_trait::async_trait;
    use tempfile::TempDir;
    use tokio::sync::RwLock;

    fn storage_config(dir: &TempDir) -> StorageConfig {
        StorageConfig {
            primary_path: dir.path().join("memory.json"),
            durable_path: Some(dir.path().join("durable").join("memory.json")),
            backup_dir: Some(dir.path().join("backups")),
            backup_retention: 2,
            save_interval_secs: 3600,
            debounce_ms: 30,
            sync_after_learn: false,
        }
    }

    fn start(storage: StorageSet) -> (SharedStore, PersistenceCoordinator) {
        let signal = SaveSignal::new();
        let mut store = PatternStore::new(LearningConfig::default());
        store.attach_save_signal(signal.clone());
        let shared: SharedStore = Arc::new(RwLock::new(store));
        let coordinator = PersistenceCoordinator::start(storage, Arc::clone(&shared), signal);
        (shared, coordinator)
    }

    fn read_snapshot(path: &std::path::Path) -> MemorySnapshot {
        MemorySnapshot::from_slice(&std::fs::read(path).unwrap()).unwrap()
    }

    async fn learn(store: &SharedStore, input: &str, response: &str) {
        store
            .write()
            .await
            .learn_pattern(input, response, 70, LearnSource::Training)
            .unwrap();
    }

    /// Remote that never answers in time
    struct HangingBackend;

    #[async_trait]
    impl SnapshotBackend for HangingBackend {
        fn name(&self) -> &str {
            "hanging"
        }
        async fn load(&self) -> Result<Option<Bytes>> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(None)
        }
        async fn save(&self, _data: Bytes) -> Result<()> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }
    }

    /// Remote that records every blob it accepts
    #[derive(Default)]
    struct RecordingBackend {
        saved: std::sync::Mutex<Vec<Bytes>>,
        closed: AtomicBool,
    }

    #[async_trait]
    impl SnapshotBackend for RecordingBackend {
        fn name(&self) -> &str {
            "recording"
        }
        async fn load(&self) -> Result<Option<Bytes>> {
            Ok(self.saved.lock().unwrap().last().cloned())
        }
        async fn save(&self, data: Bytes) -> Result<()> {
            self.saved.lock().unwrap().push(data);
            Ok(())
        }
        async fn close(&self) -> Result<()> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_signal_transitions() {
        let signal = SaveSignal::new();
        assert_eq!(signal.state(), SaveState::Idle);

        signal.request();
        signal.request();
        assert_eq!(signal.state(), SaveState::Scheduled);

        signal.begin_save();
        assert_eq!(signal.state(), SaveState::Saving);
        assert!(signal.finish_save());
        assert_eq!(signal.state(), SaveState::Idle);

        // A request during a save forces another round
        signal.request();
        signal.begin_save();
        signal.request();
        assert!(!signal.finish_save());
        assert_eq!(signal.state(), SaveState::Scheduled);
    }

    #[tokio::test]
    async fn test_requests_coalesce_into_one_save() {
        let dir = TempDir::new().unwrap();
        let (store, coordinator) = start(StorageSet::new(&storage_config(&dir), Duration::from_secs(1)));

        for i in 0..10 {
            learn(&store, &format!("topic number {i}"), "noted").await;
        }
        coordinator.flush().await;

        assert_eq!(coordinator.completed_saves(), 1);
        assert_eq!(coordinator.state(), SaveState::Idle);
        let saved = read_snapshot(&dir.path().join("memory.json"));
        assert_eq!(saved.stats.training_data_points, 10);
    }

    #[tokio::test]
    async fn test_request_during_save_runs_again() {
        let dir = TempDir::new().unwrap();
        let (store, coordinator) = start(StorageSet::new(&storage_config(&dir), Duration::from_secs(1)));

        // Holding the write lock parks the worker inside its save
        let mut guard = store.write().await;
        guard
            .learn_pattern("first topic", "one", 70, LearnSource::Training)
            .unwrap();
        let wait = async {
            while coordinator.state() != SaveState::Saving {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        tokio::time::timeout(Duration::from_secs(5), wait).await.unwrap();

        guard
            .learn_pattern("second topic", "two", 70, LearnSource::Training)
            .unwrap();
        assert_eq!(coordinator.state(), SaveState::Scheduled);
        drop(guard);

        coordinator.flush().await;
        assert_eq!(coordinator.completed_saves(), 2);
        let saved = read_snapshot(&dir.path().join("memory.json"));
        assert_eq!(saved.stats.training_data_points, 2);
    }

    #[tokio::test]
    async fn test_three_learns_then_shutdown_persist_all() {
        let dir = TempDir::new().unwrap();
        let mut config = storage_config(&dir);
        config.debounce_ms = 200;
        let (store, coordinator) = start(StorageSet::new(&config, Duration::from_secs(1)));

        learn(&store, "favorite color", "blue").await;
        learn(&store, "favorite food", "ramen").await;
        learn(&store, "favorite song", "yesterday").await;
        assert!(coordinator.state() != SaveState::Idle);

        tokio::time::timeout(Duration::from_secs(30), coordinator.shutdown())
            .await
            .unwrap()
            .unwrap();

        let saved = read_snapshot(&dir.path().join("memory.json"));
        assert_eq!(saved.stats.training_data_points, 3);
        for input in ["favorite color", "favorite food", "favorite song"] {
            assert!(saved.context_pairs.iter().any(|e| e.input == input), "{input}");
        }
        let durable = read_snapshot(&dir.path().join("durable").join("memory.json"));
        assert_eq!(durable.stats.training_data_points, 3);
    }

    #[tokio::test]
    async fn test_hanging_remote_does_not_block_primary() {
        let dir = TempDir::new().unwrap();
        let storage = StorageSet::new(&storage_config(&dir), Duration::from_millis(100))
            .with_remote(Arc::new(HangingBackend));
        let (store, coordinator) = start(storage);

        learn(&store, "weather today", "sunny").await;
        tokio::time::timeout(Duration::from_secs(2), coordinator.flush())
            .await
            .unwrap();
        assert!(dir.path().join("memory.json").exists());

        tokio::time::timeout(Duration::from_secs(5), coordinator.shutdown())
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_remote_receives_latest_and_is_closed() {
        let dir = TempDir::new().unwrap();
        let remote = Arc::new(RecordingBackend::default());
        let storage = StorageSet::new(&storage_config(&dir), Duration::from_secs(1))
            .with_remote(Arc::clone(&remote) as Arc<dyn SnapshotBackend>);
        let (store, coordinator) = start(storage);

        learn(&store, "weather today", "sunny").await;
        learn(&store, "weather tomorrow", "rainy").await;
        coordinator.shutdown().await.unwrap();

        let latest = remote.load().await.unwrap().unwrap();
        let snapshot = MemorySnapshot::from_slice(&latest).unwrap();
        assert_eq!(snapshot.stats.training_data_points, 2);
        assert!(remote.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_backups_are_rotated() {
        let dir = TempDir::new().unwrap();
        let (store, coordinator) = start(StorageSet::new(&storage_config(&dir), Duration::from_secs(1)));

        for i in 0..4 {
            learn(&store, &format!("round {i} topic"), "ok").await;
            coordinator.flush().await;
        }
        assert_eq!(coordinator.completed_saves(), 4);

        let backups = BackupRotation::new(dir.path().join("backups"), 2).list().await.unwrap();
        assert_eq!(backups.len(), 2);
        assert_eq!(read_snapshot(&backups[1]).stats.training_data_points, 4);
    }

    #[tokio::test]
    async fn test_save_sync_writes_primary() {
        let dir = TempDir::new().unwrap();
        let (store, coordinator) = start(StorageSet::new(&storage_config(&dir), Duration::from_secs(1)));
        learn(&store, "quick question", "quick answer").await;

        let snapshot = store.read().await.snapshot();
        coordinator.save_sync(&snapshot).unwrap();
        assert_eq!(read_snapshot(&dir.path().join("memory.json")), snapshot);
        coordinator.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_load_prefers_primary() {
        let dir = TempDir::new().unwrap();
        let config = storage_config(&dir);
        let mut primary = MemorySnapshot::default();
        primary.stats.total_messages = 1;
        let mut durable = MemorySnapshot::default();
        durable.stats.total_messages = 2;
        write_atomic_sync(&config.primary_path, &primary.to_bytes().unwrap()).unwrap();
        write_atomic_sync(config.durable_path.as_ref().unwrap(), &durable.to_bytes().unwrap())
            .unwrap();

        let loaded = StorageSet::new(&config, Duration::from_secs(1)).load().await;
        assert_eq!(loaded.source.as_deref(), Some("primary"));
        assert_eq!(loaded.snapshot.stats.total_messages, 1);
    }

    #[tokio::test]
    async fn test_load_falls_back_to_durable_mirror() {
        let dir = TempDir::new().unwrap();
        let config = storage_config(&dir);
        std::fs::write(&config.primary_path, b"{ truncated").unwrap();
        let mut durable = MemorySnapshot::default();
        durable.stats.total_conversations = 7;
        write_atomic_sync(config.durable_path.as_ref().unwrap(), &durable.to_bytes().unwrap())
            .unwrap();

        let loaded = StorageSet::new(&config, Duration::from_secs(1)).load().await;
        assert_eq!(loaded.source.as_deref(), Some("durable"));
        assert_eq!(loaded.snapshot.stats.total_conversations, 7);
    }

    #[tokio::test]
    async fn test_corrupt_everywhere_loads_defaults() {
        let dir = TempDir::new().unwrap();
        let config = storage_config(&dir);
        std::fs::write(&config.primary_path, br#"{"contextPairs": 3, "semanticClusters": {}}"#)
            .unwrap();

        let storage = StorageSet::new(&config, Duration::from_millis(50))
            .with_remote(Arc::new(HangingBackend));
        let loaded = storage.load().await;
        assert!(loaded.source.is_none());
        assert_eq!(loaded.snapshot, MemorySnapshot::default());
    }

    #[test]
    fn test_backend_names_in_load_order() {
        let dir = TempDir::new().unwrap();
        let storage = StorageSet::new(&storage_config(&dir), Duration::from_secs(1))
            .with_remote(Arc::new(RecordingBackend::default()));
        assert_eq!(storage.backend_names(), vec!["primary", "durable", "recording"]);
    }
}
