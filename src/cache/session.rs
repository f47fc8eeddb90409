//! Session-scoped disk tile store with deferred cleanup.
//!
//! Clearing the cache does not delete anything synchronously. The current
//! generation id is retired and a fresh one takes its place, so reads and
//! writes move to an empty namespace immediately. A background worker owned
//! by the store deletes retired generations on a fixed interval.
//!
//! # Worker Lifecycle
//!
//! ```text
//!   SessionFileTileStore                      cleanup worker
//!   ────────────────────                      ──────────────
//!   clear() ── push old id ──▶ retired ids ◀── sweep (drain + delete)
//!                                              wait(interval | command)
//!   sweep_now() ──── Sweep(reply) ─────────▶  sweep, reply with count
//!   shutdown()/drop ─ retire current id,
//!                     Shutdown ────────────▶  final sweep, exit
//! ```
//!
//! Directory deletion failures are logged and never stop the worker.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::file::{is_cache_tree, FileStoreConfig, FileTileStore};
use super::TileStore;
use crate::error::CacheError;
use crate::tile::{PixelBuffer, TileKey};

/// Default wait between cleanup sweeps (10 minutes).
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_millis(600_000);

const WORKER_THREAD_NAME: &str = "geotile-cleanup";

enum CleanupCommand {
    /// Sweep now and report how many generations were deleted
    Sweep(Sender<usize>),
    Shutdown,
}

/// Disk tile store whose `clear` swaps to a new generation.
///
/// The configured `cache_id` is replaced by a freshly generated generation
/// id, so every store instance starts in its own namespace.
///
/// # Example
///
/// ```no_run
/// use geotile_cache::cache::{FileStoreConfig, SessionFileTileStore, TileStore};
/// use geotile_cache::tile::{PixelBuffer, TileKey};
///
/// let store = SessionFileTileStore::new(FileStoreConfig::new("/tmp/tiles", "session")).unwrap();
/// let key = TileKey::new(1000.0, 0, 0);
/// store.put(&key, PixelBuffer::filled(256, 256, [0, 0, 0, 255])).unwrap();
///
/// store.clear().unwrap();
/// assert!(store.get(&key).is_none());
/// assert_eq!(store.sweep_now(), 1);
/// ```
pub struct SessionFileTileStore {
    current: RwLock<FileTileStore>,
    retired: Arc<Mutex<Vec<String>>>,
    commands: Mutex<Option<Sender<CleanupCommand>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    cleanup_interval: Duration,
}

impl SessionFileTileStore {
    /// Create a store sweeping every [`DEFAULT_CLEANUP_INTERVAL`].
    pub fn new(config: FileStoreConfig) -> Result<Self, CacheError> {
        Self::with_cleanup_interval(config, DEFAULT_CLEANUP_INTERVAL)
    }

    /// Create a store sweeping every `cleanup_interval`.
    ///
    /// # Errors
    ///
    /// Returns an error if the cleanup worker thread cannot be spawned.
    pub fn with_cleanup_interval(
        mut config: FileStoreConfig,
        cleanup_interval: Duration,
    ) -> Result<Self, CacheError> {
        config.cache_id = new_generation_id();
        let cache_directory = config.cache_directory.clone();
        let retired = Arc::new(Mutex::new(Vec::new()));
        let (sender, receiver) = mpsc::channel();

        let worker = {
            let retired = Arc::clone(&retired);
            let directory = cache_directory.clone();
            thread::Builder::new()
                .name(WORKER_THREAD_NAME.to_string())
                .spawn(move || run_cleanup(directory, retired, receiver, cleanup_interval))
                .map_err(|e| CacheError::io(&cache_directory, e))?
        };

        debug!(
            "Started session cache {} in {}",
            config.cache_id,
            cache_directory.display()
        );

        Ok(Self {
            current: RwLock::new(FileTileStore::new(config)),
            retired,
            commands: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
            cleanup_interval,
        })
    }

    fn current(&self) -> RwLockReadGuard<'_, FileTileStore> {
        self.current.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Generation id that reads and writes currently go to.
    pub fn generation(&self) -> String {
        self.current().cache_id().to_string()
    }

    pub fn cache_directory(&self) -> PathBuf {
        self.current().cache_directory().to_path_buf()
    }

    /// Directory of the current generation.
    pub fn cache_root(&self) -> PathBuf {
        self.current().cache_root()
    }

    pub fn cleanup_interval(&self) -> Duration {
        self.cleanup_interval
    }

    /// Number of retired generations not yet swept.
    pub fn pending_generations(&self) -> usize {
        self.retired.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Sweep retired generations now and wait for the result.
    ///
    /// Falls back to sweeping on the calling thread once the worker is gone.
    /// Returns the number of generation directories deleted.
    pub fn sweep_now(&self) -> usize {
        let (reply, response) = mpsc::channel();
        let sent = self
            .commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|sender| sender.send(CleanupCommand::Sweep(reply)).is_ok());

        if sent {
            if let Ok(removed) = response.recv() {
                return removed;
            }
        }
        sweep_retired(&self.cache_directory(), &self.retired)
    }

    /// Retire the current generation and stop the worker after a final
    /// sweep that deletes it. Idempotent.
    ///
    /// Tiles written after shutdown are not cleaned up.
    pub fn shutdown(&self) {
        let sender = self
            .commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(sender) = sender {
            let generation = self.generation();
            debug!("Retiring final generation {}", generation);
            self.retired
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(generation);
            let _ = sender.send(CleanupCommand::Shutdown);
        }

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            if worker.join().is_err() {
                warn!("Session cache cleanup worker panicked");
            }
        }

        if self.pending_generations() > 0 {
            sweep_retired(&self.cache_directory(), &self.retired);
        }
    }
}

impl Drop for SessionFileTileStore {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl TileStore for SessionFileTileStore {
    fn get(&self, key: &TileKey) -> Option<PixelBuffer> {
        self.current().get(key)
    }

    fn put(&self, key: &TileKey, pixels: PixelBuffer) -> Result<(), CacheError> {
        self.current().put(key, pixels)
    }

    fn remove(&self, key: &TileKey) -> Result<(), CacheError> {
        self.current().remove(key)
    }

    /// Retire the current generation and switch to a fresh one.
    fn clear(&self) -> Result<(), CacheError> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let next = new_generation_id();
        let retired = current.cache_id().to_string();
        current.set_cache_id(next);

        debug!("Retired generation {} for {}", retired, current.cache_id());
        self.retired
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(retired);
        Ok(())
    }

    fn cached_scales(&self) -> Vec<f64> {
        self.current().cached_scales()
    }
}

// =============================================================================
// Cleanup Worker
// =============================================================================

fn new_generation_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn run_cleanup(
    directory: PathBuf,
    retired: Arc<Mutex<Vec<String>>>,
    commands: Receiver<CleanupCommand>,
    interval: Duration,
) {
    let mut reply: Option<Sender<usize>> = None;
    loop {
        let removed = sweep_retired(&directory, &retired);
        if let Some(reply) = reply.take() {
            let _ = reply.send(removed);
        }

        match commands.recv_timeout(interval) {
            Ok(CleanupCommand::Sweep(next)) => reply = Some(next),
            Err(RecvTimeoutError::Timeout) => {}
            Ok(CleanupCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => {
                sweep_retired(&directory, &retired);
                debug!("Session cache cleanup worker stopped");
                return;
            }
        }
    }
}

/// Delete every retired generation under `directory`.
///
/// The retired list is drained up front; a generation that fails to delete
/// is logged and not retried.
fn sweep_retired(directory: &Path, retired: &Mutex<Vec<String>>) -> usize {
    let generations: Vec<String> = retired
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .drain(..)
        .collect();
    if generations.is_empty() {
        return 0;
    }

    let mut removed = 0;
    for generation in &generations {
        let path = directory.join(generation);
        if !path.exists() {
            continue;
        }
        match is_cache_tree(&path) {
            Ok(true) => {}
            Ok(false) => {
                warn!(
                    "Skipping cleanup of {}: it contains entries that are not scale directories",
                    path.display()
                );
                continue;
            }
            Err(e) => {
                warn!("Failed to inspect {}: {}", path.display(), e);
                continue;
            }
        }
        match fs::remove_dir_all(&path) {
            Ok(()) => removed += 1,
            Err(e) => warn!("Failed to delete {}: {}", path.display(), e),
        }
    }

    info!(
        "Swept {} of {} retired cache generations in {}",
        removed,
        generations.len(),
        directory.display()
    );
    removed
}

// =============================================================================
// Tests
// =============================================================================
