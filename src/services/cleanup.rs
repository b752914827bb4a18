//! Automatic deletion of produced audio files after a fixed lifetime.
//!
//! `CleanupService` is the registry of every file handed out to clients,
//! keyed by path with a fixed expiry instant per entry. A background
//! reclamation task sweeps the registry on a fixed interval and removes the
//! files the sweep returns from disk. The entry map and the running marker
//! share a single lock so start/stop can never race an in-flight sweep.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Lifecycle settings for the cleanup service.
#[derive(Debug, Clone)]
pub struct CleanupConfig {
    /// How long a registered file lives before it is eligible for deletion.
    pub file_ttl: Duration,
    /// How often the reclamation loop sweeps for expired entries.
    pub sweep_interval: Duration,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            file_ttl: Duration::from_secs(60 * 60),
            sweep_interval: Duration::from_secs(5 * 60),
        }
    }
}

/// A registered file and the instant it becomes eligible for deletion.
#[derive(Debug, Clone)]
struct FileEntry {
    path: PathBuf,
    expires_at: Instant,
}

/// Registry entries and the running marker, guarded together. Splitting
/// these behind separate locks would let start/stop race a sweep.
struct Inner {
    files: HashMap<PathBuf, FileEntry>,
    /// `Some` while a reclamation loop is running; cancelling the token
    /// terminates the loop.
    reclaimer: Option<CancellationToken>,
}

/// Tracks produced files and deletes them once their lifetime elapses.
///
/// All operations are safe to call concurrently from request handlers and
/// the reclamation loop. No lock is held across an await point.
pub struct CleanupService {
    inner: RwLock<Inner>,
    config: CleanupConfig,
}

impl CleanupService {
    pub fn new(config: CleanupConfig) -> Self {
        Self {
            inner: RwLock::new(Inner {
                files: HashMap::new(),
                reclaimer: None,
            }),
            config,
        }
    }

    /// Register a file for automatic deletion once its lifetime elapses.
    /// Re-registering a path overwrites the entry and resets its expiry.
    pub fn register(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        let entry = FileEntry {
            path: path.clone(),
            expires_at: Instant::now() + self.config.file_ttl,
        };
        self.inner.write().files.insert(path.clone(), entry);
        info!(
            path = %path.display(),
            ttl = ?self.config.file_ttl,
            "Registered file for deletion"
        );
    }

    /// Remove a path from the registry without touching the file on disk.
    /// No-op if the path was never registered.
    pub fn unregister(&self, path: &Path) {
        if self.inner.write().files.remove(path).is_some() {
            debug!(path = %path.display(), "Unregistered file from cleanup");
        }
    }

    /// Snapshot of all currently registered paths, in no particular order.
    pub fn list(&self) -> Vec<PathBuf> {
        self.inner.read().files.keys().cloned().collect()
    }

    /// Number of currently registered entries.
    pub fn count(&self) -> usize {
        self.inner.read().files.len()
    }

    /// Atomically remove and return every entry whose expiry is at or
    /// before `now`. The caller owns deleting the returned paths; an entry
    /// is never reported by two sweeps.
    pub fn sweep(&self, now: Instant) -> Vec<PathBuf> {
        let mut inner = self.inner.write();
        let expired: Vec<PathBuf> = inner
            .files
            .values()
            .filter(|entry| entry.expires_at <= now)
            .map(|entry| entry.path.clone())
            .collect();
        for path in &expired {
            inner.files.remove(path);
        }
        expired
    }

    /// Whether the reclamation loop is currently running.
    pub fn is_running(&self) -> bool {
        self.inner.read().reclaimer.is_some()
    }

    /// Start the reclamation loop in a background task. No-op if it is
    /// already running; never blocks the caller.
    pub fn start(self: &Arc<Self>) {
        let cancel = {
            let mut inner = self.inner.write();
            if inner.reclaimer.is_some() {
                return;
            }
            let cancel = CancellationToken::new();
            inner.reclaimer = Some(cancel.clone());
            cancel
        };

        let service = Arc::clone(self);
        tokio::spawn(async move { service.reclaim_loop(cancel).await });
        info!(
            ttl = ?self.config.file_ttl,
            interval = ?self.config.sweep_interval,
            "Cleanup service started"
        );
    }

    /// Signal the reclamation loop to exit. No-op if it is not running.
    /// A sweep already in progress completes first; `start` may be called
    /// again afterwards to launch a fresh loop.
    pub fn stop(&self) {
        let Some(cancel) = self.inner.write().reclaimer.take() else {
            return;
        };
        cancel.cancel();
        info!("Cleanup service stopped");
    }

    /// One reclamation pass: sweep expired entries and delete their files.
    /// A failed deletion is logged and skipped; the entry stays removed
    /// either way.
    pub async fn run_reclamation_pass(&self) {
        let expired = self.sweep(Instant::now());
        for path in expired {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => info!(path = %path.display(), "Deleted expired file"),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to delete expired file");
                }
            }
        }
    }

    async fn reclaim_loop(self: Arc<Self>, cancel: CancellationToken) {
        let period = self.config.sweep_interval;
        // First pass runs one full period after start; a pending stop wins
        // over a due tick.
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.run_reclamation_pass().await,
            }
        }
        debug!("Reclamation loop exited");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MINUTE: Duration = Duration::from_secs(60);

    fn service() -> CleanupService {
        CleanupService::new(CleanupConfig::default())
    }

    #[test]
    fn count_and_list_track_registrations() {
        let service = service();
        for i in 0..5 {
            service.register(format!("/tmp/file-{i}.mp3"));
        }
        assert_eq!(service.count(), 5);
        let listed = service.list();
        assert_eq!(listed.len(), 5);
        assert!(listed.contains(&PathBuf::from("/tmp/file-3.mp3")));
    }

    #[test]
    fn unregister_removes_exactly_the_named_path() {
        let service = service();
        service.register("/tmp/a.mp3");
        service.register("/tmp/b.mp3");
        service.unregister(Path::new("/tmp/a.mp3"));
        assert_eq!(service.list(), vec![PathBuf::from("/tmp/b.mp3")]);

        // absent path is a no-op
        service.unregister(Path::new("/tmp/a.mp3"));
        assert_eq!(service.count(), 1);
    }

    #[test]
    fn reregistration_keeps_a_single_entry() {
        let service = service();
        service.register("/tmp/track.mp3");
        service.register("/tmp/track.mp3");
        assert_eq!(service.count(), 1);
    }

    #[test]
    fn sweep_respects_the_file_lifetime() {
        let service = service();
        let t0 = Instant::now();
        service.register("/tmp/track.mp3");

        assert!(service.sweep(t0 + 59 * MINUTE).is_empty());
        assert_eq!(service.count(), 1);

        let swept = service.sweep(t0 + 61 * MINUTE);
        assert_eq!(swept, vec![PathBuf::from("/tmp/track.mp3")]);
        assert_eq!(service.count(), 0);
    }

    #[test]
    fn sweep_never_reports_a_path_twice() {
        let service = service();
        let t0 = Instant::now();
        service.register("/tmp/track.mp3");

        assert_eq!(service.sweep(t0 + 61 * MINUTE).len(), 1);
        assert!(service.sweep(t0 + 120 * MINUTE).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn reregistration_resets_expiry() {
        let service = service();
        let t0 = Instant::now();
        service.register("/tmp/track.mp3");

        tokio::time::sleep(30 * MINUTE).await;
        service.register("/tmp/track.mp3");
        assert_eq!(service.count(), 1);

        // 61 minutes after the first registration, 31 after the second
        assert!(service.sweep(t0 + 61 * MINUTE).is_empty());
        // 91 minutes after the first registration
        let swept = service.sweep(t0 + 91 * MINUTE);
        assert_eq!(swept, vec![PathBuf::from("/tmp/track.mp3")]);
    }

    #[tokio::test]
    async fn start_and_stop_are_idempotent() {
        let service = Arc::new(service());
        assert!(!service.is_running());

        service.start();
        service.start();
        assert!(service.is_running());

        service.stop();
        service.stop();
        assert!(!service.is_running());

        // a fresh loop can be started after a stop
        service.start();
        assert!(service.is_running());
        service.stop();
    }

    #[tokio::test]
    async fn reclamation_pass_isolates_deletion_failures() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.mp3");
        let c = dir.path().join("c.mp3");
        std::fs::write(&a, b"a").unwrap();
        std::fs::write(&c, b"c").unwrap();
        let missing = dir.path().join("missing.mp3");

        let service = CleanupService::new(CleanupConfig {
            file_ttl: Duration::ZERO,
            ..Default::default()
        });
        service.register(&a);
        service.register(&missing);
        service.register(&c);

        service.run_reclamation_pass().await;

        // the unremovable path is dropped from the registry like the others
        assert_eq!(service.count(), 0);
        assert!(!a.exists());
        assert!(!c.exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_registration_stays_consistent() {
        let service = Arc::new(service());
        let mut handles = Vec::new();
        for task in 0..8 {
            let service = Arc::clone(&service);
            handles.push(tokio::spawn(async move {
                for i in 0..50 {
                    service.register(format!("/tmp/reg-{task}-{i}.mp3"));
                    // interleave reads and sweeps with the writers
                    let _ = service.count();
                    let _ = service.sweep(Instant::now());
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // nothing expired, nothing lost
        assert_eq!(service.count(), 8 * 50);
        assert_eq!(service.list().len(), 8 * 50);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn running_loop_deletes_expired_files() {
        let dir = tempfile::tempdir().unwrap();
        let track = dir.path().join("track.mp3");
        std::fs::write(&track, b"mp3").unwrap();

        let service = Arc::new(CleanupService::new(CleanupConfig {
            file_ttl: Duration::from_millis(50),
            sweep_interval: Duration::from_millis(20),
        }));
        service.register(&track);
        service.start();

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while track.exists() && std::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert!(!track.exists(), "expired file should have been deleted");
        assert_eq!(service.count(), 0);
        service.stop();
    }

    #[tokio::test]
    async fn stop_halts_reclamation() {
        let dir = tempfile::tempdir().unwrap();
        let track = dir.path().join("track.mp3");
        std::fs::write(&track, b"mp3").unwrap();

        let service = Arc::new(CleanupService::new(CleanupConfig {
            file_ttl: Duration::from_millis(10),
            sweep_interval: Duration::from_millis(20),
        }));
        service.register(&track);
        service.start();
        service.stop();

        tokio::time::sleep(Duration::from_millis(100)).await;

        // the loop exited before its first tick; nothing was swept
        assert!(track.exists());
        assert_eq!(service.count(), 1);
    }
}
