use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::errors::AppError;
use crate::storage::FallbackStore;
use crate::utils::datetime::now_millis;

/// Background loop that polls for due capsules and flips them to unlocked.
/// One instance runs for the lifetime of the process, independent of request
/// handling; it shares nothing with the workers beyond the store.
pub struct UnlockScheduler {
    store: Arc<FallbackStore>,
    interval: Duration,
}

/// Owner handle for a spawned scheduler. Dropping it (or calling `stop`)
/// signals the loop to exit; the server keeps it alive for the process
/// lifetime, tests use it to shut down deterministically.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

impl UnlockScheduler {
    pub fn new(store: Arc<FallbackStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown, rx) = watch::channel(false);
        let task = tokio::spawn(self.run(rx));
        SchedulerHandle { shutdown, task }
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!("unlock scheduler started, polling every {:?}", self.interval);
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // A failed cycle is logged and the loop carries on.
                    if let Err(e) = self.run_cycle(now_millis()).await {
                        error!("unlock cycle failed: {}", e);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("unlock scheduler shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// One polling cycle against the given clock reading. Public so tests
    /// drive cycles with a fixed `now` instead of sleeping.
    pub async fn run_cycle(&self, now_ts: i64) -> Result<(), AppError> {
        let due = self.store.due_capsules(now_ts).await?;
        for capsule in due {
            // One capsule failing must not abort the rest of the cycle.
            match self.store.unlock_capsule(capsule.id).await {
                Ok(Some(_)) => info!("unlocked capsule {} ({})", capsule.id, capsule.title),
                Ok(None) => warn!("due capsule {} disappeared before unlock", capsule.id),
                Err(e) => error!("failed to unlock capsule {}: {}", capsule.id, e),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::local::LocalBackend;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> Arc<FallbackStore> {
        Arc::new(FallbackStore::new(
            None,
            LocalBackend::new(dir.path().join("local_db.json"), dir.path().join("uploads")),
        ))
    }

    #[tokio::test]
    async fn cycle_unlocks_exactly_the_due_set() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let due = store
            .insert_capsule("past", "alice@example.com", 1_000, "")
            .await
            .unwrap();
        let pending = store
            .insert_capsule("future", "alice@example.com", 9_000_000, "")
            .await
            .unwrap();

        let scheduler = UnlockScheduler::new(store.clone(), Duration::from_secs(60));
        scheduler.run_cycle(5_000).await.unwrap();

        let (unlocked, _) = store.get_capsule(due.id).await.unwrap().unwrap();
        assert!(unlocked.is_unlocked);
        let (untouched, _) = store.get_capsule(pending.id).await.unwrap().unwrap();
        assert!(!untouched.is_unlocked);

        assert!(store.due_capsules(5_000).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cycle_with_nothing_due_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let scheduler = UnlockScheduler::new(store, Duration::from_secs(60));
        scheduler.run_cycle(now_millis()).await.unwrap();
    }

    #[tokio::test]
    async fn repeated_cycles_stay_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let capsule = store
            .insert_capsule("past", "alice@example.com", 1_000, "")
            .await
            .unwrap();

        let scheduler = UnlockScheduler::new(store.clone(), Duration::from_secs(60));
        scheduler.run_cycle(5_000).await.unwrap();
        scheduler.run_cycle(6_000).await.unwrap();

        let (read, _) = store.get_capsule(capsule.id).await.unwrap().unwrap();
        assert!(read.is_unlocked);
    }

    #[tokio::test]
    async fn corrupt_store_fails_the_cycle_without_panicking() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("local_db.json"), "{not json").unwrap();
        let scheduler = UnlockScheduler::new(store(&dir), Duration::from_secs(60));
        assert!(scheduler.run_cycle(5_000).await.is_err());
    }

    #[tokio::test]
    async fn spawned_scheduler_stops_on_signal() {
        let dir = TempDir::new().unwrap();
        let scheduler = UnlockScheduler::new(store(&dir), Duration::from_millis(10));
        let handle = scheduler.spawn();
        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.stop().await;
    }
}
