use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::lifecycle::signal::{bridge_os_signals, ShutdownSignal};
use crate::lifecycle::startup::StartupInfo;

/// Coordinates cooperative shutdown of the listeners sharing the store.
///
/// - `cancel` broadcasts shutdown once; later calls are no-ops
/// - `add` returns a [`WorkerGuard`]; dropping it is the matching `done`
/// - `wait` blocks until every guard is dropped
pub struct Lifecycle {
    shutdown: watch::Sender<bool>,
    workers: Arc<watch::Sender<usize>>,
    handles: Mutex<Vec<(String, JoinHandle<()>)>>,
    startup: Mutex<Option<StartupInfo>>,
    fatal: Mutex<Option<String>>,
}

/// Membership in the join-group, released exactly once on drop.
#[derive(Debug)]
pub struct WorkerGuard {
    workers: Arc<watch::Sender<usize>>,
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        self.workers.send_modify(|n| *n = n.saturating_sub(1));
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        let (workers, _) = watch::channel(0usize);
        Self {
            shutdown,
            workers: Arc::new(workers),
            handles: Mutex::new(Vec::new()),
            startup: Mutex::new(None),
            fatal: Mutex::new(None),
        }
    }

    /// Coordinator that also cancels on SIGINT / SIGTERM.
    pub fn with_os_signals() -> Result<Arc<Self>> {
        let lifecycle = Arc::new(Self::new());
        bridge_os_signals(lifecycle.clone())?;
        Ok(lifecycle)
    }

    pub fn add(&self) -> WorkerGuard {
        self.workers.send_modify(|n| *n += 1);
        WorkerGuard {
            workers: self.workers.clone(),
        }
    }

    pub fn quit(&self) -> ShutdownSignal {
        ShutdownSignal::new(self.shutdown.subscribe())
    }

    pub fn is_cancelled(&self) -> bool {
        *self.shutdown.borrow()
    }

    pub fn cancel(&self) {
        let first = self.shutdown.send_if_modified(|cancelled| {
            if *cancelled {
                false
            } else {
                *cancelled = true;
                true
            }
        });
        if first {
            info!("Shutdown Server ...");
        }
    }

    /// Records a fatal condition and shuts the whole process down.
    pub fn fail(&self, reason: impl Into<String>) {
        let reason = reason.into();
        error!("fatal: {}", reason);
        lock(&self.fatal).get_or_insert(reason);
        self.cancel();
    }

    /// First fatal reason recorded, if any.
    pub fn fatal(&self) -> Option<String> {
        lock(&self.fatal).clone()
    }

    pub fn active_workers(&self) -> usize {
        *self.workers.borrow()
    }

    /// Resolves once the join-group is empty.
    pub async fn wait(&self) {
        let mut rx = self.workers.subscribe();
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    /// Waits for the join-group, then reaps every spawned task.
    pub async fn join(&self) {
        self.wait().await;
        let handles = std::mem::take(&mut *lock(&self.handles));
        for (name, handle) in handles {
            if let Err(err) = handle.await {
                error!(worker = %name, "worker aborted: {}", err);
            }
        }
        info!("Server exiting");
    }

    /// Runs `worker` as a member of the join-group.
    ///
    /// The worker gets its own shutdown signal. An `Err` from the worker is
    /// fatal to the process.
    pub fn spawn<F, Fut>(self: &Arc<Self>, name: &str, worker: F)
    where
        F: FnOnce(ShutdownSignal) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let guard = self.add();
        let task = worker(self.quit());
        let lifecycle = self.clone();
        let worker_name = name.to_owned();

        let handle = tokio::spawn(async move {
            let _guard = guard;
            match task.await {
                Ok(()) => info!(worker = %worker_name, "worker stopped"),
                Err(err) => lifecycle.fail(format!("{}: {:#}", worker_name, err)),
            }
        });
        lock(&self.handles).push((name.to_owned(), handle));
    }

    pub fn set(&self, info: StartupInfo) {
        *lock(&self.startup) = Some(info);
    }

    pub fn get(&self) -> Option<StartupInfo> {
        lock(&self.startup).clone()
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    #[tokio::test]
    async fn wait_without_workers_returns_immediately() {
        let lifecycle = Lifecycle::new();
        timeout(Duration::from_millis(100), lifecycle.wait())
            .await
            .expect("empty join-group must not block");
    }

    #[tokio::test]
    async fn cancel_is_idempotent_and_seen_by_every_observer() {
        let lifecycle = Lifecycle::new();
        let first = lifecycle.quit();
        let second = lifecycle.quit();
        assert!(!first.is_cancelled());

        lifecycle.cancel();
        lifecycle.cancel();

        assert!(first.is_cancelled());
        assert!(second.is_cancelled());
        assert!(lifecycle.quit().is_cancelled());
        timeout(Duration::from_millis(100), first.cancelled()).await.unwrap();
        assert!(lifecycle.fatal().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn wait_returns_after_every_worker_is_done() {
        let lifecycle = Arc::new(Lifecycle::new());
        let released = Arc::new(AtomicUsize::new(0));

        for i in 0..3 {
            let released = released.clone();
            lifecycle.spawn(&format!("worker-{}", i), move |quit| async move {
                quit.cancelled().await;
                sleep(Duration::from_millis(20 * (i + 1))).await;
                released.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        assert_eq!(lifecycle.active_workers(), 3);

        // workers are parked on the signal
        let early = timeout(Duration::from_millis(50), lifecycle.wait()).await;
        assert!(early.is_err());

        lifecycle.cancel();
        lifecycle.cancel();
        timeout(Duration::from_secs(2), lifecycle.join()).await.unwrap();

        assert_eq!(released.load(Ordering::SeqCst), 3);
        assert_eq!(lifecycle.active_workers(), 0);
    }

    #[tokio::test]
    async fn failing_worker_cancels_everyone() {
        let lifecycle = Arc::new(Lifecycle::new());
        let quit = lifecycle.quit();

        lifecycle.spawn("listener", |_| async { Err(anyhow!("address in use")) });

        timeout(Duration::from_secs(1), quit.cancelled()).await.unwrap();
        lifecycle.join().await;
        assert!(lifecycle.fatal().unwrap().contains("address in use"));
        assert_eq!(lifecycle.active_workers(), 0);
    }

    #[tokio::test]
    #[allow(unreachable_code)]
    async fn panicking_worker_still_leaves_the_group() {
        let lifecycle = Arc::new(Lifecycle::new());
        lifecycle.spawn("boom", |_| async {
            panic!("worker bug");
            Ok::<(), anyhow::Error>(())
        });

        timeout(Duration::from_secs(1), lifecycle.join()).await.unwrap();
        assert_eq!(lifecycle.active_workers(), 0);
    }

    #[test]
    fn guard_drop_is_done() {
        let lifecycle = Lifecycle::new();
        let a = lifecycle.add();
        let b = lifecycle.add();
        assert_eq!(lifecycle.active_workers(), 2);
        drop(a);
        drop(b);
        assert_eq!(lifecycle.active_workers(), 0);
    }

    #[test]
    fn startup_info_roundtrips_through_the_coordinator() {
        let lifecycle = Lifecycle::new();
        assert!(lifecycle.get().is_none());

        let info = StartupInfo::capture();
        lifecycle.set(info.clone());
        assert_eq!(lifecycle.get(), Some(info));
    }
}
