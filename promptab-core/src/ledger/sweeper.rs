use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::SessionLedger;

/// Periodically evicts sessions that have not been touched within the
/// configured maximum age.
pub struct SessionSweeper {
    ledger: Arc<SessionLedger>,
    max_age: Duration,
    interval: Duration,
    is_running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    task_handle: RwLock<Option<JoinHandle<()>>>,
}

impl SessionSweeper {
    /// Uses the age and interval from the ledger's own config.
    pub fn new(ledger: Arc<SessionLedger>) -> Self {
        let max_age = ledger.config().max_session_age();
        let interval = ledger.config().cleanup_interval();
        Self::with_schedule(ledger, max_age, interval)
    }

    pub fn with_schedule(ledger: Arc<SessionLedger>, max_age: Duration, interval: Duration) -> Self {
        Self {
            ledger,
            max_age,
            // tokio intervals panic on a zero period
            interval: interval.max(Duration::from_millis(1)),
            is_running: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(Notify::new()),
            task_handle: RwLock::new(None),
        }
    }

    pub async fn sweep_once(&self) -> usize {
        self.ledger.cleanup_sessions(self.max_age).await
    }

    pub async fn start(&self) {
        if self.is_running.swap(true, Ordering::SeqCst) {
            warn!("Session sweeper is already running");
            return;
        }

        info!(
            interval_secs = self.interval.as_secs(),
            max_age_secs = self.max_age.as_secs(),
            "Starting session sweeper background task"
        );

        let ledger = Arc::clone(&self.ledger);
        let is_running = Arc::clone(&self.is_running);
        let shutdown = Arc::clone(&self.shutdown);
        let max_age = self.max_age;
        let interval = self.interval;

        let handle = tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(interval);

            // First tick completes immediately; the first sweep waits a full interval
            interval_timer.tick().await;

            while is_running.load(Ordering::SeqCst) {
                tokio::select! {
                    _ = interval_timer.tick() => {}
                    _ = shutdown.notified() => break,
                }

                let removed = ledger.cleanup_sessions(max_age).await;
                debug!(removed, "Background sweep finished");
            }

            info!("Session sweeper background task stopped");
        });

        *self.task_handle.write().await = Some(handle);
    }

    pub async fn stop(&self) {
        if !self.is_running.swap(false, Ordering::SeqCst) {
            warn!("Session sweeper is not running");
            return;
        }

        info!("Stopping session sweeper...");
        self.shutdown.notify_one();

        let handle = self.task_handle.write().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "Error waiting for session sweeper task to stop");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Drop for SessionSweeper {
    fn drop(&mut self) {
        if self.is_running.swap(false, Ordering::SeqCst) {
            if let Some(handle) = self.task_handle.get_mut().take() {
                handle.abort();
            }
        }
    }
}
