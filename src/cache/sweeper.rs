//! Periodic background eviction task owned by a cache provider

use parking_lot::Mutex;
use std::future::Future;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Handle to a running eviction loop
///
/// The loop runs `sweep` once per interval until `stop()` is called or the
/// handle is dropped. A sweep in progress finishes before the loop exits.
pub struct Sweeper {
    name: &'static str,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Sweeper {
    /// Spawn the loop on the current tokio runtime
    ///
    /// Must be called from within a runtime context.
    pub fn spawn<F, Fut>(name: &'static str, interval: Duration, mut sweep: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let interval = interval.max(Duration::from_millis(1));

        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        sweep().await;
                    }
                    _ = &mut shutdown_rx => {
                        tracing::debug!(cache = name, "Eviction task shutting down");
                        break;
                    }
                }
            }
        });

        tracing::info!(
            cache = name,
            interval_ms = interval.as_millis() as u64,
            "Started cache eviction task"
        );

        Self {
            name,
            shutdown: Mutex::new(Some(shutdown_tx)),
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Ask the loop to exit; idempotent
    pub fn stop(&self) {
        if let Some(shutdown_tx) = self.shutdown.lock().take() {
            let _ = shutdown_tx.send(());
            tracing::debug!(cache = self.name, "Stopping cache eviction task");
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Stop the loop and wait for it to exit
    pub async fn join(&self) {
        self.stop();
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.stop();
    }
}
