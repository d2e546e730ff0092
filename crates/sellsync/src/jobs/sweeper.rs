//! Periodic purge of expired job records.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;

use super::backend::JobBackend;

pub struct ExpirySweeper {
    shutdown: Arc<AtomicBool>,
    wake: Arc<Notify>,
    handle: JoinHandle<()>,
}

impl ExpirySweeper {
    pub(crate) fn spawn(backend: Arc<dyn JobBackend>, interval: Duration) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let wake = Arc::new(Notify::new());

        let handle = {
            let shutdown = Arc::clone(&shutdown);
            let wake = Arc::clone(&wake);
            tokio::spawn(async move {
                let mut timer = tokio::time::interval(interval);
                timer.tick().await; // skip immediate first tick

                loop {
                    tokio::select! {
                        _ = timer.tick() => {},
                        _ = wake.notified() => {},
                    }

                    if shutdown.load(Ordering::Acquire) {
                        break;
                    }

                    match backend.purge_expired().await {
                        Ok(0) => {}
                        Ok(n) => log::debug!("Purged {} expired parse job(s)", n),
                        Err(e) => log::warn!("Expired job purge failed: {}", e),
                    }
                }
                log::debug!("Job sweeper stopped");
            })
        };

        Self {
            shutdown,
            wake,
            handle,
        }
    }

    /// Stops the loop and waits for it to exit.
    pub async fn stop(self) {
        self.shutdown.store(true, Ordering::Release);
        self.wake.notify_one();
        if let Err(e) = self.handle.await {
            log::warn!("Job sweeper task ended abnormally: {}", e);
        }
    }
}
