//! Fixed-interval caregiver alert polling

use std::sync::Arc;
use std::time::Duration;
use tokio::{sync::mpsc, task::JoinHandle, time::MissedTickBehavior};

use crate::api::Backend;
use crate::app::AppMessage;

/// Default time between alert checks
pub const DEFAULT_ALERT_INTERVAL: Duration = Duration::from_secs(60);

/// Check for caregiver alerts now and then every `period`.
///
/// Failures are logged and the next tick tries again. The loop ends when the
/// receiving side of `message_tx` is gone or the handle is aborted.
pub fn spawn_alert_poller(
    backend: Arc<dyn Backend>,
    message_tx: mpsc::Sender<AppMessage>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match backend.caregiver_alert().await {
                Ok(alert) => {
                    if message_tx.send(AppMessage::AlertChecked(alert)).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "caregiver alert check failed");
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::testing::MockBackend;
    use std::sync::atomic::Ordering;

    #[tokio::test(start_paused = true)]
    async fn test_polling_survives_failures() {
        let backend = Arc::new(MockBackend::default());
        backend.failing_alerts.store(1, Ordering::SeqCst);
        let (tx, mut rx) = mpsc::channel(16);

        let handle = spawn_alert_poller(backend.clone(), tx, Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(150)).await;

        // Ticks at 0s (fails), 60s and 120s
        assert_eq!(backend.count("caregiver_alert"), 3);
        let mut delivered = 0;
        while let Ok(msg) = rx.try_recv() {
            assert!(matches!(msg, AppMessage::AlertChecked(_)));
            delivered += 1;
        }
        assert_eq!(delivered, 2);

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_stops_when_receiver_dropped() {
        let backend = Arc::new(MockBackend::default());
        let (tx, rx) = mpsc::channel(16);
        drop(rx);

        let handle = spawn_alert_poller(backend.clone(), tx, Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(200)).await;

        assert!(handle.is_finished());
        assert_eq!(backend.count("caregiver_alert"), 1);
    }
}
