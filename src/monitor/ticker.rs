//! Fixed-interval telemetry broadcast loop.

use std::sync::Arc;
use std::time::Duration;

use crate::monitor::registry::ConnectionRegistry;
use crate::monitor::telemetry::TelemetryGenerator;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Start the broadcast loop. It runs until `cancel` fires.
///
/// The first tick fires immediately; a log frame (when drawn) is broadcast
/// before that tick's stats frame.
pub fn spawn_telemetry_ticker(
    registry: Arc<ConnectionRegistry>,
    generator: TelemetryGenerator,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(period_ms = period.as_millis() as u64, "telemetry ticker started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    let frames = {
                        let mut rng = rand::rng();
                        generator.tick(&mut rng, registry.len())
                    };
                    for frame in &frames {
                        let report = registry.broadcast_frame(frame);
                        if report.failed > 0 {
                            debug!(
                                delivered = report.delivered,
                                failed = report.failed,
                                "telemetry broadcast had failures"
                            );
                        }
                    }
                }
            }
        }

        info!("telemetry ticker stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::frames::ServerFrame;
    use crate::monitor::registry::Connection;

    #[tokio::test(start_paused = true)]
    async fn test_ticker_broadcasts_until_cancelled() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (conn, mut rx) = Connection::channel(32);
        registry.register(conn);

        let cancel = CancellationToken::new();
        let handle = spawn_telemetry_ticker(
            Arc::clone(&registry),
            TelemetryGenerator::new(0.0),
            Duration::from_secs(2),
            cancel.clone(),
        );

        for _ in 0..3 {
            let payload = rx.recv().await.unwrap();
            let frame: ServerFrame = serde_json::from_str(&payload).unwrap();
            match frame {
                ServerFrame::Stats(sample) => assert_eq!(sample.active_connections, 1),
                other => panic!("unexpected frame {:?}", other),
            }
        }

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_log_precedes_stats() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (conn, mut rx) = Connection::channel(32);
        registry.register(conn);

        let cancel = CancellationToken::new();
        let handle = spawn_telemetry_ticker(
            Arc::clone(&registry),
            TelemetryGenerator::new(1.0),
            Duration::from_secs(2),
            cancel.clone(),
        );

        let first: ServerFrame = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        let second: ServerFrame = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert!(matches!(first, ServerFrame::Log(_)));
        assert!(matches!(second, ServerFrame::Stats(_)));

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_with_no_connections() {
        let registry = Arc::new(ConnectionRegistry::new());
        let cancel = CancellationToken::new();
        let handle = spawn_telemetry_ticker(
            registry,
            TelemetryGenerator::default(),
            Duration::from_secs(2),
            cancel.clone(),
        );

        tokio::time::sleep(Duration::from_secs(7)).await;
        cancel.cancel();
        handle.await.unwrap();
    }
}
