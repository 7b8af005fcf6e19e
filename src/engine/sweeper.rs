// src/engine/sweeper.rs

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::engine::lifecycle::ArenaEngine;

/// Фоновая задача периодической проверки сессий.
pub struct SweeperHandle {
    shutdown: Arc<Notify>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Остановить обход и дождаться завершения задачи.
    ///
    /// `Err` — задача обхода упала раньше (паника внутри проверки).
    pub async fn shutdown(self) -> Result<(), JoinError> {
        self.shutdown.notify_one();
        self.task.await.map_err(|err| {
            error!(error = %err, panicked = err.is_panic(), "задача обхода сессий завершилась аварийно");
            err
        })
    }
}

/// Запустить обход живых сессий с периодом `sweep_interval_ms`.
///
/// Живого таймера на матч нет: падение флажка и таймаут ожидания
/// замечаются здесь или при очередном ходе.
pub fn spawn_sweeper(engine: Arc<ArenaEngine>) -> SweeperHandle {
    let shutdown = Arc::new(Notify::new());
    let signal = shutdown.clone();
    let period = Duration::from_millis(engine.config().sweep_interval_ms);

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = signal.notified() => break,
                _ = ticker.tick() => {
                    let report = engine.sweep().await;
                    if !report.is_empty() {
                        info!(
                            inspected = report.inspected,
                            clock_expired = report.clock_expired.len(),
                            join_timeouts = report.join_timeouts.len(),
                            "обход сессий"
                        );
                    }
                }
            }
        }

        debug!("обход сессий остановлен");
    });

    SweeperHandle { shutdown, task }
}
