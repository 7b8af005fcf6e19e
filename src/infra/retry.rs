// src/infra/retry.rs

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Политика повторов записи в хранилище: экспоненциальная задержка
/// с потолком.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryPolicy {
    /// Сколько всего попыток (включая первую).
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 50,
            max_backoff_ms: 2_000,
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("persistence_retry.max_attempts must be > 0".into());
        }
        if self.initial_backoff_ms == 0 {
            return Err("persistence_retry.initial_backoff_ms must be > 0".into());
        }
        if self.max_backoff_ms < self.initial_backoff_ms {
            return Err("persistence_retry.max_backoff_ms must be >= initial_backoff_ms".into());
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err("persistence_retry.multiplier must be >= 1.0".into());
        }
        Ok(())
    }

    /// Задержка после неудачной попытки `attempt` (с единицы).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let base = self.initial_backoff_ms as f64;
        let ms = base * self.multiplier.powi(attempt.saturating_sub(1) as i32);
        Duration::from_millis(ms.min(self.max_backoff_ms as f64) as u64)
    }
}

/// Все попытки исчерпаны.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

/// Выполнять `op`, пока не получится или пока не кончатся попытки.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    operation: &'static str,
    mut op: F,
) -> Result<T, RetryExhausted<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= max_attempts => {
                return Err(RetryExhausted {
                    attempts: attempt,
                    last_error: err,
                });
            }
            Err(err) => {
                let backoff = policy.backoff_for(attempt);
                warn!(
                    operation,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "запись не удалась, повторяем"
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
        }
    }
}
