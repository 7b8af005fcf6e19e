// src/config.rs
//! Конфигурация движка матчей.
//!
//! Все поля имеют значения по умолчанию; JSON может переопределить любое
//! подмножество.

use serde::{Deserialize, Serialize};

use crate::engine::EngineError;
use crate::infra::RetryPolicy;
use crate::time_ctrl::TimeControl;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Сколько обычный матч ждёт второго игрока, секунды.
    pub join_timeout_secs: u64,

    /// Границы контроля времени, принимаемого при создании матча.
    pub min_time_control_secs: u32,
    pub max_time_control_secs: u32,
    pub max_increment_secs: u32,

    /// Период фонового обхода сессий (часы + таймаут ожидания), мс.
    pub sweep_interval_ms: u64,

    /// Повторы записи итога в хранилище.
    pub persistence_retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            join_timeout_secs: 300,
            min_time_control_secs: 30,
            max_time_control_secs: 10_800,
            max_increment_secs: 60,
            sweep_interval_ms: 1_000,
            persistence_retry: RetryPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Разобрать и сразу провалидировать.
    pub fn from_json_str(raw: &str) -> Result<Self, EngineError> {
        let config: EngineConfig = serde_json::from_str(raw)
            .map_err(|e| EngineError::InvalidConfig(format!("EngineConfig: {e}")))?;
        config.validate().map_err(EngineError::InvalidConfig)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.join_timeout_secs == 0 {
            return Err("EngineConfig: join_timeout_secs = 0".into());
        }
        if self.min_time_control_secs == 0 {
            return Err("EngineConfig: min_time_control_secs = 0".into());
        }
        if self.min_time_control_secs > self.max_time_control_secs {
            return Err("EngineConfig: min_time_control_secs > max_time_control_secs".into());
        }
        if self.sweep_interval_ms == 0 {
            return Err("EngineConfig: sweep_interval_ms = 0".into());
        }
        self.persistence_retry.validate()
    }

    pub fn join_timeout_ms(&self) -> u64 {
        self.join_timeout_secs.saturating_mul(1000)
    }

    /// Проверить контроль времени против границ конфигурации.
    pub fn check_time_control(&self, tc: &TimeControl) -> Result<(), EngineError> {
        tc.validate(
            self.min_time_control_secs,
            self.max_time_control_secs,
            self.max_increment_secs,
        )
        .map_err(EngineError::InvalidConfig)
    }
}
