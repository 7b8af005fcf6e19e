// src/time_ctrl/time_rules.rs
//! Контроль времени матча.
//!
//! Только "правила", без состояния и без привязки к конкретному матчу.

use serde::{Deserialize, Serialize};

/// Пресеты контроля времени (на будущее можно добавить Bullet/Classical и т.д.).
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum TimeProfile {
    /// 3 минуты, +2 сек за ход.
    Blitz,
    /// 10 минут без добавления.
    Rapid,
}

/// Контроль времени, фиксируется при создании матча.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeControl {
    /// Начальное время на сторону, секунды (`time_control` в хранилище).
    pub initial_secs: u32,
    /// Добавление за сделанный ход, секунды.
    #[serde(default)]
    pub increment_secs: u32,
}

impl TimeControl {
    /// Строгий конструктор.
    pub const fn new(initial_secs: u32, increment_secs: u32) -> Self {
        Self {
            initial_secs,
            increment_secs,
        }
    }

    /// Контроль без добавления.
    pub const fn sudden_death(initial_secs: u32) -> Self {
        Self::new(initial_secs, 0)
    }

    pub const fn from_profile(profile: TimeProfile) -> Self {
        match profile {
            TimeProfile::Blitz => Self::new(180, 2),
            TimeProfile::Rapid => Self::sudden_death(600),
        }
    }

    pub fn initial_ms(&self) -> u64 {
        u64::from(self.initial_secs) * 1000
    }

    pub fn increment_ms(&self) -> u64 {
        u64::from(self.increment_secs) * 1000
    }

    /// Проверка против границ из конфигурации движка.
    pub fn validate(&self, min_secs: u32, max_secs: u32, max_increment_secs: u32) -> Result<(), String> {
        if self.initial_secs == 0 {
            return Err("TimeControl: initial_secs = 0".into());
        }
        if self.initial_secs < min_secs {
            return Err(format!(
                "TimeControl: initial_secs {} < min {}",
                self.initial_secs, min_secs
            ));
        }
        if self.initial_secs > max_secs {
            return Err(format!(
                "TimeControl: initial_secs {} > max {}",
                self.initial_secs, max_secs
            ));
        }
        if self.increment_secs > max_increment_secs {
            return Err(format!(
                "TimeControl: increment_secs {} > max {}",
                self.increment_secs, max_increment_secs
            ));
        }
        Ok(())
    }
}
