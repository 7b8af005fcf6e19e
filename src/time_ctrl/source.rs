// src/time_ctrl/source.rs
//! Источник времени для движка.
//!
//! Движок никогда не зовёт `Utc::now()` / `Instant::now()` напрямую:
//! время приходит через `TimeSource`, а в тестах подменяется на ручное.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};

/// Момент времени: "стеночные" часы для отметок в записях
/// и монотонные миллисекунды для шахматных часов и таймаутов.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Moment {
    pub wall: DateTime<Utc>,
    pub mono_ms: u64,
}

pub trait TimeSource: Send + Sync {
    fn now(&self) -> Moment;
}

/// Реальное время процесса.
#[derive(Debug)]
pub struct SystemTimeSource {
    origin: Instant,
}

impl SystemTimeSource {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Moment {
        Moment {
            wall: Utc::now(),
            mono_ms: self.origin.elapsed().as_millis() as u64,
        }
    }
}

/// Ручные часы для тестов и симуляций: время двигается только через `advance_*`.
#[derive(Debug)]
pub struct ManualTimeSource {
    wall_origin: DateTime<Utc>,
    offset_ms: AtomicU64,
}

impl ManualTimeSource {
    pub fn new(wall_origin: DateTime<Utc>) -> Self {
        Self {
            wall_origin,
            offset_ms: AtomicU64::new(0),
        }
    }

    pub fn advance_ms(&self, ms: u64) {
        self.offset_ms.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: u64) {
        self.advance_ms(secs * 1000);
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> Moment {
        let offset = self.offset_ms.load(Ordering::SeqCst);
        Moment {
            wall: self.wall_origin + Duration::milliseconds(offset as i64),
            mono_ms: offset,
        }
    }
}
