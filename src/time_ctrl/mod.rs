// src/time_ctrl/mod.rs
//! Контроль времени матча.
//!
//! Здесь собираем:
//! - правила (`TimeControl`);
//! - шахматные часы матча (`MatchClock`);
//! - источник времени (`TimeSource`), который движок получает снаружи.

pub mod clock;
pub mod source;
pub mod time_rules;

pub use clock::MatchClock;
pub use source::{ManualTimeSource, Moment, SystemTimeSource, TimeSource};
pub use time_rules::{TimeControl, TimeProfile};
