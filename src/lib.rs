//! Движок жизненного цикла матчей и турниров на выбывание.
//!
//! Матч живёт в сессии реестра от создания до терминального статуса,
//! часы проверяются по запросу и периодическим обходом, а итог матча
//! записывается ровно один раз, сколько бы сигналов завершения ни пришло.
//! Турнирные матчи после завершения продвигают победителя по сетке.

pub mod api;
pub mod config;
pub mod domain;
pub mod engine;
pub mod infra;
pub mod time_ctrl;
pub mod tournament;

pub use config::EngineConfig;
pub use engine::{ArenaEngine, EngineError};
