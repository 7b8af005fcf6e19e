//! Внешний API движка матчей.
//!
//! Здесь описываются:
//! - команды (commands.rs) — всё, что меняет состояние (создать матч, ход, сдача, маячок отключения);
//! - запросы (queries.rs) — только чтение, отчёты "за сегодня" и по турниру;
//! - DTO (dto.rs) — удобные структуры для фронта и операционных инструментов;
//! - ошибки (errors.rs) — то, что видит клиент;
//! - GraphQL (graphql.rs) — схема отчётов только для чтения.

pub mod commands;
pub mod dto;
pub mod errors;
pub mod graphql;
pub mod queries;

pub use commands::*;
pub use dto::*;
pub use errors::*;
pub use graphql::{build_schema, ReportingQuery, ReportingSchema};
pub use queries::*;
