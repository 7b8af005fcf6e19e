//! Инфраструктурный слой вокруг движка матчей:
//! - генерация ID;
//! - абстракция хранения и in-memory реализация;
//! - повторы записи с экспоненциальной задержкой.

pub mod ids;
pub mod persistence;
pub mod retry;

pub use ids::IdGenerator;
pub use persistence::{InMemoryMatchStore, MatchStore, StoreError};
pub use retry::{retry_with_backoff, RetryExhausted, RetryPolicy};
