use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{MatchId, TournamentId};
use crate::engine::EngineError;

/// Ошибки внешнего API (то, что отдаём фронту / клиенту).
///
/// Повторный сигнал завершения сюда никогда не попадает: он получает
/// обычное подтверждение с записанным итогом.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq)]
pub enum ApiError {
    /// Неправильные входные данные (например, битый JSON).
    #[error("Некорректный запрос: {0}")]
    BadRequest(String),

    #[error("Матч {0} не найден")]
    MatchNotFound(MatchId),

    #[error("Турнир {0} не найден")]
    TournamentNotFound(TournamentId),

    /// Пользователь не участвует в матче.
    #[error("{0}")]
    NotAParticipant(String),

    /// Команда не может быть выполнена в текущем состоянии.
    #[error("{0}")]
    InvalidCommand(String),

    /// Ошибка движка, требующая ручного разбора (сетка и т.п.).
    #[error("{0}")]
    EngineError(String),

    /// Внутренняя ошибка сервера.
    #[error("Внутренняя ошибка: {0}")]
    Internal(String),
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::MatchNotFound(id) => ApiError::MatchNotFound(id),
            EngineError::TournamentNotFound(id) => ApiError::TournamentNotFound(id),
            EngineError::UnknownParticipant { .. } => ApiError::NotAParticipant(err.to_string()),
            EngineError::InvalidStateTransition { .. }
            | EngineError::NotYourTurn { .. }
            | EngineError::NoDrawOffer(_)
            | EngineError::IllegalMove { .. }
            | EngineError::MatchFull(_) => ApiError::InvalidCommand(err.to_string()),
            EngineError::InvalidConfig(msg) => ApiError::BadRequest(msg),
            EngineError::PersistenceFailure(_) | EngineError::Internal(_) => {
                ApiError::Internal(err.to_string())
            }
            EngineError::AlreadyRegistered(_) | EngineError::BracketInvariantViolation { .. } => {
                ApiError::EngineError(err.to_string())
            }
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}
