use crate::domain::{MatchId, MatchStatus, Side, TournamentId, UserId};

use thiserror::Error;

/// Ошибки движка жизненного цикла матчей и турниров.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum EngineError {
    /// Сигнал неприменим в текущем статусе матча.
    #[error("Матч {match_id}: операция {operation} неприменима в статусе {status}")]
    InvalidStateTransition {
        match_id: MatchId,
        status: MatchStatus,
        operation: &'static str,
    },

    #[error("Пользователь {user_id} не участвует в матче {match_id}")]
    UnknownParticipant { match_id: MatchId, user_id: UserId },

    #[error("Матч {match_id}: сейчас ход стороны {expected}")]
    NotYourTurn { match_id: MatchId, expected: Side },

    #[error("Матч {0}: нет предложения ничьей от соперника")]
    NoDrawOffer(MatchId),

    #[error("Матч {match_id}: недопустимый ход {mv}: {reason}")]
    IllegalMove {
        match_id: MatchId,
        mv: String,
        reason: String,
    },

    #[error("Матч {0}: оба места уже заняты")]
    MatchFull(MatchId),

    #[error("Матч {0} не найден")]
    MatchNotFound(MatchId),

    #[error("Турнир {0} не найден")]
    TournamentNotFound(TournamentId),

    #[error("Матч {0} уже зарегистрирован")]
    AlreadyRegistered(MatchId),

    /// Нарушение инварианта сетки. Автоматическое продвижение турнира
    /// останавливается, нужен ручной разбор.
    #[error("Нарушение инварианта сетки турнира {tournament_id}: {detail}")]
    BracketInvariantViolation {
        tournament_id: TournamentId,
        detail: String,
    },

    #[error("Ошибка хранилища: {0}")]
    PersistenceFailure(String),

    #[error("Некорректная конфигурация: {0}")]
    InvalidConfig(String),

    #[error("Внутренняя ошибка: {0}")]
    Internal(&'static str),
}

impl EngineError {
    pub(crate) fn bracket(tournament_id: &TournamentId, detail: impl Into<String>) -> Self {
        EngineError::BracketInvariantViolation {
            tournament_id: tournament_id.clone(),
            detail: detail.into(),
        }
    }
}
