// src/engine/resolver.rs
//! Арбитр завершения матча.
//!
//! Матч может получить несколько сигналов завершения почти одновременно
//! (сдача + маячок отключения от того же закрывающегося клиента, падение флажка
//! + принятие ничьей и т.п.). Арбитр гарантирует ровно один переход в
//! терминальный статус: первый сигнал, увидевший `playing` (или `waiting` для
//! отмены), выигрывает; остальные получают подтверждение с уже записанным итогом.
//!
//! Атомарность обеспечивается тем, что все мутации одного матча проходят через
//! один замок сессии (см. `registry`): внутри него проверка статуса и запись
//! итога — одна неделимая операция.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::{EndReason, MatchOutcome, MatchRecord, MatchStatus, Side, UserId};
use crate::engine::errors::EngineError;
use crate::engine::rules::{PositionVerdict, TimeoutVerdict};

/// Почему матч отменяется.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum AbortCause {
    /// Создатель отменил матч до прихода соперника.
    CreatorCancelled { by: UserId },
    /// Никто не присоединился за отведённое время.
    JoinTimeout,
    /// Административная отмена.
    Administrative,
}

/// Сигнал завершения матча.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum TerminationSignal {
    Resign { by: UserId },
    AcceptDraw { by: UserId },
    ClockExpired { side: Side, verdict: TimeoutVerdict },
    /// Победитель указан явно тем, кто заметил потерю соединения.
    Disconnect { winner: UserId },
    PositionDecided { verdict: PositionVerdict },
    Abort { cause: AbortCause },
}

impl TerminationSignal {
    pub fn kind(&self) -> &'static str {
        match self {
            TerminationSignal::Resign { .. } => "resign",
            TerminationSignal::AcceptDraw { .. } => "accept_draw",
            TerminationSignal::ClockExpired { .. } => "clock_expired",
            TerminationSignal::Disconnect { .. } => "disconnect",
            TerminationSignal::PositionDecided { .. } => "position_decided",
            TerminationSignal::Abort { .. } => "abort",
        }
    }

    /// В каких статусах сигнал может перевести матч в терминальный.
    fn applies_to(&self, status: MatchStatus) -> bool {
        match self {
            TerminationSignal::Abort {
                cause: AbortCause::CreatorCancelled { .. } | AbortCause::JoinTimeout,
            } => status == MatchStatus::Waiting,
            TerminationSignal::Abort {
                cause: AbortCause::Administrative,
            } => matches!(status, MatchStatus::Waiting | MatchStatus::Playing),
            _ => status == MatchStatus::Playing,
        }
    }
}

/// Подтверждение на любой сигнал завершения.
///
/// Всегда описывает фактически записанный итог, а не тот, который подразумевал
/// сам сигнал.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Acknowledgement {
    /// `true` — именно этот сигнал перевёл матч в терминальный статус.
    pub applied: bool,
    pub outcome: MatchOutcome,
}

impl Acknowledgement {
    pub fn duplicate(outcome: MatchOutcome) -> Self {
        Self {
            applied: false,
            outcome,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        !self.applied
    }
}

/// Итог, который сигнал записал бы, если бы выиграл гонку.
struct Verdict {
    status: MatchStatus,
    reason: EndReason,
    winner: Option<UserId>,
}

/// Сравнить-и-записать: переводит `record` в терминальный статус, если он
/// ещё не терминальный, иначе возвращает подтверждение-дубликат.
pub fn resolve(
    record: &mut MatchRecord,
    signal: &TerminationSignal,
    now: DateTime<Utc>,
) -> Result<Acknowledgement, EngineError> {
    if record.status.is_terminal() {
        debug!(
            match_id = %record.game_id,
            signal = signal.kind(),
            status = %record.status,
            "повторный сигнал завершения, матч уже закрыт"
        );
        return Ok(Acknowledgement::duplicate(record.outcome()));
    }

    if !signal.applies_to(record.status) {
        return Err(EngineError::InvalidStateTransition {
            match_id: record.game_id.clone(),
            status: record.status,
            operation: signal.kind(),
        });
    }

    let verdict = decide(record, signal)?;

    record.status = verdict.status;
    record.end_reason = Some(verdict.reason);
    record.winner_id = verdict.winner;
    record.completed_at = Some(now);

    info!(
        match_id = %record.game_id,
        signal = signal.kind(),
        reason = %verdict.reason,
        winner = ?record.winner_id,
        "матч завершён"
    );

    Ok(Acknowledgement {
        applied: true,
        outcome: record.outcome(),
    })
}

fn decide(record: &MatchRecord, signal: &TerminationSignal) -> Result<Verdict, EngineError> {
    let verdict = match signal {
        TerminationSignal::Resign { by } => {
            let side = participant_side(record, by)?;
            Verdict {
                status: MatchStatus::Completed,
                reason: EndReason::Resignation,
                winner: Some(seated(record, side.opponent())?),
            }
        }

        TerminationSignal::AcceptDraw { by } => {
            participant_side(record, by)?;
            Verdict {
                status: MatchStatus::Completed,
                reason: EndReason::Draw,
                winner: None,
            }
        }

        TerminationSignal::ClockExpired { side, verdict } => match verdict {
            TimeoutVerdict::Loss => Verdict {
                status: MatchStatus::Completed,
                reason: EndReason::Timeout,
                winner: Some(seated(record, side.opponent())?),
            },
            // Флажок упал, но правила засчитали ничью.
            TimeoutVerdict::Draw => Verdict {
                status: MatchStatus::Completed,
                reason: EndReason::Draw,
                winner: None,
            },
        },

        TerminationSignal::Disconnect { winner } => {
            participant_side(record, winner)?;
            Verdict {
                status: MatchStatus::Completed,
                reason: EndReason::Disconnection,
                winner: Some(winner.clone()),
            }
        }

        TerminationSignal::PositionDecided { verdict } => match verdict {
            PositionVerdict::Checkmate { winner } => Verdict {
                status: MatchStatus::Completed,
                reason: EndReason::Checkmate,
                winner: Some(seated(record, *winner)?),
            },
            PositionVerdict::Drawn => Verdict {
                status: MatchStatus::Completed,
                reason: EndReason::Draw,
                winner: None,
            },
            PositionVerdict::Ongoing => {
                return Err(EngineError::Internal("PositionDecided с Ongoing"));
            }
        },

        TerminationSignal::Abort { cause } => {
            if let AbortCause::CreatorCancelled { by } = cause {
                participant_side(record, by)?;
            }
            Verdict {
                status: MatchStatus::Aborted,
                reason: EndReason::Abort,
                winner: None,
            }
        }
    };

    Ok(verdict)
}

fn participant_side(record: &MatchRecord, user_id: &UserId) -> Result<Side, EngineError> {
    record
        .side_of(user_id)
        .ok_or_else(|| EngineError::UnknownParticipant {
            match_id: record.game_id.clone(),
            user_id: user_id.clone(),
        })
}

fn seated(record: &MatchRecord, side: Side) -> Result<UserId, EngineError> {
    record
        .player(side)
        .cloned()
        .ok_or(EngineError::Internal("в идущем матче пустое место"))
}
