// src/domain/game.rs

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{MatchId, Side, TournamentId, UserId};
use crate::time_ctrl::TimeControl;

/// Статус матча.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// Создан, ждём второго участника.
    Waiting,
    /// Оба участника на месте, часы идут у стороны, которая ходит.
    Playing,
    /// Терминальный: есть победитель или ничья.
    Completed,
    /// Терминальный: матч закончился без результата.
    Aborted,
}

impl MatchStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, MatchStatus::Completed | MatchStatus::Aborted)
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MatchStatus::Waiting => "waiting",
            MatchStatus::Playing => "playing",
            MatchStatus::Completed => "completed",
            MatchStatus::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// Причина завершения матча.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    Resignation,
    Draw,
    Timeout,
    Disconnection,
    Abort,
    /// Мат (или эквивалент), о котором сообщил движок правил.
    Checkmate,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EndReason::Resignation => "resignation",
            EndReason::Draw => "draw",
            EndReason::Timeout => "timeout",
            EndReason::Disconnection => "disconnection",
            EndReason::Abort => "abort",
            EndReason::Checkmate => "checkmate",
        };
        f.write_str(s)
    }
}

/// Привязка матча к турниру: либо все три поля, либо ничего.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TournamentLink {
    pub tournament_id: TournamentId,
    pub round: u32,
    pub match_number: u32,
}

/// Запись матча — ровно то, что движок кладёт в хранилище.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MatchRecord {
    pub game_id: MatchId,
    pub white_player_id: Option<UserId>,
    pub black_player_id: Option<UserId>,
    /// Снимок позиции. Формат принадлежит движку правил, мы его только храним.
    pub fen: String,
    pub time_control: TimeControl,
    /// Остаток времени белых, секунды.
    pub white_time: u64,
    /// Остаток времени чёрных, секунды.
    pub black_time: u64,
    pub move_count: u32,
    pub wager: Option<u64>,
    pub status: MatchStatus,
    pub tournament: Option<TournamentLink>,
    pub winner_id: Option<UserId>,
    pub end_reason: Option<EndReason>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Зафиксированный итог матча (или текущее состояние, если матч ещё идёт).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchOutcome {
    pub match_id: MatchId,
    pub status: MatchStatus,
    pub end_reason: Option<EndReason>,
    pub winner_id: Option<UserId>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl MatchRecord {
    pub fn player(&self, side: Side) -> Option<&UserId> {
        match side {
            Side::White => self.white_player_id.as_ref(),
            Side::Black => self.black_player_id.as_ref(),
        }
    }

    pub(crate) fn seat_mut(&mut self, side: Side) -> &mut Option<UserId> {
        match side {
            Side::White => &mut self.white_player_id,
            Side::Black => &mut self.black_player_id,
        }
    }

    /// За какую сторону играет пользователь.
    pub fn side_of(&self, user_id: &UserId) -> Option<Side> {
        Side::ALL
            .into_iter()
            .find(|side| self.player(*side) == Some(user_id))
    }

    pub fn has_both_players(&self) -> bool {
        self.white_player_id.is_some() && self.black_player_id.is_some()
    }

    pub fn side_to_move(&self) -> Side {
        Side::to_move_after(self.move_count)
    }

    pub fn outcome(&self) -> MatchOutcome {
        MatchOutcome {
            match_id: self.game_id.clone(),
            status: self.status,
            end_reason: self.end_reason,
            winner_id: self.winner_id.clone(),
            completed_at: self.completed_at,
        }
    }

    /// Проверка инвариантов записи. `InMemoryMatchStore` вызывает её перед
    /// каждой записью и отклоняет несогласованные.
    pub fn check_invariants(&self) -> Result<(), String> {
        let terminal = self.status.is_terminal();

        if terminal != self.end_reason.is_some() {
            return Err(format!(
                "{}: end_reason must be set iff status is terminal (status={})",
                self.game_id, self.status
            ));
        }
        if terminal != self.completed_at.is_some() {
            return Err(format!(
                "{}: completed_at must be set iff status is terminal",
                self.game_id
            ));
        }

        if let Some(winner) = &self.winner_id {
            if self.status != MatchStatus::Completed {
                return Err(format!("{}: winner set on non-completed match", self.game_id));
            }
            if matches!(self.end_reason, Some(EndReason::Draw | EndReason::Abort)) {
                return Err(format!("{}: winner set on a draw", self.game_id));
            }
            if self.side_of(winner).is_none() {
                return Err(format!("{}: winner {} is not a participant", self.game_id, winner));
            }
        }

        let needs_winner = matches!(
            self.end_reason,
            Some(
                EndReason::Resignation
                    | EndReason::Timeout
                    | EndReason::Disconnection
                    | EndReason::Checkmate
            )
        );
        if needs_winner && self.winner_id.is_none() {
            return Err(format!("{}: decisive end without a winner", self.game_id));
        }

        if self.status == MatchStatus::Aborted && self.end_reason != Some(EndReason::Abort) {
            return Err(format!("{}: aborted match must end with reason abort", self.game_id));
        }

        if let (Some(w), Some(b)) = (&self.white_player_id, &self.black_player_id) {
            if w == b {
                return Err(format!("{}: same user on both sides", self.game_id));
            }
        }

        Ok(())
    }
}
