// src/domain/tournament.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{MatchId, TournamentId, UserId};
use crate::time_ctrl::TimeControl;

/// Статус турнира.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TournamentStatus {
    /// Идут раунды.
    InProgress,
    /// Финал сыгран, чемпион известен.
    Concluded,
    /// Автоматическое продвижение остановлено из-за нарушения инварианта сетки.
    /// Нужен ручной разбор.
    Halted,
}

impl TournamentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TournamentStatus::InProgress => "in_progress",
            TournamentStatus::Concluded => "concluded",
            TournamentStatus::Halted => "halted",
        }
    }
}

/// Участник турнира.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TournamentParticipant {
    pub user_id: UserId,
    /// Посев (1 = первый сеяный).
    pub seed: u32,
    /// В каком раунде вылетел (None — ещё в турнире или чемпион).
    pub eliminated_in_round: Option<u32>,
}

/// Состояние одного матча внутри сетки.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BracketMatchState {
    /// Хотя бы одно место ещё пустое.
    Pending,
    /// Оба места заняты, матч можно создавать/стартовать.
    Ready,
    /// Под матч создана живая сессия.
    InPlay,
    /// Победитель записан и продвинут дальше.
    Decided,
    /// Соперника нет и не будет: единственный участник проходит автоматически.
    Bye,
    /// Матч закончился без победителя, ждём внешний тай-брейк.
    AwaitingTiebreak,
}

impl BracketMatchState {
    pub fn as_str(self) -> &'static str {
        match self {
            BracketMatchState::Pending => "pending",
            BracketMatchState::Ready => "ready",
            BracketMatchState::InPlay => "in_play",
            BracketMatchState::Decided => "decided",
            BracketMatchState::Bye => "bye",
            BracketMatchState::AwaitingTiebreak => "awaiting_tiebreak",
        }
    }
}

/// Матч сетки: два места + ссылка на реальный матч, когда он создан.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BracketMatch {
    pub round: u32,
    pub match_number: u32,
    /// Первое место (играет белыми).
    pub white: Option<UserId>,
    /// Второе место (играет чёрными).
    pub black: Option<UserId>,
    pub match_id: Option<MatchId>,
    pub winner: Option<UserId>,
    pub state: BracketMatchState,
}

impl BracketMatch {
    pub fn empty(round: u32, match_number: u32) -> Self {
        Self {
            round,
            match_number,
            white: None,
            black: None,
            match_id: None,
            winner: None,
            state: BracketMatchState::Pending,
        }
    }

    pub fn is_full(&self) -> bool {
        self.white.is_some() && self.black.is_some()
    }

    pub fn involves(&self, user_id: &UserId) -> bool {
        self.white.as_ref() == Some(user_id) || self.black.as_ref() == Some(user_id)
    }

    /// Второй участник матча относительно `user_id`.
    pub fn opponent_of(&self, user_id: &UserId) -> Option<&UserId> {
        if self.white.as_ref() == Some(user_id) {
            self.black.as_ref()
        } else if self.black.as_ref() == Some(user_id) {
            self.white.as_ref()
        } else {
            None
        }
    }
}

/// Раунд сетки. Номера матчей внутри раунда идут подряд с 1.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Round {
    pub number: u32,
    pub matches: Vec<BracketMatch>,
}

/// Турнир на выбывание.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Tournament {
    pub id: TournamentId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    /// Размер сетки (степень двойки).
    pub bracket_size: u32,
    /// Контроль времени для всех матчей турнира.
    pub time_control: TimeControl,
    /// Раунды с номерами 1..=N.
    pub rounds: Vec<Round>,
    pub participants: Vec<TournamentParticipant>,
    pub status: TournamentStatus,
    pub champion: Option<UserId>,
    /// Почему турнир остановлен (для ручного разбора).
    pub halted_reason: Option<String>,
}

impl Tournament {
    pub fn round_count(&self) -> u32 {
        self.rounds.len() as u32
    }

    pub fn is_final_round(&self, round: u32) -> bool {
        round == self.round_count()
    }

    pub fn round(&self, number: u32) -> Option<&Round> {
        number
            .checked_sub(1)
            .and_then(|idx| self.rounds.get(idx as usize))
    }

    pub fn bracket_match(&self, round: u32, match_number: u32) -> Option<&BracketMatch> {
        self.round(round).and_then(|r| {
            match_number
                .checked_sub(1)
                .and_then(|idx| r.matches.get(idx as usize))
        })
    }

    pub fn bracket_match_mut(&mut self, round: u32, match_number: u32) -> Option<&mut BracketMatch> {
        let round_idx = round.checked_sub(1)? as usize;
        let match_idx = match_number.checked_sub(1)? as usize;
        self.rounds
            .get_mut(round_idx)
            .and_then(|r| r.matches.get_mut(match_idx))
    }

    /// Найти матч сетки по id реального матча.
    pub fn find_by_match_id(&self, match_id: &MatchId) -> Option<&BracketMatch> {
        self.rounds
            .iter()
            .flat_map(|r| r.matches.iter())
            .find(|m| m.match_id.as_ref() == Some(match_id))
    }

    pub fn participant(&self, user_id: &UserId) -> Option<&TournamentParticipant> {
        self.participants.iter().find(|p| &p.user_id == user_id)
    }

    pub fn participant_mut(&mut self, user_id: &UserId) -> Option<&mut TournamentParticipant> {
        self.participants.iter_mut().find(|p| &p.user_id == user_id)
    }

    /// Участники, которые ещё не вылетели.
    pub fn remaining_participants(&self) -> impl Iterator<Item = &TournamentParticipant> {
        self.participants
            .iter()
            .filter(|p| p.eliminated_in_round.is_none())
    }

    pub fn is_concluded(&self) -> bool {
        self.status == TournamentStatus::Concluded
    }
}
