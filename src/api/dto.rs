use async_graphql::SimpleObject;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    BracketMatch, MatchId, MatchRecord, Side, Tournament, TournamentParticipant, UserId,
};
use crate::engine::{Acknowledgement, JoinOutcome, MatchView, MoveOutcome, SweepReport};

fn ts(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn id_str(value: Option<&UserId>) -> Option<String> {
    value.map(|u| u.to_string())
}

/// DTO матча: игроки, итог, остатки времени.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, SimpleObject)]
pub struct MatchSummaryDto {
    pub game_id: String,
    pub white_player_id: Option<String>,
    pub black_player_id: Option<String>,
    /// "waiting" | "playing" | "completed" | "aborted".
    pub status: String,
    pub winner_id: Option<String>,
    pub end_reason: Option<String>,
    /// Начальное время на сторону, секунды.
    pub time_control: u32,
    pub increment: u32,
    pub white_time: u64,
    pub black_time: u64,
    pub move_count: u32,
    pub wager: Option<u64>,
    pub fen: String,
    pub tournament_id: Option<String>,
    pub round: Option<u32>,
    pub match_number: Option<u32>,
    pub created_at: String,
    pub completed_at: Option<String>,
}

impl From<&MatchRecord> for MatchSummaryDto {
    fn from(m: &MatchRecord) -> Self {
        Self {
            game_id: m.game_id.to_string(),
            white_player_id: id_str(m.white_player_id.as_ref()),
            black_player_id: id_str(m.black_player_id.as_ref()),
            status: m.status.to_string(),
            winner_id: id_str(m.winner_id.as_ref()),
            end_reason: m.end_reason.map(|r| r.to_string()),
            time_control: m.time_control.initial_secs,
            increment: m.time_control.increment_secs,
            white_time: m.white_time,
            black_time: m.black_time,
            move_count: m.move_count,
            wager: m.wager,
            fen: m.fen.clone(),
            tournament_id: m.tournament.as_ref().map(|l| l.tournament_id.to_string()),
            round: m.tournament.as_ref().map(|l| l.round),
            match_number: m.tournament.as_ref().map(|l| l.match_number),
            created_at: ts(m.created_at),
            completed_at: m.completed_at.map(ts),
        }
    }
}

/// DTO живого (или исторического) матча для клиента.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MatchViewDto {
    pub summary: MatchSummaryDto,
    pub live: bool,
    /// Кто ходит (только пока матч идёт).
    pub side_to_move: Option<Side>,
    pub draw_offer: Option<Side>,
}

impl From<&MatchView> for MatchViewDto {
    fn from(view: &MatchView) -> Self {
        let playing = view.record.status == crate::domain::MatchStatus::Playing;
        Self {
            summary: MatchSummaryDto::from(&view.record),
            live: view.live,
            side_to_move: playing.then(|| view.record.side_to_move()),
            draw_offer: view.draw_offer,
        }
    }
}

/// Подтверждение сигнала завершения.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AcknowledgementDto {
    /// `false` — сигнал опоздал, итог уже был записан.
    pub applied: bool,
    pub match_id: MatchId,
    pub status: String,
    pub end_reason: Option<String>,
    pub winner_id: Option<UserId>,
    pub completed_at: Option<String>,
}

impl From<&Acknowledgement> for AcknowledgementDto {
    fn from(ack: &Acknowledgement) -> Self {
        Self {
            applied: ack.applied,
            match_id: ack.outcome.match_id.clone(),
            status: ack.outcome.status.to_string(),
            end_reason: ack.outcome.end_reason.map(|r| r.to_string()),
            winner_id: ack.outcome.winner_id.clone(),
            completed_at: ack.outcome.completed_at.map(ts),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, SimpleObject)]
pub struct ParticipantDto {
    pub user_id: String,
    pub seed: u32,
    pub eliminated_in_round: Option<u32>,
}

impl From<&TournamentParticipant> for ParticipantDto {
    fn from(p: &TournamentParticipant) -> Self {
        Self {
            user_id: p.user_id.to_string(),
            seed: p.seed,
            eliminated_in_round: p.eliminated_in_round,
        }
    }
}

/// DTO матча сетки.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, SimpleObject)]
pub struct BracketMatchDto {
    pub round: u32,
    pub match_number: u32,
    pub white: Option<String>,
    pub black: Option<String>,
    pub match_id: Option<String>,
    pub winner: Option<String>,
    pub state: String,
}

impl From<&BracketMatch> for BracketMatchDto {
    fn from(bm: &BracketMatch) -> Self {
        Self {
            round: bm.round,
            match_number: bm.match_number,
            white: id_str(bm.white.as_ref()),
            black: id_str(bm.black.as_ref()),
            match_id: bm.match_id.as_ref().map(|id| id.to_string()),
            winner: id_str(bm.winner.as_ref()),
            state: bm.state.as_str().to_string(),
        }
    }
}

/// DTO турнира с участниками и сеткой.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, SimpleObject)]
pub struct TournamentSummaryDto {
    pub tournament_id: String,
    pub name: String,
    /// "in_progress" | "concluded" | "halted".
    pub status: String,
    pub bracket_size: u32,
    pub time_control: u32,
    pub created_at: String,
    pub champion: Option<String>,
    pub halted_reason: Option<String>,
    pub participants: Vec<ParticipantDto>,
    pub matches: Vec<BracketMatchDto>,
}

impl From<&Tournament> for TournamentSummaryDto {
    fn from(t: &Tournament) -> Self {
        Self {
            tournament_id: t.id.to_string(),
            name: t.name.clone(),
            status: t.status.as_str().to_string(),
            bracket_size: t.bracket_size,
            time_control: t.time_control.initial_secs,
            created_at: ts(t.created_at),
            champion: id_str(t.champion.as_ref()),
            halted_reason: t.halted_reason.clone(),
            participants: t.participants.iter().map(ParticipantDto::from).collect(),
            matches: t
                .rounds
                .iter()
                .flat_map(|r| r.matches.iter())
                .map(BracketMatchDto::from)
                .collect(),
        }
    }
}

/// Ответ API на команду.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum CommandResponse {
    /// Успешный результат без доп.данных.
    Ok,

    MatchCreated(MatchSummaryDto),

    Joined {
        match_id: MatchId,
        side: Side,
        /// `true` — после посадки матч начался.
        started: bool,
    },

    MatchState(MatchViewDto),

    MoveApplied {
        match_id: MatchId,
        move_count: u32,
        side_to_move: Side,
    },

    /// Итог сигнала завершения (в том числе повторного).
    Terminated(AcknowledgementDto),

    /// Проверка часов ничего не изменила.
    ClockOk,

    TournamentState(TournamentSummaryDto),

    Swept {
        inspected: usize,
        clock_expired: Vec<MatchId>,
        join_timeouts: Vec<MatchId>,
    },
}

impl CommandResponse {
    pub fn joined(match_id: &MatchId, outcome: JoinOutcome) -> Self {
        let (side, started) = match outcome {
            JoinOutcome::Seated(side) | JoinOutcome::AlreadySeated(side) => (side, false),
            JoinOutcome::Started(side) => (side, true),
        };
        CommandResponse::Joined {
            match_id: match_id.clone(),
            side,
            started,
        }
    }

    pub fn moved(match_id: &MatchId, outcome: &MoveOutcome) -> Self {
        match outcome {
            MoveOutcome::Applied {
                move_count,
                side_to_move,
            } => CommandResponse::MoveApplied {
                match_id: match_id.clone(),
                move_count: *move_count,
                side_to_move: *side_to_move,
            },
            MoveOutcome::Finished(ack) => CommandResponse::Terminated(AcknowledgementDto::from(ack)),
        }
    }

    pub fn swept(report: SweepReport) -> Self {
        CommandResponse::Swept {
            inspected: report.inspected,
            clock_expired: report.clock_expired,
            join_timeouts: report.join_timeouts,
        }
    }
}
