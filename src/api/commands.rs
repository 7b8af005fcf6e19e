use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{MatchId, TournamentId, UserId};
use crate::engine::{ArenaEngine, CreateMatchRequest, CreateTournamentRequest};

use super::dto::{AcknowledgementDto, CommandResponse, MatchSummaryDto, MatchViewDto, TournamentSummaryDto};
use super::errors::ApiError;

/// Команда верхнего уровня.
///
/// JSON: `{"type": "resign", "match_id": "m-1", "user_id": "bob"}`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Создать обычный матч.
    CreateMatch(CreateMatchRequest),

    /// Сесть во второе место (или отметиться в турнирном матче).
    JoinMatch { match_id: MatchId, user_id: UserId },

    /// Явный старт матча с двумя участниками.
    StartMatch { match_id: MatchId },

    SubmitMove {
        match_id: MatchId,
        user_id: UserId,
        #[serde(rename = "move")]
        mv: String,
    },

    OfferDraw { match_id: MatchId, user_id: UserId },

    AcceptDraw { match_id: MatchId, user_id: UserId },

    Resign { match_id: MatchId, user_id: UserId },

    /// Отключение, замеченное сервером или соперником.
    ReportDisconnection { match_id: MatchId, winner_id: UserId },

    /// Создатель отменяет матч до прихода соперника.
    CancelMatch { match_id: MatchId, user_id: UserId },

    /// Административная отмена.
    AbortMatch { match_id: MatchId },

    CheckClock { match_id: MatchId },

    /// Проверить все живые сессии разом.
    Sweep,

    GetMatch { match_id: MatchId },

    CreateTournament(CreateTournamentRequest),

    /// Победитель внешнего тай-брейка.
    ReportTiebreak {
        tournament_id: TournamentId,
        round: u32,
        match_number: u32,
        winner_id: UserId,
    },
}

/// Выполнить команду против движка.
pub async fn execute(engine: &ArenaEngine, command: Command) -> Result<CommandResponse, ApiError> {
    let response = match command {
        Command::CreateMatch(req) => {
            let record = engine.create_match(req).await?;
            CommandResponse::MatchCreated(MatchSummaryDto::from(&record))
        }
        Command::JoinMatch { match_id, user_id } => {
            let outcome = engine.join_match(&match_id, &user_id).await?;
            CommandResponse::joined(&match_id, outcome)
        }
        Command::StartMatch { match_id } => {
            engine.start_match(&match_id).await?;
            let view = engine.match_view(&match_id).await?;
            CommandResponse::MatchState(MatchViewDto::from(&view))
        }
        Command::SubmitMove {
            match_id,
            user_id,
            mv,
        } => {
            let outcome = engine.submit_move(&match_id, &user_id, &mv).await?;
            CommandResponse::moved(&match_id, &outcome)
        }
        Command::OfferDraw { match_id, user_id } => {
            engine.offer_draw(&match_id, &user_id).await?;
            CommandResponse::Ok
        }
        Command::AcceptDraw { match_id, user_id } => {
            let ack = engine.accept_draw(&match_id, &user_id).await?;
            CommandResponse::Terminated(AcknowledgementDto::from(&ack))
        }
        Command::Resign { match_id, user_id } => {
            let ack = engine.resign(&match_id, &user_id).await?;
            CommandResponse::Terminated(AcknowledgementDto::from(&ack))
        }
        Command::ReportDisconnection { match_id, winner_id } => {
            let ack = engine.report_disconnection(&match_id, &winner_id).await?;
            CommandResponse::Terminated(AcknowledgementDto::from(&ack))
        }
        Command::CancelMatch { match_id, user_id } => {
            let ack = engine.cancel_match(&match_id, &user_id).await?;
            CommandResponse::Terminated(AcknowledgementDto::from(&ack))
        }
        Command::AbortMatch { match_id } => {
            let ack = engine.abort_match(&match_id).await?;
            CommandResponse::Terminated(AcknowledgementDto::from(&ack))
        }
        Command::CheckClock { match_id } => match engine.check_clock(&match_id).await? {
            Some(ack) => CommandResponse::Terminated(AcknowledgementDto::from(&ack)),
            None => CommandResponse::ClockOk,
        },
        Command::Sweep => CommandResponse::swept(engine.sweep().await),
        Command::GetMatch { match_id } => {
            let view = engine.match_view(&match_id).await?;
            CommandResponse::MatchState(MatchViewDto::from(&view))
        }
        Command::CreateTournament(req) => {
            let tournament = engine.create_tournament(req).await?;
            CommandResponse::TournamentState(TournamentSummaryDto::from(&tournament))
        }
        Command::ReportTiebreak {
            tournament_id,
            round,
            match_number,
            winner_id,
        } => {
            engine
                .report_tiebreak(&tournament_id, round, match_number, &winner_id)
                .await?;
            let tournament = engine.tournament(&tournament_id).await?;
            CommandResponse::TournamentState(TournamentSummaryDto::from(&tournament))
        }
    };

    Ok(response)
}

/// Разобрать команду из JSON и выполнить.
pub async fn execute_json(engine: &ArenaEngine, body: &str) -> Result<CommandResponse, ApiError> {
    let command: Command = serde_json::from_str(body)?;
    execute(engine, command).await
}

/// Тело маячка отключения, который клиент шлёт при закрытии страницы.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectBeacon {
    pub winner_id: UserId,
    pub reason: String,
}

pub const BEACON_REASON: &str = "disconnection";

/// Точка приёма маячка для матча `match_id`.
///
/// Транспорт ненадёжен: маячок может не прийти или прийти дважды.
/// Повтор получает то же подтверждение, что и первый.
pub async fn handle_beacon(
    engine: &ArenaEngine,
    match_id: &MatchId,
    body: &str,
) -> Result<AcknowledgementDto, ApiError> {
    let beacon: DisconnectBeacon = serde_json::from_str(body)?;
    if beacon.reason != BEACON_REASON {
        return Err(ApiError::BadRequest(format!(
            "неизвестная причина маячка: {}",
            beacon.reason
        )));
    }

    debug!(match_id = %match_id, winner = %beacon.winner_id, "маячок отключения");
    let ack = engine.report_disconnection(match_id, &beacon.winner_id).await?;
    Ok(AcknowledgementDto::from(&ack))
}
