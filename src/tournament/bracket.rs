// src/tournament/bracket.rs
//! Сетка на выбывание: построение раундов и продвижение победителей.
//!
//! Инвариант сетки (проверяется тестами):
//! - матч `m` раунда `r` отправляет победителя в матч `ceil(m / 2)` раунда `r + 1`;
//! - нечётный `m` занимает первое место (белые), чётный — второе (чёрные);
//! - значит, матч `m` раунда `r + 1` получает участников только из матчей
//!   `2m - 1` и `2m` раунда `r`.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::domain::{
    BracketMatch, BracketMatchState, MatchId, Round, Tournament, TournamentId,
    TournamentParticipant, TournamentStatus, UserId,
};
use crate::engine::errors::EngineError;
use crate::time_ctrl::TimeControl;

use super::seeding::{self, Seeding};

/// Какое место матча занимает продвинутый победитель.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum SlotSide {
    /// Первое место (белые).
    First,
    /// Второе место (чёрные).
    Second,
}

/// Куда уходит победитель матча.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotTarget {
    pub round: u32,
    pub match_number: u32,
    pub side: SlotSide,
}

/// Место назначения победителя матча `match_number` раунда `round`.
pub fn next_slot(round: u32, match_number: u32) -> SlotTarget {
    SlotTarget {
        round: round + 1,
        match_number: match_number.div_ceil(2),
        side: if match_number % 2 == 1 {
            SlotSide::First
        } else {
            SlotSide::Second
        },
    }
}

/// Матчи предыдущего раунда, которые питают матч `match_number`.
pub fn feeder_matches(match_number: u32) -> (u32, u32) {
    (2 * match_number - 1, 2 * match_number)
}

/// Сколько матчей в раунде `round` сетки размера `bracket_size`.
pub fn matches_in_round(bracket_size: u32, round: u32) -> u32 {
    bracket_size >> round
}

/// Сколько раундов в сетке размера `bracket_size`.
pub fn round_count(bracket_size: u32) -> u32 {
    bracket_size.trailing_zeros()
}

/// Событие сетки, на которое реагирует движок.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum BracketEvent {
    /// Оба места заняты — матч можно создавать и стартовать.
    MatchReady {
        round: u32,
        match_number: u32,
        white: UserId,
        black: UserId,
    },
    /// Участник прошёл дальше без игры.
    ByeAdvanced {
        round: u32,
        match_number: u32,
        user_id: UserId,
    },
    /// Победитель записан в место следующего раунда.
    Advanced {
        round: u32,
        match_number: u32,
        user_id: UserId,
        to_match: u32,
        side: SlotSide,
    },
    /// Ничья/отмена: ждём внешний тай-брейк, продвижения нет.
    AwaitingTiebreak { round: u32, match_number: u32 },
    /// Финал сыгран.
    Champion { user_id: UserId },
}

/// Параметры нового турнира.
#[derive(Clone, Debug)]
pub struct NewTournament {
    pub id: TournamentId,
    pub name: String,
    pub participants: Vec<UserId>,
    /// `None` — ближайшая степень двойки.
    pub bracket_size: Option<u32>,
    pub seeding: Seeding,
    pub time_control: TimeControl,
    pub created_at: DateTime<Utc>,
}

/// Менеджер сетки. Единственный, кто пишет участников в места матчей.
///
/// Все методы работают над `&mut Tournament`; сериализацию по турниру
/// обеспечивает лобби (один замок на турнир).
pub struct BracketManager;

impl BracketManager {
    /// Построить турнир: раунд 1 с посеянными участниками, остальные раунды
    /// с пустыми местами. Баи сразу продвигаются.
    pub fn build(spec: NewTournament) -> Result<(Tournament, Vec<BracketEvent>), EngineError> {
        let mut seen = HashSet::new();
        for user_id in &spec.participants {
            if !seen.insert(user_id) {
                return Err(EngineError::InvalidConfig(format!(
                    "участник {} зарегистрирован дважды",
                    user_id
                )));
            }
        }

        let bracket_size = spec
            .bracket_size
            .unwrap_or_else(|| seeding::default_bracket_size(spec.participants.len()));
        seeding::validate_bracket_size(bracket_size, spec.participants.len())
            .map_err(EngineError::InvalidConfig)?;

        let entrants = seeding::arrange(spec.participants, spec.seeding);
        let count = entrants.len() as u32;
        let by_seed = |seed: u32| -> Option<UserId> {
            if seed <= count {
                entrants.get(seed as usize - 1).cloned()
            } else {
                None
            }
        };

        let rounds: Vec<Round> = (1..=round_count(bracket_size))
            .map(|number| Round {
                number,
                matches: (1..=matches_in_round(bracket_size, number))
                    .map(|m| BracketMatch::empty(number, m))
                    .collect(),
            })
            .collect();

        let participants = entrants
            .iter()
            .enumerate()
            .map(|(idx, user_id)| TournamentParticipant {
                user_id: user_id.clone(),
                seed: idx as u32 + 1,
                eliminated_in_round: None,
            })
            .collect();

        let mut tournament = Tournament {
            id: spec.id,
            name: spec.name,
            created_at: spec.created_at,
            bracket_size,
            time_control: spec.time_control,
            rounds,
            participants,
            status: TournamentStatus::InProgress,
            champion: None,
            halted_reason: None,
        };

        let order = seeding::seed_order(bracket_size);
        let mut byes = Vec::new();
        let mut events = Vec::new();

        for (idx, pair) in order.chunks(2).enumerate() {
            let match_number = idx as u32 + 1;
            let white = by_seed(pair[0]);
            let black = by_seed(pair[1]);

            let bm = tournament
                .bracket_match_mut(1, match_number)
                .ok_or(EngineError::Internal("раунд 1 короче, чем порядок посева"))?;
            bm.white = white.clone();
            bm.black = black.clone();

            match (white, black) {
                (Some(white), Some(black)) => {
                    bm.state = BracketMatchState::Ready;
                    events.push(BracketEvent::MatchReady {
                        round: 1,
                        match_number,
                        white,
                        black,
                    });
                }
                (Some(only), None) | (None, Some(only)) => {
                    bm.state = BracketMatchState::Bye;
                    bm.winner = Some(only.clone());
                    byes.push((match_number, only));
                }
                (None, None) => {
                    return Err(EngineError::Internal("два бая в одном матче"));
                }
            }
        }

        for (match_number, user_id) in byes {
            events.push(BracketEvent::ByeAdvanced {
                round: 1,
                match_number,
                user_id: user_id.clone(),
            });
            events.extend(Self::advance(&mut tournament, 1, match_number, &user_id)?);
        }

        info!(
            tournament_id = %tournament.id,
            participants = count,
            bracket_size,
            "турнир построен"
        );

        Ok((tournament, events))
    }

    /// Привязать созданный матч к месту сетки: `Ready → InPlay`.
    pub fn bind_match(
        tournament: &mut Tournament,
        round: u32,
        match_number: u32,
        match_id: MatchId,
    ) -> Result<(), EngineError> {
        let tid = tournament.id.clone();
        let bm = tournament
            .bracket_match_mut(round, match_number)
            .ok_or_else(|| EngineError::bracket(&tid, format!("нет матча {}/{}", round, match_number)))?;

        if bm.state != BracketMatchState::Ready || !bm.is_full() {
            return Err(EngineError::bracket(
                &tid,
                format!("матч {}/{} не готов к старту ({:?})", round, match_number, bm.state),
            ));
        }

        bm.match_id = Some(match_id);
        bm.state = BracketMatchState::InPlay;
        Ok(())
    }

    /// Обработать завершение матча сетки.
    ///
    /// `winner = None` (ничья или отмена) — продвижения нет, матч ждёт тай-брейк.
    /// Повторное уведомление с тем же победителем ничего не меняет.
    pub fn on_match_completed(
        tournament: &mut Tournament,
        round: u32,
        match_number: u32,
        winner: Option<&UserId>,
    ) -> Result<Vec<BracketEvent>, EngineError> {
        ensure_not_halted(tournament)?;

        let Some(bm) = tournament.bracket_match_mut(round, match_number) else {
            return Err(halt(
                tournament,
                format!("уведомление о несуществующем матче {}/{}", round, match_number),
            ));
        };

        match bm.state {
            BracketMatchState::Decided => {
                if bm.winner.as_ref() == winner {
                    return Ok(Vec::new());
                }
                let detail = format!(
                    "матч {}/{} уже решён в пользу {:?}, пришёл {:?}",
                    round, match_number, bm.winner, winner
                );
                return Err(halt(tournament, detail));
            }
            BracketMatchState::Pending | BracketMatchState::Bye => {
                let detail = format!(
                    "матч {}/{} в состоянии {:?} не мог быть сыгран",
                    round, match_number, bm.state
                );
                return Err(halt(tournament, detail));
            }
            BracketMatchState::Ready
            | BracketMatchState::InPlay
            | BracketMatchState::AwaitingTiebreak => {}
        }

        let Some(winner) = winner else {
            bm.state = BracketMatchState::AwaitingTiebreak;
            info!(
                tournament_id = %tournament.id,
                round,
                match_number,
                "матч сетки без победителя, ждём тай-брейк"
            );
            return Ok(vec![BracketEvent::AwaitingTiebreak { round, match_number }]);
        };

        if !bm.involves(winner) {
            let detail = format!(
                "победитель {} не играл в матче {}/{}",
                winner, round, match_number
            );
            return Err(halt(tournament, detail));
        }

        let loser = bm.opponent_of(winner).cloned();
        bm.winner = Some(winner.clone());
        bm.state = BracketMatchState::Decided;

        if let Some(loser) = loser {
            if let Some(p) = tournament.participant_mut(&loser) {
                p.eliminated_in_round = Some(round);
            }
        }

        Self::advance(tournament, round, match_number, winner)
    }

    /// Внешний тай-брейк сообщил победителя матча, сыгранного вничью.
    pub fn report_tiebreak(
        tournament: &mut Tournament,
        round: u32,
        match_number: u32,
        winner: &UserId,
    ) -> Result<Vec<BracketEvent>, EngineError> {
        let tid = tournament.id.clone();
        let awaiting = tournament
            .bracket_match(round, match_number)
            .map(|bm| bm.state == BracketMatchState::AwaitingTiebreak)
            .unwrap_or(false);

        if !awaiting {
            return Err(EngineError::bracket(
                &tid,
                format!("матч {}/{} не ждёт тай-брейк", round, match_number),
            ));
        }

        Self::on_match_completed(tournament, round, match_number, Some(winner))
    }

    /// Матчи, готовые к старту, под которые ещё не создана сессия.
    pub fn ready_matches(tournament: &Tournament) -> Vec<&BracketMatch> {
        tournament
            .rounds
            .iter()
            .flat_map(|r| r.matches.iter())
            .filter(|m| m.state == BracketMatchState::Ready && m.match_id.is_none())
            .collect()
    }

    /// Записать победителя в место следующего раунда.
    fn advance(
        tournament: &mut Tournament,
        round: u32,
        match_number: u32,
        winner: &UserId,
    ) -> Result<Vec<BracketEvent>, EngineError> {
        if tournament.is_final_round(round) {
            tournament.status = TournamentStatus::Concluded;
            tournament.champion = Some(winner.clone());
            info!(tournament_id = %tournament.id, champion = %winner, "турнир завершён");
            return Ok(vec![BracketEvent::Champion {
                user_id: winner.clone(),
            }]);
        }

        let target = next_slot(round, match_number);
        let Some(dest) = tournament.bracket_match_mut(target.round, target.match_number) else {
            let detail = format!(
                "нет места назначения {}/{} для победителя {}/{}",
                target.round, target.match_number, round, match_number
            );
            return Err(halt(tournament, detail));
        };

        let slot = match target.side {
            SlotSide::First => &mut dest.white,
            SlotSide::Second => &mut dest.black,
        };

        match slot.as_ref() {
            Some(existing) if existing == winner => return Ok(Vec::new()),
            Some(existing) => {
                let detail = format!(
                    "место {:?} матча {}/{} уже занято {}, попытка записать {}",
                    target.side, target.round, target.match_number, existing, winner
                );
                return Err(halt(tournament, detail));
            }
            None => {}
        }
        *slot = Some(winner.clone());

        let mut events = vec![BracketEvent::Advanced {
            round,
            match_number,
            user_id: winner.clone(),
            to_match: target.match_number,
            side: target.side,
        }];

        if dest.is_full() && dest.state == BracketMatchState::Pending {
            dest.state = BracketMatchState::Ready;
            if let (Some(white), Some(black)) = (dest.white.clone(), dest.black.clone()) {
                events.push(BracketEvent::MatchReady {
                    round: target.round,
                    match_number: target.match_number,
                    white,
                    black,
                });
            }
        }

        Ok(events)
    }
}

fn ensure_not_halted(tournament: &Tournament) -> Result<(), EngineError> {
    if tournament.status == TournamentStatus::Halted {
        return Err(EngineError::bracket(
            &tournament.id,
            tournament
                .halted_reason
                .clone()
                .unwrap_or_else(|| "турнир остановлен".into()),
        ));
    }
    Ok(())
}

/// Остановить автоматическое продвижение турнира.
fn halt(tournament: &mut Tournament, detail: String) -> EngineError {
    error!(
        tournament_id = %tournament.id,
        detail = %detail,
        "нарушение инварианта сетки, продвижение остановлено"
    );
    tournament.status = TournamentStatus::Halted;
    tournament.halted_reason = Some(detail.clone());
    EngineError::bracket(&tournament.id, detail)
}
