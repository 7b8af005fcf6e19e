// src/engine/session.rs
//! Сессия одного матча: владеет изменяемым состоянием и реализует
//! конечный автомат `waiting → playing → completed | aborted`.
//!
//! Сессия сама не синхронизирована: последовательность вызовов обеспечивает
//! реестр (один замок на сессию).

use tracing::info;

use crate::domain::{MatchId, MatchRecord, MatchStatus, Side, TournamentLink, UserId};
use crate::engine::errors::EngineError;
use crate::engine::resolver::{self, AbortCause, Acknowledgement, TerminationSignal};
use crate::engine::rules::{MoveRules, PositionVerdict};
use crate::time_ctrl::{MatchClock, Moment, TimeControl};

/// Результат попытки сесть в матч.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Пользователь занял место, ждём второго.
    Seated(Side),
    /// Пользователь уже сидел в матче, но второго места всё ещё нет.
    AlreadySeated(Side),
    /// Оба места заняты, матч пошёл.
    Started(Side),
}

/// Результат хода.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Ход принят, матч продолжается.
    Applied { move_count: u32, side_to_move: Side },
    /// Матч завершился: ходом (мат/пат) или падением флажка до хода.
    Finished(Acknowledgement),
}

/// Живая сессия матча.
#[derive(Clone, Debug)]
pub struct MatchSession {
    record: MatchRecord,
    clock: MatchClock,
    /// Кто предложил ничью (если предложение висит).
    draw_offer: Option<Side>,
    /// Когда сессия открыта (монотонные мс) — для таймаута ожидания.
    opened_at_ms: u64,
}

impl MatchSession {
    /// Открыть обычный (не турнирный) матч: создатель садится на выбранную
    /// сторону, второе место пустое.
    pub fn open_casual(
        match_id: MatchId,
        creator: UserId,
        creator_side: Side,
        time_control: TimeControl,
        wager: Option<u64>,
        initial_position: String,
        now: Moment,
    ) -> Self {
        let mut session = Self::blank(match_id, time_control, wager, None, initial_position, now);
        *session.record.seat_mut(creator_side) = Some(creator);
        session
    }

    /// Открыть турнирный матч: оба места уже известны из сетки,
    /// статус `waiting` до старта.
    pub fn open_tournament(
        match_id: MatchId,
        link: TournamentLink,
        white: UserId,
        black: UserId,
        time_control: TimeControl,
        initial_position: String,
        now: Moment,
    ) -> Self {
        let mut session = Self::blank(match_id, time_control, None, Some(link), initial_position, now);
        session.record.white_player_id = Some(white);
        session.record.black_player_id = Some(black);
        session
    }

    fn blank(
        match_id: MatchId,
        time_control: TimeControl,
        wager: Option<u64>,
        tournament: Option<TournamentLink>,
        initial_position: String,
        now: Moment,
    ) -> Self {
        let initial_secs = u64::from(time_control.initial_secs);
        Self {
            record: MatchRecord {
                game_id: match_id,
                white_player_id: None,
                black_player_id: None,
                fen: initial_position,
                time_control,
                white_time: initial_secs,
                black_time: initial_secs,
                move_count: 0,
                wager,
                status: MatchStatus::Waiting,
                tournament,
                winner_id: None,
                end_reason: None,
                created_at: now.wall,
                completed_at: None,
            },
            clock: MatchClock::new(&time_control),
            draw_offer: None,
            opened_at_ms: now.mono_ms,
        }
    }

    pub fn id(&self) -> &MatchId {
        &self.record.game_id
    }

    pub fn status(&self) -> MatchStatus {
        self.record.status
    }

    pub fn record(&self) -> &MatchRecord {
        &self.record
    }

    pub fn clock(&self) -> &MatchClock {
        &self.clock
    }

    pub fn draw_offer(&self) -> Option<Side> {
        self.draw_offer
    }

    /// Запись с актуальными остатками времени на момент `now_ms`.
    pub fn snapshot(&self, now_ms: u64) -> MatchRecord {
        let mut record = self.record.clone();
        record.white_time = self.clock.remaining_secs(Side::White, now_ms);
        record.black_time = self.clock.remaining_secs(Side::Black, now_ms);
        record
    }

    /// Сесть в матч. Когда заняты оба места — матч стартует.
    ///
    /// Для турнирного матча оба места заняты заранее: первый из участников,
    /// кто "пришёл", запускает партию.
    pub fn join(&mut self, user_id: &UserId, now: Moment) -> Result<JoinOutcome, EngineError> {
        match self.record.status {
            MatchStatus::Waiting => {}
            MatchStatus::Playing => {
                return match self.record.side_of(user_id) {
                    Some(side) => Ok(JoinOutcome::AlreadySeated(side)),
                    None => Err(EngineError::MatchFull(self.id().clone())),
                };
            }
            status => {
                return Err(EngineError::InvalidStateTransition {
                    match_id: self.id().clone(),
                    status,
                    operation: "join",
                });
            }
        }

        let side = match self.record.side_of(user_id) {
            Some(side) => side,
            None => {
                let free = Side::ALL
                    .into_iter()
                    .find(|side| self.record.player(*side).is_none())
                    .ok_or_else(|| EngineError::MatchFull(self.id().clone()))?;
                *self.record.seat_mut(free) = Some(user_id.clone());
                if !self.record.has_both_players() {
                    return Ok(JoinOutcome::Seated(free));
                }
                free
            }
        };

        if !self.record.has_both_players() {
            return Ok(JoinOutcome::AlreadySeated(side));
        }

        self.start(now)?;
        Ok(JoinOutcome::Started(side))
    }

    /// `waiting → playing`: оба места заняты, запускаем часы белых.
    pub fn start(&mut self, now: Moment) -> Result<(), EngineError> {
        if self.record.status != MatchStatus::Waiting || !self.record.has_both_players() {
            return Err(EngineError::InvalidStateTransition {
                match_id: self.id().clone(),
                status: self.record.status,
                operation: "start",
            });
        }

        self.record.status = MatchStatus::Playing;
        self.clock.start(Side::White, now.mono_ms);

        info!(
            match_id = %self.record.game_id,
            white = ?self.record.white_player_id,
            black = ?self.record.black_player_id,
            "матч начался"
        );
        Ok(())
    }

    /// Применить ход участника.
    ///
    /// Перед ходом проверяем часы: если у ходящей стороны уже упал флажок,
    /// ход не принимается, а матч завершается по времени.
    pub fn apply_move(
        &mut self,
        user_id: &UserId,
        mv: &str,
        rules: &dyn MoveRules,
        now: Moment,
    ) -> Result<MoveOutcome, EngineError> {
        self.ensure_playing("move")?;
        let side = self.participant_side(user_id)?;

        if let Some(ack) = self.check_clock(rules, now)? {
            return Ok(MoveOutcome::Finished(ack));
        }

        let expected = self.record.side_to_move();
        if side != expected {
            return Err(EngineError::NotYourTurn {
                match_id: self.id().clone(),
                expected,
            });
        }

        let applied = rules
            .apply_move(&self.record.fen, side, mv)
            .map_err(|reason| EngineError::IllegalMove {
                match_id: self.id().clone(),
                mv: mv.to_string(),
                reason,
            })?;

        self.record.fen = applied.position;
        self.record.move_count += 1;

        // Ход соперника предложившего = отказ от ничьей.
        if self.draw_offer == Some(side.opponent()) {
            self.draw_offer = None;
        }

        if applied.verdict != PositionVerdict::Ongoing {
            let ack = self.terminate(
                &TerminationSignal::PositionDecided {
                    verdict: applied.verdict,
                },
                now,
            )?;
            return Ok(MoveOutcome::Finished(ack));
        }

        self.clock.pass_turn(now.mono_ms);

        Ok(MoveOutcome::Applied {
            move_count: self.record.move_count,
            side_to_move: self.record.side_to_move(),
        })
    }

    pub fn offer_draw(&mut self, user_id: &UserId) -> Result<(), EngineError> {
        self.ensure_playing("offer_draw")?;
        let side = self.participant_side(user_id)?;
        self.draw_offer = Some(side);
        Ok(())
    }

    /// Принять ничью. Допустимо только для соперника того, кто её предложил.
    pub fn accept_draw(&mut self, user_id: &UserId, now: Moment) -> Result<Acknowledgement, EngineError> {
        if self.record.status.is_terminal() {
            return Ok(Acknowledgement::duplicate(self.record.outcome()));
        }
        self.ensure_playing("accept_draw")?;
        let side = self.participant_side(user_id)?;

        if self.draw_offer != Some(side.opponent()) {
            return Err(EngineError::NoDrawOffer(self.id().clone()));
        }

        self.terminate(&TerminationSignal::AcceptDraw { by: user_id.clone() }, now)
    }

    pub fn resign(&mut self, user_id: &UserId, now: Moment) -> Result<Acknowledgement, EngineError> {
        self.terminate(&TerminationSignal::Resign { by: user_id.clone() }, now)
    }

    /// Записать итог по отключению. Победителя указывает тот, кто заметил
    /// потерю соединения; сессия его только проверяет и записывает.
    pub fn disconnect(&mut self, winner: &UserId, now: Moment) -> Result<Acknowledgement, EngineError> {
        self.terminate(&TerminationSignal::Disconnect { winner: winner.clone() }, now)
    }

    /// Создатель отменяет матч до прихода соперника.
    pub fn cancel(&mut self, user_id: &UserId, now: Moment) -> Result<Acknowledgement, EngineError> {
        self.terminate(
            &TerminationSignal::Abort {
                cause: AbortCause::CreatorCancelled { by: user_id.clone() },
            },
            now,
        )
    }

    pub fn abort(&mut self, now: Moment) -> Result<Acknowledgement, EngineError> {
        self.terminate(
            &TerminationSignal::Abort {
                cause: AbortCause::Administrative,
            },
            now,
        )
    }

    /// Проверка часов по запросу. Ничего не меняет, пока флажок не упал;
    /// после падения отдаёт подтверждение ровно один раз.
    pub fn check_clock(&mut self, rules: &dyn MoveRules, now: Moment) -> Result<Option<Acknowledgement>, EngineError> {
        if self.record.status != MatchStatus::Playing {
            return Ok(None);
        }

        let Some(side) = self.clock.poll_expiry(now.mono_ms) else {
            return Ok(None);
        };

        let verdict = rules.timeout_verdict(&self.record.fen, side);
        self.terminate(&TerminationSignal::ClockExpired { side, verdict }, now)
            .map(Some)
    }

    /// Таймаут ожидания: обычный матч ждёт соперника, турнирный ждёт
    /// явки обоих участников. Отсчёт идёт с момента открытия матча.
    pub fn check_join_timeout(
        &mut self,
        timeout_ms: u64,
        now: Moment,
    ) -> Result<Option<Acknowledgement>, EngineError> {
        if self.record.status != MatchStatus::Waiting {
            return Ok(None);
        }
        if now.mono_ms.saturating_sub(self.opened_at_ms) < timeout_ms {
            return Ok(None);
        }

        self.terminate(
            &TerminationSignal::Abort {
                cause: AbortCause::JoinTimeout,
            },
            now,
        )
        .map(Some)
    }

    /// Единственная точка перехода в терминальный статус.
    fn terminate(&mut self, signal: &TerminationSignal, now: Moment) -> Result<Acknowledgement, EngineError> {
        let ack = resolver::resolve(&mut self.record, signal, now.wall)?;

        if ack.applied {
            self.clock.halt(now.mono_ms);
            self.draw_offer = None;
            self.record.white_time = self.clock.remaining_secs(Side::White, now.mono_ms);
            self.record.black_time = self.clock.remaining_secs(Side::Black, now.mono_ms);
        }

        Ok(ack)
    }

    fn ensure_playing(&self, operation: &'static str) -> Result<(), EngineError> {
        if self.record.status != MatchStatus::Playing {
            return Err(EngineError::InvalidStateTransition {
                match_id: self.id().clone(),
                status: self.record.status,
                operation,
            });
        }
        Ok(())
    }

    fn participant_side(&self, user_id: &UserId) -> Result<Side, EngineError> {
        self.record
            .side_of(user_id)
            .ok_or_else(|| EngineError::UnknownParticipant {
                match_id: self.id().clone(),
                user_id: user_id.clone(),
            })
    }
}
