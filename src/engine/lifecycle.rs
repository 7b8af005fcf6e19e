// src/engine/lifecycle.rs
//! `ArenaEngine` — координатор жизненного цикла:
//! - реестр живых сессий;
//! - хранилище (через `MatchStore`);
//! - турнирное лобби и менеджер сетки.
//!
//! Порядок замков: сессия → турнир. Обратного порядка нет нигде.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::domain::{
    MatchId, MatchOutcome, MatchRecord, MatchStatus, Side, Tournament, TournamentId,
    TournamentLink, UserId,
};
use crate::engine::errors::EngineError;
use crate::engine::registry::{RegistryError, SessionHandle, SessionRegistry};
use crate::engine::resolver::Acknowledgement;
use crate::engine::rules::MoveRules;
use crate::engine::session::{JoinOutcome, MatchSession, MoveOutcome};
use crate::infra::{retry_with_backoff, IdGenerator, MatchStore, StoreError};
use crate::time_ctrl::{Moment, TimeControl, TimeSource};
use crate::tournament::{
    BracketEvent, BracketManager, NewTournament, Seeding, TournamentHandle, TournamentLobby,
};

/// Запрос на создание обычного матча.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CreateMatchRequest {
    pub creator: UserId,
    /// За какую сторону садится создатель.
    pub side: Side,
    pub time_control: TimeControl,
    #[serde(default)]
    pub wager: Option<u64>,
}

/// Запрос на создание турнира.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CreateTournamentRequest {
    pub name: String,
    pub participants: Vec<UserId>,
    #[serde(default)]
    pub bracket_size: Option<u32>,
    #[serde(default)]
    pub seeding: Seeding,
    pub time_control: TimeControl,
}

/// Текущее состояние матча для чтения.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchView {
    pub record: MatchRecord,
    /// `true` — матч ещё в реестре (не завершён).
    pub live: bool,
    pub draw_offer: Option<Side>,
}

/// Итог одного обхода живых сессий.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub inspected: usize,
    /// Матчи, завершённые по времени.
    pub clock_expired: Vec<MatchId>,
    /// Матчи, отменённые из-за таймаута ожидания.
    pub join_timeouts: Vec<MatchId>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.clock_expired.is_empty() && self.join_timeouts.is_empty()
    }
}

pub struct ArenaEngine {
    config: EngineConfig,
    registry: SessionRegistry,
    lobby: TournamentLobby,
    store: Arc<dyn MatchStore>,
    rules: Arc<dyn MoveRules>,
    time: Arc<dyn TimeSource>,
    ids: IdGenerator,
}

fn store_failure(e: StoreError) -> EngineError {
    EngineError::PersistenceFailure(e.to_string())
}

impl ArenaEngine {
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn MatchStore>,
        rules: Arc<dyn MoveRules>,
        time: Arc<dyn TimeSource>,
    ) -> Result<Self, EngineError> {
        config.validate().map_err(EngineError::InvalidConfig)?;
        Ok(Self {
            config,
            registry: SessionRegistry::new(),
            lobby: TournamentLobby::new(),
            store,
            rules,
            time,
            ids: IdGenerator::new(),
        })
    }

    /// Заменить генератор ID (например, префикс инстанса).
    pub fn with_ids(mut self, ids: IdGenerator) -> Self {
        self.ids = ids;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn lobby(&self) -> &TournamentLobby {
        &self.lobby
    }

    pub fn store(&self) -> &Arc<dyn MatchStore> {
        &self.store
    }

    pub fn now(&self) -> Moment {
        self.time.now()
    }

    // ---------- матчи ----------

    /// Создать обычный матч: создатель сидит, второе место свободно.
    pub async fn create_match(&self, req: CreateMatchRequest) -> Result<MatchRecord, EngineError> {
        self.config.check_time_control(&req.time_control)?;

        let now = self.time.now();
        let match_id = self.ids.next_match_id();
        let session = MatchSession::open_casual(
            match_id.clone(),
            req.creator.clone(),
            req.side,
            req.time_control,
            req.wager,
            self.rules.initial_position(),
            now,
        );
        let record = session.record().clone();

        self.store.create_match(&record).await.map_err(store_failure)?;
        self.registry.register(session)?;

        info!(
            match_id = %match_id,
            creator = %req.creator,
            side = %req.side,
            time_control = req.time_control.initial_secs,
            "матч создан"
        );
        Ok(record)
    }

    pub async fn join_match(&self, match_id: &MatchId, user_id: &UserId) -> Result<JoinOutcome, EngineError> {
        let handle = self.live_session(match_id, "join").await?;
        let mut session = handle.lock().await;
        let now = self.time.now();

        let outcome = session.join(user_id, now)?;
        if !matches!(outcome, JoinOutcome::AlreadySeated(_)) {
            info!(match_id = %match_id, user_id = %user_id, ?outcome, "участник сел в матч");
            self.persist_progress(&session.snapshot(now.mono_ms)).await;
        }
        Ok(outcome)
    }

    /// Явный старт матча, у которого оба места уже заняты (турнирный check-in).
    pub async fn start_match(&self, match_id: &MatchId) -> Result<MatchRecord, EngineError> {
        let handle = self.live_session(match_id, "start").await?;
        let mut session = handle.lock().await;
        let now = self.time.now();

        session.start(now)?;
        let record = session.snapshot(now.mono_ms);
        self.persist_progress(&record).await;
        Ok(record)
    }

    pub async fn submit_move(
        &self,
        match_id: &MatchId,
        user_id: &UserId,
        mv: &str,
    ) -> Result<MoveOutcome, EngineError> {
        let handle = self.live_session(match_id, "move").await?;
        let mut session = handle.lock().await;
        let now = self.time.now();

        let outcome = session.apply_move(user_id, mv, self.rules.as_ref(), now)?;
        match &outcome {
            MoveOutcome::Applied { .. } => {
                self.persist_progress(&session.snapshot(now.mono_ms)).await;
            }
            MoveOutcome::Finished(ack) if ack.applied => {
                self.finalize(session.record().clone()).await;
            }
            MoveOutcome::Finished(_) => {}
        }
        Ok(outcome)
    }

    pub async fn offer_draw(&self, match_id: &MatchId, user_id: &UserId) -> Result<(), EngineError> {
        let handle = self.live_session(match_id, "offer_draw").await?;
        let mut session = handle.lock().await;
        session.offer_draw(user_id)?;
        debug!(match_id = %match_id, user_id = %user_id, "предложена ничья");
        Ok(())
    }

    pub async fn accept_draw(&self, match_id: &MatchId, user_id: &UserId) -> Result<Acknowledgement, EngineError> {
        self.terminate_with(match_id, |session, now| session.accept_draw(user_id, now))
            .await
    }

    pub async fn resign(&self, match_id: &MatchId, user_id: &UserId) -> Result<Acknowledgement, EngineError> {
        self.terminate_with(match_id, |session, now| session.resign(user_id, now))
            .await
    }

    /// Сигнал отключения. Победителя указывает тот, кто заметил потерю
    /// соединения; транспорт ненадёжен, повторы безопасны.
    pub async fn report_disconnection(
        &self,
        match_id: &MatchId,
        winner: &UserId,
    ) -> Result<Acknowledgement, EngineError> {
        self.terminate_with(match_id, |session, now| session.disconnect(winner, now))
            .await
    }

    pub async fn cancel_match(&self, match_id: &MatchId, user_id: &UserId) -> Result<Acknowledgement, EngineError> {
        self.terminate_with(match_id, |session, now| session.cancel(user_id, now))
            .await
    }

    /// Административная отмена (`waiting` или `playing`).
    pub async fn abort_match(&self, match_id: &MatchId) -> Result<Acknowledgement, EngineError> {
        self.terminate_with(match_id, |session, now| session.abort(now))
            .await
    }

    /// Проверка часов и таймаута ожидания по запросу.
    ///
    /// `None` — ничего не произошло (или матч уже закрыт).
    pub async fn check_clock(&self, match_id: &MatchId) -> Result<Option<Acknowledgement>, EngineError> {
        match self.registry.lookup(match_id) {
            Ok(handle) => self.inspect(&handle).await,
            Err(RegistryError::Terminal(_)) => Ok(None),
            Err(RegistryError::NotFound(_)) => match self.store.get_match(match_id).await.map_err(store_failure)? {
                Some(record) if record.status.is_terminal() => Ok(None),
                _ => Err(EngineError::MatchNotFound(match_id.clone())),
            },
            Err(e) => Err(e.into()),
        }
    }

    /// Один обход всех живых сессий.
    pub async fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();

        for (match_id, handle) in self.registry.live_sessions() {
            report.inspected += 1;
            match self.inspect(&handle).await {
                Ok(Some(ack)) if ack.applied => match ack.outcome.status {
                    MatchStatus::Completed => report.clock_expired.push(match_id),
                    MatchStatus::Aborted => report.join_timeouts.push(match_id),
                    _ => {}
                },
                Ok(_) => {}
                Err(err) => {
                    warn!(match_id = %match_id, error = %err, "проверка сессии не удалась");
                }
            }
        }

        report
    }

    /// Состояние матча: из живой сессии или из истории.
    pub async fn match_view(&self, match_id: &MatchId) -> Result<MatchView, EngineError> {
        if let Ok(handle) = self.registry.lookup(match_id) {
            let session = handle.lock().await;
            let now = self.time.now();
            return Ok(MatchView {
                record: session.snapshot(now.mono_ms),
                live: !session.status().is_terminal(),
                draw_offer: session.draw_offer(),
            });
        }

        match self.store.get_match(match_id).await.map_err(store_failure)? {
            Some(record) => Ok(MatchView {
                record,
                live: false,
                draw_offer: None,
            }),
            None => Err(EngineError::MatchNotFound(match_id.clone())),
        }
    }

    // ---------- турниры ----------

    /// Построить сетку, создать матчи первого раунда, сохранить турнир.
    pub async fn create_tournament(&self, req: CreateTournamentRequest) -> Result<Tournament, EngineError> {
        self.config.check_time_control(&req.time_control)?;

        let now = self.time.now();
        let (tournament, events) = BracketManager::build(NewTournament {
            id: self.ids.next_tournament_id(),
            name: req.name,
            participants: req.participants,
            bracket_size: req.bracket_size,
            seeding: req.seeding,
            time_control: req.time_control,
            created_at: now.wall,
        })?;

        let handle = self.lobby.insert(tournament);
        let mut tournament = handle.lock().await;
        self.materialize(&mut tournament, &events).await;
        self.save_tournament(&tournament).await?;

        Ok(tournament.clone())
    }

    /// Победитель тай-брейка для матча сетки, сыгранного вничью.
    pub async fn report_tiebreak(
        &self,
        tournament_id: &TournamentId,
        round: u32,
        match_number: u32,
        winner: &UserId,
    ) -> Result<Vec<BracketEvent>, EngineError> {
        let handle = self.tournament_handle(tournament_id).await?;
        let mut tournament = handle.lock().await;

        let result = BracketManager::report_tiebreak(&mut tournament, round, match_number, winner);
        if let Ok(events) = &result {
            self.materialize(&mut tournament, events).await;
        }
        self.save_tournament(&tournament).await?;
        self.unload_if_concluded(&tournament);
        result
    }

    pub async fn tournament(&self, tournament_id: &TournamentId) -> Result<Tournament, EngineError> {
        if let Some(handle) = self.lobby.get(tournament_id) {
            return Ok(handle.lock().await.clone());
        }
        self.store
            .get_tournament(tournament_id)
            .await
            .map_err(store_failure)?
            .ok_or_else(|| EngineError::TournamentNotFound(tournament_id.clone()))
    }

    // ---------- внутреннее ----------

    /// Живая сессия для не-терминальной операции.
    async fn live_session(&self, match_id: &MatchId, operation: &'static str) -> Result<SessionHandle, EngineError> {
        match self.registry.lookup(match_id) {
            Ok(handle) => Ok(handle),
            Err(RegistryError::Terminal(outcome)) => Err(EngineError::InvalidStateTransition {
                match_id: outcome.match_id,
                status: outcome.status,
                operation,
            }),
            Err(RegistryError::NotFound(_)) => {
                match self.store.get_match(match_id).await.map_err(store_failure)? {
                    Some(record) if record.status.is_terminal() => Err(EngineError::InvalidStateTransition {
                        match_id: record.game_id,
                        status: record.status,
                        operation,
                    }),
                    _ => Err(EngineError::MatchNotFound(match_id.clone())),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Общий путь всех сигналов завершения.
    ///
    /// Сигнал к уже закрытому матчу получает подтверждение с записанным итогом:
    /// из реестра (матч выселяется) или из истории (уже выселен).
    async fn terminate_with<F>(&self, match_id: &MatchId, signal: F) -> Result<Acknowledgement, EngineError>
    where
        F: FnOnce(&mut MatchSession, Moment) -> Result<Acknowledgement, EngineError>,
    {
        let handle = match self.registry.lookup(match_id) {
            Ok(handle) => handle,
            Err(RegistryError::Terminal(outcome)) => {
                debug!(match_id = %match_id, status = %outcome.status, "сигнал к завершающемуся матчу");
                return Ok(Acknowledgement::duplicate(outcome));
            }
            Err(RegistryError::NotFound(_)) => return self.ack_from_history(match_id).await,
            Err(e) => return Err(e.into()),
        };

        let mut session = handle.lock().await;
        let now = self.time.now();

        let ack = match signal(&mut *session, now) {
            Ok(ack) => ack,
            Err(EngineError::InvalidStateTransition { operation, .. }) => {
                debug!(
                    match_id = %match_id,
                    status = %session.status(),
                    operation,
                    "сигнал неприменим, подтверждаем текущее состояние"
                );
                Acknowledgement::duplicate(session.record().outcome())
            }
            Err(e) => return Err(e),
        };

        if ack.applied {
            self.finalize(session.record().clone()).await;
        }
        Ok(ack)
    }

    /// Поздний сигнал: сессии уже нет, отвечаем по истории.
    async fn ack_from_history(&self, match_id: &MatchId) -> Result<Acknowledgement, EngineError> {
        match self.store.get_match(match_id).await.map_err(store_failure)? {
            Some(record) if record.status.is_terminal() => {
                debug!(match_id = %match_id, "поздний сигнал, итог из истории");
                Ok(Acknowledgement::duplicate(record.outcome()))
            }
            _ => Err(EngineError::MatchNotFound(match_id.clone())),
        }
    }

    async fn inspect(&self, handle: &SessionHandle) -> Result<Option<Acknowledgement>, EngineError> {
        let mut session = handle.lock().await;
        let now = self.time.now();

        let ack = match session.check_clock(self.rules.as_ref(), now)? {
            Some(ack) => Some(ack),
            None => session.check_join_timeout(self.config.join_timeout_ms(), now)?,
        };

        if let Some(ack) = &ack {
            if ack.applied {
                self.finalize(session.record().clone()).await;
            }
        }
        Ok(ack)
    }

    /// После терминального перехода: пометить, сохранить, уведомить сетку, выселить.
    ///
    /// Вызывается под замком сессии, поэтому параллельные сигналы ждут
    /// или получают итог из реестра.
    async fn finalize(&self, record: MatchRecord) {
        let outcome = record.outcome();
        self.registry.mark_terminal(outcome.clone());

        let store = &self.store;
        let rec = &record;
        let written = retry_with_backoff(&self.config.persistence_retry, "update_match", move || {
            store.update_match(rec)
        })
        .await;

        if let Err(exhausted) = written {
            // Операционный алерт: итог есть только в логе.
            error!(
                match_id = %record.game_id,
                attempts = exhausted.attempts,
                error = %exhausted.last_error,
                status = %outcome.status,
                reason = ?outcome.end_reason,
                winner = ?outcome.winner_id,
                "итог матча не сохранён, матч выселен без записи"
            );
        }

        if let Some(link) = &record.tournament {
            self.notify_bracket(link, &outcome).await;
        }

        self.registry.unregister(&record.game_id);
    }

    /// Уведомить сетку о завершении турнирного матча.
    async fn notify_bracket(&self, link: &TournamentLink, outcome: &MatchOutcome) {
        let handle = match self.tournament_handle(&link.tournament_id).await {
            Ok(handle) => handle,
            Err(err) => {
                error!(
                    tournament_id = %link.tournament_id,
                    match_id = %outcome.match_id,
                    status = %outcome.status,
                    winner = ?outcome.winner_id,
                    error = %err,
                    "турнир недоступен, итог матча не передан в сетку"
                );
                return;
            }
        };
        let mut tournament = handle.lock().await;

        // Отменённый матч продвижения не даёт, как и ничья.
        let winner = match outcome.status {
            MatchStatus::Completed => outcome.winner_id.as_ref(),
            _ => None,
        };

        match BracketManager::on_match_completed(&mut tournament, link.round, link.match_number, winner) {
            Ok(events) => self.materialize(&mut tournament, &events).await,
            Err(err) => {
                warn!(
                    tournament_id = %link.tournament_id,
                    round = link.round,
                    match_number = link.match_number,
                    error = %err,
                    "сетка не приняла итог матча"
                );
            }
        }

        match self.save_tournament(&tournament).await {
            Ok(()) => self.unload_if_concluded(&tournament),
            Err(err) => {
                error!(tournament_id = %tournament.id, error = %err, "турнир не сохранён");
            }
        }
    }

    /// Замок турнира: из лобби или, если турнир выгружен, из хранилища.
    async fn tournament_handle(&self, tournament_id: &TournamentId) -> Result<TournamentHandle, EngineError> {
        if let Some(handle) = self.lobby.get(tournament_id) {
            return Ok(handle);
        }

        let tournament = self
            .store
            .get_tournament(tournament_id)
            .await
            .map_err(store_failure)?
            .ok_or_else(|| EngineError::TournamentNotFound(tournament_id.clone()))?;
        debug!(tournament_id = %tournament_id, "турнир поднят из хранилища");
        Ok(self.lobby.get_or_insert(tournament))
    }

    /// Завершённый и сохранённый турнир больше не держим в памяти.
    fn unload_if_concluded(&self, tournament: &Tournament) {
        if tournament.is_concluded() {
            self.lobby.remove(&tournament.id);
            debug!(tournament_id = %tournament.id, "турнир выгружен из лобби");
        }
    }

    /// Создать сессии для матчей, которые сетка объявила готовыми.
    async fn materialize(&self, tournament: &mut Tournament, events: &[BracketEvent]) {
        for event in events {
            let BracketEvent::MatchReady {
                round,
                match_number,
                white,
                black,
            } = event
            else {
                continue;
            };

            if let Err(err) = self
                .open_bracket_match(tournament, *round, *match_number, white, black)
                .await
            {
                error!(
                    tournament_id = %tournament.id,
                    round,
                    match_number,
                    error = %err,
                    "не удалось создать матч сетки"
                );
            }
        }
    }

    async fn open_bracket_match(
        &self,
        tournament: &mut Tournament,
        round: u32,
        match_number: u32,
        white: &UserId,
        black: &UserId,
    ) -> Result<(), EngineError> {
        let now = self.time.now();
        let match_id = self.ids.next_match_id();
        let link = TournamentLink {
            tournament_id: tournament.id.clone(),
            round,
            match_number,
        };

        let session = MatchSession::open_tournament(
            match_id.clone(),
            link,
            white.clone(),
            black.clone(),
            tournament.time_control,
            self.rules.initial_position(),
            now,
        );

        self.store.create_match(session.record()).await.map_err(store_failure)?;
        self.registry.register(session)?;
        BracketManager::bind_match(tournament, round, match_number, match_id.clone())?;

        info!(
            tournament_id = %tournament.id,
            match_id = %match_id,
            round,
            match_number,
            white = %white,
            black = %black,
            "матч сетки создан"
        );
        Ok(())
    }

    /// Запись не-терминального состояния. Живая сессия остаётся главной,
    /// поэтому неудача только логируется.
    async fn persist_progress(&self, record: &MatchRecord) {
        let store = &self.store;
        let written = retry_with_backoff(&self.config.persistence_retry, "update_match", move || {
            store.update_match(record)
        })
        .await;

        if let Err(exhausted) = written {
            error!(
                match_id = %record.game_id,
                attempts = exhausted.attempts,
                error = %exhausted.last_error,
                "состояние матча не сохранено"
            );
        }
    }

    async fn save_tournament(&self, tournament: &Tournament) -> Result<(), EngineError> {
        let store = &self.store;
        retry_with_backoff(&self.config.persistence_retry, "save_tournament", move || {
            store.save_tournament(tournament)
        })
        .await
        .map_err(|exhausted| store_failure(exhausted.last_error))
    }
}
