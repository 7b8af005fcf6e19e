use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::{MatchId, MatchRecord, Tournament, TournamentId};

/// Ошибки хранилища.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Запись {0} не найдена")]
    NotFound(String),

    #[error("Запись {0} уже существует")]
    Conflict(String),

    #[error("Хранилище недоступно: {0}")]
    Unavailable(String),

    #[error("Запись отклонена: {0}")]
    Rejected(String),
}

/// Абстракция хранилища матчей и турниров.
///
/// Движок зависит только от этого трейта; конкретная технология
/// хранения — внешний коллаборатор.
#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Создать запись матча.
    async fn create_match(&self, record: &MatchRecord) -> Result<(), StoreError>;

    /// Атомарно заменить изменяемые поля существующей записи.
    async fn update_match(&self, record: &MatchRecord) -> Result<(), StoreError>;

    async fn get_match(&self, id: &MatchId) -> Result<Option<MatchRecord>, StoreError>;

    /// Найти матч турнира по раунду и номеру.
    async fn find_tournament_match(
        &self,
        tournament_id: &TournamentId,
        round: u32,
        match_number: u32,
    ) -> Result<Option<MatchRecord>, StoreError>;

    /// Матчи турнира, упорядоченные по раунду, затем по номеру.
    async fn list_tournament_matches(
        &self,
        tournament_id: &TournamentId,
    ) -> Result<Vec<MatchRecord>, StoreError>;

    /// Матчи, созданные в окне `[from, to)`.
    async fn list_matches_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<MatchRecord>, StoreError>;

    /// Сохранить турнир целиком (вместе с сеткой и участниками).
    async fn save_tournament(&self, tournament: &Tournament) -> Result<(), StoreError>;

    async fn get_tournament(&self, id: &TournamentId) -> Result<Option<Tournament>, StoreError>;

    /// Турниры, созданные в окне `[from, to)`, с участниками.
    async fn list_tournaments_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Tournament>, StoreError>;
}

/// Простая in-memory реализация для тестов и локального запуска.
#[derive(Debug, Default)]
pub struct InMemoryMatchStore {
    matches: RwLock<HashMap<MatchId, MatchRecord>>,
    tournaments: RwLock<HashMap<TournamentId, Tournament>>,
    /// Сколько ближайших `update_match` должно упасть (для тестов ретраев).
    failing_updates: AtomicU32,
}

impl InMemoryMatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Заставить следующие `count` вызовов `update_match` вернуть `Unavailable`.
    pub fn fail_next_updates(&self, count: u32) {
        self.failing_updates.store(count, Ordering::SeqCst);
    }

    pub fn match_count(&self) -> usize {
        self.matches.read().map(|m| m.len()).unwrap_or(0)
    }

    fn take_failure(&self) -> bool {
        self.failing_updates
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Unavailable("lock poisoned".into())
}

fn in_window(ts: DateTime<Utc>, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
    ts >= from && ts < to
}

#[async_trait]
impl MatchStore for InMemoryMatchStore {
    async fn create_match(&self, record: &MatchRecord) -> Result<(), StoreError> {
        record.check_invariants().map_err(StoreError::Rejected)?;
        let mut matches = self.matches.write().map_err(poisoned)?;
        if matches.contains_key(&record.game_id) {
            return Err(StoreError::Conflict(record.game_id.to_string()));
        }
        matches.insert(record.game_id.clone(), record.clone());
        Ok(())
    }

    async fn update_match(&self, record: &MatchRecord) -> Result<(), StoreError> {
        if self.take_failure() {
            return Err(StoreError::Unavailable("injected failure".into()));
        }
        record.check_invariants().map_err(StoreError::Rejected)?;
        let mut matches = self.matches.write().map_err(poisoned)?;
        match matches.get_mut(&record.game_id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(record.game_id.to_string())),
        }
    }

    async fn get_match(&self, id: &MatchId) -> Result<Option<MatchRecord>, StoreError> {
        let matches = self.matches.read().map_err(poisoned)?;
        Ok(matches.get(id).cloned())
    }

    async fn find_tournament_match(
        &self,
        tournament_id: &TournamentId,
        round: u32,
        match_number: u32,
    ) -> Result<Option<MatchRecord>, StoreError> {
        let matches = self.matches.read().map_err(poisoned)?;
        Ok(matches
            .values()
            .find(|m| {
                m.tournament.as_ref().is_some_and(|link| {
                    &link.tournament_id == tournament_id
                        && link.round == round
                        && link.match_number == match_number
                })
            })
            .cloned())
    }

    async fn list_tournament_matches(
        &self,
        tournament_id: &TournamentId,
    ) -> Result<Vec<MatchRecord>, StoreError> {
        let matches = self.matches.read().map_err(poisoned)?;
        let mut result: Vec<MatchRecord> = matches
            .values()
            .filter(|m| {
                m.tournament
                    .as_ref()
                    .is_some_and(|link| &link.tournament_id == tournament_id)
            })
            .cloned()
            .collect();

        result.sort_by_key(|m| {
            m.tournament
                .as_ref()
                .map(|link| (link.round, link.match_number))
                .unwrap_or_default()
        });
        Ok(result)
    }

    async fn list_matches_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<MatchRecord>, StoreError> {
        let matches = self.matches.read().map_err(poisoned)?;
        let mut result: Vec<MatchRecord> = matches
            .values()
            .filter(|m| in_window(m.created_at, from, to))
            .cloned()
            .collect();
        result.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.game_id.cmp(&b.game_id)));
        Ok(result)
    }

    async fn save_tournament(&self, tournament: &Tournament) -> Result<(), StoreError> {
        let mut tournaments = self.tournaments.write().map_err(poisoned)?;
        tournaments.insert(tournament.id.clone(), tournament.clone());
        Ok(())
    }

    async fn get_tournament(&self, id: &TournamentId) -> Result<Option<Tournament>, StoreError> {
        let tournaments = self.tournaments.read().map_err(poisoned)?;
        Ok(tournaments.get(id).cloned())
    }

    async fn list_tournaments_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Tournament>, StoreError> {
        let tournaments = self.tournaments.read().map_err(poisoned)?;
        let mut result: Vec<Tournament> = tournaments
            .values()
            .filter(|t| in_window(t.created_at, from, to))
            .cloned()
            .collect();
        result.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(result)
    }
}
