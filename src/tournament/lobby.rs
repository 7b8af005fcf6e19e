// src/tournament/lobby.rs

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::domain::{Tournament, TournamentId};

/// Ссылка на турнир. Замок турнира сериализует все уведомления о
/// завершении его матчей, чтобы два одновременных финиша в одном раунде
/// не испортили запись мест.
pub type TournamentHandle = Arc<Mutex<Tournament>>;

/// Турнирное лобби:
/// - хранит идущие турниры в памяти;
/// - выдаёт замок конкретного турнира.
///
/// Завершённые турниры выгружаются, выгруженные поднимаются из хранилища.
#[derive(Default)]
pub struct TournamentLobby {
    tournaments: DashMap<TournamentId, TournamentHandle>,
}

impl TournamentLobby {
    /// Пустое лобби, без турниров.
    pub fn new() -> Self {
        Self::default()
    }

    /// Добавить турнир. Если турнир с таким id уже был — заменяем.
    pub fn insert(&self, tournament: Tournament) -> TournamentHandle {
        let id = tournament.id.clone();
        let handle = Arc::new(Mutex::new(tournament));
        self.tournaments.insert(id, handle.clone());
        handle
    }

    /// Получить турнир по id.
    pub fn get(&self, id: &TournamentId) -> Option<TournamentHandle> {
        self.tournaments.get(id).map(|entry| entry.value().clone())
    }

    /// Турнир, поднятый из хранилища. Если другой поток уже вернул его
    /// в лобби, остаётся прежний замок, а копия отбрасывается.
    pub fn get_or_insert(&self, tournament: Tournament) -> TournamentHandle {
        self.tournaments
            .entry(tournament.id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(tournament)))
            .value()
            .clone()
    }

    /// Выгрузить турнир из памяти. Запись в хранилище остаётся.
    pub fn remove(&self, id: &TournamentId) -> Option<TournamentHandle> {
        self.tournaments.remove(id).map(|(_, handle)| handle)
    }

    pub fn contains(&self, id: &TournamentId) -> bool {
        self.tournaments.contains_key(id)
    }

    pub fn is_empty(&self) -> bool {
        self.tournaments.is_empty()
    }
}
