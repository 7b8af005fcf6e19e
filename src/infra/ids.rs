use std::sync::atomic::{AtomicU64, Ordering};

use crate::domain::{MatchId, TournamentId};

/// Простая генерация ID на основе монотонных счётчиков.
///
/// Префикс отделяет процессы/инстансы друг от друга, если их несколько
/// пишут в одно хранилище.
#[derive(Debug)]
pub struct IdGenerator {
    prefix: String,
    match_counter: AtomicU64,
    tournament_counter: AtomicU64,
}

impl IdGenerator {
    /// Создать генератор с начальным значением 1 для всех сущностей.
    pub fn new() -> Self {
        Self::with_prefix("")
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            match_counter: AtomicU64::new(1),
            tournament_counter: AtomicU64::new(1),
        }
    }

    #[inline]
    pub fn next_match_id(&self) -> MatchId {
        let n = self.match_counter.fetch_add(1, Ordering::Relaxed);
        MatchId(format!("{}m-{}", self.prefix, n))
    }

    #[inline]
    pub fn next_tournament_id(&self) -> TournamentId {
        let n = self.tournament_counter.fetch_add(1, Ordering::Relaxed);
        TournamentId(format!("{}t-{}", self.prefix, n))
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
