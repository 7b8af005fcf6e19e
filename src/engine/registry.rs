// src/engine/registry.rs

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::{MatchId, MatchOutcome};
use crate::engine::errors::EngineError;
use crate::engine::session::MatchSession;

/// Ссылка на живую сессию. Замок сессии — единственная точка сериализации
/// всех сигналов одного матча.
pub type SessionHandle = Arc<Mutex<MatchSession>>;

/// Ошибки реестра.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum RegistryError {
    /// Такого матча в реестре нет. Вызывающему стоит посмотреть историю в хранилище.
    #[error("Матч {0} не зарегистрирован")]
    NotFound(MatchId),

    /// Матч уже завершён и ждёт выселения из реестра.
    #[error("Матч {} уже завершён ({})", .0.match_id, .0.status)]
    Terminal(MatchOutcome),

    #[error("Матч {0} уже зарегистрирован")]
    AlreadyRegistered(MatchId),
}

impl From<RegistryError> for EngineError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::NotFound(id) => EngineError::MatchNotFound(id),
            RegistryError::AlreadyRegistered(id) => EngineError::AlreadyRegistered(id),
            RegistryError::Terminal(outcome) => EngineError::InvalidStateTransition {
                match_id: outcome.match_id,
                status: outcome.status,
                operation: "lookup",
            },
        }
    }
}

/// Запись реестра.
enum RegistryEntry {
    Live(SessionHandle),
    /// Матч завершён, итог записан, идёт сохранение перед выселением.
    Retiring(MatchOutcome),
}

/// Реестр живых сессий процесса: `MatchId -> сессия`.
///
/// Замки шардов `DashMap` держатся только на время операции над картой,
/// замок самой сессии берёт вызывающий.
#[derive(Default)]
pub struct SessionRegistry {
    entries: DashMap<MatchId, RegistryEntry>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Зарегистрировать новую сессию.
    pub fn register(&self, session: MatchSession) -> Result<SessionHandle, RegistryError> {
        let match_id = session.id().clone();
        match self.entries.entry(match_id.clone()) {
            Entry::Occupied(_) => Err(RegistryError::AlreadyRegistered(match_id)),
            Entry::Vacant(slot) => {
                let handle: SessionHandle = Arc::new(Mutex::new(session));
                slot.insert(RegistryEntry::Live(handle.clone()));
                debug!(match_id = %match_id, "сессия зарегистрирована");
                Ok(handle)
            }
        }
    }

    /// Найти живую сессию.
    ///
    /// `NotFound` и `Terminal` различаются: во втором случае матч существует,
    /// но уже закрыт, и итог возвращается сразу.
    pub fn lookup(&self, match_id: &MatchId) -> Result<SessionHandle, RegistryError> {
        match self.entries.get(match_id).as_deref() {
            Some(RegistryEntry::Live(handle)) => Ok(handle.clone()),
            Some(RegistryEntry::Retiring(outcome)) => Err(RegistryError::Terminal(outcome.clone())),
            None => Err(RegistryError::NotFound(match_id.clone())),
        }
    }

    /// Пометить сессию завершённой: новые поиски сразу получают итог,
    /// без захвата замка сессии.
    pub fn mark_terminal(&self, outcome: MatchOutcome) {
        if let Some(mut entry) = self.entries.get_mut(&outcome.match_id) {
            *entry = RegistryEntry::Retiring(outcome);
        }
    }

    /// Удалить матч из реестра. Возвращает `true`, если запись была.
    pub fn unregister(&self, match_id: &MatchId) -> bool {
        let removed = self.entries.remove(match_id).is_some();
        if removed {
            debug!(match_id = %match_id, "сессия выселена из реестра");
        }
        removed
    }

    pub fn contains(&self, match_id: &MatchId) -> bool {
        self.entries.contains_key(match_id)
    }

    /// Снимок всех живых (не завершённых) сессий — для периодической проверки.
    pub fn live_sessions(&self) -> Vec<(MatchId, SessionHandle)> {
        self.entries
            .iter()
            .filter_map(|entry| match entry.value() {
                RegistryEntry::Live(handle) => Some((entry.key().clone(), handle.clone())),
                RegistryEntry::Retiring(_) => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
