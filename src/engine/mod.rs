//! Движок жизненного цикла матчей.
//!
//! Высокоуровневый объект: `ArenaEngine`
//! Основные операции:
//!   - `create_match` / `join_match` / `start_match` – создание и старт матча
//!   - `submit_move`, `offer_draw`, `accept_draw` – ход партии
//!   - `resign`, `report_disconnection`, `cancel_match`, `abort_match` – завершение
//!   - `check_clock`, `sweep` – проверка часов и таймаута ожидания
//!
//! Любой переход в терминальный статус проходит через `resolver::resolve`.

pub mod errors;
pub mod lifecycle;
pub mod registry;
pub mod resolver;
pub mod rules;
pub mod session;
pub mod sweeper;

pub use errors::EngineError;
pub use lifecycle::{
    ArenaEngine, CreateMatchRequest, CreateTournamentRequest, MatchView, SweepReport,
};
pub use registry::{RegistryError, SessionHandle, SessionRegistry};
pub use resolver::{resolve, AbortCause, Acknowledgement, TerminationSignal};
pub use rules::{AppliedMove, MoveRules, PositionVerdict, TimeoutVerdict, UncheckedRules};
pub use session::{JoinOutcome, MatchSession, MoveOutcome};
pub use sweeper::{spawn_sweeper, SweeperHandle};
