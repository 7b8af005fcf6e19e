// src/engine/rules.rs
//! Шов к внешнему движку правил.
//!
//! Легальность ходов, представление доски и поиск мата/пата живут снаружи.
//! Сессия матча только спрашивает движок правил и хранит его снимок позиции.

use serde::{Deserialize, Serialize};

use crate::domain::Side;

/// Что движок правил думает о позиции после хода.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum PositionVerdict {
    Ongoing,
    /// Мат или эквивалентная решающая позиция.
    Checkmate { winner: Side },
    /// Пат или иная ничейная позиция по правилам.
    Drawn,
}

/// Результат применения хода.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppliedMove {
    /// Новый снимок позиции.
    pub position: String,
    pub verdict: PositionVerdict,
}

/// Чем считается падение флажка.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum TimeoutVerdict {
    /// Обычный случай: у кого упал флажок, тот проиграл.
    Loss,
    /// У соперника нечем ставить мат — ничья.
    Draw,
}

pub trait MoveRules: Send + Sync {
    /// Снимок начальной позиции.
    fn initial_position(&self) -> String;

    /// Применить ход `mv` стороны `side` к позиции `position`.
    /// `Err(reason)` — ход нелегален.
    fn apply_move(&self, position: &str, side: Side, mv: &str) -> Result<AppliedMove, String>;

    /// Хук для переопределения результата по времени.
    fn timeout_verdict(&self, _position: &str, _flagged: Side) -> TimeoutVerdict {
        TimeoutVerdict::Loss
    }
}

/// Движок "без правил": принимает любой непустой ход и просто дописывает его
/// в позицию. Удобен для CLI и тестов жизненного цикла.
#[derive(Clone, Debug, Default)]
pub struct UncheckedRules;

impl MoveRules for UncheckedRules {
    fn initial_position(&self) -> String {
        "startpos".to_string()
    }

    fn apply_move(&self, position: &str, _side: Side, mv: &str) -> Result<AppliedMove, String> {
        let mv = mv.trim();
        if mv.is_empty() || mv.contains(char::is_whitespace) {
            return Err("пустой или составной ход".into());
        }
        Ok(AppliedMove {
            position: format!("{} {}", position, mv),
            verdict: PositionVerdict::Ongoing,
        })
    }
}
