// src/time_ctrl/clock.rs
//! Шахматные часы одного матча.
//!
//! Часы никогда не читают системное время сами: каждый вызов получает
//! `now_ms` от вызывающего (монотонные миллисекунды). Так часы полностью
//! детерминированы и легко тестируются.

use serde::{Deserialize, Serialize};

use crate::domain::Side;

use super::TimeControl;

/// Текущий ход, на котором тикают часы.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
struct RunningTurn {
    side: Side,
    since_ms: u64,
}

/// Остаток времени по сторонам + какая сторона сейчас "на ходу".
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchClock {
    initial_ms: u64,
    increment_ms: u64,
    /// Остаток на момент последней остановки, `[white, black]`.
    banked_ms: [u64; 2],
    /// Сколько добавлений уже начислено каждой стороне (для `elapsed`).
    credited_ms: [u64; 2],
    running: Option<RunningTurn>,
    /// Сторона, о падении флажка которой уже сообщили. Сообщаем ровно один раз.
    flagged: Option<Side>,
}

impl MatchClock {
    pub fn new(time_control: &TimeControl) -> Self {
        let initial_ms = time_control.initial_ms();
        Self {
            initial_ms,
            increment_ms: time_control.increment_ms(),
            banked_ms: [initial_ms; 2],
            credited_ms: [0; 2],
            running: None,
            flagged: None,
        }
    }

    /// Запустить часы стороны `side`.
    ///
    /// Если сейчас тикают часы соперника — сначала останавливаем их.
    /// Повторный старт той же стороны ничего не меняет.
    pub fn start(&mut self, side: Side, now_ms: u64) {
        match self.running {
            Some(turn) if turn.side == side => {}
            Some(turn) => {
                self.stop(turn.side, now_ms);
                self.running = Some(RunningTurn { side, since_ms: now_ms });
            }
            None => {
                self.running = Some(RunningTurn { side, since_ms: now_ms });
            }
        }
    }

    /// Остановить часы стороны `side` (если они тикают).
    pub fn stop(&mut self, side: Side, now_ms: u64) {
        if let Some(turn) = self.running {
            if turn.side == side {
                let spent = now_ms.saturating_sub(turn.since_ms);
                let slot = &mut self.banked_ms[side.index()];
                *slot = slot.saturating_sub(spent);
                self.running = None;
            }
        }
    }

    /// Сторона сделала ход: останавливаем её часы, начисляем добавление
    /// и запускаем часы соперника.
    pub fn pass_turn(&mut self, now_ms: u64) {
        let Some(turn) = self.running else {
            return;
        };

        self.stop(turn.side, now_ms);

        let idx = turn.side.index();
        if self.banked_ms[idx] > 0 && self.increment_ms > 0 {
            self.banked_ms[idx] += self.increment_ms;
            self.credited_ms[idx] += self.increment_ms;
        }

        self.running = Some(RunningTurn {
            side: turn.side.opponent(),
            since_ms: now_ms,
        });
    }

    /// Остановить часы окончательно (терминальный статус матча).
    pub fn halt(&mut self, now_ms: u64) {
        if let Some(turn) = self.running {
            self.stop(turn.side, now_ms);
        }
    }

    /// Сколько времени сторона потратила за весь матч.
    pub fn elapsed(&self, side: Side, now_ms: u64) -> u64 {
        let budget = self.initial_ms + self.credited_ms[side.index()];
        budget.saturating_sub(self.remaining(side, now_ms))
    }

    /// Остаток времени стороны. Никогда не бывает меньше нуля.
    pub fn remaining(&self, side: Side, now_ms: u64) -> u64 {
        let banked = self.banked_ms[side.index()];
        match self.running {
            Some(turn) if turn.side == side => {
                banked.saturating_sub(now_ms.saturating_sub(turn.since_ms))
            }
            _ => banked,
        }
    }

    /// Остаток в целых секундах (так он хранится в записи матча).
    pub fn remaining_secs(&self, side: Side, now_ms: u64) -> u64 {
        self.remaining(side, now_ms) / 1000
    }

    /// Чьи часы сейчас тикают.
    pub fn running_side(&self) -> Option<Side> {
        self.running.map(|turn| turn.side)
    }

    pub fn flagged_side(&self) -> Option<Side> {
        self.flagged
    }

    /// Проверить падение флажка.
    ///
    /// Возвращает `Some(side)` ровно один раз — при первом вызове, который
    /// увидел нулевой остаток. Остаток этой стороны фиксируется в ноль,
    /// часы останавливаются. Все последующие вызовы возвращают `None`.
    pub fn poll_expiry(&mut self, now_ms: u64) -> Option<Side> {
        if self.flagged.is_some() {
            return None;
        }

        let turn = self.running?;
        if self.remaining(turn.side, now_ms) > 0 {
            return None;
        }

        self.banked_ms[turn.side.index()] = 0;
        self.running = None;
        self.flagged = Some(turn.side);
        Some(turn.side)
    }
}
