use std::fmt;

use serde::{Deserialize, Serialize};

/// Сторона в партии.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    White,
    Black,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::White, Side::Black];

    pub fn opponent(self) -> Side {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }

    /// Чей ход после `move_count` сделанных ходов (белые ходят первыми).
    pub fn to_move_after(move_count: u32) -> Side {
        if move_count % 2 == 0 {
            Side::White
        } else {
            Side::Black
        }
    }

    /// Индекс для массивов вида `[white, black]`.
    pub(crate) fn index(self) -> usize {
        match self {
            Side::White => 0,
            Side::Black => 1,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::White => write!(f, "white"),
            Side::Black => write!(f, "black"),
        }
    }
}
