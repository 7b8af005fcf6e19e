//! Доменная модель платформы: матчи, стороны, турниры и сетка.

pub mod game;
pub mod side;
pub mod tournament;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Непрозрачный строковый идентификатор.
///
/// Для движка это просто ключ: никакой структуры внутри строки не предполагаем.
macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

opaque_id!(
    /// Идентификатор матча (`game_id` в хранилище).
    MatchId
);
opaque_id!(
    /// Идентификатор пользователя (игрока).
    UserId
);
opaque_id!(
    /// Идентификатор турнира.
    TournamentId
);

pub use game::*;
pub use side::*;
pub use tournament::*;
