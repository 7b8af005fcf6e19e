// src/tournament/mod.rs

pub mod bracket;
pub mod lobby;
pub mod seeding;

pub use bracket::{
    feeder_matches, matches_in_round, next_slot, round_count, BracketEvent, BracketManager,
    NewTournament, SlotSide, SlotTarget,
};
pub use lobby::{TournamentHandle, TournamentLobby};
pub use seeding::Seeding;
