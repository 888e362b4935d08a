//! # rampart-sim — Authoritative tower-defense simulation for Rampart
//!
//! The simulation owned and mutated by whichever peer currently hosts a
//! match. Everything here is deterministic and transport-agnostic: the
//! session layer feeds validated player actions in, reads pending events
//! out, and replicates full snapshots to thin clients.
//!
//! ## Contract
//!
//! - [`Game::new`] constructs a fresh match from [`GameSettings`].
//! - Per-action mutators (`place_tower`, `start_wave`, …) each perform one
//!   idempotent state change and return `Result<(), GameError>`; the error's
//!   `Display` string is the human-readable rejection shown to players.
//! - [`Game::snapshot`] / [`Game::from_snapshot`] give a complete,
//!   self-sufficient copy — reconstructing from a snapshot never replays
//!   history.
//! - [`Game::drain_events`] hands the host the ordered gameplay events
//!   accumulated since the last drain, for individual rebroadcast.

pub mod events;
pub mod game;
pub mod map;

pub use events::GameEvent;
pub use game::{
    Ability, Difficulty, Game, GameError, GamePhase, GameSettings, GameSnapshot, Governor,
    Player, Targeting, Tech, Tower, TowerKind, VoteKind, VoteState,
};
pub use map::{Grid, MapSize};
