//! Gameplay events queued by the simulation for host rebroadcast.
//!
//! Events are accumulated in order inside [`crate::Game`] and drained by the
//! hosting peer once per broadcast tick. They are advisory: a client that
//! misses one is resynchronized by the next full snapshot.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::{Ability, Governor, Tech, TowerKind, VoteKind};

/// A single ordered gameplay event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    PlayerJoined { player_id: Uuid, name: String },
    PlayerLeft { player_id: Uuid },
    TowerPlaced { player_id: Uuid, tower_id: Uuid, x: u8, y: u8, kind: TowerKind },
    TowerSold { player_id: Uuid, tower_id: Uuid },
    TowerUpgraded { player_id: Uuid, tower_id: Uuid, level: u8 },
    WaveStarted { wave: u32 },
    WaveCompleted { wave: u32, leaked: u32 },
    CreepsSent { player_id: Uuid, count: u32 },
    TechPurchased { player_id: Uuid, tech: Tech },
    AbilityUsed { player_id: Uuid, ability: Ability, x: u8, y: u8 },
    GovernorSelected { player_id: Uuid, governor: Governor },
    VoteStarted { player_id: Uuid, kind: VoteKind },
    VoteResolved { kind: VoteKind, passed: bool },
    /// A map ping relayed through the host so every client sees it as one
    /// ordered stream.
    Ping { player_id: Uuid, x: u8, y: u8 },
    GameOver { victory: bool },
}
