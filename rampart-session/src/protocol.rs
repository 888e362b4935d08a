//! Binary wire protocol for session coordination.
//!
//! Every frame on a room channel is a bincode-encoded [`WireMessage`]:
//! either a client intent addressed to whoever currently hosts
//! ([`GameAction`]) or an authoritative broadcast from the host
//! ([`HostMessage`]). Frames that fail to decode are rejected explicitly at
//! the dispatch boundary — never silently dropped.
//!
//! Full game snapshots dominate the bandwidth of a session, so they travel
//! LZ4-compressed ([`CompressedSnapshot`]); everything else is small enough
//! to ship raw.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use rampart_sim::{
    Ability, Difficulty, GameEvent, GamePhase, GameSettings, GameSnapshot, Governor, MapSize,
    Player, Targeting, Tech, TowerKind, VoteKind,
};

/// Stable participant identity. `joined_at` is assigned exactly once and
/// survives reconnects — it is the host-election key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantIdentity {
    pub id: Uuid,
    pub name: String,
    /// Wall-clock milliseconds at first join. Never reset.
    pub joined_at: u64,
}

impl ParticipantIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            joined_at: now_millis(),
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Presence payload published per active connection.
///
/// `is_host` is advisory only — the authoritative host is derived from
/// `joined_at` ordering, never from this flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceRecord {
    pub participant_id: Uuid,
    pub name: String,
    pub joined_at: u64,
    pub is_host: bool,
    pub is_spectator: bool,
}

impl PresenceRecord {
    pub fn new(identity: &ParticipantIdentity) -> Self {
        Self {
            participant_id: identity.id,
            name: identity.name.clone(),
            joined_at: identity.joined_at,
            is_host: false,
            is_spectator: false,
        }
    }

    pub fn with_host(mut self, is_host: bool) -> Self {
        self.is_host = is_host;
        self
    }

    pub fn with_spectator(mut self, is_spectator: bool) -> Self {
        self.is_spectator = is_spectator;
        self
    }
}

/// Client → host intents. Each carries the originating player id plus
/// kind-specific fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameAction {
    PlaceTower { player_id: Uuid, x: u8, y: u8, kind: TowerKind },
    SellTower { player_id: Uuid, tower_id: Uuid },
    UpgradeTower { player_id: Uuid, tower_id: Uuid },
    StartWave { player_id: Uuid },
    BuyTech { player_id: Uuid, tech: Tech },
    SelectGovernor { player_id: Uuid, governor: Governor },
    Ready { player_id: Uuid, ready: bool },
    UpdateSettings { player_id: Uuid, settings: GameSettings },
    UseAbility { player_id: Uuid, ability: Ability, x: u8, y: u8 },
    SendCreeps { player_id: Uuid, count: u32 },
    QueueUpgrade { player_id: Uuid, tower_id: Uuid },
    CancelQueue { player_id: Uuid, tower_id: Uuid },
    StartVote { player_id: Uuid, kind: VoteKind },
    CastVote { player_id: Uuid, approve: bool },
    SetTargeting { player_id: Uuid, tower_id: Uuid, targeting: Targeting },
    Ping { player_id: Uuid, x: u8, y: u8 },
    Chat { player_id: Uuid, text: String },
    JoinRequest { identity: ParticipantIdentity, password: Option<String> },
    SpectateRequest { identity: ParticipantIdentity },
}

impl GameAction {
    /// The originating participant.
    pub fn player_id(&self) -> Uuid {
        match self {
            GameAction::PlaceTower { player_id, .. }
            | GameAction::SellTower { player_id, .. }
            | GameAction::UpgradeTower { player_id, .. }
            | GameAction::StartWave { player_id }
            | GameAction::BuyTech { player_id, .. }
            | GameAction::SelectGovernor { player_id, .. }
            | GameAction::Ready { player_id, .. }
            | GameAction::UpdateSettings { player_id, .. }
            | GameAction::UseAbility { player_id, .. }
            | GameAction::SendCreeps { player_id, .. }
            | GameAction::QueueUpgrade { player_id, .. }
            | GameAction::CancelQueue { player_id, .. }
            | GameAction::StartVote { player_id, .. }
            | GameAction::CastVote { player_id, .. }
            | GameAction::SetTargeting { player_id, .. }
            | GameAction::Ping { player_id, .. }
            | GameAction::Chat { player_id, .. } => *player_id,
            GameAction::JoinRequest { identity, .. }
            | GameAction::SpectateRequest { identity } => identity.id,
        }
    }

    /// Wire name of the action kind, used in `action_result` frames.
    pub fn kind(&self) -> &'static str {
        match self {
            GameAction::PlaceTower { .. } => "place_tower",
            GameAction::SellTower { .. } => "sell_tower",
            GameAction::UpgradeTower { .. } => "upgrade_tower",
            GameAction::StartWave { .. } => "start_wave",
            GameAction::BuyTech { .. } => "buy_tech",
            GameAction::SelectGovernor { .. } => "select_governor",
            GameAction::Ready { .. } => "ready",
            GameAction::UpdateSettings { .. } => "update_settings",
            GameAction::UseAbility { .. } => "use_ability",
            GameAction::SendCreeps { .. } => "send_creeps",
            GameAction::QueueUpgrade { .. } => "queue_upgrade",
            GameAction::CancelQueue { .. } => "cancel_queue",
            GameAction::StartVote { .. } => "start_vote",
            GameAction::CastVote { .. } => "cast_vote",
            GameAction::SetTargeting { .. } => "set_targeting",
            GameAction::Ping { .. } => "ping",
            GameAction::Chat { .. } => "chat",
            GameAction::JoinRequest { .. } => "join_request",
            GameAction::SpectateRequest { .. } => "spectate_request",
        }
    }

    /// Whether this action maps to a simulation mutator. `chat`, `ping` and
    /// the join/spectate handshakes are session-routing concerns.
    pub fn is_simulation(&self) -> bool {
        !matches!(
            self,
            GameAction::Chat { .. }
                | GameAction::Ping { .. }
                | GameAction::JoinRequest { .. }
                | GameAction::SpectateRequest { .. }
        )
    }
}

/// Roster digest entry carried by `lobby_state` frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LobbyPlayer {
    pub id: Uuid,
    pub name: String,
    pub governor: Option<Governor>,
    pub ready: bool,
    pub connected: bool,
}

impl From<&Player> for LobbyPlayer {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id,
            name: player.name.clone(),
            governor: player.governor,
            ready: player.ready,
            connected: player.connected,
        }
    }
}

/// Host → all broadcasts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HostMessage {
    /// Full replicated state, LZ4-compressed.
    GameState { snapshot: CompressedSnapshot },
    /// Cheap lobby digest for rendering.
    LobbyState { players: Vec<LobbyPlayer>, settings: GameSettings, phase: GamePhase },
    /// Outcome notification for a rejected (or, rarely, confirmed) action.
    ActionResult { success: bool, action: String, player_id: Uuid, message: Option<String> },
    /// A single drained gameplay event.
    Event { event: GameEvent },
    /// Handshake verdict, addressed by `target_player_id`.
    JoinResponse { target_player_id: Uuid, accepted: bool, reason: Option<String> },
    /// Chat relayed through the host as one ordered stream.
    Chat { player_id: Uuid, name: String, text: String },
}

/// Top-level frame on a room channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WireMessage {
    Action(GameAction),
    Host(HostMessage),
}

impl WireMessage {
    /// Serialize to the binary wire format.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    /// Deserialize from the binary wire format. Unknown or malformed frames
    /// fail here and are rejected by the caller.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let (msg, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| ProtocolError::Decode(e.to_string()))?;
        Ok(msg)
    }
}

/// An LZ4-framed serialized [`GameSnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressedSnapshot {
    /// Uncompressed size in bytes.
    pub original_size: u32,
    /// LZ4 block with prepended size.
    pub compressed: Vec<u8>,
}

impl CompressedSnapshot {
    pub fn compress(snapshot: &GameSnapshot) -> Result<Self, ProtocolError> {
        let raw = bincode::serde::encode_to_vec(snapshot, bincode::config::standard())
            .map_err(|e| ProtocolError::Encode(e.to_string()))?;
        Ok(Self {
            original_size: raw.len() as u32,
            compressed: lz4_flex::compress_prepend_size(&raw),
        })
    }

    pub fn decompress(&self) -> Result<GameSnapshot, ProtocolError> {
        let raw = lz4_flex::decompress_size_prepended(&self.compressed)
            .map_err(|e| ProtocolError::Compression(e.to_string()))?;
        let (snapshot, _) = bincode::serde::decode_from_slice(&raw, bincode::config::standard())
            .map_err(|e| ProtocolError::Decode(e.to_string()))?;
        Ok(snapshot)
    }

    /// Compression ratio (original / compressed).
    pub fn ratio(&self) -> f64 {
        if self.compressed.is_empty() {
            return 0.0;
        }
        self.original_size as f64 / self.compressed.len() as f64
    }
}

/// Public session summary broadcast on the discovery channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advertisement {
    pub room_code: String,
    pub room_name: String,
    pub host_name: String,
    pub host_id: Uuid,
    pub player_count: usize,
    pub max_players: usize,
    pub has_password: bool,
    pub map_size: MapSize,
    pub difficulty: Difficulty,
    pub in_game: bool,
}

/// Everything a client needs to rejoin after an outage: identity with the
/// original `joined_at`, the room code, and the password if one was used.
/// Session-scoped; durable storage is the application's concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejoinCredential {
    pub identity: ParticipantIdentity,
    pub room_code: String,
    pub password: Option<String>,
}

/// Protocol errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProtocolError {
    #[error("encode failed: {0}")]
    Encode(String),
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("snapshot compression failed: {0}")]
    Compression(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rampart_sim::{Game, GameSettings};

    #[test]
    fn test_action_roundtrip() {
        let player_id = Uuid::new_v4();
        let msg = WireMessage::Action(GameAction::PlaceTower {
            player_id,
            x: 3,
            y: 4,
            kind: TowerKind::Frost,
        });
        let encoded = msg.encode().unwrap();
        let decoded = WireMessage::decode(&encoded).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_join_request_roundtrip() {
        let identity = ParticipantIdentity::new("Alice");
        let msg = WireMessage::Action(GameAction::JoinRequest {
            identity: identity.clone(),
            password: Some("hunter2".into()),
        });
        let encoded = msg.encode().unwrap();
        match WireMessage::decode(&encoded).unwrap() {
            WireMessage::Action(GameAction::JoinRequest { identity: parsed, password }) => {
                assert_eq!(parsed, identity);
                assert_eq!(password.as_deref(), Some("hunter2"));
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn test_join_response_roundtrip() {
        let target = Uuid::new_v4();
        let msg = WireMessage::Host(HostMessage::JoinResponse {
            target_player_id: target,
            accepted: false,
            reason: Some("Room is full".into()),
        });
        let decoded = WireMessage::decode(&msg.encode().unwrap()).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_decode_garbage_rejected() {
        assert!(WireMessage::decode(&[0xFF, 0xFE, 0xFD, 0xFC]).is_err());
    }

    #[test]
    fn test_action_kind_names() {
        let id = Uuid::new_v4();
        assert_eq!(GameAction::StartWave { player_id: id }.kind(), "start_wave");
        assert_eq!(
            GameAction::Chat { player_id: id, text: "hi".into() }.kind(),
            "chat"
        );
        assert_eq!(
            GameAction::JoinRequest {
                identity: ParticipantIdentity::new("x"),
                password: None
            }
            .kind(),
            "join_request"
        );
    }

    #[test]
    fn test_session_routing_actions_are_not_simulation() {
        let id = Uuid::new_v4();
        assert!(!GameAction::Chat { player_id: id, text: String::new() }.is_simulation());
        assert!(!GameAction::Ping { player_id: id, x: 0, y: 0 }.is_simulation());
        assert!(GameAction::StartWave { player_id: id }.is_simulation());
    }

    #[test]
    fn test_snapshot_compression_roundtrip() {
        let mut game = Game::new(GameSettings::default());
        let id = Uuid::new_v4();
        game.add_player(id, "Alice").unwrap();
        game.place_tower(id, 0, 0, TowerKind::Arrow).unwrap();
        let snapshot = game.snapshot();

        let compressed = CompressedSnapshot::compress(&snapshot).unwrap();
        let restored = compressed.decompress().unwrap();
        assert_eq!(restored, snapshot);
        assert!(compressed.original_size > 0);
    }

    #[test]
    fn test_compressed_snapshot_survives_wire() {
        let game = Game::new(GameSettings::default());
        let compressed = CompressedSnapshot::compress(&game.snapshot()).unwrap();
        let msg = WireMessage::Host(HostMessage::GameState { snapshot: compressed });
        let decoded = WireMessage::decode(&msg.encode().unwrap()).unwrap();
        match decoded {
            WireMessage::Host(HostMessage::GameState { snapshot }) => {
                assert_eq!(snapshot.decompress().unwrap(), game.snapshot());
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn test_identity_joined_at_is_stable() {
        let identity = ParticipantIdentity::new("Alice");
        let record = PresenceRecord::new(&identity);
        assert_eq!(record.joined_at, identity.joined_at);
        assert!(!record.is_host);
        assert!(!record.is_spectator);
    }

    #[test]
    fn test_presence_record_builders() {
        let identity = ParticipantIdentity::new("Alice");
        let record = PresenceRecord::new(&identity).with_host(true).with_spectator(true);
        assert!(record.is_host);
        assert!(record.is_spectator);
    }

    #[test]
    fn test_advertisement_roundtrip() {
        let ad = Advertisement {
            room_code: "ABCD".into(),
            room_name: "Rampart".into(),
            host_name: "Alice".into(),
            host_id: Uuid::new_v4(),
            player_count: 2,
            max_players: 4,
            has_password: true,
            map_size: MapSize::Large,
            difficulty: Difficulty::Hard,
            in_game: false,
        };
        let bytes =
            bincode::serde::encode_to_vec(&ad, bincode::config::standard()).unwrap();
        let (parsed, _): (Advertisement, _) =
            bincode::serde::decode_from_slice(&bytes, bincode::config::standard()).unwrap();
        assert_eq!(parsed, ad);
    }
}
