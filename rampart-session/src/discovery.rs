//! Session discovery: room codes, the well-known advertisement channel,
//! and a subscribe-only room browser.
//!
//! Advertisements are a public summary on a channel separate from the
//! session's private room channel. The host (re-)announces on creation, on
//! roster changes, and across migrations; browsers just collect the latest
//! announcement per room code.

use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::protocol::{Advertisement, ProtocolError};
use crate::transport::{EventStream, Transport, TransportError, TransportEvent};

/// Well-known topic carrying advertisements.
pub const DISCOVERY_TOPIC: &str = "rampart:discovery";

/// Topic name of a session's private room channel.
pub fn room_topic(room_code: &str) -> String {
    format!("rampart:room:{room_code}")
}

/// Generate a short human-shareable room code (four uppercase letters).
pub fn generate_room_code() -> String {
    let mut rng = rand::thread_rng();
    (0..4).map(|_| (b'A' + rng.gen_range(0..26u8)) as char).collect()
}

/// Frames on the discovery channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DiscoveryMessage {
    Announce(Advertisement),
}

impl DiscoveryMessage {
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let (msg, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| ProtocolError::Decode(e.to_string()))?;
        Ok(msg)
    }
}

/// Subscribe-only collector of the latest advertisement per room code.
pub struct RoomBrowser<T: Transport> {
    _transport: T,
    events: EventStream,
    rooms: HashMap<String, Advertisement>,
}

impl<T: Transport> RoomBrowser<T> {
    /// Subscribe to the discovery channel. The browser publishes nothing.
    pub async fn open(mut transport: T) -> Result<Self, TransportError> {
        let events = transport.subscribe_only().await?;
        Ok(Self { _transport: transport, events, rooms: HashMap::new() })
    }

    /// Wait for the next advertisement, updating the room table.
    ///
    /// Returns `None` when the discovery channel closes.
    pub async fn next_announcement(&mut self) -> Option<Advertisement> {
        while let Some(event) = self.events.recv().await {
            let TransportEvent::Message(bytes) = event else { continue };
            match DiscoveryMessage::decode(&bytes) {
                Ok(DiscoveryMessage::Announce(ad)) => {
                    self.rooms.insert(ad.room_code.clone(), ad.clone());
                    return Some(ad);
                }
                Err(e) => log::warn!("rejected undecodable discovery frame: {e}"),
            }
        }
        None
    }

    /// Latest advertisement for a room code, if any has been seen.
    pub fn room(&self, room_code: &str) -> Option<&Advertisement> {
        self.rooms.get(room_code)
    }

    /// All rooms seen so far.
    pub fn rooms(&self) -> impl Iterator<Item = &Advertisement> {
        self.rooms.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rampart_sim::{Difficulty, MapSize};
    use uuid::Uuid;

    fn advertisement(code: &str, players: usize) -> Advertisement {
        Advertisement {
            room_code: code.into(),
            room_name: "Rampart".into(),
            host_name: "Alice".into(),
            host_id: Uuid::new_v4(),
            player_count: players,
            max_players: 4,
            has_password: false,
            map_size: MapSize::Medium,
            difficulty: Difficulty::Normal,
            in_game: false,
        }
    }

    #[test]
    fn test_room_code_shape() {
        for _ in 0..50 {
            let code = generate_room_code();
            assert_eq!(code.len(), 4);
            assert!(code.chars().all(|c| c.is_ascii_uppercase()));
        }
    }

    #[test]
    fn test_room_topic_is_code_scoped() {
        assert_eq!(room_topic("ABCD"), "rampart:room:ABCD");
        assert_ne!(room_topic("ABCD"), room_topic("WXYZ"));
    }

    #[test]
    fn test_discovery_message_roundtrip() {
        let msg = DiscoveryMessage::Announce(advertisement("ABCD", 2));
        let decoded = DiscoveryMessage::decode(&msg.encode().unwrap()).unwrap();
        assert_eq!(decoded, msg);
    }

    #[tokio::test]
    async fn test_browser_collects_latest_announcement() {
        use crate::transport::MemoryHub;

        let hub = MemoryHub::new();
        let mut browser = RoomBrowser::open(hub.channel(DISCOVERY_TOPIC)).await.unwrap();

        let mut publisher = hub.channel(DISCOVERY_TOPIC);
        let _rx = publisher.subscribe_only().await.unwrap();

        let first = DiscoveryMessage::Announce(advertisement("ABCD", 1));
        publisher.send(first.encode().unwrap());
        let seen = browser.next_announcement().await.unwrap();
        assert_eq!(seen.player_count, 1);

        let refreshed = DiscoveryMessage::Announce(advertisement("ABCD", 3));
        publisher.send(refreshed.encode().unwrap());
        let seen = browser.next_announcement().await.unwrap();
        assert_eq!(seen.player_count, 3);

        // The table keeps only the latest per code.
        assert_eq!(browser.room("ABCD").unwrap().player_count, 3);
        assert_eq!(browser.rooms().count(), 1);
    }
}
