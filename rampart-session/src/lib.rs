//! # rampart-session — Serverless session coordination for Rampart
//!
//! A small group of peers runs a shared cooperative tower-defense match
//! with no dedicated server: one peer is elected host and runs the
//! authoritative simulation; the rest are thin clients rendering a
//! periodically replicated snapshot.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐  actions   ┌─────────────┐  actions  ┌────────────┐
//! │ Peer A     │ ─────────► │  pub/sub    │ ◄──────── │ Peer C     │
//! │ (host)     │ ◄───────── │  transport  │ ────────► │ (client)   │
//! │ Game (auth)│  presence  │  (1 topic   │ snapshots │ mirror     │
//! └─────┬──────┘            │  per room)  │           └────────────┘
//!       │ 5 Hz snapshots    └─────────────┘
//!       ▼                        ▲
//! ┌────────────┐                 │ presence sync (full view)
//! │ discovery  │                 ▼
//! │ channel    │          host = min(joined_at) over the view,
//! │ (adverts)  │          recomputed by every peer independently
//! └────────────┘
//! ```
//!
//! There is no consensus protocol: the design tolerates brief windows of
//! disagreement and message loss, repaired by periodic full-state
//! replication. When the host disappears, the surviving peer with the
//! earliest `joined_at` reconstructs the simulation from the last observed
//! snapshot and carries on.
//!
//! ## Modules
//!
//! - [`protocol`] — tagged wire schema (bincode + LZ4 snapshots)
//! - [`transport`] — the consumed pub/sub contract and an in-memory hub
//! - [`election`] — host derivation from the membership view
//! - [`relay`] — pure client-intent → simulation-mutation dispatch
//! - [`roster`] — grace windows and presence reconciliation planning
//! - [`reconnect`] — capped exponential backoff policy
//! - [`discovery`] — room codes, advertisements, room browser
//! - [`coordinator`] — the per-participant session event loop

pub mod coordinator;
pub mod discovery;
pub mod election;
pub mod protocol;
pub mod reconnect;
pub mod relay;
pub mod roster;
pub mod transport;

// Re-exports for convenience
pub use coordinator::{
    Coordinator, CreateError, JoinError, Session, SessionConfig, SessionEvent, SessionHandle,
};
pub use discovery::{generate_room_code, room_topic, DiscoveryMessage, RoomBrowser, DISCOVERY_TOPIC};
pub use election::{HostElection, HostTransition};
pub use protocol::{
    Advertisement, CompressedSnapshot, GameAction, HostMessage, LobbyPlayer, ParticipantIdentity,
    PresenceRecord, ProtocolError, RejoinCredential, WireMessage,
};
pub use reconnect::BackoffSchedule;
pub use relay::{apply, ActionOutcome};
pub use roster::{plan_reconciliation, GraceTable, ReconciliationPlan};
pub use transport::{
    EventStream, MemoryChannel, MemoryHub, Transport, TransportError, TransportEvent,
};
