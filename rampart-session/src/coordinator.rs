//! The session coordinator: one cooperative event loop per participant.
//!
//! ```text
//!                 ┌──────────────────────────────────────┐
//!  SessionHandle  │            Coordinator               │
//!  (commands) ───►│                                      │
//!                 │  tokio::select! over:                │
//!                 │   · transport events (msg/presence)  │◄── Transport
//!                 │   · broadcast tick (host, 5 Hz)      │    (room channel)
//!                 │   · heartbeat (30 s)                 │
//!                 │   · stale watchdog (client, 3 s)     │───► Transport
//!                 │                                      │    (discovery)
//!                 └───────────────┬──────────────────────┘
//!                                 ▼
//!                        SessionEvent stream
//!                        (render/UI feed)
//! ```
//!
//! All coordination state is owned by the loop; there are no locks. Mutual
//! exclusion is structural: every handler runs to completion before the
//! next event is taken, and suspension happens only at transport calls and
//! backoff sleeps.
//!
//! Lifecycle: `Idle → Creating|Joining → Active(Host)|Active(Client) →
//! Reconnecting → Active | Terminated`. The `Creating`/`Joining` legs live
//! in the async constructors; dropping an in-flight [`Coordinator::join`]
//! future cancels the handshake and the transport teardown releases the
//! subscription.

use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::time::{interval, Interval, MissedTickBehavior};
use uuid::Uuid;

use rampart_sim::{Game, GameEvent, GamePhase, GameSettings, GameSnapshot};

use crate::discovery::DiscoveryMessage;
use crate::election::HostElection;
use crate::protocol::{
    Advertisement, CompressedSnapshot, GameAction, HostMessage, LobbyPlayer,
    ParticipantIdentity, PresenceRecord, ProtocolError, RejoinCredential, WireMessage,
};
use crate::reconnect::BackoffSchedule;
use crate::relay;
use crate::roster::{plan_reconciliation, GraceTable};
use crate::transport::{EventStream, Transport, TransportError, TransportEvent};

/// Session tuning knobs. Defaults match production cadence; tests shrink
/// the intervals.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Room password required from joiners (creator side).
    pub password: Option<String>,
    /// Match settings for a freshly created room.
    pub settings: GameSettings,
    /// Broadcast loop period (~5 Hz).
    pub tick_interval: Duration,
    /// Presence re-publication period.
    pub heartbeat_interval: Duration,
    /// Stale-watchdog check period (client).
    pub watchdog_interval: Duration,
    /// Silence beyond this triggers a proactive reconnect.
    pub stale_threshold: Duration,
    /// Bounded wait for a `join_response`.
    pub join_timeout: Duration,
    /// Grace window for freshly admitted participants.
    pub grace_ttl: Duration,
    pub backoff: BackoffSchedule,
    /// Session event channel capacity; overflow drops render-feed events.
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            password: None,
            settings: GameSettings::default(),
            tick_interval: Duration::from_millis(200),
            heartbeat_interval: Duration::from_secs(30),
            watchdog_interval: Duration::from_secs(3),
            stale_threshold: Duration::from_secs(5),
            join_timeout: Duration::from_secs(15),
            grace_ttl: Duration::from_secs(10),
            backoff: BackoffSchedule::default(),
            event_capacity: 256,
        }
    }
}

/// Events surfaced to the application (render/UI layer).
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Fresh replicated (or locally refreshed) full state.
    StateUpdated(GameSnapshot),
    /// Lobby digest from the host.
    LobbyUpdated { players: Vec<LobbyPlayer>, settings: GameSettings, phase: GamePhase },
    /// An individual gameplay event.
    GameEvent(GameEvent),
    /// Outcome of a dispatched action.
    ActionResult { success: bool, action: String, player_id: Uuid, message: Option<String> },
    Chat { player_id: Uuid, name: String, text: String },
    /// Edge-triggered host transition.
    HostChanged { host_id: Option<Uuid>, is_self: bool },
    Reconnecting { attempt: u32 },
    Reconnected,
    /// Terminal: reconnect attempts exhausted. The credential allows a
    /// manual rejoin with the original identity.
    ConnectionLost { reason: String, credential: RejoinCredential },
    /// Transient user-visible notice.
    Notice(String),
}

enum SessionCommand {
    Dispatch(GameAction),
    Leave,
}

/// Cloneable handle for feeding local intents into a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    participant_id: Uuid,
    room_code: String,
    cmd_tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub fn participant_id(&self) -> Uuid {
        self.participant_id
    }

    pub fn room_code(&self) -> &str {
        &self.room_code
    }

    /// Queue a local intent. Fire-and-forget: the outcome arrives as a
    /// [`SessionEvent`].
    pub async fn dispatch(&self, action: GameAction) {
        let _ = self.cmd_tx.send(SessionCommand::Dispatch(action)).await;
    }

    pub async fn chat(&self, text: impl Into<String>) {
        self.dispatch(GameAction::Chat { player_id: self.participant_id, text: text.into() })
            .await;
    }

    pub async fn ping(&self, x: u8, y: u8) {
        self.dispatch(GameAction::Ping { player_id: self.participant_id, x, y }).await;
    }

    /// End the session loop and unsubscribe.
    pub async fn leave(&self) {
        let _ = self.cmd_tx.send(SessionCommand::Leave).await;
    }
}

/// A ready-to-run session: spawn `coordinator.run()` and keep the handle
/// and event stream.
pub struct Session<T: Transport> {
    pub handle: SessionHandle,
    pub events: mpsc::Receiver<SessionEvent>,
    pub coordinator: Coordinator<T>,
}

/// Room-creation failures.
#[derive(Debug, thiserror::Error)]
pub enum CreateError {
    #[error("transport: {0}")]
    Transport(#[from] TransportError),
    #[error("invalid settings: {0}")]
    Settings(String),
}

/// Join-handshake failures. Terminal for the attempt; no automatic retry.
#[derive(Debug, thiserror::Error)]
pub enum JoinError {
    #[error("transport: {0}")]
    Transport(#[from] TransportError),
    #[error("protocol: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("join rejected: {0}")]
    Rejected(String),
    #[error("timed out waiting for join response")]
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Host,
    Client,
}

/// The mutually exclusive broadcast loop variants. Switching always stops
/// the previous loop (the shared ticker is reset).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopMode {
    Off,
    Lobby,
    Game,
}

/// The session coordinator. Owns the authoritative simulation while
/// hosting; owns only a read-only snapshot mirror otherwise.
pub struct Coordinator<T: Transport> {
    config: SessionConfig,
    identity: ParticipantIdentity,
    credential: RejoinCredential,
    room_code: String,
    /// Known plaintext room password. A non-creator host recovers it from
    /// the rejoin credential during migration.
    password: Option<String>,
    role: Role,
    spectator: bool,

    transport: T,
    transport_rx: EventStream,
    discovery: T,
    discovery_joined: bool,

    election: HostElection,
    /// Authoritative simulation; `Some` only while hosting.
    game: Option<Game>,
    /// Latest observed snapshot — the client mirror and the migration
    /// source.
    last_snapshot: Option<GameSnapshot>,
    last_state_at: Instant,
    grace: GraceTable,

    loop_mode: LoopMode,
    tick: Interval,
    heartbeat: Interval,
    watchdog: Interval,

    cmd_rx: mpsc::Receiver<SessionCommand>,
    events_tx: mpsc::Sender<SessionEvent>,

    reconnecting: bool,
    terminated: bool,
}

impl<T: Transport> Coordinator<T> {
    // ── Lifecycle: create / join ─────────────────────────────────────

    /// Create a room and become host by construction.
    ///
    /// `transport` must be bound to the room channel for `room_code` (see
    /// [`crate::discovery::room_topic`]) and `discovery` to the well-known
    /// discovery channel. Failure to join the transport aborts creation.
    pub async fn create(
        mut transport: T,
        discovery: T,
        config: SessionConfig,
        name: impl Into<String>,
        room_code: impl Into<String>,
    ) -> Result<Session<T>, CreateError> {
        let identity = ParticipantIdentity::new(name);
        let room_code = room_code.into();

        let mut game = Game::new(config.settings.clone());
        game.add_player(identity.id, identity.name.clone())
            .map_err(|e| CreateError::Settings(e.to_string()))?;

        let presence = PresenceRecord::new(&identity).with_host(true);
        let transport_rx = transport.join(presence).await?;
        log::info!("room {room_code} created by {} ({})", identity.name, identity.id);

        let mut session = Self::assemble(
            transport,
            transport_rx,
            discovery,
            config,
            identity,
            room_code,
            Role::Host,
            false,
            Some(game),
        );
        session.coordinator.publish_advertisement().await;
        Ok(session)
    }

    /// Join an existing room as a player.
    ///
    /// Subscribes without presence, sends a `join_request`, and waits a
    /// bounded time for an addressed `join_response`. Timeout or rejection
    /// tears the subscription down and fails with a reason.
    pub async fn join(
        transport: T,
        discovery: T,
        config: SessionConfig,
        name: impl Into<String>,
        room_code: impl Into<String>,
        password: Option<String>,
    ) -> Result<Session<T>, JoinError> {
        Self::join_inner(transport, discovery, config, name.into(), room_code.into(), password, false)
            .await
    }

    /// Join an existing room as a spectator (no roster slot, no election
    /// eligibility, no phase/capacity checks).
    pub async fn spectate(
        transport: T,
        discovery: T,
        config: SessionConfig,
        name: impl Into<String>,
        room_code: impl Into<String>,
    ) -> Result<Session<T>, JoinError> {
        Self::join_inner(transport, discovery, config, name.into(), room_code.into(), None, true)
            .await
    }

    async fn join_inner(
        mut transport: T,
        discovery: T,
        config: SessionConfig,
        name: String,
        room_code: String,
        password: Option<String>,
        spectate: bool,
    ) -> Result<Session<T>, JoinError> {
        let identity = ParticipantIdentity::new(name);

        // Deliberately no presence yet: an unaccepted joiner must stay
        // invisible to election and roster reconciliation.
        let mut rx = transport.subscribe_only().await?;

        let request = if spectate {
            GameAction::SpectateRequest { identity: identity.clone() }
        } else {
            GameAction::JoinRequest { identity: identity.clone(), password: password.clone() }
        };
        transport.send(WireMessage::Action(request).encode()?);

        // Short-lived correlated wait for the addressed response. Unrelated
        // traffic observed meanwhile is dropped; the periodic snapshot
        // replication repairs anything missed.
        let deadline = tokio::time::Instant::now() + config.join_timeout;
        loop {
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Err(_) => {
                    transport.leave().await;
                    return Err(JoinError::Timeout);
                }
                Ok(None) => {
                    transport.leave().await;
                    return Err(JoinError::Transport(TransportError::NotSubscribed));
                }
                Ok(Some(TransportEvent::ChannelError(e))) => {
                    transport.leave().await;
                    return Err(JoinError::Transport(e));
                }
                Ok(Some(TransportEvent::PresenceSync(_))) => {}
                Ok(Some(TransportEvent::Message(bytes))) => match WireMessage::decode(&bytes) {
                    Ok(WireMessage::Host(HostMessage::JoinResponse {
                        target_player_id,
                        accepted,
                        reason,
                    })) if target_player_id == identity.id => {
                        if accepted {
                            break;
                        }
                        transport.leave().await;
                        let reason = reason.unwrap_or_else(|| "Join rejected".to_string());
                        log::info!("join to {room_code} rejected: {reason}");
                        return Err(JoinError::Rejected(reason));
                    }
                    Ok(_) => {}
                    Err(e) => log::warn!("rejected undecodable frame during join: {e}"),
                },
            }
        }

        // Accepted: start presence publication. Best-effort — the heartbeat
        // repairs a failed initial track.
        let presence = PresenceRecord::new(&identity).with_spectator(spectate);
        if let Err(e) = transport.track_presence(presence).await {
            log::warn!("initial presence track failed: {e}");
        }
        log::info!("joined room {room_code} as {} ({})", identity.name, identity.id);

        let mut session = Self::assemble(
            transport,
            rx,
            discovery,
            config,
            identity,
            room_code,
            Role::Client,
            spectate,
            None,
        );
        session.coordinator.password = password;
        session.coordinator.credential.password = session.coordinator.password.clone();
        Ok(session)
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        transport: T,
        transport_rx: EventStream,
        discovery: T,
        config: SessionConfig,
        identity: ParticipantIdentity,
        room_code: String,
        role: Role,
        spectator: bool,
        game: Option<Game>,
    ) -> Session<T> {
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let (events_tx, events_rx) = mpsc::channel(config.event_capacity);

        let mut tick = interval(config.tick_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut heartbeat = interval(config.heartbeat_interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut watchdog = interval(config.watchdog_interval);
        watchdog.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let credential = RejoinCredential {
            identity: identity.clone(),
            room_code: room_code.clone(),
            password: config.password.clone(),
        };
        let password = config.password.clone();
        let loop_mode = if role == Role::Host { LoopMode::Lobby } else { LoopMode::Off };
        let handle = SessionHandle {
            participant_id: identity.id,
            room_code: room_code.clone(),
            cmd_tx,
        };

        let coordinator = Coordinator {
            election: HostElection::new(identity.id),
            grace: GraceTable::new(config.grace_ttl),
            config,
            identity,
            credential,
            room_code,
            password,
            role,
            spectator,
            transport,
            transport_rx,
            discovery,
            discovery_joined: false,
            game,
            last_snapshot: None,
            last_state_at: Instant::now(),
            loop_mode,
            tick,
            heartbeat,
            watchdog,
            cmd_rx,
            events_tx,
            reconnecting: false,
            terminated: false,
        };

        Session { handle, events: events_rx, coordinator }
    }

    // ── Main loop ────────────────────────────────────────────────────

    /// Run the session until the handle says leave, the command channel
    /// closes, or reconnection exhausts. Never panics on remote input.
    pub async fn run(mut self) {
        log::info!("session loop running (room {}, role {:?})", self.room_code, self.role);
        loop {
            if self.terminated {
                break;
            }
            tokio::select! {
                maybe_cmd = self.cmd_rx.recv() => match maybe_cmd {
                    Some(SessionCommand::Dispatch(action)) => self.dispatch_local(action).await,
                    Some(SessionCommand::Leave) | None => break,
                },
                maybe_event = self.transport_rx.recv() => match maybe_event {
                    Some(TransportEvent::Message(bytes)) => self.handle_frame(&bytes).await,
                    Some(TransportEvent::PresenceSync(view)) => self.handle_presence_sync(view).await,
                    Some(TransportEvent::ChannelError(e)) => {
                        self.reconnect(format!("channel error: {e}")).await;
                    }
                    None => self.reconnect("event stream closed".to_string()).await,
                },
                _ = self.tick.tick(), if self.loop_mode != LoopMode::Off => {
                    self.broadcast_tick().await;
                }
                _ = self.heartbeat.tick() => self.heartbeat_tick().await,
                _ = self.watchdog.tick(), if self.role == Role::Client => {
                    self.watchdog_tick().await;
                }
            }
        }
        self.transport.leave().await;
        log::info!("session loop stopped (room {})", self.room_code);
    }

    // ── Action dispatch ──────────────────────────────────────────────

    /// Shared entry point for local intents.
    async fn dispatch_local(&mut self, action: GameAction) {
        if self.role == Role::Host {
            match action {
                // Chat and ping bypass the relay entirely.
                GameAction::Chat { player_id, text } => self.relay_chat(player_id, text),
                GameAction::Ping { player_id, x, y } => self.relay_ping(player_id, x, y),
                other => self.apply_host_action(other).await,
            }
        } else {
            // Fire-and-forget toward the host; the outcome is observed via
            // the next snapshot or an async action_result.
            match WireMessage::Action(action).encode() {
                Ok(bytes) => self.transport.send(bytes),
                Err(e) => log::error!("failed to encode action: {e}"),
            }
        }
    }

    /// Host-side handling of a client frame.
    async fn handle_remote_action(&mut self, action: GameAction) {
        match action {
            GameAction::JoinRequest { identity, password } => {
                self.handle_join_request(identity, password).await;
            }
            GameAction::SpectateRequest { identity } => self.handle_spectate_request(identity),
            GameAction::Chat { player_id, text } => self.relay_chat(player_id, text),
            GameAction::Ping { player_id, x, y } => self.relay_ping(player_id, x, y),
            other => self.apply_host_action(other).await,
        }
    }

    /// Apply a simulation action against the authoritative game.
    async fn apply_host_action(&mut self, action: GameAction) {
        let Some(game) = self.game.as_mut() else {
            log::warn!("dropping {} while simulation is absent", action.kind());
            return;
        };
        let outcome = relay::apply(game, &action);
        if outcome.success {
            // Refresh the locally observed state immediately instead of
            // waiting for the next tick.
            self.refresh_local_state();
            self.sync_loop_mode();
            if matches!(action, GameAction::StartWave { .. } | GameAction::UpdateSettings { .. }) {
                self.publish_advertisement().await;
            }
        } else {
            let result = SessionEvent::ActionResult {
                success: false,
                action: action.kind().to_string(),
                player_id: action.player_id(),
                message: outcome.message.clone(),
            };
            self.broadcast_host(HostMessage::ActionResult {
                success: false,
                action: action.kind().to_string(),
                player_id: action.player_id(),
                message: outcome.message,
            });
            self.emit(result);
        }
    }

    fn relay_chat(&self, player_id: Uuid, text: String) {
        let name = self
            .game
            .as_ref()
            .and_then(|g| g.player(player_id))
            .map(|p| p.name.clone())
            .unwrap_or_else(|| "Unknown".to_string());
        self.broadcast_host(HostMessage::Chat {
            player_id,
            name: name.clone(),
            text: text.clone(),
        });
        self.emit(SessionEvent::Chat { player_id, name, text });
    }

    fn relay_ping(&self, player_id: Uuid, x: u8, y: u8) {
        let event = GameEvent::Ping { player_id, x, y };
        self.broadcast_host(HostMessage::Event { event: event.clone() });
        self.emit(SessionEvent::GameEvent(event));
    }

    // ── Join handshake (host side) ───────────────────────────────────

    async fn handle_join_request(
        &mut self,
        identity: ParticipantIdentity,
        password: Option<String>,
    ) {
        let Some(game) = self.game.as_mut() else { return };

        let verdict: Result<(), String> = if self.password.is_some() && password != self.password {
            Err("Invalid password".to_string())
        } else if game.phase() != GamePhase::Lobby {
            Err("Game already in progress".to_string())
        } else if game.is_full() {
            Err("Room is full".to_string())
        } else {
            game.add_player(identity.id, identity.name.clone()).map_err(|e| e.to_string())
        };

        match verdict {
            Ok(()) => {
                // Presence propagation lags admission; the grace entry keeps
                // the next reconciliation pass from evicting the newcomer.
                self.grace.insert(identity.id, Instant::now());
                self.send_join_response(identity.id, true, None);
                self.refresh_local_state();
                self.publish_advertisement().await;
                log::info!("admitted {} ({})", identity.name, identity.id);
            }
            Err(reason) => {
                log::info!("rejected join from {} ({}): {reason}", identity.name, identity.id);
                self.send_join_response(identity.id, false, Some(reason));
            }
        }
    }

    fn handle_spectate_request(&self, identity: ParticipantIdentity) {
        // Spectators take no roster slot, so phase and capacity are
        // irrelevant.
        log::info!("spectator {} ({}) admitted", identity.name, identity.id);
        self.send_join_response(identity.id, true, None);
    }

    fn send_join_response(&self, target: Uuid, accepted: bool, reason: Option<String>) {
        self.broadcast_host(HostMessage::JoinResponse {
            target_player_id: target,
            accepted,
            reason,
        });
    }

    // ── Host broadcasts ──────────────────────────────────────────────

    async fn broadcast_tick(&mut self) {
        if self.role != Role::Host {
            return;
        }
        let Some(game) = self.game.as_ref() else { return };
        let snapshot = match CompressedSnapshot::compress(&game.snapshot()) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::error!("snapshot compression failed: {e}");
                return;
            }
        };
        match self.loop_mode {
            LoopMode::Off => {}
            LoopMode::Lobby => {
                let players = game.players().values().map(LobbyPlayer::from).collect();
                let settings = game.settings().clone();
                let phase = game.phase();
                self.broadcast_host(HostMessage::GameState { snapshot });
                self.broadcast_host(HostMessage::LobbyState { players, settings, phase });
                // Lobby changes travel in the digest and the snapshot; drop
                // the queue so the first game tick does not replay lobby
                // history as events.
                if let Some(game) = self.game.as_mut() {
                    game.drain_events();
                }
            }
            LoopMode::Game => {
                self.broadcast_host(HostMessage::GameState { snapshot });
                let events =
                    self.game.as_mut().map(|g| g.drain_events()).unwrap_or_default();
                // Drained events are not retried for briefly offline peers;
                // the next snapshot resynchronizes them.
                for event in events {
                    self.broadcast_host(HostMessage::Event { event: event.clone() });
                    self.emit(SessionEvent::GameEvent(event));
                }
            }
        }
    }

    fn broadcast_host(&self, message: HostMessage) {
        match WireMessage::Host(message).encode() {
            Ok(bytes) => self.transport.send(bytes),
            Err(e) => log::error!("failed to encode broadcast: {e}"),
        }
    }

    /// Keep exactly one broadcast loop variant active, derived from role
    /// and phase. A switch stops the previous loop before the next starts.
    fn sync_loop_mode(&mut self) {
        let desired = if self.role != Role::Host {
            LoopMode::Off
        } else {
            match self.game.as_ref().map(|g| g.phase()) {
                Some(GamePhase::Lobby) => LoopMode::Lobby,
                Some(_) => LoopMode::Game,
                None => LoopMode::Off,
            }
        };
        if desired != self.loop_mode {
            log::debug!("broadcast loop: {:?} -> {:?}", self.loop_mode, desired);
            self.loop_mode = desired;
            self.tick.reset();
        }
    }

    fn refresh_local_state(&mut self) {
        let Some(game) = self.game.as_ref() else { return };
        let snapshot = game.snapshot();
        self.last_snapshot = Some(snapshot.clone());
        self.emit(SessionEvent::StateUpdated(snapshot));
    }

    // ── Inbound frames ───────────────────────────────────────────────

    async fn handle_frame(&mut self, bytes: &[u8]) {
        match WireMessage::decode(bytes) {
            Err(e) => log::warn!("rejected undecodable frame: {e}"),
            Ok(WireMessage::Action(action)) => {
                if self.role == Role::Host {
                    self.handle_remote_action(action).await;
                }
                // Clients observe client→host traffic but never act on it.
            }
            Ok(WireMessage::Host(message)) => self.handle_host_message(message),
        }
    }

    fn handle_host_message(&mut self, message: HostMessage) {
        if self.role == Role::Host {
            log::debug!("ignoring host frame from another peer while hosting");
            return;
        }
        match message {
            HostMessage::GameState { snapshot } => match snapshot.decompress() {
                Ok(snapshot) => {
                    self.last_state_at = Instant::now();
                    self.last_snapshot = Some(snapshot.clone());
                    self.emit(SessionEvent::StateUpdated(snapshot));
                }
                Err(e) => log::warn!("discarding undecodable snapshot: {e}"),
            },
            HostMessage::LobbyState { players, settings, phase } => {
                self.last_state_at = Instant::now();
                self.emit(SessionEvent::LobbyUpdated { players, settings, phase });
            }
            HostMessage::ActionResult { success, action, player_id, message } => {
                self.emit(SessionEvent::ActionResult { success, action, player_id, message });
            }
            HostMessage::Event { event } => self.emit(SessionEvent::GameEvent(event)),
            HostMessage::Chat { player_id, name, text } => {
                self.emit(SessionEvent::Chat { player_id, name, text });
            }
            // The handshake concluded before this loop started; late or
            // duplicate responses are meaningless here.
            HostMessage::JoinResponse { .. } => {}
        }
    }

    // ── Membership ───────────────────────────────────────────────────

    async fn handle_presence_sync(&mut self, view: Vec<PresenceRecord>) {
        if let Some(transition) = self.election.update_view(view) {
            self.emit(SessionEvent::HostChanged {
                host_id: transition.host_id,
                is_self: transition.is_self,
            });
            if transition.is_self {
                self.become_host().await;
            } else if self.role == Role::Host {
                self.demote(transition.host_id);
            }
        }
        if self.role == Role::Host {
            self.reconcile_presence().await;
        }
    }

    /// Host migration: reconstruct the simulation purely from the last
    /// observed snapshot and resume the loop variant for its phase.
    async fn become_host(&mut self) {
        if self.game.is_some() {
            // Already authoritative (e.g. the creator after a blip).
            self.role = Role::Host;
            self.sync_loop_mode();
            self.publish_advertisement().await;
            return;
        }
        let Some(snapshot) = self.last_snapshot.clone() else {
            // The very first host cannot migrate before transmitting a
            // snapshot; without one we stay a client and wait.
            log::warn!("elected host before observing a snapshot; awaiting replication");
            return;
        };
        let game = Game::from_snapshot(&snapshot);
        if self.password.is_none() {
            // A non-creator host never otherwise learns the plaintext.
            self.password = self.credential.password.clone();
        }
        log::info!("migrating to host (phase {:?}, wave {})", game.phase(), game.wave());
        self.role = Role::Host;
        self.game = Some(game);
        self.sync_loop_mode();
        let record = self.own_presence();
        if let Err(e) = self.transport.update_presence(record).await {
            // Advisory only; the heartbeat re-publishes.
            log::debug!("host presence update failed: {e}");
        }
        self.publish_advertisement().await;
        self.emit(SessionEvent::Notice("Host migrated: you are now the host".to_string()));
    }

    /// An earlier-joined participant reappeared while we were hosting:
    /// yield, drop the authoritative copy, and fall back to the mirror.
    fn demote(&mut self, new_host: Option<Uuid>) {
        log::warn!("yielding host to earlier participant {new_host:?}");
        self.role = Role::Client;
        self.game = None;
        self.sync_loop_mode();
        self.last_state_at = Instant::now();
    }

    /// Host-side reconciliation of the roster against visible presence.
    /// Absence past the grace window is the sole disconnect signal.
    async fn reconcile_presence(&mut self) {
        let now = Instant::now();
        for id in self.grace.purge_expired(now) {
            log::debug!("grace entry for {id} expired");
        }
        let visible = self.election.participant_ids();
        let mut roster_changed = false;
        {
            let Some(game) = self.game.as_mut() else { return };
            let roster: Vec<Uuid> = game.players().keys().copied().collect();
            let plan = plan_reconciliation(&roster, &visible, &self.grace, now);
            for id in plan.evict {
                if id == self.identity.id {
                    continue;
                }
                let _ = game.set_connected(id, false);
                game.release_towers(id);
                if game.remove_player(id).is_ok() {
                    log::info!("participant {id} disconnected (absent past grace window)");
                    roster_changed = true;
                }
            }
            for id in plan.reconnect {
                self.grace.clear(id);
                let _ = game.set_connected(id, true);
            }
        }
        if roster_changed {
            self.refresh_local_state();
            self.publish_advertisement().await;
        }
    }

    // ── Liveness ─────────────────────────────────────────────────────

    /// Periodic presence re-publication; an independent liveness signal.
    async fn heartbeat_tick(&mut self) {
        let record = self.own_presence();
        if let Err(e) = self.transport.track_presence(record).await {
            log::warn!("heartbeat presence re-track failed: {e}");
            self.reconnect(format!("heartbeat failed: {e}")).await;
        }
    }

    /// Client staleness check: silence past the threshold is treated like a
    /// transport error even though none was reported.
    async fn watchdog_tick(&mut self) {
        let elapsed = self.last_state_at.elapsed();
        if elapsed > self.config.stale_threshold {
            log::warn!("no replicated state for {elapsed:?}; assuming stale session");
            self.reconnect("stale session".to_string()).await;
        }
    }

    // ── Reconnection ─────────────────────────────────────────────────

    /// Bounded-backoff reconnection. Re-entry is guarded; the persisted
    /// identity keeps `joined_at` unchanged, so an outage never perturbs
    /// election ordering. Ends only in success or exhaustion.
    async fn reconnect(&mut self, reason: String) {
        if self.reconnecting || self.terminated {
            return;
        }
        self.reconnecting = true;
        log::warn!("connection degraded ({reason}); entering reconnect");

        // Tear down the periodic loops and subscription first.
        self.loop_mode = LoopMode::Off;
        self.transport.leave().await;

        let mut attempt = 0u32;
        let stream = loop {
            attempt += 1;
            if self.config.backoff.exhausted(attempt) {
                break None;
            }
            let delay = self.config.backoff.delay(attempt);
            self.emit(SessionEvent::Reconnecting { attempt });
            log::info!(
                "reconnect attempt {attempt}/{} in {delay:?}",
                self.config.backoff.max_attempts
            );
            tokio::time::sleep(delay).await;
            let presence = self.own_presence();
            match self.transport.join(presence).await {
                Ok(stream) => break Some(stream),
                Err(e) => log::warn!("reconnect attempt {attempt} failed: {e}"),
            }
        };

        self.reconnecting = false;
        match stream {
            Some(stream) => {
                self.transport_rx = stream;
                self.last_state_at = Instant::now();
                self.heartbeat.reset();
                self.watchdog.reset();
                self.tick.reset();
                // Resume the loop variant for the current role and phase.
                self.sync_loop_mode();
                log::info!("reconnected on attempt {attempt}");
                self.emit(SessionEvent::Reconnected);
                self.emit(SessionEvent::Notice("Connection restored".to_string()));
            }
            None => {
                let reason = format!(
                    "Connection lost after {} reconnect attempts",
                    self.config.backoff.max_attempts
                );
                log::error!("{reason}; manual rejoin required");
                self.terminated = true;
                self.emit(SessionEvent::ConnectionLost {
                    reason,
                    credential: self.credential.clone(),
                });
            }
        }
    }

    // ── Discovery ────────────────────────────────────────────────────

    /// (Re-)announce this session on the discovery channel. Best-effort.
    async fn publish_advertisement(&mut self) {
        let Some(game) = self.game.as_ref() else { return };
        let advertisement = Advertisement {
            room_code: self.room_code.clone(),
            room_name: game.settings().room_name.clone(),
            host_name: self.identity.name.clone(),
            host_id: self.identity.id,
            player_count: game.player_count(),
            max_players: game.capacity(),
            has_password: self.password.is_some(),
            map_size: game.settings().map_size,
            difficulty: game.settings().difficulty,
            in_game: game.phase() != GamePhase::Lobby,
        };
        let frame = match DiscoveryMessage::Announce(advertisement).encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                log::error!("failed to encode advertisement: {e}");
                return;
            }
        };
        if !self.discovery_joined {
            match self.discovery.subscribe_only().await {
                // Announcements are outbound-only; the stream is dropped.
                Ok(_stream) => self.discovery_joined = true,
                Err(e) => {
                    log::warn!("discovery channel unavailable: {e}");
                    return;
                }
            }
        }
        self.discovery.send(frame);
    }

    // ── Small helpers ────────────────────────────────────────────────

    fn own_presence(&self) -> PresenceRecord {
        PresenceRecord {
            participant_id: self.identity.id,
            name: self.identity.name.clone(),
            joined_at: self.identity.joined_at,
            is_host: self.role == Role::Host,
            is_spectator: self.spectator,
        }
    }

    fn emit(&self, event: SessionEvent) {
        // The event stream is a render feed; overflow drops are repaired by
        // the next snapshot.
        if let Err(e) = self.events_tx.try_send(event) {
            log::trace!("session event dropped: {e}");
        }
    }
}
