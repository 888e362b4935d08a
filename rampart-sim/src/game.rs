//! The authoritative match state and its per-action mutators.
//!
//! Every mutator validates against current state and either applies exactly
//! one change or returns a [`GameError`] whose `Display` text is what the
//! rejected player sees. The session layer never inspects simulation rules;
//! it only forwards actions and relays outcomes.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::GameEvent;
use crate::map::{Grid, MapSize};

/// Base cost of an upgrade at level N is `UPGRADE_COST_PER_LEVEL * N`.
const UPGRADE_COST_PER_LEVEL: u32 = 40;
/// Towers refund this many sixtieths of invested gold when sold.
const SELL_REFUND_NUM: u32 = 36;
const SELL_REFUND_DEN: u32 = 60;
const TECH_COST: u32 = 100;
const ABILITY_COST: u32 = 75;
const CREEP_COST: u32 = 10;
const MAX_CREEPS_PER_SEND: u32 = 20;
const MAX_TOWER_LEVEL: u8 = 3;

/// Selectable difficulty; scales the team's starting resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Normal,
    Hard,
}

impl Difficulty {
    pub fn starting_gold(&self) -> u32 {
        match self {
            Difficulty::Easy => 200,
            Difficulty::Normal => 150,
            Difficulty::Hard => 100,
        }
    }

    pub fn starting_lives(&self) -> u32 {
        match self {
            Difficulty::Easy => 30,
            Difficulty::Normal => 20,
            Difficulty::Hard => 10,
        }
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Difficulty::Normal
    }
}

/// Lobby-configurable match settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSettings {
    pub room_name: String,
    pub map_size: MapSize,
    pub difficulty: Difficulty,
    pub max_players: usize,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            room_name: "Rampart".to_string(),
            map_size: MapSize::default(),
            difficulty: Difficulty::default(),
            max_players: 4,
        }
    }
}

/// Match lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    Lobby,
    Playing,
    GameOver { victory: bool },
}

/// Team role selected in the lobby; at most one player per governor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Governor {
    Artificer,
    Quartermaster,
    Marshal,
    Warden,
}

/// Shared team technology, purchased once from team gold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tech {
    SharpenedSteel,
    FrostCoating,
    GoldSynthesis,
    RapidDeployment,
}

/// Activated team ability, paid from team gold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ability {
    Airstrike,
    FreezePulse,
    Overcharge,
}

/// Tower archetype; determines placement cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TowerKind {
    Arrow,
    Cannon,
    Frost,
    Tesla,
}

impl TowerKind {
    pub fn cost(&self) -> u32 {
        match self {
            TowerKind::Arrow => 50,
            TowerKind::Cannon => 75,
            TowerKind::Frost => 60,
            TowerKind::Tesla => 90,
        }
    }
}

/// Per-tower target-selection mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Targeting {
    First,
    Last,
    Strongest,
    Weakest,
}

impl Default for Targeting {
    fn default() -> Self {
        Targeting::First
    }
}

/// A placed tower. `owner: None` means neutral — the owner disconnected and
/// the tower now belongs to the team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tower {
    pub id: Uuid,
    pub owner: Option<Uuid>,
    pub kind: TowerKind,
    pub level: u8,
    pub x: u8,
    pub y: u8,
    pub targeting: Targeting,
    /// Total gold sunk into this tower; the sell refund is computed from it.
    pub invested: u32,
}

/// A roster entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: Uuid,
    pub name: String,
    pub governor: Option<Governor>,
    pub ready: bool,
    pub connected: bool,
}

/// Team vote subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteKind {
    Surrender,
    SkipWave,
}

/// An in-progress team vote. Resolves once every connected player has cast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteState {
    pub kind: VoteKind,
    pub started_by: Uuid,
    pub votes: BTreeMap<Uuid, bool>,
}

/// An upgrade deferred to the start of the next wave.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct QueuedUpgrade {
    tower_id: Uuid,
    player_id: Uuid,
}

/// Simulation validation failures. `Display` text is shown to players
/// verbatim via `action_result` messages.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("Cannot place tower")]
    CannotPlaceTower,
    #[error("Not enough gold")]
    NotEnoughGold,
    #[error("Room is full")]
    RoomFull,
    #[error("Only available in the lobby")]
    LobbyOnly,
    #[error("Only available during play")]
    PlayOnly,
    #[error("Game is over")]
    GameEnded,
    #[error("Wave already in progress")]
    WaveInProgress,
    #[error("Not all players are ready")]
    NotAllReady,
    #[error("Unknown player")]
    UnknownPlayer,
    #[error("Unknown tower")]
    UnknownTower,
    #[error("Not your tower")]
    NotYourTower,
    #[error("Tower is at maximum level")]
    MaxLevel,
    #[error("Tech already owned")]
    TechOwned,
    #[error("Governor already taken")]
    GovernorTaken,
    #[error("A vote is already in progress")]
    VoteInProgress,
    #[error("No vote in progress")]
    NoVote,
    #[error("Already voted")]
    AlreadyVoted,
    #[error("Upgrade already queued")]
    AlreadyQueued,
    #[error("Nothing queued for that tower")]
    NothingQueued,
    #[error("Invalid creep count")]
    InvalidCreepCount,
    #[error("Invalid target")]
    InvalidTarget,
    #[error("Invalid settings")]
    InvalidSettings,
}

/// A complete, self-sufficient copy of match state.
///
/// Reconstructing a [`Game`] from a snapshot never replays history; the
/// snapshot carries everything, including undrained events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot(Game);

impl GameSnapshot {
    /// Borrow the captured state (read-only mirror for rendering).
    pub fn state(&self) -> &Game {
        &self.0
    }
}

/// The authoritative match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    settings: GameSettings,
    phase: GamePhase,
    players: BTreeMap<Uuid, Player>,
    grid: Grid,
    towers: BTreeMap<Uuid, Tower>,
    wave: u32,
    wave_in_progress: bool,
    lives: u32,
    team_gold: u32,
    techs: BTreeSet<Tech>,
    upgrade_queue: Vec<QueuedUpgrade>,
    vote: Option<VoteState>,
    events: VecDeque<GameEvent>,
}

impl Game {
    pub fn new(settings: GameSettings) -> Self {
        let grid = Grid::new(settings.map_size);
        let team_gold = settings.difficulty.starting_gold();
        let lives = settings.difficulty.starting_lives();
        Self {
            settings,
            phase: GamePhase::Lobby,
            players: BTreeMap::new(),
            grid,
            towers: BTreeMap::new(),
            wave: 0,
            wave_in_progress: false,
            lives,
            team_gold,
            techs: BTreeSet::new(),
            upgrade_queue: Vec::new(),
            vote: None,
            events: VecDeque::new(),
        }
    }

    /// Reconstruct a match wholesale from a snapshot.
    pub fn from_snapshot(snapshot: &GameSnapshot) -> Self {
        snapshot.0.clone()
    }

    /// Capture a complete copy of current state.
    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot(self.clone())
    }

    // ── Roster ───────────────────────────────────────────────────────

    /// Admit a player, or mark an existing roster entry reconnected.
    pub fn add_player(&mut self, id: Uuid, name: impl Into<String>) -> Result<(), GameError> {
        if let Some(player) = self.players.get_mut(&id) {
            // Rejoin of a known player is idempotent.
            player.connected = true;
            return Ok(());
        }
        if self.players.len() >= self.settings.max_players {
            return Err(GameError::RoomFull);
        }
        let name = name.into();
        self.players.insert(
            id,
            Player {
                id,
                name: name.clone(),
                governor: None,
                ready: false,
                connected: true,
            },
        );
        self.push_event(GameEvent::PlayerJoined { player_id: id, name });
        Ok(())
    }

    /// Drop a player from the roster, releasing their towers to the team.
    pub fn remove_player(&mut self, id: Uuid) -> Result<(), GameError> {
        if self.players.remove(&id).is_none() {
            return Err(GameError::UnknownPlayer);
        }
        self.release_towers(id);
        self.upgrade_queue.retain(|q| q.player_id != id);
        if let Some(vote) = self.vote.as_mut() {
            vote.votes.remove(&id);
        }
        self.push_event(GameEvent::PlayerLeft { player_id: id });
        log::debug!("player {id} removed from roster");
        Ok(())
    }

    pub fn set_connected(&mut self, id: Uuid, connected: bool) -> Result<(), GameError> {
        let player = self.players.get_mut(&id).ok_or(GameError::UnknownPlayer)?;
        player.connected = connected;
        Ok(())
    }

    /// Release every tower owned by `id` to a neutral, team-owned state.
    pub fn release_towers(&mut self, id: Uuid) {
        for tower in self.towers.values_mut() {
            if tower.owner == Some(id) {
                tower.owner = None;
            }
        }
    }

    // ── Towers ───────────────────────────────────────────────────────

    pub fn place_tower(
        &mut self,
        player_id: Uuid,
        x: u8,
        y: u8,
        kind: TowerKind,
    ) -> Result<(), GameError> {
        self.require_not_over()?;
        self.require_player(player_id)?;
        if !self.grid.buildable(x, y) || self.tower_at(x, y).is_some() {
            return Err(GameError::CannotPlaceTower);
        }
        let cost = kind.cost();
        self.spend(cost)?;
        let id = Uuid::new_v4();
        self.towers.insert(
            id,
            Tower {
                id,
                owner: Some(player_id),
                kind,
                level: 1,
                x,
                y,
                targeting: Targeting::default(),
                invested: cost,
            },
        );
        self.push_event(GameEvent::TowerPlaced { player_id, tower_id: id, x, y, kind });
        Ok(())
    }

    pub fn sell_tower(&mut self, player_id: Uuid, tower_id: Uuid) -> Result<(), GameError> {
        self.require_not_over()?;
        self.require_player(player_id)?;
        let tower = self.towers.get(&tower_id).ok_or(GameError::UnknownTower)?;
        // Neutral towers are sellable by anyone on the team.
        if tower.owner.is_some() && tower.owner != Some(player_id) {
            return Err(GameError::NotYourTower);
        }
        let refund = tower.invested * SELL_REFUND_NUM / SELL_REFUND_DEN;
        self.towers.remove(&tower_id);
        self.upgrade_queue.retain(|q| q.tower_id != tower_id);
        self.team_gold += refund;
        self.push_event(GameEvent::TowerSold { player_id, tower_id });
        Ok(())
    }

    pub fn upgrade_tower(&mut self, player_id: Uuid, tower_id: Uuid) -> Result<(), GameError> {
        self.require_not_over()?;
        self.require_player(player_id)?;
        let tower = self.towers.get(&tower_id).ok_or(GameError::UnknownTower)?;
        if tower.level >= MAX_TOWER_LEVEL {
            return Err(GameError::MaxLevel);
        }
        let cost = UPGRADE_COST_PER_LEVEL * tower.level as u32;
        self.spend(cost)?;
        let tower = self.towers.get_mut(&tower_id).ok_or(GameError::UnknownTower)?;
        tower.level += 1;
        tower.invested += cost;
        let level = tower.level;
        self.push_event(GameEvent::TowerUpgraded { player_id, tower_id, level });
        Ok(())
    }

    pub fn set_targeting(
        &mut self,
        player_id: Uuid,
        tower_id: Uuid,
        targeting: Targeting,
    ) -> Result<(), GameError> {
        self.require_player(player_id)?;
        let tower = self.towers.get_mut(&tower_id).ok_or(GameError::UnknownTower)?;
        if tower.owner.is_some() && tower.owner != Some(player_id) {
            return Err(GameError::NotYourTower);
        }
        tower.targeting = targeting;
        Ok(())
    }

    pub fn queue_upgrade(&mut self, player_id: Uuid, tower_id: Uuid) -> Result<(), GameError> {
        self.require_not_over()?;
        self.require_player(player_id)?;
        let tower = self.towers.get(&tower_id).ok_or(GameError::UnknownTower)?;
        if tower.level >= MAX_TOWER_LEVEL {
            return Err(GameError::MaxLevel);
        }
        if self.upgrade_queue.iter().any(|q| q.tower_id == tower_id) {
            return Err(GameError::AlreadyQueued);
        }
        self.upgrade_queue.push(QueuedUpgrade { tower_id, player_id });
        Ok(())
    }

    pub fn cancel_queue(&mut self, player_id: Uuid, tower_id: Uuid) -> Result<(), GameError> {
        self.require_player(player_id)?;
        let before = self.upgrade_queue.len();
        self.upgrade_queue.retain(|q| q.tower_id != tower_id);
        if self.upgrade_queue.len() == before {
            return Err(GameError::NothingQueued);
        }
        Ok(())
    }

    // ── Waves ────────────────────────────────────────────────────────

    /// Start the next wave. From the lobby this begins the match; every
    /// connected player must be ready. Queued upgrades are applied first.
    pub fn start_wave(&mut self, player_id: Uuid) -> Result<(), GameError> {
        self.require_player(player_id)?;
        match self.phase {
            GamePhase::GameOver { .. } => return Err(GameError::GameEnded),
            GamePhase::Lobby => {
                if self.players.values().any(|p| p.connected && !p.ready) {
                    return Err(GameError::NotAllReady);
                }
                self.phase = GamePhase::Playing;
            }
            GamePhase::Playing => {
                if self.wave_in_progress {
                    return Err(GameError::WaveInProgress);
                }
            }
        }
        self.apply_queued_upgrades();
        self.wave += 1;
        self.wave_in_progress = true;
        let wave = self.wave;
        self.push_event(GameEvent::WaveStarted { wave });
        log::info!("wave {wave} started");
        Ok(())
    }

    /// Complete the running wave. Not a wire action: the hosting engine
    /// calls this when the last creep dies or leaks.
    pub fn resolve_wave(&mut self, leaked: u32) -> Result<(), GameError> {
        if self.phase != GamePhase::Playing || !self.wave_in_progress {
            return Err(GameError::PlayOnly);
        }
        self.wave_in_progress = false;
        let wave = self.wave;
        self.lives = self.lives.saturating_sub(leaked);
        self.team_gold += 20 + 5 * wave;
        self.push_event(GameEvent::WaveCompleted { wave, leaked });
        if self.lives == 0 {
            self.end_game(false);
        }
        Ok(())
    }

    // ── Economy & team actions ───────────────────────────────────────

    pub fn buy_tech(&mut self, player_id: Uuid, tech: Tech) -> Result<(), GameError> {
        self.require_not_over()?;
        self.require_player(player_id)?;
        if self.techs.contains(&tech) {
            return Err(GameError::TechOwned);
        }
        self.spend(TECH_COST)?;
        self.techs.insert(tech);
        self.push_event(GameEvent::TechPurchased { player_id, tech });
        Ok(())
    }

    pub fn use_ability(
        &mut self,
        player_id: Uuid,
        ability: Ability,
        x: u8,
        y: u8,
    ) -> Result<(), GameError> {
        self.require_playing()?;
        self.require_player(player_id)?;
        if !self.grid.in_bounds(x, y) {
            return Err(GameError::InvalidTarget);
        }
        self.spend(ABILITY_COST)?;
        self.push_event(GameEvent::AbilityUsed { player_id, ability, x, y });
        Ok(())
    }

    pub fn send_creeps(&mut self, player_id: Uuid, count: u32) -> Result<(), GameError> {
        self.require_playing()?;
        self.require_player(player_id)?;
        if count == 0 || count > MAX_CREEPS_PER_SEND {
            return Err(GameError::InvalidCreepCount);
        }
        self.spend(count * CREEP_COST)?;
        self.push_event(GameEvent::CreepsSent { player_id, count });
        Ok(())
    }

    // ── Lobby ────────────────────────────────────────────────────────

    pub fn select_governor(&mut self, player_id: Uuid, governor: Governor) -> Result<(), GameError> {
        self.require_lobby()?;
        self.require_player(player_id)?;
        if self
            .players
            .values()
            .any(|p| p.id != player_id && p.governor == Some(governor))
        {
            return Err(GameError::GovernorTaken);
        }
        let player = self.players.get_mut(&player_id).ok_or(GameError::UnknownPlayer)?;
        player.governor = Some(governor);
        self.push_event(GameEvent::GovernorSelected { player_id, governor });
        Ok(())
    }

    pub fn set_ready(&mut self, player_id: Uuid, ready: bool) -> Result<(), GameError> {
        self.require_lobby()?;
        let player = self.players.get_mut(&player_id).ok_or(GameError::UnknownPlayer)?;
        player.ready = ready;
        Ok(())
    }

    /// Replace the match settings. Lobby only; shrinking below the current
    /// roster is rejected, and a map change clears placed towers.
    pub fn update_settings(&mut self, settings: GameSettings) -> Result<(), GameError> {
        self.require_lobby()?;
        if settings.max_players == 0 || settings.max_players < self.players.len() {
            return Err(GameError::InvalidSettings);
        }
        if settings.map_size != self.settings.map_size {
            self.grid = Grid::new(settings.map_size);
            self.towers.clear();
            self.upgrade_queue.clear();
        }
        if settings.difficulty != self.settings.difficulty {
            self.team_gold = settings.difficulty.starting_gold();
            self.lives = settings.difficulty.starting_lives();
        }
        self.settings = settings;
        Ok(())
    }

    // ── Votes ────────────────────────────────────────────────────────

    /// Open a team vote. The starter's own "yes" is cast immediately, so a
    /// lone player resolves instantly.
    pub fn start_vote(&mut self, player_id: Uuid, kind: VoteKind) -> Result<(), GameError> {
        self.require_playing()?;
        self.require_player(player_id)?;
        if self.vote.is_some() {
            return Err(GameError::VoteInProgress);
        }
        let mut votes = BTreeMap::new();
        votes.insert(player_id, true);
        self.vote = Some(VoteState { kind, started_by: player_id, votes });
        self.push_event(GameEvent::VoteStarted { player_id, kind });
        self.try_resolve_vote();
        Ok(())
    }

    pub fn cast_vote(&mut self, player_id: Uuid, approve: bool) -> Result<(), GameError> {
        self.require_player(player_id)?;
        let vote = self.vote.as_mut().ok_or(GameError::NoVote)?;
        if vote.votes.contains_key(&player_id) {
            return Err(GameError::AlreadyVoted);
        }
        vote.votes.insert(player_id, approve);
        self.try_resolve_vote();
        Ok(())
    }

    fn try_resolve_vote(&mut self) {
        let Some(vote) = self.vote.as_ref() else { return };
        let eligible = self.players.values().filter(|p| p.connected).count();
        if vote.votes.len() < eligible {
            return;
        }
        let kind = vote.kind;
        let yes = vote.votes.values().filter(|v| **v).count();
        let passed = yes * 2 > vote.votes.len();
        self.vote = None;
        self.push_event(GameEvent::VoteResolved { kind, passed });
        if passed {
            match kind {
                VoteKind::Surrender => self.end_game(false),
                VoteKind::SkipWave => {
                    // Jump straight into the next wave.
                    self.wave += 1;
                    self.wave_in_progress = true;
                    let wave = self.wave;
                    self.push_event(GameEvent::WaveStarted { wave });
                }
            }
        }
    }

    // ── Events ───────────────────────────────────────────────────────

    /// Take the ordered events accumulated since the last drain.
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        self.events.drain(..).collect()
    }

    /// Append an event to the pending queue (also used by the session layer
    /// for relayed pings).
    pub fn push_event(&mut self, event: GameEvent) {
        self.events.push_back(event);
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn players(&self) -> &BTreeMap<Uuid, Player> {
        &self.players
    }

    pub fn player(&self, id: Uuid) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn capacity(&self) -> usize {
        self.settings.max_players
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.settings.max_players
    }

    pub fn towers(&self) -> &BTreeMap<Uuid, Tower> {
        &self.towers
    }

    pub fn tower_at(&self, x: u8, y: u8) -> Option<&Tower> {
        self.towers.values().find(|t| t.x == x && t.y == y)
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn wave(&self) -> u32 {
        self.wave
    }

    pub fn lives(&self) -> u32 {
        self.lives
    }

    pub fn team_gold(&self) -> u32 {
        self.team_gold
    }

    pub fn techs(&self) -> &BTreeSet<Tech> {
        &self.techs
    }

    pub fn vote(&self) -> Option<&VoteState> {
        self.vote.as_ref()
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    // ── Internal helpers ─────────────────────────────────────────────

    fn apply_queued_upgrades(&mut self) {
        let queued = std::mem::take(&mut self.upgrade_queue);
        for entry in queued {
            let Some(tower) = self.towers.get(&entry.tower_id) else { continue };
            if tower.level >= MAX_TOWER_LEVEL {
                continue;
            }
            let cost = UPGRADE_COST_PER_LEVEL * tower.level as u32;
            if self.team_gold < cost {
                continue;
            }
            self.team_gold -= cost;
            let Some(tower) = self.towers.get_mut(&entry.tower_id) else { continue };
            tower.level += 1;
            tower.invested += cost;
            let (player_id, tower_id, level) = (entry.player_id, entry.tower_id, tower.level);
            self.push_event(GameEvent::TowerUpgraded { player_id, tower_id, level });
        }
    }

    fn end_game(&mut self, victory: bool) {
        self.phase = GamePhase::GameOver { victory };
        self.wave_in_progress = false;
        self.push_event(GameEvent::GameOver { victory });
        log::info!("game over, victory={victory}");
    }

    fn spend(&mut self, cost: u32) -> Result<(), GameError> {
        if self.team_gold < cost {
            return Err(GameError::NotEnoughGold);
        }
        self.team_gold -= cost;
        Ok(())
    }

    fn require_player(&self, id: Uuid) -> Result<(), GameError> {
        if self.players.contains_key(&id) {
            Ok(())
        } else {
            Err(GameError::UnknownPlayer)
        }
    }

    fn require_lobby(&self) -> Result<(), GameError> {
        match self.phase {
            GamePhase::Lobby => Ok(()),
            GamePhase::GameOver { .. } => Err(GameError::GameEnded),
            _ => Err(GameError::LobbyOnly),
        }
    }

    fn require_playing(&self) -> Result<(), GameError> {
        match self.phase {
            GamePhase::Playing => Ok(()),
            GamePhase::GameOver { .. } => Err(GameError::GameEnded),
            _ => Err(GameError::PlayOnly),
        }
    }

    fn require_not_over(&self) -> Result<(), GameError> {
        match self.phase {
            GamePhase::GameOver { .. } => Err(GameError::GameEnded),
            _ => Ok(()),
        }
    }
}
