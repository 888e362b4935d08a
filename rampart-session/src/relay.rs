//! Pure dispatch from client intents to simulation mutations.
//!
//! One arm per action kind, each translating to exactly one idempotent
//! simulation call. Success or failure is determined entirely by the
//! simulation's own validation — the relay adds no rules of its own.
//!
//! `chat`, `ping` and the join/spectate handshakes are membership and
//! session-routing concerns handled directly by the coordinator; routing
//! them here is a caller bug and is reported as a failed outcome rather
//! than a panic.

use rampart_sim::Game;

use crate::protocol::GameAction;

/// Outcome of applying an action against the authoritative simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    pub success: bool,
    pub message: Option<String>,
}

impl ActionOutcome {
    pub fn ok() -> Self {
        Self { success: true, message: None }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self { success: false, message: Some(message.into()) }
    }
}

/// Apply a client action to the authoritative simulation.
pub fn apply(game: &mut Game, action: &GameAction) -> ActionOutcome {
    let result = match action {
        GameAction::PlaceTower { player_id, x, y, kind } => {
            game.place_tower(*player_id, *x, *y, *kind)
        }
        GameAction::SellTower { player_id, tower_id } => game.sell_tower(*player_id, *tower_id),
        GameAction::UpgradeTower { player_id, tower_id } => {
            game.upgrade_tower(*player_id, *tower_id)
        }
        GameAction::StartWave { player_id } => game.start_wave(*player_id),
        GameAction::BuyTech { player_id, tech } => game.buy_tech(*player_id, *tech),
        GameAction::SelectGovernor { player_id, governor } => {
            game.select_governor(*player_id, *governor)
        }
        GameAction::Ready { player_id, ready } => game.set_ready(*player_id, *ready),
        GameAction::UpdateSettings { settings, .. } => game.update_settings(settings.clone()),
        GameAction::UseAbility { player_id, ability, x, y } => {
            game.use_ability(*player_id, *ability, *x, *y)
        }
        GameAction::SendCreeps { player_id, count } => game.send_creeps(*player_id, *count),
        GameAction::QueueUpgrade { player_id, tower_id } => {
            game.queue_upgrade(*player_id, *tower_id)
        }
        GameAction::CancelQueue { player_id, tower_id } => {
            game.cancel_queue(*player_id, *tower_id)
        }
        GameAction::StartVote { player_id, kind } => game.start_vote(*player_id, *kind),
        GameAction::CastVote { player_id, approve } => game.cast_vote(*player_id, *approve),
        GameAction::SetTargeting { player_id, tower_id, targeting } => {
            game.set_targeting(*player_id, *tower_id, *targeting)
        }
        GameAction::Chat { .. }
        | GameAction::Ping { .. }
        | GameAction::JoinRequest { .. }
        | GameAction::SpectateRequest { .. } => {
            return ActionOutcome::fail("Not a simulation action");
        }
    };

    match result {
        Ok(()) => ActionOutcome::ok(),
        Err(e) => ActionOutcome::fail(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rampart_sim::{GameSettings, TowerKind};
    use uuid::Uuid;

    fn game_with_player() -> (Game, Uuid) {
        let mut game = Game::new(GameSettings::default());
        let id = Uuid::new_v4();
        game.add_player(id, "Alice").unwrap();
        (game, id)
    }

    #[test]
    fn test_apply_place_tower_success() {
        let (mut game, id) = game_with_player();
        let outcome = apply(
            &mut game,
            &GameAction::PlaceTower { player_id: id, x: 0, y: 0, kind: TowerKind::Arrow },
        );
        assert!(outcome.success);
        assert!(outcome.message.is_none());
        assert_eq!(game.towers().len(), 1);
    }

    #[test]
    fn test_apply_place_tower_on_path_fails_with_message() {
        let (mut game, id) = game_with_player();
        let outcome = apply(
            &mut game,
            &GameAction::PlaceTower { player_id: id, x: 2, y: 1, kind: TowerKind::Arrow },
        );
        assert!(!outcome.success);
        assert_eq!(outcome.message.as_deref(), Some("Cannot place tower"));
        assert!(game.towers().is_empty());
    }

    #[test]
    fn test_apply_validation_comes_from_simulation() {
        let (mut game, id) = game_with_player();
        let outcome = apply(&mut game, &GameAction::StartWave { player_id: id });
        // Not ready yet — the simulation decides, not the relay.
        assert_eq!(outcome.message.as_deref(), Some("Not all players are ready"));
    }

    #[test]
    fn test_apply_unknown_player() {
        let (mut game, _) = game_with_player();
        let outcome = apply(
            &mut game,
            &GameAction::Ready { player_id: Uuid::new_v4(), ready: true },
        );
        assert_eq!(outcome.message.as_deref(), Some("Unknown player"));
    }

    #[test]
    fn test_session_routing_actions_refused() {
        let (mut game, id) = game_with_player();
        for action in [
            GameAction::Chat { player_id: id, text: "hello".into() },
            GameAction::Ping { player_id: id, x: 1, y: 1 },
        ] {
            let outcome = apply(&mut game, &action);
            assert!(!outcome.success);
            assert_eq!(outcome.message.as_deref(), Some("Not a simulation action"));
        }
    }
}
