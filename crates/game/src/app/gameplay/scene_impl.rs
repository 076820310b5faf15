use engine::{
    DefDatabase, DrawList, InputAction, InputSnapshot, Scene, SceneCommand, WeaponDefId,
};
use tracing::{info, warn};

use super::default_loadout;
use super::game::{Game, GameConfig, GameEvent};
use super::map::MapDescriptor;
use super::render::render_game;
use super::stats::Stats;

/// Runs a [`Game`] over an ordered map rotation. A portal advances to the
/// next map; the player's death restarts the current one.
pub(crate) struct GameplayScene {
    game: Game,
    rotation: Vec<MapDescriptor>,
    current: usize,
    player_stats: Stats,
    loadout: [WeaponDefId; 2],
    kills: u32,
}

impl GameplayScene {
    pub(crate) fn new(
        config: GameConfig,
        catalog: DefDatabase,
        rotation: Vec<MapDescriptor>,
        start_map: Option<&str>,
        player_stats: Stats,
        seed: u64,
    ) -> Result<Self, String> {
        if rotation.is_empty() {
            return Err("map rotation is empty".to_string());
        }
        let current = match start_map {
            Some(id) => rotation.iter().position(|map| map.id() == id).unwrap_or_else(|| {
                warn!(requested = id, fallback = rotation[0].id(), "unknown_start_map_using_first");
                0
            }),
            None => 0,
        };
        let loadout = default_loadout(&catalog)?;
        let game = Game::new(config, catalog, rotation[current].clone(), seed);
        Ok(Self {
            game,
            rotation,
            current,
            player_stats,
            loadout,
            kills: 0,
        })
    }

    #[cfg(test)]
    pub(crate) fn game(&self) -> &Game {
        &self.game
    }

    pub(crate) fn current_map_id(&self) -> &str {
        self.rotation[self.current].id()
    }

    fn advance_map(&mut self) {
        let from = self.current;
        self.current = (self.current + 1) % self.rotation.len();
        self.game.set_map(self.rotation[self.current].clone());
        self.game.place_player_at_spawn();
        let enemies = self.game.spawn_enemies_from_map();
        info!(
            from = self.rotation[from].id(),
            to = self.current_map_id(),
            enemies,
            "map_transition"
        );
    }

    fn respawn_player(&mut self) {
        self.game.set_map(self.rotation[self.current].clone());
        self.game.spawn_player(self.player_stats, self.loadout);
        self.game.spawn_enemies_from_map();
        info!(map = self.current_map_id(), "player_respawned");
    }

    fn handle_events(&mut self, events: Vec<GameEvent>) {
        for event in events {
            match event {
                GameEvent::EnemyKilled { .. } => self.kills += 1,
                GameEvent::PortalTriggered { .. } => self.advance_map(),
                GameEvent::PlayerKilled => {
                    self.respawn_player();
                    // Anything after the death belongs to the discarded run.
                    return;
                }
            }
        }
    }
}

impl Scene for GameplayScene {
    fn load(&mut self) {
        self.game.spawn_player(self.player_stats, self.loadout);
        let enemies = self.game.spawn_enemies_from_map();
        info!(
            map = self.current_map_id(),
            rotation = self.rotation.len(),
            enemies,
            "scene_loaded"
        );
    }

    fn update(&mut self, dt_seconds: f32, input: &InputSnapshot) -> SceneCommand {
        if input.quit_requested() {
            return SceneCommand::Quit;
        }
        if input.was_pressed(InputAction::ToggleDebug) {
            self.game.toggle_debug_overlay();
        }
        let events = self.game.step(dt_seconds, input);
        self.handle_events(events);
        SceneCommand::None
    }

    fn render(&self, draw_list: &mut DrawList) {
        render_game(&self.game, draw_list);
    }

    fn unload(&mut self) {
        info!(map = self.current_map_id(), kills = self.kills, "scene_unloaded");
    }

    fn debug_title(&self) -> Option<String> {
        let player = self.game.player()?;
        let mut title = format!(
            "isorpg | {} | hp {:.0}/{:.0}",
            self.current_map_id(),
            player.hp,
            player.max_hp()
        );
        if let Some(info) = self.game.active_weapon_info() {
            title.push_str(&format!(" | {} {:.0} dmg {:.0} dps", info.name, info.damage, info.dps));
            if let Some((rounds, magazine)) = info.ammo {
                title.push_str(&format!(" {rounds}/{magazine}"));
            }
            if info.reloading {
                title.push_str(" reloading");
            }
            if info.locked {
                let need = info.requirement;
                title.push_str(&format!(
                    " locked (str {} agi {} per {})",
                    need.strength, need.agility, need.perception
                ));
            }
        }
        if self.game.debug_overlay() {
            title.push_str(" | debug");
        }
        Some(title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::gameplay::builtin_catalog;
    use crate::app::gameplay::map::Legend;

    fn scene(maps: &[(&str, &str)], start: Option<&str>) -> GameplayScene {
        let legend = Legend::builtin();
        let rotation = maps
            .iter()
            .map(|(id, ascii)| MapDescriptor::parse_ascii(id, ascii, &legend).expect("map"))
            .collect();
        let catalog = builtin_catalog().expect("catalog");
        GameplayScene::new(GameConfig::default(), catalog, rotation, start, Stats::DEFAULT_PLAYER, 5)
            .expect("scene")
    }

    #[test]
    fn empty_rotation_is_rejected() {
        let catalog = builtin_catalog().expect("catalog");
        let result = GameplayScene::new(
            GameConfig::default(),
            catalog,
            Vec::new(),
            None,
            Stats::DEFAULT_PLAYER,
            1,
        );
        assert!(result.is_err());
    }

    #[test]
    fn unknown_start_map_falls_back_to_first() {
        let maps = [("first", "a.."), ("second", "a..")];
        assert_eq!(scene(&maps, Some("missing")).current_map_id(), "first");
        assert_eq!(scene(&maps, Some("second")).current_map_id(), "second");
    }

    #[test]
    fn portal_advances_rotation_and_keeps_player_stats() {
        let mut scene = scene(&[("start", "a..\n.P.\n..."), ("next", "...\n.a.\n..e")], None);
        scene.load();
        let input = InputSnapshot::empty().with_action_down(InputAction::MoveDown, true);
        let mut hops = 0;
        while scene.current_map_id() == "start" && hops < 200 {
            scene.update(0.02, &input);
            hops += 1;
        }
        assert_eq!(scene.current_map_id(), "next");
        let player = scene.game().player().expect("player");
        assert_eq!(player.stats(), Stats::DEFAULT_PLAYER);
        assert_eq!(player.position, engine::Vec2::new(1.0, 1.0));
        assert_eq!(
            scene.game().entities().iter().filter(|entity| !entity.is_player()).count(),
            1
        );
    }

    #[test]
    fn toggle_debug_key_flips_overlay_and_title() {
        let mut scene = scene(&[("only", "a..\n...")], None);
        scene.load();
        assert!(!scene.debug_title().expect("title").contains("debug"));
        scene.update(0.01, &InputSnapshot::empty().with_action_pressed(InputAction::ToggleDebug));
        assert!(scene.game().debug_overlay());
        let title = scene.debug_title().expect("title");
        assert!(title.contains("only"));
        assert!(title.contains("Knife"));
        assert!(title.ends_with("| debug"));
    }

    #[test]
    fn quit_request_stops_the_scene() {
        let mut scene = scene(&[("only", "a..")], None);
        scene.load();
        let command = scene.update(0.01, &InputSnapshot::empty().with_quit_requested(true));
        assert_eq!(command, SceneCommand::Quit);
    }
}
