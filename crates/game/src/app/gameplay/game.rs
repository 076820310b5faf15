use engine::{
    DefDatabase, EnemyDefId, InputAction, InputSnapshot, IsoProjection, Vec2, WeaponDefId,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use super::ai::{AiContext, AiState};
use super::entity::{DamageOutcome, EnemyState, Entity, Role, Team};
use super::map::MapDescriptor;
use super::nav::{smooth_path, Pathfinder, TileCoord};
use super::projectiles::{Effect, PortalBurst, Projectile};
use super::stats::Stats;
use super::weapons::{
    weapon_info, Loadout, TargetInfo, UseOutcome, WeaponContext, WeaponInfo, WeaponSystem,
};

const AUTOPILOT_ARRIVAL_RADIUS: f32 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct GameConfig {
    pub(crate) tile_width: f32,
    pub(crate) tile_height: f32,
    pub(crate) pan_speed_px: f32,
    pub(crate) camera_lerp_rate: f32,
    pub(crate) hover_pick_radius_px: f32,
    pub(crate) portal_cooldown_seconds: f32,
    /// Used until the first input snapshot reports a window size.
    pub(crate) view_size: (u32, u32),
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            tile_width: 96.0,
            tile_height: 48.0,
            pan_speed_px: 600.0,
            camera_lerp_rate: 8.0,
            hover_pick_radius_px: 28.0,
            portal_cooldown_seconds: 1.0,
            view_size: (1280, 720),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum GameEvent {
    PortalTriggered { tile: TileCoord },
    EnemyKilled { archetype: EnemyDefId },
    PlayerKilled,
}

/// One running match on one map: the entity, projectile and effect sets plus
/// camera, fog and portal bookkeeping, advanced by [`Game::step`].
pub(crate) struct Game {
    config: GameConfig,
    catalog: DefDatabase,
    map: MapDescriptor,
    pathfinder: Pathfinder,
    camera: Vec2,
    view_size: Vec2,
    clock: f32,
    rng: ChaCha8Rng,
    entities: Vec<Entity>,
    projectiles: Vec<Projectile>,
    effects: Vec<Effect>,
    weapons: WeaponSystem,
    explored: Vec<bool>,
    last_portal_at: f32,
    hover: Option<usize>,
    debug_overlay: bool,
}

impl Game {
    pub(crate) fn new(config: GameConfig, catalog: DefDatabase, map: MapDescriptor, seed: u64) -> Self {
        let pathfinder = Pathfinder::new(map.width(), map.height());
        let explored = vec![false; map.width() * map.height()];
        let mut game = Self {
            config,
            catalog,
            map,
            pathfinder,
            camera: Vec2::ZERO,
            view_size: Vec2::new(config.view_size.0 as f32, config.view_size.1 as f32),
            clock: 0.0,
            rng: ChaCha8Rng::seed_from_u64(seed),
            entities: Vec::new(),
            projectiles: Vec::new(),
            effects: Vec::new(),
            weapons: WeaponSystem::new(),
            explored,
            last_portal_at: f32::NEG_INFINITY,
            hover: None,
            debug_overlay: false,
        };
        game.clamp_camera();
        game
    }

    /// Switches to `map`. The player survives the switch; enemies, projectiles,
    /// effects, cooldowns and fog are reset.
    pub(crate) fn set_map(&mut self, map: MapDescriptor) {
        self.pathfinder = Pathfinder::new(map.width(), map.height());
        self.explored = vec![false; map.width() * map.height()];
        self.map = map;
        self.entities.retain(Entity::is_player);
        self.projectiles.clear();
        self.effects.clear();
        self.weapons.reset();
        self.hover = None;
        if let Some(player) = self.player_mut() {
            if let Role::Player(state) = &mut player.role {
                state.autopilot.clear();
            }
        }
        info!(map = self.map.id(), width = self.map.width(), height = self.map.height(), "map_set");
    }

    /// Adds a fresh player at the map's spawn point, replacing any existing one.
    pub(crate) fn spawn_player(&mut self, stats: Stats, slots: [WeaponDefId; 2]) {
        self.entities.retain(|entity| !entity.is_player());
        let loadout = Loadout::new(slots, &self.catalog);
        let player = Entity::player(self.map.spawn_point(), stats, loadout);
        info!(
            x = player.position.x,
            y = player.position.y,
            hp = player.hp,
            strength = stats.strength,
            agility = stats.agility,
            perception = stats.perception,
            "player_spawned"
        );
        self.entities.insert(0, player);
        self.snap_camera_to_player();
        self.reveal_around_player();
    }

    /// Moves the existing player to the map's arrival tile, keeping stats,
    /// hp and loadout.
    pub(crate) fn place_player_at_spawn(&mut self) {
        let spawn = self.map.spawn_point();
        if let Some(player) = self.player_mut() {
            player.position = spawn;
        }
        self.snap_camera_to_player();
        self.reveal_around_player();
    }

    /// Seeds one enemy per enemy-spawn marker. Unknown enemy types fall back
    /// to the first archetype; a marker without an AI level uses the
    /// archetype's own.
    pub(crate) fn spawn_enemies_from_map(&mut self) -> usize {
        let mut spawned = 0;
        for spawn in self.map.enemy_spawns() {
            let type_index = spawn.enemy_type.unwrap_or(0);
            let Some(archetype) = self
                .catalog
                .enemy_def_by_type_index(type_index)
                .or_else(|| self.catalog.enemy_def_by_type_index(0))
            else {
                warn!(x = spawn.x, y = spawn.y, type_index, "enemy_spawn_skipped_no_archetype");
                continue;
            };
            let id = archetype.id;
            let ai_level = spawn.ai_level.unwrap_or(archetype.ai_level);
            let position = Vec2::new(spawn.x as f32, spawn.y as f32);
            self.spawn_enemy(id, position, ai_level);
            spawned += 1;
        }
        info!(map = self.map.id(), count = spawned, "enemies_spawned");
        spawned
    }

    pub(crate) fn spawn_enemy(&mut self, archetype: EnemyDefId, position: Vec2, ai_level: u8) -> Option<usize> {
        let def = self.catalog.enemy_def(archetype)?;
        let loadout = Loadout::new([def.weapon, def.weapon], &self.catalog);
        let ai = AiState::for_level(ai_level, position, &self.map);
        let enemy = Entity::new(
            position,
            Team::Enemy,
            Stats::new(def.strength, def.agility, def.perception),
            def.base_speed,
            def.radius,
            def.sprite.clone(),
            loadout,
            Role::Enemy(EnemyState { archetype, ai }),
        );
        self.entities.push(enemy);
        Some(self.entities.len() - 1)
    }

    #[cfg(test)]
    pub(crate) fn catalog(&self) -> &DefDatabase {
        &self.catalog
    }

    pub(crate) fn map(&self) -> &MapDescriptor {
        &self.map
    }

    pub(crate) fn entities(&self) -> &[Entity] {
        &self.entities
    }

    #[cfg(test)]
    pub(crate) fn entities_mut(&mut self) -> &mut [Entity] {
        &mut self.entities
    }

    pub(crate) fn projectiles(&self) -> &[Projectile] {
        &self.projectiles
    }

    pub(crate) fn effects(&self) -> &[Effect] {
        &self.effects
    }

    pub(crate) fn player(&self) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.is_player())
    }

    pub(crate) fn player_mut(&mut self) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|entity| entity.is_player())
    }

    pub(crate) fn hover_target(&self) -> Option<&Entity> {
        self.hover.and_then(|index| self.entities.get(index))
    }

    #[cfg(test)]
    pub(crate) fn camera(&self) -> Vec2 {
        self.camera
    }

    pub(crate) fn projection(&self) -> IsoProjection {
        IsoProjection::new(self.config.tile_width, self.config.tile_height).with_origin(self.camera)
    }

    pub(crate) fn is_explored(&self, x: i32, y: i32) -> bool {
        if x < 0 || y < 0 || x as usize >= self.map.width() || y as usize >= self.map.height() {
            return false;
        }
        self.explored
            .get(y as usize * self.map.width() + x as usize)
            .copied()
            .unwrap_or(false)
    }

    pub(crate) fn debug_overlay(&self) -> bool {
        self.debug_overlay
    }

    pub(crate) fn toggle_debug_overlay(&mut self) {
        self.debug_overlay = !self.debug_overlay;
        info!(enabled = self.debug_overlay, "debug_overlay_toggled");
    }

    pub(crate) fn active_weapon_info(&self) -> Option<WeaponInfo> {
        let player = self.player()?;
        weapon_info(player, player.loadout.active_slot(), &self.catalog)
    }

    /// Advances the simulation by `dt` seconds. Callers cap `dt`; the engine
    /// loop clamps it to 33 ms.
    pub(crate) fn step(&mut self, dt: f32, input: &InputSnapshot) -> Vec<GameEvent> {
        let mut events = Vec::new();
        self.clock += dt;
        self.sync_view_size(input);

        self.pan_camera(dt, input);
        self.clamp_camera();

        if input.right_click_pressed() {
            if let Some(cursor) = input.cursor_position_px() {
                self.order_autopilot(cursor);
            }
        }
        self.update_entities(dt, input);
        self.update_projectiles(dt);
        self.update_effects(dt);

        self.collect_deaths(&mut events);
        self.entities.retain(|entity| !entity.is_dead());
        self.projectiles.retain(|projectile| !projectile.is_dead());
        self.effects.retain(|effect| !effect.is_dead());

        self.follow_player(dt);
        self.clamp_camera();

        self.check_portal(&mut events);
        self.hover = self.pick_hover_target(input.cursor_position_px());
        if input.left_mouse_down() {
            self.use_player_weapon();
        }
        self.reveal_around_player();
        events
    }

    fn sync_view_size(&mut self, input: &InputSnapshot) {
        let (width, height) = input.window_size();
        if width > 0 && height > 0 {
            self.view_size = Vec2::new(width as f32, height as f32);
        }
    }

    fn pan_camera(&mut self, dt: f32, input: &InputSnapshot) {
        let mut pan = Vec2::ZERO;
        if input.is_down(InputAction::PanLeft) {
            pan.x += 1.0;
        }
        if input.is_down(InputAction::PanRight) {
            pan.x -= 1.0;
        }
        if input.is_down(InputAction::PanUp) {
            pan.y += 1.0;
        }
        if input.is_down(InputAction::PanDown) {
            pan.y -= 1.0;
        }
        self.camera = self.camera + pan * (self.config.pan_speed_px * dt);
    }

    /// Keeps the map covering the view on each axis, or centred on an axis
    /// where the map is smaller than the view.
    fn clamp_camera(&mut self) {
        let bounds = IsoProjection::new(self.config.tile_width, self.config.tile_height)
            .grid_bounds(self.map.width() as u32, self.map.height() as u32);
        let clamp_axis = |origin: f32, min: f32, max: f32, view: f32| {
            if max - min <= view {
                (view - (max + min)) * 0.5
            } else {
                origin.clamp(view - max, -min)
            }
        };
        self.camera = Vec2::new(
            clamp_axis(self.camera.x, bounds.min.x, bounds.max.x, self.view_size.x),
            clamp_axis(self.camera.y, bounds.min.y, bounds.max.y, self.view_size.y),
        );
    }

    fn camera_target(&self, position: Vec2) -> Vec2 {
        let centre = IsoProjection::new(self.config.tile_width, self.config.tile_height)
            .diamond_center(position.x, position.y, 0.0);
        self.view_size * 0.5 - centre
    }

    fn follow_player(&mut self, dt: f32) {
        let Some(position) = self.player().map(|player| player.position) else {
            return;
        };
        let target = self.camera_target(position);
        let t = (self.config.camera_lerp_rate * dt).min(1.0);
        self.camera = self.camera + (target - self.camera) * t;
    }

    fn snap_camera_to_player(&mut self) {
        if let Some(position) = self.player().map(|player| player.position) {
            self.camera = self.camera_target(position);
        }
        self.clamp_camera();
    }

    fn order_autopilot(&mut self, cursor: Vec2) {
        let goal_world = self.projection().pick_world(cursor.x, cursor.y);
        let Some(start_world) = self.player().map(|player| player.position) else {
            return;
        };
        let start = TileCoord::from_world(start_world);
        let goal = TileCoord::from_world(goal_world);
        let map = &self.map;
        let is_blocked = |x: i32, y: i32| map.is_blocked(x, y);
        let route = match self.pathfinder.find_path(start, goal, is_blocked) {
            Some(tiles) => {
                let points = tiles.into_iter().map(TileCoord::to_world).collect::<Vec<_>>();
                let mut route = smooth_path(&points, is_blocked);
                if !route.is_empty() {
                    route.remove(0);
                }
                route
            }
            None => {
                debug!(start = ?start, goal = ?goal, "autopilot_no_path");
                return;
            }
        };
        debug!(goal = ?goal, waypoints = route.len(), "autopilot_ordered");
        if let Some(player) = self.player_mut() {
            if let Role::Player(state) = &mut player.role {
                state.autopilot = route;
            }
        }
    }

    fn update_entities(&mut self, dt: f32, input: &InputSnapshot) {
        let aim_point = input
            .cursor_position_px()
            .map(|cursor| self.projection().pick_world(cursor.x, cursor.y));
        let player_target = self.player().map(|player| TargetInfo {
            position: player.position,
            radius: player.radius,
        });
        let Self {
            catalog,
            map,
            pathfinder,
            clock,
            rng,
            entities,
            projectiles,
            effects,
            weapons,
            ..
        } = self;
        let catalog: &DefDatabase = catalog;
        let map: &MapDescriptor = map;
        let pathfinder: &Pathfinder = pathfinder;
        let now = *clock;
        let is_blocked = |x: i32, y: i32| map.is_blocked(x, y);

        for entity in entities.iter_mut() {
            entity.anim_time += dt;
            for slot in entity.loadout.poll_reloads(now, catalog) {
                debug!(team = ?entity.team, slot, "reload_complete");
            }

            if entity.is_player() {
                update_player(entity, input, dt, now, catalog, aim_point, is_blocked);
                continue;
            }

            let position = entity.position;
            let speed = entity.speed();
            let step = match &mut entity.role {
                Role::Enemy(state) => {
                    let mut ctx = AiContext {
                        now,
                        dt,
                        player_position: player_target.map(|target| target.position),
                        map,
                        pathfinder,
                        rng: &mut *rng,
                    };
                    state.ai.desired_step(position, speed, &mut ctx)
                }
                Role::Player(_) => Vec2::ZERO,
            };
            if entity.try_move(step, is_blocked) {
                entity.facing = step.y.atan2(step.x);
            }

            let Some(target) = player_target else {
                continue;
            };
            let in_reach = catalog
                .weapon_def(entity.loadout.active_weapon())
                .is_some_and(|weapon| target.in_reach(entity.position, weapon));
            if !in_reach {
                continue;
            }
            let mut weapon_ctx = WeaponContext {
                now,
                catalog,
                rng: &mut *rng,
                projectiles: &mut *projectiles,
                effects: &mut *effects,
            };
            weapons.use_active(&mut weapon_ctx, entity, Some(target));
        }
    }

    fn update_projectiles(&mut self, dt: f32) {
        for projectile in &mut self.projectiles {
            if let Some(DamageOutcome::Killed { dealt }) =
                projectile.update(dt, &mut self.entities, &mut self.rng)
            {
                debug!(dealt, "projectile_kill");
            }
        }
    }

    fn update_effects(&mut self, dt: f32) {
        for effect in &mut self.effects {
            effect.update(dt, &mut self.entities, &mut self.rng);
        }
    }

    fn collect_deaths(&self, events: &mut Vec<GameEvent>) {
        for entity in self.entities.iter().filter(|entity| entity.is_dead()) {
            match &entity.role {
                Role::Player(_) => {
                    info!(x = entity.position.x, y = entity.position.y, "player_killed");
                    events.push(GameEvent::PlayerKilled);
                }
                Role::Enemy(state) => {
                    debug!(archetype = state.archetype.0, "enemy_killed");
                    events.push(GameEvent::EnemyKilled {
                        archetype: state.archetype,
                    });
                }
            }
        }
    }

    /// Fires every `portal_cooldown_seconds` while the player stands on a
    /// portal tile.
    fn check_portal(&mut self, events: &mut Vec<GameEvent>) {
        let Some(position) = self.player().map(|player| player.position) else {
            return;
        };
        let tile = TileCoord::from_world(position);
        if !self.map.is_portal(tile.x, tile.y) {
            return;
        }
        if self.clock - self.last_portal_at < self.config.portal_cooldown_seconds {
            return;
        }
        self.last_portal_at = self.clock;
        self.effects
            .push(Effect::PortalBurst(PortalBurst::new(tile.to_world())));
        info!(map = self.map.id(), x = tile.x, y = tile.y, "portal_triggered");
        events.push(GameEvent::PortalTriggered { tile });
    }

    /// Closest living enemy to the cursor within the pick radius, limited to
    /// the player's view radius.
    fn pick_hover_target(&self, cursor: Option<Vec2>) -> Option<usize> {
        let cursor = cursor?;
        let player = self.player()?;
        let view_radius = player.stats().view_radius();
        let projection = self.projection();
        self.entities
            .iter()
            .enumerate()
            .filter(|(_, entity)| !entity.is_dead() && entity.team != player.team)
            .filter(|(_, entity)| entity.position.distance(player.position) <= view_radius)
            .map(|(index, entity)| {
                let centre = projection.diamond_center(entity.position.x, entity.position.y, entity.z);
                (index, centre.distance(cursor))
            })
            .filter(|(_, distance)| *distance <= self.config.hover_pick_radius_px)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(index, _)| index)
    }

    fn use_player_weapon(&mut self) -> Option<UseOutcome> {
        let target = self.hover_target().map(|entity| TargetInfo {
            position: entity.position,
            radius: entity.radius,
        });
        let Self {
            catalog,
            clock,
            rng,
            entities,
            projectiles,
            effects,
            weapons,
            ..
        } = self;
        let player = entities.iter_mut().find(|entity| entity.is_player())?;
        let mut ctx = WeaponContext {
            now: *clock,
            catalog: &*catalog,
            rng: &mut *rng,
            projectiles: &mut *projectiles,
            effects: &mut *effects,
        };
        let outcome = weapons.use_active(&mut ctx, player, target);
        if matches!(outcome, UseOutcome::Locked | UseOutcome::ReloadStarted) {
            debug!(outcome = ?outcome, "player_weapon_use");
        }
        Some(outcome)
    }

    fn reveal_around_player(&mut self) {
        let Some(player) = self.player() else {
            return;
        };
        let centre = player.position;
        let radius = player.stats().explore_radius();
        let width = self.map.width() as i32;
        let height = self.map.height() as i32;
        let min_x = ((centre.x - radius).floor() as i32).max(0);
        let max_x = ((centre.x + radius).ceil() as i32).min(width - 1);
        let min_y = ((centre.y - radius).floor() as i32).max(0);
        let max_y = ((centre.y + radius).ceil() as i32).min(height - 1);
        for y in min_y..=max_y {
            for x in min_x..=max_x {
                if Vec2::new(x as f32, y as f32).distance(centre) <= radius {
                    self.explored[(y * width + x) as usize] = true;
                }
            }
        }
    }
}

/// Screen-relative WASD mapped onto the isometric axes, normalised.
fn movement_direction(input: &InputSnapshot) -> Vec2 {
    let mut direction = Vec2::ZERO;
    if input.is_down(InputAction::MoveUp) {
        direction = direction + Vec2::new(-1.0, -1.0);
    }
    if input.is_down(InputAction::MoveDown) {
        direction = direction + Vec2::new(1.0, 1.0);
    }
    if input.is_down(InputAction::MoveLeft) {
        direction = direction + Vec2::new(-1.0, 1.0);
    }
    if input.is_down(InputAction::MoveRight) {
        direction = direction + Vec2::new(1.0, -1.0);
    }
    let length = direction.length();
    if length <= f32::EPSILON {
        return Vec2::ZERO;
    }
    direction * (1.0 / length)
}

fn update_player(
    player: &mut Entity,
    input: &InputSnapshot,
    dt: f32,
    now: f32,
    catalog: &DefDatabase,
    aim_point: Option<Vec2>,
    is_blocked: impl Fn(i32, i32) -> bool,
) {
    apply_slot_input(player, input, now, catalog);
    let direction = movement_direction(input);
    let manual = direction != Vec2::ZERO;
    let step = if manual {
        direction * (player.speed() * dt)
    } else {
        autopilot_step(player, dt)
    };
    let moved = player.try_move(step, is_blocked);
    // Manual input cancels autopilot; a blocked autopilot step drops the route.
    if manual || (!moved && step != Vec2::ZERO) {
        if let Role::Player(state) = &mut player.role {
            state.autopilot.clear();
        }
    }
    match aim_point {
        Some(point) => player.face_toward(point),
        None if moved => player.facing = step.y.atan2(step.x),
        None => {}
    }
}

fn apply_slot_input(player: &mut Entity, input: &InputSnapshot, now: f32, catalog: &DefDatabase) {
    if input.was_pressed(InputAction::SwapSlot) {
        player.loadout.swap();
        debug!(slot = player.loadout.active_slot(), "weapon_slot_swapped");
    }
    if input.was_pressed(InputAction::SelectSlot1) {
        player.loadout.select(0);
    }
    if input.was_pressed(InputAction::SelectSlot2) {
        player.loadout.select(1);
    }
    if input.was_pressed(InputAction::Reload) {
        let slot = player.loadout.active_slot();
        if player.loadout.request_reload(slot, now, catalog) {
            debug!(slot, "reload_requested");
        }
    }
}

fn autopilot_step(player: &mut Entity, dt: f32) -> Vec2 {
    let position = player.position;
    let max_step = player.speed() * dt;
    let Role::Player(state) = &mut player.role else {
        return Vec2::ZERO;
    };
    while state
        .autopilot
        .first()
        .is_some_and(|point| point.distance(position) <= AUTOPILOT_ARRIVAL_RADIUS)
    {
        state.autopilot.remove(0);
    }
    let Some(next) = state.autopilot.first().copied() else {
        return Vec2::ZERO;
    };
    let distance = position.distance(next);
    Vec2::from_angle(position.angle_to(next), max_step.min(distance))
}
