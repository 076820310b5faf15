use engine::{DrawCommand, DrawList, Rgba, SpriteFallback, SpriteFrame, Vec2};

use super::entity::{Entity, Role, Team};
use super::game::Game;
use super::map::TileHeight;
use super::projectiles::{Effect, Projectile, PORTAL_BURST_LIFE_SECONDS};

const PLAYER_FALLBACK: Rgba = Rgba::rgb(0x44, 0x44, 0x66);
const ENEMY_FALLBACK: Rgba = Rgba::rgb(0x88, 0x33, 0x33);
const BULLET_FALLBACK: Rgba = Rgba::rgb(0xbb, 0x44, 0x44);
const SLASH_FALLBACK: Rgba = Rgba::rgb(0x66, 0xcc, 0xff).with_alpha(128);
const PORTAL_RING: Rgba = Rgba::rgb(0x9c, 0x7b, 0xff);
const BLOCKED_MARKER: Rgba = Rgba::rgb(255, 80, 80).with_alpha(89);
const AUTOPILOT_LINE: Rgba = Rgba::rgb(0x66, 0xcc, 0xff);
const HOVER_RING: Rgba = Rgba::rgb(0xff, 0xd2, 0x4a);

const BULLET_OFFSET_Y: f32 = -6.0;
const SLASH_OFFSET_Y: f32 = -4.0;
const SLASH_REACH_SHIFT: f32 = 0.25;
const SLASH_FALLBACK_RADIUS_PX: f32 = 32.0;
const PORTAL_OFFSET_Y: f32 = -8.0;
const PORTAL_RING_COUNT: usize = 3;
const PORTAL_RING_STAGGER: f32 = 0.15;
const BLOCKED_MARKER_OFFSET_Y: f32 = 6.0;
const BLOCKED_MARKER_RADIUS_PX: f32 = 8.0;
const HOVER_RING_RADIUS_PX: f32 = 20.0;

/// Builds the frame for `game`: explored tiles back to front, then every
/// entity, projectile and effect in ascending `x + y` order, then overlays.
pub(crate) fn render_game(game: &Game, draw_list: &mut DrawList) {
    draw_list.set_projection(game.projection());
    push_tiles(game, draw_list);
    if game.debug_overlay() {
        push_blocked_markers(game, draw_list);
    }

    let mut drawables = Vec::new();
    drawables.extend(game.entities().iter().map(entity_sprite));
    drawables.extend(game.projectiles().iter().map(projectile_sprite));
    for effect in game.effects() {
        drawables.extend(effect_commands(effect));
    }
    // Stable sort keeps insertion order between equal depths.
    drawables.sort_by(|a, b| depth(a).total_cmp(&depth(b)));
    for command in drawables {
        draw_list.push(command);
    }

    if game.debug_overlay() {
        push_autopilot_route(game, draw_list);
    }
    if let Some(target) = game.hover_target() {
        draw_list.push(DrawCommand::Ring {
            position: target.position,
            offset_y: 0.0,
            radius_px: HOVER_RING_RADIUS_PX,
            color: HOVER_RING,
        });
    }
}

fn depth(command: &DrawCommand) -> f32 {
    match command {
        DrawCommand::Sprite { position, .. }
        | DrawCommand::Ring { position, .. }
        | DrawCommand::Disc { position, .. } => position.x + position.y,
        DrawCommand::Tile { x, y, .. } => (x + y) as f32,
        DrawCommand::Polyline { .. } => f32::INFINITY,
    }
}

fn push_tiles(game: &Game, draw_list: &mut DrawList) {
    let map = game.map();
    let width = map.width() as i32;
    let height = map.height() as i32;
    for diagonal in 0..(width + height - 1) {
        for x in 0..width {
            let y = diagonal - x;
            if y < 0 || y >= height || !game.is_explored(x, y) {
                continue;
            }
            let (texture_key, fallback) = map.tile_visual(x, y);
            draw_list.push(DrawCommand::Tile {
                x,
                y,
                texture_key: texture_key.to_string(),
                fallback,
                raised: map.tile_height(x, y) == TileHeight::High,
            });
        }
    }
}

fn push_blocked_markers(game: &Game, draw_list: &mut DrawList) {
    let map = game.map();
    for y in 0..map.height() as i32 {
        for x in 0..map.width() as i32 {
            if !map.is_blocked(x, y) || !game.is_explored(x, y) {
                continue;
            }
            draw_list.push(DrawCommand::Disc {
                position: Vec2::new(x as f32, y as f32),
                offset_y: BLOCKED_MARKER_OFFSET_Y,
                radius_px: BLOCKED_MARKER_RADIUS_PX,
                color: BLOCKED_MARKER,
            });
        }
    }
}

fn push_autopilot_route(game: &Game, draw_list: &mut DrawList) {
    let Some(player) = game.player() else {
        return;
    };
    let Role::Player(state) = &player.role else {
        return;
    };
    if state.autopilot.is_empty() {
        return;
    }
    let mut points = Vec::with_capacity(state.autopilot.len() + 1);
    points.push(player.position);
    points.extend(state.autopilot.iter().copied());
    draw_list.push(DrawCommand::Polyline {
        points,
        color: AUTOPILOT_LINE,
    });
}

fn entity_sprite(entity: &Entity) -> DrawCommand {
    let fallback = match entity.team {
        Team::Player => PLAYER_FALLBACK,
        Team::Enemy => ENEMY_FALLBACK,
    };
    DrawCommand::Sprite {
        position: entity.position,
        z: entity.z,
        texture_key: entity.sprite_key.clone(),
        frame: SpriteFrame::Animated {
            elapsed: entity.anim_time,
            facing: entity.facing,
        },
        offset_y: 0.0,
        fallback: SpriteFallback::Diamond(fallback),
    }
}

fn projectile_sprite(projectile: &Projectile) -> DrawCommand {
    DrawCommand::Sprite {
        position: projectile.position,
        z: 0.0,
        texture_key: "entities/bullet".to_string(),
        frame: SpriteFrame::Animated {
            elapsed: 0.0,
            facing: projectile.heading(),
        },
        offset_y: BULLET_OFFSET_Y,
        fallback: SpriteFallback::Disc {
            radius_px: 3.0,
            color: BULLET_FALLBACK,
        },
    }
}

fn effect_commands(effect: &Effect) -> Vec<DrawCommand> {
    match effect {
        Effect::Slash(slash) => {
            let position = slash.origin + Vec2::from_angle(slash.facing, SLASH_REACH_SHIFT);
            vec![DrawCommand::Sprite {
                position,
                z: 0.0,
                texture_key: "entities/slash".to_string(),
                frame: SpriteFrame::Progress(slash.progress()),
                offset_y: SLASH_OFFSET_Y,
                fallback: SpriteFallback::Wedge {
                    radius_px: SLASH_FALLBACK_RADIUS_PX,
                    heading: slash.facing,
                    arc: slash.arc(),
                    color: SLASH_FALLBACK,
                },
            }]
        }
        Effect::PortalBurst(burst) => {
            let t = (burst.age / PORTAL_BURST_LIFE_SECONDS).clamp(0.0, 1.0);
            (0..PORTAL_RING_COUNT)
                .map(|ring| {
                    let frac = (t + ring as f32 * PORTAL_RING_STAGGER) % 1.0;
                    let alpha = (0.6 * (1.0 - frac) * 255.0).round() as u8;
                    DrawCommand::Ring {
                        position: burst.position,
                        offset_y: PORTAL_OFFSET_Y,
                        radius_px: 8.0 + frac * 28.0,
                        color: PORTAL_RING.with_alpha(alpha),
                    }
                })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::gameplay::builtin_catalog;
    use crate::app::gameplay::game::GameConfig;
    use crate::app::gameplay::map::{Legend, MapDescriptor};
    use crate::app::gameplay::stats::Stats;
    use engine::{InputSnapshot, IsoProjection};

    fn game(ascii: &str) -> Game {
        let catalog = builtin_catalog().expect("catalog");
        let map = MapDescriptor::parse_ascii("render", ascii, &Legend::builtin()).expect("map");
        let knife = catalog.weapon_def_id_by_name("knife").expect("knife");
        let pistol = catalog.weapon_def_id_by_name("pistol").expect("pistol");
        let mut game = Game::new(GameConfig::default(), catalog, map, 9);
        game.spawn_player(Stats::DEFAULT_PLAYER, [knife, pistol]);
        game
    }

    fn draw(game: &Game) -> DrawList {
        let mut list = DrawList::new(IsoProjection::new(96.0, 48.0));
        render_game(game, &mut list);
        list
    }

    #[test]
    fn tiles_are_emitted_back_to_front_by_diagonal() {
        let game = game("a..\n...\n...");
        let list = draw(&game);
        let diagonals = list
            .commands()
            .iter()
            .filter_map(|command| match command {
                DrawCommand::Tile { x, y, .. } => Some(x + y),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(diagonals.len(), 9);
        assert!(diagonals.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn unexplored_tiles_are_not_drawn() {
        let row = ".".repeat(40);
        let mut ascii = format!("a{}\n", ".".repeat(39));
        for _ in 0..39 {
            ascii.push_str(&row);
            ascii.push('\n');
        }
        let game = game(&ascii);
        let list = draw(&game);
        let far_tile_drawn = list.commands().iter().any(|command| {
            matches!(command, DrawCommand::Tile { x, y, .. } if *x == 39 && *y == 39)
        });
        assert!(!far_tile_drawn);
        assert!(list
            .commands()
            .iter()
            .any(|command| matches!(command, DrawCommand::Tile { x: 0, y: 0, .. })));
    }

    #[test]
    fn debug_overlay_marks_blocked_tiles_and_toggles_off() {
        let mut game = game("a#\n..");
        let plain = draw(&game);
        assert!(!plain
            .commands()
            .iter()
            .any(|command| matches!(command, DrawCommand::Disc { .. })));

        game.toggle_debug_overlay();
        let debug = draw(&game);
        let markers = debug
            .commands()
            .iter()
            .filter(|command| matches!(command, DrawCommand::Disc { .. }))
            .count();
        assert_eq!(markers, 1);
    }

    #[test]
    fn sprites_sort_by_depth_and_slash_uses_wedge_fallback() {
        let mut game = game("....\n.a..\n....\n..1.");
        game.spawn_enemies_from_map();
        let input = InputSnapshot::empty().with_left_mouse_down(true);
        game.step(0.01, &input);
        let list = draw(&game);

        let depths = list
            .commands()
            .iter()
            .filter_map(|command| match command {
                DrawCommand::Sprite { position, .. } => Some(position.x + position.y),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert!(depths.len() >= 3);
        assert!(depths.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!(list.commands().iter().any(|command| matches!(
            command,
            DrawCommand::Sprite {
                fallback: SpriteFallback::Wedge { .. },
                ..
            }
        )));
    }
}
