use engine::Vec2;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use super::map::MapDescriptor;
use super::nav::{smooth_path, Pathfinder, TileCoord};

const CHASE_STANDOFF: f32 = 0.001;
const PATROL_ARRIVAL_RADIUS: f32 = 0.2;
const ROUTE_ARRIVAL_RADIUS: f32 = 0.05;
const REPATH_MIN_SECONDS: f32 = 0.5;
const REPATH_MAX_SECONDS: f32 = 1.0;
const FALLBACK_PATROL_RADIUS: i32 = 2;

/// Enemy behaviour tier. Level 1 chases, level 2 patrols, level 3 follows
/// periodically refreshed A* routes.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum AiState {
    Chase,
    Patrol { waypoints: Vec<Vec2>, index: usize },
    Pathing { route: Vec<Vec2>, next_repath_at: f32 },
}

/// Read-only world view plus the shared RNG an enemy needs for one tick.
pub(crate) struct AiContext<'a> {
    pub(crate) now: f32,
    pub(crate) dt: f32,
    pub(crate) player_position: Option<Vec2>,
    pub(crate) map: &'a MapDescriptor,
    pub(crate) pathfinder: &'a Pathfinder,
    pub(crate) rng: &'a mut ChaCha8Rng,
}

impl AiState {
    /// Patrol uses the map's waypoint tiles, else the open tiles on a square
    /// around `spawn`. Fewer than two points degrades to a chase.
    pub(crate) fn for_level(level: u8, spawn: Vec2, map: &MapDescriptor) -> Self {
        match level {
            2 => {
                let mut waypoints = map.waypoints();
                if waypoints.len() < 2 {
                    waypoints = square_around(spawn, map);
                }
                if waypoints.len() < 2 {
                    return Self::Chase;
                }
                Self::Patrol {
                    waypoints,
                    index: 0,
                }
            }
            3 => Self::Pathing {
                route: Vec::new(),
                next_repath_at: 0.0,
            },
            _ => Self::Chase,
        }
    }

    /// Displacement the enemy wants this tick. Movement itself is resolved by
    /// the caller against the map.
    pub(crate) fn desired_step(&mut self, position: Vec2, speed: f32, ctx: &mut AiContext<'_>) -> Vec2 {
        match self {
            Self::Chase => chase_step(position, speed, ctx),
            Self::Patrol { waypoints, index } => {
                let Some(mut target) = waypoints.get(*index).copied() else {
                    return Vec2::ZERO;
                };
                if position.distance(target) <= PATROL_ARRIVAL_RADIUS {
                    *index = (*index + 1) % waypoints.len();
                    target = waypoints[*index];
                }
                step_toward(position, target, speed * ctx.dt)
            }
            Self::Pathing {
                route,
                next_repath_at,
            } => {
                if ctx.now >= *next_repath_at {
                    *route = plan_route(position, ctx);
                    *next_repath_at =
                        ctx.now + ctx.rng.random_range(REPATH_MIN_SECONDS..=REPATH_MAX_SECONDS);
                }
                while route
                    .first()
                    .is_some_and(|point| position.distance(*point) <= ROUTE_ARRIVAL_RADIUS)
                {
                    route.remove(0);
                }
                match route.first() {
                    Some(next) => step_toward(position, *next, speed * ctx.dt),
                    None => chase_step(position, speed, ctx),
                }
            }
        }
    }
}

fn chase_step(position: Vec2, speed: f32, ctx: &AiContext<'_>) -> Vec2 {
    let Some(player) = ctx.player_position else {
        return Vec2::ZERO;
    };
    let distance = position.distance(player);
    let want = (speed * ctx.dt).min(distance - CHASE_STANDOFF);
    if want <= 0.0 {
        return Vec2::ZERO;
    }
    Vec2::from_angle(position.angle_to(player), want)
}

fn step_toward(position: Vec2, target: Vec2, max_step: f32) -> Vec2 {
    let distance = position.distance(target);
    if distance <= f32::EPSILON {
        return Vec2::ZERO;
    }
    Vec2::from_angle(position.angle_to(target), max_step.min(distance))
}

/// Smoothed route to the player without the start tile, or empty when there
/// is no path.
fn plan_route(position: Vec2, ctx: &AiContext<'_>) -> Vec<Vec2> {
    let Some(player) = ctx.player_position else {
        return Vec::new();
    };
    let start = TileCoord::from_world(position);
    let goal = TileCoord::from_world(player);
    let is_blocked = |x: i32, y: i32| ctx.map.is_blocked(x, y);
    let Some(tiles) = ctx.pathfinder.find_path(start, goal, is_blocked) else {
        debug!(start = ?start, goal = ?goal, "enemy_no_path");
        return Vec::new();
    };
    let points = tiles.into_iter().map(TileCoord::to_world).collect::<Vec<_>>();
    let mut route = smooth_path(&points, is_blocked);
    if !route.is_empty() {
        route.remove(0);
    }
    route
}

fn square_around(spawn: Vec2, map: &MapDescriptor) -> Vec<Vec2> {
    let center = TileCoord::from_world(spawn);
    let r = FALLBACK_PATROL_RADIUS;
    [(-r, -r), (r, -r), (r, r), (-r, r)]
        .into_iter()
        .map(|(dx, dy)| TileCoord::new(center.x + dx, center.y + dy))
        .filter(|tile| !map.is_blocked(tile.x, tile.y))
        .map(TileCoord::to_world)
        .collect()
}
