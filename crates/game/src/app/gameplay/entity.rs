use engine::{EnemyDefId, Vec2};

use super::ai::AiState;
use super::stats::{DerivedStats, Stats};
use super::weapons::Loadout;

pub(crate) const PLAYER_BASE_SPEED: f32 = 4.0;
pub(crate) const PLAYER_RADIUS: f32 = 0.35;
pub(crate) const PLAYER_SPRITE: &str = "entities/player";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Team {
    Player,
    Enemy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DamageKind {
    Melee,
    Ranged,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum DamageOutcome {
    Dodged,
    Hit { dealt: f32 },
    Killed { dealt: f32 },
    /// Dead entities take no further damage.
    IgnoredDead,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct PlayerState {
    /// Remaining smoothed route of a click-to-move order, nearest point first.
    pub(crate) autopilot: Vec<Vec2>,
}

#[derive(Debug, Clone)]
pub(crate) struct EnemyState {
    pub(crate) archetype: EnemyDefId,
    pub(crate) ai: AiState,
}

#[derive(Debug, Clone)]
pub(crate) enum Role {
    Player(PlayerState),
    Enemy(EnemyState),
}

/// Movable combatant. Derived stats are computed from `stats` once, at
/// construction.
#[derive(Debug, Clone)]
pub(crate) struct Entity {
    pub(crate) position: Vec2,
    pub(crate) z: f32,
    pub(crate) radius: f32,
    pub(crate) team: Team,
    stats: Stats,
    derived: DerivedStats,
    pub(crate) hp: f32,
    dead: bool,
    /// Heading in radians, world space.
    pub(crate) facing: f32,
    pub(crate) anim_time: f32,
    pub(crate) sprite_key: String,
    pub(crate) loadout: Loadout,
    pub(crate) role: Role,
}

impl Entity {
    pub(crate) fn player(position: Vec2, stats: Stats, loadout: Loadout) -> Self {
        Self::new(
            position,
            Team::Player,
            stats,
            PLAYER_BASE_SPEED,
            PLAYER_RADIUS,
            PLAYER_SPRITE.to_string(),
            loadout,
            Role::Player(PlayerState::default()),
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        position: Vec2,
        team: Team,
        stats: Stats,
        base_speed: f32,
        radius: f32,
        sprite_key: String,
        loadout: Loadout,
        role: Role,
    ) -> Self {
        let derived = DerivedStats::compute(stats, base_speed);
        Self {
            position,
            z: 0.0,
            radius,
            team,
            stats,
            derived,
            hp: derived.max_hp,
            dead: false,
            facing: 0.0,
            anim_time: 0.0,
            sprite_key,
            loadout,
            role,
        }
    }

    pub(crate) fn stats(&self) -> Stats {
        self.stats
    }

    #[cfg(test)]
    pub(crate) fn derived(&self) -> DerivedStats {
        self.derived
    }

    pub(crate) fn max_hp(&self) -> f32 {
        self.derived.max_hp
    }

    pub(crate) fn speed(&self) -> f32 {
        self.derived.speed
    }

    pub(crate) fn is_dead(&self) -> bool {
        self.dead
    }

    pub(crate) fn is_player(&self) -> bool {
        matches!(self.role, Role::Player(_))
    }

    /// `dodge_roll` is a uniform sample in `[0, 1)`; the hit is dodged when it
    /// falls under the dodge chance, which is halved against melee.
    pub(crate) fn take_damage(&mut self, amount: f32, kind: DamageKind, dodge_roll: f32) -> DamageOutcome {
        if self.dead {
            return DamageOutcome::IgnoredDead;
        }
        let dodge_chance = match kind {
            DamageKind::Melee => self.derived.dodge * 0.5,
            DamageKind::Ranged => self.derived.dodge,
        };
        if dodge_roll < dodge_chance {
            return DamageOutcome::Dodged;
        }
        let dealt = amount * (1.0 - self.derived.toughness);
        self.hp -= dealt;
        if self.hp <= 0.0 {
            self.dead = true;
            return DamageOutcome::Killed { dealt };
        }
        DamageOutcome::Hit { dealt }
    }

    /// Moves by `delta` unless the destination's tile is blocked. A blocked
    /// destination rejects the whole step; there is no sliding along an axis.
    pub(crate) fn try_move(&mut self, delta: Vec2, is_blocked: impl Fn(i32, i32) -> bool) -> bool {
        if delta == Vec2::ZERO {
            return false;
        }
        let next = self.position + delta;
        if is_blocked(next.x.round() as i32, next.y.round() as i32) {
            return false;
        }
        self.position = next;
        true
    }

    pub(crate) fn face_toward(&mut self, point: Vec2) {
        if point.distance(self.position) > f32::EPSILON {
            self.facing = self.position.angle_to(point);
        }
    }
}
