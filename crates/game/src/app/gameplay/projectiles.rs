use engine::Vec2;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use super::entity::{DamageKind, DamageOutcome, Entity, Team};

pub(crate) const PROJECTILE_RADIUS: f32 = 0.15;
pub(crate) const SLASH_LIFE_SECONDS: f32 = 0.12;
pub(crate) const PORTAL_BURST_LIFE_SECONDS: f32 = 0.6;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Projectile {
    pub(crate) position: Vec2,
    velocity: Vec2,
    pub(crate) team: Team,
    damage: f32,
    life: f32,
    radius: f32,
    dead: bool,
}

impl Projectile {
    pub(crate) fn new(position: Vec2, heading: f32, speed: f32, life: f32, damage: f32, team: Team) -> Self {
        Self {
            position,
            velocity: Vec2::from_angle(heading, speed),
            team,
            damage,
            life,
            radius: PROJECTILE_RADIUS,
            dead: false,
        }
    }

    pub(crate) fn heading(&self) -> f32 {
        self.velocity.y.atan2(self.velocity.x)
    }

    pub(crate) fn is_dead(&self) -> bool {
        self.dead
    }

    /// Ages, moves, then hits the first living opposing entity it overlaps.
    /// A hit (dodged or not) consumes the projectile. The tick that uses up
    /// the remaining life still moves and can hit.
    pub(crate) fn update(
        &mut self,
        dt: f32,
        entities: &mut [Entity],
        rng: &mut ChaCha8Rng,
    ) -> Option<DamageOutcome> {
        if self.dead {
            return None;
        }
        self.life -= dt;
        if self.life <= 0.0 {
            self.dead = true;
        }
        self.position = self.position + self.velocity * dt;

        let target = entities.iter_mut().find(|entity| {
            !entity.is_dead()
                && entity.team != self.team
                && entity.position.distance(self.position) <= entity.radius + self.radius
        })?;
        self.dead = true;
        Some(target.take_damage(self.damage, DamageKind::Ranged, rng.random::<f32>()))
    }
}

/// Melee sweep. Damage lands once, on the first update, then the effect only
/// lingers for drawing.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Slash {
    pub(crate) origin: Vec2,
    pub(crate) facing: f32,
    team: Team,
    damage: f32,
    range: f32,
    arc: f32,
    life: f32,
    applied: bool,
}

impl Slash {
    pub(crate) fn new(origin: Vec2, facing: f32, team: Team, damage: f32, range: f32, arc: f32) -> Self {
        Self {
            origin,
            facing,
            team,
            damage,
            range,
            arc,
            life: SLASH_LIFE_SECONDS,
            applied: false,
        }
    }

    /// 0 when spawned, approaching 1 as the sweep expires.
    pub(crate) fn progress(&self) -> f32 {
        (1.0 - self.life / SLASH_LIFE_SECONDS).clamp(0.0, 1.0)
    }

    pub(crate) fn arc(&self) -> f32 {
        self.arc
    }

    fn covers(&self, point: Vec2) -> bool {
        if self.origin.distance(point) > self.range {
            return false;
        }
        let offset = self.origin.angle_to(point) - self.facing;
        let wrapped = offset.sin().atan2(offset.cos());
        wrapped.abs() <= self.arc * 0.5
    }

    fn update(&mut self, dt: f32, entities: &mut [Entity], rng: &mut ChaCha8Rng) -> usize {
        let mut hits = 0;
        if !self.applied {
            self.applied = true;
            for target in entities.iter_mut() {
                if target.is_dead() || target.team == self.team || !self.covers(target.position) {
                    continue;
                }
                target.take_damage(self.damage, DamageKind::Melee, rng.random::<f32>());
                hits += 1;
            }
        }
        self.life -= dt;
        hits
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PortalBurst {
    pub(crate) position: Vec2,
    pub(crate) age: f32,
}

impl PortalBurst {
    pub(crate) fn new(position: Vec2) -> Self {
        Self { position, age: 0.0 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Effect {
    Slash(Slash),
    PortalBurst(PortalBurst),
}

impl Effect {
    pub(crate) fn is_dead(&self) -> bool {
        match self {
            Self::Slash(slash) => slash.life <= 0.0,
            Self::PortalBurst(burst) => burst.age >= PORTAL_BURST_LIFE_SECONDS,
        }
    }

    /// Returns how many entities the effect damaged this tick.
    pub(crate) fn update(&mut self, dt: f32, entities: &mut [Entity], rng: &mut ChaCha8Rng) -> usize {
        match self {
            Self::Slash(slash) => slash.update(dt, entities, rng),
            Self::PortalBurst(burst) => {
                burst.age += dt;
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::gameplay::stats::Stats;
    use crate::app::gameplay::weapons::Loadout;
    use engine::WeaponDefId;
    use rand::SeedableRng;
    use std::f32::consts::PI;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(7)
    }

    fn target(position: Vec2, team: Team) -> Entity {
        let mut entity = Entity::player(
            position,
            Stats::new(3, 3, 3),
            Loadout::unarmed([WeaponDefId(0), WeaponDefId(0)]),
        );
        entity.team = team;
        entity
    }

    #[test]
    fn projectile_hits_first_opposing_target_and_expires() {
        let mut entities = vec![
            target(Vec2::new(1.0, 0.0), Team::Player),
            target(Vec2::new(1.0, 0.0), Team::Enemy),
            target(Vec2::new(1.1, 0.0), Team::Enemy),
        ];
        let mut projectile = Projectile::new(Vec2::ZERO, 0.0, 10.0, 1.6, 12.0, Team::Player);
        let outcome = projectile.update(0.1, &mut entities, &mut rng());
        assert_eq!(outcome, Some(DamageOutcome::Hit { dealt: 12.0 }));
        assert!(projectile.is_dead());
        assert_eq!(entities[0].hp, entities[0].max_hp());
        assert_eq!(entities[1].hp, entities[1].max_hp() - 12.0);
        assert_eq!(entities[2].hp, entities[2].max_hp());
    }

    #[test]
    fn final_tick_still_moves_and_hits() {
        let mut entities = vec![target(Vec2::new(1.0, 0.0), Team::Enemy)];
        let mut projectile = Projectile::new(Vec2::ZERO, 0.0, 10.0, 0.05, 12.0, Team::Player);
        assert!(matches!(
            projectile.update(0.1, &mut entities, &mut rng()),
            Some(DamageOutcome::Hit { .. })
        ));
        assert!(projectile.is_dead());
        assert!(entities[0].hp < entities[0].max_hp());
    }

    #[test]
    fn expired_projectile_that_misses_is_dead_after_moving() {
        let mut entities = vec![target(Vec2::new(0.0, 3.0), Team::Enemy)];
        let mut projectile = Projectile::new(Vec2::ZERO, 0.0, 10.0, 0.05, 12.0, Team::Player);
        assert_eq!(projectile.update(0.1, &mut entities, &mut rng()), None);
        assert!(projectile.is_dead());
        assert!((projectile.position.x - 1.0).abs() < 1e-6);
        assert_eq!(projectile.update(0.1, &mut entities, &mut rng()), None);
        assert!((projectile.position.x - 1.0).abs() < 1e-6);
        assert_eq!(entities[0].hp, entities[0].max_hp());
    }

    #[test]
    fn slash_damages_opposing_targets_inside_arc_once() {
        let mut entities = vec![
            target(Vec2::new(1.0, 0.0), Team::Enemy),
            target(Vec2::new(-1.0, 0.0), Team::Enemy),
            target(Vec2::new(0.5, 0.2), Team::Player),
            target(Vec2::new(3.0, 0.0), Team::Enemy),
        ];
        let mut effect = Effect::Slash(Slash::new(Vec2::ZERO, 0.0, Team::Player, 20.0, 1.1, 0.9 * PI));
        let mut rng = rng();
        assert_eq!(effect.update(0.05, &mut entities, &mut rng), 1);
        assert_eq!(effect.update(0.05, &mut entities, &mut rng), 0);
        assert_eq!(entities[0].hp, entities[0].max_hp() - 20.0);
        assert_eq!(entities[1].hp, entities[1].max_hp());
        assert_eq!(entities[2].hp, entities[2].max_hp());
        assert_eq!(entities[3].hp, entities[3].max_hp());
        assert!(!effect.is_dead());
        effect.update(0.05, &mut entities, &mut rng);
        assert!(effect.is_dead());
    }

    #[test]
    fn slash_arc_wraps_around_pi() {
        let slash = Slash::new(Vec2::ZERO, PI, Team::Player, 1.0, 2.0, 0.5);
        assert!(slash.covers(Vec2::new(-1.0, 0.1)));
        assert!(slash.covers(Vec2::new(-1.0, -0.1)));
        assert!(!slash.covers(Vec2::new(1.0, 0.0)));
    }

    #[test]
    fn portal_burst_lives_for_fixed_duration() {
        let mut effect = Effect::PortalBurst(PortalBurst::new(Vec2::new(2.0, 2.0)));
        let mut entities: Vec<Entity> = Vec::new();
        effect.update(0.5, &mut entities, &mut rng());
        assert!(!effect.is_dead());
        effect.update(0.2, &mut entities, &mut rng());
        assert!(effect.is_dead());
    }
}
