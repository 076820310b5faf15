use std::collections::HashMap;

use engine::{DefDatabase, StatRequirements, Vec2, WeaponArchetype, WeaponDefId, WeaponKind};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use super::entity::{Entity, Team};
use super::projectiles::{Effect, Projectile, Slash};

pub(crate) const SLOT_COUNT: usize = 2;
const MAX_PELLET_FAN_RADIANS: f32 = 0.6;
const PELLET_FAN_STEP_RADIANS: f32 = 0.12;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct AmmoState {
    pub(crate) ammo: u32,
    pub(crate) reloading_until: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingReload {
    slot: usize,
    ready_at: f32,
}

/// Two equipped weapons with independent ammo. Reload completion is a
/// pending record polled against the simulation clock, written back into the
/// slot-indexed ammo table.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Loadout {
    slots: [WeaponDefId; SLOT_COUNT],
    active: usize,
    ammo: [AmmoState; SLOT_COUNT],
    pending_reloads: Vec<PendingReload>,
}

impl Loadout {
    /// Ranged slots start with a full magazine.
    pub(crate) fn new(slots: [WeaponDefId; SLOT_COUNT], catalog: &DefDatabase) -> Self {
        let ammo = slots.map(|id| AmmoState {
            ammo: magazine_size(catalog, id),
            reloading_until: None,
        });
        Self {
            slots,
            active: 0,
            ammo,
            pending_reloads: Vec::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn unarmed(slots: [WeaponDefId; SLOT_COUNT]) -> Self {
        Self {
            slots,
            active: 0,
            ammo: [AmmoState::default(); SLOT_COUNT],
            pending_reloads: Vec::new(),
        }
    }

    pub(crate) fn active_slot(&self) -> usize {
        self.active
    }

    pub(crate) fn weapon(&self, slot: usize) -> Option<WeaponDefId> {
        self.slots.get(slot).copied()
    }

    pub(crate) fn active_weapon(&self) -> WeaponDefId {
        self.slots[self.active]
    }

    pub(crate) fn ammo(&self, slot: usize) -> Option<AmmoState> {
        self.ammo.get(slot).copied()
    }

    pub(crate) fn select(&mut self, slot: usize) -> bool {
        if slot >= SLOT_COUNT || slot == self.active {
            return false;
        }
        self.active = slot;
        true
    }

    pub(crate) fn swap(&mut self) {
        self.active = (self.active + 1) % SLOT_COUNT;
    }

    pub(crate) fn is_reloading(&self, slot: usize) -> bool {
        self.ammo
            .get(slot)
            .is_some_and(|state| state.reloading_until.is_some())
    }

    /// Schedules a refill of `slot`. No-op while already reloading, when the
    /// magazine is full, or for melee slots.
    pub(crate) fn request_reload(&mut self, slot: usize, now: f32, catalog: &DefDatabase) -> bool {
        let Some(params) = self
            .weapon(slot)
            .and_then(|id| catalog.weapon_def(id))
            .and_then(|def| def.ranged)
        else {
            return false;
        };
        let state = &mut self.ammo[slot];
        if state.reloading_until.is_some() || state.ammo >= params.magazine_size {
            return false;
        }
        let ready_at = now + params.reload_time;
        state.reloading_until = Some(ready_at);
        self.pending_reloads.push(PendingReload { slot, ready_at });
        true
    }

    /// Completes every reload whose deadline has passed and returns the slots
    /// that were refilled.
    pub(crate) fn poll_reloads(&mut self, now: f32, catalog: &DefDatabase) -> Vec<usize> {
        let mut completed = Vec::new();
        let slots = self.slots;
        let ammo = &mut self.ammo;
        self.pending_reloads.retain(|pending| {
            if pending.ready_at > now {
                return true;
            }
            if let Some(state) = ammo.get_mut(pending.slot) {
                state.ammo = magazine_size(catalog, slots[pending.slot]);
                state.reloading_until = None;
                completed.push(pending.slot);
            }
            false
        });
        completed
    }

    fn consume(&mut self, slot: usize, rounds: u32) {
        let state = &mut self.ammo[slot];
        state.ammo = state.ammo.saturating_sub(rounds);
    }
}

fn magazine_size(catalog: &DefDatabase, id: WeaponDefId) -> u32 {
    catalog
        .weapon_def(id)
        .and_then(|def| def.ranged)
        .map_or(0, |params| params.magazine_size)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UseOutcome {
    Swung,
    Fired { pellets: u32 },
    OnCooldown,
    /// Stat requirements not met.
    Locked,
    Reloading,
    ReloadStarted,
    /// Not enough rounds for one shot and no reload could be started.
    InsufficientAmmo,
    OutOfRange,
    NoWeapon,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct TargetInfo {
    pub(crate) position: Vec2,
    pub(crate) radius: f32,
}

impl TargetInfo {
    /// Melee reaches the target's edge; ranged fire needs its centre inside
    /// `range`.
    pub(crate) fn in_reach(&self, from: Vec2, weapon: &WeaponArchetype) -> bool {
        let reach = match weapon.kind {
            WeaponKind::Melee => weapon.range + self.radius,
            WeaponKind::Ranged => weapon.range,
        };
        from.distance(self.position) <= reach
    }
}

pub(crate) struct WeaponContext<'a> {
    pub(crate) now: f32,
    pub(crate) catalog: &'a DefDatabase,
    pub(crate) rng: &'a mut ChaCha8Rng,
    pub(crate) projectiles: &'a mut Vec<Projectile>,
    pub(crate) effects: &'a mut Vec<Effect>,
}

/// HUD summary of a slot.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct WeaponInfo {
    pub(crate) name: String,
    pub(crate) damage: f32,
    pub(crate) dps: f32,
    /// `(rounds, magazine)` for ranged weapons.
    pub(crate) ammo: Option<(u32, u32)>,
    pub(crate) reloading: bool,
    pub(crate) locked: bool,
    pub(crate) requirement: StatRequirements,
}

/// Cooldown timers keyed by `(team, slot)`, holding the clock time at which the
/// slot may be used again.
#[derive(Debug, Default)]
pub(crate) struct WeaponSystem {
    ready_at: HashMap<(Team, usize), f32>,
}

impl WeaponSystem {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reset(&mut self) {
        self.ready_at.clear();
    }

    fn is_cooling_down(&self, team: Team, slot: usize, now: f32) -> bool {
        self.ready_at
            .get(&(team, slot))
            .is_some_and(|ready_at| now < *ready_at)
    }

    /// Uses the user's active slot, aimed at `target` when given or along the
    /// user's facing otherwise.
    pub(crate) fn use_active(
        &mut self,
        ctx: &mut WeaponContext<'_>,
        user: &mut Entity,
        target: Option<TargetInfo>,
    ) -> UseOutcome {
        let slot = user.loadout.active_slot();
        let catalog = ctx.catalog;
        let Some(weapon) = catalog.weapon_def(user.loadout.active_weapon()) else {
            return UseOutcome::NoWeapon;
        };
        let stats = user.stats();
        if !weapon
            .requirements
            .is_met_by(stats.strength, stats.agility, stats.perception)
        {
            return UseOutcome::Locked;
        }
        if self.is_cooling_down(user.team, slot, ctx.now) {
            return UseOutcome::OnCooldown;
        }

        let outcome = match weapon.kind {
            WeaponKind::Melee => use_melee(ctx, weapon, user, target),
            WeaponKind::Ranged => use_ranged(ctx, weapon, user, slot, target),
        };
        if matches!(outcome, UseOutcome::Swung | UseOutcome::Fired { .. }) {
            self.ready_at
                .insert((user.team, slot), ctx.now + effective_cooldown(weapon));
        }
        outcome
    }
}

fn effective_cooldown(weapon: &WeaponArchetype) -> f32 {
    match weapon.ranged.and_then(|params| params.shots_per_second) {
        Some(shots_per_second) if shots_per_second > 0.0 => 1.0 / shots_per_second,
        _ => weapon.cooldown,
    }
}

pub(crate) fn melee_damage(weapon: &WeaponArchetype, strength: i32) -> f32 {
    (weapon.damage * (1.0 + (strength - 3) as f32 * 0.15)).round()
}

pub(crate) fn ranged_damage(weapon: &WeaponArchetype, perception: i32) -> f32 {
    weapon.damage * (1.0 + (perception - 3) as f32 * 0.05)
}

/// Pellets per shot: the archetype's count plus one per four perception
/// points above five.
pub(crate) fn pellet_count(projectiles_per_shot: u32, perception: i32) -> u32 {
    let bonus = (perception - 5).div_euclid(4).max(0) as u32;
    projectiles_per_shot + bonus
}

pub(crate) fn aim_spread(perception: i32) -> f32 {
    (0.2 - (perception - 3) as f32 * 0.04).max(0.0)
}

/// Headings for `pellets` projectiles fanned symmetrically around `heading`.
pub(crate) fn pellet_headings(heading: f32, pellets: u32) -> Vec<f32> {
    if pellets <= 1 {
        return vec![heading];
    }
    let fan = (PELLET_FAN_STEP_RADIANS * (pellets - 1) as f32).min(MAX_PELLET_FAN_RADIANS);
    let step = fan / (pellets - 1) as f32;
    (0..pellets)
        .map(|index| heading - fan * 0.5 + step * index as f32)
        .collect()
}

fn use_melee(
    ctx: &mut WeaponContext<'_>,
    weapon: &WeaponArchetype,
    user: &mut Entity,
    target: Option<TargetInfo>,
) -> UseOutcome {
    if let Some(target) = target {
        if !target.in_reach(user.position, weapon) {
            return UseOutcome::OutOfRange;
        }
        user.face_toward(target.position);
    }
    let damage = melee_damage(weapon, user.stats().strength);
    ctx.effects.push(Effect::Slash(Slash::new(
        user.position,
        user.facing,
        user.team,
        damage,
        weapon.range,
        weapon.arc,
    )));
    UseOutcome::Swung
}

fn use_ranged(
    ctx: &mut WeaponContext<'_>,
    weapon: &WeaponArchetype,
    user: &mut Entity,
    slot: usize,
    target: Option<TargetInfo>,
) -> UseOutcome {
    let Some(params) = weapon.ranged else {
        return UseOutcome::NoWeapon;
    };
    if user.loadout.is_reloading(slot) {
        return UseOutcome::Reloading;
    }
    let perception = user.stats().perception;
    let pellets = pellet_count(params.projectiles_per_shot, perception);
    let ammo = user.loadout.ammo(slot).map_or(0, |state| state.ammo);
    if ammo < pellets {
        return if user.loadout.request_reload(slot, ctx.now, ctx.catalog) {
            debug!(slot, ammo, pellets, "reload_started_out_of_ammo");
            UseOutcome::ReloadStarted
        } else {
            UseOutcome::InsufficientAmmo
        };
    }

    let heading = match target {
        Some(target) => {
            if !target.in_reach(user.position, weapon) {
                return UseOutcome::OutOfRange;
            }
            user.position.angle_to(target.position)
        }
        None => {
            let spread = aim_spread(perception);
            let jitter = if spread > 0.0 {
                ctx.rng.random_range(-1.0f32..=1.0) * spread
            } else {
                0.0
            };
            user.facing + jitter
        }
    };
    user.facing = heading;

    let damage = ranged_damage(weapon, perception);
    for pellet_heading in pellet_headings(heading, pellets) {
        ctx.projectiles.push(Projectile::new(
            user.position,
            pellet_heading,
            params.projectile_speed,
            params.projectile_life,
            damage,
            user.team,
        ));
    }
    user.loadout.consume(slot, pellets);
    if user.loadout.ammo(slot).is_some_and(|state| state.ammo == 0) {
        user.loadout.request_reload(slot, ctx.now, ctx.catalog);
    }
    UseOutcome::Fired { pellets }
}

pub(crate) fn weapon_info(entity: &Entity, slot: usize, catalog: &DefDatabase) -> Option<WeaponInfo> {
    let weapon = catalog.weapon_def(entity.loadout.weapon(slot)?)?;
    let stats = entity.stats();
    let (damage, pellets) = match (weapon.kind, weapon.ranged) {
        (WeaponKind::Ranged, Some(params)) => (
            ranged_damage(weapon, stats.perception),
            pellet_count(params.projectiles_per_shot, stats.perception),
        ),
        _ => (melee_damage(weapon, stats.strength), 1),
    };
    let cooldown = effective_cooldown(weapon);
    let dps = if cooldown > 0.0 {
        damage * pellets as f32 / cooldown
    } else {
        0.0
    };
    let ammo = weapon.ranged.map(|params| {
        let rounds = entity.loadout.ammo(slot).map_or(0, |state| state.ammo);
        (rounds, params.magazine_size)
    });
    Some(WeaponInfo {
        name: weapon.label.clone(),
        damage,
        dps,
        ammo,
        reloading: entity.loadout.is_reloading(slot),
        locked: !weapon
            .requirements
            .is_met_by(stats.strength, stats.agility, stats.perception),
        requirement: weapon.requirements,
    })
}
