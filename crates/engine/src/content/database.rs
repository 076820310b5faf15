use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WeaponDefId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnemyDefId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeaponKind {
    Melee,
    Ranged,
}

/// Minimum primary stats needed to use a weapon.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatRequirements {
    pub strength: i32,
    pub agility: i32,
    pub perception: i32,
}

impl StatRequirements {
    pub fn is_met_by(&self, strength: i32, agility: i32, perception: i32) -> bool {
        strength >= self.strength && agility >= self.agility && perception >= self.perception
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangedParams {
    pub magazine_size: u32,
    pub reload_time: f32,
    pub projectiles_per_shot: u32,
    /// When set, the cooldown between shots is `1 / shots_per_second` instead
    /// of the archetype's flat cooldown.
    pub shots_per_second: Option<f32>,
    pub projectile_speed: f32,
    pub projectile_life: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeaponArchetype {
    pub id: WeaponDefId,
    pub def_name: String,
    pub label: String,
    pub kind: WeaponKind,
    pub damage: f32,
    pub range: f32,
    pub cooldown: f32,
    /// Full melee sweep in radians. Unused by ranged weapons.
    pub arc: f32,
    pub ranged: Option<RangedParams>,
    pub requirements: StatRequirements,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnemyArchetype {
    pub id: EnemyDefId,
    pub def_name: String,
    pub label: String,
    pub sprite: String,
    pub strength: i32,
    pub agility: i32,
    pub perception: i32,
    pub base_speed: f32,
    pub radius: f32,
    pub ai_level: u8,
    pub weapon: WeaponDefId,
}

/// Read-only weapon and enemy catalog. Ids are indices in definition order.
#[derive(Debug, Default, Clone)]
pub struct DefDatabase {
    weapon_defs: Vec<WeaponArchetype>,
    weapon_ids_by_name: HashMap<String, WeaponDefId>,
    enemy_defs: Vec<EnemyArchetype>,
    enemy_ids_by_name: HashMap<String, EnemyDefId>,
}

impl DefDatabase {
    pub(crate) fn from_defs(
        mut weapon_defs: Vec<WeaponArchetype>,
        mut enemy_defs: Vec<EnemyArchetype>,
    ) -> Self {
        let mut weapon_ids_by_name = HashMap::with_capacity(weapon_defs.len());
        for (idx, def) in weapon_defs.iter_mut().enumerate() {
            let id = WeaponDefId(idx as u32);
            def.id = id;
            weapon_ids_by_name.insert(def.def_name.clone(), id);
        }
        let mut enemy_ids_by_name = HashMap::with_capacity(enemy_defs.len());
        for (idx, def) in enemy_defs.iter_mut().enumerate() {
            let id = EnemyDefId(idx as u32);
            def.id = id;
            enemy_ids_by_name.insert(def.def_name.clone(), id);
        }
        Self {
            weapon_defs,
            weapon_ids_by_name,
            enemy_defs,
            enemy_ids_by_name,
        }
    }

    pub fn weapon_def_id_by_name(&self, name: &str) -> Option<WeaponDefId> {
        self.weapon_ids_by_name.get(name).copied()
    }

    pub fn weapon_def(&self, id: WeaponDefId) -> Option<&WeaponArchetype> {
        self.weapon_defs.get(id.0 as usize)
    }

    pub fn weapon_defs(&self) -> &[WeaponArchetype] {
        &self.weapon_defs
    }

    pub fn enemy_def_id_by_name(&self, name: &str) -> Option<EnemyDefId> {
        self.enemy_ids_by_name.get(name).copied()
    }

    pub fn enemy_def(&self, id: EnemyDefId) -> Option<&EnemyArchetype> {
        self.enemy_defs.get(id.0 as usize)
    }

    /// Enemy type index as written on map spawn markers (`0`..`9`).
    pub fn enemy_def_by_type_index(&self, index: usize) -> Option<&EnemyArchetype> {
        self.enemy_defs.get(index)
    }

    pub fn enemy_defs(&self) -> &[EnemyArchetype] {
        &self.enemy_defs
    }
}
