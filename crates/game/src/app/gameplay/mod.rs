mod ai;
mod entity;
mod game;
mod map;
mod nav;
mod projectiles;
mod render;
mod scene_impl;
mod stats;
mod weapons;

use std::path::Path;

use engine::{compile_defs_dir, compile_defs_str, ContentCompileError, DefDatabase, WeaponDefId, WeaponKind};
use tracing::info;

pub(crate) use game::GameConfig;
pub(crate) use map::{load_maps_dir, Legend, MapDescriptor};
pub(crate) use scene_impl::GameplayScene;
pub(crate) use stats::Stats;

const BUILTIN_DEFS_XML: &str = include_str!("builtin_defs.xml");
const BUILTIN_DEFS_NAME: &str = "builtin_defs.xml";

/// Weapon and enemy catalog embedded in the binary.
pub(crate) fn builtin_catalog() -> Result<DefDatabase, ContentCompileError> {
    compile_defs_str(Path::new(BUILTIN_DEFS_NAME), BUILTIN_DEFS_XML)
}

/// Compiles `defs_dir` when it exists, else falls back to the built-in defs.
pub(crate) fn load_catalog(defs_dir: &Path) -> Result<DefDatabase, ContentCompileError> {
    let (catalog, source) = if defs_dir.is_dir() {
        (compile_defs_dir(defs_dir)?, defs_dir.display().to_string())
    } else {
        (builtin_catalog()?, BUILTIN_DEFS_NAME.to_string())
    };
    info!(
        source = %source,
        weapons = catalog.weapon_defs().len(),
        enemies = catalog.enemy_defs().len(),
        "catalog_compiled"
    );
    Ok(catalog)
}

/// First melee weapon in slot 1 and first ranged weapon in slot 2. A catalog
/// missing either kind repeats whatever it has.
pub(crate) fn default_loadout(catalog: &DefDatabase) -> Result<[WeaponDefId; 2], String> {
    let first_of = |kind: WeaponKind| {
        catalog
            .weapon_defs()
            .iter()
            .find(|weapon| weapon.kind == kind)
            .map(|weapon| weapon.id)
    };
    match (first_of(WeaponKind::Melee), first_of(WeaponKind::Ranged)) {
        (Some(melee), Some(ranged)) => Ok([melee, ranged]),
        (Some(only), None) | (None, Some(only)) => Ok([only, only]),
        (None, None) => Err("catalog defines no weapons".to_string()),
    }
}
