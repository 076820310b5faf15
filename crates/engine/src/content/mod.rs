mod compiler;
mod database;

pub use compiler::{
    compile_defs_dir, compile_defs_str, ContentCompileError, ContentErrorCode, SourceLocation,
};
pub use database::{
    DefDatabase, EnemyArchetype, EnemyDefId, RangedParams, StatRequirements, WeaponArchetype,
    WeaponDefId, WeaponKind,
};
