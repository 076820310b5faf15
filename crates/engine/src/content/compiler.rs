use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use roxmltree::{Document, Node};

use crate::validate_texture_key;

use super::database::{
    DefDatabase, EnemyArchetype, EnemyDefId, RangedParams, StatRequirements, WeaponArchetype,
    WeaponDefId, WeaponKind,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentErrorCode {
    ReadFile,
    XmlMalformed,
    InvalidRoot,
    UnknownDefType,
    UnknownField,
    DuplicateField,
    MissingField,
    InvalidValue,
    DuplicateDefInFile,
    UnknownReference,
}

#[derive(Debug, Clone)]
pub struct ContentCompileError {
    pub code: ContentErrorCode,
    pub message: String,
    pub file_path: PathBuf,
    pub location: Option<SourceLocation>,
}

impl fmt::Display for ContentCompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(
                f,
                "{:?}: {} (file={}, line={}, column={})",
                self.code,
                self.message,
                self.file_path.display(),
                loc.line,
                loc.column
            ),
            None => write!(
                f,
                "{:?}: {} (file={})",
                self.code,
                self.message,
                self.file_path.display()
            ),
        }
    }
}

impl std::error::Error for ContentCompileError {}

#[derive(Debug, Clone)]
struct PendingWeaponDef {
    archetype: WeaponArchetype,
}

#[derive(Debug, Clone)]
struct PendingEnemyDef {
    archetype: EnemyArchetype,
    weapon_name: String,
    file_path: PathBuf,
    location: SourceLocation,
}

#[derive(Debug, Default)]
struct PendingDefs {
    weapons: Vec<PendingWeaponDef>,
    enemies: Vec<PendingEnemyDef>,
}

impl PendingDefs {
    /// Later files override earlier definitions of the same `defName` in place,
    /// so enemy type indices stay tied to first-definition order.
    fn merge(&mut self, other: PendingDefs) {
        for weapon in other.weapons {
            let name = &weapon.archetype.def_name;
            match self
                .weapons
                .iter_mut()
                .find(|existing| &existing.archetype.def_name == name)
            {
                Some(existing) => *existing = weapon,
                None => self.weapons.push(weapon),
            }
        }
        for enemy in other.enemies {
            let name = &enemy.archetype.def_name;
            match self
                .enemies
                .iter_mut()
                .find(|existing| &existing.archetype.def_name == name)
            {
                Some(existing) => *existing = enemy,
                None => self.enemies.push(enemy),
            }
        }
    }

    fn resolve(self) -> Result<DefDatabase, ContentCompileError> {
        let weapons = self
            .weapons
            .into_iter()
            .map(|pending| pending.archetype)
            .collect::<Vec<_>>();

        let mut enemies = Vec::with_capacity(self.enemies.len());
        for pending in self.enemies {
            let Some(index) = weapons
                .iter()
                .position(|weapon| weapon.def_name == pending.weapon_name)
            else {
                return Err(ContentCompileError {
                    code: ContentErrorCode::UnknownReference,
                    message: format!(
                        "EnemyDef '{}' references unknown WeaponDef '{}'",
                        pending.archetype.def_name, pending.weapon_name
                    ),
                    file_path: pending.file_path,
                    location: Some(pending.location),
                });
            };
            let mut archetype = pending.archetype;
            archetype.weapon = WeaponDefId(index as u32);
            enemies.push(archetype);
        }

        Ok(DefDatabase::from_defs(weapons, enemies))
    }
}

/// Compiles a single `<Defs>` document.
pub fn compile_defs_str(file_path: &Path, raw: &str) -> Result<DefDatabase, ContentCompileError> {
    parse_defs_document(file_path, raw)?.resolve()
}

/// Compiles every `*.xml` file under `dir`, in sorted relative-path order.
/// A `defName` may appear once per file; later files override earlier ones.
pub fn compile_defs_dir(dir: &Path) -> Result<DefDatabase, ContentCompileError> {
    let xml_files =
        collect_xml_files_sorted(dir).map_err(|error| read_error(error.path, error.source))?;

    let mut merged = PendingDefs::default();
    for xml_file in xml_files {
        let raw = fs::read_to_string(&xml_file)
            .map_err(|source| read_error(xml_file.clone(), source))?;
        merged.merge(parse_defs_document(&xml_file, &raw)?);
    }
    merged.resolve()
}

struct ParseContext<'a, 'input> {
    file_path: &'a Path,
    doc: &'a Document<'input>,
}

impl ParseContext<'_, '_> {
    fn location_of(&self, node: Node<'_, '_>) -> SourceLocation {
        let pos = self.doc.text_pos_at(node.range().start);
        SourceLocation {
            line: pos.row as usize,
            column: pos.col as usize,
        }
    }

    fn error_at_node(
        &self,
        code: ContentErrorCode,
        message: String,
        node: Node<'_, '_>,
    ) -> ContentCompileError {
        ContentCompileError {
            code,
            message,
            file_path: self.file_path.to_path_buf(),
            location: Some(self.location_of(node)),
        }
    }

    fn required_text(
        &self,
        node: Node<'_, '_>,
        field_name: &str,
    ) -> Result<String, ContentCompileError> {
        let value = node.text().map(str::trim).unwrap_or_default().to_string();
        if value.is_empty() {
            return Err(self.error_at_node(
                ContentErrorCode::MissingField,
                format!("field <{}> must not be empty", field_name),
                node,
            ));
        }
        Ok(value)
    }

    fn parse_value<T: FromStr>(
        &self,
        node: Node<'_, '_>,
        field_name: &str,
    ) -> Result<T, ContentCompileError> {
        let value = self.required_text(node, field_name)?;
        value.parse::<T>().map_err(|_| {
            self.error_at_node(
                ContentErrorCode::InvalidValue,
                format!("{} '{}' is not a valid number", field_name, value),
                node,
            )
        })
    }

    /// Finite, non-negative float; `positive` additionally rejects zero.
    fn parse_amount(
        &self,
        node: Node<'_, '_>,
        field_name: &str,
        positive: bool,
    ) -> Result<f32, ContentCompileError> {
        let parsed = self.parse_value::<f32>(node, field_name)?;
        let valid = parsed.is_finite() && if positive { parsed > 0.0 } else { parsed >= 0.0 };
        if !valid {
            let bound = if positive { "> 0" } else { ">= 0" };
            return Err(self.error_at_node(
                ContentErrorCode::InvalidValue,
                format!("{} must be finite and {}", field_name, bound),
                node,
            ));
        }
        Ok(parsed)
    }

    fn parse_stat(&self, node: Node<'_, '_>, field_name: &str) -> Result<i32, ContentCompileError> {
        let parsed = self.parse_value::<i32>(node, field_name)?;
        if !(0..=10).contains(&parsed) {
            return Err(self.error_at_node(
                ContentErrorCode::InvalidValue,
                format!("{} must be within 0..=10", field_name),
                node,
            ));
        }
        Ok(parsed)
    }

    fn missing_field(&self, node: Node<'_, '_>, field_name: &str, def_type: &str) -> ContentCompileError {
        self.error_at_node(
            ContentErrorCode::MissingField,
            format!("missing required field <{}> in <{}>", field_name, def_type),
            node,
        )
    }
}

fn parse_defs_document(file_path: &Path, raw: &str) -> Result<PendingDefs, ContentCompileError> {
    let doc = Document::parse(raw).map_err(|error| ContentCompileError {
        code: ContentErrorCode::XmlMalformed,
        message: format!("malformed XML: {error}"),
        file_path: file_path.to_path_buf(),
        location: Some(SourceLocation {
            line: error.pos().row as usize,
            column: error.pos().col as usize,
        }),
    })?;
    let ctx = ParseContext {
        file_path,
        doc: &doc,
    };

    let root = doc.root_element();
    if root.tag_name().name() != "Defs" {
        return Err(ctx.error_at_node(
            ContentErrorCode::InvalidRoot,
            "root element must be <Defs>".to_string(),
            root,
        ));
    }

    let mut defs = PendingDefs::default();
    let mut seen_in_file = HashSet::<(&'static str, String)>::new();
    for child in root.children().filter(|node| node.is_element()) {
        let (def_type, def_name) = match child.tag_name().name() {
            "WeaponDef" => {
                let weapon = parse_weapon_def(&ctx, child)?;
                let name = weapon.archetype.def_name.clone();
                defs.weapons.push(weapon);
                ("WeaponDef", name)
            }
            "EnemyDef" => {
                let enemy = parse_enemy_def(&ctx, child)?;
                let name = enemy.archetype.def_name.clone();
                defs.enemies.push(enemy);
                ("EnemyDef", name)
            }
            other => {
                return Err(ctx.error_at_node(
                    ContentErrorCode::UnknownDefType,
                    format!(
                        "unsupported def type <{}>; expected <WeaponDef> or <EnemyDef>",
                        other
                    ),
                    child,
                ))
            }
        };
        if !seen_in_file.insert((def_type, def_name.clone())) {
            return Err(ctx.error_at_node(
                ContentErrorCode::DuplicateDefInFile,
                format!(
                    "duplicate {} '{}'; each file may define a defName only once",
                    def_type, def_name
                ),
                child,
            ));
        }
    }

    Ok(defs)
}

fn parse_weapon_def(
    ctx: &ParseContext<'_, '_>,
    node: Node<'_, '_>,
) -> Result<PendingWeaponDef, ContentCompileError> {
    let mut seen_fields = HashSet::<String>::new();
    let mut def_name: Option<String> = None;
    let mut label: Option<String> = None;
    let mut kind: Option<WeaponKind> = None;
    let mut damage: Option<f32> = None;
    let mut range: Option<f32> = None;
    let mut cooldown: Option<f32> = None;
    let mut arc: Option<f32> = None;
    let mut requirements = StatRequirements::default();
    let mut magazine_size: Option<u32> = None;
    let mut reload_time: Option<f32> = None;
    let mut projectiles_per_shot: Option<u32> = None;
    let mut shots_per_second: Option<f32> = None;
    let mut projectile_speed: Option<f32> = None;
    let mut projectile_life: Option<f32> = None;
    let mut ranged_only_field: Option<Node<'_, '_>> = None;

    for field in node.children().filter(|child| child.is_element()) {
        let field_name = field.tag_name().name().to_string();
        if !seen_fields.insert(field_name.clone()) {
            return Err(ctx.error_at_node(
                ContentErrorCode::DuplicateField,
                format!("duplicate field <{}> in <WeaponDef>", field_name),
                field,
            ));
        }

        match field_name.as_str() {
            "defName" => def_name = Some(ctx.required_text(field, "defName")?),
            "label" => label = Some(ctx.required_text(field, "label")?),
            "kind" => {
                let value = ctx.required_text(field, "kind")?;
                kind = Some(match value.as_str() {
                    "Melee" => WeaponKind::Melee,
                    "Ranged" => WeaponKind::Ranged,
                    _ => {
                        return Err(ctx.error_at_node(
                            ContentErrorCode::InvalidValue,
                            format!("invalid kind '{}'; allowed values: Melee, Ranged", value),
                            field,
                        ))
                    }
                });
            }
            "damage" => damage = Some(ctx.parse_amount(field, "damage", true)?),
            "range" => range = Some(ctx.parse_amount(field, "range", true)?),
            "cooldown" => cooldown = Some(ctx.parse_amount(field, "cooldown", false)?),
            "arc" => arc = Some(ctx.parse_amount(field, "arc", true)?),
            "minStr" => requirements.strength = ctx.parse_stat(field, "minStr")?,
            "minAgi" => requirements.agility = ctx.parse_stat(field, "minAgi")?,
            "minPer" => requirements.perception = ctx.parse_stat(field, "minPer")?,
            "magazineSize" | "reloadTime" | "projectilesPerShot" | "shotsPerSecond"
            | "projectileSpeed" | "projectileLife" => {
                ranged_only_field.get_or_insert(field);
                match field_name.as_str() {
                    "magazineSize" => {
                        let parsed = ctx.parse_value::<u32>(field, "magazineSize")?;
                        if parsed == 0 {
                            return Err(ctx.error_at_node(
                                ContentErrorCode::InvalidValue,
                                "magazineSize must be >= 1".to_string(),
                                field,
                            ));
                        }
                        magazine_size = Some(parsed);
                    }
                    "reloadTime" => reload_time = Some(ctx.parse_amount(field, "reloadTime", false)?),
                    "projectilesPerShot" => {
                        let parsed = ctx.parse_value::<u32>(field, "projectilesPerShot")?;
                        if parsed == 0 {
                            return Err(ctx.error_at_node(
                                ContentErrorCode::InvalidValue,
                                "projectilesPerShot must be >= 1".to_string(),
                                field,
                            ));
                        }
                        projectiles_per_shot = Some(parsed);
                    }
                    "shotsPerSecond" => {
                        shots_per_second = Some(ctx.parse_amount(field, "shotsPerSecond", true)?)
                    }
                    "projectileSpeed" => {
                        projectile_speed = Some(ctx.parse_amount(field, "projectileSpeed", true)?)
                    }
                    _ => projectile_life = Some(ctx.parse_amount(field, "projectileLife", true)?),
                }
            }
            _ => {
                return Err(ctx.error_at_node(
                    ContentErrorCode::UnknownField,
                    format!("unknown field <{}> in <WeaponDef>", field_name),
                    field,
                ))
            }
        }
    }

    let Some(def_name) = def_name else {
        return Err(ctx.missing_field(node, "defName", "WeaponDef"));
    };
    let Some(kind) = kind else {
        return Err(ctx.missing_field(node, "kind", "WeaponDef"));
    };
    let Some(damage) = damage else {
        return Err(ctx.missing_field(node, "damage", "WeaponDef"));
    };
    let Some(range) = range else {
        return Err(ctx.missing_field(node, "range", "WeaponDef"));
    };

    let ranged = match kind {
        WeaponKind::Melee => {
            if let Some(field) = ranged_only_field {
                return Err(ctx.error_at_node(
                    ContentErrorCode::InvalidValue,
                    format!(
                        "field <{}> is only valid for Ranged weapons",
                        field.tag_name().name()
                    ),
                    field,
                ));
            }
            None
        }
        WeaponKind::Ranged => {
            let Some(magazine_size) = magazine_size else {
                return Err(ctx.missing_field(node, "magazineSize", "WeaponDef"));
            };
            let Some(reload_time) = reload_time else {
                return Err(ctx.missing_field(node, "reloadTime", "WeaponDef"));
            };
            Some(RangedParams {
                magazine_size,
                reload_time,
                projectiles_per_shot: projectiles_per_shot.unwrap_or(1),
                shots_per_second,
                projectile_speed: projectile_speed.unwrap_or(11.0),
                projectile_life: projectile_life.unwrap_or(1.6),
            })
        }
    };

    Ok(PendingWeaponDef {
        archetype: WeaponArchetype {
            id: WeaponDefId(0),
            label: label.unwrap_or_else(|| def_name.clone()),
            def_name,
            kind,
            damage,
            range,
            cooldown: cooldown.unwrap_or(0.3),
            arc: arc.unwrap_or(std::f32::consts::PI * 0.9),
            ranged,
            requirements,
        },
    })
}

fn parse_enemy_def(
    ctx: &ParseContext<'_, '_>,
    node: Node<'_, '_>,
) -> Result<PendingEnemyDef, ContentCompileError> {
    let mut seen_fields = HashSet::<String>::new();
    let mut def_name: Option<String> = None;
    let mut label: Option<String> = None;
    let mut sprite: Option<String> = None;
    let mut strength = 3;
    let mut agility = 3;
    let mut perception = 3;
    let mut base_speed: Option<f32> = None;
    let mut radius: Option<f32> = None;
    let mut ai_level: Option<u8> = None;
    let mut weapon: Option<String> = None;

    for field in node.children().filter(|child| child.is_element()) {
        let field_name = field.tag_name().name().to_string();
        if !seen_fields.insert(field_name.clone()) {
            return Err(ctx.error_at_node(
                ContentErrorCode::DuplicateField,
                format!("duplicate field <{}> in <EnemyDef>", field_name),
                field,
            ));
        }

        match field_name.as_str() {
            "defName" => def_name = Some(ctx.required_text(field, "defName")?),
            "label" => label = Some(ctx.required_text(field, "label")?),
            "sprite" => {
                let value = ctx.required_text(field, "sprite")?;
                if let Err(error) = validate_texture_key(&value) {
                    return Err(ctx.error_at_node(
                        ContentErrorCode::InvalidValue,
                        format!("invalid sprite key '{}': {}", value, error),
                        field,
                    ));
                }
                sprite = Some(value);
            }
            "str" => strength = ctx.parse_stat(field, "str")?,
            "agi" => agility = ctx.parse_stat(field, "agi")?,
            "per" => perception = ctx.parse_stat(field, "per")?,
            "baseSpeed" => base_speed = Some(ctx.parse_amount(field, "baseSpeed", false)?),
            "radius" => radius = Some(ctx.parse_amount(field, "radius", true)?),
            "aiLevel" => {
                let parsed = ctx.parse_value::<u8>(field, "aiLevel")?;
                if !(1..=3).contains(&parsed) {
                    return Err(ctx.error_at_node(
                        ContentErrorCode::InvalidValue,
                        "aiLevel must be 1, 2 or 3".to_string(),
                        field,
                    ));
                }
                ai_level = Some(parsed);
            }
            "weapon" => weapon = Some(ctx.required_text(field, "weapon")?),
            _ => {
                return Err(ctx.error_at_node(
                    ContentErrorCode::UnknownField,
                    format!("unknown field <{}> in <EnemyDef>", field_name),
                    field,
                ))
            }
        }
    }

    let Some(def_name) = def_name else {
        return Err(ctx.missing_field(node, "defName", "EnemyDef"));
    };
    let Some(weapon_name) = weapon else {
        return Err(ctx.missing_field(node, "weapon", "EnemyDef"));
    };

    Ok(PendingEnemyDef {
        archetype: EnemyArchetype {
            id: EnemyDefId(0),
            label: label.unwrap_or_else(|| def_name.clone()),
            def_name,
            sprite: sprite.unwrap_or_else(|| "entities/enemy".to_string()),
            strength,
            agility,
            perception,
            base_speed: base_speed.unwrap_or(2.2),
            radius: radius.unwrap_or(0.35),
            ai_level: ai_level.unwrap_or(1),
            weapon: WeaponDefId(0),
        },
        weapon_name,
        file_path: ctx.file_path.to_path_buf(),
        location: ctx.location_of(node),
    })
}

struct ReadError {
    path: PathBuf,
    source: std::io::Error,
}

fn collect_xml_files_sorted(root: &Path) -> Result<Vec<PathBuf>, ReadError> {
    let mut files = Vec::<PathBuf>::new();
    collect_recursive(root, &mut files)?;
    files.sort_by_cached_key(|path| normalize_rel_path(path.strip_prefix(root).unwrap_or(path)));
    Ok(files)
}

fn collect_recursive(current: &Path, files: &mut Vec<PathBuf>) -> Result<(), ReadError> {
    let entries = fs::read_dir(current).map_err(|source| ReadError {
        path: current.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| ReadError {
            path: current.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_recursive(&path, files)?;
        } else if path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
        {
            files.push(path);
        }
    }
    Ok(())
}

fn normalize_rel_path(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

fn read_error(path: PathBuf, source: std::io::Error) -> ContentCompileError {
    ContentCompileError {
        code: ContentErrorCode::ReadFile,
        message: format!("failed to read XML file: {source}"),
        file_path: path,
        location: None,
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    const KNIFE_AND_PISTOL: &str = r#"<Defs>
        <WeaponDef>
            <defName>knife</defName><label>Knife</label><kind>Melee</kind>
            <damage>20</damage><range>1.1</range><cooldown>0.35</cooldown>
        </WeaponDef>
        <WeaponDef>
            <defName>pistol</defName><label>Pistol</label><kind>Ranged</kind>
            <damage>18</damage><range>8</range><cooldown>0.25</cooldown>
            <magazineSize>8</magazineSize><reloadTime>1.2</reloadTime>
        </WeaponDef>
        <EnemyDef>
            <defName>grunt</defName><sprite>entities/enemy</sprite><weapon>knife</weapon>
        </EnemyDef>
    </Defs>"#;

    fn write_file(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        fs::write(path, content).expect("write");
    }

    fn compile(raw: &str) -> Result<DefDatabase, ContentCompileError> {
        compile_defs_str(Path::new("defs.xml"), raw)
    }

    #[test]
    fn valid_compile_assigns_ids_in_definition_order() {
        let db = compile(KNIFE_AND_PISTOL).expect("compile");
        let knife = db.weapon_def_id_by_name("knife").expect("knife");
        let pistol = db.weapon_def_id_by_name("pistol").expect("pistol");
        assert_eq!(knife, WeaponDefId(0));
        assert_eq!(pistol, WeaponDefId(1));

        let grunt = db.enemy_def_by_type_index(0).expect("grunt");
        assert_eq!(grunt.weapon, knife);
        assert_eq!(grunt.ai_level, 1);
        assert_eq!(grunt.strength, 3);
    }

    #[test]
    fn ranged_defaults_fill_optional_fields() {
        let db = compile(KNIFE_AND_PISTOL).expect("compile");
        let pistol = db
            .weapon_def(db.weapon_def_id_by_name("pistol").expect("id"))
            .expect("def");
        let ranged = pistol.ranged.expect("ranged params");
        assert_eq!(ranged.projectiles_per_shot, 1);
        assert_eq!(ranged.shots_per_second, None);
        assert!((ranged.projectile_speed - 11.0).abs() < f32::EPSILON);
        assert!((ranged.projectile_life - 1.6).abs() < f32::EPSILON);
    }

    #[test]
    fn missing_def_name_reports_file_and_location() {
        let err = compile(
            r#"<Defs>
<WeaponDef><kind>Melee</kind><damage>1</damage><range>1</range></WeaponDef></Defs>"#,
        )
        .expect_err("err");
        assert_eq!(err.code, ContentErrorCode::MissingField);
        assert_eq!(err.file_path, Path::new("defs.xml"));
        assert_eq!(err.location.map(|loc| loc.line), Some(2));
    }

    #[test]
    fn ranged_weapon_requires_magazine() {
        let err = compile(
            r#"<Defs><WeaponDef><defName>gun</defName><kind>Ranged</kind><damage>1</damage><range>5</range><reloadTime>1</reloadTime></WeaponDef></Defs>"#,
        )
        .expect_err("err");
        assert_eq!(err.code, ContentErrorCode::MissingField);
        assert!(err.message.contains("magazineSize"));
    }

    #[test]
    fn melee_weapon_rejects_ranged_fields() {
        let err = compile(
            r#"<Defs><WeaponDef><defName>stick</defName><kind>Melee</kind><damage>1</damage><range>1</range><magazineSize>3</magazineSize></WeaponDef></Defs>"#,
        )
        .expect_err("err");
        assert_eq!(err.code, ContentErrorCode::InvalidValue);
    }

    #[test]
    fn duplicate_field_and_unknown_field_are_rejected() {
        let duplicate = compile(
            r#"<Defs><WeaponDef><defName>a</defName><defName>b</defName></WeaponDef></Defs>"#,
        )
        .expect_err("dup");
        assert_eq!(duplicate.code, ContentErrorCode::DuplicateField);

        let unknown = compile(r#"<Defs><EnemyDef><defName>a</defName><hp>3</hp></EnemyDef></Defs>"#)
            .expect_err("unknown");
        assert_eq!(unknown.code, ContentErrorCode::UnknownField);
    }

    #[test]
    fn invalid_numbers_and_ranges_are_rejected() {
        let nan = compile(
            r#"<Defs><WeaponDef><defName>a</defName><kind>Melee</kind><damage>lots</damage><range>1</range></WeaponDef></Defs>"#,
        )
        .expect_err("nan");
        assert_eq!(nan.code, ContentErrorCode::InvalidValue);

        let stat = compile(
            r#"<Defs><EnemyDef><defName>a</defName><str>11</str><weapon>x</weapon></EnemyDef></Defs>"#,
        )
        .expect_err("stat");
        assert_eq!(stat.code, ContentErrorCode::InvalidValue);

        let ai = compile(
            r#"<Defs><EnemyDef><defName>a</defName><aiLevel>4</aiLevel><weapon>x</weapon></EnemyDef></Defs>"#,
        )
        .expect_err("ai");
        assert_eq!(ai.code, ContentErrorCode::InvalidValue);
    }

    #[test]
    fn invalid_sprite_key_is_rejected() {
        let err = compile(
            r#"<Defs><EnemyDef><defName>a</defName><sprite>../up</sprite><weapon>x</weapon></EnemyDef></Defs>"#,
        )
        .expect_err("sprite");
        assert_eq!(err.code, ContentErrorCode::InvalidValue);
    }

    #[test]
    fn unknown_weapon_reference_is_rejected() {
        let err = compile(
            r#"<Defs>
  <EnemyDef><defName>a</defName><weapon>laser</weapon></EnemyDef>
</Defs>"#,
        )
        .expect_err("ref");
        assert_eq!(err.code, ContentErrorCode::UnknownReference);
        assert_eq!(err.location.map(|loc| loc.line), Some(2));
    }

    #[test]
    fn bad_root_and_unknown_def_type_are_rejected() {
        assert_eq!(
            compile("<Things/>").expect_err("root").code,
            ContentErrorCode::InvalidRoot
        );
        assert_eq!(
            compile("<Defs><ArmorDef/></Defs>").expect_err("type").code,
            ContentErrorCode::UnknownDefType
        );
        assert_eq!(
            compile("<Defs>").expect_err("xml").code,
            ContentErrorCode::XmlMalformed
        );
    }

    #[test]
    fn duplicate_def_in_one_file_is_rejected() {
        let err = compile(
            r#"<Defs>
<WeaponDef><defName>a</defName><kind>Melee</kind><damage>1</damage><range>1</range></WeaponDef>
<WeaponDef><defName>a</defName><kind>Melee</kind><damage>2</damage><range>1</range></WeaponDef>
</Defs>"#,
        )
        .expect_err("dup");
        assert_eq!(err.code, ContentErrorCode::DuplicateDefInFile);
    }

    #[test]
    fn later_files_override_in_place() {
        let temp = TempDir::new().expect("temp");
        write_file(&temp.path().join("00_base.xml"), KNIFE_AND_PISTOL);
        write_file(
            &temp.path().join("nested").join("10_tweak.xml"),
            r#"<Defs><WeaponDef><defName>knife</defName><kind>Melee</kind><damage>99</damage><range>1.5</range></WeaponDef></Defs>"#,
        );

        let db = compile_defs_dir(temp.path()).expect("compile");
        let knife_id = db.weapon_def_id_by_name("knife").expect("knife");
        assert_eq!(knife_id, WeaponDefId(0));
        let knife = db.weapon_def(knife_id).expect("def");
        assert!((knife.damage - 99.0).abs() < f32::EPSILON);
        assert_eq!(db.weapon_defs().len(), 2);
    }

    #[test]
    fn missing_directory_is_a_read_error() {
        let temp = TempDir::new().expect("temp");
        let err = compile_defs_dir(&temp.path().join("absent")).expect_err("err");
        assert_eq!(err.code, ContentErrorCode::ReadFile);
        assert!(err.location.is_none());
    }
}
