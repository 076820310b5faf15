use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use engine::{validate_texture_key, Rgba, Vec2};
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum TileHeight {
    #[default]
    Normal,
    High,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct LegendEntry {
    pub(crate) name: String,
    pub(crate) passable: bool,
    pub(crate) texture_key: String,
    #[serde(default)]
    pub(crate) height: TileHeight,
    #[serde(default)]
    pub(crate) portal: bool,
    #[serde(default)]
    pub(crate) spawn: bool,
    #[serde(default)]
    pub(crate) spawn_enemy: bool,
    #[serde(default)]
    pub(crate) waypoint: bool,
    #[serde(default)]
    pub(crate) enemy_type: Option<usize>,
    #[serde(default)]
    pub(crate) ai_level: Option<u8>,
}

impl LegendEntry {
    fn terrain(name: &str, passable: bool, texture: &str, height: TileHeight) -> Self {
        Self {
            name: name.to_string(),
            passable,
            texture_key: format!("tiles/{texture}"),
            height,
            portal: false,
            spawn: false,
            spawn_enemy: false,
            waypoint: false,
            enemy_type: None,
            ai_level: None,
        }
    }

    fn enemy_spawn(name: &str, ai_level: Option<u8>, enemy_type: Option<usize>) -> Self {
        Self {
            spawn_enemy: true,
            ai_level,
            enemy_type,
            ..Self::terrain(name, true, "grass", TileHeight::Normal)
        }
    }
}

/// Symbol table shared by every loaded map, plus the single-character ASCII
/// aliases used to author map files.
#[derive(Debug, Clone)]
pub(crate) struct Legend {
    entries: HashMap<String, LegendEntry>,
    aliases: HashMap<char, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct LegendOverridesFile {
    #[serde(default)]
    entries: HashMap<String, LegendEntry>,
    #[serde(default)]
    aliases: HashMap<char, String>,
}

impl Legend {
    pub(crate) fn builtin() -> Self {
        use TileHeight::{High, Normal};

        let mut entries = HashMap::new();
        let mut terrain = |symbol: &str, name: &str, passable: bool, texture: &str, height| {
            entries.insert(
                symbol.to_string(),
                LegendEntry::terrain(name, passable, texture, height),
            );
        };
        terrain("G", "grass", true, "grass", Normal);
        terrain("S", "stone", true, "stone", Normal);
        terrain("R", "rock", false, "rock", Normal);
        terrain("W", "water", false, "water", Normal);
        terrain("B", "bridge", true, "bridge", Normal);
        terrain("b", "bush", false, "bush", Normal);
        terrain("T", "tree", false, "tree", High);
        terrain("t", "tall_grass", true, "tall_grass", Normal);
        terrain("H", "house", false, "house", High);
        terrain("h", "hut", false, "hut", High);
        terrain("D", "dirt", true, "dirt", Normal);
        terrain("o", "road", true, "road", Normal);
        terrain("x", "debris", false, "debris", Normal);
        terrain("c", "car", false, "car", High);

        entries.insert(
            "P".to_string(),
            LegendEntry {
                portal: true,
                ..LegendEntry::terrain("portal", true, "portal", Normal)
            },
        );
        entries.insert(
            "A".to_string(),
            LegendEntry {
                spawn: true,
                ..LegendEntry::terrain("arrival", true, "stone", Normal)
            },
        );
        entries.insert(
            "p".to_string(),
            LegendEntry {
                waypoint: true,
                ..LegendEntry::terrain("waypoint", true, "stone", Normal)
            },
        );
        entries.insert("E".to_string(), LegendEntry::enemy_spawn("enemy_spawn", Some(1), None));
        for level in 1..=3u8 {
            entries.insert(
                format!("E{level}"),
                LegendEntry::enemy_spawn(&format!("enemy_spawn_ai{level}"), Some(level), None),
            );
        }
        for enemy_type in 0..=9usize {
            entries.insert(
                enemy_type.to_string(),
                LegendEntry::enemy_spawn(&format!("enemy_spawn_type{enemy_type}"), None, Some(enemy_type)),
            );
        }

        let mut aliases = HashMap::new();
        for symbol in "GSRWBbTtHhDPAEocxp0123456789".chars() {
            aliases.insert(symbol, symbol.to_string());
        }
        for (alias, symbol) in [
            ('.', "G"),
            ('=', "S"),
            ('#', "R"),
            ('~', "W"),
            ('+', "B"),
            (',', "D"),
            ('^', "T"),
            ('*', "b"),
            ('"', "t"),
            ('@', "H"),
            ('%', "h"),
            ('>', "P"),
            ('a', "A"),
            ('e', "E"),
            ('!', "E1"),
            ('?', "E2"),
            ('&', "E3"),
            (' ', "G"),
        ] {
            aliases.insert(alias, symbol.to_string());
        }

        Self { entries, aliases }
    }

    pub(crate) fn get(&self, symbol: &str) -> Option<&LegendEntry> {
        self.entries.get(symbol)
    }

    /// Characters without an alias author grass.
    pub(crate) fn symbol_for_char(&self, ch: char) -> &str {
        self.aliases.get(&ch).map(String::as_str).unwrap_or("G")
    }

    pub(crate) fn apply_overrides_json(&mut self, raw: &str) -> Result<(), String> {
        let deserializer = &mut serde_json::Deserializer::from_str(raw);
        let overrides: LegendOverridesFile = serde_path_to_error::deserialize(deserializer)
            .map_err(|error| format!("parse legend overrides at {}: {}", error.path(), error.inner()))?;

        for (symbol, entry) in &overrides.entries {
            if symbol.is_empty() {
                return Err("legend override symbol must not be empty".to_string());
            }
            validate_texture_key(&entry.texture_key).map_err(|error| {
                format!("legend override '{symbol}' has invalid texture_key: {error}")
            })?;
        }
        for (alias, symbol) in &overrides.aliases {
            if !self.entries.contains_key(symbol) && !overrides.entries.contains_key(symbol) {
                return Err(format!(
                    "alias '{alias}' points at unknown legend symbol '{symbol}'"
                ));
            }
        }

        self.entries.extend(overrides.entries);
        self.aliases.extend(overrides.aliases);
        Ok(())
    }

    /// Built-in legend merged with `path` when it exists.
    pub(crate) fn load_with_overrides(path: &Path) -> Result<Self, String> {
        let mut legend = Self::builtin();
        if !path.is_file() {
            return Ok(legend);
        }
        let raw = fs::read_to_string(path)
            .map_err(|error| format!("read legend overrides {}: {error}", path.display()))?;
        legend
            .apply_overrides_json(&raw)
            .map_err(|error| format!("{}: {error}", path.display()))?;
        info!(path = %path.display(), "legend_overrides_applied");
        Ok(legend)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EnemySpawn {
    pub(crate) x: i32,
    pub(crate) y: i32,
    pub(crate) ai_level: Option<u8>,
    pub(crate) enemy_type: Option<usize>,
}

/// Rectangular symbol grid resolved through a [`Legend`]. Every query outside
/// the grid, or on a symbol the legend does not know, reads as blocked.
#[derive(Debug, Clone)]
pub(crate) struct MapDescriptor {
    id: String,
    width: usize,
    height: usize,
    cells: Vec<String>,
    legend: Legend,
}

const PLACEHOLDER_LIGHT: Rgba = Rgba::rgb(0x1b, 0x23, 0x2c);
const PLACEHOLDER_DARK: Rgba = Rgba::rgb(0x15, 0x20, 0x2b);

impl MapDescriptor {
    /// Short rows are padded with grass to the widest row.
    pub(crate) fn from_rows(id: &str, rows: Vec<Vec<String>>, legend: Legend) -> Result<Self, String> {
        let height = rows.len();
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        if width == 0 || height == 0 {
            return Err(format!("map '{id}' has no tiles"));
        }
        let mut cells = Vec::with_capacity(width * height);
        for mut row in rows {
            row.resize(width, "G".to_string());
            cells.extend(row);
        }
        Ok(Self {
            id: id.to_string(),
            width,
            height,
            cells,
            legend,
        })
    }

    pub(crate) fn parse_ascii(id: &str, ascii: &str, legend: &Legend) -> Result<Self, String> {
        let rows = strip_common_indent(ascii)
            .into_iter()
            .map(|line| {
                line.chars()
                    .map(|ch| legend.symbol_for_char(ch).to_string())
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();
        Self::from_rows(id, rows, legend.clone())
    }

    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn width(&self) -> usize {
        self.width
    }

    pub(crate) fn height(&self) -> usize {
        self.height
    }

    pub(crate) fn symbol_at(&self, x: i32, y: i32) -> Option<&str> {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return None;
        }
        self.cells
            .get(y as usize * self.width + x as usize)
            .map(String::as_str)
    }

    pub(crate) fn entry_at(&self, x: i32, y: i32) -> Option<&LegendEntry> {
        self.symbol_at(x, y).and_then(|symbol| self.legend.get(symbol))
    }

    pub(crate) fn is_blocked(&self, x: i32, y: i32) -> bool {
        self.entry_at(x, y).map_or(true, |entry| !entry.passable)
    }

    /// Blocked test for a fractional world position, by its rounded tile.
    #[cfg(test)]
    pub(crate) fn is_blocked_at(&self, position: Vec2) -> bool {
        self.is_blocked(position.x.round() as i32, position.y.round() as i32)
    }

    pub(crate) fn tile_height(&self, x: i32, y: i32) -> TileHeight {
        self.entry_at(x, y).map(|entry| entry.height).unwrap_or_default()
    }

    pub(crate) fn is_portal(&self, x: i32, y: i32) -> bool {
        self.entry_at(x, y).is_some_and(|entry| entry.portal)
    }

    /// Texture key and placeholder colour for drawing a tile. Unknown symbols
    /// draw as the checkered background.
    pub(crate) fn tile_visual(&self, x: i32, y: i32) -> (&str, Rgba) {
        let fallback = if (x + y) % 2 != 0 {
            PLACEHOLDER_LIGHT
        } else {
            PLACEHOLDER_DARK
        };
        let texture_key = self
            .entry_at(x, y)
            .map(|entry| entry.texture_key.as_str())
            .unwrap_or("");
        (texture_key, fallback)
    }

    fn tiles_row_major(&self) -> impl Iterator<Item = (i32, i32, &LegendEntry)> + '_ {
        (0..self.height as i32).flat_map(move |y| {
            (0..self.width as i32).filter_map(move |x| self.entry_at(x, y).map(|entry| (x, y, entry)))
        })
    }

    /// First `spawn` tile in row-major order, else the passable tile nearest
    /// the centre, else `(1, 1)`.
    pub(crate) fn spawn_point(&self) -> Vec2 {
        if let Some((x, y, _)) = self.tiles_row_major().find(|(_, _, entry)| entry.spawn) {
            return Vec2::new(x as f32, y as f32);
        }

        let center_x = (self.width / 2) as i32;
        let center_y = (self.height / 2) as i32;
        let max_radius = self.width.max(self.height) as i32;
        for radius in 0..=max_radius {
            for dy in -radius..=radius {
                for dx in -radius..=radius {
                    if dx.abs() != radius && dy.abs() != radius {
                        continue;
                    }
                    let (x, y) = (center_x + dx, center_y + dy);
                    if !self.is_blocked(x, y) {
                        return Vec2::new(x as f32, y as f32);
                    }
                }
            }
        }
        Vec2::new(1.0, 1.0)
    }

    pub(crate) fn waypoints(&self) -> Vec<Vec2> {
        self.tiles_row_major()
            .filter(|(_, _, entry)| entry.waypoint)
            .map(|(x, y, _)| Vec2::new(x as f32, y as f32))
            .collect()
    }

    pub(crate) fn enemy_spawns(&self) -> Vec<EnemySpawn> {
        self.tiles_row_major()
            .filter(|(_, _, entry)| entry.spawn_enemy)
            .map(|(x, y, entry)| EnemySpawn {
                x,
                y,
                ai_level: entry.ai_level,
                enemy_type: entry.enemy_type,
            })
            .collect()
    }
}

fn strip_common_indent(ascii: &str) -> Vec<&str> {
    let lines = ascii.lines().collect::<Vec<_>>();
    let indent = lines
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);
    lines
        .into_iter()
        .map(|line| line.get(indent..).unwrap_or(""))
        .filter(|line| !line.is_empty())
        .collect()
}

/// Parses every `*.txt` under `dir`, sorted by file name. Map ids are file
/// stems. Unreadable or empty files are skipped with a warning.
pub(crate) fn load_maps_dir(dir: &Path, legend: &Legend) -> Result<Vec<MapDescriptor>, String> {
    let entries = fs::read_dir(dir).map_err(|error| format!("read maps dir {}: {error}", dir.display()))?;
    let mut files = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"))
        })
        .collect::<Vec<PathBuf>>();
    files.sort();

    let mut maps = Vec::with_capacity(files.len());
    for path in files {
        let Some(id) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        let parsed = fs::read_to_string(&path)
            .map_err(|error| error.to_string())
            .and_then(|raw| MapDescriptor::parse_ascii(id, &raw, legend));
        match parsed {
            Ok(map) => {
                info!(map = id, width = map.width(), height = map.height(), "map_loaded");
                maps.push(map);
            }
            Err(error) => warn!(path = %path.display(), error = %error, "map_rejected"),
        }
    }
    Ok(maps)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(ascii: &str) -> MapDescriptor {
        MapDescriptor::parse_ascii("test", ascii, &Legend::builtin()).expect("map")
    }

    #[test]
    fn ascii_aliases_resolve_through_legend() {
        let map = parse("  .#~\n  >a!\n");
        assert_eq!(map.width(), 3);
        assert_eq!(map.height(), 2);
        assert_eq!(map.symbol_at(0, 0), Some("G"));
        assert_eq!(map.symbol_at(1, 0), Some("R"));
        assert_eq!(map.symbol_at(2, 0), Some("W"));
        assert!(map.is_portal(0, 1));
        assert_eq!(map.symbol_at(1, 1), Some("A"));
        assert_eq!(map.entry_at(2, 1).and_then(|entry| entry.ai_level), Some(1));
    }

    #[test]
    fn unknown_characters_author_grass() {
        let map = parse("Q$");
        assert_eq!(map.symbol_at(0, 0), Some("G"));
        assert_eq!(map.symbol_at(1, 0), Some("G"));
    }

    #[test]
    fn blank_lines_are_dropped_and_short_rows_padded() {
        let map = parse("\n    ###\n\n    #\n");
        assert_eq!(map.height(), 2);
        assert_eq!(map.width(), 3);
        assert_eq!(map.symbol_at(2, 1), Some("G"));
    }

    #[test]
    fn out_of_bounds_and_unknown_symbols_are_blocked() {
        let legend = Legend::builtin();
        let map = MapDescriptor::from_rows(
            "raw",
            vec![vec!["G".to_string(), "ZZ".to_string()]],
            legend,
        )
        .expect("map");
        assert!(!map.is_blocked(0, 0));
        assert!(map.is_blocked(1, 0));
        assert!(map.is_blocked(-1, 0));
        assert!(map.is_blocked(0, 1));
        assert!(map.is_blocked_at(Vec2::new(0.6, 0.0)));
        assert!(!map.is_blocked_at(Vec2::new(0.4, 0.2)));
        assert_eq!(map.tile_visual(1, 0).0, "");
    }

    #[test]
    fn tall_tiles_report_high() {
        let map = parse("^.");
        assert_eq!(map.tile_height(0, 0), TileHeight::High);
        assert_eq!(map.tile_height(1, 0), TileHeight::Normal);
        assert_eq!(map.tile_height(5, 5), TileHeight::Normal);
    }

    #[test]
    fn spawn_prefers_arrival_tile() {
        let map = parse("....\n..a.\n.a..");
        assert_eq!(map.spawn_point(), Vec2::new(2.0, 1.0));
    }

    #[test]
    fn spawn_falls_back_to_nearest_open_tile_to_centre() {
        let map = parse("#####\n#####\n###.#\n#####");
        assert_eq!(map.spawn_point(), Vec2::new(3.0, 2.0));

        let walled = parse("##\n##");
        assert_eq!(walled.spawn_point(), Vec2::new(1.0, 1.0));
    }

    #[test]
    fn waypoints_and_enemy_spawns_in_row_major_order() {
        let map = parse("p.e\n3?p");
        assert_eq!(
            map.waypoints(),
            vec![Vec2::new(0.0, 0.0), Vec2::new(2.0, 1.0)]
        );
        let spawns = map.enemy_spawns();
        assert_eq!(spawns.len(), 3);
        assert_eq!((spawns[0].x, spawns[0].y, spawns[0].ai_level), (2, 0, Some(1)));
        assert_eq!(spawns[1].enemy_type, Some(3));
        assert_eq!(spawns[2].ai_level, Some(2));
    }

    #[test]
    fn overrides_replace_entries_and_add_aliases() {
        let mut legend = Legend::builtin();
        legend
            .apply_overrides_json(
                r#"{
                    "entries": { "L": { "name": "lava", "passable": false, "texture_key": "tiles/lava" } },
                    "aliases": { "L": "L" }
                }"#,
            )
            .expect("overrides");
        let map = MapDescriptor::parse_ascii("lava", "L.", &legend).expect("map");
        assert!(map.is_blocked(0, 0));
        assert_eq!(map.tile_visual(0, 0).0, "tiles/lava");
    }

    #[test]
    fn overrides_report_field_path_on_bad_json() {
        let mut legend = Legend::builtin();
        let error = legend
            .apply_overrides_json(r#"{ "entries": { "L": { "name": "lava", "passable": "no", "texture_key": "tiles/lava" } } }"#)
            .expect_err("should fail");
        assert!(error.contains("entries.L.passable"), "{error}");

        let bad_alias = legend
            .apply_overrides_json(r#"{ "aliases": { "L": "nope" } }"#)
            .expect_err("should fail");
        assert!(bad_alias.contains("nope"));
    }
}
