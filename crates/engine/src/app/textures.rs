use std::collections::HashMap;
use std::f32::consts::TAU;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

use image::ImageReader;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::texture_keys::validate_texture_key;

use super::SpriteFrame;

const DEFAULT_SHEET_FPS: f32 = 8.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Surface {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Renderable {
    Image(Surface),
    Sheet {
        surface: Surface,
        frame_width: u32,
        frame_height: u32,
        fps: f32,
        cols: u32,
        rows: u32,
    },
}

impl Renderable {
    pub fn surface(&self) -> &Surface {
        match self {
            Renderable::Image(surface) => surface,
            Renderable::Sheet { surface, .. } => surface,
        }
    }

    pub fn frame_size(&self) -> (u32, u32) {
        match self {
            Renderable::Image(surface) => (surface.width, surface.height),
            Renderable::Sheet {
                frame_width,
                frame_height,
                ..
            } => (*frame_width, *frame_height),
        }
    }

    /// Source pixel offset of the frame to blit.
    pub fn frame_origin(&self, frame: SpriteFrame) -> (u32, u32) {
        let Renderable::Sheet {
            frame_width,
            frame_height,
            fps,
            cols,
            rows,
            ..
        } = self
        else {
            return (0, 0);
        };
        let cols = (*cols).max(1);
        let (col, row) = match frame {
            SpriteFrame::First => (0, 0),
            SpriteFrame::Animated { elapsed, facing } => {
                let ticks = (elapsed.max(0.0) * fps).floor() as u64;
                let col = (ticks % cols as u64) as u32;
                (col, facing_row(facing, *rows))
            }
            SpriteFrame::Progress(progress) => {
                let progress = progress.clamp(0.0, 1.0);
                let col = ((progress * cols as f32).floor() as u32).min(cols - 1);
                (col, 0)
            }
        };
        (col * frame_width, row * frame_height)
    }
}

fn facing_row(facing: f32, rows: u32) -> u32 {
    if rows <= 1 || !facing.is_finite() {
        return 0;
    }
    let heading = facing.rem_euclid(TAU);
    let sector = TAU / rows as f32;
    ((heading / sector).round() as u32) % rows
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TextureManifest {
    textures: Vec<TextureEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct TextureEntry {
    key: String,
    path: PathBuf,
    #[serde(default)]
    sheet: Option<SheetSpec>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
struct SheetSpec {
    frame_width: u32,
    frame_height: u32,
    #[serde(default = "default_sheet_fps")]
    fps: f32,
}

fn default_sheet_fps() -> f32 {
    DEFAULT_SHEET_FPS
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read texture manifest {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse texture manifest {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Read-only texture lookup by key. Keys that failed to load are simply
/// absent; callers draw a placeholder.
#[derive(Debug, Default, Clone)]
pub struct TextureStore {
    textures: HashMap<String, Renderable>,
}

impl TextureStore {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Renderable> {
        self.textures.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, renderable: Renderable) {
        self.textures.insert(key.into(), renderable);
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    /// Loads every manifest entry in parallel and returns once all of them
    /// have either loaded or failed. Relative paths resolve against the
    /// manifest's directory.
    pub fn load_manifest(path: &Path) -> Result<Self, ManifestError> {
        let raw = fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let manifest: TextureManifest =
            serde_json::from_str(&raw).map_err(|source| ManifestError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let entries = manifest
            .textures
            .into_iter()
            .map(|entry| TextureEntry {
                path: base_dir.join(&entry.path),
                ..entry
            })
            .collect::<Vec<_>>();
        let requested = entries.len();
        let store = Self::load_batch(entries);
        info!(
            manifest = %path.display(),
            requested,
            loaded = store.len(),
            "textures_loaded"
        );
        Ok(store)
    }

    fn load_batch(entries: Vec<TextureEntry>) -> Self {
        let results = thread::scope(|scope| {
            let handles = entries
                .iter()
                .map(|entry| (entry, scope.spawn(move || load_entry(entry))))
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .map(|(entry, handle)| {
                    let result = handle
                        .join()
                        .unwrap_or_else(|_| Err("loader_thread_panicked".to_string()));
                    (entry, result)
                })
                .collect::<Vec<_>>()
        });

        let mut store = Self::empty();
        for (entry, result) in results {
            match result {
                Ok(renderable) => store.insert(entry.key.clone(), renderable),
                Err(reason) => warn!(
                    texture_key = entry.key.as_str(),
                    path = %entry.path.display(),
                    reason = reason.as_str(),
                    "texture_load_failed_using_placeholder"
                ),
            }
        }
        store
    }
}

fn load_entry(entry: &TextureEntry) -> Result<Renderable, String> {
    validate_texture_key(&entry.key).map_err(|error| format!("invalid_key:{error}"))?;
    let surface = load_surface(&entry.path)?;
    build_renderable(surface, entry.sheet)
}

fn load_surface(path: &Path) -> Result<Surface, String> {
    let reader = ImageReader::open(path).map_err(|error| format!("file_open_failed:{error}"))?;
    let decoded = reader
        .decode()
        .map_err(|error| format!("decode_failed:{error}"))?;
    let image = decoded.to_rgba8();
    Ok(Surface {
        width: image.width(),
        height: image.height(),
        rgba: image.into_raw(),
    })
}

fn build_renderable(surface: Surface, sheet: Option<SheetSpec>) -> Result<Renderable, String> {
    let Some(sheet) = sheet else {
        return Ok(Renderable::Image(surface));
    };
    if sheet.frame_width == 0 || sheet.frame_height == 0 {
        return Err("sheet_frame_size_zero".to_string());
    }
    let cols = surface.width / sheet.frame_width;
    let rows = surface.height / sheet.frame_height;
    if cols == 0 || rows == 0 {
        return Err(format!(
            "sheet_frame_larger_than_image:{}x{}",
            surface.width, surface.height
        ));
    }
    let fps = if sheet.fps.is_finite() && sheet.fps > 0.0 {
        sheet.fps
    } else {
        DEFAULT_SHEET_FPS
    };
    Ok(Renderable::Sheet {
        surface,
        frame_width: sheet.frame_width,
        frame_height: sheet.frame_height,
        fps,
        cols,
        rows,
    })
}
