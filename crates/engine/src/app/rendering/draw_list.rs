use crate::app::Vec2;

use super::IsoProjection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba(pub [u8; 4]);

impl Rgba {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b, 255])
    }

    pub const fn with_alpha(self, alpha: u8) -> Self {
        let [r, g, b, _] = self.0;
        Self([r, g, b, alpha])
    }
}

/// Which frame of a texture to show. Single images ignore the frame choice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpriteFrame {
    First,
    /// Loop through a sheet's columns at its fps; rows are picked from the
    /// facing heading when the sheet has more than one.
    Animated { elapsed: f32, facing: f32 },
    /// Normalised 0..1 progress across the first row.
    Progress(f32),
}

/// What a sprite turns into when its texture is not loaded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpriteFallback {
    Diamond(Rgba),
    /// Small dot at the sprite's anchor, lifted by the sprite offset.
    Disc {
        radius_px: f32,
        color: Rgba,
    },
    /// Pie slice around the sprite's anchor, heading given in world radians.
    Wedge {
        radius_px: f32,
        heading: f32,
        arc: f32,
        color: Rgba,
    },
}

/// World-space draw primitives. The rasterizer projects them through the
/// list's [`IsoProjection`].
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Tile {
        x: i32,
        y: i32,
        texture_key: String,
        fallback: Rgba,
        raised: bool,
    },
    Sprite {
        position: Vec2,
        z: f32,
        texture_key: String,
        frame: SpriteFrame,
        offset_y: f32,
        fallback: SpriteFallback,
    },
    Ring {
        position: Vec2,
        offset_y: f32,
        radius_px: f32,
        color: Rgba,
    },
    Disc {
        position: Vec2,
        offset_y: f32,
        radius_px: f32,
        color: Rgba,
    },
    Polyline {
        points: Vec<Vec2>,
        color: Rgba,
    },
}

#[derive(Debug, Clone)]
pub struct DrawList {
    projection: IsoProjection,
    clear_color: Rgba,
    commands: Vec<DrawCommand>,
}

pub const DEFAULT_CLEAR_COLOR: Rgba = Rgba::rgb(14, 16, 19);

impl Default for DrawList {
    fn default() -> Self {
        Self::new(IsoProjection::new(96.0, 48.0))
    }
}

impl DrawList {
    pub fn new(projection: IsoProjection) -> Self {
        Self {
            projection,
            clear_color: DEFAULT_CLEAR_COLOR,
            commands: Vec::new(),
        }
    }

    pub fn reset(&mut self) {
        self.commands.clear();
    }

    pub fn projection(&self) -> IsoProjection {
        self.projection
    }

    pub fn set_projection(&mut self, projection: IsoProjection) {
        self.projection = projection;
    }

    pub fn clear_color(&self) -> Rgba {
        self.clear_color
    }

    pub fn set_clear_color(&mut self, color: Rgba) {
        self.clear_color = color;
    }

    pub fn push(&mut self, command: DrawCommand) {
        self.commands.push(command);
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
