use crate::app::Vec2;

/// Isometric diamond projection between world tile units and screen pixels.
///
/// The projected point of `(x, y, z)` is the top vertex of that tile's
/// diamond; the diamond spans `tile_height` pixels downward from it. `origin`
/// is the screen position of world `(0, 0, 0)` and doubles as the camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IsoProjection {
    pub tile_width: f32,
    pub tile_height: f32,
    pub origin: Vec2,
}

/// Axis-aligned pixel rectangle, relative to the projection origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenBounds {
    pub min: Vec2,
    pub max: Vec2,
}

impl IsoProjection {
    pub const fn new(tile_width: f32, tile_height: f32) -> Self {
        Self {
            tile_width,
            tile_height,
            origin: Vec2::ZERO,
        }
    }

    pub fn with_origin(mut self, origin: Vec2) -> Self {
        self.origin = origin;
        self
    }

    pub fn world_to_screen(&self, x: f32, y: f32, z: f32) -> Vec2 {
        Vec2 {
            x: (x - y) * self.tile_width * 0.5 + self.origin.x,
            y: (x + y) * self.tile_height * 0.5 - z * self.tile_height + self.origin.y,
        }
    }

    /// Exact inverse of [`Self::world_to_screen`] for `z = 0`.
    pub fn screen_to_world(&self, sx: f32, sy: f32) -> Vec2 {
        let dx = sx - self.origin.x;
        let dy = sy - self.origin.y;
        let half_w = self.tile_width * 0.5;
        let half_h = self.tile_height * 0.5;
        Vec2 {
            x: (dy / half_h + dx / half_w) * 0.5,
            y: (dy / half_h - dx / half_w) * 0.5,
        }
    }

    /// Visual centre of the diamond drawn for a world position.
    pub fn diamond_center(&self, x: f32, y: f32, z: f32) -> Vec2 {
        let top = self.world_to_screen(x, y, z);
        Vec2 {
            x: top.x,
            y: top.y + self.tile_height * 0.5,
        }
    }

    /// World position whose diamond centre sits under the given pixel. Rounding
    /// the result yields the tile the cursor is over.
    pub fn pick_world(&self, sx: f32, sy: f32) -> Vec2 {
        self.screen_to_world(sx, sy - self.tile_height * 0.5)
    }

    /// Top, right, bottom and left vertices of the tile diamond.
    pub fn diamond_vertices(&self, x: f32, y: f32, z: f32) -> [Vec2; 4] {
        let top = self.world_to_screen(x, y, z);
        let half_w = self.tile_width * 0.5;
        let half_h = self.tile_height * 0.5;
        [
            top,
            Vec2::new(top.x + half_w, top.y + half_h),
            Vec2::new(top.x, top.y + self.tile_height),
            Vec2::new(top.x - half_w, top.y + half_h),
        ]
    }

    /// Top-left pixel for a sprite whose bottom-centre rests on the diamond's
    /// bottom vertex, shifted vertically by `offset_y`.
    pub fn sprite_top_left(
        &self,
        x: f32,
        y: f32,
        z: f32,
        sprite_width: u32,
        sprite_height: u32,
        offset_y: f32,
    ) -> (i32, i32) {
        let top = self.world_to_screen(x, y, z);
        let left = (top.x - sprite_width as f32 * 0.5).round() as i32;
        let top_px = (top.y + self.tile_height - sprite_height as f32 + offset_y).round() as i32;
        (left, top_px)
    }

    /// Pixel extent of a `width` x `height` tile grid with the origin at zero.
    pub fn grid_bounds(&self, width: u32, height: u32) -> ScreenBounds {
        let half_w = self.tile_width * 0.5;
        let half_h = self.tile_height * 0.5;
        ScreenBounds {
            min: Vec2::new(-(height as f32) * half_w, 0.0),
            max: Vec2::new(width as f32 * half_w, (width + height) as f32 * half_h),
        }
    }
}
