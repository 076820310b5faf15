use std::f32::consts::PI;

use crate::app::{Renderable, TextureStore, Vec2};

use super::{DrawCommand, DrawList, IsoProjection, Rgba, SpriteFallback, SpriteFrame};

const RAISED_SIDE_SHADE: f32 = 0.6;

/// Borrowed RGBA8 framebuffer. Every write is clipped to the frame.
pub(crate) struct FrameTarget<'a> {
    pixels: &'a mut [u8],
    width: u32,
    height: u32,
}

impl<'a> FrameTarget<'a> {
    pub(crate) fn new(pixels: &'a mut [u8], width: u32, height: u32) -> Self {
        Self {
            pixels,
            width,
            height,
        }
    }

    fn clear(&mut self, color: Rgba) {
        for chunk in self.pixels.chunks_exact_mut(4) {
            chunk.copy_from_slice(&color.0);
        }
    }

    fn blend_pixel(&mut self, x: i32, y: i32, color: [u8; 4]) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let Some(dst) = self.pixels.get_mut(offset..offset + 4) else {
            return;
        };
        let alpha = color[3] as u32;
        if alpha == 0 {
            return;
        }
        if alpha == 255 {
            dst.copy_from_slice(&color);
            return;
        }
        for channel in 0..3 {
            let src = color[channel] as u32;
            let old = dst[channel] as u32;
            dst[channel] = ((src * alpha + old * (255 - alpha)) / 255) as u8;
        }
        dst[3] = 255;
    }

    fn fill_span(&mut self, y: i32, x_start: i32, x_end: i32, color: Rgba) {
        let x_start = x_start.max(0);
        let x_end = x_end.min(self.width as i32 - 1);
        for x in x_start..=x_end {
            self.blend_pixel(x, y, color.0);
        }
    }
}

pub(crate) fn rasterize(target: &mut FrameTarget<'_>, draw_list: &DrawList, textures: &TextureStore) {
    target.clear(draw_list.clear_color());
    let projection = draw_list.projection();
    for command in draw_list.commands() {
        match command {
            DrawCommand::Tile {
                x,
                y,
                texture_key,
                fallback,
                raised,
            } => match textures.get(texture_key) {
                Some(renderable) => {
                    let position = Vec2::new(*x as f32, *y as f32);
                    blit_renderable(
                        target,
                        &projection,
                        renderable,
                        position,
                        0.0,
                        SpriteFrame::First,
                        0.0,
                    );
                }
                None => draw_tile_placeholder(target, &projection, *x, *y, *fallback, *raised),
            },
            DrawCommand::Sprite {
                position,
                z,
                texture_key,
                frame,
                offset_y,
                fallback,
            } => match textures.get(texture_key) {
                Some(renderable) => {
                    blit_renderable(
                        target,
                        &projection,
                        renderable,
                        *position,
                        *z,
                        *frame,
                        *offset_y,
                    );
                }
                None => match *fallback {
                    SpriteFallback::Diamond(color) => {
                        let vertices = projection.diamond_vertices(position.x, position.y, *z);
                        fill_diamond(target, vertices, color);
                    }
                    SpriteFallback::Disc { radius_px, color } => {
                        let center = projection.diamond_center(position.x, position.y, *z);
                        fill_disc(target, Vec2::new(center.x, center.y + *offset_y), radius_px, color);
                    }
                    SpriteFallback::Wedge {
                        radius_px,
                        heading,
                        arc,
                        color,
                    } => {
                        let center = projection.diamond_center(position.x, position.y, *z);
                        let center = Vec2::new(center.x, center.y + *offset_y);
                        let heading = screen_heading(&projection, heading);
                        fill_wedge(target, center, radius_px, heading, arc, color);
                    }
                },
            },
            DrawCommand::Ring {
                position,
                offset_y,
                radius_px,
                color,
            } => {
                let center = projection.diamond_center(position.x, position.y, 0.0);
                stroke_ring(target, Vec2::new(center.x, center.y + offset_y), *radius_px, *color);
            }
            DrawCommand::Disc {
                position,
                offset_y,
                radius_px,
                color,
            } => {
                let center = projection.diamond_center(position.x, position.y, 0.0);
                fill_disc(target, Vec2::new(center.x, center.y + offset_y), *radius_px, *color);
            }
            DrawCommand::Polyline { points, color } => {
                for pair in points.windows(2) {
                    let a = projection.diamond_center(pair[0].x, pair[0].y, 0.0);
                    let b = projection.diamond_center(pair[1].x, pair[1].y, 0.0);
                    draw_line(target, a, b, *color);
                }
            }
        }
    }
}

fn draw_tile_placeholder(
    target: &mut FrameTarget<'_>,
    projection: &IsoProjection,
    x: i32,
    y: i32,
    color: Rgba,
    raised: bool,
) {
    let base = projection.diamond_vertices(x as f32, y as f32, 0.0);
    if !raised {
        fill_diamond(target, base, color);
        return;
    }
    fill_diamond(target, base, shade(color, RAISED_SIDE_SHADE));
    let top = projection.diamond_vertices(x as f32, y as f32, 0.5);
    fill_diamond(target, top, color);
}

fn shade(color: Rgba, factor: f32) -> Rgba {
    let [r, g, b, a] = color.0;
    let scale = |channel: u8| (channel as f32 * factor).round().clamp(0.0, 255.0) as u8;
    Rgba([scale(r), scale(g), scale(b), a])
}

/// Heading of a world-space direction once projected to the screen.
fn screen_heading(projection: &IsoProjection, world_heading: f32) -> f32 {
    let dir = Vec2::from_angle(world_heading, 1.0);
    let sx = (dir.x - dir.y) * projection.tile_width * 0.5;
    let sy = (dir.x + dir.y) * projection.tile_height * 0.5;
    sy.atan2(sx)
}

fn blit_renderable(
    target: &mut FrameTarget<'_>,
    projection: &IsoProjection,
    renderable: &Renderable,
    position: Vec2,
    z: f32,
    frame: SpriteFrame,
    offset_y: f32,
) {
    let (frame_w, frame_h) = renderable.frame_size();
    let (src_x, src_y) = renderable.frame_origin(frame);
    let (left, top) =
        projection.sprite_top_left(position.x, position.y, z, frame_w, frame_h, offset_y);
    blit_sub_image(
        target,
        renderable.surface(),
        (src_x, src_y, frame_w, frame_h),
        left,
        top,
    );
}

fn blit_sub_image(
    target: &mut FrameTarget<'_>,
    surface: &crate::app::Surface,
    (src_x, src_y, src_w, src_h): (u32, u32, u32, u32),
    left: i32,
    top: i32,
) {
    if surface.rgba.len() < surface.width as usize * surface.height as usize * 4 {
        return;
    }
    let src_w = src_w.min(surface.width.saturating_sub(src_x));
    let src_h = src_h.min(surface.height.saturating_sub(src_y));
    for row in 0..src_h {
        let out_y = top + row as i32;
        if out_y < 0 || out_y >= target.height as i32 {
            continue;
        }
        let src_row = (src_y + row) as usize * surface.width as usize;
        for col in 0..src_w {
            let out_x = left + col as i32;
            if out_x < 0 || out_x >= target.width as i32 {
                continue;
            }
            let src_offset = (src_row + (src_x + col) as usize) * 4;
            let pixel = [
                surface.rgba[src_offset],
                surface.rgba[src_offset + 1],
                surface.rgba[src_offset + 2],
                surface.rgba[src_offset + 3],
            ];
            target.blend_pixel(out_x, out_y, pixel);
        }
    }
}

fn fill_diamond(target: &mut FrameTarget<'_>, vertices: [Vec2; 4], color: Rgba) {
    let [top, right, bottom, _left] = vertices;
    let half_w = right.x - top.x;
    let half_h = right.y - top.y;
    if half_w <= 0.0 || half_h <= 0.0 {
        return;
    }
    let y_start = top.y.round() as i32;
    let y_end = bottom.y.round() as i32;
    for y in y_start..y_end {
        let row_center = y as f32 + 0.5;
        let from_middle = (row_center - right.y).abs();
        let span = half_w * (1.0 - from_middle / half_h);
        if span <= 0.0 {
            continue;
        }
        let x_start = (top.x - span).round() as i32;
        let x_end = (top.x + span).round() as i32 - 1;
        target.fill_span(y, x_start, x_end, color);
    }
}

fn fill_disc(target: &mut FrameTarget<'_>, center: Vec2, radius: f32, color: Rgba) {
    if radius <= 0.0 {
        return;
    }
    let r2 = radius * radius;
    let y_start = (center.y - radius).floor() as i32;
    let y_end = (center.y + radius).ceil() as i32;
    for y in y_start..=y_end {
        let dy = y as f32 + 0.5 - center.y;
        let rest = r2 - dy * dy;
        if rest < 0.0 {
            continue;
        }
        let dx = rest.sqrt();
        target.fill_span(
            y,
            (center.x - dx).round() as i32,
            (center.x + dx).round() as i32 - 1,
            color,
        );
    }
}

fn stroke_ring(target: &mut FrameTarget<'_>, center: Vec2, radius: f32, color: Rgba) {
    if radius <= 0.0 {
        return;
    }
    let outer = radius + 1.0;
    let inner = (radius - 1.0).max(0.0);
    for y in (center.y - outer).floor() as i32..=(center.y + outer).ceil() as i32 {
        for x in (center.x - outer).floor() as i32..=(center.x + outer).ceil() as i32 {
            let d = Vec2::new(x as f32 + 0.5, y as f32 + 0.5).distance(center);
            if d >= inner && d <= outer {
                target.blend_pixel(x, y, color.0);
            }
        }
    }
}

fn fill_wedge(
    target: &mut FrameTarget<'_>,
    center: Vec2,
    radius: f32,
    heading: f32,
    arc: f32,
    color: Rgba,
) {
    let half_arc = (arc * 0.5).clamp(0.0, PI);
    for y in (center.y - radius).floor() as i32..=(center.y + radius).ceil() as i32 {
        for x in (center.x - radius).floor() as i32..=(center.x + radius).ceil() as i32 {
            let point = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            if point.distance(center) > radius {
                continue;
            }
            let offset = center.angle_to(point) - heading;
            let wrapped = offset.sin().atan2(offset.cos());
            if wrapped.abs() <= half_arc {
                target.blend_pixel(x, y, color.0);
            }
        }
    }
}

fn draw_line(target: &mut FrameTarget<'_>, from: Vec2, to: Vec2, color: Rgba) {
    let (mut x0, mut y0) = (from.x.round() as i32, from.y.round() as i32);
    let (x1, y1) = (to.x.round() as i32, to.y.round() as i32);
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let step_x = if x0 < x1 { 1 } else { -1 };
    let step_y = if y0 < y1 { 1 } else { -1 };
    let mut error = dx + dy;
    loop {
        target.blend_pixel(x0, y0, color.0);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let doubled = 2 * error;
        if doubled >= dy {
            error += dy;
            x0 += step_x;
        }
        if doubled <= dx {
            error += dx;
            y0 += step_y;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Surface;

    const RED: Rgba = Rgba::rgb(255, 0, 0);

    struct Canvas {
        pixels: Vec<u8>,
        width: u32,
        height: u32,
    }

    impl Canvas {
        fn new(width: u32, height: u32) -> Self {
            Self {
                pixels: vec![0; (width * height * 4) as usize],
                width,
                height,
            }
        }

        fn draw(&mut self, draw_list: &DrawList, textures: &TextureStore) {
            let mut target = FrameTarget::new(&mut self.pixels, self.width, self.height);
            rasterize(&mut target, draw_list, textures);
        }

        fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
            let offset = ((y * self.width + x) * 4) as usize;
            [
                self.pixels[offset],
                self.pixels[offset + 1],
                self.pixels[offset + 2],
                self.pixels[offset + 3],
            ]
        }
    }

    fn draw_list() -> DrawList {
        DrawList::new(IsoProjection::new(32.0, 16.0).with_origin(Vec2::new(32.0, 0.0)))
    }

    fn tile(x: i32, y: i32, key: &str) -> DrawCommand {
        DrawCommand::Tile {
            x,
            y,
            texture_key: key.to_string(),
            fallback: RED,
            raised: false,
        }
    }

    #[test]
    fn missing_tile_texture_draws_fallback_diamond() {
        let mut list = draw_list();
        list.push(tile(0, 0, "tiles/missing"));
        let mut canvas = Canvas::new(64, 32);
        canvas.draw(&list, &TextureStore::empty());

        assert_eq!(canvas.pixel(32, 8), RED.0);
        assert_eq!(canvas.pixel(17, 1), list.clear_color().0);
        assert_eq!(canvas.pixel(47, 15), list.clear_color().0);
    }

    #[test]
    fn tile_texture_replaces_placeholder_and_skips_transparent_pixels() {
        let mut rgba = vec![0u8; 4 * 4 * 4];
        for pixel in rgba.chunks_exact_mut(4).take(4) {
            pixel.copy_from_slice(&[0, 0, 255, 255]);
        }
        let mut textures = TextureStore::empty();
        textures.insert(
            "tiles/grass",
            Renderable::Image(Surface {
                width: 4,
                height: 4,
                rgba,
            }),
        );
        let mut list = draw_list();
        list.push(tile(0, 0, "tiles/grass"));
        let mut canvas = Canvas::new(64, 32);
        canvas.draw(&list, &textures);

        // Sprite bottom-centre sits on the diamond bottom at (32, 16).
        assert_eq!(canvas.pixel(30, 12), [0, 0, 255, 255]);
        assert_eq!(canvas.pixel(30, 13), list.clear_color().0);
        assert_eq!(canvas.pixel(32, 8), list.clear_color().0);
    }

    #[test]
    fn commands_outside_frame_are_clipped() {
        let mut list = draw_list();
        list.push(tile(40, -3, "tiles/missing"));
        list.push(DrawCommand::Ring {
            position: Vec2::new(-50.0, 10.0),
            offset_y: 0.0,
            radius_px: 30.0,
            color: RED,
        });
        list.push(DrawCommand::Polyline {
            points: vec![Vec2::new(-10.0, -10.0), Vec2::new(30.0, 30.0)],
            color: RED,
        });
        let mut canvas = Canvas::new(16, 16);
        canvas.draw(&list, &TextureStore::empty());
    }

    #[test]
    fn translucent_disc_blends_with_background() {
        let mut list = draw_list();
        list.set_clear_color(Rgba::rgb(0, 0, 0));
        list.push(DrawCommand::Disc {
            position: Vec2::ZERO,
            offset_y: 0.0,
            radius_px: 4.0,
            color: Rgba::rgb(200, 100, 0).with_alpha(128),
        });
        let mut canvas = Canvas::new(64, 32);
        canvas.draw(&list, &TextureStore::empty());

        let blended = canvas.pixel(32, 8);
        assert!(blended[0] > 90 && blended[0] < 110, "{blended:?}");
        assert_eq!(blended[3], 255);
    }

    #[test]
    fn wedge_fallback_covers_heading_side_only() {
        let mut list = draw_list();
        list.push(DrawCommand::Sprite {
            position: Vec2::ZERO,
            z: 0.0,
            texture_key: "entities/slash".to_string(),
            frame: SpriteFrame::Progress(0.5),
            offset_y: -4.0,
            fallback: SpriteFallback::Wedge {
                radius_px: 6.0,
                heading: std::f32::consts::FRAC_PI_4,
                arc: 1.0,
                color: RED,
            },
        });
        let mut canvas = Canvas::new(64, 32);
        canvas.draw(&list, &TextureStore::empty());

        // World heading +x+y projects straight down the screen; the anchor
        // sits at (32, 4) after the offset.
        assert_eq!(canvas.pixel(32, 8), RED.0);
        assert_ne!(canvas.pixel(32, 1), RED.0);
    }

    #[test]
    fn raised_placeholder_draws_lifted_top() {
        let mut list = draw_list();
        list.push(DrawCommand::Tile {
            x: 0,
            y: 1,
            texture_key: "tiles/missing".to_string(),
            fallback: RED,
            raised: true,
        });
        let mut canvas = Canvas::new(64, 32);
        canvas.draw(&list, &TextureStore::empty());

        // Base diamond centre for (0,1) is (16, 16); the top sits 8px higher.
        assert_eq!(canvas.pixel(16, 8), RED.0);
        assert_eq!(canvas.pixel(16, 20), shade(RED, RAISED_SIDE_SHADE).0);
    }
}
