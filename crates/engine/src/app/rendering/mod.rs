mod draw_list;
mod raster;
mod renderer;
mod transform;

pub use draw_list::{DrawCommand, DrawList, Rgba, SpriteFallback, SpriteFrame, DEFAULT_CLEAR_COLOR};
pub use renderer::Renderer;
pub use transform::{IsoProjection, ScreenBounds};
