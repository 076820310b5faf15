mod input;
mod loop_runner;
mod metrics;
mod rendering;
mod scene;
mod textures;

pub use input::InputAction;
pub use loop_runner::{run_app, run_app_with_metrics, AppError, LoopConfig, MAX_RENDER_FPS_ENV_VAR};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
pub use rendering::{
    DrawCommand, DrawList, IsoProjection, Renderer, Rgba, ScreenBounds, SpriteFallback,
    SpriteFrame, DEFAULT_CLEAR_COLOR,
};
pub use scene::{InputSnapshot, Scene, SceneCommand, Vec2};
pub use textures::{ManifestError, Renderable, Surface, TextureStore};
