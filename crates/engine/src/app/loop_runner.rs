use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use pixels::Error as PixelsError;
use thiserror::Error;
use tracing::{info, warn};
use winit::dpi::LogicalSize;
use winit::error::{EventLoopError, OsError};
use winit::event::{ElementState, Event, MouseButton, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowBuilder;

use super::input::ActionStates;
use super::metrics::MetricsAccumulator;
use super::{
    DrawList, InputAction, InputSnapshot, MetricsHandle, Renderer, Scene, SceneCommand,
    TextureStore, Vec2,
};

pub const MAX_RENDER_FPS_ENV_VAR: &str = "ISORPG_MAX_RENDER_FPS";

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub window_title: String,
    pub window_width: u32,
    pub window_height: u32,
    /// Upper bound on the delta handed to `Scene::update`.
    pub max_frame_delta: Duration,
    pub metrics_log_interval: Duration,
    pub max_render_fps: Option<u32>,
    pub texture_manifest: Option<PathBuf>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            window_title: "isorpg".to_string(),
            window_width: 1280,
            window_height: 720,
            max_frame_delta: Duration::from_millis(33),
            metrics_log_interval: Duration::from_secs(1),
            max_render_fps: None,
            texture_manifest: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to create event loop: {0}")]
    CreateEventLoop(#[source] EventLoopError),
    #[error("failed to create application window: {0}")]
    CreateWindow(#[source] OsError),
    #[error("failed to initialize renderer: {0}")]
    CreateRenderer(#[source] PixelsError),
    #[error("event loop failed: {0}")]
    EventLoopRun(#[source] EventLoopError),
}

pub fn run_app(config: LoopConfig, scene: Box<dyn Scene>) -> Result<(), AppError> {
    let metrics_handle = MetricsHandle::default();
    run_app_with_metrics(config, scene, metrics_handle)
}

pub fn run_app_with_metrics(
    config: LoopConfig,
    mut scene: Box<dyn Scene>,
    metrics_handle: MetricsHandle,
) -> Result<(), AppError> {
    let textures = load_textures(config.texture_manifest.as_deref());

    let event_loop = EventLoop::new().map_err(AppError::CreateEventLoop)?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(config.window_title.clone())
            .with_inner_size(LogicalSize::new(
                config.window_width as f64,
                config.window_height as f64,
            ))
            .build(&event_loop)
            .map_err(AppError::CreateWindow)?,
    );
    let mut renderer =
        Renderer::new(Arc::clone(&window), textures).map_err(AppError::CreateRenderer)?;

    event_loop.set_control_flow(ControlFlow::Poll);

    let max_frame_delta =
        normalize_non_zero_duration(config.max_frame_delta, Duration::from_millis(33));
    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
    let effective_render_cap = normalize_render_fps_cap(resolve_max_render_fps(config.max_render_fps));
    let render_frame_target = target_frame_duration(effective_render_cap);
    let (initial_width, initial_height) = renderer.size();
    let mut input_collector = InputCollector::new(initial_width, initial_height);

    scene.load();
    info!(
        max_frame_delta_ms = max_frame_delta.as_millis() as u64,
        metrics_log_interval_ms = metrics_log_interval.as_millis() as u64,
        render_fps_cap = %format_render_cap(effective_render_cap),
        texture_count = renderer.textures().len(),
        "loop_config"
    );

    let mut draw_list = DrawList::default();
    let mut last_frame_instant = Instant::now();
    let mut last_present_instant = Instant::now();
    let mut metrics_accumulator = MetricsAccumulator::new(metrics_log_interval);
    let mut last_applied_title: Option<String> = None;
    let mut scene_unloaded = false;

    event_loop
        .run(move |event, window_target| match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested => {
                    input_collector.mark_quit_requested();
                    info!(reason = "window_close", "shutdown_requested");
                    window_target.exit();
                }
                WindowEvent::Resized(new_size) => {
                    input_collector.set_window_size(new_size.width, new_size.height);
                    if let Err(error) = renderer.resize(new_size.width, new_size.height) {
                        warn!(error = %error, "renderer_resize_failed");
                        window_target.exit();
                    }
                }
                WindowEvent::ScaleFactorChanged { .. } => {
                    let size = window.inner_size();
                    input_collector.set_window_size(size.width, size.height);
                    if let Err(error) = renderer.resize(size.width, size.height) {
                        warn!(error = %error, "renderer_resize_failed");
                        window_target.exit();
                    }
                }
                WindowEvent::CursorMoved { position, .. } => {
                    input_collector.set_cursor_position_px(position.x as f32, position.y as f32);
                }
                WindowEvent::CursorLeft { .. } => {
                    input_collector.clear_cursor_position();
                }
                WindowEvent::MouseInput { state, button, .. } => {
                    input_collector.handle_mouse_input(button, state);
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    let is_pressed = event.state == ElementState::Pressed;
                    input_collector.update_action_state_from_physical_key(event.physical_key, is_pressed);
                    if input_collector.quit_requested {
                        info!(reason = "escape_key", "shutdown_requested");
                        window_target.exit();
                    }
                }
                WindowEvent::RedrawRequested => {
                    let now = Instant::now();
                    let raw_frame_dt = now.saturating_duration_since(last_frame_instant);
                    last_frame_instant = now;
                    let frame_dt = clamp_frame_delta(raw_frame_dt, max_frame_delta);

                    let update_started = Instant::now();
                    let input_snapshot = input_collector.snapshot_for_frame();
                    let command = scene.update(frame_dt.as_secs_f32(), &input_snapshot);
                    let update_dt = update_started.elapsed();
                    if command == SceneCommand::Quit {
                        info!(reason = "scene_quit", "shutdown_requested");
                        window_target.exit();
                        return;
                    }

                    // Single authoritative FPS cap sleep point for render pacing.
                    let elapsed_since_last_present =
                        Instant::now().saturating_duration_since(last_present_instant);
                    let cap_sleep =
                        compute_cap_sleep(elapsed_since_last_present, render_frame_target);
                    if cap_sleep > Duration::ZERO {
                        thread::sleep(cap_sleep);
                    }

                    draw_list.reset();
                    scene.render(&mut draw_list);
                    if let Err(error) = renderer.render(&draw_list) {
                        warn!(error = %error, "renderer_draw_failed");
                        window_target.exit();
                    }
                    last_present_instant = Instant::now();

                    let next_title = scene.debug_title();
                    if next_title != last_applied_title {
                        match &next_title {
                            Some(title) => window.set_title(title),
                            None => window.set_title(&config.window_title),
                        }
                        last_applied_title = next_title;
                    }

                    metrics_accumulator.record_frame(
                        raw_frame_dt,
                        update_dt,
                        raw_frame_dt > max_frame_delta,
                    );
                    if let Some(snapshot) = metrics_accumulator.maybe_snapshot(now) {
                        metrics_handle.publish(snapshot);
                        info!(
                            fps = snapshot.fps,
                            frame_time_ms = snapshot.frame_time_ms,
                            update_time_ms = snapshot.update_time_ms,
                            clamped_frames = snapshot.clamped_frames,
                            draw_commands = draw_list.len(),
                            "loop_metrics"
                        );
                    }
                }
                _ => {}
            },
            Event::AboutToWait => {
                window.request_redraw();
            }
            Event::LoopExiting => {
                if !scene_unloaded {
                    scene.unload();
                    scene_unloaded = true;
                }
                info!("shutdown");
            }
            _ => {}
        })
        .map_err(AppError::EventLoopRun)
}

fn load_textures(manifest_path: Option<&std::path::Path>) -> TextureStore {
    let Some(path) = manifest_path else {
        return TextureStore::empty();
    };
    if !path.is_file() {
        warn!(path = %path.display(), "texture_manifest_missing_using_placeholders");
        return TextureStore::empty();
    }
    match TextureStore::load_manifest(path) {
        Ok(store) => store,
        Err(error) => {
            warn!(path = %path.display(), error = %error, "texture_manifest_invalid_using_placeholders");
            TextureStore::empty()
        }
    }
}

#[derive(Debug, Default)]
struct InputCollector {
    quit_requested: bool,
    action_states: ActionStates,
    cursor_position_px: Option<Vec2>,
    left_mouse_is_down: bool,
    right_mouse_is_down: bool,
    right_click_pressed_edge: bool,
    window_width: u32,
    window_height: u32,
}

impl InputCollector {
    fn new(window_width: u32, window_height: u32) -> Self {
        Self {
            window_width,
            window_height,
            ..Self::default()
        }
    }

    fn mark_quit_requested(&mut self) {
        self.quit_requested = true;
    }

    fn snapshot_for_frame(&mut self) -> InputSnapshot {
        let snapshot = InputSnapshot::new(
            self.quit_requested,
            self.action_states,
            self.cursor_position_px,
            self.left_mouse_is_down,
            self.right_click_pressed_edge,
            self.window_width,
            self.window_height,
        );
        self.action_states.clear_pressed();
        self.right_click_pressed_edge = false;
        snapshot
    }

    fn update_action_state_from_physical_key(&mut self, key: PhysicalKey, is_pressed: bool) {
        let PhysicalKey::Code(code) = key else {
            return;
        };
        let action = match code {
            KeyCode::KeyW => InputAction::MoveUp,
            KeyCode::KeyS => InputAction::MoveDown,
            KeyCode::KeyA => InputAction::MoveLeft,
            KeyCode::KeyD => InputAction::MoveRight,
            KeyCode::ArrowUp => InputAction::PanUp,
            KeyCode::ArrowDown => InputAction::PanDown,
            KeyCode::ArrowLeft => InputAction::PanLeft,
            KeyCode::ArrowRight => InputAction::PanRight,
            KeyCode::KeyQ => InputAction::SwapSlot,
            KeyCode::Digit1 => InputAction::SelectSlot1,
            KeyCode::Digit2 => InputAction::SelectSlot2,
            KeyCode::KeyR => InputAction::Reload,
            KeyCode::KeyG => InputAction::ToggleDebug,
            KeyCode::Escape => {
                if is_pressed {
                    self.mark_quit_requested();
                }
                InputAction::Quit
            }
            _ => return,
        };
        self.action_states.set(action, is_pressed);
    }

    fn set_window_size(&mut self, width: u32, height: u32) {
        self.window_width = width;
        self.window_height = height;
    }

    fn set_cursor_position_px(&mut self, x: f32, y: f32) {
        self.cursor_position_px = Some(Vec2 { x, y });
    }

    fn clear_cursor_position(&mut self) {
        self.cursor_position_px = None;
    }

    fn handle_mouse_input(&mut self, button: MouseButton, state: ElementState) {
        match button {
            MouseButton::Left => self.left_mouse_is_down = state == ElementState::Pressed,
            MouseButton::Right => match state {
                ElementState::Pressed => {
                    if !self.right_mouse_is_down {
                        self.right_click_pressed_edge = true;
                    }
                    self.right_mouse_is_down = true;
                }
                ElementState::Released => self.right_mouse_is_down = false,
            },
            _ => {}
        }
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

fn normalize_render_fps_cap(cap: Option<u32>) -> Option<u32> {
    cap.filter(|value| *value > 0)
}

fn target_frame_duration(max_render_fps: Option<u32>) -> Option<Duration> {
    max_render_fps.map(|fps| Duration::from_secs_f64(1.0 / fps as f64))
}

fn compute_cap_sleep(elapsed: Duration, target: Option<Duration>) -> Duration {
    match target {
        Some(frame_target) if elapsed < frame_target => frame_target - elapsed,
        _ => Duration::ZERO,
    }
}

fn format_render_cap(cap: Option<u32>) -> String {
    match cap {
        Some(value) => value.to_string(),
        None => "off".to_string(),
    }
}

fn resolve_max_render_fps(config_cap: Option<u32>) -> Option<u32> {
    match env::var(MAX_RENDER_FPS_ENV_VAR) {
        Ok(value) => parse_render_fps_value(&value).unwrap_or_else(|| {
            warn!(
                env_var = MAX_RENDER_FPS_ENV_VAR,
                value = value.as_str(),
                "invalid render fps env var value; falling back to config"
            );
            config_cap
        }),
        Err(env::VarError::NotPresent) => config_cap,
        Err(err) => {
            warn!(
                env_var = MAX_RENDER_FPS_ENV_VAR,
                error = %err,
                "unable to read render fps env var; falling back to config"
            );
            config_cap
        }
    }
}

/// `off` or `0` disables the cap; anything else must be a positive integer.
fn parse_render_fps_value(value: &str) -> Option<Option<u32>> {
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("off") {
        return Some(None);
    }
    trimmed.parse::<u32>().ok().map(|fps| Some(fps).filter(|fps| *fps > 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_frame_delta_caps_large_frame() {
        let max_frame_delta = Duration::from_millis(33);
        assert_eq!(
            clamp_frame_delta(Duration::from_millis(250), max_frame_delta),
            max_frame_delta
        );
        assert_eq!(
            clamp_frame_delta(Duration::from_millis(16), max_frame_delta),
            Duration::from_millis(16)
        );
    }

    #[test]
    fn default_config_caps_frames_at_33ms() {
        assert_eq!(LoopConfig::default().max_frame_delta, Duration::from_millis(33));
    }

    #[test]
    fn key_press_is_edge_triggered_for_single_frame() {
        let mut input = InputCollector::new(1280, 720);
        input.update_action_state_from_physical_key(PhysicalKey::Code(KeyCode::KeyQ), true);

        let first = input.snapshot_for_frame();
        let second = input.snapshot_for_frame();

        assert!(first.was_pressed(InputAction::SwapSlot));
        assert!(!second.was_pressed(InputAction::SwapSlot));
        assert!(second.is_down(InputAction::SwapSlot));
    }

    #[test]
    fn held_key_does_not_retrigger_without_release() {
        let mut input = InputCollector::new(1280, 720);
        let key = PhysicalKey::Code(KeyCode::KeyG);

        input.update_action_state_from_physical_key(key, true);
        assert!(input.snapshot_for_frame().was_pressed(InputAction::ToggleDebug));

        input.update_action_state_from_physical_key(key, true);
        assert!(!input.snapshot_for_frame().was_pressed(InputAction::ToggleDebug));

        input.update_action_state_from_physical_key(key, false);
        input.update_action_state_from_physical_key(key, true);
        assert!(input.snapshot_for_frame().was_pressed(InputAction::ToggleDebug));
    }

    #[test]
    fn wasd_moves_and_arrows_pan() {
        let mut input = InputCollector::default();

        input.update_action_state_from_physical_key(PhysicalKey::Code(KeyCode::KeyW), true);
        input.update_action_state_from_physical_key(PhysicalKey::Code(KeyCode::ArrowLeft), true);

        let snapshot = input.snapshot_for_frame();
        assert!(snapshot.is_down(InputAction::MoveUp));
        assert!(snapshot.is_down(InputAction::PanLeft));
        assert!(!snapshot.is_down(InputAction::MoveLeft));
    }

    #[test]
    fn slot_and_reload_keys_map_to_actions() {
        let mut input = InputCollector::default();
        for code in [KeyCode::Digit1, KeyCode::Digit2, KeyCode::KeyR] {
            input.update_action_state_from_physical_key(PhysicalKey::Code(code), true);
        }
        let snapshot = input.snapshot_for_frame();
        assert!(snapshot.was_pressed(InputAction::SelectSlot1));
        assert!(snapshot.was_pressed(InputAction::SelectSlot2));
        assert!(snapshot.was_pressed(InputAction::Reload));
    }

    #[test]
    fn escape_requests_quit() {
        let mut input = InputCollector::default();
        input.update_action_state_from_physical_key(PhysicalKey::Code(KeyCode::Escape), true);
        assert!(input.snapshot_for_frame().quit_requested());
    }

    #[test]
    fn left_mouse_reports_held_state() {
        let mut input = InputCollector::new(1280, 720);
        input.handle_mouse_input(MouseButton::Left, ElementState::Pressed);
        assert!(input.snapshot_for_frame().left_mouse_down());
        assert!(input.snapshot_for_frame().left_mouse_down());

        input.handle_mouse_input(MouseButton::Left, ElementState::Released);
        assert!(!input.snapshot_for_frame().left_mouse_down());
    }

    #[test]
    fn right_click_is_edge_triggered_for_single_frame() {
        let mut input = InputCollector::new(1280, 720);
        input.handle_mouse_input(MouseButton::Right, ElementState::Pressed);
        let first = input.snapshot_for_frame();
        input.handle_mouse_input(MouseButton::Right, ElementState::Pressed);
        let second = input.snapshot_for_frame();

        assert!(first.right_click_pressed());
        assert!(!second.right_click_pressed());
    }

    #[test]
    fn snapshot_carries_cursor_and_window_size() {
        let mut input = InputCollector::new(1280, 720);
        input.set_cursor_position_px(100.0, 200.0);
        let snapshot = input.snapshot_for_frame();

        assert_eq!(snapshot.window_size(), (1280, 720));
        let cursor = snapshot.cursor_position_px().expect("cursor");
        assert!((cursor.x - 100.0).abs() < 0.0001);
        assert!((cursor.y - 200.0).abs() < 0.0001);

        input.clear_cursor_position();
        assert!(input.snapshot_for_frame().cursor_position_px().is_none());
    }

    #[test]
    fn target_frame_duration_none_when_cap_off() {
        assert_eq!(target_frame_duration(None), None);
    }

    #[test]
    fn target_frame_duration_for_60hz_is_expected() {
        let duration = target_frame_duration(Some(60)).expect("duration");
        assert!((duration.as_secs_f64() - (1.0 / 60.0)).abs() < 0.000_001);
    }

    #[test]
    fn compute_cap_sleep_zero_when_over_budget() {
        let sleep = compute_cap_sleep(Duration::from_millis(20), target_frame_duration(Some(60)));
        assert_eq!(sleep, Duration::ZERO);
    }

    #[test]
    fn compute_cap_sleep_positive_when_under_budget() {
        let sleep = compute_cap_sleep(Duration::from_millis(5), target_frame_duration(Some(60)));
        assert!(sleep > Duration::ZERO);
    }

    #[test]
    fn normalize_render_fps_cap_disables_zero() {
        assert_eq!(normalize_render_fps_cap(Some(0)), None);
        assert_eq!(normalize_render_fps_cap(Some(60)), Some(60));
    }

    #[test]
    fn render_fps_env_value_parsing() {
        assert_eq!(parse_render_fps_value("144"), Some(Some(144)));
        assert_eq!(parse_render_fps_value(" off "), Some(None));
        assert_eq!(parse_render_fps_value("0"), Some(None));
        assert_eq!(parse_render_fps_value("fast"), None);
    }

    #[test]
    fn missing_manifest_falls_back_to_empty_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = load_textures(Some(&dir.path().join("textures.json")));
        assert!(store.is_empty());
        assert!(load_textures(None).is_empty());
    }
}
