use engine::{resolve_app_paths, LoopConfig, Scene};
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::config::RunSettings;
use super::gameplay::{self, GameConfig, GameplayScene, Legend};

const LEGEND_OVERRIDES_FILE: &str = "legend.json";

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) scene: Box<dyn Scene>,
}

pub(crate) fn build_app() -> Result<AppWiring, String> {
    init_tracing();
    info!("=== isorpg startup ===");

    let paths = resolve_app_paths().map_err(|err| err.to_string())?;
    let settings = RunSettings::from_env();
    info!(
        root = %paths.root.display(),
        seed = settings.seed,
        start_map = settings.start_map.as_deref().unwrap_or("<first>"),
        "run_settings"
    );

    let legend = Legend::load_with_overrides(&paths.assets_dir.join(LEGEND_OVERRIDES_FILE))?;
    let maps = gameplay::load_maps_dir(&paths.maps_dir, &legend)?;
    let catalog = gameplay::load_catalog(&paths.defs_dir).map_err(|err| err.to_string())?;

    let config = LoopConfig {
        texture_manifest: Some(paths.texture_manifest.clone()),
        ..LoopConfig::default()
    };
    let game_config = GameConfig {
        view_size: (config.window_width, config.window_height),
        ..GameConfig::default()
    };
    let scene = GameplayScene::new(
        game_config,
        catalog,
        maps,
        settings.start_map.as_deref(),
        settings.player_stats,
        settings.seed,
    )?;

    Ok(AppWiring {
        config,
        scene: Box::new(scene),
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}
