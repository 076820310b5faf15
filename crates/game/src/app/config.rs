use std::env;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::warn;

use super::gameplay::Stats;

pub(crate) const SEED_ENV_VAR: &str = "ISORPG_SEED";
pub(crate) const START_MAP_ENV_VAR: &str = "ISORPG_START_MAP";
pub(crate) const PLAYER_STATS_ENV_VAR: &str = "ISORPG_PLAYER_STATS";

/// Per-run game settings read once from the environment. Invalid values warn
/// and fall back.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RunSettings {
    pub(crate) seed: u64,
    pub(crate) start_map: Option<String>,
    pub(crate) player_stats: Stats,
}

impl RunSettings {
    pub(crate) fn from_env() -> Self {
        Self::from_lookup(read_env_var)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let seed = match lookup(SEED_ENV_VAR) {
            Some(value) => value.trim().parse::<u64>().unwrap_or_else(|_| {
                let fallback = clock_seed();
                warn!(
                    env_var = SEED_ENV_VAR,
                    value = value.as_str(),
                    fallback,
                    "invalid seed env var value; falling back to clock seed"
                );
                fallback
            }),
            None => clock_seed(),
        };
        let start_map = lookup(START_MAP_ENV_VAR)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        let player_stats = Stats::allocation_or_default(lookup(PLAYER_STATS_ENV_VAR).as_deref());
        Self {
            seed,
            start_map,
            player_stats,
        }
    }
}

fn read_env_var(var: &str) -> Option<String> {
    match env::var(var) {
        Ok(value) => Some(value),
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            warn!(env_var = var, error = %err, "unable to read env var; using default");
            None
        }
    }
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn settings(vars: &[(&str, &str)]) -> RunSettings {
        let vars = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect::<HashMap<_, _>>();
        RunSettings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn explicit_values_are_used() {
        let settings = settings(&[
            (SEED_ENV_VAR, " 77 "),
            (START_MAP_ENV_VAR, "ruins"),
            (PLAYER_STATS_ENV_VAR, "2,3,5"),
        ]);
        assert_eq!(settings.seed, 77);
        assert_eq!(settings.start_map.as_deref(), Some("ruins"));
        assert_eq!(settings.player_stats, Stats::new(2, 3, 5));
    }

    #[test]
    fn invalid_values_fall_back() {
        let settings = settings(&[
            (START_MAP_ENV_VAR, "   "),
            (PLAYER_STATS_ENV_VAR, "9,9,9"),
        ]);
        assert_eq!(settings.start_map, None);
        assert_eq!(settings.player_stats, Stats::DEFAULT_PLAYER);
    }
}
