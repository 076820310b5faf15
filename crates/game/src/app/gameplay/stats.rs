use tracing::warn;

pub(crate) const STAT_POINT_POOL: i32 = 10;
pub(crate) const STAT_MAX: i32 = 10;
const NOMINAL_STAT: i32 = 3;
const MAX_TOUGHNESS: f32 = 0.35;
const MAX_DODGE: f32 = 0.30;

/// Primary stats. Nominal value is 3; every derived bonus is measured from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Stats {
    pub(crate) strength: i32,
    pub(crate) agility: i32,
    pub(crate) perception: i32,
}

impl Stats {
    pub(crate) const DEFAULT_PLAYER: Self = Self::new(4, 3, 3);

    pub(crate) const fn new(strength: i32, agility: i32, perception: i32) -> Self {
        Self {
            strength,
            agility,
            perception,
        }
    }

    /// Character-creation rule: each stat in `0..=10` and the whole pool spent.
    pub(crate) fn validate_allocation(self) -> Result<Self, String> {
        for (name, value) in [
            ("str", self.strength),
            ("agi", self.agility),
            ("per", self.perception),
        ] {
            if !(0..=STAT_MAX).contains(&value) {
                return Err(format!("{name}={value} is outside 0..={STAT_MAX}"));
            }
        }
        let spent = self.strength + self.agility + self.perception;
        if spent != STAT_POINT_POOL {
            return Err(format!(
                "allocation spends {spent} points, expected exactly {STAT_POINT_POOL}"
            ));
        }
        Ok(self)
    }

    /// Parses `str,agi,per` and validates it as a character allocation.
    pub(crate) fn parse_allocation(raw: &str) -> Result<Self, String> {
        let values = raw
            .split(',')
            .map(|part| {
                part.trim()
                    .parse::<i32>()
                    .map_err(|error| format!("'{}' is not an integer: {error}", part.trim()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let [strength, agility, perception] = values[..] else {
            return Err(format!("expected 3 comma-separated stats, got {}", values.len()));
        };
        Self::new(strength, agility, perception).validate_allocation()
    }

    pub(crate) fn allocation_or_default(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::DEFAULT_PLAYER;
        };
        match Self::parse_allocation(raw) {
            Ok(stats) => stats,
            Err(error) => {
                warn!(
                    value = raw,
                    error = %error,
                    fallback = ?Self::DEFAULT_PLAYER,
                    "invalid_stat_allocation_using_default"
                );
                Self::DEFAULT_PLAYER
            }
        }
    }

    /// Tiles around the player that count as visible for hover targeting.
    pub(crate) fn view_radius(self) -> f32 {
        4.0 + (self.perception - NOMINAL_STAT) as f32 * 1.2
    }

    /// Radius of the fog-of-war reveal around the player.
    pub(crate) fn explore_radius(self) -> f32 {
        5.0 + (self.perception - NOMINAL_STAT) as f32 * 1.4
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct DerivedStats {
    pub(crate) speed: f32,
    pub(crate) toughness: f32,
    pub(crate) dodge: f32,
    pub(crate) max_hp: f32,
}

impl DerivedStats {
    pub(crate) fn compute(stats: Stats, base_speed: f32) -> Self {
        let agility_delta = (stats.agility - NOMINAL_STAT) as f32;
        let strength_delta = (stats.strength - NOMINAL_STAT) as f32;
        Self {
            speed: base_speed * (1.0 + agility_delta * 0.08),
            toughness: (strength_delta * 0.03).clamp(0.0, MAX_TOUGHNESS),
            dodge: (agility_delta * 0.03).clamp(0.0, MAX_DODGE),
            max_hp: (60 + 8 * stats.strength + 5 * stats.agility + 3 * stats.perception) as f32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nominal_stats_have_no_bonuses() {
        let derived = DerivedStats::compute(Stats::new(3, 3, 3), 4.0);
        assert_eq!(derived.speed, 4.0);
        assert_eq!(derived.toughness, 0.0);
        assert_eq!(derived.dodge, 0.0);
        assert_eq!(derived.max_hp, 108.0);
    }

    #[test]
    fn dodge_and_toughness_stay_clamped_for_extreme_stats() {
        for value in [-50, -3, 0, 3, 7, 10, 25, 1000] {
            let derived = DerivedStats::compute(Stats::new(value, value, value), 2.0);
            assert!((0.0..=0.30).contains(&derived.dodge), "dodge {}", derived.dodge);
            assert!(
                (0.0..=0.35).contains(&derived.toughness),
                "toughness {}",
                derived.toughness
            );
        }
    }

    #[test]
    fn agility_scales_speed_linearly() {
        let derived = DerivedStats::compute(Stats::new(3, 8, 3), 4.0);
        assert!((derived.speed - 5.6).abs() < 1e-5);
    }

    #[test]
    fn allocation_must_spend_whole_pool_within_bounds() {
        assert_eq!(
            Stats::parse_allocation("4, 3, 3"),
            Ok(Stats::new(4, 3, 3))
        );
        assert!(Stats::parse_allocation("4,3,2").is_err());
        assert!(Stats::parse_allocation("11,0,-1").is_err());
        assert!(Stats::parse_allocation("5,5").is_err());
        assert!(Stats::parse_allocation("a,b,c").is_err());
    }

    #[test]
    fn invalid_allocation_falls_back_to_default() {
        assert_eq!(Stats::allocation_or_default(None), Stats::DEFAULT_PLAYER);
        assert_eq!(Stats::allocation_or_default(Some("9,9,9")), Stats::DEFAULT_PLAYER);
        assert_eq!(Stats::allocation_or_default(Some("2,2,6")), Stats::new(2, 2, 6));
    }

    #[test]
    fn perception_widens_view_and_explore_radii() {
        let nominal = Stats::new(3, 3, 3);
        assert_eq!(nominal.view_radius(), 4.0);
        assert_eq!(nominal.explore_radius(), 5.0);
        let sharp = Stats::new(1, 1, 8);
        assert!((sharp.view_radius() - 10.0).abs() < 1e-5);
        assert!((sharp.explore_radius() - 12.0).abs() < 1e-5);
    }
}
