//! Simulation tunables.
//!
//! Every constant the rules use lives here with a documented default. A
//! `SimConfig` is built once (usually from `fable.toml`), wrapped in an `Arc`,
//! and handed to each [`Actor`](crate::actor::Actor) and
//! [`CombatSession`](crate::combat::CombatSession) at construction.

use fable_common::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Configuration file name.
pub const CONFIG_FILE: &str = "fable.toml";

/// Simulation configuration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    // === Rolls ===
    /// Hard cap on dodge chance after all bonuses
    pub dodge_cap: f32,
    /// Hard cap on critical chance after all bonuses
    pub crit_cap: f32,
    /// Critical damage multiplier before skills and effects
    pub base_crit_multiplier: f32,
    /// Multiplier added per level of `combat.critical_mastery`
    pub crit_mastery_per_level: f32,

    // === Damage ===
    /// Defense scaling constant in `defense / (defense + scaling)`
    pub defense_scaling: f32,
    /// Fraction of ability damage dealt to secondary area targets
    pub aoe_damage_fraction: f32,

    // === Resources ===
    /// Stamina regenerated per update step
    pub stamina_regen_per_step: f32,
    /// Mana regenerated per update step
    pub mana_regen_per_step: f32,
    /// Health fraction restored by a default resurrection
    pub resurrect_health_fraction: f32,
    /// Stamina and mana fraction restored on resurrection
    pub resurrect_resource_fraction: f32,
    /// Upper bound on cooldown reduction
    pub max_cooldown_reduction: f32,
    /// Seconds between basic auto-attacks when not set by content
    pub default_attack_cooldown: f64,

    // === Combat session ===
    /// Seconds the enemy waits before acting on its turn
    pub turn_duration: f64,
    /// Base escape probability
    pub escape_base_chance: f32,
    /// Escape probability added per player level
    pub escape_chance_per_level: f32,
    /// Defense bonus granted by the defensive stance before skills
    pub defend_base_bonus: f32,
    /// Combat stamina restored by the defensive stance
    pub defend_stamina_restore: f32,
    /// Size of the combat-only stamina pool
    pub combat_stamina_max: f32,
    /// Combat stamina spent by a basic attack
    pub attack_stamina_cost: f32,
    /// Combat stamina regenerated after each enemy turn
    pub combat_stamina_regen: f32,
    /// Consecutive landed attacks needed for the combo bonus
    pub combo_threshold: u32,
    /// Outgoing damage bonus while the combo is active
    pub combo_damage_bonus: f32,
    /// Lower bound of the enemy aggression roll
    pub aggression_min: f32,
    /// Upper bound (exclusive) of the enemy aggression roll
    pub aggression_max: f32,
    /// Chance per point of aggression that an enemy prefers an ability
    pub enemy_ability_chance: f32,

    // === Progression ===
    /// Maximum level a skill can be raised to with skill points
    pub max_skill_level: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            // Rolls
            dodge_cap: 0.75,
            crit_cap: 0.75,
            base_crit_multiplier: 2.0,
            crit_mastery_per_level: 0.1,

            // Damage
            defense_scaling: 100.0,
            aoe_damage_fraction: 0.5,

            // Resources
            stamina_regen_per_step: 5.0,
            mana_regen_per_step: 2.0,
            resurrect_health_fraction: 0.5,
            resurrect_resource_fraction: 0.5,
            max_cooldown_reduction: 0.9,
            default_attack_cooldown: 1.0,

            // Combat session
            turn_duration: 1.0,
            escape_base_chance: 0.3,
            escape_chance_per_level: 0.1,
            defend_base_bonus: 5.0,
            defend_stamina_restore: 20.0,
            combat_stamina_max: 100.0,
            attack_stamina_cost: 10.0,
            combat_stamina_regen: 10.0,
            combo_threshold: 3,
            combo_damage_bonus: 0.2,
            aggression_min: 0.5,
            aggression_max: 1.5,
            enemy_ability_chance: 0.3,

            // Progression
            max_skill_level: 10,
        }
    }
}

impl SimConfig {
    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific path.
    /// Returns default config if the file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found, using defaults");
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => match Self::from_toml_str(&contents) {
                Ok(config) => {
                    info!("Loaded config from {}", path.display());
                    config
                },
                Err(e) => {
                    warn!("Failed to load config file: {e}");
                    Self::default()
                },
            },
            Err(e) => {
                warn!("Failed to read config file: {e}");
                Self::default()
            },
        }
    }

    /// Serialize to pretty TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Check every tunable against its valid range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn unit(key: &'static str, value: f32) -> Result<(), ConfigError> {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(ConfigError::OutOfRange {
                    key,
                    reason: format!("{value} is not within [0, 1]"),
                })
            }
        }
        fn non_negative(key: &'static str, value: f64) -> Result<(), ConfigError> {
            if value >= 0.0 && value.is_finite() {
                Ok(())
            } else {
                Err(ConfigError::OutOfRange {
                    key,
                    reason: format!("{value} must be a finite non-negative number"),
                })
            }
        }

        unit("dodge_cap", self.dodge_cap)?;
        unit("crit_cap", self.crit_cap)?;
        unit("aoe_damage_fraction", self.aoe_damage_fraction)?;
        unit("resurrect_health_fraction", self.resurrect_health_fraction)?;
        unit("resurrect_resource_fraction", self.resurrect_resource_fraction)?;
        unit("max_cooldown_reduction", self.max_cooldown_reduction)?;
        unit("escape_base_chance", self.escape_base_chance)?;
        unit("enemy_ability_chance", self.enemy_ability_chance)?;

        if self.base_crit_multiplier < 1.0 {
            return Err(ConfigError::OutOfRange {
                key: "base_crit_multiplier",
                reason: "critical hits must not reduce damage".to_string(),
            });
        }
        if self.defense_scaling <= 0.0 {
            return Err(ConfigError::OutOfRange {
                key: "defense_scaling",
                reason: "must be positive".to_string(),
            });
        }
        if self.aggression_min > self.aggression_max {
            return Err(ConfigError::OutOfRange {
                key: "aggression_min",
                reason: "must not exceed aggression_max".to_string(),
            });
        }

        non_negative("stamina_regen_per_step", self.stamina_regen_per_step.into())?;
        non_negative("mana_regen_per_step", self.mana_regen_per_step.into())?;
        non_negative("default_attack_cooldown", self.default_attack_cooldown)?;
        non_negative("turn_duration", self.turn_duration)?;
        non_negative("combat_stamina_max", self.combat_stamina_max.into())?;
        non_negative("attack_stamina_cost", self.attack_stamina_cost.into())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SimConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.dodge_cap, 0.75);
        assert_eq!(config.combo_threshold, 3);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = SimConfig::from_toml_str("turn_duration = 2.5\ncrit_cap = 0.5\n")
            .expect("valid config");
        assert_eq!(config.turn_duration, 2.5);
        assert_eq!(config.crit_cap, 0.5);
        assert_eq!(config.defense_scaling, 100.0);
    }

    #[test]
    fn test_out_of_range_rejected() {
        let err = SimConfig::from_toml_str("dodge_cap = 1.5").expect_err("cap above 1");
        assert!(matches!(err, ConfigError::OutOfRange { key: "dodge_cap", .. }));
    }

    #[test]
    fn test_malformed_toml_rejected() {
        let err = SimConfig::from_toml_str("dodge_cap = \"high\"").expect_err("wrong type");
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);

        let config = SimConfig {
            escape_base_chance: 0.4,
            ..SimConfig::default()
        };
        let text = config.to_toml_string().expect("serialize");
        fs::write(&path, text).expect("write");

        assert_eq!(SimConfig::load_from(&path), config);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = SimConfig::load_from(dir.path().join("absent.toml"));
        assert_eq!(config, SimConfig::default());
    }

    #[test]
    fn test_load_invalid_file_uses_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "crit_cap = 7.0").expect("write");
        assert_eq!(SimConfig::load_from(&path), SimConfig::default());
    }
}
