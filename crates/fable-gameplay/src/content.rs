//! Content definitions: actor templates and content bundles.
//!
//! Definitions are plain serde structs read from JSON or RON. Everything is
//! validated when it is built, so authoring mistakes surface as a
//! [`DataError`] at load time rather than as silent no-ops during play.

use crate::abilities::{AbilityCatalog, AbilityDef, SkillRef};
use crate::actor::Actor;
use crate::combat_stats::{StatBlock, StatKind};
use crate::config::SimConfig;
use crate::damage_calc::{DamageType, Resistances};
use crate::progression::{ActorKind, ActorRole, EnemyProfile, NpcProfile, PlayerProfile};
use crate::status_effect::{StatusEffect, StatusEffectDef};
use fable_common::{ActorId, DataError, FableResult, Position, SchemaVersion};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

// ============================================================================
// Actor Templates
// ============================================================================

/// Content form of an actor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorTemplate {
    /// Display name (required).
    pub name: Option<String>,
    /// `player`, `npc` or `enemy` (required).
    #[serde(alias = "type")]
    pub kind: Option<String>,
    /// Starting level (default 1).
    pub level: Option<u32>,
    /// Stat overrides by name.
    pub stats: BTreeMap<String, f32>,
    /// Resistances by damage type.
    pub resistances: BTreeMap<String, f32>,
    /// Starting position.
    pub position: Option<Position>,
    /// Seconds between basic attacks.
    pub attack_cooldown: Option<f64>,
    /// Abilities defined inline.
    pub abilities: BTreeMap<String, AbilityDef>,
    /// Shared abilities learned from a bundle, by id.
    pub learns: Vec<String>,
    /// Starting skill levels, category to skill to level (players).
    pub skills: BTreeMap<String, BTreeMap<String, u32>>,
    /// Experience granted on defeat (enemies).
    pub experience_reward: Option<u64>,
    /// Aggression scalar (enemies).
    pub aggression: Option<f32>,
    /// Faction label (NPCs).
    pub faction: Option<String>,
    /// Behaviour label (NPCs).
    pub behavior: Option<String>,
}

impl ActorTemplate {
    fn stat_block(&self, context: &str) -> Result<StatBlock, DataError> {
        let mut parsed = Vec::with_capacity(self.stats.len());
        for (name, value) in &self.stats {
            let kind = StatKind::from_name(name).ok_or_else(|| DataError::UnknownStat {
                context: context.to_string(),
                name: name.clone(),
            })?;
            if !value.is_finite() || *value < 0.0 {
                return Err(DataError::InvalidValue {
                    context: context.to_string(),
                    field: "stats",
                    reason: format!("{name} = {value} must be a finite non-negative number"),
                });
            }
            parsed.push((kind, *value));
        }

        // Maxima first so current values are clamped against the new bounds.
        parsed.sort_by_key(|(kind, _)| !kind.is_max());
        let mut stats = StatBlock::new();
        for (kind, value) in parsed {
            stats.set(kind, value);
        }
        Ok(stats)
    }

    fn resistances(&self, context: &str) -> Result<Resistances, DataError> {
        let mut resistances = Resistances::new();
        for (name, value) in &self.resistances {
            let damage_type = DamageType::from_name(name).ok_or_else(|| DataError::UnknownVariant {
                context: context.to_string(),
                kind: "damage type",
                value: name.clone(),
            })?;
            if !value.is_finite() {
                return Err(DataError::InvalidValue {
                    context: context.to_string(),
                    field: "resistances",
                    reason: format!("{name} must be finite"),
                });
            }
            resistances.set(damage_type, *value);
        }
        Ok(resistances)
    }

    fn role(&self, context: &str) -> Result<ActorRole, DataError> {
        let label = self.kind.as_deref().ok_or_else(|| DataError::MissingField {
            context: context.to_string(),
            field: "kind",
        })?;
        let kind = ActorKind::from_name(label).ok_or_else(|| DataError::UnknownVariant {
            context: context.to_string(),
            kind: "actor kind",
            value: label.to_string(),
        })?;

        Ok(match kind {
            ActorKind::Player => {
                let mut profile = PlayerProfile::default();
                for (category, skills) in &self.skills {
                    for (skill, level) in skills {
                        profile
                            .skills
                            .add_skill(&SkillRef::new(category.clone(), skill.clone()), *level);
                    }
                }
                ActorRole::Player(profile)
            },
            ActorKind::Enemy => {
                let mut profile = EnemyProfile::default();
                if let Some(reward) = self.experience_reward {
                    profile.experience_reward = reward;
                }
                if let Some(aggression) = self.aggression {
                    profile.aggression = aggression.max(0.0);
                }
                ActorRole::Enemy(profile)
            },
            ActorKind::Npc => ActorRole::Npc(NpcProfile {
                faction: self.faction.clone().unwrap_or_else(|| "neutral".to_string()),
                behavior: self.behavior.clone().unwrap_or_else(|| "friendly".to_string()),
            }),
        })
    }
}

impl Actor {
    /// Build an actor from a template. `name` and `kind` are required.
    pub fn from_template(
        id: impl Into<ActorId>,
        template: &ActorTemplate,
        config: Arc<SimConfig>,
    ) -> Result<Self, DataError> {
        let id = id.into();
        let context = format!("actor {id}");
        let name = template.name.clone().ok_or_else(|| DataError::MissingField {
            context: context.clone(),
            field: "name",
        })?;
        let role = template.role(&context)?;
        let stats = template.stat_block(&context)?;
        let resistances = template.resistances(&context)?;
        let abilities = AbilityCatalog::from_defs(&template.abilities)?;

        if let Some(cooldown) = template.attack_cooldown {
            if !cooldown.is_finite() || cooldown < 0.0 {
                return Err(DataError::InvalidValue {
                    context,
                    field: "attack_cooldown",
                    reason: format!("{cooldown} must be a finite non-negative number"),
                });
            }
        }

        let mut actor = Actor::new(id, name, role, config)
            .with_stats(stats)
            .with_resistances(resistances)
            .with_abilities(abilities)
            .with_level(template.level.unwrap_or(1))
            .with_position(template.position.unwrap_or_default());
        if let Some(cooldown) = template.attack_cooldown {
            actor = actor.with_attack_cooldown(cooldown);
        }
        debug!("Built {} ({}) from template", actor.name(), actor.kind().name());
        Ok(actor)
    }
}

// ============================================================================
// Content Bundles
// ============================================================================

/// A set of actor, ability and effect definitions loaded together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentBundle {
    /// Format version the file was written for.
    pub version: SchemaVersion,
    /// Actor templates by id.
    pub actors: BTreeMap<String, ActorTemplate>,
    /// Shared abilities by id.
    pub abilities: BTreeMap<String, AbilityDef>,
    /// Named status effects.
    pub effects: BTreeMap<String, StatusEffectDef>,
}

impl Default for ContentBundle {
    fn default() -> Self {
        Self {
            version: SchemaVersion::CONTENT,
            actors: BTreeMap::new(),
            abilities: BTreeMap::new(),
            effects: BTreeMap::new(),
        }
    }
}

impl ContentBundle {
    /// Parse and validate JSON content.
    pub fn from_json_str(text: &str) -> Result<Self, DataError> {
        let bundle: Self = serde_json::from_str(text).map_err(|e| DataError::Parse(e.to_string()))?;
        bundle.validate()?;
        Ok(bundle)
    }

    /// Parse and validate RON content.
    pub fn from_ron_str(text: &str) -> Result<Self, DataError> {
        let bundle: Self = ron::from_str(text).map_err(|e| DataError::Parse(e.to_string()))?;
        bundle.validate()?;
        Ok(bundle)
    }

    /// Load a `.ron` or `.json` file.
    pub fn load(path: &Path) -> FableResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let bundle = match path.extension().and_then(|e| e.to_str()) {
            Some("ron") => Self::from_ron_str(&text)?,
            _ => Self::from_json_str(&text)?,
        };
        info!(
            "Loaded {} actors, {} abilities, {} effects from {}",
            bundle.actors.len(),
            bundle.abilities.len(),
            bundle.effects.len(),
            path.display()
        );
        Ok(bundle)
    }

    /// Build every definition once so errors surface at load time.
    pub fn validate(&self) -> Result<(), DataError> {
        if !SchemaVersion::CONTENT.can_read(&self.version) {
            return Err(DataError::InvalidValue {
                context: "content bundle".to_string(),
                field: "version",
                reason: format!("{} cannot be read by {}", self.version, SchemaVersion::CONTENT),
            });
        }
        AbilityCatalog::from_defs(&self.abilities)?;
        for name in self.effects.keys() {
            self.effect(name)?;
        }
        let config = Arc::new(SimConfig::default());
        for id in self.actors.keys() {
            self.spawn(id, Arc::clone(&config))?;
        }
        Ok(())
    }

    /// Build a named status effect.
    pub fn effect(&self, name: &str) -> Result<StatusEffect, DataError> {
        let def = self.effects.get(name).ok_or_else(|| DataError::UnknownVariant {
            context: "content bundle".to_string(),
            kind: "status effect",
            value: name.to_string(),
        })?;
        let mut def = def.clone();
        def.name.get_or_insert_with(|| name.to_string());
        def.build()
    }

    /// Build a shared ability catalog of every bundled ability.
    pub fn ability_catalog(&self) -> Result<AbilityCatalog, DataError> {
        AbilityCatalog::from_defs(&self.abilities)
    }

    /// Build an actor from the template `id`, including its shared abilities.
    pub fn spawn(&self, id: &str, config: Arc<SimConfig>) -> Result<Actor, DataError> {
        let template = self.actors.get(id).ok_or_else(|| DataError::UnknownVariant {
            context: "content bundle".to_string(),
            kind: "actor template",
            value: id.to_string(),
        })?;
        let mut actor = Actor::from_template(id, template, config)?;
        for ability_id in &template.learns {
            let def = self.abilities.get(ability_id).ok_or_else(|| DataError::UnknownVariant {
                context: format!("actor {id}"),
                kind: "ability",
                value: ability_id.clone(),
            })?;
            actor.learn_ability(def.build(ability_id)?);
        }
        Ok(actor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn config() -> Arc<SimConfig> {
        Arc::new(SimConfig::default())
    }

    const GOBLIN_JSON: &str = r#"{
        "name": "Goblin Scout",
        "type": "enemy",
        "level": 2,
        "stats": { "health": 40, "max_health": 40, "strength": 8, "dodge_chance": 0.1 },
        "resistances": { "poison": 0.5 },
        "position": { "x": 3.0, "y": 4.0 },
        "experience_reward": 25,
        "abilities": {
            "stab": { "name": "Stab", "damage": 6, "cooldown": 2.0 }
        }
    }"#;

    #[test]
    fn test_from_template() {
        let template: ActorTemplate = serde_json::from_str(GOBLIN_JSON).expect("parse");
        let goblin = Actor::from_template("goblin_1", &template, config()).expect("build");

        assert_eq!(goblin.name(), "Goblin Scout");
        assert_eq!(goblin.kind(), ActorKind::Enemy);
        assert_eq!(goblin.level(), 2);
        assert_eq!(goblin.stats().health(), 40.0);
        assert_eq!(goblin.stats().max_health(), 40.0);
        assert_eq!(goblin.stats().strength(), 8.0);
        assert_eq!(goblin.position().distance_to(&Position::ORIGIN), 5.0);
        assert_eq!(goblin.resistances().get(DamageType::Poison), 0.5);
        assert!(goblin.abilities().contains("stab"));
        assert_eq!(goblin.role().as_enemy().map(|e| e.experience_reward), Some(25));
    }

    #[test]
    fn test_health_above_default_max_is_kept() {
        let mut template = ActorTemplate {
            name: Some("Ogre".into()),
            kind: Some("enemy".into()),
            ..ActorTemplate::default()
        };
        template.stats.insert("health".into(), 300.0);
        template.stats.insert("max_health".into(), 300.0);
        let ogre = Actor::from_template("ogre", &template, config()).expect("build");
        assert_eq!(ogre.stats().health(), 300.0);
    }

    #[test]
    fn test_template_errors() {
        let missing_name = ActorTemplate {
            kind: Some("enemy".into()),
            ..ActorTemplate::default()
        };
        assert!(matches!(
            Actor::from_template("x", &missing_name, config()),
            Err(DataError::MissingField { field: "name", .. })
        ));

        let missing_kind = ActorTemplate {
            name: Some("X".into()),
            ..ActorTemplate::default()
        };
        assert!(matches!(
            Actor::from_template("x", &missing_kind, config()),
            Err(DataError::MissingField { field: "kind", .. })
        ));

        let mut bad_stat = ActorTemplate {
            name: Some("X".into()),
            kind: Some("npc".into()),
            ..ActorTemplate::default()
        };
        bad_stat.stats.insert("luck".into(), 7.0);
        assert!(matches!(
            Actor::from_template("x", &bad_stat, config()),
            Err(DataError::UnknownStat { .. })
        ));

        let wizard = ActorTemplate {
            name: Some("X".into()),
            kind: Some("wizard".into()),
            ..ActorTemplate::default()
        };
        assert!(matches!(
            Actor::from_template("x", &wizard, config()),
            Err(DataError::UnknownVariant { kind: "actor kind", .. })
        ));
    }

    #[test]
    fn test_player_skills_from_template() {
        let template: ActorTemplate = serde_json::from_str(
            r#"{ "name": "Hero", "kind": "player", "skills": { "combat": { "melee": 2 } } }"#,
        )
        .expect("parse");
        let hero = Actor::from_template("hero", &template, config()).expect("build");
        assert_eq!(hero.skill_level(&SkillRef::new("combat", "melee")), 2);
    }

    const BUNDLE_RON: &str = r#"(
        actors: {
            "wolf": (
                name: Some("Wolf"),
                kind: Some("enemy"),
                learns: ["bite"],
            ),
            "merchant": (
                name: Some("Merchant"),
                kind: Some("npc"),
                faction: Some("traders"),
            ),
        },
        abilities: {
            "bite": (
                name: Some("Bite"),
                damage: 8.0,
                effects: [(
                    name: Some("Bleed"),
                    category: Some("dot"),
                    stat_modifiers: { "health": -2.0 },
                    duration: Some(3),
                )],
            ),
        },
        effects: {
            "poison": (
                category: Some("dot"),
                stat_modifiers: { "health": -5.0 },
                duration: Some(3),
            ),
        },
    )"#;

    #[test]
    fn test_bundle_from_ron() {
        let bundle = ContentBundle::from_ron_str(BUNDLE_RON).expect("valid bundle");
        let wolf = bundle.spawn("wolf", config()).expect("spawn");
        assert!(wolf.abilities().contains("bite"));

        let merchant = bundle.spawn("merchant", config()).expect("spawn");
        assert_eq!(merchant.kind(), ActorKind::Npc);

        let poison = bundle.effect("poison").expect("effect");
        assert_eq!(poison.name, "poison");
        assert_eq!(poison.remaining(), Some(3));

        assert_eq!(bundle.ability_catalog().expect("catalog").len(), 1);
        assert!(bundle.spawn("dragon", config()).is_err());
    }

    #[test]
    fn test_bundle_rejects_dangling_ability() {
        let text = r#"{ "actors": { "wolf": { "name": "Wolf", "kind": "enemy", "learns": ["howl"] } } }"#;
        assert!(matches!(
            ContentBundle::from_json_str(text),
            Err(DataError::UnknownVariant { kind: "ability", .. })
        ));
    }

    #[test]
    fn test_bundle_rejects_future_major_version() {
        let text = r#"{ "version": { "major": 2, "minor": 0, "patch": 0 } }"#;
        assert!(matches!(
            ContentBundle::from_json_str(text),
            Err(DataError::InvalidValue { field: "version", .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".ron")
            .tempfile()
            .expect("temp file");
        file.write_all(BUNDLE_RON.as_bytes()).expect("write");

        let bundle = ContentBundle::load(file.path()).expect("load");
        assert_eq!(bundle.actors.len(), 2);

        let missing = ContentBundle::load(Path::new("/nonexistent/content.json"));
        assert!(matches!(missing, Err(fable_common::FableError::Io(_))));
    }
}
