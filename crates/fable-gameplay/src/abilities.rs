//! Ability definitions and per-actor catalogs.
//!
//! This module provides:
//! - [`Ability`] and its costs and requirements
//! - [`AbilityCatalog`], the table of abilities an actor has learned
//! - [`UsageError`], the recoverable reasons an action can be refused
//! - [`AbilityOutcome`], what a use produced
//!
//! Resolution against an actor (cooldowns, costs, damage) lives on
//! [`Actor`](crate::actor::Actor).

use crate::combat_stats::StatKind;
use crate::damage_calc::DamageType;
use crate::status_effect::{StatusEffect, StatusEffectDef};
use fable_common::{AbilityId, ActorId, DataError, ItemId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

// ============================================================================
// Usage Errors
// ============================================================================

/// Why an action was refused. Never fatal; the message is shown as-is.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum UsageError {
    /// The actor does not know this ability.
    #[error("Unknown ability `{0}`")]
    UnknownAbility(AbilityId),

    /// The ability is still cooling down.
    #[error("{name} will be ready in {remaining:.1}s")]
    OnCooldown {
        /// Ability display name.
        name: String,
        /// Seconds left.
        remaining: f64,
    },

    /// Not enough stamina.
    #[error("Not enough stamina ({available:.0}/{required:.0})")]
    InsufficientStamina {
        /// Stamina needed.
        required: f32,
        /// Stamina held.
        available: f32,
    },

    /// Not enough mana.
    #[error("Not enough mana ({available:.0}/{required:.0})")]
    InsufficientMana {
        /// Mana needed.
        required: f32,
        /// Mana held.
        available: f32,
    },

    /// A level, stat, skill or item requirement is unmet.
    #[error("Requirements not met: {0}")]
    RequirementsNotMet(String),

    /// The target is further away than the ability reaches.
    #[error("Target is out of range ({distance:.1} > {range:.1})")]
    OutOfRange {
        /// Distance to the target.
        distance: f32,
        /// Ability range.
        range: f32,
    },

    /// The item is not held or cannot be used.
    #[error("Cannot use item `{0}`")]
    ItemUnavailable(ItemId),

    /// The actor is dead.
    #[error("{0} cannot act while dead")]
    Dead(String),

    /// The action is not allowed during combat.
    #[error("Cannot do that during combat")]
    InCombat,
}

// ============================================================================
// Ability Data
// ============================================================================

/// Resources spent on use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbilityCost {
    /// Stamina cost.
    pub stamina: f32,
    /// Mana cost.
    pub mana: f32,
}

impl AbilityCost {
    /// Stamina-only cost.
    #[must_use]
    pub fn stamina(amount: f32) -> Self {
        Self {
            stamina: amount,
            mana: 0.0,
        }
    }

    /// Mana-only cost.
    #[must_use]
    pub fn mana(amount: f32) -> Self {
        Self {
            stamina: 0.0,
            mana: amount,
        }
    }
}

/// A skill identified by category and name, written `combat.melee`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SkillRef {
    /// Skill category.
    pub category: String,
    /// Skill name within the category.
    pub skill: String,
}

impl SkillRef {
    /// Create a skill reference.
    #[must_use]
    pub fn new(category: impl Into<String>, skill: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            skill: skill.into(),
        }
    }
}

impl std::fmt::Display for SkillRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.category, self.skill)
    }
}

impl TryFrom<String> for SkillRef {
    type Error = DataError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.split_once('.') {
            Some((category, skill)) if !category.is_empty() && !skill.is_empty() => {
                Ok(Self::new(category, skill))
            },
            _ => Err(DataError::InvalidValue {
                context: "skill reference".to_string(),
                field: "skill",
                reason: format!("`{value}` is not of the form category.skill"),
            }),
        }
    }
}

impl From<SkillRef> for String {
    fn from(skill: SkillRef) -> Self {
        skill.to_string()
    }
}

/// Conditions an actor must meet to use an ability.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Requirements {
    /// Minimum actor level.
    pub level: u32,
    /// Minimum live stat values.
    pub stats: BTreeMap<StatKind, f32>,
    /// Minimum skill levels.
    pub skills: BTreeMap<SkillRef, u32>,
    /// Items (and counts) that must be held.
    pub items: BTreeMap<ItemId, u32>,
}

impl Requirements {
    /// Whether nothing is required.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.level <= 1 && self.stats.is_empty() && self.skills.is_empty() && self.items.is_empty()
    }
}

/// A learned ability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ability {
    /// Unique identifier.
    pub id: AbilityId,
    /// Display name.
    pub name: String,
    /// Flavour text.
    #[serde(default)]
    pub description: String,
    /// Base damage (0 for utility abilities).
    pub damage: f32,
    /// Damage type.
    pub damage_type: DamageType,
    /// Cost paid on use.
    pub cost: AbilityCost,
    /// Seconds before reuse.
    pub cooldown: f64,
    /// Reach to the primary target; `None` is unlimited.
    pub range: Option<f32>,
    /// Radius around the impact point hitting secondary targets (0 = single target).
    pub area_of_effect: f32,
    /// Informational cast time in seconds.
    #[serde(default)]
    pub cast_time: f64,
    /// Skill that scales damage and gains experience on use.
    #[serde(default)]
    pub skill: Option<SkillRef>,
    /// Conditions for use.
    #[serde(default)]
    pub requirements: Requirements,
    /// Effects attached to the target, or to the user when there is none.
    #[serde(default)]
    pub effects: Vec<StatusEffect>,
    /// Effects always attached to the user.
    #[serde(default)]
    pub self_effects: Vec<StatusEffect>,
    /// Presentation descriptors passed through untouched.
    #[serde(default)]
    pub visual_effects: Vec<serde_json::Value>,
}

impl Ability {
    /// Create a free, instant, melee-range ability.
    #[must_use]
    pub fn new(id: impl Into<AbilityId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            damage: 0.0,
            damage_type: DamageType::Physical,
            cost: AbilityCost::default(),
            cooldown: 0.0,
            range: Some(1.0),
            area_of_effect: 0.0,
            cast_time: 0.0,
            skill: None,
            requirements: Requirements::default(),
            effects: Vec::new(),
            self_effects: Vec::new(),
            visual_effects: Vec::new(),
        }
    }

    /// Set damage and type.
    #[must_use]
    pub fn with_damage(mut self, damage: f32, damage_type: DamageType) -> Self {
        self.damage = damage;
        self.damage_type = damage_type;
        self
    }

    /// Set cost.
    #[must_use]
    pub fn with_cost(mut self, cost: AbilityCost) -> Self {
        self.cost = cost;
        self
    }

    /// Set cooldown in seconds.
    #[must_use]
    pub fn with_cooldown(mut self, seconds: f64) -> Self {
        self.cooldown = seconds;
        self
    }

    /// Set range (`None` for unlimited).
    #[must_use]
    pub fn with_range(mut self, range: Option<f32>) -> Self {
        self.range = range;
        self
    }

    /// Set area-of-effect radius.
    #[must_use]
    pub fn with_area(mut self, radius: f32) -> Self {
        self.area_of_effect = radius;
        self
    }

    /// Set the scaling skill.
    #[must_use]
    pub fn with_skill(mut self, skill: SkillRef) -> Self {
        self.skill = Some(skill);
        self
    }

    /// Set requirements.
    #[must_use]
    pub fn with_requirements(mut self, requirements: Requirements) -> Self {
        self.requirements = requirements;
        self
    }

    /// Attach an effect on use.
    #[must_use]
    pub fn with_effect(mut self, effect: StatusEffect) -> Self {
        self.effects.push(effect);
        self
    }

    /// Attach an effect to the user on use.
    #[must_use]
    pub fn with_self_effect(mut self, effect: StatusEffect) -> Self {
        self.self_effects.push(effect);
        self
    }

    /// Add a visual descriptor.
    #[must_use]
    pub fn with_visual(mut self, descriptor: serde_json::Value) -> Self {
        self.visual_effects.push(descriptor);
        self
    }

    /// Whether this ability hits an area.
    #[must_use]
    pub fn is_area(&self) -> bool {
        self.area_of_effect > 0.0
    }
}

// ============================================================================
// Definitions
// ============================================================================

/// Content form of an ability, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbilityDef {
    /// Display name (required).
    pub name: Option<String>,
    /// Flavour text.
    pub description: String,
    /// Base damage.
    pub damage: f32,
    /// Damage type label.
    pub damage_type: String,
    /// Resource cost.
    pub cost: AbilityCost,
    /// Cooldown in seconds.
    pub cooldown: f64,
    /// Range; `null` for unlimited.
    pub range: Option<f32>,
    /// Area radius.
    pub area_of_effect: f32,
    /// Cast time in seconds.
    pub cast_time: f64,
    /// Scaling skill.
    pub skill: Option<SkillRef>,
    /// Requirements by label.
    pub requirements: RequirementsDef,
    /// Effects applied on use.
    pub effects: Vec<StatusEffectDef>,
    /// Effects applied to the user.
    pub self_effects: Vec<StatusEffectDef>,
    /// Presentation descriptors.
    pub visual_effects: Vec<serde_json::Value>,
}

impl Default for AbilityDef {
    fn default() -> Self {
        Self {
            name: None,
            description: String::new(),
            damage: 0.0,
            damage_type: DamageType::Physical.name().to_string(),
            cost: AbilityCost::default(),
            cooldown: 0.0,
            range: Some(1.0),
            area_of_effect: 0.0,
            cast_time: 0.0,
            skill: None,
            requirements: RequirementsDef::default(),
            effects: Vec::new(),
            self_effects: Vec::new(),
            visual_effects: Vec::new(),
        }
    }
}

/// Content form of [`Requirements`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequirementsDef {
    /// Minimum level.
    pub level: u32,
    /// Stat name to minimum.
    pub stats: BTreeMap<String, f32>,
    /// Category to skill to minimum level.
    pub skills: BTreeMap<String, BTreeMap<String, u32>>,
    /// Item id to count.
    pub items: BTreeMap<String, u32>,
}

impl RequirementsDef {
    fn build(&self, context: &str) -> Result<Requirements, DataError> {
        let mut stats = BTreeMap::new();
        for (name, value) in &self.stats {
            let kind = StatKind::from_name(name).ok_or_else(|| DataError::UnknownStat {
                context: context.to_string(),
                name: name.clone(),
            })?;
            stats.insert(kind, *value);
        }
        let skills = self
            .skills
            .iter()
            .flat_map(|(category, skills)| {
                skills
                    .iter()
                    .map(move |(skill, level)| (SkillRef::new(category.clone(), skill.clone()), *level))
            })
            .collect();
        let items = self
            .items
            .iter()
            .map(|(id, count)| (ItemId::new(id.clone()), *count))
            .collect();
        Ok(Requirements {
            level: self.level,
            stats,
            skills,
            items,
        })
    }
}

impl AbilityDef {
    /// Validate into an [`Ability`] with the given id.
    pub fn build(&self, id: &str) -> Result<Ability, DataError> {
        let context = format!("ability {id}");
        let name = self.name.clone().ok_or_else(|| DataError::MissingField {
            context: context.clone(),
            field: "name",
        })?;
        let damage_type =
            DamageType::from_name(&self.damage_type).ok_or_else(|| DataError::UnknownVariant {
                context: context.clone(),
                kind: "damage type",
                value: self.damage_type.clone(),
            })?;

        for (field, value) in [
            ("damage", self.damage),
            ("cost.stamina", self.cost.stamina),
            ("cost.mana", self.cost.mana),
            ("area_of_effect", self.area_of_effect),
        ] {
            if value < 0.0 || !value.is_finite() {
                return Err(DataError::InvalidValue {
                    context,
                    field,
                    reason: format!("{value} must be a finite non-negative number"),
                });
            }
        }
        if self.cooldown < 0.0 || !self.cooldown.is_finite() {
            return Err(DataError::InvalidValue {
                context,
                field: "cooldown",
                reason: format!("{} must be a finite non-negative number", self.cooldown),
            });
        }
        if matches!(self.range, Some(r) if r < 0.0) {
            return Err(DataError::InvalidValue {
                context,
                field: "range",
                reason: "must not be negative".to_string(),
            });
        }

        let effects = self
            .effects
            .iter()
            .map(StatusEffectDef::build)
            .collect::<Result<Vec<_>, _>>()?;
        let self_effects = self
            .self_effects
            .iter()
            .map(StatusEffectDef::build)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Ability {
            id: AbilityId::new(id),
            name,
            description: self.description.clone(),
            damage: self.damage,
            damage_type,
            cost: self.cost,
            cooldown: self.cooldown,
            range: self.range,
            area_of_effect: self.area_of_effect,
            cast_time: self.cast_time,
            skill: self.skill.clone(),
            requirements: self.requirements.build(&context)?,
            effects,
            self_effects,
            visual_effects: self.visual_effects.clone(),
        })
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// Abilities an actor knows, keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AbilityCatalog {
    abilities: BTreeMap<AbilityId, Ability>,
}

impl AbilityCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from validated definitions keyed by id.
    pub fn from_defs(defs: &BTreeMap<String, AbilityDef>) -> Result<Self, DataError> {
        let mut catalog = Self::new();
        for (id, def) in defs {
            catalog.learn(def.build(id)?);
        }
        Ok(catalog)
    }

    /// Parse a JSON object of id to definition.
    pub fn from_json_str(text: &str) -> Result<Self, DataError> {
        let defs: BTreeMap<String, AbilityDef> =
            serde_json::from_str(text).map_err(|e| DataError::Parse(e.to_string()))?;
        Self::from_defs(&defs)
    }

    /// Parse a RON map of id to definition.
    pub fn from_ron_str(text: &str) -> Result<Self, DataError> {
        let defs: BTreeMap<String, AbilityDef> =
            ron::from_str(text).map_err(|e| DataError::Parse(e.to_string()))?;
        Self::from_defs(&defs)
    }

    /// Add (or replace) an ability.
    pub fn learn(&mut self, ability: Ability) -> Option<Ability> {
        self.abilities.insert(ability.id.clone(), ability)
    }

    /// Remove an ability.
    pub fn forget(&mut self, id: &str) -> Option<Ability> {
        self.abilities.remove(id)
    }

    /// Look up an ability.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Ability> {
        self.abilities.get(id)
    }

    /// Whether the ability is known.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.abilities.contains_key(id)
    }

    /// Iterate over known abilities in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Ability> {
        self.abilities.values()
    }

    /// Known ability ids in order.
    pub fn ids(&self) -> impl Iterator<Item = &AbilityId> {
        self.abilities.keys()
    }

    /// Number of abilities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.abilities.len()
    }

    /// Whether no abilities are known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.abilities.is_empty()
    }
}

// ============================================================================
// Outcomes
// ============================================================================

/// One observable consequence of an ability use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AbilityEffect {
    /// Damage landed on an actor.
    Damage {
        /// Who was hit.
        target: ActorId,
        /// Health removed.
        amount: f32,
        /// Critical hit.
        critical: bool,
        /// Secondary area hit.
        aoe: bool,
    },
    /// A status effect was attached.
    Status {
        /// Who received it.
        target: ActorId,
        /// Effect name.
        effect: String,
    },
    /// The user's linked skill gained a level.
    SkillUp {
        /// Skill that advanced.
        skill: SkillRef,
        /// New level.
        level: u32,
        /// Abilities unlocked by the advance.
        unlocked: Vec<AbilityId>,
    },
    /// A presentation descriptor.
    Visual {
        /// Descriptor as authored.
        descriptor: serde_json::Value,
    },
}

/// Result of [`Actor::use_ability`](crate::actor::Actor::use_ability).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilityOutcome {
    /// Whether the ability took effect.
    pub success: bool,
    /// Human-readable summary.
    pub message: String,
    /// Consequences in order.
    pub effects: Vec<AbilityEffect>,
    /// Why the use was refused, if it was.
    pub error: Option<UsageError>,
}

impl AbilityOutcome {
    /// A refused use; nothing was spent.
    #[must_use]
    pub fn refused(error: UsageError) -> Self {
        Self {
            success: false,
            message: error.to_string(),
            effects: Vec::new(),
            error: Some(error),
        }
    }

    /// A use that resolved.
    #[must_use]
    pub fn succeeded(message: String, effects: Vec<AbilityEffect>) -> Self {
        Self {
            success: true,
            message,
            effects,
            error: None,
        }
    }

    /// A use whose primary hit was evaded. Cost and cooldown still apply.
    #[must_use]
    pub fn evaded(message: String) -> Self {
        Self {
            success: false,
            message,
            effects: Vec::new(),
            error: None,
        }
    }

    /// Abilities unlocked by the skill experience this use granted.
    pub fn unlocked(&self) -> impl Iterator<Item = &AbilityId> {
        self.effects.iter().flat_map(|e| match e {
            AbilityEffect::SkillUp { unlocked, .. } => unlocked.as_slice(),
            _ => &[][..],
        })
    }

    /// Total damage across all hits.
    #[must_use]
    pub fn total_damage(&self) -> f32 {
        self.effects
            .iter()
            .map(|e| match e {
                AbilityEffect::Damage { amount, .. } => *amount,
                _ => 0.0,
            })
            .sum()
    }
}

/// Snapshot of an ability as seen by one actor at one time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilityInfo {
    /// The ability.
    pub ability: Ability,
    /// Seconds until ready (0 when ready).
    pub cooldown_remaining: f64,
    /// Whether it can be used now.
    pub can_use: bool,
    /// Why not, when it cannot.
    pub reason: Option<String>,
    /// Damage after the actor's skill scaling.
    pub modified_damage: f32,
}
