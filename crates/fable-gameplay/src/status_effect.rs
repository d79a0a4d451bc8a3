//! Status effects.
//!
//! A [`StatusEffect`] is a named bundle of modifiers attached to an actor for a
//! number of update steps (or permanently). Buffs and debuffs change the
//! actor's [`StatBlock`] while attached; periodic effects (damage over time,
//! healing over time, resource regeneration) leave the block alone and act on
//! each tick instead.
//!
//! Modifier keys that are not stats (dodge bonus, damage taken, ...) are never
//! written anywhere; the actor reads them from its active effects when it
//! rolls or computes damage.

use crate::combat_stats::{Resource, StatBlock, StatKind};
use fable_common::{DataError, SimTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Vocabulary
// ============================================================================

/// Broad behaviour of an effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectCategory {
    /// Beneficial stat change.
    Buff,
    /// Harmful stat change.
    Debuff,
    /// Damage over time.
    Dot,
    /// Healing over time.
    Hot,
    /// Resource restoration over time.
    ResourceRegen,
}

impl EffectCategory {
    /// Content name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Buff => "buff",
            Self::Debuff => "debuff",
            Self::Dot => "dot",
            Self::Hot => "hot",
            Self::ResourceRegen => "resource_regen",
        }
    }

    /// Look up a category by content name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        [
            Self::Buff,
            Self::Debuff,
            Self::Dot,
            Self::Hot,
            Self::ResourceRegen,
        ]
        .into_iter()
        .find(|c| c.name() == name)
    }

    /// Whether the effect acts on ticks rather than on attachment.
    #[must_use]
    pub fn is_periodic(self) -> bool {
        matches!(self, Self::Dot | Self::Hot | Self::ResourceRegen)
    }
}

/// What a single modifier entry targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ModifierKey {
    /// A stat in the block.
    Stat(StatKind),
    /// Added to dodge chance.
    DodgeBonus,
    /// Added to critical chance.
    CritChanceBonus,
    /// Added to the critical damage multiplier.
    CritDamageBonus,
    /// Incoming damage is multiplied by `1 + value`.
    DamageTakenModifier,
    /// Added to the outgoing damage multiplier.
    DamageDealtModifier,
    /// Incoming healing is multiplied by `1 + value`.
    HealingReceivedModifier,
    /// Regeneration of a resource is multiplied by `1 + value`.
    Regeneration(Resource),
}

impl ModifierKey {
    const REGEN_PREFIX: &'static str = "regeneration:";

    /// Parse a content key.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        if let Some(kind) = StatKind::from_name(name) {
            return Some(Self::Stat(kind));
        }
        if let Some(resource) = name.strip_prefix(Self::REGEN_PREFIX) {
            return Resource::from_name(resource).map(Self::Regeneration);
        }
        match name {
            "dodge_bonus" => Some(Self::DodgeBonus),
            "crit_chance_bonus" => Some(Self::CritChanceBonus),
            "crit_damage_bonus" => Some(Self::CritDamageBonus),
            "damage_taken_modifier" => Some(Self::DamageTakenModifier),
            "damage_dealt_modifier" => Some(Self::DamageDealtModifier),
            "healing_received_modifier" => Some(Self::HealingReceivedModifier),
            _ => None,
        }
    }

    /// Parse a content key, reporting unknown names.
    pub fn parse_in(context: &str, name: &str) -> Result<Self, DataError> {
        Self::parse(name).ok_or_else(|| DataError::UnknownStat {
            context: context.to_string(),
            name: name.to_string(),
        })
    }
}

impl fmt::Display for ModifierKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stat(kind) => f.write_str(kind.name()),
            Self::DodgeBonus => f.write_str("dodge_bonus"),
            Self::CritChanceBonus => f.write_str("crit_chance_bonus"),
            Self::CritDamageBonus => f.write_str("crit_damage_bonus"),
            Self::DamageTakenModifier => f.write_str("damage_taken_modifier"),
            Self::DamageDealtModifier => f.write_str("damage_dealt_modifier"),
            Self::HealingReceivedModifier => f.write_str("healing_received_modifier"),
            Self::Regeneration(resource) => write!(f, "{}{}", Self::REGEN_PREFIX, resource.name()),
        }
    }
}

impl TryFrom<String> for ModifierKey {
    type Error = DataError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse_in("modifier", &value)
    }
}

impl From<ModifierKey> for String {
    fn from(key: ModifierKey) -> Self {
        key.to_string()
    }
}

/// How long an effect lasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectDuration {
    /// Remaining update steps.
    Turns(u32),
    /// Never expires on its own.
    Permanent,
}

impl EffectDuration {
    fn longer(self, other: Self) -> Self {
        match (self, other) {
            (Self::Permanent, _) | (_, Self::Permanent) => Self::Permanent,
            (Self::Turns(a), Self::Turns(b)) => Self::Turns(a.max(b)),
        }
    }
}

/// What advancing an effect by one step produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectStep {
    /// Nothing happened this step.
    Idle,
    /// The tick interval elapsed.
    Tick,
    /// The duration ran out; the effect must be removed.
    Expired,
}

// ============================================================================
// Status Effect
// ============================================================================

/// A timed or permanent modifier bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEffect {
    /// Identifying name. Non-stacking effects are unique by name.
    pub name: String,
    /// Behaviour category.
    pub category: EffectCategory,
    /// Modifier magnitudes.
    pub modifiers: BTreeMap<ModifierKey, f32>,
    /// Remaining lifetime.
    pub duration: EffectDuration,
    /// Seconds between ticks.
    pub tick_interval: f64,
    /// Time of the last tick (or of attachment).
    pub last_tick: SimTime,
    /// Flavour text.
    #[serde(default)]
    pub description: String,
    /// Whether several instances may coexist.
    #[serde(default)]
    pub can_stack: bool,
    /// Whether the bearer loses its turn while this is active.
    #[serde(default)]
    pub stuns: bool,
    /// Icon identifier for the presentation layer.
    #[serde(default)]
    pub icon: String,
    /// Stat changes written on attachment, in order.
    #[serde(default)]
    applied: Vec<(StatKind, f32)>,
}

impl StatusEffect {
    /// Create an effect lasting one step with no modifiers.
    #[must_use]
    pub fn new(name: impl Into<String>, category: EffectCategory) -> Self {
        Self {
            name: name.into(),
            category,
            modifiers: BTreeMap::new(),
            duration: EffectDuration::Turns(1),
            tick_interval: 1.0,
            last_tick: 0.0,
            description: String::new(),
            can_stack: false,
            stuns: false,
            icon: String::new(),
            applied: Vec::new(),
        }
    }

    /// Add a modifier.
    #[must_use]
    pub fn with_modifier(mut self, key: ModifierKey, value: f32) -> Self {
        self.modifiers.insert(key, value);
        self
    }

    /// Add a stat modifier.
    #[must_use]
    pub fn with_stat(self, kind: StatKind, value: f32) -> Self {
        self.with_modifier(ModifierKey::Stat(kind), value)
    }

    /// Set duration in steps.
    #[must_use]
    pub fn with_duration(mut self, turns: u32) -> Self {
        self.duration = EffectDuration::Turns(turns);
        self
    }

    /// Make the effect permanent.
    #[must_use]
    pub fn permanent(mut self) -> Self {
        self.duration = EffectDuration::Permanent;
        self
    }

    /// Set tick interval.
    #[must_use]
    pub fn with_tick_interval(mut self, seconds: f64) -> Self {
        self.tick_interval = seconds;
        self
    }

    /// Allow multiple instances.
    #[must_use]
    pub fn stacking(mut self) -> Self {
        self.can_stack = true;
        self
    }

    /// Make the bearer skip turns.
    #[must_use]
    pub fn stunning(mut self) -> Self {
        self.stuns = true;
        self
    }

    /// Set description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Whether the effect never expires.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        matches!(self.duration, EffectDuration::Permanent)
    }

    /// Remaining steps, `None` for permanent effects.
    #[must_use]
    pub fn remaining(&self) -> Option<u32> {
        match self.duration {
            EffectDuration::Turns(n) => Some(n),
            EffectDuration::Permanent => None,
        }
    }

    /// Value of one modifier (0 if absent).
    #[must_use]
    pub fn modifier(&self, key: ModifierKey) -> f32 {
        self.modifiers.get(&key).copied().unwrap_or(0.0)
    }

    /// Strength used to compare duplicates: `Σ|modifier|`.
    #[must_use]
    pub fn magnitude(&self) -> f32 {
        self.modifiers.values().map(|v| v.abs()).sum()
    }

    /// Amount dealt or healed per tick: `|Σ stat modifiers|`.
    #[must_use]
    pub fn tick_amount(&self) -> f32 {
        self.modifiers
            .iter()
            .filter(|(key, _)| matches!(key, ModifierKey::Stat(_)))
            .map(|(_, v)| *v)
            .sum::<f32>()
            .abs()
    }

    /// Per-resource amounts restored by a regeneration tick.
    pub fn restorations(&self) -> impl Iterator<Item = (Resource, f32)> + '_ {
        self.modifiers.iter().filter_map(|(key, value)| match key {
            ModifierKey::Stat(StatKind::Health) => Some((Resource::Health, *value)),
            ModifierKey::Stat(StatKind::Stamina) => Some((Resource::Stamina, *value)),
            ModifierKey::Stat(StatKind::Mana) => Some((Resource::Mana, *value)),
            _ => None,
        })
    }

    /// Whether stat changes are currently written to a block.
    #[must_use]
    pub fn is_applied(&self) -> bool {
        !self.applied.is_empty()
    }

    /// Write this effect's stat modifiers to `stats` as percentages.
    ///
    /// Periodic effects write nothing. Applying twice is a no-op.
    pub fn apply(&mut self, stats: &mut StatBlock) {
        if self.category.is_periodic() || self.is_applied() {
            return;
        }
        for (key, value) in &self.modifiers {
            if let ModifierKey::Stat(kind) = *key {
                let delta = stats.modify_stat(kind, *value, true);
                self.applied.push((kind, delta));
            }
        }
    }

    /// Revert exactly what [`apply`](Self::apply) wrote.
    pub fn remove(&mut self, stats: &mut StatBlock) {
        for (kind, delta) in self.applied.drain(..).rev() {
            stats.modify_stat(kind, -delta, false);
        }
    }

    /// Mark attachment time so the first tick comes one interval later.
    pub fn attach_at(&mut self, now: SimTime) {
        self.last_tick = now;
    }

    /// Advance by one update step.
    ///
    /// The duration is decremented first; an effect whose counter reaches zero
    /// expires without ticking.
    pub fn advance(&mut self, now: SimTime) -> EffectStep {
        if let EffectDuration::Turns(n) = self.duration {
            let left = n.saturating_sub(1);
            self.duration = EffectDuration::Turns(left);
            if left == 0 {
                return EffectStep::Expired;
            }
        }
        if now - self.last_tick >= self.tick_interval {
            self.last_tick = now;
            EffectStep::Tick
        } else {
            EffectStep::Idle
        }
    }

    /// Merge a non-stacking duplicate into this instance.
    ///
    /// Returns `true` when `incoming` is stronger and should replace this one;
    /// otherwise this instance keeps the longer duration.
    pub fn absorb(&mut self, incoming: &StatusEffect) -> bool {
        if incoming.magnitude() > self.magnitude() {
            return true;
        }
        self.duration = self.duration.longer(incoming.duration);
        false
    }
}

// ============================================================================
// Definitions
// ============================================================================

/// Content form of a status effect, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusEffectDef {
    /// Effect name (required).
    pub name: Option<String>,
    /// Category label (required).
    #[serde(alias = "type")]
    pub category: Option<String>,
    /// Modifier key to magnitude.
    pub stat_modifiers: BTreeMap<String, f32>,
    /// Duration in steps (required unless permanent).
    pub duration: Option<u32>,
    /// Seconds between ticks.
    pub tick_interval: f64,
    /// Flavour text.
    pub description: String,
    /// Never expires.
    pub is_permanent: bool,
    /// Allows multiple instances.
    pub can_stack: bool,
    /// Bearer skips turns.
    pub stuns: bool,
    /// Icon identifier.
    pub icon: String,
}

impl Default for StatusEffectDef {
    fn default() -> Self {
        Self {
            name: None,
            category: None,
            stat_modifiers: BTreeMap::new(),
            duration: None,
            tick_interval: 1.0,
            description: String::new(),
            is_permanent: false,
            can_stack: false,
            stuns: false,
            icon: String::new(),
        }
    }
}

impl StatusEffectDef {
    /// Validate into a [`StatusEffect`].
    pub fn build(&self) -> Result<StatusEffect, DataError> {
        let name = self.name.clone().ok_or_else(|| DataError::MissingField {
            context: "status effect".to_string(),
            field: "name",
        })?;
        let context = format!("effect {name}");

        let label = self.category.as_deref().ok_or_else(|| DataError::MissingField {
            context: context.clone(),
            field: "type",
        })?;
        let category = EffectCategory::from_name(label).ok_or_else(|| DataError::UnknownVariant {
            context: context.clone(),
            kind: "effect category",
            value: label.to_string(),
        })?;

        let duration = if self.is_permanent {
            EffectDuration::Permanent
        } else {
            match self.duration {
                None => {
                    return Err(DataError::MissingField {
                        context,
                        field: "duration",
                    })
                },
                Some(0) => {
                    return Err(DataError::InvalidValue {
                        context,
                        field: "duration",
                        reason: "must be at least one step".to_string(),
                    })
                },
                Some(n) => EffectDuration::Turns(n),
            }
        };

        if !(self.tick_interval > 0.0 && self.tick_interval.is_finite()) {
            return Err(DataError::InvalidValue {
                context,
                field: "tick_interval",
                reason: format!("{} is not a positive number of seconds", self.tick_interval),
            });
        }

        let mut modifiers = BTreeMap::new();
        for (key, value) in &self.stat_modifiers {
            modifiers.insert(ModifierKey::parse_in(&context, key)?, *value);
        }

        Ok(StatusEffect {
            name,
            category,
            modifiers,
            duration,
            tick_interval: self.tick_interval,
            last_tick: 0.0,
            description: self.description.clone(),
            can_stack: self.can_stack,
            stuns: self.stuns,
            icon: self.icon.clone(),
            applied: Vec::new(),
        })
    }
}
