//! Combat stats system.
//!
//! This module provides:
//! - The closed set of stat names ([`StatKind`]) and regenerating resources
//! - [`StatBlock`], the bounded numeric record every actor owns
//! - [`CombatStatistics`], the running tallies kept per actor

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Stat names
// ============================================================================

/// Every stat a [`StatBlock`] holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatKind {
    /// Current health.
    Health,
    /// Upper bound for health.
    MaxHealth,
    /// Current stamina.
    Stamina,
    /// Upper bound for stamina.
    MaxStamina,
    /// Current mana.
    Mana,
    /// Upper bound for mana.
    MaxMana,
    /// Physical power.
    Strength,
    /// Damage mitigation.
    Defense,
    /// Agility.
    Agility,
    /// Magical power.
    Intelligence,
    /// Base critical hit chance (0.0-1.0).
    CriticalChance,
    /// Base dodge chance (0.0-1.0).
    DodgeChance,
}

impl StatKind {
    /// All stat kinds in declaration order.
    pub const ALL: [Self; 12] = [
        Self::Health,
        Self::MaxHealth,
        Self::Stamina,
        Self::MaxStamina,
        Self::Mana,
        Self::MaxMana,
        Self::Strength,
        Self::Defense,
        Self::Agility,
        Self::Intelligence,
        Self::CriticalChance,
        Self::DodgeChance,
    ];

    /// Snake-case name used in content files.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Health => "health",
            Self::MaxHealth => "max_health",
            Self::Stamina => "stamina",
            Self::MaxStamina => "max_stamina",
            Self::Mana => "mana",
            Self::MaxMana => "max_mana",
            Self::Strength => "strength",
            Self::Defense => "defense",
            Self::Agility => "agility",
            Self::Intelligence => "intelligence",
            Self::CriticalChance => "critical_chance",
            Self::DodgeChance => "dodge_chance",
        }
    }

    /// Look up a stat by its content name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Whether this stat is an upper bound for another.
    #[must_use]
    pub fn is_max(self) -> bool {
        matches!(self, Self::MaxHealth | Self::MaxStamina | Self::MaxMana)
    }

    /// Whether this stat is a probability.
    #[must_use]
    pub fn is_chance(self) -> bool {
        matches!(self, Self::CriticalChance | Self::DodgeChance)
    }

    /// The bound for a bounded stat, or the bounded stat for a max stat.
    #[must_use]
    pub fn counterpart(self) -> Option<Self> {
        match self {
            Self::Health => Some(Self::MaxHealth),
            Self::MaxHealth => Some(Self::Health),
            Self::Stamina => Some(Self::MaxStamina),
            Self::MaxStamina => Some(Self::Stamina),
            Self::Mana => Some(Self::MaxMana),
            Self::MaxMana => Some(Self::Mana),
            _ => None,
        }
    }
}

impl fmt::Display for StatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pools that regenerate and can be restored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    /// Health pool.
    Health,
    /// Stamina pool.
    Stamina,
    /// Mana pool.
    Mana,
}

impl Resource {
    /// All resources.
    pub const ALL: [Self; 3] = [Self::Health, Self::Stamina, Self::Mana];

    /// The stat holding the current value.
    #[must_use]
    pub fn current(self) -> StatKind {
        match self {
            Self::Health => StatKind::Health,
            Self::Stamina => StatKind::Stamina,
            Self::Mana => StatKind::Mana,
        }
    }

    /// The stat holding the upper bound.
    #[must_use]
    pub fn max(self) -> StatKind {
        match self {
            Self::Health => StatKind::MaxHealth,
            Self::Stamina => StatKind::MaxStamina,
            Self::Mana => StatKind::MaxMana,
        }
    }

    /// Content name.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.current().name()
    }

    /// Look up a resource by content name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.name() == name)
    }
}

// ============================================================================
// Stat block
// ============================================================================

/// Numeric attributes of an actor.
///
/// Every write goes through [`StatBlock::set`], which keeps bounded stats in
/// `[0, max]`, max stats at `>= 1`, chances in `[0, 1]` and everything else
/// non-negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatBlock {
    health: f32,
    max_health: f32,
    stamina: f32,
    max_stamina: f32,
    mana: f32,
    max_mana: f32,
    strength: f32,
    defense: f32,
    agility: f32,
    intelligence: f32,
    critical_chance: f32,
    dodge_chance: f32,
}

impl Default for StatBlock {
    fn default() -> Self {
        Self {
            health: 100.0,
            max_health: 100.0,
            stamina: 100.0,
            max_stamina: 100.0,
            mana: 0.0,
            max_mana: 1.0,
            strength: 10.0,
            defense: 5.0,
            agility: 10.0,
            intelligence: 10.0,
            critical_chance: 0.05,
            dodge_chance: 0.05,
        }
    }
}

impl StatBlock {
    /// Create stats with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set health and max health.
    #[must_use]
    pub fn with_health(mut self, health: f32) -> Self {
        self.set(StatKind::MaxHealth, health);
        self.set(StatKind::Health, health);
        self
    }

    /// Set stamina and max stamina.
    #[must_use]
    pub fn with_stamina(mut self, stamina: f32) -> Self {
        self.set(StatKind::MaxStamina, stamina);
        self.set(StatKind::Stamina, stamina);
        self
    }

    /// Set mana and max mana.
    #[must_use]
    pub fn with_mana(mut self, mana: f32) -> Self {
        self.set(StatKind::MaxMana, mana);
        self.set(StatKind::Mana, mana);
        self
    }

    /// Set any single stat (clamped).
    #[must_use]
    pub fn with(mut self, kind: StatKind, value: f32) -> Self {
        self.set(kind, value);
        self
    }

    /// Read a stat.
    #[must_use]
    pub fn get(&self, kind: StatKind) -> f32 {
        match kind {
            StatKind::Health => self.health,
            StatKind::MaxHealth => self.max_health,
            StatKind::Stamina => self.stamina,
            StatKind::MaxStamina => self.max_stamina,
            StatKind::Mana => self.mana,
            StatKind::MaxMana => self.max_mana,
            StatKind::Strength => self.strength,
            StatKind::Defense => self.defense,
            StatKind::Agility => self.agility,
            StatKind::Intelligence => self.intelligence,
            StatKind::CriticalChance => self.critical_chance,
            StatKind::DodgeChance => self.dodge_chance,
        }
    }

    fn slot(&mut self, kind: StatKind) -> &mut f32 {
        match kind {
            StatKind::Health => &mut self.health,
            StatKind::MaxHealth => &mut self.max_health,
            StatKind::Stamina => &mut self.stamina,
            StatKind::MaxStamina => &mut self.max_stamina,
            StatKind::Mana => &mut self.mana,
            StatKind::MaxMana => &mut self.max_mana,
            StatKind::Strength => &mut self.strength,
            StatKind::Defense => &mut self.defense,
            StatKind::Agility => &mut self.agility,
            StatKind::Intelligence => &mut self.intelligence,
            StatKind::CriticalChance => &mut self.critical_chance,
            StatKind::DodgeChance => &mut self.dodge_chance,
        }
    }

    /// Write a stat, clamping it into its valid range.
    ///
    /// Lowering a max stat pulls its bounded counterpart down with it.
    /// Returns the value actually stored.
    pub fn set(&mut self, kind: StatKind, value: f32) -> f32 {
        let value = if value.is_nan() { 0.0 } else { value };
        let clamped = if kind.is_max() {
            value.max(1.0)
        } else if kind.is_chance() {
            value.clamp(0.0, 1.0)
        } else if let Some(max) = kind.counterpart() {
            value.clamp(0.0, self.get(max))
        } else {
            value.max(0.0)
        };
        *self.slot(kind) = clamped;

        if kind.is_max() {
            if let Some(bounded) = kind.counterpart() {
                let current = self.get(bounded);
                if current > clamped {
                    *self.slot(bounded) = clamped;
                }
            }
        }
        clamped
    }

    /// Apply an additive or percentage change to a stat.
    ///
    /// Percentages compose as `value * (1 + delta)`. Returns the change that
    /// was actually written after clamping.
    pub fn modify_stat(&mut self, kind: StatKind, value: f32, is_percentage: bool) -> f32 {
        let old = self.get(kind);
        let target = if is_percentage {
            old * (1.0 + value)
        } else {
            old + value
        };
        self.set(kind, target) - old
    }

    /// Current value of a resource.
    #[must_use]
    pub fn resource(&self, resource: Resource) -> f32 {
        self.get(resource.current())
    }

    /// Maximum of a resource.
    #[must_use]
    pub fn resource_max(&self, resource: Resource) -> f32 {
        self.get(resource.max())
    }

    /// Resource as a fraction of its maximum (0.0-1.0).
    #[must_use]
    pub fn fraction(&self, resource: Resource) -> f32 {
        let max = self.resource_max(resource);
        if max <= 0.0 {
            0.0
        } else {
            (self.resource(resource) / max).clamp(0.0, 1.0)
        }
    }

    /// Add to a resource, capped at its maximum. Returns the amount gained.
    pub fn restore(&mut self, resource: Resource, amount: f32) -> f32 {
        if amount <= 0.0 {
            return 0.0;
        }
        self.modify_stat(resource.current(), amount, false)
    }

    /// Spend a resource if enough is available.
    pub fn consume(&mut self, resource: Resource, amount: f32) -> bool {
        if self.resource(resource) + f32::EPSILON < amount {
            return false;
        }
        self.modify_stat(resource.current(), -amount, false);
        true
    }

    /// Set a resource to a fraction of its maximum.
    pub fn set_fraction(&mut self, resource: Resource, fraction: f32) {
        let max = self.resource_max(resource);
        self.set(resource.current(), max * fraction.clamp(0.0, 1.0));
    }

    /// Fill every resource to its maximum.
    pub fn restore_all(&mut self) {
        for resource in Resource::ALL {
            self.set_fraction(resource, 1.0);
        }
    }

    /// Current health.
    #[must_use]
    pub fn health(&self) -> f32 {
        self.health
    }

    /// Maximum health.
    #[must_use]
    pub fn max_health(&self) -> f32 {
        self.max_health
    }

    /// Current stamina.
    #[must_use]
    pub fn stamina(&self) -> f32 {
        self.stamina
    }

    /// Current mana.
    #[must_use]
    pub fn mana(&self) -> f32 {
        self.mana
    }

    /// Strength.
    #[must_use]
    pub fn strength(&self) -> f32 {
        self.strength
    }

    /// Defense.
    #[must_use]
    pub fn defense(&self) -> f32 {
        self.defense
    }

    /// Intelligence.
    #[must_use]
    pub fn intelligence(&self) -> f32 {
        self.intelligence
    }

    /// Base critical chance.
    #[must_use]
    pub fn critical_chance(&self) -> f32 {
        self.critical_chance
    }

    /// Base dodge chance.
    #[must_use]
    pub fn dodge_chance(&self) -> f32 {
        self.dodge_chance
    }

    /// Bring every field back inside its bounds.
    ///
    /// Deserialized blocks may come from hand-written data.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        for kind in [StatKind::MaxHealth, StatKind::MaxStamina, StatKind::MaxMana] {
            let value = self.get(kind);
            self.set(kind, value);
        }
        for kind in StatKind::ALL.into_iter().filter(|k| !k.is_max()) {
            let value = self.get(kind);
            self.set(kind, value);
        }
        self
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Running combat tallies for one actor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatStatistics {
    /// Total damage dealt to others.
    pub damage_dealt: f32,
    /// Total damage received.
    pub damage_taken: f32,
    /// Total healing received.
    pub healing_done: f32,
    /// Largest single hit dealt.
    pub highest_damage: f32,
    /// Critical hits landed.
    pub critical_hits: u32,
    /// Attacks dodged.
    pub dodges: u32,
    /// Actors killed.
    pub kills: u32,
    /// Times died.
    pub deaths: u32,
    /// Abilities successfully used.
    pub abilities_used: u32,
    /// Longest chain of consecutive landed basic attacks.
    pub highest_combo: u32,
}

impl CombatStatistics {
    /// Record an outgoing hit.
    pub fn record_hit(&mut self, damage: f32, critical: bool) {
        self.damage_dealt += damage;
        if damage > self.highest_damage {
            self.highest_damage = damage;
        }
        if critical {
            self.critical_hits += 1;
        }
    }

    /// Record a combo length, keeping the best.
    pub fn record_combo(&mut self, combo: u32) {
        self.highest_combo = self.highest_combo.max(combo);
    }
}
