//! Damage calculation system.
//!
//! This module provides:
//! - Damage types and which attribute empowers them
//! - Per-type resistances
//! - The incoming mitigation pipeline (resistance, taken modifiers, defense)
//! - Outgoing bonuses from strength and intelligence
//!
//! Rolls (dodge, critical) are made by the actor; everything here is pure.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ============================================================================
// Damage Types
// ============================================================================

/// Types of damage that can be dealt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageType {
    /// Weapons and fists. Empowered by strength.
    #[default]
    Physical,
    /// Raw arcane damage.
    Magical,
    /// Fire damage.
    Fire,
    /// Ice/frost damage.
    Frost,
    /// Lightning/electric damage.
    Lightning,
    /// Poison damage.
    Poison,
    /// Holy/light damage.
    Holy,
    /// Shadow damage.
    Shadow,
}

impl DamageType {
    /// All damage types.
    pub const ALL: [Self; 8] = [
        Self::Physical,
        Self::Magical,
        Self::Fire,
        Self::Frost,
        Self::Lightning,
        Self::Poison,
        Self::Holy,
        Self::Shadow,
    ];

    /// Content name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Physical => "physical",
            Self::Magical => "magical",
            Self::Fire => "fire",
            Self::Frost => "frost",
            Self::Lightning => "lightning",
            Self::Poison => "poison",
            Self::Holy => "holy",
            Self::Shadow => "shadow",
        }
    }

    /// Look up a damage type by content name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    /// Whether strength empowers this damage.
    #[must_use]
    pub fn is_physical(self) -> bool {
        matches!(self, Self::Physical)
    }

    /// Whether intelligence empowers this damage.
    #[must_use]
    pub fn is_magical(self) -> bool {
        matches!(
            self,
            Self::Magical | Self::Fire | Self::Frost | Self::Lightning | Self::Holy | Self::Shadow
        )
    }
}

impl fmt::Display for DamageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Resistance System
// ============================================================================

/// Resistances to different damage types.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resistances {
    /// Resistance values by damage type (0.0 = none, 1.0 = immune, negative = weakness).
    values: HashMap<DamageType, f32>,
}

impl Resistances {
    /// Create empty resistances.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set resistance for a damage type.
    pub fn set(&mut self, damage_type: DamageType, value: f32) {
        self.values.insert(damage_type, value.clamp(-1.0, 1.0));
    }

    /// Get resistance for a damage type.
    #[must_use]
    pub fn get(&self, damage_type: DamageType) -> f32 {
        self.values.get(&damage_type).copied().unwrap_or(0.0)
    }

    /// Add resistance (builder pattern).
    #[must_use]
    pub fn with_resistance(mut self, damage_type: DamageType, value: f32) -> Self {
        self.set(damage_type, value);
        self
    }

    /// Apply resistance to damage.
    #[must_use]
    pub fn apply(&self, damage: f32, damage_type: DamageType) -> f32 {
        (damage * (1.0 - self.get(damage_type))).max(0.0)
    }

    /// Check if immune to damage type.
    #[must_use]
    pub fn is_immune(&self, damage_type: DamageType) -> bool {
        self.get(damage_type) >= 1.0
    }

    /// Clamp values that came from hand-written data.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        for value in self.values.values_mut() {
            *value = value.clamp(-1.0, 1.0);
        }
        self
    }
}

// ============================================================================
// Strikes and Outcomes
// ============================================================================

/// An outgoing hit before the attacker's rolls and bonuses.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Strike {
    /// Base damage amount.
    pub base: f32,
    /// Damage type.
    pub damage_type: DamageType,
    /// Temporary defense added on the receiving side (e.g. a defensive stance).
    pub bonus_defense: f32,
    /// Extra multiplier on outgoing damage (e.g. a combo).
    pub multiplier: f32,
}

impl Strike {
    /// Create a plain strike.
    #[must_use]
    pub fn new(base: f32, damage_type: DamageType) -> Self {
        Self {
            base,
            damage_type,
            bonus_defense: 0.0,
            multiplier: 1.0,
        }
    }

    /// Add defense on the receiving side.
    #[must_use]
    pub fn with_bonus_defense(mut self, defense: f32) -> Self {
        self.bonus_defense = defense.max(0.0);
        self
    }

    /// Scale outgoing damage.
    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f32) -> Self {
        self.multiplier = multiplier.max(0.0);
        self
    }
}

/// What a single hit did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DamageOutcome {
    /// Health actually removed.
    pub amount: f32,
    /// The defender evaded the hit.
    pub dodged: bool,
    /// The hit was a critical.
    pub critical: bool,
}

impl DamageOutcome {
    /// Outcome for a hit that did nothing (dead participants).
    pub const NONE: Self = Self {
        amount: 0.0,
        dodged: false,
        critical: false,
    };

    /// Outcome for an evaded hit.
    #[must_use]
    pub fn dodged() -> Self {
        Self {
            dodged: true,
            ..Self::NONE
        }
    }

    /// Whether any damage landed.
    #[must_use]
    pub fn landed(&self) -> bool {
        !self.dodged && self.amount > 0.0
    }
}

// ============================================================================
// Damage Calculator
// ============================================================================

/// Pure damage formulas, parameterized by the defense scaling constant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageCalculator {
    /// Scaling factor for diminishing returns on defense.
    pub defense_scaling: f32,
}

impl Default for DamageCalculator {
    fn default() -> Self {
        Self {
            defense_scaling: 100.0,
        }
    }
}

impl DamageCalculator {
    /// Create a calculator with a specific defense scaling constant.
    #[must_use]
    pub fn new(defense_scaling: f32) -> Self {
        Self { defense_scaling }
    }

    /// Fraction of damage removed by defense.
    /// Formula: reduction = defense / (defense + scaling)
    #[must_use]
    pub fn defense_reduction(&self, defense: f32) -> f32 {
        if defense <= 0.0 {
            0.0
        } else {
            defense / (defense + self.defense_scaling)
        }
    }

    /// Damage actually taken from an incoming hit.
    ///
    /// Order: resistance, then the product of damage-taken modifiers, then
    /// defense. The result is rounded to one decimal and never negative.
    #[must_use]
    pub fn incoming(
        &self,
        base: f32,
        damage_type: DamageType,
        resistances: &Resistances,
        taken_multiplier: f32,
        defense: f32,
    ) -> f32 {
        let mut damage = resistances.apply(base, damage_type);
        damage *= taken_multiplier.max(0.0);
        damage *= 1.0 - self.defense_reduction(defense);
        round_tenth(damage).max(0.0)
    }

    /// Multiplier applied to outgoing damage.
    ///
    /// Physical damage gains `strength / 100`, magical schools gain
    /// `intelligence / 100`, and `dealt_bonus` is added on top.
    #[must_use]
    pub fn outgoing_multiplier(
        damage_type: DamageType,
        strength: f32,
        intelligence: f32,
        dealt_bonus: f32,
    ) -> f32 {
        let attribute = if damage_type.is_physical() {
            strength / 100.0
        } else if damage_type.is_magical() {
            intelligence / 100.0
        } else {
            0.0
        };
        (1.0 + attribute + dealt_bonus).max(0.0)
    }
}

/// Round to one decimal place.
#[must_use]
pub fn round_tenth(value: f32) -> f32 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_defense_reduction_curve() {
        let calc = DamageCalculator::default();
        assert_eq!(calc.defense_reduction(0.0), 0.0);
        assert!((calc.defense_reduction(100.0) - 0.5).abs() < 1e-6);
        assert!(calc.defense_reduction(1000.0) < 1.0);
    }

    #[test]
    fn test_reference_hit() {
        let calc = DamageCalculator::default();
        let damage = calc.incoming(50.0, DamageType::Physical, &Resistances::new(), 1.0, 5.0);
        assert!((damage - 47.6).abs() < 1e-4);
    }

    #[test]
    fn test_resistance_then_taken_modifier() {
        let calc = DamageCalculator::default();
        let res = Resistances::new().with_resistance(DamageType::Fire, 0.5);
        let damage = calc.incoming(100.0, DamageType::Fire, &res, 1.2, 0.0);
        assert!((damage - 60.0).abs() < 1e-4);
    }

    #[test]
    fn test_immunity_and_weakness() {
        let res = Resistances::new()
            .with_resistance(DamageType::Holy, 1.0)
            .with_resistance(DamageType::Shadow, -0.5);
        assert!(res.is_immune(DamageType::Holy));
        assert_eq!(res.apply(10.0, DamageType::Holy), 0.0);
        assert_eq!(res.apply(10.0, DamageType::Shadow), 15.0);
        assert_eq!(res.get(DamageType::Physical), 0.0);
    }

    #[test]
    fn test_resistance_clamped() {
        let res = Resistances::new().with_resistance(DamageType::Frost, 3.0);
        assert_eq!(res.get(DamageType::Frost), 1.0);
    }

    #[test]
    fn test_outgoing_attribute_bonus() {
        let physical = DamageCalculator::outgoing_multiplier(DamageType::Physical, 10.0, 50.0, 0.0);
        assert!((physical - 1.1).abs() < 1e-6);

        let fire = DamageCalculator::outgoing_multiplier(DamageType::Fire, 10.0, 50.0, 0.25);
        assert!((fire - 1.75).abs() < 1e-6);

        let poison = DamageCalculator::outgoing_multiplier(DamageType::Poison, 10.0, 50.0, 0.0);
        assert_eq!(poison, 1.0);
    }

    #[test]
    fn test_round_tenth() {
        assert_eq!(round_tenth(47.619), 47.6);
        assert_eq!(round_tenth(0.04), 0.0);
    }

    #[test]
    fn test_damage_type_names() {
        for t in DamageType::ALL {
            assert_eq!(DamageType::from_name(t.name()), Some(t));
        }
        assert!(DamageType::Lightning.is_magical());
        assert!(!DamageType::Poison.is_magical());
    }

    proptest! {
        #[test]
        fn prop_more_defense_means_less_damage(
            base in 1.0f32..10_000.0,
            defense in 0.0f32..500.0,
            extra in 1.0f32..500.0,
        ) {
            let calc = DamageCalculator::default();
            let res = Resistances::new();
            let before = defense_unrounded(&calc, base, defense);
            let after = defense_unrounded(&calc, base, defense + extra);
            prop_assert!(after < before);

            let rounded_before = calc.incoming(base, DamageType::Physical, &res, 1.0, defense);
            let rounded_after = calc.incoming(base, DamageType::Physical, &res, 1.0, defense + extra);
            prop_assert!(rounded_after <= rounded_before);
        }
    }

    fn defense_unrounded(calc: &DamageCalculator, base: f32, defense: f32) -> f32 {
        base * (1.0 - calc.defense_reduction(defense))
    }
}
