//! Collaborator interfaces.
//!
//! The simulation core never owns inventories, skill trees or a spatial
//! index. It talks to them through the traits here:
//! - [`EquipmentProvider`] for stat bonuses, weapons and consumables
//! - [`SkillProvider`] for skill levels (players only)
//! - [`SpatialQuery`] for area-of-effect targeting
//!
//! [`EquipmentSet`] is a ready-made shared equipment provider.

use crate::actor::Actor;
use crate::combat_stats::{Resource, StatKind};
use crate::status_effect::StatusEffect;
use fable_common::{ActorId, ItemId, Position};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Traits
// ============================================================================

/// Source of equipment bonuses and items for an actor.
pub trait EquipmentProvider {
    /// Additive stat bonuses from equipped items.
    fn equipment_modifiers(&self) -> BTreeMap<StatKind, f32>;

    /// Regeneration bonuses; each resource's rate is multiplied by `1 + value`.
    fn regeneration_modifiers(&self) -> BTreeMap<Resource, f32>;

    /// Damage of the equipped weapon, added to basic attacks.
    fn weapon_damage(&self) -> f32 {
        0.0
    }

    /// Whether at least `count` of an item are held.
    fn has_item(&self, item: &ItemId, count: u32) -> bool;

    /// Remove one usable item and return what it does.
    fn consume(&self, item: &ItemId) -> Option<Consumable>;

    /// Effects granted for the duration of a combat session.
    fn combat_start_effects(&self) -> Vec<StatusEffect> {
        Vec::new()
    }

    /// Opaque snapshot for save data.
    fn state(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
}

/// Source of skill levels.
pub trait SkillProvider {
    /// Level of a skill (0 if unknown).
    fn skill_level(&self, category: &str, skill: &str) -> u32;

    /// Multiplicative bonus from a skill, `0.1` per level.
    fn skill_bonus(&self, category: &str, skill: &str) -> f32 {
        self.skill_level(category, skill) as f32 * 0.1
    }
}

/// Area-of-effect target lookup.
pub trait SpatialQuery {
    /// Live actors within `radius` of `center`.
    fn targets_in_range(&mut self, center: Position, radius: f32) -> Vec<&mut Actor>;
}

impl SpatialQuery for Vec<Actor> {
    fn targets_in_range(&mut self, center: Position, radius: f32) -> Vec<&mut Actor> {
        self.iter_mut()
            .filter(|actor| actor.is_alive() && actor.position().within(&center, radius))
            .collect()
    }
}

// ============================================================================
// Consumables
// ============================================================================

/// What using an item does.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Consumable {
    /// Display name.
    pub name: String,
    /// Health restored through healing (modifiers apply).
    pub healing: f32,
    /// Flat restoration of stamina or mana.
    pub restore: BTreeMap<Resource, f32>,
    /// Effects attached to the user.
    pub effects: Vec<StatusEffect>,
}

impl Consumable {
    /// Create a consumable with no effect.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Heal on use.
    #[must_use]
    pub fn with_healing(mut self, amount: f32) -> Self {
        self.healing = amount;
        self
    }

    /// Restore a resource on use.
    #[must_use]
    pub fn with_restore(mut self, resource: Resource, amount: f32) -> Self {
        self.restore.insert(resource, amount);
        self
    }

    /// Attach an effect on use.
    #[must_use]
    pub fn with_effect(mut self, effect: StatusEffect) -> Self {
        self.effects.push(effect);
        self
    }
}

// ============================================================================
// Equipment Set
// ============================================================================

#[derive(Debug, Default)]
struct EquipmentState {
    stat_bonuses: BTreeMap<StatKind, f32>,
    regeneration: BTreeMap<Resource, f32>,
    weapon_damage: f32,
    items: BTreeMap<ItemId, u32>,
    consumables: BTreeMap<ItemId, Consumable>,
    combat_effects: Vec<StatusEffect>,
}

/// Simple equipment and bag, shareable between an actor and its owner.
///
/// Interior mutability lets the owner change gear while an actor holds an
/// `Arc` to it.
#[derive(Debug, Default)]
pub struct EquipmentSet {
    owner: Option<ActorId>,
    state: RwLock<EquipmentState>,
}

impl EquipmentSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag the set with its owner (for logs and snapshots).
    #[must_use]
    pub fn owned_by(mut self, owner: ActorId) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Set an additive stat bonus.
    pub fn set_stat_bonus(&self, kind: StatKind, value: f32) {
        self.state.write().stat_bonuses.insert(kind, value);
    }

    /// Set a regeneration bonus.
    pub fn set_regeneration(&self, resource: Resource, value: f32) {
        self.state.write().regeneration.insert(resource, value);
    }

    /// Set weapon damage.
    pub fn set_weapon_damage(&self, damage: f32) {
        self.state.write().weapon_damage = damage.max(0.0);
    }

    /// Add items to the bag.
    pub fn add_item(&self, item: ItemId, count: u32) {
        *self.state.write().items.entry(item).or_insert(0) += count;
    }

    /// Number of an item held.
    #[must_use]
    pub fn item_count(&self, item: &ItemId) -> u32 {
        self.state.read().items.get(item).copied().unwrap_or(0)
    }

    /// Register what an item does when used.
    pub fn define_consumable(&self, item: ItemId, consumable: Consumable) {
        self.state.write().consumables.insert(item, consumable);
    }

    /// Grant an effect at the start of every combat.
    pub fn add_combat_effect(&self, effect: StatusEffect) {
        self.state.write().combat_effects.push(effect);
    }
}

impl EquipmentProvider for EquipmentSet {
    fn equipment_modifiers(&self) -> BTreeMap<StatKind, f32> {
        self.state.read().stat_bonuses.clone()
    }

    fn regeneration_modifiers(&self) -> BTreeMap<Resource, f32> {
        self.state.read().regeneration.clone()
    }

    fn weapon_damage(&self) -> f32 {
        self.state.read().weapon_damage
    }

    fn has_item(&self, item: &ItemId, count: u32) -> bool {
        self.item_count(item) >= count
    }

    fn consume(&self, item: &ItemId) -> Option<Consumable> {
        let mut state = self.state.write();
        let consumable = state.consumables.get(item).cloned()?;
        let held = state.items.get_mut(item)?;
        if *held == 0 {
            return None;
        }
        *held -= 1;
        if *held == 0 {
            state.items.remove(item);
        }
        Some(consumable)
    }

    fn combat_start_effects(&self) -> Vec<StatusEffect> {
        self.state.read().combat_effects.clone()
    }

    fn state(&self) -> serde_json::Value {
        let state = self.state.read();
        serde_json::json!({
            "owner": self.owner,
            "weapon_damage": state.weapon_damage,
            "items": state.items,
            "stat_bonuses": state.stat_bonuses,
            "regeneration": state.regeneration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status_effect::EffectCategory;

    struct FixedSkills(u32);

    impl SkillProvider for FixedSkills {
        fn skill_level(&self, _category: &str, _skill: &str) -> u32 {
            self.0
        }
    }

    #[test]
    fn test_default_skill_bonus() {
        assert!((FixedSkills(3).skill_bonus("combat", "melee") - 0.3).abs() < 1e-6);
        assert_eq!(FixedSkills(0).skill_bonus("combat", "melee"), 0.0);
    }

    #[test]
    fn test_equipment_modifiers() {
        let set = EquipmentSet::new();
        set.set_stat_bonus(StatKind::Strength, 4.0);
        set.set_regeneration(Resource::Mana, 0.5);
        set.set_weapon_damage(7.0);

        assert_eq!(set.equipment_modifiers().get(&StatKind::Strength), Some(&4.0));
        assert_eq!(set.regeneration_modifiers().get(&Resource::Mana), Some(&0.5));
        assert_eq!(set.weapon_damage(), 7.0);
    }

    #[test]
    fn test_consume_decrements() {
        let set = EquipmentSet::new();
        let potion = ItemId::new("potion");
        set.add_item(potion.clone(), 2);
        set.define_consumable(potion.clone(), Consumable::new("Potion").with_healing(25.0));

        assert!(set.has_item(&potion, 2));
        assert_eq!(set.consume(&potion).map(|c| c.healing), Some(25.0));
        assert_eq!(set.item_count(&potion), 1);
        assert!(set.consume(&potion).is_some());
        assert!(set.consume(&potion).is_none());
        assert!(!set.has_item(&potion, 1));
    }

    #[test]
    fn test_items_without_definition_are_not_usable() {
        let set = EquipmentSet::new();
        let rock = ItemId::new("rock");
        set.add_item(rock.clone(), 1);
        assert!(set.consume(&rock).is_none());
        assert_eq!(set.item_count(&rock), 1);
    }

    #[test]
    fn test_combat_effects_and_state() {
        let set = EquipmentSet::new().owned_by(ActorId::new("hero"));
        set.add_combat_effect(
            StatusEffect::new("Battle Focus", EffectCategory::Buff)
                .with_stat(StatKind::Strength, 0.1)
                .permanent(),
        );
        set.add_item(ItemId::new("arrow"), 20);

        assert_eq!(set.combat_start_effects().len(), 1);
        let state = set.state();
        assert_eq!(state["owner"], "hero");
        assert_eq!(state["items"]["arrow"], 20);
        assert!(state.get("combat_effects").is_none());
        assert!(state.get("consumables").is_none());
    }
}
