//! Actors: players, NPCs and enemies.
//!
//! An [`Actor`] owns its stats, status effects, abilities, cooldowns and
//! combat statistics, and is the only thing that mutates them. Every
//! time-dependent operation takes the current [`SimTime`] explicitly.
//!
//! Lifecycle: `Alive -> Dead` when health reaches zero, `Dead -> Alive` on
//! [`Actor::resurrect`]. Operations that need a living actor quietly do
//! nothing (or refuse) when it is dead.

use crate::abilities::{
    Ability, AbilityCatalog, AbilityEffect, AbilityInfo, AbilityOutcome, SkillRef, UsageError,
};
use crate::combat_stats::{CombatStatistics, Resource, StatBlock, StatKind};
use crate::config::SimConfig;
use crate::damage_calc::{DamageCalculator, DamageOutcome, DamageType, Resistances, Strike};
use crate::progression::{ActorKind, ActorRole, ABILITY_SKILL_EXPERIENCE};
use crate::providers::{EquipmentProvider, SpatialQuery};
use crate::status_effect::{EffectCategory, EffectStep, ModifierKey, StatusEffect};
use fable_common::{AbilityId, ActorId, ItemId, Position, SchemaVersion, SimTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Equipment shared between an actor and whoever manages the inventory.
pub type SharedEquipment = Arc<dyn EquipmentProvider + Send + Sync>;

/// Callback invoked once per death.
pub type DeathHook = Box<dyn FnMut(&DeathEvent) + Send>;

// ============================================================================
// Events and targets
// ============================================================================

/// Passed to the death hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeathEvent {
    /// Who died.
    pub actor: ActorId,
    /// Display name.
    pub name: String,
    /// Role of the deceased.
    pub kind: ActorKind,
    /// Death count including this one.
    pub deaths: u32,
}

/// Where an ability is aimed.
#[derive(Default)]
pub struct AbilityTarget<'t> {
    /// Primary target.
    pub primary: Option<&'t mut Actor>,
    /// Impact point for area abilities (defaults to the user's position).
    pub position: Option<Position>,
    /// Lookup for secondary area targets.
    pub area: Option<&'t mut dyn SpatialQuery>,
}

impl<'t> AbilityTarget<'t> {
    /// No target: self-cast.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Aim at an actor.
    #[must_use]
    pub fn actor(target: &'t mut Actor) -> Self {
        Self {
            primary: Some(target),
            ..Self::default()
        }
    }

    /// Aim at a point.
    #[must_use]
    pub fn at(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    /// Resolve area damage through `area`.
    #[must_use]
    pub fn with_area(mut self, area: &'t mut dyn SpatialQuery) -> Self {
        self.area = Some(area);
        self
    }
}

enum Tick {
    Damage { effect: String, amount: f32 },
    Heal { effect: String, amount: f32 },
    Restore(Vec<(Resource, f32)>),
}

// ============================================================================
// Snapshot
// ============================================================================

/// Serialized view of an active effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectState {
    /// Effect name.
    pub name: String,
    /// Category.
    pub category: EffectCategory,
    /// Steps left, `None` when permanent.
    pub remaining: Option<u32>,
}

/// Player-only part of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    /// Experience toward the next level.
    pub experience: u64,
    /// Experience needed for the next level.
    pub experience_to_next_level: u64,
    /// Unspent skill points.
    pub skill_points: u32,
    /// Unspent talent points.
    pub talent_points: u32,
    /// Skill levels keyed `category.skill`.
    pub skills: BTreeMap<SkillRef, u32>,
}

/// Snapshot for the save layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorState {
    /// Snapshot shape.
    pub schema: SchemaVersion,
    /// Actor id.
    pub id: ActorId,
    /// Display name.
    pub name: String,
    /// Role.
    pub kind: ActorKind,
    /// Level.
    pub level: u32,
    /// Current health.
    pub health: f32,
    /// Maximum health.
    pub max_health: f32,
    /// Current stamina.
    pub stamina: f32,
    /// Current mana.
    pub mana: f32,
    /// Active effects.
    pub status_effects: Vec<EffectState>,
    /// Position.
    pub position: Position,
    /// Alive flag.
    pub is_alive: bool,
    /// In-combat flag.
    pub in_combat: bool,
    /// Running tallies.
    pub combat_stats: CombatStatistics,
    /// Seconds left on each unexpired cooldown.
    pub cooldowns: BTreeMap<AbilityId, f64>,
    /// Opaque inventory snapshot.
    pub inventory: Option<serde_json::Value>,
    /// Player progression.
    pub player: Option<PlayerState>,
}

// ============================================================================
// Actor
// ============================================================================

/// A simulated participant.
pub struct Actor {
    pub(crate) id: ActorId,
    pub(crate) name: String,
    pub(crate) level: u32,
    pub(crate) stats: StatBlock,
    pub(crate) resistances: Resistances,
    pub(crate) position: Position,
    pub(crate) effects: Vec<StatusEffect>,
    pub(crate) alive: bool,
    pub(crate) in_combat: bool,
    pub(crate) stunned: bool,
    pub(crate) invisible: bool,
    pub(crate) abilities: AbilityCatalog,
    pub(crate) cooldowns: BTreeMap<AbilityId, SimTime>,
    pub(crate) statistics: CombatStatistics,
    pub(crate) role: ActorRole,
    pub(crate) equipment: Option<SharedEquipment>,
    pub(crate) attack_cooldown: f64,
    pub(crate) last_attack: Option<SimTime>,
    pub(crate) config: Arc<SimConfig>,
    rng: fastrand::Rng,
    death_hook: Option<DeathHook>,
}

impl fmt::Debug for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Actor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.role.kind())
            .field("level", &self.level)
            .field("stats", &self.stats)
            .field("alive", &self.alive)
            .field("in_combat", &self.in_combat)
            .field("effects", &self.effects.len())
            .finish_non_exhaustive()
    }
}

impl Actor {
    /// Create a level-1 actor with default stats at the origin.
    pub fn new(
        id: impl Into<ActorId>,
        name: impl Into<String>,
        role: ActorRole,
        config: Arc<SimConfig>,
    ) -> Self {
        let attack_cooldown = config.default_attack_cooldown;
        Self {
            id: id.into(),
            name: name.into(),
            level: 1,
            stats: StatBlock::default(),
            resistances: Resistances::new(),
            position: Position::ORIGIN,
            effects: Vec::new(),
            alive: true,
            in_combat: false,
            stunned: false,
            invisible: false,
            abilities: AbilityCatalog::new(),
            cooldowns: BTreeMap::new(),
            statistics: CombatStatistics::default(),
            role,
            equipment: None,
            attack_cooldown,
            last_attack: None,
            config,
            rng: fastrand::Rng::new(),
            death_hook: None,
        }
    }

    /// Set base stats.
    #[must_use]
    pub fn with_stats(mut self, stats: StatBlock) -> Self {
        self.stats = stats.normalized();
        self.alive = self.stats.health() > 0.0;
        self
    }

    /// Set level.
    #[must_use]
    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level.max(1);
        self
    }

    /// Set position.
    #[must_use]
    pub fn with_position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    /// Set resistances.
    #[must_use]
    pub fn with_resistances(mut self, resistances: Resistances) -> Self {
        self.resistances = resistances;
        self
    }

    /// Learn an ability.
    #[must_use]
    pub fn with_ability(mut self, ability: Ability) -> Self {
        self.abilities.learn(ability);
        self
    }

    /// Replace the ability catalog.
    #[must_use]
    pub fn with_abilities(mut self, abilities: AbilityCatalog) -> Self {
        self.abilities = abilities;
        self
    }

    /// Attach equipment.
    #[must_use]
    pub fn with_equipment(mut self, equipment: SharedEquipment) -> Self {
        self.equipment = Some(equipment);
        self
    }

    /// Set seconds between basic attacks.
    #[must_use]
    pub fn with_attack_cooldown(mut self, seconds: f64) -> Self {
        self.attack_cooldown = seconds.max(0.0);
        self
    }

    /// Seed the random source.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = fastrand::Rng::with_seed(seed);
        self
    }

    /// Install a death hook.
    #[must_use]
    pub fn with_death_hook(mut self, hook: DeathHook) -> Self {
        self.death_hook = Some(hook);
        self
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Actor id.
    #[must_use]
    pub fn id(&self) -> &ActorId {
        &self.id
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Level.
    #[must_use]
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Base stats (without equipment or effect bonuses).
    #[must_use]
    pub fn stats(&self) -> &StatBlock {
        &self.stats
    }

    /// Resistances.
    #[must_use]
    pub fn resistances(&self) -> &Resistances {
        &self.resistances
    }

    /// Position.
    #[must_use]
    pub fn position(&self) -> Position {
        self.position
    }

    /// Move the actor.
    pub fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    /// Role and role data.
    #[must_use]
    pub fn role(&self) -> &ActorRole {
        &self.role
    }

    /// Mutable role data.
    pub fn role_mut(&mut self) -> &mut ActorRole {
        &mut self.role
    }

    /// Role discriminant.
    #[must_use]
    pub fn kind(&self) -> ActorKind {
        self.role.kind()
    }

    /// Whether the actor is alive.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Whether the actor is in a combat session.
    #[must_use]
    pub fn in_combat(&self) -> bool {
        self.in_combat
    }

    /// Mark the actor as in or out of combat.
    pub fn set_in_combat(&mut self, in_combat: bool) {
        self.in_combat = in_combat;
    }

    /// Whether the actor loses its turns (flag or stunning effect).
    #[must_use]
    pub fn is_stunned(&self) -> bool {
        self.stunned || self.effects.iter().any(|e| e.stuns)
    }

    /// Set the stun flag.
    pub fn set_stunned(&mut self, stunned: bool) {
        self.stunned = stunned;
    }

    /// Whether the actor is hidden.
    #[must_use]
    pub fn is_invisible(&self) -> bool {
        self.invisible
    }

    /// Set the invisibility flag.
    pub fn set_invisible(&mut self, invisible: bool) {
        self.invisible = invisible;
    }

    /// Combat statistics.
    #[must_use]
    pub fn statistics(&self) -> &CombatStatistics {
        &self.statistics
    }

    /// Mutable combat statistics.
    pub fn statistics_mut(&mut self) -> &mut CombatStatistics {
        &mut self.statistics
    }

    /// Known abilities.
    #[must_use]
    pub fn abilities(&self) -> &AbilityCatalog {
        &self.abilities
    }

    /// Learn (or replace) an ability.
    pub fn learn_ability(&mut self, ability: Ability) {
        self.abilities.learn(ability);
    }

    /// Forget an ability and its cooldown.
    pub fn forget_ability(&mut self, id: &str) -> Option<Ability> {
        self.cooldowns.remove(id);
        self.abilities.forget(id)
    }

    /// Active status effects.
    #[must_use]
    pub fn effects(&self) -> &[StatusEffect] {
        &self.effects
    }

    /// Whether an effect with this name is active.
    #[must_use]
    pub fn has_effect(&self, name: &str) -> bool {
        self.effects.iter().any(|e| e.name == name)
    }

    /// Attached equipment.
    #[must_use]
    pub fn equipment(&self) -> Option<&SharedEquipment> {
        self.equipment.as_ref()
    }

    /// Attach or detach equipment.
    pub fn set_equipment(&mut self, equipment: Option<SharedEquipment>) {
        self.equipment = equipment;
    }

    /// Shared configuration.
    #[must_use]
    pub fn config(&self) -> &Arc<SimConfig> {
        &self.config
    }

    // ------------------------------------------------------------------
    // Derived values
    // ------------------------------------------------------------------

    /// Sum of a modifier across active effects.
    #[must_use]
    pub fn modifier_sum(&self, key: ModifierKey) -> f32 {
        self.effects.iter().map(|e| e.modifier(key)).sum()
    }

    /// Product of `1 + modifier` across active effects.
    #[must_use]
    pub fn modifier_product(&self, key: ModifierKey) -> f32 {
        self.effects
            .iter()
            .filter(|e| e.modifiers.contains_key(&key))
            .map(|e| 1.0 + e.modifier(key))
            .product()
    }

    /// Live stats: base plus equipment, with dodge and critical chance
    /// including effect bonuses and capped.
    ///
    /// Buff and debuff stat changes are already in the base block while
    /// attached, so they are not applied again here.
    #[must_use]
    pub fn current_stats(&self) -> StatBlock {
        let mut stats = self.stats.clone();
        if let Some(equipment) = &self.equipment {
            let mods = equipment.equipment_modifiers();
            let (maxes, rest): (Vec<_>, Vec<_>) = mods.into_iter().partition(|(k, _)| k.is_max());
            for (kind, value) in maxes.into_iter().chain(rest) {
                stats.modify_stat(kind, value, false);
            }
        }

        let dodge = stats.dodge_chance() + self.modifier_sum(ModifierKey::DodgeBonus);
        stats.set(StatKind::DodgeChance, dodge.min(self.config.dodge_cap));
        let crit = stats.critical_chance() + self.modifier_sum(ModifierKey::CritChanceBonus);
        stats.set(StatKind::CriticalChance, crit.min(self.config.crit_cap));
        stats
    }

    /// Effective dodge chance after bonuses and cap.
    #[must_use]
    pub fn dodge_chance(&self) -> f32 {
        self.current_stats().dodge_chance()
    }

    /// Effective critical chance after bonuses and cap.
    #[must_use]
    pub fn critical_chance(&self) -> f32 {
        self.current_stats().critical_chance()
    }

    /// Critical damage multiplier.
    #[must_use]
    pub fn critical_multiplier(&self) -> f32 {
        let mastery = self.skill_level(&SkillRef::new("combat", "critical_mastery"));
        self.config.base_crit_multiplier
            + mastery as f32 * self.config.crit_mastery_per_level
            + self.modifier_sum(ModifierKey::CritDamageBonus)
    }

    /// Regeneration rate multiplier for a resource (effects and equipment).
    #[must_use]
    pub fn regeneration_multiplier(&self, resource: Resource) -> f32 {
        let mut multiplier = self.modifier_product(ModifierKey::Regeneration(resource));
        if let Some(equipment) = &self.equipment {
            if let Some(value) = equipment.regeneration_modifiers().get(&resource) {
                multiplier *= 1.0 + value;
            }
        }
        multiplier.max(0.0)
    }

    /// Level of a skill (0 for roles without skills).
    #[must_use]
    pub fn skill_level(&self, skill: &SkillRef) -> u32 {
        self.role
            .skills()
            .map_or(0, |s| s.skill_level(&skill.category, &skill.skill))
    }

    /// Damage bonus from a skill (0 for roles without skills).
    #[must_use]
    pub fn skill_bonus(&self, skill: &SkillRef) -> f32 {
        self.role
            .skills()
            .map_or(0.0, |s| s.skill_bonus(&skill.category, &skill.skill))
    }

    /// Fraction removed from ability cooldowns.
    #[must_use]
    pub fn cooldown_reduction(&self) -> f32 {
        self.role
            .as_player()
            .map_or(0.0, |p| p.cooldown_reduction)
            .clamp(0.0, self.config.max_cooldown_reduction)
    }

    /// Equipped weapon damage.
    #[must_use]
    pub fn weapon_damage(&self) -> f32 {
        self.equipment.as_ref().map_or(0.0, |e| e.weapon_damage())
    }

    fn roll(&mut self, chance: f32) -> bool {
        chance > 0.0 && self.rng.f32() < chance
    }

    /// Uniform draw in `[min, max)` from this actor's random source.
    pub fn roll_range(&mut self, min: f32, max: f32) -> f32 {
        min + self.rng.f32() * (max - min)
    }

    // ------------------------------------------------------------------
    // Damage and healing
    // ------------------------------------------------------------------

    /// Receive a hit. Rolls dodge, then mitigates.
    pub fn take_damage(&mut self, amount: f32, damage_type: DamageType) -> DamageOutcome {
        self.receive(amount, damage_type, 0.0)
    }

    fn receive(&mut self, amount: f32, damage_type: DamageType, bonus_defense: f32) -> DamageOutcome {
        if !self.alive {
            return DamageOutcome::NONE;
        }

        let current = self.current_stats();
        if self.roll(current.dodge_chance()) {
            self.statistics.dodges += 1;
            debug!("{} dodged a {} hit", self.name, damage_type);
            return DamageOutcome::dodged();
        }

        let calculator = DamageCalculator::new(self.config.defense_scaling);
        let actual = calculator.incoming(
            amount,
            damage_type,
            &self.resistances,
            self.modifier_product(ModifierKey::DamageTakenModifier),
            current.defense() + bonus_defense,
        );

        self.stats.modify_stat(StatKind::Health, -actual, false);
        self.statistics.damage_taken += actual;
        debug!(
            "{} took {:.1} {} damage ({:.1}/{:.1})",
            self.name,
            actual,
            damage_type,
            self.stats.health(),
            self.stats.max_health()
        );

        if self.stats.health() <= 0.0 {
            self.die();
        }

        DamageOutcome {
            amount: actual,
            dodged: false,
            critical: false,
        }
    }

    /// Hit another actor for `base` damage.
    pub fn deal_damage(&mut self, target: &mut Actor, base: f32, damage_type: DamageType) -> DamageOutcome {
        self.deal_strike(target, Strike::new(base, damage_type))
    }

    /// Hit another actor with a fully described strike.
    ///
    /// Rolls critical, applies attribute and effect bonuses, then lets the
    /// target dodge and mitigate.
    pub fn deal_strike(&mut self, target: &mut Actor, strike: Strike) -> DamageOutcome {
        if !self.alive || !target.alive {
            return DamageOutcome::NONE;
        }

        let critical = self.roll(self.critical_chance());
        let mut damage = strike.base;
        if critical {
            damage *= self.critical_multiplier();
        }

        let current = self.current_stats();
        damage *= DamageCalculator::outgoing_multiplier(
            strike.damage_type,
            current.strength(),
            current.intelligence(),
            self.modifier_sum(ModifierKey::DamageDealtModifier),
        );
        damage *= strike.multiplier;

        let mut outcome = target.receive(damage, strike.damage_type, strike.bonus_defense);
        outcome.critical = critical && !outcome.dodged;
        self.statistics.record_hit(outcome.amount, outcome.critical);
        if !target.alive {
            self.statistics.kills += 1;
        }
        outcome
    }

    /// Heal, scaled by healing-received modifiers and capped at max health.
    /// Returns the health actually restored.
    pub fn heal(&mut self, amount: f32, source: Option<&str>) -> f32 {
        if !self.alive || amount <= 0.0 {
            return 0.0;
        }
        let scaled = amount * self.modifier_product(ModifierKey::HealingReceivedModifier);
        let healed = self.stats.restore(Resource::Health, scaled);
        self.statistics.healing_done += healed;
        debug!(
            "{} healed {:.1} (source: {})",
            self.name,
            healed,
            source.unwrap_or("unknown")
        );
        healed
    }

    /// Kill the actor. Does nothing if already dead.
    pub fn die(&mut self) {
        if !self.alive {
            return;
        }
        self.alive = false;
        self.stats.set(StatKind::Health, 0.0);
        self.statistics.deaths += 1;

        let mut kept = Vec::with_capacity(self.effects.len());
        for mut effect in std::mem::take(&mut self.effects) {
            if effect.is_permanent() {
                kept.push(effect);
            } else {
                effect.remove(&mut self.stats);
            }
        }
        self.effects = kept;
        self.stats.set(StatKind::Health, 0.0);

        if let Some(enemy) = self.role.as_enemy_mut() {
            enemy.loot_ready = true;
        }
        let event = DeathEvent {
            actor: self.id.clone(),
            name: self.name.clone(),
            kind: self.role.kind(),
            deaths: self.statistics.deaths,
        };
        if let Some(hook) = self.death_hook.as_mut() {
            hook(&event);
        }
        info!("{} died", self.name);
    }

    /// Bring a dead actor back with a fraction of max health.
    /// Stamina and mana return at the configured fraction.
    pub fn resurrect(&mut self, health_fraction: f32) {
        if self.alive {
            return;
        }
        let fraction = health_fraction.clamp(0.0, 1.0);
        self.stats.set_fraction(Resource::Health, fraction);
        if self.stats.health() <= 0.0 {
            self.stats.set(StatKind::Health, 1.0);
        }
        let resources = self.config.resurrect_resource_fraction;
        self.stats.set_fraction(Resource::Stamina, resources);
        self.stats.set_fraction(Resource::Mana, resources);
        self.alive = true;
        info!("{} was resurrected with {:.1} HP", self.name, self.stats.health());
    }

    /// Resurrect with the configured default health fraction.
    pub fn resurrect_default(&mut self) {
        let fraction = self.config.resurrect_health_fraction;
        self.resurrect(fraction);
    }

    // ------------------------------------------------------------------
    // Status effects
    // ------------------------------------------------------------------

    /// Attach an effect. Non-stacking duplicates keep the stronger instance
    /// or extend the existing duration. Returns `false` on a dead actor.
    pub fn add_status_effect(&mut self, mut effect: StatusEffect, now: SimTime) -> bool {
        if !self.alive {
            return false;
        }
        effect.attach_at(now);

        if !effect.can_stack {
            if let Some(index) = self.effects.iter().position(|e| e.name == effect.name) {
                if !self.effects[index].absorb(&effect) {
                    return true;
                }
                let mut old = self.effects.remove(index);
                old.remove(&mut self.stats);
            }
        }

        effect.apply(&mut self.stats);
        debug!("{} gained {}", self.name, effect.name);
        self.effects.push(effect);
        self.check_death();
        true
    }

    /// Remove every effect with this name. Returns how many were removed.
    pub fn remove_status_effect(&mut self, name: &str) -> usize {
        self.remove_effects_where(|e| e.name == name)
    }

    /// Remove every effect of a category.
    pub fn cleanse(&mut self, category: EffectCategory) -> usize {
        self.remove_effects_where(|e| e.category == category)
    }

    fn remove_effects_where(&mut self, mut predicate: impl FnMut(&StatusEffect) -> bool) -> usize {
        let mut removed = 0;
        let mut kept = Vec::with_capacity(self.effects.len());
        for mut effect in std::mem::take(&mut self.effects) {
            if predicate(&effect) {
                effect.remove(&mut self.stats);
                removed += 1;
            } else {
                kept.push(effect);
            }
        }
        self.effects = kept;
        if removed > 0 {
            self.check_death();
        }
        removed
    }

    /// Reverting a health modifier can leave a living actor at zero health.
    fn check_death(&mut self) {
        if self.alive && self.stats.health() <= 0.0 {
            self.die();
        }
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Advance one simulation step.
    ///
    /// Order: effects, regeneration, death check, cooldown purge.
    pub fn update(&mut self, now: SimTime) {
        self.update_effects(now);
        if self.alive {
            self.regenerate();
        }
        self.check_death();
        self.cooldowns.retain(|_, expiry| *expiry > now);
    }

    fn update_effects(&mut self, now: SimTime) {
        let mut ticks = Vec::new();
        let mut kept = Vec::with_capacity(self.effects.len());
        for mut effect in std::mem::take(&mut self.effects) {
            match effect.advance(now) {
                EffectStep::Expired => {
                    effect.remove(&mut self.stats);
                    debug!("{} wore off {}", effect.name, self.name);
                },
                EffectStep::Tick => {
                    match effect.category {
                        EffectCategory::Dot => ticks.push(Tick::Damage {
                            effect: effect.name.clone(),
                            amount: effect.tick_amount(),
                        }),
                        EffectCategory::Hot => ticks.push(Tick::Heal {
                            effect: effect.name.clone(),
                            amount: effect.tick_amount(),
                        }),
                        EffectCategory::ResourceRegen => {
                            ticks.push(Tick::Restore(effect.restorations().collect()));
                        },
                        EffectCategory::Buff | EffectCategory::Debuff => {},
                    }
                    kept.push(effect);
                },
                EffectStep::Idle => kept.push(effect),
            }
        }
        self.effects = kept;

        for tick in ticks {
            if !self.alive {
                break;
            }
            match tick {
                Tick::Damage { effect, amount } => {
                    self.stats.modify_stat(StatKind::Health, -amount, false);
                    self.statistics.damage_taken += amount;
                    debug!("{} took {:.1} from {}", self.name, amount, effect);
                    if self.stats.health() <= 0.0 {
                        self.die();
                    }
                },
                Tick::Heal { effect, amount } => {
                    self.heal(amount, Some(&effect));
                },
                Tick::Restore(amounts) => {
                    for (resource, amount) in amounts {
                        self.stats.restore(resource, amount);
                    }
                },
            }
        }
    }

    fn regenerate(&mut self) {
        for (resource, rate) in [
            (Resource::Stamina, self.config.stamina_regen_per_step),
            (Resource::Mana, self.config.mana_regen_per_step),
        ] {
            if self.stats.resource(resource) < self.stats.resource_max(resource) {
                let amount = rate * self.regeneration_multiplier(resource);
                self.stats.restore(resource, amount);
            }
        }
    }

    /// Whether a basic attack may fire now; records the attack when it does.
    pub fn attack_ready(&mut self, now: SimTime) -> bool {
        if let Some(last) = self.last_attack {
            if last + self.attack_cooldown > now {
                return false;
            }
        }
        self.last_attack = Some(now);
        true
    }

    // ------------------------------------------------------------------
    // Abilities
    // ------------------------------------------------------------------

    /// Seconds until an ability is ready (0 when ready or unknown).
    #[must_use]
    pub fn cooldown_remaining(&self, id: &str, now: SimTime) -> f64 {
        self.cooldowns
            .get(id)
            .map_or(0.0, |expiry| (expiry - now).max(0.0))
    }

    /// Whether an ability is cooling down.
    #[must_use]
    pub fn is_on_cooldown(&self, id: &str, now: SimTime) -> bool {
        self.cooldowns.get(id).is_some_and(|expiry| *expiry > now)
    }

    /// Check whether an ability can be used now.
    pub fn can_use_ability(&self, id: &str, now: SimTime) -> Result<(), UsageError> {
        if !self.alive {
            return Err(UsageError::Dead(self.name.clone()));
        }
        let ability = self
            .abilities
            .get(id)
            .ok_or_else(|| UsageError::UnknownAbility(AbilityId::new(id)))?;

        if self.is_on_cooldown(id, now) {
            return Err(UsageError::OnCooldown {
                name: ability.name.clone(),
                remaining: self.cooldown_remaining(id, now),
            });
        }
        if self.stats.stamina() < ability.cost.stamina {
            return Err(UsageError::InsufficientStamina {
                required: ability.cost.stamina,
                available: self.stats.stamina(),
            });
        }
        if self.stats.mana() < ability.cost.mana {
            return Err(UsageError::InsufficientMana {
                required: ability.cost.mana,
                available: self.stats.mana(),
            });
        }
        self.check_requirements(ability)
    }

    fn check_requirements(&self, ability: &Ability) -> Result<(), UsageError> {
        let reqs = &ability.requirements;
        if self.level < reqs.level {
            return Err(UsageError::RequirementsNotMet(format!(
                "requires level {}",
                reqs.level
            )));
        }

        let current = self.current_stats();
        for (kind, minimum) in &reqs.stats {
            if current.get(*kind) < *minimum {
                return Err(UsageError::RequirementsNotMet(format!(
                    "requires {kind} {minimum}"
                )));
            }
        }

        for (skill, minimum) in &reqs.skills {
            if self.skill_level(skill) < *minimum {
                return Err(UsageError::RequirementsNotMet(format!(
                    "requires {skill} level {minimum}"
                )));
            }
        }

        for (item, count) in &reqs.items {
            let held = self
                .equipment
                .as_ref()
                .is_some_and(|e| e.has_item(item, *count));
            if !held {
                return Err(UsageError::RequirementsNotMet(format!(
                    "requires {count}x {item}"
                )));
            }
        }
        Ok(())
    }

    /// Describe an ability from this actor's point of view.
    pub fn ability_info(&self, id: &str, now: SimTime) -> Result<AbilityInfo, UsageError> {
        let ability = self
            .abilities
            .get(id)
            .ok_or_else(|| UsageError::UnknownAbility(AbilityId::new(id)))?;
        let check = self.can_use_ability(id, now);
        let bonus = ability.skill.as_ref().map_or(0.0, |s| self.skill_bonus(s));
        Ok(AbilityInfo {
            ability: ability.clone(),
            cooldown_remaining: self.cooldown_remaining(id, now),
            can_use: check.is_ok(),
            reason: check.err().map(|e| e.to_string()),
            modified_damage: ability.damage * (1.0 + bonus),
        })
    }

    /// Use an ability.
    ///
    /// Validation and the range check happen before anything is spent. Once
    /// the cost is paid the cooldown is committed, even if the primary
    /// target then dodges.
    pub fn use_ability(&mut self, id: &str, mut target: AbilityTarget<'_>, now: SimTime) -> AbilityOutcome {
        if let Err(error) = self.can_use_ability(id, now) {
            return AbilityOutcome::refused(error);
        }
        let Some(ability) = self.abilities.get(id).cloned() else {
            return AbilityOutcome::refused(UsageError::UnknownAbility(AbilityId::new(id)));
        };

        if let (Some(primary), Some(range)) = (target.primary.as_deref(), ability.range) {
            let distance = self.position.distance_to(&primary.position);
            if distance > range {
                return AbilityOutcome::refused(UsageError::OutOfRange { distance, range });
            }
        }

        self.stats.consume(Resource::Stamina, ability.cost.stamina);
        self.stats.consume(Resource::Mana, ability.cost.mana);
        let cooldown = ability.cooldown * f64::from(1.0 - self.cooldown_reduction());
        self.cooldowns.insert(ability.id.clone(), now + cooldown);
        self.statistics.abilities_used += 1;

        let mut effects = Vec::new();
        let mut message = format!("Used {}", ability.name);
        let primary_id = target.primary.as_deref().map(|p| p.id.clone());

        if ability.damage > 0.0 {
            if let Some(primary) = target.primary.as_deref_mut() {
                let bonus = ability.skill.as_ref().map_or(0.0, |s| self.skill_bonus(s));
                let damage = ability.damage * (1.0 + bonus);
                let outcome = self.deal_damage(primary, damage, ability.damage_type);
                if outcome.dodged {
                    debug!("{} dodged {}'s {}", primary.name, self.name, ability.name);
                    return AbilityOutcome::evaded(format!("{} dodged {}!", primary.name, ability.name));
                }
                effects.push(AbilityEffect::Damage {
                    target: primary.id.clone(),
                    amount: outcome.amount,
                    critical: outcome.critical,
                    aoe: false,
                });
                message = format!("Used {} dealing {:.1} damage", ability.name, outcome.amount);
                if outcome.critical {
                    message.push_str(" (Critical!)");
                }
            }
        }

        if ability.is_area() {
            if let Some(area) = target.area.as_mut() {
                let center = target.position.unwrap_or(self.position);
                let splash = ability.damage * self.config.aoe_damage_fraction;
                for victim in area.targets_in_range(center, ability.area_of_effect) {
                    if victim.id == self.id || Some(&victim.id) == primary_id.as_ref() {
                        continue;
                    }
                    let outcome = self.deal_damage(victim, splash, ability.damage_type);
                    effects.push(AbilityEffect::Damage {
                        target: victim.id.clone(),
                        amount: outcome.amount,
                        critical: outcome.critical,
                        aoe: true,
                    });
                }
            }
        }

        for effect in &ability.effects {
            let (receiver, attached) = match target.primary.as_deref_mut() {
                Some(primary) => (primary.id.clone(), primary.add_status_effect(effect.clone(), now)),
                None => (self.id.clone(), self.add_status_effect(effect.clone(), now)),
            };
            if attached {
                effects.push(AbilityEffect::Status {
                    target: receiver,
                    effect: effect.name.clone(),
                });
            }
        }
        for effect in &ability.self_effects {
            if self.add_status_effect(effect.clone(), now) {
                effects.push(AbilityEffect::Status {
                    target: self.id.clone(),
                    effect: effect.name.clone(),
                });
            }
        }

        effects.extend(
            ability
                .visual_effects
                .iter()
                .cloned()
                .map(|descriptor| AbilityEffect::Visual { descriptor }),
        );

        if let Some(skill) = &ability.skill {
            if self.role.as_player().is_some() {
                match self.gain_skill_experience(skill, ABILITY_SKILL_EXPERIENCE) {
                    Ok(advance) if advance.leveled() => {
                        for unlocked in &advance.unlocked {
                            info!("{} unlocked {}", self.name, unlocked);
                        }
                        effects.push(AbilityEffect::SkillUp {
                            skill: skill.clone(),
                            level: advance.to,
                            unlocked: advance.unlocked,
                        });
                    },
                    Ok(_) => {},
                    Err(e) => warn!("{} gained no {} experience: {}", self.name, skill, e),
                }
            }
        }

        debug!("{}: {}", self.name, message);
        AbilityOutcome::succeeded(message, effects)
    }

    // ------------------------------------------------------------------
    // Items
    // ------------------------------------------------------------------

    /// Use a consumable from the attached equipment.
    pub fn use_item(&mut self, item: &ItemId, now: SimTime) -> Result<String, UsageError> {
        if !self.alive {
            return Err(UsageError::Dead(self.name.clone()));
        }
        let consumable = self
            .equipment
            .as_ref()
            .and_then(|e| e.consume(item))
            .ok_or_else(|| UsageError::ItemUnavailable(item.clone()))?;

        let mut parts = Vec::new();
        if consumable.healing > 0.0 {
            let healed = self.heal(consumable.healing, Some(item.as_str()));
            parts.push(format!("restored {healed:.1} health"));
        }
        for (resource, amount) in &consumable.restore {
            let gained = self.stats.restore(*resource, *amount);
            parts.push(format!("restored {gained:.1} {}", resource.name()));
        }
        for effect in consumable.effects {
            let name = effect.name.clone();
            if self.add_status_effect(effect, now) {
                parts.push(format!("gained {name}"));
            }
        }

        let label = if consumable.name.is_empty() {
            item.to_string()
        } else {
            consumable.name
        };
        if parts.is_empty() {
            Ok(format!("Used {label}"))
        } else {
            Ok(format!("Used {label}: {}", parts.join(", ")))
        }
    }

    // ------------------------------------------------------------------
    // Snapshot
    // ------------------------------------------------------------------

    /// Serializable snapshot of the actor at `now`.
    #[must_use]
    pub fn get_state(&self, now: SimTime) -> ActorState {
        ActorState {
            schema: SchemaVersion::ACTOR_STATE,
            id: self.id.clone(),
            name: self.name.clone(),
            kind: self.role.kind(),
            level: self.level,
            health: self.stats.health(),
            max_health: self.stats.max_health(),
            stamina: self.stats.stamina(),
            mana: self.stats.mana(),
            status_effects: self
                .effects
                .iter()
                .map(|e| EffectState {
                    name: e.name.clone(),
                    category: e.category,
                    remaining: e.remaining(),
                })
                .collect(),
            position: self.position,
            is_alive: self.alive,
            in_combat: self.in_combat,
            combat_stats: self.statistics.clone(),
            cooldowns: self
                .cooldowns
                .iter()
                .filter(|(_, expiry)| **expiry > now)
                .map(|(id, expiry)| (id.clone(), expiry - now))
                .collect(),
            inventory: self.equipment.as_ref().map(|e| e.state()),
            player: self.role.as_player().map(|p| PlayerState {
                experience: p.experience,
                experience_to_next_level: self.experience_to_next_level(),
                skill_points: p.skill_points,
                talent_points: p.talent_points,
                skills: p.skills.iter().collect(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abilities::{AbilityCost, Requirements};
    use crate::progression::{skill_experience_for_level, SkillSet};
    use crate::providers::{Consumable, EquipmentSet};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn config() -> Arc<SimConfig> {
        Arc::new(SimConfig::default())
    }

    /// Stats with every roll disabled.
    fn steady() -> StatBlock {
        StatBlock::new()
            .with(StatKind::DodgeChance, 0.0)
            .with(StatKind::CriticalChance, 0.0)
    }

    fn actor(id: &str, role: ActorRole) -> Actor {
        Actor::new(id, id, role, config()).with_stats(steady()).with_seed(7)
    }

    #[test]
    fn test_take_damage_mitigated_by_defense() {
        let mut target = actor("target", ActorRole::enemy());
        let outcome = target.take_damage(50.0, DamageType::Physical);
        assert!(!outcome.dodged);
        assert!((outcome.amount - 47.6).abs() < 1e-4);
        assert!((target.stats().health() - 52.4).abs() < 1e-3);
        assert_eq!(target.statistics().damage_taken, outcome.amount);
    }

    #[test]
    fn test_take_damage_on_dead_actor() {
        let mut target = actor("target", ActorRole::enemy());
        target.die();
        assert_eq!(target.take_damage(50.0, DamageType::Physical), DamageOutcome::NONE);
    }

    #[test]
    fn test_guaranteed_dodge_is_capped() {
        let mut target = actor("target", ActorRole::enemy());
        target.add_status_effect(
            StatusEffect::new("Blur", EffectCategory::Buff)
                .with_modifier(ModifierKey::DodgeBonus, 5.0)
                .with_duration(3),
            0.0,
        );
        assert_eq!(target.dodge_chance(), 0.75);
    }

    #[test]
    fn test_deal_damage_adds_strength_bonus() {
        let mut hero = actor("hero", ActorRole::player());
        let mut dummy = actor("dummy", ActorRole::enemy()).with_stats(steady().with(StatKind::Defense, 0.0));
        let outcome = hero.deal_damage(&mut dummy, 10.0, DamageType::Physical);
        assert!((outcome.amount - 11.0).abs() < 1e-4);
        assert_eq!(hero.statistics().damage_dealt, outcome.amount);
    }

    #[test]
    fn test_critical_multiplier_includes_mastery_and_effects() {
        let mut hero = actor("hero", ActorRole::player());
        if let Some(profile) = hero.role_mut().as_player_mut() {
            profile
                .skills
                .add_skill(&SkillRef::new("combat", "critical_mastery"), 3);
        }
        hero.add_status_effect(
            StatusEffect::new("Precision", EffectCategory::Buff)
                .with_modifier(ModifierKey::CritDamageBonus, 0.5)
                .with_duration(2),
            0.0,
        );
        assert!((hero.critical_multiplier() - 2.8).abs() < 1e-5);

        let goblin = actor("goblin", ActorRole::enemy());
        assert_eq!(goblin.critical_multiplier(), 2.0);
    }

    #[test]
    fn test_forced_critical() {
        let mut hero = actor("hero", ActorRole::player())
            .with_stats(steady().with(StatKind::CriticalChance, 1.0).with(StatKind::Strength, 0.0));
        let mut dummy = actor("dummy", ActorRole::enemy()).with_stats(steady().with(StatKind::Defense, 0.0));
        // Capped at 0.75 so not every swing crits; retry until one does.
        let mut outcome = DamageOutcome::NONE;
        for _ in 0..50 {
            dummy.stats.set(StatKind::Health, 100.0);
            outcome = hero.deal_damage(&mut dummy, 10.0, DamageType::Physical);
            if outcome.critical {
                break;
            }
        }
        assert!(outcome.critical);
        assert!((outcome.amount - 20.0).abs() < 1e-4);
        assert!(hero.statistics().critical_hits >= 1);
    }

    #[test]
    fn test_damage_taken_modifier_stacks_multiplicatively() {
        let mut target = actor("t", ActorRole::enemy()).with_stats(steady().with(StatKind::Defense, 0.0));
        for name in ["Exposed", "Marked"] {
            target.add_status_effect(
                StatusEffect::new(name, EffectCategory::Debuff)
                    .with_modifier(ModifierKey::DamageTakenModifier, 0.5)
                    .with_duration(5),
                0.0,
            );
        }
        let outcome = target.take_damage(10.0, DamageType::Physical);
        assert!((outcome.amount - 22.5).abs() < 1e-4);
    }

    #[test]
    fn test_heal_clamped_and_scaled() {
        let mut hero = actor("hero", ActorRole::player());
        hero.stats.set(StatKind::Health, 50.0);
        hero.add_status_effect(
            StatusEffect::new("Blessed", EffectCategory::Buff)
                .with_modifier(ModifierKey::HealingReceivedModifier, 0.5)
                .with_duration(5),
            0.0,
        );
        assert_eq!(hero.heal(20.0, Some("potion")), 30.0);
        assert_eq!(hero.heal(100.0, None), 20.0);
        assert_eq!(hero.stats().health(), 100.0);
        assert_eq!(hero.statistics().healing_done, 50.0);
    }

    #[test]
    fn test_die_is_idempotent_and_strips_temporary_effects() {
        let calls = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&calls);
        let mut goblin = actor("goblin", ActorRole::enemy()).with_death_hook(Box::new(move |event| {
            assert_eq!(event.kind, ActorKind::Enemy);
            seen.fetch_add(1, Ordering::SeqCst);
        }));
        goblin.add_status_effect(
            StatusEffect::new("Rage", EffectCategory::Buff)
                .with_stat(StatKind::Strength, 1.0)
                .with_duration(5),
            0.0,
        );
        goblin.add_status_effect(
            StatusEffect::new("Curse", EffectCategory::Debuff)
                .with_stat(StatKind::Defense, -0.2)
                .permanent(),
            0.0,
        );
        assert_eq!(goblin.stats().strength(), 20.0);

        goblin.die();
        goblin.die();

        assert!(!goblin.is_alive());
        assert_eq!(goblin.stats().health(), 0.0);
        assert_eq!(goblin.statistics().deaths, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(goblin.stats().strength(), 10.0);
        assert!(goblin.has_effect("Curse"));
        assert!(!goblin.has_effect("Rage"));
        assert_eq!(goblin.role().as_enemy().map(|e| e.loot_ready), Some(true));
    }

    #[test]
    fn test_resurrect() {
        let mut hero = actor("hero", ActorRole::player()).with_stats(steady().with_mana(40.0));
        hero.resurrect(0.5);
        assert_eq!(hero.stats().health(), 100.0);

        hero.die();
        hero.resurrect(0.25);
        assert!(hero.is_alive());
        assert_eq!(hero.stats().health(), 25.0);
        assert_eq!(hero.stats().stamina(), 50.0);
        assert_eq!(hero.stats().mana(), 20.0);
    }

    #[test]
    fn test_update_regenerates_and_purges_cooldowns() {
        let mut hero = actor("hero", ActorRole::player()).with_stats(steady().with_mana(40.0));
        hero.stats.set(StatKind::Stamina, 50.0);
        hero.stats.set(StatKind::Mana, 10.0);
        hero.cooldowns.insert(AbilityId::new("old"), 0.5);

        hero.update(1.0);
        assert_eq!(hero.stats().stamina(), 55.0);
        assert_eq!(hero.stats().mana(), 12.0);
        assert!(hero.cooldowns.is_empty());
    }

    #[test]
    fn test_regeneration_modifiers() {
        let equipment = Arc::new(EquipmentSet::new());
        equipment.set_regeneration(Resource::Stamina, 1.0);
        let mut hero = actor("hero", ActorRole::player()).with_equipment(equipment);
        hero.add_status_effect(
            StatusEffect::new("Second Wind", EffectCategory::Buff)
                .with_modifier(ModifierKey::Regeneration(Resource::Stamina), 0.5)
                .with_duration(10),
            0.0,
        );
        hero.stats.set(StatKind::Stamina, 0.0);
        hero.update(1.0);
        assert!((hero.stats().stamina() - 15.0).abs() < 1e-4);
    }

    #[test]
    fn test_dead_actor_does_not_regenerate() {
        let mut hero = actor("hero", ActorRole::player());
        hero.stats.set(StatKind::Stamina, 10.0);
        hero.die();
        hero.update(1.0);
        assert_eq!(hero.stats().stamina(), 10.0);
    }

    #[test]
    fn test_lethal_dot_kills_during_update() {
        let mut goblin = actor("goblin", ActorRole::enemy());
        goblin.stats.set(StatKind::Health, 4.0);
        goblin.add_status_effect(
            StatusEffect::new("Bleed", EffectCategory::Dot)
                .with_stat(StatKind::Health, -5.0)
                .with_duration(5),
            0.0,
        );
        goblin.update(1.0);
        assert!(!goblin.is_alive());
        assert_eq!(goblin.statistics().deaths, 1);
    }

    #[test]
    fn test_hot_and_resource_regen_ticks() {
        let mut hero = actor("hero", ActorRole::player()).with_stats(steady().with_mana(50.0));
        hero.stats.set(StatKind::Health, 50.0);
        hero.stats.set(StatKind::Mana, 0.0);
        hero.add_status_effect(
            StatusEffect::new("Renew", EffectCategory::Hot)
                .with_stat(StatKind::Health, 8.0)
                .with_duration(5),
            0.0,
        );
        hero.add_status_effect(
            StatusEffect::new("Clarity", EffectCategory::ResourceRegen)
                .with_stat(StatKind::Mana, 6.0)
                .with_duration(5),
            0.0,
        );
        hero.update(1.0);
        assert_eq!(hero.stats().health(), 58.0);
        // 6 from the tick, 2 from regeneration.
        assert_eq!(hero.stats().mana(), 8.0);
    }

    #[test]
    fn test_non_stacking_duplicate_keeps_stronger() {
        let mut hero = actor("hero", ActorRole::player());
        let weak = StatusEffect::new("Might", EffectCategory::Buff)
            .with_stat(StatKind::Strength, 0.1)
            .with_duration(3);
        let strong = StatusEffect::new("Might", EffectCategory::Buff)
            .with_stat(StatKind::Strength, 0.5)
            .with_duration(2);

        hero.add_status_effect(weak.clone(), 0.0);
        hero.add_status_effect(strong, 0.0);
        assert_eq!(hero.effects().len(), 1);
        assert!((hero.stats().strength() - 15.0).abs() < 1e-4);

        hero.add_status_effect(weak.with_duration(9), 0.0);
        assert_eq!(hero.effects()[0].remaining(), Some(9));
        assert!((hero.stats().strength() - 15.0).abs() < 1e-4);
    }

    #[test]
    fn test_stacking_effects_accumulate() {
        let mut hero = actor("hero", ActorRole::player());
        let stack = StatusEffect::new("Sunder", EffectCategory::Debuff)
            .with_stat(StatKind::Defense, -0.2)
            .with_duration(3)
            .stacking();
        hero.add_status_effect(stack.clone(), 0.0);
        hero.add_status_effect(stack, 0.0);
        assert_eq!(hero.effects().len(), 2);
        assert_eq!(hero.remove_status_effect("Sunder"), 2);
        assert!((hero.stats().defense() - 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_cleanse_by_category() {
        let mut hero = actor("hero", ActorRole::player());
        hero.add_status_effect(
            StatusEffect::new("Weak", EffectCategory::Debuff)
                .with_stat(StatKind::Strength, -0.5)
                .with_duration(3),
            0.0,
        );
        hero.add_status_effect(
            StatusEffect::new("Haste", EffectCategory::Buff)
                .with_stat(StatKind::Agility, 0.5)
                .with_duration(3),
            0.0,
        );
        assert_eq!(hero.cleanse(EffectCategory::Debuff), 1);
        assert_eq!(hero.stats().strength(), 10.0);
        assert!(hero.has_effect("Haste"));
    }

    #[test]
    fn test_stunning_effect() {
        let mut goblin = actor("goblin", ActorRole::enemy());
        assert!(!goblin.is_stunned());
        goblin.add_status_effect(
            StatusEffect::new("Daze", EffectCategory::Debuff)
                .stunning()
                .with_duration(2),
            0.0,
        );
        assert!(goblin.is_stunned());
        goblin.update(1.0);
        goblin.update(2.0);
        assert!(!goblin.is_stunned());
    }

    #[test]
    fn test_equipment_in_current_stats() {
        let equipment = Arc::new(EquipmentSet::new());
        equipment.set_stat_bonus(StatKind::Defense, 10.0);
        equipment.set_stat_bonus(StatKind::MaxHealth, 20.0);
        let hero = actor("hero", ActorRole::player()).with_equipment(equipment);
        let current = hero.current_stats();
        assert_eq!(current.defense(), 15.0);
        assert_eq!(current.max_health(), 120.0);
        assert_eq!(hero.stats().defense(), 5.0);
    }

    #[test]
    fn test_attack_ready() {
        let mut hero = actor("hero", ActorRole::player()).with_attack_cooldown(1.5);
        assert!(hero.attack_ready(0.0));
        assert!(!hero.attack_ready(1.0));
        assert!(hero.attack_ready(1.5));
    }

    fn slash() -> Ability {
        Ability::new("slash", "Slash")
            .with_damage(20.0, DamageType::Physical)
            .with_cost(AbilityCost::stamina(30.0))
            .with_cooldown(3.0)
            .with_range(Some(2.0))
    }

    #[test]
    fn test_use_ability_spends_and_cools_down() {
        let mut hero = actor("hero", ActorRole::player()).with_ability(slash());
        let mut goblin = actor("goblin", ActorRole::enemy()).with_position(Position::flat(1.0, 0.0));

        let outcome = hero.use_ability("slash", AbilityTarget::actor(&mut goblin), 0.0);
        assert!(outcome.success, "{}", outcome.message);
        assert_eq!(hero.stats().stamina(), 70.0);
        assert!(goblin.stats().health() < 100.0);
        assert!(matches!(
            outcome.effects[0],
            AbilityEffect::Damage { aoe: false, .. }
        ));
        assert!(matches!(
            hero.can_use_ability("slash", 1.0),
            Err(UsageError::OnCooldown { .. })
        ));
        assert_eq!(hero.statistics().abilities_used, 1);
    }

    #[test]
    fn test_out_of_range_costs_nothing() {
        let mut hero = actor("hero", ActorRole::player()).with_ability(slash());
        let mut goblin = actor("goblin", ActorRole::enemy()).with_position(Position::flat(5.0, 0.0));

        let outcome = hero.use_ability("slash", AbilityTarget::actor(&mut goblin), 0.0);
        assert!(!outcome.success);
        assert!(matches!(outcome.error, Some(UsageError::OutOfRange { .. })));
        assert_eq!(hero.stats().stamina(), 100.0);
        assert!(hero.can_use_ability("slash", 0.0).is_ok());
    }

    #[test]
    fn test_usage_failures() {
        let mut hero = actor("hero", ActorRole::player()).with_ability(
            slash()
                .with_cost(AbilityCost { stamina: 0.0, mana: 10.0 })
                .with_requirements(Requirements {
                    level: 1,
                    ..Requirements::default()
                }),
        );
        assert!(matches!(
            hero.can_use_ability("nope", 0.0),
            Err(UsageError::UnknownAbility(_))
        ));
        assert!(matches!(
            hero.can_use_ability("slash", 0.0),
            Err(UsageError::InsufficientMana { .. })
        ));

        hero.stats = steady().with_mana(20.0);
        assert!(hero.can_use_ability("slash", 0.0).is_ok());

        hero.die();
        assert!(matches!(hero.can_use_ability("slash", 0.0), Err(UsageError::Dead(_))));
    }

    #[test]
    fn test_requirements() {
        let mut reqs = Requirements {
            level: 3,
            ..Requirements::default()
        };
        reqs.stats.insert(StatKind::Intelligence, 12.0);
        reqs.skills.insert(SkillRef::new("magic", "destruction"), 1);
        reqs.items.insert(ItemId::new("focus"), 1);
        let ability = Ability::new("bolt", "Bolt").with_requirements(reqs);

        let equipment = Arc::new(EquipmentSet::new());
        let mut hero = actor("hero", ActorRole::player())
            .with_ability(ability)
            .with_equipment(equipment.clone());

        let denied = |hero: &Actor| match hero.can_use_ability("bolt", 0.0) {
            Err(UsageError::RequirementsNotMet(reason)) => reason,
            other => panic!("expected requirements error, got {other:?}"),
        };
        assert_eq!(denied(&hero), "requires level 3");

        hero.level = 3;
        assert_eq!(denied(&hero), "requires intelligence 12");

        equipment.set_stat_bonus(StatKind::Intelligence, 5.0);
        assert_eq!(denied(&hero), "requires magic.destruction level 1");

        if let Some(profile) = hero.role_mut().as_player_mut() {
            profile.skills.add_skill(&SkillRef::new("magic", "destruction"), 1);
        }
        assert_eq!(denied(&hero), "requires 1x focus");

        equipment.add_item(ItemId::new("focus"), 1);
        assert!(hero.can_use_ability("bolt", 0.0).is_ok());
    }

    #[test]
    fn test_skill_scaling_and_experience() {
        let destruction = SkillRef::new("magic", "destruction");
        let bolt = Ability::new("bolt", "Bolt")
            .with_damage(10.0, DamageType::Magical)
            .with_range(None)
            .with_skill(destruction.clone());
        let mut hero = actor("hero", ActorRole::player())
            .with_ability(bolt)
            .with_stats(steady().with(StatKind::Intelligence, 0.0));
        if let Some(profile) = hero.role_mut().as_player_mut() {
            profile.skills.add_skill(&destruction, 5);
        }
        let info = hero.ability_info("bolt", 0.0).expect("known");
        assert!((info.modified_damage - 15.0).abs() < 1e-4);
        assert!(info.can_use);

        let mut dummy = actor("dummy", ActorRole::enemy())
            .with_stats(steady().with(StatKind::Defense, 0.0))
            .with_position(Position::flat(100.0, 0.0));
        let outcome = hero.use_ability("bolt", AbilityTarget::actor(&mut dummy), 0.0);
        assert!((outcome.total_damage() - 15.0).abs() < 1e-4);

        let gained = hero
            .role()
            .as_player()
            .and_then(|p| p.skills.experience(&destruction));
        assert_eq!(gained, Some(ABILITY_SKILL_EXPERIENCE));
    }

    #[test]
    fn test_repeated_use_reports_unlock() {
        let fire = SkillRef::new("magic", "fire");
        let spark = Ability::new("spark", "Spark").with_skill(fire.clone());
        let mut hero = actor("hero", ActorRole::player()).with_ability(spark);
        if let Some(profile) = hero.role_mut().as_player_mut() {
            profile.skills = SkillSet::empty()
                .with_skill(fire.clone(), 1)
                .with_unlock(fire.clone(), 2, "inferno");
        }

        let uses = skill_experience_for_level(1).div_ceil(ABILITY_SKILL_EXPERIENCE);
        for _ in 1..uses {
            let outcome = hero.use_ability("spark", AbilityTarget::none(), 0.0);
            assert!(outcome.success, "{}", outcome.message);
            assert_eq!(outcome.unlocked().count(), 0);
        }

        let outcome = hero.use_ability("spark", AbilityTarget::none(), 0.0);
        let unlocked: Vec<_> = outcome.unlocked().cloned().collect();
        assert_eq!(unlocked, vec![AbilityId::new("inferno")]);
        assert!(outcome.effects.contains(&AbilityEffect::SkillUp {
            skill: fire.clone(),
            level: 2,
            unlocked,
        }));
        assert_eq!(hero.skill_level(&fire), 2);
    }

    #[test]
    fn test_dodged_ability_still_cools_down() {
        let mut hero = actor("hero", ActorRole::player()).with_ability(slash());
        let mut ghost = actor("ghost", ActorRole::enemy());
        ghost.add_status_effect(
            StatusEffect::new("Phase", EffectCategory::Buff)
                .with_modifier(ModifierKey::DodgeBonus, 1.0)
                .permanent(),
            0.0,
        );

        let mut now = 0.0;
        let mut outcome = AbilityOutcome::succeeded(String::new(), Vec::new());
        for _ in 0..50 {
            ghost.stats.set(StatKind::Health, 100.0);
            outcome = hero.use_ability("slash", AbilityTarget::actor(&mut ghost), now);
            if !outcome.success {
                break;
            }
            now += 3.0;
            hero.update(now);
            hero.stats.set(StatKind::Stamina, 100.0);
        }
        assert!(!outcome.success);
        assert!(outcome.error.is_none());
        assert!(outcome.message.contains("dodged"));
        assert!(hero.is_on_cooldown("slash", now));
    }

    #[test]
    fn test_area_damage_hits_secondary_targets() {
        let nova = Ability::new("nova", "Nova")
            .with_damage(20.0, DamageType::Fire)
            .with_range(None)
            .with_area(5.0)
            .with_visual(serde_json::json!({"sprite": "ring"}));
        let mut hero = actor("hero", ActorRole::player())
            .with_ability(nova)
            .with_stats(steady().with(StatKind::Intelligence, 0.0));
        let mut primary = actor("primary", ActorRole::enemy()).with_stats(steady().with(StatKind::Defense, 0.0));
        let mut crowd = vec![
            actor("near", ActorRole::enemy())
                .with_stats(steady().with(StatKind::Defense, 0.0))
                .with_position(Position::flat(2.0, 0.0)),
            actor("far", ActorRole::enemy()).with_position(Position::flat(50.0, 0.0)),
            actor("primary", ActorRole::enemy()),
        ];

        let target = AbilityTarget::actor(&mut primary).with_area(&mut crowd);
        let outcome = hero.use_ability("nova", target, 0.0);

        assert!(outcome.success);
        let aoe_hits: Vec<_> = outcome
            .effects
            .iter()
            .filter_map(|e| match e {
                AbilityEffect::Damage { target, amount, aoe: true, .. } => Some((target.clone(), *amount)),
                _ => None,
            })
            .collect();
        assert_eq!(aoe_hits, vec![(ActorId::new("near"), 10.0)]);
        assert!(matches!(outcome.effects.last(), Some(AbilityEffect::Visual { .. })));
        assert_eq!(crowd[1].stats().health(), 100.0);
    }

    #[test]
    fn test_ability_effects_go_to_target_or_self() {
        let poison_blade = Ability::new("poison_blade", "Poison Blade").with_effect(
            StatusEffect::new("Poison", EffectCategory::Dot)
                .with_stat(StatKind::Health, -5.0)
                .with_duration(3),
        );
        let war_cry = Ability::new("war_cry", "War Cry").with_self_effect(
            StatusEffect::new("Fury", EffectCategory::Buff)
                .with_stat(StatKind::Strength, 0.5)
                .with_duration(3),
        );
        let mut hero = actor("hero", ActorRole::player())
            .with_ability(poison_blade)
            .with_ability(war_cry);
        let mut goblin = actor("goblin", ActorRole::enemy());

        assert!(hero
            .use_ability("poison_blade", AbilityTarget::actor(&mut goblin), 0.0)
            .success);
        assert!(goblin.has_effect("Poison"));

        assert!(hero.use_ability("poison_blade", AbilityTarget::none(), 1.0).success);
        assert!(hero.has_effect("Poison"));

        assert!(hero.use_ability("war_cry", AbilityTarget::actor(&mut goblin), 1.0).success);
        assert!(hero.has_effect("Fury"));
        assert!(!goblin.has_effect("Fury"));
    }

    #[test]
    fn test_cooldown_reduction() {
        let mut hero = actor("hero", ActorRole::player()).with_ability(slash().with_range(None));
        if let Some(profile) = hero.role_mut().as_player_mut() {
            profile.cooldown_reduction = 0.5;
        }
        assert!(hero.use_ability("slash", AbilityTarget::none(), 0.0).success);
        assert!((hero.cooldown_remaining("slash", 0.0) - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_use_item() {
        let equipment = Arc::new(EquipmentSet::new());
        let potion = ItemId::new("potion");
        equipment.add_item(potion.clone(), 1);
        equipment.define_consumable(
            potion.clone(),
            Consumable::new("Health Potion")
                .with_healing(30.0)
                .with_restore(Resource::Stamina, 10.0),
        );
        let mut hero = actor("hero", ActorRole::player()).with_equipment(equipment);
        hero.stats.set(StatKind::Health, 50.0);
        hero.stats.set(StatKind::Stamina, 50.0);

        let message = hero.use_item(&potion, 0.0).expect("usable");
        assert!(message.starts_with("Used Health Potion"));
        assert_eq!(hero.stats().health(), 80.0);
        assert_eq!(hero.stats().stamina(), 60.0);
        assert_eq!(
            hero.use_item(&potion, 0.0),
            Err(UsageError::ItemUnavailable(potion))
        );
    }

    #[test]
    fn test_get_state() {
        let mut hero = actor("hero", ActorRole::player()).with_ability(slash().with_range(None));
        hero.use_ability("slash", AbilityTarget::none(), 0.0);
        hero.add_status_effect(
            StatusEffect::new("Might", EffectCategory::Buff)
                .with_stat(StatKind::Strength, 0.1)
                .with_duration(4),
            0.0,
        );

        let state = hero.get_state(1.0);
        assert_eq!(state.schema, SchemaVersion::ACTOR_STATE);
        assert_eq!(state.kind, ActorKind::Player);
        assert_eq!(state.cooldowns.get("slash"), Some(&2.0));
        assert_eq!(state.status_effects[0].remaining, Some(4));
        assert!(state.player.is_some());
        assert!(state.inventory.is_none());

        let json = serde_json::to_value(&state).expect("serialize");
        assert_eq!(json["status_effects"][0]["category"], "buff");
        assert_eq!(json["player"]["skills"]["combat.melee"], 0);
    }
}
