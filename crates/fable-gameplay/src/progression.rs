//! Actor roles and player progression.
//!
//! This module provides:
//! - [`ActorRole`], the tagged role of an actor with its role-specific data
//! - [`SkillSet`], the player's skill tree (a [`SkillProvider`])
//! - Experience curves, level-ups, skill points and resting

use crate::abilities::SkillRef;
use crate::actor::Actor;
use crate::combat_stats::{Resource, StatKind};
use crate::providers::SkillProvider;
use fable_common::AbilityId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info};

/// Skill experience granted each time an ability with a scaling skill is used.
pub const ABILITY_SKILL_EXPERIENCE: u64 = 10;

/// Skill points granted per level.
pub const SKILL_POINTS_PER_LEVEL: u32 = 3;

/// Talent points granted per level.
pub const TALENT_POINTS_PER_LEVEL: u32 = 1;

// ============================================================================
// Curves
// ============================================================================

/// Experience needed to advance from `level` to the next.
#[must_use]
pub fn experience_for_level(level: u32) -> u64 {
    (100.0 * f64::from(level.max(1)).powf(1.5)).floor() as u64
}

/// Skill experience needed to advance a skill from `level` to the next.
///
/// Level 0 uses the level-1 threshold.
#[must_use]
pub fn skill_experience_for_level(level: u32) -> u64 {
    (75.0 * f64::from(level.max(1)).powf(1.8)).floor() as u64
}

// ============================================================================
// Errors
// ============================================================================

/// Reasons a progression request is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProgressionError {
    /// Only players progress.
    #[error("{0} cannot gain experience")]
    NotAPlayer(String),

    /// The skill does not exist in the tree.
    #[error("Unknown skill {0}")]
    UnknownSkill(SkillRef),

    /// Not enough unspent skill points.
    #[error("Not enough skill points ({available}/{required})")]
    NotEnoughPoints {
        /// Points requested.
        required: u32,
        /// Points held.
        available: u32,
    },

    /// The skill is already at the point-spending cap.
    #[error("{0} is already at its maximum level")]
    SkillMaxed(SkillRef),

    /// Resting is not allowed during combat.
    #[error("Cannot rest during combat")]
    InCombat,

    /// The actor is dead.
    #[error("{0} is dead")]
    Dead(String),
}

// ============================================================================
// Skill Set
// ============================================================================

/// An ability unlocked when a skill reaches a level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillUnlock {
    /// Skill that must reach `level`.
    pub skill: SkillRef,
    /// Level that unlocks the ability.
    pub level: u32,
    /// Ability unlocked.
    pub ability: AbilityId,
}

/// Result of raising a skill.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkillAdvance {
    /// Level before.
    pub from: u32,
    /// Level after.
    pub to: u32,
    /// Abilities unlocked along the way.
    pub unlocked: Vec<AbilityId>,
}

impl SkillAdvance {
    /// Whether the skill levelled up.
    #[must_use]
    pub fn leveled(&self) -> bool {
        self.to > self.from
    }
}

/// Skill levels and experience by category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillSet {
    levels: BTreeMap<String, BTreeMap<String, u32>>,
    experience: BTreeMap<String, BTreeMap<String, u64>>,
    unlocks: Vec<SkillUnlock>,
}

impl Default for SkillSet {
    fn default() -> Self {
        let mut set = Self::empty();
        for skill in ["melee", "ranged", "defense", "critical_mastery"] {
            set.add_skill(&SkillRef::new("combat", skill), 0);
        }
        for skill in ["destruction", "restoration"] {
            set.add_skill(&SkillRef::new("magic", skill), 0);
        }
        set
    }
}

impl SkillSet {
    /// Create a tree with no skills.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            levels: BTreeMap::new(),
            experience: BTreeMap::new(),
            unlocks: Vec::new(),
        }
    }

    /// Add a skill at a starting level.
    pub fn add_skill(&mut self, skill: &SkillRef, level: u32) {
        self.levels
            .entry(skill.category.clone())
            .or_default()
            .insert(skill.skill.clone(), level);
        self.experience
            .entry(skill.category.clone())
            .or_default()
            .insert(skill.skill.clone(), 0);
    }

    /// Add a skill (builder pattern).
    #[must_use]
    pub fn with_skill(mut self, skill: SkillRef, level: u32) -> Self {
        self.add_skill(&skill, level);
        self
    }

    /// Register an ability unlock.
    #[must_use]
    pub fn with_unlock(mut self, skill: SkillRef, level: u32, ability: impl Into<AbilityId>) -> Self {
        self.unlocks.push(SkillUnlock {
            skill,
            level,
            ability: ability.into(),
        });
        self
    }

    /// Whether the skill exists.
    #[must_use]
    pub fn knows(&self, skill: &SkillRef) -> bool {
        self.level(skill).is_some()
    }

    /// Current level of a skill.
    #[must_use]
    pub fn level(&self, skill: &SkillRef) -> Option<u32> {
        self.levels
            .get(&skill.category)
            .and_then(|skills| skills.get(&skill.skill))
            .copied()
    }

    /// Accumulated experience toward the next level.
    #[must_use]
    pub fn experience(&self, skill: &SkillRef) -> Option<u64> {
        self.experience
            .get(&skill.category)
            .and_then(|skills| skills.get(&skill.skill))
            .copied()
    }

    fn set_level(&mut self, skill: &SkillRef, level: u32) {
        if let Some(slot) = self
            .levels
            .get_mut(&skill.category)
            .and_then(|skills| skills.get_mut(&skill.skill))
        {
            *slot = level;
        }
    }

    fn unlocked_between(&self, skill: &SkillRef, from: u32, to: u32) -> Vec<AbilityId> {
        self.unlocks
            .iter()
            .filter(|u| &u.skill == skill && u.level > from && u.level <= to)
            .map(|u| u.ability.clone())
            .collect()
    }

    /// Add experience to a skill, levelling it as thresholds are crossed.
    pub fn gain_experience(&mut self, skill: &SkillRef, amount: u64) -> Result<SkillAdvance, ProgressionError> {
        let from = self
            .level(skill)
            .ok_or_else(|| ProgressionError::UnknownSkill(skill.clone()))?;

        let mut level = from;
        let mut pool = self.experience(skill).unwrap_or(0) + amount;
        loop {
            let needed = skill_experience_for_level(level);
            if pool < needed {
                break;
            }
            pool -= needed;
            level += 1;
        }

        self.set_level(skill, level);
        if let Some(slot) = self
            .experience
            .get_mut(&skill.category)
            .and_then(|skills| skills.get_mut(&skill.skill))
        {
            *slot = pool;
        }

        Ok(SkillAdvance {
            from,
            to: level,
            unlocked: self.unlocked_between(skill, from, level),
        })
    }

    /// Raise a skill by up to `points` levels, stopping at `cap`.
    ///
    /// Returns the advance and the number of points actually used.
    pub fn raise(&mut self, skill: &SkillRef, points: u32, cap: u32) -> Result<(SkillAdvance, u32), ProgressionError> {
        let from = self
            .level(skill)
            .ok_or_else(|| ProgressionError::UnknownSkill(skill.clone()))?;
        if from >= cap {
            return Err(ProgressionError::SkillMaxed(skill.clone()));
        }
        let used = points.min(cap - from);
        let to = from + used;
        self.set_level(skill, to);
        Ok((
            SkillAdvance {
                from,
                to,
                unlocked: self.unlocked_between(skill, from, to),
            },
            used,
        ))
    }

    /// All skills with their levels.
    pub fn iter(&self) -> impl Iterator<Item = (SkillRef, u32)> + '_ {
        self.levels.iter().flat_map(|(category, skills)| {
            skills
                .iter()
                .map(move |(skill, level)| (SkillRef::new(category.clone(), skill.clone()), *level))
        })
    }
}

impl SkillProvider for SkillSet {
    fn skill_level(&self, category: &str, skill: &str) -> u32 {
        self.levels
            .get(category)
            .and_then(|skills| skills.get(skill))
            .copied()
            .unwrap_or(0)
    }
}

// ============================================================================
// Roles
// ============================================================================

/// Discriminant of [`ActorRole`], used in content and snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    /// Player-controlled.
    Player,
    /// Non-hostile character.
    Npc,
    /// Hostile creature.
    Enemy,
}

impl ActorKind {
    /// Content name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Player => "player",
            Self::Npc => "npc",
            Self::Enemy => "enemy",
        }
    }

    /// Look up a kind by content name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        [Self::Player, Self::Npc, Self::Enemy]
            .into_iter()
            .find(|k| k.name() == name)
    }
}

/// Player-only progression data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerProfile {
    /// Skill tree.
    pub skills: SkillSet,
    /// Experience toward the next level.
    pub experience: u64,
    /// Unspent skill points.
    pub skill_points: u32,
    /// Unspent talent points.
    pub talent_points: u32,
    /// Fraction shaved off ability cooldowns.
    pub cooldown_reduction: f32,
}

/// Enemy-only data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnemyProfile {
    /// Experience granted to the victor.
    pub experience_reward: u64,
    /// Scales how eagerly abilities are used in combat.
    pub aggression: f32,
    /// Set on death; the owner drops loot and clears it.
    pub loot_ready: bool,
}

impl Default for EnemyProfile {
    fn default() -> Self {
        Self {
            experience_reward: 10,
            aggression: 1.0,
            loot_ready: false,
        }
    }
}

/// NPC-only data. Dialogue and schedules live elsewhere.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NpcProfile {
    /// Faction label.
    pub faction: String,
    /// Behaviour label.
    pub behavior: String,
}

/// What kind of actor this is, with role-specific data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActorRole {
    /// Player character.
    Player(PlayerProfile),
    /// Non-hostile character.
    Npc(NpcProfile),
    /// Hostile creature.
    Enemy(EnemyProfile),
}

impl ActorRole {
    /// A fresh level-1 player.
    #[must_use]
    pub fn player() -> Self {
        Self::Player(PlayerProfile::default())
    }

    /// A default enemy.
    #[must_use]
    pub fn enemy() -> Self {
        Self::Enemy(EnemyProfile::default())
    }

    /// A default NPC.
    #[must_use]
    pub fn npc() -> Self {
        Self::Npc(NpcProfile::default())
    }

    /// Discriminant.
    #[must_use]
    pub fn kind(&self) -> ActorKind {
        match self {
            Self::Player(_) => ActorKind::Player,
            Self::Npc(_) => ActorKind::Npc,
            Self::Enemy(_) => ActorKind::Enemy,
        }
    }

    /// Skill source, for roles that have skills.
    #[must_use]
    pub fn skills(&self) -> Option<&dyn SkillProvider> {
        match self {
            Self::Player(profile) => Some(&profile.skills),
            _ => None,
        }
    }

    /// Player profile, if this is a player.
    #[must_use]
    pub fn as_player(&self) -> Option<&PlayerProfile> {
        match self {
            Self::Player(profile) => Some(profile),
            _ => None,
        }
    }

    /// Mutable player profile.
    pub fn as_player_mut(&mut self) -> Option<&mut PlayerProfile> {
        match self {
            Self::Player(profile) => Some(profile),
            _ => None,
        }
    }

    /// Enemy profile, if this is an enemy.
    #[must_use]
    pub fn as_enemy(&self) -> Option<&EnemyProfile> {
        match self {
            Self::Enemy(profile) => Some(profile),
            _ => None,
        }
    }

    /// Mutable enemy profile.
    pub fn as_enemy_mut(&mut self) -> Option<&mut EnemyProfile> {
        match self {
            Self::Enemy(profile) => Some(profile),
            _ => None,
        }
    }
}

// ============================================================================
// Player progression
// ============================================================================

/// Result of [`Actor::gain_experience`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LevelReport {
    /// Levels gained.
    pub levels_gained: u32,
    /// Level after.
    pub level: u32,
    /// Human-readable lines.
    pub messages: Vec<String>,
}

/// Amounts restored by [`Actor::rest`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RestReport {
    /// Health restored.
    pub health: f32,
    /// Stamina restored.
    pub stamina: f32,
    /// Mana restored.
    pub mana: f32,
}

impl Actor {
    fn player_profile_mut(&mut self) -> Result<&mut PlayerProfile, ProgressionError> {
        let name = self.name.clone();
        self.role
            .as_player_mut()
            .ok_or(ProgressionError::NotAPlayer(name))
    }

    /// Experience needed for the next level.
    #[must_use]
    pub fn experience_to_next_level(&self) -> u64 {
        experience_for_level(self.level)
    }

    /// Add experience, levelling up as many times as it allows.
    pub fn gain_experience(&mut self, amount: u64) -> Result<LevelReport, ProgressionError> {
        let mut report = LevelReport {
            messages: vec![format!("Gained {amount} experience")],
            ..LevelReport::default()
        };
        self.player_profile_mut()?.experience += amount;

        loop {
            let needed = experience_for_level(self.level);
            let profile = self.player_profile_mut()?;
            if profile.experience < needed {
                break;
            }
            profile.experience -= needed;
            self.level_up();
            report.levels_gained += 1;
            report.messages.push(format!("Reached level {}", self.level));
        }
        report.level = self.level;
        Ok(report)
    }

    /// Advance one level: points, stat growth and a full restore.
    ///
    /// Non-players only gain the level and stats.
    pub fn level_up(&mut self) {
        self.level += 1;
        if let Some(profile) = self.role.as_player_mut() {
            profile.skill_points += SKILL_POINTS_PER_LEVEL;
            profile.talent_points += TALENT_POINTS_PER_LEVEL;
        }

        for (kind, increase) in [
            (StatKind::MaxHealth, 10.0),
            (StatKind::MaxStamina, 5.0),
            (StatKind::MaxMana, 5.0),
            (StatKind::Strength, 1.0),
            (StatKind::Defense, 1.0),
            (StatKind::Agility, 1.0),
            (StatKind::Intelligence, 1.0),
        ] {
            self.stats.modify_stat(kind, increase, false);
        }
        self.stats.restore_all();
        info!("{} reached level {}", self.name, self.level);
    }

    /// Spend skill points on a skill, up to the configured cap.
    pub fn spend_skill_points(&mut self, skill: &SkillRef, points: u32) -> Result<SkillAdvance, ProgressionError> {
        let cap = self.config.max_skill_level;
        let profile = self.player_profile_mut()?;
        if points > profile.skill_points {
            return Err(ProgressionError::NotEnoughPoints {
                required: points,
                available: profile.skill_points,
            });
        }
        let (advance, used) = profile.skills.raise(skill, points, cap)?;
        profile.skill_points -= used;
        debug!("{} raised {} to {}", self.name, skill, advance.to);
        Ok(advance)
    }

    /// Add experience to a skill.
    pub fn gain_skill_experience(&mut self, skill: &SkillRef, amount: u64) -> Result<SkillAdvance, ProgressionError> {
        let advance = self.player_profile_mut()?.skills.gain_experience(skill, amount)?;
        if advance.leveled() {
            info!("{}'s {} reached level {}", self.name, skill, advance.to);
        }
        Ok(advance)
    }

    /// Recover resources outside combat: 10%, 20% and 15% of max health,
    /// stamina and mana per unit of `duration`.
    pub fn rest(&mut self, duration: u32) -> Result<RestReport, ProgressionError> {
        if !self.alive {
            return Err(ProgressionError::Dead(self.name.clone()));
        }
        if self.in_combat {
            return Err(ProgressionError::InCombat);
        }
        self.player_profile_mut()?;

        let units = duration as f32;
        let mut restore = |resource: Resource, rate: f32| {
            let amount = units * self.stats.resource_max(resource) * rate;
            self.stats.restore(resource, amount)
        };
        Ok(RestReport {
            health: restore(Resource::Health, 0.1),
            stamina: restore(Resource::Stamina, 0.2),
            mana: restore(Resource::Mana, 0.15),
        })
    }
}
