//! Turn-based combat sessions.
//!
//! This module provides:
//! - [`CombatSession`], a player-versus-enemy encounter
//! - Per-side transient state (stance, combat stamina, combo)
//! - The combat log and session statistics
//!
//! A session borrows both participants for its lifetime and changes them only
//! through [`Actor`] methods. Once finished, no action touches either side.

use crate::abilities::{AbilityEffect, AbilityOutcome, SkillRef};
use crate::actor::{AbilityTarget, Actor};
use crate::config::SimConfig;
use crate::damage_calc::{DamageOutcome, DamageType, Strike};
use fable_common::{AbilityId, ActorId, CombatId, ItemId, SchemaVersion, SimTime};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

// ============================================================================
// Types
// ============================================================================

/// Where the session is in its turn cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatPhase {
    /// Participants are being prepared.
    Initializing,
    /// Waiting for a player action.
    PlayerTurn,
    /// Waiting for the enemy to act.
    EnemyTurn,
    /// Over; no further mutation.
    Finished,
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatOutcome {
    /// The enemy died.
    Victory,
    /// The player died.
    Defeat,
    /// The player got away.
    Escaped,
    /// Ended from outside with both sides alive.
    Interrupted,
}

/// Combat log severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogCategory {
    /// Session lifecycle.
    System,
    /// Neutral information.
    Info,
    /// Good for the player.
    Success,
    /// Bad for the player.
    Warning,
    /// Refused or broken action.
    Error,
}

/// One combat log line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Text.
    pub message: String,
    /// Severity.
    pub category: LogCategory,
    /// Turn the entry was written in.
    pub turn: u32,
    /// Simulation time.
    pub time: SimTime,
}

/// Combat-only state for one side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatantState {
    /// Extra defense from the defensive stance.
    pub defense_bonus: f32,
    /// Combat stamina pool.
    pub stamina: f32,
    /// Pool maximum.
    pub max_stamina: f32,
    /// Consecutive landed basic attacks.
    pub combo: u32,
    /// Critical chance when combat began.
    pub crit_chance: f32,
    /// Dodge chance when combat began.
    pub dodge_chance: f32,
    /// AI aggression scalar (1.0 for the player).
    pub aggression: f32,
}

impl CombatantState {
    fn snapshot(actor: &Actor, stamina: f32, aggression: f32) -> Self {
        Self {
            defense_bonus: 0.0,
            stamina,
            max_stamina: stamina,
            combo: 0,
            crit_chance: actor.critical_chance(),
            dodge_chance: actor.dodge_chance(),
            aggression,
        }
    }
}

/// Per-session counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Enemy turns taken.
    pub rounds: u32,
    /// Critical hits by either side.
    pub critical_hits: u32,
    /// Damage the player dealt.
    pub player_damage_dealt: f32,
    /// Damage the enemy dealt.
    pub enemy_damage_dealt: f32,
}

/// A player command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum PlayerAction {
    /// Basic weapon attack.
    Attack,
    /// Take a defensive stance.
    Defend,
    /// Use a learned ability on the enemy.
    UseAbility(AbilityId),
    /// Use a consumable.
    UseItem(ItemId),
    /// Try to flee.
    Escape,
}

/// Result of a player command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    /// Whether the action was taken.
    pub accepted: bool,
    /// Human-readable result or refusal reason.
    pub message: String,
}

impl ActionResult {
    fn accepted(message: impl Into<String>) -> Self {
        Self {
            accepted: true,
            message: message.into(),
        }
    }

    fn rejected(message: impl Into<String>) -> Self {
        Self {
            accepted: false,
            message: message.into(),
        }
    }
}

/// Serializable snapshot of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatState {
    /// Snapshot shape.
    pub schema: SchemaVersion,
    /// Session id.
    pub id: CombatId,
    /// Player id.
    pub player: ActorId,
    /// Enemy id.
    pub enemy: ActorId,
    /// Turn counter.
    pub turn: u32,
    /// Phase.
    pub phase: CombatPhase,
    /// Player-side state.
    pub player_status: CombatantState,
    /// Enemy-side state.
    pub enemy_status: CombatantState,
    /// Counters.
    pub stats: SessionStats,
    /// Whether the session is over.
    pub is_finished: bool,
    /// Winner, if any.
    pub winner: Option<ActorId>,
    /// Outcome once ended.
    pub outcome: Option<CombatOutcome>,
}

// ============================================================================
// Combat Session
// ============================================================================

/// A turn-based encounter between a player and an enemy.
pub struct CombatSession<'a> {
    id: CombatId,
    player: &'a mut Actor,
    enemy: &'a mut Actor,
    config: Arc<SimConfig>,
    phase: CombatPhase,
    turn: u32,
    started_at: SimTime,
    last_action: SimTime,
    ended_at: Option<SimTime>,
    outcome: Option<CombatOutcome>,
    player_state: CombatantState,
    enemy_state: CombatantState,
    log: Vec<LogEntry>,
    stats: SessionStats,
    combat_effects: Vec<String>,
    rng: fastrand::Rng,
}

impl std::fmt::Debug for CombatSession<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CombatSession")
            .field("id", &self.id)
            .field("player", self.player.id())
            .field("enemy", self.enemy.id())
            .field("phase", &self.phase)
            .field("turn", &self.turn)
            .field("outcome", &self.outcome)
            .finish_non_exhaustive()
    }
}

impl<'a> CombatSession<'a> {
    /// Start a session outside any registry.
    pub fn start(player: &'a mut Actor, enemy: &'a mut Actor, now: SimTime) -> Self {
        Self::start_with(CombatId::DETACHED, player, enemy, fastrand::Rng::new(), now)
    }

    /// Start a session with a seeded random source.
    pub fn start_seeded(player: &'a mut Actor, enemy: &'a mut Actor, seed: u64, now: SimTime) -> Self {
        Self::start_with(CombatId::DETACHED, player, enemy, fastrand::Rng::with_seed(seed), now)
    }

    pub(crate) fn start_with(
        id: CombatId,
        player: &'a mut Actor,
        enemy: &'a mut Actor,
        mut rng: fastrand::Rng,
        now: SimTime,
    ) -> Self {
        let config = Arc::clone(player.config());
        let temperament = enemy.role().as_enemy().map_or(1.0, |e| e.aggression);
        let aggression = temperament
            * (config.aggression_min + rng.f32() * (config.aggression_max - config.aggression_min));
        let player_state = CombatantState::snapshot(player, config.combat_stamina_max, 1.0);
        let enemy_state = CombatantState::snapshot(enemy, config.combat_stamina_max, aggression);

        let mut session = Self {
            id,
            player,
            enemy,
            config,
            phase: CombatPhase::Initializing,
            turn: 1,
            started_at: now,
            last_action: now,
            ended_at: None,
            outcome: None,
            player_state,
            enemy_state,
            log: Vec::new(),
            stats: SessionStats::default(),
            combat_effects: Vec::new(),
            rng,
        };
        session.initialize(now);
        session
    }

    fn initialize(&mut self, now: SimTime) {
        self.player.set_in_combat(true);
        self.enemy.set_in_combat(true);

        let start_effects = self
            .player
            .equipment()
            .map(|e| e.combat_start_effects())
            .unwrap_or_default();
        for effect in start_effects {
            let name = effect.name.clone();
            if self.player.add_status_effect(effect, now) {
                self.log(format!("{} takes effect", name), LogCategory::Info, now);
                self.combat_effects.push(name);
            }
        }

        let message = format!(
            "Combat begins between {} and {}!",
            self.player.name(),
            self.enemy.name()
        );
        info!("{} {}", self.id, message);
        self.log(message, LogCategory::System, now);
        self.phase = CombatPhase::PlayerTurn;
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Session id.
    #[must_use]
    pub fn id(&self) -> CombatId {
        self.id
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> CombatPhase {
        self.phase
    }

    /// Turn counter, starting at 1.
    #[must_use]
    pub fn turn(&self) -> u32 {
        self.turn
    }

    /// Start time.
    #[must_use]
    pub fn started_at(&self) -> SimTime {
        self.started_at
    }

    /// End time, `None` while open.
    #[must_use]
    pub fn ended_at(&self) -> Option<SimTime> {
        self.ended_at
    }

    /// Outcome once ended.
    #[must_use]
    pub fn outcome(&self) -> Option<CombatOutcome> {
        self.outcome
    }

    /// The player.
    #[must_use]
    pub fn player(&self) -> &Actor {
        &*self.player
    }

    /// The enemy.
    #[must_use]
    pub fn enemy(&self) -> &Actor {
        &*self.enemy
    }

    /// Player-side combat state.
    #[must_use]
    pub fn player_state(&self) -> &CombatantState {
        &self.player_state
    }

    /// Enemy-side combat state.
    #[must_use]
    pub fn enemy_state(&self) -> &CombatantState {
        &self.enemy_state
    }

    /// Session counters.
    #[must_use]
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Log entries, or only the last `n`.
    #[must_use]
    pub fn combat_log(&self, last_n: Option<usize>) -> &[LogEntry] {
        match last_n {
            Some(n) => &self.log[self.log.len().saturating_sub(n)..],
            None => &self.log,
        }
    }

    fn log(&mut self, message: impl Into<String>, category: LogCategory, now: SimTime) {
        self.log.push(LogEntry {
            message: message.into(),
            category,
            turn: self.turn,
            time: now,
        });
    }

    // ------------------------------------------------------------------
    // State machine
    // ------------------------------------------------------------------

    /// Whether either side is dead or the session was ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        !self.player.is_alive() || !self.enemy.is_alive() || self.ended_at.is_some()
    }

    /// The surviving side when the other is dead.
    #[must_use]
    pub fn winner(&self) -> Option<&ActorId> {
        if !self.is_finished() {
            return None;
        }
        if !self.enemy.is_alive() {
            Some(self.player.id())
        } else if !self.player.is_alive() {
            Some(self.enemy.id())
        } else {
            None
        }
    }

    /// Advance the session clock; runs the enemy turn once it is due.
    pub fn update(&mut self, now: SimTime) {
        if self.is_finished() {
            self.phase = CombatPhase::Finished;
            return;
        }
        if self.phase == CombatPhase::EnemyTurn && now - self.last_action >= self.config.turn_duration {
            self.enemy_turn(now);
        }
    }

    /// Handle a player command.
    pub fn handle_action(&mut self, action: PlayerAction, now: SimTime) -> ActionResult {
        if self.is_finished() {
            self.phase = CombatPhase::Finished;
            return ActionResult::rejected("Combat is over");
        }
        if self.phase != CombatPhase::PlayerTurn {
            return ActionResult::rejected("Wait for your turn");
        }
        if self.player.is_stunned() {
            let message = format!("{} is stunned and loses the turn", self.player.name());
            self.log(message.clone(), LogCategory::Warning, now);
            self.pass_turn(now);
            return ActionResult::rejected(message);
        }

        let is_attack = action == PlayerAction::Attack;
        let result = match action {
            PlayerAction::Attack => self.player_attack(now),
            PlayerAction::Defend => self.player_defend(now),
            PlayerAction::UseAbility(id) => self.player_ability(&id, now),
            PlayerAction::UseItem(item) => self.player_item(&item, now),
            PlayerAction::Escape => self.player_escape(now),
        };
        if !result.accepted {
            self.log(result.message.clone(), LogCategory::Error, now);
            return result;
        }

        if !is_attack {
            self.player_state.combo = 0;
        }
        if self.ended_at.is_some() {
            return result;
        }
        if !self.enemy.is_alive() {
            self.end(now);
        } else {
            self.pass_turn(now);
        }
        result
    }

    fn pass_turn(&mut self, now: SimTime) {
        self.last_action = now;
        self.phase = CombatPhase::EnemyTurn;
    }

    fn player_attack(&mut self, now: SimTime) -> ActionResult {
        let cost = self.config.attack_stamina_cost;
        if self.player_state.stamina < cost {
            return ActionResult::rejected(format!(
                "Not enough stamina ({:.0}/{:.0})",
                self.player_state.stamina, cost
            ));
        }
        self.player_state.stamina -= cost;

        let combo_hit = self.player_state.combo + 1 >= self.config.combo_threshold;
        let multiplier = if combo_hit {
            1.0 + self.config.combo_damage_bonus
        } else {
            1.0
        };
        let base = self.player.current_stats().strength() + self.player.weapon_damage();
        let strike = Strike::new(base, DamageType::Physical)
            .with_bonus_defense(self.enemy_state.defense_bonus)
            .with_multiplier(multiplier);
        let outcome = self.player.deal_strike(self.enemy, strike);

        if outcome.dodged {
            self.player_state.combo = 0;
            let message = format!("{} dodges your attack!", self.enemy.name());
            self.log(message.clone(), LogCategory::Warning, now);
            return ActionResult::accepted(message);
        }

        self.player_state.combo += 1;
        let combo = self.player_state.combo;
        self.player.statistics_mut().record_combo(combo);
        if combo_hit {
            self.log("Combo bonus!", LogCategory::Success, now);
        }
        self.record_player_hit(&outcome, now);

        let message = format!(
            "You deal {:.1} damage{}",
            outcome.amount,
            if outcome.critical { " (Critical!)" } else { "" }
        );
        self.log(message.clone(), LogCategory::Success, now);
        ActionResult::accepted(message)
    }

    fn record_player_hit(&mut self, outcome: &DamageOutcome, now: SimTime) {
        self.stats.player_damage_dealt += outcome.amount;
        if outcome.critical {
            self.stats.critical_hits += 1;
            self.log("Critical hit!", LogCategory::Success, now);
        }
    }

    fn player_defend(&mut self, now: SimTime) -> ActionResult {
        let skill = self.player.skill_level(&SkillRef::new("combat", "defense"));
        let bonus = self.config.defend_base_bonus + skill as f32;
        self.player_state.defense_bonus = bonus;
        self.player_state.stamina =
            (self.player_state.stamina + self.config.defend_stamina_restore).min(self.player_state.max_stamina);

        self.log(
            format!("You take a defensive stance (+{bonus:.0} defense)"),
            LogCategory::Info,
            now,
        );
        ActionResult::accepted("Defensive stance taken!")
    }

    fn player_ability(&mut self, id: &AbilityId, now: SimTime) -> ActionResult {
        let outcome = self
            .player
            .use_ability(id.as_str(), AbilityTarget::actor(self.enemy), now);
        if outcome.error.is_some() {
            return ActionResult::rejected(outcome.message);
        }
        if !outcome.success {
            self.log(outcome.message.clone(), LogCategory::Warning, now);
            return ActionResult::accepted(outcome.message);
        }

        self.tally_ability(&outcome, true);
        self.log(outcome.message.clone(), LogCategory::Success, now);
        ActionResult::accepted(outcome.message)
    }

    fn tally_ability(&mut self, outcome: &AbilityOutcome, by_player: bool) {
        for effect in &outcome.effects {
            if let AbilityEffect::Damage { amount, critical, .. } = effect {
                if by_player {
                    self.stats.player_damage_dealt += amount;
                } else {
                    self.stats.enemy_damage_dealt += amount;
                }
                if *critical {
                    self.stats.critical_hits += 1;
                }
            }
        }
    }

    fn player_item(&mut self, item: &ItemId, now: SimTime) -> ActionResult {
        match self.player.use_item(item, now) {
            Ok(message) => {
                self.log(message.clone(), LogCategory::Success, now);
                ActionResult::accepted(message)
            },
            Err(error) => ActionResult::rejected(error.to_string()),
        }
    }

    fn player_escape(&mut self, now: SimTime) -> ActionResult {
        let chance = (self.config.escape_base_chance
            + self.config.escape_chance_per_level * self.player.level() as f32)
            .clamp(0.0, 1.0);
        if self.rng.f32() < chance {
            self.outcome = Some(CombatOutcome::Escaped);
            self.log("You escaped!", LogCategory::Success, now);
            self.end(now);
            return ActionResult::accepted("You escaped!");
        }
        self.log("You failed to escape!", LogCategory::Warning, now);
        ActionResult::accepted("You failed to escape!")
    }

    // ------------------------------------------------------------------
    // Enemy turn
    // ------------------------------------------------------------------

    /// Run the enemy's turn now, regardless of the turn timer.
    pub fn enemy_turn(&mut self, now: SimTime) {
        if self.is_finished() {
            self.phase = CombatPhase::Finished;
            return;
        }
        self.stats.rounds += 1;

        if self.enemy.is_stunned() {
            let message = format!("{} is stunned and cannot act", self.enemy.name());
            self.log(message, LogCategory::Info, now);
        } else if !self.enemy_ability(now) {
            self.enemy_attack(now);
        }

        if !self.player.is_alive() {
            self.end(now);
            return;
        }

        self.turn += 1;
        self.player_state.stamina =
            (self.player_state.stamina + self.config.combat_stamina_regen).min(self.player_state.max_stamina);
        self.last_action = now;
        self.phase = CombatPhase::PlayerTurn;
    }

    fn enemy_ability(&mut self, now: SimTime) -> bool {
        let chance = self.config.enemy_ability_chance * self.enemy_state.aggression;
        if !(chance > 0.0 && self.rng.f32() < chance) {
            return false;
        }
        let ready: Vec<AbilityId> = self
            .enemy
            .abilities()
            .ids()
            .filter(|id| self.enemy.can_use_ability(id.as_str(), now).is_ok())
            .cloned()
            .collect();
        if ready.is_empty() {
            return false;
        }
        let id = &ready[self.rng.usize(..ready.len())];

        let outcome = self
            .enemy
            .use_ability(id.as_str(), AbilityTarget::actor(self.player), now);
        if outcome.error.is_some() {
            debug!("{} could not use {}: {}", self.enemy.name(), id, outcome.message);
            return false;
        }
        let category = if outcome.success {
            LogCategory::Warning
        } else {
            LogCategory::Success
        };
        self.tally_ability(&outcome, false);
        let message = format!("{}: {}", self.enemy.name(), outcome.message);
        self.log(message, category, now);
        true
    }

    fn enemy_attack(&mut self, now: SimTime) {
        if !self.enemy.attack_ready(now) {
            let message = format!("{} is recovering", self.enemy.name());
            self.log(message, LogCategory::Info, now);
            return;
        }
        let base = self.enemy.current_stats().strength() + self.enemy.weapon_damage();
        let strike = Strike::new(base, DamageType::Physical).with_bonus_defense(self.player_state.defense_bonus);
        let outcome = self.enemy.deal_strike(self.player, strike);

        if outcome.dodged {
            let message = format!("You dodge {}'s attack!", self.enemy.name());
            self.log(message, LogCategory::Success, now);
            return;
        }
        self.stats.enemy_damage_dealt += outcome.amount;
        if outcome.critical {
            self.stats.critical_hits += 1;
        }
        let message = format!(
            "{} hits you for {:.1} damage{}",
            self.enemy.name(),
            outcome.amount,
            if outcome.critical { " (Critical!)" } else { "" }
        );
        let category = if outcome.critical {
            LogCategory::Error
        } else {
            LogCategory::Warning
        };
        self.log(message, category, now);
    }

    // ------------------------------------------------------------------
    // Ending
    // ------------------------------------------------------------------

    /// End the session. Calling it again returns the recorded outcome.
    ///
    /// Clears both in-combat flags and removes combat-start effects.
    pub fn end(&mut self, now: SimTime) -> CombatOutcome {
        if let (Some(_), Some(outcome)) = (self.ended_at, self.outcome) {
            return outcome;
        }

        let outcome = match self.outcome {
            Some(outcome) => outcome,
            None if !self.enemy.is_alive() => CombatOutcome::Victory,
            None if !self.player.is_alive() => CombatOutcome::Defeat,
            None => CombatOutcome::Interrupted,
        };
        self.outcome = Some(outcome);
        self.ended_at = Some(now);
        self.phase = CombatPhase::Finished;

        self.release();

        let message = match (outcome, self.winner()) {
            (CombatOutcome::Escaped, _) => format!("{} fled the fight", self.player.name()),
            (_, Some(winner)) => format!("Combat over! Winner: {winner}"),
            (_, None) => "Combat interrupted!".to_string(),
        };
        info!("{} {} after {} turns", self.id, message, self.turn);
        self.log(message, LogCategory::System, now);
        outcome
    }

    fn release(&mut self) {
        self.player.set_in_combat(false);
        self.enemy.set_in_combat(false);
        for name in std::mem::take(&mut self.combat_effects) {
            self.player.remove_status_effect(&name);
        }
    }

    /// Snapshot for the save layer.
    #[must_use]
    pub fn get_state(&self) -> CombatState {
        CombatState {
            schema: SchemaVersion::COMBAT_STATE,
            id: self.id,
            player: self.player.id().clone(),
            enemy: self.enemy.id().clone(),
            turn: self.turn,
            phase: self.phase,
            player_status: self.player_state.clone(),
            enemy_status: self.enemy_state.clone(),
            stats: self.stats.clone(),
            is_finished: self.is_finished(),
            winner: self.winner().cloned(),
            outcome: self.outcome,
        }
    }
}

impl Drop for CombatSession<'_> {
    fn drop(&mut self) {
        if self.ended_at.is_none() {
            debug!("{} discarded while open", self.id);
            self.release();
        }
    }
}
