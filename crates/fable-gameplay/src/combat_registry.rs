//! Bookkeeping for open and finished combat sessions.
//!
//! The registry never owns actors. It hands out [`CombatSession`]s that borrow
//! the participants, remembers who is fighting, and keeps a history of
//! finished fights for summaries.

use crate::actor::Actor;
use crate::combat::{CombatOutcome, CombatSession};
use fable_common::{ActorId, CombatId, SimTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info};

/// Registry refusals.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CombatError {
    /// A participant already has an open session.
    #[error("{0} is already in combat")]
    AlreadyInCombat(ActorId),
    /// A participant is dead.
    #[error("{0} is dead")]
    Dead(ActorId),
    /// Both sides are the same actor.
    #[error("{0} cannot fight itself")]
    SameActor(ActorId),
    /// The session was not opened by this registry (or was already closed).
    #[error("{0} is not an open session")]
    NotOpen(CombatId),
}

/// A finished fight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatRecord {
    /// Session id.
    pub id: CombatId,
    /// Player side.
    pub player: ActorId,
    /// Enemy side.
    pub enemy: ActorId,
    /// Start time.
    pub started_at: SimTime,
    /// End time.
    pub ended_at: SimTime,
    /// Surviving side, if one died.
    pub winner: Option<ActorId>,
    /// How it ended.
    pub outcome: CombatOutcome,
    /// Turns played.
    pub turns: u32,
    /// Damage the player dealt.
    pub player_damage_dealt: f32,
    /// Damage the enemy dealt.
    pub enemy_damage_dealt: f32,
}

impl CombatRecord {
    /// Seconds between start and end.
    #[must_use]
    pub fn duration(&self) -> f64 {
        self.ended_at - self.started_at
    }

    fn involves(&self, actor: &ActorId) -> bool {
        &self.player == actor || &self.enemy == actor
    }
}

/// Per-actor totals across finished fights.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CombatSummary {
    /// Fights the actor took part in.
    pub total_fights: u32,
    /// Fights the actor won.
    pub victories: u32,
    /// Fights the other side won.
    pub defeats: u32,
    /// Damage dealt across fights.
    pub total_damage_dealt: f32,
    /// Damage received across fights.
    pub total_damage_taken: f32,
    /// Longest fight in seconds.
    pub longest_fight: f64,
    /// Shortest victory in seconds.
    pub fastest_victory: Option<f64>,
    /// Most damage dealt in one fight.
    pub most_damage_in_fight: f32,
}

#[derive(Debug, Clone)]
struct OpenCombat {
    player: ActorId,
    enemy: ActorId,
}

/// Tracks which actors are fighting.
#[derive(Debug)]
pub struct CombatRegistry {
    next_id: u64,
    active: BTreeMap<CombatId, OpenCombat>,
    history: Vec<CombatRecord>,
    rng: fastrand::Rng,
}

impl Default for CombatRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CombatRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: 1,
            active: BTreeMap::new(),
            history: Vec::new(),
            rng: fastrand::Rng::new(),
        }
    }

    /// Seed the source used to seed each session.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = fastrand::Rng::with_seed(seed);
        self
    }

    /// Whether an actor is in an open session.
    #[must_use]
    pub fn is_fighting(&self, actor: &ActorId) -> bool {
        self.active
            .values()
            .any(|c| &c.player == actor || &c.enemy == actor)
    }

    /// Number of open sessions.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Finished fights, oldest first.
    #[must_use]
    pub fn history(&self) -> &[CombatRecord] {
        &self.history
    }

    /// Open a session between `player` and `enemy`.
    pub fn open<'a>(
        &mut self,
        player: &'a mut Actor,
        enemy: &'a mut Actor,
        now: SimTime,
    ) -> Result<CombatSession<'a>, CombatError> {
        if player.id() == enemy.id() {
            return Err(CombatError::SameActor(player.id().clone()));
        }
        for actor in [&*player, &*enemy] {
            if !actor.in_combat() {
                self.sweep(actor.id());
            }
            if actor.in_combat() || self.is_fighting(actor.id()) {
                return Err(CombatError::AlreadyInCombat(actor.id().clone()));
            }
            if !actor.is_alive() {
                return Err(CombatError::Dead(actor.id().clone()));
            }
        }

        let id = CombatId::new(self.next_id);
        self.next_id += 1;
        self.active.insert(
            id,
            OpenCombat {
                player: player.id().clone(),
                enemy: enemy.id().clone(),
            },
        );
        let rng = fastrand::Rng::with_seed(self.rng.u64(..));
        Ok(CombatSession::start_with(id, player, enemy, rng, now))
    }

    /// Forget an open session without recording it. Returns whether it was open.
    ///
    /// For sessions that were dropped instead of closed.
    pub fn abandon(&mut self, id: CombatId) -> bool {
        let removed = self.active.remove(&id).is_some();
        if removed {
            info!("{} abandoned", id);
        }
        removed
    }

    // An actor outside combat cannot still own a live session, so any entry
    // naming it belongs to a session that was dropped.
    fn sweep(&mut self, actor: &ActorId) {
        let stale: Vec<CombatId> = self
            .active
            .iter()
            .filter(|(_, c)| &c.player == actor || &c.enemy == actor)
            .map(|(id, _)| *id)
            .collect();
        for id in stale {
            debug!("{} was dropped without closing", id);
            self.active.remove(&id);
        }
    }

    /// End a session (if it is not already) and record it.
    pub fn close(&mut self, mut session: CombatSession<'_>, now: SimTime) -> Result<CombatRecord, CombatError> {
        let id = session.id();
        if !self.active.contains_key(&id) {
            return Err(CombatError::NotOpen(id));
        }
        let outcome = session.end(now);
        self.active.remove(&id);

        let stats = session.stats();
        let record = CombatRecord {
            id,
            player: session.player().id().clone(),
            enemy: session.enemy().id().clone(),
            started_at: session.started_at(),
            ended_at: session.ended_at().unwrap_or(now),
            winner: session.winner().cloned(),
            outcome,
            turns: session.turn(),
            player_damage_dealt: stats.player_damage_dealt,
            enemy_damage_dealt: stats.enemy_damage_dealt,
        };
        info!(
            "{} closed: {:?} after {:.1}s",
            id,
            record.outcome,
            record.duration()
        );
        self.history.push(record.clone());
        Ok(record)
    }

    /// Totals for one actor across the history.
    #[must_use]
    pub fn combat_summary(&self, actor: &ActorId) -> CombatSummary {
        let mut summary = CombatSummary::default();
        for record in self.history.iter().filter(|r| r.involves(actor)) {
            summary.total_fights += 1;
            let (dealt, taken) = if &record.player == actor {
                (record.player_damage_dealt, record.enemy_damage_dealt)
            } else {
                (record.enemy_damage_dealt, record.player_damage_dealt)
            };
            summary.total_damage_dealt += dealt;
            summary.total_damage_taken += taken;
            summary.most_damage_in_fight = summary.most_damage_in_fight.max(dealt);
            summary.longest_fight = summary.longest_fight.max(record.duration());

            match &record.winner {
                Some(winner) if winner == actor => {
                    summary.victories += 1;
                    let duration = record.duration();
                    summary.fastest_victory =
                        Some(summary.fastest_victory.map_or(duration, |best| best.min(duration)));
                },
                Some(_) => summary.defeats += 1,
                None => {},
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::PlayerAction;
    use crate::combat_stats::{StatBlock, StatKind};
    use crate::config::SimConfig;
    use crate::progression::ActorRole;
    use std::sync::Arc;

    fn steady() -> StatBlock {
        StatBlock::new()
            .with(StatKind::DodgeChance, 0.0)
            .with(StatKind::CriticalChance, 0.0)
    }

    fn actor(id: &str, role: ActorRole) -> Actor {
        Actor::new(id, id, role, Arc::new(SimConfig::default())).with_stats(steady())
    }

    #[test]
    fn test_open_assigns_ids_and_tracks_participants() {
        let mut registry = CombatRegistry::new().with_seed(3);
        let mut hero = actor("hero", ActorRole::player());
        let mut goblin = actor("goblin", ActorRole::enemy());

        let session = registry.open(&mut hero, &mut goblin, 0.0).expect("open");
        assert_eq!(session.id(), CombatId::new(1));
        assert!(registry.is_fighting(&ActorId::new("hero")));
        assert_eq!(registry.active_count(), 1);

        let record = registry.close(session, 2.0).expect("close");
        assert_eq!(record.outcome, CombatOutcome::Interrupted);
        assert_eq!(record.duration(), 2.0);
        assert_eq!(registry.active_count(), 0);
        assert!(!hero.in_combat());
    }

    #[test]
    fn test_open_refusals() {
        let mut registry = CombatRegistry::new();
        let mut hero = actor("hero", ActorRole::player());
        let mut twin = actor("hero", ActorRole::enemy());
        assert_eq!(
            registry.open(&mut hero, &mut twin, 0.0).err(),
            Some(CombatError::SameActor(ActorId::new("hero")))
        );

        let mut corpse = actor("corpse", ActorRole::enemy());
        corpse.die();
        assert_eq!(
            registry.open(&mut hero, &mut corpse, 0.0).err(),
            Some(CombatError::Dead(ActorId::new("corpse")))
        );

        let mut busy = actor("busy", ActorRole::enemy());
        busy.set_in_combat(true);
        assert_eq!(
            registry.open(&mut hero, &mut busy, 0.0).err(),
            Some(CombatError::AlreadyInCombat(ActorId::new("busy")))
        );
    }

    #[test]
    fn test_close_foreign_session() {
        let mut registry = CombatRegistry::new();
        let mut hero = actor("hero", ActorRole::player());
        let mut goblin = actor("goblin", ActorRole::enemy());
        let session = CombatSession::start(&mut hero, &mut goblin, 0.0);
        assert_eq!(
            registry.close(session, 1.0).err(),
            Some(CombatError::NotOpen(CombatId::DETACHED))
        );
    }

    #[test]
    fn test_dropped_session_does_not_block_new_fights() {
        let mut registry = CombatRegistry::new().with_seed(3);
        let mut hero = actor("hero", ActorRole::player());
        let mut goblin = actor("goblin", ActorRole::enemy());

        let session = registry.open(&mut hero, &mut goblin, 0.0).expect("open");
        drop(session);
        assert!(!hero.in_combat());
        assert_eq!(registry.active_count(), 1);

        let session = registry.open(&mut hero, &mut goblin, 5.0).expect("reopen");
        assert_eq!(session.id(), CombatId::new(2));
        assert_eq!(registry.active_count(), 1);
        registry.close(session, 6.0).expect("close");
        assert_eq!(registry.active_count(), 0);
        assert_eq!(registry.history().len(), 1);
    }

    #[test]
    fn test_abandon() {
        let mut registry = CombatRegistry::new();
        let mut hero = actor("hero", ActorRole::player());
        let mut goblin = actor("goblin", ActorRole::enemy());

        let id = registry.open(&mut hero, &mut goblin, 0.0).expect("open").id();
        assert!(registry.is_fighting(&ActorId::new("goblin")));
        assert!(registry.abandon(id));
        assert!(!registry.abandon(id));
        assert!(!registry.is_fighting(&ActorId::new("goblin")));
        assert!(registry.history().is_empty());
    }

    #[test]
    fn test_summary() {
        let mut registry = CombatRegistry::new().with_seed(11);
        let mut hero = actor("hero", ActorRole::player());

        let mut weakling = actor("weakling", ActorRole::enemy()).with_stats(steady().with_health(5.0));
        let mut session = registry.open(&mut hero, &mut weakling, 0.0).expect("open");
        assert!(session.handle_action(PlayerAction::Attack, 1.0).accepted);
        let won = registry.close(session, 4.0).expect("close");
        assert_eq!(won.outcome, CombatOutcome::Victory);
        assert_eq!(won.ended_at, 1.0);

        let mut brute = actor("brute", ActorRole::enemy());
        let session = registry.open(&mut hero, &mut brute, 10.0).expect("open");
        registry.close(session, 20.0).expect("close");

        let summary = registry.combat_summary(&ActorId::new("hero"));
        assert_eq!(summary.total_fights, 2);
        assert_eq!(summary.victories, 1);
        assert_eq!(summary.defeats, 0);
        assert_eq!(summary.fastest_victory, Some(1.0));
        assert_eq!(summary.longest_fight, 10.0);
        assert!(summary.total_damage_dealt > 0.0);

        let loser = registry.combat_summary(&ActorId::new("weakling"));
        assert_eq!(loser.defeats, 1);
        assert_eq!(loser.total_damage_taken, summary.most_damage_in_fight);
    }
}
