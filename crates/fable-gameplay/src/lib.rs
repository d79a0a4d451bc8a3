//! # Fable Gameplay
//!
//! Entity simulation and combat resolution for Project Fable.
//!
//! This crate provides:
//! - Stat blocks with clamped mutation
//! - Timed and permanent status effects
//! - Ability catalogs, costs, cooldowns and requirements
//! - Actors (players, NPCs, enemies) with damage, healing, death and progression
//! - Turn-based combat sessions and a registry of fights
//! - Content loading from JSON and RON, configuration from TOML
//!
//! Time is always passed in explicitly as [`SimTime`](fable_common::SimTime);
//! nothing here reads a wall clock.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod abilities;
pub mod actor;
pub mod combat;
pub mod combat_registry;
pub mod combat_stats;
pub mod config;
pub mod content;
pub mod damage_calc;
pub mod progression;
pub mod providers;
pub mod status_effect;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::abilities::*;
    pub use crate::actor::*;
    pub use crate::combat::*;
    pub use crate::combat_registry::*;
    pub use crate::combat_stats::*;
    pub use crate::config::*;
    pub use crate::content::*;
    pub use crate::damage_calc::*;
    pub use crate::progression::*;
    pub use crate::providers::*;
    pub use crate::status_effect::*;
}

pub use prelude::*;
