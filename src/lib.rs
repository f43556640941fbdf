//! Real-time combat and movement for a single dungeon room: entity state,
//! delayed actions with cooldowns, collision-checked movement, hostile
//! behavior and exit detection. One [`engine::CombatEngine`] per room visit.

pub mod actions;
pub mod ai;
pub mod config;
pub mod ecs;
pub mod engine;
pub mod error;
pub mod game;
pub mod network;
pub mod notify;
pub mod protocol;
pub mod runtime;
