use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::game::geometry::Vec2;

// ── Core type aliases ──────────────────────────────────────────────

pub type EntityId = String;
pub type ActionId = String;
/// Milliseconds on the session clock.
pub type Millis = u64;

/// Reserved id of the locally controlled actor.
pub const PLAYER_ID: &str = "player";

// ── Entity categories ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Player,
    Hostile,
    Neutral,
    Npc,
}

// ── Room exits ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    North,
    South,
    East,
    West,
    Up,
    Down,
}

impl Direction {
    /// Tie-break order for a movement that satisfies more than one edge.
    pub const EDGE_PRIORITY: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    pub fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }

    /// Up and down are stair exits, not room edges.
    pub fn is_edge(self) -> bool {
        !matches!(self, Direction::Up | Direction::Down)
    }
}

// ── Actions ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Attack,
    Ability,
    Move,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Single,
    Area,
    SelfOnly,
}

// ── Scene snapshot (Engine → presentation) ─────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEffectSnapshot {
    pub tag: String,
    pub expires_at: Millis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id: EntityId,
    pub category: Category,
    pub position: Vec2,
    pub facing: f32,
    pub hp: i32,
    pub max_hp: i32,
    pub attack: i32,
    pub defense: i32,
    pub attack_range: f32,
    pub move_speed: f32,
    pub cooldowns: BTreeMap<ActionId, Millis>,
    pub effects: Vec<StatusEffectSnapshot>,
}

impl EntitySnapshot {
    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedActionSnapshot {
    pub actor: EntityId,
    pub action_id: ActionId,
    pub target_id: Option<EntityId>,
    pub target_position: Option<Vec2>,
    pub accepted_at: Millis,
    pub resolve_at: Millis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneSnapshot {
    /// Increments on every published mutation within an engine.
    pub version: u64,
    /// Scene generation; changes on every room transition.
    pub epoch: u64,
    pub room_id: String,
    pub combat_active: bool,
    pub combat_started_at: Option<Millis>,
    pub entities: Vec<EntitySnapshot>,
    pub queued: Vec<QueuedActionSnapshot>,
    pub selected: Option<EntityId>,
    pub player_defeated: bool,
    pub pending_exit: Option<Direction>,
}

impl SceneSnapshot {
    pub fn entity(&self, id: &str) -> Option<&EntitySnapshot> {
        self.entities.iter().find(|e| e.id == id)
    }
}

// ── Client → host messages ─────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientInput {
    /// Held movement vector, each axis in [-1, 1]. (0, 0) releases it.
    Move { x: f32, y: f32 },
    Rotate { degrees: f32 },
    Action {
        action_id: ActionId,
        target_id: Option<EntityId>,
        target_position: Option<Vec2>,
    },
    Cancel,
    Select { target_id: Option<EntityId> },
    Stairs { direction: Direction },
}

/// Host-to-client message wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ServerMessage {
    Scene(SceneSnapshot),
    ActionRejected { action_id: ActionId, reason: String },
    RoomChanged { room_id: String },
}
