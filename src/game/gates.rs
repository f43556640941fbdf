use serde::{Deserialize, Serialize};
use tracing::warn;

use super::geometry::{Vec2, ROOM_MID, ROOM_SIZE};
use crate::config::EngineConfig;
use crate::protocol::{Direction, PLAYER_ID};

/// One exit of the current room, as supplied by the room-data provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomConnection {
    pub direction: Direction,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub key: Option<String>,
    /// Room id on the other side; only the provider reads it.
    #[serde(default)]
    pub leads_to: Option<String>,
}

impl RoomConnection {
    pub fn open(direction: Direction, leads_to: &str) -> Self {
        Self {
            direction,
            locked: false,
            key: None,
            leads_to: Some(leads_to.to_string()),
        }
    }
}

/// What the detector makes of a proposed player movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateCheck {
    /// Not heading through any open gate.
    None,
    /// Inside a gate lane and moving toward its edge, threshold not reached yet.
    Approaching(Direction),
    /// Threshold reached: this movement crosses the exit.
    Crossed(Direction),
}

impl GateCheck {
    /// Whether the looser, full-room clamp applies to this movement.
    pub fn allows_exit_clamp(self) -> bool {
        !matches!(self, GateCheck::None)
    }
}

/// Decides whether a player movement legitimately crosses a registered exit.
///
/// Refuses every crossing until a connection list has been supplied at least
/// once. Never mutates positions.
#[derive(Debug, Clone)]
pub struct GateDetector {
    connections: Option<Vec<RoomConnection>>,
    exit_threshold: f32,
    gate_tolerance: f32,
}

impl GateDetector {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            connections: None,
            exit_threshold: config.exit_threshold,
            gate_tolerance: config.gate_tolerance,
        }
    }

    /// Replaces the connection list. Keeps the first exit per direction.
    pub fn supply(&mut self, connections: Vec<RoomConnection>) {
        let mut unique: Vec<RoomConnection> = Vec::with_capacity(connections.len());
        for conn in connections {
            if unique.iter().any(|c| c.direction == conn.direction) {
                warn!("Ignoring duplicate {:?} exit", conn.direction);
                continue;
            }
            unique.push(conn);
        }
        self.connections = Some(unique);
    }

    pub fn is_ready(&self) -> bool {
        self.connections.is_some()
    }

    pub fn connections(&self) -> &[RoomConnection] {
        self.connections.as_deref().unwrap_or(&[])
    }

    pub fn connection(&self, direction: Direction) -> Option<&RoomConnection> {
        self.connections().iter().find(|c| c.direction == direction)
    }

    /// Marks an exit unlocked. Returns false when no such exit exists.
    pub fn unlock(&mut self, direction: Direction) -> bool {
        let Some(conns) = self.connections.as_mut() else {
            return false;
        };
        match conns.iter_mut().find(|c| c.direction == direction) {
            Some(conn) => {
                conn.locked = false;
                true
            }
            None => false,
        }
    }

    fn open_exit(&self, direction: Direction) -> bool {
        self.connection(direction).is_some_and(|c| !c.locked)
    }

    /// Classifies a movement from `from` by `delta`.
    pub fn check(&self, mover: &str, from: Vec2, delta: Vec2) -> GateCheck {
        if mover != PLAYER_ID || !self.is_ready() {
            return GateCheck::None;
        }
        let proposed = from.add(delta);

        let mut approaching = None;
        for direction in Direction::EDGE_PRIORITY {
            if !self.open_exit(direction) {
                continue;
            }
            // (perpendicular coordinate, heading toward the edge, threshold reached)
            let (lateral, toward, past_threshold) = match direction {
                Direction::North => (proposed.x, delta.y < 0.0, proposed.y <= self.exit_threshold),
                Direction::South => (
                    proposed.x,
                    delta.y > 0.0,
                    proposed.y >= ROOM_SIZE - self.exit_threshold,
                ),
                Direction::East => (
                    proposed.y,
                    delta.x > 0.0,
                    proposed.x >= ROOM_SIZE - self.exit_threshold,
                ),
                Direction::West => (proposed.y, delta.x < 0.0, proposed.x <= self.exit_threshold),
                Direction::Up | Direction::Down => continue,
            };

            if !toward || (lateral - ROOM_MID).abs() > self.gate_tolerance {
                continue;
            }
            if past_threshold {
                return GateCheck::Crossed(direction);
            }
            if approaching.is_none() {
                approaching = Some(direction);
            }
        }

        approaching.map_or(GateCheck::None, GateCheck::Approaching)
    }
}
