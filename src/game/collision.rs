//! Static room geometry and the move resolver that validates every position
//! change against it and against the other actors in the room.

use serde::{Deserialize, Serialize};

use super::geometry::{clamp_to_bounds, distance, Rect, Vec2, ROOM_SIZE};
use crate::config::EngineConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObstacleKind {
    Wall,
    Door,
    Cover,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub kind: ObstacleKind,
    pub rect: Rect,
    /// Only meaningful for doors; an open door does not block.
    #[serde(default)]
    pub open: bool,
}

impl Obstacle {
    pub fn wall(rect: Rect) -> Self {
        Self { kind: ObstacleKind::Wall, rect, open: false }
    }

    pub fn blocks(&self) -> bool {
        !(self.kind == ObstacleKind::Door && self.open)
    }
}

/// Static obstacles of the current room.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomLayout {
    pub obstacles: Vec<Obstacle>,
}

impl RoomLayout {
    pub fn new(obstacles: Vec<Obstacle>) -> Self {
        Self { obstacles }
    }

    /// Whether `p` lies inside any blocking obstacle grown by `buffer`.
    pub fn is_blocked(&self, p: Vec2, buffer: f32) -> bool {
        self.obstacles
            .iter()
            .any(|o| o.blocks() && o.rect.expanded(buffer).contains(p))
    }
}

/// Which clamp bounds apply to a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClampMode {
    /// Keep the interior margin from every edge.
    Interior,
    /// Full room; only for a recognised exit crossing.
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MoveResolution {
    /// Zero-length vector; nothing to do.
    Idle,
    Direct(Vec2),
    /// Blocked on the full vector; moved along one axis only.
    Slid(Vec2),
    /// Every candidate blocked; position unchanged.
    Rejected,
}

impl MoveResolution {
    pub fn position(self) -> Option<Vec2> {
        match self {
            MoveResolution::Direct(p) | MoveResolution::Slid(p) => Some(p),
            MoveResolution::Idle | MoveResolution::Rejected => None,
        }
    }
}

pub struct CollisionResolver<'a> {
    layout: &'a RoomLayout,
    margin: f32,
    min_separation: f32,
    obstacle_buffer: f32,
}

impl<'a> CollisionResolver<'a> {
    pub fn new(layout: &'a RoomLayout, config: &EngineConfig) -> Self {
        Self {
            layout,
            margin: config.interior_margin,
            min_separation: config.min_separation,
            obstacle_buffer: config.obstacle_buffer,
        }
    }

    fn clamp(&self, p: Vec2, mode: ClampMode) -> Vec2 {
        match mode {
            ClampMode::Interior => clamp_to_bounds(p, self.margin, ROOM_SIZE - self.margin),
            ClampMode::Exit => clamp_to_bounds(p, 0.0, ROOM_SIZE),
        }
    }

    /// A candidate is free when it is clear of obstacles and does not bring the
    /// mover closer than `min_separation` to anyone. Moving apart from an
    /// actor it already overlaps is allowed.
    fn is_free(&self, from: Vec2, candidate: Vec2, others: &[Vec2]) -> bool {
        if self.layout.is_blocked(candidate, self.obstacle_buffer) {
            return false;
        }
        others.iter().all(|&o| {
            let next = distance(candidate, o);
            next >= self.min_separation || next > distance(from, o)
        })
    }

    /// Resolves a move of `delta` starting at `from`. `others` holds the
    /// positions of every other live actor.
    pub fn resolve_move(&self, from: Vec2, delta: Vec2, others: &[Vec2], mode: ClampMode) -> MoveResolution {
        if delta.is_zero() {
            return MoveResolution::Idle;
        }

        let full = self.clamp(from.add(delta), mode);
        if self.is_free(from, full, others) {
            return MoveResolution::Direct(full);
        }

        let axis_candidates = [Vec2::new(delta.x, 0.0), Vec2::new(0.0, delta.y)];
        for axis in axis_candidates {
            if axis.is_zero() {
                continue;
            }
            let slid = self.clamp(from.add(axis), mode);
            if self.is_free(from, slid, others) {
                return MoveResolution::Slid(slid);
            }
        }

        MoveResolution::Rejected
    }
}
