use serde::{Deserialize, Serialize};

/// Width and height of the normalized room plane.
pub const ROOM_SIZE: f32 = 100.0;
pub const ROOM_MID: f32 = ROOM_SIZE / 2.0;

const EPSILON: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn is_zero(self) -> bool {
        self.length() < EPSILON
    }

    pub fn scale(self, s: f32) -> Vec2 {
        Vec2::new(self.x * s, self.y * s)
    }

    pub fn add(self, other: Vec2) -> Vec2 {
        Vec2::new(self.x + other.x, self.y + other.y)
    }

    pub fn sub(self, other: Vec2) -> Vec2 {
        Vec2::new(self.x - other.x, self.y - other.y)
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

pub fn distance(a: Vec2, b: Vec2) -> f32 {
    distance_sq(a, b).sqrt()
}

pub fn distance_sq(a: Vec2, b: Vec2) -> f32 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    dx * dx + dy * dy
}

/// Unit vector in the direction of `v`, or zero for a zero-length input.
pub fn normalize(v: Vec2) -> Vec2 {
    let len = v.length();
    if len < EPSILON {
        return Vec2::ZERO;
    }
    Vec2::new(v.x / len, v.y / len)
}

/// Clamps each axis to [-1, 1], then shrinks the vector to unit length when it
/// is longer than that. Analog input shorter than 1 keeps its magnitude.
/// Non-finite axes count as released.
pub fn normalize_input(x: f32, y: f32) -> Vec2 {
    let axis = |a: f32| if a.is_finite() { a.clamp(-1.0, 1.0) } else { 0.0 };
    let v = Vec2::new(axis(x), axis(y));
    if v.length() > 1.0 {
        normalize(v)
    } else {
        v
    }
}

/// Clamps a position into `[min, max]` on both axes.
pub fn clamp_to_bounds(p: Vec2, min: f32, max: f32) -> Vec2 {
    Vec2::new(p.x.clamp(min, max), p.y.clamp(min, max))
}

/// Facing in degrees, clockwise from up (negative y), in [0, 360).
pub fn facing_from_vector(v: Vec2) -> Option<f32> {
    if v.is_zero() {
        return None;
    }
    Some(normalize_degrees(v.x.atan2(-v.y).to_degrees()))
}

pub fn normalize_degrees(deg: f32) -> f32 {
    let d = deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negatives
    if d >= 360.0 {
        0.0
    } else {
        d
    }
}

/// Axis-aligned rectangle in room coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Rect {
            min: Vec2::new(x0.min(x1), y0.min(y1)),
            max: Vec2::new(x0.max(x1), y0.max(y1)),
        }
    }

    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// Rect grown by `amount` on every side.
    pub fn expanded(&self, amount: f32) -> Rect {
        Rect {
            min: Vec2::new(self.min.x - amount, self.min.y - amount),
            max: Vec2::new(self.max.x + amount, self.max.y + amount),
        }
    }
}
