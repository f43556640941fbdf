use std::collections::BTreeMap;

use crate::game::geometry::Vec2;
use crate::protocol::{ActionId, Category, EntityId, Millis};

// ── Identity ─────────────────────────────────────────────────────────

/// Stable scene-level id; the registry maps it to the hecs handle.
#[derive(Debug, Clone)]
pub struct EntityKey {
    pub id: EntityId,
}

#[derive(Debug, Clone)]
pub struct Kind {
    pub category: Category,
}

// ── Spatial ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn vec(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

impl From<Vec2> for Position {
    fn from(v: Vec2) -> Self {
        Position { x: v.x, y: v.y }
    }
}

/// Degrees clockwise from up, in [0, 360).
#[derive(Debug, Clone, Copy, Default)]
pub struct Facing {
    pub degrees: f32,
}

// ── Combat ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Health {
    pub current: i32,
    pub max: i32,
}

impl Health {
    pub fn is_alive(&self) -> bool {
        self.current > 0
    }
}

#[derive(Debug, Clone)]
pub struct CombatStats {
    pub attack: i32,
    pub defense: i32,
    pub attack_range: f32,
    pub move_speed: f32,
}

/// Last-used timestamp per action id.
#[derive(Debug, Clone, Default)]
pub struct Cooldowns {
    pub last_used: BTreeMap<ActionId, Millis>,
}

impl Cooldowns {
    /// Milliseconds until `action` is usable again; 0 when ready.
    pub fn remaining(&self, action: &str, cooldown: Millis, now: Millis) -> Millis {
        match self.last_used.get(action) {
            Some(&used) => (used + cooldown).saturating_sub(now),
            None => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusEffect {
    pub tag: String,
    pub expires_at: Millis,
    pub defense_bonus: i32,
}

#[derive(Debug, Clone, Default)]
pub struct StatusEffects {
    pub active: Vec<StatusEffect>,
}

impl StatusEffects {
    pub fn defense_bonus(&self) -> i32 {
        self.active.iter().map(|e| e.defense_bonus).sum()
    }

    pub fn has(&self, tag: &str) -> bool {
        self.active.iter().any(|e| e.tag == tag)
    }
}

// ── Spawn description ────────────────────────────────────────────────

/// Everything needed to place one actor into a scene.
#[derive(Debug, Clone)]
pub struct EntitySpec {
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
}

impl EntitySpec {
    pub fn new(id: impl Into<EntityId>, category: Category, position: Vec2) -> Self {
        Self {
            id: id.into(),
            category,
            position,
            facing: 0.0,
            hp: 100,
            max_hp: 100,
            attack: 0,
            defense: 0,
            attack_range: 15.0,
            move_speed: 0.0,
        }
    }

    pub fn with_hp(mut self, hp: i32) -> Self {
        self.hp = hp;
        self.max_hp = hp;
        self
    }

    pub fn with_stats(mut self, attack: i32, defense: i32) -> Self {
        self.attack = attack;
        self.defense = defense;
        self
    }

    pub fn with_range(mut self, attack_range: f32) -> Self {
        self.attack_range = attack_range;
        self
    }

    pub fn with_speed(mut self, move_speed: f32) -> Self {
        self.move_speed = move_speed;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cooldown_remaining_counts_down() {
        let mut cd = Cooldowns::default();
        assert_eq!(cd.remaining("basic_attack", 2000, 10), 0);
        cd.last_used.insert("basic_attack".to_string(), 1000);
        assert_eq!(cd.remaining("basic_attack", 2000, 1500), 1500);
        assert_eq!(cd.remaining("basic_attack", 2000, 3000), 0);
        assert_eq!(cd.remaining("basic_attack", 2000, 9000), 0);
    }

    #[test]
    fn status_effects_sum_defense() {
        let effects = StatusEffects {
            active: vec![
                StatusEffect { tag: "evasive".into(), expires_at: 10, defense_bonus: 10 },
                StatusEffect { tag: "braced".into(), expires_at: 10, defense_bonus: 3 },
            ],
        };
        assert_eq!(effects.defense_bonus(), 13);
        assert!(effects.has("braced"));
        assert!(!effects.has("stunned"));
    }
}
