use std::collections::HashMap;

use crate::protocol::{ActionId, ActionKind, Millis, TargetKind};

pub const BASIC_ATTACK: &str = "basic_attack";
pub const HEAVY_ATTACK: &str = "heavy_attack";
pub const RANGED_ATTACK: &str = "ranged_attack";
pub const EVADE: &str = "evade";
pub const DASH: &str = "dash";

/// Timed status granted by an ability.
#[derive(Debug, Clone, PartialEq)]
pub struct GrantedEffect {
    pub tag: &'static str,
    pub duration: Millis,
    pub defense_bonus: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionDefinition {
    pub id: ActionId,
    pub kind: ActionKind,
    pub cooldown: Millis,
    pub damage: Option<i32>,
    pub range: Option<f32>,
    pub target: TargetKind,
    /// Time between acceptance and effect.
    pub delay: Millis,
    /// Blast radius for area attacks.
    pub radius: Option<f32>,
    pub effect: Option<GrantedEffect>,
}

/// Immutable table of action archetypes, seeded once.
#[derive(Debug, Clone)]
pub struct ActionCatalogue {
    order: Vec<ActionId>,
    by_id: HashMap<ActionId, ActionDefinition>,
}

impl ActionCatalogue {
    pub fn new(definitions: Vec<ActionDefinition>) -> Self {
        let mut order = Vec::with_capacity(definitions.len());
        let mut by_id = HashMap::with_capacity(definitions.len());
        for def in definitions {
            if by_id.contains_key(&def.id) {
                continue;
            }
            order.push(def.id.clone());
            by_id.insert(def.id.clone(), def);
        }
        Self { order, by_id }
    }

    pub fn get(&self, id: &str) -> Option<&ActionDefinition> {
        self.by_id.get(id)
    }

    /// Definitions in seeding order.
    pub fn iter(&self) -> impl Iterator<Item = &ActionDefinition> {
        self.order.iter().filter_map(|id| self.by_id.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Default for ActionCatalogue {
    fn default() -> Self {
        Self::new(default_actions())
    }
}

/// The built-in archetypes.
pub fn default_actions() -> Vec<ActionDefinition> {
    vec![
        ActionDefinition {
            id: BASIC_ATTACK.to_string(),
            kind: ActionKind::Attack,
            cooldown: 2000,
            damage: Some(20),
            range: Some(15.0),
            target: TargetKind::Single,
            delay: 1000,
            radius: None,
            effect: None,
        },
        ActionDefinition {
            id: HEAVY_ATTACK.to_string(),
            kind: ActionKind::Attack,
            cooldown: 5000,
            damage: Some(35),
            range: Some(12.0),
            target: TargetKind::Area,
            delay: 1500,
            radius: Some(10.0),
            effect: None,
        },
        ActionDefinition {
            id: RANGED_ATTACK.to_string(),
            kind: ActionKind::Attack,
            cooldown: 3000,
            damage: Some(15),
            range: Some(40.0),
            target: TargetKind::Single,
            delay: 1200,
            radius: None,
            effect: None,
        },
        ActionDefinition {
            id: EVADE.to_string(),
            kind: ActionKind::Ability,
            cooldown: 4000,
            damage: None,
            range: None,
            target: TargetKind::SelfOnly,
            delay: 0,
            radius: None,
            effect: Some(GrantedEffect {
                tag: "evasive",
                duration: 1500,
                defense_bonus: 10,
            }),
        },
        ActionDefinition {
            id: DASH.to_string(),
            kind: ActionKind::Move,
            cooldown: 3000,
            damage: None,
            range: Some(20.0),
            target: TargetKind::SelfOnly,
            delay: 200,
            radius: None,
            effect: None,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_attack_matches_reference_numbers() {
        let cat = ActionCatalogue::default();
        let basic = cat.get(BASIC_ATTACK).unwrap();
        assert_eq!(basic.cooldown, 2000);
        assert_eq!(basic.damage, Some(20));
        assert_eq!(basic.delay, 1000);
        assert_eq!(basic.range, Some(15.0));
        assert_eq!(basic.target, TargetKind::Single);
    }

    #[test]
    fn iteration_follows_seed_order() {
        let cat = ActionCatalogue::default();
        let ids: Vec<&str> = cat.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec![BASIC_ATTACK, HEAVY_ATTACK, RANGED_ATTACK, EVADE, DASH]);
    }

    #[test]
    fn duplicate_seed_keeps_first() {
        let mut defs = default_actions();
        let mut dup = defs[0].clone();
        dup.damage = Some(999);
        defs.push(dup);
        let cat = ActionCatalogue::new(defs);
        assert_eq!(cat.len(), 5);
        assert_eq!(cat.get(BASIC_ATTACK).unwrap().damage, Some(20));
    }

    #[test]
    fn area_attacks_have_a_radius() {
        for def in ActionCatalogue::default().iter() {
            if def.target == TargetKind::Area {
                assert!(def.radius.is_some(), "{} has no radius", def.id);
            }
        }
    }
}
