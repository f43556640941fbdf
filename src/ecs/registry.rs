use std::collections::{BTreeMap, HashMap};

use hecs::World;

use super::components::{
    CombatStats, Cooldowns, EntityKey, EntitySpec, Facing, Health, Kind, Position, StatusEffect,
    StatusEffects,
};
use crate::error::RegistryError;
use crate::game::geometry::{normalize_degrees, Vec2};
use crate::protocol::{ActionId, Category, EntityId, EntitySnapshot, Millis, StatusEffectSnapshot, PLAYER_ID};

/// Shallow field merge applied by [`EntityRegistry::patch`].
#[derive(Debug, Clone, Default)]
pub struct EntityPatch {
    pub position: Option<Vec2>,
    pub facing: Option<f32>,
    pub hp: Option<i32>,
    pub cooldowns: Option<BTreeMap<ActionId, Millis>>,
    pub effects: Option<Vec<StatusEffect>>,
}

/// Every actor in the current scene, keyed by its stable string id.
///
/// Components live in a hecs world; the registry keeps the id → handle index
/// and the insertion order used for snapshots.
pub struct EntityRegistry {
    world: World,
    index: HashMap<EntityId, hecs::Entity>,
    order: Vec<EntityId>,
    selected: Option<EntityId>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self {
            world: World::new(),
            index: HashMap::new(),
            order: Vec::new(),
            selected: None,
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn ids(&self) -> &[EntityId] {
        &self.order
    }

    pub fn add(&mut self, spec: EntitySpec) -> Result<(), RegistryError> {
        if self.index.contains_key(&spec.id) {
            return Err(RegistryError::DuplicateId(spec.id));
        }
        if spec.max_hp <= 0 {
            return Err(RegistryError::InvalidMaxHp(spec.id));
        }

        let handle = self.world.spawn((
            EntityKey { id: spec.id.clone() },
            Kind { category: spec.category },
            Position::from(spec.position),
            Facing { degrees: normalize_degrees(spec.facing) },
            Health {
                current: spec.hp.min(spec.max_hp),
                max: spec.max_hp,
            },
            CombatStats {
                attack: spec.attack,
                defense: spec.defense,
                attack_range: spec.attack_range,
                move_speed: spec.move_speed,
            },
            Cooldowns::default(),
            StatusEffects::default(),
        ));

        self.index.insert(spec.id.clone(), handle);
        self.order.push(spec.id);
        Ok(())
    }

    /// Removes the entity and clears the selection if it pointed at it.
    /// Returns the last state of the removed entity.
    pub fn remove(&mut self, id: &str) -> Result<EntitySnapshot, RegistryError> {
        let handle = self
            .index
            .get(id)
            .copied()
            .ok_or_else(|| RegistryError::UnknownEntity(id.to_string()))?;
        let last = self
            .view(handle)
            .ok_or_else(|| RegistryError::UnknownEntity(id.to_string()))?;

        let _ = self.world.despawn(handle);
        self.index.remove(id);
        self.order.retain(|e| e != id);
        if self.selected.as_deref() == Some(id) {
            self.selected = None;
        }
        Ok(last)
    }

    pub fn patch(&mut self, id: &str, patch: EntityPatch) -> Result<(), RegistryError> {
        let handle = self.handle(id)?;

        if let Some(p) = patch.position {
            if let Ok(mut pos) = self.world.get::<&mut Position>(handle) {
                *pos = Position::from(p);
            }
        }
        if let Some(degrees) = patch.facing {
            if let Ok(mut facing) = self.world.get::<&mut Facing>(handle) {
                facing.degrees = normalize_degrees(degrees);
            }
        }
        if let Some(hp) = patch.hp {
            if let Ok(mut health) = self.world.get::<&mut Health>(handle) {
                health.current = hp.min(health.max).max(0);
            }
        }
        if let Some(cooldowns) = patch.cooldowns {
            if let Ok(mut cd) = self.world.get::<&mut Cooldowns>(handle) {
                cd.last_used = cooldowns;
            }
        }
        if let Some(effects) = patch.effects {
            if let Ok(mut fx) = self.world.get::<&mut StatusEffects>(handle) {
                fx.active = effects;
            }
        }
        Ok(())
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn get(&self, id: &str) -> Option<EntitySnapshot> {
        self.index.get(id).and_then(|h| self.view(*h))
    }

    pub fn player(&self) -> Option<EntitySnapshot> {
        self.get(PLAYER_ID)
    }

    pub fn hostiles(&self) -> Vec<EntitySnapshot> {
        self.query(|e| e.category == Category::Hostile)
    }

    /// All entities matching `predicate`, in insertion order.
    pub fn query<P>(&self, predicate: P) -> Vec<EntitySnapshot>
    where
        P: Fn(&EntitySnapshot) -> bool,
    {
        self.snapshots().into_iter().filter(|e| predicate(e)).collect()
    }

    pub fn snapshots(&self) -> Vec<EntitySnapshot> {
        self.order
            .iter()
            .filter_map(|id| self.index.get(id))
            .filter_map(|h| self.view(*h))
            .collect()
    }

    pub fn position(&self, id: &str) -> Option<Vec2> {
        let handle = self.index.get(id)?;
        self.world.get::<&Position>(*handle).ok().map(|p| p.vec())
    }

    pub fn category(&self, id: &str) -> Option<Category> {
        let handle = self.index.get(id)?;
        self.world.get::<&Kind>(*handle).ok().map(|k| k.category)
    }

    pub fn is_alive(&self, id: &str) -> bool {
        self.index
            .get(id)
            .and_then(|h| self.world.get::<&Health>(*h).ok().map(|hp| hp.is_alive()))
            .unwrap_or(false)
    }

    /// Positions of every live entity except `exclude`.
    pub fn live_positions_except(&self, exclude: &str) -> Vec<Vec2> {
        self.world
            .query::<(&EntityKey, &Position, &Health)>()
            .iter()
            .filter(|(_e, (key, _pos, health))| key.id != exclude && health.is_alive())
            .map(|(_e, (_key, pos, _health))| pos.vec())
            .collect()
    }

    // ── Selection ────────────────────────────────────────────────────

    pub fn selected(&self) -> Option<&EntityId> {
        self.selected.as_ref()
    }

    pub fn select(&mut self, id: &str) -> Result<(), RegistryError> {
        self.handle(id)?;
        self.selected = Some(id.to_string());
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    // ── Typed mutators used by the systems ───────────────────────────

    pub fn set_position(&mut self, id: &str, p: Vec2) -> Result<(), RegistryError> {
        self.patch(id, EntityPatch { position: Some(p), ..Default::default() })
    }

    pub fn set_facing(&mut self, id: &str, degrees: f32) -> Result<(), RegistryError> {
        self.patch(id, EntityPatch { facing: Some(degrees), ..Default::default() })
    }

    /// Subtracts `amount` from hp, clamping at 0. Returns the remaining hp.
    pub fn apply_damage(&mut self, id: &str, amount: i32) -> Result<i32, RegistryError> {
        let handle = self.handle(id)?;
        let mut health = self
            .world
            .get::<&mut Health>(handle)
            .map_err(|_| RegistryError::UnknownEntity(id.to_string()))?;
        health.current = (health.current - amount).max(0);
        Ok(health.current)
    }

    pub fn record_cooldown(&mut self, id: &str, action: &str, now: Millis) -> Result<(), RegistryError> {
        let handle = self.handle(id)?;
        if let Ok(mut cd) = self.world.get::<&mut Cooldowns>(handle) {
            cd.last_used.insert(action.to_string(), now);
        }
        Ok(())
    }

    pub fn cooldown_remaining(&self, id: &str, action: &str, cooldown: Millis, now: Millis) -> Option<Millis> {
        let handle = self.index.get(id)?;
        let cd = self.world.get::<&Cooldowns>(*handle).ok()?;
        Some(cd.remaining(action, cooldown, now))
    }

    /// Adds `effect`, replacing an active effect with the same tag.
    pub fn add_effect(&mut self, id: &str, effect: StatusEffect) -> Result<(), RegistryError> {
        let handle = self.handle(id)?;
        if let Ok(mut fx) = self.world.get::<&mut StatusEffects>(handle) {
            fx.active.retain(|e| e.tag != effect.tag);
            fx.active.push(effect);
        }
        Ok(())
    }

    /// Removes the effect with `tag` if it has expired by `now`. Returns whether
    /// anything was removed.
    pub fn expire_effect(&mut self, id: &str, tag: &str, now: Millis) -> bool {
        let Some(handle) = self.index.get(id) else {
            return false;
        };
        let Ok(mut fx) = self.world.get::<&mut StatusEffects>(*handle) else {
            return false;
        };
        let before = fx.active.len();
        fx.active.retain(|e| !(e.tag == tag && e.expires_at <= now));
        fx.active.len() != before
    }

    /// Defense including status bonuses.
    pub fn effective_defense(&self, id: &str) -> Option<i32> {
        let handle = self.index.get(id)?;
        let stats = self.world.get::<&CombatStats>(*handle).ok()?;
        let fx = self.world.get::<&StatusEffects>(*handle).ok()?;
        Some(stats.defense + fx.defense_bonus())
    }

    fn handle(&self, id: &str) -> Result<hecs::Entity, RegistryError> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| RegistryError::UnknownEntity(id.to_string()))
    }

    fn view(&self, handle: hecs::Entity) -> Option<EntitySnapshot> {
        let mut query = self
            .world
            .query_one::<(
                &EntityKey,
                &Kind,
                &Position,
                &Facing,
                &Health,
                &CombatStats,
                &Cooldowns,
                &StatusEffects,
            )>(handle)
            .ok()?;
        let (key, kind, pos, facing, health, stats, cooldowns, effects) = query.get()?;

        Some(EntitySnapshot {
            id: key.id.clone(),
            category: kind.category,
            position: pos.vec(),
            facing: facing.degrees,
            hp: health.current,
            max_hp: health.max,
            attack: stats.attack,
            defense: stats.defense,
            attack_range: stats.attack_range,
            move_speed: stats.move_speed,
            cooldowns: cooldowns.last_used.clone(),
            effects: effects
                .active
                .iter()
                .map(|e| StatusEffectSnapshot {
                    tag: e.tag.clone(),
                    expires_at: e.expires_at,
                })
                .collect(),
        })
    }
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new()
    }
}
