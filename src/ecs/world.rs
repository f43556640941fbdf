use super::components::EntitySpec;
use super::registry::EntityRegistry;
use crate::actions::scheduler::ActionScheduler;
use crate::config::EngineConfig;
use crate::error::{RegistryError, SceneError};
use crate::game::collision::RoomLayout;
use crate::game::gates::GateDetector;
use crate::game::geometry::{Vec2, ROOM_MID, ROOM_SIZE};
use crate::game::rooms::{PlayerProfile, RoomData};
use crate::protocol::{Category, Direction, EntityId, EntitySnapshot, Millis, SceneSnapshot, PLAYER_ID};

/// Complete combat state for one room visit. Replaced wholesale on every
/// room transition; dropping it drops the queue and every expiry timer.
pub struct Scene {
    pub room_id: String,
    pub epoch: u64,
    pub registry: EntityRegistry,
    pub scheduler: ActionScheduler,
    pub layout: RoomLayout,
    pub gates: GateDetector,
    pub combat_active: bool,
    pub combat_started_at: Option<Millis>,
    pub player_defeated: bool,
    /// Set once a crossing has been reported; further movement is ignored
    /// until the scene is replaced.
    pub pending_exit: Option<Direction>,
}

impl Scene {
    /// Builds the scene for `room`: the player first, then the room's actors.
    pub fn build(
        room: &RoomData,
        config: &EngineConfig,
        profile: &PlayerProfile,
        entered_via: Option<Direction>,
        epoch: u64,
    ) -> Result<Self, SceneError> {
        if profile.hp <= 0 {
            return Err(SceneError::PlayerDefeated);
        }
        let mut registry = EntityRegistry::new();

        let mut player = EntitySpec::new(
            PLAYER_ID,
            Category::Player,
            entry_position(room, config, entered_via),
        )
        .with_hp(profile.max_hp)
        .with_stats(profile.attack, profile.defense)
        .with_range(profile.attack_range)
        .with_speed(config.player_speed);
        player.hp = profile.hp.min(profile.max_hp);
        player.facing = entry_facing(entered_via);
        registry.add(player)?;

        for entity in &room.entities {
            if entity.id == PLAYER_ID {
                return Err(SceneError::ReservedId(room.id.clone()));
            }
            registry.add(entity.to_spec(config.hostile_speed))?;
        }

        let mut gates = GateDetector::new(config);
        if let Some(connections) = &room.connections {
            gates.supply(connections.clone());
        }

        Ok(Self {
            room_id: room.id.clone(),
            epoch,
            registry,
            scheduler: ActionScheduler::new(),
            layout: room.layout(),
            gates,
            combat_active: false,
            combat_started_at: None,
            player_defeated: false,
            pending_exit: None,
        })
    }

    /// Removes an entity together with everything that references it as its
    /// owner: its queued action and its expiry timers. One atomic step, so no
    /// snapshot ever shows a queued action for a missing actor.
    pub fn remove_entity(&mut self, id: &str) -> Result<EntitySnapshot, RegistryError> {
        let removed = self.registry.remove(id)?;
        self.scheduler.cancel(id);
        self.scheduler.cancel_timers_for(id);
        if id == PLAYER_ID {
            self.player_defeated = true;
        }
        self.refresh_combat_flag();
        Ok(removed)
    }

    /// Removes every entity whose hp reached 0. Returns their ids.
    pub fn remove_defeated(&mut self) -> Vec<EntityId> {
        let defeated: Vec<EntityId> = self
            .registry
            .query(|e| !e.is_alive())
            .into_iter()
            .map(|e| e.id)
            .collect();
        for id in &defeated {
            let _ = self.remove_entity(id);
        }
        defeated
    }

    pub fn start_combat(&mut self, now: Millis) {
        if !self.combat_active {
            self.combat_active = true;
            self.combat_started_at = Some(now);
        }
    }

    /// Combat ends once no live hostile remains.
    pub fn refresh_combat_flag(&mut self) {
        if self.combat_active && self.registry.hostiles().iter().all(|h| !h.is_alive()) {
            self.combat_active = false;
            self.combat_started_at = None;
        }
    }

    pub fn snapshot(&self, version: u64) -> SceneSnapshot {
        SceneSnapshot {
            version,
            epoch: self.epoch,
            room_id: self.room_id.clone(),
            combat_active: self.combat_active,
            combat_started_at: self.combat_started_at,
            entities: self.registry.snapshots(),
            queued: self.scheduler.snapshots(),
            selected: self.registry.selected().cloned(),
            player_defeated: self.player_defeated,
            pending_exit: self.pending_exit,
        }
    }
}

/// Where the player appears: at the edge opposite the crossed direction,
/// centered on that gate; otherwise the room's start or its centre.
pub fn entry_position(room: &RoomData, config: &EngineConfig, entered_via: Option<Direction>) -> Vec2 {
    let near = config.interior_margin;
    let far = ROOM_SIZE - config.interior_margin;
    match entered_via {
        Some(Direction::North) => Vec2::new(ROOM_MID, far),
        Some(Direction::South) => Vec2::new(ROOM_MID, near),
        Some(Direction::East) => Vec2::new(near, ROOM_MID),
        Some(Direction::West) => Vec2::new(far, ROOM_MID),
        Some(Direction::Up) | Some(Direction::Down) | None => room
            .player_start
            .unwrap_or(Vec2::new(ROOM_MID, ROOM_MID)),
    }
}

/// The player keeps facing the way they walked in.
fn entry_facing(entered_via: Option<Direction>) -> f32 {
    match entered_via {
        Some(Direction::East) => 90.0,
        Some(Direction::South) => 180.0,
        Some(Direction::West) => 270.0,
        _ => 0.0,
    }
}
