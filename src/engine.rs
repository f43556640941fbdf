use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::actions::catalogue::{ActionCatalogue, ActionDefinition};
use crate::actions::{self, request_action};
use crate::ai::hostile_ai::{hostile_ai_system, AiDecision, AiStep};
use crate::config::EngineConfig;
use crate::ecs::components::EntitySpec;
use crate::ecs::registry::EntityPatch;
use crate::ecs::systems::combat::{combat_system, ResolvedAction};
use crate::ecs::systems::status::{status_system, ExpiredEffect};
use crate::ecs::world::Scene;
use crate::error::{ActionRejected, RegistryError, SceneError};
use crate::game::collision::MoveResolution;
use crate::game::gates::RoomConnection;
use crate::game::geometry::{normalize_input, Vec2};
use crate::game::movement::step_entity;
use crate::game::rooms::{PlayerProfile, RoomData};
use crate::notify::NotificationBus;
use crate::protocol::{Direction, EntityId, EntitySnapshot, Millis, SceneSnapshot, PLAYER_ID};

/// Result of one call to [`CombatEngine::submit_movement_vector`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MoveOutcome {
    /// Player gone, or a crossing is already pending.
    Ignored,
    Idle,
    Moved(Vec2),
    Slid(Vec2),
    Rejected,
    /// The player walked through this exit. Reported exactly once per scene.
    Crossed(Direction),
}

/// Everything one action tick did.
#[derive(Debug, Default)]
pub struct TickReport {
    pub resolved: Vec<ResolvedAction>,
    pub defeated: Vec<EntityId>,
    pub expired: Vec<ExpiredEffect>,
    pub ai: Vec<AiStep>,
    pub log: Vec<String>,
}

impl TickReport {
    /// True when the tick changed nothing. Hostiles holding position do not count.
    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
            && self.defeated.is_empty()
            && self.expired.is_empty()
            && self.ai.iter().all(|step| step.decision == AiDecision::Hold)
    }
}

/// The authoritative combat state for the current room visit.
///
/// Every entry point runs to completion on `&mut self` and, if it changed
/// anything, publishes exactly one snapshot afterwards. Room transitions
/// replace the whole scene and bump its epoch; calls tagged with an older
/// epoch are dropped.
pub struct CombatEngine {
    config: EngineConfig,
    catalogue: ActionCatalogue,
    bus: NotificationBus,
    scene: Scene,
    version: u64,
    next_epoch: u64,
    profile: PlayerProfile,
    rng: StdRng,
}

impl CombatEngine {
    pub fn new(
        config: EngineConfig,
        catalogue: ActionCatalogue,
        bus: NotificationBus,
        room: &RoomData,
        profile: PlayerProfile,
    ) -> Result<Self, SceneError> {
        let scene = Scene::build(room, &config, &profile, None, 1)?;
        info!("Combat engine ready in room {} ({} entities)", room.id, scene.registry.len());
        let mut engine = Self {
            config,
            catalogue,
            bus,
            scene,
            version: 0,
            next_epoch: 2,
            profile,
            rng: StdRng::from_entropy(),
        };
        engine.commit();
        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalogue(&self) -> &ActionCatalogue {
        &self.catalogue
    }

    pub fn bus(&self) -> &NotificationBus {
        &self.bus
    }

    pub fn epoch(&self) -> u64 {
        self.scene.epoch
    }

    pub fn room_id(&self) -> &str {
        &self.scene.room_id
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn snapshot(&self) -> SceneSnapshot {
        self.scene.snapshot(self.version)
    }

    /// The player's stats as they would carry into the next room.
    pub fn profile(&self) -> PlayerProfile {
        self.scene
            .registry
            .player()
            .map(|p| PlayerProfile::from_snapshot(&p))
            .unwrap_or_else(|| self.profile.clone())
    }

    fn commit(&mut self) {
        self.version += 1;
        self.bus.publish(Arc::new(self.scene.snapshot(self.version)));
    }

    // ── Registry ─────────────────────────────────────────────────────

    pub fn add_entity(&mut self, spec: EntitySpec) -> Result<(), RegistryError> {
        self.scene.registry.add(spec)?;
        self.commit();
        Ok(())
    }

    pub fn remove_entity(&mut self, id: &str) -> Result<EntitySnapshot, RegistryError> {
        let removed = self.scene.remove_entity(id)?;
        self.commit();
        Ok(removed)
    }

    /// Shallow merge. An hp of 0 defeats the entity, which removes it.
    pub fn patch_entity(&mut self, id: &str, patch: EntityPatch) -> Result<(), RegistryError> {
        self.scene.registry.patch(id, patch)?;
        for defeated in self.scene.remove_defeated() {
            info!("{} defeated", defeated);
        }
        self.commit();
        Ok(())
    }

    pub fn entity(&self, id: &str) -> Option<EntitySnapshot> {
        self.scene.registry.get(id)
    }

    pub fn player(&self) -> Option<EntitySnapshot> {
        self.scene.registry.player()
    }

    pub fn hostiles(&self) -> Vec<EntitySnapshot> {
        self.scene.registry.hostiles()
    }

    pub fn query<P>(&self, predicate: P) -> Vec<EntitySnapshot>
    where
        P: Fn(&EntitySnapshot) -> bool,
    {
        self.scene.registry.query(predicate)
    }

    pub fn select_target(&mut self, id: &str) -> Result<(), RegistryError> {
        self.scene.registry.select(id)?;
        self.commit();
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        if self.scene.registry.selected().is_some() {
            self.scene.registry.clear_selection();
            self.commit();
        }
    }

    // ── Actions ──────────────────────────────────────────────────────

    pub fn available_actions(&self, entity: &str, now: Millis) -> Vec<&ActionDefinition> {
        actions::available_actions(&self.scene, &self.catalogue, entity, now)
    }

    pub fn request_action(
        &mut self,
        actor: &str,
        action_id: &str,
        target_id: Option<&str>,
        target_position: Option<Vec2>,
        now: Millis,
    ) -> Result<(), ActionRejected> {
        match request_action(&mut self.scene, &self.catalogue, actor, action_id, target_id, target_position, now) {
            Ok(()) => {
                debug!(actor, action_id, "action queued");
                self.commit();
                Ok(())
            }
            Err(e) => {
                debug!(actor, action_id, reason = %e, "action rejected");
                Err(e)
            }
        }
    }

    /// Drops the entity's queued action. Returns whether there was one.
    pub fn cancel_action(&mut self, actor: &str) -> bool {
        if self.scene.scheduler.cancel(actor).is_some() {
            self.commit();
            true
        } else {
            false
        }
    }

    // ── Movement ─────────────────────────────────────────────────────

    /// Applies one movement-input tick for the player. Each axis is clamped to
    /// [-1, 1] and vectors longer than 1 are normalized before scaling by the
    /// player's speed.
    pub fn submit_movement_vector(&mut self, x: f32, y: f32) -> MoveOutcome {
        if self.scene.pending_exit.is_some() {
            return MoveOutcome::Ignored;
        }
        let Some(player) = self.scene.registry.player() else {
            return MoveOutcome::Ignored;
        };

        let delta = normalize_input(x, y).scale(player.move_speed);
        if delta.is_zero() {
            return MoveOutcome::Idle;
        }

        let step = match step_entity(&mut self.scene, &self.config, PLAYER_ID, delta, true) {
            Ok(step) => step,
            Err(e) => {
                warn!("Player movement failed: {}", e);
                return MoveOutcome::Ignored;
            }
        };

        let outcome = match (step.crossed, step.resolution) {
            (Some(direction), _) => {
                info!("Player crossed {:?} exit of {}", direction, self.scene.room_id);
                self.scene.pending_exit = Some(direction);
                MoveOutcome::Crossed(direction)
            }
            (None, MoveResolution::Direct(p)) => MoveOutcome::Moved(p),
            (None, MoveResolution::Slid(p)) => MoveOutcome::Slid(p),
            (None, MoveResolution::Rejected) => MoveOutcome::Rejected,
            (None, MoveResolution::Idle) => MoveOutcome::Idle,
        };
        self.commit();
        outcome
    }

    pub fn submit_movement_for_epoch(&mut self, epoch: u64, x: f32, y: f32) -> MoveOutcome {
        if epoch != self.scene.epoch {
            return MoveOutcome::Ignored;
        }
        self.submit_movement_vector(x, y)
    }

    pub fn submit_rotation(&mut self, degrees: f32) {
        if !degrees.is_finite() {
            return;
        }
        if self.scene.registry.set_facing(PLAYER_ID, degrees).is_ok() {
            self.commit();
        }
    }

    // ── Exits ────────────────────────────────────────────────────────

    /// Supplies (or replaces) the exits of the current room. Crossings are
    /// refused until this has happened at least once.
    pub fn supply_connections(&mut self, connections: Vec<RoomConnection>) {
        self.scene.gates.supply(connections);
    }

    pub fn unlock_exit(&mut self, direction: Direction) -> bool {
        self.scene.gates.unlock(direction)
    }

    /// Uses an `up`/`down` stair exit. Stairs have no edge to walk through,
    /// so this is the only way to take them.
    pub fn take_stairs(&mut self, direction: Direction) -> MoveOutcome {
        if direction.is_edge() || self.scene.pending_exit.is_some() || !self.scene.registry.is_alive(PLAYER_ID) {
            return MoveOutcome::Ignored;
        }
        let usable = self
            .scene
            .gates
            .connection(direction)
            .map(|c| !c.locked)
            .unwrap_or(false);
        if !usable {
            return MoveOutcome::Ignored;
        }
        self.scene.pending_exit = Some(direction);
        self.commit();
        MoveOutcome::Crossed(direction)
    }

    /// Re-enables movement after a reported crossing that could not be
    /// completed, e.g. because the next room failed to load.
    pub fn clear_pending_exit(&mut self) {
        if self.scene.pending_exit.take().is_some() {
            self.commit();
        }
    }

    // ── Ticks ────────────────────────────────────────────────────────

    /// One action tick: resolve due actions, expire status effects, run the
    /// hostile behavior loop.
    pub fn tick(&mut self, now: Millis) -> TickReport {
        let combat = combat_system(&mut self.scene, &self.config, now);
        let expired = status_system(&mut self.scene, now);
        let ai = hostile_ai_system(&mut self.scene, &self.catalogue, &self.config, now, &mut self.rng);
        self.scene.refresh_combat_flag();

        for line in &combat.log_entries {
            info!("{}", line);
        }

        let report = TickReport {
            resolved: combat.resolved,
            defeated: combat.defeated,
            expired,
            ai,
            log: combat.log_entries,
        };
        if !report.is_empty() {
            self.commit();
        }
        report
    }

    pub fn tick_for_epoch(&mut self, epoch: u64, now: Millis) -> Option<TickReport> {
        if epoch != self.scene.epoch {
            debug!(epoch, current = self.scene.epoch, "stale tick dropped");
            return None;
        }
        Some(self.tick(now))
    }

    // ── Room transitions ─────────────────────────────────────────────

    /// Replaces the scene with `room`. The player keeps its stats and appears
    /// opposite `entered_via`. On error the current scene stays in place.
    /// A defeated player never enters another room.
    pub fn enter_room(&mut self, room: &RoomData, entered_via: Option<Direction>) -> Result<(), SceneError> {
        if self.scene.player_defeated {
            return Err(SceneError::PlayerDefeated);
        }
        let profile = self.profile();
        let scene = Scene::build(room, &self.config, &profile, entered_via, self.next_epoch)?;
        info!(
            "Entered room {} via {:?} (epoch {})",
            room.id, entered_via, scene.epoch
        );
        self.next_epoch += 1;
        self.profile = profile;
        self.scene = scene;
        self.commit();
        Ok(())
    }
}
