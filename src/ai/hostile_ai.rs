use rand::Rng;
use tracing::debug;

use crate::actions::catalogue::{ActionCatalogue, BASIC_ATTACK};
use crate::actions::request_action;
use crate::config::EngineConfig;
use crate::ecs::world::Scene;
use crate::game::collision::MoveResolution;
use crate::game::geometry::{distance, normalize, Vec2};
use crate::game::movement::step_entity;
use crate::protocol::{EntityId, Millis, PLAYER_ID};

/// What one hostile did this tick.
#[derive(Debug, Clone, PartialEq)]
pub enum AiDecision {
    Attack,
    Approach(Vec2),
    Sidestep(Vec2),
    /// In reach but the attack was refused (cooldown); holds position.
    Hold,
    Blocked,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AiStep {
    pub hostile: EntityId,
    pub decision: AiDecision,
}

/// Runs the behavior loop once for every live hostile without a queued
/// action, in insertion order.
///
/// A hostile in reach of the player requests `basic_attack`; otherwise it
/// walks straight at the player. If that step is fully blocked it tries one
/// sidestep to a random side. No pathfinding.
pub fn hostile_ai_system<R: Rng>(
    scene: &mut Scene,
    catalogue: &ActionCatalogue,
    config: &EngineConfig,
    now: Millis,
    rng: &mut R,
) -> Vec<AiStep> {
    let Some(player) = scene.registry.player().filter(|p| p.is_alive()) else {
        return Vec::new();
    };
    let attack_reach = catalogue
        .get(BASIC_ATTACK)
        .and_then(|def| def.range)
        .unwrap_or(f32::INFINITY);

    // ── Collect hostile data up front ─────────────────────────────────
    let hostiles: Vec<(EntityId, Vec2, f32, f32)> = scene
        .registry
        .hostiles()
        .into_iter()
        .filter(|h| h.is_alive() && !scene.scheduler.has_pending(&h.id))
        .map(|h| (h.id, h.position, h.attack_range, h.move_speed))
        .collect();

    let mut steps = Vec::with_capacity(hostiles.len());
    for (id, pos, attack_range, speed) in hostiles {
        let dist = distance(pos, player.position);

        let decision = if dist <= attack_range.min(attack_reach) {
            match request_action(scene, catalogue, &id, BASIC_ATTACK, Some(PLAYER_ID), None, now) {
                Ok(()) => AiDecision::Attack,
                Err(_) => AiDecision::Hold,
            }
        } else if speed <= 0.0 {
            AiDecision::Hold
        } else {
            let heading = normalize(player.position.sub(pos));
            approach(scene, config, &id, heading, speed, rng)
        };

        debug!(hostile = %id, ?decision, "ai step");
        steps.push(AiStep { hostile: id, decision });
    }
    steps
}

fn approach<R: Rng>(
    scene: &mut Scene,
    config: &EngineConfig,
    id: &str,
    heading: Vec2,
    speed: f32,
    rng: &mut R,
) -> AiDecision {
    let step = match step_entity(scene, config, id, heading.scale(speed), false) {
        Ok(step) => step,
        Err(_) => return AiDecision::Blocked,
    };
    match step.resolution {
        MoveResolution::Direct(p) | MoveResolution::Slid(p) => return AiDecision::Approach(p),
        MoveResolution::Idle => return AiDecision::Hold,
        MoveResolution::Rejected => {}
    }

    let side = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
    let perpendicular = Vec2::new(-heading.y * side, heading.x * side);
    match step_entity(scene, config, id, perpendicular.scale(speed), false) {
        Ok(step) => match step.resolution.position() {
            Some(p) => AiDecision::Sidestep(p),
            None => AiDecision::Blocked,
        },
        Err(_) => AiDecision::Blocked,
    }
}
