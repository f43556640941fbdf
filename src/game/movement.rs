use super::collision::{ClampMode, CollisionResolver, MoveResolution};
use super::gates::GateCheck;
use super::geometry::{facing_from_vector, Vec2};
use crate::config::EngineConfig;
use crate::ecs::world::Scene;
use crate::error::RegistryError;
use crate::protocol::Direction;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepResult {
    pub resolution: MoveResolution,
    /// Exit crossed by this step, if the mover actually moved through a gate.
    pub crossed: Option<Direction>,
}

/// Moves one entity by `delta` through the collision resolver and writes the
/// result back. Facing follows the intended direction even when the move is
/// rejected. Gate detection only runs when `detect_gates` is set.
pub fn step_entity(
    scene: &mut Scene,
    config: &EngineConfig,
    id: &str,
    delta: Vec2,
    detect_gates: bool,
) -> Result<StepResult, RegistryError> {
    let from = scene
        .registry
        .position(id)
        .ok_or_else(|| RegistryError::UnknownEntity(id.to_string()))?;

    let gate = if detect_gates {
        scene.gates.check(id, from, delta)
    } else {
        GateCheck::None
    };
    let mode = if gate.allows_exit_clamp() {
        ClampMode::Exit
    } else {
        ClampMode::Interior
    };

    let others = scene.registry.live_positions_except(id);
    let resolution = CollisionResolver::new(&scene.layout, config).resolve_move(from, delta, &others, mode);

    if let Some(degrees) = facing_from_vector(delta) {
        scene.registry.set_facing(id, degrees)?;
    }
    if let Some(to) = resolution.position() {
        scene.registry.set_position(id, to)?;
    }

    let crossed = match (gate, resolution) {
        (GateCheck::Crossed(direction), MoveResolution::Direct(_)) => Some(direction),
        _ => None,
    };
    Ok(StepResult { resolution, crossed })
}
