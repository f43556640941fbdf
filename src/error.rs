use thiserror::Error;

use crate::protocol::{ActionId, EntityId, Millis};

/// Why an action request was refused. Refusals never mutate the scene.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ActionRejected {
    #[error("unknown entity: {0}")]
    UnknownEntity(EntityId),
    #[error("unknown action: {0}")]
    UnknownAction(ActionId),
    #[error("entity {0} is defeated")]
    ActorDefeated(EntityId),
    #[error("{action} on cooldown for {remaining} ms")]
    OnCooldown { action: ActionId, remaining: Millis },
    #[error("entity {0} already has a queued action")]
    SlotOccupied(EntityId),
    #[error("action {0} needs a target")]
    MissingTarget(ActionId),
    #[error("invalid target: {0}")]
    InvalidTarget(EntityId),
    #[error("target out of range: distance {distance:.1}, range {range:.1}")]
    OutOfRange { distance: f32, range: f32 },
    #[error("target position is not a finite point")]
    InvalidPosition,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    #[error("duplicate entity id: {0}")]
    DuplicateId(EntityId),
    #[error("unknown entity: {0}")]
    UnknownEntity(EntityId),
    #[error("entity {0} needs a positive max hp")]
    InvalidMaxHp(EntityId),
}

/// Failure to build a scene from room data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SceneError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("room {0} places an entity with the reserved player id")]
    ReservedId(String),
    #[error("the player is defeated")]
    PlayerDefeated,
}

/// Failure of the room-data provider.
#[derive(Debug, Error)]
pub enum RoomDataError {
    #[error("unknown room: {0}")]
    UnknownRoom(String),
    #[error("room {room} has no exit {direction:?}")]
    NoExit {
        room: String,
        direction: crate::protocol::Direction,
    },
}
