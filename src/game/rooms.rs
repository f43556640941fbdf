use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use super::collision::{Obstacle, RoomLayout};
use super::gates::RoomConnection;
use super::geometry::Vec2;
use crate::ecs::components::EntitySpec;
use crate::error::RoomDataError;
use crate::protocol::{Category, Direction, EntityId, EntitySnapshot};

/// One non-player actor as described by the room-data provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityData {
    pub id: EntityId,
    pub category: Category,
    pub x: f32,
    pub y: f32,
    pub hp: i32,
    #[serde(default)]
    pub attack: i32,
    #[serde(default)]
    pub defense: i32,
    #[serde(default = "default_attack_range")]
    pub attack_range: f32,
    /// Falls back to the configured hostile speed when absent.
    #[serde(default)]
    pub move_speed: Option<f32>,
}

fn default_attack_range() -> f32 {
    15.0
}

impl EntityData {
    pub fn to_spec(&self, fallback_speed: f32) -> EntitySpec {
        EntitySpec::new(self.id.clone(), self.category, Vec2::new(self.x, self.y))
            .with_hp(self.hp)
            .with_stats(self.attack, self.defense)
            .with_range(self.attack_range)
            .with_speed(self.move_speed.unwrap_or(fallback_speed))
    }
}

/// Everything the engine consumes to build a scene for one room.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoomData {
    pub id: String,
    #[serde(default)]
    pub entities: Vec<EntityData>,
    /// `None` means the exits are not known yet; crossings stay disabled.
    #[serde(default)]
    pub connections: Option<Vec<RoomConnection>>,
    #[serde(default)]
    pub obstacles: Vec<Obstacle>,
    /// Player placement when the room is entered without crossing an edge.
    #[serde(default)]
    pub player_start: Option<Vec2>,
}

impl RoomData {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Default::default()
        }
    }

    pub fn layout(&self) -> RoomLayout {
        RoomLayout::new(self.obstacles.clone())
    }
}

/// Player stats carried from room to room. Owned by the surrounding
/// application; the engine only reads and refreshes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub hp: i32,
    pub max_hp: i32,
    pub attack: i32,
    pub defense: i32,
    pub attack_range: f32,
}

impl Default for PlayerProfile {
    fn default() -> Self {
        Self {
            hp: 100,
            max_hp: 100,
            attack: 10,
            defense: 2,
            attack_range: 15.0,
        }
    }
}

impl PlayerProfile {
    /// Profile reflecting the player's current state at the end of a visit.
    pub fn from_snapshot(player: &EntitySnapshot) -> Self {
        Self {
            hp: player.hp,
            max_hp: player.max_hp,
            attack: player.attack,
            defense: player.defense,
            attack_range: player.attack_range,
        }
    }
}

/// Called once per completed boundary crossing; supplies the next room.
pub trait RoomTransitionHandler {
    fn on_boundary_crossed(&mut self, from_room: &str, direction: Direction) -> Result<RoomData, RoomDataError>;
}

// ── JSON-backed provider ─────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoomManifest {
    pub start: String,
    pub rooms: Vec<RoomData>,
}

/// Room-data provider backed by a static JSON manifest.
#[derive(Debug, Clone, Default)]
pub struct JsonRoomProvider {
    manifest: RoomManifest,
}

impl JsonRoomProvider {
    pub fn new(manifest: RoomManifest) -> Self {
        Self { manifest }
    }

    /// Load the manifest from a JSON file on disk.
    /// Falls back to an empty manifest if the file is missing or malformed.
    pub fn load_from_file(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<RoomManifest>(&contents) {
                Ok(manifest) => {
                    info!("Loaded room manifest with {} rooms", manifest.rooms.len());
                    Self::new(manifest)
                }
                Err(e) => {
                    warn!(
                        "Failed to parse room manifest at {}: {}. Using empty manifest.",
                        path.display(),
                        e
                    );
                    Self::default()
                }
            },
            Err(e) => {
                warn!(
                    "Failed to read room manifest at {}: {}. Using empty manifest.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    pub fn room(&self, id: &str) -> Result<RoomData, RoomDataError> {
        self.manifest
            .rooms
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| RoomDataError::UnknownRoom(id.to_string()))
    }

    pub fn initial_room(&self) -> Result<RoomData, RoomDataError> {
        self.room(&self.manifest.start)
    }
}

impl RoomTransitionHandler for JsonRoomProvider {
    fn on_boundary_crossed(&mut self, from_room: &str, direction: Direction) -> Result<RoomData, RoomDataError> {
        let from = self.room(from_room)?;
        let next = from
            .connections
            .as_deref()
            .unwrap_or(&[])
            .iter()
            .find(|c| c.direction == direction)
            .and_then(|c| c.leads_to.clone())
            .ok_or_else(|| RoomDataError::NoExit {
                room: from_room.to_string(),
                direction,
            })?;
        self.room(&next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"{
        "start": "hall",
        "rooms": [
            {
                "id": "hall",
                "entities": [
                    { "id": "mob_1", "category": "hostile", "x": 55.0, "y": 50.0, "hp": 100, "defense": 5 }
                ],
                "connections": [ { "direction": "north", "leads_to": "crypt" } ],
                "obstacles": [
                    { "kind": "cover", "rect": { "min": { "x": 20.0, "y": 20.0 }, "max": { "x": 25.0, "y": 25.0 } } }
                ]
            },
            { "id": "crypt" }
        ]
    }"#;

    fn provider() -> JsonRoomProvider {
        JsonRoomProvider::new(serde_json::from_str(MANIFEST).unwrap())
    }

    #[test]
    fn manifest_parses_with_defaults() {
        let hall = provider().initial_room().unwrap();
        assert_eq!(hall.entities.len(), 1);
        assert_eq!(hall.entities[0].attack_range, 15.0);
        assert_eq!(hall.entities[0].move_speed, None);
        assert_eq!(hall.obstacles.len(), 1);

        let crypt = provider().room("crypt").unwrap();
        assert!(crypt.connections.is_none());
        assert!(crypt.entities.is_empty());
    }

    #[test]
    fn crossing_follows_connection() {
        let mut p = provider();
        let next = p.on_boundary_crossed("hall", Direction::North).unwrap();
        assert_eq!(next.id, "crypt");
    }

    #[test]
    fn crossing_without_exit_is_an_error() {
        let mut p = provider();
        assert!(matches!(
            p.on_boundary_crossed("hall", Direction::East),
            Err(RoomDataError::NoExit { .. })
        ));
        assert!(matches!(
            p.on_boundary_crossed("nowhere", Direction::North),
            Err(RoomDataError::UnknownRoom(_))
        ));
    }

    #[test]
    fn missing_file_yields_empty_manifest() {
        let p = JsonRoomProvider::load_from_file(Path::new("/definitely/not/here.json"));
        assert!(p.initial_room().is_err());
    }

    #[test]
    fn entity_data_uses_fallback_speed() {
        let hall = provider().initial_room().unwrap();
        let spec = hall.entities[0].to_spec(1.5);
        assert_eq!(spec.move_speed, 1.5);
        assert_eq!(spec.defense, 5);
        assert_eq!(spec.max_hp, 100);
    }
}
