use serde::Deserialize;
use tracing::{info, warn};

/// Tunables for one engine instance. Distances are in room units (0–100),
/// durations in milliseconds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Cadence of the action-resolution tick (also runs the behavior loop).
    pub action_tick_ms: u64,
    /// Cadence of the movement-input tick.
    pub input_tick_ms: u64,
    /// Player displacement per input tick at full stick deflection.
    pub player_speed: f32,
    /// Default hostile displacement per behavior tick.
    pub hostile_speed: f32,
    /// Distance from each edge that ordinary movement may not cross.
    pub interior_margin: f32,
    /// A crossing counts once the crossing coordinate is within this distance of the edge.
    pub exit_threshold: f32,
    /// Half-width of the band around the midline in which a gate is open.
    pub gate_tolerance: f32,
    /// Minimum centre-to-centre distance between two live entities.
    pub min_separation: f32,
    /// Extra clearance kept around static obstacles.
    pub obstacle_buffer: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            action_tick_ms: 100,
            input_tick_ms: 50,
            player_speed: 2.0,
            hostile_speed: 1.5,
            interior_margin: 5.0,
            exit_threshold: 3.0,
            gate_tolerance: 10.0,
            min_separation: 4.0,
            obstacle_buffer: 1.5,
        }
    }
}

impl EngineConfig {
    /// Defaults overlaid with any `COMBAT_*` environment variables. A `.env`
    /// file is read first when present. Unparseable values are ignored with a
    /// warning.
    pub fn from_env() -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            info!("Loaded environment from {}", path.display());
        }

        let mut config = Self::default();
        overlay(&mut config.action_tick_ms, "COMBAT_ACTION_TICK_MS");
        overlay(&mut config.input_tick_ms, "COMBAT_INPUT_TICK_MS");
        overlay(&mut config.player_speed, "COMBAT_PLAYER_SPEED");
        overlay(&mut config.hostile_speed, "COMBAT_HOSTILE_SPEED");
        overlay(&mut config.interior_margin, "COMBAT_INTERIOR_MARGIN");
        overlay(&mut config.exit_threshold, "COMBAT_EXIT_THRESHOLD");
        overlay(&mut config.gate_tolerance, "COMBAT_GATE_TOLERANCE");
        overlay(&mut config.min_separation, "COMBAT_MIN_SEPARATION");
        overlay(&mut config.obstacle_buffer, "COMBAT_OBSTACLE_BUFFER");
        config
    }
}

fn overlay<T: std::str::FromStr>(slot: &mut T, key: &str) {
    let Ok(raw) = std::env::var(key) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => *slot = value,
        Err(_) => warn!("Ignoring unparseable {}={:?}", key, raw),
    }
}
