use std::env;
use std::path::PathBuf;

use tracing::{error, info, warn};

use room_combat_engine::actions::catalogue::ActionCatalogue;
use room_combat_engine::config::EngineConfig;
use room_combat_engine::engine::CombatEngine;
use room_combat_engine::game::rooms::{JsonRoomProvider, PlayerProfile, RoomData};
use room_combat_engine::network::server::SnapshotServer;
use room_combat_engine::notify::NotificationBus;
use room_combat_engine::protocol::{ClientInput, ServerMessage};
use room_combat_engine::runtime::session::Session;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = EngineConfig::from_env();
    let rooms_path = env::var("COMBAT_ROOMS_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("assets/rooms.json"));
    let rooms = JsonRoomProvider::load_from_file(&rooms_path);
    let first_room = rooms.initial_room().unwrap_or_else(|e| {
        warn!("{}; starting in an empty room", e);
        RoomData::new("start")
    });

    let bus = NotificationBus::new();
    let (_subscription, mut snapshots) = bus.subscribe_channel();
    let engine = match CombatEngine::new(config, ActionCatalogue::default(), bus, &first_room, PlayerProfile::default()) {
        Ok(engine) => engine,
        Err(e) => {
            error!("Cannot build room {}: {}", first_room.id, e);
            return;
        }
    };

    let addr = env::var("COMBAT_LISTEN_ADDR").unwrap_or_else(|_| "127.0.0.1:9001".to_string());
    let mut server = match SnapshotServer::start(&addr).await {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to start server on {}: {}", addr, e);
            return;
        }
    };

    // The initial scene is already queued on `snapshots` by the engine's first commit.
    let mut room_id = engine.room_id().to_string();
    let session = Session::spawn(engine, rooms);

    loop {
        tokio::select! {
            Some(snapshot) = snapshots.recv() => {
                if snapshot.room_id != room_id {
                    room_id = snapshot.room_id.clone();
                    server.send_message(&ServerMessage::RoomChanged { room_id: room_id.clone() });
                }
                server.send_snapshot(&snapshot);
            }
            input = server.input_rx.recv() => {
                let Some(input) = input else {
                    info!("Client closed the connection");
                    break;
                };
                let action_id = match &input {
                    ClientInput::Action { action_id, .. } => Some(action_id.clone()),
                    _ => None,
                };
                if let Err(e) = session.apply(input).await {
                    server.send_message(&ServerMessage::ActionRejected {
                        action_id: action_id.unwrap_or_default(),
                        reason: e.to_string(),
                    });
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
        if !server.is_connected() {
            break;
        }
    }

    session.shutdown().await;
}
