use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::engine::{CombatEngine, MoveOutcome};
use crate::error::ActionRejected;
use crate::game::geometry::Vec2;
use crate::game::rooms::RoomTransitionHandler;
use crate::protocol::{ClientInput, Direction, Millis, PLAYER_ID};

/// Milliseconds since the session started, used as the engine's `now`.
#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    origin: Instant,
}

impl SessionClock {
    pub fn start() -> Self {
        Self { origin: Instant::now() }
    }

    pub fn now(&self) -> Millis {
        self.origin.elapsed().as_millis() as Millis
    }
}

#[derive(Debug)]
enum Control {
    Crossed { epoch: u64, direction: Direction },
    Shutdown,
}

/// Tick tasks of one scene. Aborted before the next scene is built.
struct SceneTasks {
    action_tick: JoinHandle<()>,
    input_tick: JoinHandle<()>,
}

impl SceneTasks {
    fn abort(self) {
        self.action_tick.abort();
        self.input_tick.abort();
    }
}

/// Drives a [`CombatEngine`] in real time.
///
/// Two fixed-rate tasks per scene: the action tick and the movement-input tick
/// that applies the currently held movement vector. A supervisor task owns the
/// room-transition handler and swaps scenes when the player crosses an exit.
pub struct Session {
    engine: Arc<Mutex<CombatEngine>>,
    movement: watch::Sender<Vec2>,
    control: mpsc::UnboundedSender<Control>,
    clock: SessionClock,
    supervisor: JoinHandle<()>,
}

impl Session {
    pub fn spawn<H>(engine: CombatEngine, handler: H) -> Self
    where
        H: RoomTransitionHandler + Send + 'static,
    {
        let engine = Arc::new(Mutex::new(engine));
        let (movement, movement_rx) = watch::channel(Vec2::ZERO);
        let (control, control_rx) = mpsc::unbounded_channel();
        let clock = SessionClock::start();

        let supervisor = tokio::spawn(supervise(
            engine.clone(),
            handler,
            movement_rx,
            control.clone(),
            control_rx,
            clock,
        ));

        Self {
            engine,
            movement,
            control,
            clock,
            supervisor,
        }
    }

    pub fn engine(&self) -> Arc<Mutex<CombatEngine>> {
        self.engine.clone()
    }

    pub fn now(&self) -> Millis {
        self.clock.now()
    }

    /// Sets the held movement vector. (0, 0) releases it.
    pub fn set_movement(&self, x: f32, y: f32) {
        self.movement.send_replace(Vec2::new(x, y));
    }

    /// Applies one client input to the player.
    pub async fn apply(&self, input: ClientInput) -> Result<(), ActionRejected> {
        match input {
            ClientInput::Move { x, y } => self.set_movement(x, y),
            ClientInput::Rotate { degrees } => self.engine.lock().await.submit_rotation(degrees),
            ClientInput::Action {
                action_id,
                target_id,
                target_position,
            } => {
                let now = self.clock.now();
                self.engine.lock().await.request_action(
                    PLAYER_ID,
                    &action_id,
                    target_id.as_deref(),
                    target_position,
                    now,
                )?;
            }
            ClientInput::Cancel => {
                self.engine.lock().await.cancel_action(PLAYER_ID);
            }
            ClientInput::Select { target_id: Some(id) } => {
                if let Err(e) = self.engine.lock().await.select_target(&id) {
                    warn!("Selection ignored: {}", e);
                }
            }
            ClientInput::Select { target_id: None } => self.engine.lock().await.clear_selection(),
            ClientInput::Stairs { direction } => {
                let mut engine = self.engine.lock().await;
                if let MoveOutcome::Crossed(direction) = engine.take_stairs(direction) {
                    let _ = self.control.send(Control::Crossed {
                        epoch: engine.epoch(),
                        direction,
                    });
                }
            }
        }
        Ok(())
    }

    /// Stops the tick tasks and the supervisor.
    pub async fn shutdown(self) {
        let _ = self.control.send(Control::Shutdown);
        if let Err(e) = self.supervisor.await {
            warn!("Session supervisor ended abnormally: {}", e);
        }
    }
}

async fn supervise<H: RoomTransitionHandler>(
    engine: Arc<Mutex<CombatEngine>>,
    mut handler: H,
    movement: watch::Receiver<Vec2>,
    control_tx: mpsc::UnboundedSender<Control>,
    mut control_rx: mpsc::UnboundedReceiver<Control>,
    clock: SessionClock,
) {
    loop {
        let (epoch, action_ms, input_ms) = {
            let engine = engine.lock().await;
            let config = engine.config();
            (engine.epoch(), config.action_tick_ms, config.input_tick_ms)
        };
        let tasks = SceneTasks {
            action_tick: tokio::spawn(action_tick_loop(engine.clone(), clock, epoch, action_ms)),
            input_tick: tokio::spawn(input_tick_loop(
                engine.clone(),
                movement.clone(),
                control_tx.clone(),
                epoch,
                input_ms,
            )),
        };

        // ── Wait for this scene's crossing ──────────────────────────
        let direction = loop {
            match control_rx.recv().await {
                Some(Control::Crossed { epoch: e, direction }) if e == epoch => break Some(direction),
                Some(Control::Crossed { epoch: e, .. }) => debug!(stale = e, epoch, "stale crossing dropped"),
                Some(Control::Shutdown) | None => break None,
            }
        };
        tasks.abort();

        let Some(direction) = direction else {
            info!("Session shutting down");
            return;
        };

        let mut engine = engine.lock().await;
        let from = engine.room_id().to_string();
        match handler.on_boundary_crossed(&from, direction) {
            Ok(room) => {
                if let Err(e) = engine.enter_room(&room, Some(direction)) {
                    warn!("Could not enter room {}: {}", room.id, e);
                    engine.clear_pending_exit();
                }
            }
            Err(e) => {
                warn!("No room beyond {:?} exit of {}: {}", direction, from, e);
                engine.clear_pending_exit();
            }
        }
    }
}

async fn action_tick_loop(engine: Arc<Mutex<CombatEngine>>, clock: SessionClock, epoch: u64, period_ms: Millis) {
    let mut ticker = interval(Duration::from_millis(period_ms.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        let now = clock.now();
        if engine.lock().await.tick_for_epoch(epoch, now).is_none() {
            break;
        }
    }
}

async fn input_tick_loop(
    engine: Arc<Mutex<CombatEngine>>,
    movement: watch::Receiver<Vec2>,
    control: mpsc::UnboundedSender<Control>,
    epoch: u64,
    period_ms: Millis,
) {
    let mut ticker = interval(Duration::from_millis(period_ms.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        let held = *movement.borrow();
        if held.is_zero() {
            continue;
        }

        let mut engine = engine.lock().await;
        if engine.epoch() != epoch {
            break;
        }
        if let MoveOutcome::Crossed(direction) = engine.submit_movement_for_epoch(epoch, held.x, held.y) {
            let _ = control.send(Control::Crossed { epoch, direction });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::catalogue::ActionCatalogue;
    use crate::config::EngineConfig;
    use crate::game::gates::RoomConnection;
    use crate::game::rooms::{JsonRoomProvider, PlayerProfile, RoomData, RoomManifest};
    use crate::notify::NotificationBus;

    fn provider() -> JsonRoomProvider {
        let mut hall = RoomData::new("hall");
        hall.connections = Some(vec![RoomConnection::open(Direction::North, "crypt")]);
        hall.player_start = Some(Vec2::new(50.0, 8.0));
        let mut crypt = RoomData::new("crypt");
        crypt.connections = Some(vec![RoomConnection::open(Direction::South, "hall")]);
        JsonRoomProvider::new(RoomManifest {
            start: "hall".into(),
            rooms: vec![hall, crypt],
        })
    }

    fn fast_config() -> EngineConfig {
        EngineConfig {
            action_tick_ms: 5,
            input_tick_ms: 5,
            ..EngineConfig::default()
        }
    }

    #[tokio::test]
    async fn walking_through_a_gate_swaps_the_scene() {
        let rooms = provider();
        let bus = NotificationBus::new();
        let (_id, mut snapshots) = bus.subscribe_channel();
        let engine = CombatEngine::new(
            fast_config(),
            ActionCatalogue::default(),
            bus,
            &rooms.initial_room().unwrap(),
            PlayerProfile::default(),
        )
        .unwrap();
        let session = Session::spawn(engine, rooms);

        session.set_movement(0.0, -1.0);
        let entered = tokio::time::timeout(Duration::from_secs(5), async {
            while let Some(snap) = snapshots.recv().await {
                if snap.room_id == "crypt" {
                    return Some(snap);
                }
            }
            None
        })
        .await
        .expect("crossing timed out")
        .expect("bus closed");
        session.set_movement(0.0, 0.0);

        assert_eq!(entered.epoch, 2);
        assert!(entered.pending_exit.is_none());
        let player = entered.entity(PLAYER_ID).unwrap();
        assert_eq!(player.position, Vec2::new(50.0, 95.0));

        session.shutdown().await;
    }

    #[tokio::test]
    async fn unknown_room_clears_the_pending_exit() {
        let mut hall = RoomData::new("hall");
        hall.connections = Some(vec![RoomConnection::open(Direction::Down, "nowhere")]);
        let rooms = JsonRoomProvider::new(RoomManifest {
            start: "hall".into(),
            rooms: vec![hall],
        });
        let engine = CombatEngine::new(
            fast_config(),
            ActionCatalogue::default(),
            NotificationBus::new(),
            &rooms.initial_room().unwrap(),
            PlayerProfile::default(),
        )
        .unwrap();
        let session = Session::spawn(engine, rooms);

        session
            .apply(ClientInput::Stairs { direction: Direction::Down })
            .await
            .unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let snap = session.engine().lock().await.snapshot();
                if snap.pending_exit.is_none() {
                    return snap;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("pending exit never cleared");
        assert_eq!(session.engine().lock().await.room_id(), "hall");

        session.shutdown().await;
    }

    #[tokio::test]
    async fn rejected_input_is_reported() {
        let rooms = provider();
        let engine = CombatEngine::new(
            fast_config(),
            ActionCatalogue::default(),
            NotificationBus::new(),
            &rooms.initial_room().unwrap(),
            PlayerProfile::default(),
        )
        .unwrap();
        let session = Session::spawn(engine, rooms);

        let err = session
            .apply(ClientInput::Action {
                action_id: "fireball".into(),
                target_id: None,
                target_position: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err, ActionRejected::UnknownAction("fireball".into()));

        session.shutdown().await;
    }
}
