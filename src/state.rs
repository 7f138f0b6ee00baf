// ==============================================================================
// state.rs — WIRE MESSAGES + CONNECTED VIEWERS
// ------------------------------------------------------------------------------
// client -> server (JSON, "type" tagged):
//   {"type":"input","direction":1,"brake":false}
//   {"type":"reset"} {"type":"restart"} {"type":"ping"}
// server -> client:
//   welcome (once, with terrain), snapshot (every tick), pong, error
//
// ServerState lives inside the tick loop. Net tasks only reach it through
// SessionCommand messages.
// ==============================================================================

use std::collections::HashMap;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::backend::{Aabb2, BodyState, Vec2};
use crate::drivetrain::{DriveInput, MotorState, TorquePair};
use crate::session::{Progress, Session, SessionStatus};
use crate::telemetry::{format_level_time, Telemetry};

// --------------------------------------------------
// client -> server
// --------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Input {
        #[serde(default)]
        direction: f32,
        #[serde(default)]
        brake: bool,
    },
    Reset,
    Restart,
    Ping,
}

impl ClientMessage {
    pub fn from_json(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}

/// What net tasks hand to the tick loop.
#[derive(Debug)]
pub enum SessionCommand {
    Connect { client_id: Uuid, tx: UnboundedSender<String> },
    Disconnect { client_id: Uuid },
    Input { client_id: Uuid, input: DriveInput },
    Reset { client_id: Uuid },
    Restart { client_id: Uuid },
}

// --------------------------------------------------
// server -> client
// --------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Pose {
    pub x: f32,
    pub y: f32,
    pub angle: f32,
}

impl From<&BodyState> for Pose {
    fn from(s: &BodyState) -> Self {
        Self { x: s.position[0], y: s.position[1], angle: s.angle }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub tick: u64,
    pub status: SessionStatus,
    pub level_time: String,
    pub level_seconds: f32,
    pub chassis: Pose,
    pub wheel_rear: Pose,
    pub wheel_front: Pose,
    pub bounds: Option<Aabb2>,
    pub telemetry: Telemetry,
    pub progress: Progress,
    pub motor: MotorState,
    pub torque: TorquePair,
}

impl Snapshot {
    pub fn capture(session: &Session) -> Self {
        let states = session.vehicle_states().unwrap_or_default();
        Self {
            tick: session.tick,
            status: session.status(),
            level_time: format_level_time(session.level_time()),
            level_seconds: session.level_time(),
            chassis: Pose::from(&states.chassis),
            wheel_rear: Pose::from(&states.rear),
            wheel_front: Pose::from(&states.front),
            bounds: session.vehicle_bounds(),
            telemetry: session.telemetry(),
            progress: session.progress(),
            motor: session.vehicle.drivetrain.state(),
            torque: session.last_torque(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    Welcome {
        client_id: String,
        level: String,
        truck: String,
        terrain: Vec<Vec<Vec2>>,
        start: Vec2,
        finish_x: f32,
    },
    Snapshot(Snapshot),
    Pong,
    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn welcome(client_id: Uuid, session: &Session) -> Self {
        ServerMessage::Welcome {
            client_id: client_id.to_string(),
            level: session.level.name.clone(),
            truck: session.truck.name.clone(),
            terrain: session.terrain().runs.iter().map(|r| r.points.clone()).collect(),
            start: session.start(),
            finish_x: session.progress().finish_x,
        }
    }

    pub fn to_json(&self) -> String {
        // plain data, serialization cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }
}

// --------------------------------------------------
// viewers
// --------------------------------------------------

#[derive(Default)]
pub struct ServerState {
    pub clients: HashMap<Uuid, UnboundedSender<String>>,
    pub input: DriveInput, // latest input from any viewer drives the truck
}

impl ServerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one command from a net task to the session.
    pub fn apply(&mut self, cmd: SessionCommand, session: &mut Session) {
        match cmd {
            SessionCommand::Connect { client_id, tx } => {
                let _ = tx.send(ServerMessage::welcome(client_id, session).to_json());
                self.clients.insert(client_id, tx);
                info!("🟢 Viewer connected: {} ({} total)", client_id, self.clients.len());
            }
            SessionCommand::Disconnect { client_id } => {
                self.clients.remove(&client_id);
                info!("🔴 Viewer disconnected: {} ({} left)", client_id, self.clients.len());
                if self.clients.is_empty() {
                    self.input = DriveInput::default();
                }
            }
            SessionCommand::Input { input, .. } => {
                self.input = input;
            }
            SessionCommand::Reset { client_id } => {
                info!("reset requested by {client_id}");
                session.reset_vehicle();
            }
            SessionCommand::Restart { client_id } => {
                info!("restart requested by {client_id}");
                if let Err(e) = session.restart() {
                    warn!("⚠️ Restart failed: {e}");
                    self.send_to(client_id, ServerMessage::Error { message: e.to_string() });
                    return;
                }
                self.input = DriveInput::default();
                // terrain may differ after a reload
                let ids: Vec<Uuid> = self.clients.keys().copied().collect();
                for id in ids {
                    self.send_to(id, ServerMessage::welcome(id, session));
                }
            }
        }
    }

    fn send_to(&self, client_id: Uuid, msg: ServerMessage) {
        if let Some(tx) = self.clients.get(&client_id) {
            let _ = tx.send(msg.to_json());
        }
    }

    /// Build and send a snapshot to every viewer.
    pub fn broadcast_snapshot(&mut self, session: &Session) {
        if self.clients.is_empty() {
            return;
        }
        let json = ServerMessage::Snapshot(Snapshot::capture(session)).to_json();
        // a closed channel means the viewer's task is gone
        self.clients.retain(|_, tx| tx.send(json.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{simple_green, Registry};
    use std::path::Path;
    use tokio::sync::mpsc;

    fn session() -> Session {
        Session::new(&Registry::builtin().levels[0], &simple_green(), Path::new("assets")).unwrap()
    }

    #[test]
    fn parses_client_messages() {
        assert_eq!(
            ClientMessage::from_json(r#"{"type":"input","direction":1,"brake":true}"#),
            Some(ClientMessage::Input { direction: 1.0, brake: true })
        );
        assert_eq!(
            ClientMessage::from_json(r#"{"type":"input"}"#),
            Some(ClientMessage::Input { direction: 0.0, brake: false })
        );
        assert_eq!(ClientMessage::from_json(r#"{"type":"reset"}"#), Some(ClientMessage::Reset));
        assert_eq!(ClientMessage::from_json(r#"{"type":"ping"}"#), Some(ClientMessage::Ping));
        assert_eq!(ClientMessage::from_json(r#"{"type":"warp"}"#), None);
        assert_eq!(ClientMessage::from_json("not json"), None);
    }

    #[test]
    fn connect_sends_welcome_with_terrain() {
        let mut s = session();
        let mut server = ServerState::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        server.apply(SessionCommand::Connect { client_id: id, tx }, &mut s);

        let msg: serde_json::Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(msg["type"], "welcome");
        assert_eq!(msg["client_id"], id.to_string());
        assert!(msg["terrain"].as_array().unwrap().len() >= 1);
    }

    #[test]
    fn snapshot_reaches_viewers_and_dead_ones_are_dropped() {
        let mut s = session();
        let mut server = ServerState::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (dead_tx, dead_rx) = mpsc::unbounded_channel();
        server.apply(SessionCommand::Connect { client_id: Uuid::new_v4(), tx }, &mut s);
        server.apply(SessionCommand::Connect { client_id: Uuid::new_v4(), tx: dead_tx }, &mut s);
        drop(dead_rx);

        let _welcome = rx.try_recv().unwrap();
        server.broadcast_snapshot(&s);
        let snap: serde_json::Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(snap["type"], "snapshot");
        assert_eq!(snap["status"], "running");
        assert_eq!(snap["level_time"], "00:00");
        assert_eq!(server.clients.len(), 1);
    }

    #[test]
    fn last_viewer_leaving_releases_the_throttle() {
        let mut s = session();
        let mut server = ServerState::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        server.apply(SessionCommand::Connect { client_id: id, tx }, &mut s);
        server.apply(SessionCommand::Input { client_id: id, input: DriveInput::new(1, false) }, &mut s);
        assert_eq!(server.input.direction, 1);
        server.apply(SessionCommand::Disconnect { client_id: id }, &mut s);
        assert_eq!(server.input, DriveInput::default());
    }
}
