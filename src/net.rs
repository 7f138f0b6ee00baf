use futures::{SinkExt, StreamExt};
use log::{info, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_tungstenite::accept_async;
use tungstenite::Message;
use uuid::Uuid;

use crate::drivetrain::DriveInput;
use crate::state::{ClientMessage, ServerMessage, SessionCommand};

/// Accept loop. Each viewer gets its own task; the session itself is only
/// reached through `commands`.
pub async fn serve(listener: TcpListener, commands: UnboundedSender<SessionCommand>) {
    if let Ok(addr) = listener.local_addr() {
        info!("🌐 WebSocket listening on ws://{addr}");
    }

    loop {
        let (raw, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("⚠️ accept failed: {e}");
                continue;
            }
        };
        let commands = commands.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_viewer(raw, commands).await {
                warn!("⚠️ viewer {peer} dropped: {e}");
            }
        });
    }
}

async fn handle_viewer(raw: TcpStream, commands: UnboundedSender<SessionCommand>) -> anyhow::Result<()> {
    let ws = accept_async(raw).await?;
    let (mut write, mut read) = ws.split();
    let client_id = Uuid::new_v4();

    // -------------------------------
    // 1) outgoing channel + send loop
    // -------------------------------
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if write.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    // -------------------------------
    // 2) register with the tick loop (welcome comes back through tx)
    // -------------------------------
    commands.send(SessionCommand::Connect { client_id, tx: tx.clone() })?;

    // -------------------------------
    // 3) receive loop
    // -------------------------------
    while let Some(msg) = read.next().await {
        let msg = match msg {
            Ok(m) => m,
            Err(_) => break,
        };
        if msg.is_close() {
            break;
        }
        let Ok(text) = msg.to_text() else { continue };

        let cmd = match ClientMessage::from_json(text) {
            Some(ClientMessage::Ping) => {
                let _ = tx.send(ServerMessage::Pong.to_json());
                continue;
            }
            Some(ClientMessage::Input { direction, brake }) => SessionCommand::Input {
                client_id,
                input: DriveInput::from_axis(direction, brake),
            },
            Some(ClientMessage::Reset) => SessionCommand::Reset { client_id },
            Some(ClientMessage::Restart) => SessionCommand::Restart { client_id },
            None => continue,
        };
        if commands.send(cmd).is_err() {
            break; // tick loop gone
        }
    }

    let _ = commands.send(SessionCommand::Disconnect { client_id });
    Ok(())
}
