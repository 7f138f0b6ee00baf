use anyhow::Context;
use log::info;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, MissedTickBehavior};

use truck_server::config::{Registry, ServerConfig};
use truck_server::net::serve;
use truck_server::session::{Session, SessionStatus};
use truck_server::state::{ServerState, SessionCommand};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("🚀 Starting truck server...");

    let cfg = ServerConfig::from_env().context("reading server settings")?;
    let registry = match &cfg.registry_path {
        Some(path) => Registry::from_path(path).with_context(|| format!("loading registry {}", path.display()))?,
        None => Registry::builtin(),
    };
    let level = registry.level(cfg.level)?;
    let truck = registry.truck(cfg.truck.as_deref())?;

    let mut session = Session::new(level, truck, &cfg.asset_root)
        .with_context(|| format!("building level '{}'", level.name))?;

    // Net tasks talk to the loop through this channel only
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<SessionCommand>();
    let listener = TcpListener::bind(&cfg.bind_addr)
        .await
        .with_context(|| format!("binding {}", cfg.bind_addr))?;
    tokio::spawn(serve(listener, cmd_tx));

    // Fixed timestep
    let dt = cfg.dt();
    let mut ticker = interval(Duration::from_secs_f32(dt));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut server = ServerState::new();
    let mut announced_finish = false;

    loop {
        ticker.tick().await;

        while let Ok(cmd) = cmd_rx.try_recv() {
            server.apply(cmd, &mut session);
        }

        match session.step(server.input, dt) {
            SessionStatus::Finished if !announced_finish => {
                info!("🏆 Level complete, send restart to run it again");
                announced_finish = true;
            }
            SessionStatus::Running => announced_finish = false,
            _ => {}
        }

        server.broadcast_snapshot(&session);
    }
}
