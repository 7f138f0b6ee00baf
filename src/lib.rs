pub mod backend;
pub mod config;
pub mod drivetrain;
pub mod error;
pub mod net;
pub mod physics;
pub mod session;
pub mod state;
pub mod suspension;
pub mod telemetry;
pub mod terrain;
pub mod vehicle;

pub use error::{Error, Result};
