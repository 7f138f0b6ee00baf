// ==============================================================================
// session.rs — ONE LEVEL RUN: WORLD + TERRAIN + VEHICLE + CLOCK
// ------------------------------------------------------------------------------
// Session::new():
//   validate specs -> load terrain -> world (level gravity) -> install terrain
//   -> spawn vehicle at the level start
//
// step(input, dt):
//   1) drivetrain torque (wheel + chassis reaction)
//   2) physics step
//   3) level clock, checkpoints, finish line, HUD sampler
//
// The session decides completion from what the vehicle exposes: the right edge
// of its bounding box against the finish line (world x). Once finished, step()
// does nothing.
//
// reset_vehicle(): fresh vehicle 2 m above where the chassis is, +10 s penalty.
// restart():       everything rebuilt from the specs.
// ==============================================================================

use std::path::{Path, PathBuf};

use log::info;
use serde::Serialize;

use crate::backend::{Aabb2, PhysicsBackend, Vec2};
use crate::config::{LevelSpec, TruckSpec};
use crate::drivetrain::{DriveInput, TorquePair};
use crate::error::Result;
use crate::physics::PhysicsWorld;
use crate::telemetry::{Telemetry, TelemetrySampler};
use crate::terrain::Terrain;
use crate::vehicle::{Vehicle, VehicleStates, DEFAULT_GROUP};

pub const RESET_PENALTY: f32 = 10.0; // seconds
pub const RESET_LIFT: f32 = 2.0; // meters

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Running,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Progress {
    pub checkpoints_passed: usize,
    pub checkpoints_total: usize,
    pub furthest_x: f32, // world m, right edge of the vehicle's bounding box
    pub finish_x: f32,   // world m
}

pub struct Session {
    pub level: LevelSpec,
    pub truck: TruckSpec,
    asset_root: PathBuf,

    pub world: PhysicsWorld,
    pub terrain: Terrain,
    pub vehicle: Vehicle<PhysicsWorld>,

    start: Vec2,
    finish_x: f32,
    checkpoints: Vec<f32>, // world x, ascending
    checkpoints_passed: usize,
    furthest_x: f32,

    pub tick: u64,
    level_time: f32,
    resets: u32,
    status: SessionStatus,
    sampler: TelemetrySampler,
    last_torque: TorquePair,
}

impl Session {
    pub fn new(level: &LevelSpec, truck: &TruckSpec, asset_root: &Path) -> Result<Self> {
        level.validate()?;
        truck.validate()?;

        let terrain = Terrain::load(level, asset_root)?;
        let transform = terrain.transform;

        let mut world = PhysicsWorld::new(level.gravity);
        terrain.install(&mut world, level.segment_radius, level.ground_friction);

        let start = transform.to_world(level.start_position);
        let vehicle = Vehicle::spawn(&mut world, truck, start, DEFAULT_GROUP);

        let mut checkpoints: Vec<f32> = level.checkpoints.iter().map(|&x| transform.x_to_world(x)).collect();
        checkpoints.sort_by(f32::total_cmp);

        info!(
            "🎬 Session '{}' with '{}': start ({:.1}, {:.1}), finish x={:.1}, {} checkpoint(s)",
            level.name,
            truck.name,
            start[0],
            start[1],
            transform.x_to_world(level.finish_line),
            checkpoints.len()
        );

        let mut session = Self {
            level: level.clone(),
            truck: truck.clone(),
            asset_root: asset_root.to_path_buf(),
            world,
            terrain,
            vehicle,
            start,
            finish_x: transform.x_to_world(level.finish_line),
            checkpoints,
            checkpoints_passed: 0,
            furthest_x: f32::NEG_INFINITY,
            tick: 0,
            level_time: 0.0,
            resets: 0,
            status: SessionStatus::Running,
            sampler: TelemetrySampler::default(),
            last_torque: TorquePair::default(),
        };
        session.update_progress();
        Ok(session)
    }

    pub fn step(&mut self, input: DriveInput, dt: f32) -> SessionStatus {
        if self.status == SessionStatus::Finished || !(dt > 0.0 && dt.is_finite()) {
            return self.status;
        }

        self.last_torque = self.vehicle.drive(&mut self.world, input, dt);
        self.world.step(dt);

        self.tick += 1;
        self.level_time += dt;
        if let Some(states) = self.vehicle.states(&self.world) {
            self.sampler.step(dt, &states);
        }
        self.update_progress();
        self.status
    }

    fn update_progress(&mut self) {
        let Some(bb) = self.vehicle.bounding_box(&self.world) else {
            return;
        };
        self.furthest_x = self.furthest_x.max(bb.maxs[0]);

        while let Some(&x) = self.checkpoints.get(self.checkpoints_passed) {
            if self.furthest_x < x {
                break;
            }
            self.checkpoints_passed += 1;
            info!(
                "🚩 Checkpoint {}/{} at {}",
                self.checkpoints_passed,
                self.checkpoints.len(),
                crate::telemetry::format_level_time(self.level_time)
            );
        }

        if bb.maxs[0] >= self.finish_x && self.status == SessionStatus::Running {
            self.status = SessionStatus::Finished;
            info!(
                "🏁 '{}' finished in {} ({} reset(s))",
                self.level.name,
                crate::telemetry::format_level_time(self.level_time),
                self.resets
            );
        }
    }

    /// Fresh vehicle with its bounding box lower-left RESET_LIFT above the
    /// current chassis position. Costs RESET_PENALTY seconds.
    pub fn reset_vehicle(&mut self) {
        if self.status == SessionStatus::Finished {
            return;
        }
        let at = self
            .world
            .body_state(self.vehicle.chassis)
            .map(|s| s.position)
            .unwrap_or(self.start);
        let spawn = [at[0], at[1] + RESET_LIFT];

        self.vehicle.respawn(&mut self.world, spawn);
        self.level_time += RESET_PENALTY;
        self.resets += 1;
        self.sampler = TelemetrySampler::default();
        info!("🔄 Vehicle reset to ({:.1}, {:.1}), +{}s", spawn[0], spawn[1], RESET_PENALTY);
    }

    /// Rebuilds terrain, world and vehicle from the specs. On error the
    /// current session is left untouched.
    pub fn restart(&mut self) -> Result<()> {
        let fresh = Session::new(&self.level, &self.truck, &self.asset_root)?;
        *self = fresh;
        info!("🔁 Session restarted");
        Ok(())
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn level_time(&self) -> f32 {
        self.level_time
    }

    pub fn resets(&self) -> u32 {
        self.resets
    }

    pub fn start(&self) -> Vec2 {
        self.start
    }

    pub fn progress(&self) -> Progress {
        Progress {
            checkpoints_passed: self.checkpoints_passed,
            checkpoints_total: self.checkpoints.len(),
            furthest_x: self.furthest_x,
            finish_x: self.finish_x,
        }
    }

    pub fn telemetry(&self) -> Telemetry {
        self.sampler.display()
    }

    pub fn last_torque(&self) -> TorquePair {
        self.last_torque
    }

    pub fn vehicle_states(&self) -> Option<VehicleStates> {
        self.vehicle.states(&self.world)
    }

    pub fn vehicle_bounds(&self) -> Option<Aabb2> {
        self.vehicle.bounding_box(&self.world)
    }

    pub fn terrain(&self) -> &Terrain {
        &self.terrain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{simple_green, Registry};

    fn proving_grounds() -> Session {
        let registry = Registry::builtin();
        Session::new(&registry.levels[0], &simple_green(), Path::new("assets")).unwrap()
    }

    #[test]
    fn new_session_places_truck_at_start() {
        let s = proving_grounds();
        let bb = s.vehicle_bounds().unwrap();
        assert!((bb.mins[0] - 5.0).abs() < 1e-3 && (bb.mins[1] - 3.0).abs() < 1e-3, "{bb:?}");
        assert_eq!(s.status(), SessionStatus::Running);
        assert_eq!(s.progress().checkpoints_total, 3);
        assert_eq!(s.progress().finish_x, 380.0);
    }

    #[test]
    fn invalid_truck_fails_before_world_exists() {
        let mut truck = simple_green();
        truck.wheel_rear.mass = 0.0;
        let level = Registry::builtin().levels[0].clone();
        let err = Session::new(&level, &truck, Path::new("assets")).err().unwrap();
        assert!(err.is_config());
    }

    #[test]
    fn reset_adds_penalty_and_lifts_truck() {
        let mut s = proving_grounds();
        for _ in 0..30 {
            s.step(DriveInput::default(), 1.0 / 60.0);
        }
        let chassis = s.vehicle_states().unwrap().chassis.position;
        let t = s.level_time();
        s.reset_vehicle();

        assert!((s.level_time() - (t + RESET_PENALTY)).abs() < 1e-4);
        assert_eq!(s.resets(), 1);
        let bb = s.vehicle_bounds().unwrap();
        assert!((bb.mins[0] - chassis[0]).abs() < 1e-3);
        assert!((bb.mins[1] - (chassis[1] + RESET_LIFT)).abs() < 1e-3);
        assert_eq!(s.world.body_count(), 3);
    }

    #[test]
    fn restart_rebuilds_from_scratch() {
        let mut s = proving_grounds();
        for _ in 0..10 {
            s.step(DriveInput::new(1, false), 1.0 / 60.0);
        }
        s.reset_vehicle();
        s.restart().unwrap();
        assert_eq!(s.tick, 0);
        assert_eq!(s.level_time(), 0.0);
        assert_eq!(s.resets(), 0);
        assert_eq!(s.world.body_count(), 3);
    }

    #[test]
    fn non_positive_dt_is_ignored() {
        let mut s = proving_grounds();
        s.step(DriveInput::default(), 0.0);
        s.step(DriveInput::default(), f32::NAN);
        assert_eq!(s.tick, 0);
    }
}
