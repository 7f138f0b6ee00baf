// ==============================================================================
// vehicle.rs — CHASSIS + TWO WHEELS + SUSPENSIONS + DRIVESHAFT
// ------------------------------------------------------------------------------
// spawn():
//   1) chassis (box moment) at a nominal origin, wheels (disk moment) at their
//      chassis offsets, every shape in the vehicle's exclusion group
//   2) one suspension per wheel (travel groove pinned at the wheel center +
//      spring-damper)
//   3) gear coupling rear <-> front (ratio = rear / front angular rate)
//   4) merged AABB of the three bodies, then every body moves by the same
//      delta so the AABB's lower-left corner lands on the spawn point
//
// A Vehicle is never repositioned in place: respawn() removes every body and
// builds a new vehicle from the spec.
// ==============================================================================

use log::{debug, info};
use serde::Serialize;

use crate::backend::{Aabb2, BodyDesc, BodyState, PhysicsBackend, Shape, ShapeDesc, Vec2};
use crate::config::{TruckSpec, WheelSpec};
use crate::drivetrain::{DriveInput, Drivetrain, TorquePair};
use crate::suspension::{self, Suspension};

/// Exclusion group for a lone vehicle.
pub const DEFAULT_GROUP: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct VehicleStates {
    pub chassis: BodyState,
    pub rear: BodyState,
    pub front: BodyState,
}

pub struct Vehicle<B: PhysicsBackend> {
    pub spec: TruckSpec,
    pub group: u64,
    pub chassis: B::Body,
    pub rear: B::Body,
    pub front: B::Body,
    pub rear_suspension: Suspension<B::Constraint>,
    pub front_suspension: Suspension<B::Constraint>,
    pub gear: B::Constraint,
    pub drivetrain: Drivetrain,
}

fn wheel_body<B: PhysicsBackend>(backend: &mut B, wheel: &WheelSpec, group: u64) -> B::Body {
    let body = backend.create_body(&BodyDesc {
        position: wheel.offset,
        angle: 0.0,
        mass: wheel.mass,
        inertia: wheel.moment(),
    });
    backend.attach_shape(body, &ShapeDesc {
        shape: Shape::Disk { radius: wheel.radius },
        friction: wheel.friction,
        exclusion_group: group,
    });
    body
}

impl<B: PhysicsBackend> Vehicle<B> {
    /// Builds the vehicle with its bounding box lower-left at `spawn_point`.
    /// The spec is expected to be validated already.
    pub fn spawn(backend: &mut B, spec: &TruckSpec, spawn_point: Vec2, group: u64) -> Self {
        // --------------------------------------------------
        // bodies at the nominal pose
        // --------------------------------------------------
        let chassis = backend.create_body(&BodyDesc {
            position: [0.0, 0.0],
            angle: 0.0,
            mass: spec.chassis.mass,
            inertia: spec.chassis.moment(),
        });
        backend.attach_shape(chassis, &ShapeDesc {
            shape: Shape::Box { half_extents: spec.chassis.half_extents() },
            friction: spec.chassis.friction,
            exclusion_group: group,
        });

        let rear = wheel_body(backend, &spec.wheel_rear, group);
        let front = wheel_body(backend, &spec.wheel_front, group);

        // --------------------------------------------------
        // constraints
        // --------------------------------------------------
        let rear_suspension = suspension::attach(backend, chassis, rear, &spec.wheel_rear);
        let front_suspension = suspension::attach(backend, chassis, front, &spec.wheel_front);
        let gear = backend.add_gear_coupling(rear, front, spec.gear_ratio);

        let mut vehicle = Self {
            spec: spec.clone(),
            group,
            chassis,
            rear,
            front,
            rear_suspension,
            front_suspension,
            gear,
            drivetrain: Drivetrain::new(&spec.drivetrain, spec.wheel_rear.radius),
        };

        // --------------------------------------------------
        // placement
        // --------------------------------------------------
        if let Some(bb) = vehicle.bounding_box(backend) {
            let delta = [spawn_point[0] - bb.mins[0], spawn_point[1] - bb.mins[1]];
            for body in vehicle.bodies() {
                backend.translate_body(body, delta);
            }
        }

        info!("🚚 Spawned '{}' at ({:.2}, {:.2}) group={}", spec.name, spawn_point[0], spawn_point[1], group);
        vehicle
    }

    /// Removes every body; the backend drops their constraints with them.
    pub fn destroy(self, backend: &mut B) {
        self.remove_bodies(backend);
        debug!("vehicle '{}' destroyed", self.spec.name);
    }

    /// Replaces this vehicle with a fresh one from the same spec, bounding box
    /// lower-left at `spawn_point`. Old bodies and constraints are removed
    /// first; nothing carries over.
    pub fn respawn(&mut self, backend: &mut B, spawn_point: Vec2) {
        self.remove_bodies(backend);
        let spec = self.spec.clone();
        *self = Self::spawn(backend, &spec, spawn_point, self.group);
    }

    fn remove_bodies(&self, backend: &mut B) {
        for body in self.bodies() {
            backend.remove_body(body);
        }
    }

    pub fn bodies(&self) -> [B::Body; 3] {
        [self.chassis, self.rear, self.front]
    }

    /// Rotational inertia seen by the driven (rear) wheel through the gear.
    pub fn driven_inertia(&self) -> f32 {
        let r = self.spec.gear_ratio;
        self.spec.wheel_rear.moment() + self.spec.wheel_front.moment() / (r * r)
    }

    /// Runs the drivetrain for one tick and applies the wheel torque and its
    /// chassis reaction.
    pub fn drive(&mut self, backend: &mut B, input: DriveInput, dt: f32) -> TorquePair {
        let angvel = backend.body_state(self.rear).map(|s| s.angvel).unwrap_or(0.0);
        let pair = self.drivetrain.update(input, angvel, self.driven_inertia(), dt);

        backend.apply_torque(self.rear, pair.wheel);
        backend.apply_torque(self.chassis, pair.chassis);
        pair
    }

    /// Merged world AABB of chassis and wheels.
    pub fn bounding_box(&self, backend: &B) -> Option<Aabb2> {
        self.bodies()
            .iter()
            .filter_map(|&b| backend.body_aabb(b))
            .reduce(|a, b| a.merged(&b))
    }

    pub fn states(&self, backend: &B) -> Option<VehicleStates> {
        Some(VehicleStates {
            chassis: backend.body_state(self.chassis)?,
            rear: backend.body_state(self.rear)?,
            front: backend.body_state(self.front)?,
        })
    }
}
