// ==============================================================================
// backend.rs — WHAT THE VEHICLE/TERRAIN CORE NEEDS FROM A PHYSICS ENGINE
// ------------------------------------------------------------------------------
// The core never names engine types. It talks to a PhysicsBackend:
// - bodies: create (explicit mass + inertia), attach box/disk shapes, remove
// - static terrain segments
// - constraints: travel (groove), spring-damper, gear coupling
// - forcing: torque
// - queries: body state, world-space AABB of a body's shapes
// - step(dt)
//
// Removing a body removes every constraint that references it.
// physics.rs provides the rapier2d implementation.
// ==============================================================================

use std::fmt::Debug;

use serde::Serialize;

/// 2D vector / point in world meters.
pub type Vec2 = [f32; 2];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyDesc {
    pub position: Vec2,
    pub angle: f32,
    pub mass: f32,
    pub inertia: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Box { half_extents: Vec2 },
    Disk { radius: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeDesc {
    pub shape: Shape,
    pub friction: f32,
    /// Shapes sharing a non-zero group never collide with each other.
    pub exclusion_group: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct BodyState {
    pub position: Vec2,
    pub angle: f32,
    pub linvel: Vec2,
    pub angvel: f32,
}

/// Groove: `anchor` on the wheel slides along the body-a local segment
/// `groove_a..groove_b`. Rotation is not transmitted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TravelDesc {
    pub groove_a: Vec2, // body-a local, upper stop
    pub groove_b: Vec2, // body-a local, lower stop
    pub anchor: Vec2,   // body-b local
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpringDesc {
    pub anchor_a: Vec2, // body-a local
    pub anchor_b: Vec2, // body-b local
    pub rest_length: f32,
    pub stiffness: f32,
    pub damping: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Aabb2 {
    pub mins: Vec2,
    pub maxs: Vec2,
}

impl Aabb2 {
    pub fn merged(&self, other: &Aabb2) -> Aabb2 {
        Aabb2 {
            mins: [self.mins[0].min(other.mins[0]), self.mins[1].min(other.mins[1])],
            maxs: [self.maxs[0].max(other.maxs[0]), self.maxs[1].max(other.maxs[1])],
        }
    }

    pub fn width(&self) -> f32 {
        self.maxs[0] - self.mins[0]
    }

    pub fn height(&self) -> f32 {
        self.maxs[1] - self.mins[1]
    }
}

pub trait PhysicsBackend {
    type Body: Copy + Eq + Debug;
    type Constraint: Copy + Eq + Debug;

    fn create_body(&mut self, desc: &BodyDesc) -> Self::Body;
    fn attach_shape(&mut self, body: Self::Body, shape: &ShapeDesc);
    /// Removes the body, its shapes, and every constraint touching it.
    fn remove_body(&mut self, body: Self::Body);

    /// Static, infinite-mass collision segment.
    fn add_static_segment(&mut self, a: Vec2, b: Vec2, radius: f32, friction: f32);

    fn add_travel_constraint(&mut self, a: Self::Body, b: Self::Body, desc: &TravelDesc) -> Self::Constraint;
    fn add_spring(&mut self, a: Self::Body, b: Self::Body, desc: &SpringDesc) -> Self::Constraint;
    /// Locks `angvel(a) = ratio * angvel(b)` after every step.
    fn add_gear_coupling(&mut self, a: Self::Body, b: Self::Body, ratio: f32) -> Self::Constraint;

    /// Torque accumulated for the next step only.
    fn apply_torque(&mut self, body: Self::Body, torque: f32);

    fn body_state(&self, body: Self::Body) -> Option<BodyState>;
    fn body_aabb(&self, body: Self::Body) -> Option<Aabb2>;
    fn translate_body(&mut self, body: Self::Body, delta: Vec2);

    fn step(&mut self, dt: f32);
}
