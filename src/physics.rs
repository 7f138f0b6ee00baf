// src/physics.rs
// ==============================================================================
// PhysicsWorld — rapier2d implementation of PhysicsBackend
// ------------------------------------------------------------------------------
// Owns the full rapier pipeline (islands, broad/narrow phase, body/collider/
// joint sets) plus two force elements rapier does not ship in the shape we need:
// - springs: damped springs between two local anchors, evaluated and applied as
//   point forces right before each pipeline step
// - gears:   angular velocity couplings, enforced right after each pipeline step
//            by an impulse along the gear jacobian [1, -ratio], so the pair
//            turns like a single body of inertia ia + ib / ratio^2
//
// Step order:
//   1) spring forces
//   2) rapier step (gravity, contacts, joints, user torques)
//   3) gear projection
//   4) clear user forces/torques, safety pass on runaway bodies
// ==============================================================================

use std::collections::{BTreeMap, HashMap};

use log::{debug, warn};
use rapier2d::prelude::*;

use crate::backend::{Aabb2, BodyDesc, BodyState, PhysicsBackend, Shape, ShapeDesc, SpringDesc, TravelDesc, Vec2};

#[inline] fn v2(v: &Vector<Real>) -> Vec2 { [v.x, v.y] }
#[inline] fn p2(p: &Point<Real>) -> Vec2 { [p.x, p.y] }

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    Joint(ImpulseJointHandle),
    Spring(u32),
    Gear(u32),
}

#[derive(Debug, Clone, Copy)]
struct SpringElement {
    a: RigidBodyHandle,
    b: RigidBodyHandle,
    desc: SpringDesc,
}

#[derive(Debug, Clone, Copy)]
struct GearElement {
    a: RigidBodyHandle,
    b: RigidBodyHandle,
    ratio: Real,
}

/// Contact filter: colliders whose `user_data` carry the same non-zero group
/// never generate contacts with each other.
struct ExclusionGroupHooks;

impl PhysicsHooks for ExclusionGroupHooks {
    fn filter_contact_pair(&self, context: &PairFilterContext) -> Option<SolverFlags> {
        let g1 = context.colliders[context.collider1].user_data;
        let g2 = context.colliders[context.collider2].user_data;
        if g1 != 0 && g1 == g2 {
            None
        } else {
            Some(SolverFlags::COMPUTE_IMPULSES)
        }
    }
}

pub struct PhysicsWorld {
    pub gravity: Vector<Real>,
    pub integration_parameters: IntegrationParameters,
    pub pipeline: PhysicsPipeline,
    pub island_manager: IslandManager,
    pub broad_phase: DefaultBroadPhase,
    pub narrow_phase: NarrowPhase,
    pub bodies: RigidBodySet,
    pub colliders: ColliderSet,
    pub joints: ImpulseJointSet,
    pub multibody_joints: MultibodyJointSet,
    pub ccd: CCDSolver,
    pub query_pipeline: QueryPipeline,

    ground: RigidBodyHandle,          // fixed host for terrain segments
    inertia: HashMap<RigidBodyHandle, Real>,
    springs: BTreeMap<u32, SpringElement>,
    gears: BTreeMap<u32, GearElement>,
    next_element: u32,
    hooks: ExclusionGroupHooks,

    /// Bodies outside +/- this many meters (or non-finite) get parked.
    pub world_bound: Real,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new([0.0, -9.81])
    }
}

impl PhysicsWorld {
    pub fn new(gravity: Vec2) -> Self {
        let mut bodies = RigidBodySet::new();
        let ground = bodies.insert(RigidBodyBuilder::fixed().build());

        Self {
            gravity: vector![gravity[0], gravity[1]],
            integration_parameters: IntegrationParameters::default(),
            pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies,
            colliders: ColliderSet::new(),
            joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            ground,
            inertia: HashMap::new(),
            springs: BTreeMap::new(),
            gears: BTreeMap::new(),
            next_element: 0,
            hooks: ExclusionGroupHooks,
            world_bound: 100_000.0,
        }
    }

    /// Dynamic bodies only; the terrain host is not counted.
    pub fn body_count(&self) -> usize {
        self.bodies.len() - 1
    }

    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    pub fn spring_count(&self) -> usize {
        self.springs.len()
    }

    pub fn gear_count(&self) -> usize {
        self.gears.len()
    }

    /// Number of static terrain colliders.
    pub fn segment_count(&self) -> usize {
        self.bodies
            .get(self.ground)
            .map(|g| g.colliders().len())
            .unwrap_or(0)
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_element;
        self.next_element += 1;
        id
    }

    // --------------------------------------------------
    // 1) springs -> point forces
    // --------------------------------------------------
    fn apply_springs(&mut self) {
        let mut forces: Vec<(RigidBodyHandle, Vector<Real>, Point<Real>)> = Vec::new();

        for s in self.springs.values() {
            let (Some(ba), Some(bb)) = (self.bodies.get(s.a), self.bodies.get(s.b)) else {
                continue;
            };

            let pa = ba.position() * point![s.desc.anchor_a[0], s.desc.anchor_a[1]];
            let pb = bb.position() * point![s.desc.anchor_b[0], s.desc.anchor_b[1]];

            let delta = pb - pa;
            let len = delta.norm();
            if len < 1e-6 {
                continue; // direction undefined, nothing to push along
            }
            let dir = delta / len;

            // positive = anchors separating
            let rel_vel = (bb.velocity_at_point(&pb) - ba.velocity_at_point(&pa)).dot(&dir);

            let magnitude = s.desc.stiffness * (s.desc.rest_length - len) - s.desc.damping * rel_vel;
            let force = dir * magnitude;

            forces.push((s.b, force, pb));
            forces.push((s.a, -force, pa));
        }

        for (handle, force, point) in forces {
            if let Some(body) = self.bodies.get_mut(handle) {
                body.add_force_at_point(force, point, true);
            }
        }
    }

    // --------------------------------------------------
    // 3) gears -> angular velocity projection
    // --------------------------------------------------
    fn project_gears(&mut self) {
        for g in self.gears.values() {
            let (Some(ia), Some(ib)) = (self.inertia.get(&g.a).copied(), self.inertia.get(&g.b).copied()) else {
                continue;
            };
            let (Some(wa), Some(wb)) = (
                self.bodies.get(g.a).map(|b| b.angvel()),
                self.bodies.get(g.b).map(|b| b.angvel()),
            ) else {
                continue;
            };

            // ratio*ia*wa + ib*wb is unchanged by an impulse along [1, -ratio];
            // the denominator is positive for any ratio
            let r = g.ratio;
            let wb_new = (r * ia * wa + ib * wb) / (r * r * ia + ib);
            let wa_new = r * wb_new;

            if let Some(b) = self.bodies.get_mut(g.a) {
                b.set_angvel(wa_new, true);
            }
            if let Some(b) = self.bodies.get_mut(g.b) {
                b.set_angvel(wb_new, true);
            }
        }
    }

    // --------------------------------------------------
    // 4) safety: park bodies that left the world
    // --------------------------------------------------
    fn park_runaway_bodies(&mut self) {
        let bound = self.world_bound;
        for (handle, body) in self.bodies.iter_mut() {
            let pos = *body.translation();
            let bad = !pos.x.is_finite() || !pos.y.is_finite() || pos.x.abs() > bound || pos.y.abs() > bound;

            if bad {
                let parked = vector![0.0, 10.0];
                body.set_translation(parked, true);
                body.set_linvel(vector![0.0, 0.0], true);
                body.set_angvel(0.0, true);
                warn!("⚠️ Parked runaway body {:?} (was at {:?})", handle, pos);
            }
        }
    }
}

impl PhysicsBackend for PhysicsWorld {
    type Body = RigidBodyHandle;
    type Constraint = Constraint;

    fn create_body(&mut self, desc: &BodyDesc) -> RigidBodyHandle {
        let rb = RigidBodyBuilder::dynamic()
            .translation(vector![desc.position[0], desc.position[1]])
            .rotation(desc.angle)
            .additional_mass_properties(MassProperties::new(point![0.0, 0.0], desc.mass, desc.inertia))
            .ccd_enabled(true)
            .build();

        let handle = self.bodies.insert(rb);
        self.inertia.insert(handle, desc.inertia);
        handle
    }

    fn attach_shape(&mut self, body: RigidBodyHandle, shape: &ShapeDesc) {
        let builder = match shape.shape {
            Shape::Box { half_extents } => ColliderBuilder::cuboid(half_extents[0], half_extents[1]),
            Shape::Disk { radius } => ColliderBuilder::ball(radius),
        };

        // density 0: mass and inertia come from the body description
        let collider = builder
            .density(0.0)
            .friction(shape.friction)
            .restitution(0.0)
            .user_data(shape.exclusion_group as u128)
            .active_hooks(ActiveHooks::FILTER_CONTACT_PAIRS)
            .build();

        self.colliders.insert_with_parent(collider, body, &mut self.bodies);
    }

    fn remove_body(&mut self, body: RigidBodyHandle) {
        self.springs.retain(|_, s| s.a != body && s.b != body);
        self.gears.retain(|_, g| g.a != body && g.b != body);
        self.inertia.remove(&body);

        self.bodies.remove(
            body,
            &mut self.island_manager,
            &mut self.colliders,
            &mut self.joints,
            &mut self.multibody_joints,
            true,
        );
    }

    fn add_static_segment(&mut self, a: Vec2, b: Vec2, radius: f32, friction: f32) {
        let pa = point![a[0], a[1]];
        let pb = point![b[0], b[1]];
        let shape = if radius > 0.0 {
            SharedShape::capsule(pa, pb, radius)
        } else {
            SharedShape::segment(pa, pb)
        };

        let collider = ColliderBuilder::new(shape)
            .friction(friction)
            .restitution(0.0)
            .build();

        self.colliders.insert_with_parent(collider, self.ground, &mut self.bodies);
    }

    fn add_travel_constraint(&mut self, a: RigidBodyHandle, b: RigidBodyHandle, desc: &TravelDesc) -> Constraint {
        let upper = vector![desc.groove_a[0], desc.groove_a[1]];
        let lower = vector![desc.groove_b[0], desc.groove_b[1]];
        let span = upper - lower;
        let len = span.norm();

        // zero span: the groove collapses to a point and the axis is arbitrary
        let axis = if len > 1e-6 {
            UnitVector::new_normalize(span)
        } else {
            Vector::y_axis()
        };

        // joint X runs from the lower stop toward the upper stop; Y is locked
        let joint = GenericJointBuilder::new(JointAxesMask::LIN_Y)
            .local_anchor1(point![lower.x, lower.y])
            .local_anchor2(point![desc.anchor[0], desc.anchor[1]])
            .local_axis1(axis)
            .local_axis2(axis)
            .limits(JointAxis::LinX, [0.0, len])
            .contacts_enabled(false)
            .build();

        Constraint::Joint(self.joints.insert(a, b, joint, true))
    }

    fn add_spring(&mut self, a: RigidBodyHandle, b: RigidBodyHandle, desc: &SpringDesc) -> Constraint {
        let id = self.next_id();
        self.springs.insert(id, SpringElement { a, b, desc: *desc });
        Constraint::Spring(id)
    }

    fn add_gear_coupling(&mut self, a: RigidBodyHandle, b: RigidBodyHandle, ratio: f32) -> Constraint {
        let id = self.next_id();
        self.gears.insert(id, GearElement { a, b, ratio });
        Constraint::Gear(id)
    }

    fn apply_torque(&mut self, body: RigidBodyHandle, torque: f32) {
        if let Some(rb) = self.bodies.get_mut(body) {
            rb.add_torque(torque, true);
        }
    }

    fn body_state(&self, body: RigidBodyHandle) -> Option<BodyState> {
        let rb = self.bodies.get(body)?;
        Some(BodyState {
            position: v2(rb.translation()),
            angle: rb.rotation().angle(),
            linvel: v2(rb.linvel()),
            angvel: rb.angvel(),
        })
    }

    fn body_aabb(&self, body: RigidBodyHandle) -> Option<Aabb2> {
        let rb = self.bodies.get(body)?;
        let mut out: Option<Aabb2> = None;

        // built from the body pose so it is valid before the next step syncs colliders
        for &ch in rb.colliders() {
            let Some(collider) = self.colliders.get(ch) else { continue };
            let local = collider.position_wrt_parent().copied().unwrap_or_else(Isometry::identity);
            let aabb = collider.shape().compute_aabb(&(rb.position() * local));
            let aabb = Aabb2 { mins: p2(&aabb.mins), maxs: p2(&aabb.maxs) };
            out = Some(match out {
                Some(acc) => acc.merged(&aabb),
                None => aabb,
            });
        }
        out
    }

    fn translate_body(&mut self, body: RigidBodyHandle, delta: Vec2) {
        if let Some(rb) = self.bodies.get_mut(body) {
            let t = rb.translation() + vector![delta[0], delta[1]];
            rb.set_translation(t, true);
        }
    }

    fn step(&mut self, dt: f32) {
        let events = ();

        // 1) spring-dampers
        self.apply_springs();

        // 2) rapier
        self.integration_parameters.dt = dt;
        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.joints,
            &mut self.multibody_joints,
            &mut self.ccd,
            Some(&mut self.query_pipeline),
            &self.hooks,
            &events,
        );

        // 3) shared driveshafts
        self.project_gears();

        // 4) forces/torques only live for one step
        for (_, body) in self.bodies.iter_mut() {
            body.reset_forces(false);
            body.reset_torques(false);
        }
        self.park_runaway_bodies();

        debug!("stepped dt={dt:.4} bodies={} springs={} gears={}", self.bodies.len(), self.springs.len(), self.gears.len());
    }
}
