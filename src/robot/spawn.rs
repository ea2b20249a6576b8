//! Utilities related to giving the robot's rig a physical presence.

use na::{Isometry3, Unit, Vector3};
use ncollide3d::shape::{Cuboid, Plane, ShapeHandle};
use nphysics3d::joint::{FixedJoint, RevoluteJoint};
use nphysics3d::object::{
    BodyPartHandle, BodyStatus, ColliderDesc, DefaultBodyHandle, MultibodyDesc, RigidBodyDesc,
};

use crate::physics::PhysicsWorld;
use crate::rig::{NodeId, Rig};
use crate::robot::{TiagoIndex, HEAD_LINKS};

/// Physics handles of a spawned robot.
#[derive(Debug, Clone)]
pub struct TiagoBodies {
    /// One rigid body per link, in the order of [`TiagoIndex::links`].
    pub links: Vec<DefaultBodyHandle>,
    /// The head, as a two-joint multibody with its motors enabled.
    pub head: DefaultBodyHandle,
}

/// Give every link of the robot a dynamic rigid body with a box collider, and the head a
/// motorized multibody, all bound to their transforms.
///
/// Left alone, these bodies fall and tumble; see [`crate::suspension`].
pub fn spawn_tiago_bodies(physics: &mut PhysicsWorld, rig: &Rig, index: &TiagoIndex) -> TiagoBodies {
    let links = index
        .links()
        .into_iter()
        .map(|node| spawn_link(physics, rig, node, Vector3::new(0.05, 0.05, 0.05)))
        .collect();

    let head = spawn_head(physics, rig, index.head[0]);
    physics.bind(index.head[0], head);
    physics.bind(index.head[1], head);

    TiagoBodies { links, head }
}

fn spawn_link(
    physics: &mut PhysicsWorld,
    rig: &Rig,
    node: NodeId,
    half_extents: Vector3<f32>,
) -> DefaultBodyHandle {
    let pose = rig.global_transform(node).unwrap_or_else(Isometry3::identity);

    let body = physics
        .bodies
        .insert(RigidBodyDesc::new().position(pose).mass(1.0).build());
    physics.colliders.insert(
        ColliderDesc::new(ShapeHandle::new(Cuboid::new(half_extents)))
            .density(1.0)
            .build(BodyPartHandle(body, 0)),
    );
    physics.bind(node, body);
    body
}

fn spawn_head(physics: &mut PhysicsWorld, rig: &Rig, head_1: NodeId) -> DefaultBodyHandle {
    let pose = rig.global_transform(head_1).unwrap_or_else(Isometry3::identity);

    let mut neck = MultibodyDesc::new(FixedJoint::new(pose))
        .name("neck".to_string())
        .mass(1.0);

    let mut pan = RevoluteJoint::new(Vector3::y_axis(), 0.0);
    pan.enable_angular_motor();
    pan.set_max_angular_motor_torque(1.0);

    let mut tilt = RevoluteJoint::new(Unit::new_normalize(Vector3::x()), 0.0);
    tilt.enable_angular_motor();
    tilt.set_max_angular_motor_torque(1.0);

    neck.add_child(pan)
        .set_name(HEAD_LINKS[0].to_string())
        .add_child(tilt)
        .set_name(HEAD_LINKS[1].to_string())
        .set_parent_shift(Vector3::new(0.0, 0.05, 0.05));

    let head = physics.bodies.insert(neck.build());
    // Part 0 is the fixed neck; the two moving parts get a shape, and with it their mass.
    for (part, half) in [(1, Vector3::new(0.04, 0.04, 0.04)), (2, Vector3::new(0.1, 0.08, 0.1))] {
        physics.colliders.insert(
            ColliderDesc::new(ShapeHandle::new(Cuboid::new(half)))
                .density(1.0)
                .build(BodyPartHandle(head, part)),
        );
    }
    head
}

/// Spawns a ground plane at y = 0.
pub fn make_ground(physics: &mut PhysicsWorld) -> DefaultBodyHandle {
    let ground = physics
        .bodies
        .insert(RigidBodyDesc::new().status(BodyStatus::Static).build());
    let plane_shape = Plane::new(Unit::new_unchecked(Vector3::y()));
    physics
        .colliders
        .insert(ColliderDesc::new(ShapeHandle::new(plane_shape)).build(BodyPartHandle(ground, 0)));
    ground
}

/// Spawns a loose box of the given half size at `position`, bound to a new transform under
/// `parent`.
pub fn make_crate(
    physics: &mut PhysicsWorld,
    rig: &mut Rig,
    parent: NodeId,
    name: &str,
    position: Vector3<f32>,
    half_size: f32,
) -> (NodeId, DefaultBodyHandle) {
    let node = rig.add_child(parent, name, Isometry3::translation(position.x, position.y, position.z));
    let body = spawn_link(physics, rig, node, Vector3::repeat(half_size));
    (node, body)
}
