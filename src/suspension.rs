//! Taking a rig out of the physics simulation's hands.
//!
//! The rig is posed by the controllers, so forces from the simulation must not move it. Bodies
//! differ in what they let us change: a rigid body has damping but no joint motors, a multibody
//! has motors but a single damping vector, a deformable body has neither. Each such capability is
//! an explicit trait that a body type either exposes or not, and the utility applies what it can
//! and counts what it had to skip.

use log::{debug, info};
use na::Vector3;
use nphysics3d::algebra::Velocity3;
use nphysics3d::joint::{PrismaticJoint, RevoluteJoint};
use nphysics3d::object::{Body, BodyStatus, DefaultBodyHandle, Multibody, RigidBody};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TeleopError};
use crate::physics::PhysicsWorld;
use crate::rig::{NodeId, Rig};

/// How to keep the simulation from moving the rig.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuspensionPolicy {
    /// Stop stepping the whole physics world. Affects every body, not only the rig.
    GlobalPause,
    /// Turn every body in the subtree kinematic, without gravity or velocity. Colliders stay, so
    /// the rig still blocks other bodies.
    Neutralize,
    /// Delete the bodies of the subtree and their colliders. Cannot be undone.
    Remove,
}

impl Default for SuspensionPolicy {
    fn default() -> Self {
        SuspensionPolicy::Neutralize
    }
}

//region Capabilities

pub trait SupportsGravityToggle {
    fn set_gravity_enabled(&mut self, enabled: bool);
}

pub trait SupportsImmovable {
    /// Exclude the body from force-driven motion while keeping it in collision detection.
    fn make_immovable(&mut self);
    fn zero_velocities(&mut self);
}

pub trait SupportsDamping {
    fn set_damping(&mut self, linear: f32, angular: f32);
}

pub trait SupportsJointDrive {
    /// Switch off every joint motor, returning how many were switched off.
    fn release_drives(&mut self) -> usize;
}

/// A simulated body, queried for the capabilities it exposes.
pub trait SimulatedBody {
    fn gravity_toggle(&mut self) -> Option<&mut dyn SupportsGravityToggle> {
        None
    }

    fn immovable(&mut self) -> Option<&mut dyn SupportsImmovable> {
        None
    }

    fn damping(&mut self) -> Option<&mut dyn SupportsDamping> {
        None
    }

    fn joint_drive(&mut self) -> Option<&mut dyn SupportsJointDrive> {
        None
    }
}

fn require<'a, T: ?Sized>(capability: Option<&'a mut T>, name: &'static str) -> Result<&'a mut T> {
    capability.ok_or(TeleopError::UnsupportedProperty(name))
}

impl SupportsGravityToggle for RigidBody<f32> {
    fn set_gravity_enabled(&mut self, enabled: bool) {
        self.enable_gravity(enabled);
    }
}

impl SupportsImmovable for RigidBody<f32> {
    fn make_immovable(&mut self) {
        self.set_status(BodyStatus::Kinematic);
    }

    fn zero_velocities(&mut self) {
        self.set_velocity(Velocity3::zero());
    }
}

impl SupportsDamping for RigidBody<f32> {
    fn set_damping(&mut self, linear: f32, angular: f32) {
        self.set_linear_damping(linear);
        self.set_angular_damping(angular);
    }
}

impl SimulatedBody for RigidBody<f32> {
    fn gravity_toggle(&mut self) -> Option<&mut dyn SupportsGravityToggle> {
        Some(self)
    }

    fn immovable(&mut self) -> Option<&mut dyn SupportsImmovable> {
        Some(self)
    }

    fn damping(&mut self) -> Option<&mut dyn SupportsDamping> {
        Some(self)
    }
}

impl SupportsGravityToggle for Multibody<f32> {
    fn set_gravity_enabled(&mut self, enabled: bool) {
        self.enable_gravity(enabled);
    }
}

impl SupportsImmovable for Multibody<f32> {
    fn make_immovable(&mut self) {
        self.set_status(BodyStatus::Kinematic);
    }

    fn zero_velocities(&mut self) {
        self.generalized_velocity_mut().fill(0.0);
    }
}

impl SupportsDamping for Multibody<f32> {
    // A multibody damps its generalized velocities, which mix linear and angular coordinates.
    fn set_damping(&mut self, linear: f32, angular: f32) {
        self.damping_mut().fill(linear.max(angular));
    }
}

impl SupportsJointDrive for Multibody<f32> {
    fn release_drives(&mut self) -> usize {
        let mut released = 0;
        for i in 0..self.num_parts() {
            let link = match self.link_mut(i) {
                Some(l) => l,
                None => continue,
            };
            let joint = link.joint_mut();
            if let Some(revolute) = joint.downcast_mut::<RevoluteJoint<f32>>() {
                revolute.disable_angular_motor();
                released += 1;
            } else if let Some(prismatic) = joint.downcast_mut::<PrismaticJoint<f32>>() {
                prismatic.disable_linear_motor();
                released += 1;
            }
        }
        released
    }
}

impl SimulatedBody for Multibody<f32> {
    fn gravity_toggle(&mut self) -> Option<&mut dyn SupportsGravityToggle> {
        Some(self)
    }

    fn immovable(&mut self) -> Option<&mut dyn SupportsImmovable> {
        Some(self)
    }

    fn damping(&mut self) -> Option<&mut dyn SupportsDamping> {
        Some(self)
    }

    fn joint_drive(&mut self) -> Option<&mut dyn SupportsJointDrive> {
        Some(self)
    }
}

/// Any other body type, reached only through what every body has in common.
struct OtherBody<'a>(&'a mut dyn Body<f32>);

impl SupportsGravityToggle for OtherBody<'_> {
    fn set_gravity_enabled(&mut self, enabled: bool) {
        self.0.enable_gravity(enabled);
    }
}

impl SupportsImmovable for OtherBody<'_> {
    fn make_immovable(&mut self) {
        self.0.set_status(BodyStatus::Kinematic);
    }

    fn zero_velocities(&mut self) {
        self.0.generalized_velocity_mut().fill(0.0);
    }
}

impl SimulatedBody for OtherBody<'_> {
    fn gravity_toggle(&mut self) -> Option<&mut dyn SupportsGravityToggle> {
        Some(self)
    }

    fn immovable(&mut self) -> Option<&mut dyn SupportsImmovable> {
        Some(self)
    }
}

/// Run `f` on the most specific capability view of an engine body.
fn with_capabilities<R>(body: &mut dyn Body<f32>, f: impl FnOnce(&mut dyn SimulatedBody) -> R) -> R {
    if let Some(rb) = body.downcast_mut::<RigidBody<f32>>() {
        return f(rb);
    }
    if let Some(mb) = body.downcast_mut::<Multibody<f32>>() {
        return f(mb);
    }
    f(&mut OtherBody(body))
}

//endregion

/// Settings of the [`SuspensionPolicy::Neutralize`] policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NeutralizeSettings {
    /// Damping applied as a fallback, so whatever the solver still does to the body dies out.
    pub damping: f32,
    pub release_joint_drives: bool,
}

impl Default for NeutralizeSettings {
    fn default() -> Self {
        NeutralizeSettings {
            damping: 1e6,
            release_joint_drives: true,
        }
    }
}

/// Neutralize a single body, returning the capabilities it did not support.
pub fn neutralize(
    body: &mut dyn SimulatedBody,
    settings: &NeutralizeSettings,
) -> Vec<&'static str> {
    let mut unsupported = vec![];

    let mut note = |r: Result<()>| {
        if let Err(TeleopError::UnsupportedProperty(name)) = r {
            unsupported.push(name);
        }
    };

    note(require(body.gravity_toggle(), "gravity").map(|g| g.set_gravity_enabled(false)));

    note(require(body.immovable(), "immovable").map(|i| {
        i.make_immovable();
        i.zero_velocities();
    }));

    note(require(body.damping(), "damping").map(|d| d.set_damping(settings.damping, settings.damping)));

    if settings.release_joint_drives {
        note(require(body.joint_drive(), "joint_drive").map(|j| {
            j.release_drives();
        }));
    }

    unsupported
}

#[derive(Debug, Clone, Default)]
pub struct SuspensionReport {
    /// Bodies found in the subtree.
    pub bodies: usize,
    /// Colliders attached to those bodies that were left active.
    pub colliders_kept: usize,
    pub bodies_removed: usize,
    pub colliders_removed: usize,
    /// Capabilities that a body did not support, and so were skipped.
    pub unsupported: Vec<(DefaultBodyHandle, &'static str)>,
}

/// Make the subtree of the rig rooted at `root` immune to simulated forces.
///
/// Running it again with the same policy changes nothing further.
pub fn suspend(
    physics: &mut PhysicsWorld,
    rig: &Rig,
    root: NodeId,
    policy: SuspensionPolicy,
    settings: &NeutralizeSettings,
    zero_gravity_on_pause: bool,
) -> SuspensionReport {
    let mut report = SuspensionReport::default();
    let handles = physics.bodies_under(rig, root);
    report.bodies = handles.len();

    let attached: Vec<_> = physics
        .colliders
        .iter()
        .filter(|(_, c)| handles.contains(&c.body()))
        .map(|(ch, _)| ch)
        .collect();

    match policy {
        SuspensionPolicy::GlobalPause => {
            physics.paused = true;
            if zero_gravity_on_pause {
                physics.mechanical_world.gravity = Vector3::zeros();
            }
            report.colliders_kept = attached.len();
            info!("Physics paused for the whole world.");
        }
        SuspensionPolicy::Neutralize => {
            for h in handles.iter() {
                if let Some(body) = physics.bodies.get_mut(*h) {
                    let skipped = with_capabilities(body, |b| neutralize(b, settings));
                    for name in skipped {
                        debug!("Body {:?} does not support {}, skipping it.", h, name);
                        report.unsupported.push((*h, name));
                    }
                }
            }
            report.colliders_kept = attached.len();
            info!(
                "Neutralized {} bodies under `{}`, {} colliders left active.",
                report.bodies,
                rig.name(root).unwrap_or("?"),
                report.colliders_kept
            );
        }
        SuspensionPolicy::Remove => {
            for ch in attached {
                if physics.colliders.remove(ch).is_some() {
                    report.colliders_removed += 1;
                }
            }
            for h in handles {
                if physics.bodies.remove(h).is_some() {
                    report.bodies_removed += 1;
                }
                physics.unbind_body(h);
            }
            info!(
                "Removed {} bodies and {} colliders under `{}`.",
                report.bodies_removed,
                report.colliders_removed,
                rig.name(root).unwrap_or("?")
            );
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use na::Isometry3;
    use ncollide3d::shape::{Ball, ShapeHandle};
    use nphysics3d::object::{BodyPartHandle, ColliderDesc, RigidBodyDesc};

    /// A body that only lets its gravity be switched.
    #[derive(Default)]
    struct Balloon {
        gravity: bool,
    }

    impl SupportsGravityToggle for Balloon {
        fn set_gravity_enabled(&mut self, enabled: bool) {
            self.gravity = enabled;
        }
    }

    impl SimulatedBody for Balloon {
        fn gravity_toggle(&mut self) -> Option<&mut dyn SupportsGravityToggle> {
            Some(self)
        }
    }

    #[test]
    fn unsupported_capabilities_are_skipped() {
        let mut balloon = Balloon { gravity: true };
        let skipped = neutralize(&mut balloon, &NeutralizeSettings::default());

        assert!(!balloon.gravity);
        assert_eq!(skipped, vec!["immovable", "damping", "joint_drive"]);
    }

    fn robot_world() -> (Rig, NodeId, PhysicsWorld, DefaultBodyHandle, DefaultBodyHandle) {
        let mut rig = Rig::new("world");
        let robot = rig.add_child(rig.root(), "robot", Isometry3::identity());
        let other = rig.add_child(rig.root(), "box", Isometry3::identity());

        let mut physics = PhysicsWorld::new();
        let link = physics.bodies.insert(
            RigidBodyDesc::new()
                .velocity(Velocity3::linear(1.0, 0.0, 0.0))
                .mass(1.0)
                .build(),
        );
        physics.colliders.insert(
            ColliderDesc::new(ShapeHandle::new(Ball::new(0.1))).build(BodyPartHandle(link, 0)),
        );
        let free = physics.bodies.insert(RigidBodyDesc::new().mass(1.0).build());
        physics.bind(robot, link);
        physics.bind(other, free);

        (rig, robot, physics, link, free)
    }

    #[test]
    fn neutralize_keeps_colliders_and_stops_motion() {
        let (rig, robot, mut physics, link, free) = robot_world();
        let settings = NeutralizeSettings::default();

        let report = suspend(&mut physics, &rig, robot, SuspensionPolicy::Neutralize, &settings, true);

        assert_eq!(report.bodies, 1);
        assert_eq!(report.colliders_kept, 1);
        assert_eq!(report.unsupported, vec![(link, "joint_drive")]);

        let rb = physics.bodies.rigid_body(link).unwrap();
        assert_eq!(rb.status(), BodyStatus::Kinematic);
        assert!(!rb.gravity_enabled());
        assert_eq!(rb.velocity().linear.norm(), 0.0);

        // Bodies outside the subtree are untouched.
        let other = physics.bodies.rigid_body(free).unwrap();
        assert_eq!(other.status(), BodyStatus::Dynamic);
        assert!(other.gravity_enabled());

        // Running it again changes nothing.
        let again = suspend(&mut physics, &rig, robot, SuspensionPolicy::Neutralize, &settings, true);
        assert_eq!(again.bodies, 1);
        assert_eq!(physics.bodies.rigid_body(link).unwrap().status(), BodyStatus::Kinematic);
    }

    #[test]
    fn remove_deletes_bodies_and_colliders() {
        let (rig, robot, mut physics, link, free) = robot_world();
        let settings = NeutralizeSettings::default();

        let report = suspend(&mut physics, &rig, robot, SuspensionPolicy::Remove, &settings, true);
        assert_eq!(report.bodies_removed, 1);
        assert_eq!(report.colliders_removed, 1);
        assert!(physics.bodies.rigid_body(link).is_none());
        assert!(physics.bodies.rigid_body(free).is_some());

        let again = suspend(&mut physics, &rig, robot, SuspensionPolicy::Remove, &settings, true);
        assert_eq!(again.bodies, 0);
        assert_eq!(again.bodies_removed, 0);
    }

    #[test]
    fn global_pause_stops_the_world() {
        let (rig, robot, mut physics, link, _) = robot_world();
        let settings = NeutralizeSettings::default();

        suspend(&mut physics, &rig, robot, SuspensionPolicy::GlobalPause, &settings, true);

        assert!(physics.paused);
        assert_eq!(physics.mechanical_world.gravity, Vector3::zeros());
        // Individual bodies are left as they were.
        assert_eq!(physics.bodies.rigid_body(link).unwrap().status(), BodyStatus::Dynamic);
    }
}
