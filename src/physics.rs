use nalgebra::Vector3;
use nphysics3d::object::BodyPart;
use nphysics3d::force_generator::DefaultForceGeneratorSet;
use nphysics3d::joint::DefaultJointConstraintSet;
use nphysics3d::object::{
    Body, BodySet, BodyStatus, DefaultBodyHandle, DefaultBodySet, DefaultColliderSet,
};
use nphysics3d::world::{DefaultGeometricalWorld, DefaultMechanicalWorld};

use crate::rig::{NodeId, Rig};

/// The physics engine's world, plus the table that ties its bodies to rig transforms.
pub struct PhysicsWorld {
    pub mechanical_world: DefaultMechanicalWorld<f32>,
    pub geometrical_world: DefaultGeometricalWorld<f32>,
    pub bodies: DefaultBodySet<f32>,
    pub colliders: DefaultColliderSet<f32>,
    pub joint_constraints: DefaultJointConstraintSet<f32>,
    pub force_generators: DefaultForceGeneratorSet<f32>,
    /// Which rig transform each body belongs to.
    pub bindings: Vec<(NodeId, DefaultBodyHandle)>,
    /// While set, [`PhysicsWorld::step`] does nothing.
    pub paused: bool,
    /// Linear momentum of every dynamic rigid body just before the last step.
    momenta: Vec<(DefaultBodyHandle, Vector3<f32>)>,
}

impl PhysicsWorld {
    pub fn new() -> Self {
        Self::with_gravity(Vector3::new(0.0, -9.81, 0.0))
    }

    pub fn with_gravity(gravity: Vector3<f32>) -> Self {
        PhysicsWorld {
            mechanical_world: DefaultMechanicalWorld::new(gravity),
            geometrical_world: DefaultGeometricalWorld::new(),
            bodies: DefaultBodySet::new(),
            colliders: DefaultColliderSet::new(),
            joint_constraints: DefaultJointConstraintSet::new(),
            force_generators: DefaultForceGeneratorSet::new(),
            bindings: vec![],
            paused: false,
            momenta: vec![],
        }
    }

    pub fn step(&mut self) {
        if self.paused {
            self.momenta.clear();
            return;
        }

        let bodies = &self.bodies;
        self.momenta = bodies
            .iter()
            .filter_map(|(handle, _)| {
                let rb = bodies.rigid_body(handle)?;
                if rb.status() != BodyStatus::Dynamic {
                    return None;
                }
                Some((handle, rb.velocity().linear * rb.local_inertia().linear))
            })
            .collect();

        self.mechanical_world.step(
            &mut self.geometrical_world,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.joint_constraints,
            &mut self.force_generators,
        );
    }

    /// Record that `body` represents the rig transform `node`.
    pub fn bind(&mut self, node: NodeId, body: DefaultBodyHandle) {
        self.bindings.push((node, body));
    }

    /// Forget every binding of `body`.
    pub fn unbind_body(&mut self, body: DefaultBodyHandle) {
        self.bindings.retain(|(_, b)| *b != body);
    }

    /// Bodies bound to any transform in the subtree rooted at `root`, each listed once.
    pub fn bodies_under(&self, rig: &Rig, root: NodeId) -> Vec<DefaultBodyHandle> {
        let mut out: Vec<DefaultBodyHandle> = vec![];
        for (node, body) in self.bindings.iter() {
            if rig.is_ancestor(root, *node) && !out.contains(body) && self.bodies.contains(*body) {
                out.push(*body);
            }
        }
        out
    }

    /// Impulses that bodies outside the subtree of `root` delivered to bodies inside it during
    /// the last step, in world coordinates.
    ///
    /// One impulse per touching outside body: the opposite of the momentum that body gained over
    /// the step. Static, kinematic and multibody outsiders are not counted.
    pub fn impulses_on(&self, rig: &Rig, root: NodeId) -> Vec<Vector3<f32>> {
        let inside = self.bodies_under(rig, root);
        let mut pushers: Vec<DefaultBodyHandle> = vec![];

        for (_, c1, _, c2, _, _) in self.geometrical_world.contact_pairs(&self.colliders, true) {
            let (a, b) = (c1.body(), c2.body());
            let other = match (inside.contains(&a), inside.contains(&b)) {
                (true, false) => b,
                (false, true) => a,
                _ => continue,
            };
            if !pushers.contains(&other) {
                pushers.push(other);
            }
        }

        pushers
            .into_iter()
            .filter_map(|handle| {
                let before = self
                    .momenta
                    .iter()
                    .find(|(h, _)| *h == handle)
                    .map(|(_, p)| *p)?;
                let rb = self.bodies.rigid_body(handle)?;
                let after = rb.velocity().linear * rb.local_inertia().linear;
                Some(before - after)
            })
            .collect()
    }

    /// Move every kinematic rigid body to the current global pose of its rig transform.
    ///
    /// This is how a rig that is animated by the controllers keeps pushing other things around.
    pub fn follow_rig(&mut self, rig: &Rig) {
        for (node, body) in self.bindings.iter() {
            let pose = match rig.global_transform(*node) {
                Some(p) => p,
                None => continue,
            };
            if let Some(rb) = self.bodies.rigid_body_mut(*body) {
                if rb.status() == BodyStatus::Kinematic {
                    rb.set_position(pose);
                }
            }
        }
    }
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}
