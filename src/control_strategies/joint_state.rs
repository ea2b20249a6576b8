//! Mirroring the robot's reported joint states onto the rig.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info, trace, warn};
use na::{Unit, UnitQuaternion, Vector3};

use crate::config::{unit_axis, JointKind, JointStateConfig};
use crate::control_strategies::FrameController;
use crate::error::{Result, TeleopError};
use crate::mailbox::Mailbox;
use crate::messages::{JointState, Message};
use crate::rig::{NodeId, Rig};
use crate::transport::{Callback, Transport};

pub const OWNER: &str = "joint_state";

/// A joint the applier drives, with the pose its transform had when bound.
#[derive(Debug, Clone)]
struct BoundJoint {
    node: NodeId,
    axis: Unit<Vector3<f32>>,
    kind: JointKind,
    initial_rotation: UnitQuaternion<f32>,
    initial_position: Vector3<f32>,
}

/// Joint name to target: degrees for revolute joints, metres for prismatic ones.
pub type JointTargets = HashMap<String, f32>;

/// Keeps the latest reported position of every configured joint and writes them to the rig
/// each frame.
///
/// Targets persist: a joint missing from a message keeps its previous target.
pub struct JointStateApplier {
    topic: String,
    kinds: Arc<HashMap<String, JointKind>>,
    joints: HashMap<String, BoundJoint>,
    staged: Mailbox<JointTargets>,
    targets: JointTargets,
}

impl JointStateApplier {
    /// Look up and claim the configured joints.
    ///
    /// Joints whose transform is not in the rig are skipped with a warning. A transform already
    /// owned by another controller is an error, and then none of the joints is claimed.
    pub fn bind(rig: &mut Rig, config: &JointStateConfig) -> Result<Self> {
        let mut joints = HashMap::new();
        let mut kinds = HashMap::new();

        for (name, binding) in config.joints.iter() {
            let axis = unit_axis(name, binding.axis)?;
            kinds.insert(name.clone(), binding.kind);

            let node = match rig.find(&binding.link) {
                Some(n) => n,
                None => {
                    warn!("Joint {}: transform {} not found, skipping.", name, binding.link);
                    continue;
                }
            };
            let (initial_rotation, initial_position) =
                match (rig.local_rotation(node), rig.local_position(node)) {
                    (Some(r), Some(p)) => (r, p),
                    _ => return Err(TeleopError::MissingTarget(binding.link.clone())),
                };

            joints.insert(
                name.clone(),
                BoundJoint {
                    node,
                    axis,
                    kind: binding.kind,
                    initial_rotation,
                    initial_position,
                },
            );
        }

        let nodes: Vec<NodeId> = joints.values().map(|j: &BoundJoint| j.node).collect();
        rig.claim_all(&nodes, OWNER)?;

        info!("Joint state applier bound {} of {} joints.", joints.len(), config.joints.len());

        Ok(JointStateApplier {
            topic: config.topic.clone(),
            kinds: Arc::new(kinds),
            joints,
            staged: Mailbox::new(),
            targets: HashMap::new(),
        })
    }

    pub fn subscribe(&self, transport: &dyn Transport) {
        transport.subscribe(&self.topic, self.callback());
    }

    /// The transport callback: stages the message's positions for the next frame.
    pub fn callback(&self) -> Callback {
        let kinds = self.kinds.clone();
        let staged = self.staged.clone();
        Arc::new(move |message: &Message| match message {
            Message::JointState(state) => stage(&kinds, &staged, state),
            other => trace!("Ignoring {:?} on joint state channel", other.kind()),
        })
    }

    /// Stage a message directly, bypassing the transport.
    pub fn receive(&self, state: &JointState) {
        stage(&self.kinds, &self.staged, state);
    }

    /// The targets applied on the last frame.
    pub fn targets(&self) -> &JointTargets {
        &self.targets
    }

    fn apply(&self, rig: &mut Rig) {
        for (name, value) in self.targets.iter() {
            let joint = match self.joints.get(name) {
                Some(j) => j,
                None => continue,
            };
            match joint.kind {
                JointKind::Revolute => {
                    let turn = UnitQuaternion::from_axis_angle(&joint.axis, value.to_radians());
                    rig.set_local_rotation(joint.node, joint.initial_rotation * turn);
                }
                JointKind::Prismatic => {
                    rig.set_local_position(
                        joint.node,
                        joint.initial_position + joint.axis.into_inner() * *value,
                    );
                }
            }
        }
    }
}

fn stage(kinds: &HashMap<String, JointKind>, staged: &Mailbox<JointTargets>, state: &JointState) {
    if !state.is_consistent() {
        debug!(
            "{}; using the shared prefix",
            TeleopError::MalformedMessage {
                names: state.name.len(),
                positions: state.position.len(),
            }
        );
    }

    staged.post_with(|slot| {
        let targets = slot.get_or_insert_with(HashMap::new);
        for (name, position) in state.positions() {
            let value = match kinds.get(name) {
                Some(JointKind::Revolute) => position.to_degrees() as f32,
                Some(JointKind::Prismatic) => position as f32,
                None => continue,
            };
            targets.insert(name.to_string(), value);
        }
    });
}

impl FrameController for JointStateApplier {
    fn update(&mut self, rig: &mut Rig, _dt: f32) {
        if let Some(update) = self.staged.take() {
            self.targets.extend(update);
        }
        self.apply(rig);
    }
}
