//! This mod contains the rig of a Tiago-like mobile manipulator: a base, a lifting torso,
//! a 7-DoF arm with a gripper, and a 2-DoF head.
//!
//! Transforms are named after the robot's links, so the default configuration finds them.
//! Offsets are in engine coordinates (x right, y up, z forward) and roughly follow the real
//! robot's proportions.

use na::Isometry3;

use crate::rig::{NodeId, Rig};

pub mod spawn;

pub const BASE_FOOTPRINT: &str = "base_footprint";
pub const BASE_LINK: &str = "base_link";
pub const TORSO_LIFT_LINK: &str = "torso_lift_link";
pub const ARM_LINKS: [&str; 7] = [
    "arm_1_link",
    "arm_2_link",
    "arm_3_link",
    "arm_4_link",
    "arm_5_link",
    "arm_6_link",
    "arm_7_link",
];
pub const ARM_TOOL_LINK: &str = "arm_tool_link";
pub const GRIPPER_LINK: &str = "gripper_link";
pub const HEAD_LINKS: [&str; 2] = ["head_1_link", "head_2_link"];

/// Offsets of each arm link from the previous one, starting at the torso.
const ARM_OFFSETS: [[f32; 3]; 7] = [
    [0.15, 0.05, 0.0],
    [0.12, 0.0, 0.0],
    [0.0, -0.05, 0.2],
    [0.0, 0.0, 0.2],
    [0.0, 0.0, 0.15],
    [0.0, 0.0, 0.1],
    [0.0, 0.0, 0.05],
];

/// Where the parts of the robot ended up in the rig.
#[derive(Debug, Clone)]
pub struct TiagoIndex {
    pub root: NodeId,
    pub base: NodeId,
    pub torso: NodeId,
    pub arm: [NodeId; 7],
    pub arm_tool: NodeId,
    pub gripper: NodeId,
    pub head: [NodeId; 2],
}

impl TiagoIndex {
    /// Every link that carries a physical body, base first.
    pub fn links(&self) -> Vec<NodeId> {
        let mut links = vec![self.base, self.torso];
        links.extend_from_slice(&self.arm);
        links.push(self.gripper);
        links
    }
}

/// Add the robot's transforms to `rig` below `parent`, with the footprint at `pose`.
pub fn build_tiago(rig: &mut Rig, parent: NodeId, pose: Isometry3<f32>) -> TiagoIndex {
    let root = rig.add_child(parent, BASE_FOOTPRINT, pose);
    let base = rig.add_child(root, BASE_LINK, Isometry3::translation(0.0, 0.1, 0.0));
    let torso = rig.add_child(base, TORSO_LIFT_LINK, Isometry3::translation(0.0, 0.8, 0.0));

    let mut previous = torso;
    let mut arm = [torso; 7];
    for (i, (name, offset)) in ARM_LINKS.iter().zip(ARM_OFFSETS.iter()).enumerate() {
        previous = rig.add_child(
            previous,
            name,
            Isometry3::translation(offset[0], offset[1], offset[2]),
        );
        arm[i] = previous;
    }

    let arm_tool = rig.add_child(arm[6], ARM_TOOL_LINK, Isometry3::translation(0.0, 0.0, 0.08));
    let gripper = rig.add_child(arm_tool, GRIPPER_LINK, Isometry3::translation(0.0, 0.0, 0.1));

    let head_1 = rig.add_child(torso, HEAD_LINKS[0], Isometry3::translation(0.0, 0.25, 0.0));
    let head_2 = rig.add_child(head_1, HEAD_LINKS[1], Isometry3::translation(0.0, 0.05, 0.05));

    TiagoIndex {
        root,
        base,
        torso,
        arm,
        arm_tool,
        gripper,
        head: [head_1, head_2],
    }
}
