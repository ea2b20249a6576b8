//! Joint chains: an ordered run of rig transforms from a base joint to an end-effector.

use crate::error::{Result, TeleopError};
use crate::rig::{NodeId, Rig};

/// A chain of joints in a rig, base first.
///
/// The last element is the end-effector. A chain always has at least two elements, and every
/// element sits below the one before it in the hierarchy.
#[derive(Debug, Clone)]
pub struct JointChain {
    joints: Vec<NodeId>,
}

impl JointChain {
    pub fn new(rig: &Rig, joints: Vec<NodeId>) -> Result<Self> {
        if joints.len() < 2 {
            return Err(TeleopError::ChainTooShort(joints.len()));
        }

        for pair in joints.windows(2) {
            if pair[0] == pair[1] || !rig.is_ancestor(pair[0], pair[1]) {
                let name = |id: NodeId| rig.name(id).unwrap_or("?").to_string();
                return Err(TeleopError::InvalidConfig(format!(
                    "`{}` does not sit below `{}` in the rig",
                    name(pair[1]),
                    name(pair[0])
                )));
            }
        }

        Ok(JointChain { joints })
    }

    /// Build a chain from joint names, base first.
    pub fn from_names<S: AsRef<str>>(rig: &Rig, names: &[S]) -> Result<Self> {
        let joints = names
            .iter()
            .map(|n| rig.require(n.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Self::new(rig, joints)
    }

    pub fn joints(&self) -> &[NodeId] {
        &self.joints
    }

    /// The joints that a solver may rotate: everything but the end-effector.
    pub fn movable(&self) -> &[NodeId] {
        &self.joints[..self.joints.len() - 1]
    }

    pub fn base(&self) -> NodeId {
        self.joints[0]
    }

    pub fn end_effector(&self) -> NodeId {
        self.joints[self.joints.len() - 1]
    }

    /// Sum of the distances between consecutive joints: a rough estimate of the chain's reach.
    pub fn chain_length(&self, rig: &Rig) -> f32 {
        self.joints
            .windows(2)
            .filter_map(|pair| {
                Some(na::distance(
                    &rig.global_position(pair[0])?,
                    &rig.global_position(pair[1])?,
                ))
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use na::Isometry3;

    #[test]
    fn chains_need_two_joints_in_order() {
        let mut rig = Rig::new("base");
        let a = rig.add_child(rig.root(), "a", Isometry3::translation(0.0, 1.0, 0.0));
        let b = rig.add_child(a, "b", Isometry3::translation(0.0, 2.0, 0.0));
        let side = rig.add_child(rig.root(), "side", Isometry3::identity());

        assert!(matches!(
            JointChain::new(&rig, vec![a]),
            Err(TeleopError::ChainTooShort(1))
        ));
        assert!(matches!(
            JointChain::new(&rig, vec![b, a]),
            Err(TeleopError::InvalidConfig(_))
        ));
        assert!(JointChain::new(&rig, vec![side, b]).is_err());

        let chain = JointChain::from_names(&rig, &["a", "b"]).unwrap();
        assert_eq!(chain.movable(), &[a]);
        assert_eq!(chain.end_effector(), b);
        assert!((chain.chain_length(&rig) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn unknown_names_are_reported() {
        let rig = Rig::new("base");
        assert!(matches!(
            JointChain::from_names(&rig, &["base", "nope"]),
            Err(TeleopError::MissingTarget(n)) if n == "nope"
        ));
    }
}
