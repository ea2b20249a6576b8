//! Driving the arm towards a target transform with the CCD solver.

use log::{info, warn};
use na::Point3;

use crate::config::IkConfig;
use crate::control_strategies::FrameController;
use crate::error::Result;
use crate::inverse_kinematics::{CcdReport, CcdSolver};
use crate::kinematics::JointChain;
use crate::rig::{NodeId, Rig};

pub const OWNER: &str = "ik";

/// Where the end-effector should go.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IkTarget {
    /// Follow a transform in the rig, e.g. a tracked hand.
    Node(NodeId),
    Point(Point3<f32>),
}

pub struct IkController {
    solver: CcdSolver,
    target: IkTarget,
    out_of_reach: bool,
    last_report: Option<CcdReport>,
}

impl IkController {
    /// Claim every joint the solver may rotate and look up the target transform.
    pub fn bind(rig: &mut Rig, config: &IkConfig) -> Result<Self> {
        let chain = JointChain::from_names(rig, &config.chain)?;
        let target = rig.require(&config.target)?;

        rig.claim_all(chain.movable(), OWNER)?;
        info!(
            "IK chain of {} joints towards {}, {} passes per frame",
            chain.joints().len(),
            config.target,
            config.iterations
        );

        Ok(IkController {
            solver: CcdSolver::new(chain, config.iterations),
            target: IkTarget::Node(target),
            out_of_reach: false,
            last_report: None,
        })
    }

    pub fn set_target(&mut self, target: IkTarget) {
        self.target = target;
    }

    pub fn chain(&self) -> &JointChain {
        &self.solver.chain
    }

    pub fn last_report(&self) -> Option<&CcdReport> {
        self.last_report.as_ref()
    }
}

impl FrameController for IkController {
    fn update(&mut self, rig: &mut Rig, _dt: f32) {
        let target = match self.target {
            IkTarget::Point(p) => p,
            IkTarget::Node(n) => match rig.global_position(n) {
                Some(p) => p,
                None => return,
            },
        };

        let report = self.solver.solve(rig, &target);

        // Only log when the target moves in or out of reach, not on every frame.
        if report.out_of_reach != self.out_of_reach {
            if report.out_of_reach {
                warn!("IK target {:?} is out of reach of the arm.", target);
            } else {
                info!("IK target back within reach.");
            }
            self.out_of_reach = report.out_of_reach;
        }

        self.last_report = Some(report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TeleopError;
    use na::Isometry3;

    fn arm() -> (Rig, IkConfig) {
        let mut rig = Rig::new("robot");
        let mut parent = rig.root();
        for name in ["shoulder", "elbow", "wrist", "tool"] {
            let offset = if name == "shoulder" { 0.0 } else { 0.5 };
            parent = rig.add_child(parent, name, Isometry3::translation(0.0, offset, 0.0));
        }
        rig.add_child(rig.root(), "hand", Isometry3::translation(0.4, 0.6, 0.3));

        let config = IkConfig {
            chain: vec![
                "shoulder".to_string(),
                "elbow".to_string(),
                "wrist".to_string(),
                "tool".to_string(),
            ],
            target: "hand".to_string(),
            iterations: 10,
        };
        (rig, config)
    }

    #[test]
    fn follows_the_target_transform() {
        let (mut rig, config) = arm();
        let mut ik = IkController::bind(&mut rig, &config).unwrap();

        for _ in 0..10 {
            ik.update(&mut rig, 0.02);
        }

        let tool = ik.chain().end_effector();
        let hand = rig.find("hand").unwrap();
        let d = na::distance(
            &rig.global_position(tool).unwrap(),
            &rig.global_position(hand).unwrap(),
        );
        assert!(d < 1e-2, "{}", d);
        assert!(!ik.last_report().unwrap().out_of_reach);
    }

    #[test]
    fn reports_targets_out_of_reach() {
        let (mut rig, config) = arm();
        let mut ik = IkController::bind(&mut rig, &config).unwrap();
        ik.set_target(IkTarget::Point(Point3::new(0.0, 5.0, 0.0)));

        ik.update(&mut rig, 0.02);
        assert!(ik.last_report().unwrap().out_of_reach);
    }

    #[test]
    fn claims_the_movable_joints_only() {
        let (mut rig, config) = arm();
        IkController::bind(&mut rig, &config).unwrap();

        let tool = rig.find("tool").unwrap();
        let elbow = rig.find("elbow").unwrap();
        assert_eq!(rig.owner(elbow), Some(OWNER));
        assert_eq!(rig.owner(tool), None);
        assert!(matches!(
            rig.claim(elbow, "joint_state"),
            Err(TeleopError::OwnershipConflict { .. })
        ));
    }
}
