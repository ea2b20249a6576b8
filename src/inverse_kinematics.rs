//! Cyclic coordinate descent over a joint chain in the rig.
//!
//! Only the end-effector's position is driven towards the target; its orientation is whatever
//! the chain ends up with. Joints are unconstrained.

use log::trace;
use na::{Point3, Unit, UnitQuaternion, Vector3};

use crate::error::{Result, TeleopError};
use crate::kinematics::JointChain;
use crate::rig::{NodeId, Rig};

/// Vectors shorter than this, or closer than this to each other, leave a joint alone.
const DEGENERACY_EPSILON: f32 = 1e-6;

#[derive(Debug, Clone)]
pub struct CcdSolver {
    pub chain: JointChain,
    /// Number of full passes over the chain per solve.
    pub iterations: usize,
}

/// What happened during one solve.
#[derive(Debug, Clone, Default)]
pub struct CcdReport {
    /// Distance from end-effector to target after each pass.
    pub residuals: Vec<f32>,
    /// Joint updates skipped because the correcting rotation was undefined.
    pub skipped: usize,
    /// The target lies further from the base than the chain is long.
    pub out_of_reach: bool,
}

impl CcdReport {
    pub fn final_distance(&self) -> Option<f32> {
        self.residuals.last().cloned()
    }
}

impl CcdSolver {
    pub fn new(chain: JointChain, iterations: usize) -> Self {
        CcdSolver { chain, iterations }
    }

    /// Rotate the chain's joints so the end-effector approaches `target`.
    ///
    /// Always runs exactly `iterations` passes. Each pass visits the joints from the one just
    /// before the end-effector down to the base.
    pub fn solve(&self, rig: &mut Rig, target: &Point3<f32>) -> CcdReport {
        let mut report = CcdReport::default();

        if let Some(base) = rig.global_position(self.chain.base()) {
            report.out_of_reach = na::distance(&base, target) > self.chain.chain_length(rig);
        }

        for _ in 0..self.iterations {
            for joint in self.chain.movable().iter().rev() {
                match self.joint_correction(rig, *joint, target) {
                    Ok(Some(rotation)) => {
                        if let Some(current) = rig.global_rotation(*joint) {
                            rig.set_global_rotation(*joint, rotation * current);
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        trace!("{}", e);
                        report.skipped += 1;
                    }
                }
            }

            if let Some(end) = rig.global_position(self.chain.end_effector()) {
                report.residuals.push(na::distance(&end, target));
            }
        }

        report
    }

    /// The rotation that swings the end-effector, as seen from `joint`, onto the target.
    ///
    /// `Ok(None)` means the end-effector is already where it needs to be.
    fn joint_correction(
        &self,
        rig: &Rig,
        joint: NodeId,
        target: &Point3<f32>,
    ) -> Result<Option<UnitQuaternion<f32>>> {
        let degenerate =
            || TeleopError::NumericDegeneracy(rig.name(joint).unwrap_or("?").to_string());

        let (pivot, end) = match (
            rig.global_position(joint),
            rig.global_position(self.chain.end_effector()),
        ) {
            (Some(p), Some(e)) => (p, e),
            _ => return Err(degenerate()),
        };

        let to_end = end - pivot;
        let to_target = target - pivot;

        if (to_end - to_target).norm() < DEGENERACY_EPSILON {
            return Ok(None);
        }

        shortest_arc(&to_end, &to_target).map(Some).ok_or_else(degenerate)
    }
}

/// The smallest rotation taking the direction of `from` onto the direction of `to`.
///
/// Undefined, and so `None`, when either vector is (nearly) zero or when they point in opposite
/// directions. The angle comes from `atan2` rather than `acos`, which is too coarse near zero
/// in single precision for the small corrections CCD makes once it has nearly converged.
pub fn shortest_arc(from: &Vector3<f32>, to: &Vector3<f32>) -> Option<UnitQuaternion<f32>> {
    if from.norm() < DEGENERACY_EPSILON || to.norm() < DEGENERACY_EPSILON {
        return None;
    }
    let from = from.normalize();
    let to = to.normalize();

    let cross = from.cross(&to);
    let dot = from.dot(&to);

    match Unit::try_new(cross, DEGENERACY_EPSILON) {
        Some(axis) => {
            let angle = cross.norm().atan2(dot);
            Some(UnitQuaternion::from_axis_angle(&axis, angle))
        }
        None if dot > 0.0 => Some(UnitQuaternion::identity()),
        None => None,
    }
}
