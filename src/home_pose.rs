//! One-shot posing of the rig's joints from a table of angles.

use log::{debug, info, warn};
use na::UnitQuaternion;

use crate::config::{unit_axis, HomePoseConfig};
use crate::error::Result;
use crate::rig::{NodeId, Rig};

/// Set the local rotation of every listed joint under `root` to its home angle.
///
/// The rotation is absolute: whatever the joint's rotation was, it is replaced. Joints that
/// cannot be found are skipped with a warning. Returns the number of joints posed.
pub fn apply_home_pose(rig: &mut Rig, root: NodeId, config: &HomePoseConfig) -> Result<usize> {
    let axis = unit_axis("home_pose", config.axis)?;
    let sign = if config.invert { -1.0 } else { 1.0 };
    let mut posed = 0;

    for joint in config.joints.iter() {
        let node = match rig.find_in(root, &joint.name) {
            Some(n) => n,
            None => {
                warn!("Joint {} not found.", joint.name);
                continue;
            }
        };

        let degrees = sign * joint.degrees;
        rig.set_local_rotation(node, UnitQuaternion::from_axis_angle(&axis, degrees.to_radians()));
        debug!("Set {} to {:.1} degrees", joint.name, degrees);
        posed += 1;
    }

    info!("Home pose applied to {} of {} joints.", posed, config.joints.len());
    Ok(posed)
}
