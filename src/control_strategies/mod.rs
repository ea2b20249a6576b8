//! The per-frame controllers that drive the rig and talk to the robot.

use crate::rig::Rig;

pub mod arm_follower;
pub mod ik;
pub mod joint_state;
pub mod odometry;
pub mod pose_broadcast;
pub mod push_reaction;
pub mod torso;

/// A trait implemented by types that do their work once per frame.
///
/// Controllers read and write the rig; anything they exchange with the robot goes through a
/// transport handed to them at construction. A controller that writes a transform every frame
/// claims it in the rig when it is bound, so no two controllers fight over the same transform.
pub trait FrameController: Send + 'static {
    fn update(&mut self, rig: &mut Rig, dt: f32);
}

impl<F> FrameController for F
where
    F: FnMut(&mut Rig, f32) + Send + 'static,
{
    fn update(&mut self, rig: &mut Rig, dt: f32) {
        self(rig, dt)
    }
}
