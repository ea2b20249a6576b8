//! A lightweight alternative to IK: drag the end-effector itself towards the hand.

use log::info;

use crate::config::ArmFollowerConfig;
use crate::control_strategies::FrameController;
use crate::error::Result;
use crate::rig::{NodeId, Rig};

pub const OWNER: &str = "arm_follower";

pub struct ArmFollower {
    end_effector: NodeId,
    target: NodeId,
    follow_speed: f32,
}

impl ArmFollower {
    pub fn bind(rig: &mut Rig, config: &ArmFollowerConfig) -> Result<Self> {
        let end_effector = rig.require(&config.end_effector)?;
        let target = rig.require(&config.target)?;
        rig.claim(end_effector, OWNER)?;
        info!("{} follows {}", config.end_effector, config.target);

        Ok(ArmFollower {
            end_effector,
            target,
            follow_speed: config.follow_speed,
        })
    }
}

impl FrameController for ArmFollower {
    fn update(&mut self, rig: &mut Rig, dt: f32) {
        let (current, goal) = match (
            rig.global_transform(self.end_effector),
            rig.global_transform(self.target),
        ) {
            (Some(c), Some(g)) => (c, g),
            _ => return,
        };

        let t = (self.follow_speed * dt).max(0.0).min(1.0);
        let position = current
            .translation
            .vector
            .lerp(&goal.translation.vector, t);
        let rotation = current
            .rotation
            .try_slerp(&goal.rotation, t, 1e-6)
            .unwrap_or(goal.rotation);

        rig.set_global_position(self.end_effector, position.into());
        rig.set_global_rotation(self.end_effector, rotation);
    }
}
