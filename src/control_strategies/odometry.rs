//! Placing the mobile base where the robot's odometry says it is.

use std::sync::Arc;

use log::{info, trace};

use crate::config::{OdometryConfig, SmoothingConfig};
use crate::coordinates::{pose_to_engine, EnginePose};
use crate::control_strategies::FrameController;
use crate::error::Result;
use crate::mailbox::Mailbox;
use crate::messages::{Message, Odometry};
use crate::rig::{NodeId, Rig};
use crate::transport::{Callback, Transport};

pub const OWNER: &str = "odometry";

pub struct OdometryApplier {
    topic: String,
    base: NodeId,
    smoothing: Option<SmoothingConfig>,
    staged: Mailbox<EnginePose>,
    target: Option<EnginePose>,
}

impl OdometryApplier {
    pub fn bind(rig: &mut Rig, config: &OdometryConfig) -> Result<Self> {
        let base = rig.require(&config.base_link)?;
        rig.claim(base, OWNER)?;
        info!(
            "Odometry drives {} ({})",
            config.base_link,
            if config.smoothing.is_some() { "smoothed" } else { "direct" }
        );

        Ok(OdometryApplier {
            topic: config.topic.clone(),
            base,
            smoothing: config.smoothing.clone(),
            staged: Mailbox::new(),
            target: None,
        })
    }

    pub fn subscribe(&self, transport: &dyn Transport) {
        transport.subscribe(&self.topic, self.callback());
    }

    pub fn callback(&self) -> Callback {
        let staged = self.staged.clone();
        Arc::new(move |message: &Message| match message {
            Message::Odometry(odom) => staged.post(pose_to_engine(&odom.pose)),
            other => trace!("Ignoring {:?} on odometry channel", other.kind()),
        })
    }

    pub fn receive(&self, odom: &Odometry) {
        self.staged.post(pose_to_engine(&odom.pose));
    }

    /// The latest pose received, in engine coordinates.
    pub fn target(&self) -> Option<&EnginePose> {
        self.target.as_ref()
    }
}

impl FrameController for OdometryApplier {
    fn update(&mut self, rig: &mut Rig, dt: f32) {
        let fresh = match self.staged.take() {
            Some(pose) => {
                self.target = Some(pose);
                true
            }
            None => false,
        };

        let target = match self.target {
            Some(t) => t,
            None => return,
        };

        match &self.smoothing {
            None => {
                if fresh {
                    rig.set_local_position(self.base, target.position.coords);
                    rig.set_local_rotation(self.base, target.rotation);
                }
            }
            Some(s) => {
                let (position, rotation) =
                    match (rig.local_position(self.base), rig.local_rotation(self.base)) {
                        (Some(p), Some(r)) => (p, r),
                        _ => return,
                    };
                let tp = (s.position_rate * dt).min(1.0);
                let tr = (s.rotation_rate * dt).min(1.0);

                rig.set_local_position(self.base, position.lerp(&target.position.coords, tp));
                // Interpolation is undefined between (nearly) equal rotations; the target is as good.
                let rotation = rotation
                    .try_slerp(&target.rotation, tr, 1e-6)
                    .unwrap_or(target.rotation);
                rig.set_local_rotation(self.base, rotation);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{Point, Pose, QuaternionMsg};
    use crate::transport::LoopbackBus;
    use na::{Isometry3, UnitQuaternion, Vector3};

    fn odom(x: f64, y: f64, yaw: f64) -> Odometry {
        Odometry {
            pose: Pose {
                position: Point { x, y, z: 0.0 },
                orientation: QuaternionMsg {
                    x: 0.0,
                    y: 0.0,
                    z: (yaw / 2.0).sin(),
                    w: (yaw / 2.0).cos(),
                },
            },
            ..Odometry::default()
        }
    }

    fn rig() -> (Rig, NodeId) {
        let mut rig = Rig::new("world");
        let base = rig.add_child(rig.root(), "base_footprint", Isometry3::identity());
        (rig, base)
    }

    fn direct() -> OdometryConfig {
        OdometryConfig {
            smoothing: None,
            ..OdometryConfig::default()
        }
    }

    #[test]
    fn direct_mode_snaps_to_the_remapped_pose() {
        let (mut rig, base) = rig();
        let mut applier = OdometryApplier::bind(&mut rig, &direct()).unwrap();

        // One metre forward and one to the left of the robot.
        applier.receive(&odom(1.0, 1.0, std::f64::consts::FRAC_PI_2));
        applier.update(&mut rig, 0.02);

        let p = rig.local_position(base).unwrap();
        assert!((p - Vector3::new(-1.0, 0.0, 1.0)).norm() < 1e-6);

        // A left turn of the robot maps to a turn about the engine's up axis that takes
        // forward (z) to the left (-x).
        let r = rig.local_rotation(base).unwrap();
        assert!((r * Vector3::z() - Vector3::new(-1.0, 0.0, 0.0)).norm() < 1e-5);
    }

    #[test]
    fn direct_mode_leaves_the_base_alone_without_news() {
        let (mut rig, base) = rig();
        let mut applier = OdometryApplier::bind(&mut rig, &direct()).unwrap();
        applier.receive(&odom(1.0, 0.0, 0.0));
        applier.update(&mut rig, 0.02);

        rig.set_local_position(base, Vector3::new(5.0, 0.0, 0.0));
        applier.update(&mut rig, 0.02);
        assert_eq!(rig.local_position(base).unwrap(), Vector3::new(5.0, 0.0, 0.0));
    }

    #[test]
    fn smoothing_approaches_the_target() {
        let (mut rig, base) = rig();
        let mut applier = OdometryApplier::bind(&mut rig, &OdometryConfig::default()).unwrap();

        applier.receive(&odom(1.0, 0.0, 0.0));
        applier.update(&mut rig, 0.1);
        assert!((rig.local_position(base).unwrap().z - 0.2).abs() < 1e-6);

        let mut previous = 0.2;
        for _ in 0..50 {
            applier.update(&mut rig, 0.1);
            let z = rig.local_position(base).unwrap().z;
            assert!(z >= previous && z <= 1.0 + 1e-6);
            previous = z;
        }
        assert!((previous - 1.0).abs() < 1e-3);
    }

    #[test]
    fn long_frames_do_not_overshoot() {
        let (mut rig, base) = rig();
        let mut applier = OdometryApplier::bind(&mut rig, &OdometryConfig::default()).unwrap();

        applier.receive(&odom(0.0, 0.0, 1.0));
        applier.update(&mut rig, 2.0);

        let expected = pose_to_engine(&odom(0.0, 0.0, 1.0).pose).rotation;
        assert!(rig.local_rotation(base).unwrap().angle_to(&expected) < 1e-3);
    }

    #[test]
    fn odometry_arrives_through_the_transport() {
        let (mut rig, base) = rig();
        let mut applier = OdometryApplier::bind(&mut rig, &direct()).unwrap();
        let bus = LoopbackBus::new();
        applier.subscribe(&bus);

        bus.publish("/mobile_base_controller/odom", Message::Odometry(odom(2.0, 0.0, 0.0)));
        applier.update(&mut rig, 0.02);

        assert!((rig.local_position(base).unwrap().z - 2.0).abs() < 1e-6);
        let rotation = applier.target().unwrap().rotation;
        assert!(rotation.angle_to(&UnitQuaternion::identity()) < 1e-3);
    }
}
