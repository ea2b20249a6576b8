//! Sending the pose of a tracked transform to the robot at a fixed rate.

use std::sync::Arc;

use log::trace;

use crate::config::PoseBroadcastConfig;
use crate::control_strategies::FrameController;
use crate::coordinates::{pose_to_robot, EnginePose};
use crate::messages::{Header, MessageKind, PoseStamped};
use crate::rig::Rig;
use crate::transport::{CommandPublisher, IntervalTimer, Transport};

pub struct PoseBroadcaster {
    tracked: String,
    frame_id: String,
    timer: IntervalTimer,
    publisher: CommandPublisher,
    seq: u32,
    clock: f64,
}

impl PoseBroadcaster {
    pub fn new(transport: Arc<dyn Transport>, config: &PoseBroadcastConfig) -> Self {
        PoseBroadcaster {
            tracked: config.tracked.clone(),
            frame_id: config.frame_id.clone(),
            timer: IntervalTimer::with_delay(config.period, config.initial_delay),
            publisher: CommandPublisher::new(transport, &config.topic, MessageKind::PoseStamped),
            seq: 0,
            clock: 0.0,
        }
    }

    fn message(&mut self, pose: EnginePose) -> PoseStamped {
        let seq = self.seq;
        self.seq = self.seq.wrapping_add(1);
        PoseStamped {
            header: Header {
                seq,
                stamp_secs: self.clock,
                frame_id: self.frame_id.clone(),
            },
            pose: pose_to_robot(&pose),
        }
    }
}

impl FrameController for PoseBroadcaster {
    fn update(&mut self, rig: &mut Rig, dt: f32) {
        self.clock += dt as f64;
        if !self.timer.advance(dt) {
            return;
        }

        // The tracked transform may come and go, e.g. when a controller loses tracking.
        let pose = match rig.find(&self.tracked).and_then(|n| rig.global_transform(n)) {
            Some(iso) => EnginePose {
                position: iso.translation.vector.into(),
                rotation: iso.rotation,
            },
            None => {
                trace!("{} not in rig, not broadcasting", self.tracked);
                return;
            }
        };

        let message = self.message(pose);
        self.publisher.publish(message);
    }
}
