//! Turning bumps against the robot into base velocity commands.
//!
//! A contact impulse strong enough to count as a push produces a velocity command straight away.
//! The command then ramps linearly down to zero over `decay_time`, and a single explicit zero is
//! sent at the end so the base stops cleanly.

use std::sync::Arc;

use log::debug;
use na::Vector3;

use crate::config::PushConfig;
use crate::control_strategies::FrameController;
use crate::mailbox::Mailbox;
use crate::messages::{MessageKind, Twist, Vector3Msg};
use crate::rig::Rig;
use crate::transport::{CommandPublisher, Transport};

/// Forward and yaw velocity for the mobile base.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VelocityCommand {
    pub linear: f32,
    pub angular: f32,
}

impl VelocityCommand {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn scaled(&self, factor: f32) -> Self {
        VelocityCommand {
            linear: self.linear * factor,
            angular: self.angular * factor,
        }
    }
}

impl From<VelocityCommand> for Twist {
    fn from(cmd: VelocityCommand) -> Self {
        Twist {
            linear: Vector3Msg::new(cmd.linear as f64, 0.0, 0.0),
            angular: Vector3Msg::new(0.0, 0.0, cmd.angular as f64),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ShaperState {
    Idle,
    Decaying { command: VelocityCommand, timer: f32 },
}

/// The state machine from contact impulses to a decaying velocity command.
#[derive(Debug, Clone)]
pub struct VelocityShaper {
    settings: PushConfig,
    state: ShaperState,
}

impl VelocityShaper {
    pub fn new(settings: PushConfig) -> Self {
        VelocityShaper {
            settings,
            state: ShaperState::Idle,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state == ShaperState::Idle
    }

    /// Feed one contact impulse, on the engine axes of the robot's base frame.
    ///
    /// Returns the command to send right away, or `None` if the impulse was too weak to count.
    /// A push replaces whatever command was still decaying.
    pub fn on_contact(&mut self, impulse: &Vector3<f32>) -> Option<VelocityCommand> {
        let magnitude = impulse.norm();
        if !magnitude.is_finite() {
            debug!("Ignoring non-finite impulse {:?}", impulse);
            return None;
        }
        if magnitude <= self.settings.push_threshold {
            return None;
        }

        let s = &self.settings;
        let command = VelocityCommand {
            linear: (impulse.z * s.velocity_scale)
                .max(-s.max_linear_velocity)
                .min(s.max_linear_velocity),
            angular: (-impulse.x * s.angular_factor * s.velocity_scale)
                .max(-s.max_angular_velocity)
                .min(s.max_angular_velocity),
        };

        debug!(
            "Push of magnitude {:.2}: linear {:.2}, angular {:.2}",
            magnitude, command.linear, command.angular
        );

        self.state = ShaperState::Decaying {
            command,
            timer: self.settings.decay_time,
        };
        Some(command)
    }

    /// Advance by `dt` seconds, returning the command to send on this frame, if any.
    pub fn update(&mut self, dt: f32) -> Option<VelocityCommand> {
        match self.state {
            ShaperState::Idle => None,
            ShaperState::Decaying { command, timer } => {
                let timer = timer - dt;
                if timer > 0.0 {
                    self.state = ShaperState::Decaying { command, timer };
                    Some(command.scaled(timer / self.settings.decay_time))
                } else {
                    self.state = ShaperState::Idle;
                    Some(VelocityCommand::zero())
                }
            }
        }
    }
}

/// Publishes the shaper's commands on the base velocity channel.
///
/// Contact impulses are handed in through [`PushReactionController::contacts`], which the physics
/// side may fill at any time; they are fed to the shaper in arrival order on the next frame.
pub struct PushReactionController {
    shaper: VelocityShaper,
    contacts: Mailbox<Vec<Vector3<f32>>>,
    publisher: CommandPublisher,
}

impl PushReactionController {
    pub fn new(transport: Arc<dyn Transport>, settings: PushConfig) -> Self {
        let publisher = CommandPublisher::new(transport, &settings.topic, MessageKind::Twist);
        PushReactionController {
            shaper: VelocityShaper::new(settings),
            contacts: Mailbox::new(),
            publisher,
        }
    }

    /// A handle for reporting contact impulses.
    pub fn contacts(&self) -> ContactSink {
        ContactSink(self.contacts.clone())
    }

    fn send(&self, command: VelocityCommand) {
        self.publisher.publish(Twist::from(command));
    }
}

/// Where contact impulses against the robot get reported.
#[derive(Clone)]
pub struct ContactSink(Mailbox<Vec<Vector3<f32>>>);

impl ContactSink {
    pub fn report(&self, impulse: Vector3<f32>) {
        self.0
            .post_with(|staged| staged.get_or_insert_with(Vec::new).push(impulse));
    }
}

impl FrameController for PushReactionController {
    fn update(&mut self, _rig: &mut Rig, dt: f32) {
        if let Some(command) = self.shaper.update(dt) {
            self.send(command);
        }

        for impulse in self.contacts.take().unwrap_or_default() {
            if let Some(command) = self.shaper.on_contact(&impulse) {
                self.send(command);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::Message;
    use crate::transport::LoopbackBus;
    use rand::Rng;

    fn settings() -> PushConfig {
        PushConfig::default()
    }

    #[test]
    fn non_finite_impulses_are_ignored() {
        let mut shaper = VelocityShaper::new(settings());

        assert!(shaper.on_contact(&Vector3::new(f32::NAN, 0.0, 1.0)).is_none());
        assert!(shaper.on_contact(&Vector3::new(0.0, 0.0, f32::INFINITY)).is_none());
        assert!(shaper.is_idle());

        shaper.on_contact(&Vector3::new(0.0, 0.0, 1.0)).unwrap();
        assert!(shaper.on_contact(&Vector3::new(0.0, f32::NAN, 0.0)).is_none());
        assert!(!shaper.is_idle());
        assert!(shaper.update(0.1).unwrap().linear > 0.0);
    }

    #[test]
    fn impulses_are_scaled_and_clamped() {
        let mut shaper = VelocityShaper::new(settings());

        let cmd = shaper.on_contact(&Vector3::new(0.0, 0.0, 0.5)).unwrap();
        assert!((cmd.linear - 0.2).abs() < 1e-6);
        assert_eq!(cmd.angular, 0.0);

        let cmd = shaper.on_contact(&Vector3::new(0.0, 0.0, 2.0)).unwrap();
        assert!((cmd.linear - 0.5).abs() < 1e-6);

        let cmd = shaper.on_contact(&Vector3::new(0.0, 0.0, -2.0)).unwrap();
        assert!((cmd.linear + 0.5).abs() < 1e-6);

        // Pushing on the right side turns the base left.
        let cmd = shaper.on_contact(&Vector3::new(1.0, 0.0, 0.0)).unwrap();
        assert!((cmd.angular + 0.2).abs() < 1e-6);

        let cmd = shaper.on_contact(&Vector3::new(-100.0, 0.0, 0.0)).unwrap();
        assert!((cmd.angular - 1.0).abs() < 1e-6);
    }

    #[test]
    fn weak_impulses_change_nothing() {
        let mut shaper = VelocityShaper::new(PushConfig {
            push_threshold: 0.5,
            ..settings()
        });

        // Exactly at the threshold still does not count.
        assert_eq!(shaper.on_contact(&Vector3::new(0.0, 0.0, 0.5)), None);
        assert!(shaper.is_idle());

        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let v: Vector3<f32> = Vector3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            );
            let v = v.normalize() * rng.gen_range(0.0f32..0.49);
            assert_eq!(shaper.on_contact(&v), None);
        }
        assert!(shaper.is_idle());
        assert_eq!(shaper.update(0.1), None);
    }

    #[test]
    fn command_decays_linearly() {
        let mut shaper = VelocityShaper::new(settings());
        shaper.on_contact(&Vector3::new(0.0, 0.0, 0.5));

        shaper.update(0.25);
        let half = shaper.update(0.25).unwrap();
        assert!((half.linear - 0.1).abs() < 1e-6);
    }

    #[test]
    fn exactly_one_zero_ends_the_decay() {
        let mut shaper = VelocityShaper::new(settings());
        shaper.on_contact(&Vector3::new(0.0, 0.0, 1.0));

        let mut emitted = vec![];
        for _ in 0..10 {
            if let Some(c) = shaper.update(0.3) {
                emitted.push(c.linear);
            }
        }

        assert_eq!(emitted.len(), 4);
        assert!(emitted[..3].iter().all(|l| *l > 0.0));
        assert!(emitted.windows(2).all(|w| w[1] <= w[0]));
        assert_eq!(emitted[3], 0.0);
        assert!(shaper.is_idle());
    }

    #[test]
    fn decay_is_monotonic_for_any_frame_times() {
        let mut rng = rand::thread_rng();
        let mut shaper = VelocityShaper::new(settings());
        shaper.on_contact(&Vector3::new(-0.7, 0.0, 0.9));

        let mut previous = f32::INFINITY;
        while let Some(c) = shaper.update(rng.gen_range(0.001..0.05)) {
            assert!(c.linear.abs() <= previous);
            previous = c.linear.abs();
        }
        assert_eq!(previous, 0.0);
    }

    #[test]
    fn last_push_wins() {
        let mut shaper = VelocityShaper::new(settings());
        shaper.on_contact(&Vector3::new(0.0, 0.0, 1.0));
        shaper.update(0.5);

        let cmd = shaper.on_contact(&Vector3::new(0.0, 0.0, -0.5)).unwrap();
        assert!((cmd.linear + 0.2).abs() < 1e-6);

        // The timer restarted: after another 0.5 s we are at half of the new command.
        let half = shaper.update(0.5).unwrap();
        assert!((half.linear + 0.1).abs() < 1e-6);
    }

    #[test]
    fn controller_publishes_twists() {
        let bus = LoopbackBus::new();
        let mut controller = PushReactionController::new(Arc::new(bus.clone()), settings());
        let sink = controller.contacts();
        let mut rig = Rig::new("world");

        sink.report(Vector3::new(0.0, 0.0, 0.01));
        sink.report(Vector3::new(0.0, 0.0, 0.5));
        controller.update(&mut rig, 0.02);

        let sent = bus.published("/mobile_base_controller/cmd_vel");
        assert_eq!(sent.len(), 1);
        match &sent[0] {
            Message::Twist(t) => {
                assert!((t.linear.x - 0.2).abs() < 1e-6);
                assert_eq!(t.linear.y, 0.0);
                assert_eq!(t.angular.z, 0.0);
            }
            other => panic!("unexpected {:?}", other),
        }

        for _ in 0..100 {
            controller.update(&mut rig, 0.02);
        }
        let sent = bus.published("/mobile_base_controller/cmd_vel");
        assert_eq!(sent.last(), Some(&Message::Twist(Twist::default())));
        let zeros = sent
            .iter()
            .filter(|m| **m == Message::Twist(Twist::default()))
            .count();
        assert_eq!(zeros, 1);
    }
}
