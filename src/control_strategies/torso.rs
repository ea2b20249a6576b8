//! Raising and lowering the torso from two controller buttons.
//!
//! Holding the trigger asks for the raised height, holding the squeeze asks for the bottom.
//! Holding both, or neither, sends nothing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::debug;

use crate::config::TorsoConfig;
use crate::control_strategies::FrameController;
use crate::messages::{Message, MessageKind};
use crate::rig::Rig;
use crate::transport::{CommandPublisher, IntervalTimer, Transport};

/// Button state, written by the input system and read once per frame.
#[derive(Debug, Clone, Default)]
pub struct TorsoButtons {
    trigger: Arc<AtomicBool>,
    squeeze: Arc<AtomicBool>,
}

impl TorsoButtons {
    pub fn set_trigger(&self, held: bool) {
        self.trigger.store(held, Ordering::Relaxed);
    }

    pub fn set_squeeze(&self, held: bool) {
        self.squeeze.store(held, Ordering::Relaxed);
    }

    fn read(&self) -> (bool, bool) {
        (
            self.trigger.load(Ordering::Relaxed),
            self.squeeze.load(Ordering::Relaxed),
        )
    }
}

pub struct TorsoCommander {
    buttons: TorsoButtons,
    timer: IntervalTimer,
    raised_height: f32,
    max_height: f32,
    publisher: CommandPublisher,
}

impl TorsoCommander {
    pub fn new(transport: Arc<dyn Transport>, config: &TorsoConfig) -> Self {
        TorsoCommander {
            buttons: TorsoButtons::default(),
            timer: IntervalTimer::new(config.period),
            raised_height: config.raised_height,
            max_height: config.max_height,
            publisher: CommandPublisher::new(transport, &config.topic, MessageKind::Float32),
        }
    }

    /// A handle for the input system to report button state through.
    pub fn buttons(&self) -> TorsoButtons {
        self.buttons.clone()
    }
}

impl FrameController for TorsoCommander {
    fn update(&mut self, _rig: &mut Rig, dt: f32) {
        let (trigger, squeeze) = self.buttons.read();
        // Time only counts while exactly one button is held.
        if trigger == squeeze || !self.timer.advance(dt) {
            return;
        }

        let desired = if trigger { self.raised_height } else { 0.0 };
        let height = desired.max(0.0).min(self.max_height);
        debug!("Torso height command {:.2}", height);
        self.publisher.publish(Message::Float32(height));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::LoopbackBus;

    const TOPIC: &str = "/torso_tp_controller/command";

    fn run(commander: &mut TorsoCommander, frames: usize) {
        let mut rig = Rig::new("world");
        for _ in 0..frames {
            commander.update(&mut rig, 0.015);
        }
    }

    #[test]
    fn publishes_only_while_exactly_one_button_is_held() {
        let bus = LoopbackBus::new();
        let mut commander = TorsoCommander::new(Arc::new(bus.clone()), &TorsoConfig::default());
        let buttons = commander.buttons();

        run(&mut commander, 20);
        assert!(bus.published(TOPIC).is_empty());

        buttons.set_trigger(true);
        buttons.set_squeeze(true);
        run(&mut commander, 20);
        assert!(bus.published(TOPIC).is_empty());

        buttons.set_squeeze(false);
        run(&mut commander, 20);
        let sent = bus.published(TOPIC);
        // 0.015 s frames against a 0.02 s period: every second frame fires.
        assert_eq!(sent.len(), 10);
        assert!(sent.iter().all(|m| *m == Message::Float32(0.35)));

        bus.clear_log();
        buttons.set_trigger(false);
        buttons.set_squeeze(true);
        run(&mut commander, 4);
        assert_eq!(bus.published(TOPIC), vec![Message::Float32(0.0); 2]);
        assert_eq!(bus.advertised_kind(TOPIC), Some(MessageKind::Float32));
    }

    #[test]
    fn height_is_clamped() {
        let bus = LoopbackBus::new();
        let config = TorsoConfig {
            raised_height: 0.6,
            ..TorsoConfig::default()
        };
        let mut commander = TorsoCommander::new(Arc::new(bus.clone()), &config);
        commander.buttons().set_trigger(true);

        run(&mut commander, 2);
        assert_eq!(bus.published(TOPIC), vec![Message::Float32(0.35)]);
    }
}
