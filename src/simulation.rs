//! The frame loop: physics, then every controller in priority order, then the bodies that
//! follow the rig.

use std::boxed::Box;

use log::{debug, info, trace};

use crate::config::SuspensionConfig;
use crate::control_strategies::push_reaction::ContactSink;
use crate::control_strategies::FrameController;
use crate::error::Result;
use crate::physics::PhysicsWorld;
use crate::rig::{NodeId, Rig};
use crate::suspension::{suspend, SuspensionReport};
use crate::sync_strategies::WaitStrategy;

struct ScheduledController {
    name: String,
    priority: i32,
    controller: Box<dyn FrameController>,
}

/// A subtree whose physical contacts are reported to a sink.
struct ContactWatch {
    root: NodeId,
    sink: ContactSink,
}

pub struct Simulation {
    pub rig: Rig,
    pub physics: PhysicsWorld,
    controllers: Vec<ScheduledController>,
    watches: Vec<ContactWatch>,
    frame: u64,
    time: f64,
}

impl Simulation {
    pub fn new(rig: Rig, physics: PhysicsWorld) -> Self {
        Simulation {
            rig,
            physics,
            controllers: vec![],
            watches: vec![],
            frame: 0,
            time: 0.0,
        }
    }

    /// Add a controller to run every frame.
    ///
    /// Lower priorities run first; controllers of equal priority run in the order they were added.
    pub fn add_controller<C: FrameController>(&mut self, name: &str, priority: i32, controller: C) {
        debug!("Adding controller {} at priority {}", name, priority);
        let scheduled = ScheduledController {
            name: name.to_string(),
            priority,
            controller: Box::new(controller),
        };
        let at = self
            .controllers
            .iter()
            .position(|c| c.priority > priority)
            .unwrap_or(self.controllers.len());
        self.controllers.insert(at, scheduled);
    }

    /// Names of the controllers, in the order they run.
    pub fn controller_names(&self) -> Vec<&str> {
        self.controllers.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    /// After every physics step, report the impulses bodies outside `root`'s subtree gave to
    /// bodies inside it to `sink`.
    ///
    /// Impulses are expressed in the frame of `root` and flattened onto its horizontal plane.
    pub fn report_contacts(&mut self, root: NodeId, sink: ContactSink) {
        self.watches.push(ContactWatch { root, sink });
    }

    fn dispatch_contacts(&self) {
        for watch in self.watches.iter() {
            let to_local = match self.rig.global_rotation(watch.root) {
                Some(r) => r.inverse(),
                None => continue,
            };
            for impulse in self.physics.impulses_on(&self.rig, watch.root) {
                let mut local = to_local * impulse;
                local.y = 0.0;
                trace!("Contact impulse {:?} on {:?}", local, self.rig.name(watch.root));
                watch.sink.report(local);
            }
        }
    }

    /// Suspend the physics of the subtree named in `config`.
    pub fn suspend(&mut self, config: &SuspensionConfig) -> Result<SuspensionReport> {
        let root = self.rig.require(&config.root)?;
        Ok(suspend(
            &mut self.physics,
            &self.rig,
            root,
            config.policy,
            &config.neutralize,
            config.zero_gravity_on_pause,
        ))
    }

    /// Advance everything by one frame of `dt` seconds.
    pub fn step(&mut self, dt: f32) {
        self.physics.mechanical_world.set_timestep(dt);
        self.physics.step();
        self.dispatch_contacts();

        for c in self.controllers.iter_mut() {
            c.controller.update(&mut self.rig, dt);
        }

        self.physics.follow_rig(&self.rig);

        self.frame += 1;
        self.time += dt as f64;
    }

    /// Run `frames` frames, holding before each one according to `wait_strategy`.
    pub fn run<W: WaitStrategy>(&mut self, frames: u64, dt: f32, wait_strategy: &mut W) {
        info!("Running {} frames of {} s", frames, dt);
        for _ in 0..frames {
            wait_strategy();
            self.step(dt);
        }
    }
}
