//! Wiring a complete teleoperation scene: the robot's rig and bodies, the tracked hand, and
//! every controller bound and subscribed.

use std::sync::Arc;

use log::info;
use na::{Isometry3, Vector3};
use nphysics3d::object::DefaultBodyHandle;
use serde::{Deserialize, Serialize};

use crate::config::TeleopConfig;
use crate::control_strategies::arm_follower::ArmFollower;
use crate::control_strategies::ik::IkController;
use crate::control_strategies::joint_state::JointStateApplier;
use crate::control_strategies::odometry::OdometryApplier;
use crate::control_strategies::pose_broadcast::PoseBroadcaster;
use crate::control_strategies::push_reaction::{ContactSink, PushReactionController};
use crate::control_strategies::torso::{TorsoButtons, TorsoCommander};
use crate::error::Result;
use crate::home_pose::apply_home_pose;
use crate::physics::PhysicsWorld;
use crate::rig::{NodeId, Rig};
use crate::robot::spawn::{make_crate, make_ground, spawn_tiago_bodies, TiagoBodies};
use crate::robot::{build_tiago, TiagoIndex};
use crate::simulation::Simulation;
use crate::suspension::SuspensionReport;
use crate::transport::Transport;

/// Which controller moves the arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmMode {
    /// The CCD solver drives the arm joints towards the hand target; joint states only move
    /// the rest of the robot.
    Ik,
    /// The gripper is dragged towards the tracked controller; joint states move the arm joints.
    Follow,
    /// Joint states move every joint, the arm included.
    Mirror,
}

/// Frame controller priorities. Lower runs first.
pub mod priority {
    pub const INPUT: i32 = -10;
    pub const ODOMETRY: i32 = 0;
    pub const JOINT_STATE: i32 = 10;
    pub const ARM: i32 = 20;
    pub const PUSH: i32 = 30;
    pub const PUBLISH: i32 = 40;
}

pub const RIGHT_CONTROLLER: &str = "right_controller";

pub struct TeleopScene {
    pub sim: Simulation,
    pub robot: TiagoIndex,
    pub bodies: TiagoBodies,
    pub right_controller: NodeId,
    pub obstacle: NodeId,
    /// The loose crate's rigid body.
    pub obstacle_body: DefaultBodyHandle,
    pub suspension: SuspensionReport,
    /// Where contact impulses against the robot are reported. Physical contacts from the scene
    /// arrive here on their own; anything else may add more.
    pub contacts: ContactSink,
    pub torso_buttons: TorsoButtons,
}

/// Build the scene and bind every controller for `arm_mode`.
pub fn build_scene(
    config: &TeleopConfig,
    arm_mode: ArmMode,
    transport: Arc<dyn Transport>,
) -> Result<TeleopScene> {
    config.validate()?;

    let mut rig = Rig::new("world");
    let world = rig.root();
    let robot = build_tiago(&mut rig, world, Isometry3::identity());
    let right_controller =
        rig.add_child(world, RIGHT_CONTROLLER, Isometry3::translation(0.35, 1.0, 0.55));
    rig.add_child(right_controller, &config.ik.target, Isometry3::translation(0.0, 0.0, 0.05));

    let mut physics = PhysicsWorld::new();
    make_ground(&mut physics);
    let (obstacle, obstacle_body) = make_crate(
        &mut physics,
        &mut rig,
        world,
        "crate",
        Vector3::new(0.0, 0.2, 1.5),
        0.2,
    );
    let bodies = spawn_tiago_bodies(&mut physics, &rig, &robot);

    apply_home_pose(&mut rig, robot.root, &config.home_pose)?;

    let mut sim = Simulation::new(rig, physics);
    let suspension = sim.suspend(&config.suspension)?;

    let odometry = OdometryApplier::bind(&mut sim.rig, &config.odometry)?;
    odometry.subscribe(transport.as_ref());
    sim.add_controller("odometry", priority::ODOMETRY, odometry);

    // The IK solver owns the arm joints, so joint states must leave them alone.
    let joint_config = match arm_mode {
        ArmMode::Ik => {
            let movable = &config.ik.chain[..config.ik.chain.len() - 1];
            config.joint_state.clone().without_links(movable)
        }
        ArmMode::Follow | ArmMode::Mirror => config.joint_state.clone(),
    };

    match arm_mode {
        ArmMode::Ik => {
            let ik = IkController::bind(&mut sim.rig, &config.ik)?;
            sim.add_controller("ik", priority::ARM, ik);
        }
        ArmMode::Follow => {
            let follower = ArmFollower::bind(&mut sim.rig, &config.arm_follower)?;
            sim.add_controller("arm_follower", priority::ARM, follower);
        }
        ArmMode::Mirror => {}
    }

    let joint_states = JointStateApplier::bind(&mut sim.rig, &joint_config)?;
    joint_states.subscribe(transport.as_ref());
    sim.add_controller("joint_state", priority::JOINT_STATE, joint_states);

    let push = PushReactionController::new(transport.clone(), config.push.clone());
    let contacts = push.contacts();
    sim.report_contacts(robot.root, contacts.clone());
    sim.add_controller("push_reaction", priority::PUSH, push);

    let broadcaster = PoseBroadcaster::new(transport.clone(), &config.pose_broadcast);
    sim.add_controller("pose_broadcast", priority::PUBLISH, broadcaster);

    let torso = TorsoCommander::new(transport, &config.torso);
    let torso_buttons = torso.buttons();
    sim.add_controller("torso", priority::PUBLISH, torso);

    info!(
        "Scene ready in {:?} mode, controllers: {:?}",
        arm_mode,
        sim.controller_names()
    );

    Ok(TeleopScene {
        sim,
        robot,
        bodies,
        right_controller,
        obstacle,
        obstacle_body,
        suspension,
        contacts,
        torso_buttons,
    })
}
