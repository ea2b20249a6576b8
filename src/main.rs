//! Headless teleoperation demo.
//!
//! Builds the scene on an in-process bus, plays the part of the real robot (integrating the
//! velocity commands it is sent and reporting odometry and joint states back), moves the tracked
//! hand in a circle, throws the crate at the robot now and then, and logs what went over the bus.

use std::f32::consts::PI;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use log::{debug, info, warn};
use na::{Isometry3, Point3, Vector3};
use nphysics3d::object::Body;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tiago_teleop::config::TeleopConfig;
use tiago_teleop::error::TeleopError;
use tiago_teleop::mailbox::Mailbox;
use tiago_teleop::messages::{Header, JointState, Message, Odometry, Point, Pose, QuaternionMsg, Twist};
use tiago_teleop::rig::Rig;
use tiago_teleop::scene::{build_scene, priority, ArmMode, TeleopScene};
use tiago_teleop::suspension::SuspensionPolicy;
use tiago_teleop::sync_strategies::{never_wait, real_time, WaitStrategy};
use tiago_teleop::transport::{LoopbackBus, Transport};

extern crate nalgebra as na;

/// Frames between two throws of the crate.
const THROW_EVERY: u64 = 150;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ArmModeArg {
    Ik,
    Follow,
    Mirror,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SuspensionArg {
    GlobalPause,
    Neutralize,
    Remove,
}

#[derive(Parser, Debug)]
#[command(version, about = "Drive a simulated Tiago rig from a scripted teleoperation session")]
struct Args {
    /// TOML file overriding the default configuration.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of frames to simulate.
    #[arg(long, default_value_t = 500)]
    frames: u64,

    /// Frame duration in seconds.
    #[arg(long, default_value_t = 0.02)]
    dt: f32,

    #[arg(long, value_enum, default_value_t = ArmModeArg::Ik)]
    arm_mode: ArmModeArg,

    /// Override the suspension policy from the configuration.
    #[arg(long, value_enum)]
    suspension: Option<SuspensionArg>,

    /// Pace frames to wall-clock time instead of running flat out.
    #[arg(long)]
    real_time: bool,

    /// Seed for where and how hard the crate is thrown.
    #[arg(long, default_value_t = 7)]
    seed: u64,
}

fn main() -> Result<(), TeleopError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => TeleopConfig::from_file(path)?,
        None => TeleopConfig::default(),
    };
    if let Some(policy) = args.suspension {
        config.suspension.policy = match policy {
            SuspensionArg::GlobalPause => SuspensionPolicy::GlobalPause,
            SuspensionArg::Neutralize => SuspensionPolicy::Neutralize,
            SuspensionArg::Remove => SuspensionPolicy::Remove,
        };
    }
    if args.dt.is_nan() || args.dt <= 0.0 {
        return Err(TeleopError::InvalidConfig(format!("--dt must be positive, got {}", args.dt)));
    }

    let arm_mode = match args.arm_mode {
        ArmModeArg::Ik => ArmMode::Ik,
        ArmModeArg::Follow => ArmMode::Follow,
        ArmModeArg::Mirror => ArmMode::Mirror,
    };

    // Only the per-channel counts are reported, so nothing needs logging.
    let bus = LoopbackBus::with_log_capacity(0);
    let transport: Arc<dyn Transport> = Arc::new(bus.clone());
    let mut scene = build_scene(&config, arm_mode, transport)?;
    info!("Suspension: {:?}", scene.suspension);

    scene.sim.add_controller(
        "remote_robot",
        priority::INPUT,
        remote_robot(bus.clone(), &config),
    );

    let buttons = scene.torso_buttons.clone();
    let hand = scene.right_controller;
    let mut t = 0.0f32;
    scene.sim.add_controller("vr_input", priority::INPUT, move |rig: &mut Rig, dt: f32| {
        t += dt;

        // The operator's hand circles in front of the robot.
        let angle = t * 0.5 * PI;
        let centre = Vector3::new(0.3, 1.0, 0.5);
        rig.set_local_position(
            hand,
            centre + Vector3::new(0.15 * angle.cos(), 0.1 * angle.sin(), 0.1 * angle.sin()),
        );

        // Trigger held during the second second, squeeze during the fourth.
        buttons.set_trigger((1.0..2.0).contains(&t));
        buttons.set_squeeze((3.0..4.0).contains(&t));
    });

    let dt = args.dt;
    let mut wait: Box<dyn WaitStrategy> = if args.real_time {
        Box::new(real_time(Duration::from_secs_f32(dt)))
    } else {
        Box::new(never_wait)
    };

    let mut rng = StdRng::seed_from_u64(args.seed);
    let mut done = 0;
    while done < args.frames {
        throw_crate(&mut scene, &mut rng);
        let chunk = THROW_EVERY.min(args.frames - done);
        scene.sim.run(chunk, dt, &mut wait);
        done += chunk;
    }

    for topic in [
        &config.push.topic,
        &config.pose_broadcast.topic,
        &config.torso.topic,
        &config.odometry.topic,
        &config.joint_state.topic,
    ] {
        info!("{}: {} messages", topic, bus.published_count(topic));
    }

    let base = scene.robot.root;
    match scene.sim.rig.global_position(base) {
        Some(p) => info!("Base ended up at {:?} after {:.1} s", p, scene.sim.time()),
        None => warn!("Base transform vanished"),
    }

    Ok(())
}

/// Put the crate on the ground in front of the base and send it sliding towards it.
fn throw_crate(scene: &mut TeleopScene, rng: &mut StdRng) {
    let base = match scene.sim.rig.global_position(scene.robot.base) {
        Some(p) => Point3::new(p.x, 0.2, p.z),
        None => return,
    };
    let bearing: f32 = rng.gen_range(-0.6..0.6);
    let start = base + Vector3::new(bearing.sin(), 0.0, bearing.cos()) * 1.5;
    let speed: f32 = rng.gen_range(1.0..4.0);
    let velocity = (base - start).normalize() * speed;

    debug!("Throwing the crate from {:?} at {:.1} m/s", start, speed);
    if let Some(rb) = scene.sim.physics.bodies.rigid_body_mut(scene.obstacle_body) {
        rb.set_position(Isometry3::translation(start.x, start.y, start.z));
        rb.set_linear_velocity(velocity);
        rb.set_angular_velocity(Vector3::zeros());
        rb.activate();
    }
}

/// The stand-in for the real robot: integrates the velocity commands it receives and reports
/// odometry and joint states every few frames.
fn remote_robot(bus: LoopbackBus, config: &TeleopConfig) -> impl FnMut(&mut Rig, f32) + Send + 'static {
    let commands: Mailbox<Twist> = Mailbox::new();
    let inbox = commands.clone();
    bus.subscribe(
        &config.push.topic,
        Arc::new(move |m: &Message| {
            if let Message::Twist(twist) = m {
                inbox.post(*twist);
            }
        }),
    );

    let odom_topic = config.odometry.topic.clone();
    let joint_topic = config.joint_state.topic.clone();
    let joint_names: Vec<String> = config.joint_state.joints.keys().cloned().collect();

    let mut twist = Twist::default();
    let (mut x, mut y, mut yaw) = (0.0f64, 0.0f64, 0.0f64);
    let mut frame = 0u64;
    let mut clock = 0.0f64;

    move |_rig: &mut Rig, dt: f32| {
        let dt = dt as f64;
        clock += dt;
        frame += 1;

        if let Some(latest) = commands.take() {
            twist = latest;
        }
        yaw += twist.angular.z * dt;
        x += twist.linear.x * yaw.cos() * dt;
        y += twist.linear.x * yaw.sin() * dt;

        if frame % 5 != 0 {
            return;
        }

        let header = Header {
            seq: (frame / 5) as u32,
            stamp_secs: clock,
            frame_id: "odom".to_string(),
        };

        bus.publish(
            &odom_topic,
            Message::Odometry(Odometry {
                header: header.clone(),
                child_frame_id: "base_footprint".to_string(),
                pose: Pose {
                    position: Point { x, y, z: 0.0 },
                    orientation: QuaternionMsg {
                        x: 0.0,
                        y: 0.0,
                        z: (yaw / 2.0).sin(),
                        w: (yaw / 2.0).cos(),
                    },
                },
                twist,
            }),
        );

        let position = joint_names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                if name == "torso_lift_joint" {
                    0.1 + 0.05 * (clock * 0.5).sin()
                } else {
                    0.3 * (clock + i as f64).sin()
                }
            })
            .collect();
        bus.publish(
            &joint_topic,
            Message::JointState(JointState {
                header,
                name: joint_names.clone(),
                position,
                velocity: vec![],
                effort: vec![],
            }),
        );
    }
}
