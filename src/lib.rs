//! The control layer of a teleoperated mobile manipulator: a scene rig that mirrors the robot,
//! controllers that keep the two in sync over a publish/subscribe transport, and a CCD solver
//! for the arm.

pub mod config;
pub mod control_strategies;
pub mod coordinates;
pub mod error;
pub mod home_pose;
pub mod inverse_kinematics;
pub mod kinematics;
pub mod mailbox;
pub mod messages;
pub mod physics;
pub mod rig;
pub mod robot;
pub mod scene;
pub mod simulation;
pub mod suspension;
pub mod sync_strategies;
pub mod transport;

extern crate nalgebra as na;
