//! Plain data for the message schemas exchanged with the robot.
//!
//! These mirror the usual robotics message layouts field for field. Serialization onto a wire is
//! the transport's business, so nothing here knows about bytes.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3Msg {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3Msg {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Vector3Msg { x, y, z }
    }
}

/// A position in free space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// An orientation in quaternion form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuaternionMsg {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Default for QuaternionMsg {
    fn default() -> Self {
        QuaternionMsg {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Point,
    pub orientation: QuaternionMsg,
}

/// Velocity in free space, split into its linear and angular parts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Twist {
    pub linear: Vector3Msg,
    pub angular: Vector3Msg,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub seq: u32,
    pub stamp_secs: f64,
    pub frame_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseStamped {
    pub header: Header,
    pub pose: Pose,
}

/// Estimated pose and velocity of the mobile base. Only the pose is consumed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Odometry {
    pub header: Header,
    pub child_frame_id: String,
    pub pose: Pose,
    pub twist: Twist,
}

/// Parallel arrays describing the state of a set of named joints.
///
/// Only `name` and `position` are consumed; when they disagree in length the shared prefix is used.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JointState {
    pub header: Header,
    pub name: Vec<String>,
    pub position: Vec<f64>,
    pub velocity: Vec<f64>,
    pub effort: Vec<f64>,
}

impl JointState {
    /// Name/position pairs over the prefix both arrays share.
    pub fn positions(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.name
            .iter()
            .map(String::as_str)
            .zip(self.position.iter().cloned())
    }

    pub fn is_consistent(&self) -> bool {
        self.name.len() == self.position.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Twist,
    Odometry,
    JointState,
    PoseStamped,
    Float32,
    Int32,
}

/// Any message that travels over the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    Twist(Twist),
    Odometry(Odometry),
    JointState(JointState),
    PoseStamped(PoseStamped),
    Float32(f32),
    Int32(i32),
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Twist(_) => MessageKind::Twist,
            Message::Odometry(_) => MessageKind::Odometry,
            Message::JointState(_) => MessageKind::JointState,
            Message::PoseStamped(_) => MessageKind::PoseStamped,
            Message::Float32(_) => MessageKind::Float32,
            Message::Int32(_) => MessageKind::Int32,
        }
    }
}

impl From<Twist> for Message {
    fn from(t: Twist) -> Self {
        Message::Twist(t)
    }
}

impl From<Odometry> for Message {
    fn from(o: Odometry) -> Self {
        Message::Odometry(o)
    }
}

impl From<JointState> for Message {
    fn from(js: JointState) -> Self {
        Message::JointState(js)
    }
}

impl From<PoseStamped> for Message {
    fn from(ps: PoseStamped) -> Self {
        Message::PoseStamped(ps)
    }
}
