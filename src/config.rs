//! Tunables of every component, loadable from a TOML file.
//!
//! Every field has a default, so a file only needs to mention what it changes.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use na::{Unit, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TeleopError};
use crate::suspension::{NeutralizeSettings, SuspensionPolicy};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TeleopConfig {
    pub push: PushConfig,
    pub joint_state: JointStateConfig,
    pub odometry: OdometryConfig,
    pub ik: IkConfig,
    pub arm_follower: ArmFollowerConfig,
    pub pose_broadcast: PoseBroadcastConfig,
    pub torso: TorsoConfig,
    pub home_pose: HomePoseConfig,
    pub suspension: SuspensionConfig,
}

impl TeleopConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: TeleopConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.push.validate()?;
        self.joint_state.validate()?;
        self.odometry.validate()?;
        self.ik.validate()?;
        self.pose_broadcast.validate()?;
        self.torso.validate()?;
        self.home_pose.validate()?;
        Ok(())
    }
}

fn invalid<T>(msg: String) -> Result<T> {
    Err(TeleopError::InvalidConfig(msg))
}

fn non_negative(name: &str, value: f32) -> Result<()> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        invalid(format!("{} must be a non-negative number, got {}", name, value))
    }
}

fn positive(name: &str, value: f32) -> Result<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        invalid(format!("{} must be positive, got {}", name, value))
    }
}

/// Turn a configured axis into a unit vector, rejecting zero-length axes.
pub fn unit_axis(name: &str, axis: [f32; 3]) -> Result<Unit<Vector3<f32>>> {
    Unit::try_new(Vector3::from(axis), 1e-6)
        .ok_or_else(|| TeleopError::InvalidConfig(format!("axis of `{}` has zero length", name)))
}

//region Push reaction

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    pub topic: String,
    /// Impulses with a magnitude at or below this are ignored.
    pub push_threshold: f32,
    pub velocity_scale: f32,
    pub max_linear_velocity: f32,
    pub max_angular_velocity: f32,
    /// Seconds for a commanded velocity to ramp down to zero.
    pub decay_time: f32,
    /// Extra factor between a sideways impulse and the yaw rate it causes.
    pub angular_factor: f32,
}

impl Default for PushConfig {
    fn default() -> Self {
        PushConfig {
            topic: "/mobile_base_controller/cmd_vel".to_string(),
            push_threshold: 0.05,
            velocity_scale: 0.4,
            max_linear_velocity: 0.5,
            max_angular_velocity: 1.0,
            decay_time: 1.0,
            angular_factor: 0.5,
        }
    }
}

impl PushConfig {
    pub fn validate(&self) -> Result<()> {
        non_negative("push.push_threshold", self.push_threshold)?;
        non_negative("push.max_linear_velocity", self.max_linear_velocity)?;
        non_negative("push.max_angular_velocity", self.max_angular_velocity)?;
        positive("push.decay_time", self.decay_time)?;
        Ok(())
    }
}

//endregion

//region Joint states

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JointKind {
    /// Positions are angles in radians about the axis.
    Revolute,
    /// Positions are offsets in metres along the axis.
    Prismatic,
}

/// How a joint named in joint-state messages maps onto the rig.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointBinding {
    /// Name of the rig transform the joint moves.
    pub link: String,
    /// Axis in the link's parent frame.
    pub axis: [f32; 3],
    pub kind: JointKind,
}

impl JointBinding {
    fn revolute(link: &str, axis: [f32; 3]) -> Self {
        JointBinding {
            link: link.to_string(),
            axis,
            kind: JointKind::Revolute,
        }
    }
}

const RIGHT: [f32; 3] = [1.0, 0.0, 0.0];
const UP: [f32; 3] = [0.0, 1.0, 0.0];
const FORWARD: [f32; 3] = [0.0, 0.0, 1.0];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JointStateConfig {
    pub topic: String,
    /// Joint name, as it appears in messages, to rig binding.
    pub joints: BTreeMap<String, JointBinding>,
}

impl Default for JointStateConfig {
    fn default() -> Self {
        let mut joints = BTreeMap::new();
        for (joint, link, axis) in [
            ("arm_1_joint", "arm_1_link", RIGHT),
            ("arm_2_joint", "arm_2_link", UP),
            ("arm_3_joint", "arm_3_link", UP),
            ("arm_4_joint", "arm_4_link", FORWARD),
            ("arm_5_joint", "arm_5_link", UP),
            ("arm_6_joint", "arm_6_link", FORWARD),
            ("arm_7_joint", "arm_7_link", UP),
            ("head_1_joint", "head_1_link", UP),
            ("head_2_joint", "head_2_link", RIGHT),
        ] {
            joints.insert(joint.to_string(), JointBinding::revolute(link, axis));
        }
        joints.insert(
            "torso_lift_joint".to_string(),
            JointBinding {
                link: "torso_lift_link".to_string(),
                axis: UP,
                kind: JointKind::Prismatic,
            },
        );

        JointStateConfig {
            topic: "/joint_states".to_string(),
            joints,
        }
    }
}

impl JointStateConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, binding) in self.joints.iter() {
            unit_axis(name, binding.axis)?;
        }
        Ok(())
    }

    /// Drop every joint whose link is in `links`, e.g. because another controller owns it.
    pub fn without_links(mut self, links: &[String]) -> Self {
        self.joints.retain(|_, b| !links.contains(&b.link));
        self
    }
}

//endregion

//region Odometry

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmoothingConfig {
    /// Fraction of the remaining distance covered per second.
    pub position_rate: f32,
    pub rotation_rate: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OdometryConfig {
    pub topic: String,
    /// The rig transform that represents the mobile base.
    pub base_link: String,
    /// Without smoothing, every pose is applied as it arrives.
    pub smoothing: Option<SmoothingConfig>,
}

impl Default for OdometryConfig {
    fn default() -> Self {
        OdometryConfig {
            topic: "/mobile_base_controller/odom".to_string(),
            base_link: "base_footprint".to_string(),
            smoothing: Some(SmoothingConfig {
                position_rate: 2.0,
                rotation_rate: 5.0,
            }),
        }
    }
}

impl OdometryConfig {
    pub fn validate(&self) -> Result<()> {
        if let Some(s) = &self.smoothing {
            non_negative("odometry.smoothing.position_rate", s.position_rate)?;
            non_negative("odometry.smoothing.rotation_rate", s.rotation_rate)?;
        }
        Ok(())
    }
}

//endregion

//region Arm

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IkConfig {
    /// Rig transforms from the first arm joint to the end-effector.
    pub chain: Vec<String>,
    /// The rig transform the end-effector should reach.
    pub target: String,
    pub iterations: usize,
}

impl Default for IkConfig {
    fn default() -> Self {
        IkConfig {
            chain: (1..=7)
                .map(|i| format!("arm_{}_link", i))
                .chain(std::iter::once("arm_tool_link".to_string()))
                .collect(),
            target: "hand_target".to_string(),
            iterations: 10,
        }
    }
}

impl IkConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chain.len() < 2 {
            return Err(TeleopError::ChainTooShort(self.chain.len()));
        }
        if self.iterations == 0 {
            return invalid("ik.iterations must be at least 1".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArmFollowerConfig {
    pub end_effector: String,
    pub target: String,
    /// Fraction of the remaining offset covered per second.
    pub follow_speed: f32,
}

impl Default for ArmFollowerConfig {
    fn default() -> Self {
        ArmFollowerConfig {
            end_effector: "gripper_link".to_string(),
            target: "right_controller".to_string(),
            follow_speed: 2.0,
        }
    }
}

//endregion

//region Publishers

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseBroadcastConfig {
    pub topic: String,
    /// The rig transform whose pose is broadcast, typically a tracked controller.
    pub tracked: String,
    pub frame_id: String,
    /// Seconds between messages.
    pub period: f32,
    /// Seconds before the first message.
    pub initial_delay: f32,
}

impl Default for PoseBroadcastConfig {
    fn default() -> Self {
        PoseBroadcastConfig {
            topic: "/vr_pose".to_string(),
            tracked: "right_controller".to_string(),
            frame_id: "world".to_string(),
            period: 0.02,
            initial_delay: 1.0,
        }
    }
}

impl PoseBroadcastConfig {
    pub fn validate(&self) -> Result<()> {
        positive("pose_broadcast.period", self.period)?;
        non_negative("pose_broadcast.initial_delay", self.initial_delay)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TorsoConfig {
    pub topic: String,
    pub period: f32,
    /// Height commanded while the trigger is held.
    pub raised_height: f32,
    pub max_height: f32,
}

impl Default for TorsoConfig {
    fn default() -> Self {
        TorsoConfig {
            topic: "/torso_tp_controller/command".to_string(),
            period: 0.02,
            raised_height: 0.35,
            max_height: 0.35,
        }
    }
}

impl TorsoConfig {
    pub fn validate(&self) -> Result<()> {
        positive("torso.period", self.period)?;
        non_negative("torso.max_height", self.max_height)
    }
}

//endregion

//region Setup

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointAngle {
    pub name: String,
    pub degrees: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HomePoseConfig {
    pub axis: [f32; 3],
    /// Apply `-degrees` rather than `degrees`, for rigs whose joints turn the other way.
    pub invert: bool,
    pub joints: Vec<JointAngle>,
}

impl Default for HomePoseConfig {
    fn default() -> Self {
        let joints = [
            ("torso_lift_link", 0.0),
            ("arm_1_link", -20.0),
            ("arm_2_link", 200.0),
            ("arm_3_link", -70.0),
            ("arm_4_link", -200.0),
            ("arm_5_link", 90.0),
            ("arm_6_link", -80.0),
            ("arm_7_link", 0.0),
            ("head_1_link", 0.0),
            ("head_2_link", 0.0),
        ]
        .iter()
        .map(|(name, degrees)| JointAngle {
            name: name.to_string(),
            degrees: *degrees,
        })
        .collect();

        HomePoseConfig {
            axis: RIGHT,
            invert: true,
            joints,
        }
    }
}

impl HomePoseConfig {
    pub fn validate(&self) -> Result<()> {
        unit_axis("home_pose", self.axis).map(|_| ())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SuspensionConfig {
    /// Root of the subtree whose bodies are suspended.
    pub root: String,
    pub policy: SuspensionPolicy,
    /// Under the global pause policy, also set the world's gravity to zero.
    pub zero_gravity_on_pause: bool,
    pub neutralize: NeutralizeSettings,
}

impl Default for SuspensionConfig {
    fn default() -> Self {
        SuspensionConfig {
            root: "base_footprint".to_string(),
            policy: SuspensionPolicy::default(),
            zero_gravity_on_pause: true,
            neutralize: NeutralizeSettings::default(),
        }
    }
}

//endregion

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        TeleopConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = TeleopConfig::from_toml_str(
            r#"
            [push]
            velocity_scale = 0.8

            [suspension]
            policy = "global_pause"

            [joint_state.joints.wrist]
            link = "wrist_link"
            axis = [0.0, 0.0, 2.0]
            kind = "revolute"
            "#,
        )
        .unwrap();

        assert_eq!(config.push.velocity_scale, 0.8);
        assert_eq!(config.push.decay_time, 1.0);
        assert_eq!(config.suspension.policy, SuspensionPolicy::GlobalPause);
        assert_eq!(config.joint_state.joints["wrist"].link, "wrist_link");
        // Giving a table replaces the default table as a whole.
        assert_eq!(config.joint_state.joints.len(), 1);
        assert_eq!(config.ik.iterations, 10);
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(matches!(
            TeleopConfig::from_toml_str("[push]\ndecay_time = 0.0\n"),
            Err(TeleopError::InvalidConfig(_))
        ));
        assert!(matches!(
            TeleopConfig::from_toml_str("[ik]\nchain = [\"only\"]\n"),
            Err(TeleopError::ChainTooShort(1))
        ));
        assert!(matches!(
            TeleopConfig::from_toml_str(
                "[joint_state.joints.j]\nlink = \"l\"\naxis = [0.0, 0.0, 0.0]\nkind = \"prismatic\"\n"
            ),
            Err(TeleopError::InvalidConfig(_))
        ));
        assert!(matches!(
            TeleopConfig::from_toml_str("[push]\ndecay_time = \"soon\"\n"),
            Err(TeleopError::Toml(_))
        ));
    }

    #[test]
    fn links_owned_elsewhere_can_be_dropped() {
        let config = JointStateConfig::default().without_links(&["arm_1_link".to_string()]);
        assert!(!config.joints.contains_key("arm_1_joint"));
        assert!(config.joints.contains_key("arm_2_joint"));
    }
}
