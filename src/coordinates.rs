//! Conversion between the robot's coordinate convention and the engine's.
//!
//! The robot side is right-handed with x forward, y left and z up. The engine side is left-handed
//! with x right, y up and z forward. Positions (and any other polar vector) map through the
//! permutation-with-sign matrix
//!
//! ```text
//!           | 0 -1  0 |
//! engine =  | 0  0  1 | * robot
//!           | 1  0  0 |
//! ```
//!
//! which has determinant -1. A rotation of angle θ about axis `a` therefore becomes a rotation of
//! angle θ about `-P a`, so a quaternion `(x, y, z, w)` maps to `(-y, z, x, -w)`: the vector part
//! goes through `P` and the scalar part flips sign, which is the same rotation as negating the
//! vector part alone.
//!
//! Every conversion into the engine has an exact inverse here, so a round trip returns the input.

use na::{Point3, Quaternion, UnitQuaternion, Vector3};

use crate::messages::{Point, Pose, QuaternionMsg};

/// Map a vector from robot to engine coordinates.
pub fn vector_to_engine(v: &Vector3<f32>) -> Vector3<f32> {
    Vector3::new(-v.y, v.z, v.x)
}

/// Map a vector from engine to robot coordinates.
pub fn vector_to_robot(v: &Vector3<f32>) -> Vector3<f32> {
    Vector3::new(v.z, -v.x, v.y)
}

/// Map a quaternion from robot to engine coordinates, without renormalizing it.
pub fn quaternion_to_engine(q: &Quaternion<f32>) -> Quaternion<f32> {
    // Quaternion::new takes the scalar part first.
    Quaternion::new(-q.w, -q.j, q.k, q.i)
}

/// Map a quaternion from engine to robot coordinates, without renormalizing it.
pub fn quaternion_to_robot(q: &Quaternion<f32>) -> Quaternion<f32> {
    Quaternion::new(-q.w, q.k, -q.i, q.j)
}

/// A pose in engine coordinates, as applied to a rig transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnginePose {
    pub position: Point3<f32>,
    pub rotation: UnitQuaternion<f32>,
}

impl EnginePose {
    pub fn identity() -> Self {
        EnginePose {
            position: Point3::origin(),
            rotation: UnitQuaternion::identity(),
        }
    }
}

/// Convert a pose message (robot convention, f64) into an engine pose.
///
/// A zero quaternion, which some publishers send before they have a fix, becomes identity.
pub fn pose_to_engine(pose: &Pose) -> EnginePose {
    let p = &pose.position;
    let position = vector_to_engine(&Vector3::new(p.x as f32, p.y as f32, p.z as f32));

    let o = &pose.orientation;
    let q = quaternion_to_engine(&Quaternion::new(
        o.w as f32, o.x as f32, o.y as f32, o.z as f32,
    ));

    let rotation = if q.norm_squared() > f32::EPSILON {
        UnitQuaternion::from_quaternion(q)
    } else {
        UnitQuaternion::identity()
    };

    EnginePose {
        position: Point3::from(position),
        rotation,
    }
}

/// Convert an engine pose back into a pose message in the robot convention.
pub fn pose_to_robot(pose: &EnginePose) -> Pose {
    let p = vector_to_robot(&pose.position.coords);
    let q = quaternion_to_robot(pose.rotation.quaternion());

    Pose {
        position: Point {
            x: p.x as f64,
            y: p.y as f64,
            z: p.z as f64,
        },
        orientation: QuaternionMsg {
            x: q.i as f64,
            y: q.j as f64,
            z: q.k as f64,
            w: q.w as f64,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn random_vector<R: Rng>(rng: &mut R) -> Vector3<f32> {
        Vector3::new(
            rng.gen_range(-10.0..10.0),
            rng.gen_range(-10.0..10.0),
            rng.gen_range(-10.0..10.0),
        )
    }

    fn random_rotation<R: Rng>(rng: &mut R) -> UnitQuaternion<f32> {
        UnitQuaternion::from_euler_angles(
            rng.gen_range(-3.0..3.0),
            rng.gen_range(-1.5..1.5),
            rng.gen_range(-3.0..3.0),
        )
    }

    #[test]
    fn forward_maps_to_engine_forward() {
        let forward = vector_to_engine(&Vector3::x());
        assert_eq!(forward, Vector3::z());

        let left = vector_to_engine(&Vector3::y());
        assert_eq!(left, -Vector3::x());

        let up = vector_to_engine(&Vector3::z());
        assert_eq!(up, Vector3::y());
    }

    #[test]
    fn round_trip_is_exact() {
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let v = random_vector(&mut rng);
            assert!((vector_to_robot(&vector_to_engine(&v)) - v).norm() < 1e-6);

            let q = *random_rotation(&mut rng).quaternion();
            let back = quaternion_to_robot(&quaternion_to_engine(&q));
            assert!((back.coords - q.coords).norm() < 1e-6);
        }
    }

    #[test]
    fn pose_round_trip() {
        let pose = Pose {
            position: Point {
                x: 1.5,
                y: -0.25,
                z: 0.1,
            },
            orientation: QuaternionMsg {
                x: 0.0,
                y: 0.0,
                z: (0.35f64).sin(),
                w: (0.35f64).cos(),
            },
        };

        let back = pose_to_robot(&pose_to_engine(&pose));
        assert!((back.position.x - 1.5).abs() < 1e-5);
        assert!((back.position.y + 0.25).abs() < 1e-5);
        assert!((back.position.z - 0.1).abs() < 1e-5);

        // Equal up to the sign ambiguity of quaternions.
        let same = (back.orientation.z - pose.orientation.z).abs() < 1e-5
            && (back.orientation.w - pose.orientation.w).abs() < 1e-5;
        let negated = (back.orientation.z + pose.orientation.z).abs() < 1e-5
            && (back.orientation.w + pose.orientation.w).abs() < 1e-5;
        assert!(same || negated);
    }

    #[test]
    fn remapped_rotation_acts_like_the_source_rotation() {
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let r = random_rotation(&mut rng);
            let v = random_vector(&mut rng);

            let engine_rotation =
                UnitQuaternion::from_quaternion(quaternion_to_engine(r.quaternion()));

            let rotate_then_map = vector_to_engine(&(r * v));
            let map_then_rotate = engine_rotation * vector_to_engine(&v);

            assert!((rotate_then_map - map_then_rotate).norm() < 1e-4);
        }
    }

    #[test]
    fn yaw_left_turns_engine_heading_left() {
        // A quarter turn to the left about the robot's up axis.
        let yaw = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), std::f32::consts::FRAC_PI_2);
        let engine = UnitQuaternion::from_quaternion(quaternion_to_engine(yaw.quaternion()));

        let heading = engine * Vector3::z();
        assert!((heading - (-Vector3::x())).norm() < 1e-5);
    }

    #[test]
    fn zero_orientation_becomes_identity() {
        let pose = Pose {
            position: Point::default(),
            orientation: QuaternionMsg {
                x: 0.0,
                y: 0.0,
                z: 0.0,
                w: 0.0,
            },
        };
        assert_eq!(pose_to_engine(&pose).rotation, UnitQuaternion::identity());
    }
}
