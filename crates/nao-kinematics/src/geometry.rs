//! Geometry engine.
//!
//! Two conversions, both relative to a body landmark:
//!
//! * [`scale_to_arm_length`] – project the target onto the sphere the arm can
//!   reach from its shoulder, so the hand ends up on the line from the
//!   shoulder towards the target.
//! * [`head_angles_for`] – pitch and yaw that aim the head at the target.
//!
//! A target that coincides with the landmark has no direction.  Both
//! functions report that as [`NaoError::DegenerateGeometry`] instead of
//! letting a NaN reach the actuators.
//!
//! # Example
//!
//! ```rust
//! use nao_kinematics::{BodyModel, scale_to_arm_length};
//! use nao_types::{Limb, Vector3};
//!
//! let body = BodyModel::NAO;
//! let shoulder = body.shoulder(Limb::LeftArm);
//! let target = scale_to_arm_length(Vector3::new(1.0, 0.09, 0.106), shoulder, body.arm_length)
//!     .unwrap();
//! assert!((target.position().x - 0.22).abs() < 1e-9);
//! ```

use nao_types::{MotionTarget, NaoError, Vector3};

/// Head orientation in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadAngles {
    /// Positive pitches the head down.  Range `[-π/2, π/2]`.
    pub pitch: f64,
    /// Positive yaws the head to the robot's left.  Range `[-π, π]`.
    pub yaw: f64,
}

impl HeadAngles {
    /// Looking straight ahead.
    pub const NEUTRAL: Self = Self {
        pitch: 0.0,
        yaw: 0.0,
    };
}

/// Unit vector from `origin` to `target`.
fn direction(target: Vector3, origin: Vector3) -> Result<Vector3, NaoError> {
    let delta = target - origin;
    let magnitude = delta.magnitude();
    if !magnitude.is_finite() {
        return Err(NaoError::InvalidArgument(format!(
            "target {target} is not a finite point"
        )));
    }
    if magnitude == 0.0 {
        return Err(NaoError::DegenerateGeometry(format!(
            "target {target} coincides with reference offset {origin}"
        )));
    }
    Ok(delta * (1.0 / magnitude))
}

/// Scale the shoulder→target vector to `arm_length` and express it back in
/// the torso frame, with zeroed orientation components.
///
/// # Errors
///
/// * [`NaoError::DegenerateGeometry`] when `target == shoulder`.
/// * [`NaoError::InvalidArgument`] when `arm_length` is not a positive finite
///   number or the target is not finite.
pub fn scale_to_arm_length(
    target: Vector3,
    shoulder: Vector3,
    arm_length: f64,
) -> Result<MotionTarget, NaoError> {
    if !(arm_length.is_finite() && arm_length > 0.0) {
        return Err(NaoError::InvalidArgument(format!(
            "arm length must be positive, got {arm_length}"
        )));
    }
    let unit = direction(target, shoulder)?;
    Ok(MotionTarget::from_position(shoulder + unit * arm_length))
}

/// Pitch and yaw that point the head from `head` towards `target`.
///
/// `pitch = -asin(u.z)` and `yaw = acos(u.x)`, negated when `u.y < 0`,
/// where `u` is the unit head→target vector.
///
/// # Errors
///
/// [`NaoError::DegenerateGeometry`] when `target == head`.
pub fn head_angles_for(target: Vector3, head: Vector3) -> Result<HeadAngles, NaoError> {
    let unit = direction(target, head)?;
    // Rounding can push a normalised component a hair past ±1.
    let pitch = -unit.z.clamp(-1.0, 1.0).asin();
    let mut yaw = unit.x.clamp(-1.0, 1.0).acos();
    if unit.y < 0.0 {
        yaw = -yaw;
    }
    Ok(HeadAngles { pitch, yaw })
}
