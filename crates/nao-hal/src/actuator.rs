//! Capability traits for the robot's motion and posture endpoints.
//!
//! Drivers implement these traits and hand boxed instances to the
//! [`ActuatorFacade`][crate::facade::ActuatorFacade] through a
//! [`Connector`][crate::facade::Connector].  The rest of the stack only ever
//! talks to the traits, so the WebSocket bridge and the simulator are
//! interchangeable.

use async_trait::async_trait;
use nao_types::{Frame, MotionTarget, NaoError};

/// Joint-name group covering every joint of the robot.
pub const BODY: &str = "Body";
/// Head pitch joint.
pub const HEAD_PITCH: &str = "HeadPitch";
/// Head yaw joint.
pub const HEAD_YAW: &str = "HeadYaw";

/// The motion endpoint: joint angles, Cartesian targets, stiffness and hands.
#[async_trait]
pub trait MotionProxy: Send + Sync {
    /// Ramp the stiffness of `names` to `stiffness` over `duration_s` seconds.
    async fn stiffness_interpolation(
        &self,
        names: &str,
        stiffness: f64,
        duration_s: f64,
    ) -> Result<(), NaoError>;

    /// Non-blocking joint-angle command.  `speed_fraction` is a fraction of
    /// each joint's maximum speed.
    async fn set_angles(
        &self,
        names: &[&str],
        angles: &[f64],
        speed_fraction: f64,
    ) -> Result<(), NaoError>;

    /// Non-blocking Cartesian command for a kinematic chain.
    async fn set_position(
        &self,
        chain: &str,
        frame: Frame,
        target: &MotionTarget,
        speed_fraction: f64,
        axis_mask: u8,
    ) -> Result<(), NaoError>;

    async fn open_hand(&self, hand: &str) -> Result<(), NaoError>;

    async fn close_hand(&self, hand: &str) -> Result<(), NaoError>;

    /// Six-component pose of a joint or chain in `frame`.
    async fn get_position(
        &self,
        name: &str,
        frame: Frame,
        use_sensor_values: bool,
    ) -> Result<[f64; 6], NaoError>;
}

/// The posture endpoint: named whole-body configurations.
#[async_trait]
pub trait PostureProxy: Send + Sync {
    /// Move to the named posture at `speed_fraction`.  Returns `false` when
    /// the endpoint could not reach the posture.
    async fn go_to_posture(&self, posture: &str, speed_fraction: f64) -> Result<bool, NaoError>;
}
