//! [`RobotSession`] – robot-level operations built on the geometry engine and
//! the actuator facade.
//!
//! A session is created already initialised: compliance is set and the robot
//! is sent to its rest posture before [`RobotSession::new`] returns.  Failing
//! either step fails construction, which callers treat as fatal.
//!
//! Multi-step operations are not atomic.  If `point` fails after the arm has
//! moved, the arm stays where it is and the error is returned as-is.

use std::time::Duration;

use async_trait::async_trait;
use nao_hal::camera::VisionSubscription;
use nao_hal::facade::ActuatorFacade;
use nao_kinematics::{BodyModel, HeadAngles, head_angles_for, scale_to_arm_length};
use nao_types::{ImageFrame, Limb, NaoError, Vector3};
use tracing::{info, instrument};

/// Timing and posture data for a session.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionProfile {
    /// Compliance commanded when the session starts.
    pub initial_compliance: f64,
    /// Posture the robot returns to after pointing, and at start-up.
    pub rest_posture: String,
    /// Speed fraction for posture transitions.
    pub posture_speed: f64,
    /// Pause after the arm reaches its pointing target.
    pub point_hold: Duration,
    /// Pause after each head movement.
    pub look_hold: Duration,
}

impl Default for MotionProfile {
    fn default() -> Self {
        Self {
            initial_compliance: 0.6,
            rest_posture: "StandInit".to_string(),
            posture_speed: 0.2,
            point_hold: Duration::from_millis(100),
            look_hold: Duration::from_secs(2),
        }
    }
}

/// The operations the command dispatcher drives.
///
/// [`RobotSession`] is the real implementation; tests substitute recording
/// doubles.
#[async_trait]
pub trait RobotActions: Send {
    async fn point(&mut self, limb: Limb, target: Vector3) -> Result<(), NaoError>;

    async fn look(&mut self, target: Vector3) -> Result<(), NaoError>;

    async fn open_hand(&mut self, limb: Limb) -> Result<(), NaoError>;

    async fn close_hand(&mut self, limb: Limb) -> Result<(), NaoError>;

    /// Returns the value actually stored after clamping.
    async fn set_compliance(&mut self, value: f64) -> Result<f64, NaoError>;
}

/// One connected robot plus the rig and timing it is driven with.
pub struct RobotSession {
    facade: ActuatorFacade,
    body: BodyModel,
    profile: MotionProfile,
}

impl RobotSession {
    /// Set the initial compliance and go to the rest posture.
    ///
    /// # Errors
    ///
    /// Any actuator error from either step.  An unreachable endpoint surfaces
    /// as [`NaoError::ActuatorUnreachable`].
    #[instrument(skip_all, fields(robot = %facade.address()))]
    pub async fn new(
        mut facade: ActuatorFacade,
        body: BodyModel,
        profile: MotionProfile,
    ) -> Result<Self, NaoError> {
        facade.set_compliance(profile.initial_compliance).await?;
        facade
            .go_to_posture(&profile.rest_posture, profile.posture_speed)
            .await?;
        info!(
            compliance = facade.compliance(),
            posture = %profile.rest_posture,
            "robot session ready"
        );
        Ok(Self {
            facade,
            body,
            profile,
        })
    }

    pub fn body(&self) -> &BodyModel {
        &self.body
    }

    pub fn profile(&self) -> &MotionProfile {
        &self.profile
    }

    pub fn facade(&self) -> &ActuatorFacade {
        &self.facade
    }

    /// Stretch `limb` toward `target`, open the hand, then return to the
    /// rest posture.
    #[instrument(skip(self, target), fields(target = %target))]
    pub async fn point(&mut self, limb: Limb, target: Vector3) -> Result<(), NaoError> {
        let shoulder = self.body.shoulder(limb);
        let motion = scale_to_arm_length(target, shoulder, self.body.arm_length)?;
        self.facade
            .move_position(limb, &motion, self.profile.point_hold)
            .await?;
        self.facade.open_hand(limb).await?;
        self.facade
            .go_to_posture(&self.profile.rest_posture, self.profile.posture_speed)
            .await?;
        Ok(())
    }

    /// Turn the head toward `target`, hold, then return to neutral and hold.
    #[instrument(skip(self, target), fields(target = %target))]
    pub async fn look(&mut self, target: Vector3) -> Result<(), NaoError> {
        let angles = head_angles_for(target, self.body.head)?;
        self.facade
            .move_head(angles.pitch, angles.yaw, self.profile.look_hold)
            .await?;
        let neutral = HeadAngles::NEUTRAL;
        self.facade
            .move_head(neutral.pitch, neutral.yaw, self.profile.look_hold)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn open_hand(&mut self, limb: Limb) -> Result<(), NaoError> {
        self.facade.open_hand(limb).await
    }

    #[instrument(skip(self))]
    pub async fn close_hand(&mut self, limb: Limb) -> Result<(), NaoError> {
        self.facade.close_hand(limb).await
    }

    /// Transition to a named posture at `speed_fraction`.
    #[instrument(skip(self))]
    pub async fn go_to_posture(
        &mut self,
        posture: &str,
        speed_fraction: f64,
    ) -> Result<bool, NaoError> {
        self.facade.go_to_posture(posture, speed_fraction).await
    }

    pub fn compliance(&self) -> f64 {
        self.facade.compliance()
    }

    #[instrument(skip(self))]
    pub async fn set_compliance(&mut self, value: f64) -> Result<f64, NaoError> {
        self.facade.set_compliance(value).await
    }

    /// Pose of a joint or chain in the torso frame.
    pub async fn get_position(&mut self, name: &str) -> Result<[f64; 6], NaoError> {
        self.facade.get_position(name).await
    }

    pub async fn start_vision(&mut self) -> Result<VisionSubscription, NaoError> {
        self.facade.start_vision().await
    }

    pub async fn stop_vision(&mut self) -> Result<(), NaoError> {
        self.facade.stop_vision().await
    }

    pub async fn get_image(&mut self) -> Result<ImageFrame, NaoError> {
        self.facade.get_image().await
    }
}

#[async_trait]
impl RobotActions for RobotSession {
    async fn point(&mut self, limb: Limb, target: Vector3) -> Result<(), NaoError> {
        RobotSession::point(self, limb, target).await
    }

    async fn look(&mut self, target: Vector3) -> Result<(), NaoError> {
        RobotSession::look(self, target).await
    }

    async fn open_hand(&mut self, limb: Limb) -> Result<(), NaoError> {
        RobotSession::open_hand(self, limb).await
    }

    async fn close_hand(&mut self, limb: Limb) -> Result<(), NaoError> {
        RobotSession::close_hand(self, limb).await
    }

    async fn set_compliance(&mut self, value: f64) -> Result<f64, NaoError> {
        RobotSession::set_compliance(self, value).await
    }
}
