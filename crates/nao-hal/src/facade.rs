//! [`ActuatorFacade`] – the single owner of the robot's endpoint handles.
//!
//! The facade holds one long-lived handle per endpoint (motion, posture,
//! vision), keyed by the robot's [`RobotAddress`].  Handles are created on
//! first use through a [`Connector`]; a connection failure surfaces as
//! [`NaoError::ActuatorUnreachable`] and it is up to the caller to abort.
//!
//! The facade also owns the two pieces of mutable robot state the stack
//! tracks: the commanded compliance (stiffness) and the active vision
//! subscription.  Every mutating method takes `&mut self`, so a facade shared
//! between tasks has to sit behind a lock.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use nao_types::{AXIS_MASK_POSITION, Frame, ImageFrame, Limb, MotionTarget, NaoError};
use tracing::{debug, info, warn};

use crate::actuator::{BODY, HEAD_PITCH, HEAD_YAW, MotionProxy, PostureProxy};
use crate::camera::{VideoProxy, VisionSpec, VisionSubscription};

/// Default robot port.
pub const DEFAULT_PORT: u16 = 9559;
/// Speed fraction for head-angle commands.
pub const HEAD_SPEED_FRACTION: f64 = 0.1;
/// Speed fraction for Cartesian arm commands.
pub const ARM_SPEED_FRACTION: f64 = 0.9;
/// Interpolation window for compliance changes, in seconds.
pub const COMPLIANCE_RAMP_SECONDS: f64 = 1.0;

/// Network address of the robot's endpoint broker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RobotAddress {
    pub host: String,
    pub port: u16,
}

impl RobotAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl Default for RobotAddress {
    fn default() -> Self {
        Self::new("127.0.0.1", DEFAULT_PORT)
    }
}

impl fmt::Display for RobotAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Creates endpoint handles for a robot address.
///
/// Implementations: [`SimConnector`][crate::sim::SimConnector] and
/// [`BridgeConnector`][crate::bridge::BridgeConnector].
#[async_trait]
pub trait Connector: Send + Sync {
    async fn motion(&self, address: &RobotAddress) -> Result<Box<dyn MotionProxy>, NaoError>;

    async fn posture(&self, address: &RobotAddress) -> Result<Box<dyn PostureProxy>, NaoError>;

    async fn video(&self, address: &RobotAddress) -> Result<Box<dyn VideoProxy>, NaoError>;
}

/// Lazily-connected handles plus compliance and vision state.
pub struct ActuatorFacade {
    address: RobotAddress,
    connector: Arc<dyn Connector>,
    vision_spec: VisionSpec,
    motion: Option<Box<dyn MotionProxy>>,
    posture: Option<Box<dyn PostureProxy>>,
    video: Option<Box<dyn VideoProxy>>,
    compliance: f64,
    subscription: Option<VisionSubscription>,
}

impl ActuatorFacade {
    /// Create a facade without touching the network.  Handles are opened on
    /// first use.
    pub fn new(connector: Arc<dyn Connector>, address: RobotAddress) -> Self {
        Self {
            address,
            connector,
            vision_spec: VisionSpec::default(),
            motion: None,
            posture: None,
            video: None,
            compliance: 0.0,
            subscription: None,
        }
    }

    /// Create a facade and open the motion and posture handles right away.
    ///
    /// # Errors
    ///
    /// [`NaoError::ActuatorUnreachable`] if either endpoint cannot be reached.
    pub async fn connect(
        connector: Arc<dyn Connector>,
        address: RobotAddress,
    ) -> Result<Self, NaoError> {
        let mut facade = Self::new(connector, address);
        facade.motion().await?;
        facade.posture().await?;
        Ok(facade)
    }

    pub fn address(&self) -> &RobotAddress {
        &self.address
    }

    // ── Endpoint accessors ───────────────────────────────────────────────────

    async fn motion(&mut self) -> Result<&dyn MotionProxy, NaoError> {
        let proxy = match self.motion.take() {
            Some(p) => p,
            None => {
                let p = self.connector.motion(&self.address).await?;
                info!(address = %self.address, "motion endpoint connected");
                p
            }
        };
        Ok(&**self.motion.insert(proxy))
    }

    async fn posture(&mut self) -> Result<&dyn PostureProxy, NaoError> {
        let proxy = match self.posture.take() {
            Some(p) => p,
            None => {
                let p = self.connector.posture(&self.address).await?;
                info!(address = %self.address, "posture endpoint connected");
                p
            }
        };
        Ok(&**self.posture.insert(proxy))
    }

    async fn video(&mut self) -> Result<&dyn VideoProxy, NaoError> {
        let proxy = match self.video.take() {
            Some(p) => p,
            None => {
                let p = self.connector.video(&self.address).await?;
                info!(address = %self.address, "vision endpoint connected");
                p
            }
        };
        Ok(&**self.video.insert(proxy))
    }

    // ── Compliance ───────────────────────────────────────────────────────────

    /// Last commanded compliance, always within `[0, 1]`.
    pub fn compliance(&self) -> f64 {
        self.compliance
    }

    /// Clamp `value` to `[0, 1]`, ramp the whole body to it over
    /// [`COMPLIANCE_RAMP_SECONDS`], and record it.  Returns the clamped value.
    ///
    /// # Errors
    ///
    /// [`NaoError::InvalidArgument`] for NaN; otherwise whatever the motion
    /// endpoint reports.  The stored value only changes on success.
    pub async fn set_compliance(&mut self, value: f64) -> Result<f64, NaoError> {
        if value.is_nan() {
            return Err(NaoError::InvalidArgument("compliance must be a number".into()));
        }
        let clamped = value.clamp(0.0, 1.0);
        self.motion()
            .await?
            .stiffness_interpolation(BODY, clamped, COMPLIANCE_RAMP_SECONDS)
            .await?;
        self.compliance = clamped;
        debug!(requested = value, compliance = clamped, "compliance updated");
        Ok(clamped)
    }

    // ── Motion ───────────────────────────────────────────────────────────────

    /// Command head pitch/yaw, then hold for `hold`.
    pub async fn move_head(&mut self, pitch: f64, yaw: f64, hold: Duration) -> Result<(), NaoError> {
        self.motion()
            .await?
            .set_angles(&[HEAD_PITCH, HEAD_YAW], &[pitch, yaw], HEAD_SPEED_FRACTION)
            .await?;
        tokio::time::sleep(hold).await;
        Ok(())
    }

    /// Send `limb` to a torso-frame Cartesian target (position only), then
    /// hold for `hold`.
    pub async fn move_position(
        &mut self,
        limb: Limb,
        target: &MotionTarget,
        hold: Duration,
    ) -> Result<(), NaoError> {
        self.motion()
            .await?
            .set_position(
                limb.chain(),
                Frame::Torso,
                target,
                ARM_SPEED_FRACTION,
                AXIS_MASK_POSITION,
            )
            .await?;
        tokio::time::sleep(hold).await;
        Ok(())
    }

    pub async fn open_hand(&mut self, limb: Limb) -> Result<(), NaoError> {
        self.motion().await?.open_hand(&limb.hand()).await
    }

    pub async fn close_hand(&mut self, limb: Limb) -> Result<(), NaoError> {
        self.motion().await?.close_hand(&limb.hand()).await
    }

    /// Current pose of `name` in the torso frame, read from the sensors.
    pub async fn get_position(&mut self, name: &str) -> Result<[f64; 6], NaoError> {
        self.motion().await?.get_position(name, Frame::Torso, true).await
    }

    // ── Posture ──────────────────────────────────────────────────────────────

    /// Transition to a named posture.  Returns `false` when the endpoint
    /// reports it could not get there.
    pub async fn go_to_posture(&mut self, posture: &str, speed_fraction: f64) -> Result<bool, NaoError> {
        let reached = self.posture().await?.go_to_posture(posture, speed_fraction).await?;
        if !reached {
            warn!(posture, "posture endpoint did not reach the requested posture");
        }
        Ok(reached)
    }

    // ── Vision ───────────────────────────────────────────────────────────────

    pub fn is_vision_active(&self) -> bool {
        self.subscription.is_some()
    }

    /// Select the configured camera and subscribe to its stream.  Calling it
    /// while a stream is active returns the existing handle.
    pub async fn start_vision(&mut self) -> Result<VisionSubscription, NaoError> {
        if let Some(active) = &self.subscription {
            debug!(subscription = active.as_str(), "vision already active");
            return Ok(active.clone());
        }
        let spec = self.vision_spec.clone();
        let video = self.video().await?;
        video.set_active_camera(spec.camera_id).await?;
        let handle = video
            .subscribe(&spec.client_name, spec.resolution, spec.color_space, spec.fps)
            .await?;
        info!(subscription = handle.as_str(), fps = spec.fps, "vision stream started");
        self.subscription = Some(handle.clone());
        Ok(handle)
    }

    /// Release the active stream.  A no-op when nothing is subscribed.
    pub async fn stop_vision(&mut self) -> Result<(), NaoError> {
        let Some(handle) = self.subscription.take() else {
            return Ok(());
        };
        self.video().await?.unsubscribe(&handle).await?;
        info!(subscription = handle.as_str(), "vision stream stopped");
        Ok(())
    }

    /// Latest frame of the active stream.
    ///
    /// # Errors
    ///
    /// [`NaoError::VisionInactive`] before [`start_vision`][Self::start_vision].
    pub async fn get_image(&mut self) -> Result<ImageFrame, NaoError> {
        let handle = self.subscription.clone().ok_or(NaoError::VisionInactive)?;
        self.video().await?.get_image_remote(&handle).await
    }
}
