//! In-process simulated robot for tests and `--sim` runs.
//!
//! [`SimConnector`] hands out motion, posture and vision drivers that share a
//! single call log.  Every command is recorded as an [`ActuatorCall`] so tests
//! can assert on the exact sequence the session issued.  Failures can be
//! injected per method name (the endpoint's camelCase spelling) or for the
//! whole robot.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use nao_hal::facade::{ActuatorFacade, RobotAddress};
//! use nao_hal::sim::{ActuatorCall, SimConnector};
//! use nao_types::Limb;
//!
//! # tokio_test_block(async {
//! let sim = SimConnector::new();
//! let mut facade = ActuatorFacade::new(Arc::new(sim.clone()), RobotAddress::default());
//! facade.open_hand(Limb::LeftArm).await.unwrap();
//! assert_eq!(sim.calls(), vec![ActuatorCall::OpenHand("LHand".into())]);
//! # });
//! # fn tokio_test_block(f: impl std::future::Future<Output = ()>) {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
//! # }
//! ```

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use nao_types::{Frame, ImageFrame, MotionTarget, NaoError};

use crate::actuator::{MotionProxy, PostureProxy};
use crate::camera::{ColorSpace, Resolution, VideoProxy, VisionSubscription};
use crate::facade::{Connector, RobotAddress};

// ────────────────────────────────────────────────────────────────────────────
// Call log
// ────────────────────────────────────────────────────────────────────────────

/// One recorded endpoint call.
#[derive(Debug, Clone, PartialEq)]
pub enum ActuatorCall {
    StiffnessInterpolation {
        names: String,
        stiffness: f64,
        duration_s: f64,
    },
    SetAngles {
        names: Vec<String>,
        angles: Vec<f64>,
        speed_fraction: f64,
    },
    SetPosition {
        chain: String,
        frame: Frame,
        target: MotionTarget,
        speed_fraction: f64,
        axis_mask: u8,
    },
    OpenHand(String),
    CloseHand(String),
    GetPosition {
        name: String,
        frame: Frame,
        use_sensor_values: bool,
    },
    GoToPosture {
        posture: String,
        speed_fraction: f64,
    },
    SetActiveCamera(u8),
    Subscribe {
        client_name: String,
        resolution: Resolution,
        color_space: ColorSpace,
        fps: u32,
    },
    Unsubscribe(String),
    GetImage(String),
}

#[derive(Default)]
struct SimState {
    unreachable: bool,
    calls: Mutex<Vec<ActuatorCall>>,
    connections: Mutex<Vec<&'static str>>,
    failing: Mutex<HashSet<String>>,
    subscriptions: Mutex<HashSet<String>>,
    frames: AtomicU64,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SimState {
    /// Record `call`, or fail it if `method` has been marked as failing.
    fn record(&self, endpoint: &str, method: &str, call: ActuatorCall) -> Result<(), NaoError> {
        if lock(&self.failing).contains(method) {
            return Err(NaoError::ActuatorFault {
                endpoint: endpoint.to_string(),
                details: format!("simulated failure in {method}"),
            });
        }
        lock(&self.calls).push(call);
        Ok(())
    }

    fn connect(&self, endpoint: &'static str, address: &RobotAddress) -> Result<(), NaoError> {
        if self.unreachable {
            return Err(NaoError::ActuatorUnreachable {
                endpoint: endpoint.to_string(),
                address: address.to_string(),
                details: "simulated robot is offline".to_string(),
            });
        }
        lock(&self.connections).push(endpoint);
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Connector
// ────────────────────────────────────────────────────────────────────────────

/// Connector for the simulated robot.  Clones share the same log.
#[derive(Clone, Default)]
pub struct SimConnector {
    state: Arc<SimState>,
}

impl SimConnector {
    /// A reachable robot that accepts every command.
    pub fn new() -> Self {
        Self::default()
    }

    /// A robot whose endpoints all refuse connections.
    pub fn unreachable() -> Self {
        Self {
            state: Arc::new(SimState {
                unreachable: true,
                ..SimState::default()
            }),
        }
    }

    /// Make every subsequent call to `method` fail with
    /// [`NaoError::ActuatorFault`].
    pub fn fail_on(&self, method: &str) {
        lock(&self.state.failing).insert(method.to_string());
    }

    /// Undo [`fail_on`][Self::fail_on].
    pub fn recover(&self, method: &str) {
        lock(&self.state.failing).remove(method);
    }

    /// Snapshot of every successful call so far, in order.
    pub fn calls(&self) -> Vec<ActuatorCall> {
        lock(&self.state.calls).clone()
    }

    pub fn clear_calls(&self) {
        lock(&self.state.calls).clear();
    }

    /// Endpoint names in the order their handles were created.
    pub fn connections(&self) -> Vec<&'static str> {
        lock(&self.state.connections).clone()
    }

    /// Number of frames served so far.
    pub fn frames_served(&self) -> u64 {
        self.state.frames.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Connector for SimConnector {
    async fn motion(&self, address: &RobotAddress) -> Result<Box<dyn MotionProxy>, NaoError> {
        self.state.connect("ALMotion", address)?;
        Ok(Box::new(SimMotion {
            state: Arc::clone(&self.state),
        }))
    }

    async fn posture(&self, address: &RobotAddress) -> Result<Box<dyn PostureProxy>, NaoError> {
        self.state.connect("ALRobotPosture", address)?;
        Ok(Box::new(SimPosture {
            state: Arc::clone(&self.state),
        }))
    }

    async fn video(&self, address: &RobotAddress) -> Result<Box<dyn VideoProxy>, NaoError> {
        self.state.connect("ALVideoDevice", address)?;
        Ok(Box::new(SimVideo {
            state: Arc::clone(&self.state),
        }))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Drivers
// ────────────────────────────────────────────────────────────────────────────

/// Simulated motion endpoint.
pub struct SimMotion {
    state: Arc<SimState>,
}

#[async_trait]
impl MotionProxy for SimMotion {
    async fn stiffness_interpolation(
        &self,
        names: &str,
        stiffness: f64,
        duration_s: f64,
    ) -> Result<(), NaoError> {
        self.state.record(
            "ALMotion",
            "stiffnessInterpolation",
            ActuatorCall::StiffnessInterpolation {
                names: names.to_string(),
                stiffness,
                duration_s,
            },
        )
    }

    async fn set_angles(
        &self,
        names: &[&str],
        angles: &[f64],
        speed_fraction: f64,
    ) -> Result<(), NaoError> {
        self.state.record(
            "ALMotion",
            "setAngles",
            ActuatorCall::SetAngles {
                names: names.iter().map(|n| n.to_string()).collect(),
                angles: angles.to_vec(),
                speed_fraction,
            },
        )
    }

    async fn set_position(
        &self,
        chain: &str,
        frame: Frame,
        target: &MotionTarget,
        speed_fraction: f64,
        axis_mask: u8,
    ) -> Result<(), NaoError> {
        self.state.record(
            "ALMotion",
            "setPosition",
            ActuatorCall::SetPosition {
                chain: chain.to_string(),
                frame,
                target: *target,
                speed_fraction,
                axis_mask,
            },
        )
    }

    async fn open_hand(&self, hand: &str) -> Result<(), NaoError> {
        self.state
            .record("ALMotion", "openHand", ActuatorCall::OpenHand(hand.to_string()))
    }

    async fn close_hand(&self, hand: &str) -> Result<(), NaoError> {
        self.state
            .record("ALMotion", "closeHand", ActuatorCall::CloseHand(hand.to_string()))
    }

    async fn get_position(
        &self,
        name: &str,
        frame: Frame,
        use_sensor_values: bool,
    ) -> Result<[f64; 6], NaoError> {
        self.state.record(
            "ALMotion",
            "getPosition",
            ActuatorCall::GetPosition {
                name: name.to_string(),
                frame,
                use_sensor_values,
            },
        )?;
        Ok([0.0; 6])
    }
}

/// Simulated posture endpoint.  Every posture is reachable.
pub struct SimPosture {
    state: Arc<SimState>,
}

#[async_trait]
impl PostureProxy for SimPosture {
    async fn go_to_posture(&self, posture: &str, speed_fraction: f64) -> Result<bool, NaoError> {
        self.state.record(
            "ALRobotPosture",
            "goToPosture",
            ActuatorCall::GoToPosture {
                posture: posture.to_string(),
                speed_fraction,
            },
        )?;
        Ok(true)
    }
}

/// Simulated camera.  Serves a moving gradient of the subscribed size.
pub struct SimVideo {
    state: Arc<SimState>,
}

#[async_trait]
impl VideoProxy for SimVideo {
    async fn set_active_camera(&self, camera_id: u8) -> Result<(), NaoError> {
        self.state.record(
            "ALVideoDevice",
            "setActiveCamera",
            ActuatorCall::SetActiveCamera(camera_id),
        )
    }

    async fn subscribe(
        &self,
        client_name: &str,
        resolution: Resolution,
        color_space: ColorSpace,
        fps: u32,
    ) -> Result<VisionSubscription, NaoError> {
        self.state.record(
            "ALVideoDevice",
            "subscribe",
            ActuatorCall::Subscribe {
                client_name: client_name.to_string(),
                resolution,
                color_space,
                fps,
            },
        )?;
        // Encode the stream shape in the handle so frames can be sized later.
        let handle = format!(
            "{client_name}_{}_{}",
            resolution as u8, color_space as u8
        );
        lock(&self.state.subscriptions).insert(handle.clone());
        Ok(VisionSubscription(handle))
    }

    async fn unsubscribe(&self, subscription: &VisionSubscription) -> Result<(), NaoError> {
        self.state.record(
            "ALVideoDevice",
            "unsubscribe",
            ActuatorCall::Unsubscribe(subscription.0.clone()),
        )?;
        lock(&self.state.subscriptions).remove(subscription.as_str());
        Ok(())
    }

    async fn get_image_remote(
        &self,
        subscription: &VisionSubscription,
    ) -> Result<ImageFrame, NaoError> {
        if !lock(&self.state.subscriptions).contains(subscription.as_str()) {
            return Err(NaoError::ActuatorFault {
                endpoint: "ALVideoDevice".to_string(),
                details: format!("unknown subscription '{}'", subscription.as_str()),
            });
        }
        self.state.record(
            "ALVideoDevice",
            "getImageRemote",
            ActuatorCall::GetImage(subscription.0.clone()),
        )?;

        let (resolution, color_space) = parse_handle(subscription.as_str());
        let (width, height) = resolution.dimensions();
        let channels = color_space.channels();
        let tick = self.state.frames.fetch_add(1, Ordering::Relaxed);
        let data = (0..(width * height * channels) as u64)
            .map(|i| ((i + tick) % 256) as u8)
            .collect();
        Ok(ImageFrame {
            width,
            height,
            channels,
            captured_at: Utc::now(),
            data,
        })
    }
}

fn parse_handle(handle: &str) -> (Resolution, ColorSpace) {
    let mut parts = handle.rsplit('_');
    let color_space = match parts.next() {
        Some("9") => ColorSpace::Yuv422,
        Some("13") => ColorSpace::Bgr,
        _ => ColorSpace::Rgb,
    };
    let resolution = match parts.next() {
        Some("0") => Resolution::Qqvga,
        Some("2") => Resolution::Vga,
        _ => Resolution::Qvga,
    };
    (resolution, color_space)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
