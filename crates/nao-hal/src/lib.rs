//! `nao-hal` – Hardware Abstraction Layer for the NAO humanoid.
//!
//! The robot's actuator and sensor endpoints are external services.  This
//! crate puts capability traits in front of them and owns the connection
//! handles.
//!
//! # Modules
//!
//! - [`actuator`] – [`MotionProxy`][actuator::MotionProxy] and
//!   [`PostureProxy`][actuator::PostureProxy]: joint, Cartesian, hand and
//!   posture commands.
//! - [`camera`] – [`VideoProxy`][camera::VideoProxy] and the fixed
//!   [`VisionSpec`][camera::VisionSpec] stream format.
//! - [`facade`] – [`ActuatorFacade`][facade::ActuatorFacade]: lazily-created
//!   endpoint handles plus compliance and vision-subscription state.
//! - [`sim`] – [`SimConnector`][sim::SimConnector]: recording drivers for
//!   headless tests and `--sim` runs.
//! - [`bridge`] – [`BridgeConnector`][bridge::BridgeConnector]: JSON over
//!   WebSocket driver for a physical robot.

pub mod actuator;
pub mod bridge;
pub mod camera;
pub mod facade;
pub mod sim;

pub use actuator::{MotionProxy, PostureProxy};
pub use bridge::BridgeConnector;
pub use camera::{ColorSpace, Resolution, VideoProxy, VisionSpec, VisionSubscription};
pub use facade::{ActuatorFacade, Connector, RobotAddress};
pub use sim::{ActuatorCall, SimConnector};
