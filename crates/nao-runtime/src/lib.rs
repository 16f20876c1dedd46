//! `nao-runtime` – the control layer proper.
//!
//! Turns inbound commands into robot motion and runs the long-lived service
//! modules that host them.
//!
//! # Modules
//!
//! - [`session`] – [`RobotSession`][session::RobotSession]: `point`, `look`,
//!   hand and posture operations built on the geometry engine and the
//!   actuator facade, paced by a [`MotionProfile`][session::MotionProfile].
//! - [`command`] – [`Command`][command::Command]: the flat token grammar
//!   parsed once into a tagged union.
//! - [`dispatcher`] – [`CommandDispatcher`][dispatcher::CommandDispatcher]:
//!   one message in, one `ack`/`nack` out.  Per-command errors never escape.
//! - [`lifecycle`] – [`Lifecycle`][lifecycle::Lifecycle]: the
//!   unconfigured → configured → running → interrupted → closed state
//!   machine.
//! - [`module`] – [`ControllerModule`][module::ControllerModule] and
//!   [`VideoModule`][module::VideoModule], plus [`run_module`][module::run_module].
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: console logs
//!   and optional OTLP span export.

pub mod command;
pub mod dispatcher;
pub mod lifecycle;
pub mod module;
pub mod session;
pub mod telemetry;

pub use command::{Command, CommandError};
pub use dispatcher::CommandDispatcher;
pub use lifecycle::{Lifecycle, ModuleState};
pub use module::{ControllerModule, Endpoint, Module, ModuleConfig, VideoModule, run_module};
pub use session::{MotionProfile, RobotActions, RobotSession};
pub use telemetry::{TracerProviderGuard, init_tracing};
