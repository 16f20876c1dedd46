//! `nao-types` – shared value types for the NAO control stack.
//!
//! Everything that crosses a crate boundary lives here: the torso-frame
//! [`Vector3`], the [`Limb`] identifier, the 6-component [`MotionTarget`],
//! the RPC token messages, camera frames, and the workspace-wide
//! [`NaoError`].

pub mod message;

use std::fmt;
use std::ops::{Add, Mul, Sub};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use message::{CommandMessage, ReplyMessage, Token};

// ────────────────────────────────────────────────────────────────────────────
// Vector3
// ────────────────────────────────────────────────────────────────────────────

/// A point or direction in metres, expressed in the robot's torso frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean length.
    pub fn magnitude(self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Euclidean distance to `other`.
    pub fn distance(self, other: Self) -> f64 {
        (self - other).magnitude()
    }

    pub fn dot(self, rhs: Self) -> f64 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }
}

impl Add for Vector3 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vector3 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vector3 {
    type Output = Self;

    fn mul(self, k: f64) -> Self {
        Self::new(self.x * k, self.y * k, self.z * k)
    }
}

impl fmt::Display for Vector3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:.3}, {:.3}, {:.3}]", self.x, self.y, self.z)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Limb
// ────────────────────────────────────────────────────────────────────────────

/// One of the robot's two arms.
///
/// The actuator subsystem names kinematic chains and hands by the limb's
/// single-letter prefix: `LArm` / `LHand` and `RArm` / `RHand`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Limb {
    LeftArm,
    RightArm,
}

impl Limb {
    /// `'L'` or `'R'`.
    pub fn prefix(self) -> char {
        match self {
            Limb::LeftArm => 'L',
            Limb::RightArm => 'R',
        }
    }

    /// Kinematic chain name used for Cartesian commands, e.g. `"LArm"`.
    pub fn chain(self) -> &'static str {
        match self {
            Limb::LeftArm => "LArm",
            Limb::RightArm => "RArm",
        }
    }

    /// Hand actuator name, e.g. `"LHand"`.
    pub fn hand(self) -> String {
        format!("{}Hand", self.prefix())
    }

    /// Parse the RPC spelling (`"left"` / `"right"`).  Anything else is
    /// rejected; there is no case folding.
    pub fn from_command(word: &str) -> Option<Self> {
        match word {
            "left" => Some(Limb::LeftArm),
            "right" => Some(Limb::RightArm),
            _ => None,
        }
    }
}

impl fmt::Display for Limb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.chain())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Motion commands
// ────────────────────────────────────────────────────────────────────────────

/// Reference frame for Cartesian commands.  Every command this stack sends is
/// torso-relative; the discriminant is the wire value the motion endpoint
/// expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frame {
    Torso = 0,
}

/// Axis mask selecting only the x/y/z position components.
pub const AXIS_MASK_POSITION: u8 = 7;

/// A 6-component Cartesian command: position (metres) followed by three
/// orientation components that this stack always leaves at zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionTarget(pub [f64; 6]);

impl MotionTarget {
    /// Build a position-only target; orientation placeholders are zero.
    pub fn from_position(p: Vector3) -> Self {
        Self([p.x, p.y, p.z, 0.0, 0.0, 0.0])
    }

    pub fn position(&self) -> Vector3 {
        Vector3::new(self.0[0], self.0[1], self.0[2])
    }

    pub fn orientation(&self) -> [f64; 3] {
        [self.0[3], self.0[4], self.0[5]]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Camera frames
// ────────────────────────────────────────────────────────────────────────────

/// QVGA width in pixels.
pub const IMAGE_WIDTH: u32 = 320;
/// QVGA height in pixels.
pub const IMAGE_HEIGHT: u32 = 240;
/// RGB24.
pub const IMAGE_CHANNELS: u32 = 3;

/// A raw interleaved pixel buffer returned by the vision endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageFrame {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub captured_at: DateTime<Utc>,
    pub data: Vec<u8>,
}

impl ImageFrame {
    /// Number of bytes a well-formed buffer of this shape must hold.
    pub fn expected_len(&self) -> usize {
        (self.width * self.height * self.channels) as usize
    }

    /// `true` when `data` holds exactly `width × height × channels` bytes.
    pub fn is_well_formed(&self) -> bool {
        self.data.len() == self.expected_len()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Workspace-wide error type spanning actuator failures, argument
/// validation, degenerate geometry, transport and lifecycle faults.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NaoError {
    #[error("Could not connect to {endpoint} at {address}: {details}")]
    ActuatorUnreachable {
        endpoint: String,
        address: String,
        details: String,
    },

    #[error("Actuator fault on {endpoint}: {details}")]
    ActuatorFault { endpoint: String, details: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),

    #[error("No active vision subscription; call start_vision first")]
    VisionInactive,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid lifecycle transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl NaoError {
    /// Errors that must abort module startup rather than be answered with a
    /// negative acknowledgement.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            NaoError::ActuatorUnreachable { .. } | NaoError::Transport(_) | NaoError::Config(_)
        )
    }
}
