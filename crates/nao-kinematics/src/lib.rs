//! `nao-kinematics` – targeting geometry for the NAO humanoid.
//!
//! Converts a target point in the torso frame into the commands the actuator
//! layer understands.  Everything here is pure: no state, no I/O.
//!
//! # Modules
//!
//! - [`body`] – [`BodyModel`][body::BodyModel]: the rig description (head and
//!   shoulder offsets, arm length) injected into every computation.
//! - [`geometry`] – [`scale_to_arm_length`][geometry::scale_to_arm_length] and
//!   [`head_angles_for`][geometry::head_angles_for]: single-segment arm
//!   scaling and head pitch/yaw from a direction vector.

pub mod body;
pub mod geometry;

pub use body::{BodyModel, Landmark};
pub use geometry::{HeadAngles, head_angles_for, scale_to_arm_length};
