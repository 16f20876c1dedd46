//! Rig description: where the body landmarks sit relative to the torso origin.

use nao_types::{Limb, Vector3};
use serde::{Deserialize, Serialize};

/// Named body landmarks with a fixed offset from the torso origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Landmark {
    Head,
    LeftShoulder,
    RightShoulder,
}

impl Landmark {
    /// The shoulder that anchors `limb`.
    pub fn shoulder_of(limb: Limb) -> Self {
        match limb {
            Limb::LeftArm => Landmark::LeftShoulder,
            Limb::RightArm => Landmark::RightShoulder,
        }
    }
}

/// Immutable rig data.  Built once and handed to the session; alternate rigs
/// (or test fixtures) are just different values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodyModel {
    pub head: Vector3,
    pub left_shoulder: Vector3,
    pub right_shoulder: Vector3,
    /// Reach of a fully stretched arm in metres.
    pub arm_length: f64,
}

impl BodyModel {
    /// NAO H25 landmarks.  The arm length is rounded down.
    pub const NAO: Self = Self {
        head: Vector3::new(0.0, 0.0, 0.126),
        left_shoulder: Vector3::new(0.0, 0.09, 0.106),
        right_shoulder: Vector3::new(0.0, -0.09, 0.106),
        arm_length: 0.22,
    };

    pub fn offset(&self, landmark: Landmark) -> Vector3 {
        match landmark {
            Landmark::Head => self.head,
            Landmark::LeftShoulder => self.left_shoulder,
            Landmark::RightShoulder => self.right_shoulder,
        }
    }

    pub fn shoulder(&self, limb: Limb) -> Vector3 {
        self.offset(Landmark::shoulder_of(limb))
    }
}

impl Default for BodyModel {
    fn default() -> Self {
        Self::NAO
    }
}
