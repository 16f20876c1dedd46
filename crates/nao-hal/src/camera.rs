//! Vision endpoint trait and the fixed stream format the stack subscribes to.

use async_trait::async_trait;
use nao_types::{IMAGE_HEIGHT, IMAGE_WIDTH, ImageFrame, NaoError};
use serde::{Deserialize, Serialize};

/// Camera resolution.  Discriminants are the vision endpoint's wire values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    Qqvga = 0,
    Qvga = 1,
    Vga = 2,
}

impl Resolution {
    /// `(width, height)` in pixels.
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            Resolution::Qqvga => (160, 120),
            Resolution::Qvga => (IMAGE_WIDTH, IMAGE_HEIGHT),
            Resolution::Vga => (640, 480),
        }
    }
}

/// Pixel layout.  Discriminants are the vision endpoint's wire values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorSpace {
    Yuv422 = 9,
    Rgb = 11,
    Bgr = 13,
}

impl ColorSpace {
    /// Bytes per pixel.
    pub fn channels(self) -> u32 {
        match self {
            ColorSpace::Yuv422 => 2,
            ColorSpace::Rgb | ColorSpace::Bgr => 3,
        }
    }
}

/// Everything needed to open a camera stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisionSpec {
    pub camera_id: u8,
    pub client_name: String,
    pub resolution: Resolution,
    pub color_space: ColorSpace,
    pub fps: u32,
}

impl Default for VisionSpec {
    /// Bottom camera, QVGA, RGB24, 30 fps.
    fn default() -> Self {
        Self {
            camera_id: 1,
            client_name: "_client3".to_string(),
            resolution: Resolution::Qvga,
            color_space: ColorSpace::Rgb,
            fps: 30,
        }
    }
}

/// Opaque handle to an active camera stream, as returned by
/// [`VideoProxy::subscribe`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VisionSubscription(pub String);

impl VisionSubscription {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The vision endpoint.
#[async_trait]
pub trait VideoProxy: Send + Sync {
    async fn set_active_camera(&self, camera_id: u8) -> Result<(), NaoError>;

    /// Open a stream.  The endpoint may return a handle that differs from
    /// the requested client name.
    async fn subscribe(
        &self,
        client_name: &str,
        resolution: Resolution,
        color_space: ColorSpace,
        fps: u32,
    ) -> Result<VisionSubscription, NaoError>;

    async fn unsubscribe(&self, subscription: &VisionSubscription) -> Result<(), NaoError>;

    /// Latest frame of an open stream.
    async fn get_image_remote(
        &self,
        subscription: &VisionSubscription,
    ) -> Result<ImageFrame, NaoError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_spec_is_qvga_rgb() {
        let spec = VisionSpec::default();
        assert_eq!(spec.resolution.dimensions(), (320, 240));
        assert_eq!(spec.color_space.channels(), 3);
        assert_eq!(spec.color_space as u8, 11);
        assert_eq!(spec.resolution as u8, 1);
        assert_eq!(spec.client_name, "_client3");
        assert_eq!(spec.fps, 30);
    }
}
