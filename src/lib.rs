mod env_config;
pub mod error;
pub mod frame;
pub mod monitor;
mod platform;
pub mod timing;
pub mod window;

pub use error::{CaptureError, CaptureErrorClass, CaptureResult};
pub use frame::BitmapFrame;
pub use monitor::MonitorId;
pub use window::WindowId;

#[cfg(target_os = "windows")]
pub use frame::GpuFrame;

#[cfg(target_os = "windows")]
pub use platform::windows::duplication::DuplicationCapturer;
#[cfg(target_os = "windows")]
pub use platform::windows::wgc::{GraphicsCapturer, ThreadingModel};

/// Synchronous blit capture. One call performs one full acquisition and
/// releases every OS handle before returning.
#[cfg(target_os = "windows")]
pub mod blit {
    pub use crate::platform::windows::gdi::{
        capture, capture_monitor, capture_region, capture_virtual_desktop, capture_window,
    };
}

/// GPU-texture to CPU-buffer readback.
#[cfg(target_os = "windows")]
pub mod readback {
    pub use crate::platform::windows::readback::read_texture;
}

/// A rectangle in virtual-desktop coordinates, addressed by its four edges.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl PixelRect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub const fn width(&self) -> i32 {
        self.right - self.left
    }

    pub const fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// Empty or inverted rectangles are rejected by every backend.
    pub const fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }
}

#[derive(Clone)]
pub enum CaptureTarget {
    /// The bounding rectangle of all monitors, taken from the system's
    /// virtual-screen origin and extent.
    VirtualDesktop,

    /// An explicit rectangle in virtual-desktop coordinates. May span
    /// multiple monitors.
    Region(PixelRect),

    Monitor(MonitorId),

    /// A top-level window by native window handle. Window content is
    /// captured by rendering, not by a screen copy, so GPU-composited
    /// windows are included.
    Window(WindowId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_rect_edges_give_dimensions() {
        let rect = PixelRect::new(0, 0, 2560, 1440);
        assert_eq!(rect.width(), 2560);
        assert_eq!(rect.height(), 1440);
        assert!(!rect.is_empty());
    }

    #[test]
    fn pixel_rect_supports_negative_virtual_desktop_origins() {
        // A secondary monitor placed left of the primary produces negative
        // virtual-desktop coordinates.
        let rect = PixelRect::new(-1920, -200, 0, 880);
        assert_eq!(rect.width(), 1920);
        assert_eq!(rect.height(), 1080);
        assert!(!rect.is_empty());
    }

    #[test]
    fn inverted_and_zero_rects_are_empty() {
        assert!(PixelRect::new(100, 100, 100, 200).is_empty());
        assert!(PixelRect::new(100, 100, 200, 100).is_empty());
        assert!(PixelRect::new(200, 200, 100, 100).is_empty());
    }
}
