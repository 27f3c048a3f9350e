#[cfg(target_os = "windows")]
use windows::Win32::Graphics::Direct3D11::ID3D11Texture2D;

/// A GPU-resident frame handed to a delivery callback.
///
/// The texture is borrowed: it is only valid for the duration of the
/// callback invocation and must not be retained past it. Anything that has
/// to outlive the callback must be copied out during the callback, e.g.
/// via [`crate::readback::read_texture`].
#[cfg(target_os = "windows")]
pub struct GpuFrame<'a> {
    texture: &'a ID3D11Texture2D,
    width: u32,
    height: u32,
}

#[cfg(target_os = "windows")]
impl<'a> GpuFrame<'a> {
    pub(crate) fn new(texture: &'a ID3D11Texture2D, width: u32, height: u32) -> Self {
        Self {
            texture,
            width,
            height,
        }
    }

    pub fn texture(&self) -> &'a ID3D11Texture2D {
        self.texture
    }

    /// Width in pixels of the captured content.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels of the captured content.
    pub fn height(&self) -> u32 {
        self.height
    }
}

/// A CPU-mapped frame produced by the blit backend.
///
/// Rows are top-down, 32-bit BGRA, tightly packed. The buffer is borrowed
/// from a surface that is torn down when the capture call returns, so the
/// bytes must be copied out during the callback to persist them.
pub struct BitmapFrame<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
}

impl<'a> BitmapFrame<'a> {
    pub(crate) fn new(data: &'a [u8], width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
        }
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per row. DIB rows at 32 bpp are always DWORD-aligned, so the
    /// stride is exactly `width * 4`.
    pub fn stride(&self) -> usize {
        self.width as usize * 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitmap_frame_reports_constructor_values() {
        let pixels = vec![0u8; 8 * 4 * 4];
        let frame = BitmapFrame::new(&pixels, 8, 4);
        assert_eq!(frame.width(), 8);
        assert_eq!(frame.height(), 4);
        assert_eq!(frame.stride(), 32);
        assert_eq!(frame.data().len(), frame.stride() * frame.height() as usize);
    }
}
