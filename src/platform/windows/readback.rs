use std::slice;

use anyhow::Context;
use windows::Win32::Graphics::Direct3D11::{
    D3D11_CPU_ACCESS_READ, D3D11_MAP_READ, D3D11_MAPPED_SUBRESOURCE, D3D11_TEXTURE2D_DESC,
    D3D11_USAGE_STAGING, ID3D11Device, ID3D11DeviceContext, ID3D11Resource, ID3D11Texture2D,
};
use windows::core::Interface;

use crate::error::{CaptureError, CaptureResult};
use crate::timing::ScopeTimer;

/// Unmaps the staging surface on every exit path, including a panicking
/// pixel callback.
struct MapGuard<'a> {
    context: &'a ID3D11DeviceContext,
    resource: &'a ID3D11Resource,
}

impl Drop for MapGuard<'_> {
    fn drop(&mut self) {
        unsafe { self.context.Unmap(self.resource, 0) };
    }
}

/// Number of mapped bytes covering `height` rows of `width` BGRA pixels at
/// the given row pitch. The last row only extends to its final pixel, not
/// to the full pitch.
fn mapped_span(row_pitch: usize, width: u32, height: u32) -> CaptureResult<usize> {
    let row_len = (width as usize)
        .checked_mul(4)
        .ok_or(CaptureError::BufferOverflow)?;
    if row_pitch < row_len {
        return Err(CaptureError::Platform(anyhow::anyhow!(
            "mapped row pitch {row_pitch} is smaller than a {width}-pixel row"
        )));
    }
    row_pitch
        .checked_mul(height as usize - 1)
        .and_then(|base| base.checked_add(row_len))
        .ok_or(CaptureError::BufferOverflow)
}

/// Copy a GPU texture into CPU-accessible memory and hand the mapped bytes
/// to `on_pixels` along with the row stride in bytes.
///
/// The pixel layout is 8-bit-per-channel BGRA; rows are `stride` bytes
/// apart and may carry padding past `width * 4`. The mapped buffer is only
/// valid for the duration of the callback, which is invoked exactly once
/// on success.
///
/// `width`/`height` give the content region to expose, which may be
/// smaller than the texture itself (a compositor frame after a window
/// shrink). The device is taken from the texture, so this works with any
/// backend's frames.
pub fn read_texture(
    texture: &ID3D11Texture2D,
    width: u32,
    height: u32,
    on_pixels: impl FnOnce(&[u8], usize),
) -> CaptureResult<()> {
    let _timer = ScopeTimer::new("texture readback");

    let mut desc = D3D11_TEXTURE2D_DESC::default();
    unsafe { texture.GetDesc(&mut desc) };
    if width == 0 || height == 0 || width > desc.Width || height > desc.Height {
        return Err(CaptureError::InvalidTarget(format!(
            "readback region {width}x{height} does not fit the {}x{} texture",
            desc.Width, desc.Height
        )));
    }

    let mut device: Option<ID3D11Device> = None;
    unsafe { texture.GetDevice(&mut device) };
    let device = device
        .context("the texture has no owning device")
        .map_err(CaptureError::Platform)?;
    let mut context: Option<ID3D11DeviceContext> = None;
    unsafe { device.GetImmediateContext(&mut context) };
    let context = context
        .context("the device has no immediate context")
        .map_err(CaptureError::Platform)?;

    let staging_desc = D3D11_TEXTURE2D_DESC {
        Width: desc.Width,
        Height: desc.Height,
        MipLevels: 1,
        ArraySize: 1,
        Format: desc.Format,
        SampleDesc: desc.SampleDesc,
        Usage: D3D11_USAGE_STAGING,
        BindFlags: Default::default(),
        CPUAccessFlags: D3D11_CPU_ACCESS_READ.0 as u32,
        MiscFlags: Default::default(),
    };
    let mut staging: Option<ID3D11Texture2D> = None;
    unsafe { device.CreateTexture2D(&staging_desc, None, Some(&mut staging)) }
        .context("CreateTexture2D for the readback staging surface failed")
        .map_err(CaptureError::Platform)?;
    let staging = staging
        .context("CreateTexture2D did not return a staging surface")
        .map_err(CaptureError::Platform)?;

    let staging_resource: ID3D11Resource = staging
        .cast()
        .context("failed to cast the staging surface to ID3D11Resource")
        .map_err(CaptureError::Platform)?;
    let source_resource: ID3D11Resource = texture
        .cast()
        .context("failed to cast the source texture to ID3D11Resource")
        .map_err(CaptureError::Platform)?;
    unsafe { context.CopyResource(&staging_resource, &source_resource) };

    let mut mapped = D3D11_MAPPED_SUBRESOURCE::default();
    unsafe { context.Map(&staging_resource, 0, D3D11_MAP_READ, 0, Some(&mut mapped)) }
        .context("Map on the readback staging surface failed")
        .map_err(CaptureError::Platform)?;
    let _guard = MapGuard {
        context: &context,
        resource: &staging_resource,
    };

    let stride = mapped.RowPitch as usize;
    let len = mapped_span(stride, width, height)?;
    let bytes = unsafe { slice::from_raw_parts(mapped.pData as *const u8, len) };
    on_pixels(bytes, stride);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapped_span_covers_padded_rows_and_a_tight_tail() {
        // 1920x1080 with a 256-byte-aligned pitch.
        assert_eq!(
            mapped_span(7680, 1920, 1080).unwrap(),
            7680 * 1079 + 1920 * 4
        );
        assert_eq!(mapped_span(4, 1, 1).unwrap(), 4);
    }

    #[test]
    fn mapped_span_rejects_a_pitch_shorter_than_one_row() {
        assert!(mapped_span(100, 100, 10).is_err());
    }
}
