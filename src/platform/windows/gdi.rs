use std::ffi::c_void;
use std::mem::size_of;
use std::ptr::null_mut;
use std::slice;

use anyhow::Context;
use windows::Win32::Foundation::{HANDLE, HWND, RECT};
use windows::Win32::Graphics::Gdi::{
    BI_RGB, BITMAPINFO, BITMAPINFOHEADER, BitBlt, CreateCompatibleDC, CreateDIBSection,
    DIB_RGB_COLORS, DeleteDC, DeleteObject, GetDC, HBITMAP, HDC, HGDIOBJ, HMONITOR, ReleaseDC,
    SRCCOPY, SelectObject,
};
use windows::Win32::Storage::Xps::{PRINT_WINDOW_FLAGS, PrintWindow};
use windows::Win32::UI::WindowsAndMessaging::{GetWindowRect, IsWindow};

use crate::error::{CaptureError, CaptureResult};
use crate::frame::BitmapFrame;
use crate::monitor::MonitorId;
use crate::timing::ScopeTimer;
use crate::window::WindowId;
use crate::{CaptureTarget, PixelRect};

use super::monitor::{monitor_rect, virtual_desktop_rect};

// Not exposed by the metadata; renders DirectComposition content too.
const PW_RENDERFULLCONTENT: PRINT_WINDOW_FLAGS = PRINT_WINDOW_FLAGS(2);

fn pixel_buffer_len(width: i32, height: i32) -> CaptureResult<usize> {
    let width = usize::try_from(width).map_err(|_| CaptureError::BufferOverflow)?;
    let height = usize::try_from(height).map_err(|_| CaptureError::BufferOverflow)?;
    width
        .checked_mul(height)
        .and_then(|pixels| pixels.checked_mul(4))
        .ok_or(CaptureError::BufferOverflow)
}

/// One capture call's worth of GDI state: a source DC, a memory DC, and a
/// 32-bit top-down DIB section selected into it. Everything is released by
/// `Drop`, so the handles cannot leak on any failure or callback path.
struct BlitSurface {
    source_hwnd: HWND,
    source_dc: HDC,
    mem_dc: HDC,
    bitmap: HBITMAP,
    old_bitmap: HGDIOBJ,
    bits: *mut u8,
    len: usize,
    width: i32,
    height: i32,
}

impl BlitSurface {
    /// `source_hwnd` of null means the screen DC.
    fn new(source_hwnd: HWND, width: i32, height: i32) -> CaptureResult<Self> {
        if width <= 0 || height <= 0 {
            return Err(CaptureError::InvalidTarget(format!(
                "capture surface size is invalid ({width}x{height})"
            )));
        }
        let len = pixel_buffer_len(width, height)?;

        let source_dc = unsafe { GetDC(source_hwnd) };
        if source_dc.0.is_null() {
            return Err(CaptureError::Platform(anyhow::anyhow!(
                "GetDC returned null"
            )));
        }

        let mem_dc = unsafe { CreateCompatibleDC(source_dc) };
        if mem_dc.0.is_null() {
            unsafe {
                let _ = ReleaseDC(source_hwnd, source_dc);
            }
            return Err(CaptureError::Platform(anyhow::anyhow!(
                "CreateCompatibleDC failed"
            )));
        }

        let mut info = BITMAPINFO::default();
        info.bmiHeader.biSize = size_of::<BITMAPINFOHEADER>() as u32;
        info.bmiHeader.biWidth = width;
        // Negative height selects a top-down DIB, so row 0 is the top of
        // the captured content.
        info.bmiHeader.biHeight = -height;
        info.bmiHeader.biPlanes = 1;
        info.bmiHeader.biBitCount = 32;
        info.bmiHeader.biCompression = BI_RGB.0;

        let mut bits: *mut c_void = null_mut();
        let bitmap = match unsafe {
            CreateDIBSection(
                mem_dc,
                &info,
                DIB_RGB_COLORS,
                &mut bits,
                HANDLE::default(),
                0,
            )
        } {
            Ok(bitmap) => bitmap,
            Err(error) => {
                unsafe {
                    let _ = DeleteDC(mem_dc);
                    let _ = ReleaseDC(source_hwnd, source_dc);
                }
                return Err(CaptureError::Platform(
                    anyhow::Error::from(error).context("CreateDIBSection failed"),
                ));
            }
        };

        let old_bitmap = unsafe { SelectObject(mem_dc, bitmap) };
        if old_bitmap.0.is_null() {
            unsafe {
                let _ = DeleteObject(bitmap);
                let _ = DeleteDC(mem_dc);
                let _ = ReleaseDC(source_hwnd, source_dc);
            }
            return Err(CaptureError::Platform(anyhow::anyhow!(
                "SelectObject failed for the capture bitmap"
            )));
        }

        Ok(Self {
            source_hwnd,
            source_dc,
            mem_dc,
            bitmap,
            old_bitmap,
            bits: bits.cast(),
            len,
            width,
            height,
        })
    }

    /// Invoke the delivery callback with a borrowed view of the DIB bits.
    fn deliver(&self, on_frame: impl FnOnce(BitmapFrame<'_>)) {
        let bytes = unsafe { slice::from_raw_parts(self.bits, self.len) };
        on_frame(BitmapFrame::new(bytes, self.width as u32, self.height as u32));
    }
}

impl Drop for BlitSurface {
    fn drop(&mut self) {
        unsafe {
            let _ = SelectObject(self.mem_dc, self.old_bitmap);
            let _ = DeleteObject(self.bitmap);
            let _ = DeleteDC(self.mem_dc);
            let _ = ReleaseDC(self.source_hwnd, self.source_dc);
        }
    }
}

/// Capture any target with one synchronous blit.
///
/// The callback is invoked at most once, with pixels that are only valid
/// until it returns. All OS handles are released before this function
/// returns, whatever the outcome.
pub fn capture(
    target: &CaptureTarget,
    on_frame: impl FnOnce(BitmapFrame<'_>),
) -> CaptureResult<()> {
    match target {
        CaptureTarget::VirtualDesktop => capture_virtual_desktop(on_frame),
        CaptureTarget::Region(rect) => capture_region(*rect, on_frame),
        CaptureTarget::Monitor(monitor) => capture_monitor(monitor, on_frame),
        CaptureTarget::Window(window) => capture_window(*window, on_frame),
    }
}

pub fn capture_region(
    rect: PixelRect,
    on_frame: impl FnOnce(BitmapFrame<'_>),
) -> CaptureResult<()> {
    let _timer = ScopeTimer::new("blit capture_region");
    if rect.is_empty() {
        return Err(CaptureError::InvalidTarget(format!(
            "capture region is empty ({}x{})",
            rect.width(),
            rect.height()
        )));
    }
    screen_blit(rect, on_frame)
}

pub fn capture_virtual_desktop(on_frame: impl FnOnce(BitmapFrame<'_>)) -> CaptureResult<()> {
    let _timer = ScopeTimer::new("blit capture_virtual_desktop");
    screen_blit(virtual_desktop_rect(), on_frame)
}

pub fn capture_monitor(
    monitor: &MonitorId,
    on_frame: impl FnOnce(BitmapFrame<'_>),
) -> CaptureResult<()> {
    let _timer = ScopeTimer::new("blit capture_monitor");
    let handle = HMONITOR(monitor.raw_handle() as *mut c_void);
    let rect = monitor_rect(handle)?;
    screen_blit(rect, on_frame)
}

fn screen_blit(rect: PixelRect, on_frame: impl FnOnce(BitmapFrame<'_>)) -> CaptureResult<()> {
    let surface = BlitSurface::new(HWND(null_mut()), rect.width(), rect.height())?;

    unsafe {
        BitBlt(
            surface.mem_dc,
            0,
            0,
            rect.width(),
            rect.height(),
            surface.source_dc,
            rect.left,
            rect.top,
            SRCCOPY,
        )
    }
    .context("BitBlt from the screen DC failed")
    .map_err(CaptureError::Platform)?;

    surface.deliver(on_frame);
    Ok(())
}

pub fn capture_window(
    window: WindowId,
    on_frame: impl FnOnce(BitmapFrame<'_>),
) -> CaptureResult<()> {
    let _timer = ScopeTimer::new("blit capture_window");
    let hwnd = HWND(window.raw_handle() as *mut c_void);
    if hwnd.0.is_null() || !unsafe { IsWindow(hwnd) }.as_bool() {
        return Err(CaptureError::InvalidTarget(
            "window handle is not valid".into(),
        ));
    }

    let mut rect = RECT::default();
    unsafe { GetWindowRect(hwnd, &mut rect) }
        .ok()
        .context("GetWindowRect failed")
        .map_err(CaptureError::Platform)?;

    let width = rect.right.saturating_sub(rect.left);
    let height = rect.bottom.saturating_sub(rect.top);

    let surface = BlitSurface::new(hwnd, width, height)?;

    // BitBlt from a window DC misses GPU-composited content (Chrome, UWP,
    // anything DirectComposition-backed); rendering the window into the
    // DIB captures it.
    let mut rendered =
        unsafe { PrintWindow(hwnd, surface.mem_dc, PW_RENDERFULLCONTENT) }.as_bool();
    if !rendered {
        rendered = unsafe { PrintWindow(hwnd, surface.mem_dc, PRINT_WINDOW_FLAGS(0)) }.as_bool();
    }
    if !rendered {
        return Err(CaptureError::Platform(anyhow::anyhow!(
            "PrintWindow failed during window capture"
        )));
    }

    surface.deliver(on_frame);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_buffer_len_is_four_bytes_per_pixel() {
        assert_eq!(pixel_buffer_len(1920, 1080).unwrap(), 1920 * 1080 * 4);
        assert_eq!(pixel_buffer_len(1, 1).unwrap(), 4);
    }

    #[test]
    fn pixel_buffer_len_rejects_degenerate_sizes() {
        assert!(pixel_buffer_len(-1, 100).is_err());
        assert!(pixel_buffer_len(i32::MAX, i32::MAX).is_err());
    }
}
