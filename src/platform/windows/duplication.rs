use anyhow::Context;
use windows::Win32::Graphics::Direct3D11::{ID3D11Device, ID3D11Texture2D};
use windows::Win32::Graphics::Dxgi::{
    DXGI_ERROR_ACCESS_LOST, DXGI_ERROR_NOT_FOUND, DXGI_ERROR_WAIT_TIMEOUT, DXGI_OUTDUPL_DESC,
    DXGI_OUTDUPL_FRAME_INFO, IDXGIAdapter, IDXGIDevice, IDXGIOutput1, IDXGIOutputDuplication,
    IDXGIResource,
};
use windows::core::Interface;

use crate::error::{CaptureError, CaptureResult};
use crate::frame::GpuFrame;
use crate::timing::ScopeTimer;

use super::com::CoInitGuard;
use super::d3d11;

/// DXGI reports updates that carry no new desktop content (cursor-only
/// movement, metadata accumulation) with a zero presentation timestamp.
fn has_new_content(info: &DXGI_OUTDUPL_FRAME_INFO) -> bool {
    info.LastPresentTime != 0
}

/// Releases the acquired frame exactly once, on every exit path out of a
/// `poll` call. A lease never spans calls.
struct FrameLease<'a> {
    duplication: &'a IDXGIOutputDuplication,
}

impl Drop for FrameLease<'_> {
    fn drop(&mut self) {
        unsafe { self.duplication.ReleaseFrame() }.ok();
    }
}

/// Poll-based monitor capture over IDXGIOutputDuplication.
///
/// State machine: `Idle -> Started -> Idle` via [`start`]/[`stop`]. The
/// D3D11 device is created on the first `start` and kept until the
/// capturer is dropped; `stop` releases only the duplication session.
///
/// A single logical thread of use is expected: `poll` blocks the calling
/// thread, and concurrent polls on one session are not supported — the
/// underlying acquire/release model allows one outstanding frame at a
/// time.
///
/// [`start`]: DuplicationCapturer::start
/// [`stop`]: DuplicationCapturer::stop
pub struct DuplicationCapturer {
    _com: CoInitGuard,
    device: Option<ID3D11Device>,
    duplication: Option<IDXGIOutputDuplication>,
}

impl DuplicationCapturer {
    pub fn new() -> CaptureResult<Self> {
        let com = CoInitGuard::init_multithreaded().map_err(CaptureError::Platform)?;
        Ok(Self {
            _com: com,
            device: None,
            duplication: None,
        })
    }

    pub fn is_started(&self) -> bool {
        self.duplication.is_some()
    }

    /// Establish a duplication session against the adapter output at
    /// `monitor_index`.
    ///
    /// On failure the session is left unset and nothing is retried. An
    /// already-started capturer has its previous session replaced; callers
    /// that want deterministic teardown ordering should call [`stop`]
    /// first.
    ///
    /// [`stop`]: DuplicationCapturer::stop
    pub fn start(&mut self, monitor_index: u32) -> CaptureResult<()> {
        let _timer = ScopeTimer::new("duplication start");
        self.duplication = None;

        let device = match self.device.as_ref() {
            Some(device) => device.clone(),
            None => {
                let (device, _context) = d3d11::create_device().map_err(CaptureError::Platform)?;
                self.device = Some(device.clone());
                device
            }
        };

        let dxgi: IDXGIDevice = device
            .cast()
            .context("failed to cast ID3D11Device to IDXGIDevice")
            .map_err(CaptureError::Platform)?;
        let adapter: IDXGIAdapter = unsafe { dxgi.GetAdapter() }
            .context("IDXGIDevice::GetAdapter failed")
            .map_err(CaptureError::Platform)?;
        let output = unsafe { adapter.EnumOutputs(monitor_index) }.map_err(|error| {
            if error.code() == DXGI_ERROR_NOT_FOUND {
                CaptureError::InvalidTarget(format!(
                    "monitor index {monitor_index} is out of range"
                ))
            } else {
                CaptureError::Platform(
                    anyhow::Error::from(error)
                        .context(format!("EnumOutputs({monitor_index}) failed")),
                )
            }
        })?;
        let output1: IDXGIOutput1 = output
            .cast()
            .context("failed to query IDXGIOutput1")
            .map_err(CaptureError::Platform)?;
        let duplication = unsafe { output1.DuplicateOutput(&device) }
            .context("DuplicateOutput failed")
            .map_err(CaptureError::Platform)?;

        self.duplication = Some(duplication);
        tracing::info!(monitor_index, "desktop duplication session started");
        Ok(())
    }

    /// Wait up to `timeout_ms` for the next desktop update.
    ///
    /// Returns `Ok(true)` after invoking the callback exactly once with the
    /// acquired texture and the session's mode dimensions. Returns
    /// `Ok(false)` — with no callback — when no session exists, when the
    /// wait times out, or when the update carries no new content. The
    /// texture is only valid inside the callback; the OS frame is released
    /// before this method returns on every path.
    ///
    /// Acquisition failures other than a timeout (device loss, output
    /// disconnect) surface as errors. No recovery is attempted; subsequent
    /// polls on the same session will keep failing until it is restarted.
    pub fn poll(
        &mut self,
        timeout_ms: u32,
        on_frame: impl FnOnce(GpuFrame<'_>),
    ) -> CaptureResult<bool> {
        let Some(duplication) = self.duplication.as_ref() else {
            return Ok(false);
        };

        let mut info = DXGI_OUTDUPL_FRAME_INFO::default();
        let mut resource: Option<IDXGIResource> = None;
        if let Err(error) =
            unsafe { duplication.AcquireNextFrame(timeout_ms, &mut info, &mut resource) }
        {
            if error.code() == DXGI_ERROR_WAIT_TIMEOUT {
                return Ok(false);
            }
            if error.code() == DXGI_ERROR_ACCESS_LOST {
                return Err(CaptureError::AccessLost);
            }
            return Err(CaptureError::Platform(
                anyhow::Error::from(error).context("AcquireNextFrame failed"),
            ));
        }

        let _lease = FrameLease { duplication };

        if !has_new_content(&info) {
            return Ok(false);
        }
        let Some(resource) = resource else {
            return Ok(false);
        };
        let texture: ID3D11Texture2D = resource
            .cast()
            .context("failed to cast acquired IDXGIResource to ID3D11Texture2D")
            .map_err(CaptureError::Platform)?;

        let mut desc = DXGI_OUTDUPL_DESC::default();
        unsafe { duplication.GetDesc(&mut desc) };

        on_frame(GpuFrame::new(
            &texture,
            desc.ModeDesc.Width,
            desc.ModeDesc.Height,
        ));
        Ok(true)
    }

    /// Release the duplication session. Safe to call repeatedly and on a
    /// never-started capturer; the device is kept for a later `start`.
    pub fn stop(&mut self) {
        if self.duplication.take().is_some() {
            tracing::info!("desktop duplication session stopped");
        }
    }
}

impl Drop for DuplicationCapturer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_present_time_means_no_new_content() {
        let info = DXGI_OUTDUPL_FRAME_INFO::default();
        assert!(!has_new_content(&info));

        let presented = DXGI_OUTDUPL_FRAME_INFO {
            LastPresentTime: 133_666_777_000,
            ..Default::default()
        };
        assert!(has_new_content(&presented));
    }
}
