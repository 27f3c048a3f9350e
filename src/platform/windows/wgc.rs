use std::ffi::c_void;

use anyhow::Context;
use windows::Foundation::{EventRegistrationToken, TypedEventHandler};
use windows::Graphics::Capture::{
    Direct3D11CaptureFrame, Direct3D11CaptureFramePool, GraphicsCaptureItem,
    GraphicsCaptureSession,
};
use windows::Graphics::DirectX::Direct3D11::IDirect3DDevice;
use windows::Graphics::DirectX::DirectXPixelFormat;
use windows::Graphics::SizeInt32;
use windows::Win32::Foundation::HWND;
use windows::Win32::Graphics::Direct3D11::{ID3D11Device, ID3D11Texture2D};
use windows::Win32::Graphics::Dxgi::IDXGIDevice;
use windows::Win32::Graphics::Gdi::HMONITOR;
use windows::Win32::System::WinRT::Direct3D11::{
    CreateDirect3D11DeviceFromDXGIDevice, IDirect3DDxgiInterfaceAccess,
};
use windows::Win32::System::WinRT::Graphics::Capture::IGraphicsCaptureItemInterop;
use windows::Win32::UI::WindowsAndMessaging::IsWindow;
use windows::core::{IInspectable, Interface};

use crate::env_config::define_env_flag;
use crate::error::{CaptureError, CaptureResult};
use crate::frame::GpuFrame;
use crate::monitor::MonitorId;
use crate::timing::ScopeTimer;
use crate::window::WindowId;

use super::com::CoInitGuard;
use super::d3d11;

/// A new frame supersedes any undelivered previous one; the compositor is
/// never blocked on a stalled consumer.
const FRAME_POOL_CAPACITY: i32 = 1;

define_env_flag!(enabled_when(wgc_border_enabled, "RIME_CAPTURE_WGC_BORDER"));
define_env_flag!(enabled_when(wgc_cursor_enabled, "RIME_CAPTURE_WGC_CURSOR"));

/// Where compositor frames are delivered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThreadingModel {
    /// The callback runs on the thread that started the session, dispatched
    /// through that thread's DispatcherQueue. No frames are delivered unless
    /// the thread keeps pumping its message/event loop.
    Affine,

    /// The callback runs on an internal worker thread, concurrently with the
    /// thread that started the session.
    FreeThreaded,
}

fn validate_support() -> CaptureResult<()> {
    let supported = GraphicsCaptureSession::IsSupported()
        .context("GraphicsCaptureSession::IsSupported failed")
        .map_err(CaptureError::Platform)?;
    if supported {
        Ok(())
    } else {
        Err(CaptureError::BackendUnavailable(
            "Windows Graphics Capture is not supported on this system".into(),
        ))
    }
}

fn create_winrt_device(device: &ID3D11Device) -> CaptureResult<IDirect3DDevice> {
    let dxgi_device: IDXGIDevice = device
        .cast()
        .context("failed to cast ID3D11Device to IDXGIDevice")
        .map_err(CaptureError::Platform)?;
    let inspectable = unsafe { CreateDirect3D11DeviceFromDXGIDevice(&dxgi_device) }
        .context("CreateDirect3D11DeviceFromDXGIDevice failed")
        .map_err(CaptureError::Platform)?;
    inspectable
        .cast()
        .context("failed to cast IInspectable to IDirect3DDevice")
        .map_err(CaptureError::Platform)
}

fn create_monitor_capture_item(monitor: HMONITOR) -> CaptureResult<GraphicsCaptureItem> {
    let interop = windows::core::factory::<GraphicsCaptureItem, IGraphicsCaptureItemInterop>()
        .context("failed to get IGraphicsCaptureItemInterop factory")
        .map_err(CaptureError::Platform)?;
    unsafe { interop.CreateForMonitor(monitor) }
        .context("IGraphicsCaptureItemInterop::CreateForMonitor failed")
        .map_err(CaptureError::Platform)
}

fn create_window_capture_item(window: HWND) -> CaptureResult<GraphicsCaptureItem> {
    let interop = windows::core::factory::<GraphicsCaptureItem, IGraphicsCaptureItemInterop>()
        .context("failed to get IGraphicsCaptureItemInterop factory")
        .map_err(CaptureError::Platform)?;
    unsafe { interop.CreateForWindow(window) }
        .context("IGraphicsCaptureItemInterop::CreateForWindow failed")
        .map_err(CaptureError::Platform)
}

/// WGC reports the content size as signed; a closing window can briefly
/// report zero or negative dimensions.
fn content_dimensions(size: SizeInt32) -> (u32, u32) {
    (size.Width.max(0) as u32, size.Height.max(0) as u32)
}

fn deliver_frame<F: FnMut(GpuFrame<'_>)>(
    frame: &Direct3D11CaptureFrame,
    on_frame: &mut F,
) -> CaptureResult<()> {
    let surface = frame
        .Surface()
        .context("Direct3D11CaptureFrame::Surface failed")
        .map_err(CaptureError::Platform)?;
    let access: IDirect3DDxgiInterfaceAccess = surface
        .cast()
        .context("failed to cast frame surface to IDirect3DDxgiInterfaceAccess")
        .map_err(CaptureError::Platform)?;
    let texture: ID3D11Texture2D = unsafe { access.GetInterface() }
        .context("IDirect3DDxgiInterfaceAccess::GetInterface failed")
        .map_err(CaptureError::Platform)?;
    let size = frame
        .ContentSize()
        .context("Direct3D11CaptureFrame::ContentSize failed")
        .map_err(CaptureError::Platform)?;

    let (width, height) = content_dimensions(size);
    if width == 0 || height == 0 {
        return Ok(());
    }
    on_frame(GpuFrame::new(&texture, width, height));
    Ok(())
}

struct ActiveSession {
    item: GraphicsCaptureItem,
    frame_pool: Direct3D11CaptureFramePool,
    session: GraphicsCaptureSession,
    frame_arrived_token: EventRegistrationToken,
}

/// Event-driven window/monitor capture through the Windows compositor.
///
/// State machine: `Idle -> Started -> Idle` via [`start_window`] /
/// [`start_monitor`] and [`stop`]. The D3D11 device is created once, in
/// [`new`], and is never replaced for the lifetime of the capturer.
///
/// Frames are pushed to the callback from the frame pool's `FrameArrived`
/// handler. In [`ThreadingModel::Affine`] mode that handler runs on the
/// thread that started the session and only while it pumps its message
/// loop; in [`ThreadingModel::FreeThreaded`] mode it runs on an internal
/// worker thread, so the callback must synchronize any state it shares
/// with the starting thread.
///
/// The texture handed to the callback is borrowed and only valid until the
/// callback returns; copy it out via [`crate::readback::read_texture`] to
/// keep pixels longer.
///
/// # Caller obligation
///
/// In affine mode, [`stop`] (and therefore drop) must be invoked from the
/// thread that started the session. The underlying platform treats a
/// cross-thread teardown of a thread-affine frame pool as undefined
/// behavior, and offers no way to detect the violation at runtime.
///
/// [`new`]: GraphicsCapturer::new
/// [`start_window`]: GraphicsCapturer::start_window
/// [`start_monitor`]: GraphicsCapturer::start_monitor
/// [`stop`]: GraphicsCapturer::stop
pub struct GraphicsCapturer {
    _com: CoInitGuard,
    winrt_device: IDirect3DDevice,
    active: Option<ActiveSession>,
}

impl GraphicsCapturer {
    /// Whether this system supports compositor capture at all.
    pub fn is_supported() -> bool {
        validate_support().is_ok()
    }

    pub fn new() -> CaptureResult<Self> {
        let com = CoInitGuard::init_multithreaded().map_err(CaptureError::Platform)?;
        validate_support()?;
        let (device, _context) = d3d11::create_device().map_err(CaptureError::Platform)?;
        let winrt_device = create_winrt_device(&device)?;
        Ok(Self {
            _com: com,
            winrt_device,
            active: None,
        })
    }

    pub fn is_started(&self) -> bool {
        self.active.is_some()
    }

    /// Start capturing a top-level window.
    ///
    /// Any prior session is stopped first. Fails without creating a session
    /// when the handle is no longer a window or the compositor rejects it.
    pub fn start_window<F>(
        &mut self,
        window: WindowId,
        model: ThreadingModel,
        on_frame: F,
    ) -> CaptureResult<()>
    where
        F: FnMut(GpuFrame<'_>) + Send + 'static,
    {
        let hwnd = HWND(window.raw_handle() as *mut c_void);
        if hwnd.0.is_null() || !unsafe { IsWindow(hwnd) }.as_bool() {
            return Err(CaptureError::InvalidTarget(
                "window handle is not valid".into(),
            ));
        }
        let item = create_window_capture_item(hwnd)?;
        self.start_impl(item, model, on_frame)
    }

    /// Start capturing a monitor.
    pub fn start_monitor<F>(
        &mut self,
        monitor: &MonitorId,
        model: ThreadingModel,
        on_frame: F,
    ) -> CaptureResult<()>
    where
        F: FnMut(GpuFrame<'_>) + Send + 'static,
    {
        let handle = HMONITOR(monitor.raw_handle() as *mut c_void);
        let item = create_monitor_capture_item(handle)?;
        self.start_impl(item, model, on_frame)
    }

    fn start_impl<F>(
        &mut self,
        item: GraphicsCaptureItem,
        model: ThreadingModel,
        on_frame: F,
    ) -> CaptureResult<()>
    where
        F: FnMut(GpuFrame<'_>) + Send + 'static,
    {
        let _timer = ScopeTimer::new("graphics capture start");
        self.stop();

        let size = item
            .Size()
            .context("GraphicsCaptureItem::Size failed")
            .map_err(CaptureError::Platform)?;
        if size.Width <= 0 || size.Height <= 0 {
            return Err(CaptureError::InvalidTarget(format!(
                "capture item size is invalid ({}x{})",
                size.Width, size.Height
            )));
        }

        let frame_pool = match model {
            ThreadingModel::Affine => Direct3D11CaptureFramePool::Create(
                &self.winrt_device,
                DirectXPixelFormat::B8G8R8A8UIntNormalized,
                FRAME_POOL_CAPACITY,
                size,
            )
            .context("Direct3D11CaptureFramePool::Create failed"),
            ThreadingModel::FreeThreaded => Direct3D11CaptureFramePool::CreateFreeThreaded(
                &self.winrt_device,
                DirectXPixelFormat::B8G8R8A8UIntNormalized,
                FRAME_POOL_CAPACITY,
                size,
            )
            .context("Direct3D11CaptureFramePool::CreateFreeThreaded failed"),
        }
        .map_err(CaptureError::Platform)?;

        let session = match frame_pool.CreateCaptureSession(&item) {
            Ok(session) => session,
            Err(error) => {
                let _ = frame_pool.Close();
                return Err(CaptureError::Platform(
                    anyhow::Error::from(error)
                        .context("Direct3D11CaptureFramePool::CreateCaptureSession failed"),
                ));
            }
        };

        // Best-effort session tuning; older OS builds reject these setters
        // without affecting capture.
        let _ = session.SetIsCursorCaptureEnabled(wgc_cursor_enabled());
        let _ = session.SetIsBorderRequired(wgc_border_enabled());

        let mut on_frame = on_frame;
        let handler = TypedEventHandler::<Direct3D11CaptureFramePool, IInspectable>::new(
            move |sender, _| {
                let Some(pool) = sender else {
                    return Ok(());
                };
                // Drain the pool and keep only the newest frame; anything
                // older was already superseded.
                let mut newest: Option<Direct3D11CaptureFrame> = None;
                while let Ok(frame) = pool.TryGetNextFrame() {
                    if let Some(previous) = newest.replace(frame) {
                        let _ = previous.Close();
                    }
                }
                let Some(frame) = newest else {
                    return Ok(());
                };
                if let Err(error) = deliver_frame(&frame, &mut on_frame) {
                    tracing::warn!("compositor frame delivery failed: {error}");
                }
                let _ = frame.Close();
                Ok(())
            },
        );
        let frame_arrived_token = match frame_pool.FrameArrived(&handler) {
            Ok(token) => token,
            Err(error) => {
                let _ = session.Close();
                let _ = frame_pool.Close();
                return Err(CaptureError::Platform(
                    anyhow::Error::from(error)
                        .context("Direct3D11CaptureFramePool::FrameArrived registration failed"),
                ));
            }
        };

        if let Err(error) = session.StartCapture() {
            let _ = frame_pool.RemoveFrameArrived(frame_arrived_token);
            let _ = session.Close();
            let _ = frame_pool.Close();
            return Err(CaptureError::Platform(
                anyhow::Error::from(error).context("GraphicsCaptureSession::StartCapture failed"),
            ));
        }

        self.active = Some(ActiveSession {
            item,
            frame_pool,
            session,
            frame_arrived_token,
        });
        tracing::info!(?model, "graphics capture session started");
        Ok(())
    }

    /// Stop the session and drop the stored callback.
    ///
    /// Safe to call repeatedly and on a never-started capturer. No callback
    /// invocations occur after this returns, though one already in flight
    /// is allowed to finish. See the type-level docs for the affine-mode
    /// threading obligation.
    pub fn stop(&mut self) {
        if let Some(active) = self.active.take() {
            let _ = active
                .frame_pool
                .RemoveFrameArrived(active.frame_arrived_token);
            let _ = active.session.Close();
            let _ = active.frame_pool.Close();
            drop(active.item);
            tracing::info!("graphics capture session stopped");
        }
    }
}

impl Drop for GraphicsCapturer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_dimensions_clamp_negative_sizes() {
        let size = SizeInt32 {
            Width: 2560,
            Height: 1440,
        };
        assert_eq!(content_dimensions(size), (2560, 1440));

        let collapsing = SizeInt32 {
            Width: -8,
            Height: 0,
        };
        assert_eq!(content_dimensions(collapsing), (0, 0));
    }
}
