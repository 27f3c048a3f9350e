use std::mem::size_of;

use anyhow::Context;
use windows::Win32::Foundation::POINT;
use windows::Win32::Graphics::Dxgi::{CreateDXGIFactory1, DXGI_ERROR_NOT_FOUND, IDXGIFactory1};
use windows::Win32::Graphics::Gdi::{
    GetMonitorInfoW, HMONITOR, MONITOR_DEFAULTTOPRIMARY, MONITORINFO, MonitorFromPoint,
};
use windows::Win32::UI::WindowsAndMessaging::{
    GetSystemMetrics, SM_CXVIRTUALSCREEN, SM_CYVIRTUALSCREEN, SM_XVIRTUALSCREEN,
    SM_YVIRTUALSCREEN,
};

use crate::PixelRect;
use crate::error::{CaptureError, CaptureResult};
use crate::monitor::MonitorId;

/// Resolve a monitor handle to its desktop rectangle.
pub(crate) fn monitor_rect(handle: HMONITOR) -> CaptureResult<PixelRect> {
    let mut info = MONITORINFO {
        cbSize: size_of::<MONITORINFO>() as u32,
        ..Default::default()
    };

    if !unsafe { GetMonitorInfoW(handle, &mut info) }.as_bool() {
        return Err(CaptureError::MonitorLost);
    }

    let rect = PixelRect::new(
        info.rcMonitor.left,
        info.rcMonitor.top,
        info.rcMonitor.right,
        info.rcMonitor.bottom,
    );
    if rect.is_empty() {
        return Err(CaptureError::Platform(anyhow::anyhow!(
            "monitor geometry is invalid ({}x{})",
            rect.width(),
            rect.height()
        )));
    }
    Ok(rect)
}

/// The bounding rectangle of all monitors, in virtual-desktop coordinates.
pub(crate) fn virtual_desktop_rect() -> PixelRect {
    let x = unsafe { GetSystemMetrics(SM_XVIRTUALSCREEN) };
    let y = unsafe { GetSystemMetrics(SM_YVIRTUALSCREEN) };
    let width = unsafe { GetSystemMetrics(SM_CXVIRTUALSCREEN) };
    let height = unsafe { GetSystemMetrics(SM_CYVIRTUALSCREEN) };
    PixelRect::new(x, y, x + width, y + height)
}

pub(crate) fn primary_hmonitor() -> HMONITOR {
    unsafe { MonitorFromPoint(POINT { x: 0, y: 0 }, MONITOR_DEFAULTTOPRIMARY) }
}

fn utf16z_to_string(input: &[u16]) -> String {
    let len = input.iter().position(|&ch| ch == 0).unwrap_or(input.len());
    String::from_utf16_lossy(&input[..len])
}

/// Enumerate desktop-attached outputs across all adapters.
pub(crate) fn enumerate() -> CaptureResult<Vec<MonitorId>> {
    let factory: IDXGIFactory1 = unsafe { CreateDXGIFactory1() }
        .context("CreateDXGIFactory1 failed")
        .map_err(CaptureError::Platform)?;

    let primary = primary_hmonitor();
    let mut monitors = Vec::new();
    let mut adapter_idx = 0u32;

    loop {
        let adapter = match unsafe { factory.EnumAdapters1(adapter_idx) } {
            Ok(adapter) => adapter,
            Err(e) if e.code() == DXGI_ERROR_NOT_FOUND => break,
            Err(e) => {
                return Err(CaptureError::Platform(
                    anyhow::Error::from(e).context(format!("EnumAdapters1({adapter_idx}) failed")),
                ));
            }
        };

        let mut output_idx = 0u32;
        loop {
            let output = match unsafe { adapter.EnumOutputs(output_idx) } {
                Ok(output) => output,
                Err(e) if e.code() == DXGI_ERROR_NOT_FOUND => break,
                Err(e) => {
                    return Err(CaptureError::Platform(anyhow::Error::from(e).context(
                        format!("EnumOutputs({output_idx}) on adapter {adapter_idx} failed"),
                    )));
                }
            };

            let desc = unsafe { output.GetDesc() }
                .context("IDXGIOutput::GetDesc failed")
                .map_err(CaptureError::Platform)?;

            if desc.AttachedToDesktop.as_bool() {
                let name = utf16z_to_string(&desc.DeviceName);
                monitors.push(MonitorId::from_parts(
                    desc.Monitor.0 as isize,
                    name,
                    desc.Monitor == primary,
                ));
            }

            output_idx += 1;
        }

        adapter_idx += 1;
    }

    Ok(monitors)
}
