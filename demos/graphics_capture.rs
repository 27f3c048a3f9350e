//! Compositor capture of the primary monitor in both threading modes.
//!
//! The affine run creates a DispatcherQueue and pumps messages until the
//! first frame lands; the free-threaded run blocks on a condition variable
//! that the worker-thread callback signals. Both stop the session from the
//! thread that started it.

#[cfg(target_os = "windows")]
mod common;

#[cfg(not(target_os = "windows"))]
fn main() {
    eprintln!("the graphics capture demo only runs on Windows");
}

#[cfg(target_os = "windows")]
fn main() -> anyhow::Result<()> {
    use std::mem::size_of;
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Condvar, Mutex};

    use anyhow::{Context, Result};
    use rime_capture::{GpuFrame, GraphicsCapturer, ThreadingModel, monitor, readback};
    use windows::Win32::Foundation::HWND;
    use windows::Win32::System::WinRT::{
        CreateDispatcherQueueController, DQTAT_COM_NONE, DQTYPE_THREAD_CURRENT,
        DispatcherQueueOptions,
    };
    use windows::Win32::UI::WindowsAndMessaging::{
        DispatchMessageW, GetMessageW, MSG, TranslateMessage,
    };

    fn save_frame(frame: &GpuFrame<'_>, path: &str) -> Result<()> {
        let mut saved = Ok(());
        readback::read_texture(frame.texture(), frame.width(), frame.height(), |bytes, stride| {
            saved = common::save_png(
                Path::new(path),
                frame.width(),
                frame.height(),
                stride,
                bytes,
                false,
            );
        })?;
        saved
    }

    tracing_subscriber::fmt::init();

    if !GraphicsCapturer::is_supported() {
        anyhow::bail!("Windows Graphics Capture is not supported on this system");
    }
    let mut capturer = GraphicsCapturer::new()?;
    let monitor = monitor::primary_monitor().context("failed to find the primary monitor")?;

    // Affine: frames arrive through this thread's DispatcherQueue, so one
    // has to exist before the session starts, and the message loop below
    // is what drives delivery.
    {
        let options = DispatcherQueueOptions {
            dwSize: size_of::<DispatcherQueueOptions>() as u32,
            threadType: DQTYPE_THREAD_CURRENT,
            apartmentType: DQTAT_COM_NONE,
        };
        let _controller = unsafe { CreateDispatcherQueueController(options) }
            .context("CreateDispatcherQueueController failed")?;

        let arrived = Arc::new(AtomicBool::new(false));
        let arrived_in_callback = arrived.clone();
        capturer.start_monitor(&monitor, ThreadingModel::Affine, move |frame| {
            if arrived_in_callback.swap(true, Ordering::SeqCst) {
                return;
            }
            if let Err(error) = save_frame(&frame, "./graphics-capture-affine.png") {
                eprintln!("affine frame save failed: {error:#}");
            }
        })?;

        let mut msg = MSG::default();
        while !arrived.load(Ordering::SeqCst) {
            if unsafe { GetMessageW(&mut msg, HWND::default(), 0, 0) }.as_bool() {
                let _ = unsafe { TranslateMessage(&msg) };
                unsafe { DispatchMessageW(&msg) };
            }
        }

        // Affine teardown must happen on this thread, the one that started
        // the session.
        capturer.stop();
        println!("Saved ./graphics-capture-affine.png");
    }

    // Free-threaded: the callback runs on a worker thread and hands
    // completion back through a condvar.
    {
        let pair = Arc::new((Mutex::new(false), Condvar::new()));
        let pair_in_callback = pair.clone();
        capturer.start_monitor(&monitor, ThreadingModel::FreeThreaded, move |frame| {
            let (done, cond) = &*pair_in_callback;
            let mut done = done.lock().unwrap();
            if *done {
                return;
            }
            if let Err(error) = save_frame(&frame, "./graphics-capture-free-threaded.png") {
                eprintln!("free-threaded frame save failed: {error:#}");
            }
            *done = true;
            cond.notify_one();
        })?;

        let (done, cond) = &*pair;
        let mut done = done.lock().unwrap();
        while !*done {
            done = cond.wait(done).unwrap();
        }
        drop(done);

        capturer.stop();
        println!("Saved ./graphics-capture-free-threaded.png");
    }

    Ok(())
}
