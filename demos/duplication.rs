//! Desktop duplication capture: poll monitor 0 until the desktop changes,
//! then save the frame as a PNG.

#[cfg(target_os = "windows")]
mod common;

#[cfg(not(target_os = "windows"))]
fn main() {
    eprintln!("the duplication demo only runs on Windows");
}

#[cfg(target_os = "windows")]
fn main() -> anyhow::Result<()> {
    use std::path::Path;

    use anyhow::Result;
    use rime_capture::{DuplicationCapturer, GpuFrame, readback};

    fn save_frame(frame: &GpuFrame<'_>) -> Result<()> {
        let mut saved = Ok(());
        readback::read_texture(frame.texture(), frame.width(), frame.height(), |bytes, stride| {
            saved = common::save_png(
                Path::new("./duplication.png"),
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

    let mut capturer = DuplicationCapturer::new()?;
    capturer.start(0)?;

    // A timeout just means nothing on screen changed yet; keep polling.
    let mut saved: Option<Result<()>> = None;
    while saved.is_none() {
        capturer.poll(500, |frame| {
            println!("Captured {}x{}", frame.width(), frame.height());
            saved = Some(save_frame(&frame));
        })?;
    }
    capturer.stop();

    saved.expect("loop exits only after a frame arrived")?;
    println!("Saved ./duplication.png");
    Ok(())
}
