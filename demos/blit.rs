//! One-shot GDI blit capture of the primary monitor, saved as a PNG.

#[cfg(target_os = "windows")]
mod common;

#[cfg(not(target_os = "windows"))]
fn main() {
    eprintln!("the blit demo only runs on Windows");
}

#[cfg(target_os = "windows")]
fn main() -> anyhow::Result<()> {
    use std::path::Path;
    use std::time::Instant;

    use anyhow::Context;
    use rime_capture::{blit, monitor};

    tracing_subscriber::fmt::init();

    let monitor = monitor::primary_monitor().context("failed to find the primary monitor")?;
    println!("Capturing {monitor} via GDI blit");

    let begin = Instant::now();
    let mut saved = None;
    blit::capture_monitor(&monitor, |frame| {
        println!(
            "Captured {}x{} in {:.3} ms",
            frame.width(),
            frame.height(),
            begin.elapsed().as_secs_f64() * 1000.0
        );
        saved = Some(common::save_png(
            Path::new("./blit.png"),
            frame.width(),
            frame.height(),
            frame.stride(),
            frame.data(),
            false,
        ));
    })?;

    saved.context("capture returned without delivering a frame")??;
    println!("Saved ./blit.png");
    Ok(())
}
