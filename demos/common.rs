use std::path::Path;

use anyhow::Result;

/// Write BGRA pixels to a PNG.
///
/// `stride` is the distance between rows in bytes and may exceed
/// `width * 4`. Set `flip_vertically` for bottom-up sources; the capture
/// backends in this crate all produce top-down rows.
pub fn save_png(
    path: &Path,
    width: u32,
    height: u32,
    stride: usize,
    bytes: &[u8],
    flip_vertically: bool,
) -> Result<()> {
    let row_len = width as usize * 4;
    let mut rgba = vec![0u8; row_len * height as usize];
    for row in 0..height as usize {
        let src_row = if flip_vertically {
            height as usize - 1 - row
        } else {
            row
        };
        let src = &bytes[src_row * stride..src_row * stride + row_len];
        let dst = &mut rgba[row * row_len..][..row_len];
        for (dst_px, src_px) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
            dst_px[0] = src_px[2];
            dst_px[1] = src_px[1];
            dst_px[2] = src_px[0];
            // Desktop surfaces often carry zero alpha; force opaque output.
            dst_px[3] = 255;
        }
    }

    image::save_buffer(path, &rgba, width, height, image::ColorType::Rgba8)
        .map_err(|e| anyhow::anyhow!("failed to write PNG to {}: {e}", path.display()))
}
