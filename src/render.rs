//! Column rendering and compositing.
//!
//! [`render_column`] turns one sampled frame into a column image according
//! to a [`Style`]; [`composite_bgra`] writes a rendered column into the
//! packed output buffer. Geometry is delegated to the `image` crate.

use image::{DynamicImage, imageops::FilterType};

use crate::style::Style;

/// Aspect-preserving width of a frame scaled to `track_height`, with a
/// 1-pixel floor so degenerate frames still produce a column.
pub(crate) fn thumbnail_width(frame: &DynamicImage, track_height: u32) -> u32 {
    if frame.height() == 0 {
        return 1;
    }
    ((frame.width() as u64 * track_height as u64) / frame.height() as u64).max(1) as u32
}

/// Render one sampled frame into a column image of height `track_height`.
///
/// `x` is the output column being rendered; only [`Style::Slitscan`] uses
/// it, to sweep the slit across the frame. All styles except
/// [`Style::Thumbnails`] produce a 1-pixel-wide column.
pub(crate) fn render_column(
    style: Style,
    frame: &DynamicImage,
    track_height: u32,
    x: u32,
) -> DynamicImage {
    match style {
        Style::Horizontal => frame.resize_exact(1, track_height, FilterType::Triangle),
        Style::Vertical => frame
            .resize_exact(track_height, 1, FilterType::Triangle)
            .rotate90(),
        Style::Thumbnails => {
            frame.resize_exact(thumbnail_width(frame, track_height), track_height, FilterType::Triangle)
        }
        Style::Slitscan => {
            let thumb_width = thumbnail_width(frame, track_height);
            let relative = (x % thumb_width) as f64 / thumb_width as f64;
            extract_slit(frame, relative).resize_exact(1, track_height, FilterType::Triangle)
        }
        Style::MiddleColumn => {
            extract_slit(frame, 0.5).resize_exact(1, track_height, FilterType::Triangle)
        }
        Style::Spectrogram => frame.resize_exact(1, track_height, FilterType::Triangle),
    }
}

/// Extract the 1-pixel-wide vertical slit at relative position
/// `relative_x` in `0.0..1.0`.
fn extract_slit(frame: &DynamicImage, relative_x: f64) -> DynamicImage {
    let slit_x = ((frame.width() as f64 * relative_x) as u32).min(frame.width().saturating_sub(1));
    frame.crop_imm(slit_x, 0, 1, frame.height())
}

/// Composite a rendered column into the packed output buffer at
/// `(x, y_offset)`.
///
/// The buffer is row-major, 4 bytes per pixel in B,G,R,A order,
/// `buffer_width * buffer_height * 4` bytes total. Pixels falling outside
/// the buffer are clipped.
pub(crate) fn composite_bgra(
    buffer: &mut [u8],
    buffer_width: u32,
    buffer_height: u32,
    column: &DynamicImage,
    x: u32,
    y_offset: u32,
) {
    let rgba = column.to_rgba8();
    for (column_x, column_y, pixel) in rgba.enumerate_pixels() {
        let target_x = x + column_x;
        let target_y = y_offset + column_y;
        if target_x >= buffer_width || target_y >= buffer_height {
            continue;
        }
        let offset = 4 * (target_y as usize * buffer_width as usize + target_x as usize);
        let [r, g, b, a] = pixel.0;
        buffer[offset] = b;
        buffer[offset + 1] = g;
        buffer[offset + 2] = r;
        buffer[offset + 3] = a;
    }
}
