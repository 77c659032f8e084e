//! Raster images → one centred PDF page each.
//!
//! Every image gets its own A4 portrait page (595.28 × 841.89 pt). The image
//! is scaled, up or down, to the largest size that fits inside the page minus
//! a margin of 10% of the page width on each side, keeping its aspect ratio,
//! and is centred on the page.
//!
//! Pixels are re-encoded as 8-bit RGB (Flate-compressed by the assembler);
//! a non-opaque alpha channel becomes a separate DeviceGray soft mask.

use crate::error::ItemError;
use crate::pipeline::classify::ImageFormat;
use std::io::Write as _;
use tracing::debug;

/// Page width in PDF points.
pub const PAGE_WIDTH: f32 = 595.28;
/// Page height in PDF points.
pub const PAGE_HEIGHT: f32 = 841.89;
/// Margin on every side, as a fraction of the page width.
pub const MARGIN_RATIO: f32 = 0.1;

/// A decoded image ready to embed.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    /// Row-major RGB, 3 bytes per pixel.
    pub rgb: Vec<u8>,
    /// Row-major alpha, 1 byte per pixel; `None` when fully opaque.
    pub alpha: Option<Vec<u8>>,
}

/// Where the image is drawn on the page, in points from the bottom-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Decode PNG or JPEG bytes.
pub fn decode(data: &[u8], format: ImageFormat) -> Result<DecodedImage, ItemError> {
    let fmt = match format {
        ImageFormat::Png => image::ImageFormat::Png,
        ImageFormat::Jpeg => image::ImageFormat::Jpeg,
    };
    let img = image::load_from_memory_with_format(data, fmt).map_err(|e| ItemError::ImageDecode {
        detail: e.to_string(),
    })?;

    let (width, height) = (img.width(), img.height());
    if width == 0 || height == 0 {
        return Err(ItemError::ImageDecode {
            detail: format!("image has no pixels ({width}x{height})"),
        });
    }

    let alpha = if img.color().has_alpha() {
        let a: Vec<u8> = img.to_rgba8().pixels().map(|p| p.0[3]).collect();
        if a.iter().all(|&v| v == u8::MAX) {
            None
        } else {
            Some(a)
        }
    } else {
        None
    };

    debug!(
        "Decoded {:?} image {}x{} (alpha: {})",
        format,
        width,
        height,
        alpha.is_some()
    );

    Ok(DecodedImage {
        width,
        height,
        rgb: img.to_rgb8().into_raw(),
        alpha,
    })
}

/// Scale an image of `width × height` pixels to fit the page's margin box.
pub fn fit_on_page(width: u32, height: u32) -> Placement {
    let margin = PAGE_WIDTH * MARGIN_RATIO;
    let max_width = PAGE_WIDTH - margin * 2.0;
    let max_height = PAGE_HEIGHT - margin * 2.0;

    let (w, h) = (width as f32, height as f32);
    let scale = (max_width / w).min(max_height / h);
    let (dw, dh) = (w * scale, h * scale);

    Placement {
        x: PAGE_WIDTH / 2.0 - dw / 2.0,
        y: PAGE_HEIGHT / 2.0 - dh / 2.0,
        width: dw,
        height: dh,
    }
}

/// Content stream that paints XObject `name` at `placement`.
pub fn draw_operations(placement: &Placement, name: &str) -> Vec<u8> {
    let mut ops = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = write!(
        ops,
        "q\n{:.4} 0 0 {:.4} {:.4} {:.4} cm\n/{} Do\nQ\n",
        placement.width, placement.height, placement.x, placement.y, name
    );
    ops
}
