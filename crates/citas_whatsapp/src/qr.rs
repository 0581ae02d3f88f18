//! Renders gateway pairing strings as PNG data URLs for the browser.

use base64::{engine::general_purpose::STANDARD, Engine};
use image::{codecs::png::PngEncoder, ExtendedColorType, GrayImage, ImageEncoder, Luma};
use qrcode::{Color, QrCode};

use crate::error::QrError;

/// Pixels per QR module.
const MODULE_PX: u32 = 8;
/// Quiet-zone border, in modules.
const QUIET_ZONE: u32 = 4;

pub fn qr_png(text: &str) -> Result<Vec<u8>, QrError> {
    let code = QrCode::new(text.as_bytes())?;
    let width = code.width() as u32;
    let colors = code.to_colors();
    let size = (width + QUIET_ZONE * 2) * MODULE_PX;

    let mut img = GrayImage::from_pixel(size, size, Luma([255u8]));
    for (index, color) in colors.iter().enumerate() {
        if *color != Color::Dark {
            continue;
        }
        let index = index as u32;
        let left = (index % width + QUIET_ZONE) * MODULE_PX;
        let top = (index / width + QUIET_ZONE) * MODULE_PX;
        for dy in 0..MODULE_PX {
            for dx in 0..MODULE_PX {
                img.put_pixel(left + dx, top + dy, Luma([0u8]));
            }
        }
    }

    let mut png = Vec::new();
    PngEncoder::new(&mut png).write_image(img.as_raw(), size, size, ExtendedColorType::L8)?;
    Ok(png)
}

/// `data:image/png;base64,…` for `text`.
pub fn qr_data_url(text: &str) -> Result<String, QrError> {
    let png = qr_png(text)?;
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
}
