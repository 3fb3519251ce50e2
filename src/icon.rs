//! Icon loading: turns an image file into the raw BGR buffer a key wants
//!
//! The driver itself only validates buffer length; everything about
//! decoding, resizing, and channel order lives here.

use std::path::Path;

use image::imageops::FilterType;

use crate::device::protocol::{KEY_HEIGHT, KEY_IMAGE_SIZE, KEY_WIDTH};
use crate::error::Result;

/// Load an image file and convert it to a 72x72 BGR key buffer.
///
/// `mirror` flips the image horizontally; the device renders key images
/// mirrored, so callers usually want `true`.
pub fn load_key_image(path: impl AsRef<Path>, mirror: bool) -> Result<Vec<u8>> {
    let decoded = image::open(path)?;
    let resized = decoded.resize_exact(KEY_WIDTH, KEY_HEIGHT, FilterType::Triangle);
    let oriented = if mirror { resized.fliph() } else { resized };
    let rgb = oriented.to_rgb8();

    let mut buffer = Vec::with_capacity(KEY_IMAGE_SIZE);
    for pixel in rgb.pixels() {
        let [r, g, b] = pixel.0;
        buffer.extend_from_slice(&[b, g, r]);
    }
    Ok(buffer)
}

/// Produce a solid-color key buffer, e.g. for placeholder keys.
pub fn solid_key_image(r: u8, g: u8, b: u8) -> Vec<u8> {
    [b, g, r].repeat(KEY_IMAGE_SIZE / 3)
}
