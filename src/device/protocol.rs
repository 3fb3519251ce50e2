//! Wire protocol for the original 15-key Stream Deck
//!
//! Key indices are 0-based, left-to-right, top-to-bottom. The device itself
//! numbers keys from 1; the only place that number appears is byte 5 of the
//! two image page headers.
//!
//! Everything in this module is pure data and pure functions; the driver in
//! `manager.rs` owns the transport and decides when the reports go out.

use crate::error::{DeckError, Result};

/// USB vendor ID (Elgato)
pub const VENDOR_ID: u16 = 0x0fd9;

/// USB product ID for the original 15-key Stream Deck
pub const PRODUCT_ID: u16 = 0x0060;

/// Number of keys on the grid
pub const KEY_COUNT: u8 = 15;

/// Key grid columns
pub const KEY_COLS: u8 = 5;

/// Key grid rows
pub const KEY_ROWS: u8 = 3;

/// Key image width in pixels
pub const KEY_WIDTH: u32 = 72;

/// Key image height in pixels
pub const KEY_HEIGHT: u32 = 72;

/// Bytes per pixel; channel order is BGR
pub const KEY_PIXEL_DEPTH: u32 = 3;

/// Exact byte length of one key image buffer (72x72 BGR)
pub const KEY_IMAGE_SIZE: usize = (KEY_WIDTH * KEY_HEIGHT * KEY_PIXEL_DEPTH) as usize;

/// Pixel bytes carried by page 1 (2583 pixels); the remainder goes in page 2
pub const PAGE1_PIXEL_BYTES: usize = 2583 * 3;

/// Input report length: report-type marker plus one state byte per key,
/// padded to 17 bytes
pub const INPUT_REPORT_LEN: usize = 17;

/// Byte offset where both page headers carry the 1-based key number
const KEY_NUMBER_OFFSET: usize = 5;

/// Page 1 header template. Bytes 16.. are a BMP file header the firmware
/// expects verbatim for a 72x72 24-bit image.
const PAGE1_HEADER: [u8; 70] = [
    0x02, 0x01, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, //
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //
    0x42, 0x4d, 0xf6, 0x3c, 0x00, 0x00, 0x00, 0x00, //
    0x00, 0x00, 0x36, 0x00, 0x00, 0x00, 0x28, 0x00, //
    0x00, 0x00, 0x48, 0x00, 0x00, 0x00, 0x48, 0x00, //
    0x00, 0x00, 0x01, 0x00, 0x18, 0x00, 0x00, 0x00, //
    0x00, 0x00, 0xc0, 0x3c, 0x00, 0x00, 0xc4, 0x0e, //
    0x00, 0x00, 0xc4, 0x0e, 0x00, 0x00, 0x00, 0x00, //
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Page 2 header template. Byte 2 is the page number, byte 4 the last-page
/// flag.
const PAGE2_HEADER: [u8; 16] = [
    0x02, 0x01, 0x02, 0x00, 0x01, 0x00, 0x00, 0x00, //
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Display brightness, normalized to a whole percentage in [0, 100].
///
/// Accepts a fraction in [0.0, 1.0] (scaled x100) as well as integer
/// percentages; out-of-range input clamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Brightness(u8);

impl Brightness {
    pub fn percent(self) -> u8 {
        self.0
    }
}

impl From<f64> for Brightness {
    fn from(fraction: f64) -> Self {
        Brightness(((fraction * 100.0) as i64).clamp(0, 100) as u8)
    }
}

impl From<i32> for Brightness {
    fn from(percent: i32) -> Self {
        Brightness(percent.clamp(0, 100) as u8)
    }
}

impl From<u8> for Brightness {
    fn from(percent: u8) -> Self {
        Brightness(percent.min(100))
    }
}

/// Whether `key` addresses a key on the grid.
pub fn is_valid_key(key: u8) -> bool {
    key < KEY_COUNT
}

pub(crate) fn check_key(key: u8) -> Result<()> {
    if is_valid_key(key) {
        Ok(())
    } else {
        Err(DeckError::InvalidKeyIndex(key))
    }
}

/// Frame one key image into the two output reports the device expects.
///
/// The key index and the exact buffer length are validated before any bytes
/// are produced. Byte 5 of each header is patched with the 1-based key
/// number; the payload splits at [`PAGE1_PIXEL_BYTES`].
pub fn image_report_pages(key: u8, image: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
    check_key(key)?;
    if image.len() != KEY_IMAGE_SIZE {
        return Err(DeckError::InvalidImageSize {
            expected: KEY_IMAGE_SIZE,
            actual: image.len(),
        });
    }

    let key_number = key + 1;

    let mut page1 = Vec::with_capacity(PAGE1_HEADER.len() + PAGE1_PIXEL_BYTES);
    page1.extend_from_slice(&PAGE1_HEADER);
    page1[KEY_NUMBER_OFFSET] = key_number;
    page1.extend_from_slice(&image[..PAGE1_PIXEL_BYTES]);

    let mut page2 = Vec::with_capacity(PAGE2_HEADER.len() + (KEY_IMAGE_SIZE - PAGE1_PIXEL_BYTES));
    page2.extend_from_slice(&PAGE2_HEADER);
    page2[KEY_NUMBER_OFFSET] = key_number;
    page2.extend_from_slice(&image[PAGE1_PIXEL_BYTES..]);

    Ok((page1, page2))
}

/// Decode an input report into one boolean per key.
///
/// Byte 0 is the report-type marker and is ignored; bytes 1..=[`KEY_COUNT`]
/// carry per-key state, non-zero meaning pressed. Reports shorter than
/// expected read the missing keys as released. Empty reads (timeouts) never
/// reach this function; the poll loop skips those cycles.
pub fn decode_key_states(report: &[u8]) -> Vec<bool> {
    let mut states = vec![false; KEY_COUNT as usize];
    for (state, byte) in states.iter_mut().zip(report.iter().skip(1)) {
        *state = *byte != 0;
    }
    states
}

/// Build the 17-byte brightness feature report.
pub fn brightness_report(level: Brightness) -> [u8; 17] {
    let mut report = [0u8; 17];
    report[..6].copy_from_slice(&[0x05, 0x55, 0xaa, 0xd1, 0x01, level.percent()]);
    report
}
