//! Raw HID transport and device discovery
//!
//! The driver talks to the device through the narrow [`Transport`] trait so
//! tests can substitute a scripted implementation. The real implementation
//! serializes handle access behind a mutex; the poll loop's short read
//! timeout bounds how long a caller-thread write can be held up by a read
//! in flight.

use std::ffi::CString;
use std::sync::Arc;

use hidapi::{HidApi, HidDevice};
use parking_lot::Mutex;
use tracing::debug;

use super::protocol::{PRODUCT_ID, VENDOR_ID};
use crate::error::{DeckError, Result};

/// Capability interface the driver consumes.
pub trait Transport: Send + Sync {
    /// Blocking read with a timeout in milliseconds. Returns 0 when the
    /// timeout expires without data.
    fn read_timeout(&self, buf: &mut [u8], timeout_ms: i32) -> Result<usize>;

    /// Write one output report; returns the number of bytes written.
    fn write(&self, data: &[u8]) -> Result<usize>;

    /// Send one feature report.
    fn send_feature_report(&self, data: &[u8]) -> Result<()>;
}

/// Produces a fresh transport handle for one enumerated device path.
///
/// `Deck::open` calls this on every open so a close/reopen cycle acquires a
/// new handle.
pub(crate) type TransportFactory = Box<dyn Fn() -> Result<Arc<dyn Transport>> + Send + Sync>;

struct HidTransport {
    device: Mutex<HidDevice>,
}

impl Transport for HidTransport {
    fn read_timeout(&self, buf: &mut [u8], timeout_ms: i32) -> Result<usize> {
        Ok(self.device.lock().read_timeout(buf, timeout_ms)?)
    }

    fn write(&self, data: &[u8]) -> Result<usize> {
        Ok(self.device.lock().write(data)?)
    }

    fn send_feature_report(&self, data: &[u8]) -> Result<()> {
        Ok(self.device.lock().send_feature_report(data)?)
    }
}

/// Identity of one attached unit, captured at enumeration time.
#[derive(Debug, Clone)]
pub struct DeckInfo {
    /// Platform-specific enumeration path used to open the device
    pub path: CString,
    pub serial_number: Option<String>,
    pub product: Option<String>,
}

/// Enumerate attached Stream Decks without opening them.
pub(crate) fn enumerate(api: &HidApi) -> Vec<DeckInfo> {
    let decks: Vec<DeckInfo> = api
        .device_list()
        .filter(|info| info.vendor_id() == VENDOR_ID && info.product_id() == PRODUCT_ID)
        .map(|info| DeckInfo {
            path: info.path().to_owned(),
            serial_number: info.serial_number().map(str::to_string),
            product: info.product_string().map(str::to_string),
        })
        .collect();
    debug!("Enumerated {} deck(s)", decks.len());
    decks
}

/// Build the factory that opens `info`'s path on the shared HID context.
pub(crate) fn hid_factory(api: Arc<Mutex<HidApi>>, info: &DeckInfo) -> TransportFactory {
    let path = info.path.clone();
    Box::new(move || {
        let api = api.lock();
        let device = api
            .open_path(&path)
            .map_err(|e| DeckError::DeviceUnavailable(e.to_string()))?;
        Ok(Arc::new(HidTransport {
            device: Mutex::new(device),
        }) as Arc<dyn Transport>)
    })
}
