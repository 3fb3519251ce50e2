//! Device driver for one attached deck
//!
//! A [`Deck`] owns the transport handle, the background polling thread, the
//! last-observed key states, and the per-key callback registry. All methods
//! take `&self`; callers share a deck across threads with `Arc<Deck>`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use hidapi::HidApi;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::protocol::{self, Brightness, INPUT_REPORT_LEN, KEY_COUNT, KEY_IMAGE_SIZE};
use super::transport::{self, DeckInfo, Transport};
use super::TransportFactory;
use crate::error::{DeckError, Result};

/// Handler invoked with `(key, old_state, new_state)` on the polling
/// thread. Handlers run synchronously; a slow handler delays the next poll
/// cycle.
pub type KeyCallback = Arc<dyn Fn(u8, bool, bool) + Send + Sync>;

/// Poll read timeout; also bounds how quickly the loop observes the stop
/// flag after `close`.
const READ_TIMEOUT_MS: i32 = 20;

/// Consecutive read failures before the poll loop gives the device up.
const DISCONNECT_THRESHOLD: u32 = 3;

/// Driver handle for one enumerated deck.
pub struct Deck {
    info: DeckInfo,
    factory: TransportFactory,
    transport: Mutex<Option<Arc<dyn Transport>>>,
    key_states: Arc<Mutex<Vec<bool>>>,
    callbacks: Arc<Mutex<Vec<Vec<KeyCallback>>>>,
    poll_running: Arc<AtomicBool>,
    poll_thread: Mutex<Option<JoinHandle<()>>>,
}

impl Deck {
    /// Enumerate attached decks. The devices are returned unopened; call
    /// [`Deck::open`] before any I/O.
    pub fn enumerate() -> Result<Vec<Deck>> {
        let api = HidApi::new().map_err(|e| DeckError::DeviceUnavailable(e.to_string()))?;
        let infos = transport::enumerate(&api);
        let api = Arc::new(Mutex::new(api));

        Ok(infos
            .into_iter()
            .map(|info| {
                let factory = transport::hid_factory(Arc::clone(&api), &info);
                Deck::with_factory(info, factory)
            })
            .collect())
    }

    pub(crate) fn with_factory(info: DeckInfo, factory: TransportFactory) -> Deck {
        Deck {
            info,
            factory,
            transport: Mutex::new(None),
            key_states: Arc::new(Mutex::new(vec![false; KEY_COUNT as usize])),
            callbacks: Arc::new(Mutex::new(vec![Vec::new(); KEY_COUNT as usize])),
            poll_running: Arc::new(AtomicBool::new(false)),
            poll_thread: Mutex::new(None),
        }
    }

    pub fn info(&self) -> &DeckInfo {
        &self.info
    }

    pub fn is_open(&self) -> bool {
        self.transport.lock().is_some()
    }

    /// Acquire the transport handle and start the polling loop.
    ///
    /// Fails with [`DeckError::DeviceUnavailable`] if the handle cannot be
    /// acquired; the loop is not started in that case. Opening an
    /// already-open deck is a no-op.
    pub fn open(&self) -> Result<()> {
        let mut slot = self.transport.lock();
        if slot.is_some() {
            return Ok(());
        }

        let transport = (self.factory)()?;
        *slot = Some(Arc::clone(&transport));
        drop(slot);

        self.poll_running.store(true, Ordering::Release);
        let key_states = Arc::clone(&self.key_states);
        let callbacks = Arc::clone(&self.callbacks);
        let running = Arc::clone(&self.poll_running);
        let handle = thread::Builder::new()
            .name("keydeck-poll".to_string())
            .spawn(move || poll_loop(transport, key_states, callbacks, running))?;
        *self.poll_thread.lock() = Some(handle);

        info!(
            "Opened deck {}",
            self.info.product.as_deref().unwrap_or("(unnamed)")
        );
        Ok(())
    }

    /// Signal the polling loop to stop, wait for it, then release the
    /// handle. Closing an already-closed deck is a no-op.
    pub fn close(&self) {
        self.poll_running.store(false, Ordering::Release);
        if let Some(handle) = self.poll_thread.lock().take() {
            let _ = handle.join();
        }
        if self.transport.lock().take().is_some() {
            info!("Closed deck");
        }
    }

    /// Set the global display brightness.
    ///
    /// Accepts a fraction (`0.5`) or an integer percentage (`50`); values
    /// clamp to [0, 100].
    pub fn set_brightness(&self, level: impl Into<Brightness>) -> Result<()> {
        let report = protocol::brightness_report(level.into());
        self.transport()?.send_feature_report(&report)
    }

    /// Set one key's image to a 72x72 BGR buffer; `None` renders black.
    ///
    /// The buffer must be exactly [`KEY_IMAGE_SIZE`] bytes or the call
    /// fails before anything is written. A failure between the two page
    /// writes leaves the key in an inconsistent state; retrying the call
    /// re-sends both pages.
    pub fn set_key_image(&self, key: u8, image: Option<&[u8]>) -> Result<()> {
        let black;
        let pixels = match image {
            Some(buffer) => buffer,
            None => {
                black = vec![0u8; KEY_IMAGE_SIZE];
                &black[..]
            }
        };

        let (page1, page2) = protocol::image_report_pages(key, pixels)?;
        let transport = self.transport()?;
        transport.write(&page1)?;
        transport.write(&page2)?;
        Ok(())
    }

    /// Clear one key to black.
    pub fn clear_key_image(&self, key: u8) -> Result<()> {
        self.set_key_image(key, None)
    }

    /// Clear every key, in index order.
    pub fn clear_all(&self) -> Result<()> {
        for key in 0..KEY_COUNT {
            self.clear_key_image(key)?;
        }
        Ok(())
    }

    /// Register a handler for one key's state changes.
    ///
    /// Registration has set semantics keyed by `Arc` identity: adding the
    /// same handle twice is a no-op. Handlers fire on the polling thread.
    pub fn add_key_callback(&self, key: u8, callback: KeyCallback) -> Result<()> {
        protocol::check_key(key)?;
        let mut registry = self.callbacks.lock();
        let slot = &mut registry[key as usize];
        if !slot.iter().any(|existing| Arc::ptr_eq(existing, &callback)) {
            slot.push(callback);
        }
        Ok(())
    }

    /// Unregister a handler. Removing one that was never added is a no-op.
    pub fn remove_key_callback(&self, key: u8, callback: &KeyCallback) -> Result<()> {
        protocol::check_key(key)?;
        self.callbacks.lock()[key as usize].retain(|existing| !Arc::ptr_eq(existing, callback));
        Ok(())
    }

    /// Copy of the last key states observed by the polling loop.
    pub fn key_states(&self) -> Vec<bool> {
        self.key_states.lock().clone()
    }

    fn transport(&self) -> Result<Arc<dyn Transport>> {
        self.transport
            .lock()
            .clone()
            .ok_or_else(|| DeckError::DeviceUnavailable("device is not open".to_string()))
    }
}

impl Drop for Deck {
    fn drop(&mut self) {
        self.close();
    }
}

/// Background loop: read, decode, diff, dispatch, store.
///
/// Owns its own `Arc` to the transport so the handle outlives the loop even
/// while `close` is tearing the slot down; `close` joins before the slot is
/// released, so the handle is never used after release.
fn poll_loop(
    transport: Arc<dyn Transport>,
    key_states: Arc<Mutex<Vec<bool>>>,
    callbacks: Arc<Mutex<Vec<Vec<KeyCallback>>>>,
    running: Arc<AtomicBool>,
) {
    debug!("Polling loop started");
    let mut buf = [0u8; INPUT_REPORT_LEN];
    let mut consecutive_errors = 0u32;

    while running.load(Ordering::Acquire) {
        let len = match transport.read_timeout(&mut buf, READ_TIMEOUT_MS) {
            Ok(len) => {
                consecutive_errors = 0;
                len
            }
            Err(e) => {
                consecutive_errors += 1;
                if consecutive_errors >= DISCONNECT_THRESHOLD {
                    warn!(
                        "Giving up on device after {} read failures: {}",
                        consecutive_errors, e
                    );
                    break;
                }
                debug!("Transient read failure: {}", e);
                continue;
            }
        };

        // Timeout with no data: leave the last states untouched, fire nothing.
        if len == 0 {
            continue;
        }

        let new_states = protocol::decode_key_states(&buf[..len]);
        dispatch_changes(&key_states, &callbacks, new_states);
    }
    debug!("Polling loop stopped");
}

/// Deliver change events for one decoded report, ascending by key index,
/// then replace the stored vector.
fn dispatch_changes(
    key_states: &Mutex<Vec<bool>>,
    callbacks: &Mutex<Vec<Vec<KeyCallback>>>,
    new_states: Vec<bool>,
) {
    let old_states = key_states.lock().clone();

    for (key, (&old_state, &new_state)) in old_states.iter().zip(new_states.iter()).enumerate() {
        if old_state == new_state {
            continue;
        }
        // Snapshot the slot so a handler may mutate the registry mid-dispatch.
        let handlers: Vec<KeyCallback> = callbacks.lock()[key].clone();
        for handler in &handlers {
            handler(key as u8, old_state, new_state);
        }
    }

    *key_states.lock() = new_states;
}
