//! Menu manager: owns the named menus and routes key events to the active
//! one
//!
//! The manager is the single subscriber to the deck's per-key callbacks.
//! Its dispatcher runs on the polling thread and forwards each state change
//! to the current menu, which hands it to the button in that slot.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::debug;

use crate::device::protocol::KEY_COUNT;
use crate::device::{Deck, KeyCallback};
use crate::error::{DeckError, Result};

use super::store::{ButtonEntry, MenuEntry, MenuLayout};
use super::Menu;

#[derive(Default)]
struct MenuSet {
    menus: HashMap<String, Menu>,
    current: Option<String>,
}

/// Routes the deck's key events into the active [`Menu`].
pub struct MenuManager {
    deck: Arc<Deck>,
    shared: Arc<Mutex<MenuSet>>,
    dispatcher: KeyCallback,
}

impl MenuManager {
    /// Create a manager and subscribe its dispatcher to every key on the
    /// deck. Dropping the manager unsubscribes it again.
    pub fn new(deck: Arc<Deck>) -> Result<Self> {
        let shared = Arc::new(Mutex::new(MenuSet::default()));

        let dispatcher: KeyCallback = {
            let shared = Arc::clone(&shared);
            Arc::new(move |key, old_state, new_state| {
                let mut set = shared.lock();
                // No active menu: drop the event.
                if let Some(id) = set.current.clone() {
                    if let Some(menu) = set.menus.get_mut(&id) {
                        menu.handle_key_event(key, old_state, new_state);
                    }
                }
            })
        };

        for key in 0..KEY_COUNT {
            deck.add_key_callback(key, Arc::clone(&dispatcher))?;
        }

        Ok(Self {
            deck,
            shared,
            dispatcher,
        })
    }

    pub fn deck(&self) -> &Arc<Deck> {
        &self.deck
    }

    /// Insert or replace a named menu.
    pub fn add_menu(&self, id: impl Into<String>, menu: Menu) {
        let id = id.into();
        debug!("Adding menu {:?}", id);
        self.shared.lock().menus.insert(id, menu);
    }

    /// Make `id` the active menu without touching the display.
    pub fn set_current(&self, id: &str) -> Result<()> {
        let mut set = self.shared.lock();
        if !set.menus.contains_key(id) {
            return Err(DeckError::UnknownMenu(id.to_string()));
        }
        set.current = Some(id.to_string());
        Ok(())
    }

    /// Switch to `id` and clear the key surface, as [`Menu::open`] does.
    /// Icon rendering for the new menu stays with the caller.
    pub fn open_menu(&self, id: &str) -> Result<()> {
        self.set_current(id)?;
        debug!("Opened menu {:?}", id);
        self.deck.clear_all()
    }

    pub fn current(&self) -> Option<String> {
        self.shared.lock().current.clone()
    }

    /// Drive time-based button transitions on the active menu. Call this
    /// periodically from the application loop.
    pub fn tick(&self) {
        let now = Instant::now();
        let mut set = self.shared.lock();
        if let Some(id) = set.current.clone() {
            if let Some(menu) = set.menus.get_mut(&id) {
                menu.tick_at(now);
            }
        }
    }

    /// Run `f` against a named menu, e.g. to add or replace buttons after
    /// construction.
    pub fn with_menu<T>(&self, id: &str, f: impl FnOnce(&mut Menu) -> T) -> Result<T> {
        let mut set = self.shared.lock();
        let menu = set
            .menus
            .get_mut(id)
            .ok_or_else(|| DeckError::UnknownMenu(id.to_string()))?;
        Ok(f(menu))
    }

    /// Stable, serializable view of the menu tree for persistence
    /// collaborators.
    pub fn snapshot(&self) -> MenuLayout {
        let set = self.shared.lock();
        let menus = set
            .menus
            .iter()
            .map(|(id, menu)| {
                let buttons = (0..KEY_COUNT)
                    .filter_map(|key| {
                        menu.button(key).map(|button| ButtonEntry {
                            key,
                            icon: button.icon_path().map(Path::to_path_buf),
                        })
                    })
                    .collect();
                (id.clone(), MenuEntry { buttons })
            })
            .collect();

        MenuLayout {
            current: set.current.clone(),
            menus,
        }
    }
}

impl Drop for MenuManager {
    fn drop(&mut self) {
        for key in 0..KEY_COUNT {
            let _ = self.deck.remove_key_callback(key, &self.dispatcher);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::protocol::INPUT_REPORT_LEN;
    use crate::device::{DeckInfo, Transport, TransportFactory};
    use crate::menu::{Button, ButtonBehavior};
    use std::collections::VecDeque;
    use std::ffi::CString;
    use std::path::PathBuf;
    use std::time::Duration;

    /// Minimal scripted transport: serves queued input reports, then
    /// times out forever.
    struct ScriptedTransport {
        reads: Mutex<VecDeque<Vec<u8>>>,
    }

    impl Transport for ScriptedTransport {
        fn read_timeout(&self, buf: &mut [u8], _timeout_ms: i32) -> crate::error::Result<usize> {
            match self.reads.lock().pop_front() {
                Some(report) => {
                    buf[..report.len()].copy_from_slice(&report);
                    Ok(report.len())
                }
                None => {
                    std::thread::sleep(Duration::from_millis(1));
                    Ok(0)
                }
            }
        }

        fn write(&self, data: &[u8]) -> crate::error::Result<usize> {
            Ok(data.len())
        }

        fn send_feature_report(&self, _data: &[u8]) -> crate::error::Result<()> {
            Ok(())
        }
    }

    fn scripted_deck(reads: Vec<Vec<u8>>) -> Arc<Deck> {
        let transport = Arc::new(ScriptedTransport {
            reads: Mutex::new(reads.into()),
        });
        let factory: TransportFactory =
            Box::new(move || Ok(Arc::clone(&transport) as Arc<dyn Transport>));
        let info = DeckInfo {
            path: CString::new("scripted").unwrap(),
            serial_number: None,
            product: None,
        };
        Arc::new(Deck::with_factory(info, factory))
    }

    fn press_release(key: u8) -> Vec<Vec<u8>> {
        let mut press = vec![0u8; INPUT_REPORT_LEN];
        press[0] = 0x01;
        press[1 + key as usize] = 1;
        let mut release = vec![0u8; INPUT_REPORT_LEN];
        release[0] = 0x01;
        vec![press, release]
    }

    struct Counting {
        presses: Arc<Mutex<u32>>,
    }

    impl ButtonBehavior for Counting {
        fn on_pressed(&mut self) {
            *self.presses.lock() += 1;
        }
    }

    fn counting_menu(presses: &Arc<Mutex<u32>>, key: u8) -> Menu {
        let mut menu = Menu::new();
        menu.set_button(
            key,
            Button::new(Counting {
                presses: Arc::clone(presses),
            }),
        )
        .unwrap();
        menu
    }

    fn wait_for<F: Fn() -> bool>(condition: F) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("condition not reached within 1s");
    }

    #[test]
    fn test_events_route_to_active_menu_only() {
        let deck = scripted_deck(press_release(3));
        let manager = MenuManager::new(Arc::clone(&deck)).unwrap();

        let main_presses = Arc::new(Mutex::new(0));
        let other_presses = Arc::new(Mutex::new(0));
        manager.add_menu("main", counting_menu(&main_presses, 3));
        manager.add_menu("other", counting_menu(&other_presses, 3));
        manager.set_current("main").unwrap();

        deck.open().unwrap();
        wait_for(|| *main_presses.lock() >= 1);
        deck.close();

        assert_eq!(*main_presses.lock(), 1);
        assert_eq!(*other_presses.lock(), 0);
    }

    #[test]
    fn test_events_drop_without_active_menu() {
        let deck = scripted_deck(press_release(0));
        let manager = MenuManager::new(Arc::clone(&deck)).unwrap();

        let presses = Arc::new(Mutex::new(0));
        manager.add_menu("main", counting_menu(&presses, 0));
        // No set_current: the dispatcher must drop the events.

        deck.open().unwrap();
        std::thread::sleep(Duration::from_millis(100));
        deck.close();

        assert_eq!(*presses.lock(), 0);
    }

    #[test]
    fn test_drop_unsubscribes_dispatcher() {
        let deck = scripted_deck(press_release(2));

        let presses = Arc::new(Mutex::new(0));
        {
            let manager = MenuManager::new(Arc::clone(&deck)).unwrap();
            manager.add_menu("main", counting_menu(&presses, 2));
            manager.set_current("main").unwrap();
        } // dropped before the deck is opened

        deck.open().unwrap();
        std::thread::sleep(Duration::from_millis(100));
        deck.close();

        assert_eq!(*presses.lock(), 0);
    }

    #[test]
    fn test_set_current_rejects_unknown_menu() {
        let deck = scripted_deck(vec![]);
        let manager = MenuManager::new(Arc::clone(&deck)).unwrap();

        assert!(matches!(
            manager.set_current("nope"),
            Err(DeckError::UnknownMenu(_))
        ));
        assert!(manager.current().is_none());
    }

    #[test]
    fn test_snapshot_reflects_menus_and_icons() {
        let deck = scripted_deck(vec![]);
        let manager = MenuManager::new(Arc::clone(&deck)).unwrap();

        let presses = Arc::new(Mutex::new(0));
        let mut menu = Menu::new();
        menu.set_button(
            1,
            Button::new(Counting {
                presses: Arc::clone(&presses),
            })
            .with_icon("icons/one.png"),
        )
        .unwrap();
        manager.add_menu("main", menu);
        manager.add_menu("empty", Menu::new());
        manager.set_current("main").unwrap();

        let snapshot = manager.snapshot();
        assert_eq!(snapshot.current.as_deref(), Some("main"));
        assert_eq!(snapshot.menus.len(), 2);
        let main = &snapshot.menus["main"];
        assert_eq!(main.buttons.len(), 1);
        assert_eq!(main.buttons[0].key, 1);
        assert_eq!(main.buttons[0].icon, Some(PathBuf::from("icons/one.png")));
        assert!(snapshot.menus["empty"].buttons.is_empty());
    }
}
