//! Menus: per-screen key-to-button assignments and the manager that routes
//! deck events to the active one

mod button;
mod manager;
mod store;

pub use button::{
    Button, ButtonBehavior, DuringLongPress, DOUBLE_CLICK_THRESHOLD, LONG_PRESS_THRESHOLD,
};
pub use manager::MenuManager;
pub use store::{ButtonEntry, MenuEntry, MenuLayout};

use std::time::Instant;

use crate::device::protocol::{self, KEY_COUNT};
use crate::device::Deck;
use crate::error::Result;

/// Maps every key index to an optional [`Button`]. Keys without a button
/// drop their events silently.
pub struct Menu {
    buttons: Vec<Option<Button>>,
}

impl Menu {
    pub fn new() -> Self {
        Self {
            buttons: (0..KEY_COUNT).map(|_| None).collect(),
        }
    }

    /// Assign a button to a key slot, replacing any existing assignment.
    pub fn set_button(&mut self, key: u8, button: Button) -> Result<()> {
        protocol::check_key(key)?;
        self.buttons[key as usize] = Some(button);
        Ok(())
    }

    pub fn button(&self, key: u8) -> Option<&Button> {
        self.buttons.get(key as usize)?.as_ref()
    }

    pub fn button_mut(&mut self, key: u8) -> Option<&mut Button> {
        self.buttons.get_mut(key as usize)?.as_mut()
    }

    /// Becoming the active menu clears the whole key surface. Icon
    /// rendering for the new menu is the caller's responsibility.
    pub fn open(&self, deck: &Deck) -> Result<()> {
        deck.clear_all()
    }

    /// Drive time-based button transitions.
    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    pub(crate) fn tick_at(&mut self, now: Instant) {
        for button in self.buttons.iter_mut().flatten() {
            button.tick_at(now);
        }
    }

    pub(crate) fn handle_key_event(&mut self, key: u8, _old_state: bool, new_state: bool) {
        if let Some(button) = self.buttons.get_mut(key as usize).and_then(Option::as_mut) {
            button.handle_state_change(new_state);
        }
    }
}

impl Default for Menu {
    fn default() -> Self {
        Self::new()
    }
}
