//! keydeck - driver and menu layer for the 15-key Elgato Stream Deck
//!
//! The [`device`] module speaks the wire protocol: two-page framed key
//! images, a brightness feature report, and a background polling loop that
//! diffs input reports into per-key state-change callbacks. The [`menu`]
//! module layers named menus of [`menu::Button`]s on top, with
//! press/long-press disambiguation.
//!
//! ```no_run
//! use keydeck::{Deck, Menu, MenuManager};
//! use std::sync::Arc;
//!
//! # fn main() -> keydeck::Result<()> {
//! let deck = Arc::new(Deck::enumerate()?.into_iter().next().expect("no deck attached"));
//! let manager = MenuManager::new(Arc::clone(&deck))?;
//! manager.add_menu("main", Menu::new());
//! deck.open()?;
//! manager.open_menu("main")?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod device;
pub mod error;
pub mod icon;
pub mod menu;

pub use device::{Brightness, Deck, DeckInfo, KeyCallback};
pub use error::{DeckError, Result};
pub use menu::{Button, ButtonBehavior, Menu, MenuManager};
