//! Press / long-press state machine for one key slot
//!
//! State changes come from the deck's polling thread through the owning
//! [`Menu`](super::Menu); time-based transitions are driven by a periodic
//! tick from the caller's loop. Timestamps are passed explicitly through
//! the crate-internal entry points so the transitions are testable without
//! sleeping.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Hold duration after which a press counts as a long press.
pub const LONG_PRESS_THRESHOLD: Duration = Duration::from_millis(400);

/// Reserved for a future double-click transition; no transition consumes
/// it yet.
pub const DOUBLE_CLICK_THRESHOLD: Duration = Duration::from_millis(100);

/// Reactions a button can implement.
///
/// All methods default to no-ops except [`on_long_press`], which forwards
/// to [`on_released`] so a behavior that does not distinguish the two only
/// implements `on_released`.
///
/// [`on_long_press`]: ButtonBehavior::on_long_press
/// [`on_released`]: ButtonBehavior::on_released
pub trait ButtonBehavior: Send {
    /// The key went down.
    fn on_pressed(&mut self) {}

    /// The key came up after a short press.
    fn on_released(&mut self) {}

    /// The key came up after a long press.
    fn on_long_press(&mut self) {
        self.on_released();
    }
}

/// Callback fired on every tick while a long press is in progress.
pub type DuringLongPress = Box<dyn FnMut() + Send>;

/// One key's behavior plus its press-timing state.
pub struct Button {
    behavior: Box<dyn ButtonBehavior>,
    icon_path: Option<PathBuf>,
    pressed_at: Instant,
    is_pressed: bool,
    is_long_pressing: bool,
    during_long_press: Option<DuringLongPress>,
}

impl Button {
    pub fn new(behavior: impl ButtonBehavior + 'static) -> Self {
        Self {
            behavior: Box::new(behavior),
            icon_path: None,
            pressed_at: Instant::now(),
            is_pressed: false,
            is_long_pressing: false,
            during_long_press: None,
        }
    }

    /// Attach the icon file shown on this key. The path is carried in
    /// layout snapshots; rendering it is the caller's responsibility.
    pub fn with_icon(mut self, path: impl Into<PathBuf>) -> Self {
        self.icon_path = Some(path.into());
        self
    }

    pub fn icon_path(&self) -> Option<&Path> {
        self.icon_path.as_deref()
    }

    /// Install a callback fired on every tick while the key is held past
    /// the long-press threshold. Without one, ticks are no-ops.
    pub fn set_during_long_press(&mut self, callback: impl FnMut() + Send + 'static) {
        self.during_long_press = Some(Box::new(callback));
    }

    pub fn is_pressed(&self) -> bool {
        self.is_pressed
    }

    pub fn is_long_pressing(&self) -> bool {
        self.is_long_pressing
    }

    /// Feed one key state change into the state machine.
    pub fn handle_state_change(&mut self, pressed: bool) {
        self.handle_state_change_at(pressed, Instant::now());
    }

    pub(crate) fn handle_state_change_at(&mut self, pressed: bool, now: Instant) {
        if pressed {
            self.is_pressed = true;
            self.is_long_pressing = false;
            self.pressed_at = now;
            self.behavior.on_pressed();
        } else {
            self.is_pressed = false;
            if self.is_long_pressing {
                self.behavior.on_long_press();
                self.is_long_pressing = false;
            } else {
                self.behavior.on_released();
            }
        }
    }

    /// Advance time-based transitions; called periodically by the menu
    /// layer.
    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    pub(crate) fn tick_at(&mut self, now: Instant) {
        if let Some(callback) = self.during_long_press.as_mut() {
            if self.is_pressed && now.duration_since(self.pressed_at) > LONG_PRESS_THRESHOLD {
                self.is_long_pressing = true;
            }
            if self.is_long_pressing {
                callback();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    type Log = Arc<Mutex<Vec<&'static str>>>;

    /// Records on_pressed/on_released, leaving on_long_press at its
    /// default (forward to on_released).
    struct Recording {
        log: Log,
    }

    impl ButtonBehavior for Recording {
        fn on_pressed(&mut self) {
            self.log.lock().push("pressed");
        }
        fn on_released(&mut self) {
            self.log.lock().push("released");
        }
    }

    /// Overrides on_long_press with a distinct action.
    struct LongAware {
        log: Log,
    }

    impl ButtonBehavior for LongAware {
        fn on_pressed(&mut self) {
            self.log.lock().push("pressed");
        }
        fn on_released(&mut self) {
            self.log.lock().push("released");
        }
        fn on_long_press(&mut self) {
            self.log.lock().push("long_press");
        }
    }

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[test]
    fn test_short_press_never_enters_long_press() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let mut button = Button::new(Recording { log: Arc::clone(&log) });
        let ticks = Arc::new(Mutex::new(0u32));
        let tick_count = Arc::clone(&ticks);
        button.set_during_long_press(move || *tick_count.lock() += 1);

        let t0 = Instant::now();
        button.handle_state_change_at(true, t0);
        button.handle_state_change_at(false, t0 + ms(100));

        assert_eq!(*log.lock(), vec!["pressed", "released"]);
        assert_eq!(*ticks.lock(), 0);
        assert!(!button.is_pressed());
        assert!(!button.is_long_pressing());
    }

    #[test]
    fn test_long_press_fires_ongoing_callback_and_default_delegation() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let mut button = Button::new(Recording { log: Arc::clone(&log) });
        let ticks = Arc::new(Mutex::new(0u32));
        let tick_count = Arc::clone(&ticks);
        button.set_during_long_press(move || *tick_count.lock() += 1);

        let t0 = Instant::now();
        button.handle_state_change_at(true, t0);
        button.tick_at(t0 + ms(200)); // below threshold, nothing fires
        assert_eq!(*ticks.lock(), 0);
        assert!(!button.is_long_pressing());

        button.tick_at(t0 + ms(500)); // crosses threshold
        assert!(button.is_long_pressing());
        assert_eq!(*ticks.lock(), 1);

        button.tick_at(t0 + ms(550)); // keeps firing while held
        assert_eq!(*ticks.lock(), 2);

        button.handle_state_change_at(false, t0 + ms(600));
        // on_long_press is not overridden, so it forwards to on_released.
        assert_eq!(*log.lock(), vec!["pressed", "released"]);
        assert!(!button.is_long_pressing());
    }

    #[test]
    fn test_long_press_override_is_invoked_instead_of_released() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let mut button = Button::new(LongAware { log: Arc::clone(&log) });
        let ticks = Arc::new(Mutex::new(0u32));
        let tick_count = Arc::clone(&ticks);
        button.set_during_long_press(move || *tick_count.lock() += 1);

        let t0 = Instant::now();
        button.handle_state_change_at(true, t0);
        button.tick_at(t0 + ms(500));
        button.handle_state_change_at(false, t0 + ms(600));

        assert_eq!(*log.lock(), vec!["pressed", "long_press"]);
    }

    #[test]
    fn test_tick_is_noop_without_ongoing_callback() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let mut button = Button::new(Recording { log: Arc::clone(&log) });

        let t0 = Instant::now();
        button.handle_state_change_at(true, t0);
        button.tick_at(t0 + ms(1000));
        assert!(!button.is_long_pressing());

        button.handle_state_change_at(false, t0 + ms(1100));
        assert_eq!(*log.lock(), vec!["pressed", "released"]);
    }

    #[test]
    fn test_repress_resets_long_press_timer() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let mut button = Button::new(Recording { log: Arc::clone(&log) });
        let ticks = Arc::new(Mutex::new(0u32));
        let tick_count = Arc::clone(&ticks);
        button.set_during_long_press(move || *tick_count.lock() += 1);

        let t0 = Instant::now();
        button.handle_state_change_at(true, t0);
        button.handle_state_change_at(false, t0 + ms(100));
        button.handle_state_change_at(true, t0 + ms(200));
        // 300ms after the second press, below the threshold.
        button.tick_at(t0 + ms(500));

        assert_eq!(*ticks.lock(), 0);
        assert!(!button.is_long_pressing());
    }
}
