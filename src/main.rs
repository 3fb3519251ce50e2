use anyhow::{anyhow, Result};
use clap::Parser;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use keydeck::config::Config;
use keydeck::device::protocol::KEY_COUNT;
use keydeck::icon;
use keydeck::menu::MenuLayout;
use keydeck::{Button, ButtonBehavior, Deck, Menu, MenuManager};

#[derive(Parser, Debug)]
#[command(name = "keydeck")]
#[command(about = "Driver and menu shell for the 15-key Elgato Stream Deck")]
#[command(version)]
struct Cli {
    /// List attached devices and exit
    #[arg(long)]
    status: bool,

    /// Set device brightness (0-100) and exit
    #[arg(long, value_name = "PERCENT")]
    brightness: Option<u8>,

    /// Clear every key and exit
    #[arg(long)]
    clear: bool,

    /// Print key events as JSON lines instead of running the demo menu
    #[arg(long)]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Handle simple commands first
    if cli.status {
        return status();
    }

    if let Some(percent) = cli.brightness {
        return set_brightness(percent);
    }

    if cli.clear {
        return clear();
    }

    if cli.watch {
        return watch().await;
    }

    let config = Config::load()?;

    info!("Starting keydeck");
    run(config).await
}

fn first_deck() -> Result<Deck> {
    Deck::enumerate()?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("No deck found"))
}

fn status() -> Result<()> {
    let decks = Deck::enumerate()?;

    if decks.is_empty() {
        println!("✗ No deck found");
        std::process::exit(1);
    }

    for deck in &decks {
        let info = deck.info();
        println!(
            "✓ Deck found: {}",
            info.product.as_deref().unwrap_or("(unnamed)")
        );
        println!(
            "  Serial: {}",
            info.serial_number.as_deref().unwrap_or("unknown")
        );
    }
    Ok(())
}

fn set_brightness(percent: u8) -> Result<()> {
    info!("Setting brightness to {}%", percent.min(100));

    let deck = first_deck()?;
    deck.open()?;
    deck.set_brightness(percent)?;
    deck.close();

    println!("✓ Brightness set to {}%", percent.min(100));
    Ok(())
}

fn clear() -> Result<()> {
    let deck = first_deck()?;
    deck.open()?;
    deck.clear_all()?;
    deck.close();

    println!("✓ Cleared all keys");
    Ok(())
}

/// One key state change, printed as a JSON line in watch mode
#[derive(Serialize)]
struct KeyEvent {
    key: u8,
    pressed: bool,
}

async fn watch() -> Result<()> {
    let deck = Arc::new(first_deck()?);

    for key in 0..KEY_COUNT {
        deck.add_key_callback(
            key,
            Arc::new(|key, _old_state, new_state| {
                let event = KeyEvent {
                    key,
                    pressed: new_state,
                };
                match serde_json::to_string(&event) {
                    Ok(line) => println!("{}", line),
                    Err(e) => warn!("Failed to encode event: {}", e),
                }
            }),
        )?;
    }

    deck.open()?;
    info!("Watching key events, Ctrl+C to stop");
    signal::ctrl_c().await?;
    deck.close();
    Ok(())
}

/// Logs every transition on its key; the demo stand-in for real actions.
struct LogButton {
    key: u8,
}

impl ButtonBehavior for LogButton {
    fn on_pressed(&mut self) {
        info!("Key {} pressed", self.key);
    }
    fn on_released(&mut self) {
        info!("Key {} released", self.key);
    }
    fn on_long_press(&mut self) {
        info!("Key {} long-pressed", self.key);
    }
}

fn demo_menu() -> Result<Menu> {
    let mut menu = Menu::new();
    for key in 0..KEY_COUNT {
        let mut button = Button::new(LogButton { key });
        if key == 0 {
            // Key 0 shows off the ongoing long-press hook.
            button.set_during_long_press(move || debug!("Key 0 held"));
        }
        menu.set_button(key, button)?;
    }
    Ok(menu)
}

/// Re-create the demo buttons named by the layout file with their icons
/// attached.
fn apply_layout_icons(manager: &MenuManager, layout: &MenuLayout) -> Result<()> {
    let Some(entry) = layout.menus.get("main") else {
        return Ok(());
    };

    manager.with_menu("main", |menu| {
        for button in &entry.buttons {
            let Some(icon) = &button.icon else { continue };
            let replacement = Button::new(LogButton { key: button.key }).with_icon(icon);
            if let Err(e) = menu.set_button(button.key, replacement) {
                warn!("Ignoring layout button: {}", e);
            }
        }
    })?;
    Ok(())
}

/// Paint the current menu: a muted placeholder color per assigned key,
/// then any icons the layout names.
fn render_current_menu(manager: &MenuManager, mirror: bool) -> Result<()> {
    let snapshot = manager.snapshot();
    let Some(current) = snapshot.current else {
        return Ok(());
    };
    let Some(entry) = snapshot.menus.get(&current) else {
        return Ok(());
    };

    let deck = manager.deck();
    let placeholder = icon::solid_key_image(40, 44, 52);
    for button in &entry.buttons {
        match &button.icon {
            Some(path) => {
                let buffer = icon::load_key_image(path, mirror)?;
                deck.set_key_image(button.key, Some(&buffer))?;
            }
            None => deck.set_key_image(button.key, Some(&placeholder))?,
        }
    }
    Ok(())
}

async fn run(config: Config) -> Result<()> {
    let deck = Arc::new(first_deck()?);

    // Subscribe the manager before the polling loop starts.
    let manager = MenuManager::new(Arc::clone(&deck))?;
    manager.add_menu("main", demo_menu()?);

    if let Some(layout_file) = &config.menu.layout_file {
        match MenuLayout::load(layout_file) {
            Ok(layout) => apply_layout_icons(&manager, &layout)?,
            Err(e) => warn!("Failed to load layout {:?}: {}", layout_file, e),
        }
    }

    deck.open()?;
    deck.set_brightness(config.device.brightness)?;
    manager.open_menu("main")?;
    render_current_menu(&manager, config.device.mirror_icons)?;

    info!("Running, Ctrl+C to stop");

    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
    let mut tick = tokio::time::interval(Duration::from_millis(config.menu.tick_interval_ms));

    loop {
        tokio::select! {
            _ = tick.tick() => manager.tick(),
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down...");
                break;
            }
        }
    }

    deck.close();
    Ok(())
}
