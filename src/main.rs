//! Delve - A turn-based dungeon simulation
//!
//! Runs the turn loop headless on top of the delve ECS and logs the outcome.
//! Pass a settings file path as the first argument to override the default
//! location.

mod game;
mod settings;

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::game::Game;
use crate::settings::GameSettings;

fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("Starting Delve...");

    let settings_path = std::env::args_os().nth(1).map(PathBuf::from);
    let settings = GameSettings::load(settings_path.as_deref());
    info!(
        seed = settings.seed,
        monsters = settings.monsters,
        "Map {}x{}",
        settings.map_width,
        settings.map_height
    );

    let mut game = Game::new(&settings).context("Failed to set up the dungeon")?;
    info!(
        player = %game.player(),
        entities = game.world().live_count(),
        "Dungeon populated"
    );
    game.log_turn_order();

    let summary = game.run(settings.turns).context("Turn loop failed")?;
    info!(
        turns = summary.turns,
        actions = summary.actions,
        kills = summary.kills,
        survivors = summary.survivors,
        "Run finished"
    );
    if summary.player_alive {
        info!("Grog survived");
    } else {
        info!("Grog fell in the dungeon");
    }

    Ok(())
}
