//! Configuration command handlers
//!
//! Handles the `configure` subcommand for setting heapscope defaults.

use crate::config::Config;
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Handle the configure command
///
/// # Arguments
/// * `profile` - Session profile to use when none is given on the command line
/// * `maps` - Maps file to use for dumps without their own
/// * `clear` - Remove every configured default
/// * `show` - If true, show current configuration
pub fn handle(
    profile: Option<PathBuf>,
    maps: Option<PathBuf>,
    clear: bool,
    show: bool,
) -> Result<()> {
    let mut config = Config::load()?;

    if show {
        show_config(&config);
        return Ok(());
    }

    if !apply(&mut config, profile, maps, clear)? {
        show_usage();
        return Ok(());
    }

    config.save()?;
    show_config(&config);
    if let Ok(path) = Config::config_path() {
        println!("Config saved to: {}", path.display());
    }
    Ok(())
}

/// Apply the requested changes, returning whether anything was asked for
fn apply(
    config: &mut Config,
    profile: Option<PathBuf>,
    maps: Option<PathBuf>,
    clear: bool,
) -> Result<bool> {
    if clear {
        *config = Config::default();
    }

    let mut changed = clear;
    if let Some(path) = profile {
        let path = path
            .canonicalize()
            .with_context(|| format!("Profile not found: {}", path.display()))?;
        config.set_profile(path);
        changed = true;
    }
    if let Some(path) = maps {
        let path = path
            .canonicalize()
            .with_context(|| format!("Maps file not found: {}", path.display()))?;
        config.set_maps(path);
        changed = true;
    }
    Ok(changed)
}

/// Display current configuration
fn show_config(config: &Config) {
    match config.get_profile() {
        Some(path) => println!("Profile: {}", path.display()),
        None => println!("No profile configured"),
    }
    match config.get_maps() {
        Some(path) => println!("Maps: {}", path.display()),
        None => println!("No maps file configured"),
    }

    if let Ok(path) = Config::config_path() {
        println!("Config file: {}", path.display());
    }
}

/// Show usage help for the configure command
fn show_usage() {
    println!("Usage: heapscope configure --profile PROFILE.toml");
    println!("   or: heapscope configure --maps DUMP.maps");
    println!("   or: heapscope configure --clear");
    println!("   or: heapscope configure --show");
    println!();
    println!("Note: a configured profile is only used when neither --profile");
    println!("      nor --root is given.");
}
