//! Durable storage for world configuration and save files.

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use geocache_core::WorldConfig;
use geocache_world::{World, WorldExport};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const SAVE_FORMAT: &str = "geocache-save";
const SAVE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct SaveFile {
    format: String,
    version: u32,
    state: WorldExport,
}

/// Reads world configuration from a TOML file, or returns defaults when no path is given.
pub(crate) fn load_config(path: Option<&Path>) -> Result<WorldConfig> {
    let Some(path) = path else {
        return Ok(WorldConfig::default());
    };
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    parse_config(&contents).with_context(|| format!("invalid config file {}", path.display()))
}

fn parse_config(contents: &str) -> Result<WorldConfig> {
    let config: WorldConfig =
        toml::from_str(contents).context("failed to parse world config toml contents")?;
    config.validate()?;
    Ok(config)
}

/// Loads the world stored at `path`, starting a fresh one when the file does not exist.
pub(crate) fn load_world(path: &Path, config: WorldConfig) -> Result<World> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(error) if error.kind() == ErrorKind::NotFound => {
            info!(path = %path.display(), "no save file found, starting a new world");
            return Ok(World::new(config)?);
        }
        Err(error) => {
            return Err(error)
                .with_context(|| format!("failed to read save file {}", path.display()))
        }
    };
    let state = decode_save(&contents)
        .with_context(|| format!("failed to load save file {}", path.display()))?;
    debug!(entries = state.entries.len(), holdings = state.holdings.len(), "loaded save file");
    Ok(World::restore(config, state)?)
}

/// Writes the world to `path`, replacing the previous save in a single rename.
pub(crate) fn save_world(path: &Path, world: &World) -> Result<()> {
    let contents = encode_save(world.export())?;
    let staging = staging_path(path);
    fs::write(&staging, contents)
        .with_context(|| format!("failed to write save file {}", staging.display()))?;
    fs::rename(&staging, path)
        .with_context(|| format!("failed to replace save file {}", path.display()))?;
    debug!(path = %path.display(), "saved world");
    Ok(())
}

/// Removes the save file; a missing file is not an error.
pub(crate) fn discard_save(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
        Err(error) => {
            Err(error).with_context(|| format!("failed to remove save file {}", path.display()))
        }
    }
}

/// Pretty JSON rendering of the world's export, as written to save files.
pub(crate) fn encode_save(state: WorldExport) -> Result<String> {
    let file = SaveFile {
        format: SAVE_FORMAT.to_owned(),
        version: SAVE_VERSION,
        state,
    };
    serde_json::to_string_pretty(&file).context("failed to serialise save file")
}

fn decode_save(contents: &str) -> Result<WorldExport> {
    let file: SaveFile = serde_json::from_str(contents).context("save file is not valid json")?;
    if file.format != SAVE_FORMAT {
        bail!("save file format '{}' is not supported", file.format);
    }
    if file.version != SAVE_VERSION {
        bail!("save file version {} is not supported", file.version);
    }
    Ok(file.state)
}

fn staging_path(path: &Path) -> PathBuf {
    let mut staging = path.as_os_str().to_owned();
    staging.push(".tmp");
    PathBuf::from(staging)
}
