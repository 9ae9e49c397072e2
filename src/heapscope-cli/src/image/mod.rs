//! Image access
//!
//! Opens the dump named on the command line and binds it to a decoding
//! session, with the profile either loaded from a file or probed from the
//! runtime descriptor.

mod dump;
mod maps;

pub use dump::DumpFile;

use crate::cli::ImageArgs;
use crate::config::Config;
use anyhow::{bail, Context, Result};
use heapscope::{Endian, MemoryView, Session, SessionProfile};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Load a session profile from TOML
pub fn load_profile(path: &Path) -> Result<SessionProfile> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read profile from {}", path.display()))?;
    let profile: SessionProfile = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse profile {}", path.display()))?;
    profile
        .validate()
        .with_context(|| format!("Inconsistent profile {}", path.display()))?;
    Ok(profile)
}

/// Open the dump named by `args`
pub fn open_view(args: &ImageArgs, config: &Config) -> Result<Arc<dyn MemoryView>> {
    let Some(dump) = args.dump.as_deref() else {
        bail!("No dump file given (use --dump <PATH>)");
    };
    let endian = if args.big_endian {
        Endian::Big
    } else {
        Endian::Little
    };

    let sibling = dump.with_extension("maps");
    let maps = args
        .maps
        .as_deref()
        .or_else(|| (!sibling.exists()).then(|| config.get_maps()).flatten());

    let file = DumpFile::open(dump, maps, endian)?;
    debug!(
        dump = %file.path.display(),
        regions = file.regions().len(),
        "image ready"
    );
    Ok(Arc::new(file))
}

/// Open the dump and resolve its profile
///
/// An explicit --profile wins over --root; with neither, the configured
/// profile is used. There is no fallback guess.
pub fn open_session(args: &ImageArgs, config: &Config) -> Result<Session> {
    let view = open_view(args, config)?;

    if let Some(path) = args.profile.as_deref() {
        debug!(profile = %path.display(), "using profile file");
        return Ok(Session::new(view, load_profile(path)?)?);
    }

    if let Some(root) = args.root {
        debug!(root = format_args!("{root:#x}"), "probing runtime descriptor");
        return Session::probe(view, root)
            .with_context(|| format!("Failed to probe runtime descriptor at {root:#x}"));
    }

    if let Some(path) = config.get_profile() {
        debug!(profile = %path.display(), "using configured profile");
        return Ok(Session::new(view, load_profile(path)?)?);
    }

    bail!("No session profile: pass --profile <FILE> or --root <ADDRESS>, or run `heapscope configure --profile`")
}
