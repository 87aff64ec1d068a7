//! Finder configuration: program location, base flags, entry delimiter
//!
//! Loaded from `~/.config/fzpilot/config.toml` when present; everything has a
//! sensible default so embedders can also build a [`FinderConfig`] in code.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use fzpilot_core::prelude::*;

/// The finder binary looked up on PATH when none is configured.
pub const DEFAULT_PROGRAM: &str = "fzf";

/// How entries are delimited on the finder's standard input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryDelimiter {
    #[default]
    Newline,
    Nul,
}

impl EntryDelimiter {
    pub fn byte(&self) -> u8 {
        match self {
            Self::Newline => b'\n',
            Self::Nul => b'\0',
        }
    }

    /// The finder flag selecting this delimiter, if one is needed.
    pub fn flag(&self) -> Option<&'static str> {
        match self {
            Self::Newline => None,
            Self::Nul => Some("--read0"),
        }
    }
}

/// Configuration for spawning and addressing the finder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FinderConfig {
    /// Finder binary; resolved from PATH when unset.
    pub program: Option<PathBuf>,
    /// Flags passed before the rendered binding options.
    pub base_args: Vec<String>,
    /// Entry delimiter on the finder's standard input.
    pub delimiter: EntryDelimiter,
    /// Ask the finder to open its remote-control listener even when no
    /// automation script is supplied.
    pub listen: bool,
    /// Extra environment for the finder process (and thus for the shells
    /// running generated commands).
    pub extra_env: BTreeMap<String, String>,
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            program: None,
            base_args: Vec::new(),
            delimiter: EntryDelimiter::Newline,
            listen: false,
            extra_env: BTreeMap::new(),
        }
    }
}

impl FinderConfig {
    /// Load from the default location; missing file means defaults.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if !path.exists() {
            debug!(path = %path.display(), "no config file; using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw)
            .map_err(|e| Error::config(format!("{}: {e}", path.display())))
    }

    /// Default config file location.
    pub fn config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        base.join("fzpilot").join("config.toml")
    }

    /// The finder binary to spawn: the configured path, or `fzf` from PATH.
    pub fn resolve_program(&self) -> Result<PathBuf> {
        match &self.program {
            Some(program) => Ok(program.clone()),
            None => which::which(DEFAULT_PROGRAM).map_err(|_| Error::FinderNotFound {
                program: DEFAULT_PROGRAM.to_string(),
            }),
        }
    }
}
