//! Configuration for a treefs mount.
//!
//! ```toml
//! snapshot = "/var/lib/treefs/fs.treefs"
//! persist = true
//!
//! [limits]
//! max_directories = 20
//! max_files = 20
//!
//! [owner]
//! uid = 1000
//! gid = 1000
//! ```
//!
//! Every key is optional.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{TreeError, TreeResult};
use crate::store::Limits;
use crate::types::Owner;

/// Snapshot file used when none is configured.
pub const DEFAULT_SNAPSHOT: &str = "fs.treefs";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Backing snapshot file.
    pub snapshot: PathBuf,
    /// Save the tree back to `snapshot` when the session stops.
    pub persist: bool,
    pub limits: Limits,
    pub owner: Owner,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            snapshot: PathBuf::from(DEFAULT_SNAPSHOT),
            persist: false,
            limits: Limits::default(),
            owner: Owner::default(),
        }
    }
}

impl TreeConfig {
    pub fn from_toml_str(text: &str) -> TreeResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| TreeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> TreeResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text).map_err(|e| match e {
            TreeError::Config(msg) => TreeError::Config(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    /// Same config with a different snapshot path.
    pub fn with_snapshot(mut self, snapshot: impl Into<PathBuf>) -> Self {
        self.snapshot = snapshot.into();
        self
    }

    pub fn with_persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    fn validate(&self) -> TreeResult<()> {
        // The root always occupies one directory slot.
        if self.limits.max_directories == 0 {
            return Err(TreeError::Config(
                "limits.max_directories must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
