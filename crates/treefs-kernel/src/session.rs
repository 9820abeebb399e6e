//! Mount session lifecycle.
//!
//! A session owns the tree for one mount: it loads the snapshot on start,
//! hands out [`SharedTree`] handles while mounted, and writes the snapshot
//! back on stop when persistence is enabled.

use std::sync::Arc;

use crate::codec;
use crate::config::TreeConfig;
use crate::error::TreeResult;
use crate::shared::SharedTree;
use crate::types::{Clock, SystemClock};

#[derive(Debug)]
pub struct MountSession {
    config: TreeConfig,
    tree: SharedTree,
}

impl MountSession {
    /// Load the configured snapshot and mount it.
    pub fn start(config: TreeConfig) -> TreeResult<Self> {
        Self::start_with_clock(config, Arc::new(SystemClock))
    }

    pub fn start_with_clock(config: TreeConfig, clock: Arc<dyn Clock>) -> TreeResult<Self> {
        let tree = codec::load(&config.snapshot, config.limits, config.owner, clock)?;
        tracing::debug!(
            snapshot = %config.snapshot.display(),
            persist = config.persist,
            "session started"
        );
        Ok(Self {
            config,
            tree: SharedTree::new(tree),
        })
    }

    /// Handle for serving operations.
    pub fn tree(&self) -> &SharedTree {
        &self.tree
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Unmount. Saves the tree first if persistence is on.
    ///
    /// The tree is released even when the save fails; the error is
    /// returned so the caller can report it.
    pub fn stop(self) -> TreeResult<()> {
        let Self { config, tree } = self;
        if !config.persist {
            tracing::debug!("session stopped without persistence");
            return Ok(());
        }
        let result = tree.with(|t| codec::save(&config.snapshot, t));
        if let Err(e) = &result {
            tracing::warn!(
                snapshot = %config.snapshot.display(),
                error = %e,
                "failed to persist tree"
            );
        }
        result
    }
}
