//! Single-slot TTL cache over [`WorkspaceSnapshot`].
//!
//! Owned by the session. Two concurrent misses may both rebuild; either
//! snapshot is valid and the later one wins the slot.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use strata_config::ContextConfig;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::snapshot::{SnapshotBuilder, WorkspaceSnapshot};

struct Cached {
    snapshot: Arc<WorkspaceSnapshot>,
    built_at: Instant,
}

pub struct ContextCache {
    builder: Option<SnapshotBuilder>,
    ttl: Duration,
    slot: Mutex<Option<Cached>>,
}

impl ContextCache {
    /// A cache over `workspace`. Without a workspace every snapshot is empty.
    pub fn new(workspace: Option<&std::path::Path>, config: &ContextConfig) -> Self {
        Self {
            builder: workspace.map(|root| SnapshotBuilder::new(root, config.clone())),
            ttl: config.ttl(),
            slot: Mutex::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The cached snapshot if younger than the TTL, otherwise a fresh one.
    pub async fn get(&self) -> Arc<WorkspaceSnapshot> {
        let Some(builder) = self.builder.clone() else {
            return Arc::new(WorkspaceSnapshot::default());
        };

        if let Some(hit) = self.fresh() {
            return hit;
        }

        let started = Instant::now();
        let snapshot = match tokio::task::spawn_blocking(move || builder.build()).await {
            Ok(snapshot) => Arc::new(snapshot),
            Err(e) => {
                warn!(error = %e, "Workspace snapshot build failed");
                return Arc::new(WorkspaceSnapshot::default());
            }
        };
        debug!(
            entries = snapshot.tree.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Workspace snapshot rebuilt"
        );

        *self.lock() = Some(Cached {
            snapshot: Arc::clone(&snapshot),
            built_at: Instant::now(),
        });
        snapshot
    }

    /// Drop the cached snapshot; the next `get` rebuilds.
    pub fn clear(&self) {
        *self.lock() = None;
        debug!("Workspace context cache cleared");
    }

    fn fresh(&self) -> Option<Arc<WorkspaceSnapshot>> {
        self.lock()
            .as_ref()
            .filter(|cached| cached.built_at.elapsed() < self.ttl)
            .map(|cached| Arc::clone(&cached.snapshot))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Cached>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
