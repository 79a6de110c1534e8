/// In-memory routing snapshot: range table and cache directory loaded from
/// the store, swapped whole on refresh. Lookups never hit the store.
use chrono::{DateTime, Utc};
use edge_proto::records::{CacheNode, IpRange, CACHE_NODES, IP_RANGES};
use serde::de::DeserializeOwned;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::caches::CacheDirectory;
use crate::error::Result;
use crate::ranges::{RangeEntry, RangeTable};
use crate::store::{DocumentStore, StoreError, StoredDoc};

#[derive(Debug)]
pub struct RoutingSnapshot {
    pub ranges: RangeTable,
    pub caches: CacheDirectory,
    pub loaded_at: DateTime<Utc>,
}

impl RoutingSnapshot {
    /// Read both collections concurrently and compile them. Documents that
    /// do not match their schema are skipped with a warning.
    pub async fn load(store: &dyn DocumentStore) -> Result<Self> {
        let (range_docs, cache_docs) =
            tokio::try_join!(store.get_all(IP_RANGES), store.get_all(CACHE_NODES))?;

        let entries = decode_valid::<IpRange>(IP_RANGES, range_docs)
            .map(|(id, range)| RangeEntry { id, range })
            .collect();
        let nodes = decode_valid::<CacheNode>(CACHE_NODES, cache_docs).map(|(_, node)| node);

        Ok(Self {
            ranges: RangeTable::new(entries),
            caches: CacheDirectory::new(nodes),
            loaded_at: Utc::now(),
        })
    }
}

fn decode_valid<T: DeserializeOwned>(
    collection: &'static str,
    docs: Vec<StoredDoc>,
) -> impl Iterator<Item = (String, T)> {
    docs.into_iter().filter_map(move |doc| match doc.decode::<T>(collection) {
        Ok(value) => Some((doc.id, value)),
        Err(e) => {
            tracing::warn!("Skipping document: {}", e);
            None
        }
    })
}

/// Holder for the current snapshot. Empty until the first successful load.
#[derive(Debug, Default)]
pub struct SnapshotCell {
    current: RwLock<Option<Arc<RoutingSnapshot>>>,
}

impl SnapshotCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: RoutingSnapshot) -> Self {
        Self {
            current: RwLock::new(Some(Arc::new(snapshot))),
        }
    }

    pub fn current(&self) -> Option<Arc<RoutingSnapshot>> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Current snapshot, or `StoreUnavailable` if none has loaded yet.
    pub fn require(&self) -> Result<Arc<RoutingSnapshot>> {
        self.current()
            .ok_or_else(|| StoreError::Backend("routing snapshot not loaded yet".into()).into())
    }

    pub fn replace(&self, snapshot: RoutingSnapshot) -> Arc<RoutingSnapshot> {
        let snapshot = Arc::new(snapshot);
        *self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(snapshot.clone());
        snapshot
    }

    /// Load a fresh snapshot and swap it in. On failure the previous
    /// snapshot stays in place.
    pub async fn refresh(&self, store: &dyn DocumentStore) -> Result<Arc<RoutingSnapshot>> {
        let snapshot = RoutingSnapshot::load(store).await?;
        tracing::info!(
            ranges = snapshot.ranges.len(),
            caches = snapshot.caches.active_count(),
            "Routing snapshot loaded"
        );
        Ok(self.replace(snapshot))
    }
}

/// Reload the snapshot every `every`, starting immediately.
pub fn spawn_refresher(
    cell: Arc<SnapshotCell>,
    store: Arc<dyn DocumentStore>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = cell.refresh(store.as_ref()).await {
                tracing::warn!("Routing snapshot refresh failed, keeping previous: {}", e);
            }
        }
    })
}
