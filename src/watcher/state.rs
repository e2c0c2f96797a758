//! Resource cache
//!
//! Holds the local copy of every server-owned collection. The cache is only
//! mutated through [`ResourceCache::apply`]; readers take snapshots.

use crate::models::{CachedResource, CollectionKey, ResourceStatus};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::watch;

/// A mutation of the cache
#[derive(Debug, Clone, PartialEq)]
pub enum CacheEvent {
    /// Replace a whole collection with the records of a list fetch
    Seeded {
        collection: CollectionKey,
        records: Vec<CachedResource>,
    },
    /// Set the status of an entry that is already cached
    StatusUpdate {
        collection: CollectionKey,
        resource_id: String,
        status: ResourceStatus,
    },
    /// Remove an entry
    Deleted {
        collection: CollectionKey,
        resource_id: String,
    },
    /// Forget every collection (logout)
    Reset,
}

/// Whether an applied event changed the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Changed,
    Unchanged,
}

/// Thread-safe resource cache
///
/// Each collection keeps the order of its last seed. Clones share state.
#[derive(Clone)]
pub struct ResourceCache {
    inner: Arc<RwLock<HashMap<CollectionKey, Vec<CachedResource>>>>,
    version: Arc<watch::Sender<u64>>,
}

impl ResourceCache {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0);
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            version: Arc::new(version),
        }
    }

    /// Apply one event
    ///
    /// Status updates for unknown ids and deletions of absent ids are no-ops.
    /// Re-applying an event leaves the cache as it was after the first time.
    pub fn apply(&self, event: CacheEvent) -> ApplyOutcome {
        let outcome = {
            let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
            match event {
                CacheEvent::Seeded {
                    collection,
                    records,
                } => {
                    let records = dedupe(records);
                    if state.get(&collection) == Some(&records) {
                        ApplyOutcome::Unchanged
                    } else {
                        tracing::debug!("Seeded {} with {} records", collection, records.len());
                        state.insert(collection, records);
                        ApplyOutcome::Changed
                    }
                }
                CacheEvent::StatusUpdate {
                    collection,
                    resource_id,
                    status,
                } => {
                    let entry = state
                        .get_mut(&collection)
                        .and_then(|entries| entries.iter_mut().find(|r| r.id == resource_id));
                    match entry {
                        Some(entry) if entry.status.as_ref() == Some(&status) => {
                            ApplyOutcome::Unchanged
                        }
                        Some(entry) => {
                            tracing::debug!("{} {} -> {}", collection, resource_id, status);
                            entry.status = Some(status);
                            ApplyOutcome::Changed
                        }
                        None => {
                            tracing::debug!(
                                "Ignoring status for unknown {} entry {}",
                                collection,
                                resource_id
                            );
                            ApplyOutcome::Unchanged
                        }
                    }
                }
                CacheEvent::Deleted {
                    collection,
                    resource_id,
                } => match state.get_mut(&collection) {
                    Some(entries) => {
                        let before = entries.len();
                        entries.retain(|r| r.id != resource_id);
                        if entries.len() != before {
                            tracing::debug!("{} {} removed", collection, resource_id);
                            ApplyOutcome::Changed
                        } else {
                            ApplyOutcome::Unchanged
                        }
                    }
                    None => ApplyOutcome::Unchanged,
                },
                CacheEvent::Reset => {
                    if state.is_empty() {
                        ApplyOutcome::Unchanged
                    } else {
                        state.clear();
                        ApplyOutcome::Changed
                    }
                }
            }
        };

        if outcome == ApplyOutcome::Changed {
            self.version.send_modify(|v| *v += 1);
        }
        outcome
    }

    /// Copy of a collection in server order; empty when never seeded
    pub fn snapshot(&self, collection: CollectionKey) -> Vec<CachedResource> {
        let state = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        state.get(&collection).cloned().unwrap_or_default()
    }

    /// Get a specific entry
    pub fn get(&self, collection: CollectionKey, id: &str) -> Option<CachedResource> {
        let state = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        state
            .get(&collection)
            .and_then(|entries| entries.iter().find(|r| r.id == id))
            .cloned()
    }

    /// Find an entry by id, falling back to its display name
    pub fn find(&self, collection: CollectionKey, id_or_name: &str) -> Option<CachedResource> {
        let state = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let entries = state.get(&collection)?;
        entries
            .iter()
            .find(|r| r.id == id_or_name)
            .or_else(|| entries.iter().find(|r| r.name() == id_or_name))
            .cloned()
    }

    pub fn is_seeded(&self, collection: CollectionKey) -> bool {
        let state = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        state.contains_key(&collection)
    }

    /// Count entries per status label
    pub fn count_by_status(&self, collection: CollectionKey) -> HashMap<String, usize> {
        let state = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut counts = HashMap::new();
        for entry in state.get(&collection).into_iter().flatten() {
            *counts.entry(entry.status_label().to_string()).or_insert(0) += 1;
        }
        counts
    }

    /// Receiver that observes a new version after every change
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }
}

impl Default for ResourceCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Keep one entry per id; a later record replaces an earlier one in place
fn dedupe(records: Vec<CachedResource>) -> Vec<CachedResource> {
    let mut out: Vec<CachedResource> = Vec::with_capacity(records.len());
    for record in records {
        match out.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record,
            None => out.push(record),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster(id: &str, status: ResourceStatus) -> CachedResource {
        CachedResource::new(id, Some(status)).with_field("name", format!("{}-name", id))
    }

    #[test]
    fn test_cache_new() {
        let cache = ResourceCache::new();
        assert!(cache.snapshot(CollectionKey::Clusters).is_empty());
        assert!(!cache.is_seeded(CollectionKey::Clusters));
        assert_eq!(cache.version(), 0);
    }

    #[test]
    fn test_seed_keeps_server_order() {
        let cache = ResourceCache::new();
        cache.apply(CacheEvent::Seeded {
            collection: CollectionKey::Clusters,
            records: vec![
                cluster("b", ResourceStatus::Running),
                cluster("a", ResourceStatus::Error),
            ],
        });
        let ids: Vec<_> = cache
            .snapshot(CollectionKey::Clusters)
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_seed_dedupes_ids() {
        let cache = ResourceCache::new();
        cache.apply(CacheEvent::Seeded {
            collection: CollectionKey::Clusters,
            records: vec![
                cluster("a", ResourceStatus::Provisioning),
                cluster("b", ResourceStatus::Running),
                cluster("a", ResourceStatus::Running),
            ],
        });
        let snapshot = cache.snapshot(CollectionKey::Clusters);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].status, Some(ResourceStatus::Running));
    }

    #[test]
    fn test_version_only_moves_on_change() {
        let cache = ResourceCache::new();
        let event = CacheEvent::Seeded {
            collection: CollectionKey::Teams,
            records: vec![CachedResource::new("t1", None)],
        };
        assert_eq!(cache.apply(event.clone()), ApplyOutcome::Changed);
        assert_eq!(cache.apply(event), ApplyOutcome::Unchanged);
        assert_eq!(cache.version(), 1);
    }

    #[test]
    fn test_find_by_name() {
        let cache = ResourceCache::new();
        cache.apply(CacheEvent::Seeded {
            collection: CollectionKey::Clusters,
            records: vec![cluster("c1", ResourceStatus::Running)],
        });
        assert_eq!(
            cache.find(CollectionKey::Clusters, "c1-name").map(|r| r.id),
            Some("c1".to_string())
        );
        assert!(cache.find(CollectionKey::Clusters, "nope").is_none());
    }

    #[test]
    fn test_count_by_status() {
        let cache = ResourceCache::new();
        cache.apply(CacheEvent::Seeded {
            collection: CollectionKey::Clusters,
            records: vec![
                cluster("a", ResourceStatus::Running),
                cluster("b", ResourceStatus::Running),
                cluster("c", ResourceStatus::Error),
            ],
        });
        let counts = cache.count_by_status(CollectionKey::Clusters);
        assert_eq!(counts.get("RUNNING"), Some(&2));
        assert_eq!(counts.get("ERROR"), Some(&1));
    }

    #[test]
    fn test_reset_clears_everything() {
        let cache = ResourceCache::new();
        cache.apply(CacheEvent::Seeded {
            collection: CollectionKey::Clusters,
            records: vec![cluster("a", ResourceStatus::Running)],
        });
        assert_eq!(cache.apply(CacheEvent::Reset), ApplyOutcome::Changed);
        assert!(!cache.is_seeded(CollectionKey::Clusters));
        assert_eq!(cache.apply(CacheEvent::Reset), ApplyOutcome::Unchanged);
    }
}
