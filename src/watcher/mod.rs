//! Watcher module
//!
//! Keeps the local resource cache in step with the live channel. Collections
//! are seeded from list endpoints and then mutated by decoded status events;
//! [`CacheSink`] is the frame handler that turns channel messages into cache
//! events.

mod registry;
mod state;

pub use registry::*;
pub use state::*;

use crate::models::{CachedResource, CollectionKey, ResourceStatus};
use crate::transport::{DecodedMessage, FrameHandler};
use std::fmt;

/// Frame handler that reconciles status events into the cache
///
/// Live status events always target the clusters collection.
pub struct CacheSink {
    cache: ResourceCache,
}

impl CacheSink {
    pub fn new(cache: ResourceCache) -> Self {
        Self { cache }
    }
}

impl FrameHandler for CacheSink {
    fn on_message(&mut self, message: &DecodedMessage) {
        let event = match message {
            DecodedMessage::StatusUpdate { cluster_id, status } => CacheEvent::StatusUpdate {
                collection: CollectionKey::Clusters,
                resource_id: cluster_id.clone(),
                status: status.clone(),
            },
            DecodedMessage::Deleted { cluster_id } => CacheEvent::Deleted {
                collection: CollectionKey::Clusters,
                resource_id: cluster_id.clone(),
            },
            // Terminal traffic is routed elsewhere
            _ => return,
        };
        self.cache.apply(event);
    }
}

/// A difference between two snapshots of a collection
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotChange {
    Added(CachedResource),
    Removed(CachedResource),
    StatusChanged {
        resource: CachedResource,
        from: Option<ResourceStatus>,
    },
}

impl fmt::Display for SnapshotChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotChange::Added(r) => {
                write!(f, "+ {} ({}) {}", r.name(), r.id, r.status_label())
            }
            SnapshotChange::Removed(r) => write!(f, "- {} ({})", r.name(), r.id),
            SnapshotChange::StatusChanged { resource, from } => write!(
                f,
                "~ {} ({}) {} -> {}",
                resource.name(),
                resource.id,
                from.as_ref().map(|s| s.as_str()).unwrap_or("-"),
                resource.status_label()
            ),
        }
    }
}

/// Compare two snapshots by id
///
/// Changes are listed removals first, then additions and status changes in
/// the order of `after`.
pub fn diff_snapshots(before: &[CachedResource], after: &[CachedResource]) -> Vec<SnapshotChange> {
    let mut changes: Vec<SnapshotChange> = before
        .iter()
        .filter(|old| !after.iter().any(|new| new.id == old.id))
        .cloned()
        .map(SnapshotChange::Removed)
        .collect();

    for new in after {
        match before.iter().find(|old| old.id == new.id) {
            None => changes.push(SnapshotChange::Added(new.clone())),
            Some(old) if old.status != new.status => changes.push(SnapshotChange::StatusChanged {
                resource: new.clone(),
                from: old.status.clone(),
            }),
            Some(_) => {}
        }
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_ignores_terminal_frames() {
        let cache = ResourceCache::new();
        cache.apply(CacheEvent::Seeded {
            collection: CollectionKey::Clusters,
            records: vec![CachedResource::new("c1", Some(ResourceStatus::Running))],
        });
        let mut sink = CacheSink::new(cache.clone());
        sink.on_message(&DecodedMessage::TerminalData("c1".to_string()));
        sink.on_message(&DecodedMessage::TerminalError("boom".to_string()));
        assert_eq!(cache.version(), 1);
    }

    #[test]
    fn test_diff_snapshots() {
        let before = vec![
            CachedResource::new("a", Some(ResourceStatus::Provisioning)).with_field("name", "alpha"),
            CachedResource::new("b", Some(ResourceStatus::Running)),
        ];
        let after = vec![
            CachedResource::new("a", Some(ResourceStatus::Running)).with_field("name", "alpha"),
            CachedResource::new("c", None),
        ];

        let lines: Vec<String> = diff_snapshots(&before, &after)
            .iter()
            .map(|c| c.to_string())
            .collect();
        assert_eq!(
            lines,
            vec![
                "- b (b)",
                "~ alpha (a) PROVISIONING -> RUNNING",
                "+ c (c) -",
            ]
        );
    }

    #[test]
    fn test_diff_identical_is_empty() {
        let snapshot = vec![CachedResource::new("a", Some(ResourceStatus::Running))];
        assert!(diff_snapshots(&snapshot, &snapshot).is_empty());
    }
}
