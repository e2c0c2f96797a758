//! Collection key definitions
//!
//! Every live-updated collection the client caches is named by a
//! `CollectionKey`. This keeps endpoint paths and CLI aliases in one place.

use std::fmt;
use std::str::FromStr;

/// Enumeration of the server-owned collections kept in the local cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CollectionKey {
    Clusters,
    Teams,
    Invitations,
}

impl CollectionKey {
    /// Get the display name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionKey::Clusters => "clusters",
            CollectionKey::Teams => "teams",
            CollectionKey::Invitations => "invitations",
        }
    }

    /// Path of the list endpoint that seeds this collection, relative to the API base
    pub fn list_path(&self) -> &'static str {
        match self {
            CollectionKey::Clusters => "/clusters",
            CollectionKey::Teams => "/teams",
            CollectionKey::Invitations => "/invitations/pending",
        }
    }

    /// Whether the live channel pushes status events for this collection
    pub fn is_live(&self) -> bool {
        matches!(self, CollectionKey::Clusters)
    }

    /// Get all collection keys
    pub fn all() -> &'static [Self] {
        &[
            CollectionKey::Clusters,
            CollectionKey::Teams,
            CollectionKey::Invitations,
        ]
    }

    /// Try to parse a string (case-insensitive) into a CollectionKey
    pub fn from_str_case_insensitive(s: &str) -> Option<Self> {
        crate::watcher::get_collection_for_command(s)
    }
}

impl fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CollectionKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_case_insensitive(s).ok_or_else(|| format!("Unknown collection: {}", s))
    }
}
