//! Collection registry
//!
//! Maps every cached collection to its display name and the command aliases
//! accepted by the CLI and the TUI command bar. To add a collection, add a
//! `CollectionKey` variant and an entry here.

use crate::models::CollectionKey;

/// Registry entry for a cached collection
pub struct CollectionEntry {
    pub key: CollectionKey,
    pub display_name: &'static str,
    pub command_aliases: &'static [&'static str],
}

pub const COLLECTION_REGISTRY: &[CollectionEntry] = &[
    CollectionEntry {
        key: CollectionKey::Clusters,
        display_name: "Clusters",
        command_aliases: &["clusters", "cluster", "cl"],
    },
    CollectionEntry {
        key: CollectionKey::Teams,
        display_name: "Teams",
        command_aliases: &["teams", "team"],
    },
    CollectionEntry {
        key: CollectionKey::Invitations,
        display_name: "Invitations",
        command_aliases: &["invitations", "invitation", "invites", "inv"],
    },
];

/// Get the collection for a command alias
pub fn get_collection_for_command(cmd: &str) -> Option<CollectionKey> {
    let cmd_lower = cmd.trim().to_lowercase();
    COLLECTION_REGISTRY
        .iter()
        .find(|entry| entry.command_aliases.iter().any(|&alias| alias == cmd_lower))
        .map(|entry| entry.key)
}

/// Get the display name of a collection
pub fn display_name(key: CollectionKey) -> &'static str {
    COLLECTION_REGISTRY
        .iter()
        .find(|entry| entry.key == key)
        .map(|entry| entry.display_name)
        .unwrap_or_else(|| key.as_str())
}

/// Get all command aliases for help text
pub fn get_all_commands() -> Vec<(&'static str, &'static [&'static str])> {
    COLLECTION_REGISTRY
        .iter()
        .map(|e| (e.display_name, e.command_aliases))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases_resolve() {
        assert_eq!(get_collection_for_command("cl"), Some(CollectionKey::Clusters));
        assert_eq!(get_collection_for_command("Teams"), Some(CollectionKey::Teams));
        assert_eq!(
            get_collection_for_command("invites"),
            Some(CollectionKey::Invitations)
        );
        assert_eq!(get_collection_for_command("pods"), None);
    }

    #[test]
    fn test_every_collection_is_registered() {
        for key in CollectionKey::all() {
            assert!(COLLECTION_REGISTRY.iter().any(|e| e.key == *key));
            assert!(get_collection_for_command(key.as_str()).is_some());
        }
        assert_eq!(display_name(CollectionKey::Invitations), "Invitations");
    }
}
