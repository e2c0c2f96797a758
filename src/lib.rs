//! k8slab Library
//!
//! Live resource synchronization and interactive terminal sessions for a
//! k8s-lab server. It can be used both as a binary and as a library; the
//! `tui` feature adds the ratatui front end.

pub mod api;
pub mod cli;
pub mod config;
pub mod models;
pub mod services;
pub mod terminal;
pub mod transport;
#[cfg(feature = "tui")]
pub mod tui;
pub mod watcher;

// Re-export commonly used types for convenience
pub use models::{AuthToken, CachedResource, CollectionKey, ResourceStatus};
pub use services::{Interest, LiveSession, SubscriptionBinder, SubscriptionHandle};
pub use terminal::{SessionOutput, SessionState, TerminalMode, TerminalSession};
pub use transport::{ConnectionManager, ConnectionState, ConnectionStatus};
pub use watcher::{CacheEvent, ResourceCache, diff_snapshots, get_all_commands};
