//! k8slab model layer
//!
//! Structure:
//! - `collection.rs` - Names of the cached server collections
//! - `resource.rs` - Cache entries and their status
//! - `auth.rs` - Opaque bearer token

pub mod auth;
pub mod collection;
pub mod resource;

pub use auth::AuthToken;
pub use collection::CollectionKey;
pub use resource::{CachedResource, RecordError, ResourceStatus};
