//! Service layer
//!
//! Binds UI interest to the live connection and composes the lower layers
//! into a headless session, keeping the TUI and CLI focused on presentation.

pub mod live_session;
pub mod subscriptions;

pub use live_session::LiveSession;
pub use subscriptions::{Interest, SubscriptionBinder, SubscriptionHandle};
