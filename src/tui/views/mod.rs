//! View rendering modules
//!
//! Each view is a free function drawing into a `Frame` area, so views can be
//! rendered against a `TestBackend` without an `App`.

mod footer;
mod header;
mod helpers;
mod resource_list;

pub use footer::render_footer;
pub use header::{ConnectionSummary, render_header};
pub use helpers::{render_empty_state, update_scroll_offset};
pub use resource_list::{columns_for, render_resource_list};
