//! Terminal UI module using ratatui.
//!
//! - `render`: Main frame rendering, layout and overlays
//! - `input`: Keyboard event handling
//! - `styles`: Color palette and text styling
//! - `tabs`: Per-tab content (form, blocklist, audit log, API keys, API logs)

pub mod input;
pub mod render;
pub mod styles;
pub mod tabs;
