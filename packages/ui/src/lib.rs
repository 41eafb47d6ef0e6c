//! This crate contains the shared editor UI for the workspace.

// Re-export icon library
pub use dioxus_free_icons::Icon;
pub mod icons {
    pub use dioxus_free_icons::icons::fa_solid_icons::*;
}

mod sync_hook;
pub use sync_hook::{use_editor_sync, EditorSync};

mod sync_indicator;
pub use sync_indicator::SyncIndicator;
