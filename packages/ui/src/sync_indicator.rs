//! Save status indicator for the editor header.

use dioxus::prelude::*;
use editor::SyncStatus;

use crate::icons::{FaCheck, FaCloudArrowUp, FaTriangleExclamation};
use crate::Icon;

/// A small icon showing whether the editor's content has reached the store.
///
/// - **Pending / committing**: cloud-up icon ("Saving…")
/// - **Saved**: check icon with the save time
/// - **Failed**: warning icon and a Retry button
/// - **Idle**: nothing
#[component]
pub fn SyncIndicator(status: SyncStatus, on_retry: EventHandler<()>) -> Element {
    match status {
        SyncStatus::Idle => rsx! {},
        SyncStatus::Pending | SyncStatus::Committing => rsx! {
            span {
                class: "sync-indicator sync-indicator--saving",
                title: "Saving…",
                Icon { icon: FaCloudArrowUp, width: 14, height: 14 }
            }
        },
        SyncStatus::Saved { at } => {
            let time = at.format("%H:%M:%S").to_string();
            rsx! {
                span {
                    class: "sync-indicator sync-indicator--saved",
                    title: "Saved at {time}",
                    Icon { icon: FaCheck, width: 14, height: 14 }
                }
            }
        }
        SyncStatus::Failed { reason } => rsx! {
            span {
                class: "sync-indicator sync-indicator--failed",
                title: "Not saved: {reason}",
                Icon { icon: FaTriangleExclamation, width: 14, height: 14 }
                button {
                    class: "sync-indicator__retry",
                    onclick: move |_| on_retry.call(()),
                    "Retry"
                }
            }
        },
    }
}
