//! Human-readable output for the `svidwatch` binary.

use crate::{
    stream::Termination,
    watch::{WatchEvent, WatchTarget},
};
use core::fmt::Write;
use svidwatch_core::{SelectorSet, SubscriptionId};

/// Formats a delivered event.
///
/// ```text
/// Reply for unix:uid:1000
/// Entry ID         : spiffe://example.org/workload
/// Expires at       : 1893456000
/// ...
/// ```
pub fn render_event(event: &WatchEvent) -> String {
    let mut out = String::new();
    match event {
        WatchEvent::Update {
            target,
            credentials,
        } => {
            match target {
                WatchTarget::Resolved { selectors, .. } => {
                    let _ = writeln!(out, "Reply for {selectors}");
                }
                WatchTarget::Unresolved { id } => {
                    let _ = writeln!(out, "Reply for NOT FOUND: {id}");
                }
            }
            for credential in credentials {
                let _ = writeln!(out, "Entry ID         : {}", credential.identity);
                let _ = writeln!(out, "Expires at       : {}", credential.not_after);
            }
            out.push_str("...\n");
        }
        WatchEvent::Terminated(Termination::Closed) => {
            out.push_str("Stream closed\n");
        }
        WatchEvent::Terminated(Termination::Failed(e)) => {
            let _ = writeln!(out, "Stream failed: {e}");
        }
    }
    out
}

/// Formats the output of the `list` command.
pub fn render_watches(watches: &[(SubscriptionId, SelectorSet)]) -> String {
    if watches.is_empty() {
        return "No watches\n".to_string();
    }
    let mut out = String::new();
    for (id, selectors) in watches {
        let _ = writeln!(out, "{id:<20} {selectors}");
    }
    out
}
