//! Assessment rules for project-tier hopper items (spec.md §4.5). Assessment is a
//! pure function of an item's metadata plus the current phase number and idle
//! worker count — idempotent, so re-running it without a file-mtime change must
//! not re-emit an event (spec.md §8 property 4).

use super::{Complexity, HopperItemMeta, Priority};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assessment {
    AutoDefer,
    AutoInclude,
    AskHuman,
}

/// Top-down rule table from spec.md §4.5; first match wins.
pub fn assess(meta: &HopperItemMeta, current_phase: u32, idle_workers: usize) -> Assessment {
    let suggested_phase_later = meta
        .suggested_phase
        .as_deref()
        .and_then(parse_phase_number)
        .map(|p| p > current_phase)
        .unwrap_or(false);

    if meta.tags.iter().any(|t| t == "future")
        || suggested_phase_later
        || meta.priority == Some(Priority::Low)
    {
        return Assessment::AutoDefer;
    }

    if meta.complexity == Some(Complexity::Large) && idle_workers == 0 {
        return Assessment::AutoDefer;
    }

    if meta.priority == Some(Priority::High)
        && matches!(meta.complexity, Some(Complexity::Small) | Some(Complexity::Medium))
        && idle_workers >= 1
    {
        return Assessment::AutoInclude;
    }

    Assessment::AskHuman
}

/// Extracts the leading phase number from strings like `v0.3.0` or `3`. Anything
/// that doesn't parse is treated as "not later than current" — ambiguity here
/// falls through to `ask-human` via the other rules, not a parse failure.
fn parse_phase_number(s: &str) -> Option<u32> {
    let digits: String = s
        .trim_start_matches('v')
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}
