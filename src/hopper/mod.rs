//! Hopper: the two-tier backlog (spec.md §4.5). The project tier is an unsorted
//! markdown inbox under `hopper/`; the phase tier lives in `.czarina/phase-hopper/
//! {todo,in-progress,done}/` (SPEC_FULL.md §9's resolution of the "where does the
//! phase hopper live" Open Question) and is folded into the phase archive snapshot
//! at close.
//!
//! Item metadata parsing is hand-rolled regex over the first 20 lines, matching
//! spec.md §6's "front-matter-like block" — not real YAML front matter — grounded
//! on the `signals::parser` approach of regex-scanning plain text for
//! small structured tags rather than pulling in a markdown/frontmatter crate for a
//! handful of fields.

pub mod assess;
pub mod assign;

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Complexity {
    Small,
    Medium,
    Large,
}

#[derive(Debug, Clone, Default)]
pub struct HopperItemMeta {
    pub priority: Option<Priority>,
    pub complexity: Option<Complexity>,
    pub tags: Vec<String>,
    pub suggested_phase: Option<String>,
    pub estimate: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HopperItem {
    pub path: PathBuf,
    pub meta: HopperItemMeta,
}

fn field_regex(label: &str) -> Regex {
    Regex::new(&format!(r"(?m)^\*\*{label}:\*\*\s*(.+)$")).expect("static pattern")
}

fn priority_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| field_regex("Priority"))
}

fn complexity_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| field_regex("Complexity"))
}

fn tags_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| field_regex("Tags"))
}

fn suggested_phase_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| field_regex("Suggested Phase"))
}

fn estimate_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| field_regex("Estimate"))
}

/// Scan the first 20 lines (spec.md §6) for recognized fields. Unrecognized or
/// malformed values are left `None` — callers treat missing/ambiguous metadata as
/// a discriminator for `ask-human` (spec.md §4.5), not a parse error.
pub fn parse_meta(text: &str) -> HopperItemMeta {
    let head: String = text.lines().take(20).collect::<Vec<_>>().join("\n");

    let priority = priority_re()
        .captures(&head)
        .and_then(|c| c.get(1))
        .and_then(|m| match m.as_str().trim() {
            "Low" => Some(Priority::Low),
            "Medium" => Some(Priority::Medium),
            "High" => Some(Priority::High),
            _ => None,
        });

    let complexity = complexity_re()
        .captures(&head)
        .and_then(|c| c.get(1))
        .and_then(|m| match m.as_str().trim() {
            "Small" => Some(Complexity::Small),
            "Medium" => Some(Complexity::Medium),
            "Large" => Some(Complexity::Large),
            _ => None,
        });

    let tags = tags_re()
        .captures(&head)
        .and_then(|c| c.get(1))
        .map(|m| {
            m.as_str()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let suggested_phase = suggested_phase_re()
        .captures(&head)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string());

    let estimate = estimate_re()
        .captures(&head)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string());

    HopperItemMeta {
        priority,
        complexity,
        tags,
        suggested_phase,
        estimate,
    }
}

pub fn load_item(path: &Path) -> std::io::Result<HopperItem> {
    let text = std::fs::read_to_string(path)?;
    Ok(HopperItem {
        path: path.to_path_buf(),
        meta: parse_meta(&text),
    })
}

/// List `*.md` files in a directory, alphabetical by filename (spec.md §4.5
/// assignment tie-break).
pub fn list_md_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().map(|e| e == "md").unwrap_or(false))
        .collect();
    paths.sort();
    Ok(paths)
}
