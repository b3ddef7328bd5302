//! `czarina hopper add|list|pull|defer|assign` (spec.md §4.5, §6). Project-tier
//! items live as loose markdown under `hopper/`; the phase tier's `todo/
//! in-progress/done` directories are what CzarLoop's automatic assignment and
//! assessment also read and write — these commands are the human-facing override
//! of the same machinery.

use crate::eventlog::{EventKind, EventLog, Severity, Source};
use crate::hopper::assess::{assess, Assessment};
use crate::hopper::assign::move_item;
use crate::hopper::{list_md_files, load_item};
use crate::status::StatusSnapshot;
use crate::worker::{Health, WorkerStatusKind};
use anyhow::{bail, Context, Result};
use std::path::Path;

pub fn add(project_dir: &Path, file: &Path) -> Result<()> {
    let (_, layout) = super::load(project_dir)?;
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let filename = file
        .file_name()
        .with_context(|| format!("{} has no filename", file.display()))?;
    let dest = layout.hopper_dir().join(filename);
    std::fs::create_dir_all(layout.hopper_dir())?;
    std::fs::write(&dest, &text)?;

    let mut events = EventLog::open(&layout.logs_dir())?;
    events.emit_simple(
        Source::Cli,
        EventKind::HopperNewItem,
        Severity::Info,
        &[("item", &dest.display().to_string())],
    )?;
    println!("Added {} to the project hopper.", dest.display());
    Ok(())
}

pub fn list(project_dir: &Path, tier: &str) -> Result<()> {
    let (_, layout) = super::load(project_dir)?;
    match tier {
        "project" => {
            let items = list_md_files(&layout.hopper_dir())?;
            if items.is_empty() {
                println!("Project hopper is empty.");
                return Ok(());
            }
            for path in items {
                let item = load_item(&path)?;
                println!(
                    "{:<40} priority={:<8} complexity={:<8}",
                    path.file_name().unwrap().to_string_lossy(),
                    item.meta.priority.map(|p| format!("{p:?}")).unwrap_or_else(|| "-".into()),
                    item.meta.complexity.map(|c| format!("{c:?}")).unwrap_or_else(|| "-".into()),
                );
            }
        }
        "phase" => {
            for (label, dir) in [
                ("todo", layout.phase_hopper_todo_dir()),
                ("in-progress", layout.phase_hopper_in_progress_dir()),
                ("done", layout.phase_hopper_done_dir()),
            ] {
                let items = list_md_files(&dir)?;
                println!("{label} ({}):", items.len());
                for path in items {
                    println!("  {}", path.file_name().unwrap().to_string_lossy());
                }
            }
        }
        other => bail!("unknown hopper tier '{other}', expected 'project' or 'phase'"),
    }
    Ok(())
}

/// Promote a project-tier item into the phase's `todo/` backlog. Reports the
/// automatic assessment (spec.md §4.5) for context but a human-invoked `pull`
/// always proceeds — the assessment only decides what CzarLoop would have done on
/// its own.
pub fn pull(project_dir: &Path, file: &Path) -> Result<()> {
    let (config, layout) = super::load(project_dir)?;
    let src = resolve_project_item(&layout, file)?;
    let item = load_item(&src)?;

    let snapshot = StatusSnapshot::load(&layout.worker_status_path())?;
    let idle_workers = snapshot
        .workers
        .values()
        .filter(|w| w.status == WorkerStatusKind::Idle && w.health == Health::Healthy)
        .count();
    let assessment = assess(&item.meta, config.project.phase, idle_workers);

    let dest = move_item(&src, &layout.phase_hopper_todo_dir())?;

    let mut events = EventLog::open(&layout.logs_dir())?;
    let kind = match assessment {
        Assessment::AutoInclude => EventKind::HopperAutoInclude,
        Assessment::AutoDefer => EventKind::HopperAutoDefer,
        Assessment::AskHuman => EventKind::HopperAskHuman,
    };
    events.emit_simple(
        Source::Cli,
        kind,
        Severity::Info,
        &[("item", &dest.display().to_string())],
    )?;

    println!(
        "Pulled {} into the phase todo queue (automatic assessment would have been {assessment:?}).",
        dest.display()
    );
    Ok(())
}

/// The inverse of `pull`: move an item back out of the phase `todo/` queue into
/// the project-tier inbox for later reconsideration.
pub fn defer(project_dir: &Path, file: &Path) -> Result<()> {
    let (_, layout) = super::load(project_dir)?;
    let src = resolve_in_dir(&layout.phase_hopper_todo_dir(), file)?;
    let dest = move_item(&src, &layout.hopper_dir())?;

    let mut events = EventLog::open(&layout.logs_dir())?;
    events.emit_simple(
        Source::Cli,
        EventKind::HopperAutoDefer,
        Severity::Info,
        &[("item", &dest.display().to_string())],
    )?;
    println!("Deferred {} back to the project hopper.", dest.display());
    Ok(())
}

/// Manually assign a `todo/` item to a named worker, bypassing the automatic
/// highest-priority-first pairing (spec.md §4.5 "Selection") for a one-off
/// override.
pub fn assign(project_dir: &Path, worker: &str, file: &Path) -> Result<()> {
    let (config, layout) = super::load(project_dir)?;
    if !config.workers.iter().any(|w| w.id == worker) {
        bail!("no worker named '{worker}' in config.json");
    }
    let src = resolve_in_dir(&layout.phase_hopper_todo_dir(), file)?;
    let dest = move_item(&src, &layout.phase_hopper_in_progress_dir())?;

    let mut events = EventLog::open(&layout.logs_dir())?;
    events.emit_simple(
        Source::Cli,
        EventKind::HopperAssignTask,
        Severity::Info,
        &[("worker", worker), ("item", &dest.display().to_string())],
    )?;
    println!("Assigned {} to {worker}.", dest.display());
    Ok(())
}

fn resolve_project_item(layout: &crate::repo::RepoLayout, file: &Path) -> Result<std::path::PathBuf> {
    resolve_in_dir(&layout.hopper_dir(), file)
}

fn resolve_in_dir(dir: &Path, file: &Path) -> Result<std::path::PathBuf> {
    if file.is_absolute() && file.exists() {
        return Ok(file.to_path_buf());
    }
    let filename = file.file_name().unwrap_or(file.as_os_str());
    let candidate = dir.join(filename);
    if !candidate.exists() {
        bail!("{} not found", candidate.display());
    }
    Ok(candidate)
}
