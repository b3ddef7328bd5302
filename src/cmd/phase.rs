//! `czarina phase close [--keep-worktrees|--force-clean]` and `czarina phase list`
//! (spec.md §4.4 `PhaseController.archive`, §6).

use crate::phase_ctl::{self, CleanMode};
use crate::session::TmuxSessionDriver;
use crate::status::StatusSnapshot;
use crate::worker::WorkerRuntimeState;
use anyhow::Result;
use std::collections::BTreeMap;
use std::path::Path;

pub fn close(project_dir: &Path, keep_worktrees: bool, force_clean: bool) -> Result<()> {
    let (config, layout) = super::load(project_dir)?;
    let snapshot = StatusSnapshot::load(&layout.worker_status_path())?;

    let states: BTreeMap<String, WorkerRuntimeState> = snapshot
        .workers
        .iter()
        .map(|(id, entry)| {
            (
                id.clone(),
                WorkerRuntimeState {
                    worker_id: id.clone(),
                    status: entry.status,
                    health: entry.health,
                    session_alive: entry.session_alive,
                    last_activity: entry.last_activity,
                    commits_ahead: entry.commits_ahead,
                    completion: entry.completion.clone(),
                },
            )
        })
        .collect();
    let outcomes = phase_ctl::build_outcomes(&config.workers, &states);

    let driver = TmuxSessionDriver;
    phase_ctl::kill_phase_sessions(&driver, &config.project.slug, &config.workers);

    let clean_mode = match (keep_worktrees, force_clean) {
        (true, _) => CleanMode::KeepAll,
        (false, true) => CleanMode::ForceClean,
        (false, false) => CleanMode::Default,
    };
    let result = phase_ctl::archive(&layout, &config, config.project.phase, &outcomes, clean_mode)?;

    println!("Archived phase {} to {}", config.project.phase, result.archive_dir.display());
    if !result.kept_dirty.is_empty() {
        println!(
            "Kept worktrees with uncommitted changes: {}",
            result.kept_dirty.join(", ")
        );
    }
    Ok(())
}

pub fn list(project_dir: &Path) -> Result<()> {
    let (_, layout) = super::load(project_dir)?;
    let archived = phase_ctl::list_archived(&layout)?;
    if archived.is_empty() {
        println!("No archived phases yet.");
        return Ok(());
    }
    for name in archived {
        println!("{name}");
    }
    Ok(())
}
