//! `czarina closeout` (spec.md §6): archive the current phase like `phase close`,
//! then tear the whole `.czarina/` control plane down — daemon and Czar sessions
//! included. Irreversible; callers confirm with the operator before invoking this
//! (spec.md §6's `--yes` global flag exists for exactly this kind of command).

use crate::phase_ctl::{self, CleanMode};
use crate::repo::naming::{czar_session_name, daemon_session_name};
use crate::session::{SessionDriver, SessionHandle, TmuxSessionDriver};
use crate::status::StatusSnapshot;
use crate::worker::WorkerRuntimeState;
use anyhow::Result;
use std::collections::BTreeMap;
use std::path::Path;

pub fn run(project_dir: &Path) -> Result<()> {
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
    driver.kill(&SessionHandle { name: daemon_session_name(&config.project.slug) }).ok();
    driver.kill(&SessionHandle { name: czar_session_name(&config.project.slug) }).ok();

    let result = phase_ctl::archive(&layout, &config, config.project.phase, &outcomes, CleanMode::ForceClean)?;
    println!("Archived phase {} to {} before closeout.", config.project.phase, result.archive_dir.display());

    std::fs::remove_dir_all(layout.czarina_dir())?;
    println!("Removed {} — control plane torn down.", layout.czarina_dir().display());
    Ok(())
}
