//! `czarina worker complete <id>` (spec.md §4.4 StatusFile signal / §4.8
//! `WORKER_COMPLETE`). The only producer of the LogMarker and StatusFile completion
//! signals in the delivered system — meant to be called from a worker's own exit
//! hook (or appended to its starter prompt, see [`crate::launch::default_prompt`])
//! so `phase_completion_mode = all|strict` have something besides `BranchMerged` to
//! observe.

use crate::eventlog::{EventKind, EventLog, Severity, Source};
use crate::status::{StatusSnapshot, WorkerStatusEntry};
use crate::worker::{CompletionSignals, Health, WorkerStatusKind};
use anyhow::{bail, Result};
use chrono::Utc;
use std::path::Path;

pub fn complete(project_dir: &Path, worker_id: &str) -> Result<()> {
    let (config, layout) = super::load(project_dir)?;
    if !config.workers.iter().any(|w| w.id == worker_id) {
        bail!("no worker named '{worker_id}' in config.json");
    }

    let status_path = layout.worker_status_path();
    let mut snapshot = StatusSnapshot::load(&status_path)?;
    let entry = snapshot
        .workers
        .entry(worker_id.to_string())
        .or_insert_with(|| WorkerStatusEntry {
            status: WorkerStatusKind::Pending,
            health: Health::Healthy,
            session_alive: true,
            last_activity: None,
            commits_ahead: 0,
            completion: CompletionSignals {
                log_marker: false,
                branch_merged: false,
                status_file: false,
            },
        });
    entry.status = WorkerStatusKind::Complete;
    entry.completion.status_file = true;
    entry.last_activity = Some(Utc::now());
    snapshot.generated_at = Some(Utc::now());
    snapshot.save(&status_path)?;

    let mut events = EventLog::open(&layout.logs_dir())?;
    events.emit_simple(
        Source::Worker,
        EventKind::WorkerComplete,
        Severity::Success,
        &[("worker", worker_id)],
    )?;

    println!("Marked {worker_id} complete.");
    Ok(())
}
