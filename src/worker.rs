//! WorkerStatus: materializes per-worker status/health from activity signals
//! (spec.md §4.3) and the completion-signal predicate it depends on (§4.4).

use crate::config::{Config, PhaseCompletionMode, WorkerConfig};
use crate::eventlog::{EventKind, EventLog};
use crate::repo::git;
use crate::repo::RepoLayout;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatusKind {
    Pending,
    Working,
    Idle,
    /// Terminal state distinct from `idle`; set only by the worker's own completion
    /// report, never derived (spec.md §4.4 StatusFile signal).
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    Healthy,
    Slow,
    Stuck,
    Crashed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionSignals {
    pub log_marker: bool,
    pub branch_merged: bool,
    pub status_file: bool,
}

impl CompletionSignals {
    pub fn satisfies(&self, mode: PhaseCompletionMode) -> bool {
        match mode {
            PhaseCompletionMode::Any => self.log_marker || self.branch_merged || self.status_file,
            PhaseCompletionMode::All => self.log_marker && self.branch_merged && self.status_file,
            PhaseCompletionMode::Strict => {
                self.log_marker && (self.branch_merged || self.status_file)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRuntimeState {
    pub worker_id: String,
    pub status: WorkerStatusKind,
    pub health: Health,
    pub session_alive: bool,
    pub last_activity: Option<DateTime<Utc>>,
    pub commits_ahead: u32,
    pub completion: CompletionSignals,
}

impl WorkerRuntimeState {
    pub fn dependency_met(&self) -> bool {
        matches!(
            self.status,
            WorkerStatusKind::Working | WorkerStatusKind::Idle | WorkerStatusKind::Complete
        )
    }

    /// `blocked(w)` per spec.md §4.4.
    pub fn is_blocked(&self, deps_met: bool) -> bool {
        matches!(self.status, WorkerStatusKind::Working | WorkerStatusKind::Idle) && !deps_met
    }

    /// `integration-ready(w)` per spec.md §4.4.
    pub fn is_integration_ready(&self, deps_met: bool) -> bool {
        self.status == WorkerStatusKind::Idle && deps_met && self.commits_ahead > 0
    }
}

pub struct StatusInputs {
    pub session_alive: bool,
    pub last_activity: Option<DateTime<Utc>>,
    pub commits_ahead: u32,
    pub completion: CompletionSignals,
    pub previous_status: Option<WorkerStatusKind>,
    pub completion_mode: PhaseCompletionMode,
}

/// Derive status/health from inputs per the top-down table in spec.md §4.3.
/// First match wins.
pub fn derive(inputs: &StatusInputs, now: DateTime<Utc>) -> (WorkerStatusKind, Health) {
    if !inputs.session_alive {
        let last_known = inputs.previous_status.unwrap_or(WorkerStatusKind::Pending);
        return (last_known, Health::Crashed);
    }

    if inputs.completion.satisfies(inputs.completion_mode) {
        return (WorkerStatusKind::Idle, Health::Healthy);
    }

    if let Some(last_activity) = inputs.last_activity {
        let idle_for = now - last_activity;
        // Stuck overrides the 1h/2h windows below: once a worker that was
        // `working` has been inactive >= 30 min it is marked stuck regardless of
        // the 2h "slow" bound (spec.md §4.3 note), so this check runs first.
        if idle_for >= Duration::minutes(30)
            && inputs.previous_status == Some(WorkerStatusKind::Working)
        {
            return (WorkerStatusKind::Working, Health::Stuck);
        }
        if idle_for <= Duration::minutes(60) {
            return (WorkerStatusKind::Working, Health::Healthy);
        }
        if idle_for <= Duration::hours(2) {
            return (WorkerStatusKind::Working, Health::Slow);
        }
        return (WorkerStatusKind::Idle, Health::Healthy);
    }

    if inputs.commits_ahead == 0 {
        return (WorkerStatusKind::Pending, Health::Healthy);
    }

    (WorkerStatusKind::Idle, Health::Healthy)
}

/// Compute `WorkerRuntimeState` for one worker by combining git activity, the
/// worker's human-readable log mtime, the status-file snapshot, and session
/// liveness — the materialization CzarLoop performs every tick (spec.md §4.2 step 1).
pub fn materialize(
    layout: &RepoLayout,
    config: &Config,
    worker: &WorkerConfig,
    omnibus_branch: &str,
    session_alive: bool,
    previous_status: Option<WorkerStatusKind>,
    status_file_complete: bool,
    events: &EventLog,
) -> Result<WorkerRuntimeState, crate::errors::RepoError> {
    let repo_path = layout.root();
    let branch_time = if git::is_git_repo(repo_path) {
        git::branch_tip_time(repo_path, &worker.branch)?
    } else {
        None
    };
    let log_mtime = std::fs::metadata(layout.worker_log_path(&worker.id))
        .ok()
        .and_then(|m| m.modified().ok())
        .map(DateTime::<Utc>::from);
    let status_mtime = std::fs::metadata(layout.worker_status_path())
        .ok()
        .and_then(|m| m.modified().ok())
        .map(DateTime::<Utc>::from);
    let last_activity = [branch_time, log_mtime, status_mtime]
        .into_iter()
        .flatten()
        .max();

    let commits_ahead = if git::is_git_repo(repo_path) {
        git::commits_ahead(repo_path, &worker.branch, omnibus_branch)?
    } else {
        0
    };

    let branch_merged = git::is_git_repo(repo_path)
        && worker.branch != omnibus_branch
        && git::is_ancestor(repo_path, &worker.branch, omnibus_branch)?;

    let log_marker = events
        .has_event(EventKind::WorkerComplete, |r| {
            r.metadata.get("worker").map(String::as_str) == Some(worker.id.as_str())
        })
        .unwrap_or(false);

    let completion = CompletionSignals {
        log_marker,
        branch_merged,
        status_file: status_file_complete,
    };

    let inputs = StatusInputs {
        session_alive,
        last_activity,
        commits_ahead,
        completion,
        previous_status,
        completion_mode: config.phase_completion_mode,
    };
    let (status, health) = derive(&inputs, Utc::now());

    Ok(WorkerRuntimeState {
        worker_id: worker.id.clone(),
        status,
        health,
        session_alive,
        last_activity,
        commits_ahead,
        completion: inputs.completion,
    })
}
