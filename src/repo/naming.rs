//! Branch naming convention (spec.md §4.1) and the phase-isolation check (§8 property 2).

use crate::config::{WorkerConfig, WorkerRole};
use crate::errors::RepoError;

pub fn feature_branch(phase: u32, worker_id: &str) -> String {
    format!("cz{phase}/feat/{worker_id}")
}

pub fn omnibus_branch(phase: u32, version: &str) -> String {
    format!("cz{phase}/release/v{version}")
}

/// Validate that `worker.branch` matches the naming convention for its role and the
/// given phase number. First-match disposition mirrors the other top-down rule
/// tables elsewhere in this crate.
pub fn validate_branch(worker: &WorkerConfig, phase: u32, omnibus: &str) -> Result<(), RepoError> {
    match worker.role() {
        WorkerRole::Feature => {
            let expected = feature_branch(phase, &worker.id);
            if worker.branch != expected {
                return Err(RepoError::InvalidBranchName {
                    worker_id: worker.id.clone(),
                    branch: worker.branch.clone(),
                    reason: format!("feature worker branch must be {expected:?}"),
                });
            }
        }
        WorkerRole::Integration => {
            if worker.branch != omnibus {
                return Err(RepoError::InvalidBranchName {
                    worker_id: worker.id.clone(),
                    branch: worker.branch.clone(),
                    reason: format!("integration worker branch must equal omnibus branch {omnibus:?}"),
                });
            }
        }
    }
    Ok(())
}

/// Phase-prefix for a branch, i.e. everything up to and including `/feat/` or
/// `/release/`. Two live branches from different phases must never share one
/// (spec.md §8 property 2).
pub fn phase_prefix(branch: &str) -> Option<&str> {
    if let Some(idx) = branch.find("/feat/") {
        Some(&branch[..idx + "/feat/".len()])
    } else {
        branch.find("/release/").map(|idx| &branch[..idx + "/release/".len()])
    }
}

/// Session name per spec.md §6: `<project.slug>:<worker.id>`, colon-separated.
pub fn session_name(slug: &str, worker_id: &str) -> String {
    format!("{slug}:{worker_id}")
}

/// Session name for the detached ApprovalDaemon process (spec.md §5: daemon runs in
/// its own process, managed the same way worker sessions are).
pub fn daemon_session_name(slug: &str) -> String {
    format!("{slug}:__daemon__")
}

/// Session name for the detached CzarLoop supervisor `launch --go` spawns.
pub fn czar_session_name(slug: &str) -> String {
    format!("{slug}:__czar__")
}
