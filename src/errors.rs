//! Typed error hierarchy, one enum per component boundary.
//!
//! Each variant name matches an error kind from the error-handling design: the CLI
//! maps these to exit codes by downcasting the top-level `anyhow::Error` chain back
//! to one of these enums and inspecting which variant surfaced.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config.json not found at {0}")]
    NotFound(PathBuf),

    #[error("config.json is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("config invalid: {0}")]
    ConfigInvalid(String),

    #[error("slug {0:?} contains characters outside [A-Za-z0-9_-]")]
    InvalidSlug(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("branch {branch:?} does not match expected naming for worker {worker_id:?}: {reason}")]
    InvalidBranchName {
        worker_id: String,
        branch: String,
        reason: String,
    },

    #[error("git operation unavailable: {0}")]
    GitUnavailable(String),

    #[error("failed to create branch {0:?}")]
    BranchCreateFailed(String),

    #[error("worktree at {0:?} has uncommitted changes")]
    WorktreeDirty(PathBuf),

    #[error(transparent)]
    Git(#[from] git2::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Session(#[from] SessionError),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to start session {0:?}: {1}")]
    SessionStartFailed(String, String),

    #[error("session {0:?} not found")]
    NotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum DependencyError {
    #[error("dependency cycle detected among workers: {0:?}")]
    DependencyCycle(Vec<String>),

    #[error("worker {0:?} depends on unknown worker {1:?}")]
    UnknownDependency(String, String),
}

#[derive(Debug, Error)]
pub enum HopperError {
    #[error("hopper item {0:?} has ambiguous or missing metadata")]
    HopperMetadataAmbiguous(PathBuf),

    #[error("hopper item {0:?} not found")]
    NotFound(PathBuf),

    #[error("hopper item {0:?} is not in the expected tier for this transition")]
    InvalidTransition(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("approval pattern {pattern:?} stuck on session {session:?}")]
    DaemonPatternStuck { session: String, pattern: String },

    #[error(transparent)]
    Session(#[from] SessionError),
}

#[derive(Debug, Error)]
pub enum WiggumError {
    #[error("attempt {0} timed out")]
    WiggumTimeout(u32),

    #[error("attempt {0} produced a diff identical to a previous attempt")]
    WiggumCycle(u32),

    #[error("attempt {0} failed verify_command (exit {1})")]
    WiggumVerifyFailed(u32, i32),

    #[error("all {0} attempts exhausted without success")]
    WiggumAborted(u32),

    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum PhaseError {
    #[error("worktree for worker {0:?} is dirty and was kept")]
    WorktreeDirty(String),

    #[error("phase {0} is not active")]
    NotActive(u32),

    #[error("workers/ is non-empty; pass --force to re-init over an in-progress phase")]
    NonEmptyWorkers,

    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
