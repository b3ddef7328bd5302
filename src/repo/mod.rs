//! RepoLayout: owns every path under `.czarina/` (spec.md §4.1) and the worktree/
//! branch lifecycle operations built on top of [`git`].

pub mod git;
pub mod naming;

use crate::config::Config;
use crate::errors::RepoError;
use std::path::{Path, PathBuf};

/// Exclusive owner of everything under `<repository>/.czarina/`.
#[derive(Debug, Clone)]
pub struct RepoLayout {
    root: PathBuf,
    czarina_dir: PathBuf,
}

impl RepoLayout {
    pub fn new(root: impl Into<PathBuf>, czarina_dir_name: &str) -> Self {
        let root = root.into();
        let czarina_dir = root.join(czarina_dir_name);
        Self { root, czarina_dir }
    }

    pub fn for_config(root: impl Into<PathBuf>, config: &Config) -> Self {
        Self::new(root, config.orchestration_dir_name())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn czarina_dir(&self) -> &Path {
        &self.czarina_dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.czarina_dir.join("config.json")
    }

    pub fn workers_dir(&self) -> PathBuf {
        self.czarina_dir.join("workers")
    }

    pub fn worker_prompt_path(&self, worker_id: &str) -> PathBuf {
        self.workers_dir().join(format!("{worker_id}.md"))
    }

    pub fn worktrees_dir(&self) -> PathBuf {
        self.czarina_dir.join("worktrees")
    }

    pub fn worktree_path(&self, worker_id: &str) -> PathBuf {
        self.worktrees_dir().join(worker_id)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.czarina_dir.join("logs")
    }

    pub fn events_path(&self) -> PathBuf {
        self.logs_dir().join("events.jsonl")
    }

    pub fn orchestration_log_path(&self) -> PathBuf {
        self.logs_dir().join("orchestration.log")
    }

    pub fn worker_log_path(&self, worker_id: &str) -> PathBuf {
        self.logs_dir().join("workers").join(format!("{worker_id}.log"))
    }

    pub fn trace_log_dir(&self) -> PathBuf {
        self.logs_dir().join("trace")
    }

    pub fn status_dir(&self) -> PathBuf {
        self.czarina_dir.join("status")
    }

    pub fn worker_status_path(&self) -> PathBuf {
        self.status_dir().join("worker-status.json")
    }

    pub fn phase_state_path(&self) -> PathBuf {
        self.status_dir().join("phase-state.json")
    }

    pub fn autonomous_decisions_log_path(&self) -> PathBuf {
        self.status_dir().join("autonomous-decisions.log")
    }

    pub fn hopper_dir(&self) -> PathBuf {
        self.czarina_dir.join("hopper")
    }

    /// Live phase-tier hopper directory. SPEC_FULL.md §9 resolves the Open Question
    /// in favor of a live sibling directory (folded into the archive at phase close)
    /// rather than nesting it inside the not-yet-created phase archive.
    pub fn phase_hopper_dir(&self) -> PathBuf {
        self.czarina_dir.join("phase-hopper")
    }

    pub fn phase_hopper_todo_dir(&self) -> PathBuf {
        self.phase_hopper_dir().join("todo")
    }

    pub fn phase_hopper_in_progress_dir(&self) -> PathBuf {
        self.phase_hopper_dir().join("in-progress")
    }

    pub fn phase_hopper_done_dir(&self) -> PathBuf {
        self.phase_hopper_dir().join("done")
    }

    pub fn wiggum_wisdom_path(&self) -> PathBuf {
        self.czarina_dir.join("wiggum-wisdom.md")
    }

    pub fn wiggum_sandbox_dir(&self, sandbox_prefix: &str) -> PathBuf {
        if Path::new(sandbox_prefix).is_absolute() {
            PathBuf::from(sandbox_prefix)
        } else {
            self.root.join(sandbox_prefix)
        }
    }

    pub fn phases_dir(&self) -> PathBuf {
        self.czarina_dir.join("phases")
    }

    pub fn phase_archive_dir(&self, phase: u32, version: &str) -> PathBuf {
        self.phases_dir().join(format!("phase-{phase}-v{version}"))
    }

    /// Create every directory the layout owns. Idempotent.
    pub fn ensure_directories(&self) -> Result<(), RepoError> {
        for dir in [
            self.workers_dir(),
            self.worktrees_dir(),
            self.logs_dir(),
            self.logs_dir().join("workers"),
            self.trace_log_dir(),
            self.status_dir(),
            self.hopper_dir(),
            self.phase_hopper_todo_dir(),
            self.phase_hopper_in_progress_dir(),
            self.phase_hopper_done_dir(),
            self.phases_dir(),
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// "Previous phase closed" signal per spec.md §4.4: `.czarina/` exists but
    /// `workers/` is empty.
    pub fn workers_dir_is_empty(&self) -> bool {
        match std::fs::read_dir(self.workers_dir()) {
            Ok(mut entries) => entries.next().is_none(),
            Err(_) => true,
        }
    }

    pub fn exists(&self) -> bool {
        self.czarina_dir.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn ensure_directories_creates_full_tree() {
        let dir = TempDir::new().unwrap();
        let layout = RepoLayout::new(dir.path(), ".czarina");
        layout.ensure_directories().unwrap();
        assert!(layout.worktrees_dir().exists());
        assert!(layout.phase_hopper_todo_dir().exists());
        assert!(layout.phases_dir().exists());
    }

    #[test]
    fn workers_dir_empty_detects_closed_phase() {
        let dir = TempDir::new().unwrap();
        let layout = RepoLayout::new(dir.path(), ".czarina");
        layout.ensure_directories().unwrap();
        assert!(layout.workers_dir_is_empty());
        std::fs::write(layout.worker_prompt_path("alice"), "prompt").unwrap();
        assert!(!layout.workers_dir_is_empty());
    }
}
