//! LaunchController: the boot sequence (spec.md §4.1/§9, "LaunchController" row in §2).
//! Validates config, ensures every branch and worktree exists, starts one session per
//! worker, starts the ApprovalDaemon, and — when asked — attaches CzarLoop as a
//! detached supervisor (`--go`).
//!
//! Mirrors `run_orchestrator` in shape (validate prerequisites, then a linear
//! per-worker setup pass before handing off to the long-running loop), but phases are
//! not driven in-process here; each worker and each supervisor gets its own detached
//! session via [`SessionDriver`], since workers are opaque external agent processes,
//! not an in-process iteration budget.

use crate::config::Config;
use crate::errors::RepoError;
use crate::eventlog::{EventKind, EventLog, Severity, Source};
use crate::repo::naming::{czar_session_name, daemon_session_name, feature_branch};
use crate::repo::{git, RepoLayout};
use crate::session::{SessionDriver, SessionHandle};

#[derive(Debug, Clone, Default)]
pub struct LaunchReport {
    pub branches_created: Vec<String>,
    pub branches_push_skipped: Vec<String>,
    pub worktrees_created: Vec<String>,
    pub sessions_started: Vec<String>,
    pub daemon_started: bool,
    pub czar_started: bool,
}

pub struct LaunchController<D: SessionDriver> {
    layout: RepoLayout,
    config: Config,
    driver: D,
    remote: Option<String>,
}

impl<D: SessionDriver> LaunchController<D> {
    pub fn new(layout: RepoLayout, config: Config, driver: D, remote: Option<String>) -> Self {
        Self {
            layout,
            config,
            driver,
            remote,
        }
    }

    /// Run the full boot sequence. `go` attaches CzarLoop as a background supervisor
    /// session in addition to starting the worker sessions and the daemon.
    pub fn launch(&self, go: bool, events: &mut EventLog) -> Result<LaunchReport, RepoError> {
        let mut report = LaunchReport::default();
        let repo_root = self.layout.root();
        let is_git = git::is_git_repo(repo_root);

        for worker in &self.config.workers {
            crate::repo::naming::validate_branch(worker, self.config.project.phase, &self.config.project.omnibus_branch)?;
        }

        if is_git {
            let default_base = git::current_branch(repo_root)?;
            for worker in &self.config.workers {
                let origin = git::ensure_branch(
                    repo_root,
                    &worker.branch,
                    self.remote.as_deref(),
                    &default_base,
                )?;
                if origin == git::BranchOrigin::CreatedFromDefault {
                    report.branches_created.push(worker.branch.clone());
                    if let Some(remote) = &self.remote {
                        if git::push_branch(repo_root, remote, &worker.branch).is_err() {
                            report.branches_push_skipped.push(worker.branch.clone());
                            events.emit_simple(
                                Source::Cli,
                                EventKind::BranchPushSkipped,
                                Severity::Alert,
                                &[("branch", &worker.branch)],
                            )?;
                        }
                    }
                }

                let worktree_path = self.layout.worktree_path(&worker.id);
                if !worktree_path.exists() {
                    git::create_worktree(repo_root, &worktree_path, &worker.branch, &default_base)?;
                    report.worktrees_created.push(worker.id.clone());
                }
            }
        }

        for worker in &self.config.workers {
            let prompt_path = self.layout.worker_prompt_path(&worker.id);
            if !prompt_path.exists() {
                std::fs::write(&prompt_path, default_prompt(worker))?;
            }

            let handle = SessionHandle::for_worker(&self.config.project.slug, &worker.id);
            let working_dir = if is_git {
                self.layout.worktree_path(&worker.id)
            } else {
                repo_root.to_path_buf()
            };
            if !self.driver.is_alive(&handle) {
                self.driver.start(&handle, &working_dir, &worker.agent)?;
                let prompt = std::fs::read_to_string(&prompt_path).unwrap_or_default();
                if !prompt.is_empty() {
                    self.driver.send_text(&handle, &prompt).ok();
                }
                report.sessions_started.push(worker.id.clone());
            }
        }

        let daemon_handle = SessionHandle {
            name: daemon_session_name(&self.config.project.slug),
        };
        if self.config.daemon.as_ref().map(|d| d.enabled).unwrap_or(true) && !self.driver.is_alive(&daemon_handle) {
            self.driver.start(&daemon_handle, repo_root, "czarina daemon run")?;
            report.daemon_started = true;
        }

        if go {
            let czar_handle = SessionHandle {
                name: czar_session_name(&self.config.project.slug),
            };
            if !self.driver.is_alive(&czar_handle) {
                self.driver.start(&czar_handle, repo_root, "czarina czar run")?;
                report.czar_started = true;
            }
        }

        events.emit_simple(
            Source::Cli,
            EventKind::PhaseLaunched,
            Severity::Success,
            &[("phase", &self.config.project.phase.to_string())],
        )?;

        Ok(report)
    }
}

/// Starter prompt file written for a worker that doesn't have one yet. Shared with
/// [`crate::czar::CzarLoop`]'s next-phase launch, which repopulates `workers/` the
/// same way this module boots a fresh project.
pub(crate) fn default_prompt(worker: &crate::config::WorkerConfig) -> String {
    let branch = if worker.role() == crate::config::WorkerRole::Feature {
        feature_branch(worker.phase.unwrap_or(1), &worker.id)
    } else {
        worker.branch.clone()
    };
    let mut body = format!("# Worker {}\n\nBranch: {branch}\n", worker.id);
    if let Some(desc) = &worker.description {
        body.push_str(&format!("\n{desc}\n"));
    }
    body.push_str(&format!(
        "\nWhen your work on this branch is finished, run `czarina worker complete {}` \
         so the orchestrator can record it.\n",
        worker.id
    ));
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProjectConfig, WorkerConfig, WorkerRole};
    use crate::session::FakeSessionDriver;
    use std::path::PathBuf;
    use std::process::Command;
    use tempfile::TempDir;

    fn init_repo_with_commit(dir: &std::path::Path) {
        Command::new("git").arg("init").arg("-q").current_dir(dir).status().unwrap();
        Command::new("git").args(["config", "user.email", "t@test.dev"]).current_dir(dir).status().unwrap();
        Command::new("git").args(["config", "user.name", "Test"]).current_dir(dir).status().unwrap();
        std::fs::write(dir.join("a.txt"), "one\n").unwrap();
        Command::new("git").args(["add", "."]).current_dir(dir).status().unwrap();
        Command::new("git").args(["commit", "-q", "-m", "init"]).current_dir(dir).status().unwrap();
    }

    fn demo_config(repository: PathBuf) -> Config {
        Config {
            project: ProjectConfig {
                name: "Demo".into(),
                slug: "demo".into(),
                repository,
                orchestration_dir: None,
                version: "0.1.0".into(),
                phase: 1,
                omnibus_branch: "cz1/release/v0.1.0".into(),
                description: None,
            },
            workers: vec![WorkerConfig {
                id: "alice".into(),
                agent: "claude".into(),
                branch: "cz1/feat/alice".into(),
                description: Some("Implement the widget".into()),
                phase: Some(1),
                role: Some(WorkerRole::Feature),
                dependencies: Vec::new(),
                token_budget: None,
            }],
            orchestration: None,
            daemon: None,
            phase_completion_mode: Default::default(),
            hopper: None,
            wiggum: None,
            phases: Default::default(),
            agent_rules: None,
            memory: None,
            role_mappings: None,
        }
    }

    #[test]
    fn launch_creates_branch_worktree_and_sessions() {
        let dir = TempDir::new().unwrap();
        init_repo_with_commit(dir.path());
        let layout = RepoLayout::new(dir.path(), ".czarina");
        layout.ensure_directories().unwrap();
        let config = demo_config(dir.path().to_path_buf());
        let mut events = EventLog::open(&layout.logs_dir()).unwrap();
        let driver = FakeSessionDriver::new();
        let controller = LaunchController::new(layout.clone(), config, driver, None);

        let report = controller.launch(false, &mut events).unwrap();
        assert_eq!(report.branches_created, vec!["cz1/feat/alice"]);
        assert_eq!(report.worktrees_created, vec!["alice"]);
        assert_eq!(report.sessions_started, vec!["alice"]);
        assert!(report.daemon_started);
        assert!(!report.czar_started);
        assert!(layout.worker_prompt_path("alice").exists());
    }

    #[test]
    fn launch_is_idempotent() {
        let dir = TempDir::new().unwrap();
        init_repo_with_commit(dir.path());
        let layout = RepoLayout::new(dir.path(), ".czarina");
        layout.ensure_directories().unwrap();
        let config = demo_config(dir.path().to_path_buf());
        let mut events = EventLog::open(&layout.logs_dir()).unwrap();
        let driver = FakeSessionDriver::new();
        let controller = LaunchController::new(layout.clone(), config, driver, None);

        controller.launch(false, &mut events).unwrap();
        let second = controller.launch(false, &mut events).unwrap();
        assert!(second.branches_created.is_empty());
        assert!(second.worktrees_created.is_empty());
        assert!(second.sessions_started.is_empty());
        assert!(!second.daemon_started);
    }

    #[test]
    fn launch_with_go_also_starts_czar_session() {
        let dir = TempDir::new().unwrap();
        init_repo_with_commit(dir.path());
        let layout = RepoLayout::new(dir.path(), ".czarina");
        layout.ensure_directories().unwrap();
        let config = demo_config(dir.path().to_path_buf());
        let mut events = EventLog::open(&layout.logs_dir()).unwrap();
        let driver = FakeSessionDriver::new();
        let controller = LaunchController::new(layout, config, driver, None);

        let report = controller.launch(true, &mut events).unwrap();
        assert!(report.czar_started);
    }
}
