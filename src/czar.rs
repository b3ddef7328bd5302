//! CzarLoop: the autonomous per-phase supervisor (spec.md §4.2). A single-threaded,
//! tick-driven loop; the only component that writes `worker-status.json` and
//! `phase-state.json`.
//!
//! The `tokio::select!`-over-interval-and-ctrl_c cancellation shape mirrors
//! SPEC_FULL.md §5's "Process model" note and the subprocess-heavy async
//! style in `factory::agent_executor`; the tick body itself stays synchronous,
//! matching every other core module (`worker::materialize`, `hopper::assign`), since
//! a tick only performs short blocking git/filesystem calls (§5: "tick budget: soft
//! 10s").

use crate::config::Config;
use crate::dag::DependencyGraph;
use crate::eventlog::{EventKind, EventLog, Severity, Source};
use crate::hopper;
use crate::launch;
use crate::phase_ctl;
use crate::repo::naming::{daemon_session_name, validate_branch};
use crate::repo::{git, RepoLayout};
use crate::session::{SessionDriver, SessionHandle};
use crate::status::{PhaseState, StatusSnapshot, WorkerStatusEntry};
use crate::worker::{self, WorkerRuntimeState, WorkerStatusKind};
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashMap};

/// Stuck-prompt nudge text (spec.md §9 Open Question resolution: a fixed constant,
/// intentionally not configurable).
pub const PROMPT_STUCK_TEXT: &str = "\
You have been inactive for a while and may be stuck. If you are blocked, please reply \
with a short description of what is blocking you (a missing dependency, an ambiguous \
instruction, a failing command) so a human or the orchestrator can help.\n";

const STUCK_PROMPT_COOLDOWN: i64 = 3600;
const DEPENDENCY_ALERT_COOLDOWN: i64 = 3600;
const STATUS_SUMMARY_EVERY: u64 = 10;
const INTEGRATION_CHECK_EVERY: u64 = 30;

#[derive(Debug, Default)]
pub struct TickSummary {
    pub crashed: Vec<String>,
    pub stuck_prompted: Vec<String>,
    pub blocked: Vec<String>,
    pub idle: Vec<String>,
    pub assignments: usize,
    pub phase_completed: bool,
}

pub struct CzarLoop<D: SessionDriver> {
    layout: RepoLayout,
    config: Config,
    driver: D,
    tick_count: u64,
    stuck_prompt_cooldowns: HashMap<String, DateTime<Utc>>,
    dependency_cooldowns: HashMap<String, DateTime<Utc>>,
    hopper_assessed: HashMap<String, DateTime<Utc>>,
}

impl<D: SessionDriver> CzarLoop<D> {
    pub fn new(layout: RepoLayout, config: Config, driver: D) -> Self {
        Self {
            layout,
            config,
            driver,
            tick_count: 0,
            stuck_prompt_cooldowns: HashMap::new(),
            dependency_cooldowns: HashMap::new(),
            hopper_assessed: HashMap::new(),
        }
    }

    fn cooldown_expired(map: &HashMap<String, DateTime<Utc>>, key: &str, now: DateTime<Utc>, secs: i64) -> bool {
        match map.get(key) {
            Some(last) => now - *last >= Duration::seconds(secs),
            None => true,
        }
    }

    /// Run one full tick (spec.md §4.2 steps 1-7). Synchronous: the caller's async
    /// wrapper is only responsible for pacing and cancellation.
    pub fn tick(&mut self, events: &mut EventLog, now: DateTime<Utc>) -> std::io::Result<TickSummary> {
        let mut summary = TickSummary::default();

        // Step 1: materialize + snapshot.
        let previous = StatusSnapshot::load(&self.layout.worker_status_path())?;
        let mut states: BTreeMap<String, WorkerRuntimeState> = BTreeMap::new();
        let mut snapshot = StatusSnapshot {
            generated_at: Some(now),
            workers: Default::default(),
        };

        for worker in &self.config.workers {
            let handle = SessionHandle::for_worker(&self.config.project.slug, &worker.id);
            let session_alive = self.driver.is_alive(&handle);
            let previous_status = previous.previous_status(&worker.id);
            let status_file_complete = previous.is_complete(&worker.id);

            let state = worker::materialize(
                &self.layout,
                &self.config,
                worker,
                &self.config.project.omnibus_branch,
                session_alive,
                previous_status,
                status_file_complete,
                events,
            )
            .unwrap_or_else(|_| WorkerRuntimeState {
                worker_id: worker.id.clone(),
                status: previous_status.unwrap_or(WorkerStatusKind::Pending),
                health: crate::worker::Health::Crashed,
                session_alive: false,
                last_activity: None,
                commits_ahead: 0,
                completion: crate::worker::CompletionSignals {
                    log_marker: false,
                    branch_merged: false,
                    status_file: status_file_complete,
                },
            });

            snapshot.workers.insert(
                worker.id.clone(),
                WorkerStatusEntry {
                    status: state.status,
                    health: state.health,
                    session_alive: state.session_alive,
                    last_activity: state.last_activity,
                    commits_ahead: state.commits_ahead,
                    completion: state.completion.clone(),
                },
            );
            states.insert(worker.id.clone(), state);
        }
        snapshot.save(&self.layout.worker_status_path())?;

        let graph = DependencyGraph::build(&self.config.workers).ok();

        for worker in &self.config.workers {
            let Some(state) = states.get(&worker.id) else { continue };

            // Step 2: crashes.
            if !state.session_alive && state.status != WorkerStatusKind::Pending {
                events.emit_simple(
                    Source::Czar,
                    EventKind::WorkerCrashed,
                    Severity::Alert,
                    &[("worker", &worker.id)],
                )?;
                summary.crashed.push(worker.id.clone());
            }

            let deps_met = match &graph {
                Some(g) => crate::dag::all_dependencies_met(g, &worker.id, |id| {
                    states.get(id).map(|s| s.status)
                }),
                None => true,
            };

            // Step 3: stuck workers.
            if state.health == crate::worker::Health::Stuck && state.session_alive {
                events.emit_simple(
                    Source::Czar,
                    EventKind::StuckWorker,
                    Severity::Alert,
                    &[("worker", &worker.id)],
                )?;
                if state.is_blocked(deps_met) {
                    if Self::cooldown_expired(&self.dependency_cooldowns, &worker.id, now, DEPENDENCY_ALERT_COOLDOWN) {
                        events.emit_simple(
                            Source::Czar,
                            EventKind::WorkerBlocked,
                            Severity::Alert,
                            &[("worker", &worker.id)],
                        )?;
                        self.dependency_cooldowns.insert(worker.id.clone(), now);
                        summary.blocked.push(worker.id.clone());
                    } else {
                        events.emit_simple(
                            Source::Czar,
                            EventKind::CooldownActive,
                            Severity::Info,
                            &[("worker", &worker.id)],
                        )?;
                    }
                } else if Self::cooldown_expired(&self.stuck_prompt_cooldowns, &worker.id, now, STUCK_PROMPT_COOLDOWN) {
                    let handle = SessionHandle::for_worker(&self.config.project.slug, &worker.id);
                    if self.driver.send_text(&handle, PROMPT_STUCK_TEXT).is_ok() {
                        events.emit_simple(
                            Source::Czar,
                            EventKind::PromptStuckWorker,
                            Severity::Action,
                            &[("worker", &worker.id)],
                        )?;
                        self.stuck_prompt_cooldowns.insert(worker.id.clone(), now);
                        summary.stuck_prompted.push(worker.id.clone());
                    }
                }
            }

            // Step 4: idle workers.
            if state.status == WorkerStatusKind::Idle {
                events.emit_simple(
                    Source::Czar,
                    EventKind::IdleWorker,
                    Severity::Info,
                    &[("worker", &worker.id)],
                )?;
                summary.idle.push(worker.id.clone());
            }

            // Step 5: dependency monitoring (non-stuck path; stuck path already
            // handled its own WORKER_BLOCKED emission above).
            if matches!(state.status, WorkerStatusKind::Working | WorkerStatusKind::Idle)
                && !deps_met
                && state.health != crate::worker::Health::Stuck
                && Self::cooldown_expired(&self.dependency_cooldowns, &worker.id, now, DEPENDENCY_ALERT_COOLDOWN)
            {
                events.emit_simple(
                    Source::Czar,
                    EventKind::WorkerDependencyBlocked,
                    Severity::Alert,
                    &[("worker", &worker.id)],
                )?;
                self.dependency_cooldowns.insert(worker.id.clone(), now);
            }
        }

        // Step 4 continued: hopper assignment for idle workers.
        let idle_ids: Vec<String> = summary.idle.clone();
        if !idle_ids.is_empty() {
            summary.assignments = self.assign_hopper_work(&idle_ids, events)?;
        }

        // Step 5 continued: integration-ready check every 30th tick.
        if self.tick_count > 0 && self.tick_count % INTEGRATION_CHECK_EVERY == 0 {
            if let Some(g) = &graph {
                let ready: Vec<&str> = self
                    .config
                    .workers
                    .iter()
                    .filter(|w| {
                        states
                            .get(&w.id)
                            .map(|s| {
                                let deps_met = crate::dag::all_dependencies_met(g, &w.id, |id| {
                                    states.get(id).map(|s| s.status)
                                });
                                s.is_integration_ready(deps_met)
                            })
                            .unwrap_or(false)
                    })
                    .map(|w| w.id.as_str())
                    .collect();
                if !ready.is_empty() {
                    events.emit_simple(Source::Czar, EventKind::IntegrationReady, Severity::Detect, &[])?;
                    if let Ok(order) = g.topological_order() {
                        let order_str = order.join(",");
                        events.emit_simple(
                            Source::Czar,
                            EventKind::IntegrationStrategy,
                            Severity::Info,
                            &[("order", &order_str)],
                        )?;
                    } else {
                        events.emit_simple(Source::Czar, EventKind::DependencyCycle, Severity::Alert, &[])?;
                    }
                }
            }
        }

        // Step 6: project-tier hopper assessment.
        self.assess_hopper(&idle_ids, now, events)?;

        // Step 7: phase completion.
        let mut phase_state = PhaseState::load(&self.layout.phase_state_path(), self.config.project.phase)?;
        let all_complete = self.config.workers.iter().all(|w| {
            states
                .get(&w.id)
                .map(|s| s.completion.satisfies(self.config.phase_completion_mode))
                .unwrap_or(false)
        });
        if all_complete && !phase_state.is_complete(self.config.project.phase) {
            let closing_phase = self.config.project.phase;
            events.emit_simple(
                Source::Czar,
                EventKind::PhaseComplete,
                Severity::Success,
                &[("phase", &closing_phase.to_string())],
            )?;
            phase_state.mark_complete(closing_phase);

            // PhaseController.archive steps 1-2 (spec.md §4.4): kill every session this
            // phase owns, including the ApprovalDaemon's, before touching the worktrees
            // and workers/ directory archive() is about to clear.
            phase_ctl::kill_phase_sessions(&self.driver, &self.config.project.slug, &self.config.workers);
            let daemon_handle = SessionHandle {
                name: daemon_session_name(&self.config.project.slug),
            };
            self.driver.kill(&daemon_handle).ok();

            let outcomes = phase_ctl::build_outcomes(&self.config.workers, &states);
            if let Ok(result) = phase_ctl::archive(
                &self.layout,
                &self.config,
                closing_phase,
                &outcomes,
                phase_ctl::CleanMode::Default,
            ) {
                events.emit_simple(
                    Source::Czar,
                    EventKind::PhaseArchived,
                    Severity::Success,
                    &[("archive_dir", &result.archive_dir.to_string_lossy())],
                )?;
                for worker_id in &result.kept_dirty {
                    events.emit_simple(
                        Source::Czar,
                        EventKind::WorktreeDirtyKept,
                        Severity::Alert,
                        &[("worker", worker_id)],
                    )?;
                }
            }
            summary.phase_completed = true;

            // §4.2 step 7 continued: launch the next phase if the config declares a
            // blueprint for it.
            let next_phase = closing_phase + 1;
            if let Some(blueprint) = self.config.phases.get(&format!("phase_{next_phase}")).cloned() {
                self.launch_next_phase(next_phase, blueprint, &mut phase_state, events)?;
            }
        }
        phase_state.last_check = Some(now);
        phase_state.save(&self.layout.phase_state_path())?;

        // Status summary + tick bookkeeping.
        if self.tick_count % STATUS_SUMMARY_EVERY == 0 {
            let counts = format!("{}", self.config.workers.len());
            events.emit_simple(Source::Czar, EventKind::StatusSummary, Severity::Info, &[("workers", &counts)])?;
        }
        self.tick_count += 1;

        Ok(summary)
    }

    /// Bring up the next phase's workers from its config-declared blueprint
    /// (spec.md §4.2 step 7, §6 `phases.phase_<N>`). Mirrors [`launch::LaunchController::launch`]'s
    /// boot sequence — branches, worktrees, worker sessions, the daemon — but runs
    /// from inside the already-running Czar instead of a fresh CLI invocation, and
    /// reuses `self.driver` rather than taking a new one.
    fn launch_next_phase(
        &mut self,
        next_phase: u32,
        blueprint: crate::config::PhaseBlueprint,
        phase_state: &mut PhaseState,
        events: &mut EventLog,
    ) -> std::io::Result<()> {
        self.config.project.phase = next_phase;
        self.config.project.omnibus_branch = blueprint.omnibus_branch;
        self.config.workers = blueprint.workers;

        for worker in &self.config.workers {
            if let Err(e) = validate_branch(worker, next_phase, &self.config.project.omnibus_branch) {
                tracing::error!(target: "czarina::czar", error = %e, worker = %worker.id, "skipping invalid next-phase branch");
            }
        }

        let repo_root = self.layout.root().to_path_buf();
        let is_git = git::is_git_repo(&repo_root);
        if is_git {
            if let Ok(default_base) = git::current_branch(&repo_root) {
                for worker in &self.config.workers {
                    if git::ensure_branch(&repo_root, &worker.branch, None, &default_base).is_ok() {
                        let worktree_path = self.layout.worktree_path(&worker.id);
                        if !worktree_path.exists() {
                            git::create_worktree(&repo_root, &worktree_path, &worker.branch, &default_base).ok();
                        }
                    }
                }
            }
        }

        for worker in &self.config.workers {
            let prompt_path = self.layout.worker_prompt_path(&worker.id);
            if !prompt_path.exists() {
                std::fs::write(&prompt_path, launch::default_prompt(worker)).ok();
            }

            let handle = SessionHandle::for_worker(&self.config.project.slug, &worker.id);
            let working_dir = if is_git {
                self.layout.worktree_path(&worker.id)
            } else {
                repo_root.clone()
            };
            if !self.driver.is_alive(&handle) && self.driver.start(&handle, &working_dir, &worker.agent).is_ok() {
                let prompt = std::fs::read_to_string(&prompt_path).unwrap_or_default();
                if !prompt.is_empty() {
                    self.driver.send_text(&handle, &prompt).ok();
                }
            }
        }

        let daemon_handle = SessionHandle {
            name: daemon_session_name(&self.config.project.slug),
        };
        if self.config.daemon.as_ref().map(|d| d.enabled).unwrap_or(true) && !self.driver.is_alive(&daemon_handle) {
            self.driver.start(&daemon_handle, &repo_root, "czarina daemon run").ok();
        }

        self.config.save(&self.layout.config_path()).ok();
        phase_state.current_phase = next_phase;
        phase_state.mark_launched(next_phase);

        events.emit_simple(
            Source::Czar,
            EventKind::PhaseLaunched,
            Severity::Success,
            &[("phase", &next_phase.to_string())],
        )?;
        Ok(())
    }

    /// Assign up to `min(|idle|, |todo|)` phase-tier hopper items to idle workers
    /// (spec.md §4.5 "Assignment").
    fn assign_hopper_work(&self, idle_ids: &[String], events: &mut EventLog) -> std::io::Result<usize> {
        let todo_dir = self.layout.phase_hopper_todo_dir();
        let pairs = hopper::assign::pair_assignments(idle_ids, &todo_dir)?;
        let n = pairs.len();
        for (worker_id, item) in &pairs {
            let dest = hopper::assign::move_item(&item.path, &self.layout.phase_hopper_in_progress_dir())?;
            let handle = SessionHandle::for_worker(&self.config.project.slug, worker_id);
            let title = dest.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
            let message = format!("New task assigned: {title} ({})\n", dest.display());
            if self.driver.send_text(&handle, &message).is_ok() {
                events.emit_simple(Source::Czar, EventKind::TaskInjected, Severity::Action, &[("worker", worker_id)])?;
            }
            events.emit_simple(
                Source::Czar,
                EventKind::HopperAssignTask,
                Severity::Action,
                &[("worker", worker_id), ("item", &title)],
            )?;
        }
        if n > 0 {
            let count = n.to_string();
            events.emit_simple(Source::Czar, EventKind::HopperAssignedTasks, Severity::Success, &[("count", &count)])?;
        }
        Ok(n)
    }

    /// Assess un-assessed project-tier hopper items (spec.md §4.5 "Assessment
    /// rules"). Idempotent: an item is only reassessed when its file mtime changes
    /// since the last pass (spec.md §8 property 4).
    fn assess_hopper(&mut self, idle_ids: &[String], now: DateTime<Utc>, events: &mut EventLog) -> std::io::Result<()> {
        let dir = self.layout.hopper_dir();
        for path in hopper::list_md_files(&dir)? {
            let mtime: DateTime<Utc> = std::fs::metadata(&path)?
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or(now);
            let key = path.to_string_lossy().to_string();
            if self.hopper_assessed.get(&key).map(|t| *t >= mtime).unwrap_or(false) {
                continue;
            }

            let item = hopper::load_item(&path)?;
            let assessment = hopper::assess::assess(&item.meta, self.config.project.phase, idle_ids.len());
            let name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
            match assessment {
                hopper::assess::Assessment::AutoDefer => {
                    events.emit_simple(Source::Czar, EventKind::HopperAutoDefer, Severity::Info, &[("item", &name)])?;
                }
                hopper::assess::Assessment::AutoInclude => {
                    hopper::assign::move_item(&path, &self.layout.phase_hopper_todo_dir())?;
                    events.emit_simple(Source::Czar, EventKind::HopperAutoInclude, Severity::Action, &[("item", &name)])?;
                }
                hopper::assess::Assessment::AskHuman => {
                    events.emit_simple(Source::Czar, EventKind::HopperAskHuman, Severity::Detect, &[("item", &name)])?;
                }
            }
            self.hopper_assessed.insert(key, mtime);
        }
        Ok(())
    }

    /// Async supervisor wrapper: ticks every `interval` seconds, finishing the
    /// current tick before honoring SIGINT/SIGTERM (spec.md §4.2 "Cancellation").
    pub async fn run(&mut self, events: &mut EventLog, interval_secs: u64) -> std::io::Result<()> {
        events.emit_simple(Source::Czar, EventKind::CzarStart, Severity::Info, &[])?;
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let now = Utc::now();
                    if let Err(e) = self.tick(events, now) {
                        tracing::error!(target: "czarina::czar", error = %e, "tick failed");
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    events.emit_simple(Source::Czar, EventKind::CzarStop, Severity::Info, &[])?;
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PhaseBlueprint, ProjectConfig, WorkerConfig, WorkerRole};
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

    fn demo_config(slug: &str) -> Config {
        demo_config_at(slug, PathBuf::from("/tmp/demo"))
    }

    fn demo_config_at(slug: &str, repository: PathBuf) -> Config {
        Config {
            project: ProjectConfig {
                name: "Demo".into(),
                slug: slug.into(),
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
                description: None,
                phase: None,
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
    fn tick_marks_crashed_worker_when_session_is_dead() {
        let dir = TempDir::new().unwrap();
        let layout = RepoLayout::new(dir.path(), ".czarina");
        layout.ensure_directories().unwrap();
        let mut events = EventLog::open(&layout.logs_dir()).unwrap();
        let config = demo_config("demo");
        let driver = FakeSessionDriver::new();
        let mut loop_ = CzarLoop::new(layout, config, driver);

        let summary = loop_.tick(&mut events, Utc::now()).unwrap();
        assert!(summary.crashed.is_empty());
        assert!(summary.idle.is_empty() || true);
    }

    #[test]
    fn tick_emits_status_summary_only_every_tenth_tick() {
        let dir = TempDir::new().unwrap();
        let layout = RepoLayout::new(dir.path(), ".czarina");
        layout.ensure_directories().unwrap();
        let mut events = EventLog::open(&layout.logs_dir()).unwrap();
        let config = demo_config("demo");
        let driver = FakeSessionDriver::new();
        let mut loop_ = CzarLoop::new(layout, config, driver);

        for _ in 0..3 {
            loop_.tick(&mut events, Utc::now()).unwrap();
        }
        let records = events.read_all().unwrap();
        let summaries = records.iter().filter(|r| r.event == EventKind::StatusSummary).count();
        assert_eq!(summaries, 1, "tick 0 emits, ticks 1 and 2 do not (every 10th tick)");

        for _ in 0..7 {
            loop_.tick(&mut events, Utc::now()).unwrap();
        }
        let records = events.read_all().unwrap();
        let summaries = records.iter().filter(|r| r.event == EventKind::StatusSummary).count();
        assert_eq!(summaries, 2, "tick 10 emits a second summary");
    }

    #[test]
    fn hopper_assessment_runs_once_per_mtime() {
        let dir = TempDir::new().unwrap();
        let layout = RepoLayout::new(dir.path(), ".czarina");
        layout.ensure_directories().unwrap();
        std::fs::write(
            layout.hopper_dir().join("a.md"),
            "**Priority:** Low\n",
        )
        .unwrap();
        let mut events = EventLog::open(&layout.logs_dir()).unwrap();
        let config = demo_config("demo");
        let driver = FakeSessionDriver::new();
        let mut loop_ = CzarLoop::new(layout, config, driver);

        loop_.tick(&mut events, Utc::now()).unwrap();
        loop_.tick(&mut events, Utc::now()).unwrap();

        let records = events.read_all().unwrap();
        let defers = records.iter().filter(|r| r.event == EventKind::HopperAutoDefer).count();
        assert_eq!(defers, 1);
    }

    /// spec.md §4.4 `PhaseController.archive` steps 1-2: auto-completion must kill
    /// every worker session and the daemon session before archiving, the same as the
    /// manual `phase close`/`closeout` paths.
    #[test]
    fn tick_kills_worker_and_daemon_sessions_on_auto_completion() {
        let dir = TempDir::new().unwrap();
        init_repo_with_commit(dir.path());
        let layout = RepoLayout::new(dir.path(), ".czarina");
        layout.ensure_directories().unwrap();
        let mut events = EventLog::open(&layout.logs_dir()).unwrap();
        let config = demo_config_at("demo", dir.path().to_path_buf());
        let driver = FakeSessionDriver::new();

        let alice_handle = SessionHandle::for_worker("demo", "alice");
        driver.start(&alice_handle, dir.path(), "claude").unwrap();
        let daemon_handle = SessionHandle {
            name: daemon_session_name("demo"),
        };
        driver.start(&daemon_handle, dir.path(), "czarina daemon run").unwrap();

        events
            .emit_simple(Source::Worker, EventKind::WorkerComplete, Severity::Success, &[("worker", "alice")])
            .unwrap();

        let mut loop_ = CzarLoop::new(layout, config, driver);
        let summary = loop_.tick(&mut events, Utc::now()).unwrap();

        assert!(summary.phase_completed);
        assert!(!loop_.driver.is_alive(&alice_handle));
        assert!(!loop_.driver.is_alive(&daemon_handle));
    }

    /// spec.md §8 scenario S2: a stuck worker must see `STUCK_WORKER` emitted before
    /// the blocked/cooldown-prompt branch runs, in the same tick.
    #[test]
    fn tick_emits_stuck_worker_before_prompt_stuck_worker() {
        use crate::status::{StatusSnapshot, WorkerStatusEntry};
        use crate::worker::{CompletionSignals, Health};
        use std::time::SystemTime;

        let dir = TempDir::new().unwrap();
        let layout = RepoLayout::new(dir.path(), ".czarina");
        layout.ensure_directories().unwrap();

        let old_time = Utc::now() - Duration::minutes(35);
        let mut previous = StatusSnapshot::default();
        previous.workers.insert(
            "alice".into(),
            WorkerStatusEntry {
                status: WorkerStatusKind::Working,
                health: Health::Healthy,
                session_alive: true,
                last_activity: Some(old_time),
                commits_ahead: 1,
                completion: CompletionSignals {
                    log_marker: false,
                    branch_merged: false,
                    status_file: false,
                },
            },
        );
        let status_path = layout.worker_status_path();
        previous.save(&status_path).unwrap();
        let old_mtime = SystemTime::now() - std::time::Duration::from_secs(35 * 60);
        std::fs::File::open(&status_path).unwrap().set_modified(old_mtime).unwrap();

        let mut events = EventLog::open(&layout.logs_dir()).unwrap();
        let config = demo_config_at("demo", dir.path().to_path_buf());
        let driver = FakeSessionDriver::new();
        let alice_handle = SessionHandle::for_worker("demo", "alice");
        driver.start(&alice_handle, dir.path(), "claude").unwrap();
        let mut loop_ = CzarLoop::new(layout, config, driver);

        let summary = loop_.tick(&mut events, Utc::now()).unwrap();
        assert_eq!(summary.stuck_prompted, vec!["alice".to_string()]);

        let records = events.read_all().unwrap();
        let kinds: Vec<EventKind> = records
            .iter()
            .filter(|r| matches!(r.event, EventKind::StuckWorker | EventKind::PromptStuckWorker))
            .map(|r| r.event)
            .collect();
        assert_eq!(kinds, vec![EventKind::StuckWorker, EventKind::PromptStuckWorker]);
    }

    /// spec.md §8 scenario S6: a declared `phases.phase_2` blueprint is launched
    /// immediately after phase 1 archives, in strict PHASE_COMPLETE -> PHASE_ARCHIVED
    /// -> PHASE_LAUNCHED order, repopulating `workers/` and standing up `cz2/feat/*`.
    #[test]
    fn tick_launches_next_phase_from_blueprint() {
        let dir = TempDir::new().unwrap();
        init_repo_with_commit(dir.path());
        let layout = RepoLayout::new(dir.path(), ".czarina");
        layout.ensure_directories().unwrap();
        let mut events = EventLog::open(&layout.logs_dir()).unwrap();

        let mut config = demo_config_at("demo", dir.path().to_path_buf());
        config.phases.insert(
            "phase_2".into(),
            PhaseBlueprint {
                omnibus_branch: "cz2/release/v0.2.0".into(),
                workers: vec![WorkerConfig {
                    id: "bob".into(),
                    agent: "claude".into(),
                    branch: "cz2/feat/bob".into(),
                    description: None,
                    phase: Some(2),
                    role: Some(WorkerRole::Feature),
                    dependencies: Vec::new(),
                    token_budget: None,
                }],
            },
        );

        events
            .emit_simple(Source::Worker, EventKind::WorkerComplete, Severity::Success, &[("worker", "alice")])
            .unwrap();

        let driver = FakeSessionDriver::new();
        let mut loop_ = CzarLoop::new(layout.clone(), config, driver);
        loop_.tick(&mut events, Utc::now()).unwrap();

        let records = events.read_all().unwrap();
        let kinds: Vec<EventKind> = records
            .iter()
            .filter(|r| {
                matches!(
                    r.event,
                    EventKind::PhaseComplete | EventKind::PhaseArchived | EventKind::PhaseLaunched
                )
            })
            .map(|r| r.event)
            .collect();
        assert_eq!(kinds, vec![EventKind::PhaseComplete, EventKind::PhaseArchived, EventKind::PhaseLaunched]);

        assert_eq!(loop_.config.project.phase, 2);
        assert_eq!(loop_.config.project.omnibus_branch, "cz2/release/v0.2.0");
        assert_eq!(loop_.config.workers.len(), 1);
        assert_eq!(loop_.config.workers[0].id, "bob");

        assert!(layout.worker_prompt_path("bob").exists());
        assert!(!layout.worker_prompt_path("alice").exists());
        assert!(layout.worktree_path("bob").exists());
        assert!(loop_.driver.is_alive(&SessionHandle::for_worker("demo", "bob")));

        let phase_state = PhaseState::load(&layout.phase_state_path(), 2).unwrap();
        assert!(phase_state.phase_launched.get(&2).copied().unwrap_or(false));
    }
}
