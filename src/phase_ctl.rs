//! PhaseController: phase init-mode detection and phase archival (spec.md §4.4
//! "PhaseController.archive", §4.4 "Phase init").

use crate::config::Config;
use crate::errors::{PhaseError, RepoError};
use crate::repo::{git, RepoLayout};
use crate::session::{SessionDriver, SessionHandle};
use crate::worker::{CompletionSignals, Health, WorkerStatusKind};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitMode {
    /// `.czarina/` does not exist yet.
    Fresh,
    /// `.czarina/` exists and `workers/` is empty: the prior phase was closed cleanly.
    ReinitAfterClose,
    /// `.czarina/` exists and `workers/` is non-empty: destructive, requires `--force`.
    ForcedReinit,
}

/// Decide which of the three `init` paths applies, per spec.md §4.4 "Phase init".
/// Returns `Err` only for the destructive case without `--force`.
pub fn plan_init(layout: &RepoLayout, force: bool) -> Result<InitMode, PhaseError> {
    if !layout.exists() {
        return Ok(InitMode::Fresh);
    }
    if layout.workers_dir_is_empty() {
        return Ok(InitMode::ReinitAfterClose);
    }
    if force {
        return Ok(InitMode::ForcedReinit);
    }
    Err(PhaseError::NonEmptyWorkers)
}

/// One worker's terminal record for `PHASE_SUMMARY.md`.
pub struct WorkerOutcome {
    pub worker_id: String,
    pub status: WorkerStatusKind,
    pub health: Health,
    pub commits_ahead: u32,
    pub completion: CompletionSignals,
}

pub struct ArchiveResult {
    pub archive_dir: PathBuf,
    pub kept_dirty: Vec<String>,
}

/// Kill every session belonging to this phase's workers. Failures to kill an
/// already-dead session are not reported as errors (spec.md §4.4 step 1 is a
/// best-effort teardown, not a precondition for the rest of archival).
pub fn kill_phase_sessions<D: SessionDriver>(
    driver: &D,
    slug: &str,
    workers: &[crate::config::WorkerConfig],
) {
    for worker in workers {
        let handle = SessionHandle::for_worker(slug, &worker.id);
        let _ = driver.kill(&handle);
    }
}

/// Copy `config.json`, `workers/`, `logs/`, `status/` into a temp directory next to
/// `phases/`, then atomically rename it into place as `phase-<N>-v<version>`
/// (spec.md §4.4 step 3: "atomic rename from a temp dir").
fn copy_into_archive(layout: &RepoLayout, phase: u32, version: &str) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(layout.phases_dir())?;
    let tmp_dir = layout
        .phases_dir()
        .join(format!(".tmp-phase-{phase}-v{version}"));
    if tmp_dir.exists() {
        std::fs::remove_dir_all(&tmp_dir)?;
    }
    std::fs::create_dir_all(&tmp_dir)?;

    if layout.config_path().exists() {
        std::fs::copy(layout.config_path(), tmp_dir.join("config.json"))?;
    }
    copy_dir_recursive(&layout.workers_dir(), &tmp_dir.join("workers"))?;
    copy_dir_recursive(&layout.logs_dir(), &tmp_dir.join("logs"))?;
    copy_dir_recursive(&layout.status_dir(), &tmp_dir.join("status"))?;
    copy_dir_recursive(&layout.phase_hopper_dir(), &tmp_dir.join("hopper"))?;

    let final_dir = layout.phase_archive_dir(phase, version);
    if final_dir.exists() {
        std::fs::remove_dir_all(&final_dir)?;
    }
    std::fs::rename(&tmp_dir, &final_dir)?;
    Ok(final_dir)
}

fn copy_dir_recursive(src: &Path, dest: &Path) -> std::io::Result<()> {
    if !src.exists() {
        return Ok(());
    }
    std::fs::create_dir_all(dest)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let dest_path = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &dest_path)?;
        } else {
            std::fs::copy(entry.path(), dest_path)?;
        }
    }
    Ok(())
}

/// Generate `PHASE_SUMMARY.md`: one row per worker with terminal status, commit
/// count, and merge state (spec.md §4.4 step 4).
fn write_phase_summary(
    archive_dir: &Path,
    phase: u32,
    version: &str,
    outcomes: &[WorkerOutcome],
) -> std::io::Result<()> {
    let mut body = format!("# Phase {phase} Summary (v{version})\n\n");
    body.push_str("| Worker | Status | Health | Commits Ahead | Merged |\n");
    body.push_str("|---|---|---|---|---|\n");
    for o in outcomes {
        body.push_str(&format!(
            "| {} | {:?} | {:?} | {} | {} |\n",
            o.worker_id,
            o.status,
            o.health,
            o.commits_ahead,
            if o.completion.branch_merged { "yes" } else { "no" }
        ));
    }
    std::fs::write(archive_dir.join("PHASE_SUMMARY.md"), body)
}

/// How aggressively `archive` cleans up worker worktrees (spec.md §6 `phase close
/// [--keep-worktrees | --force-clean]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanMode {
    /// Remove clean worktrees; keep dirty ones (the default).
    Default,
    /// Remove every worktree regardless of dirty state.
    ForceClean,
    /// Remove none; the operator wants to inspect them after archival.
    KeepAll,
}

/// Remove clean worktrees; keep dirty ones unless `mode` says otherwise (spec.md §4.4
/// step 5). Returns the worker ids whose worktree was kept dirty.
fn clean_worktrees(
    layout: &RepoLayout,
    workers: &[crate::config::WorkerConfig],
    mode: CleanMode,
) -> Result<Vec<String>, RepoError> {
    if mode == CleanMode::KeepAll {
        return Ok(Vec::new());
    }
    let mut kept_dirty = Vec::new();
    for worker in workers {
        let wt_path = layout.worktree_path(&worker.id);
        if !wt_path.exists() {
            continue;
        }
        let dirty = git::worktree_is_dirty(&wt_path).unwrap_or(false);
        if dirty && mode != CleanMode::ForceClean {
            kept_dirty.push(worker.id.clone());
            continue;
        }
        git::remove_worktree(layout.root(), &wt_path)?;
    }
    Ok(kept_dirty)
}

/// Empty `.czarina/workers/`, the "previous phase closed" signal for the next `init`
/// (spec.md §4.4 step 6).
fn empty_workers_dir(layout: &RepoLayout) -> std::io::Result<()> {
    let dir = layout.workers_dir();
    if !dir.exists() {
        return Ok(());
    }
    for entry in std::fs::read_dir(&dir)? {
        std::fs::remove_file(entry?.path()).ok();
    }
    Ok(())
}

/// Full phase archival sequence (spec.md §4.4 `PhaseController.archive`). Session
/// teardown is the caller's responsibility via [`kill_phase_sessions`] since it
/// requires a concrete `SessionDriver` the caller already holds.
pub fn archive(
    layout: &RepoLayout,
    config: &Config,
    phase: u32,
    outcomes: &[WorkerOutcome],
    clean_mode: CleanMode,
) -> Result<ArchiveResult, PhaseError> {
    let archive_dir = copy_into_archive(layout, phase, &config.project.version)?;
    write_phase_summary(&archive_dir, phase, &config.project.version, outcomes)?;
    let kept_dirty = clean_worktrees(layout, &config.workers, clean_mode)?;
    empty_workers_dir(layout)?;
    Ok(ArchiveResult {
        archive_dir,
        kept_dirty,
    })
}

/// List archived phases under `phases/`, oldest first by directory name (sorts
/// naturally since phase numbers are zero-free and version strings are dotted
/// numeric, which is stable enough for the `phase list` command's display order).
pub fn list_archived(layout: &RepoLayout) -> std::io::Result<Vec<String>> {
    let dir = layout.phases_dir();
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut names: Vec<String> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|e| e.file_name().to_string_lossy().to_string())
        .filter(|n| !n.starts_with(".tmp-"))
        .collect();
    names.sort();
    Ok(names)
}

/// Per-worker terminal-outcome table used by both `archive` and `status` display.
pub fn build_outcomes(
    workers: &[crate::config::WorkerConfig],
    states: &BTreeMap<String, crate::worker::WorkerRuntimeState>,
) -> Vec<WorkerOutcome> {
    workers
        .iter()
        .filter_map(|w| {
            states.get(&w.id).map(|s| WorkerOutcome {
                worker_id: w.id.clone(),
                status: s.status,
                health: s.health,
                commits_ahead: s.commits_ahead,
                completion: s.completion.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProjectConfig, WorkerConfig, WorkerRole};
    use tempfile::TempDir;

    fn demo_config() -> Config {
        Config {
            project: ProjectConfig {
                name: "Demo".into(),
                slug: "demo".into(),
                repository: PathBuf::from("/tmp/demo"),
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
    fn plan_init_is_fresh_when_czarina_dir_absent() {
        let dir = TempDir::new().unwrap();
        let layout = RepoLayout::new(dir.path(), ".czarina");
        assert_eq!(plan_init(&layout, false).unwrap(), InitMode::Fresh);
    }

    #[test]
    fn plan_init_reinits_after_workers_dir_emptied() {
        let dir = TempDir::new().unwrap();
        let layout = RepoLayout::new(dir.path(), ".czarina");
        layout.ensure_directories().unwrap();
        assert_eq!(plan_init(&layout, false).unwrap(), InitMode::ReinitAfterClose);
    }

    #[test]
    fn plan_init_requires_force_when_workers_dir_nonempty() {
        let dir = TempDir::new().unwrap();
        let layout = RepoLayout::new(dir.path(), ".czarina");
        layout.ensure_directories().unwrap();
        std::fs::write(layout.worker_prompt_path("alice"), "prompt").unwrap();
        assert!(matches!(
            plan_init(&layout, false).unwrap_err(),
            PhaseError::NonEmptyWorkers
        ));
        assert_eq!(plan_init(&layout, true).unwrap(), InitMode::ForcedReinit);
    }

    #[test]
    fn archive_copies_state_and_empties_workers_dir() {
        let dir = TempDir::new().unwrap();
        let layout = RepoLayout::new(dir.path(), ".czarina");
        layout.ensure_directories().unwrap();
        std::fs::write(layout.config_path(), "{}").unwrap();
        std::fs::write(layout.worker_prompt_path("alice"), "prompt").unwrap();

        let config = demo_config();
        let result = archive(&layout, &config, 1, &[], CleanMode::Default).unwrap();

        assert!(result.archive_dir.join("config.json").exists());
        assert!(result.archive_dir.join("PHASE_SUMMARY.md").exists());
        assert!(layout.workers_dir_is_empty());
    }

    #[test]
    fn list_archived_sorts_and_ignores_temp_dirs() {
        let dir = TempDir::new().unwrap();
        let layout = RepoLayout::new(dir.path(), ".czarina");
        std::fs::create_dir_all(layout.phases_dir().join("phase-2-v0.2.0")).unwrap();
        std::fs::create_dir_all(layout.phases_dir().join("phase-1-v0.1.0")).unwrap();
        std::fs::create_dir_all(layout.phases_dir().join(".tmp-phase-3-v0.3.0")).unwrap();
        let names = list_archived(&layout).unwrap();
        assert_eq!(names, vec!["phase-1-v0.1.0", "phase-2-v0.2.0"]);
    }
}
