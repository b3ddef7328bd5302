//! `czarina init` (spec.md §4.4 "Phase init", §6 `init [--phase N] [--force]`).

use crate::config::Config;
use crate::dag::DependencyGraph;
use crate::errors::PhaseError;
use crate::phase_ctl::{self, InitMode};
use crate::repo::naming::validate_branch;
use crate::repo::{git, RepoLayout};
use anyhow::{Context, Result};
use std::path::Path;

pub fn run(project_dir: &Path, phase: Option<u32>, force: bool) -> Result<()> {
    let config_path = crate::config::find_config_path(project_dir);
    let mut config = Config::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    if let Some(phase) = phase {
        config.project.phase = phase;
    }

    let layout = RepoLayout::for_config(project_dir, &config);
    let mode = phase_ctl::plan_init(&layout, force)
        .map_err(|e| match e {
            PhaseError::NonEmptyWorkers => anyhow::anyhow!(
                "{e}; inspect .czarina/logs/events.jsonl before forcing a destructive re-init"
            ),
            other => other.into(),
        })?;

    for worker in &config.workers {
        validate_branch(worker, config.project.phase, &config.project.omnibus_branch)?;
    }
    let graph = DependencyGraph::build(&config.workers)?;
    graph.topological_order()?;

    layout.ensure_directories()?;
    config.save(&layout.config_path())?;

    if git::is_git_repo(project_dir) {
        let default_base = git::current_branch(project_dir)?;
        for worker in &config.workers {
            git::ensure_branch(project_dir, &worker.branch, None, &default_base)?;
        }
    }

    match mode {
        InitMode::Fresh => println!("Initialized czarina project at {}", layout.czarina_dir().display()),
        InitMode::ReinitAfterClose => println!(
            "Re-initialized phase {} at {} (previous phase was closed)",
            config.project.phase,
            layout.czarina_dir().display()
        ),
        InitMode::ForcedReinit => println!(
            "Forced re-init of phase {} at {} (--force)",
            config.project.phase,
            layout.czarina_dir().display()
        ),
    }
    Ok(())
}
