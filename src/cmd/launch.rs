//! `czarina launch [--go]` (spec.md §6).

use crate::dag::DependencyGraph;
use crate::eventlog::EventLog;
use crate::launch::LaunchController;
use crate::session::TmuxSessionDriver;
use anyhow::Result;
use std::path::Path;

pub fn run(project_dir: &Path, go: bool, remote: Option<String>) -> Result<()> {
    let (config, layout) = super::load(project_dir)?;

    // spec.md §8 scenario S4: a dependency cycle must fail validation before any
    // branch, worktree, or session is touched.
    let graph = DependencyGraph::build(&config.workers)?;
    graph.topological_order()?;

    layout.ensure_directories()?;
    let mut events = EventLog::open(&layout.logs_dir())?;
    let controller = LaunchController::new(layout, config, TmuxSessionDriver, remote);
    let report = controller.launch(go, &mut events)?;

    if !report.branches_created.is_empty() {
        println!("Branches created: {}", report.branches_created.join(", "));
    }
    if !report.branches_push_skipped.is_empty() {
        println!(
            "Push skipped (no remote or push failed): {}",
            report.branches_push_skipped.join(", ")
        );
    }
    if !report.worktrees_created.is_empty() {
        println!("Worktrees created: {}", report.worktrees_created.join(", "));
    }
    if !report.sessions_started.is_empty() {
        println!("Worker sessions started: {}", report.sessions_started.join(", "));
    }
    println!("Daemon started: {}", report.daemon_started);
    if go {
        println!("Czar supervisor started: {}", report.czar_started);
    }
    Ok(())
}
