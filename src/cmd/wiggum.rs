//! `czarina wiggum <task-directive> [--verify-command] [--retries] [--timeout]`
//! (spec.md §4.7, §6). Standalone: does not require a `.czarina/` project, only a
//! git repository to branch from.

use crate::config::WiggumConfig;
use crate::eventlog::EventLog;
use crate::repo::git;
use crate::wiggum::WiggumController;
use anyhow::{Context, Result};
use std::path::Path;

pub async fn run(
    project_dir: &Path,
    task_directive: &str,
    verify_command: Option<String>,
    retries: Option<u32>,
    timeout_seconds: Option<u64>,
) -> Result<()> {
    let mut config = load_wiggum_config(project_dir).unwrap_or_default();
    if let Some(cmd) = verify_command {
        config.verify_command = Some(cmd);
    }
    if let Some(n) = retries {
        config.default_retries = n;
    }
    if let Some(t) = timeout_seconds {
        config.timeout_seconds = t;
    }

    let invoking_branch = git::current_branch(project_dir)
        .context("wiggum requires a git repository to branch attempts from")?;

    let logs_dir = project_dir.join(".czarina").join("logs");
    let mut events = EventLog::open(&logs_dir)?;
    let controller = WiggumController::new(project_dir.to_path_buf(), config, invoking_branch);
    controller.run(task_directive, &mut events).await?;

    println!("wiggum succeeded for: {task_directive}");
    Ok(())
}

fn load_wiggum_config(project_dir: &Path) -> Option<WiggumConfig> {
    let config_path = crate::config::find_config_path(project_dir);
    let config = crate::config::Config::load(&config_path).ok()?;
    config.wiggum
}
