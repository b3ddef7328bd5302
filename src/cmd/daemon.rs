//! `czarina daemon start|stop|status|logs` and the `daemon run` foreground loop
//! itself (spec.md §4.6, §6). `start`/`stop` manage the daemon's own detached
//! session the same way `launch` manages worker sessions; `run` is what that
//! session actually executes.

use crate::daemon::{builtin_profiles, ApprovalDaemon};
use crate::eventlog::{EventKind, EventLog, Severity, Source};
use crate::repo::naming::daemon_session_name;
use crate::session::{SessionDriver, SessionHandle, TmuxSessionDriver};
use anyhow::{Context, Result};
use chrono::Utc;
use std::path::Path;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_secs(2); // spec.md §4.6 "Scheduling"

pub fn start(project_dir: &Path) -> Result<()> {
    let (config, layout) = super::load(project_dir)?;
    let driver = TmuxSessionDriver;
    let handle = SessionHandle {
        name: daemon_session_name(&config.project.slug),
    };
    if driver.is_alive(&handle) {
        println!("Daemon already running.");
        return Ok(());
    }
    driver
        .start(&handle, layout.root(), "czarina daemon run")
        .context("starting daemon session")?;
    println!("Daemon started.");
    Ok(())
}

pub fn stop(project_dir: &Path) -> Result<()> {
    let (config, _layout) = super::load(project_dir)?;
    let driver = TmuxSessionDriver;
    let handle = SessionHandle {
        name: daemon_session_name(&config.project.slug),
    };
    driver.kill(&handle).context("stopping daemon session")?;
    println!("Daemon stopped.");
    Ok(())
}

pub fn status(project_dir: &Path) -> Result<()> {
    let (config, _layout) = super::load(project_dir)?;
    let driver = TmuxSessionDriver;
    let handle = SessionHandle {
        name: daemon_session_name(&config.project.slug),
    };
    println!(
        "Daemon: {}",
        if driver.is_alive(&handle) { "running" } else { "stopped" }
    );
    Ok(())
}

pub fn logs(project_dir: &Path) -> Result<()> {
    let (_, layout) = super::load(project_dir)?;
    let events = EventLog::open(&layout.logs_dir())?;
    for record in events.read_all()? {
        if record.source == Source::Daemon {
            println!(
                "[{}] {} {:?}",
                record.ts.format("%H:%M:%S"),
                record.event,
                record.metadata
            );
        }
    }
    Ok(())
}

/// The foreground loop an operator's `czarina daemon run` actually executes: poll
/// every worker's session every [`POLL_INTERVAL`] until the session exits.
pub async fn run(project_dir: &Path) -> Result<()> {
    let (config, layout) = super::load(project_dir)?;
    let mut events = EventLog::open(&layout.logs_dir())?;
    events.emit_simple(Source::Daemon, EventKind::DaemonStart, Severity::Info, &[])?;

    let mut profiles = builtin_profiles();
    if let Some(daemon_config) = &config.daemon {
        for (kind, profile) in &daemon_config.profiles {
            profiles.insert(kind.clone(), profile.clone());
        }
    }

    let mut daemon = ApprovalDaemon::new(TmuxSessionDriver, profiles);
    loop {
        for worker in &config.workers {
            let handle = SessionHandle::for_worker(&config.project.slug, &worker.id);
            for action in daemon.poll_session(&handle, &worker.agent, Utc::now()) {
                let (kind, pattern) = match &action {
                    crate::daemon::DaemonAction::Approved { pattern } => {
                        (EventKind::DaemonApproved, pattern)
                    }
                    crate::daemon::DaemonAction::Stuck { pattern } => {
                        (EventKind::DaemonStuck, pattern)
                    }
                };
                events.emit_simple(
                    Source::Daemon,
                    kind,
                    Severity::Action,
                    &[("worker", worker.id.as_str()), ("pattern", pattern.as_str())],
                )?;
            }
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
