//! `czarina status` (spec.md §6: "print current phase, worker statuses, daemon
//! liveness"). Read-only: never writes `worker-status.json`, only reads the
//! snapshot CzarLoop last wrote plus live session liveness.

use crate::repo::naming::daemon_session_name;
use crate::session::{SessionDriver, SessionHandle, TmuxSessionDriver};
use crate::status::StatusSnapshot;
use anyhow::Result;
use std::path::Path;

pub fn run(project_dir: &Path) -> Result<()> {
    let (config, layout) = super::load(project_dir)?;
    let snapshot = StatusSnapshot::load(&layout.worker_status_path())?;

    println!();
    println!("Project:  {} ({})", config.project.name, config.project.slug);
    println!("Phase:    {}", config.project.phase);
    println!("Omnibus:  {}", config.project.omnibus_branch);
    if let Some(description) = &config.project.description {
        let width = match terminal_size::terminal_size() {
            Some((terminal_size::Width(w), _)) => (w as usize).clamp(40, 100),
            None => 80,
        };
        for line in textwrap::wrap(description, width) {
            println!("          {line}");
        }
    }
    if let Some(generated_at) = snapshot.generated_at {
        println!("Snapshot: {}", generated_at.to_rfc3339());
    } else {
        println!("Snapshot: none yet (launch and run `czarina czar run` to populate one)");
    }
    println!();

    println!("{:<14} {:<10} {:<10} {:<8} {:<10}", "Worker", "Status", "Health", "Session", "Commits");
    println!("{:<14} {:<10} {:<10} {:<8} {:<10}", "------", "------", "------", "-------", "-------");
    let driver = TmuxSessionDriver;
    for worker in &config.workers {
        let handle = SessionHandle::for_worker(&config.project.slug, &worker.id);
        let alive = driver.is_alive(&handle);
        match snapshot.workers.get(&worker.id) {
            Some(entry) => println!(
                "{:<14} {:<10?} {:<10?} {:<8} {:<10}",
                worker.id,
                entry.status,
                entry.health,
                if alive { "up" } else { "down" },
                entry.commits_ahead
            ),
            None => println!("{:<14} {:<10} {:<10} {:<8} {:<10}", worker.id, "unknown", "unknown", if alive { "up" } else { "down" }, "-"),
        }
    }

    println!();
    let daemon_handle = SessionHandle {
        name: daemon_session_name(&config.project.slug),
    };
    println!(
        "Daemon:   {}",
        if driver.is_alive(&daemon_handle) { "running" } else { "stopped" }
    );
    println!();
    Ok(())
}
