//! `czarina czar run` (spec.md §4.2, §6): the foreground supervisor loop that
//! `launch --go` attaches as a detached session.

use crate::czar::CzarLoop;
use crate::eventlog::EventLog;
use crate::session::TmuxSessionDriver;
use anyhow::Result;
use std::path::Path;

pub async fn run(project_dir: &Path) -> Result<()> {
    let (config, layout) = super::load(project_dir)?;
    let interval_secs = config
        .hopper
        .as_ref()
        .and_then(|h| h.czar_monitoring.as_ref())
        .map(|m| m.check_interval)
        .unwrap_or(30);

    let mut events = EventLog::open(&layout.logs_dir())?;
    let mut czar = CzarLoop::new(layout, config, TmuxSessionDriver);
    czar.run(&mut events, interval_secs).await?;
    Ok(())
}
