//! Single-writer snapshot files: `status/worker-status.json` (written only by
//! CzarLoop) and `status/phase-state.json` (written only by PhaseController),
//! per spec.md §5. Both use write-temp-then-rename so readers never observe a
//! partially written document; readers otherwise tolerate staleness.

use crate::worker::{CompletionSignals, Health, WorkerStatusKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerStatusEntry {
    pub status: WorkerStatusKind,
    pub health: Health,
    pub session_alive: bool,
    pub last_activity: Option<DateTime<Utc>>,
    pub commits_ahead: u32,
    pub completion: CompletionSignals,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub generated_at: Option<DateTime<Utc>>,
    pub workers: BTreeMap<String, WorkerStatusEntry>,
}

impl StatusSnapshot {
    pub fn load(path: &Path) -> std::io::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text).unwrap_or_default())
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        write_atomic(path, &serde_json::to_string_pretty(self).expect("serializes"))
    }

    /// A worker is reported "complete" only via its own status-file report — this is
    /// the StatusFile completion signal (spec.md §4.4), distinct from the `idle`
    /// status CzarLoop derives.
    pub fn is_complete(&self, worker_id: &str) -> bool {
        self.workers
            .get(worker_id)
            .map(|w| w.status == WorkerStatusKind::Complete)
            .unwrap_or(false)
    }

    pub fn previous_status(&self, worker_id: &str) -> Option<WorkerStatusKind> {
        self.workers.get(worker_id).map(|w| w.status)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseState {
    pub current_phase: u32,
    #[serde(default)]
    pub phase_complete: BTreeMap<u32, bool>,
    #[serde(default)]
    pub phase_launched: BTreeMap<u32, bool>,
    pub last_check: Option<DateTime<Utc>>,
}

impl PhaseState {
    pub fn new(current_phase: u32) -> Self {
        Self {
            current_phase,
            phase_complete: BTreeMap::new(),
            phase_launched: BTreeMap::from([(current_phase, true)]),
            last_check: None,
        }
    }

    pub fn load(path: &Path, current_phase: u32) -> std::io::Result<Self> {
        if !path.exists() {
            return Ok(Self::new(current_phase));
        }
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text).unwrap_or_else(|_| Self::new(current_phase)))
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        write_atomic(path, &serde_json::to_string_pretty(self).expect("serializes"))
    }

    pub fn is_complete(&self, phase: u32) -> bool {
        self.phase_complete.get(&phase).copied().unwrap_or(false)
    }

    pub fn mark_complete(&mut self, phase: u32) {
        self.phase_complete.insert(phase, true);
    }

    pub fn mark_launched(&mut self, phase: u32) {
        self.phase_launched.insert(phase, true);
    }
}

/// Write `contents` to `path` via a sibling temp file plus an atomic rename, so a
/// reader never observes a half-written snapshot.
fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, contents)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn status_snapshot_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("status").join("worker-status.json");
        let mut snap = StatusSnapshot::default();
        snap.workers.insert(
            "a".into(),
            WorkerStatusEntry {
                status: WorkerStatusKind::Working,
                health: Health::Healthy,
                session_alive: true,
                last_activity: Some(Utc::now()),
                commits_ahead: 2,
                completion: CompletionSignals {
                    log_marker: false,
                    branch_merged: false,
                    status_file: false,
                },
            },
        );
        snap.save(&path).unwrap();
        let loaded = StatusSnapshot::load(&path).unwrap();
        assert_eq!(loaded.workers["a"].commits_ahead, 2);
    }

    #[test]
    fn missing_snapshot_loads_as_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nonexistent.json");
        let snap = StatusSnapshot::load(&path).unwrap();
        assert!(snap.workers.is_empty());
    }

    #[test]
    fn phase_state_tracks_completion_and_launch() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("phase-state.json");
        let mut state = PhaseState::new(1);
        assert!(!state.is_complete(1));
        state.mark_complete(1);
        state.mark_launched(2);
        state.save(&path).unwrap();

        let loaded = PhaseState::load(&path, 1).unwrap();
        assert!(loaded.is_complete(1));
        assert!(loaded.phase_launched.get(&2).copied().unwrap_or(false));
    }

    #[test]
    fn status_file_complete_is_distinct_from_idle() {
        let mut snap = StatusSnapshot::default();
        snap.workers.insert(
            "a".into(),
            WorkerStatusEntry {
                status: WorkerStatusKind::Complete,
                health: Health::Healthy,
                session_alive: false,
                last_activity: None,
                commits_ahead: 3,
                completion: CompletionSignals {
                    log_marker: false,
                    branch_merged: false,
                    status_file: true,
                },
            },
        );
        assert!(snap.is_complete("a"));
        assert_eq!(snap.previous_status("a"), Some(WorkerStatusKind::Complete));
    }
}
