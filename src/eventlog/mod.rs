//! EventLog: append-only structured event stream shared by every subsystem, plus the
//! human-readable mirror logs and the `tracing` bridge described in SPEC_FULL.md §4.8.
//!
//! Grounded on the append/rename persistence discipline of
//! `audit::logger::AuditLogger`, generalized from "one JSON document per run" to
//! "one JSON line per event, opened once and held append-only for the process
//! lifetime" per spec.md's O_APPEND requirement.

mod kinds;

pub use kinds::{EventKind, Severity, Source};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub ts: DateTime<Utc>,
    pub source: Source,
    pub event: EventKind,
    pub severity: Severity,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl EventRecord {
    pub fn new(source: Source, event: EventKind, severity: Severity) -> Self {
        Self {
            ts: Utc::now(),
            source,
            event,
            severity,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.metadata.insert(key.into(), value.to_string());
        self
    }

    fn glyph(&self) -> &'static str {
        match self.severity {
            Severity::Info => "·",
            Severity::Detect => "?",
            Severity::Action => "→",
            Severity::Success => "✓",
            Severity::Alert => "!",
            Severity::Error => "✗",
        }
    }

    fn human_line(&self) -> String {
        let kv: String = self
            .metadata
            .iter()
            .map(|(k, v)| format!(" {k}={v}"))
            .collect();
        format!(
            "[{}] {} {}:{}",
            self.ts.format("%H:%M:%S"),
            self.glyph(),
            self.event.as_str(),
            kv
        )
    }

    fn tracing_level(&self) -> tracing::Level {
        match self.severity {
            Severity::Alert | Severity::Error => tracing::Level::ERROR,
            Severity::Info | Severity::Detect | Severity::Success => tracing::Level::INFO,
            Severity::Action => tracing::Level::INFO,
        }
    }

    fn emit_tracing(&self) {
        let level = self.tracing_level();
        let meta = format!("{:?}", self.metadata);
        match level {
            tracing::Level::ERROR => {
                tracing::error!(target: "czarina::events", event = self.event.as_str(), source = ?self.source, metadata = %meta)
            }
            _ => {
                tracing::info!(target: "czarina::events", event = self.event.as_str(), source = ?self.source, metadata = %meta)
            }
        }
    }
}

/// Append-only writer over `logs/events.jsonl` plus the two human-readable mirrors.
pub struct EventLog {
    events_path: PathBuf,
    orchestration_log: PathBuf,
    workers_log_dir: PathBuf,
    events_file: File,
}

impl EventLog {
    /// `logs_dir` is `.czarina/logs`.
    pub fn open(logs_dir: &Path) -> std::io::Result<Self> {
        fs::create_dir_all(logs_dir)?;
        fs::create_dir_all(logs_dir.join("workers"))?;
        let events_path = logs_dir.join("events.jsonl");
        let events_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&events_path)?;
        Ok(Self {
            events_path,
            orchestration_log: logs_dir.join("orchestration.log"),
            workers_log_dir: logs_dir.join("workers"),
            events_file,
        })
    }

    pub fn events_path(&self) -> &Path {
        &self.events_path
    }

    /// Append one event. A single `write_all` call of a newline-terminated JSON
    /// document relies on O_APPEND to interleave whole lines safely across
    /// concurrent writers (CzarLoop, ApprovalDaemon, WiggumController, worker
    /// self-reports), matching spec.md §4.8/§5.
    pub fn emit(&mut self, record: EventRecord) -> std::io::Result<()> {
        let mut line = serde_json::to_string(&record).expect("EventRecord always serializes");
        line.push('\n');
        self.events_file.write_all(line.as_bytes())?;
        self.events_file.flush()?;

        let human = record.human_line();
        let mirror_path = match record.source {
            Source::Worker => {
                let id = record
                    .metadata
                    .get("worker")
                    .map(String::as_str)
                    .unwrap_or("unknown");
                self.workers_log_dir.join(format!("{id}.log"))
            }
            _ => self.orchestration_log.clone(),
        };
        append_line(&mirror_path, &human)?;

        record.emit_tracing();
        Ok(())
    }

    pub fn emit_simple(
        &mut self,
        source: Source,
        event: EventKind,
        severity: Severity,
        metadata: &[(&str, &str)],
    ) -> std::io::Result<()> {
        let mut rec = EventRecord::new(source, event, severity);
        for (k, v) in metadata {
            rec.metadata.insert((*k).to_string(), (*v).to_string());
        }
        self.emit(rec)
    }

    /// Scan `events.jsonl` for whether an event of `kind` matching `predicate` has
    /// ever been recorded. Used by WorkerStatus's LogMarker completion signal.
    pub fn has_event(
        &self,
        kind: EventKind,
        predicate: impl Fn(&EventRecord) -> bool,
    ) -> std::io::Result<bool> {
        if !self.events_path.exists() {
            return Ok(false);
        }
        let file = File::open(&self.events_path)?;
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            if let Ok(rec) = serde_json::from_str::<EventRecord>(&line) {
                if rec.event == kind && predicate(&rec) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    pub fn read_all(&self) -> std::io::Result<Vec<EventRecord>> {
        if !self.events_path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.events_path)?;
        let mut out = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            if let Ok(rec) = serde_json::from_str::<EventRecord>(&line) {
                out.push(rec);
            }
        }
        Ok(out)
    }
}

fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    let mut f = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(f, "{line}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn emit_appends_one_line_per_event() {
        let dir = TempDir::new().unwrap();
        let mut log = EventLog::open(dir.path()).unwrap();
        log.emit_simple(Source::Czar, EventKind::CzarStart, Severity::Info, &[])
            .unwrap();
        log.emit_simple(Source::Czar, EventKind::StatusSummary, Severity::Info, &[])
            .unwrap();
        let events = log.read_all().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event, EventKind::CzarStart);
        assert_eq!(events[1].event, EventKind::StatusSummary);
    }

    #[test]
    fn never_truncates_existing_events() {
        let dir = TempDir::new().unwrap();
        {
            let mut log = EventLog::open(dir.path()).unwrap();
            log.emit_simple(Source::Czar, EventKind::CzarStart, Severity::Info, &[])
                .unwrap();
        }
        {
            let mut log = EventLog::open(dir.path()).unwrap();
            log.emit_simple(Source::Czar, EventKind::CzarStop, Severity::Info, &[])
                .unwrap();
        }
        let log = EventLog::open(dir.path()).unwrap();
        let events = log.read_all().unwrap();
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn has_event_finds_worker_complete_marker() {
        let dir = TempDir::new().unwrap();
        let mut log = EventLog::open(dir.path()).unwrap();
        log.emit_simple(
            Source::Worker,
            EventKind::WorkerComplete,
            Severity::Success,
            &[("worker", "a")],
        )
        .unwrap();
        let found = log
            .has_event(EventKind::WorkerComplete, |r| {
                r.metadata.get("worker").map(String::as_str) == Some("a")
            })
            .unwrap();
        assert!(found);
        let missing = log
            .has_event(EventKind::WorkerComplete, |r| {
                r.metadata.get("worker").map(String::as_str) == Some("b")
            })
            .unwrap();
        assert!(!missing);
    }

    #[test]
    fn worker_events_mirror_to_per_worker_log() {
        let dir = TempDir::new().unwrap();
        let mut log = EventLog::open(dir.path()).unwrap();
        log.emit_simple(
            Source::Worker,
            EventKind::WorkerComplete,
            Severity::Success,
            &[("worker", "alice")],
        )
        .unwrap();
        assert!(dir.path().join("workers").join("alice.log").exists());
    }
}
