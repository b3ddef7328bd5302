//! SessionDriver: launches and controls one detached terminal session per worker
//! (spec.md §3 SessionHandle, §4.1, §4.6). Backed by `tmux`, shelled out to via
//! `std::process::Command`, following the same shell-out discipline as
//! [`crate::repo::git`] — tmux has no safe Rust binding with broad distro
//! availability, and shelling out keeps the new-session/send-keys/capture-pane/
//! kill-session sequence legible and directly testable against a real tmux binary.

use crate::errors::SessionError;
use crate::repo::naming::session_name;
use std::path::Path;
use std::process::Command;

/// Logical handle to a worker's terminal session. Reconstructible from
/// `{project.slug, worker.id}` alone (spec.md §9 "subprocess sprawl → session
/// handles"), so the Czar is crash-tolerant: it never stores a PID or pipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    pub name: String,
}

impl SessionHandle {
    pub fn for_worker(slug: &str, worker_id: &str) -> Self {
        Self {
            name: session_name(slug, worker_id),
        }
    }
}

fn run_tmux(args: &[&str]) -> Result<std::process::Output, SessionError> {
    Command::new("tmux")
        .args(args)
        .output()
        .map_err(SessionError::Io)
}

fn ok_or_stderr(output: std::process::Output) -> Result<String, String> {
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    } else {
        Err(String::from_utf8_lossy(&output.stderr).trim().to_string())
    }
}

/// Abstraction over the terminal multiplexer so CzarLoop/ApprovalDaemon can be
/// tested against a fake driver without spawning real tmux panes.
pub trait SessionDriver {
    fn start(&self, handle: &SessionHandle, working_dir: &Path, command: &str) -> Result<(), SessionError>;
    fn is_alive(&self, handle: &SessionHandle) -> bool;
    fn send_text(&self, handle: &SessionHandle, text: &str) -> Result<(), SessionError>;
    fn capture(&self, handle: &SessionHandle) -> Result<String, SessionError>;
    fn kill(&self, handle: &SessionHandle) -> Result<(), SessionError>;
    fn list(&self) -> Result<Vec<String>, SessionError>;
}

/// Real tmux-backed driver.
pub struct TmuxSessionDriver;

impl SessionDriver for TmuxSessionDriver {
    fn start(&self, handle: &SessionHandle, working_dir: &Path, command: &str) -> Result<(), SessionError> {
        let dir = working_dir.to_string_lossy().to_string();
        let output = run_tmux(&[
            "new-session",
            "-d",
            "-s",
            &handle.name,
            "-c",
            &dir,
            command,
        ])?;
        ok_or_stderr(output)
            .map(|_| ())
            .map_err(|e| SessionError::SessionStartFailed(handle.name.clone(), e))
    }

    fn is_alive(&self, handle: &SessionHandle) -> bool {
        run_tmux(&["has-session", "-t", &handle.name])
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn send_text(&self, handle: &SessionHandle, text: &str) -> Result<(), SessionError> {
        if !self.is_alive(handle) {
            return Err(SessionError::NotFound(handle.name.clone()));
        }
        // Literal mode (-l) so the text is sent as-is, then a separate Enter key so
        // embedded newlines in `text` don't prematurely submit a partial line.
        let output = run_tmux(&["send-keys", "-t", &handle.name, "-l", text])?;
        ok_or_stderr(output)
            .map_err(|e| SessionError::SessionStartFailed(handle.name.clone(), e))?;
        let enter = run_tmux(&["send-keys", "-t", &handle.name, "Enter"])?;
        ok_or_stderr(enter)
            .map(|_| ())
            .map_err(|e| SessionError::SessionStartFailed(handle.name.clone(), e))
    }

    fn capture(&self, handle: &SessionHandle) -> Result<String, SessionError> {
        let output = run_tmux(&["capture-pane", "-t", &handle.name, "-p", "-S", "-200"])?;
        ok_or_stderr(output).map_err(|_| SessionError::NotFound(handle.name.clone()))
    }

    fn kill(&self, handle: &SessionHandle) -> Result<(), SessionError> {
        if !self.is_alive(handle) {
            return Ok(());
        }
        let output = run_tmux(&["kill-session", "-t", &handle.name])?;
        ok_or_stderr(output)
            .map(|_| ())
            .map_err(|e| SessionError::SessionStartFailed(handle.name.clone(), e))
    }

    fn list(&self) -> Result<Vec<String>, SessionError> {
        let output = run_tmux(&["list-sessions", "-F", "#{session_name}"])?;
        match output.status.success() {
            true => Ok(String::from_utf8_lossy(&output.stdout)
                .lines()
                .map(str::to_string)
                .collect()),
            false => Ok(Vec::new()),
        }
    }
}

/// In-memory fake for tests: no real tmux binary required.
#[cfg(test)]
pub struct FakeSessionDriver {
    pub sessions: std::sync::Mutex<std::collections::HashMap<String, Vec<String>>>,
}

#[cfg(test)]
impl FakeSessionDriver {
    pub fn new() -> Self {
        Self {
            sessions: std::sync::Mutex::new(std::collections::HashMap::new()),
        }
    }
}

#[cfg(test)]
impl SessionDriver for FakeSessionDriver {
    fn start(&self, handle: &SessionHandle, _working_dir: &Path, _command: &str) -> Result<(), SessionError> {
        self.sessions.lock().unwrap().insert(handle.name.clone(), Vec::new());
        Ok(())
    }

    fn is_alive(&self, handle: &SessionHandle) -> bool {
        self.sessions.lock().unwrap().contains_key(&handle.name)
    }

    fn send_text(&self, handle: &SessionHandle, text: &str) -> Result<(), SessionError> {
        let mut sessions = self.sessions.lock().unwrap();
        match sessions.get_mut(&handle.name) {
            Some(log) => {
                log.push(text.to_string());
                Ok(())
            }
            None => Err(SessionError::NotFound(handle.name.clone())),
        }
    }

    fn capture(&self, handle: &SessionHandle) -> Result<String, SessionError> {
        let sessions = self.sessions.lock().unwrap();
        sessions
            .get(&handle.name)
            .map(|log| log.join("\n"))
            .ok_or_else(|| SessionError::NotFound(handle.name.clone()))
    }

    fn kill(&self, handle: &SessionHandle) -> Result<(), SessionError> {
        self.sessions.lock().unwrap().remove(&handle.name);
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>, SessionError> {
        Ok(self.sessions.lock().unwrap().keys().cloned().collect())
    }
}
