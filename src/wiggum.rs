//! WiggumController: disposable-worker retry engine (spec.md §4.7). Independent of
//! the worker/phase machinery — a standalone command for bounded, verifiable tasks.
//!
//! The spawn/timeout-watchdog/verify shape follows the same pattern as
//! `hooks::executor::HookExecutor::execute_command` (tokio process + `tokio::time::
//! timeout` around `child.wait_with_output()`), generalized from a single hook
//! invocation to a retry loop with cycle detection and accumulated wisdom.

use crate::config::WiggumConfig;
use crate::errors::{RepoError, WiggumError};
use crate::eventlog::{EventKind, EventLog, Severity, Source};
use crate::repo::git;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    CycleDetected { hash: String },
    VerifyFailed { exit_code: i32, output_tail: String },
    Timeout,
}

pub struct WiggumController {
    repo_root: PathBuf,
    config: WiggumConfig,
    invoking_branch: String,
}

impl WiggumController {
    pub fn new(repo_root: PathBuf, config: WiggumConfig, invoking_branch: String) -> Self {
        Self {
            repo_root,
            config,
            invoking_branch,
        }
    }

    fn sandbox_dir(&self, n: u32) -> PathBuf {
        let prefix = &self.config.sandbox_prefix;
        let base = if Path::new(prefix).is_absolute() {
            PathBuf::from(prefix)
        } else {
            self.repo_root.join(prefix)
        };
        base.join(format!("attempt-{n}"))
    }

    fn attempt_branch(n: u32) -> String {
        format!("wiggum/attempt-{n}")
    }

    /// Run the full retry loop for `task_directive`. The invoking branch is never
    /// modified except by a successful merge (spec.md §8 property 8).
    pub async fn run(
        &self,
        task_directive: &str,
        events: &mut EventLog,
    ) -> Result<(), WiggumError> {
        let retries = self.config.default_retries.max(1);
        let mut seen_hashes: Vec<String> = Vec::new();
        let mission_brief = self.accumulated_wisdom();

        for n in 1..=retries {
            events
                .emit_simple(
                    Source::Wiggum,
                    EventKind::WiggumAttempt,
                    Severity::Action,
                    &[("attempt", &n.to_string())],
                )
                .ok();

            let outcome = self
                .run_one_attempt(n, task_directive, &mission_brief, &seen_hashes)
                .await?;

            match outcome {
                AttemptOutcome::Success => {
                    self.resolve_success(n, events)?;
                    return Ok(());
                }
                AttemptOutcome::CycleDetected { hash } => {
                    seen_hashes.push(hash.clone());
                    self.resolve_failure(
                        n,
                        events,
                        EventKind::WiggumCycle,
                        &format!("attempt {n}: diff identical to a previous attempt (hash {hash})"),
                    )?;
                }
                AttemptOutcome::VerifyFailed { exit_code, output_tail } => {
                    self.resolve_failure(
                        n,
                        events,
                        EventKind::WiggumVerifyFailed,
                        &format!(
                            "attempt {n}: verify_command exited {exit_code}\n{output_tail}"
                        ),
                    )?;
                }
                AttemptOutcome::Timeout => {
                    self.resolve_failure(
                        n,
                        events,
                        EventKind::WiggumTimeout,
                        &format!("attempt {n}: timed out after {}s", self.config.timeout_seconds),
                    )?;
                }
            }
        }

        events
            .emit_simple(
                Source::Wiggum,
                EventKind::WiggumAborted,
                Severity::Alert,
                &[("attempts", &retries.to_string())],
            )
            .ok();
        Err(WiggumError::WiggumAborted(retries))
    }

    fn accumulated_wisdom(&self) -> String {
        let path = self.repo_root.join(".czarina").join("wiggum-wisdom.md");
        std::fs::read_to_string(path).unwrap_or_default()
    }

    async fn run_one_attempt(
        &self,
        n: u32,
        task_directive: &str,
        mission_brief: &str,
        seen_hashes: &[String],
    ) -> Result<AttemptOutcome, WiggumError> {
        let sandbox = self.sandbox_dir(n);
        let branch = Self::attempt_branch(n);
        git::create_worktree(&self.repo_root, &sandbox, &branch, &self.invoking_branch)?;

        let brief_path = sandbox.join(".czarina").join("mission_brief.md");
        if let Some(parent) = brief_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut brief = String::new();
        if !mission_brief.is_empty() {
            brief.push_str(mission_brief);
            brief.push_str("\n---\n");
        }
        brief.push_str(task_directive);
        brief.push('\n');
        std::fs::write(&brief_path, brief)?;

        let agent_command = self
            .config
            .agent_command
            .clone()
            .unwrap_or_else(|| task_directive.to_string());

        let outcome = self.execute_with_timeout(&sandbox, &agent_command).await?;
        if matches!(outcome, Some(AttemptOutcome::Timeout)) {
            git::remove_worktree(&self.repo_root, &sandbox).ok();
            return Ok(AttemptOutcome::Timeout);
        }

        git::checkout_paths(&sandbox, &self.config.protected_files)?;

        let diff = git::unified_diff(&sandbox, &self.invoking_branch)?;
        let hash = hex_sha256(&diff);
        if seen_hashes.contains(&hash) {
            git::remove_worktree(&self.repo_root, &sandbox).ok();
            return Ok(AttemptOutcome::CycleDetected { hash });
        }

        let verify_result = match &self.config.verify_command {
            Some(cmd) => self.run_verify_command(&sandbox, cmd).await?,
            None => (0, String::new()),
        };
        let (exit_code, output_tail) = verify_result;

        let final_outcome = if exit_code == 0 {
            AttemptOutcome::Success
        } else {
            AttemptOutcome::VerifyFailed { exit_code, output_tail }
        };

        if !matches!(final_outcome, AttemptOutcome::Success) {
            git::remove_worktree(&self.repo_root, &sandbox).ok();
        }
        Ok(final_outcome)
    }

    /// Run `agent_command` in `sandbox`, enforcing `timeout_seconds` as a watchdog
    /// over `child.wait_with_output()` (grounded on the hook executor pattern).
    async fn execute_with_timeout(
        &self,
        sandbox: &Path,
        agent_command: &str,
    ) -> Result<Option<AttemptOutcome>, WiggumError> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(agent_command)
            .current_dir(sandbox)
            .kill_on_drop(true)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        let duration = Duration::from_secs(self.config.timeout_seconds);
        match timeout(duration, child.wait()).await {
            Ok(result) => {
                result?;
                Ok(None)
            }
            Err(_) => {
                child.kill().await.ok();
                Ok(Some(AttemptOutcome::Timeout))
            }
        }
    }

    async fn run_verify_command(
        &self,
        sandbox: &Path,
        verify_command: &str,
    ) -> Result<(i32, String), WiggumError> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(verify_command)
            .current_dir(sandbox)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;
        let exit_code = output.status.code().unwrap_or(-1);
        let combined = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        let tail: String = combined.lines().rev().take(20).collect::<Vec<_>>().into_iter().rev().collect::<Vec<_>>().join("\n");
        Ok((exit_code, tail))
    }

    fn resolve_success(&self, n: u32, events: &mut EventLog) -> Result<(), WiggumError> {
        let sandbox = self.sandbox_dir(n);
        let branch = Self::attempt_branch(n);
        // The attempt branch is checked out in `sandbox`; a rebase merge strategy
        // needs to check it out in the main working copy, so the sandbox worktree
        // must be gone first.
        git::remove_worktree(&self.repo_root, &sandbox).ok();
        let merged = git::merge_branch(
            &self.repo_root,
            &branch,
            &self.invoking_branch,
            self.config.merge_strategy,
        )?;
        if !merged {
            return Err(WiggumError::Repo(RepoError::GitUnavailable(format!(
                "merge of {branch} into {} failed",
                self.invoking_branch
            ))));
        }
        events
            .emit_simple(
                Source::Wiggum,
                EventKind::WiggumSuccess,
                Severity::Success,
                &[("attempt", &n.to_string())],
            )
            .ok();
        Ok(())
    }

    fn resolve_failure(
        &self,
        n: u32,
        events: &mut EventLog,
        kind: EventKind,
        note: &str,
    ) -> Result<(), WiggumError> {
        self.append_wisdom(note)?;
        events
            .emit_simple(Source::Wiggum, kind, Severity::Alert, &[("attempt", &n.to_string())])
            .ok();
        Ok(())
    }

    /// Append one wisdom paragraph to the persistent cross-attempt notes file
    /// (spec.md §4.7 step 5).
    fn append_wisdom(&self, note: &str) -> std::io::Result<()> {
        let path = self.repo_root.join(".czarina").join("wiggum-wisdom.md");
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        use std::io::Write;
        let mut f = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(f, "{note}\n")
    }
}

fn hex_sha256(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_diffs_hash_identically() {
        let a = hex_sha256("diff --git a/x.txt b/x.txt\n+hello\n");
        let b = hex_sha256("diff --git a/x.txt b/x.txt\n+hello\n");
        assert_eq!(a, b);
    }

    #[test]
    fn different_diffs_hash_differently() {
        let a = hex_sha256("diff one");
        let b = hex_sha256("diff two");
        assert_ne!(a, b);
    }

    #[test]
    fn sandbox_dir_honors_relative_prefix() {
        let config = WiggumConfig {
            agent_command: None,
            sandbox_prefix: ".czarina/wiggum-sandboxes".into(),
            default_retries: 3,
            timeout_seconds: 60,
            protected_files: Vec::new(),
            verify_command: None,
            merge_strategy: crate::config::MergeStrategy::Squash,
        };
        let ctl = WiggumController::new(PathBuf::from("/repo"), config, "main".into());
        assert_eq!(
            ctl.sandbox_dir(2),
            PathBuf::from("/repo/.czarina/wiggum-sandboxes/attempt-2")
        );
    }

    #[test]
    fn attempt_branch_naming() {
        assert_eq!(WiggumController::attempt_branch(5), "wiggum/attempt-5");
    }

    /// spec.md §4.7 step 2 / §5: the timeout watchdog must actually kill the
    /// subprocess, not just abandon it, so the process stops once the watchdog
    /// reports `Timeout` instead of continuing to run in the background.
    #[tokio::test]
    async fn execute_with_timeout_kills_the_process_on_expiry() {
        use tempfile::TempDir;

        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("ticks");
        std::fs::write(&marker, "").unwrap();

        let config = WiggumConfig {
            agent_command: None,
            sandbox_prefix: ".czarina/wiggum-sandboxes".into(),
            default_retries: 1,
            timeout_seconds: 1,
            protected_files: Vec::new(),
            verify_command: None,
            merge_strategy: crate::config::MergeStrategy::Squash,
        };
        let ctl = WiggumController::new(dir.path().to_path_buf(), config, "main".into());
        let command = format!("while true; do echo x >> {}; sleep 0.1; done", marker.display());

        let outcome = ctl.execute_with_timeout(dir.path(), &command).await.unwrap();
        assert_eq!(outcome, Some(AttemptOutcome::Timeout));

        let size_at_timeout = std::fs::metadata(&marker).unwrap().len();
        tokio::time::sleep(Duration::from_millis(500)).await;
        let size_after_wait = std::fs::metadata(&marker).unwrap().len();
        assert_eq!(
            size_at_timeout, size_after_wait,
            "process kept writing after the timeout should have killed it"
        );
    }
}
