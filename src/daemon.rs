//! ApprovalDaemon: watches each worker's terminal output, recognizes per-agent
//! approval prompts, and sends the configured keystrokes to auto-approve them
//! (spec.md §4.6). Profiles are pure data (`config::AgentProfile`) — adding a new
//! agent kind never requires a code change, matching SPEC_FULL.md §9's "dynamic
//! dispatch on agent kinds → tagged data" design note.

use crate::config::AgentProfile;
use crate::session::{SessionDriver, SessionHandle};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// One sample-and-act pass over a single worker's session (spec.md §4.6
/// "Scheduling": sampled every 2s by the caller's poll loop).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonAction {
    Approved { pattern: String },
    Stuck { pattern: String },
}

#[derive(Debug, Clone)]
struct PatternState {
    last_answered: Option<DateTime<Utc>>,
    consecutive_attempts: u32,
    last_seen_text: String,
    stuck: bool,
}

impl Default for PatternState {
    fn default() -> Self {
        Self {
            last_answered: None,
            consecutive_attempts: 0,
            last_seen_text: String::new(),
            stuck: false,
        }
    }
}

const DEBOUNCE: i64 = 10; // seconds, spec.md §4.6
const STUCK_AFTER_ATTEMPTS: u32 = 3; // spec.md §4.6 "after 3 consecutive attempts"

/// Built-in profiles shipped as data for the three example agent kinds named in
/// spec.md §3 (SPEC_FULL.md §4.6 "Built-in agent profiles (ADDED)"). Operators may
/// override/extend via `config.json:daemon.profiles`.
pub fn builtin_profiles() -> HashMap<String, AgentProfile> {
    let mut profiles = HashMap::new();
    for kind in ["claude", "aider", "cursor"] {
        let mut approval_patterns = HashMap::new();
        approval_patterns.insert(
            "yes_no".to_string(),
            r"(?i)\(y(es)?/n(o)?\)\s*$".to_string(),
        );
        approval_patterns.insert(
            "edit_accept".to_string(),
            r"(?i)do you want to (make this edit|apply this change)".to_string(),
        );
        let mut key_sequences = HashMap::new();
        key_sequences.insert("yes_no".to_string(), "y\n".to_string());
        key_sequences.insert("edit_accept".to_string(), "\n".to_string());
        profiles.insert(
            kind.to_string(),
            AgentProfile {
                approval_patterns,
                key_sequences,
            },
        );
    }
    profiles
}

pub struct ApprovalDaemon<D: SessionDriver> {
    driver: D,
    profiles: HashMap<String, AgentProfile>,
    state: HashMap<String, HashMap<String, PatternState>>,
}

impl<D: SessionDriver> ApprovalDaemon<D> {
    pub fn new(driver: D, profiles: HashMap<String, AgentProfile>) -> Self {
        Self {
            driver,
            profiles,
            state: HashMap::new(),
        }
    }

    /// Sample one session's visible text, match every pattern for `agent_kind`,
    /// and send the configured keystrokes for newly-eligible matches. Never
    /// interprets the prompt's semantic content — only whether the regex matched
    /// (spec.md §4.6 "Scope").
    pub fn poll_session(
        &mut self,
        handle: &SessionHandle,
        agent_kind: &str,
        now: DateTime<Utc>,
    ) -> Vec<DaemonAction> {
        let Some(profile) = self.profiles.get(agent_kind) else {
            return Vec::new();
        };
        let Ok(text) = self.driver.capture(handle) else {
            return Vec::new();
        };

        let session_state = self.state.entry(handle.name.clone()).or_default();
        let mut actions = Vec::new();

        for (pattern_name, pattern) in &profile.approval_patterns {
            let Ok(re) = regex::Regex::new(pattern) else {
                continue;
            };
            if !re.is_match(&text) {
                // Visible text no longer shows this prompt: clear stuck-ness so a
                // future recurrence of the same pattern gets fresh attempts.
                if let Some(state) = session_state.get_mut(pattern_name) {
                    state.consecutive_attempts = 0;
                    state.stuck = false;
                }
                continue;
            }

            let state = session_state.entry(pattern_name.clone()).or_default();

            if state.stuck && state.last_seen_text == text {
                continue;
            }
            if state.last_seen_text != text {
                // The pane changed since we last looked at this pattern: a fresh
                // occurrence, not the same stuck prompt repeating.
                state.consecutive_attempts = 0;
                state.stuck = false;
            }
            state.last_seen_text = text.clone();

            let debounced = state
                .last_answered
                .map(|t| now - t < Duration::seconds(DEBOUNCE))
                .unwrap_or(false);
            if debounced {
                continue;
            }

            let Some(keys) = profile.key_sequences.get(pattern_name) else {
                continue;
            };
            if self.driver.send_text(handle, keys).is_ok() {
                state.last_answered = Some(now);
                state.consecutive_attempts += 1;
                actions.push(DaemonAction::Approved {
                    pattern: pattern_name.clone(),
                });
                if state.consecutive_attempts >= STUCK_AFTER_ATTEMPTS {
                    state.stuck = true;
                    actions.push(DaemonAction::Stuck {
                        pattern: pattern_name.clone(),
                    });
                }
            }
        }

        actions
    }

    /// CzarLoop's stuck-worker nudge injection (spec.md §4.2 step 3 / §4.6
    /// "Stuck-prompt injection"). The daemon never interprets the reply.
    pub fn send(&self, handle: &SessionHandle, text: &str) -> Result<(), crate::errors::SessionError> {
        self.driver.send_text(handle, text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::FakeSessionDriver;
    use std::path::Path;

    fn profiles_with_yes_no() -> HashMap<String, AgentProfile> {
        let mut approval_patterns = HashMap::new();
        approval_patterns.insert("yes_no".to_string(), r"\(y/n\)".to_string());
        let mut key_sequences = HashMap::new();
        key_sequences.insert("yes_no".to_string(), "y\n".to_string());
        let mut profiles = HashMap::new();
        profiles.insert(
            "claude".to_string(),
            AgentProfile {
                approval_patterns,
                key_sequences,
            },
        );
        profiles
    }

    #[test]
    fn approves_matching_prompt_once() {
        let driver = FakeSessionDriver::new();
        let handle = SessionHandle::for_worker("demo", "alice");
        driver.start(&handle, Path::new("/tmp"), "agent").unwrap();
        driver.send_text(&handle, "Proceed? (y/n)").unwrap();

        let mut daemon = ApprovalDaemon::new(driver, profiles_with_yes_no());
        let now = Utc::now();
        let actions = daemon.poll_session(&handle, "claude", now);
        assert_eq!(actions, vec![DaemonAction::Approved { pattern: "yes_no".into() }]);
    }

    #[test]
    fn debounce_suppresses_repeat_within_ten_seconds() {
        let driver = FakeSessionDriver::new();
        let handle = SessionHandle::for_worker("demo", "alice");
        driver.start(&handle, Path::new("/tmp"), "agent").unwrap();
        driver.send_text(&handle, "Proceed? (y/n)").unwrap();

        let mut daemon = ApprovalDaemon::new(driver, profiles_with_yes_no());
        let now = Utc::now();
        daemon.poll_session(&handle, "claude", now);
        let second = daemon.poll_session(&handle, "claude", now + Duration::seconds(5));
        assert!(second.is_empty());
    }

    #[test]
    fn stuck_detected_after_three_consecutive_unanswered_attempts() {
        let driver = FakeSessionDriver::new();
        let handle = SessionHandle::for_worker("demo", "alice");
        driver.start(&handle, Path::new("/tmp"), "agent").unwrap();
        driver.send_text(&handle, "Proceed? (y/n)").unwrap();

        let mut daemon = ApprovalDaemon::new(driver, profiles_with_yes_no());
        let mut now = Utc::now();
        let mut saw_stuck = false;
        for _ in 0..3 {
            let actions = daemon.poll_session(&handle, "claude", now);
            if actions.contains(&DaemonAction::Stuck { pattern: "yes_no".into() }) {
                saw_stuck = true;
            }
            now += Duration::seconds(11);
        }
        assert!(saw_stuck);
    }

    #[test]
    fn unknown_agent_kind_takes_no_action() {
        let driver = FakeSessionDriver::new();
        let handle = SessionHandle::for_worker("demo", "alice");
        driver.start(&handle, Path::new("/tmp"), "agent").unwrap();
        let mut daemon = ApprovalDaemon::new(driver, profiles_with_yes_no());
        let actions = daemon.poll_session(&handle, "unknown-agent", Utc::now());
        assert!(actions.is_empty());
    }
}
