//! ConfigStore: parses and validates `config.json`, the authoritative, read-mostly
//! description of a project's phases, workers, and subsystem tuning.
//!
//! Unknown top-level fields are ignored for forward-compatibility (serde's default
//! behavior); `agent_rules`, `memory`, and `role_mappings` are kept as opaque
//! `serde_json::Value` and passed through untouched to external collaborators.

use crate::errors::ConfigError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

fn slug_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("static regex"))
}

pub fn is_valid_slug(s: &str) -> bool {
    !s.is_empty() && slug_pattern().is_match(s)
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProjectConfig {
    pub name: String,
    pub slug: String,
    pub repository: PathBuf,
    #[serde(default)]
    pub orchestration_dir: Option<String>,
    pub version: String,
    pub phase: u32,
    pub omnibus_branch: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerRole {
    Feature,
    Integration,
}

impl Default for WorkerRole {
    fn default() -> Self {
        WorkerRole::Feature
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerConfig {
    pub id: String,
    pub agent: String,
    pub branch: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub phase: Option<u32>,
    #[serde(default)]
    pub role: Option<WorkerRole>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub token_budget: Option<u64>,
}

impl WorkerConfig {
    pub fn role(&self) -> WorkerRole {
        self.role.unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestrationMode {
    ParallelSpike,
    SequentialDependencies,
    Hybrid,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OrchestrationConfig {
    pub mode: Option<OrchestrationMode>,
    #[serde(default)]
    pub allow_parallel_when_possible: Option<bool>,
    #[serde(default)]
    pub timeout_hours: Option<u32>,
}

/// A single approval pattern/keystroke pair an agent kind may need auto-answered.
/// Pure data — adding a new agent kind never requires a code change.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AgentProfile {
    pub approval_patterns: HashMap<String, String>,
    pub key_sequences: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DaemonConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub auto_approve: Vec<String>,
    #[serde(default)]
    pub profiles: HashMap<String, AgentProfile>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseCompletionMode {
    #[default]
    Any,
    All,
    Strict,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CzarMonitoringConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,
}

fn default_check_interval() -> u64 {
    30
}

impl Default for CzarMonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval: default_check_interval(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HopperConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub project_hopper: Option<String>,
    #[serde(default)]
    pub phase_hopper: Option<String>,
    #[serde(default)]
    pub czar_monitoring: Option<CzarMonitoringConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    Merge,
    Squash,
    Rebase,
}

impl Default for MergeStrategy {
    fn default() -> Self {
        MergeStrategy::Squash
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WiggumConfig {
    #[serde(default)]
    pub agent_command: Option<String>,
    #[serde(default = "default_sandbox_prefix")]
    pub sandbox_prefix: String,
    #[serde(default = "default_retries")]
    pub default_retries: u32,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub protected_files: Vec<String>,
    #[serde(default)]
    pub verify_command: Option<String>,
    #[serde(default)]
    pub merge_strategy: MergeStrategy,
}

fn default_sandbox_prefix() -> String {
    ".czarina/wiggum-sandboxes".to_string()
}

fn default_retries() -> u32 {
    3
}

fn default_timeout_seconds() -> u64 {
    1800
}

impl Default for WiggumConfig {
    fn default() -> Self {
        Self {
            agent_command: None,
            sandbox_prefix: default_sandbox_prefix(),
            default_retries: default_retries(),
            timeout_seconds: default_timeout_seconds(),
            protected_files: Vec::new(),
            verify_command: None,
            merge_strategy: MergeStrategy::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PhaseBlueprint {
    pub omnibus_branch: String,
    pub workers: Vec<WorkerConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub project: ProjectConfig,
    pub workers: Vec<WorkerConfig>,
    #[serde(default)]
    pub orchestration: Option<OrchestrationConfig>,
    #[serde(default)]
    pub daemon: Option<DaemonConfig>,
    #[serde(default)]
    pub phase_completion_mode: PhaseCompletionMode,
    #[serde(default)]
    pub hopper: Option<HopperConfig>,
    #[serde(default)]
    pub wiggum: Option<WiggumConfig>,
    #[serde(default)]
    pub phases: HashMap<String, PhaseBlueprint>,
    #[serde(default)]
    pub agent_rules: Option<serde_json::Value>,
    #[serde(default)]
    pub memory: Option<serde_json::Value>,
    #[serde(default)]
    pub role_mappings: Option<serde_json::Value>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = serde_json::to_string_pretty(self)
            .map_err(ConfigError::Malformed)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Validate invariants spec.md §3/§8 demand hold regardless of how the config
    /// arrived (hand-written, generated by `analyze`, or a phase blueprint).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_valid_slug(&self.project.slug) {
            return Err(ConfigError::InvalidSlug(self.project.slug.clone()));
        }
        if self.project.phase < 1 {
            return Err(ConfigError::ConfigInvalid(
                "project.phase must be >= 1".into(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for w in &self.workers {
            if !seen.insert(w.id.clone()) {
                return Err(ConfigError::ConfigInvalid(format!(
                    "duplicate worker id {:?}",
                    w.id
                )));
            }
            if w.role() == WorkerRole::Feature && !is_valid_worker_id(&w.id) {
                return Err(ConfigError::ConfigInvalid(format!(
                    "worker id {:?} must match [a-z0-9-]+",
                    w.id
                )));
            }
            for dep in &w.dependencies {
                if !self.workers.iter().any(|other| &other.id == dep) {
                    return Err(ConfigError::ConfigInvalid(format!(
                        "worker {:?} depends on unknown worker {:?}",
                        w.id, dep
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn worker(&self, id: &str) -> Option<&WorkerConfig> {
        self.workers.iter().find(|w| w.id == id)
    }

    pub fn orchestration_dir_name(&self) -> &str {
        self.project
            .orchestration_dir
            .as_deref()
            .unwrap_or(".czarina")
    }
}

fn worker_id_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9-]+$").expect("static regex"))
}

pub fn is_valid_worker_id(id: &str) -> bool {
    !id.is_empty() && worker_id_pattern().is_match(id)
}

/// Locate `<orchestration_dir>/config.json` starting from a project directory,
/// defaulting to `.czarina` when no config has been loaded yet to learn the
/// configured directory name from.
pub fn find_config_path(project_dir: &Path) -> PathBuf {
    project_dir.join(".czarina").join("config.json")
}
