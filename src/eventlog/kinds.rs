use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Czar,
    Daemon,
    Worker,
    Wiggum,
    Cli,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Detect,
    Action,
    Success,
    Alert,
    Error,
}

/// Event kinds are a contract, not an exhaustive closed set (spec.md §4.8); this
/// enum models the ones this implementation actually emits, including the four
/// additions noted in SPEC_FULL.md §4.8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum EventKind {
    CzarStart,
    CzarStop,
    StatusSummary,
    WorkerCrashed,
    StuckWorker,
    PromptStuckWorker,
    WorkerBlocked,
    CooldownActive,
    IdleWorker,
    WorkerDependencyBlocked,
    DependencyNotReady,
    IntegrationReady,
    IntegrationStrategy,
    DependencyCycle,
    HopperNewItem,
    HopperAutoInclude,
    HopperAutoDefer,
    HopperAskHuman,
    HopperAssignTask,
    HopperAssignedTasks,
    TaskInjected,
    PhaseComplete,
    PhaseArchived,
    PhaseLaunched,
    WorkerComplete,
    BranchPushSkipped,
    WorktreeDirtyKept,
    DaemonStart,
    DaemonStop,
    DaemonApproved,
    DaemonStuck,
    WiggumAttempt,
    WiggumSuccess,
    WiggumCycle,
    WiggumVerifyFailed,
    WiggumTimeout,
    WiggumAborted,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::CzarStart => "CZAR_START",
            EventKind::CzarStop => "CZAR_STOP",
            EventKind::StatusSummary => "STATUS_SUMMARY",
            EventKind::WorkerCrashed => "WORKER_CRASHED",
            EventKind::StuckWorker => "STUCK_WORKER",
            EventKind::PromptStuckWorker => "PROMPT_STUCK_WORKER",
            EventKind::WorkerBlocked => "WORKER_BLOCKED",
            EventKind::CooldownActive => "COOLDOWN_ACTIVE",
            EventKind::IdleWorker => "IDLE_WORKER",
            EventKind::WorkerDependencyBlocked => "WORKER_DEPENDENCY_BLOCKED",
            EventKind::DependencyNotReady => "DEPENDENCY_NOT_READY",
            EventKind::IntegrationReady => "INTEGRATION_READY",
            EventKind::IntegrationStrategy => "INTEGRATION_STRATEGY",
            EventKind::DependencyCycle => "DEPENDENCY_CYCLE",
            EventKind::HopperNewItem => "HOPPER_NEW_ITEM",
            EventKind::HopperAutoInclude => "HOPPER_AUTO_INCLUDE",
            EventKind::HopperAutoDefer => "HOPPER_AUTO_DEFER",
            EventKind::HopperAskHuman => "HOPPER_ASK_HUMAN",
            EventKind::HopperAssignTask => "HOPPER_ASSIGN_TASK",
            EventKind::HopperAssignedTasks => "HOPPER_ASSIGNED_TASKS",
            EventKind::TaskInjected => "TASK_INJECTED",
            EventKind::PhaseComplete => "PHASE_COMPLETE",
            EventKind::PhaseArchived => "PHASE_ARCHIVED",
            EventKind::PhaseLaunched => "PHASE_LAUNCHED",
            EventKind::WorkerComplete => "WORKER_COMPLETE",
            EventKind::BranchPushSkipped => "BRANCH_PUSH_SKIPPED",
            EventKind::WorktreeDirtyKept => "WORKTREE_DIRTY_KEPT",
            EventKind::DaemonStart => "DAEMON_START",
            EventKind::DaemonStop => "DAEMON_STOP",
            EventKind::DaemonApproved => "DAEMON_APPROVED",
            EventKind::DaemonStuck => "DAEMON_STUCK",
            EventKind::WiggumAttempt => "WIGGUM_ATTEMPT",
            EventKind::WiggumSuccess => "WIGGUM_SUCCESS",
            EventKind::WiggumCycle => "WIGGUM_CYCLE",
            EventKind::WiggumVerifyFailed => "WIGGUM_VERIFY_FAILED",
            EventKind::WiggumTimeout => "WIGGUM_TIMEOUT",
            EventKind::WiggumAborted => "WIGGUM_ABORTED",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
