use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use czarina::errors::{ConfigError, DependencyError, RepoError};

#[derive(Parser)]
#[command(name = "czarina")]
#[command(version, about = "Orchestrator for parallel autonomous coding agents working on isolated git branches")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Skip interactive confirmations for destructive operations.
    #[arg(long, global = true)]
    pub yes: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize `.czarina/` for a phase.
    Init {
        #[arg(long)]
        phase: Option<u32>,
        #[arg(long)]
        force: bool,
    },
    /// Turn a plan document into a phase config.json via the file-based handoff.
    Analyze {
        plan: PathBuf,
        #[arg(long)]
        interactive: bool,
        #[arg(long)]
        init: bool,
        #[arg(long)]
        force: bool,
    },
    /// Start every configured worker's session plus the ApprovalDaemon.
    Launch {
        /// Also attach CzarLoop as a background supervisor.
        #[arg(long)]
        go: bool,
        #[arg(long)]
        remote: Option<String>,
    },
    /// Print current phase, worker statuses, and daemon liveness.
    Status,
    /// Manage phase lifecycle.
    Phase {
        #[command(subcommand)]
        command: PhaseCommands,
    },
    /// Manage the two-tier backlog.
    Hopper {
        #[command(subcommand)]
        command: HopperCommands,
    },
    /// Archive the active phase and tear the whole control plane down.
    Closeout,
    /// Run a bounded, disposable-worker retry loop for one task.
    Wiggum {
        task_directive: String,
        #[arg(long = "verify-command")]
        verify_command: Option<String>,
        #[arg(long)]
        retries: Option<u32>,
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Manage the ApprovalDaemon's own session.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommands,
    },
    /// Manage the Czar supervisor.
    Czar {
        #[command(subcommand)]
        command: CzarCommands,
    },
    /// Self-report a worker's own completion (e.g. from an agent's exit hook).
    Worker {
        #[command(subcommand)]
        command: WorkerCommands,
    },
}

#[derive(Subcommand)]
pub enum PhaseCommands {
    Close {
        #[arg(long, conflicts_with = "force_clean")]
        keep_worktrees: bool,
        #[arg(long, conflicts_with = "keep_worktrees")]
        force_clean: bool,
    },
    List,
}

#[derive(Subcommand)]
pub enum HopperCommands {
    Add { file: PathBuf },
    List {
        #[arg(default_value = "project")]
        tier: String,
    },
    Pull { file: PathBuf },
    Defer { file: PathBuf },
    Assign { worker: String, file: PathBuf },
}

#[derive(Subcommand)]
pub enum DaemonCommands {
    Start,
    Stop,
    Status,
    Logs,
    /// Foreground poll loop (what `start` actually runs as a detached session).
    Run,
}

#[derive(Subcommand)]
pub enum CzarCommands {
    /// Foreground supervisor loop (what `launch --go` actually runs as a detached session).
    Run,
}

#[derive(Subcommand)]
pub enum WorkerCommands {
    /// Record `WORKER_COMPLETE` and mark this worker `status="complete"`.
    Complete { id: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => match std::env::current_dir().context("reading current directory") {
            Ok(dir) => dir,
            Err(e) => {
                eprintln!("error: {e:#}");
                std::process::exit(1);
            }
        },
    };

    let _trace_guard = czarina::tracing_setup::init(&project_dir.join(".czarina").join("logs").join("trace"), cli.verbose);

    if let Err(err) = dispatch(&cli, &project_dir).await {
        eprintln!("error: {err:#}");
        std::process::exit(exit_code_for(&err));
    }
}

async fn dispatch(cli: &Cli, project_dir: &std::path::Path) -> Result<()> {
    match &cli.command {
        Commands::Init { phase, force } => czarina::cmd::init::run(project_dir, *phase, *force),
        Commands::Analyze { plan, interactive, init, force } => {
            czarina::cmd::analyze::run(project_dir, plan, *interactive, *init, *force)
        }
        Commands::Launch { go, remote } => czarina::cmd::launch::run(project_dir, *go, remote.clone()),
        Commands::Status => czarina::cmd::status::run(project_dir),
        Commands::Phase { command } => match command {
            PhaseCommands::Close { keep_worktrees, force_clean } => {
                if !cli.yes && !keep_worktrees && !force_clean {
                    confirm_or_abort("Close the active phase?")?;
                }
                czarina::cmd::phase::close(project_dir, *keep_worktrees, *force_clean)
            }
            PhaseCommands::List => czarina::cmd::phase::list(project_dir),
        },
        Commands::Hopper { command } => match command {
            HopperCommands::Add { file } => czarina::cmd::hopper::add(project_dir, file),
            HopperCommands::List { tier } => czarina::cmd::hopper::list(project_dir, tier),
            HopperCommands::Pull { file } => czarina::cmd::hopper::pull(project_dir, file),
            HopperCommands::Defer { file } => czarina::cmd::hopper::defer(project_dir, file),
            HopperCommands::Assign { worker, file } => czarina::cmd::hopper::assign(project_dir, worker, file),
        },
        Commands::Closeout => {
            if !cli.yes {
                confirm_or_abort("Archive the active phase and tear down the control plane?")?;
            }
            czarina::cmd::closeout::run(project_dir)
        }
        Commands::Wiggum { task_directive, verify_command, retries, timeout } => {
            czarina::cmd::wiggum::run(project_dir, task_directive, verify_command.clone(), *retries, *timeout).await
        }
        Commands::Daemon { command } => match command {
            DaemonCommands::Start => czarina::cmd::daemon::start(project_dir),
            DaemonCommands::Stop => czarina::cmd::daemon::stop(project_dir),
            DaemonCommands::Status => czarina::cmd::daemon::status(project_dir),
            DaemonCommands::Logs => czarina::cmd::daemon::logs(project_dir),
            DaemonCommands::Run => czarina::cmd::daemon::run(project_dir).await,
        },
        Commands::Czar { command } => match command {
            CzarCommands::Run => czarina::cmd::czar_run::run(project_dir).await,
        },
        Commands::Worker { command } => match command {
            WorkerCommands::Complete { id } => czarina::cmd::worker::complete(project_dir, id),
        },
    }
}

fn confirm_or_abort(prompt: &str) -> Result<()> {
    use dialoguer::Confirm;
    let confirmed = Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .unwrap_or(false);
    if !confirmed {
        anyhow::bail!("aborted: operator declined confirmation");
    }
    Ok(())
}

/// Exit-code mapping (SPEC_FULL.md §6): 1 for operational errors, 2 for
/// validation errors recognized by downcasting the error chain back to the
/// component error enum that raised it.
fn exit_code_for(err: &anyhow::Error) -> i32 {
    if let Some(e) = err.downcast_ref::<ConfigError>() {
        return match e {
            ConfigError::ConfigInvalid(_) | ConfigError::InvalidSlug(_) => 2,
            _ => 1,
        };
    }
    if let Some(e) = err.downcast_ref::<RepoError>() {
        return match e {
            RepoError::InvalidBranchName { .. } => 2,
            _ => 1,
        };
    }
    if let Some(e) = err.downcast_ref::<DependencyError>() {
        return match e {
            DependencyError::DependencyCycle(_) => 2,
            _ => 1,
        };
    }
    1
}
