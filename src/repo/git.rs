//! Git primitives backing RepoLayout, WorkerStatus, and WiggumController.
//!
//! Read-mostly queries (branch existence, commit timestamps, ancestor checks) go
//! through `git2`, following the style of `tracker::git::GitTracker`. Worktree and
//! merge mutations shell out to the `git` CLI via `std::process::Command`, following
//! the style of `factory::agent_executor::AgentExecutor` — `git2` has no first-class
//! worktree API, and shelling out for merge keeps the explicit
//! checkout/merge/abort/checkout-back rollback sequence legible.

use crate::config::MergeStrategy;
use crate::errors::RepoError;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::process::Command;

pub fn open(repo_path: &Path) -> Result<git2::Repository, RepoError> {
    git2::Repository::open(repo_path).map_err(RepoError::from)
}

pub fn is_git_repo(path: &Path) -> bool {
    git2::Repository::open(path).is_ok()
}

pub fn branch_exists_local(repo: &git2::Repository, branch: &str) -> bool {
    repo.find_branch(branch, git2::BranchType::Local).is_ok()
}

fn run_git(repo_path: &Path, args: &[&str]) -> Result<std::process::Output, RepoError> {
    Command::new("git")
        .arg("-C")
        .arg(repo_path)
        .args(args)
        .output()
        .map_err(RepoError::Io)
}

fn ok_or_stderr(output: std::process::Output) -> Result<String, String> {
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        Err(String::from_utf8_lossy(&output.stderr).trim().to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchOrigin {
    Local,
    FetchedFromRemote,
    CreatedFromDefault,
}

/// Branch bootstrap per spec.md §4.1: use local if present, else fetch from the
/// configured remote if present there, else branch from the remote default branch.
/// A missing remote is not an error.
pub fn ensure_branch(
    repo_path: &Path,
    branch: &str,
    remote: Option<&str>,
    default_base: &str,
) -> Result<BranchOrigin, RepoError> {
    let repo = open(repo_path)?;
    if branch_exists_local(&repo, branch) {
        return Ok(BranchOrigin::Local);
    }

    if let Some(remote) = remote {
        let fetch = run_git(repo_path, &["fetch", remote, branch])?;
        if fetch.status.success() {
            let checkout = run_git(
                repo_path,
                &["branch", branch, &format!("{remote}/{branch}")],
            )?;
            if checkout.status.success() {
                return Ok(BranchOrigin::FetchedFromRemote);
            }
        }
    }

    let create = run_git(repo_path, &["branch", branch, default_base])?;
    ok_or_stderr(create).map_err(RepoError::BranchCreateFailed)?;
    Ok(BranchOrigin::CreatedFromDefault)
}

/// Push a newly created branch to `remote`. Failure here is non-fatal to the caller
/// (spec.md §7: `BranchCreateFailed` on push → warn, continue locally,
/// `BRANCH_PUSH_SKIPPED`) — this function returns `Err` and lets the caller decide.
pub fn push_branch(repo_path: &Path, remote: &str, branch: &str) -> Result<(), RepoError> {
    let output = run_git(repo_path, &["push", "-u", remote, branch])?;
    ok_or_stderr(output)
        .map(|_| ())
        .map_err(RepoError::BranchCreateFailed)
}

pub fn create_worktree(
    repo_path: &Path,
    worktree_path: &Path,
    branch: &str,
    base: &str,
) -> Result<(), RepoError> {
    if let Some(parent) = worktree_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let repo = open(repo_path)?;
    let args: Vec<&str> = if branch_exists_local(&repo, branch) {
        vec![
            "worktree",
            "add",
            worktree_path.to_str().expect("utf8 path"),
            branch,
        ]
    } else {
        vec![
            "worktree",
            "add",
            "-b",
            branch,
            worktree_path.to_str().expect("utf8 path"),
            base,
        ]
    };
    let output = run_git(repo_path, &args)?;
    ok_or_stderr(output)
        .map(|_| ())
        .map_err(RepoError::GitUnavailable)
}

pub fn remove_worktree(repo_path: &Path, worktree_path: &Path) -> Result<(), RepoError> {
    let output = run_git(
        repo_path,
        &[
            "worktree",
            "remove",
            "--force",
            worktree_path.to_str().expect("utf8 path"),
        ],
    )?;
    ok_or_stderr(output)
        .map(|_| ())
        .map_err(RepoError::GitUnavailable)
}

pub fn worktree_is_dirty(worktree_path: &Path) -> Result<bool, RepoError> {
    let output = run_git(worktree_path, &["status", "--porcelain"])?;
    let text = ok_or_stderr(output).map_err(RepoError::GitUnavailable)?;
    Ok(!text.trim().is_empty())
}

pub fn current_branch(repo_path: &Path) -> Result<String, RepoError> {
    let output = run_git(repo_path, &["rev-parse", "--abbrev-ref", "HEAD"])?;
    ok_or_stderr(output).map_err(RepoError::GitUnavailable)
}

/// `git merge-base --is-ancestor <branch> <target>` — the BranchMerged completion
/// signal (spec.md §4.4).
pub fn is_ancestor(repo_path: &Path, branch: &str, target: &str) -> Result<bool, RepoError> {
    let repo = open(repo_path)?;
    if !branch_exists_local(&repo, branch) || !branch_exists_local(&repo, target) {
        return Ok(false);
    }
    let branch_oid = repo.revparse_single(branch)?.id();
    let target_oid = repo.revparse_single(target)?.id();
    Ok(repo.graph_descendant_of(target_oid, branch_oid)?)
}

/// Commits on `branch` not reachable from `base` — "commits ahead of omnibus".
pub fn commits_ahead(repo_path: &Path, branch: &str, base: &str) -> Result<u32, RepoError> {
    let repo = open(repo_path)?;
    if !branch_exists_local(&repo, branch) {
        return Ok(0);
    }
    let branch_oid = repo.revparse_single(branch)?.id();
    let base_oid = match repo.revparse_single(base) {
        Ok(obj) => obj.id(),
        Err(_) => return Ok(0),
    };
    let mut revwalk = repo.revwalk()?;
    revwalk.push(branch_oid)?;
    revwalk.hide(base_oid)?;
    Ok(revwalk.count() as u32)
}

/// Last activity on `branch`: the commit time of its tip. The reflog reflects local
/// operator interaction, not worker commit activity, so the branch tip's commit
/// timestamp is the more faithful "last activity" signal for a worker whose agent
/// commits as it works; callers fold this together with log-file and status-file
/// mtimes per spec.md §4.3.
pub fn branch_tip_time(repo_path: &Path, branch: &str) -> Result<Option<DateTime<Utc>>, RepoError> {
    let repo = open(repo_path)?;
    if !branch_exists_local(&repo, branch) {
        return Ok(None);
    }
    let obj = repo.revparse_single(branch)?;
    let commit = obj.peel_to_commit()?;
    let secs = commit.time().seconds();
    Ok(DateTime::from_timestamp(secs, 0))
}

/// Revert any local change to a protected file before verification (WiggumController
/// step 3).
pub fn checkout_paths(repo_path: &Path, paths: &[String]) -> Result<(), RepoError> {
    if paths.is_empty() {
        return Ok(());
    }
    let mut args = vec!["checkout", "--"];
    args.extend(paths.iter().map(String::as_str));
    let output = run_git(repo_path, &args)?;
    ok_or_stderr(output).map(|_| ()).map_err(RepoError::GitUnavailable)
}

/// Unified diff of the worktree against `base`, used for Wiggum's cycle-detection
/// hash. Untracked files are intentionally excluded: cycle detection is about
/// whether the agent produced the same *change*, and an agent that always leaves
/// identical scratch files behind should not be penalized for it.
pub fn unified_diff(repo_path: &Path, base: &str) -> Result<String, RepoError> {
    let output = run_git(repo_path, &["diff", base])?;
    ok_or_stderr(output).map_err(RepoError::GitUnavailable)
}

/// Merge `source_branch` into `target_branch` using `strategy`. On any failure the
/// repository is restored to `target_branch`'s original state before returning
/// `Ok(false)` — the invoking branch must never be left mid-merge (spec.md §4.7
/// invariant).
pub fn merge_branch(
    repo_path: &Path,
    source_branch: &str,
    target_branch: &str,
    strategy: MergeStrategy,
) -> Result<bool, RepoError> {
    let original_branch = current_branch(repo_path)?;

    if strategy == MergeStrategy::Rebase {
        let rebase = run_git(repo_path, &["rebase", target_branch, source_branch])?;
        if !rebase.status.success() {
            run_git(repo_path, &["rebase", "--abort"]).ok();
            restore_branch(repo_path, &original_branch, target_branch);
            return Ok(false);
        }
    }

    let checkout = run_git(repo_path, &["checkout", target_branch])?;
    ok_or_stderr(checkout).map_err(RepoError::GitUnavailable)?;

    let merge_args: Vec<String> = match strategy {
        MergeStrategy::Merge => vec![
            "merge".into(),
            "--no-ff".into(),
            "-m".into(),
            format!("Merge {source_branch} into {target_branch}"),
            source_branch.into(),
        ],
        MergeStrategy::Squash => vec!["merge".into(), "--squash".into(), source_branch.into()],
        MergeStrategy::Rebase => vec!["merge".into(), "--ff-only".into(), source_branch.into()],
    };
    let merge_refs: Vec<&str> = merge_args.iter().map(String::as_str).collect();
    let merge = run_git(repo_path, &merge_refs)?;

    if merge.status.success() {
        if strategy == MergeStrategy::Squash {
            let commit = run_git(
                repo_path,
                &["commit", "-m", &format!("Squash merge {source_branch}")],
            )?;
            if !commit.status.success() {
                run_git(repo_path, &["merge", "--abort"]).ok();
                restore_branch(repo_path, &original_branch, target_branch);
                return Ok(false);
            }
        }
        return Ok(true);
    }

    run_git(repo_path, &["merge", "--abort"]).ok();
    restore_branch(repo_path, &original_branch, target_branch);
    Ok(false)
}

fn restore_branch(repo_path: &Path, original_branch: &str, target_branch: &str) {
    if original_branch != target_branch {
        run_git(repo_path, &["checkout", original_branch]).ok();
    }
}
