//! End-to-end CLI tests driving the `czarina` binary via `assert_cmd`, exercising
//! the file-on-disk contracts (`.czarina/config.json`, worker prompts, archived
//! phases) rather than internal APIs.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn czarina() -> Command {
    cargo_bin_cmd!("czarina")
}

fn write_config(dir: &TempDir, extra_workers: &str) {
    let config = format!(
        r#"{{
  "project": {{
    "name": "Demo",
    "slug": "demo",
    "repository": "{}",
    "version": "0.1.0",
    "phase": 1,
    "omnibus_branch": "cz1/release/v0.1.0"
  }},
  "workers": [
    {{ "id": "alice", "agent": "claude", "branch": "cz1/feat/alice" }}{}
  ]
}}"#,
        dir.path().display().replace('\\', "\\\\"),
        extra_workers
    );
    fs::create_dir_all(dir.path().join(".czarina")).unwrap();
    fs::write(dir.path().join(".czarina").join("config.json"), config).unwrap();
}

fn init_git_repo(dir: &TempDir) {
    let run = |args: &[&str]| {
        std::process::Command::new("git")
            .args(args)
            .current_dir(dir.path())
            .output()
            .unwrap();
    };
    run(&["init"]);
    run(&["config", "user.email", "test@example.com"]);
    run(&["config", "user.name", "Test"]);
    fs::write(dir.path().join("README.md"), "demo\n").unwrap();
    run(&["add", "."]);
    run(&["commit", "-m", "initial"]);
}

mod cli_basics {
    use super::*;

    #[test]
    fn help_and_version_succeed() {
        czarina().arg("--help").assert().success();
        czarina().arg("--version").assert().success();
    }

    #[test]
    fn init_creates_directory_structure() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "");

        czarina()
            .current_dir(dir.path())
            .args(["init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Initialized czarina project"));

        assert!(dir.path().join(".czarina/workers").exists());
        assert!(dir.path().join(".czarina/logs").exists());
        assert!(dir.path().join(".czarina/hopper").exists());
        assert!(dir.path().join(".czarina/phase-hopper/todo").exists());
    }

    #[test]
    fn init_is_idempotent_when_workers_dir_stays_empty() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "");

        czarina().current_dir(dir.path()).arg("init").assert().success();
        czarina()
            .current_dir(dir.path())
            .arg("init")
            .assert()
            .success()
            .stdout(predicate::str::contains("Re-initialized"));
    }

    #[test]
    fn init_refuses_reinit_over_nonempty_workers_without_force() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "");
        czarina().current_dir(dir.path()).arg("init").assert().success();

        fs::write(dir.path().join(".czarina/workers/alice.md"), "in progress").unwrap();

        czarina()
            .current_dir(dir.path())
            .arg("init")
            .assert()
            .failure()
            .stderr(predicate::str::contains("--force"));

        czarina()
            .current_dir(dir.path())
            .args(["init", "--force"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Forced re-init"));
    }

    #[test]
    fn status_reports_unknown_workers_before_any_launch() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "");
        czarina().current_dir(dir.path()).arg("init").assert().success();

        czarina()
            .current_dir(dir.path())
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("alice"))
            .stdout(predicate::str::contains("Daemon:   stopped"));
    }
}

mod hopper {
    use super::*;

    #[test]
    fn add_then_list_project_tier_shows_item() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "");
        czarina().current_dir(dir.path()).arg("init").assert().success();

        let item_path = dir.path().join("fix-flaky-test.md");
        fs::write(&item_path, "**Priority:** High\n**Complexity:** Small\n\nFix it.\n").unwrap();

        czarina()
            .current_dir(dir.path())
            .args(["hopper", "add"])
            .arg(&item_path)
            .assert()
            .success();

        czarina()
            .current_dir(dir.path())
            .args(["hopper", "list", "project"])
            .assert()
            .success()
            .stdout(predicate::str::contains("fix-flaky-test.md"))
            .stdout(predicate::str::contains("High"));
    }

    #[test]
    fn pull_moves_item_into_phase_todo() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "");
        czarina().current_dir(dir.path()).arg("init").assert().success();

        let item_path = dir.path().join("task.md");
        fs::write(&item_path, "**Priority:** Medium\n**Complexity:** Small\n").unwrap();
        czarina()
            .current_dir(dir.path())
            .args(["hopper", "add"])
            .arg(&item_path)
            .assert()
            .success();

        czarina()
            .current_dir(dir.path())
            .args(["hopper", "pull", "task.md"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Pulled"));

        assert!(dir.path().join(".czarina/phase-hopper/todo/task.md").exists());
        assert!(!dir.path().join(".czarina/hopper/task.md").exists());
    }

    #[test]
    fn defer_moves_item_back_to_project_tier() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "");
        czarina().current_dir(dir.path()).arg("init").assert().success();

        fs::create_dir_all(dir.path().join(".czarina/phase-hopper/todo")).unwrap();
        fs::write(dir.path().join(".czarina/phase-hopper/todo/later.md"), "content").unwrap();

        czarina()
            .current_dir(dir.path())
            .args(["hopper", "defer", "later.md"])
            .assert()
            .success();

        assert!(dir.path().join(".czarina/hopper/later.md").exists());
    }
}

mod phase_lifecycle {
    use super::*;

    #[test]
    fn phase_list_is_empty_before_any_close() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "");
        czarina().current_dir(dir.path()).arg("init").assert().success();

        czarina()
            .current_dir(dir.path())
            .args(["phase", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No archived phases"));
    }

    #[test]
    fn phase_close_archives_and_empties_workers_dir() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "");
        init_git_repo(&dir);
        czarina().current_dir(dir.path()).arg("init").assert().success();

        czarina()
            .current_dir(dir.path())
            .args(["--yes", "phase", "close", "--force-clean"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Archived phase 1"));

        czarina()
            .current_dir(dir.path())
            .args(["phase", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("phase-1-v0.1.0"));
    }
}

mod dependency_validation {
    use super::*;

    /// spec.md §8 scenario S4: a dependency cycle must fail validation with exit
    /// code 2 before any session is started.
    #[test]
    fn launch_fails_before_touching_git_when_workers_depend_cyclically() {
        let dir = TempDir::new().unwrap();
        init_git_repo(&dir);
        let config = format!(
            r#"{{
  "project": {{
    "name": "Demo",
    "slug": "demo",
    "repository": "{}",
    "version": "0.1.0",
    "phase": 1,
    "omnibus_branch": "cz1/release/v0.1.0"
  }},
  "workers": [
    {{ "id": "a", "agent": "claude", "branch": "cz1/feat/a", "dependencies": ["b"] }},
    {{ "id": "b", "agent": "claude", "branch": "cz1/feat/b", "dependencies": ["a"] }}
  ]
}}"#,
            dir.path().display().replace('\\', "\\\\")
        );
        fs::create_dir_all(dir.path().join(".czarina")).unwrap();
        fs::write(dir.path().join(".czarina").join("config.json"), config).unwrap();

        czarina().current_dir(dir.path()).arg("init").assert().code(2);

        czarina()
            .current_dir(dir.path())
            .arg("launch")
            .assert()
            .code(2)
            .stderr(predicate::str::contains("cycle"));

        assert!(!dir.path().join(".czarina/worktrees/a").exists());
        assert!(!dir.path().join(".czarina/worktrees/b").exists());
    }
}

mod closeout {
    use super::*;

    #[test]
    fn closeout_removes_the_control_plane_directory() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "");
        init_git_repo(&dir);
        czarina().current_dir(dir.path()).arg("init").assert().success();

        czarina()
            .current_dir(dir.path())
            .args(["--yes", "closeout"])
            .assert()
            .success()
            .stdout(predicate::str::contains("torn down"));

        assert!(!dir.path().join(".czarina").exists());
    }
}
