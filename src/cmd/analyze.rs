//! `czarina analyze <plan> [--interactive] [--init] [--force]` (spec.md §6, §9
//! "Two-pass interactive analysis"). The plan-to-config reasoning itself is an
//! external collaborator (spec.md §1 Non-goals); the core's job is only the
//! file-based handoff protocol so a non-interactive driver never blocks on stdin.

use crate::config::Config;
use anyhow::{Context, Result};
use std::path::Path;

const PROMPT_FILE: &str = ".czarina-analysis-prompt.md";
const RESPONSE_FILE: &str = ".czarina-analysis-response.json";

/// First invocation: no response file yet, so write the analysis prompt and return.
/// Second invocation: a response file is present, so consume it (optionally running
/// `init` against the config it describes). Idempotent given the same inputs.
pub fn run(project_dir: &Path, plan: &Path, interactive: bool, init: bool, force: bool) -> Result<()> {
    let response_path = project_dir.join(RESPONSE_FILE);
    if response_path.exists() {
        return consume_response(project_dir, &response_path, init, force);
    }
    write_prompt(project_dir, plan, interactive)
}

fn write_prompt(project_dir: &Path, plan: &Path, interactive: bool) -> Result<()> {
    let plan_text = std::fs::read_to_string(plan)
        .with_context(|| format!("reading plan {}", plan.display()))?;
    let prompt_path = project_dir.join(PROMPT_FILE);
    let mode = if interactive { "interactive" } else { "non-interactive" };
    let body = format!(
        "# Czarina analysis request ({mode})\n\n\
         Read the plan below and propose a `config.json` (schema per the external \
         interfaces section) describing the phase's workers, their dependencies, and \
         branch names. Write the answer to `{RESPONSE_FILE}` in the project directory.\n\n\
         ---\n\n{plan_text}\n"
    );
    std::fs::write(&prompt_path, body)
        .with_context(|| format!("writing {}", prompt_path.display()))?;
    println!("Wrote analysis prompt to {}", prompt_path.display());
    println!("Produce {RESPONSE_FILE} from it, then re-run `czarina analyze` to consume it.");
    Ok(())
}

fn consume_response(project_dir: &Path, response_path: &Path, init: bool, force: bool) -> Result<()> {
    let text = std::fs::read_to_string(response_path)
        .with_context(|| format!("reading {}", response_path.display()))?;
    let config: Config = serde_json::from_str(&text)
        .with_context(|| format!("{} does not describe a valid config.json", response_path.display()))?;
    config.validate()?;

    if init {
        let config_path = project_dir.join(".czarina").join("config.json");
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        config.save(&config_path)?;
        super::init::run(project_dir, Some(config.project.phase), force)?;
    } else {
        println!(
            "Analysis response consumed: {} workers for phase {}. Pass --init to apply it.",
            config.workers.len(),
            config.project.phase
        );
    }

    std::fs::remove_file(response_path).ok();
    std::fs::remove_file(project_dir.join(PROMPT_FILE)).ok();
    Ok(())
}
