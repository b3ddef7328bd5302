//! CLI command implementations, one module per subcommand family (spec.md §6).
//! Each function takes the resolved `project_dir` and returns `anyhow::Result<()>`
//! so `main` can aggregate every component error behind one exit-code mapping,
//! matching the shape of plain `cmd_*` functions.

pub mod analyze;
pub mod closeout;
pub mod czar_run;
pub mod daemon;
pub mod hopper;
pub mod init;
pub mod launch;
pub mod phase;
pub mod status;
pub mod wiggum;
pub mod worker;

use crate::config::Config;
use crate::repo::RepoLayout;
use anyhow::{Context, Result};
use std::path::Path;

/// Load `config.json` and build the `RepoLayout` it describes. Most subcommands
/// besides `init`/`analyze` need both together.
pub fn load(project_dir: &Path) -> Result<(Config, RepoLayout)> {
    let config_path = crate::config::find_config_path(project_dir);
    let config = Config::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let layout = RepoLayout::for_config(project_dir, &config);
    Ok((config, layout))
}
