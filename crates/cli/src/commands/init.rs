//! Init command implementation.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use graft_engine::Blackboard;
use graft_engine::config::CONFIG_DIR;
use graft_plugin::StaticHost;
use graft_plugin::discovery::ARCHIVE_DIRS;
use miette::{Result, miette};

use crate::{output, root};

/// Writes the default configuration documents under `root`.
pub fn execute(root: Option<PathBuf>) -> Result<()> {
    let root = match root {
        Some(root) => root,
        None => root::current_dir()?,
    };

    let board = Blackboard::accept(Vec::new(), Arc::new(StaticHost::new(&root)))?;
    let config = board.load_config(&root)?;

    for name in ARCHIVE_DIRS {
        let dir = root.join(name);
        fs::create_dir_all(&dir)
            .map_err(|e| miette!("Failed to create {}: {}", dir.display(), e))?;
    }

    output::success(&format!("Initialized {}", root.join(CONFIG_DIR).display()));
    output::key_value("dump", &config.switches.dump.to_string());
    output::key_value("emergency_mode", &config.switches.emergency_mode.to_string());
    output::key_value(
        "disable_jar_copying",
        &config.switches.disable_jar_copying.to_string(),
    );
    output::info("Drop plugin archives into plugins/ and run 'graft discover'");

    Ok(())
}
