//! Installation root discovery.

use std::path::{Path, PathBuf};

use graft_engine::config::CONFIG_DIR;
use miette::{Result, miette};

/// Uses `explicit` when given, otherwise searches upwards from the current directory.
pub fn resolve(explicit: Option<PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(root) => Ok(root),
        None => find_root_from(&current_dir()?),
    }
}

pub fn current_dir() -> Result<PathBuf> {
    std::env::current_dir().map_err(|e| miette!("Cannot get current directory: {}", e))
}

/// Finds the nearest directory holding `config/graft`, starting at `start`.
pub fn find_root_from(start: &Path) -> Result<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        if current.join(CONFIG_DIR).is_dir() {
            return Ok(current);
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => {
                return Err(miette!(
                    "No Graft installation found in {} or any parent directory. Run 'graft init' first.",
                    start.display()
                ));
            }
        }
    }
}
