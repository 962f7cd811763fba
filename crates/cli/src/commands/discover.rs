//! Discover command implementation.

use std::path::{Path, PathBuf};

use console::style;
use graft_plugin::discovery::scan_archives;
use graft_plugin::{Classpath, DiscoveredPlugin, PluginOrigin, discover_jar_entries};
use miette::Result;

use crate::{catalog, output};

/// Lists plugin manifests, which of them this binary can load, and the
/// archive entries attributed to the loadable ones.
pub fn execute(root: &Path, classpath: &[PathBuf]) -> Result<()> {
    let catalog = catalog::linked();
    let classpath = classpath
        .iter()
        .fold(Classpath::new(), |classpath, dir| classpath.with_dir(dir));

    let status = |type_name: &str| {
        if catalog.contains(type_name) {
            style("linked").green()
        } else {
            style("not linked").yellow()
        }
    };

    if !classpath.dirs().is_empty() {
        output::section_header("Classpath manifests");
        for (dir, type_name) in classpath.manifest_entries()? {
            output::list_item(&format!(
                "{} {} {}",
                type_name,
                style(dir.display()).dim(),
                status(&type_name)
            ));
        }
    }

    output::section_header("Plugin archives");
    let manifests = scan_archives(root)?;
    if manifests.is_empty() {
        output::info(&format!("No plugin archives under {}", root.display()));
        return Ok(());
    }

    let mut loadable = Vec::new();
    for manifest in manifests {
        output::list_item(&format!(
            "{} {} {}",
            manifest.type_name,
            style(manifest.archive.display()).dim(),
            status(&manifest.type_name)
        ));
        if let Some(plugin) = catalog.instantiate(&manifest.type_name) {
            loadable.push(DiscoveredPlugin {
                plugin,
                type_name: manifest.type_name,
                origin: PluginOrigin::Archive(manifest.archive),
            });
        }
    }

    if loadable.is_empty() {
        output::warning("No archive declares a plugin linked into this binary");
        return Ok(());
    }

    output::section_header("Attributed entries");
    for entry in discover_jar_entries(&loadable, root)? {
        output::key_value(
            &entry.plugin_id,
            &format!("{}!{}", entry.archive.display(), entry.entry),
        );
    }

    Ok(())
}
