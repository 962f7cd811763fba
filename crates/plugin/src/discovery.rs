//! Launch plugin discovery.
//!
//! Plugins come from two sources, in this order: manifest resources on the
//! classpath, then zip archives dropped into `<root>/plugins` and
//! `<root>/launch-plugins`. Both name the plugin's type in
//! `META-INF/graft/launch-plugin`; the [`PluginCatalog`] turns that name into
//! an instance.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;
use zip::ZipArchive;
use zip::result::ZipError;

use crate::catalog::PluginCatalog;
use crate::error::{DiscoveryError, Result};
use crate::plugin::LaunchPlugin;

/// Manifest resource naming a plugin's type.
pub const MANIFEST_PATH: &str = "META-INF/graft/launch-plugin";

/// Directories under the installation root scanned for plugin archives.
pub const ARCHIVE_DIRS: [&str; 2] = ["plugins", "launch-plugins"];

/// Where a plugin was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginOrigin {
    /// Classpath directory holding the manifest.
    Classpath(PathBuf),
    /// Archive holding the manifest.
    Archive(PathBuf),
}

impl PluginOrigin {
    pub fn path(&self) -> &Path {
        match self {
            PluginOrigin::Classpath(path) | PluginOrigin::Archive(path) => path,
        }
    }
}

impl fmt::Display for PluginOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginOrigin::Classpath(path) => write!(f, "classpath {}", path.display()),
            PluginOrigin::Archive(path) => write!(f, "archive {}", path.display()),
        }
    }
}

/// A plugin instance and where it came from.
#[derive(Debug)]
pub struct DiscoveredPlugin {
    pub plugin: Box<dyn LaunchPlugin>,
    pub type_name: String,
    pub origin: PluginOrigin,
}

impl DiscoveredPlugin {
    /// `<plugin name> (<origin>)`, used in duplicate reports.
    pub fn describe(&self) -> String {
        format!("{} ({})", self.plugin.metadata().name(), self.origin)
    }
}

/// An archive whose manifest names a plugin type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveManifest {
    pub archive: PathBuf,
    pub type_name: String,
}

/// An archive entry attributed to a plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JarEntryRef {
    pub archive: PathBuf,
    pub entry: String,
    pub plugin_id: String,
}

/// Ordered classpath directories searched for the manifest resource.
#[derive(Debug, Clone, Default)]
pub struct Classpath {
    dirs: Vec<PathBuf>,
}

impl Classpath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dirs.push(dir.into());
        self
    }

    pub fn push(&mut self, dir: impl Into<PathBuf>) {
        self.dirs.push(dir.into());
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Every type name listed by the manifests on this classpath, with its directory.
    pub fn manifest_entries(&self) -> Result<Vec<(PathBuf, String)>> {
        let mut entries = Vec::new();
        for dir in &self.dirs {
            let manifest = dir.join(MANIFEST_PATH);
            if !manifest.is_file() {
                continue;
            }
            let content = fs::read_to_string(&manifest).map_err(|source| DiscoveryError::Io {
                path: manifest.clone(),
                source,
            })?;
            for line in content.lines().map(str::trim) {
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                entries.push((dir.clone(), line.to_string()));
            }
        }
        Ok(entries)
    }
}

/// Discovers plugins from the classpath, then from archives under `root`.
pub fn discover(
    catalog: &PluginCatalog,
    classpath: &Classpath,
    root: &Path,
) -> Result<Vec<DiscoveredPlugin>> {
    let mut discovered = Vec::new();

    for (dir, type_name) in classpath.manifest_entries()? {
        let origin = PluginOrigin::Classpath(dir);
        discovered.push(instantiate(catalog, type_name, origin)?);
    }

    for manifest in scan_archives(root)? {
        let origin = PluginOrigin::Archive(manifest.archive);
        discovered.push(instantiate(catalog, manifest.type_name, origin)?);
    }

    info!(count = discovered.len(), "Discovered launch plugins");
    Ok(discovered)
}

fn instantiate(
    catalog: &PluginCatalog,
    type_name: String,
    origin: PluginOrigin,
) -> Result<DiscoveredPlugin> {
    let Some(plugin) = catalog.instantiate(&type_name) else {
        return Err(DiscoveryError::UnknownPluginType {
            type_name,
            origin: origin.to_string(),
        });
    };
    debug!(
        plugin_id = %plugin.metadata().id(),
        type_name = %type_name,
        origin = %origin,
        "Instantiated launch plugin"
    );
    Ok(DiscoveredPlugin {
        plugin,
        type_name,
        origin,
    })
}

/// Regular files directly in, or one directory below, the archive directories.
pub fn candidate_archives(root: &Path) -> Result<Vec<PathBuf>> {
    let mut candidates = Vec::new();
    for name in ARCHIVE_DIRS {
        let dir = root.join(name);
        if !dir.is_dir() {
            continue;
        }
        let mut found = Vec::new();
        for entry in WalkDir::new(&dir).min_depth(1).max_depth(2) {
            let entry = entry.map_err(|e| DiscoveryError::Io {
                path: e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.clone()),
                source: io::Error::from(e),
            })?;
            if entry.file_type().is_file() {
                found.push(entry.into_path());
            }
        }
        found.sort();
        candidates.extend(found);
    }
    Ok(candidates)
}

/// Opens `path` as a zip archive; `None` when it is empty or not an archive.
fn open_archive(path: &Path) -> Result<Option<ZipArchive<File>>> {
    let io_error = |source| DiscoveryError::Io {
        path: path.to_path_buf(),
        source,
    };

    if fs::metadata(path).map_err(io_error)?.len() == 0 {
        debug!(path = %path.display(), "Skipping empty file");
        return Ok(None);
    }

    let file = File::open(path).map_err(io_error)?;
    match ZipArchive::new(file) {
        Ok(archive) => Ok(Some(archive)),
        Err(ZipError::Io(source)) if source.kind() != io::ErrorKind::UnexpectedEof => {
            Err(io_error(source))
        }
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Skipping non-archive file");
            Ok(None)
        }
    }
}

/// Archives under `root` carrying a plugin manifest, with the type each declares.
pub fn scan_archives(root: &Path) -> Result<Vec<ArchiveManifest>> {
    let mut manifests = Vec::new();

    for path in candidate_archives(root)? {
        let Some(mut archive) = open_archive(&path)? else {
            continue;
        };

        let content = match archive.by_name(MANIFEST_PATH) {
            Ok(mut entry) => {
                let mut content = String::new();
                entry
                    .read_to_string(&mut content)
                    .map_err(|source| DiscoveryError::Io {
                        path: path.clone(),
                        source,
                    })?;
                content
            }
            Err(ZipError::FileNotFound) => {
                debug!(path = %path.display(), "Skipping archive without plugin manifest");
                continue;
            }
            Err(e) => {
                return Err(DiscoveryError::Archive {
                    path,
                    reason: e.to_string(),
                });
            }
        };

        match content.lines().map(str::trim).find(|l| !l.is_empty()) {
            Some(type_name) => manifests.push(ArchiveManifest {
                archive: path,
                type_name: type_name.to_string(),
            }),
            None => debug!(path = %path.display(), "Skipping archive with empty plugin manifest"),
        }
    }

    Ok(manifests)
}

/// Entry prefixes owned by one plugin.
fn owned_prefixes(plugin: &dyn LaunchPlugin) -> Vec<String> {
    let id = plugin.metadata().id();
    let mut prefixes: Vec<String> = plugin
        .root_packages()
        .iter()
        .map(|package| format!("{}/", package.trim_end_matches('.').replace('.', "/")))
        .collect();
    prefixes.push(format!("assets/{id}/"));
    prefixes.push(format!("data/{id}/"));
    prefixes.push(format!("META-INF/graft/{id}/"));
    prefixes
}

/// Lists entries of every archive under `root` that belong to a discovered plugin.
///
/// An entry belongs to the first plugin, in discovery order, whose root
/// package or resource directory prefixes its path.
pub fn discover_jar_entries(plugins: &[DiscoveredPlugin], root: &Path) -> Result<Vec<JarEntryRef>> {
    let owners: Vec<(String, Vec<String>)> = plugins
        .iter()
        .map(|p| (p.plugin.metadata().id().to_string(), owned_prefixes(p.plugin.as_ref())))
        .collect();

    let mut entries = Vec::new();
    if owners.is_empty() {
        return Ok(entries);
    }

    for path in candidate_archives(root)? {
        let Some(archive) = open_archive(&path)? else {
            continue;
        };
        for name in archive.file_names() {
            if name.ends_with('/') {
                continue;
            }
            let owner = owners
                .iter()
                .find(|(_, prefixes)| prefixes.iter().any(|prefix| name.starts_with(prefix)));
            if let Some((plugin_id, _)) = owner {
                entries.push(JarEntryRef {
                    archive: path.clone(),
                    entry: name.to_string(),
                    plugin_id: plugin_id.clone(),
                });
            }
        }
    }

    Ok(entries)
}
