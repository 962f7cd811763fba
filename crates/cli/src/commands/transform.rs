//! Transform command implementation.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use graft_engine::{Blackboard, TransformEngine, TransformOutcome};
use graft_plugin::{Classpath, JarEntryRef, StaticHost, discover, discover_jar_entries};
use miette::{IntoDiagnostic, Result, miette};
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::ZipArchive;

use crate::{catalog, output};

#[derive(Debug, Default, PartialEq, Eq)]
struct Counts {
    transformed: usize,
    unchanged: usize,
    bypassed: usize,
    copied: usize,
}

/// Runs the engine over every class under `input`, writing to `output`.
pub fn execute(root: &Path, input: &Path, output: &Path, classpath: &[PathBuf]) -> Result<()> {
    if !input.is_dir() {
        return Err(miette!("Input {} is not a directory", input.display()));
    }

    let classpath = classpath
        .iter()
        .fold(Classpath::new(), |classpath, dir| classpath.with_dir(dir));
    let plugins = discover(&catalog::linked(), &classpath, root)?;
    let jar_entries = discover_jar_entries(&plugins, root)?;

    let board = Blackboard::accept(plugins, Arc::new(StaticHost::new(root)))?;
    let config = board.load_config(root)?;
    let copy_jars = !config.switches.disable_jar_copying;

    let mut engine = TransformEngine::new();
    engine.accept(board, config);

    let mut counts = transform_tree(&engine, input, output)?;
    if copy_jars {
        counts.copied = copy_entries(&jar_entries, output)?;
    } else if !jar_entries.is_empty() {
        info!(entries = jar_entries.len(), "Jar copying disabled, skipping plugin entries");
    }

    output::summary(
        counts.transformed,
        counts.unchanged,
        counts.bypassed,
        counts.copied,
    );
    Ok(())
}

fn transform_tree(engine: &TransformEngine, input: &Path, output: &Path) -> Result<Counts> {
    let mut counts = Counts::default();

    for entry in WalkDir::new(input).sort_by_file_name() {
        let entry = entry.into_diagnostic()?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(input).into_diagnostic()?;
        let destination = output.join(relative);
        create_parent(&destination)?;

        let Some(raw_name) = class_name(relative) else {
            fs::copy(entry.path(), &destination)
                .map_err(|e| miette!("Failed to copy {}: {}", entry.path().display(), e))?;
            continue;
        };
        let canonical_name = raw_name.replace('/', ".");

        let bytes = fs::read(entry.path())
            .map_err(|e| miette!("Failed to read {}: {}", entry.path().display(), e))?;
        let (result, outcome) = engine.transform(&raw_name, &canonical_name, &bytes)?;
        fs::write(&destination, &result)
            .map_err(|e| miette!("Failed to write {}: {}", destination.display(), e))?;

        debug!(class = %canonical_name, outcome = ?outcome, "Processed class");
        match outcome {
            TransformOutcome::Transformed => counts.transformed += 1,
            TransformOutcome::NoOp => counts.unchanged += 1,
            TransformOutcome::Bypassed => counts.bypassed += 1,
        }
    }

    Ok(counts)
}

/// Internal class name of a `.class` path relative to the input directory.
fn class_name(relative: &Path) -> Option<String> {
    if relative.extension()? != "class" {
        return None;
    }
    let stem = relative.with_extension("");
    let mut parts = Vec::new();
    for component in stem.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            _ => return None,
        }
    }
    Some(parts.join("/"))
}

/// Copies attributed archive entries into `output`, opening each archive once.
fn copy_entries(entries: &[JarEntryRef], output: &Path) -> Result<usize> {
    let mut by_archive: BTreeMap<&Path, Vec<&str>> = BTreeMap::new();
    for entry in entries {
        by_archive
            .entry(entry.archive.as_path())
            .or_default()
            .push(entry.entry.as_str());
    }

    let mut copied = 0;
    for (archive_path, names) in by_archive {
        let file = File::open(archive_path)
            .map_err(|e| miette!("Failed to open {}: {}", archive_path.display(), e))?;
        let mut archive = ZipArchive::new(file).into_diagnostic()?;

        for name in names {
            let mut entry = archive.by_name(name).into_diagnostic()?;
            let Some(relative) = entry.enclosed_name() else {
                debug!(entry = %name, "Skipping entry with unsafe path");
                continue;
            };
            let destination = output.join(relative);
            create_parent(&destination)?;

            let mut content = Vec::new();
            entry.read_to_end(&mut content).into_diagnostic()?;
            fs::write(&destination, content)
                .map_err(|e| miette!("Failed to write {}: {}", destination.display(), e))?;
            copied += 1;
        }
    }

    info!(entries = copied, "Copied plugin archive entries");
    Ok(copied)
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| miette!("Failed to create {}: {}", parent.display(), e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use graft_classfile::{AccessFlags, ClassFile, ConstantPool};
    use tempfile::tempdir;
    use zip::write::SimpleFileOptions;

    use super::*;

    fn class_bytes(internal_name: &str) -> Vec<u8> {
        let mut pool = ConstantPool::new();
        let this_class = pool.add_class(internal_name).unwrap();
        let super_class = pool.add_class("java/lang/Object").unwrap();
        ClassFile {
            minor_version: 0,
            major_version: 61,
            constant_pool: pool,
            access: AccessFlags::PUBLIC,
            this_class,
            super_class,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        }
        .to_bytes()
    }

    #[test]
    fn test_class_name_from_relative_path() {
        assert_eq!(
            class_name(Path::new("com/example/Main.class")).as_deref(),
            Some("com/example/Main")
        );
        assert_eq!(class_name(Path::new("Top.class")).as_deref(), Some("Top"));
        assert_eq!(class_name(Path::new("assets/logo.png")), None);
        assert_eq!(class_name(Path::new("../Escape.class")), None);
    }

    #[test]
    fn test_transform_without_plugins_copies_tree() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("root");
        let input = dir.path().join("in");
        let output = dir.path().join("out");
        fs::create_dir_all(input.join("com/example")).unwrap();
        let bytes = class_bytes("com/example/Main");
        fs::write(input.join("com/example/Main.class"), &bytes).unwrap();
        fs::write(input.join("readme.txt"), "hello").unwrap();

        execute(&root, &input, &output, &[]).unwrap();

        assert_eq!(fs::read(output.join("com/example/Main.class")).unwrap(), bytes);
        assert_eq!(fs::read_to_string(output.join("readme.txt")).unwrap(), "hello");
        assert!(root.join("config/graft/environment.json").is_file());
    }

    #[test]
    fn test_copy_entries_writes_attributed_files() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("plugin.jar");
        let mut writer = zip::ZipWriter::new(File::create(&archive).unwrap());
        writer
            .start_file("assets/demo/icon.txt", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"icon").unwrap();
        writer.finish().unwrap();

        let output = dir.path().join("out");
        let copied = copy_entries(
            &[JarEntryRef {
                archive: archive.clone(),
                entry: "assets/demo/icon.txt".into(),
                plugin_id: "demo".into(),
            }],
            &output,
        )
        .unwrap();

        assert_eq!(copied, 1);
        assert_eq!(
            fs::read_to_string(output.join("assets/demo/icon.txt")).unwrap(),
            "icon"
        );
    }
}
