//! Configuration documents under `<root>/config/graft/`.
//!
//! - `environment.json` holds the three environment switches.
//! - `transformers.json` maps transformer registry names to enable flags.
//! - `plugins/<id>/<name>.json` holds one transformer's own settings.
//!
//! Missing documents and missing keys are filled with defaults and written
//! back; documents that already match are never rewritten.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use graft_plugin::Transformer;
use serde_json::{Map, Value, json};
use tracing::{debug, info};

use crate::blackboard::Blackboard;
use crate::error::{RegistryError, Result};

/// Directory holding all configuration documents, relative to the root.
pub const CONFIG_DIR: &str = "config/graft";

/// Directory receiving dumped classes, relative to the root.
pub const DUMP_DIR: &str = ".graft/dump";

const ENVIRONMENT_FILE: &str = "environment.json";
const TRANSFORMERS_FILE: &str = "transformers.json";
const PLUGINS_DIR: &str = "plugins";

const SWITCH_COMMENT: &str = "dump: write every rewritten class to .graft/dump. \
emergency_mode: skip all transformation and return classes untouched. \
disable_jar_copying: do not copy plugin archive entries into the output.";

/// The three boolean switches of `environment.json`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnvironmentSwitches {
    pub dump: bool,
    pub emergency_mode: bool,
    pub disable_jar_copying: bool,
}

/// Everything the engine needs from the configuration directory.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub switches: EnvironmentSwitches,
    /// Enable flag per transformer registry name.
    pub flags: HashMap<String, bool>,
    pub dump_root: PathBuf,
}

impl EngineConfig {
    /// Whether `transformer` runs, falling back to its default.
    pub fn is_enabled(&self, transformer: &dyn Transformer) -> bool {
        let data = transformer.data();
        self.flags
            .get(&data.registry_name())
            .copied()
            .unwrap_or(data.enabled_by_default())
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> RegistryError + '_ {
    move |source| RegistryError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn config_error(path: &Path, reason: impl ToString) -> RegistryError {
    RegistryError::Config {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Reads a JSON document; `None` when the file does not exist.
fn read_document(path: &Path) -> Result<Option<Value>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path).map_err(io_error(path))?;
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| config_error(path, e))
}

fn write_document(path: &Path, document: &Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    let mut content = serde_json::to_string_pretty(document).map_err(|e| config_error(path, e))?;
    content.push('\n');
    fs::write(path, content).map_err(io_error(path))?;
    debug!(path = %path.display(), "Wrote configuration document");
    Ok(())
}

/// Loads `environment.json`, adding missing switches as `false`.
pub fn load_switches(config_dir: &Path) -> Result<EnvironmentSwitches> {
    let path = config_dir.join(ENVIRONMENT_FILE);
    let existing = read_document(&path)?;
    let mut dirty = existing.is_none();

    let mut document = match existing {
        Some(Value::Object(map)) => map,
        Some(_) => return Err(config_error(&path, "expected a JSON object")),
        None => Map::new(),
    };

    if !document.contains_key("_comment") {
        document.insert("_comment".into(), Value::String(SWITCH_COMMENT.into()));
        dirty = true;
    }

    let mut switch = |name: &str| -> Result<bool> {
        match document.get(name) {
            Some(value) => value
                .get("enabled")
                .and_then(Value::as_bool)
                .ok_or_else(|| config_error(&path, format!("'{name}.enabled' must be a boolean"))),
            None => {
                document.insert(name.into(), json!({ "enabled": false }));
                dirty = true;
                Ok(false)
            }
        }
    };

    let switches = EnvironmentSwitches {
        dump: switch("dump")?,
        emergency_mode: switch("emergency_mode")?,
        disable_jar_copying: switch("disable_jar_copying")?,
    };

    if dirty {
        write_document(&path, &Value::Object(document))?;
    }
    Ok(switches)
}

/// Loads `transformers.json`, adding each unknown transformer with its default.
pub fn load_flags<'a>(
    config_dir: &Path,
    transformers: impl IntoIterator<Item = &'a dyn Transformer>,
) -> Result<HashMap<String, bool>> {
    let path = config_dir.join(TRANSFORMERS_FILE);
    let existing = read_document(&path)?;
    let mut dirty = existing.is_none();

    let mut flags: BTreeMap<String, bool> = match existing {
        Some(document) => serde_json::from_value(document).map_err(|e| config_error(&path, e))?,
        None => BTreeMap::new(),
    };

    for transformer in transformers {
        let data = transformer.data();
        flags.entry(data.registry_name()).or_insert_with(|| {
            dirty = true;
            data.enabled_by_default()
        });
    }

    if dirty {
        let document = serde_json::to_value(&flags).map_err(|e| config_error(&path, e))?;
        write_document(&path, &document)?;
    }
    Ok(flags.into_iter().collect())
}

/// Loads or creates one transformer's settings document.
pub fn load_transformer_config(config_dir: &Path, transformer: &dyn Transformer) -> Result<()> {
    let Some(configuration) = transformer.configuration() else {
        return Ok(());
    };
    let data = transformer.data();
    let path = config_dir
        .join(PLUGINS_DIR)
        .join(data.plugin_id())
        .join(format!("{}.json", data.name()));

    match read_document(&path)? {
        None => {
            let defaults = configuration.defaults().map_err(|e| config_error(&path, e))?;
            configuration
                .deserialize(&defaults)
                .map_err(|e| config_error(&path, e))?;
            write_document(&path, &defaults)?;
            info!(transformer = %data, path = %path.display(), "Created transformer configuration");
        }
        Some(document) => {
            configuration
                .deserialize(&document)
                .map_err(|e| config_error(&path, e))?;
            let serialized = configuration.serialize().map_err(|e| config_error(&path, e))?;
            if serialized != document {
                write_document(&path, &serialized)?;
                debug!(transformer = %data, "Updated transformer configuration");
            }
        }
    }
    Ok(())
}

/// Loads every document for `blackboard` under `root`.
pub fn load_config(blackboard: &Blackboard, root: &Path) -> Result<EngineConfig> {
    let config_dir = root.join(CONFIG_DIR);
    fs::create_dir_all(&config_dir).map_err(io_error(&config_dir))?;

    for plugin in blackboard.plugins() {
        if plugin.transformers().is_empty() {
            continue;
        }
        let dir = config_dir.join(PLUGINS_DIR).join(plugin.id());
        fs::create_dir_all(&dir).map_err(io_error(&dir))?;
    }

    let switches = load_switches(&config_dir)?;
    let flags = load_flags(
        &config_dir,
        blackboard.transformers().iter().map(|t| t.as_ref()),
    )?;
    for transformer in blackboard.transformers() {
        load_transformer_config(&config_dir, transformer.as_ref())?;
    }

    info!(
        dump = switches.dump,
        emergency_mode = switches.emergency_mode,
        transformers = flags.len(),
        "Loaded configuration"
    );

    Ok(EngineConfig {
        switches,
        flags,
        dump_root: root.join(DUMP_DIR),
    })
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_missing_environment_document_created_with_false() {
        let dir = tempdir().unwrap();
        let switches = load_switches(dir.path()).unwrap();
        assert_eq!(switches, EnvironmentSwitches::default());

        let written: Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join(ENVIRONMENT_FILE)).unwrap())
                .unwrap();
        assert_eq!(written["dump"]["enabled"], json!(false));
        assert_eq!(written["emergency_mode"]["enabled"], json!(false));
        assert_eq!(written["disable_jar_copying"]["enabled"], json!(false));
        assert!(written["_comment"].is_string());
    }

    #[test]
    fn test_missing_keys_populated_and_existing_kept() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(ENVIRONMENT_FILE);
        fs::write(&path, r#"{ "emergency_mode": { "enabled": true } }"#).unwrap();

        let switches = load_switches(dir.path()).unwrap();
        assert!(switches.emergency_mode);
        assert!(!switches.dump);

        let written: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["emergency_mode"]["enabled"], json!(true));
        assert_eq!(written["dump"]["enabled"], json!(false));
    }

    #[test]
    fn test_complete_document_not_rewritten() {
        let dir = tempdir().unwrap();
        load_switches(dir.path()).unwrap();
        let path = dir.path().join(ENVIRONMENT_FILE);

        let custom = r#"{"_comment":"x","dump":{"enabled":true},"emergency_mode":{"enabled":false},"disable_jar_copying":{"enabled":false}}"#;
        fs::write(&path, custom).unwrap();
        let switches = load_switches(dir.path()).unwrap();
        assert!(switches.dump);
        assert_eq!(fs::read_to_string(&path).unwrap(), custom);
    }

    #[test]
    fn test_non_boolean_switch_rejected() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(ENVIRONMENT_FILE),
            r#"{ "dump": { "enabled": "yes" } }"#,
        )
        .unwrap();
        assert!(matches!(
            load_switches(dir.path()),
            Err(RegistryError::Config { .. })
        ));
    }
}
