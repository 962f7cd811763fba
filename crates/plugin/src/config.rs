//! Transformer settings as JSON documents.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::ConfigError;

type Serializer = Box<dyn Fn() -> Result<Value, ConfigError> + Send + Sync>;
type Deserializer = Box<dyn Fn(&Value) -> Result<(), ConfigError> + Send + Sync>;
type DefaultsProvider = Box<dyn Fn(&mut Map<String, Value>) -> Result<(), ConfigError> + Send + Sync>;

/// How a transformer's settings round-trip to a JSON document.
///
/// The framework owns the file; the triple owns its shape. On first run the
/// defaults provider fills an empty object which is persisted as-is. On later
/// runs the deserializer consumes the stored document and the serializer's
/// output is written back only if it differs.
pub struct TransformerConfiguration {
    serializer: Serializer,
    deserializer: Deserializer,
    defaults: DefaultsProvider,
}

impl TransformerConfiguration {
    pub fn new(
        serializer: impl Fn() -> Result<Value, ConfigError> + Send + Sync + 'static,
        deserializer: impl Fn(&Value) -> Result<(), ConfigError> + Send + Sync + 'static,
        defaults: impl Fn(&mut Map<String, Value>) -> Result<(), ConfigError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            serializer: Box::new(serializer),
            deserializer: Box::new(deserializer),
            defaults: Box::new(defaults),
        }
    }

    /// Builds the triple for a settings struct shared with the transformer.
    ///
    /// Fields missing from a stored document take their `Default` values when
    /// the settings type uses `#[serde(default)]`.
    pub fn typed<T>(settings: Arc<RwLock<T>>) -> Self
    where
        T: Serialize + DeserializeOwned + Default + Send + Sync + 'static,
    {
        let read = Arc::clone(&settings);
        let write = settings;

        Self::new(
            move || Ok(serde_json::to_value(&*read.read())?),
            move |document| {
                let value: T = serde_json::from_value(document.clone())?;
                *write.write() = value;
                Ok(())
            },
            |skeleton| match serde_json::to_value(T::default())? {
                Value::Object(defaults) => {
                    skeleton.extend(defaults);
                    Ok(())
                }
                _ => Err(ConfigError::NotAnObject),
            },
        )
    }

    pub fn serialize(&self) -> Result<Value, ConfigError> {
        (self.serializer)()
    }

    pub fn deserialize(&self, document: &Value) -> Result<(), ConfigError> {
        if !document.is_object() {
            return Err(ConfigError::NotAnObject);
        }
        (self.deserializer)(document)
    }

    /// The first-run document.
    pub fn defaults(&self) -> Result<Value, ConfigError> {
        let mut skeleton = Map::new();
        (self.defaults)(&mut skeleton)?;
        Ok(Value::Object(skeleton))
    }
}

impl std::fmt::Debug for TransformerConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformerConfiguration").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct Settings {
        limit: u32,
        verbose: bool,
    }

    impl Default for Settings {
        fn default() -> Self {
            Self {
                limit: 8,
                verbose: false,
            }
        }
    }

    #[test]
    fn test_typed_defaults() {
        let settings = Arc::new(RwLock::new(Settings::default()));
        let config = TransformerConfiguration::typed(settings);
        assert_eq!(
            config.defaults().unwrap(),
            json!({ "limit": 8, "verbose": false })
        );
    }

    #[test]
    fn test_typed_deserialize_updates_shared_settings() {
        let settings = Arc::new(RwLock::new(Settings::default()));
        let config = TransformerConfiguration::typed(Arc::clone(&settings));

        config.deserialize(&json!({ "limit": 32 })).unwrap();
        assert_eq!(settings.read().limit, 32);
        assert!(!settings.read().verbose);
        assert_eq!(
            config.serialize().unwrap(),
            json!({ "limit": 32, "verbose": false })
        );
    }

    #[test]
    fn test_non_object_document_rejected() {
        let config = TransformerConfiguration::typed(Arc::new(RwLock::new(Settings::default())));
        assert!(matches!(
            config.deserialize(&json!([1, 2])),
            Err(ConfigError::NotAnObject)
        ));
    }

    #[test]
    fn test_closure_triple() {
        let config = TransformerConfiguration::new(
            || Ok(json!({ "mode": "strict" })),
            |_| Ok(()),
            |skeleton| {
                skeleton.insert("mode".into(), json!("strict"));
                Ok(())
            },
        );
        assert_eq!(config.defaults().unwrap(), config.serialize().unwrap());
    }

    #[derive(Default, Deserialize)]
    struct Unwritable;

    impl Serialize for Unwritable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("settings cannot be written"))
        }
    }

    #[derive(Default, Serialize, Deserialize)]
    struct Level(u32);

    #[test]
    fn test_typed_defaults_report_failures() {
        let unwritable = TransformerConfiguration::typed(Arc::new(RwLock::new(Unwritable)));
        assert!(matches!(unwritable.defaults(), Err(ConfigError::Document(_))));

        let scalar = TransformerConfiguration::typed(Arc::new(RwLock::new(Level::default())));
        assert!(matches!(scalar.defaults(), Err(ConfigError::NotAnObject)));
    }
}
