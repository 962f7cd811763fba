//! Graft Engine - plugin registry and class transformation engine.
//!
//! A host discovers plugins, builds a [`Blackboard`] from them, loads the
//! [`EngineConfig`] and hands both to a [`TransformEngine`], which then
//! rewrites class bytes on request.

mod blackboard;
pub mod config;
mod engine;
mod error;

pub use blackboard::{Blackboard, RegisteredPlugin};
pub use config::{EngineConfig, EnvironmentSwitches};
pub use engine::{EngineState, MARKER_NAME, TransformEngine, TransformOutcome};
pub use error::{EngineError, RegistryError, Result};
