//! Dispatching class bytes through the accepted transformers.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use graft_classfile::{ClassFile, TRANSFORMED_MARKER};
use graft_core::ClassDescriptor;
use graft_plugin::{TransformError, Transformer};
use once_cell::sync::OnceCell;
use tracing::{debug, error, trace, warn};

use crate::blackboard::Blackboard;
use crate::config::EngineConfig;
use crate::error::EngineError;

/// Registry name reported for the implicit marker pass.
pub const MARKER_NAME: &str = "graft:marker";

/// What happened to one class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformOutcome {
    /// Emergency mode, or no transformer targets the class.
    Bypassed,
    /// Transformers ran but left the bytes unchanged.
    NoOp,
    /// At least one transformer changed the class; the marker was stamped.
    Transformed,
}

/// Lifecycle of a [`TransformEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    /// A blackboard and configuration were handed over.
    Accepted,
    /// The dispatch index has been built.
    Ready,
}

/// One pass in a dispatch run.
#[derive(Clone, Copy)]
enum Step<'a> {
    Transformer(&'a Arc<dyn Transformer>),
    Marker,
}

impl Step<'_> {
    fn priority(&self) -> u8 {
        match self {
            Step::Transformer(_) => 0,
            Step::Marker => u8::MAX,
        }
    }

    fn name(&self) -> String {
        match self {
            Step::Transformer(transformer) => transformer.data().registry_name(),
            Step::Marker => MARKER_NAME.to_string(),
        }
    }
}

struct Accepted {
    blackboard: Blackboard,
    config: EngineConfig,
    index: OnceCell<HashMap<ClassDescriptor, Vec<usize>>>,
}

impl Accepted {
    /// Target class to transformer positions, in discovery order.
    fn index(&self) -> &HashMap<ClassDescriptor, Vec<usize>> {
        self.index.get_or_init(|| {
            let mut index: HashMap<ClassDescriptor, Vec<usize>> = HashMap::new();
            for (position, transformer) in self.blackboard.transformers().iter().enumerate() {
                for target in transformer.targets() {
                    let entries = index.entry(target).or_default();
                    if entries.last() != Some(&position) {
                        entries.push(position);
                    }
                }
            }
            debug!(classes = index.len(), "Built dispatch index");
            index
        })
    }
}

/// Rewrites class bytes with the transformers of an accepted [`Blackboard`].
#[derive(Default)]
pub struct TransformEngine {
    accepted: Option<Accepted>,
}

impl TransformEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hands over the registry and its configuration.
    ///
    /// Accepting again replaces both and discards the dispatch index.
    pub fn accept(&mut self, blackboard: Blackboard, config: EngineConfig) {
        debug!(
            transformers = blackboard.transformers().len(),
            emergency_mode = config.switches.emergency_mode,
            "Engine accepted blackboard"
        );
        self.accepted = Some(Accepted {
            blackboard,
            config,
            index: OnceCell::new(),
        });
    }

    pub fn state(&self) -> EngineState {
        match &self.accepted {
            None => EngineState::Uninitialized,
            Some(accepted) if accepted.index.get().is_some() => EngineState::Ready,
            Some(_) => EngineState::Accepted,
        }
    }

    pub fn blackboard(&self) -> Option<&Blackboard> {
        self.accepted.as_ref().map(|a| &a.blackboard)
    }

    pub fn config(&self) -> Option<&EngineConfig> {
        self.accepted.as_ref().map(|a| &a.config)
    }

    /// Runs every enabled transformer targeting `canonical_name` over `bytes`.
    ///
    /// Untargeted classes come back borrowed. A class that any transformer
    /// changed also receives the marker annotation.
    pub fn transform<'a>(
        &self,
        raw_name: &str,
        canonical_name: &str,
        bytes: &'a [u8],
    ) -> Result<(Cow<'a, [u8]>, TransformOutcome), EngineError> {
        let Some(accepted) = &self.accepted else {
            error!(class = %canonical_name, "Transform requested before the engine was initialized");
            return Err(EngineError::NotAccepted);
        };

        if accepted.config.switches.emergency_mode {
            trace!(class = %canonical_name, "Emergency mode, class passed through");
            return Ok((Cow::Borrowed(bytes), TransformOutcome::Bypassed));
        }

        // Targets are interned when the index is built, so a name that was
        // never interned cannot be targeted.
        let index = accepted.index();
        let Some(descriptor) = ClassDescriptor::lookup(canonical_name) else {
            trace!(class = %canonical_name, "Class is not targeted");
            return Ok((Cow::Borrowed(bytes), TransformOutcome::Bypassed));
        };
        let Some(positions) = index.get(&descriptor) else {
            return Ok((Cow::Borrowed(bytes), TransformOutcome::Bypassed));
        };

        let transformers = accepted.blackboard.transformers();
        let mut steps: Vec<Step<'_>> = positions
            .iter()
            .map(|&position| Step::Transformer(&transformers[position]))
            .collect();
        steps.push(Step::Marker);
        steps.sort_by_key(Step::priority);

        let mut buffer: Cow<'a, [u8]> = Cow::Borrowed(bytes);
        let mut mutated = false;

        for step in steps {
            let enabled = match step {
                Step::Transformer(transformer) => accepted.config.is_enabled(transformer.as_ref()),
                Step::Marker => mutated,
            };
            if !enabled {
                trace!(class = %canonical_name, transformer = %step.name(), "Skipping disabled transformer");
                continue;
            }

            let failure = |source: TransformError| EngineError::TransformFailure {
                transformer: step.name(),
                class: canonical_name.to_string(),
                source,
            };

            let mut class = ClassFile::parse(&buffer).map_err(|e| failure(e.into()))?;
            match step {
                Step::Transformer(transformer) => transformer.transform(&mut class).map_err(failure)?,
                Step::Marker => {
                    class
                        .add_invisible_annotation(TRANSFORMED_MARKER)
                        .map_err(|e| failure(e.into()))?;
                }
            }

            let written = class.to_bytes();
            if written.as_slice() != buffer.as_ref() {
                debug!(class = %canonical_name, transformer = %step.name(), "Transformed class");
                mutated = true;
                buffer = Cow::Owned(written);
            }
        }

        if accepted.config.switches.dump {
            dump(&accepted.config.dump_root, &descriptor, raw_name, &buffer);
        }

        let outcome = if mutated {
            TransformOutcome::Transformed
        } else {
            TransformOutcome::NoOp
        };
        Ok((buffer, outcome))
    }
}

/// Writes `bytes` under `dump_root`; failures are only logged.
fn dump(dump_root: &Path, descriptor: &ClassDescriptor, raw_name: &str, bytes: &[u8]) {
    let path = dump_root.join(format!("{}.class", descriptor.internal_name()));
    let written = path
        .parent()
        .map_or(Ok(()), fs::create_dir_all)
        .and_then(|()| fs::write(&path, bytes));

    match written {
        Ok(()) => debug!(
            class = %descriptor,
            raw_name = %raw_name,
            path = %path.display(),
            digest = %blake3::hash(bytes),
            "Dumped class"
        ),
        Err(e) => warn!(class = %descriptor, path = %path.display(), "Failed to dump class: {}", e),
    }
}

impl std::fmt::Debug for TransformEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformEngine")
            .field("state", &self.state())
            .finish()
    }
}
