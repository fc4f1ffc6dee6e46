//! Schema registry and built-in native classes for crossflow.
//!
//! The registry maps class labels to [`NativeClass`] implementations. The
//! schema parser in `crossflow-config` resolves every plain class label
//! through it; labels it does not know are configuration errors.
//!
//! # Features
//!
//! - **Class Discovery**: list registered classes with descriptions
//! - **Category System**: classes grouped by role (control, source, audio, device)
//! - **Extension**: register your own native classes next to the built-ins
//!
//! # Example
//!
//! ```rust
//! use crossflow_registry::{ClassCategory, SchemaRegistry};
//!
//! let registry = SchemaRegistry::new();
//! assert!(registry.contains("sine_tone"));
//!
//! for info in registry.classes_in_category(ClassCategory::Device) {
//!     println!("{}: {}", info.label, info.description);
//! }
//! ```

pub mod builtin;

use std::sync::Arc;

use crossflow_core::{NativeClass, SchemaError};

/// Reserved label of the native implementation behind every subnet class.
pub const SUBNET_LABEL: &str = "subnet";

/// Class descriptions (TOML) for the built-in native classes.
pub const BUILTIN_CLASSES: &str = include_str!("builtin_classes.toml");

/// Role of a class, for organization and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassCategory {
    /// Control-rate values and counters.
    Control,
    /// Signal generators.
    Source,
    /// Audio processors.
    Audio,
    /// Bridges to external devices.
    Device,
}

impl ClassCategory {
    /// Returns a human-readable name for the category.
    pub const fn name(&self) -> &'static str {
        match self {
            ClassCategory::Control => "Control",
            ClassCategory::Source => "Source",
            ClassCategory::Audio => "Audio",
            ClassCategory::Device => "Device",
        }
    }
}

/// Describes a registered class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassInfo {
    /// Class label as used in class descriptions.
    pub label: String,
    /// Brief description.
    pub description: String,
    /// Category for organization.
    pub category: ClassCategory,
}

struct RegistryEntry {
    info: ClassInfo,
    native: Arc<dyn NativeClass>,
}

/// Registry of native class implementations.
///
/// Built once at startup and then only read.
pub struct SchemaRegistry {
    entries: Vec<RegistryEntry>,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaRegistry {
    /// Create a registry with all built-in classes registered.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register_builtin_classes();
        registry
    }

    /// Create a registry with no classes.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn register_builtin_classes(&mut self) {
        let builtins: [(&str, &str, ClassCategory, Arc<dyn NativeClass>); 7] = [
            (
                "number",
                "Emits a constant control value",
                ClassCategory::Control,
                Arc::new(builtin::Number),
            ),
            (
                "counter",
                "Cycle counter that can end the stream at a limit",
                ClassCategory::Control,
                Arc::new(builtin::Counter),
            ),
            (
                "sine_tone",
                "Multi-channel sine oscillator",
                ClassCategory::Source,
                Arc::new(builtin::SineTone),
            ),
            (
                "audio_gain",
                "Ramped linear gain",
                ClassCategory::Audio,
                Arc::new(builtin::AudioGain),
            ),
            (
                "audio_mix",
                "Weighted sum of two audio inputs",
                ClassCategory::Audio,
                Arc::new(builtin::AudioMix),
            ),
            (
                "audio_in",
                "Reads an external audio input device",
                ClassCategory::Device,
                Arc::new(builtin::AudioIn),
            ),
            (
                "audio_out",
                "Writes an external audio output device",
                ClassCategory::Device,
                Arc::new(builtin::AudioOut),
            ),
        ];
        for (label, description, category, native) in builtins {
            self.entries.push(RegistryEntry {
                info: ClassInfo {
                    label: label.to_string(),
                    description: description.to_string(),
                    category,
                },
                native,
            });
        }
    }

    /// Register a native class.
    ///
    /// Fails if the label is reserved or already registered.
    pub fn register(
        &mut self,
        label: impl Into<String>,
        description: impl Into<String>,
        category: ClassCategory,
        native: Arc<dyn NativeClass>,
    ) -> Result<(), SchemaError> {
        let label = label.into();
        if label == SUBNET_LABEL {
            return Err(SchemaError::ReservedLabel(label));
        }
        if self.contains(&label) {
            return Err(SchemaError::DuplicateClass(label));
        }
        tracing::debug!(class = %label, "native class registered");
        self.entries.push(RegistryEntry {
            info: ClassInfo {
                label,
                description: description.into(),
                category,
            },
            native,
        });
        Ok(())
    }

    /// Builder form of [`register`](Self::register).
    pub fn with_class(
        mut self,
        label: impl Into<String>,
        description: impl Into<String>,
        category: ClassCategory,
        native: Arc<dyn NativeClass>,
    ) -> Result<Self, SchemaError> {
        self.register(label, description, category, native)?;
        Ok(self)
    }

    /// Native implementation for a class label.
    pub fn get(&self, label: &str) -> Option<&Arc<dyn NativeClass>> {
        self.entries
            .iter()
            .find(|e| e.info.label == label)
            .map(|e| &e.native)
    }

    /// Description of a class label.
    pub fn info(&self, label: &str) -> Option<&ClassInfo> {
        self.entries
            .iter()
            .find(|e| e.info.label == label)
            .map(|e| &e.info)
    }

    /// Returns true if `label` is registered.
    pub fn contains(&self, label: &str) -> bool {
        self.entries.iter().any(|e| e.info.label == label)
    }

    /// Returns descriptions of all registered classes, in registration order.
    pub fn all_classes(&self) -> Vec<&ClassInfo> {
        self.entries.iter().map(|e| &e.info).collect()
    }

    /// Returns descriptions of the classes in one category.
    pub fn classes_in_category(&self, category: ClassCategory) -> Vec<&ClassInfo> {
        self.entries
            .iter()
            .filter(|e| e.info.category == category)
            .map(|e| &e.info)
            .collect()
    }

    /// Returns the number of registered classes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no classes are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
