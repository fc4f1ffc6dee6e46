//! Network templates: the uninstantiated description of a network.
//!
//! A template lists proc specs in creation order plus the network-level
//! presets. [`Network::build`](crate::Network::build) turns a template into
//! live proc instances.

use crate::class::PresetBody;
use crate::value::Literal;

/// An input connection `var ← <proc>.<var>`.
#[derive(Debug, Clone, PartialEq)]
pub struct InputSpec {
    /// Destination variable on the owning proc.
    pub var: String,
    /// Source reference as written, `<proc>.<var>`.
    pub source: String,
}

/// One proc in a network template.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcSpec {
    /// Instance label, unique within the network.
    pub label: String,
    /// Class label.
    pub class: String,
    /// Construction-time values, applied after class defaults.
    pub args: PresetBody,
    /// Input connections.
    pub inputs: Vec<InputSpec>,
    /// Class preset applied right after construction.
    pub preset: Option<String>,
    /// Number of replicas of a subnet proc.
    pub poly_cnt: Option<usize>,
    /// Label of the external device bound to this proc.
    pub device: Option<String>,
}

impl ProcSpec {
    /// A proc of `class` labelled `label`.
    pub fn new(label: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            class: class.into(),
            args: PresetBody::new(),
            inputs: Vec::new(),
            preset: None,
            poly_cnt: None,
            device: None,
        }
    }

    /// Add a construction argument.
    pub fn with_arg(mut self, var: impl Into<String>, value: Literal) -> Self {
        self.args.insert(var, value);
        self
    }

    /// Connect `var` to `source` (`<proc>.<var>`).
    pub fn with_input(mut self, var: impl Into<String>, source: impl Into<String>) -> Self {
        self.inputs.push(InputSpec {
            var: var.into(),
            source: source.into(),
        });
        self
    }

    /// Apply a class preset after construction.
    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = Some(preset.into());
        self
    }

    /// Replicate the subnet `count` times.
    pub fn with_poly(mut self, count: usize) -> Self {
        self.poly_cnt = Some(count);
        self
    }

    /// Bind an external device.
    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }
}

/// What a network preset assigns to one proc.
#[derive(Debug, Clone, PartialEq)]
pub enum PresetRef {
    /// Apply the proc's class preset with this label.
    Class(String),
    /// Apply these values directly.
    Inline(PresetBody),
}

/// A network-level preset: proc label → preset reference.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkPreset {
    /// Preset label.
    pub label: String,
    /// Entries in declaration order.
    pub entries: Vec<(String, PresetRef)>,
}

impl NetworkPreset {
    /// Empty preset.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            entries: Vec::new(),
        }
    }

    /// Add an entry (builder style).
    pub fn with(mut self, proc: impl Into<String>, value: PresetRef) -> Self {
        self.entries.push((proc.into(), value));
        self
    }

    /// Entry for a proc label.
    pub fn entry(&self, proc: &str) -> Option<&PresetRef> {
        self.entries
            .iter()
            .find(|(p, _)| p == proc)
            .map(|(_, r)| r)
    }
}

/// Uninstantiated network: procs in creation order and network presets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkTemplate {
    /// Proc specs in creation order.
    pub procs: Vec<ProcSpec>,
    /// Network-level presets.
    pub presets: Vec<NetworkPreset>,
}

impl NetworkTemplate {
    /// Empty template.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a proc (builder style).
    pub fn with_proc(mut self, proc: ProcSpec) -> Self {
        self.procs.push(proc);
        self
    }

    /// Append a network preset (builder style).
    pub fn with_preset(mut self, preset: NetworkPreset) -> Self {
        self.presets.push(preset);
        self
    }

    /// Proc spec by label.
    pub fn proc(&self, label: &str) -> Option<&ProcSpec> {
        self.procs.iter().find(|p| p.label == label)
    }

    /// Network preset by label.
    pub fn preset(&self, label: &str) -> Option<&NetworkPreset> {
        self.presets.iter().find(|p| p.label == label)
    }
}
