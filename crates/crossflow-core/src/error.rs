//! Error taxonomy for schema parsing, network composition, preset
//! application and cycle execution.
//!
//! Every variant carries the labels needed to diagnose the failure without
//! re-running: class, instance, variable and preset labels as applicable.

use thiserror::Error;

use crate::value::VarType;

/// Failure to convert or assign a [`Value`](crate::Value).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValueError {
    /// The source value cannot be represented as the target type.
    #[error("cannot convert {found} to {expected}")]
    Mismatch {
        /// Declared type of the destination.
        expected: VarType,
        /// Description of the offending source value.
        found: String,
    },

    /// A numeric value lies outside the target type's range.
    #[error("value {value} out of range for {ty}")]
    OutOfRange {
        /// Destination type.
        ty: VarType,
        /// Offending value, formatted.
        value: String,
    },
}

/// Errors raised while building class descriptions from configuration.
///
/// Always fatal to the parse step that produced them.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchemaError {
    /// The class label has no entry in the schema registry.
    #[error("unknown class '{0}': no native implementation is registered")]
    UnknownClass(String),

    /// A plain class variable resolved without a type.
    #[error("class '{class}' var '{var}': missing type")]
    MissingType {
        /// Class label.
        class: String,
        /// Variable label.
        var: String,
    },

    /// The `type` field holds an unrecognized type label.
    #[error("class '{class}' var '{var}': unrecognized type '{label}'")]
    UnknownType {
        /// Class label.
        class: String,
        /// Variable label.
        var: String,
        /// The unrecognized type label.
        label: String,
    },

    /// The `flags` list holds an unrecognized flag token.
    #[error("class '{class}' var '{var}': unrecognized flag '{flag}'")]
    UnknownFlag {
        /// Class label.
        class: String,
        /// Variable label.
        var: String,
        /// The unrecognized token.
        flag: String,
    },

    /// The variable description has no `doc` field.
    #[error("class '{class}' var '{var}': missing doc string")]
    MissingDoc {
        /// Class label.
        class: String,
        /// Variable label.
        var: String,
    },

    /// The `proxy` string is not of the form `<proc>.<var>`.
    #[error("class '{class}' var '{var}': malformed proxy '{proxy}': {reason}")]
    MalformedProxy {
        /// Class label.
        class: String,
        /// Variable label.
        var: String,
        /// The proxy string as written.
        proxy: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// A subnet variable has no `proxy` field.
    #[error("subnet '{class}' var '{var}' must have a proxy field")]
    MissingProxy {
        /// Subnet class label.
        class: String,
        /// Variable label.
        var: String,
    },

    /// A subnet proxy names a proc, class or variable that does not exist.
    #[error("subnet '{class}' var '{var}': proxy target not found ({target}): {reason}")]
    ProxyTargetNotFound {
        /// Subnet class label.
        class: String,
        /// Variable label.
        var: String,
        /// `<proc>.<var>` of the proxy.
        target: String,
        /// Which lookup step failed.
        reason: String,
    },

    /// Subnet proxies refer to each other in a loop.
    #[error("subnet '{0}': proxy resolution does not terminate")]
    ProxyCycle(String),

    /// Two plain classes share a label.
    #[error("class '{0}' already exists")]
    DuplicateClass(String),

    /// A subnet label collides with another subnet or plain class.
    #[error("subnet '{0}' already exists")]
    DuplicateSubnet(String),

    /// The label is reserved by the registry.
    #[error("class label '{0}' is reserved")]
    ReservedLabel(String),

    /// A structural problem in the configuration tree.
    #[error("{context}: {reason}")]
    Syntax {
        /// Where the problem was found.
        context: String,
        /// Description of the problem.
        reason: String,
    },
}

impl SchemaError {
    /// Create a syntax error.
    pub fn syntax(context: impl Into<String>, reason: impl Into<String>) -> Self {
        SchemaError::Syntax {
            context: context.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while instantiating a network or resolving a variable.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompositionError {
    /// A proc spec names a class that is not in the class set.
    #[error("proc '{instance}': unknown class '{class}'")]
    UnknownClass {
        /// Instance label.
        instance: String,
        /// Requested class label.
        class: String,
    },

    /// Two procs share an instance label within one network.
    #[error("duplicate proc instance label '{0}'")]
    DuplicateInstance(String),

    /// No proc with this instance label exists.
    #[error("unknown proc instance '{0}'")]
    UnknownInstance(String),

    /// The proc has no variable with this label.
    #[error("proc '{instance}': unknown variable '{var}'")]
    UnknownVariable {
        /// Instance label.
        instance: String,
        /// Variable label.
        var: String,
    },

    /// Channel index is beyond the variable's channel count.
    #[error("proc '{instance}' var '{var}': channel {channel} out of range ({count} channels)")]
    ChannelOutOfRange {
        /// Instance label.
        instance: String,
        /// Variable label.
        var: String,
        /// Requested channel.
        channel: usize,
        /// Available channels.
        count: usize,
    },

    /// A value could not be assigned to a variable.
    #[error("proc '{instance}' var '{var}': {source}")]
    InvalidValue {
        /// Instance label.
        instance: String,
        /// Variable label.
        var: String,
        /// Conversion failure.
        #[source]
        source: ValueError,
    },

    /// More instances of a class than its `poly_limit_cnt` allows.
    #[error("class '{class}' is limited to {limit} instances per network, found {count}")]
    PolyLimit {
        /// Class label.
        class: String,
        /// Declared limit.
        limit: usize,
        /// Instances requested.
        count: usize,
    },

    /// `poly_cnt` on a proc whose class is not a subnet.
    #[error("proc '{0}': poly_cnt is only valid on subnet procs")]
    PolyOnPlainClass(String),

    /// `poly_cnt` on a proc that is already inside a replicated subnet.
    #[error("proc '{0}': poly_cnt inside a replicated subnet")]
    NestedPoly(String),

    /// An input connection string is not `<proc>.<var>` or names nothing.
    #[error("proc '{instance}' input '{var}': cannot connect to '{source_ref}': {reason}")]
    BadConnection {
        /// Instance label.
        instance: String,
        /// Destination variable.
        var: String,
        /// Source reference as written.
        source_ref: String,
        /// Why the connection failed.
        reason: String,
    },

    /// A `src` variable has no incoming connection.
    #[error("proc '{instance}' var '{var}' requires a source connection")]
    MissingSource {
        /// Instance label.
        instance: String,
        /// Variable label.
        var: String,
    },

    /// The connections form a loop.
    #[error("connection cycle through proc '{0}'")]
    ConnectionCycle(String),

    /// A device-affinity class was instantiated without a device.
    #[error("proc '{instance}' of class '{class}' requires a device")]
    DeviceRequired {
        /// Instance label.
        instance: String,
        /// Class label.
        class: String,
    },

    /// The named external device does not exist.
    #[error("proc '{instance}': unknown device '{device}'")]
    UnknownDevice {
        /// Instance label.
        instance: String,
        /// Device label.
        device: String,
    },

    /// The native constructor rejected the instance.
    #[error("proc '{instance}' of class '{class}' failed to construct: {reason}")]
    Construct {
        /// Instance label.
        instance: String,
        /// Class label.
        class: String,
        /// Reason reported by the native implementation.
        reason: String,
    },

    /// The construction-time preset of a proc failed.
    #[error("proc '{instance}': {source}")]
    Preset {
        /// Instance label.
        instance: String,
        /// Preset failure.
        #[source]
        source: PresetError,
    },

    /// A [`VarId`](crate::VarId) does not belong to this network.
    #[error("stale or foreign variable id")]
    InvalidVarId,
}

/// A single field that failed during best-effort preset application.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{instance}.{var}: {reason}")]
pub struct PresetFieldError {
    /// Instance label of the target proc.
    pub instance: String,
    /// Variable label from the preset body.
    pub var: String,
    /// What went wrong.
    pub reason: String,
}

/// Errors raised by the preset system.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PresetError {
    /// No proc in the network resolves this preset label.
    #[error("unknown preset '{0}'")]
    UnknownPreset(String),

    /// Application completed best-effort but some fields failed.
    #[error("preset '{preset}' applied with {} failed field(s): {}", .failures.len(), join_failures(.failures))]
    Partial {
        /// Preset label (or `a|b` for blends).
        preset: String,
        /// Every field that failed.
        failures: Vec<PresetFieldError>,
    },

    /// The multi-preset selector holds no primary candidates.
    #[error("multi-preset selector has no primary presets")]
    EmptySelector,

    /// A blend coefficient outside `[0, 1]`.
    #[error("blend coefficient {0} is outside [0, 1]")]
    InvalidCoeff(f64),
}

fn join_failures(failures: &[PresetFieldError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors raised while advancing a network by one cycle.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RuntimeError {
    /// A native step callback failed.
    #[error("proc '{instance}' ({class}) failed: {reason}")]
    Step {
        /// Instance label.
        instance: String,
        /// Class label.
        class: String,
        /// Reason reported by the native implementation.
        reason: String,
    },

    /// An input connection could not be copied.
    #[error("proc '{instance}' input '{var}': {source}")]
    Input {
        /// Instance label.
        instance: String,
        /// Destination variable.
        var: String,
        /// Conversion failure.
        #[source]
        source: ValueError,
    },
}

/// Error reported by a native class implementation.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{0}")]
pub struct NativeError(pub String);

impl NativeError {
    /// Create a native error from any message.
    pub fn new(msg: impl Into<String>) -> Self {
        NativeError(msg.into())
    }
}

/// Umbrella error for the whole flow runtime.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FlowError {
    /// Schema parsing failed.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Network composition or variable resolution failed.
    #[error(transparent)]
    Composition(#[from] CompositionError),

    /// Preset application failed.
    #[error(transparent)]
    Preset(#[from] PresetError),

    /// Cycle execution failed.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}
