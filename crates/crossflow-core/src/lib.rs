//! Crossflow Core - schema-driven processing networks
//!
//! This crate holds the runtime model of crossflow: class descriptions,
//! instantiated networks of procs, the preset system and the dual-network
//! crossfade runtime. Parsing configuration into these types lives in
//! `crossflow-config`; the built-in native classes live in
//! `crossflow-registry`.
//!
//! # Core Abstractions
//!
//! ## Schema
//!
//! - [`VarDescriptor`] - label, doc, [`VarType`], [`VarFlags`], default and proxy
//! - [`ClassDescriptor`] - plain (native) or subnet class with presets
//! - [`ClassSet`] - all classes of a flow, labels unique across kinds
//!
//! ## Native Implementations
//!
//! - [`NativeClass`] - registered per class label, creates processors
//! - [`Processor`] - per-instance state stepped once per cycle
//! - [`VarBank`] - a native proc's variable storage
//!
//! ## Runtime
//!
//! - [`Network`] - instantiated procs, nested subnets and poly replicas
//! - [`PresetSelector`] - weighted multi-preset selection
//! - [`FlowCross`] - two networks crossfaded on reconfiguration
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use crossflow_core::{
//!     ClassDescriptor, ClassSet, CycleCtx, ExecStatus, Literal, NativeClass, NativeError,
//!     Network, NetworkConfig, NetworkTemplate, PresetBody, ProcInit, ProcSpec, Processor,
//!     VarBank, VarDescriptor, VarType,
//! };
//!
//! struct Hold;
//! struct HoldProc;
//!
//! impl NativeClass for Hold {
//!     fn create(&self, _init: &mut ProcInit<'_>) -> Result<Box<dyn Processor>, NativeError> {
//!         Ok(Box::new(HoldProc))
//!     }
//! }
//!
//! impl Processor for HoldProc {
//!     fn exec(&mut self, _v: &mut VarBank, _c: &mut CycleCtx<'_>) -> Result<ExecStatus, NativeError> {
//!         Ok(ExecStatus::Continue)
//!     }
//! }
//!
//! let mut classes = ClassSet::new();
//! classes
//!     .insert(
//!         ClassDescriptor::plain("hold", Arc::new(Hold))
//!             .with_var(VarDescriptor::new("level", "Level.", VarType::Float))
//!             .with_preset("loud", PresetBody::new().with("level", Literal::Float(0.9))),
//!     )
//!     .unwrap();
//!
//! let template = NetworkTemplate::new().with_proc(ProcSpec::new("h", "hold"));
//! let mut net = Network::build(&classes, &template, NetworkConfig::default(), Vec::new()).unwrap();
//!
//! net.apply_preset("loud", None).unwrap();
//! assert_eq!(net.get_variable::<f32>("h", "level", 0).unwrap(), 0.9);
//! assert_eq!(net.exec_cycle().unwrap(), ExecStatus::Continue);
//! ```

pub mod bank;
pub mod class;
pub mod cross;
pub mod device;
pub mod error;
pub mod network;
pub mod preset;
pub mod processor;
pub mod template;
pub mod value;
pub mod var;

#[cfg(test)]
pub(crate) mod testing;

pub use bank::{VarBank, Variable};
pub use class::{ClassDescriptor, ClassKind, ClassPreset, ClassSet, PresetBody};
pub use cross::{DestId, FadeState, FlowCross};
pub use device::{DeviceBuffer, DeviceDir, DeviceKind, ExternalDevice};
pub use error::{
    CompositionError, FlowError, NativeError, PresetError, PresetFieldError, RuntimeError,
    SchemaError, ValueError,
};
pub use network::{Network, NetworkConfig, ProcInstance, VarId};
pub use preset::{DEFAULT_BLEND_COEFF, PresetSelector, SelectorFlags, WeightedPreset};
pub use processor::{CycleCtx, ExecStatus, NativeClass, ProcInit, Processor};
pub use template::{InputSpec, NetworkPreset, NetworkTemplate, PresetRef, ProcSpec};
pub use value::{AudioBuf, FromValue, Literal, MidiMsg, Value, VarType};
pub use var::{ProxyRef, VarDescriptor, VarFlags};
