//! Configuration loading and the run loop for crossflow.
//!
//! This crate turns TOML into the runtime model of `crossflow-core`:
//!
//! - **Class descriptions**: `[classes.<label>]` and `[subnets.<label>]`
//!   tables parsed by [`SchemaParser`], with subnet proxies resolved in a
//!   second pass
//! - **Network templates**: `procs` and `presets` tables, in declared order
//! - **Flows**: [`FlowConfig`] pairs the class set with a root network,
//!   cycle-rate settings, devices, an initial preset and run limits
//! - **Run loop**: [`run`] steps a network until end of stream or the cycle
//!   limit
//!
//! # Example
//!
//! ```rust
//! use crossflow_config::{FlowConfig, StopReason};
//! use crossflow_registry::{BUILTIN_CLASSES, SchemaRegistry};
//!
//! let flow = FlowConfig::from_toml(
//!     BUILTIN_CLASSES,
//!     r#"
//!     max_cycle_count = 16
//!
//!     [network.procs.count]
//!     class = "counter"
//!     args = { limit = 4.0 }
//!     "#,
//!     &SchemaRegistry::new(),
//! )
//! .unwrap();
//!
//! let report = flow.exec().unwrap();
//! assert_eq!(report.cycles, 4);
//! assert_eq!(report.stop, StopReason::EndOfStream);
//! ```

mod error;
mod flow;

/// Class and subnet description parsing.
pub mod schema;

/// Network template parsing.
pub mod template;

/// TOML leaf conversion.
pub mod tree;

pub use error::ConfigError;
pub use flow::{
    DeviceSpec, DeviceSpecDir, DeviceSpecKind, FlowConfig, FlowSettings, RunReport, StopReason,
    run, run_cross,
};
pub use schema::SchemaParser;
pub use template::parse_network;

/// Re-export commonly used types from crossflow-registry
pub use crossflow_registry::{BUILTIN_CLASSES, ClassCategory, ClassInfo, SchemaRegistry};
