//! Native class capability traits.
//!
//! The schema registry maps class labels to [`NativeClass`] objects. A
//! native class constructs one [`Processor`] per proc instance; the
//! processor is stepped once per cycle and dropped with its network.
//!
//! # Example
//!
//! ```rust
//! use crossflow_core::{
//!     CycleCtx, ExecStatus, NativeClass, NativeError, ProcInit, Processor, VarBank,
//! };
//!
//! /// Doubles `in` into `out`.
//! struct Doubler;
//!
//! struct DoublerProc {
//!     input: usize,
//!     output: usize,
//! }
//!
//! impl NativeClass for Doubler {
//!     fn create(&self, init: &mut ProcInit<'_>) -> Result<Box<dyn Processor>, NativeError> {
//!         Ok(Box::new(DoublerProc {
//!             input: init.vars.require("in")?,
//!             output: init.vars.require("out")?,
//!         }))
//!     }
//! }
//!
//! impl Processor for DoublerProc {
//!     fn exec(&mut self, vars: &mut VarBank, _ctx: &mut CycleCtx<'_>) -> Result<ExecStatus, NativeError> {
//!         let x = vars.f64(self.input, 0);
//!         vars.set_f64(self.output, 0, 2.0 * x)
//!             .map_err(|e| NativeError::new(e.to_string()))?;
//!         Ok(ExecStatus::Continue)
//!     }
//! }
//! ```

use crate::bank::VarBank;
use crate::device::{DeviceKind, ExternalDevice};
use crate::error::NativeError;

/// Result of one native step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecStatus {
    /// Keep running.
    Continue,
    /// Stop the run loop cleanly after this cycle.
    EndOfStream,
}

/// Construction context handed to [`NativeClass::create`].
pub struct ProcInit<'a> {
    /// Instance label of the proc being built.
    pub instance: &'a str,
    /// The proc's variables, with defaults and arguments applied.
    pub vars: &'a mut VarBank,
    /// Sample rate in Hz.
    pub sample_rate: f64,
    /// Frames processed per cycle.
    pub frames_per_cycle: usize,
    /// Bound external device, for device-affinity classes.
    pub device: Option<&'a ExternalDevice>,
}

/// Per-cycle context handed to [`Processor::exec`].
pub struct CycleCtx<'a> {
    /// Sample rate in Hz.
    pub sample_rate: f64,
    /// Frames processed per cycle.
    pub frames_per_cycle: usize,
    /// Zero-based index of the cycle being processed.
    pub cycle_index: u64,
    devices: &'a mut [ExternalDevice],
    bound: Option<usize>,
}

impl<'a> CycleCtx<'a> {
    /// Context over a device array.
    pub fn new(
        sample_rate: f64,
        frames_per_cycle: usize,
        cycle_index: u64,
        devices: &'a mut [ExternalDevice],
    ) -> Self {
        Self {
            sample_rate,
            frames_per_cycle,
            cycle_index,
            devices,
            bound: None,
        }
    }

    /// Device bound to the proc being stepped.
    pub fn device(&self) -> Option<&ExternalDevice> {
        self.bound.and_then(|i| self.devices.get(i))
    }

    /// Mutable device bound to the proc being stepped.
    pub fn device_mut(&mut self) -> Option<&mut ExternalDevice> {
        self.bound.and_then(|i| self.devices.get_mut(i))
    }

    pub(crate) fn bind(&mut self, device: Option<usize>) {
        self.bound = device;
    }
}

/// A class implementation registered in the schema registry.
///
/// Implementations are shared across threads and networks, so they hold no
/// per-instance state; that lives in the [`Processor`] they create.
pub trait NativeClass: Send + Sync {
    /// Kind of external device instances must be bound to, if any.
    fn device_kind(&self) -> Option<DeviceKind> {
        None
    }

    /// Build the per-instance processor.
    ///
    /// May resize channel counts and allocate audio buffers through
    /// `init.vars`.
    fn create(&self, init: &mut ProcInit<'_>) -> Result<Box<dyn Processor>, NativeError>;
}

/// Per-instance state of a native proc.
pub trait Processor: Send {
    /// Process one cycle of `ctx.frames_per_cycle` frames.
    fn exec(&mut self, vars: &mut VarBank, ctx: &mut CycleCtx<'_>) -> Result<ExecStatus, NativeError>;

    /// Called after a variable was set from outside the cycle, by the
    /// variable access API or a preset.
    fn notify(&mut self, _var: usize, _vars: &VarBank) {}
}
