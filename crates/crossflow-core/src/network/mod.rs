//! Instantiated processing networks.
//!
//! A [`Network`] is built from a [`NetworkTemplate`] against a [`ClassSet`].
//! Every proc spec becomes a [`ProcInstance`]; subnet procs own a nested
//! network, replicated `poly_cnt` times when requested. Procs step in
//! creation order, re-sorted only when a connection reads from a proc
//! created later.
//!
//! # Example
//!
//! ```rust,ignore
//! let net = Network::build(&classes, &template, NetworkConfig::default(), Vec::new())?;
//! net.set_variable("osc", "freq", 0, 440.0_f32)?;
//! let status = net.exec_cycle()?;
//! ```

mod access;
mod build;
mod proc;

use std::sync::Arc;

pub use access::VarId;
pub use proc::ProcInstance;

use crate::class::ClassSet;
use crate::device::ExternalDevice;
use crate::error::{CompositionError, RuntimeError};
use crate::processor::{CycleCtx, ExecStatus};
use crate::template::{NetworkPreset, NetworkTemplate};

pub(crate) use proc::ProcBody;

/// Cycle-rate parameters shared by every proc of a network.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetworkConfig {
    /// Sample rate in Hz.
    pub sample_rate: f64,
    /// Frames processed per cycle.
    pub frames_per_cycle: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000.0,
            frames_per_cycle: 64,
        }
    }
}

/// An instantiated network of procs.
pub struct Network {
    pub(crate) label: String,
    pub(crate) procs: Vec<ProcInstance>,
    pub(crate) order: Vec<usize>,
    pub(crate) presets: Arc<Vec<NetworkPreset>>,
    pub(crate) devices: Vec<ExternalDevice>,
    pub(crate) config: NetworkConfig,
    pub(crate) cycle_index: u64,
}

impl Network {
    /// Instantiate `template` as a root network bound to `devices`.
    ///
    /// Audio devices whose frame count differs from
    /// `config.frames_per_cycle` are accepted with a warning.
    pub fn build(
        classes: &ClassSet,
        template: &NetworkTemplate,
        config: NetworkConfig,
        devices: Vec<ExternalDevice>,
    ) -> Result<Self, CompositionError> {
        for device in &devices {
            if let Some(frames) = device.frames()
                && frames != config.frames_per_cycle
            {
                tracing::warn!(
                    device = %device.label,
                    device_frames = frames,
                    frames_per_cycle = config.frames_per_cycle,
                    "device frame count does not match frames per cycle"
                );
            }
        }

        let builder = build::Builder::new(classes, config, &devices);
        let mut net = builder.network("root", template, None, &[])?;
        net.devices = devices;
        tracing::debug!(
            procs = net.procs.len(),
            order = ?net.execution_order().collect::<Vec<_>>(),
            "network built"
        );
        Ok(net)
    }

    /// Label of the network: `root`, or the owning subnet proc's label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Cycle-rate parameters.
    pub fn config(&self) -> NetworkConfig {
        self.config
    }

    /// Procs in creation order.
    pub fn procs(&self) -> &[ProcInstance] {
        &self.procs
    }

    /// First proc with this label.
    pub fn proc(&self, label: &str) -> Option<&ProcInstance> {
        self.procs.iter().find(|p| p.label == label)
    }

    /// Labels in execution order.
    pub fn execution_order(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|&i| self.procs[i].label.as_str())
    }

    /// External devices bound to this network.
    pub fn devices(&self) -> &[ExternalDevice] {
        &self.devices
    }

    /// Mutable access to the device buffers, for hosts that exchange audio.
    pub fn devices_mut(&mut self) -> &mut [ExternalDevice] {
        &mut self.devices
    }

    /// Device by label.
    pub fn device(&self, label: &str) -> Option<&ExternalDevice> {
        self.devices.iter().find(|d| d.label == label)
    }

    /// Mutable device by label.
    pub fn device_mut(&mut self, label: &str) -> Option<&mut ExternalDevice> {
        self.devices.iter_mut().find(|d| d.label == label)
    }

    /// Number of cycles executed so far.
    pub fn cycle_index(&self) -> u64 {
        self.cycle_index
    }

    /// Advance every proc by one cycle.
    ///
    /// Returns [`ExecStatus::EndOfStream`] if any proc requested the end of
    /// the run; the cycle is always completed first.
    pub fn exec_cycle(&mut self) -> Result<ExecStatus, RuntimeError> {
        let mut ctx = CycleCtx::new(
            self.config.sample_rate,
            self.config.frames_per_cycle,
            self.cycle_index,
            &mut self.devices,
        );
        let status = run_procs(&mut self.procs, &self.order, &mut ctx)?;
        self.cycle_index += 1;
        Ok(status)
    }

    /// Step a nested network with its parent's context.
    pub(crate) fn run(&mut self, ctx: &mut CycleCtx<'_>) -> Result<ExecStatus, RuntimeError> {
        run_procs(&mut self.procs, &self.order, ctx)
    }
}

impl std::fmt::Debug for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Network")
            .field("label", &self.label)
            .field("procs", &self.procs)
            .field("order", &self.order)
            .field("cycle_index", &self.cycle_index)
            .finish_non_exhaustive()
    }
}

fn run_procs(
    procs: &mut [ProcInstance],
    order: &[usize],
    ctx: &mut CycleCtx<'_>,
) -> Result<ExecStatus, RuntimeError> {
    let mut status = ExecStatus::Continue;
    for &i in order {
        pull_inputs(procs, i)?;
        if procs[i].exec(ctx)? == ExecStatus::EndOfStream {
            status = ExecStatus::EndOfStream;
        }
    }
    Ok(status)
}

/// Copy every connected source value into proc `i`.
fn pull_inputs(procs: &mut [ProcInstance], i: usize) -> Result<(), RuntimeError> {
    for k in 0..procs[i].inputs.len() {
        let input = procs[i].inputs[k];
        let (src, dst) = pair_mut(procs, input.src_proc, i);
        for ch in 0..src.channel_count(input.src_var) {
            let Some(value) = src.value(input.src_var, ch) else {
                break;
            };
            dst.write(input.dst_var, ch, value, false)
                .map_err(|source| RuntimeError::Input {
                    instance: dst.label.clone(),
                    var: dst.class.vars[input.dst_var].label.clone(),
                    source,
                })?;
        }
    }
    Ok(())
}

/// Shared borrow of `src` alongside a mutable borrow of `dst`; `src != dst`.
fn pair_mut(
    procs: &mut [ProcInstance],
    src: usize,
    dst: usize,
) -> (&ProcInstance, &mut ProcInstance) {
    if src < dst {
        let (lo, hi) = procs.split_at_mut(dst);
        (&lo[src], &mut hi[0])
    } else {
        let (lo, hi) = procs.split_at_mut(src);
        (&hi[0], &mut lo[dst])
    }
}
