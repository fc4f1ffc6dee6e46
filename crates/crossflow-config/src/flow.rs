//! Top-level flow configuration and the run loop.
//!
//! A flow combines a class set with a root network, cycle-rate settings,
//! an optional initial preset and run limits.
//!
//! # TOML Format
//!
//! ```toml
//! sample_rate = 48000.0
//! frames_per_cycle = 64
//! max_cycle_count = 1000     # 0 runs until end of stream
//! max_duration_secs = 2.5    # converted to cycles, the smaller limit wins
//! preset = "bright"
//! multi_pri_preset_prob = true
//!
//! [devices.dac]
//! dir = "out"
//! channels = 2
//!
//! [network.procs.osc]
//! class = "sine_tone"
//! args = { ch_cnt = 2 }
//!
//! [network.procs.out]
//! class = "audio_out"
//! in = { in = "osc.out" }
//! device = "dac"
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use crossflow_core::{
    ClassSet, DeviceDir, ExecStatus, ExternalDevice, FlowCross, Network, NetworkConfig,
    NetworkTemplate, PresetError, PresetSelector, RuntimeError, SelectorFlags,
};
use crossflow_registry::SchemaRegistry;
use serde::Deserialize;
use toml::{Table, Value};

use crate::error::ConfigError;
use crate::schema::SchemaParser;
use crate::template::parse_network;

/// Direction of a configured device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceSpecDir {
    /// Hardware input, read by the network.
    In,
    /// Hardware output, written by the network.
    Out,
}

/// Kind of a configured device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceSpecKind {
    /// Audio endpoint with a channel count.
    #[default]
    Audio,
    /// MIDI endpoint.
    Midi,
}

/// An external device declared in the flow file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceSpec {
    /// Input or output.
    pub dir: DeviceSpecDir,
    /// Audio or MIDI.
    #[serde(default)]
    pub kind: DeviceSpecKind,
    /// Audio channel count.
    #[serde(default = "default_channels")]
    pub channels: usize,
}

fn default_channels() -> usize {
    1
}

/// Flow-level settings: every key of a flow file except `network`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FlowSettings {
    /// Sample rate in Hz.
    pub sample_rate: f64,
    /// Frames processed per cycle.
    pub frames_per_cycle: usize,
    /// Stop after this many cycles; 0 for no limit.
    pub max_cycle_count: u64,
    /// Stop after this much audio time; 0 for no limit.
    pub max_duration_secs: f64,
    /// Network preset applied once the network is built.
    pub preset: Option<String>,
    /// Draw one primary preset by weight in multi-preset selection.
    pub multi_pri_preset_prob: bool,
    /// Draw one secondary preset by weight in multi-preset selection.
    pub multi_sec_preset_prob: bool,
    /// Blend primary and secondary selections.
    pub multi_preset_interp: bool,
    /// External devices, keyed and ordered by label.
    pub devices: BTreeMap<String, DeviceSpec>,
}

impl Default for FlowSettings {
    fn default() -> Self {
        let network = NetworkConfig::default();
        Self {
            sample_rate: network.sample_rate,
            frames_per_cycle: network.frames_per_cycle,
            max_cycle_count: 0,
            max_duration_secs: 0.0,
            preset: None,
            multi_pri_preset_prob: false,
            multi_sec_preset_prob: false,
            multi_preset_interp: false,
            devices: BTreeMap::new(),
        }
    }
}

impl FlowSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(ConfigError::invalid_setting(
                "sample_rate",
                format!("must be a positive number, got {}", self.sample_rate),
            ));
        }
        if self.frames_per_cycle == 0 {
            return Err(ConfigError::invalid_setting("frames_per_cycle", "must be at least 1"));
        }
        if !(self.max_duration_secs.is_finite() && self.max_duration_secs >= 0.0) {
            return Err(ConfigError::invalid_setting(
                "max_duration_secs",
                format!("must be zero or positive, got {}", self.max_duration_secs),
            ));
        }
        if let Some((label, _)) = self
            .devices
            .iter()
            .find(|(_, d)| d.kind == DeviceSpecKind::Audio && d.channels == 0)
        {
            return Err(ConfigError::invalid_setting(
                "devices",
                format!("audio device '{label}' must have at least one channel"),
            ));
        }
        Ok(())
    }
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A proc signalled end of stream.
    EndOfStream,
    /// The cycle limit was reached.
    CycleLimit,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    /// Cycles executed.
    pub cycles: u64,
    /// Why the run stopped.
    pub stop: StopReason,
}

/// A parsed flow: class descriptions, root network template and settings.
#[derive(Debug, Clone)]
pub struct FlowConfig {
    classes: ClassSet,
    template: NetworkTemplate,
    settings: FlowSettings,
}

impl FlowConfig {
    /// Parse a class description file and a flow file.
    pub fn from_toml(
        classes: &str,
        flow: &str,
        registry: &SchemaRegistry,
    ) -> Result<Self, ConfigError> {
        let mut parser = SchemaParser::new(registry);
        parser.add_str(classes)?;
        Self::with_classes(parser.finish()?, flow)
    }

    /// Load a class description file and a flow file from disk.
    pub fn load(
        classes_path: impl AsRef<Path>,
        flow_path: impl AsRef<Path>,
        registry: &SchemaRegistry,
    ) -> Result<Self, ConfigError> {
        let classes = read(classes_path.as_ref())?;
        let flow = read(flow_path.as_ref())?;
        Self::from_toml(&classes, &flow, registry)
    }

    /// Parse a flow file against an already built class set.
    pub fn with_classes(classes: ClassSet, flow: &str) -> Result<Self, ConfigError> {
        let mut table: Table = flow.parse()?;
        let network = match table.remove("network") {
            Some(Value::Table(network)) => network,
            Some(other) => {
                return Err(ConfigError::invalid_setting(
                    "network",
                    format!("expected a table, found {}", other.type_str()),
                ));
            }
            None => {
                return Err(ConfigError::invalid_setting("network", "missing required table"));
            }
        };
        let settings: FlowSettings = Value::Table(table).try_into()?;
        settings.validate()?;
        let template = parse_network("network", &network)?;

        tracing::debug!(
            classes = classes.len(),
            procs = template.procs.len(),
            sample_rate = settings.sample_rate,
            frames_per_cycle = settings.frames_per_cycle,
            "flow parsed"
        );
        Ok(Self {
            classes,
            template,
            settings,
        })
    }

    /// The class descriptions.
    pub fn classes(&self) -> &ClassSet {
        &self.classes
    }

    /// The root network template.
    pub fn template(&self) -> &NetworkTemplate {
        &self.template
    }

    /// The flow-level settings.
    pub fn settings(&self) -> &FlowSettings {
        &self.settings
    }

    /// Cycle-rate parameters for building networks.
    pub fn network_config(&self) -> NetworkConfig {
        NetworkConfig {
            sample_rate: self.settings.sample_rate,
            frames_per_cycle: self.settings.frames_per_cycle,
        }
    }

    /// Default multi-preset selection flags.
    pub fn preset_flags(&self) -> SelectorFlags {
        let s = &self.settings;
        [
            (s.multi_pri_preset_prob, SelectorFlags::PROB_PRIMARY),
            (s.multi_sec_preset_prob, SelectorFlags::PROB_SECONDARY),
            (s.multi_preset_interp, SelectorFlags::INTERPOLATE),
        ]
        .into_iter()
        .filter(|(on, _)| *on)
        .fold(SelectorFlags::NONE, |acc, (_, f)| acc.union(f))
    }

    /// An empty multi-preset selector carrying the default flags.
    pub fn preset_selector(&self) -> PresetSelector {
        PresetSelector::new(self.preset_flags())
    }

    /// Cycle limit from `max_cycle_count` and `max_duration_secs`, the
    /// smaller one winning. `None` runs until end of stream.
    pub fn max_cycles(&self) -> Option<u64> {
        let s = &self.settings;
        let by_count = (s.max_cycle_count > 0).then_some(s.max_cycle_count);
        let by_time = (s.max_duration_secs > 0.0).then(|| {
            (s.max_duration_secs * s.sample_rate / s.frames_per_cycle as f64).ceil() as u64
        });
        match (by_count, by_time) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Fresh buffers for the configured devices, in label order.
    pub fn devices(&self) -> Vec<ExternalDevice> {
        self.settings
            .devices
            .iter()
            .map(|(label, spec)| {
                let dir = match spec.dir {
                    DeviceSpecDir::In => DeviceDir::In,
                    DeviceSpecDir::Out => DeviceDir::Out,
                };
                match spec.kind {
                    DeviceSpecKind::Audio => ExternalDevice::audio(
                        label.as_str(),
                        dir,
                        spec.channels,
                        self.settings.frames_per_cycle,
                    ),
                    DeviceSpecKind::Midi => ExternalDevice::midi(label.as_str(), dir),
                }
            })
            .collect()
    }

    /// Build the root network bound to `devices` and apply the initial
    /// preset, if any.
    pub fn build_network(&self, devices: Vec<ExternalDevice>) -> Result<Network, ConfigError> {
        let mut net = Network::build(&self.classes, &self.template, self.network_config(), devices)?;
        if let Some(preset) = &self.settings.preset {
            initial_preset(preset, net.apply_preset(preset, None))?;
        }
        Ok(net)
    }

    /// Build two instances of the root network for crossfading, both with
    /// the initial preset applied, mixing into the configured devices.
    pub fn create_cross(&self) -> Result<FlowCross, ConfigError> {
        let current = self.build_network(self.devices())?;
        let next = self.build_network(self.devices())?;
        Ok(FlowCross::new(current, next, self.devices()))
    }

    /// Build the network and run it until end of stream or the cycle
    /// limit.
    ///
    /// With neither a limit nor a proc that ends the stream this never
    /// returns.
    pub fn exec(&self) -> Result<RunReport, ConfigError> {
        let mut net = self.build_network(self.devices())?;
        Ok(run(&mut net, self.max_cycles())?)
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))
}

fn initial_preset(label: &str, result: Result<(), PresetError>) -> Result<(), ConfigError> {
    match result {
        Ok(()) => {
            tracing::info!(preset = %label, "initial preset applied");
            Ok(())
        }
        Err(PresetError::Partial { failures, .. }) => {
            tracing::warn!(preset = %label, failed = failures.len(), "initial preset applied partially");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Step `net` until a proc signals end of stream or `max_cycles` cycles
/// have run.
pub fn run(net: &mut Network, max_cycles: Option<u64>) -> Result<RunReport, RuntimeError> {
    run_loop(|| net.exec_cycle(), max_cycles)
}

/// Step a crossfading pair of networks until end of stream or
/// `max_cycles` cycles have run.
pub fn run_cross(cross: &mut FlowCross, max_cycles: Option<u64>) -> Result<RunReport, RuntimeError> {
    run_loop(|| cross.exec_cycle(), max_cycles)
}

fn run_loop(
    mut step: impl FnMut() -> Result<ExecStatus, RuntimeError>,
    max_cycles: Option<u64>,
) -> Result<RunReport, RuntimeError> {
    let mut cycles = 0;
    loop {
        if let Some(max) = max_cycles
            && cycles >= max
        {
            tracing::info!(cycles, "'max_cycle_count' reached");
            return Ok(RunReport {
                cycles,
                stop: StopReason::CycleLimit,
            });
        }
        let status = step()?;
        cycles += 1;
        if status == ExecStatus::EndOfStream {
            tracing::info!(cycles, "end of stream");
            return Ok(RunReport {
                cycles,
                stop: StopReason::EndOfStream,
            });
        }
    }
}
