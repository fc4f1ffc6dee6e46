//! Dual-network crossfade runtime.
//!
//! [`FlowCross`] keeps two live instances of the same network. Control
//! changes go to the [`DestId::Next`] instance while [`DestId::Current`]
//! keeps producing output. [`FlowCross::begin_cross_fade`] ramps the
//! current instance out and the next one in over a given duration, after
//! which the roles are swapped.
//!
//! Master audio inputs are copied into each audible network with its fade
//! gain applied, and the networks' audio outputs are summed into the master
//! outputs sample by sample. Devices are matched by position, so both
//! networks must be built with the same device layout as the master array.

use rand::Rng;

use crate::device::ExternalDevice;
use crate::error::{CompositionError, PresetError, RuntimeError};
use crate::network::Network;
use crate::preset::PresetSelector;
use crate::processor::ExecStatus;
use crate::value::{AudioBuf, FromValue, Value};

/// Which of the two networks an operation addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestId {
    /// The network currently heard.
    Current,
    /// The network being prepared.
    Next,
}

/// Fade state of one network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeState {
    /// Not executed.
    Inactive,
    /// Executed at full gain.
    Active,
    /// Gain ramping up.
    FadeIn,
    /// Gain ramping down.
    FadeOut,
}

/// Linear per-sample gain ramp.
#[derive(Debug, Clone)]
struct FadeRamp {
    gain: f64,
    target: f64,
    increment: f64,
    samples_remaining: usize,
}

impl FadeRamp {
    fn new(gain: f64) -> Self {
        Self {
            gain,
            target: gain,
            increment: 0.0,
            samples_remaining: 0,
        }
    }

    fn set_target(&mut self, target: f64, samples: usize) {
        self.target = target;
        if samples == 0 {
            self.gain = target;
            self.increment = 0.0;
            self.samples_remaining = 0;
        } else {
            self.increment = (target - self.gain) / samples as f64;
            self.samples_remaining = samples;
        }
    }

    #[inline]
    fn advance(&mut self) -> f64 {
        if self.samples_remaining > 0 {
            self.gain += self.increment;
            self.samples_remaining -= 1;
            if self.samples_remaining == 0 {
                self.gain = self.target;
            }
        }
        self.gain
    }

    fn is_settled(&self) -> bool {
        self.samples_remaining == 0
    }
}

struct Lane {
    net: Network,
    state: FadeState,
    ramp: FadeRamp,
}

/// Two live networks and the master device array they are mixed into.
pub struct FlowCross {
    lanes: [Lane; 2],
    cur: usize,
    devices: Vec<ExternalDevice>,
    gains: Vec<f32>,
}

impl FlowCross {
    /// Start with `current` audible and `next` idle.
    pub fn new(current: Network, next: Network, devices: Vec<ExternalDevice>) -> Self {
        for (i, net) in [&current, &next].into_iter().enumerate() {
            if net.devices().len() != devices.len() {
                tracing::warn!(
                    lane = i,
                    network_devices = net.devices().len(),
                    master_devices = devices.len(),
                    "network device layout differs from master devices"
                );
            }
        }
        let frames = current.config().frames_per_cycle;
        Self {
            lanes: [
                Lane {
                    net: current,
                    state: FadeState::Active,
                    ramp: FadeRamp::new(1.0),
                },
                Lane {
                    net: next,
                    state: FadeState::Inactive,
                    ramp: FadeRamp::new(0.0),
                },
            ],
            cur: 0,
            devices,
            gains: Vec::with_capacity(frames),
        }
    }

    fn lane(&self, dest: DestId) -> usize {
        match dest {
            DestId::Current => self.cur,
            DestId::Next => (self.cur + 1) % 2,
        }
    }

    /// The addressed network.
    pub fn network(&self, dest: DestId) -> &Network {
        &self.lanes[self.lane(dest)].net
    }

    /// The addressed network, mutably.
    pub fn network_mut(&mut self, dest: DestId) -> &mut Network {
        let i = self.lane(dest);
        &mut self.lanes[i].net
    }

    /// Fade state of the addressed network.
    pub fn state(&self, dest: DestId) -> FadeState {
        self.lanes[self.lane(dest)].state
    }

    /// True while a crossfade is in progress.
    pub fn is_fading(&self) -> bool {
        self.lanes
            .iter()
            .any(|l| matches!(l.state, FadeState::FadeIn | FadeState::FadeOut))
    }

    /// Master devices.
    pub fn devices(&self) -> &[ExternalDevice] {
        &self.devices
    }

    /// Master devices, mutably, for hosts filling inputs and draining outputs.
    pub fn devices_mut(&mut self) -> &mut [ExternalDevice] {
        &mut self.devices
    }

    /// Read a variable of the addressed network.
    pub fn get_variable<T: FromValue>(
        &self,
        dest: DestId,
        instance: &str,
        var: &str,
        channel: usize,
    ) -> Result<T, CompositionError> {
        self.network(dest).get_variable(instance, var, channel)
    }

    /// Write a variable of the addressed network.
    pub fn set_variable(
        &mut self,
        dest: DestId,
        instance: &str,
        var: &str,
        channel: usize,
        value: impl Into<Value>,
    ) -> Result<(), CompositionError> {
        self.network_mut(dest)
            .set_variable(instance, var, channel, value)
    }

    /// Apply a preset to the addressed network.
    pub fn apply_preset(
        &mut self,
        dest: DestId,
        label: &str,
        replica: Option<usize>,
    ) -> Result<(), PresetError> {
        self.network_mut(dest).apply_preset(label, replica)
    }

    /// Apply a dual preset to the addressed network.
    pub fn apply_dual_preset(
        &mut self,
        dest: DestId,
        a: &str,
        b: &str,
        coeff: f64,
        replica: Option<usize>,
    ) -> Result<(), PresetError> {
        self.network_mut(dest)
            .apply_dual_preset(a, b, coeff, replica)
    }

    /// Apply a multi-preset selection to the addressed network.
    pub fn apply_multi_preset(
        &mut self,
        dest: DestId,
        selector: &PresetSelector,
        replica: Option<usize>,
    ) -> Result<(), PresetError> {
        self.network_mut(dest)
            .apply_multi_preset(selector, replica)
    }

    /// [`apply_multi_preset`](Self::apply_multi_preset) with an explicit random source.
    pub fn apply_multi_preset_with_rng<R: Rng + ?Sized>(
        &mut self,
        dest: DestId,
        selector: &PresetSelector,
        replica: Option<usize>,
        rng: &mut R,
    ) -> Result<(), PresetError> {
        self.network_mut(dest)
            .apply_multi_preset_with_rng(selector, replica, rng)
    }

    /// Fade the current network out and the next one in over `ms`
    /// milliseconds; the next network becomes current immediately.
    pub fn begin_cross_fade(&mut self, ms: f64) {
        let sample_rate = self.lanes[self.cur].net.config().sample_rate;
        let samples = (sample_rate * ms.max(0.0) / 1000.0).round() as usize;

        let out = &mut self.lanes[self.cur];
        out.state = FadeState::FadeOut;
        out.ramp.set_target(0.0, samples);

        self.cur = (self.cur + 1) % 2;
        let incoming = &mut self.lanes[self.cur];
        incoming.state = FadeState::FadeIn;
        incoming.ramp.set_target(1.0, samples);

        tracing::info!(ms, samples, current = self.cur, "crossfade started");
    }

    /// Advance every audible network by one cycle and mix into the master outputs.
    pub fn exec_cycle(&mut self) -> Result<ExecStatus, RuntimeError> {
        let FlowCross {
            lanes,
            devices,
            gains,
            ..
        } = self;

        for dev in devices.iter_mut().filter(|d| d.is_audio_out()) {
            if let Some(buf) = dev.audio_buf_mut() {
                buf.clear();
            }
        }

        let mut status = ExecStatus::Continue;
        for (i, lane) in lanes.iter_mut().enumerate() {
            if lane.state == FadeState::Inactive {
                continue;
            }

            gains.clear();
            let frames = lane.net.config().frames_per_cycle;
            gains.extend((0..frames).map(|_| lane.ramp.advance() as f32));

            for (master, local) in devices.iter().zip(lane.net.devices_mut()) {
                if master.is_audio_in()
                    && let (Some(src), Some(dst)) = (master.audio_buf(), local.audio_buf_mut())
                {
                    feed(dst, src, gains);
                } else if local.is_audio_out()
                    && let Some(buf) = local.audio_buf_mut()
                {
                    buf.clear();
                }
            }

            if lane.net.exec_cycle()? == ExecStatus::EndOfStream {
                status = ExecStatus::EndOfStream;
            }

            for (master, local) in devices.iter_mut().zip(lane.net.devices()) {
                if master.is_audio_out()
                    && let (Some(dst), Some(src)) = (master.audio_buf_mut(), local.audio_buf())
                {
                    mix_into(dst, src, gains);
                }
            }

            if lane.ramp.is_settled() {
                match lane.state {
                    FadeState::FadeIn => {
                        lane.state = FadeState::Active;
                        tracing::info!(lane = i, "crossfade complete");
                    }
                    FadeState::FadeOut => lane.state = FadeState::Inactive,
                    FadeState::Active | FadeState::Inactive => {}
                }
            }
        }
        Ok(status)
    }
}

/// `dst = src * gain`, per frame.
fn feed(dst: &mut AudioBuf, src: &AudioBuf, gains: &[f32]) {
    let channels = dst.channels().min(src.channels());
    for ch in 0..channels {
        let out = dst.channel_mut(ch);
        for ((o, &s), &g) in out.iter_mut().zip(src.channel(ch)).zip(gains) {
            *o = s * g;
        }
    }
}

/// `dst += src * gain`, per frame.
fn mix_into(dst: &mut AudioBuf, src: &AudioBuf, gains: &[f32]) {
    let channels = dst.channels().min(src.channels());
    for ch in 0..channels {
        let out = dst.channel_mut(ch);
        for ((o, &s), &g) in out.iter_mut().zip(src.channel(ch)).zip(gains) {
            *o += s * g;
        }
    }
}
