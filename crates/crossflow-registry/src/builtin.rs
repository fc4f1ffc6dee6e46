//! Built-in native classes.
//!
//! Variables are looked up by label when a proc is created, so a class
//! description only has to declare the variables a class reads or writes;
//! [`BUILTIN_CLASSES`](crate::BUILTIN_CLASSES) carries the canonical ones.

use std::f64::consts::TAU;

use crossflow_core::{
    AudioBuf, CycleCtx, DeviceDir, DeviceKind, ExecStatus, NativeClass, NativeError, ProcInit,
    Processor, VarBank,
};

fn store(vars: &mut VarBank, idx: usize, x: f64) -> Result<(), NativeError> {
    vars.set_f64(idx, 0, x)
        .map_err(|e| NativeError::new(e.to_string()))
}

/// Gain applied linearly across one block, from the previous block's gain
/// to the current one, so control changes do not click.
#[derive(Debug, Clone, Copy)]
struct BlockRamp {
    last: Option<f32>,
}

impl BlockRamp {
    fn new() -> Self {
        Self { last: None }
    }

    /// Per-frame gain for frame `n` of `frames`, moving toward `target`.
    fn gains(&mut self, target: f32, frames: usize) -> impl Iterator<Item = f32> + use<> {
        let start = self.last.unwrap_or(target);
        self.last = Some(target);
        let step = if frames == 0 {
            0.0
        } else {
            (target - start) / frames as f32
        };
        (1..=frames).map(move |n| start + step * n as f32)
    }
}

// ---------------------------------------------------------------------------
// number
// ---------------------------------------------------------------------------

/// Emits `value` on `out` every cycle.
pub struct Number;

struct NumberProc {
    value: usize,
    out: usize,
}

impl NativeClass for Number {
    fn create(&self, init: &mut ProcInit<'_>) -> Result<Box<dyn Processor>, NativeError> {
        let proc = NumberProc {
            value: init.vars.require("value")?,
            out: init.vars.require("out")?,
        };
        let x = init.vars.f64(proc.value, 0);
        store(init.vars, proc.out, x)?;
        Ok(Box::new(proc))
    }
}

impl Processor for NumberProc {
    fn exec(&mut self, vars: &mut VarBank, _ctx: &mut CycleCtx<'_>) -> Result<ExecStatus, NativeError> {
        let x = vars.f64(self.value, 0);
        store(vars, self.out, x)?;
        Ok(ExecStatus::Continue)
    }
}

// ---------------------------------------------------------------------------
// counter
// ---------------------------------------------------------------------------

/// Adds `inc` to `out` every cycle; ends the stream once `out` reaches a
/// positive `limit`.
pub struct Counter;

struct CounterProc {
    inc: usize,
    limit: usize,
    out: usize,
}

impl NativeClass for Counter {
    fn create(&self, init: &mut ProcInit<'_>) -> Result<Box<dyn Processor>, NativeError> {
        Ok(Box::new(CounterProc {
            inc: init.vars.require("inc")?,
            limit: init.vars.require("limit")?,
            out: init.vars.require("out")?,
        }))
    }
}

impl Processor for CounterProc {
    fn exec(&mut self, vars: &mut VarBank, ctx: &mut CycleCtx<'_>) -> Result<ExecStatus, NativeError> {
        let out = vars.f64(self.out, 0) + vars.f64(self.inc, 0);
        store(vars, self.out, out)?;

        let limit = vars.f64(self.limit, 0);
        if limit > 0.0 && out >= limit {
            tracing::debug!(cycle = ctx.cycle_index, out, limit, "counter reached its limit");
            return Ok(ExecStatus::EndOfStream);
        }
        Ok(ExecStatus::Continue)
    }
}

// ---------------------------------------------------------------------------
// sine_tone
// ---------------------------------------------------------------------------

/// Sine oscillator writing `ch_cnt` identical channels to `out`.
pub struct SineTone;

struct SineToneProc {
    freq: usize,
    gain: usize,
    out: usize,
    phase: f64,
    ramp: BlockRamp,
}

impl NativeClass for SineTone {
    fn create(&self, init: &mut ProcInit<'_>) -> Result<Box<dyn Processor>, NativeError> {
        let ch_cnt = init.vars.require("ch_cnt")?;
        let out = init.vars.require("out")?;
        let channels = (init.vars.f64(ch_cnt, 0) as usize).max(1);
        init.vars.alloc_audio(out, channels, init.frames_per_cycle);
        Ok(Box::new(SineToneProc {
            freq: init.vars.require("freq")?,
            gain: init.vars.require("gain")?,
            out,
            phase: 0.0,
            ramp: BlockRamp::new(),
        }))
    }
}

impl Processor for SineToneProc {
    fn exec(&mut self, vars: &mut VarBank, ctx: &mut CycleCtx<'_>) -> Result<ExecStatus, NativeError> {
        let inc = TAU * vars.f64(self.freq, 0) / ctx.sample_rate;
        let gain = vars.f64(self.gain, 0) as f32;
        let frames = ctx.frames_per_cycle;
        let buf = vars
            .audio_mut(self.out)
            .ok_or_else(|| NativeError::new("'out' is not an audio variable"))?;
        if buf.frames() != frames {
            buf.reshape(buf.channels().max(1), frames);
        }

        let mut phase = self.phase;
        for (n, g) in self.ramp.gains(gain, frames).enumerate() {
            let s = g * phase.sin() as f32;
            for ch in 0..buf.channels() {
                buf.channel_mut(ch)[n] = s;
            }
            phase = (phase + inc) % TAU;
        }
        self.phase = phase;
        Ok(ExecStatus::Continue)
    }
}

// ---------------------------------------------------------------------------
// audio_gain
// ---------------------------------------------------------------------------

/// `out = in * gain`, ramping between gain changes.
pub struct AudioGain;

struct AudioGainProc {
    input: usize,
    gain: usize,
    out: usize,
    ramp: BlockRamp,
    frame_gains: Vec<f32>,
}

impl NativeClass for AudioGain {
    fn create(&self, init: &mut ProcInit<'_>) -> Result<Box<dyn Processor>, NativeError> {
        Ok(Box::new(AudioGainProc {
            input: init.vars.require("in")?,
            gain: init.vars.require("gain")?,
            out: init.vars.require("out")?,
            ramp: BlockRamp::new(),
            frame_gains: Vec::with_capacity(init.frames_per_cycle),
        }))
    }
}

impl Processor for AudioGainProc {
    fn exec(&mut self, vars: &mut VarBank, _ctx: &mut CycleCtx<'_>) -> Result<ExecStatus, NativeError> {
        let gain = vars.f64(self.gain, 0) as f32;
        let (input, out) = vars
            .audio_io(self.input, self.out)
            .ok_or_else(|| NativeError::new("'in' and 'out' must be audio variables"))?;
        out.reshape(input.channels(), input.frames());
        self.frame_gains.clear();
        self.frame_gains.extend(self.ramp.gains(gain, input.frames()));
        for ch in 0..input.channels() {
            for ((o, &i), &g) in out
                .channel_mut(ch)
                .iter_mut()
                .zip(input.channel(ch))
                .zip(&self.frame_gains)
            {
                *o = i * g;
            }
        }
        Ok(ExecStatus::Continue)
    }
}

// ---------------------------------------------------------------------------
// audio_mix
// ---------------------------------------------------------------------------

/// `out = in0 * gain0 + in1 * gain1`; the output takes the larger shape.
pub struct AudioMix;

struct AudioMixProc {
    inputs: [usize; 2],
    gains: [usize; 2],
    out: usize,
    scratch: AudioBuf,
}

impl NativeClass for AudioMix {
    fn create(&self, init: &mut ProcInit<'_>) -> Result<Box<dyn Processor>, NativeError> {
        Ok(Box::new(AudioMixProc {
            inputs: [init.vars.require("in0")?, init.vars.require("in1")?],
            gains: [init.vars.require("gain0")?, init.vars.require("gain1")?],
            out: init.vars.require("out")?,
            scratch: AudioBuf::default(),
        }))
    }
}

impl Processor for AudioMixProc {
    fn exec(&mut self, vars: &mut VarBank, _ctx: &mut CycleCtx<'_>) -> Result<ExecStatus, NativeError> {
        let (channels, frames) = self
            .inputs
            .iter()
            .filter_map(|&i| vars.audio(i))
            .fold((0, 0), |(c, f), b| (c.max(b.channels()), f.max(b.frames())));
        self.scratch.reshape(channels, frames);
        self.scratch.clear();

        for (&input, &gain) in self.inputs.iter().zip(&self.gains) {
            let g = vars.f64(gain, 0) as f32;
            let Some(buf) = vars.audio(input) else {
                continue;
            };
            for ch in 0..buf.channels() {
                for (o, &s) in self.scratch.channel_mut(ch).iter_mut().zip(buf.channel(ch)) {
                    *o += s * g;
                }
            }
        }

        let out = vars
            .audio_mut(self.out)
            .ok_or_else(|| NativeError::new("'out' is not an audio variable"))?;
        out.copy_from(&self.scratch);
        Ok(ExecStatus::Continue)
    }
}

// ---------------------------------------------------------------------------
// audio_in / audio_out
// ---------------------------------------------------------------------------

fn check_device(init: &ProcInit<'_>, dir: DeviceDir) -> Result<(usize, usize), NativeError> {
    let device = init
        .device
        .ok_or_else(|| NativeError::new("no device bound"))?;
    if device.dir != dir {
        return Err(NativeError::new(format!(
            "device '{}' has the wrong direction ({:?})",
            device.label, device.dir
        )));
    }
    let buf = device
        .audio_buf()
        .ok_or_else(|| NativeError::new(format!("device '{}' is not an audio device", device.label)))?;
    Ok((buf.channels(), buf.frames()))
}

/// Copies an input audio device into `out`.
pub struct AudioIn;

struct AudioInProc {
    out: usize,
}

impl NativeClass for AudioIn {
    fn device_kind(&self) -> Option<DeviceKind> {
        Some(DeviceKind::Audio)
    }

    fn create(&self, init: &mut ProcInit<'_>) -> Result<Box<dyn Processor>, NativeError> {
        let (channels, frames) = check_device(init, DeviceDir::In)?;
        let out = init.vars.require("out")?;
        init.vars.alloc_audio(out, channels, frames);
        Ok(Box::new(AudioInProc { out }))
    }
}

impl Processor for AudioInProc {
    fn exec(&mut self, vars: &mut VarBank, ctx: &mut CycleCtx<'_>) -> Result<ExecStatus, NativeError> {
        let src = ctx
            .device()
            .and_then(|d| d.audio_buf())
            .ok_or_else(|| NativeError::new("audio input device missing"))?;
        if let Some(out) = vars.audio_mut(self.out) {
            out.copy_from(src);
        }
        Ok(ExecStatus::Continue)
    }
}

/// Writes `in` to an output audio device, overwriting its buffer.
///
/// Input channels beyond the device's are dropped; device channels beyond
/// the input's are silenced.
pub struct AudioOut;

struct AudioOutProc {
    input: usize,
}

impl NativeClass for AudioOut {
    fn device_kind(&self) -> Option<DeviceKind> {
        Some(DeviceKind::Audio)
    }

    fn create(&self, init: &mut ProcInit<'_>) -> Result<Box<dyn Processor>, NativeError> {
        check_device(init, DeviceDir::Out)?;
        Ok(Box::new(AudioOutProc {
            input: init.vars.require("in")?,
        }))
    }
}

impl Processor for AudioOutProc {
    fn exec(&mut self, vars: &mut VarBank, ctx: &mut CycleCtx<'_>) -> Result<ExecStatus, NativeError> {
        let dst = ctx
            .device_mut()
            .and_then(|d| d.audio_buf_mut())
            .ok_or_else(|| NativeError::new("audio output device missing"))?;
        let src = vars.audio(self.input);
        for ch in 0..dst.channels() {
            let out = dst.channel_mut(ch);
            match src.filter(|s| ch < s.channels()) {
                Some(s) => {
                    let n = out.len().min(s.frames());
                    out[..n].copy_from_slice(&s.channel(ch)[..n]);
                    out[n..].fill(0.0);
                }
                None => out.fill(0.0),
            }
        }
        Ok(ExecStatus::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_ramp_starts_flat() {
        let mut ramp = BlockRamp::new();
        let first: Vec<f32> = ramp.gains(0.5, 4).collect();
        assert_eq!(first, vec![0.5; 4]);
    }

    #[test]
    fn test_block_ramp_reaches_target_on_last_frame() {
        let mut ramp = BlockRamp::new();
        let _ = ramp.gains(0.0, 4).count();
        let second: Vec<f32> = ramp.gains(1.0, 4).collect();
        assert_eq!(second, vec![0.25, 0.5, 0.75, 1.0]);
    }
}
