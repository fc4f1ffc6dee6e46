//! External device descriptors.
//!
//! Devices are the endpoints a network exchanges data with: audio
//! interfaces, MIDI ports and anything else a host provides. The core only
//! sees their buffers. Procs whose class declares a device affinity are
//! bound to one device at construction time.

use crate::value::{AudioBuf, MidiMsg};

/// Kind of data a device carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    /// Audio sample buffers.
    Audio,
    /// MIDI message lists.
    Midi,
    /// Host-defined.
    Other,
}

/// Data direction as seen from the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceDir {
    /// The network reads from the device.
    In,
    /// The network writes to the device.
    Out,
}

/// Per-kind buffer handle.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceBuffer {
    /// One block of audio.
    Audio(AudioBuf),
    /// MIDI messages for one cycle.
    Midi(Vec<MidiMsg>),
    /// No buffer managed by the core.
    Other,
}

/// An external endpoint bound at network construction time.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalDevice {
    /// Device label referenced by proc specs.
    pub label: String,
    /// Direction.
    pub dir: DeviceDir,
    /// Buffer exchanged each cycle.
    pub buffer: DeviceBuffer,
}

impl ExternalDevice {
    /// An audio device with a silent buffer.
    pub fn audio(label: impl Into<String>, dir: DeviceDir, channels: usize, frames: usize) -> Self {
        Self {
            label: label.into(),
            dir,
            buffer: DeviceBuffer::Audio(AudioBuf::new(channels, frames)),
        }
    }

    /// A MIDI device with an empty message list.
    pub fn midi(label: impl Into<String>, dir: DeviceDir) -> Self {
        Self {
            label: label.into(),
            dir,
            buffer: DeviceBuffer::Midi(Vec::new()),
        }
    }

    /// Kind of data carried.
    pub fn kind(&self) -> DeviceKind {
        match self.buffer {
            DeviceBuffer::Audio(_) => DeviceKind::Audio,
            DeviceBuffer::Midi(_) => DeviceKind::Midi,
            DeviceBuffer::Other => DeviceKind::Other,
        }
    }

    /// Frames per buffer for audio devices.
    pub fn frames(&self) -> Option<usize> {
        match &self.buffer {
            DeviceBuffer::Audio(buf) => Some(buf.frames()),
            _ => None,
        }
    }

    /// Audio buffer, if this is an audio device.
    pub fn audio_buf(&self) -> Option<&AudioBuf> {
        match &self.buffer {
            DeviceBuffer::Audio(buf) => Some(buf),
            _ => None,
        }
    }

    /// Mutable audio buffer, if this is an audio device.
    pub fn audio_buf_mut(&mut self) -> Option<&mut AudioBuf> {
        match &mut self.buffer {
            DeviceBuffer::Audio(buf) => Some(buf),
            _ => None,
        }
    }

    /// True for audio devices the network reads from.
    pub fn is_audio_in(&self) -> bool {
        self.dir == DeviceDir::In && self.kind() == DeviceKind::Audio
    }

    /// True for audio devices the network writes to.
    pub fn is_audio_out(&self) -> bool {
        self.dir == DeviceDir::Out && self.kind() == DeviceKind::Audio
    }
}
