//! Typed variable values.
//!
//! Every proc variable stores one [`Value`] per channel. The declared
//! [`VarType`] of the variable fixes the variant; assignments from other
//! numeric types are converted, anything else is rejected with a
//! [`ValueError`].
//!
//! Configuration literals arrive as [`Literal`]s and are converted to the
//! declared type lazily, when a default, argument or preset is applied.

use std::fmt;

use crate::error::ValueError;

/// Declared type of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarType {
    /// Boolean switch.
    Bool,
    /// Signed 32-bit integer.
    Int,
    /// Unsigned 32-bit integer.
    UInt,
    /// Single-precision float.
    Float,
    /// Double-precision float.
    Double,
    /// Text.
    String,
    /// Multi-channel audio block.
    Audio,
    /// MIDI message list for one cycle.
    Midi,
}

impl VarType {
    /// Parse a type label as written in a class description.
    ///
    /// Accepts the aliases `srate`, `sample` and `coeff` (float) and
    /// `ftime` (double).
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "bool" => Some(Self::Bool),
            "int" => Some(Self::Int),
            "uint" => Some(Self::UInt),
            "float" | "srate" | "sample" | "coeff" => Some(Self::Float),
            "double" | "ftime" => Some(Self::Double),
            "string" => Some(Self::String),
            "audio" => Some(Self::Audio),
            "midi" => Some(Self::Midi),
            _ => None,
        }
    }

    /// Canonical label.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::UInt => "uint",
            Self::Float => "float",
            Self::Double => "double",
            Self::String => "string",
            Self::Audio => "audio",
            Self::Midi => "midi",
        }
    }

    /// True for the types blended arithmetically by dual/multi presets.
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Int | Self::UInt | Self::Float | Self::Double)
    }
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A block of audio: `channels` planes of `frames` samples each.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioBuf {
    channels: usize,
    frames: usize,
    samples: Vec<f32>,
}

impl AudioBuf {
    /// Allocate a silent buffer.
    pub fn new(channels: usize, frames: usize) -> Self {
        Self {
            channels,
            frames,
            samples: vec![0.0; channels * frames],
        }
    }

    /// Number of channels.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Number of frames per channel.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Samples of one channel.
    ///
    /// # Panics
    ///
    /// Panics if `ch >= self.channels()`.
    pub fn channel(&self, ch: usize) -> &[f32] {
        &self.samples[ch * self.frames..(ch + 1) * self.frames]
    }

    /// Mutable samples of one channel.
    ///
    /// # Panics
    ///
    /// Panics if `ch >= self.channels()`.
    pub fn channel_mut(&mut self, ch: usize) -> &mut [f32] {
        &mut self.samples[ch * self.frames..(ch + 1) * self.frames]
    }

    /// Zero every sample.
    pub fn clear(&mut self) {
        self.samples.fill(0.0);
    }

    /// Change the shape, zeroing the content if it changed.
    pub fn reshape(&mut self, channels: usize, frames: usize) {
        if self.channels != channels || self.frames != frames {
            self.channels = channels;
            self.frames = frames;
            self.samples.clear();
            self.samples.resize(channels * frames, 0.0);
        }
    }

    /// Copy another buffer's shape and content. Allocates only on a shape change.
    pub fn copy_from(&mut self, other: &AudioBuf) {
        self.reshape(other.channels, other.frames);
        self.samples.copy_from_slice(&other.samples);
    }

    /// All samples, channel-major.
    pub fn as_slice(&self) -> &[f32] {
        &self.samples
    }
}

/// A raw three-byte MIDI message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MidiMsg {
    /// Status byte.
    pub status: u8,
    /// First data byte.
    pub d0: u8,
    /// Second data byte.
    pub d1: u8,
}

/// One typed variable value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i32),
    /// Unsigned integer.
    UInt(u32),
    /// Single-precision float.
    Float(f32),
    /// Double-precision float.
    Double(f64),
    /// Text.
    String(String),
    /// Audio block.
    Audio(AudioBuf),
    /// MIDI messages.
    Midi(Vec<MidiMsg>),
}

impl Value {
    /// The zero value of a type.
    pub fn zero(ty: VarType) -> Self {
        match ty {
            VarType::Bool => Value::Bool(false),
            VarType::Int => Value::Int(0),
            VarType::UInt => Value::UInt(0),
            VarType::Float => Value::Float(0.0),
            VarType::Double => Value::Double(0.0),
            VarType::String => Value::String(String::new()),
            VarType::Audio => Value::Audio(AudioBuf::default()),
            VarType::Midi => Value::Midi(Vec::new()),
        }
    }

    /// Type of this value.
    pub fn var_type(&self) -> VarType {
        match self {
            Value::Bool(_) => VarType::Bool,
            Value::Int(_) => VarType::Int,
            Value::UInt(_) => VarType::UInt,
            Value::Float(_) => VarType::Float,
            Value::Double(_) => VarType::Double,
            Value::String(_) => VarType::String,
            Value::Audio(_) => VarType::Audio,
            Value::Midi(_) => VarType::Midi,
        }
    }

    /// Numeric view of booleans and numbers.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Bool(b) => Some(if b { 1.0 } else { 0.0 }),
            Value::Int(x) => Some(f64::from(x)),
            Value::UInt(x) => Some(f64::from(x)),
            Value::Float(x) => Some(f64::from(x)),
            Value::Double(x) => Some(x),
            _ => None,
        }
    }

    /// Build a value of type `ty` from a number.
    ///
    /// Integer targets round to nearest and reject out-of-range input.
    /// A boolean target is true for any non-zero input.
    pub fn from_f64(ty: VarType, x: f64) -> Result<Self, ValueError> {
        let out_of_range = || ValueError::OutOfRange {
            ty,
            value: x.to_string(),
        };
        match ty {
            VarType::Bool => Ok(Value::Bool(x != 0.0)),
            VarType::Int => {
                let r = x.round();
                if !r.is_finite() || r < f64::from(i32::MIN) || r > f64::from(i32::MAX) {
                    return Err(out_of_range());
                }
                Ok(Value::Int(r as i32))
            }
            VarType::UInt => {
                let r = x.round();
                if !r.is_finite() || r < 0.0 || r > f64::from(u32::MAX) {
                    return Err(out_of_range());
                }
                Ok(Value::UInt(r as u32))
            }
            VarType::Float => Ok(Value::Float(x as f32)),
            VarType::Double => Ok(Value::Double(x)),
            VarType::String | VarType::Audio | VarType::Midi => Err(ValueError::Mismatch {
                expected: ty,
                found: format!("number {x}"),
            }),
        }
    }

    /// Convert to another type, following the numeric conversion rules.
    pub fn convert(&self, ty: VarType) -> Result<Value, ValueError> {
        if self.var_type() == ty {
            return Ok(self.clone());
        }
        match self.as_f64() {
            Some(x) if ty.is_numeric() || ty == VarType::Bool => Value::from_f64(ty, x),
            _ => Err(ValueError::Mismatch {
                expected: ty,
                found: self.describe(),
            }),
        }
    }

    /// Overwrite in place, keeping this value's type.
    ///
    /// Same-typed buffers are reused so steady-state copies do not allocate.
    pub fn assign(&mut self, src: &Value) -> Result<(), ValueError> {
        match (&mut *self, src) {
            (Value::Audio(dst), Value::Audio(s)) => dst.copy_from(s),
            (Value::Midi(dst), Value::Midi(s)) => {
                dst.clear();
                dst.extend_from_slice(s);
            }
            (Value::String(dst), Value::String(s)) => {
                dst.clear();
                dst.push_str(s);
            }
            (dst, s) => *dst = s.convert(dst.var_type())?,
        }
        Ok(())
    }

    /// Short description for error messages.
    pub fn describe(&self) -> String {
        match self {
            Value::Bool(b) => format!("bool {b}"),
            Value::Int(x) => format!("int {x}"),
            Value::UInt(x) => format!("uint {x}"),
            Value::Float(x) => format!("float {x}"),
            Value::Double(x) => format!("double {x}"),
            Value::String(s) => format!("string {s:?}"),
            Value::Audio(_) => "audio".to_string(),
            Value::Midi(_) => "midi".to_string(),
        }
    }
}

/// Types readable from and writable to a variable through the typed access API.
pub trait FromValue: Sized {
    /// Extract after converting to the matching [`VarType`].
    fn from_value(value: &Value) -> Result<Self, ValueError>;
}

macro_rules! scalar_value {
    ($t:ty, $variant:ident) => {
        impl FromValue for $t {
            fn from_value(value: &Value) -> Result<Self, ValueError> {
                match value.convert(VarType::$variant)? {
                    Value::$variant(x) => Ok(x),
                    other => Err(ValueError::Mismatch {
                        expected: VarType::$variant,
                        found: other.describe(),
                    }),
                }
            }
        }

        impl From<$t> for Value {
            fn from(x: $t) -> Self {
                Value::$variant(x)
            }
        }
    };
}

scalar_value!(bool, Bool);
scalar_value!(i32, Int);
scalar_value!(u32, UInt);
scalar_value!(f32, Float);
scalar_value!(f64, Double);
scalar_value!(String, String);

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

/// An untyped configuration literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Boolean literal.
    Bool(bool),
    /// Integer literal.
    Int(i64),
    /// Floating-point literal.
    Float(f64),
    /// String literal.
    String(String),
    /// Per-channel list: element `i` assigns channel `i`.
    List(Vec<Literal>),
}

impl Literal {
    /// The literal for one channel. Scalars apply to every channel.
    pub fn channel(&self, ch: usize) -> Option<&Literal> {
        match self {
            Literal::List(items) => items.get(ch),
            other => Some(other),
        }
    }

    /// Number of channels a list literal spans; `None` for scalars.
    pub fn list_len(&self) -> Option<usize> {
        match self {
            Literal::List(items) => Some(items.len()),
            _ => None,
        }
    }

    /// Convert a scalar literal to a value of type `ty`.
    pub fn to_value(&self, ty: VarType) -> Result<Value, ValueError> {
        match self {
            Literal::Bool(b) => Value::Bool(*b).convert(ty),
            Literal::Int(i) => match ty {
                VarType::Int => i32::try_from(*i).map(Value::Int),
                VarType::UInt => u32::try_from(*i).map(Value::UInt),
                _ => return Value::from_f64(ty, *i as f64),
            }
            .map_err(|_| ValueError::OutOfRange {
                ty,
                value: i.to_string(),
            }),
            Literal::Float(x) => Value::from_f64(ty, *x),
            Literal::String(s) if ty == VarType::String => Ok(Value::String(s.clone())),
            Literal::String(s) => Err(ValueError::Mismatch {
                expected: ty,
                found: format!("string {s:?}"),
            }),
            Literal::List(_) => Err(ValueError::Mismatch {
                expected: ty,
                found: "nested list".to_string(),
            }),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Int(i) => write!(f, "{i}"),
            Literal::Float(x) => write!(f, "{x}"),
            Literal::String(s) => write!(f, "{s:?}"),
            Literal::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}
