//! Per-proc variable storage.
//!
//! A [`VarBank`] holds one [`Variable`] per descriptor of the proc's class,
//! in descriptor order, each with one [`Value`] per channel. Native
//! implementations resolve the variables they use once, at construction,
//! with [`VarBank::require`], and address them by index afterwards.

use crate::error::{NativeError, ValueError};
use crate::value::{AudioBuf, Literal, Value, VarType};
use crate::var::{VarDescriptor, VarFlags};

/// Storage for one variable of a proc.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    label: String,
    ty: VarType,
    flags: VarFlags,
    channels: Vec<Value>,
}

impl Variable {
    /// Variable label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Declared type.
    pub fn var_type(&self) -> VarType {
        self.ty
    }

    /// Flags copied from the descriptor.
    pub fn flags(&self) -> VarFlags {
        self.flags
    }

    /// Number of channels.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Value of one channel.
    pub fn get(&self, ch: usize) -> Option<&Value> {
        self.channels.get(ch)
    }
}

/// Variables of one native proc.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VarBank {
    vars: Vec<Variable>,
}

impl VarBank {
    /// Allocate one single-channel variable per descriptor, initialized
    /// to its default or to the zero value of its type.
    ///
    /// On failure returns the label of the variable whose default did not
    /// convert.
    pub fn from_descriptors(descs: &[VarDescriptor]) -> Result<Self, (String, ValueError)> {
        let mut vars = Vec::with_capacity(descs.len());
        for desc in descs {
            let ty = desc.var_type();
            let mut var = Variable {
                label: desc.label.clone(),
                ty,
                flags: desc.flags,
                channels: vec![Value::zero(ty)],
            };
            if let Some(default) = &desc.default {
                assign_literal(&mut var, default).map_err(|e| (desc.label.clone(), e))?;
            }
            vars.push(var);
        }
        Ok(Self { vars })
    }

    /// Number of variables.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// True if the proc has no variables.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Index of a variable by label.
    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.vars.iter().position(|v| v.label == label)
    }

    /// Index of a variable the native implementation cannot work without.
    pub fn require(&self, label: &str) -> Result<usize, NativeError> {
        self.index_of(label)
            .ok_or_else(|| NativeError::new(format!("class does not declare variable '{label}'")))
    }

    /// Variable by index.
    pub fn variable(&self, idx: usize) -> Option<&Variable> {
        self.vars.get(idx)
    }

    /// Variables in descriptor order.
    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.vars.iter()
    }

    /// Value of one channel.
    pub fn get(&self, idx: usize, ch: usize) -> Option<&Value> {
        self.vars.get(idx).and_then(|v| v.channels.get(ch))
    }

    /// Mutable value of one channel.
    pub fn get_mut(&mut self, idx: usize, ch: usize) -> Option<&mut Value> {
        self.vars.get_mut(idx).and_then(|v| v.channels.get_mut(ch))
    }

    /// Number of channels of a variable; zero for an unknown index.
    pub fn channel_count(&self, idx: usize) -> usize {
        self.vars.get(idx).map_or(0, Variable::channel_count)
    }

    /// Resize a variable to `count` channels (at least one).
    ///
    /// New channels start as copies of channel 0.
    pub fn set_channel_count(&mut self, idx: usize, count: usize) {
        if let Some(var) = self.vars.get_mut(idx) {
            let count = count.max(1);
            let first = var.channels[0].clone();
            var.channels.resize(count, first);
        }
    }

    /// Numeric value of one channel, `0.0` when absent or non-numeric.
    pub fn f64(&self, idx: usize, ch: usize) -> f64 {
        self.get(idx, ch).and_then(Value::as_f64).unwrap_or(0.0)
    }

    /// Store a number, converted to the variable's type.
    pub fn set_f64(&mut self, idx: usize, ch: usize, x: f64) -> Result<(), ValueError> {
        if let Some(v) = self.get_mut(idx, ch) {
            *v = Value::from_f64(v.var_type(), x)?;
        }
        Ok(())
    }

    /// Audio buffer of an audio variable.
    pub fn audio(&self, idx: usize) -> Option<&AudioBuf> {
        match self.get(idx, 0) {
            Some(Value::Audio(buf)) => Some(buf),
            _ => None,
        }
    }

    /// Mutable audio buffer of an audio variable.
    pub fn audio_mut(&mut self, idx: usize) -> Option<&mut AudioBuf> {
        match self.get_mut(idx, 0) {
            Some(Value::Audio(buf)) => Some(buf),
            _ => None,
        }
    }

    /// Borrow an input audio buffer and a distinct output audio buffer at once.
    pub fn audio_io(&mut self, input: usize, output: usize) -> Option<(&AudioBuf, &mut AudioBuf)> {
        if input == output || input >= self.vars.len() || output >= self.vars.len() {
            return None;
        }
        let (src, dst) = if input < output {
            let (lo, hi) = self.vars.split_at_mut(output);
            (&lo[input], &mut hi[0])
        } else {
            let (lo, hi) = self.vars.split_at_mut(input);
            (&hi[0], &mut lo[output])
        };
        match (src.channels.first(), dst.channels.first_mut()) {
            (Some(Value::Audio(i)), Some(Value::Audio(o))) => Some((i, o)),
            _ => None,
        }
    }

    /// Allocate a silent audio buffer on an audio variable.
    pub fn alloc_audio(&mut self, idx: usize, channels: usize, frames: usize) {
        if let Some(buf) = self.audio_mut(idx) {
            buf.reshape(channels, frames);
            buf.clear();
        }
    }

    /// Apply a construction literal: a list sizes the channel count first.
    pub fn apply_literal(&mut self, idx: usize, literal: &Literal) -> Result<(), ValueError> {
        let Some(var) = self.vars.get_mut(idx) else {
            return Ok(());
        };
        if let Some(n) = literal.list_len() {
            let first = var.channels[0].clone();
            var.channels.resize(n.max(1), first);
        }
        assign_literal(var, literal)
    }
}

fn assign_literal(var: &mut Variable, literal: &Literal) -> Result<(), ValueError> {
    let ty = var.ty;
    for (ch, slot) in var.channels.iter_mut().enumerate() {
        if let Some(lit) = literal.channel(ch) {
            *slot = lit.to_value(ty)?;
        }
    }
    Ok(())
}
