//! Typed variable access by label or by pre-resolved [`VarId`].

use crate::error::CompositionError;
use crate::value::{FromValue, Value};

use super::Network;

/// Pre-resolved address of one variable channel in a network.
///
/// Obtained once with [`Network::var_id`] and reused by control surfaces
/// to skip label lookups on every access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarId {
    proc: usize,
    var: usize,
    channel: usize,
}

impl VarId {
    /// Index of the proc in creation order.
    pub fn proc_index(self) -> usize {
        self.proc
    }

    /// Index of the variable within its class.
    pub fn var_index(self) -> usize {
        self.var
    }

    /// Channel index.
    pub fn channel(self) -> usize {
        self.channel
    }
}

impl Network {
    /// Resolve `instance.var[channel]` to a [`VarId`].
    ///
    /// Within replicated subnets the first replica is chosen; use
    /// [`replica_var_id`](Self::replica_var_id) to address another one.
    pub fn var_id(&self, instance: &str, var: &str, channel: usize) -> Result<VarId, CompositionError> {
        let proc = self
            .procs
            .iter()
            .position(|p| p.label == instance)
            .ok_or_else(|| CompositionError::UnknownInstance(instance.to_string()))?;
        self.resolve(proc, var, channel)
    }

    /// Resolve a variable on one poly replica of `instance`.
    pub fn replica_var_id(
        &self,
        instance: &str,
        replica: usize,
        var: &str,
        channel: usize,
    ) -> Result<VarId, CompositionError> {
        let proc = self
            .procs
            .iter()
            .position(|p| p.label == instance && p.replica == Some(replica))
            .ok_or_else(|| CompositionError::UnknownInstance(format!("{instance}[{replica}]")))?;
        self.resolve(proc, var, channel)
    }

    fn resolve(&self, proc: usize, var: &str, channel: usize) -> Result<VarId, CompositionError> {
        let p = &self.procs[proc];
        let v = p
            .var_index(var)
            .ok_or_else(|| CompositionError::UnknownVariable {
                instance: p.label.clone(),
                var: var.to_string(),
            })?;
        let count = p.channel_count(v);
        if channel >= count {
            return Err(CompositionError::ChannelOutOfRange {
                instance: p.label.clone(),
                var: var.to_string(),
                channel,
                count,
            });
        }
        Ok(VarId {
            proc,
            var: v,
            channel,
        })
    }

    /// Current value behind a [`VarId`].
    pub fn value_by_id(&self, id: VarId) -> Result<&Value, CompositionError> {
        self.procs
            .get(id.proc)
            .and_then(|p| p.value(id.var, id.channel))
            .ok_or(CompositionError::InvalidVarId)
    }

    /// Read a variable converted to `T`.
    pub fn get_by_id<T: FromValue>(&self, id: VarId) -> Result<T, CompositionError> {
        let value = self.value_by_id(id)?;
        T::from_value(value).map_err(|source| self.invalid(id, source))
    }

    /// Write a variable, converting to its declared type.
    ///
    /// Native processors are notified of the change.
    pub fn set_by_id(&mut self, id: VarId, value: impl Into<Value>) -> Result<(), CompositionError> {
        let value = value.into();
        let proc = self
            .procs
            .get_mut(id.proc)
            .ok_or(CompositionError::InvalidVarId)?;
        match proc.write(id.var, id.channel, &value, true) {
            Ok(true) => Ok(()),
            Ok(false) => Err(CompositionError::InvalidVarId),
            Err(source) => Err(self.invalid(id, source)),
        }
    }

    /// Read `instance.var[channel]` converted to `T`.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// net.set_variable("osc1", "freq", 0, 440.0_f32)?;
    /// let hz: f32 = net.get_variable("osc1", "freq", 0)?;
    /// assert_eq!(hz, 440.0);
    /// ```
    pub fn get_variable<T: FromValue>(
        &self,
        instance: &str,
        var: &str,
        channel: usize,
    ) -> Result<T, CompositionError> {
        let id = self.var_id(instance, var, channel)?;
        self.get_by_id(id)
    }

    /// Raw value of `instance.var[channel]`.
    pub fn get_value(&self, instance: &str, var: &str, channel: usize) -> Result<&Value, CompositionError> {
        let id = self.var_id(instance, var, channel)?;
        self.value_by_id(id)
    }

    /// Write `instance.var[channel]`, converting to the declared type.
    pub fn set_variable(
        &mut self,
        instance: &str,
        var: &str,
        channel: usize,
        value: impl Into<Value>,
    ) -> Result<(), CompositionError> {
        let id = self.var_id(instance, var, channel)?;
        self.set_by_id(id, value)
    }

    /// Number of channels of `instance.var`.
    pub fn channel_count(&self, instance: &str, var: &str) -> Result<usize, CompositionError> {
        let id = self.var_id(instance, var, 0)?;
        Ok(self.procs[id.proc].channel_count(id.var))
    }

    fn invalid(&self, id: VarId, source: crate::error::ValueError) -> CompositionError {
        let p = &self.procs[id.proc];
        CompositionError::InvalidValue {
            instance: p.label.clone(),
            var: p.class.vars[id.var].label.clone(),
            source,
        }
    }
}
