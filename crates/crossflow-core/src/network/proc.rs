//! Proc instances.

use std::sync::Arc;

use crate::bank::VarBank;
use crate::class::ClassDescriptor;
use crate::error::{RuntimeError, ValueError};
use crate::processor::{CycleCtx, ExecStatus, Processor};
use crate::value::{Value, VarType};

use super::Network;

/// A resolved input connection, copied before the owning proc steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BoundInput {
    pub dst_var: usize,
    pub src_proc: usize,
    pub src_var: usize,
}

pub(crate) enum ProcBody {
    Native {
        processor: Box<dyn Processor>,
        vars: VarBank,
    },
    Subnet {
        children: Box<Network>,
        /// Per subnet variable: every `(child proc, child var)` it forwards to.
        /// Poly replicas of the proxied proc all receive writes; reads come
        /// from the first.
        proxies: Vec<Vec<(usize, usize)>>,
    },
}

/// One instantiated class inside a network.
pub struct ProcInstance {
    pub(crate) label: String,
    pub(crate) replica: Option<usize>,
    pub(crate) class: Arc<ClassDescriptor>,
    pub(crate) body: ProcBody,
    pub(crate) inputs: Vec<BoundInput>,
    pub(crate) device: Option<usize>,
}

impl ProcInstance {
    /// Instance label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Poly replica id, for procs inside a replicated subnet.
    pub fn replica(&self) -> Option<usize> {
        self.replica
    }

    /// Class description.
    pub fn class(&self) -> &Arc<ClassDescriptor> {
        &self.class
    }

    /// True if this proc is a subnet.
    pub fn is_subnet(&self) -> bool {
        matches!(self.body, ProcBody::Subnet { .. })
    }

    /// Internal network of a subnet proc.
    pub fn children(&self) -> Option<&Network> {
        match &self.body {
            ProcBody::Subnet { children, .. } => Some(children),
            ProcBody::Native { .. } => None,
        }
    }

    /// Variables of a native proc.
    pub fn vars(&self) -> Option<&VarBank> {
        match &self.body {
            ProcBody::Native { vars, .. } => Some(vars),
            ProcBody::Subnet { .. } => None,
        }
    }

    pub(crate) fn var_index(&self, label: &str) -> Option<usize> {
        self.class.var_index(label)
    }

    pub(crate) fn var_type(&self, var: usize) -> Option<VarType> {
        self.class.vars.get(var).map(|d| d.var_type())
    }

    pub(crate) fn channel_count(&self, var: usize) -> usize {
        match &self.body {
            ProcBody::Native { vars, .. } => vars.channel_count(var),
            ProcBody::Subnet { children, proxies } => proxies
                .get(var)
                .and_then(|targets| targets.first())
                .map_or(0, |&(p, v)| children.procs[p].channel_count(v)),
        }
    }

    pub(crate) fn value(&self, var: usize, ch: usize) -> Option<&Value> {
        match &self.body {
            ProcBody::Native { vars, .. } => vars.get(var, ch),
            ProcBody::Subnet { children, proxies } => {
                let &(p, v) = proxies.get(var)?.first()?;
                children.procs[p].value(v, ch)
            }
        }
    }

    /// Write one channel, converting to the declared type.
    ///
    /// Returns `Ok(false)` if the channel does not exist. With `notify`,
    /// native processors are told about the change.
    pub(crate) fn write(
        &mut self,
        var: usize,
        ch: usize,
        value: &Value,
        notify: bool,
    ) -> Result<bool, ValueError> {
        match &mut self.body {
            ProcBody::Native { processor, vars } => {
                let Some(slot) = vars.get_mut(var, ch) else {
                    return Ok(false);
                };
                slot.assign(value)?;
                if notify {
                    processor.notify(var, vars);
                }
                Ok(true)
            }
            ProcBody::Subnet { children, proxies } => {
                let Some(targets) = proxies.get(var) else {
                    return Ok(false);
                };
                let mut written = false;
                for &(p, v) in targets {
                    written |= children.procs[p].write(v, ch, value, notify)?;
                }
                Ok(written)
            }
        }
    }

    pub(crate) fn exec(&mut self, ctx: &mut CycleCtx<'_>) -> Result<ExecStatus, RuntimeError> {
        match &mut self.body {
            ProcBody::Native { processor, vars } => {
                ctx.bind(self.device);
                processor
                    .exec(vars, ctx)
                    .map_err(|e| RuntimeError::Step {
                        instance: self.label.clone(),
                        class: self.class.label.clone(),
                        reason: e.0,
                    })
            }
            ProcBody::Subnet { children, .. } => children.run(ctx),
        }
    }
}

impl std::fmt::Debug for ProcInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcInstance")
            .field("label", &self.label)
            .field("replica", &self.replica)
            .field("class", &self.class.label)
            .field("subnet", &self.is_subnet())
            .finish_non_exhaustive()
    }
}
