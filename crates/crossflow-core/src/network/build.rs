//! Network instantiation from templates.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;

use crate::bank::VarBank;
use crate::class::{ClassDescriptor, ClassKind, ClassSet};
use crate::device::ExternalDevice;
use crate::error::CompositionError;
use crate::processor::ProcInit;
use crate::template::{NetworkTemplate, ProcSpec};
use crate::value::{Literal, VarType};
use crate::var::{ProxyRef, VarFlags};

use super::proc::{BoundInput, ProcBody, ProcInstance};
use super::{Network, NetworkConfig};

pub(super) struct Builder<'a> {
    classes: &'a ClassSet,
    config: NetworkConfig,
    devices: &'a [ExternalDevice],
}

impl<'a> Builder<'a> {
    pub(super) fn new(
        classes: &'a ClassSet,
        config: NetworkConfig,
        devices: &'a [ExternalDevice],
    ) -> Self {
        Self {
            classes,
            config,
            devices,
        }
    }

    /// Build one network level.
    ///
    /// `replica` is the poly replica id inherited from an enclosing
    /// replicated subnet. `proxied` lists the internal variables exposed by
    /// the owning subnet; their sources are checked one level up.
    pub(super) fn network(
        &self,
        label: &str,
        template: &NetworkTemplate,
        replica: Option<usize>,
        proxied: &[&ProxyRef],
    ) -> Result<Network, CompositionError> {
        for (i, spec) in template.procs.iter().enumerate() {
            if template.procs[..i].iter().any(|p| p.label == spec.label) {
                return Err(CompositionError::DuplicateInstance(spec.label.clone()));
            }
        }

        let mut procs = Vec::new();
        let mut specs: Vec<&ProcSpec> = Vec::new();
        for spec in &template.procs {
            let class = self
                .classes
                .get(&spec.class)
                .ok_or_else(|| CompositionError::UnknownClass {
                    instance: spec.label.clone(),
                    class: spec.class.clone(),
                })?;

            let replicas: Vec<Option<usize>> = match spec.poly_cnt {
                Some(_) if !class.is_subnet() => {
                    return Err(CompositionError::PolyOnPlainClass(spec.label.clone()));
                }
                Some(_) if replica.is_some() => {
                    return Err(CompositionError::NestedPoly(spec.label.clone()));
                }
                Some(n) => (0..n.max(1)).map(Some).collect(),
                None => vec![replica],
            };
            for r in replicas {
                procs.push(self.proc(spec, class, r)?);
                specs.push(spec);
            }
        }

        check_poly_limits(&procs)?;
        for i in 0..procs.len() {
            let inputs = bind_inputs(&procs, i, specs[i])?;
            procs[i].inputs = inputs;
        }
        check_sources(&procs, proxied)?;
        let order = execution_order(&procs)?;

        let mut net = Network {
            label: label.to_string(),
            procs,
            order,
            presets: Arc::new(template.presets.clone()),
            devices: Vec::new(),
            config: self.config,
            cycle_index: 0,
        };

        for (i, spec) in specs.iter().enumerate() {
            if let Some(preset) = &spec.preset {
                net.apply_class_preset(i, preset)
                    .map_err(|source| CompositionError::Preset {
                        instance: spec.label.clone(),
                        source,
                    })?;
            }
        }
        Ok(net)
    }

    fn proc(
        &self,
        spec: &ProcSpec,
        class: &Arc<ClassDescriptor>,
        replica: Option<usize>,
    ) -> Result<ProcInstance, CompositionError> {
        let device = match &spec.device {
            Some(label) => Some(
                self.devices
                    .iter()
                    .position(|d| d.label == *label)
                    .ok_or_else(|| CompositionError::UnknownDevice {
                        instance: spec.label.clone(),
                        device: label.clone(),
                    })?,
            ),
            None => None,
        };

        let body = match &class.kind {
            ClassKind::Plain(native) => {
                if native.device_kind().is_some() && device.is_none() {
                    return Err(CompositionError::DeviceRequired {
                        instance: spec.label.clone(),
                        class: class.label.clone(),
                    });
                }
                let mut vars = VarBank::from_descriptors(&class.vars).map_err(|(var, source)| {
                    CompositionError::InvalidValue {
                        instance: spec.label.clone(),
                        var,
                        source,
                    }
                })?;
                for (label, literal) in spec.args.iter() {
                    let idx = vars.index_of(label).ok_or_else(|| unknown_var(spec, label))?;
                    vars.apply_literal(idx, literal)
                        .map_err(|source| CompositionError::InvalidValue {
                            instance: spec.label.clone(),
                            var: label.to_string(),
                            source,
                        })?;
                }
                let mut init = ProcInit {
                    instance: &spec.label,
                    vars: &mut vars,
                    sample_rate: self.config.sample_rate,
                    frames_per_cycle: self.config.frames_per_cycle,
                    device: device.and_then(|i| self.devices.get(i)),
                };
                let processor =
                    native
                        .create(&mut init)
                        .map_err(|e| CompositionError::Construct {
                            instance: spec.label.clone(),
                            class: class.label.clone(),
                            reason: e.0,
                        })?;
                ProcBody::Native { processor, vars }
            }
            ClassKind::Subnet(template) => {
                let exposed: Vec<&ProxyRef> =
                    class.vars.iter().filter_map(|v| v.proxy.as_ref()).collect();
                let children = self.network(&spec.label, template, replica, &exposed)?;
                let proxies = class
                    .vars
                    .iter()
                    .map(|desc| {
                        let proxy = desc.proxy.as_ref().ok_or_else(|| unknown_var(spec, &desc.label))?;
                        let targets: Vec<(usize, usize)> = children
                            .procs
                            .iter()
                            .enumerate()
                            .filter(|(_, p)| p.label == proxy.proc)
                            .filter_map(|(i, p)| p.var_index(&proxy.var).map(|v| (i, v)))
                            .collect();
                        if targets.is_empty() {
                            return Err(CompositionError::UnknownVariable {
                                instance: format!("{}/{}", spec.label, proxy.proc),
                                var: proxy.var.clone(),
                            });
                        }
                        Ok(targets)
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                ProcBody::Subnet {
                    children: Box::new(children),
                    proxies,
                }
            }
        };

        let mut proc = ProcInstance {
            label: spec.label.clone(),
            replica,
            class: Arc::clone(class),
            body,
            inputs: Vec::new(),
            device,
        };

        if proc.is_subnet() {
            for (idx, desc) in class.vars.iter().enumerate() {
                if let Some(default) = &desc.default
                    && !desc.default_inherited
                {
                    write_literal(&mut proc, idx, default)?;
                }
            }
            for (label, literal) in spec.args.iter() {
                let idx = proc.var_index(label).ok_or_else(|| unknown_var(spec, label))?;
                write_literal(&mut proc, idx, literal)?;
            }
        }

        tracing::debug!(
            instance = %proc.label,
            class = %class.label,
            replica = ?replica,
            "proc created"
        );
        Ok(proc)
    }
}

fn unknown_var(spec: &ProcSpec, var: &str) -> CompositionError {
    CompositionError::UnknownVariable {
        instance: spec.label.clone(),
        var: var.to_string(),
    }
}

/// Assign a literal through a proc's (possibly proxied) variable.
fn write_literal(
    proc: &mut ProcInstance,
    var: usize,
    literal: &Literal,
) -> Result<(), CompositionError> {
    let ty = proc.var_type(var).unwrap_or(VarType::Double);
    let instance = proc.label.clone();
    let label = proc.class.vars[var].label.clone();
    let invalid = |source| CompositionError::InvalidValue {
        instance: instance.clone(),
        var: label.clone(),
        source,
    };
    for ch in 0..proc.channel_count(var) {
        if let Some(lit) = literal.channel(ch) {
            let value = lit.to_value(ty).map_err(invalid)?;
            proc.write(var, ch, &value, false).map_err(invalid)?;
        }
    }
    Ok(())
}

fn check_poly_limits(procs: &[ProcInstance]) -> Result<(), CompositionError> {
    let mut counts: HashMap<&str, (usize, Option<usize>)> = HashMap::new();
    for p in procs {
        let entry = counts
            .entry(p.class.label.as_str())
            .or_insert((0, p.class.poly_limit));
        entry.0 += 1;
    }
    for (class, (count, limit)) in counts {
        if let Some(limit) = limit
            && count > limit
        {
            return Err(CompositionError::PolyLimit {
                class: class.to_string(),
                limit,
                count,
            });
        }
    }
    Ok(())
}

/// Source proc for a connection: same replica first, then unreplicated,
/// then any proc with the label.
fn find_source(procs: &[ProcInstance], label: &str, replica: Option<usize>) -> Option<usize> {
    procs
        .iter()
        .position(|p| p.label == label && p.replica == replica)
        .or_else(|| {
            procs
                .iter()
                .position(|p| p.label == label && p.replica.is_none())
        })
        .or_else(|| procs.iter().position(|p| p.label == label))
}

fn connectable(src: VarType, dst: VarType) -> bool {
    let scalar = |t: VarType| t.is_numeric() || t == VarType::Bool;
    src == dst || (scalar(src) && scalar(dst))
}

fn bind_inputs(
    procs: &[ProcInstance],
    i: usize,
    spec: &ProcSpec,
) -> Result<Vec<BoundInput>, CompositionError> {
    let dst = &procs[i];
    let mut inputs = Vec::with_capacity(spec.inputs.len());
    for input in &spec.inputs {
        let bad = |reason: String| CompositionError::BadConnection {
            instance: dst.label.clone(),
            var: input.var.clone(),
            source_ref: input.source.clone(),
            reason,
        };
        let dst_var = dst
            .var_index(&input.var)
            .ok_or_else(|| unknown_var(spec, &input.var))?;
        let source = ProxyRef::parse(&input.source).map_err(|r| bad(r.to_string()))?;
        let src_proc = find_source(procs, &source.proc, dst.replica)
            .ok_or_else(|| bad(format!("no proc labelled '{}'", source.proc)))?;
        if src_proc == i {
            return Err(CompositionError::ConnectionCycle(dst.label.clone()));
        }
        let src = &procs[src_proc];
        let src_var = src
            .var_index(&source.var)
            .ok_or_else(|| bad(format!("'{}' has no variable '{}'", source.proc, source.var)))?;
        if let (Some(s), Some(d)) = (src.var_type(src_var), dst.var_type(dst_var))
            && !connectable(s, d)
        {
            return Err(bad(format!("cannot connect {s} to {d}")));
        }
        inputs.push(BoundInput {
            dst_var,
            src_proc,
            src_var,
        });
    }
    Ok(inputs)
}

fn check_sources(procs: &[ProcInstance], proxied: &[&ProxyRef]) -> Result<(), CompositionError> {
    for p in procs {
        for (v, desc) in p.class.vars.iter().enumerate() {
            if !desc.flags.contains(VarFlags::SRC) {
                continue;
            }
            let connected = p.inputs.iter().any(|b| b.dst_var == v);
            let exposed = proxied
                .iter()
                .any(|r| r.proc == p.label && r.var == desc.label);
            if !connected && !exposed {
                return Err(CompositionError::MissingSource {
                    instance: p.label.clone(),
                    var: desc.label.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Kahn's algorithm, always releasing the lowest ready index first so that
/// creation order survives wherever the connections allow it.
fn execution_order(procs: &[ProcInstance]) -> Result<Vec<usize>, CompositionError> {
    let n = procs.len();
    let mut in_degree = vec![0usize; n];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (i, p) in procs.iter().enumerate() {
        for input in &p.inputs {
            dependents[input.src_proc].push(i);
            in_degree[i] += 1;
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> =
        (0..n).filter(|&i| in_degree[i] == 0).map(Reverse).collect();
    let mut sorted = Vec::with_capacity(n);
    while let Some(Reverse(idx)) = ready.pop() {
        sorted.push(idx);
        for &d in &dependents[idx] {
            in_degree[d] -= 1;
            if in_degree[d] == 0 {
                ready.push(Reverse(d));
            }
        }
    }

    if sorted.len() != n {
        let stuck = (0..n).find(|&i| in_degree[i] > 0).unwrap_or(0);
        return Err(CompositionError::ConnectionCycle(procs[stuck].label.clone()));
    }
    Ok(sorted)
}
