//! Weighted preset application.
//!
//! Single, dual and multi-preset application all reduce to a list of
//! `(label, weight)` pairs. For every targeted variable and channel each
//! pair contributes the preset literal, or the live value when that preset
//! does not mention the variable. Numeric types take the weighted sum;
//! other types take the value with the largest weight, later entries
//! winning ties.

use std::sync::Arc;

use crate::class::{ClassDescriptor, PresetBody};
use crate::error::{PresetFieldError, ValueError};
use crate::network::{Network, ProcBody, ProcInstance};
use crate::template::{NetworkPreset, PresetRef};
use crate::value::{Value, VarType};

/// Apply `weights` to every proc of `net` that resolves at least one label.
///
/// Returns the number of procs touched. Subnet children are visited before
/// the subnet's own body.
pub(super) fn apply_network(
    net: &mut Network,
    weights: &[(String, f64)],
    replica: Option<usize>,
    failures: &mut Vec<PresetFieldError>,
) -> usize {
    let presets = Arc::clone(&net.presets);
    let mut touched = 0;
    for proc in &mut net.procs {
        if let ProcBody::Subnet { children, .. } = &mut proc.body {
            touched += apply_network(children, weights, replica, failures);
        }
        if replica.is_some_and(|r| proc.replica != Some(r)) {
            continue;
        }

        let class = Arc::clone(&proc.class);
        let mut bodies: Vec<(Option<&PresetBody>, f64)> = Vec::with_capacity(weights.len());
        for (label, w) in weights {
            match resolve_body(&presets, &class, &proc.label, label) {
                Ok(body) => bodies.push((body, *w)),
                Err(reason) => {
                    failures.push(PresetFieldError {
                        instance: proc.label.clone(),
                        var: label.clone(),
                        reason,
                    });
                    bodies.push((None, *w));
                }
            }
        }
        if bodies.iter().all(|(b, _)| b.is_none()) {
            continue;
        }
        touched += 1;
        apply_bodies(proc, &class, &bodies, failures);
    }
    touched
}

/// True if any proc in `net`, at any depth, resolves `label`.
pub(super) fn resolves(net: &Network, label: &str) -> bool {
    net.presets.iter().any(|p| p.label == label)
        || net.procs.iter().any(|p| {
            p.class.preset(label).is_some() || p.children().is_some_and(|c| resolves(c, label))
        })
}

/// The owning network's entry for the proc wins over the class preset.
fn resolve_body<'a>(
    presets: &'a [NetworkPreset],
    class: &'a ClassDescriptor,
    proc_label: &str,
    label: &str,
) -> Result<Option<&'a PresetBody>, String> {
    let entry = presets
        .iter()
        .find(|p| p.label == label)
        .and_then(|p| p.entry(proc_label));
    match entry {
        Some(PresetRef::Inline(body)) => Ok(Some(body)),
        Some(PresetRef::Class(name)) => class
            .preset(name)
            .map(Some)
            .ok_or_else(|| format!("class '{}' has no preset '{name}'", class.label)),
        None => Ok(class.preset(label)),
    }
}

/// Blend `bodies` into one proc's variables.
pub(super) fn apply_bodies(
    proc: &mut ProcInstance,
    class: &ClassDescriptor,
    bodies: &[(Option<&PresetBody>, f64)],
    failures: &mut Vec<PresetFieldError>,
) {
    let mut labels: Vec<&str> = Vec::new();
    for body in bodies.iter().filter_map(|(b, _)| *b) {
        for (label, _) in body.iter() {
            if !labels.contains(&label) {
                labels.push(label);
            }
        }
    }

    for label in labels {
        let mut fail = |reason: String| {
            failures.push(PresetFieldError {
                instance: proc.label.clone(),
                var: label.to_string(),
                reason,
            });
        };
        let Some(var) = class.var_index(label) else {
            fail("unknown variable".to_string());
            continue;
        };
        let ty = class.vars[var].var_type();
        if matches!(ty, VarType::Audio | VarType::Midi) {
            fail(format!("{ty} variables cannot be preset"));
            continue;
        }

        let channels = proc.channel_count(var);
        for (body, _) in bodies {
            if let Some(n) = body.and_then(|b| b.get(label)).and_then(|l| l.list_len())
                && n > channels
            {
                fail(format!("{n} values for {channels} channel(s)"));
            }
        }

        for ch in 0..channels {
            let result = blend_channel(proc, var, ch, ty, label, bodies)
                .and_then(|value| match value {
                    Some(v) => proc.write(var, ch, &v, true).map(|_| ()),
                    None => Ok(()),
                });
            if let Err(e) = result {
                failures.push(PresetFieldError {
                    instance: proc.label.clone(),
                    var: label.to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }
}

/// Blended value of one channel, or `None` if no body mentions it.
fn blend_channel(
    proc: &ProcInstance,
    var: usize,
    ch: usize,
    ty: VarType,
    label: &str,
    bodies: &[(Option<&PresetBody>, f64)],
) -> Result<Option<Value>, ValueError> {
    let mut mentioned = false;
    let mut sum = 0.0;
    let mut best: Option<(f64, Value)> = None;
    for (body, w) in bodies {
        let literal = body.and_then(|b| b.get(label)).and_then(|l| l.channel(ch));
        let value = match literal {
            Some(lit) => {
                mentioned = true;
                lit.to_value(ty)?
            }
            None => proc
                .value(var, ch)
                .cloned()
                .unwrap_or_else(|| Value::zero(ty)),
        };
        if ty.is_numeric() {
            sum += w * value.as_f64().unwrap_or(0.0);
        } else if best.as_ref().is_none_or(|(bw, _)| *w >= *bw) {
            best = Some((*w, value));
        }
    }
    if !mentioned {
        return Ok(None);
    }
    if ty.is_numeric() {
        Value::from_f64(ty, sum).map(Some)
    } else {
        Ok(best.map(|(_, v)| v))
    }
}
