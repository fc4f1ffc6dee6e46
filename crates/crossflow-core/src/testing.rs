//! Minimal native classes shared by unit tests.

use std::sync::Arc;

use crate::bank::VarBank;
use crate::class::{ClassDescriptor, ClassSet, PresetBody};
use crate::error::NativeError;
use crate::processor::{CycleCtx, ExecStatus, NativeClass, ProcInit, Processor};
use crate::template::{NetworkPreset, NetworkTemplate, PresetRef, ProcSpec};
use crate::value::{Literal, VarType};
use crate::var::{ProxyRef, VarDescriptor, VarFlags};

/// Does nothing.
pub(crate) struct NullClass;

struct NullProc;

impl NativeClass for NullClass {
    fn create(&self, _init: &mut ProcInit<'_>) -> Result<Box<dyn Processor>, NativeError> {
        Ok(Box::new(NullProc))
    }
}

impl Processor for NullProc {
    fn exec(&mut self, _vars: &mut VarBank, _ctx: &mut CycleCtx<'_>) -> Result<ExecStatus, NativeError> {
        Ok(ExecStatus::Continue)
    }
}

/// Copies `x` to `y` each cycle.
pub(crate) struct CopyClass;

struct CopyProc {
    x: usize,
    y: usize,
}

impl NativeClass for CopyClass {
    fn create(&self, init: &mut ProcInit<'_>) -> Result<Box<dyn Processor>, NativeError> {
        Ok(Box::new(CopyProc {
            x: init.vars.require("x")?,
            y: init.vars.require("y")?,
        }))
    }
}

impl Processor for CopyProc {
    fn exec(&mut self, vars: &mut VarBank, _ctx: &mut CycleCtx<'_>) -> Result<ExecStatus, NativeError> {
        let x = vars.f64(self.x, 0);
        vars.set_f64(self.y, 0, x)
            .map_err(|e| NativeError::new(e.to_string()))?;
        Ok(ExecStatus::Continue)
    }
}

/// `param`: float `x`, float `y`, string `mode`, bool `on`, int `steps`.
pub(crate) fn param_class(label: &str) -> ClassDescriptor {
    ClassDescriptor::plain(label, Arc::new(CopyClass))
        .with_var(VarDescriptor::new("x", "input value", VarType::Float))
        .with_var(VarDescriptor::new("y", "output value", VarType::Float))
        .with_var(
            VarDescriptor::new("mode", "mode name", VarType::String)
                .with_default(Literal::String("clean".into())),
        )
        .with_var(VarDescriptor::new("on", "enable", VarType::Bool))
        .with_var(VarDescriptor::new("steps", "step count", VarType::Int))
}

/// Class set used across unit tests.
///
/// - `param` with presets `a` and `b`
/// - `counter_vars` (uint `n`)
/// - `sink` (`in` flagged `src`)
/// - `voice`, a subnet around one `param` proc exposing `freq` → `osc.x`
pub(crate) fn classes() -> ClassSet {
    let mut set = ClassSet::new();
    let param = param_class("param")
        .with_preset(
            "a",
            PresetBody::new()
                .with("x", Literal::Float(100.0))
                .with("mode", Literal::String("soft".into()))
                .with("on", Literal::Bool(false))
                .with("steps", Literal::Int(2)),
        )
        .with_preset(
            "b",
            PresetBody::new()
                .with("x", Literal::Float(200.0))
                .with("mode", Literal::String("hard".into()))
                .with("on", Literal::Bool(true))
                .with("steps", Literal::Int(5)),
        );
    set.insert(param).ok();
    set.insert(
        ClassDescriptor::plain("counter_vars", Arc::new(NullClass))
            .with_var(VarDescriptor::new("n", "count", VarType::UInt)),
    )
    .ok();
    set.insert(
        ClassDescriptor::plain("sink", Arc::new(NullClass)).with_var(
            VarDescriptor::new("in", "input", VarType::Float).with_flags(VarFlags::SRC),
        ),
    )
    .ok();

    let inner = NetworkTemplate::new()
        .with_proc(ProcSpec::new("osc", "param"))
        .with_preset(
            NetworkPreset::new("a").with(
                "osc",
                PresetRef::Inline(PresetBody::new().with("x", Literal::Float(110.0))),
            ),
        );
    let mut freq = VarDescriptor::new("freq", "voice frequency", VarType::Float);
    freq.proxy = Some(ProxyRef {
        proc: "osc".into(),
        var: "x".into(),
    });
    set.insert(
        ClassDescriptor::subnet("voice", inner)
            .with_var(freq)
            .with_preset("c", PresetBody::new().with("freq", Literal::Float(330.0))),
    )
    .ok();
    set
}
