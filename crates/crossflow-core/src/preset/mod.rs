//! Preset application.
//!
//! Three operations, each optionally restricted to one poly replica:
//!
//! - [`Network::apply_preset`]: assign one preset.
//! - [`Network::apply_dual_preset`]: interpolate two presets, `v = (1-c)·a + c·b`
//!   for numeric variables; other types switch to `b` at `c >= 0.5`.
//! - [`Network::apply_multi_preset`]: resolve a [`PresetSelector`] and blend
//!   the result.
//!
//! A proc is targeted when it resolves the label: its owning network's
//! preset of that label has an entry for it, or its class declares the
//! preset. Application is best-effort; every field that fails is collected
//! into [`PresetError::Partial`] after all other fields were applied.

mod blend;
mod selector;

pub use selector::{DEFAULT_BLEND_COEFF, PresetSelector, SelectorFlags, WeightedPreset};

use rand::Rng;

use crate::error::PresetError;
use crate::network::Network;

impl Network {
    /// Apply one preset to every proc that resolves `label`.
    pub fn apply_preset(&mut self, label: &str, replica: Option<usize>) -> Result<(), PresetError> {
        self.apply_weighted(&[(label.to_string(), 1.0)], replica, label)
    }

    /// Interpolate presets `a` and `b` with `coeff` in `[0, 1]`.
    ///
    /// Variables mentioned by only one preset blend with their live value.
    pub fn apply_dual_preset(
        &mut self,
        a: &str,
        b: &str,
        coeff: f64,
        replica: Option<usize>,
    ) -> Result<(), PresetError> {
        if !(0.0..=1.0).contains(&coeff) {
            return Err(PresetError::InvalidCoeff(coeff));
        }
        self.apply_weighted(
            &[(a.to_string(), 1.0 - coeff), (b.to_string(), coeff)],
            replica,
            &format!("{a}|{b}"),
        )
    }

    /// Resolve `selector` with the thread-local random source and apply it.
    pub fn apply_multi_preset(
        &mut self,
        selector: &PresetSelector,
        replica: Option<usize>,
    ) -> Result<(), PresetError> {
        self.apply_multi_preset_with_rng(selector, replica, &mut rand::thread_rng())
    }

    /// [`apply_multi_preset`](Self::apply_multi_preset) with an explicit random source.
    pub fn apply_multi_preset_with_rng<R: Rng + ?Sized>(
        &mut self,
        selector: &PresetSelector,
        replica: Option<usize>,
        rng: &mut R,
    ) -> Result<(), PresetError> {
        let weights = selector.resolve(rng)?;
        let name = weights
            .iter()
            .map(|(l, _)| l.as_str())
            .collect::<Vec<_>>()
            .join("|");
        self.apply_weighted(&weights, replica, &name)
    }

    /// True if any proc, at any depth, resolves `label`.
    pub fn has_preset(&self, label: &str) -> bool {
        blend::resolves(self, label)
    }

    fn apply_weighted(
        &mut self,
        weights: &[(String, f64)],
        replica: Option<usize>,
        name: &str,
    ) -> Result<(), PresetError> {
        if let Some((missing, _)) = weights.iter().find(|(l, _)| !self.has_preset(l)) {
            return Err(PresetError::UnknownPreset(missing.clone()));
        }

        let mut failures = Vec::new();
        let touched = blend::apply_network(self, weights, replica, &mut failures);
        tracing::info!(preset = name, replica = ?replica, procs = touched, "preset applied");
        finish(name, failures)
    }

    /// Apply a class preset to one proc, as requested by its proc spec.
    pub(crate) fn apply_class_preset(&mut self, idx: usize, label: &str) -> Result<(), PresetError> {
        let proc = &mut self.procs[idx];
        let class = std::sync::Arc::clone(&proc.class);
        let body = class
            .preset(label)
            .ok_or_else(|| PresetError::UnknownPreset(label.to_string()))?;
        let mut failures = Vec::new();
        blend::apply_bodies(proc, &class, &[(Some(body), 1.0)], &mut failures);
        finish(label, failures)
    }
}

fn finish(name: &str, failures: Vec<crate::error::PresetFieldError>) -> Result<(), PresetError> {
    if failures.is_empty() {
        return Ok(());
    }
    for f in &failures {
        tracing::warn!(preset = name, instance = %f.instance, var = %f.var, reason = %f.reason, "preset field not applied");
    }
    Err(PresetError::Partial {
        preset: name.to_string(),
        failures,
    })
}
