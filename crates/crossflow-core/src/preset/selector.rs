//! Multi-preset selection.
//!
//! A [`PresetSelector`] holds weighted primary and secondary preset sets.
//! Each set resolves either to one preset drawn with probability
//! proportional to weight, or to a normalized interpolation of all its
//! members. With [`SelectorFlags::INTERPOLATE`] the two results are blended
//! with the selector coefficient.

use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};

use crate::error::PresetError;

/// Coefficient used when the selector does not supply one.
pub const DEFAULT_BLEND_COEFF: f64 = 0.5;

/// Selection mode flags.
///
/// # Example
///
/// ```rust
/// use crossflow_core::SelectorFlags;
///
/// let flags = SelectorFlags::PROB_PRIMARY.union(SelectorFlags::INTERPOLATE);
/// assert!(flags.contains(SelectorFlags::INTERPOLATE));
/// assert!(!flags.contains(SelectorFlags::PROB_SECONDARY));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectorFlags(u8);

impl SelectorFlags {
    /// Interpolate every set; no blending between sets.
    pub const NONE: Self = Self(0);
    /// Draw one primary preset by weight.
    pub const PROB_PRIMARY: Self = Self(1 << 0);
    /// Draw one secondary preset by weight.
    pub const PROB_SECONDARY: Self = Self(1 << 1);
    /// Blend the primary and secondary results.
    pub const INTERPOLATE: Self = Self(1 << 2);

    /// Returns `true` if all bits in `other` are set in `self`.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns the union of two flag sets.
    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// A preset label with a selection weight.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedPreset {
    /// Preset label.
    pub label: String,
    /// Relative weight.
    pub weight: f64,
}

/// Weighted primary and secondary preset sets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PresetSelector {
    /// Primary candidates.
    pub primary: Vec<WeightedPreset>,
    /// Secondary candidates.
    pub secondary: Vec<WeightedPreset>,
    /// Selection mode.
    pub flags: SelectorFlags,
    /// Primary/secondary blend coefficient; [`DEFAULT_BLEND_COEFF`] if unset.
    pub coeff: Option<f64>,
}

impl PresetSelector {
    /// Empty selector.
    pub fn new(flags: SelectorFlags) -> Self {
        Self {
            flags,
            ..Self::default()
        }
    }

    /// Add a primary candidate.
    pub fn with_primary(mut self, label: impl Into<String>, weight: f64) -> Self {
        self.primary.push(WeightedPreset {
            label: label.into(),
            weight,
        });
        self
    }

    /// Add a secondary candidate.
    pub fn with_secondary(mut self, label: impl Into<String>, weight: f64) -> Self {
        self.secondary.push(WeightedPreset {
            label: label.into(),
            weight,
        });
        self
    }

    /// Set the blend coefficient.
    pub fn with_coeff(mut self, coeff: f64) -> Self {
        self.coeff = Some(coeff);
        self
    }

    /// Reduce the selector to final `(label, weight)` pairs summing to one.
    pub fn resolve<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Vec<(String, f64)>, PresetError> {
        if self.primary.is_empty() {
            return Err(PresetError::EmptySelector);
        }
        let primary = resolve_set(
            &self.primary,
            self.flags.contains(SelectorFlags::PROB_PRIMARY),
            rng,
        );
        if self.secondary.is_empty() || !self.flags.contains(SelectorFlags::INTERPOLATE) {
            return Ok(primary);
        }

        let c = self.coeff.unwrap_or(DEFAULT_BLEND_COEFF);
        if !(0.0..=1.0).contains(&c) {
            return Err(PresetError::InvalidCoeff(c));
        }
        let secondary = resolve_set(
            &self.secondary,
            self.flags.contains(SelectorFlags::PROB_SECONDARY),
            rng,
        );

        let mut out: Vec<(String, f64)> = Vec::with_capacity(primary.len() + secondary.len());
        let scaled = primary
            .into_iter()
            .map(|(l, w)| (l, w * (1.0 - c)))
            .chain(secondary.into_iter().map(|(l, w)| (l, w * c)));
        for (label, w) in scaled {
            match out.iter_mut().find(|(l, _)| *l == label) {
                Some((_, acc)) => *acc += w,
                None => out.push((label, w)),
            }
        }
        Ok(out)
    }
}

fn resolve_set<R: Rng + ?Sized>(
    set: &[WeightedPreset],
    probabilistic: bool,
    rng: &mut R,
) -> Vec<(String, f64)> {
    if probabilistic {
        return match WeightedIndex::new(set.iter().map(|p| p.weight)) {
            Ok(dist) => vec![(set[dist.sample(rng)].label.clone(), 1.0)],
            Err(e) => {
                tracing::warn!(error = %e, fallback = %set[0].label, "unusable preset weights");
                vec![(set[0].label.clone(), 1.0)]
            }
        };
    }

    let total: f64 = set.iter().map(|p| p.weight.max(0.0)).sum();
    if total <= 0.0 {
        let w = 1.0 / set.len() as f64;
        return set.iter().map(|p| (p.label.clone(), w)).collect();
    }
    set.iter()
        .filter(|p| {
            let keep = p.weight > 0.0;
            if !keep {
                tracing::warn!(preset = %p.label, weight = p.weight, "preset dropped from blend");
            }
            keep
        })
        .map(|p| (p.label.clone(), p.weight / total))
        .collect()
}
