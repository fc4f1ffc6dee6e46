//! Property-based tests for crossflow-core presets and variable access.
//!
//! Checks blend bounds, preset idempotence and typed round trips using
//! proptest for randomized input generation.

use std::sync::Arc;

use crossflow_core::{
    ClassDescriptor, ClassSet, CycleCtx, ExecStatus, Literal, NativeClass, NativeError, Network,
    NetworkConfig, NetworkTemplate, PresetBody, PresetSelector, ProcInit, ProcSpec, Processor,
    SelectorFlags, VarBank, VarDescriptor, VarType,
};
use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;

/// Holds its variables; never changes them.
struct Hold;

struct HoldProc;

impl NativeClass for Hold {
    fn create(&self, _init: &mut ProcInit<'_>) -> Result<Box<dyn Processor>, NativeError> {
        Ok(Box::new(HoldProc))
    }
}

impl Processor for HoldProc {
    fn exec(&mut self, _vars: &mut VarBank, _ctx: &mut CycleCtx<'_>) -> Result<ExecStatus, NativeError> {
        Ok(ExecStatus::Continue)
    }
}

/// One `hold` proc with a double `x`, an int `k` and presets `a` and `b`.
fn network(a: (f64, i64), b: (f64, i64)) -> Network {
    let class = ClassDescriptor::plain("hold", Arc::new(Hold))
        .with_var(VarDescriptor::new("x", "Value.", VarType::Double))
        .with_var(VarDescriptor::new("k", "Steps.", VarType::Int))
        .with_preset(
            "a",
            PresetBody::new()
                .with("x", Literal::Float(a.0))
                .with("k", Literal::Int(a.1)),
        )
        .with_preset(
            "b",
            PresetBody::new()
                .with("x", Literal::Float(b.0))
                .with("k", Literal::Int(b.1)),
        );
    let classes = ClassSet::new().with(class).unwrap();
    let template = NetworkTemplate::new().with_proc(ProcSpec::new("h", "hold"));
    Network::build(&classes, &template, NetworkConfig::default(), Vec::new()).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Dual interpolation of doubles always lies between the two presets
    /// and hits each endpoint exactly.
    #[test]
    fn dual_blend_is_bounded(
        xa in -1000.0f64..1000.0,
        xb in -1000.0f64..1000.0,
        c in 0.0f64..=1.0,
    ) {
        let mut net = network((xa, 0), (xb, 0));
        net.apply_dual_preset("a", "b", c, None).unwrap();
        let x: f64 = net.get_variable("h", "x", 0).unwrap();
        let (lo, hi) = if xa <= xb { (xa, xb) } else { (xb, xa) };
        prop_assert!(x >= lo - 1e-9 && x <= hi + 1e-9, "x={} outside [{}, {}] at c={}", x, lo, hi, c);

        net.apply_dual_preset("a", "b", 0.0, None).unwrap();
        prop_assert_eq!(net.get_variable::<f64>("h", "x", 0).unwrap(), xa);
        net.apply_dual_preset("a", "b", 1.0, None).unwrap();
        prop_assert_eq!(net.get_variable::<f64>("h", "x", 0).unwrap(), xb);
    }

    /// Integer blends round to the nearest integer of the exact mix.
    #[test]
    fn dual_blend_rounds_integers(
        ka in -10_000i64..10_000,
        kb in -10_000i64..10_000,
        c in 0.0f64..=1.0,
    ) {
        let mut net = network((0.0, ka), (0.0, kb));
        net.apply_dual_preset("a", "b", c, None).unwrap();
        let k: i32 = net.get_variable("h", "k", 0).unwrap();
        let exact = (1.0 - c) * ka as f64 + c * kb as f64;
        prop_assert!((f64::from(k) - exact).abs() <= 0.5 + 1e-9, "k={} exact={}", k, exact);
    }

    /// Applying the same single preset twice is the same as applying it once,
    /// whatever the live state was before.
    #[test]
    fn single_preset_is_idempotent(
        xa in -1000.0f64..1000.0,
        ka in -1000i64..1000,
        live in -1000.0f64..1000.0,
    ) {
        let mut net = network((xa, ka), (0.0, 0));
        net.set_variable("h", "x", 0, live).unwrap();
        net.apply_preset("a", None).unwrap();
        let once: (f64, i32) = (
            net.get_variable("h", "x", 0).unwrap(),
            net.get_variable("h", "k", 0).unwrap(),
        );
        net.apply_preset("a", None).unwrap();
        let twice: (f64, i32) = (
            net.get_variable("h", "x", 0).unwrap(),
            net.get_variable("h", "k", 0).unwrap(),
        );
        prop_assert_eq!(once, twice);
        prop_assert_eq!(once, (xa, ka as i32));
    }

    /// Doubles written through the variable API read back bit-exact.
    #[test]
    fn double_round_trip_is_exact(x in any::<f64>().prop_filter("finite", |x| x.is_finite())) {
        let mut net = network((0.0, 0), (0.0, 0));
        let id = net.var_id("h", "x", 0).unwrap();
        net.set_by_id(id, x).unwrap();
        prop_assert_eq!(net.get_by_id::<f64>(id).unwrap().to_bits(), x.to_bits());
    }

    /// Interpolated multi-presets with positive weights blend like the
    /// normalized weighted mean.
    #[test]
    fn multi_interpolation_matches_weighted_mean(
        xa in -100.0f64..100.0,
        xb in -100.0f64..100.0,
        wa in 0.01f64..10.0,
        wb in 0.01f64..10.0,
        seed in any::<u64>(),
    ) {
        let mut net = network((xa, 0), (xb, 0));
        let selector = PresetSelector::new(SelectorFlags::NONE)
            .with_primary("a", wa)
            .with_primary("b", wb);
        let mut rng = StdRng::seed_from_u64(seed);
        net.apply_multi_preset_with_rng(&selector, None, &mut rng).unwrap();
        let x: f64 = net.get_variable("h", "x", 0).unwrap();
        let expected = (wa * xa + wb * xb) / (wa + wb);
        prop_assert!((x - expected).abs() < 1e-9, "x={} expected={}", x, expected);
    }
}
