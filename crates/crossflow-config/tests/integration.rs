//! Integration tests for crossflow-config.
//!
//! These tests go from TOML text (or files) through class parsing, network
//! instantiation, presets and the run loop, using the built-in classes.

use crossflow_config::{ConfigError, FlowConfig, SchemaParser, StopReason, run, run_cross};
use crossflow_core::{
    ClassSet, CompositionError, DestId, PresetSelector, SchemaError, SelectorFlags, VarType,
};
use crossflow_registry::{BUILTIN_CLASSES, SchemaRegistry};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tempfile::TempDir;

const VOICE: &str = r#"
[subnets.voice]
poly_limit_cnt = 4

[subnets.voice.vars]
pitch = { doc = "Voice pitch.", proxy = "osc.freq" }
level = { doc = "Voice level.", proxy = "amp.gain", value = 0.5 }
out = { doc = "Voice output.", proxy = "amp.out", flags = ["out"] }

[subnets.voice.network.procs.osc]
class = "sine_tone"

[subnets.voice.network.procs.amp]
class = "audio_gain"
in = { in = "osc.out" }

[subnets.voice.network.presets.soft]
amp = { gain = 0.1 }
"#;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn classes() -> ClassSet {
    let registry = SchemaRegistry::new();
    let mut parser = SchemaParser::new(&registry);
    parser.add_str(BUILTIN_CLASSES).unwrap();
    parser.add_str(VOICE).unwrap();
    parser.finish().unwrap()
}

fn flow(src: &str) -> FlowConfig {
    init_tracing();
    FlowConfig::with_classes(classes(), src).unwrap()
}

const OSC1: &str = r#"
[network.procs.osc1]
class = "sine_tone"

[network.procs.amp]
class = "audio_gain"
in = { in = "osc1.out" }

[network.presets.bright]
osc1 = "high"
amp = { gain = 0.25 }
"#;

// ============================================================================
// Class parsing
// ============================================================================

#[test]
fn test_builtin_class_descriptions_cover_the_registry() {
    let registry = SchemaRegistry::new();
    let set = classes();
    for info in registry.all_classes() {
        let class = set.get(&info.label).unwrap();
        assert!(!class.is_subnet(), "{}", info.label);
        assert!(class.vars.iter().all(|v| !v.doc.is_empty()));
    }
}

#[test]
fn test_proxy_inheritance() {
    let set = classes();
    let voice = set.get("voice").unwrap();
    let osc = set.get("sine_tone").unwrap();

    let pitch = voice.var("pitch").unwrap();
    let freq = osc.var("freq").unwrap();
    assert_eq!(pitch.ty, freq.ty);
    assert_eq!(pitch.default, freq.default);
    assert!(pitch.default_inherited);

    let level = voice.var("level").unwrap();
    assert_eq!(level.ty, Some(VarType::Float));
    assert_eq!(level.default, Some(crossflow_core::Literal::Float(0.5)));
    assert!(!level.default_inherited);
    assert_eq!(voice.poly_limit, Some(4));
}

#[test]
fn test_duplicate_classes_across_sources() {
    let registry = SchemaRegistry::new();
    let mut parser = SchemaParser::new(&registry);
    parser.add_str(BUILTIN_CLASSES).unwrap();
    parser.add_str(VOICE).unwrap();

    let err = parser.add_str(BUILTIN_CLASSES).unwrap_err();
    assert!(matches!(err, ConfigError::Schema(SchemaError::DuplicateClass(_))), "{err}");
    let err = parser.add_str(VOICE).unwrap_err();
    assert!(matches!(err, ConfigError::Schema(SchemaError::DuplicateSubnet(_))), "{err}");
}

#[test]
fn test_subnet_var_type_must_be_known() {
    const TYPED: &str = r#"
[subnets.duo.vars]
out = { doc = "Output.", proxy = "amp.out", flags = ["out"], type = "TYPE" }

[subnets.duo.network.procs.amp]
class = "audio_gain"
"#;
    let registry = SchemaRegistry::new();

    let mut parser = SchemaParser::new(&registry);
    parser.add_str(BUILTIN_CLASSES).unwrap();
    let err = parser.add_str(&TYPED.replace("TYPE", "bogus_type")).unwrap_err();
    assert!(
        matches!(
            &err,
            ConfigError::Schema(SchemaError::UnknownType { class, var, label })
                if class == "duo" && var == "out" && label == "bogus_type"
        ),
        "{err}"
    );

    let mut parser = SchemaParser::new(&registry);
    parser.add_str(BUILTIN_CLASSES).unwrap();
    parser.add_str(&TYPED.replace("TYPE", "float")).unwrap();
    let set = parser.finish().unwrap();
    assert_eq!(set.get("duo").unwrap().var("out").unwrap().ty, Some(VarType::Audio));
}

#[test]
fn test_duplicate_proc_label_is_rejected() {
    let err = FlowConfig::with_classes(
        classes(),
        "[network.procs.a]\nclass = \"number\"\n[network.procs.a]\nclass = \"counter\"",
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::TomlParse(_)), "{err}");
}

#[test]
fn test_unknown_class_in_network() {
    let f = flow("[network.procs.a]\nclass = \"fuzz\"");
    let err = f.build_network(Vec::new()).err().unwrap();
    assert!(
        matches!(err, ConfigError::Composition(CompositionError::UnknownClass { .. })),
        "{err}"
    );
}

// ============================================================================
// Variables
// ============================================================================

#[test]
fn test_round_trip() {
    let f = flow(OSC1);
    let mut net = f.build_network(Vec::new()).unwrap();
    net.set_variable("osc1", "freq", 0, 440.0).unwrap();
    assert_eq!(net.get_variable::<f64>("osc1", "freq", 0).unwrap(), 440.0);

    net.set_variable("osc1", "freq", 0, 261.625_565_300_598_6).unwrap();
    assert_eq!(
        net.get_variable::<f64>("osc1", "freq", 0).unwrap(),
        261.625_565_300_598_6
    );
}

#[test]
fn test_unknown_lookup_leaves_state_unchanged() {
    let f = flow(OSC1);
    let mut net = f.build_network(Vec::new()).unwrap();
    net.set_variable("osc1", "freq", 0, 330.0).unwrap();

    let err = net.get_variable::<f64>("osc9", "freq", 0).unwrap_err();
    assert_eq!(err, CompositionError::UnknownInstance("osc9".to_string()));
    let err = net.set_variable("osc9", "freq", 0, 1.0).unwrap_err();
    assert_eq!(err, CompositionError::UnknownInstance("osc9".to_string()));

    assert_eq!(net.get_variable::<f64>("osc1", "freq", 0).unwrap(), 330.0);
    assert_eq!(net.get_variable::<f32>("amp", "gain", 0).unwrap(), 1.0);
}

#[test]
fn test_subnet_vars_through_proxies() {
    let f = flow("[network.procs.v]\nclass = \"voice\"");
    let mut net = f.build_network(Vec::new()).unwrap();
    assert_eq!(net.get_variable::<f64>("v", "pitch", 0).unwrap(), 440.0);
    assert_eq!(net.get_variable::<f32>("v", "level", 0).unwrap(), 0.5);

    let id = net.var_id("v", "pitch", 0).unwrap();
    net.set_by_id(id, 110.0).unwrap();
    assert_eq!(net.get_by_id::<f64>(id).unwrap(), 110.0);
}

// ============================================================================
// Presets
// ============================================================================

#[test]
fn test_network_preset() {
    let f = flow(OSC1);
    let mut net = f.build_network(Vec::new()).unwrap();
    assert!(net.has_preset("bright"));
    net.apply_preset("bright", None).unwrap();
    assert_eq!(net.get_variable::<f64>("osc1", "freq", 0).unwrap(), 880.0);
    assert_eq!(net.get_variable::<f32>("osc1", "gain", 0).unwrap(), 0.5);
    assert_eq!(net.get_variable::<f32>("amp", "gain", 0).unwrap(), 0.25);
}

#[test]
fn test_preset_idempotence() {
    let f = flow(OSC1);
    let mut once = f.build_network(Vec::new()).unwrap();
    let mut twice = f.build_network(Vec::new()).unwrap();
    once.apply_preset("bright", None).unwrap();
    twice.apply_preset("bright", None).unwrap();
    twice.apply_preset("bright", None).unwrap();

    for (inst, var) in [("osc1", "freq"), ("osc1", "gain"), ("amp", "gain")] {
        assert_eq!(
            once.get_variable::<f64>(inst, var, 0).unwrap(),
            twice.get_variable::<f64>(inst, var, 0).unwrap(),
            "{inst}.{var}"
        );
    }
}

#[test]
fn test_dual_preset_boundaries() {
    let f = flow(OSC1);
    let blended = |coeff: f64| {
        let mut net = f.build_network(Vec::new()).unwrap();
        net.apply_dual_preset("low", "high", coeff, None).unwrap();
        (
            net.get_variable::<f64>("osc1", "freq", 0).unwrap(),
            net.get_variable::<f32>("osc1", "gain", 0).unwrap(),
        )
    };

    // `low` leaves gain at its live value of 1.0.
    assert_eq!(blended(0.0), (220.0, 1.0));
    assert_eq!(blended(1.0), (880.0, 0.5));
    assert_eq!(blended(0.5), (550.0, 0.75));
}

#[test]
fn test_multi_preset_weights() {
    let f = flow(OSC1);
    let mut net = f.build_network(Vec::new()).unwrap();
    let selector = PresetSelector::new(SelectorFlags::PROB_PRIMARY)
        .with_primary("low", 3.0)
        .with_primary("high", 1.0);
    let mut rng = StdRng::seed_from_u64(7);

    let draws = 2000;
    let mut low = 0;
    for _ in 0..draws {
        net.apply_multi_preset_with_rng(&selector, None, &mut rng)
            .unwrap();
        if net.get_variable::<f64>("osc1", "freq", 0).unwrap() == 220.0 {
            low += 1;
        }
    }
    let freq = f64::from(low) / f64::from(draws);
    assert!((freq - 0.75).abs() < 0.04, "freq = {freq}");
}

#[test]
fn test_flow_selector_flags() {
    let f = flow(&format!("multi_pri_preset_prob = true\n{OSC1}"));
    let selector = f
        .preset_selector()
        .with_primary("low", 1.0)
        .with_primary("high", 1.0);
    let mut net = f.build_network(Vec::new()).unwrap();
    net.apply_multi_preset_with_rng(&selector, None, &mut StdRng::seed_from_u64(1))
        .unwrap();
    let freq = net.get_variable::<f64>("osc1", "freq", 0).unwrap();
    assert!(freq == 220.0 || freq == 880.0, "probabilistic pick, got {freq}");
}

#[test]
fn test_poly_replica_presets() {
    let f = flow("[network.procs.v]\nclass = \"voice\"\npoly_cnt = 3");
    let mut net = f.build_network(Vec::new()).unwrap();
    net.apply_preset("high", Some(1)).unwrap();

    let pitch = |net: &crossflow_core::Network, r| {
        let id = net.replica_var_id("v", r, "pitch", 0).unwrap();
        net.get_by_id::<f64>(id).unwrap()
    };
    assert_eq!(pitch(&net, 0), 440.0);
    assert_eq!(pitch(&net, 1), 880.0);
    assert_eq!(pitch(&net, 2), 440.0);
}

#[test]
fn test_subnet_network_preset() {
    let f = flow("[network.procs.v]\nclass = \"voice\"");
    let mut net = f.build_network(Vec::new()).unwrap();
    net.apply_preset("soft", None).unwrap();
    assert_eq!(net.get_variable::<f32>("v", "level", 0).unwrap(), 0.1);
}

#[test]
fn test_poly_limit_enforced() {
    let f = flow("[network.procs.v]\nclass = \"voice\"\npoly_cnt = 5");
    let err = f.build_network(Vec::new()).err().unwrap();
    assert!(
        matches!(err, ConfigError::Composition(CompositionError::PolyLimit { .. })),
        "{err}"
    );
}

// ============================================================================
// Run loop
// ============================================================================

#[test]
fn test_cycle_termination_by_count() {
    let f = flow("max_cycle_count = 6\n[network.procs.c]\nclass = \"counter\"");
    let mut net = f.build_network(Vec::new()).unwrap();
    let report = run(&mut net, f.max_cycles()).unwrap();
    assert_eq!(report.cycles, 6);
    assert_eq!(report.stop, StopReason::CycleLimit);
    assert_eq!(net.cycle_index(), 6);
    assert_eq!(net.get_variable::<f64>("c", "out", 0).unwrap(), 6.0);
}

#[test]
fn test_cycle_termination_by_end_of_stream() {
    let f = flow(
        "max_cycle_count = 6\n[network.procs.c]\nclass = \"counter\"\nargs = { inc = 2.0, limit = 5.0 }",
    );
    let report = f.exec().unwrap();
    assert_eq!(report.cycles, 3);
    assert_eq!(report.stop, StopReason::EndOfStream);
}

#[test]
fn test_cycle_termination_by_duration() {
    let f = flow(
        "sample_rate = 1000.0\nframes_per_cycle = 100\nmax_duration_secs = 0.5\n[network.procs.n]\nclass = \"number\"",
    );
    let report = f.exec().unwrap();
    assert_eq!(report.cycles, 5);
    assert_eq!(report.stop, StopReason::CycleLimit);
}

#[test]
fn test_audio_through_configured_devices() {
    let f = flow(
        r#"
        frames_per_cycle = 4

        [devices.adc]
        dir = "in"

        [devices.dac]
        dir = "out"

        [network.procs.in]
        class = "audio_in"
        device = "adc"

        [network.procs.amp]
        class = "audio_gain"
        in = { in = "in.out" }
        args = { gain = 0.5 }

        [network.procs.out]
        class = "audio_out"
        in = { in = "amp.out" }
        device = "dac"
        "#,
    );
    let mut net = f.build_network(f.devices()).unwrap();
    net.device_mut("adc")
        .and_then(|d| d.audio_buf_mut())
        .unwrap()
        .channel_mut(0)
        .fill(0.8);
    run(&mut net, Some(1)).unwrap();

    let out = net.device("dac").unwrap().audio_buf().unwrap();
    assert_eq!(out.channel(0), &[0.4; 4]);
}

#[test]
fn test_crossfade_to_new_preset() {
    let f = flow(&format!("frames_per_cycle = 16\n{OSC1}"));
    let mut cross = f.create_cross().unwrap();
    cross.apply_preset(DestId::Next, "bright", None).unwrap();
    assert_eq!(
        cross.get_variable::<f64>(DestId::Current, "osc1", "freq", 0).unwrap(),
        440.0
    );

    // 1 ms at 48 kHz is three cycles of 16 frames.
    cross.begin_cross_fade(1.0);
    assert!(cross.is_fading());
    let report = run_cross(&mut cross, Some(3)).unwrap();
    assert_eq!(report.cycles, 3);
    assert!(!cross.is_fading());
    assert_eq!(
        cross.get_variable::<f64>(DestId::Current, "osc1", "freq", 0).unwrap(),
        880.0
    );
}

// ============================================================================
// Files
// ============================================================================

#[test]
fn test_load_from_files() {
    let dir = TempDir::new().unwrap();
    let classes_path = dir.path().join("classes.toml");
    let flow_path = dir.path().join("flow.toml");
    std::fs::write(&classes_path, BUILTIN_CLASSES).unwrap();
    std::fs::write(
        &flow_path,
        "preset = \"low\"\nmax_cycle_count = 2\n[network.procs.osc]\nclass = \"sine_tone\"",
    )
    .unwrap();

    let f = FlowConfig::load(&classes_path, &flow_path, &SchemaRegistry::new()).unwrap();
    assert_eq!(f.settings().preset.as_deref(), Some("low"));
    let net = f.build_network(f.devices()).unwrap();
    assert_eq!(net.get_variable::<f64>("osc", "freq", 0).unwrap(), 220.0);
    assert_eq!(f.exec().unwrap().cycles, 2);
}

#[test]
fn test_missing_file_names_the_path() {
    let dir = TempDir::new().unwrap();
    let classes_path = dir.path().join("classes.toml");
    std::fs::write(&classes_path, BUILTIN_CLASSES).unwrap();
    let missing = dir.path().join("missing.toml");

    let err = FlowConfig::load(&classes_path, &missing, &SchemaRegistry::new()).unwrap_err();
    match &err {
        ConfigError::ReadFile { path, .. } => assert_eq!(path, &missing),
        other => panic!("expected ReadFile, got {other}"),
    }
    assert!(err.to_string().contains("missing.toml"));
}

#[test]
fn test_malformed_class_file() {
    let err = FlowConfig::from_toml("[classes", OSC1, &SchemaRegistry::new()).unwrap_err();
    assert!(matches!(err, ConfigError::TomlParse(_)), "{err}");
}
