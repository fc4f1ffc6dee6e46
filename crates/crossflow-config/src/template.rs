//! Network template parsing.
//!
//! # TOML Format
//!
//! ```toml
//! [network.procs.osc]
//! class = "sine_tone"
//! args = { freq = 220.0, ch_cnt = 2 }
//! preset = "low"
//!
//! [network.procs.amp]
//! class = "audio_gain"
//! in = { in = "osc.out" }
//!
//! [network.presets.bright]
//! osc = "high"
//! amp = { gain = 0.8 }
//! ```
//!
//! Procs are created in the order they are declared.

use crossflow_core::{NetworkPreset, NetworkTemplate, PresetRef, ProcSpec, SchemaError};
use serde::Deserialize;
use toml::{Table, Value};

use crate::tree::{preset_body, sub_table};

/// One entry of a `procs` table.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProcEntry {
    class: String,
    #[serde(default)]
    args: Table,
    #[serde(default, rename = "in")]
    inputs: Table,
    preset: Option<String>,
    poly_cnt: Option<usize>,
    device: Option<String>,
}

/// Parse a `network` table into a [`NetworkTemplate`].
///
/// `context` prefixes error locations, e.g. `subnets.voice.network`.
pub fn parse_network(context: &str, table: &Table) -> Result<NetworkTemplate, SchemaError> {
    for key in table.keys() {
        if key != "procs" && key != "presets" {
            return Err(SchemaError::syntax(
                format!("{context}.{key}"),
                "unknown key, expected 'procs' or 'presets'",
            ));
        }
    }

    let mut template = NetworkTemplate::new();
    if let Some(procs) = sub_table(context, table, "procs")? {
        for (label, entry) in procs {
            let ctx = format!("{context}.procs.{label}");
            template.procs.push(parse_proc(&ctx, label, entry)?);
        }
    }
    if let Some(presets) = sub_table(context, table, "presets")? {
        for (label, entry) in presets {
            let ctx = format!("{context}.presets.{label}");
            template.presets.push(parse_preset(&ctx, label, entry)?);
        }
    }
    Ok(template)
}

fn parse_proc(context: &str, label: &str, entry: &Value) -> Result<ProcSpec, SchemaError> {
    let entry: ProcEntry = entry
        .clone()
        .try_into()
        .map_err(|e: toml::de::Error| SchemaError::syntax(context, e.message()))?;

    let mut spec = ProcSpec::new(label, entry.class);
    spec.args = preset_body(&format!("{context}.args"), &entry.args)?;
    for (var, source) in &entry.inputs {
        let Value::String(source) = source else {
            return Err(SchemaError::syntax(
                format!("{context}.in.{var}"),
                "connection must be a '<proc>.<var>' string",
            ));
        };
        spec = spec.with_input(var.as_str(), source.as_str());
    }
    spec.preset = entry.preset;
    spec.poly_cnt = entry.poly_cnt;
    spec.device = entry.device;
    Ok(spec)
}

fn parse_preset(context: &str, label: &str, entry: &Value) -> Result<NetworkPreset, SchemaError> {
    let Value::Table(entries) = entry else {
        return Err(SchemaError::syntax(context, "expected a table of proc presets"));
    };
    let mut preset = NetworkPreset::new(label);
    for (proc, value) in entries {
        let ctx = format!("{context}.{proc}");
        let value = match value {
            Value::String(class_preset) => PresetRef::Class(class_preset.clone()),
            Value::Table(body) => PresetRef::Inline(preset_body(&ctx, body)?),
            other => {
                return Err(SchemaError::syntax(
                    ctx,
                    format!(
                        "expected a class preset label or a table of values, found {}",
                        other.type_str()
                    ),
                ));
            }
        };
        preset = preset.with(proc.as_str(), value);
    }
    Ok(preset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossflow_core::Literal;

    fn network(src: &str) -> Result<NetworkTemplate, SchemaError> {
        let table: Table = src.parse().unwrap();
        parse_network("network", &table)
    }

    #[test]
    fn test_procs_keep_declared_order() {
        let t = network(
            r#"
            [procs.z]
            class = "number"
            [procs.a]
            class = "number"
            [procs.m]
            class = "number"
            "#,
        )
        .unwrap();
        let labels: Vec<_> = t.procs.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_full_proc_entry() {
        let t = network(
            r#"
            [procs.v]
            class = "voice"
            args = { level = 0.5, gains = [1, 0.5] }
            in = { trig = "seq.out" }
            preset = "soft"
            poly_cnt = 4
            device = "dac"
            "#,
        )
        .unwrap();
        let v = t.proc("v").unwrap();
        assert_eq!(v.class, "voice");
        assert_eq!(v.args.get("level"), Some(&Literal::Float(0.5)));
        assert_eq!(
            v.args.get("gains"),
            Some(&Literal::List(vec![Literal::Int(1), Literal::Float(0.5)]))
        );
        assert_eq!(v.inputs.len(), 1);
        assert_eq!(v.inputs[0].var, "trig");
        assert_eq!(v.inputs[0].source, "seq.out");
        assert_eq!(v.preset.as_deref(), Some("soft"));
        assert_eq!(v.poly_cnt, Some(4));
        assert_eq!(v.device.as_deref(), Some("dac"));
    }

    #[test]
    fn test_missing_class_is_an_error() {
        let err = network("[procs.a]\nargs = { x = 1 }").unwrap_err();
        assert!(err.to_string().starts_with("network.procs.a:"), "{err}");
    }

    #[test]
    fn test_unknown_proc_field_is_an_error() {
        let err = network("[procs.a]\nclass = \"number\"\ninputs = {}").unwrap_err();
        assert!(matches!(err, SchemaError::Syntax { .. }));
    }

    #[test]
    fn test_connection_must_be_a_string() {
        let err = network("[procs.a]\nclass = \"number\"\nin = { x = 1 }").unwrap_err();
        assert!(err.to_string().starts_with("network.procs.a.in.x:"), "{err}");
    }

    #[test]
    fn test_presets_mix_class_labels_and_inline_bodies() {
        let t = network(
            r#"
            [procs.osc]
            class = "sine_tone"
            [procs.amp]
            class = "audio_gain"
            [presets.bright]
            osc = "high"
            amp = { gain = 0.8 }
            "#,
        )
        .unwrap();
        let p = t.preset("bright").unwrap();
        assert_eq!(p.entry("osc"), Some(&PresetRef::Class("high".to_string())));
        assert_eq!(
            p.entry("amp"),
            Some(&PresetRef::Inline(
                crossflow_core::PresetBody::new().with("gain", Literal::Float(0.8))
            ))
        );
    }

    #[test]
    fn test_preset_entry_of_wrong_kind() {
        let err = network("[presets.p]\nosc = 3").unwrap_err();
        assert!(err.to_string().contains("found integer"), "{err}");
    }

    #[test]
    fn test_unknown_network_key() {
        let err = network("[proc.a]\nclass = \"number\"").unwrap_err();
        assert!(err.to_string().starts_with("network.proc:"), "{err}");
    }

    #[test]
    fn test_empty_network() {
        let t = network("").unwrap();
        assert!(t.procs.is_empty());
        assert!(t.presets.is_empty());
    }
}
