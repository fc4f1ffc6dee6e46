//! Class and subnet schema parsing.
//!
//! Class descriptions are read in two passes. The first pass builds a shell
//! for every class: plain classes are matched to their native
//! implementation and fully typed, subnet classes get their variables,
//! presets and internal network template but no types yet. The second pass
//! resolves each subnet variable through its `proxy` to the inner proc's
//! variable, copying its type, flags and default. Subnets may proxy onto
//! other subnets, in any declaration order.
//!
//! # TOML Format
//!
//! ```toml
//! [classes.sine_tone.vars]
//! freq = { type = "double", doc = "Frequency in Hz.", value = 440.0 }
//! out = { type = "audio", doc = "Generated audio." }
//!
//! [classes.sine_tone.presets.low]
//! freq = 220.0
//!
//! [subnets.voice]
//! poly_limit_cnt = 8
//!
//! [subnets.voice.vars]
//! pitch = { doc = "Voice pitch.", proxy = "osc.freq" }
//! out = { doc = "Voice output.", proxy = "osc.out", flags = ["out"] }
//!
//! [subnets.voice.network.procs.osc]
//! class = "sine_tone"
//! ```

use std::collections::{HashMap, HashSet};

use crossflow_core::{
    ClassDescriptor, ClassSet, ProxyRef, SchemaError, VarDescriptor, VarFlags, VarType,
};
use crossflow_registry::{SUBNET_LABEL, SchemaRegistry};
use serde::Deserialize;
use toml::{Table, Value};

use crate::error::ConfigError;
use crate::template::parse_network;
use crate::tree::{literal, preset_body};

/// Body of a `[classes.<label>]` or `[subnets.<label>]` table.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ClassBody {
    #[serde(default)]
    vars: Table,
    #[serde(default)]
    presets: Table,
    poly_limit_cnt: Option<usize>,
    network: Option<Table>,
}

/// One variable description.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct VarSpec {
    doc: Option<String>,
    #[serde(rename = "type")]
    ty: Option<String>,
    #[serde(default)]
    flags: Vec<String>,
    value: Option<Value>,
    proxy: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Plain,
    Subnet,
}

impl Kind {
    fn section(self) -> &'static str {
        match self {
            Kind::Plain => "classes",
            Kind::Subnet => "subnets",
        }
    }
}

/// Builds a [`ClassSet`] from one or more class description sources.
///
/// ```rust
/// use crossflow_config::SchemaParser;
/// use crossflow_registry::{BUILTIN_CLASSES, SchemaRegistry};
///
/// let registry = SchemaRegistry::new();
/// let mut parser = SchemaParser::new(&registry);
/// parser.add_str(BUILTIN_CLASSES).unwrap();
/// parser
///     .add_str(
///         r#"
///         [subnets.tone.vars]
///         pitch = { doc = "Pitch in Hz.", proxy = "osc.freq" }
///
///         [subnets.tone.network.procs.osc]
///         class = "sine_tone"
///         "#,
///     )
///     .unwrap();
///
/// let classes = parser.finish().unwrap();
/// let pitch = classes.get("tone").unwrap().var("pitch").unwrap();
/// assert_eq!(pitch.ty, Some(crossflow_core::VarType::Double));
/// ```
pub struct SchemaParser<'r> {
    registry: &'r SchemaRegistry,
    plain: Vec<ClassDescriptor>,
    subnets: Vec<ClassDescriptor>,
    labels: HashMap<String, Kind>,
}

impl<'r> SchemaParser<'r> {
    /// Create a parser resolving native classes against `registry`.
    pub fn new(registry: &'r SchemaRegistry) -> Self {
        Self {
            registry,
            plain: Vec::new(),
            subnets: Vec::new(),
            labels: HashMap::new(),
        }
    }

    /// Parse class descriptions from TOML text.
    pub fn add_str(&mut self, src: &str) -> Result<(), ConfigError> {
        let table: Table = src.parse()?;
        self.add_table(&table)?;
        Ok(())
    }

    /// Parse class descriptions from a TOML table with optional `classes`
    /// and `subnets` sections.
    pub fn add_table(&mut self, table: &Table) -> Result<(), SchemaError> {
        for (key, section) in table {
            let kind = match key.as_str() {
                "classes" => Kind::Plain,
                "subnets" => Kind::Subnet,
                _ => {
                    return Err(SchemaError::syntax(
                        key.as_str(),
                        "unknown section, expected 'classes' or 'subnets'",
                    ));
                }
            };
            let Value::Table(section) = section else {
                return Err(SchemaError::syntax(key.as_str(), "expected a table of classes"));
            };
            for (label, body) in section {
                self.add_class(kind, label, body)?;
            }
        }
        Ok(())
    }

    fn add_class(&mut self, kind: Kind, label: &str, body: &Value) -> Result<(), SchemaError> {
        let context = format!("{}.{label}", kind.section());
        if label == SUBNET_LABEL {
            return Err(SchemaError::ReservedLabel(label.to_string()));
        }
        if let Some(&existing) = self.labels.get(label) {
            return Err(if kind == Kind::Plain && existing == Kind::Plain {
                SchemaError::DuplicateClass(label.to_string())
            } else {
                SchemaError::DuplicateSubnet(label.to_string())
            });
        }

        let body: ClassBody = body
            .clone()
            .try_into()
            .map_err(|e: toml::de::Error| SchemaError::syntax(&context, e.message()))?;

        let mut class = match (kind, &body.network) {
            (Kind::Plain, Some(_)) => {
                return Err(SchemaError::syntax(
                    &context,
                    "only subnet classes may declare a network",
                ));
            }
            (Kind::Plain, None) => {
                let native = self
                    .registry
                    .get(label)
                    .ok_or_else(|| SchemaError::UnknownClass(label.to_string()))?;
                ClassDescriptor::plain(label, native.clone())
            }
            (Kind::Subnet, None) => {
                return Err(SchemaError::syntax(&context, "subnet must declare a network"));
            }
            (Kind::Subnet, Some(network)) => {
                let template = parse_network(&format!("{context}.network"), network)?;
                ClassDescriptor::subnet(label, template)
            }
        };

        for (var, spec) in &body.vars {
            let ctx = format!("{context}.vars.{var}");
            let spec: VarSpec = spec
                .clone()
                .try_into()
                .map_err(|e: toml::de::Error| SchemaError::syntax(&ctx, e.message()))?;
            let desc = match kind {
                Kind::Plain => plain_var(label, var, &ctx, spec)?,
                Kind::Subnet => subnet_var(label, var, &ctx, spec)?,
            };
            class.vars.push(desc);
        }

        for (preset, values) in &body.presets {
            let ctx = format!("{context}.presets.{preset}");
            let Value::Table(values) = values else {
                return Err(SchemaError::syntax(ctx, "expected a table of variable values"));
            };
            class = class.with_preset(preset.as_str(), preset_body(&ctx, values)?);
        }

        class.poly_limit = body.poly_limit_cnt.filter(|&n| n > 0);

        tracing::debug!(
            class = %label,
            subnet = kind == Kind::Subnet,
            vars = class.vars.len(),
            presets = class.presets.len(),
            "class parsed"
        );
        self.labels.insert(label.to_string(), kind);
        match kind {
            Kind::Plain => self.plain.push(class),
            Kind::Subnet => self.subnets.push(class),
        }
        Ok(())
    }

    /// Resolve subnet proxies and produce the class set.
    ///
    /// Plain classes are inserted in declaration order, followed by subnets
    /// in the order their proxies could be resolved.
    pub fn finish(self) -> Result<ClassSet, SchemaError> {
        let mut set = ClassSet::new();
        for class in self.plain {
            set.insert(class)?;
        }

        let mut pending = self.subnets;
        while !pending.is_empty() {
            let before = pending.len();
            let mut waiting = Vec::new();
            for mut subnet in pending {
                if resolve_proxies(&set, &self.labels, &mut subnet)? {
                    tracing::debug!(subnet = %subnet.label, "subnet proxies resolved");
                    set.insert(subnet)?;
                } else {
                    waiting.push(subnet);
                }
            }
            if waiting.len() == before {
                return Err(SchemaError::ProxyCycle(waiting[0].label.clone()));
            }
            pending = waiting;
        }

        check_nesting(&set)?;
        Ok(set)
    }
}

fn flags(class: &str, var: &str, tokens: &[String]) -> Result<VarFlags, SchemaError> {
    tokens.iter().try_fold(VarFlags::NONE, |acc, token| {
        VarFlags::from_token(token)
            .map(|f| acc.union(f))
            .ok_or_else(|| SchemaError::UnknownFlag {
                class: class.to_string(),
                var: var.to_string(),
                flag: token.clone(),
            })
    })
}

fn var_type(class: &str, var: &str, label: &str) -> Result<VarType, SchemaError> {
    VarType::from_label(label).ok_or_else(|| SchemaError::UnknownType {
        class: class.to_string(),
        var: var.to_string(),
        label: label.to_string(),
    })
}

fn plain_var(class: &str, var: &str, ctx: &str, spec: VarSpec) -> Result<VarDescriptor, SchemaError> {
    let doc = spec.doc.ok_or_else(|| SchemaError::MissingDoc {
        class: class.to_string(),
        var: var.to_string(),
    })?;
    let ty = spec
        .ty
        .as_deref()
        .map(|label| var_type(class, var, label))
        .transpose()?
        .ok_or_else(|| SchemaError::MissingType {
            class: class.to_string(),
            var: var.to_string(),
        })?;
    let mut flags = flags(class, var, &spec.flags)?;
    if let Some(proxy) = &spec.proxy {
        tracing::warn!(class, var, proxy = %proxy, "proxy ignored on a plain class variable");
    }
    if flags.contains(VarFlags::OUT) {
        tracing::warn!(class, var, "'out' flag ignored on a plain class variable");
        flags = flags.difference(VarFlags::OUT);
    }

    let mut desc = VarDescriptor::new(var, doc, ty).with_flags(flags);
    desc.default = spec.value.as_ref().map(|v| literal(ctx, v)).transpose()?;
    Ok(desc)
}

fn subnet_var(class: &str, var: &str, ctx: &str, spec: VarSpec) -> Result<VarDescriptor, SchemaError> {
    let doc = spec.doc.ok_or_else(|| SchemaError::MissingDoc {
        class: class.to_string(),
        var: var.to_string(),
    })?;
    let raw = spec.proxy.ok_or_else(|| SchemaError::MissingProxy {
        class: class.to_string(),
        var: var.to_string(),
    })?;
    let proxy = ProxyRef::parse(&raw).map_err(|reason| SchemaError::MalformedProxy {
        class: class.to_string(),
        var: var.to_string(),
        proxy: raw.clone(),
        reason,
    })?;
    if let Some(label) = &spec.ty {
        var_type(class, var, label)?;
        tracing::warn!(class, var, ty = %label, "declared type ignored, subnet vars take the proxy target's type");
    }

    Ok(VarDescriptor {
        label: var.to_string(),
        doc,
        ty: None,
        flags: flags(class, var, &spec.flags)?,
        default: spec.value.as_ref().map(|v| literal(ctx, v)).transpose()?,
        default_inherited: false,
        proxy: Some(proxy),
    })
}

/// Resolve every proxied variable of `subnet` against the classes already
/// in `set`.
///
/// Returns `Ok(false)` if some proxy targets a subnet that has not been
/// resolved yet. Nothing is modified in that case.
fn resolve_proxies(
    set: &ClassSet,
    labels: &HashMap<String, Kind>,
    subnet: &mut ClassDescriptor,
) -> Result<bool, SchemaError> {
    let Some(template) = subnet.template() else {
        return Ok(true);
    };

    let mut targets = Vec::with_capacity(subnet.vars.len());
    for var in &subnet.vars {
        let Some(proxy) = &var.proxy else {
            return Err(SchemaError::MissingProxy {
                class: subnet.label.clone(),
                var: var.label.clone(),
            });
        };
        let not_found = |reason: String| SchemaError::ProxyTargetNotFound {
            class: subnet.label.clone(),
            var: var.label.clone(),
            target: proxy.to_string(),
            reason,
        };

        let spec = template
            .proc(&proxy.proc)
            .ok_or_else(|| not_found(format!("no proc '{}' in the subnet network", proxy.proc)))?;
        let Some(class) = set.get(&spec.class) else {
            if labels.get(&spec.class) == Some(&Kind::Subnet) {
                return Ok(false);
            }
            return Err(not_found(format!(
                "proc '{}' has unknown class '{}'",
                spec.label, spec.class
            )));
        };
        let inner = class.var(&proxy.var).ok_or_else(|| {
            not_found(format!("class '{}' has no var '{}'", class.label, proxy.var))
        })?;
        targets.push((inner.ty, inner.flags, inner.default.clone()));
    }

    for (var, (ty, flags, default)) in subnet.vars.iter_mut().zip(targets) {
        var.ty = ty;
        var.flags = var.flags.union(flags);
        if var.default.is_none() && default.is_some() {
            var.default = default;
            var.default_inherited = true;
        }
    }
    Ok(true)
}

/// Reject subnets whose networks contain themselves, directly or through
/// other subnets.
fn check_nesting(set: &ClassSet) -> Result<(), SchemaError> {
    fn visit<'a>(
        set: &'a ClassSet,
        label: &'a str,
        path: &mut Vec<&'a str>,
        done: &mut HashSet<&'a str>,
    ) -> Result<(), SchemaError> {
        if done.contains(label) {
            return Ok(());
        }
        if path.contains(&label) {
            return Err(SchemaError::syntax(
                format!("subnets.{label}.network"),
                format!("subnet nests itself via {}", path.join(" -> ")),
            ));
        }
        let Some(template) = set.get(label).and_then(|c| c.template()) else {
            return Ok(());
        };
        path.push(label);
        for spec in &template.procs {
            visit(set, &spec.class, path, done)?;
        }
        path.pop();
        done.insert(label);
        Ok(())
    }

    let mut done = HashSet::new();
    for class in set.iter().filter(|c| c.is_subnet()) {
        visit(set, &class.label, &mut Vec::new(), &mut done)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossflow_core::Literal;

    fn parse(src: &str) -> Result<ClassSet, SchemaError> {
        let registry = SchemaRegistry::new();
        let table: Table = src.parse().unwrap();
        let mut parser = SchemaParser::new(&registry);
        parser.add_table(&table)?;
        parser.finish()
    }

    const OSC: &str = r#"
        [classes.sine_tone.vars]
        freq = { type = "double", doc = "Frequency.", value = 440.0, flags = ["notify"] }
        gain = { type = "float", doc = "Gain.", value = 1.0 }
        ch_cnt = { type = "uint", doc = "Channels.", value = 1, flags = ["init"] }
        out = { type = "audio", doc = "Audio." }
    "#;

    #[test]
    fn test_plain_class() {
        let set = parse(&format!("{OSC}\n[classes.sine_tone.presets.low]\nfreq = 220.0")).unwrap();
        let class = set.get("sine_tone").unwrap();
        assert!(!class.is_subnet());
        let labels: Vec<_> = class.vars.iter().map(|v| v.label.as_str()).collect();
        assert_eq!(labels, vec!["freq", "gain", "ch_cnt", "out"]);

        let freq = class.var("freq").unwrap();
        assert_eq!(freq.ty, Some(VarType::Double));
        assert_eq!(freq.flags, VarFlags::NOTIFY);
        assert_eq!(freq.default, Some(Literal::Float(440.0)));
        assert_eq!(class.preset("low").unwrap().get("freq"), Some(&Literal::Float(220.0)));
    }

    #[test]
    fn test_type_aliases() {
        let set = parse(
            r#"
            [classes.number.vars]
            value = { type = "ftime", doc = "Time." }
            out = { type = "coeff", doc = "Coefficient." }
            "#,
        )
        .unwrap();
        let class = set.get("number").unwrap();
        assert_eq!(class.var("value").unwrap().ty, Some(VarType::Double));
        assert_eq!(class.var("out").unwrap().ty, Some(VarType::Float));
    }

    #[test]
    fn test_unregistered_class() {
        let err = parse("[classes.fuzz.vars]\nx = { type = \"float\", doc = \"X.\" }").unwrap_err();
        assert_eq!(err, SchemaError::UnknownClass("fuzz".to_string()));
    }

    #[test]
    fn test_var_errors() {
        let cases = [
            ("x = { type = \"float\" }", "missing doc"),
            ("x = { doc = \"X.\" }", "missing type"),
            ("x = { type = \"complex\", doc = \"X.\" }", "unrecognized type 'complex'"),
            ("x = { type = \"float\", doc = \"X.\", flags = [\"loud\"] }", "unrecognized flag 'loud'"),
        ];
        for (var, expected) in cases {
            let err = parse(&format!("[classes.number.vars]\n{var}")).unwrap_err();
            assert!(err.to_string().contains(expected), "{var}: {err}");
        }
    }

    #[test]
    fn test_plain_class_ignores_proxy_and_out_flag() {
        let set = parse(
            r#"
            [classes.number.vars]
            out = { type = "double", doc = "Out.", proxy = "a.b", flags = ["out", "notify"] }
            "#,
        )
        .unwrap();
        let out = set.get("number").unwrap().var("out").unwrap();
        assert_eq!(out.proxy, None);
        assert_eq!(out.flags, VarFlags::NOTIFY);
    }

    #[test]
    fn test_subnet_inherits_type_flags_and_default() {
        let set = parse(&format!(
            r#"{OSC}
            [subnets.voice.vars]
            pitch = {{ doc = "Pitch.", proxy = "osc.freq", flags = ["ui_hide"] }}
            level = {{ doc = "Level.", proxy = "osc.gain", value = 0.25 }}
            out = {{ doc = "Out.", proxy = "osc.out", flags = ["out"] }}

            [subnets.voice.network.procs.osc]
            class = "sine_tone"
            "#
        ))
        .unwrap();
        let voice = set.get("voice").unwrap();
        assert!(voice.is_subnet());

        let pitch = voice.var("pitch").unwrap();
        assert_eq!(pitch.ty, Some(VarType::Double));
        assert_eq!(pitch.flags, VarFlags::UI_HIDE.union(VarFlags::NOTIFY));
        assert_eq!(pitch.default, Some(Literal::Float(440.0)));
        assert!(pitch.default_inherited);

        let level = voice.var("level").unwrap();
        assert_eq!(level.ty, Some(VarType::Float));
        assert_eq!(level.default, Some(Literal::Float(0.25)));
        assert!(!level.default_inherited);

        let out = voice.var("out").unwrap();
        assert_eq!(out.ty, Some(VarType::Audio));
        assert!(out.flags.contains(VarFlags::OUT));
    }

    #[test]
    fn test_subnet_proxies_resolve_in_any_order() {
        let set = parse(&format!(
            r#"{OSC}
            [subnets.outer.vars]
            pitch = {{ doc = "Pitch.", proxy = "v.pitch" }}
            [subnets.outer.network.procs.v]
            class = "inner"

            [subnets.inner.vars]
            pitch = {{ doc = "Pitch.", proxy = "osc.freq" }}
            [subnets.inner.network.procs.osc]
            class = "sine_tone"
            "#
        ))
        .unwrap();
        let pitch = set.get("outer").unwrap().var("pitch").unwrap();
        assert_eq!(pitch.ty, Some(VarType::Double));
        assert_eq!(pitch.default, Some(Literal::Float(440.0)));
    }

    #[test]
    fn test_subnet_var_errors() {
        let cases = [
            ("x = { doc = \"X.\" }", "must have a proxy field"),
            ("x = { doc = \"X.\", proxy = \"oscfreq\" }", "malformed proxy 'oscfreq'"),
            ("x = { doc = \"X.\", proxy = \".freq\" }", "the proc label is empty"),
            ("x = { doc = \"X.\", proxy = \"lfo.freq\" }", "no proc 'lfo'"),
            ("x = { doc = \"X.\", proxy = \"osc.phase\" }", "class 'sine_tone' has no var 'phase'"),
        ];
        for (var, expected) in cases {
            let src = format!(
                "{OSC}\n[subnets.s.vars]\n{var}\n[subnets.s.network.procs.osc]\nclass = \"sine_tone\""
            );
            let err = parse(&src).unwrap_err();
            assert!(err.to_string().contains(expected), "{var}: {err}");
        }
    }

    #[test]
    fn test_proxy_onto_unknown_class() {
        let err = parse(
            r#"
            [subnets.s.vars]
            x = { doc = "X.", proxy = "a.b" }
            [subnets.s.network.procs.a]
            class = "nothing"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::ProxyTargetNotFound { .. }), "{err}");
    }

    #[test]
    fn test_mutual_proxies_are_a_cycle() {
        let err = parse(
            r#"
            [subnets.a.vars]
            x = { doc = "X.", proxy = "p.x" }
            [subnets.a.network.procs.p]
            class = "b"

            [subnets.b.vars]
            x = { doc = "X.", proxy = "p.x" }
            [subnets.b.network.procs.p]
            class = "a"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::ProxyCycle(_)), "{err}");
    }

    #[test]
    fn test_self_nesting_subnet() {
        let err = parse(&format!(
            r#"{OSC}
            [subnets.s.vars]
            x = {{ doc = "X.", proxy = "osc.freq" }}
            [subnets.s.network.procs.osc]
            class = "sine_tone"
            [subnets.s.network.procs.again]
            class = "s"
            "#
        ))
        .unwrap_err();
        assert!(err.to_string().contains("nests itself"), "{err}");
    }

    #[test]
    fn test_duplicate_labels() {
        let registry = SchemaRegistry::new();
        let mut parser = SchemaParser::new(&registry);
        parser.add_str(OSC).unwrap();
        let err = parser.add_str(OSC).unwrap_err();
        assert!(matches!(err, ConfigError::Schema(SchemaError::DuplicateClass(_))), "{err}");

        let subnet = "[subnets.sine_tone.network]";
        let err = parser.add_str(subnet).unwrap_err();
        assert!(matches!(err, ConfigError::Schema(SchemaError::DuplicateSubnet(_))), "{err}");
    }

    #[test]
    fn test_duplicate_subnet() {
        let registry = SchemaRegistry::new();
        let mut parser = SchemaParser::new(&registry);
        parser.add_str("[subnets.v.network]").unwrap();
        let err = parser.add_str("[subnets.v.network]").unwrap_err();
        assert_eq!(err.to_string(), "subnet 'v' already exists");
    }

    #[test]
    fn test_reserved_label() {
        let err = parse("[subnets.subnet.network]").unwrap_err();
        assert_eq!(err, SchemaError::ReservedLabel("subnet".to_string()));
    }

    #[test]
    fn test_structural_errors() {
        assert!(parse("[classes.number.network]").is_err());
        assert!(parse("[subnets.s.vars]").is_err());
        assert!(parse("[instruments.x]").is_err());
        assert!(parse("[classes.number]\ncolour = 1").is_err());
    }

    #[test]
    fn test_poly_limit() {
        let set = parse("[subnets.v]\npoly_limit_cnt = 4\n[subnets.v.network]\n[subnets.w]\npoly_limit_cnt = 0\n[subnets.w.network]").unwrap();
        assert_eq!(set.get("v").unwrap().poly_limit, Some(4));
        assert_eq!(set.get("w").unwrap().poly_limit, None);
    }
}
