//! Class descriptions and the class set.
//!
//! A [`ClassDescriptor`] is either *plain*, backed by a [`NativeClass`]
//! from the schema registry, or a *subnet*, whose behavior is an internal
//! [`NetworkTemplate`] exposed through proxied variables.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::SchemaError;
use crate::processor::NativeClass;
use crate::template::NetworkTemplate;
use crate::value::Literal;
use crate::var::VarDescriptor;

/// Ordered dictionary of variable label → literal.
///
/// Used for preset bodies and proc construction arguments. Insertion order
/// is kept so that application order matches declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PresetBody {
    values: Vec<(String, Literal)>,
}

impl PresetBody {
    /// Empty body.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace one value.
    pub fn insert(&mut self, label: impl Into<String>, value: Literal) {
        let label = label.into();
        match self.values.iter_mut().find(|(l, _)| *l == label) {
            Some((_, v)) => *v = value,
            None => self.values.push((label, value)),
        }
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, label: impl Into<String>, value: Literal) -> Self {
        self.insert(label, value);
        self
    }

    /// Literal for one variable.
    pub fn get(&self, label: &str) -> Option<&Literal> {
        self.values
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| v)
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Literal)> {
        self.values.iter().map(|(l, v)| (l.as_str(), v))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Literal)> for PresetBody {
    fn from_iter<I: IntoIterator<Item = (S, Literal)>>(iter: I) -> Self {
        let mut body = PresetBody::new();
        for (label, value) in iter {
            body.insert(label, value);
        }
        body
    }
}

/// A named class preset.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassPreset {
    /// Preset label.
    pub label: String,
    /// Values to assign.
    pub body: PresetBody,
}

/// The two kinds of class.
#[derive(Clone)]
pub enum ClassKind {
    /// Backed by a native implementation.
    Plain(Arc<dyn NativeClass>),
    /// Backed by an internal network.
    Subnet(NetworkTemplate),
}

impl fmt::Debug for ClassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassKind::Plain(_) => f.write_str("Plain(..)"),
            ClassKind::Subnet(t) => f.debug_tuple("Subnet").field(t).finish(),
        }
    }
}

/// Schema of one class.
#[derive(Debug, Clone)]
pub struct ClassDescriptor {
    /// Unique class label.
    pub label: String,
    /// Variable descriptors in declaration order.
    pub vars: Vec<VarDescriptor>,
    /// Named presets in declaration order.
    pub presets: Vec<ClassPreset>,
    /// Plain or subnet.
    pub kind: ClassKind,
    /// Maximum number of instances per network.
    pub poly_limit: Option<usize>,
}

impl ClassDescriptor {
    /// A plain class with no variables or presets yet.
    pub fn plain(label: impl Into<String>, native: Arc<dyn NativeClass>) -> Self {
        Self {
            label: label.into(),
            vars: Vec::new(),
            presets: Vec::new(),
            kind: ClassKind::Plain(native),
            poly_limit: None,
        }
    }

    /// A subnet class with no variables or presets yet.
    pub fn subnet(label: impl Into<String>, template: NetworkTemplate) -> Self {
        Self {
            label: label.into(),
            vars: Vec::new(),
            presets: Vec::new(),
            kind: ClassKind::Subnet(template),
            poly_limit: None,
        }
    }

    /// Add a variable (builder style).
    pub fn with_var(mut self, var: VarDescriptor) -> Self {
        self.vars.push(var);
        self
    }

    /// Add a preset (builder style).
    pub fn with_preset(mut self, label: impl Into<String>, body: PresetBody) -> Self {
        self.presets.push(ClassPreset {
            label: label.into(),
            body,
        });
        self
    }

    /// Variable descriptor by label.
    pub fn var(&self, label: &str) -> Option<&VarDescriptor> {
        self.vars.iter().find(|v| v.label == label)
    }

    /// Position of a variable in [`vars`](Self::vars).
    pub fn var_index(&self, label: &str) -> Option<usize> {
        self.vars.iter().position(|v| v.label == label)
    }

    /// Preset body by label.
    pub fn preset(&self, label: &str) -> Option<&PresetBody> {
        self.presets
            .iter()
            .find(|p| p.label == label)
            .map(|p| &p.body)
    }

    /// True for subnet classes.
    pub fn is_subnet(&self) -> bool {
        matches!(self.kind, ClassKind::Subnet(_))
    }

    /// Native implementation of a plain class.
    pub fn native(&self) -> Option<&Arc<dyn NativeClass>> {
        match &self.kind {
            ClassKind::Plain(native) => Some(native),
            ClassKind::Subnet(_) => None,
        }
    }

    /// Internal network of a subnet class.
    pub fn template(&self) -> Option<&NetworkTemplate> {
        match &self.kind {
            ClassKind::Subnet(t) => Some(t),
            ClassKind::Plain(_) => None,
        }
    }
}

/// All class descriptions of a flow, plain and subnet, keyed by label.
#[derive(Debug, Clone, Default)]
pub struct ClassSet {
    classes: Vec<Arc<ClassDescriptor>>,
    index: HashMap<String, usize>,
}

impl ClassSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a class. Labels are unique across plain and subnet classes.
    pub fn insert(&mut self, class: ClassDescriptor) -> Result<(), SchemaError> {
        if self.index.contains_key(&class.label) {
            return Err(if class.is_subnet() {
                SchemaError::DuplicateSubnet(class.label)
            } else {
                SchemaError::DuplicateClass(class.label)
            });
        }
        self.index.insert(class.label.clone(), self.classes.len());
        self.classes.push(Arc::new(class));
        Ok(())
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, class: ClassDescriptor) -> Result<Self, SchemaError> {
        self.insert(class)?;
        Ok(self)
    }

    /// Class by label.
    pub fn get(&self, label: &str) -> Option<&Arc<ClassDescriptor>> {
        self.index.get(label).map(|&i| &self.classes[i])
    }

    /// True if a class with this label exists.
    pub fn contains(&self, label: &str) -> bool {
        self.index.contains_key(label)
    }

    /// Classes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ClassDescriptor>> {
        self.classes.iter()
    }

    /// Number of classes.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// True if empty.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::NullClass;
    use crate::value::VarType;

    #[test]
    fn test_preset_body_replaces_in_place() {
        let body = PresetBody::new()
            .with("freq", Literal::Float(220.0))
            .with("gain", Literal::Float(0.5))
            .with("freq", Literal::Float(330.0));
        assert_eq!(body.len(), 2);
        assert_eq!(body.get("freq"), Some(&Literal::Float(330.0)));
        let labels: Vec<_> = body.iter().map(|(l, _)| l).collect();
        assert_eq!(labels, vec!["freq", "gain"]);
    }

    #[test]
    fn test_class_lookup() {
        let class = ClassDescriptor::plain("osc", Arc::new(NullClass))
            .with_var(VarDescriptor::new("freq", "Hz", VarType::Float))
            .with_preset("low", PresetBody::new().with("freq", Literal::Float(55.0)));
        assert_eq!(class.var_index("freq"), Some(0));
        assert!(class.var("gain").is_none());
        assert!(class.preset("low").is_some());
        assert!(!class.is_subnet());
    }

    #[test]
    fn test_duplicate_labels_rejected() {
        let mut set = ClassSet::new();
        set.insert(ClassDescriptor::plain("osc", Arc::new(NullClass)))
            .unwrap();
        let err = set
            .insert(ClassDescriptor::plain("osc", Arc::new(NullClass)))
            .unwrap_err();
        assert_eq!(err, SchemaError::DuplicateClass("osc".into()));

        let err = set
            .insert(ClassDescriptor::subnet("osc", NetworkTemplate::default()))
            .unwrap_err();
        assert_eq!(err, SchemaError::DuplicateSubnet("osc".into()));
        assert_eq!(set.len(), 1);
    }
}
