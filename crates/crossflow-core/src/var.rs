//! Variable descriptors.
//!
//! A [`VarDescriptor`] is the schema of one class variable: its label,
//! documentation, declared [`VarType`], [`VarFlags`], optional default and,
//! for subnet classes, the [`ProxyRef`] naming the internal variable it
//! exposes.

use crate::value::{Literal, VarType};

/// Behavior flags attached to a variable.
///
/// # Example
///
/// ```rust
/// use crossflow_core::VarFlags;
///
/// let flags = VarFlags::SRC.union(VarFlags::NOTIFY);
/// assert!(flags.contains(VarFlags::SRC));
/// assert!(!flags.contains(VarFlags::INIT));
/// assert_eq!(VarFlags::from_token("ui_hide"), Some(VarFlags::UI_HIDE));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct VarFlags(u16);

impl VarFlags {
    /// No flags set.
    pub const NONE: Self = Self(0);
    /// Input that must be connected to a source.
    pub const SRC: Self = Self(1 << 0);
    /// Input that may optionally be connected.
    pub const SRC_OPT: Self = Self(1 << 1);
    /// Variable that may never be connected to a source.
    pub const NO_SRC: Self = Self(1 << 2);
    /// Only read at construction time.
    pub const INIT: Self = Self(1 << 3);
    /// Variable may be instantiated multiple times.
    pub const MULT: Self = Self(1 << 4);
    /// Subnet output; only meaningful on subnet variables.
    pub const OUT: Self = Self(1 << 5);
    /// Native implementation is notified when the value changes.
    pub const NOTIFY: Self = Self(1 << 6);
    /// Create a control for this variable.
    pub const UI_CREATE: Self = Self(1 << 7);
    /// Show the control disabled.
    pub const UI_DISABLE: Self = Self(1 << 8);
    /// Hide the control.
    pub const UI_HIDE: Self = Self(1 << 9);

    const TOKENS: [(&'static str, Self); 10] = [
        ("src", Self::SRC),
        ("src_opt", Self::SRC_OPT),
        ("no_src", Self::NO_SRC),
        ("init", Self::INIT),
        ("mult", Self::MULT),
        ("out", Self::OUT),
        ("notify", Self::NOTIFY),
        ("ui_create", Self::UI_CREATE),
        ("ui_disable", Self::UI_DISABLE),
        ("ui_hide", Self::UI_HIDE),
    ];

    /// Map a configuration token to its flag.
    pub fn from_token(token: &str) -> Option<Self> {
        Self::TOKENS
            .iter()
            .find(|(t, _)| *t == token)
            .map(|(_, f)| *f)
    }

    /// Tokens of every set flag, in bit order.
    pub fn tokens(self) -> impl Iterator<Item = &'static str> {
        Self::TOKENS
            .into_iter()
            .filter(move |(_, f)| self.contains(*f))
            .map(|(t, _)| t)
    }

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

    /// Returns `self` with the bits of `other` cleared.
    #[inline]
    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Returns `true` if no flag is set.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Reference from a subnet variable to `<proc>.<var>` inside the subnet.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProxyRef {
    /// Instance label of the internal proc.
    pub proc: String,
    /// Variable label on that proc.
    pub var: String,
}

impl ProxyRef {
    /// Split a proxy string on its first `.`.
    ///
    /// Returns a short reason when the string is malformed.
    pub fn parse(s: &str) -> Result<Self, &'static str> {
        let (proc, var) = s
            .split_once('.')
            .ok_or("expected '<proc>.<var>': no period found")?;
        if proc.is_empty() {
            return Err("the proc label is empty");
        }
        if var.is_empty() {
            return Err("the var label is empty");
        }
        Ok(Self {
            proc: proc.to_string(),
            var: var.to_string(),
        })
    }
}

impl std::fmt::Display for ProxyRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.proc, self.var)
    }
}

/// Schema of one class variable. Immutable once its class is parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct VarDescriptor {
    /// Label, unique within the class.
    pub label: String,
    /// Documentation string.
    pub doc: String,
    /// Declared type. Always `Some` once the class set is resolved.
    pub ty: Option<VarType>,
    /// Behavior flags.
    pub flags: VarFlags,
    /// Default value literal.
    pub default: Option<Literal>,
    /// True when `default` was inherited from a proxied inner variable.
    pub default_inherited: bool,
    /// Internal target for subnet variables.
    pub proxy: Option<ProxyRef>,
}

impl VarDescriptor {
    /// A typed descriptor with no flags, default or proxy.
    pub fn new(label: impl Into<String>, doc: impl Into<String>, ty: VarType) -> Self {
        Self {
            label: label.into(),
            doc: doc.into(),
            ty: Some(ty),
            flags: VarFlags::NONE,
            default: None,
            default_inherited: false,
            proxy: None,
        }
    }

    /// Set flags (builder style).
    pub fn with_flags(mut self, flags: VarFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set the default (builder style).
    pub fn with_default(mut self, default: Literal) -> Self {
        self.default = Some(default);
        self
    }

    /// Declared type, or [`VarType::Double`] when unresolved.
    ///
    /// Resolved class sets never contain untyped descriptors.
    pub fn var_type(&self) -> VarType {
        self.ty.unwrap_or(VarType::Double)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_token_maps_to_a_distinct_bit() {
        let mut all = VarFlags::NONE;
        for (token, flag) in VarFlags::TOKENS {
            assert_eq!(VarFlags::from_token(token), Some(flag));
            assert!(!all.contains(flag), "{token} overlaps");
            all = all.union(flag);
        }
        assert_eq!(VarFlags::from_token("input"), None);
    }

    #[test]
    fn test_tokens_round_trip() {
        let flags = VarFlags::SRC.union(VarFlags::UI_HIDE);
        assert_eq!(flags.tokens().collect::<Vec<_>>(), vec!["src", "ui_hide"]);
        assert_eq!(flags.difference(VarFlags::SRC), VarFlags::UI_HIDE);
    }

    #[test]
    fn test_proxy_splits_on_first_period() {
        let p = ProxyRef::parse("osc.freq.hz").unwrap();
        assert_eq!(p.proc, "osc");
        assert_eq!(p.var, "freq.hz");
        assert_eq!(p.to_string(), "osc.freq.hz");
    }

    #[test]
    fn test_malformed_proxy() {
        assert!(ProxyRef::parse("oscfreq").is_err());
        assert!(ProxyRef::parse(".freq").is_err());
        assert!(ProxyRef::parse("osc.").is_err());
    }
}
