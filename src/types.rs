//! gatebridge/src/types.rs
//! Core data structures shared across the codec, client, and proxy layers
//! (spec §3 — Data Model).

use std::fmt;

/// An opaque ASCII token issued by the host, or one the client synthesizes
/// for static dispatch. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetId(String);

impl TargetId {
    /// The gateway's entry-point object (spec §3, §6: reserved identifier `t`).
    pub const ENTRY_POINT: &'static str = "t";
    /// The default namespace view (spec §3, §6: reserved identifier `rj`).
    pub const DEFAULT_VIEW: &'static str = "rj";
    /// Prefix marking a static-dispatch target (spec §3, §6: `z:`).
    pub const STATIC_PREFIX: &'static str = "z:";

    /// Wrap an arbitrary, host-assigned instance reference. Opaque to the
    /// client — no validation beyond newline-safety is performed here, per
    /// the "newline tolerance in identifiers" open question in spec §9
    /// (callers are expected to pass ASCII-safe tokens).
    pub fn instance(id: impl Into<String>) -> Self {
        TargetId(id.into())
    }

    /// Build a static-dispatch target id from a fully-qualified class name.
    pub fn static_dispatch(fqn: &str) -> Self {
        TargetId(format!("{}{}", Self::STATIC_PREFIX, fqn))
    }

    pub fn entry_point() -> Self {
        TargetId(Self::ENTRY_POINT.to_string())
    }

    pub fn default_view() -> Self {
        TargetId(Self::DEFAULT_VIEW.to_string())
    }

    /// True if this target routes through static dispatch (spec §3: "Static
    /// Dispatch reference: the literal prefix `z:`...").
    pub fn is_static(&self) -> bool {
        self.0.starts_with(Self::STATIC_PREFIX)
    }

    /// The fully-qualified class name, if this is a static-dispatch target.
    pub fn fqn(&self) -> Option<&str> {
        self.0.strip_prefix(Self::STATIC_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TargetId {
    fn from(s: String) -> Self {
        TargetId(s)
    }
}

impl From<&str> for TargetId {
    fn from(s: &str) -> Self {
        TargetId(s.to_string())
    }
}

/// The set of interfaces a locally-registered callback object implements,
/// carried alongside the object itself so the encoder can emit the `f`
/// command part (spec §4.A, design note "Callback object registration").
#[derive(Debug, Clone)]
pub struct CallbackInterfaces(pub Vec<String>);

impl CallbackInterfaces {
    pub fn joined(&self) -> String {
        self.0.join(";")
    }
}

/// A tagged union of every value the wire protocol can carry (spec §3, §4.A).
///
/// `Null`/`Void` are distinct variants even though both decode from an
/// empty-ish payload (tags `n` and `v`/`n` respectively) because the spec
/// keeps them distinct at the type level; the codec's decoder collapses `v`
/// into `Null` per the tag-dispatch table in §4.A.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Void,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Double(f64),
    /// Arbitrary-precision decimal, preserved verbatim as its textual form
    /// (spec §4.A, tag `D`).
    Decimal(String),
    String(String),
    Bytes(Vec<u8>),
    /// A reference to a host object, tagged with the exact kind the host
    /// reported (object/list/set/map/array/iterator) so the client never
    /// speculatively upgrades or downgrades it (spec §3 invariants).
    Reference { target_id: TargetId, kind: ReferenceKind },
    /// A reference to a local proxy registered for host callback (spec §3,
    /// tag `f`).
    LocalProxy { id: String },
}

/// The six container kinds plus the generic object kind that a `Reference`
/// value may carry (spec §4.A tag-dispatch table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Object,
    List,
    Set,
    Map,
    Array,
    Iterator,
}

impl ReferenceKind {
    /// The wire type tag for this reference kind (spec §6).
    pub fn tag(self) -> char {
        match self {
            ReferenceKind::Object => 'r',
            ReferenceKind::List => 'l',
            ReferenceKind::Set => 'h',
            ReferenceKind::Map => 'a',
            ReferenceKind::Array => 't',
            ReferenceKind::Iterator => 'g',
        }
    }

    pub fn from_tag(tag: char) -> Option<Self> {
        match tag {
            'r' => Some(ReferenceKind::Object),
            'l' => Some(ReferenceKind::List),
            'h' => Some(ReferenceKind::Set),
            'a' => Some(ReferenceKind::Map),
            't' => Some(ReferenceKind::Array),
            'g' => Some(ReferenceKind::Iterator),
            _ => None,
        }
    }
}
