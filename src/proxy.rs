//! gatebridge/src/proxy.rs
//! The object/class/package proxy model (spec §3, §4.E) and the generic
//! object proxy all other proxies compose over (spec §4.F preamble).

use crate::client::Client;
use crate::codec::Arg;
use crate::containers::{ArrayProxy, IteratorProxy, ListProxy, MapProxy, SetProxy};
use crate::error::GateError;
use crate::registry::LocalObject;
use crate::types::{ReferenceKind, TargetId};
use std::sync::Arc;

/// Shared state every proxy kind carries: its target ID and a handle back
/// to the client that can act on it. Rust has no inheritance, so composition
/// stands in for the teacher's (and the source protocol's) common proxy
/// base — every concrete proxy struct below wraps one of these.
#[derive(Clone)]
pub struct ProxyHandle {
    pub target_id: TargetId,
    pub client: Client,
}

impl ProxyHandle {
    pub fn new(target_id: TargetId, client: Client) -> Self {
        ProxyHandle { target_id, client }
    }

    /// Every proxy kind refuses to answer to `then` (spec §4.E) so that a
    /// proxy never accidentally looks like a promise-bearing object to code
    /// doing duck-typed awaiting. In idiomatic Rust there is no ambient
    /// property lookup to guard, but the operation is kept as an explicit,
    /// always-`None` accessor so the behavior stays testable and named the
    /// way the spec names it.
    pub fn then(&self) -> Option<MaterializedValue> {
        None
    }
}

/// A value returned by a client operation, after reference payloads have
/// been rewrapped into the proxy kind the host tagged them with, and
/// callback-proxy payloads have been resolved against the registry (spec
/// §4.A Decode, materialized by `Client::materialize`).
#[derive(Clone)]
pub enum MaterializedValue {
    Null,
    Void,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Double(f64),
    Decimal(String),
    String(String),
    Bytes(Vec<u8>),
    Proxy(AnyProxy),
    /// Resolution of a callback-proxy payload against the registry; `None`
    /// if the ID is absent (spec §4.A tag `f` decode rule).
    LocalObject(Option<Arc<dyn LocalObject>>),
}

impl std::fmt::Debug for MaterializedValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaterializedValue::Null => write!(f, "Null"),
            MaterializedValue::Void => write!(f, "Void"),
            MaterializedValue::Bool(b) => write!(f, "Bool({b})"),
            MaterializedValue::Int32(i) => write!(f, "Int32({i})"),
            MaterializedValue::Int64(i) => write!(f, "Int64({i})"),
            MaterializedValue::Double(d) => write!(f, "Double({d})"),
            MaterializedValue::Decimal(s) => write!(f, "Decimal({s})"),
            MaterializedValue::String(s) => write!(f, "String({s:?})"),
            MaterializedValue::Bytes(b) => write!(f, "Bytes[{}]", b.len()),
            MaterializedValue::Proxy(p) => write!(f, "Proxy({})", p.target_id()),
            MaterializedValue::LocalObject(o) => write!(f, "LocalObject(registered={})", o.is_some()),
        }
    }
}

impl MaterializedValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, MaterializedValue::Null | MaterializedValue::Void)
    }
}

/// Converting a materialized value back into an encodable argument: used
/// when a callback method's return value is sent back to the host, or when
/// a value obtained from one call is passed as an argument to another (spec
/// §4.G reply encoding).
impl From<&MaterializedValue> for Arg {
    fn from(v: &MaterializedValue) -> Self {
        match v {
            MaterializedValue::Null | MaterializedValue::Void => Arg::Null,
            MaterializedValue::Bool(b) => Arg::Bool(*b),
            MaterializedValue::Int32(i) => Arg::Int32(*i),
            MaterializedValue::Int64(i) => Arg::Int64(*i),
            MaterializedValue::Double(d) => Arg::Double(*d),
            MaterializedValue::Decimal(s) => Arg::Str(s.clone()),
            MaterializedValue::String(s) => Arg::Str(s.clone()),
            MaterializedValue::Bytes(b) => Arg::Bytes(b.clone()),
            MaterializedValue::Proxy(p) => Arg::Proxy(p.target_id().clone()),
            MaterializedValue::LocalObject(Some(obj)) => Arg::Callback(obj.clone()),
            MaterializedValue::LocalObject(None) => Arg::Null,
        }
    }
}

/// One of the six container proxy kinds, or the generic object proxy. This
/// is what `Client::wrap` produces from a decoded reference, and what
/// `MaterializedValue::Proxy` carries.
#[derive(Clone)]
pub enum AnyProxy {
    Object(ObjectProxy),
    List(ListProxy),
    Set(SetProxy),
    Map(MapProxy),
    Array(ArrayProxy),
    Iterator(IteratorProxy),
}

impl AnyProxy {
    pub fn target_id(&self) -> &TargetId {
        match self {
            AnyProxy::Object(p) => &p.handle.target_id,
            AnyProxy::List(p) => &p.handle.target_id,
            AnyProxy::Set(p) => &p.handle.target_id,
            AnyProxy::Map(p) => &p.handle.target_id,
            AnyProxy::Array(p) => &p.handle.target_id,
            AnyProxy::Iterator(p) => &p.handle.target_id,
        }
    }

    pub fn kind(&self) -> ReferenceKind {
        match self {
            AnyProxy::Object(_) => ReferenceKind::Object,
            AnyProxy::List(_) => ReferenceKind::List,
            AnyProxy::Set(_) => ReferenceKind::Set,
            AnyProxy::Map(_) => ReferenceKind::Map,
            AnyProxy::Array(_) => ReferenceKind::Array,
            AnyProxy::Iterator(_) => ReferenceKind::Iterator,
        }
    }

    pub fn as_object(&self) -> ObjectProxy {
        match self {
            AnyProxy::Object(p) => p.clone(),
            AnyProxy::List(p) => p.as_object(),
            AnyProxy::Set(p) => p.as_object(),
            AnyProxy::Map(p) => p.as_object(),
            AnyProxy::Array(p) => p.as_object(),
            AnyProxy::Iterator(p) => p.as_object(),
        }
    }
}

/// The generic object proxy (spec §3, §4.E "Property access on an object
/// proxy"). Any named operation becomes a remote method call through
/// `call`; field access goes through the explicit `field`/`set_field` pair
/// rather than dynamic property interception — see spec §9's design note on
/// generic object proxy dispatch for statically-typed hosts.
#[derive(Clone)]
pub struct ObjectProxy {
    pub handle: ProxyHandle,
}

impl std::fmt::Debug for ObjectProxy {
    /// Manual rather than derived: `ProxyHandle` carries a `Client`, which
    /// has no reason to implement `Debug` of its own. `GateError` (which
    /// embeds an `Option<ObjectProxy>`) derives `Debug`, so this impl only
    /// needs to exist, not be exhaustive.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectProxy").field("target_id", &self.handle.target_id).finish()
    }
}

impl ObjectProxy {
    pub fn new(handle: ProxyHandle) -> Self {
        ObjectProxy { handle }
    }

    pub fn target_id(&self) -> &TargetId {
        &self.handle.target_id
    }

    /// `args → callMethod(targetId, prop, args)` (spec §4.E).
    pub async fn call(&self, method: &str, args: Vec<Arg>) -> Result<MaterializedValue, GateError> {
        self.handle
            .client
            .call_method(&self.handle.target_id, method, args)
            .await
    }

    pub async fn field(&self, name: &str) -> Result<MaterializedValue, GateError> {
        self.handle.client.get_field(&self.handle.target_id, name).await
    }

    /// The explicit field-set operation. Spec §4.E: "Direct field
    /// assignment is refused with a directive to use the explicit
    /// field-set operation" — this method *is* that explicit operation;
    /// there is no separate assignment sugar to refuse, since Rust has no
    /// ambient property-set syntax for an opaque remote object to hijack.
    pub async fn set_field(&self, name: &str, value: Arg) -> Result<(), GateError> {
        self.handle
            .client
            .set_field(&self.handle.target_id, name, value)
            .await
    }

    pub async fn release(&self) {
        self.handle.client.release_object(&self.handle.target_id).await;
    }

    pub fn then(&self) -> Option<MaterializedValue> {
        self.handle.then()
    }
}

/// Polymorphic over "constructor callable" and "static member namespace"
/// (spec §3). Carries the class's fully-qualified name and a synthesized
/// static target ID (`z:<fqn>`).
#[derive(Clone)]
pub struct ClassProxy {
    pub fqn: String,
    pub handle: ProxyHandle,
}

impl ClassProxy {
    pub fn new(fqn: impl Into<String>, client: Client) -> Self {
        let fqn = fqn.into();
        let target_id = TargetId::static_dispatch(&fqn);
        ClassProxy {
            fqn,
            handle: ProxyHandle::new(target_id, client),
        }
    }

    pub fn target_id(&self) -> &TargetId {
        &self.handle.target_id
    }

    /// `classProxy(fqn).prop(args)` sends a `c` command with target
    /// `"z:" + fqn` (spec §8 "Proxy dispatch").
    pub async fn call(&self, method: &str, args: Vec<Arg>) -> Result<MaterializedValue, GateError> {
        self.handle
            .client
            .call_method(&self.handle.target_id, method, args)
            .await
    }

    /// `classProxy(fqn)(args)` sends an `i` command with FQN `fqn` (spec §8).
    pub async fn construct(&self, args: Vec<Arg>) -> Result<ObjectProxy, GateError> {
        self.handle.client.call_constructor(&self.fqn, args).await
    }

    /// Static field get, routed through reflection get-member because this
    /// target starts with `z:` (spec §4.D `getField`).
    pub async fn static_field(&self, name: &str) -> Result<MaterializedValue, GateError> {
        self.handle.client.get_field(&self.handle.target_id, name).await
    }

    pub async fn static_members(&self) -> Result<Vec<String>, GateError> {
        self.handle.client.get_static_members(&self.handle.target_id).await
    }

    pub fn then(&self) -> Option<MaterializedValue> {
        self.handle.then()
    }
}

/// Whether a package-proxy property access promotes to a class or stays a
/// package (spec §4.E).
pub enum PackageOrClass {
    Class(ClassProxy),
    Package(PackageProxy),
}

/// A namespace node (spec §3). Not invocable: calling it is a usage error
/// naming the accumulated path.
#[derive(Clone)]
pub struct PackageProxy {
    pub path: String,
    pub client: Client,
}

impl PackageProxy {
    pub fn new(path: impl Into<String>, client: Client) -> Self {
        PackageProxy {
            path: path.into(),
            client,
        }
    }

    /// Concatenates `<parent>.<prop>` and promotes to a Class proxy if
    /// `prop`'s first character is upper-case, otherwise returns a new
    /// Package proxy (spec §4.E).
    pub fn prop(&self, prop: &str) -> PackageOrClass {
        let fqn = format!("{}.{}", self.path, prop);
        if starts_upper(prop) {
            PackageOrClass::Class(ClassProxy::new(fqn, self.client.clone()))
        } else {
            PackageOrClass::Package(PackageProxy::new(fqn, self.client.clone()))
        }
    }

    /// Calling a package proxy is always a usage error naming the
    /// accumulated path (spec §4.E).
    pub fn call(&self, _args: Vec<Arg>) -> Result<MaterializedValue, GateError> {
        Err(GateError::usage(format!(
            "package proxy '{}' is not invocable",
            self.path
        )))
    }

    pub fn then(&self) -> Option<MaterializedValue> {
        None
    }
}

pub(crate) fn starts_upper(s: &str) -> bool {
    s.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Client;
    use crate::config::GateConfig;

    fn test_client() -> Client {
        Client::new(GateConfig::default())
    }

    #[test]
    fn class_proxy_target_id_is_static_prefixed() {
        let class = ClassProxy::new("java.lang.Math", test_client());
        assert_eq!(class.target_id().as_str(), "z:java.lang.Math");
    }

    #[test]
    fn package_prop_promotes_on_uppercase() {
        let pkg = PackageProxy::new("a.b", test_client());
        match pkg.prop("X") {
            PackageOrClass::Class(c) => assert_eq!(c.fqn, "a.b.X"),
            _ => panic!("expected class proxy"),
        }
        match pkg.prop("x") {
            PackageOrClass::Package(p) => assert_eq!(p.path, "a.b.x"),
            _ => panic!("expected package proxy"),
        }
    }

    #[test]
    fn package_proxy_call_is_usage_error() {
        let pkg = PackageProxy::new("a.b", test_client());
        let err = pkg.call(vec![]).unwrap_err();
        assert!(matches!(err, GateError::Usage(_)));
    }

    #[test]
    fn then_is_always_absent() {
        let class = ClassProxy::new("java.lang.Math", test_client());
        assert!(class.then().is_none());
        let pkg = PackageProxy::new("a.b", test_client());
        assert!(pkg.then().is_none());
    }
}
