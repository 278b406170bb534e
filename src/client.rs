//! gatebridge/src/client.rs
//! High-level command builders dispatched through the pool (spec §4.D).

use crate::codec::{Arg, decode_response, decode_value, encode_arg};
use crate::config::GateConfig;
use crate::containers::{ArrayProxy, IteratorProxy, ListProxy, MapProxy, SetProxy};
use crate::error::GateError;
use crate::namespace::NamespaceView;
use crate::pool::Pool;
use crate::proxy::{AnyProxy, MaterializedValue, ObjectProxy, ProxyHandle};
use crate::registry::{LocalObject, ProxyRegistry};
use crate::types::{ReferenceKind, TargetId, Value};
use std::sync::Arc;
use tracing::{debug, warn};

struct ClientInner {
    pool: Pool,
    registry: Arc<ProxyRegistry>,
}

/// A handle to one gateway session: a connection pool plus the callback
/// registry both the outbound encoder and the inbound callback server
/// (spec §9 "Cyclic references between Client and Callback Server") share.
/// Cheap to clone — every clone refers to the same pool and registry.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    pub fn new(config: GateConfig) -> Self {
        let pool = Pool::new(config.gateway_addr(), config.auth_token.clone(), config.max_pool_size);
        Client {
            inner: Arc::new(ClientInner {
                pool,
                registry: Arc::new(ProxyRegistry::new()),
            }),
        }
    }

    /// The callback registry, shared (not owned) so a callback server can be
    /// built from the same handle without either side owning the other.
    pub fn registry_handle(&self) -> Arc<ProxyRegistry> {
        self.inner.registry.clone()
    }

    pub fn entry_point(&self) -> ObjectProxy {
        ObjectProxy::new(ProxyHandle::new(TargetId::entry_point(), self.clone()))
    }

    /// The default namespace view, reserved id `rj` (spec §3, §6).
    pub fn namespace(&self) -> NamespaceView {
        NamespaceView::new(TargetId::default_view(), self.clone())
    }

    pub fn wrap(&self, target_id: TargetId, kind: ReferenceKind) -> AnyProxy {
        let handle = ProxyHandle::new(target_id, self.clone());
        match kind {
            ReferenceKind::Object => AnyProxy::Object(ObjectProxy::new(handle)),
            ReferenceKind::List => AnyProxy::List(ListProxy::new(handle)),
            ReferenceKind::Set => AnyProxy::Set(SetProxy::new(handle)),
            ReferenceKind::Map => AnyProxy::Map(MapProxy::new(handle)),
            ReferenceKind::Array => AnyProxy::Array(ArrayProxy::new(handle)),
            ReferenceKind::Iterator => AnyProxy::Iterator(IteratorProxy::new(handle)),
        }
    }

    pub fn lookup_proxy(&self, id: &str) -> Option<Arc<dyn LocalObject>> {
        self.inner.registry.lookup(id)
    }

    /// Same as the private `materialize`, exposed to the callback server
    /// (spec §4.G: inbound call arguments are decoded via the Codec then
    /// rewrapped the same way an outbound response is).
    pub(crate) fn materialize_value(&self, value: Value) -> MaterializedValue {
        self.materialize(value)
    }

    fn materialize(&self, value: Value) -> MaterializedValue {
        match value {
            Value::Null => MaterializedValue::Null,
            Value::Void => MaterializedValue::Void,
            Value::Bool(b) => MaterializedValue::Bool(b),
            Value::Int32(i) => MaterializedValue::Int32(i),
            Value::Int64(i) => MaterializedValue::Int64(i),
            Value::Double(d) => MaterializedValue::Double(d),
            Value::Decimal(s) => MaterializedValue::Decimal(s),
            Value::String(s) => MaterializedValue::String(s),
            Value::Bytes(b) => MaterializedValue::Bytes(b),
            Value::Reference { target_id, kind } => MaterializedValue::Proxy(self.wrap(target_id, kind)),
            Value::LocalProxy { id } => MaterializedValue::LocalObject(self.inner.registry.lookup(&id)),
        }
    }

    fn encode_args(&self, args: &[Arg]) -> Result<String, GateError> {
        let mut parts = String::new();
        for arg in args {
            parts.push_str(&encode_arg(arg, &self.inner.registry)?);
        }
        Ok(parts)
    }

    async fn send_raw(&self, command: String) -> Result<String, GateError> {
        self.inner
            .pool
            .with_connection(move |conn| async move { conn.send(command).await })
            .await
    }

    /// Send a command, decode the response, and materialize the result —
    /// rewrapping a reference payload into a live proxy, or a callback-proxy
    /// payload into a registry lookup. On a host invocation error, also
    /// best-effort decodes the error payload into a host-exception proxy
    /// (spec §4.A Decode, `x` case).
    pub(crate) async fn dispatch(&self, command: String) -> Result<MaterializedValue, GateError> {
        crate::state::TOTAL_REQUESTS.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let reply = self.send_raw(command).await?;
        match decode_response(&reply) {
            Ok(value) => Ok(self.materialize(value)),
            Err(GateError::HostInvocation {
                payload,
                host_exception: None,
            }) => {
                let host_exception = decode_value(&payload)
                    .ok()
                    .map(|v| self.materialize(v))
                    .and_then(|mv| match mv {
                        MaterializedValue::Proxy(p) => Some(p.as_object()),
                        _ => None,
                    });
                Err(GateError::HostInvocation {
                    payload,
                    host_exception,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// `c\n TARGET\n METHOD\n ARGPARTS… e\n` (spec §4.D).
    pub async fn call_method(
        &self,
        target: &TargetId,
        method: &str,
        args: Vec<Arg>,
    ) -> Result<MaterializedValue, GateError> {
        let argparts = self.encode_args(&args)?;
        let command = format!("c\n{target}\n{method}\n{argparts}e\n");
        self.dispatch(command).await
    }

    /// `i\n FQN\n ARGPARTS… e\n` (spec §4.D).
    pub async fn call_constructor(&self, fqn: &str, args: Vec<Arg>) -> Result<ObjectProxy, GateError> {
        let argparts = self.encode_args(&args)?;
        let command = format!("i\n{fqn}\n{argparts}e\n");
        match self.dispatch(command).await? {
            MaterializedValue::Proxy(p) => Ok(p.as_object()),
            other => Err(GateError::ProtocolDecode(format!(
                "constructor did not return an object reference: {other:?}"
            ))),
        }
    }

    /// Instance fields route through `f\ng\n TARGET\n FIELD\n e\n`; targets
    /// carrying the static-dispatch prefix route through reflection
    /// get-member instead: `r\nm\n FQN\n FIELD\n e\n` (spec §4.D).
    pub async fn get_field(&self, target: &TargetId, field: &str) -> Result<MaterializedValue, GateError> {
        let command = match target.fqn() {
            Some(fqn) => format!("r\nm\n{fqn}\n{field}\ne\n"),
            None => format!("f\ng\n{target}\n{field}\ne\n"),
        };
        self.dispatch(command).await
    }

    /// `f\ns\n TARGET\n FIELD\n VALUEPART e\n` (spec §4.D).
    pub async fn set_field(&self, target: &TargetId, field: &str, value: Arg) -> Result<(), GateError> {
        let valuepart = encode_arg(&value, &self.inner.registry)?;
        let command = format!("f\ns\n{target}\n{field}\n{valuepart}e\n");
        self.dispatch(command).await?;
        Ok(())
    }

    /// `m\nd\n TARGET\n e\n`, best effort: transport errors are swallowed
    /// since the host may already have collected the object (spec §4.D, §7).
    pub async fn release_object(&self, target: &TargetId) {
        let command = format!("m\nd\n{target}\ne\n");
        if let Err(e) = self.dispatch(command).await {
            debug!(%target, error = %e, "releaseObject best-effort failure");
        }
    }

    async fn dir(&self, sub: char, target: &TargetId) -> Result<Vec<String>, GateError> {
        let command = format!("d\n{sub}\n{target}\ne\n");
        match self.dispatch(command).await? {
            MaterializedValue::String(s) => Ok(s.split('\n').filter(|p| !p.is_empty()).map(String::from).collect()),
            MaterializedValue::Null | MaterializedValue::Void => Ok(Vec::new()),
            other => Err(GateError::ProtocolDecode(format!(
                "expected a name listing, got {other:?}"
            ))),
        }
    }

    pub async fn get_methods(&self, target: &TargetId) -> Result<Vec<String>, GateError> {
        self.dir('m', target).await
    }

    pub async fn get_fields(&self, target: &TargetId) -> Result<Vec<String>, GateError> {
        self.dir('f', target).await
    }

    pub async fn get_static_members(&self, target: &TargetId) -> Result<Vec<String>, GateError> {
        self.dir('s', target).await
    }

    /// `h\n{o,c}\n TARGET\n [PATTERN\n] e\n` (spec §4.D).
    pub async fn help(&self, target: &TargetId, pattern: Option<&str>, is_class: bool) -> Result<String, GateError> {
        let sub = if is_class { 'c' } else { 'o' };
        let mut command = format!("h\n{sub}\n{target}\n");
        if let Some(p) = pattern {
            command.push_str(p);
            command.push('\n');
        }
        command.push_str("e\n");
        match self.dispatch(command).await? {
            MaterializedValue::String(s) => Ok(s),
            other => Err(GateError::ProtocolDecode(format!("expected help text, got {other:?}"))),
        }
    }

    /// `a\nc\n s<FQN>\n DIMPARTS… e\n` (spec §4.D). Requires at least one
    /// dimension — `newArray` with no dimensions is a usage error (spec §7).
    pub async fn new_array(&self, fqn: &str, dims: Vec<i32>) -> Result<ArrayProxy, GateError> {
        if dims.is_empty() {
            return Err(GateError::usage("newArray requires at least one dimension"));
        }
        let fqn_part = encode_arg(&Arg::Str(fqn.to_string()), &self.inner.registry)?;
        let mut command = format!("a\nc\n{fqn_part}");
        for d in &dims {
            command.push_str(&encode_arg(&Arg::Int32(*d), &self.inner.registry)?);
        }
        command.push_str("e\n");
        match self.dispatch(command).await? {
            MaterializedValue::Proxy(AnyProxy::Array(a)) => Ok(a),
            other => Err(GateError::ProtocolDecode(format!(
                "newArray did not return an array reference: {other:?}"
            ))),
        }
    }

    /// `s\n e\n`, best effort (spec §4.D, §5 "Resource release").
    pub async fn shutdown_gateway(&self) {
        if let Err(e) = self.dispatch("s\n e\n".to_string()).await {
            warn!(error = %e, "shutdownGateway command failed");
        }
    }

    /// `j\ni\n<viewId>\n<fqn>\n e\n` (spec §4.E).
    pub async fn java_import(&self, view_id: &TargetId, fqn: &str) -> Result<(), GateError> {
        let command = format!("j\ni\n{view_id}\n{fqn}\n e\n");
        self.dispatch(command).await?;
        Ok(())
    }

    /// `j\nr\n<viewId>\n<fqn>\n e\n` (spec §4.E).
    pub async fn remove_import(&self, view_id: &TargetId, fqn: &str) -> Result<(), GateError> {
        let command = format!("j\nr\n{view_id}\n{fqn}\n e\n");
        self.dispatch(command).await?;
        Ok(())
    }

    /// `l\ns\n TARGET\n e\n` (spec §4.F).
    pub(crate) async fn list_sort(&self, target: &TargetId) -> Result<(), GateError> {
        self.dispatch(format!("l\ns\n{target}\ne\n")).await?;
        Ok(())
    }

    /// `l\nr\n TARGET\n e\n` (spec §4.F).
    pub(crate) async fn list_reverse(&self, target: &TargetId) -> Result<(), GateError> {
        self.dispatch(format!("l\nr\n{target}\ne\n")).await?;
        Ok(())
    }

    /// `l\nl\n TARGET\n <i>from\n <i>to\n e\n` (spec §4.F).
    pub(crate) async fn list_sublist(&self, target: &TargetId, from: i32, to: i32) -> Result<AnyProxy, GateError> {
        let command = format!(
            "l\nl\n{target}\n{}{}e\n",
            encode_arg(&Arg::Int32(from), &self.inner.registry)?,
            encode_arg(&Arg::Int32(to), &self.inner.registry)?
        );
        match self.dispatch(command).await? {
            MaterializedValue::Proxy(p) => Ok(p),
            other => Err(GateError::ProtocolDecode(format!("subList did not return a list reference: {other:?}"))),
        }
    }

    /// `l\nf\n TARGET\n VALUEPART e\n` (spec §4.F).
    pub(crate) async fn list_count(&self, target: &TargetId, value: Arg) -> Result<i64, GateError> {
        let valuepart = encode_arg(&value, &self.inner.registry)?;
        let command = format!("l\nf\n{target}\n{valuepart}e\n");
        expect_int(self.dispatch(command).await?)
    }

    /// `a\ng\n TARGET\n <i>index\n e\n` (spec §4.F).
    pub(crate) async fn array_get(&self, target: &TargetId, index: i32) -> Result<MaterializedValue, GateError> {
        let command = format!(
            "a\ng\n{target}\n{}e\n",
            encode_arg(&Arg::Int32(index), &self.inner.registry)?
        );
        self.dispatch(command).await
    }

    /// `a\ns\n TARGET\n <i>index\n VALUEPART e\n` (spec §4.F).
    pub(crate) async fn array_set(&self, target: &TargetId, index: i32, value: Arg) -> Result<(), GateError> {
        let command = format!(
            "a\ns\n{target}\n{}{}e\n",
            encode_arg(&Arg::Int32(index), &self.inner.registry)?,
            encode_arg(&value, &self.inner.registry)?
        );
        self.dispatch(command).await?;
        Ok(())
    }

    /// `a\ne\n TARGET\n e\n` (spec §4.F).
    pub(crate) async fn array_length(&self, target: &TargetId) -> Result<i64, GateError> {
        let command = format!("a\ne\n{target}\ne\n");
        expect_int(self.dispatch(command).await?)
    }

    /// `a\nl\n TARGET\n <i>from\n <i>to\n e\n` (spec §4.F).
    pub(crate) async fn array_slice(&self, target: &TargetId, from: i32, to: i32) -> Result<AnyProxy, GateError> {
        let command = format!(
            "a\nl\n{target}\n{}{}e\n",
            encode_arg(&Arg::Int32(from), &self.inner.registry)?,
            encode_arg(&Arg::Int32(to), &self.inner.registry)?
        );
        match self.dispatch(command).await? {
            MaterializedValue::Proxy(p) => Ok(p),
            other => Err(GateError::ProtocolDecode(format!(
                "array slice did not return an array reference: {other:?}"
            ))),
        }
    }

    /// Close idle pooled connections; active ones finish their in-flight
    /// work and close themselves (spec §4.C `closeAll`, §5 "Resource release").
    pub async fn close(&self) {
        self.inner.pool.close_all().await;
    }

    /// Sends the shutdown command to the host, then closes idle connections
    /// (spec §5 "Resource release": "`shutdown` additionally sends the
    /// shutdown command to the host").
    pub async fn shutdown(&self) {
        self.shutdown_gateway().await;
        self.close().await;
    }
}

pub(crate) fn expect_int(value: MaterializedValue) -> Result<i64, GateError> {
    match value {
        MaterializedValue::Int32(i) => Ok(i64::from(i)),
        MaterializedValue::Int64(i) => Ok(i),
        other => Err(GateError::ProtocolDecode(format!("expected an integer, got {other:?}"))),
    }
}
