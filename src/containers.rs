//! gatebridge/src/containers.rs
//! The six container proxy specializations (spec §4.F). All but Array route
//! through the generic object proxy's method call; Array uses a dedicated
//! protocol exclusively, and List layers a few dedicated subcommands over
//! its method-based core.

use crate::client::expect_int;
use crate::codec::Arg;
use crate::error::GateError;
use crate::proxy::{AnyProxy, MaterializedValue, ObjectProxy, ProxyHandle};
use crate::types::TargetId;

/// Ordered-sequence container. `size`/`get`/`add`/`addAt`/`remove`/`set`/
/// `clear`/`contains`/`indexOf` are plain remote method calls; `sort`,
/// `reverse`, `subList`, and `count` use the dedicated `l` top-level command
/// instead (spec §4.F).
#[derive(Clone)]
pub struct ListProxy {
    pub handle: ProxyHandle,
}

impl ListProxy {
    pub fn new(handle: ProxyHandle) -> Self {
        ListProxy { handle }
    }

    pub fn target_id(&self) -> &TargetId {
        &self.handle.target_id
    }

    pub fn as_object(&self) -> ObjectProxy {
        ObjectProxy::new(self.handle.clone())
    }

    pub async fn size(&self) -> Result<i64, GateError> {
        expect_int(self.as_object().call("size", vec![]).await?)
    }

    pub async fn get(&self, index: i64) -> Result<MaterializedValue, GateError> {
        self.as_object().call("get", vec![crate::codec::encode_integer(index)]).await
    }

    pub async fn add(&self, element: Arg) -> Result<MaterializedValue, GateError> {
        self.as_object().call("add", vec![element]).await
    }

    pub async fn add_at(&self, index: i64, element: Arg) -> Result<MaterializedValue, GateError> {
        self.as_object()
            .call("addAt", vec![crate::codec::encode_integer(index), element])
            .await
    }

    /// `remove` is overloaded in the source on index-vs-value; callers
    /// choose which by passing the `Arg` they mean (spec §4.F `remove(i_or_v)`).
    pub async fn remove(&self, index_or_value: Arg) -> Result<MaterializedValue, GateError> {
        self.as_object().call("remove", vec![index_or_value]).await
    }

    pub async fn set(&self, index: i64, element: Arg) -> Result<MaterializedValue, GateError> {
        self.as_object()
            .call("set", vec![crate::codec::encode_integer(index), element])
            .await
    }

    pub async fn clear(&self) -> Result<(), GateError> {
        self.as_object().call("clear", vec![]).await?;
        Ok(())
    }

    pub async fn contains(&self, value: Arg) -> Result<bool, GateError> {
        match self.as_object().call("contains", vec![value]).await? {
            MaterializedValue::Bool(b) => Ok(b),
            other => Err(GateError::ProtocolDecode(format!("expected bool, got {other:?}"))),
        }
    }

    pub async fn index_of(&self, value: Arg) -> Result<i64, GateError> {
        expect_int(self.as_object().call("indexOf", vec![value]).await?)
    }

    pub async fn sort(&self) -> Result<(), GateError> {
        self.handle.client.list_sort(self.target_id()).await
    }

    pub async fn reverse(&self) -> Result<(), GateError> {
        self.handle.client.list_reverse(self.target_id()).await
    }

    pub async fn sub_list(&self, from: i32, to: i32) -> Result<AnyProxy, GateError> {
        self.handle.client.list_sublist(self.target_id(), from, to).await
    }

    pub async fn count(&self, value: Arg) -> Result<i64, GateError> {
        self.handle.client.list_count(self.target_id(), value).await
    }

    /// Materializes the whole list locally by `size()` followed by `get(i)`
    /// in order (spec §4.F `toArray()`).
    pub async fn to_vec(&self) -> Result<Vec<MaterializedValue>, GateError> {
        let len = self.size().await?;
        let mut out = Vec::with_capacity(len.max(0) as usize);
        for i in 0..len {
            out.push(self.get(i).await?);
        }
        Ok(out)
    }

    pub fn then(&self) -> Option<MaterializedValue> {
        self.handle.then()
    }
}

/// Unordered-unique container. Enumeration goes through a host-side
/// iterator obtained via a method call (spec §4.F).
#[derive(Clone)]
pub struct SetProxy {
    pub handle: ProxyHandle,
}

impl SetProxy {
    pub fn new(handle: ProxyHandle) -> Self {
        SetProxy { handle }
    }

    pub fn target_id(&self) -> &TargetId {
        &self.handle.target_id
    }

    pub fn as_object(&self) -> ObjectProxy {
        ObjectProxy::new(self.handle.clone())
    }

    pub async fn size(&self) -> Result<i64, GateError> {
        expect_int(self.as_object().call("size", vec![]).await?)
    }

    pub async fn add(&self, value: Arg) -> Result<bool, GateError> {
        match self.as_object().call("add", vec![value]).await? {
            MaterializedValue::Bool(b) => Ok(b),
            other => Err(GateError::ProtocolDecode(format!("expected bool, got {other:?}"))),
        }
    }

    pub async fn remove(&self, value: Arg) -> Result<bool, GateError> {
        match self.as_object().call("remove", vec![value]).await? {
            MaterializedValue::Bool(b) => Ok(b),
            other => Err(GateError::ProtocolDecode(format!("expected bool, got {other:?}"))),
        }
    }

    pub async fn contains(&self, value: Arg) -> Result<bool, GateError> {
        match self.as_object().call("contains", vec![value]).await? {
            MaterializedValue::Bool(b) => Ok(b),
            other => Err(GateError::ProtocolDecode(format!("expected bool, got {other:?}"))),
        }
    }

    pub async fn clear(&self) -> Result<(), GateError> {
        self.as_object().call("clear", vec![]).await?;
        Ok(())
    }

    /// Obtains a host iterator via `iterator()` for enumeration, per spec
    /// §4.F. Draining it into a local collection is `to_vec`.
    pub async fn iterator(&self) -> Result<IteratorProxy, GateError> {
        match self.as_object().call("iterator", vec![]).await? {
            MaterializedValue::Proxy(AnyProxy::Iterator(it)) => Ok(it),
            other => Err(GateError::ProtocolDecode(format!(
                "iterator() did not return an iterator reference: {other:?}"
            ))),
        }
    }

    /// Materializes by draining the host iterator (spec §4.F `toSet()`).
    pub async fn to_vec(&self) -> Result<Vec<MaterializedValue>, GateError> {
        self.iterator().await?.drain().await
    }

    pub fn then(&self) -> Option<MaterializedValue> {
        self.handle.then()
    }
}

/// Key-to-value container. `keySet`/`values`/`entrySet` return sub-proxies
/// rather than local collections (spec §4.F).
#[derive(Clone)]
pub struct MapProxy {
    pub handle: ProxyHandle,
}

impl MapProxy {
    pub fn new(handle: ProxyHandle) -> Self {
        MapProxy { handle }
    }

    pub fn target_id(&self) -> &TargetId {
        &self.handle.target_id
    }

    pub fn as_object(&self) -> ObjectProxy {
        ObjectProxy::new(self.handle.clone())
    }

    pub async fn size(&self) -> Result<i64, GateError> {
        expect_int(self.as_object().call("size", vec![]).await?)
    }

    pub async fn get(&self, key: Arg) -> Result<MaterializedValue, GateError> {
        self.as_object().call("get", vec![key]).await
    }

    pub async fn put(&self, key: Arg, value: Arg) -> Result<MaterializedValue, GateError> {
        self.as_object().call("put", vec![key, value]).await
    }

    pub async fn remove(&self, key: Arg) -> Result<MaterializedValue, GateError> {
        self.as_object().call("remove", vec![key]).await
    }

    pub async fn contains_key(&self, key: Arg) -> Result<bool, GateError> {
        match self.as_object().call("containsKey", vec![key]).await? {
            MaterializedValue::Bool(b) => Ok(b),
            other => Err(GateError::ProtocolDecode(format!("expected bool, got {other:?}"))),
        }
    }

    pub async fn contains_value(&self, value: Arg) -> Result<bool, GateError> {
        match self.as_object().call("containsValue", vec![value]).await? {
            MaterializedValue::Bool(b) => Ok(b),
            other => Err(GateError::ProtocolDecode(format!("expected bool, got {other:?}"))),
        }
    }

    pub async fn clear(&self) -> Result<(), GateError> {
        self.as_object().call("clear", vec![]).await?;
        Ok(())
    }

    pub async fn key_set(&self) -> Result<AnyProxy, GateError> {
        self.as_object().call("keySet", vec![]).await.and_then(expect_proxy)
    }

    /// Returns whatever kind of reference the host tagged this value with —
    /// a generic object proxy in the reference implementation even though
    /// it is conceptually a Collection (spec §9 "Open question — `values()`
    /// on the Map proxy"). Preserved verbatim rather than forced into a list.
    pub async fn values(&self) -> Result<AnyProxy, GateError> {
        self.as_object().call("values", vec![]).await.and_then(expect_proxy)
    }

    pub async fn entry_set(&self) -> Result<AnyProxy, GateError> {
        self.as_object().call("entrySet", vec![]).await.and_then(expect_proxy)
    }

    /// Materializes key→value with string keys (spec §4.F `toObject()`).
    /// Errors if any key the host reports is not itself a string.
    pub async fn to_object(&self) -> Result<std::collections::HashMap<String, MaterializedValue>, GateError> {
        let keys = materialize_enumerable(self.key_set().await?).await?;
        let mut out = std::collections::HashMap::with_capacity(keys.len());
        for key in keys {
            let key_str = match &key {
                MaterializedValue::String(s) => s.clone(),
                other => {
                    return Err(GateError::ProtocolDecode(format!(
                        "toObject requires string keys, got {other:?}"
                    )));
                }
            };
            let value = self.get(Arg::from(&key)).await?;
            out.insert(key_str, value);
        }
        Ok(out)
    }

    /// Materializes to a local key-to-value structure preserving arbitrary
    /// key values (spec §4.F `toMap()`) — a `Vec` of pairs rather than a
    /// `HashMap`, since `MaterializedValue` (e.g. a proxy) has no `Hash`/`Eq`
    /// to key a hash map by.
    pub async fn to_map(&self) -> Result<Vec<(MaterializedValue, MaterializedValue)>, GateError> {
        let keys = materialize_enumerable(self.key_set().await?).await?;
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            let value = self.get(Arg::from(&key)).await?;
            out.push((key, value));
        }
        Ok(out)
    }

    pub fn then(&self) -> Option<MaterializedValue> {
        self.handle.then()
    }
}

/// Drains whichever reference kind `keySet()`/`entrySet()` came back tagged
/// as into a local `Vec`, reusing each container kind's own materialization
/// (spec §4.F: a Map's `keySet` is "obtained as sub-proxies" of varying kind).
async fn materialize_enumerable(proxy: AnyProxy) -> Result<Vec<MaterializedValue>, GateError> {
    match proxy {
        AnyProxy::List(l) => l.to_vec().await,
        AnyProxy::Set(s) => s.to_vec().await,
        AnyProxy::Array(a) => a.to_vec().await,
        AnyProxy::Iterator(it) => it.drain().await,
        AnyProxy::Object(o) => Err(GateError::ProtocolDecode(format!(
            "keySet() returned a non-enumerable object reference '{}'",
            o.target_id()
        ))),
        AnyProxy::Map(m) => Err(GateError::ProtocolDecode(format!(
            "keySet() returned a nested map reference '{}'",
            m.target_id()
        ))),
    }
}

fn expect_proxy(value: MaterializedValue) -> Result<AnyProxy, GateError> {
    match value {
        MaterializedValue::Proxy(p) => Ok(p),
        other => Err(GateError::ProtocolDecode(format!("expected a proxy reference, got {other:?}"))),
    }
}

/// Fixed-length indexable container. Exclusively dedicated protocol — never
/// method calls (spec §4.F).
#[derive(Clone)]
pub struct ArrayProxy {
    pub handle: ProxyHandle,
}

impl ArrayProxy {
    pub fn new(handle: ProxyHandle) -> Self {
        ArrayProxy { handle }
    }

    pub fn target_id(&self) -> &TargetId {
        &self.handle.target_id
    }

    pub fn as_object(&self) -> ObjectProxy {
        ObjectProxy::new(self.handle.clone())
    }

    pub async fn get(&self, index: i32) -> Result<MaterializedValue, GateError> {
        self.handle.client.array_get(self.target_id(), index).await
    }

    pub async fn set(&self, index: i32, value: Arg) -> Result<(), GateError> {
        self.handle.client.array_set(self.target_id(), index, value).await
    }

    pub async fn length(&self) -> Result<i64, GateError> {
        self.handle.client.array_length(self.target_id()).await
    }

    pub async fn slice(&self, from: i32, to: i32) -> Result<AnyProxy, GateError> {
        self.handle.client.array_slice(self.target_id(), from, to).await
    }

    /// Materializes via `length()` followed by `get(i)` for each index
    /// (spec §4.F `toArray()`).
    pub async fn to_vec(&self) -> Result<Vec<MaterializedValue>, GateError> {
        let len = self.length().await?;
        let mut out = Vec::with_capacity(len.max(0) as usize);
        for i in 0..len {
            out.push(self.get(i as i32).await?);
        }
        Ok(out)
    }

    pub fn then(&self) -> Option<MaterializedValue> {
        self.handle.then()
    }
}

/// `hasNext`/`next`/`remove` via generic method calls (spec §4.F).
#[derive(Clone)]
pub struct IteratorProxy {
    pub handle: ProxyHandle,
}

impl IteratorProxy {
    pub fn new(handle: ProxyHandle) -> Self {
        IteratorProxy { handle }
    }

    pub fn target_id(&self) -> &TargetId {
        &self.handle.target_id
    }

    pub fn as_object(&self) -> ObjectProxy {
        ObjectProxy::new(self.handle.clone())
    }

    pub async fn has_next(&self) -> Result<bool, GateError> {
        match self.as_object().call("hasNext", vec![]).await? {
            MaterializedValue::Bool(b) => Ok(b),
            other => Err(GateError::ProtocolDecode(format!("expected bool, got {other:?}"))),
        }
    }

    pub async fn next(&self) -> Result<MaterializedValue, GateError> {
        self.as_object().call("next", vec![]).await
    }

    pub async fn remove(&self) -> Result<(), GateError> {
        self.as_object().call("remove", vec![]).await?;
        Ok(())
    }

    /// Drains until `hasNext` is false (spec §4.F async enumeration).
    pub async fn drain(&self) -> Result<Vec<MaterializedValue>, GateError> {
        let mut out = Vec::new();
        while self.has_next().await? {
            out.push(self.next().await?);
        }
        Ok(out)
    }

    pub fn then(&self) -> Option<MaterializedValue> {
        self.handle.then()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Client;
    use crate::config::GateConfig;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Drives a sequence of request/reply pairs over one accepted connection,
    /// mirroring the single write-one-read-one session every container proxy
    /// operation in this module dispatches through.
    async fn scripted_peer(script: &'static [(&'static [u8], &'static [u8])]) -> Client {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            for (expected, reply) in script {
                let mut buf = vec![0u8; 4096];
                let n = sock.read(&mut buf).await.unwrap();
                assert_eq!(&buf[..n], *expected);
                sock.write_all(reply).await.unwrap();
            }
        });
        let mut config = GateConfig::default();
        let (host, port) = addr.rsplit_once(':').unwrap();
        config.host = host.to_string();
        config.port = port.parse().unwrap();
        Client::new(config)
    }

    #[tokio::test]
    async fn array_get_set_length_round_trip() {
        let client = scripted_peer(&[
            (b"a\ng\no1\ni0\ne\n", b"!yi9\n"),
            (b"a\ns\no1\ni0\ni5\ne\n", b"!yv\n"),
            (b"a\ne\no1\ne\n", b"!yi3\n"),
        ])
        .await;
        let array = ArrayProxy::new(ProxyHandle::new(TargetId::instance("o1"), client));
        assert!(matches!(array.get(0).await.unwrap(), MaterializedValue::Int32(9)));
        array.set(0, Arg::Int32(5)).await.unwrap();
        assert_eq!(array.length().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn array_to_vec_materializes_by_length_then_get() {
        let client = scripted_peer(&[
            (b"a\ne\no1\ne\n", b"!yi2\n"),
            (b"a\ng\no1\ni0\ne\n", b"!yi10\n"),
            (b"a\ng\no1\ni1\ne\n", b"!yi20\n"),
        ])
        .await;
        let array = ArrayProxy::new(ProxyHandle::new(TargetId::instance("o1"), client));
        let values = array.to_vec().await.unwrap();
        assert!(matches!(values[0], MaterializedValue::Int32(10)));
        assert!(matches!(values[1], MaterializedValue::Int32(20)));
    }

    #[tokio::test]
    async fn set_add_and_contains_decode_bool() {
        let client = scripted_peer(&[
            (b"c\no2\nadd\ni1\ne\n", b"!ybtrue\n"),
            (b"c\no2\ncontains\ni1\ne\n", b"!ybtrue\n"),
        ])
        .await;
        let set = SetProxy::new(ProxyHandle::new(TargetId::instance("o2"), client));
        assert!(set.add(Arg::Int32(1)).await.unwrap());
        assert!(set.contains(Arg::Int32(1)).await.unwrap());
    }

    #[tokio::test]
    async fn map_get_put_round_trip() {
        let client = scripted_peer(&[
            (b"c\no3\nput\nskey\nsval\ne\n", b"!yv\n"),
            (b"c\no3\nget\nskey\ne\n", b"!ysval\n"),
        ])
        .await;
        let map = MapProxy::new(ProxyHandle::new(TargetId::instance("o3"), client));
        map.put(Arg::Str("key".to_string()), Arg::Str("val".to_string())).await.unwrap();
        match map.get(Arg::Str("key".to_string())).await.unwrap() {
            MaterializedValue::String(s) => assert_eq!(s, "val"),
            other => panic!("expected string, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn iterator_drain_stops_at_has_next_false() {
        let client = scripted_peer(&[
            (b"c\no4\nhasNext\ne\n", b"!ybtrue\n"),
            (b"c\no4\nnext\ne\n", b"!yi1\n"),
            (b"c\no4\nhasNext\ne\n", b"!ybtrue\n"),
            (b"c\no4\nnext\ne\n", b"!yi2\n"),
            (b"c\no4\nhasNext\ne\n", b"!ybfalse\n"),
        ])
        .await;
        let it = IteratorProxy::new(ProxyHandle::new(TargetId::instance("o4"), client));
        let values = it.drain().await.unwrap();
        assert_eq!(values.len(), 2);
        assert!(matches!(values[0], MaterializedValue::Int32(1)));
        assert!(matches!(values[1], MaterializedValue::Int32(2)));
    }

    #[tokio::test]
    async fn map_to_object_materializes_string_keyed_entries() {
        let client = scripted_peer(&[
            (b"c\no3\nkeySet\ne\n", b"!ylo5\n"),
            (b"c\no5\nsize\ne\n", b"!yi2\n"),
            (b"c\no5\nget\ni0\ne\n", b"!ysk1\n"),
            (b"c\no5\nget\ni1\ne\n", b"!ysk2\n"),
            (b"c\no3\nget\nsk1\ne\n", b"!yi10\n"),
            (b"c\no3\nget\nsk2\ne\n", b"!yi20\n"),
        ])
        .await;
        let map = MapProxy::new(ProxyHandle::new(TargetId::instance("o3"), client));
        let obj = map.to_object().await.unwrap();
        assert!(matches!(obj["k1"], MaterializedValue::Int32(10)));
        assert!(matches!(obj["k2"], MaterializedValue::Int32(20)));
    }

    #[tokio::test]
    async fn map_to_object_rejects_non_string_keys() {
        let client = scripted_peer(&[
            (b"c\no3\nkeySet\ne\n", b"!ylo5\n"),
            (b"c\no5\nsize\ne\n", b"!yi1\n"),
            (b"c\no5\nget\ni0\ne\n", b"!yi7\n"),
        ])
        .await;
        let map = MapProxy::new(ProxyHandle::new(TargetId::instance("o3"), client));
        let err = map.to_object().await.unwrap_err();
        assert!(matches!(err, GateError::ProtocolDecode(_)));
    }

    #[tokio::test]
    async fn map_to_map_preserves_arbitrary_key_values() {
        let client = scripted_peer(&[
            (b"c\no3\nkeySet\ne\n", b"!ylo5\n"),
            (b"c\no5\nsize\ne\n", b"!yi1\n"),
            (b"c\no5\nget\ni0\ne\n", b"!yro6\n"),
            (b"c\no3\nget\nro6\ne\n", b"!ystuff\n"),
        ])
        .await;
        let map = MapProxy::new(ProxyHandle::new(TargetId::instance("o3"), client));
        let pairs = map.to_map().await.unwrap();
        assert_eq!(pairs.len(), 1);
        match &pairs[0] {
            (MaterializedValue::Proxy(p), MaterializedValue::String(s)) => {
                assert_eq!(p.target_id().as_str(), "o6");
                assert_eq!(s, "stuff");
            }
            other => panic!("unexpected pair: {other:?}"),
        }
    }
}
