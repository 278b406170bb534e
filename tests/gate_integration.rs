//! Integration tests exercising `Gate` end-to-end: a mock outbound gateway
//! peer for the `Client` side, and a real TCP client driving the inbound
//! `CallbackServer` side, both against one `Gate` instance (spec §8
//! "End-to-end scenarios").

use gatebridge::{Arg, Gate, GateConfig, GateError, LocalObject, MaterializedValue};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

/// A mock gateway peer that scripts one request/reply pair per entry, in
/// order, on a single accepted connection — mirroring how a real gateway
/// serves one `Client` connection pool member.
async fn mock_gateway(script: Vec<(&'static [u8], &'static [u8])>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        for (expected, reply) in script {
            let mut buf = vec![0u8; 4096];
            let n = sock.read(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], expected);
            sock.write_all(reply).await.unwrap();
        }
    });
    addr
}

fn config_for(gateway_addr: &str) -> GateConfig {
    let (host, port) = gateway_addr.rsplit_once(':').unwrap();
    GateConfig {
        host: host.to_string(),
        port: port.parse().unwrap(),
        callback_port: 0,
        ..GateConfig::default()
    }
}

#[tokio::test]
async fn entry_point_call_round_trips_through_the_pool() {
    let addr = mock_gateway(vec![(b"c\nt\nadd\ni3\ni4\ne\n", b"!yi7\n")]).await;
    let gate = Gate::connect(config_for(&addr)).await.unwrap();

    let result = gate.entry_point().call("add", vec![Arg::Int32(3), Arg::Int32(4)]).await.unwrap();
    assert!(matches!(result, MaterializedValue::Int32(7)));
}

#[tokio::test]
async fn namespace_traversal_then_static_call_reaches_the_gateway() {
    let addr = mock_gateway(vec![(b"c\nz:java.lang.Math\nabs\ni-5\ne\n", b"!yi5\n")]).await;
    let gate = Gate::connect(config_for(&addr)).await.unwrap();

    let view = gate.namespace();
    let class = match view.prop("java") {
        gatebridge::PackageOrClass::Package(pkg) => match pkg.prop("lang") {
            gatebridge::PackageOrClass::Package(pkg2) => match pkg2.prop("Math") {
                gatebridge::PackageOrClass::Class(c) => c,
                _ => panic!("expected class"),
            },
            _ => panic!("expected package"),
        },
        _ => panic!("expected package"),
    };
    assert_eq!(class.target_id().as_str(), "z:java.lang.Math");

    let result = class.call("abs", vec![Arg::Int32(-5)]).await.unwrap();
    assert!(matches!(result, MaterializedValue::Int32(5)));
}

#[tokio::test]
async fn host_exception_decodes_to_a_usable_object_proxy() {
    let addr = mock_gateway(vec![(b"c\nt\nboom\ne\n", b"!xro0\n")]).await;
    let gate = Gate::connect(config_for(&addr)).await.unwrap();

    let err = gate.entry_point().call("boom", vec![]).await.unwrap_err();
    match err {
        GateError::HostInvocation { payload, host_exception } => {
            assert_eq!(payload, "ro0");
            assert_eq!(host_exception.unwrap().target_id().as_str(), "o0");
        }
        other => panic!("expected HostInvocation, got {other:?}"),
    }
}

struct Counter;
impl LocalObject for Counter {
    fn interfaces(&self) -> Vec<String> {
        vec!["com.example.Counter".to_string()]
    }
    fn invoke(&self, method: &str, args: Vec<MaterializedValue>) -> Result<MaterializedValue, String> {
        match (method, args.first()) {
            ("inc", Some(MaterializedValue::Int32(i))) => Ok(MaterializedValue::Int32(i + 1)),
            ("inc", _) => Err("inc expects one int32 argument".to_string()),
            (other, _) => Err(format!("no such method '{other}'")),
        }
    }
}

/// Drives the inbound callback side: register a local object, connect as if
/// we were the host, send a `c` command, read the reply.
#[tokio::test]
async fn callback_server_dispatches_to_a_registered_local_object() {
    let addr = mock_gateway(vec![]).await;
    let gate = Gate::connect(config_for(&addr)).await.unwrap();

    let id = gate.client().registry_handle().register(Arc::new(Counter));
    let callback_addr = gate.callback_addr();

    let mut host = TcpStream::connect(callback_addr).await.unwrap();
    host.write_all(format!("c\n{id}\ninc\ni9\ne\n").as_bytes()).await.unwrap();
    let mut reader = BufReader::new(&mut host);
    let mut reply = String::new();
    reader.read_line(&mut reply).await.unwrap();
    assert_eq!(reply, "!yi10\n");

    // Second command on the same connection proves arrival-order sequencing
    // within one callback connection (spec §5).
    host.write_all(format!("g\n{id}\ne\n").as_bytes()).await.unwrap();
    let mut reply2 = String::new();
    reader.read_line(&mut reply2).await.unwrap();
    assert_eq!(reply2, "!yv\n");
    assert!(gate.client().lookup_proxy(&id).is_none());
}

#[tokio::test]
async fn close_stops_taking_new_idle_connections_but_does_not_panic() {
    let addr = mock_gateway(vec![(b"c\nt\nping\ne\n", b"!yv\n")]).await;
    let gate = Gate::connect(config_for(&addr)).await.unwrap();
    gate.entry_point().call("ping", vec![]).await.unwrap();
    gate.close().await;
}
