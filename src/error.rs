//! gatebridge/src/error.rs
//! The error taxonomy for the gateway bridge (spec §7).

use crate::proxy::ObjectProxy;
use thiserror::Error;

/// Every public, fallible operation in this crate resolves to one of these
/// variants. Internal best-effort operations (release, shutdown) swallow
/// `Network` rather than propagate it — see `Client::release_object`.
#[derive(Error, Debug)]
pub enum GateError {
    /// Transport failed, connection lost, empty response, write failure.
    #[error("network error: {0}")]
    Network(String),

    /// The auth handshake did not yield a success code.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The gateway replied with response code `x`. Carries the raw payload
    /// and, if it could be decoded, the host exception as a proxy.
    #[error("host invocation failed: {payload}")]
    HostInvocation {
        payload: String,
        host_exception: Option<ObjectProxy>,
    },

    /// The gateway replied with response code `z`.
    #[error("fatal protocol error: {0}")]
    FatalProtocol(String),

    /// A malformed frame: unexpected first byte, missing payload, etc.
    #[error("protocol framing error: {0}")]
    ProtocolFraming(String),

    /// A well-formed frame carrying an unrecognized type tag.
    #[error("protocol decode error: {0}")]
    ProtocolDecode(String),

    /// The encoder was handed a local value it refuses to convert (e.g. an
    /// ordered-sequence value without an auto-convert capability).
    #[error("unsupported local type: {0}")]
    UnsupportedLocalType(String),

    /// Calling a package proxy, assigning a field with `=`, `newArray` with
    /// no dimensions, or another caller-side misuse.
    #[error("usage error: {0}")]
    Usage(String),
}

impl GateError {
    pub fn network(msg: impl Into<String>) -> Self {
        GateError::Network(msg.into())
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        GateError::Usage(msg.into())
    }
}

impl From<std::io::Error> for GateError {
    fn from(e: std::io::Error) -> Self {
        GateError::Network(e.to_string())
    }
}
