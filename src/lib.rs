//! gatebridge/src/lib.rs
//! Client-side bridge to a remote object-graph gateway: wire protocol,
//! pooled connections, a lazy proxy model, and an inbound callback server.

pub mod callback;
pub mod client;
pub mod codec;
pub mod config;
pub mod connection;
pub mod containers;
pub mod error;
pub mod logging;
pub mod namespace;
pub mod pool;
pub mod proxy;
pub mod registry;
pub mod state;
pub mod types;

pub use callback::CallbackServer;
pub use client::Client;
pub use codec::Arg;
pub use config::GateConfig;
pub use error::GateError;
pub use namespace::NamespaceView;
pub use proxy::{AnyProxy, ClassProxy, MaterializedValue, ObjectProxy, PackageOrClass, PackageProxy};
pub use registry::{LocalObject, ProxyRegistry};
pub use types::{ReferenceKind, TargetId, Value};

use std::net::SocketAddr;

/// A running gateway session: an outbound client plus the inbound callback
/// server that shares its proxy registry (spec §9 "Cyclic references
/// between Client and Callback Server"). This is the crate's intended
/// top-level entry point — constructing a `Client` directly is still
/// possible for callers that don't need inbound callbacks.
pub struct Gate {
    client: Client,
    callback: CallbackServer,
}

impl Gate {
    /// Build a client and bind the callback server in one step.
    pub async fn connect(config: GateConfig) -> Result<Self, GateError> {
        let client = Client::new(config.clone());
        let callback = CallbackServer::bind(&config, client.clone()).await?;
        Ok(Gate { client, callback })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn entry_point(&self) -> ObjectProxy {
        self.client.entry_point()
    }

    pub fn namespace(&self) -> NamespaceView {
        self.client.namespace()
    }

    /// The callback server's bound address — useful when the configured
    /// port was `0` and the actual port must be reported to the host.
    pub fn callback_addr(&self) -> SocketAddr {
        self.callback.local_addr()
    }

    /// Closes idle pooled connections and stops the callback server's accept
    /// loop (spec §4.C `closeAll`, §5 "Resource release": "`close` on the
    /// client closes all idle connections and stops the callback server").
    pub async fn close(&self) {
        self.client.close().await;
        self.callback.stop();
    }

    /// Sends the shutdown command to the host, then closes idle connections
    /// and stops the callback server (spec §5 "Resource release").
    pub async fn shutdown(&self) {
        self.client.shutdown().await;
        self.callback.stop();
    }
}
