//! gatebridge/src/callback.rs
//! The inbound callback server: accepts connections from the host runtime
//! and dispatches its calls to registered local objects (spec §4.G).

use crate::client::Client;
use crate::codec::{Arg, decode_value, encode_arg};
use crate::config::GateConfig;
use crate::error::GateError;
use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// A bound, running callback acceptor. Each accepted connection is handled
/// independently; within a connection, commands are processed strictly in
/// arrival order (spec §5 "Concurrency & Resource Model").
pub struct CallbackServer {
    local_addr: SocketAddr,
    accept_task: JoinHandle<()>,
}

impl CallbackServer {
    /// Bind to `config.callback_addr()` (port `0` picks an ephemeral port —
    /// the actual bound port is captured and returned via `local_addr`) and
    /// spawn the accept loop (spec §4.G).
    pub async fn bind(config: &GateConfig, client: Client) -> Result<Self, GateError> {
        let listener = TcpListener::bind(config.callback_addr())
            .await
            .map_err(|e| GateError::network(format!("callback bind failed: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| GateError::network(format!("callback local_addr failed: {e}")))?;
        let accept_task = tokio::spawn(accept_loop(listener, client));
        Ok(CallbackServer { local_addr, accept_task })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop the accept loop, severing the listener (spec §5 "Resource
    /// release": `close` on the client "stops the callback server"). Already
    /// spawned per-connection handler tasks are left to finish their
    /// in-flight work, the same way `Pool::close_all` leaves active
    /// connections alone.
    pub fn stop(&self) {
        self.accept_task.abort();
    }
}

async fn accept_loop(listener: TcpListener, client: Client) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                debug!(%peer, "callback connection accepted");
                tokio::spawn(handle_connection(stream, client.clone()));
            }
            Err(e) => {
                error!(error = %e, "callback listener accept failed, stopping");
                break;
            }
        }
    }
}

/// Line-accumulating command parser: read lines, buffer them, and flush the
/// buffered lines as one command whenever a line equal to `e` is seen
/// (spec §4.G).
async fn handle_connection(stream: TcpStream, client: Client) {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut pending: Vec<String> = Vec::new();

    loop {
        let mut line = String::new();
        match reader.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) => {
                if line.ends_with('\n') {
                    line.pop();
                    if line.ends_with('\r') {
                        line.pop();
                    }
                }
                if line == "e" {
                    let command = std::mem::take(&mut pending);
                    let reply = dispatch_command(&client, &command).await;
                    if write_half.write_all(reply.as_bytes()).await.is_err() {
                        break;
                    }
                } else {
                    pending.push(line);
                }
            }
            Err(e) => {
                warn!(error = %e, "callback connection read failed");
                break;
            }
        }
    }
}

async fn dispatch_command(client: &Client, lines: &[String]) -> String {
    match lines.first().map(String::as_str) {
        Some("c") => handle_call(client, lines).await,
        Some("g") => handle_gc(client, lines),
        Some(other) => format!("!xunrecognized callback command '{other}'\n"),
        None => "!xempty callback command\n".to_string(),
    }
}

/// `c`, proxyId, methodName, arg1, arg2, …, `e` (spec §4.G).
async fn handle_call(client: &Client, lines: &[String]) -> String {
    let Some(proxy_id) = lines.get(1) else {
        return "!xmissing proxy id in call command\n".to_string();
    };
    let Some(method) = lines.get(2) else {
        return "!xmissing method name in call command\n".to_string();
    };
    let Some(obj) = client.lookup_proxy(proxy_id) else {
        return format!("!xno such registered proxy '{proxy_id}'\n");
    };

    let mut args = Vec::with_capacity(lines.len().saturating_sub(3));
    for raw in &lines[3..] {
        match decode_value(raw) {
            Ok(v) => args.push(client.materialize_value(v)),
            Err(e) => return format!("!xargument decode failed: {e}\n"),
        }
    }

    crate::state::TOTAL_CALLBACK_INVOCATIONS.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    match obj.invoke(method, args) {
        Ok(value) if value.is_absent() => "!yv\n".to_string(),
        Ok(value) => {
            let arg = Arg::from(&value);
            match encode_arg(&arg, &client.registry_handle()) {
                Ok(part) => format!("!y{part}"),
                Err(e) => format!("!x{e}\n"),
            }
        }
        Err(message) => format!("!x{message}\n"),
    }
}

/// `g`, proxyId, `e` (spec §4.G).
fn handle_gc(client: &Client, lines: &[String]) -> String {
    let Some(proxy_id) = lines.get(1) else {
        return "!xmissing proxy id in gc command\n".to_string();
    };
    client.registry_handle().remove(proxy_id);
    "!yv\n".to_string()
}
