//! gatebridge/src/connection.rs
//! A single TCP session with the gateway: write-one-read-one discipline,
//! line-delimited framing, and the optional auth handshake (spec §4.B).

use crate::error::GateError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(0);

struct Command {
    bytes: Vec<u8>,
    respond_to: oneshot::Sender<Result<String, GateError>>,
}

/// A handle to a live (or recently-live) connection. Cloning a `Connection`
/// is cheap — clones share the same background task and the same `alive`
/// flag, which is how `Pool::with_connection` can hand a clone to caller
/// code while keeping the original to release afterward.
#[derive(Clone)]
pub struct Connection {
    tx: mpsc::Sender<Command>,
    alive: Arc<AtomicBool>,
}

impl Connection {
    /// Open a TCP connection to `addr`, disable Nagle, and — if `auth_token`
    /// is set — perform the auth handshake before returning (spec §4.B
    /// connect procedure).
    pub async fn connect(addr: &str, auth_token: Option<&str>) -> Result<Self, GateError> {
        let conn_id = NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed);
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| GateError::network(format!("connect to {addr} failed: {e}")))?;
        stream
            .set_nodelay(true)
            .map_err(|e| GateError::network(format!("set_nodelay failed: {e}")))?;
        info!(conn = conn_id, %addr, "connected to gateway");

        let (tx, rx) = mpsc::channel(32);
        let alive = Arc::new(AtomicBool::new(true));
        let conn = Connection {
            tx,
            alive: alive.clone(),
        };

        tokio::spawn(run_connection_task(conn_id, stream, rx, alive));
        crate::state::ACTIVE_CONNECTIONS.fetch_add(1, Ordering::Relaxed);

        if let Some(token) = auth_token {
            let cmd = format!("A\n{token}\n e\n");
            let reply = conn.send(cmd).await?;
            if !reply.starts_with('y') {
                conn.close();
                return Err(GateError::Authentication(format!(
                    "auth handshake rejected: {reply}"
                )));
            }
            info!(conn = conn_id, "auth handshake succeeded");
        }

        Ok(conn)
    }

    /// Write `command` (already fully composed, newline-terminated parts
    /// ending in the `e\n` terminator) and await exactly one response line,
    /// stripped of its trailing newline.
    pub async fn send(&self, command: String) -> Result<String, GateError> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(GateError::network("connection is closed"));
        }
        let (respond_to, rx) = oneshot::channel();
        self.tx
            .send(Command {
                bytes: command.into_bytes(),
                respond_to,
            })
            .await
            .map_err(|_| GateError::network("connection task has shut down"))?;
        rx.await
            .map_err(|_| GateError::network("connection task dropped the response channel"))?
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Close this connection. Dropping the sender causes the background
    /// task to exit once any in-flight command settles.
    pub fn close(&self) {
        if self.alive.swap(false, Ordering::SeqCst) {
            crate::state::ACTIVE_CONNECTIONS.fetch_sub(1, Ordering::Relaxed);
        }
    }
}

/// The task that owns the socket. Because it processes `Command`s from the
/// channel one at a time — write, then read exactly one line, then reply —
/// it is structurally impossible for two writes to be in flight on this
/// connection at once, which is the serialization invariant spec §4.B and
/// §5 require.
async fn run_connection_task(
    conn_id: u64,
    stream: TcpStream,
    mut rx: mpsc::Receiver<Command>,
    alive: Arc<AtomicBool>,
) {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    while let Some(cmd) = rx.recv().await {
        let result = async {
            write_half
                .write_all(&cmd.bytes)
                .await
                .map_err(|e| GateError::network(format!("write failed: {e}")))?;

            let mut line = String::new();
            let n = reader
                .read_line(&mut line)
                .await
                .map_err(|e| GateError::network(format!("read failed: {e}")))?;
            if n == 0 {
                return Err(GateError::network("peer closed the connection"));
            }
            if line.ends_with('\n') {
                line.pop();
                if line.ends_with('\r') {
                    line.pop();
                }
            }
            Ok(line)
        }
        .await;

        let failed = result.is_err();
        if cmd.respond_to.send(result).is_err() {
            debug!("response receiver dropped before reply was delivered");
        }
        if failed {
            if alive.swap(false, Ordering::SeqCst) {
                crate::state::ACTIVE_CONNECTIONS.fetch_sub(1, Ordering::Relaxed);
            }
            info!(conn = conn_id, "connection closed");
            break;
        }
    }

    // Drain any commands that arrived after we stopped reading from the
    // socket (e.g. a write failure broke the loop above) so senders don't
    // hang waiting on a channel nobody will service again.
    while let Some(cmd) = rx.recv().await {
        if cmd
            .respond_to
            .send(Err(GateError::network("connection is closed")))
            .is_err()
        {
            warn!("response receiver dropped while draining a closed connection");
        }
    }
}
