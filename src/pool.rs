//! gatebridge/src/pool.rs
//! Bounded connection pool with a FIFO waiter queue (spec §4.C).

use crate::connection::Connection;
use crate::error::GateError;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, warn};

/// Default maximum number of live connections (spec §4.C).
pub const DEFAULT_MAX_CONNECTIONS: usize = 4;

struct PoolState {
    idle: Vec<Connection>,
    /// Count of connections currently alive, whether idle or checked out.
    /// `live <= max_size` is the pool-invariant spec §8 tests for.
    live: usize,
    waiters: VecDeque<oneshot::Sender<Connection>>,
}

struct PoolInner {
    addr: String,
    auth_token: Option<String>,
    max_size: usize,
    state: Mutex<PoolState>,
}

#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

impl Pool {
    pub fn new(addr: impl Into<String>, auth_token: Option<String>, max_size: usize) -> Self {
        Pool {
            inner: Arc::new(PoolInner {
                addr: addr.into(),
                auth_token,
                max_size,
                state: Mutex::new(PoolState {
                    idle: Vec::new(),
                    live: 0,
                    waiters: VecDeque::new(),
                }),
            }),
        }
    }

    /// Acquire a connection: reuse an idle one, open a new one if under
    /// capacity, or park behind a FIFO waiter queue (spec §4.C `acquire()`).
    pub async fn acquire(&self) -> Result<Connection, GateError> {
        let maybe_new = {
            let mut state = self.inner.state.lock().await;
            if let Some(conn) = state.idle.pop() {
                return Ok(conn);
            }
            if state.live < self.inner.max_size {
                state.live += 1;
                None
            } else {
                let (tx, rx) = oneshot::channel();
                state.waiters.push_back(tx);
                Some(rx)
            }
        };

        match maybe_new {
            None => {
                match Connection::connect(&self.inner.addr, self.inner.auth_token.as_deref()).await
                {
                    Ok(conn) => Ok(conn),
                    Err(e) => {
                        let mut state = self.inner.state.lock().await;
                        state.live -= 1;
                        Err(e)
                    }
                }
            }
            Some(rx) => rx
                .await
                .map_err(|_| GateError::network("pool was closed while waiting for a connection")),
        }
    }

    /// Release a connection: hand it directly to the oldest waiter if one
    /// is parked (bypassing the idle set), otherwise return it to idle if
    /// still live, or drop its slot if dead (spec §4.C `release()`).
    pub async fn release(&self, conn: Connection) {
        let mut state = self.inner.state.lock().await;
        if let Some(waiter) = state.waiters.pop_front() {
            if waiter.send(conn).is_err() {
                debug!("waiter dropped before a released connection could reach it");
            }
            return;
        }
        if conn.is_alive() {
            state.idle.push(conn);
        } else {
            state.live -= 1;
        }
    }

    /// Scoped acquisition: `f` receives a connection and its result is
    /// returned; the connection is released on both the success and failure
    /// path (spec §4.C `withConnection`).
    pub async fn with_connection<F, Fut, T>(&self, f: F) -> Result<T, GateError>
    where
        F: FnOnce(Connection) -> Fut,
        Fut: Future<Output = Result<T, GateError>>,
    {
        let conn = self.acquire().await?;
        let result = f(conn.clone()).await;
        self.release(conn).await;
        result
    }

    /// Close idle connections. Active (checked-out) connections are left
    /// alone — they close themselves when their in-flight work returns
    /// (spec §4.C `closeAll()`).
    pub async fn close_all(&self) {
        let mut state = self.inner.state.lock().await;
        for conn in state.idle.drain(..) {
            conn.close();
            state.live -= 1;
        }
        for waiter in state.waiters.drain(..) {
            // No connection to hand over; dropping the sender lets the
            // waiter's recv fail with a clear "pool closed" error.
            drop(waiter);
        }
        if !state.waiters.is_empty() {
            warn!("closed pool with waiters still parked");
        }
    }

    #[cfg(test)]
    pub(crate) async fn live_count(&self) -> usize {
        self.inner.state.lock().await.live
    }

    #[cfg(test)]
    pub(crate) async fn idle_count(&self) -> usize {
        self.inner.state.lock().await.idle.len()
    }
}
