//! Request/reply command endpoint.
//!
//! An [`RpcServer`] is bound to a registered port name such as
//! `/NaoController/rpc`.  Network clients connect over WebSocket and send one
//! JSON token array per text frame; each gets exactly one JSON array back.
//!
//! All requests, from every connection, are funnelled into one bounded
//! channel that the owning module drains with [`RpcServer::recv`].  The module
//! answers a request before it pulls the next, so at most one command is in
//! flight at any time.
//!
//! # Example
//!
//! ```rust
//! use nao_middleware::rpc::RpcServer;
//! use nao_types::{CommandMessage, ReplyMessage};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let (mut server, client) = RpcServer::in_process("/Echo/rpc");
//! tokio::spawn(async move {
//!     while let Some(request) = server.recv().await {
//!         request.respond(ReplyMessage::ack());
//!     }
//! });
//! let reply = client.call(CommandMessage::new(vec!["ping".into()])).await.unwrap();
//! assert!(reply.is_ack());
//! # });
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use nao_types::{CommandMessage, NaoError, ReplyMessage};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

/// Pending requests buffered before senders have to wait.
const REQUEST_QUEUE: usize = 32;

/// Hint returned to clients whose frame is not a JSON token array.
pub const MALFORMED_HINT: &str = "message must be a JSON array of strings and numbers";

/// One inbound command together with the slot for its reply.
#[derive(Debug)]
pub struct RpcRequest {
    pub command: CommandMessage,
    reply: oneshot::Sender<ReplyMessage>,
}

impl RpcRequest {
    /// Answer the request.  A client that has gone away is not an error.
    pub fn respond(self, reply: ReplyMessage) {
        if self.reply.send(reply).is_err() {
            debug!("rpc client went away before the reply was ready");
        }
    }
}

/// Cloneable one-shot stop flag.  Safe to trigger from any thread,
/// including a signal handler.
#[derive(Clone, Debug)]
pub struct InterruptHandle(Arc<watch::Sender<bool>>);

impl InterruptHandle {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self(Arc::new(tx))
    }

    pub fn interrupt(&self) {
        self.0.send_replace(true);
    }

    pub fn is_interrupted(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolve once [`interrupt`][Self::interrupt] has been called.
    pub async fn interrupted(&self) {
        let mut rx = self.0.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|stop| *stop).await;
    }
}

impl Default for InterruptHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Command endpoint owned by a module.
pub struct RpcServer {
    name: String,
    local_addr: Option<SocketAddr>,
    requests: mpsc::Receiver<RpcRequest>,
    shutdown: InterruptHandle,
    acceptor: Option<JoinHandle<()>>,
}

impl RpcServer {
    /// Bind `name` to a WebSocket listener on `addr`.
    ///
    /// # Errors
    ///
    /// [`NaoError::Transport`] when the address cannot be bound.
    pub async fn open(name: impl Into<String>, addr: SocketAddr) -> Result<Self, NaoError> {
        let name = name.into();
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            NaoError::Transport(format!("could not open port {name} on {addr}: {e}"))
        })?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| NaoError::Transport(format!("port {name}: {e}")))?;

        let (tx, requests) = mpsc::channel(REQUEST_QUEUE);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let acceptor = tokio::spawn(accept_loop(name.clone(), listener, tx, shutdown_rx));
        info!(port = %name, addr = %local_addr, "rpc port open");

        Ok(Self {
            name,
            local_addr: Some(local_addr),
            requests,
            shutdown: InterruptHandle(Arc::new(shutdown_tx)),
            acceptor: Some(acceptor),
        })
    }

    /// A server with no network side.  Requests come from the returned
    /// [`RpcClient`].
    pub fn in_process(name: impl Into<String>) -> (Self, RpcClient) {
        let (tx, requests) = mpsc::channel(REQUEST_QUEUE);
        let server = Self {
            name: name.into(),
            local_addr: None,
            requests,
            shutdown: InterruptHandle::new(),
            acceptor: None,
        };
        (server, RpcClient { requests: tx })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bound socket address, `None` for in-process servers.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.shutdown.clone()
    }

    /// Wait for the next request.  Returns `None` once the server has been
    /// interrupted or every client handle is gone.
    pub async fn recv(&mut self) -> Option<RpcRequest> {
        if self.shutdown.is_interrupted() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.shutdown.interrupted() => None,
            request = self.requests.recv() => request,
        }
    }

    /// Unblock a pending [`recv`][Self::recv] and stop accepting new
    /// connections.
    pub fn interrupt(&self) {
        self.shutdown.interrupt();
        debug!(port = %self.name, "rpc port interrupted");
    }

    /// Release the port.  Queued requests are dropped, which answers their
    /// clients with a `nack`.
    pub fn close(&mut self) {
        self.shutdown.interrupt();
        if let Some(acceptor) = self.acceptor.take() {
            acceptor.abort();
        }
        self.requests.close();
        while let Ok(pending) = self.requests.try_recv() {
            pending.respond(ReplyMessage::nack());
        }
        info!(port = %self.name, "rpc port closed");
    }
}

impl Drop for RpcServer {
    fn drop(&mut self) {
        if let Some(acceptor) = self.acceptor.take() {
            acceptor.abort();
        }
    }
}

/// In-process caller for a server created with [`RpcServer::in_process`].
#[derive(Clone, Debug)]
pub struct RpcClient {
    requests: mpsc::Sender<RpcRequest>,
}

impl RpcClient {
    /// Send `command` and wait for its reply.
    ///
    /// # Errors
    ///
    /// [`NaoError::Transport`] when the server is closed or dropped the
    /// request without answering.
    pub async fn call(&self, command: CommandMessage) -> Result<ReplyMessage, NaoError> {
        let (reply, answer) = oneshot::channel();
        self.requests
            .send(RpcRequest { command, reply })
            .await
            .map_err(|_| NaoError::Transport("rpc server is closed".into()))?;
        answer
            .await
            .map_err(|_| NaoError::Transport("rpc server dropped the request".into()))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Network side
// ────────────────────────────────────────────────────────────────────────────

async fn accept_loop(
    name: String,
    listener: TcpListener,
    requests: mpsc::Sender<RpcRequest>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = async { shutdown.wait_for(|stop| *stop).await.map(|_| ()) } => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let requests = requests.clone();
                    let shutdown = shutdown.clone();
                    tokio::spawn(async move {
                        if let Err(e) = serve_client(stream, peer, requests, shutdown).await {
                            warn!(peer = %peer, error = %e, "rpc client error");
                        }
                    });
                }
                Err(e) => error!(port = %name, error = %e, "rpc accept error"),
            },
        }
    }
    debug!(port = %name, "rpc acceptor stopped");
}

async fn serve_client(
    stream: TcpStream,
    peer: SocketAddr,
    requests: mpsc::Sender<RpcRequest>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), NaoError> {
    let ws = accept_async(stream)
        .await
        .map_err(|e| NaoError::Transport(format!("ws handshake from {peer}: {e}")))?;
    let (mut ws_tx, mut ws_rx) = ws.split();
    debug!(peer = %peer, "rpc client connected");

    loop {
        let text = tokio::select! {
            _ = async { shutdown.wait_for(|stop| *stop).await.map(|_| ()) } => break,
            msg = ws_rx.next() => match msg {
                Some(Ok(Message::Text(text))) => text,
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => return Err(NaoError::Transport(format!("{peer}: {e}"))),
                Some(Ok(_)) => continue,
            },
        };

        let reply = match serde_json::from_str::<CommandMessage>(text.as_str()) {
            Ok(command) => {
                let (reply, answer) = oneshot::channel();
                if requests.send(RpcRequest { command, reply }).await.is_err() {
                    break;
                }
                answer.await.unwrap_or_else(|_| ReplyMessage::nack())
            }
            Err(e) => {
                debug!(peer = %peer, error = %e, "malformed rpc frame");
                ReplyMessage::nack_with(MALFORMED_HINT)
            }
        };

        let json = serde_json::to_string(&reply)
            .map_err(|e| NaoError::Transport(format!("reply encoding: {e}")))?;
        if ws_tx.send(Message::Text(json.into())).await.is_err() {
            break;
        }
    }
    debug!(peer = %peer, "rpc client disconnected");
    Ok(())
}
