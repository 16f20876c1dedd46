//! Fan-out image output port.
//!
//! An [`ImagePort`] accepts RGB frames of one fixed shape and hands each to
//! every current subscriber through a [`tokio::sync::broadcast`] channel, so a
//! slow viewer never blocks the producer.  When opened on a socket address,
//! every WebSocket client that connects becomes a subscriber and receives
//! each frame as one binary message of raw pixel bytes.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::{SinkExt, StreamExt};
use nao_types::{IMAGE_CHANNELS, ImageFrame, NaoError};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

/// Frames buffered per subscriber before the oldest are dropped.
const FRAME_CAPACITY: usize = 4;

/// Output port for one fixed image shape.
pub struct ImagePort {
    name: String,
    width: u32,
    height: u32,
    local_addr: Option<SocketAddr>,
    frames: broadcast::Sender<Arc<ImageFrame>>,
    shutdown: watch::Sender<bool>,
    closed: AtomicBool,
    acceptor: Option<JoinHandle<()>>,
}

impl ImagePort {
    /// Bind `name` to a WebSocket listener on `addr`.
    ///
    /// # Errors
    ///
    /// [`NaoError::Transport`] when the address cannot be bound.
    pub async fn open(
        name: impl Into<String>,
        addr: SocketAddr,
        width: u32,
        height: u32,
    ) -> Result<Self, NaoError> {
        let mut port = Self::detached(name, width, height);
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            NaoError::Transport(format!("could not open port {} on {addr}: {e}", port.name))
        })?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| NaoError::Transport(format!("port {}: {e}", port.name)))?;

        port.acceptor = Some(tokio::spawn(accept_loop(
            port.name.clone(),
            listener,
            port.frames.clone(),
            port.shutdown.subscribe(),
        )));
        port.local_addr = Some(local_addr);
        info!(port = %port.name, addr = %local_addr, width, height, "image port open");
        Ok(port)
    }

    /// A port with no network side.  Frames reach only in-process
    /// subscribers.
    pub fn detached(name: impl Into<String>, width: u32, height: u32) -> Self {
        let (frames, _) = broadcast::channel(FRAME_CAPACITY);
        let (shutdown, _) = watch::channel(false);
        Self {
            name: name.into(),
            width,
            height,
            local_addr: None,
            frames,
            shutdown,
            closed: AtomicBool::new(false),
            acceptor: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ImageFrame>> {
        self.frames.subscribe()
    }

    /// Publish one frame.  Returns how many subscribers were handed it; zero
    /// is normal when nobody is watching.
    ///
    /// # Errors
    ///
    /// * [`NaoError::InvalidArgument`] when the frame's shape or byte count
    ///   does not match the port.
    /// * [`NaoError::Transport`] after [`close`][Self::close].
    pub fn write(&self, frame: ImageFrame) -> Result<usize, NaoError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(NaoError::Transport(format!("port {} is closed", self.name)));
        }
        if frame.width != self.width
            || frame.height != self.height
            || frame.channels != IMAGE_CHANNELS
            || !frame.is_well_formed()
        {
            return Err(NaoError::InvalidArgument(format!(
                "port {} expects {}x{}x{} frames ({} bytes), got {}x{}x{} with {} bytes",
                self.name,
                self.width,
                self.height,
                IMAGE_CHANNELS,
                self.width * self.height * IMAGE_CHANNELS,
                frame.width,
                frame.height,
                frame.channels,
                frame.data.len(),
            )));
        }
        Ok(self.frames.send(Arc::new(frame)).unwrap_or(0))
    }

    /// Disconnect network viewers and stop accepting new ones.
    pub fn interrupt(&self) {
        self.shutdown.send_replace(true);
        debug!(port = %self.name, "image port interrupted");
    }

    /// Release the port.  Later writes fail.
    pub fn close(&mut self) {
        self.interrupt();
        self.closed.store(true, Ordering::Release);
        if let Some(acceptor) = self.acceptor.take() {
            acceptor.abort();
        }
        info!(port = %self.name, "image port closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Drop for ImagePort {
    fn drop(&mut self) {
        if let Some(acceptor) = self.acceptor.take() {
            acceptor.abort();
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Network side
// ────────────────────────────────────────────────────────────────────────────

async fn accept_loop(
    name: String,
    listener: TcpListener,
    frames: broadcast::Sender<Arc<ImageFrame>>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = async { shutdown.wait_for(|stop| *stop).await.map(|_| ()) } => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let rx = frames.subscribe();
                    let shutdown = shutdown.clone();
                    tokio::spawn(async move {
                        if let Err(e) = stream_to_client(stream, peer, rx, shutdown).await {
                            warn!(peer = %peer, error = %e, "image client error");
                        }
                    });
                }
                Err(e) => error!(port = %name, error = %e, "image accept error"),
            },
        }
    }
    debug!(port = %name, "image acceptor stopped");
}

async fn stream_to_client(
    stream: TcpStream,
    peer: SocketAddr,
    mut frames: broadcast::Receiver<Arc<ImageFrame>>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), NaoError> {
    let ws = accept_async(stream)
        .await
        .map_err(|e| NaoError::Transport(format!("ws handshake from {peer}: {e}")))?;
    let (mut ws_tx, mut ws_rx) = ws.split();
    debug!(peer = %peer, "image viewer connected");

    loop {
        tokio::select! {
            _ = async { shutdown.wait_for(|stop| *stop).await.map(|_| ()) } => break,
            incoming = ws_rx.next() => match incoming {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
            frame = frames.recv() => match frame {
                Ok(frame) => {
                    if ws_tx.send(Message::Binary(frame.data.clone().into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(peer = %peer, skipped = n, "image viewer lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
    debug!(peer = %peer, "image viewer disconnected");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use nao_types::{IMAGE_HEIGHT, IMAGE_WIDTH};
    use std::time::Duration;
    use tokio_tungstenite::connect_async;

    fn frame(width: u32, height: u32, fill: u8) -> ImageFrame {
        ImageFrame {
            width,
            height,
            channels: IMAGE_CHANNELS,
            captured_at: Utc::now(),
            data: vec![fill; (width * height * IMAGE_CHANNELS) as usize],
        }
    }

    #[tokio::test]
    async fn write_without_subscribers_is_ok() {
        let port = ImagePort::detached("/NaoVideo/img:o", IMAGE_WIDTH, IMAGE_HEIGHT);
        assert_eq!(port.write(frame(IMAGE_WIDTH, IMAGE_HEIGHT, 0)).unwrap(), 0);
    }

    #[tokio::test]
    async fn every_subscriber_sees_the_frame() {
        let port = ImagePort::detached("/NaoVideo/img:o", IMAGE_WIDTH, IMAGE_HEIGHT);
        let mut a = port.subscribe();
        let mut b = port.subscribe();
        assert_eq!(port.write(frame(IMAGE_WIDTH, IMAGE_HEIGHT, 7)).unwrap(), 2);
        assert_eq!(a.recv().await.unwrap().data[0], 7);
        assert_eq!(b.recv().await.unwrap().data.len(), 320 * 240 * 3);
    }

    #[tokio::test]
    async fn wrong_shape_is_rejected() {
        let port = ImagePort::detached("/NaoVideo/img:o", IMAGE_WIDTH, IMAGE_HEIGHT);
        let err = port.write(frame(160, 120, 0)).unwrap_err();
        assert!(matches!(err, NaoError::InvalidArgument(_)));

        let mut short = frame(IMAGE_WIDTH, IMAGE_HEIGHT, 0);
        short.data.truncate(100);
        assert!(matches!(port.write(short), Err(NaoError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn write_after_close_fails() {
        let mut port = ImagePort::detached("/NaoVideo/img:o", IMAGE_WIDTH, IMAGE_HEIGHT);
        port.close();
        assert!(port.is_closed());
        let err = port.write(frame(IMAGE_WIDTH, IMAGE_HEIGHT, 0)).unwrap_err();
        assert!(matches!(err, NaoError::Transport(_)));
    }

    #[tokio::test]
    async fn slow_subscriber_lags_without_blocking_writer() {
        let port = ImagePort::detached("/NaoVideo/img:o", 2, 2);
        let mut slow = port.subscribe();
        for i in 0..(FRAME_CAPACITY as u8 + 3) {
            port.write(frame(2, 2, i)).unwrap();
        }
        assert!(matches!(
            slow.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
        assert!(slow.recv().await.is_ok());
    }

    #[tokio::test]
    async fn websocket_viewer_receives_binary_frames() {
        let port = ImagePort::open("/NaoVideo/img:o", "127.0.0.1:0".parse().unwrap(), 4, 2)
            .await
            .unwrap();
        let addr = port.local_addr().unwrap();
        let (mut viewer, _) = connect_async(format!("ws://{addr}")).await.unwrap();

        // The viewer subscribes once its connection is accepted.
        let mut delivered = 0;
        for _ in 0..50 {
            delivered = port.write(frame(4, 2, 9)).unwrap();
            if delivered > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(delivered, 1);

        let Some(Ok(Message::Binary(bytes))) = viewer.next().await else {
            panic!("expected a binary frame");
        };
        assert_eq!(bytes.len(), 4 * 2 * 3);
        assert!(bytes.iter().all(|b| *b == 9));
    }
}
