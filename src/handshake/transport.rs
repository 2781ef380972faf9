use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time;

use crate::error::ControlError;
use crate::session::SessionIds;

/// Datagram transport underneath the control channel.
///
/// Bring-up (socket open, the initial sync exchange and the low-level
/// keep-alive echo) happens before the control channel sees the transport;
/// the negotiated session ids and the keep-alive latency are exposed here.
#[async_trait]
pub trait ControlTransport: Send {
    fn session_ids(&self) -> SessionIds;

    /// Best-effort datagram send.
    async fn send(&mut self, frame: &[u8]) -> Result<(), ControlError>;

    /// Next inbound datagram. Must be cancel safe: the control loop drops
    /// this future whenever a timer wins the race.
    async fn recv(&mut self) -> Result<Vec<u8>, ControlError>;

    /// Receives until a datagram of exactly `len` bytes starting with
    /// `prefix` arrives; everything else is dropped. `Ok(None)` on timeout.
    async fn expect(
        &mut self,
        len: usize,
        prefix: &[u8],
        within: Duration,
    ) -> Result<Option<Vec<u8>>, ControlError> {
        let wait = async {
            loop {
                let datagram = self.recv().await?;
                if datagram.len() == len && datagram.starts_with(prefix) {
                    return Ok(datagram);
                }
                tracing::trace!(len = datagram.len(), "dropping datagram while waiting for reply");
            }
        };
        match time::timeout(within, wait).await {
            Ok(res) => res.map(Some),
            Err(_) => Ok(None),
        }
    }

    /// Round-trip latency measured by the keep-alive sub-protocol.
    fn latency(&self) -> Option<Duration> {
        None
    }

    /// Best-effort teardown notification.
    async fn send_disconnect(&mut self) -> Result<(), ControlError> {
        Ok(())
    }
}

/// Shared latency figure written by the keep-alive collaborator.
#[derive(Debug, Clone, Default)]
pub struct LatencyGauge(Arc<parking_lot::Mutex<Option<Duration>>>);

impl LatencyGauge {
    pub fn record(&self, latency: Duration) {
        *self.0.lock() = Some(latency);
    }

    pub fn get(&self) -> Option<Duration> {
        *self.0.lock()
    }
}

/// Raw datagram transport over a connected tokio UDP socket.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    ids: SessionIds,
    max_size: usize,
    latency: LatencyGauge,
    disconnect_frame: Option<Vec<u8>>,
}

impl UdpTransport {
    pub async fn bind(
        local: SocketAddr,
        peer: SocketAddr,
        ids: SessionIds,
        max_size: usize,
    ) -> Result<Self, ControlError> {
        let socket = UdpSocket::bind(local).await?;
        socket.connect(peer).await?;
        Ok(Self {
            socket,
            ids,
            max_size,
            latency: LatencyGauge::default(),
            disconnect_frame: None,
        })
    }

    /// Datagram to send on teardown, built by the bring-up layer.
    pub fn with_disconnect_frame(mut self, frame: Vec<u8>) -> Self {
        self.disconnect_frame = Some(frame);
        self
    }

    /// Handle for the keep-alive collaborator to publish its measurements.
    pub fn latency_gauge(&self) -> LatencyGauge {
        self.latency.clone()
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ControlError> {
        Ok(self.socket.local_addr()?)
    }
}

#[async_trait]
impl ControlTransport for UdpTransport {
    fn session_ids(&self) -> SessionIds {
        self.ids
    }

    async fn send(&mut self, frame: &[u8]) -> Result<(), ControlError> {
        self.socket.send(frame).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Vec<u8>, ControlError> {
        let mut buf = vec![0u8; self.max_size];
        let len = self.socket.recv(&mut buf).await?;
        buf.truncate(len);
        Ok(buf)
    }

    fn latency(&self) -> Option<Duration> {
        self.latency.get()
    }

    async fn send_disconnect(&mut self) -> Result<(), ControlError> {
        match &self.disconnect_frame {
            Some(frame) => {
                self.socket.send(frame).await?;
            }
            None => tracing::debug!("no disconnect datagram configured"),
        }
        Ok(())
    }
}

/// In-memory transport; the paired [`DeviceEnd`] plays the device.
#[derive(Debug)]
pub struct ChannelTransport {
    ids: SessionIds,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    inbound: mpsc::UnboundedReceiver<Vec<u8>>,
    latency: LatencyGauge,
    disconnects: Arc<AtomicUsize>,
}

/// Device side of a [`ChannelTransport`].
#[derive(Debug)]
pub struct DeviceEnd {
    sent: mpsc::UnboundedReceiver<Vec<u8>>,
    inject: mpsc::UnboundedSender<Vec<u8>>,
    latency: LatencyGauge,
    disconnects: Arc<AtomicUsize>,
}

impl ChannelTransport {
    pub fn pair(ids: SessionIds) -> (ChannelTransport, DeviceEnd) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let latency = LatencyGauge::default();
        let disconnects = Arc::new(AtomicUsize::new(0));
        (
            ChannelTransport {
                ids,
                outbound: out_tx,
                inbound: in_rx,
                latency: latency.clone(),
                disconnects: disconnects.clone(),
            },
            DeviceEnd {
                sent: out_rx,
                inject: in_tx,
                latency,
                disconnects,
            },
        )
    }
}

#[async_trait]
impl ControlTransport for ChannelTransport {
    fn session_ids(&self) -> SessionIds {
        self.ids
    }

    async fn send(&mut self, frame: &[u8]) -> Result<(), ControlError> {
        self.outbound
            .send(frame.to_vec())
            .map_err(|_| ControlError::Transport("device end closed".into()))
    }

    async fn recv(&mut self) -> Result<Vec<u8>, ControlError> {
        self.inbound
            .recv()
            .await
            .ok_or_else(|| ControlError::Transport("transport closed".into()))
    }

    fn latency(&self) -> Option<Duration> {
        self.latency.get()
    }

    async fn send_disconnect(&mut self) -> Result<(), ControlError> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl DeviceEnd {
    /// Delivers a datagram to the control channel.
    pub fn inject(&self, frame: impl Into<Vec<u8>>) -> bool {
        self.inject.send(frame.into()).is_ok()
    }

    /// Next datagram sent by the control channel; `None` once it is gone.
    pub async fn next_sent(&mut self) -> Option<Vec<u8>> {
        self.sent.recv().await
    }

    pub fn try_next_sent(&mut self) -> Option<Vec<u8>> {
        self.sent.try_recv().ok()
    }

    pub fn set_latency(&self, latency: Duration) {
        self.latency.record(latency);
    }

    /// How often the control channel asked for a disconnect.
    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}
