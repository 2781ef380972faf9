use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rolink::frame::{self, InboundFrame, AUTH_REPLY_PREFIX};
use rolink::{
    ChannelTransport, ControlChannel, ControlConfig, ControlEvent, DeviceEnd, FrameType,
    SessionIds, StreamWorker, StreamWorkers,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

struct LogWorker(&'static str);

#[async_trait]
impl StreamWorker for LogWorker {
    async fn start(&self) {
        tracing::info!(stream = self.0, "stream worker started");
    }
}

/// Answers the login and the stream request the way a transceiver does.
async fn simulated_device(mut device: DeviceEnd) {
    let mut answered = [false; 2];
    while let Some(sent) = device.next_sent().await {
        if sent[0] == FrameType::Auth as u8 && !answered[0] {
            answered[0] = true;
            let mut reply = vec![0u8; 96];
            reply[..8].copy_from_slice(&AUTH_REPLY_PREFIX);
            reply[26..32].copy_from_slice(&[0x5d, 0x37, 0x12, 0x82, 0x3b, 0xde]);
            reply[64..68].copy_from_slice(b"FTTH");
            device.inject(reply);
        } else if sent[0] == FrameType::StreamRequest as u8 && !answered[1] {
            answered[1] = true;
            let mut ack = sent.clone();
            ack[96] = 1;
            device.inject(ack);
        }
        if let Some(InboundFrame::SyncProbe { seq }) = frame::classify(&sent) {
            tracing::trace!(seq, "keep-alive");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    // Swap ChannelTransport for UdpTransport::bind to talk to a real radio.
    let (transport, device) = ChannelTransport::pair(SessionIds::new(0xbb41_3f2b, 0xe6b2_7b7b));
    device.set_latency(Duration::from_millis(18));
    tokio::spawn(simulated_device(device));

    let config = ControlConfig::from_json_str(r#"{ "timing": { "status_interval_ms": 1000 } }"#)?;
    let (events_tx, mut events) = mpsc::unbounded_channel();
    let channel = ControlChannel::new(transport, config)?
        .with_workers(StreamWorkers::new(
            Arc::new(LogWorker("serial")),
            Arc::new(LogWorker("audio")),
        ))
        .with_events(events_tx);

    let shutdown = CancellationToken::new();
    let run = tokio::spawn(channel.run(shutdown.clone()));

    let watch = async {
        while let Some(event) = events.recv().await {
            match event {
                ControlEvent::StateChanged(state) => println!("state: {}", state),
                ControlEvent::Status(report) => println!("status: {}", report),
            }
        }
    };
    let _ = tokio::time::timeout(Duration::from_secs(6), watch).await;

    shutdown.cancel();
    run.await??;
    Ok(())
}
