use std::sync::Arc;

use async_trait::async_trait;

/// Secondary stream (serial or audio) started once the device accepts the
/// stream request.
///
/// The control channel spawns `start` and never awaits or supervises it;
/// workers own their sockets, framing and error handling.
#[async_trait]
pub trait StreamWorker: Send + Sync + 'static {
    async fn start(&self);
}

/// The two workers handed off to after activation.
#[derive(Clone)]
pub struct StreamWorkers {
    pub serial: Arc<dyn StreamWorker>,
    pub audio: Arc<dyn StreamWorker>,
}

impl StreamWorkers {
    pub fn new(serial: Arc<dyn StreamWorker>, audio: Arc<dyn StreamWorker>) -> Self {
        Self { serial, audio }
    }

    /// Spawns both workers concurrently (fire-and-forget).
    pub fn launch(&self) {
        for (name, worker) in [("serial", &self.serial), ("audio", &self.audio)] {
            let worker = Arc::clone(worker);
            tracing::debug!(stream = name, "starting stream worker");
            tokio::spawn(async move { worker.start().await });
        }
    }
}

impl std::fmt::Debug for StreamWorkers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamWorkers").finish_non_exhaustive()
    }
}

/// Worker that does nothing; for callers that only want the control channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdleWorker;

#[async_trait]
impl StreamWorker for IdleWorker {
    async fn start(&self) {}
}

impl Default for StreamWorkers {
    fn default() -> Self {
        Self::new(Arc::new(IdleWorker), Arc::new(IdleWorker))
    }
}
