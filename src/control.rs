//! Control channel engine.
//!
//! One task owns the [`ControlChannel`] and with it the [`ControlSession`].
//! Inbound datagrams, the three periodic timers, the post-login schedule and
//! the activation deadline are all polled by the same `select!`, so every
//! sequence increment, token write and activation flag change happens in
//! that task.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::{AuthNonce, ControlConfig};
use crate::error::ControlError;
use crate::frame::text::{LiteralCredentials, PlainText, TextCodec, TextCodecError};
use crate::frame::{
    self, AuthReply, AuthSubtype, FrameType, InboundFrame, LoginFields, StreamAck,
    StreamRequestFields, AUTH_REPLY_PREFIX, CREDENTIAL_WIDTH,
};
use crate::handshake::{self, ControlTransport, HandshakeSchedule, HandshakeStep, ReauthPhase};
use crate::session::state::HandshakeState;
use crate::session::ControlSession;
use crate::status::{ControlEvent, StatusReport};
use crate::stream::StreamWorkers;

/// Control channel for one device connection.
#[derive(Debug)]
pub struct ControlChannel<T> {
    transport: T,
    session: ControlSession,
    config: ControlConfig,
    login: LoginFields,
    stream_request: StreamRequestFields,
    workers: StreamWorkers,
    events: Option<mpsc::UnboundedSender<ControlEvent>>,
}

impl<T: ControlTransport> ControlChannel<T> {
    /// Builds a channel using the captured default credential table.
    ///
    /// # Errors
    /// `ControlError::Config` for invalid timing and `ControlError::Text`
    /// when a credential has no known obfuscation or a text field overflows.
    pub fn new(transport: T, config: ControlConfig) -> Result<Self, ControlError> {
        Self::with_codecs(transport, config, &LiteralCredentials::default(), &PlainText)
    }

    /// Builds a channel with explicit codecs for the obfuscated credential
    /// slots and the plain text slots.
    pub fn with_codecs(
        transport: T,
        config: ControlConfig,
        credentials: &dyn TextCodec,
        plain: &dyn TextCodec,
    ) -> Result<Self, ControlError> {
        config.validate()?;
        let username: [u8; CREDENTIAL_WIDTH] = field(credentials, &config.username)?;
        let login = LoginFields {
            username,
            password: field(credentials, &config.password)?,
            client_name: field(plain, &config.client_name)?,
        };
        let stream_request = StreamRequestFields {
            device_model: field(plain, &config.device_model)?,
            username,
            params: config.streams.clone(),
        };
        let session = ControlSession::new(transport.session_ids());
        Ok(Self {
            transport,
            session,
            config,
            login,
            stream_request,
            workers: StreamWorkers::default(),
            events: None,
        })
    }

    /// Workers started once the device accepts the stream request.
    pub fn with_workers(mut self, workers: StreamWorkers) -> Self {
        self.workers = workers;
        self
    }

    /// Publishes state changes and status reports on `events`.
    pub fn with_events(mut self, events: mpsc::UnboundedSender<ControlEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn session(&self) -> &ControlSession {
        &self.session
    }

    pub fn state(&self) -> &HandshakeState {
        self.session.state()
    }

    /// Logs in, activates the streams and keeps the session alive until
    /// `shutdown` fires or a fatal condition occurs.
    ///
    /// Consumes the channel: after an error no further frames are sent and
    /// reconnecting means building a new channel.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<(), ControlError> {
        let started = Instant::now();
        let result = self.drive(started, &shutdown).await;
        if let Err(err) = &result {
            tracing::error!(error = %err, "control channel failed");
            if !self.session.state().is_terminal() {
                let _ = self.set_state(HandshakeState::Failed(err.to_string()));
            }
        }
        result
    }

    async fn drive(
        &mut self,
        started: Instant,
        shutdown: &CancellationToken,
    ) -> Result<(), ControlError> {
        self.login().await?;
        tokio::select! {
            _ = shutdown.cancelled() => return self.close().await,
            accepted = self.await_auth_reply() => accepted?,
        }
        self.maintain(started, shutdown).await
    }

    async fn login(&mut self) -> Result<(), ControlError> {
        let header = self.session.header(FrameType::Auth);
        let mut auth = self.session.auth_header(FrameType::Auth, AuthSubtype::Login);
        if self.config.auth_nonce == AuthNonce::Random {
            let nonce: [u8; 2] = rand::random();
            auth.token.0[..2].copy_from_slice(&nonce);
        }
        let frame = frame::encode_login(&header, &auth, &self.login);
        self.send_twice(&frame).await?;
        self.set_state(HandshakeState::AuthSent)?;
        tracing::debug!(seq = header.seq, "login sent, expecting auth answer");
        Ok(())
    }

    async fn await_auth_reply(&mut self) -> Result<(), ControlError> {
        let within = self.config.timing.auth_reply_timeout();
        let datagram = self
            .transport
            .expect(FrameType::AuthReply.layout().len, &AUTH_REPLY_PREFIX, within)
            .await?
            .ok_or(ControlError::AuthReplyTimeout(within))?;
        let reply = AuthReply::parse(&datagram)
            .ok_or_else(|| ControlError::Transport("malformed auth reply".into()))?;
        let token = handshake::accept_auth_reply(&reply)?;
        self.session.set_auth_token(token)?;
        self.set_state(HandshakeState::Authenticated)?;
        tracing::info!(connection = %reply.connection, token = %token, "auth ok, waiting a bit");
        Ok(())
    }

    async fn maintain(
        &mut self,
        started: Instant,
        shutdown: &CancellationToken,
    ) -> Result<(), ControlError> {
        let timing = self.config.timing.clone();
        let now = Instant::now();
        let mut schedule = HandshakeSchedule::after_login(timing.handshake_step(), now);
        let mut sync_tick = periodic(now, timing.sync_interval());
        let mut reauth_tick = periodic(now, timing.reauth_interval());
        let mut status_tick = periodic(now, timing.status_interval());

        loop {
            let step_at = schedule.next_deadline();
            let activation_at = self.session.activation_deadline();
            tokio::select! {
                _ = shutdown.cancelled() => return self.close().await,
                datagram = self.transport.recv() => self.handle_datagram(datagram?).await?,
                _ = sync_tick.tick() => self.send_sync().await?,
                _ = reauth_tick.tick() => self.send_reauth(ReauthPhase::Second).await?,
                _ = status_tick.tick() => self.report_status(started),
                _ = time::sleep_until(step_at.unwrap_or(now)), if step_at.is_some() => {
                    if let Some(step) = schedule.fire(Instant::now()) {
                        self.run_step(step).await?;
                    }
                }
                _ = time::sleep_until(activation_at.unwrap_or(now)), if activation_at.is_some() => {
                    return Err(ControlError::StreamActivationTimeout(timing.activation_timeout()));
                }
            }
        }
    }

    async fn handle_datagram(&mut self, datagram: Vec<u8>) -> Result<(), ControlError> {
        match frame::classify(&datagram) {
            Some(InboundFrame::SyncProbe { seq }) => {
                let header = self.session.echo_header(FrameType::Sync, seq);
                self.send_twice(&frame::encode_sync(&header)).await
            }
            Some(InboundFrame::ReauthRejected) => Err(ControlError::ReauthFailed {
                retry_after: self.config.timing.reauth_cooldown(),
            }),
            Some(InboundFrame::StreamAccepted(ack)) => self.on_stream_accepted(ack),
            Some(InboundFrame::AuthReply(_)) | None => {
                tracing::trace!(len = datagram.len(), "ignoring datagram");
                Ok(())
            }
        }
    }

    fn on_stream_accepted(&mut self, ack: StreamAck) -> Result<(), ControlError> {
        if self.session.stream_activated() {
            tracing::debug!(seq = ack.seq, "stream already active, ignoring acknowledgment");
            return Ok(());
        }
        if self.session.activation_deadline().is_none() {
            tracing::debug!(seq = ack.seq, "no stream request outstanding, ignoring acknowledgment");
            return Ok(());
        }
        self.session.clear_activation_deadline();
        self.session.mark_stream_activated();
        self.set_state(HandshakeState::StreamActive)?;
        tracing::info!(model = %ack.device_model, "serial and audio request success");
        self.workers.launch();
        Ok(())
    }

    async fn run_step(&mut self, step: HandshakeStep) -> Result<(), ControlError> {
        match step {
            HandshakeStep::Reauth(phase) => {
                tracing::info!(%phase, "sending reauth");
                self.send_reauth(phase).await?;
                self.set_state(match phase {
                    ReauthPhase::First => HandshakeState::FirstReauthSent,
                    ReauthPhase::Second => HandshakeState::SecondReauthSent,
                })
            }
            HandshakeStep::RequestStreams => self.request_streams().await,
        }
    }

    async fn send_sync(&mut self) -> Result<(), ControlError> {
        let header = self.session.header(FrameType::Sync);
        self.send_twice(&frame::encode_sync(&header)).await
    }

    async fn send_reauth(&mut self, phase: ReauthPhase) -> Result<(), ControlError> {
        let header = self.session.header(FrameType::Reauth);
        let auth = self.session.auth_header(FrameType::Reauth, phase.subtype());
        tracing::debug!(seq = header.seq, inner_seq = auth.inner_seq, %phase, "reauth");
        self.send_twice(&frame::encode_reauth(&header, &auth)).await
    }

    async fn request_streams(&mut self) -> Result<(), ControlError> {
        tracing::info!("requesting serial and audio stream");
        let header = self.session.header(FrameType::StreamRequest);
        let auth = self
            .session
            .auth_header(FrameType::StreamRequest, AuthSubtype::StreamRequest);
        let frame = frame::encode_stream_request(&header, &auth, &self.stream_request);
        self.send_twice(&frame).await?;
        self.session
            .arm_activation_deadline(Instant::now() + self.config.timing.activation_timeout())?;
        self.set_state(HandshakeState::StreamRequested)
    }

    fn report_status(&self, started: Instant) {
        if !self.session.stream_activated() {
            return;
        }
        let report = StatusReport {
            uptime: started.elapsed(),
            latency: self.transport.latency(),
        };
        tracing::info!(
            uptime_s = report.uptime.as_secs(),
            latency_ms = ?report.latency.map(|latency| latency.as_millis()),
            "{}",
            report
        );
        self.emit(ControlEvent::Status(report));
    }

    async fn close(&mut self) -> Result<(), ControlError> {
        tracing::info!("closing control channel");
        if let Err(err) = self.transport.send_disconnect().await {
            tracing::warn!(error = %err, "disconnect notification failed");
        }
        self.set_state(HandshakeState::Closed)
    }

    /// Every control frame goes out twice back-to-back.
    async fn send_twice(&mut self, frame: &[u8]) -> Result<(), ControlError> {
        self.transport.send(frame).await?;
        self.transport.send(frame).await
    }

    fn set_state(&mut self, next: HandshakeState) -> Result<(), ControlError> {
        self.session.transition(next.clone())?;
        self.emit(ControlEvent::StateChanged(next));
        Ok(())
    }

    fn emit(&self, event: ControlEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}

fn periodic(start: Instant, period: Duration) -> Interval {
    let mut interval = time::interval_at(start + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

/// Encodes `text` into an `N`-byte slot; a codec result wider than the slot
/// is an error, never truncated.
fn field<const N: usize>(codec: &dyn TextCodec, text: &str) -> Result<[u8; N], TextCodecError> {
    let bytes = codec.encode(text, N)?;
    if bytes.len() > N {
        return Err(TextCodecError::TooLong {
            text: text.to_string(),
            needed: bytes.len(),
            width: N,
        });
    }
    let mut out = [0u8; N];
    out[..bytes.len()].copy_from_slice(&bytes);
    Ok(out)
}
