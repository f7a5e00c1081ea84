use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use thiserror::Error;
use tokio::{
    net::TcpStream,
    sync::{watch, Mutex},
    task::JoinSet,
};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};

use crate::{
    classifier::{ClassifyOutcome, MessageClassifier},
    events::{frame_kind, FrameKind},
    heartbeat::LivenessReceiver,
};

/// How long `run` waits for in-flight classifications once the session ends.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ping failed: {0}")]
    Ping(String),
    #[error("transport ping did not complete within {0:?}")]
    PingTimeout(Duration),
    #[error("transport close failed: {0}")]
    Disconnect(String),
}

/// Why the runner left the connected state. Every variant is terminal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Termination {
    #[error("failed on websocket read: {0}")]
    ReadFailed(TransportError),
    #[error("websocket stream closed by peer")]
    StreamClosed,
    #[error("liveness ping failed: {0}")]
    PingFailed(TransportError),
    #[error("liveness signal source stopped")]
    HeartbeatStopped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Terminated,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Terminated => "terminated",
        }
    }
}

#[async_trait]
pub trait RtmTransport: Send + Sync {
    /// Next text frame, or `None` once the peer has closed the stream.
    async fn next_frame(&self) -> Result<Option<String>, TransportError>;
    async fn ping(&self) -> Result<(), TransportError>;
    async fn close(&self) -> Result<(), TransportError>;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// RTM websocket. Reads and pings lock separate halves, so a ping never waits
/// behind a blocked read.
pub struct WebSocketTransport {
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
}

impl WebSocketTransport {
    pub async fn connect(url: &str) -> Result<Self, TransportError> {
        let (socket, _response) =
            connect_async(url).await.map_err(|error| TransportError::Connect(error.to_string()))?;
        let (sink, stream) = socket.split();
        info!(event_name = "system.bootstrap.rtm_connected", "rtm websocket connected");

        Ok(Self { sink: Mutex::new(sink), stream: Mutex::new(stream) })
    }
}

#[async_trait]
impl RtmTransport for WebSocketTransport {
    async fn next_frame(&self) -> Result<Option<String>, TransportError> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text.to_string())),
                Some(Ok(Message::Close(frame))) => {
                    debug!(event_name = "ingress.rtm.close_frame", frame = ?frame, "rtm websocket close frame received");
                    return Ok(None);
                }
                Some(Ok(_control_or_binary)) => continue,
                Some(Err(error)) => return Err(TransportError::Receive(error.to_string())),
                None => return Ok(None),
            }
        }
    }

    async fn ping(&self) -> Result<(), TransportError> {
        let mut sink = self.sink.lock().await;
        sink.send(Message::Ping(Vec::new()))
            .await
            .map_err(|error| TransportError::Ping(error.to_string()))
    }

    async fn close(&self) -> Result<(), TransportError> {
        let mut sink = self.sink.lock().await;
        sink.close().await.map_err(|error| TransportError::Disconnect(error.to_string()))
    }
}

pub struct RtmRunner {
    transport: Arc<dyn RtmTransport>,
    classifier: Arc<MessageClassifier>,
    ping_timeout: Duration,
    drain_timeout: Duration,
    state: watch::Sender<ConnectionState>,
}

impl RtmRunner {
    pub fn new(
        transport: Arc<dyn RtmTransport>,
        classifier: Arc<MessageClassifier>,
        ping_timeout: Duration,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Connected);
        Self { transport, classifier, ping_timeout, drain_timeout: DEFAULT_DRAIN_TIMEOUT, state }
    }

    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Pumps frames and answers liveness signals until something fatal happens.
    ///
    /// Classifications still in flight at that point get up to the drain
    /// timeout to finish; whatever is left after that is aborted.
    pub async fn run(&self, mut liveness: LivenessReceiver) -> Termination {
        let mut in_flight = JoinSet::new();

        let termination = tokio::select! {
            termination = self.pump(&mut in_flight) => termination,
            termination = self.keep_alive(&mut liveness) => termination,
        };
        self.state.send_replace(ConnectionState::Terminated);

        if let Err(error) = self.transport.close().await {
            debug!(event_name = "ingress.rtm.close_failed", error = %error, "rtm transport close failed");
        }

        let pending = in_flight.len();
        let drained = tokio::time::timeout(self.drain_timeout, async {
            while in_flight.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(
                event_name = "ingress.rtm.drain_abandoned",
                abandoned = in_flight.len(),
                timeout = ?self.drain_timeout,
                "in-flight classifications outlived the drain timeout; aborting"
            );
            in_flight.abort_all();
        }
        warn!(
            event_name = "ingress.rtm.terminated",
            reason = %termination,
            pending,
            "rtm session terminated"
        );

        termination
    }

    async fn pump(&self, in_flight: &mut JoinSet<ClassifyOutcome>) -> Termination {
        loop {
            let frame = match self.transport.next_frame().await {
                Ok(Some(frame)) => frame,
                Ok(None) => return Termination::StreamClosed,
                Err(error) => return Termination::ReadFailed(error),
            };

            while in_flight.try_join_next().is_some() {}
            self.dispatch(frame, in_flight);
        }
    }

    fn dispatch(&self, frame: String, in_flight: &mut JoinSet<ClassifyOutcome>) {
        match frame_kind(&frame) {
            Ok(FrameKind::Hello) => {
                info!(event_name = "ingress.rtm.hello", "rtm hello received");
            }
            Ok(FrameKind::Message) => {
                let classifier = Arc::clone(&self.classifier);
                in_flight.spawn(async move { classifier.classify(&frame).await });
            }
            Ok(FrameKind::Other(kind)) => {
                trace!(event_name = "ingress.rtm.frame_ignored", kind = %kind, "ignoring rtm frame");
            }
            Err(error) => {
                warn!(event_name = "ingress.rtm.frame_malformed", error = %error, "skipping unparseable rtm frame");
            }
        }
    }

    async fn keep_alive(&self, liveness: &mut LivenessReceiver) -> Termination {
        while liveness.recv().await.is_some() {
            match tokio::time::timeout(self.ping_timeout, self.transport.ping()).await {
                Ok(Ok(())) => debug!(event_name = "egress.rtm.ping_sent", "liveness ping sent"),
                Ok(Err(error)) => return Termination::PingFailed(error),
                Err(_elapsed) => {
                    return Termination::PingFailed(TransportError::PingTimeout(self.ping_timeout))
                }
            }
        }

        Termination::HeartbeatStopped
    }
}
