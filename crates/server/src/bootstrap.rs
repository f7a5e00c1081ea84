use std::{sync::Arc, time::Duration};

use dogebot_core::{config::AppConfig, AtomicCounters, PatternError, PatternSet};
use dogebot_slack::{
    api::{HttpSlackApi, SlackApi},
    classifier::MessageClassifier,
    heartbeat::{Heartbeat, HeartbeatSettings, LivenessReceiver},
    reaction::EmojiReactor,
    session::{self, SessionError},
    socket::{RtmRunner, TransportError, WebSocketTransport},
};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub metrics: Arc<AtomicCounters>,
    pub runner: RtmRunner,
    pub heartbeat: Heartbeat,
    pub liveness: LivenessReceiver,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Patterns(#[from] PatternError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("rtm websocket connect failed: {0}")]
    Connect(#[source] TransportError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        api_base_url = %config.slack.api_base_url,
        patterns = config.bot.patterns.len(),
        reaction = %config.bot.reaction,
        "starting dogebot bootstrap"
    );

    let patterns = PatternSet::new(&config.bot.patterns)?;
    let api: Arc<dyn SlackApi> =
        Arc::new(HttpSlackApi::new(config.slack.api_base_url.clone(), config.slack.token.clone()));

    let url = session::start(api.as_ref()).await?;
    let transport = WebSocketTransport::connect(&url).await.map_err(BootstrapError::Connect)?;

    let metrics = Arc::new(AtomicCounters::new());
    let reactor = Arc::new(EmojiReactor::new(api, config.bot.reaction.clone()));
    let classifier = Arc::new(MessageClassifier::new(patterns, metrics.clone(), reactor));
    let runner = RtmRunner::new(
        Arc::new(transport),
        classifier,
        Duration::from_secs(config.bot.ping_timeout_secs),
    );
    let (heartbeat, liveness) = Heartbeat::new(
        HeartbeatSettings {
            interval: Duration::from_secs(config.bot.heartbeat_interval_secs),
            capacity: config.bot.heartbeat_capacity,
        },
        metrics.clone(),
    );

    info!(event_name = "system.bootstrap.ready", "dogebot bootstrap complete");
    Ok(Application { config, metrics, runner, heartbeat, liveness })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use axum::{extract::State, routing::post, Form, Router};
    use dogebot_core::{
        config::{AppConfig, ConfigOverrides, LoadOptions},
        CounterSnapshot, MetricsSink,
    };
    use dogebot_slack::socket::Termination;
    use futures_util::SinkExt;
    use tokio::sync::Mutex;
    use tokio_tungstenite::tungstenite::Message;

    use super::{bootstrap_with_config, BootstrapError};

    type Reactions = Arc<Mutex<Vec<HashMap<String, String>>>>;

    #[derive(Clone)]
    struct FakeSlack {
        rtm_start_reply: String,
        reactions: Reactions,
    }

    async fn spawn_fake_slack(rtm_start_reply: String) -> (String, Reactions) {
        let reactions: Reactions = Arc::default();
        let state = FakeSlack { rtm_start_reply, reactions: reactions.clone() };

        let app = Router::new()
            .route(
                "/api/rtm.start",
                post(|State(state): State<FakeSlack>| async move { state.rtm_start_reply.clone() }),
            )
            .route(
                "/api/reactions.add",
                post(
                    |State(state): State<FakeSlack>,
                     Form(fields): Form<HashMap<String, String>>| async move {
                        state.reactions.lock().await.push(fields);
                        r#"{"ok":true}"#
                    },
                ),
            )
            .with_state(state);

        let listener =
            tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("listener should bind");
        let address = listener.local_addr().expect("listener should have an address");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        (format!("http://{address}/api"), reactions)
    }

    async fn spawn_fake_rtm(frames: Vec<&'static str>) -> String {
        let listener =
            tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("listener should bind");
        let address = listener.local_addr().expect("listener should have an address");

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("client should connect");
            let mut socket =
                tokio_tungstenite::accept_async(stream).await.expect("handshake should succeed");
            for frame in frames {
                socket.send(Message::Text(frame.into())).await.expect("frame should send");
            }
            let _ = socket.close(None).await;
        });

        format!("ws://{address}")
    }

    fn config(api_base_url: String) -> AppConfig {
        AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                slack_token: Some("xoxb-test".to_string()),
                api_base_url: Some(api_base_url),
                server_enabled: Some(false),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .expect("test config should load")
    }

    #[tokio::test]
    async fn bootstrap_fails_when_rtm_start_is_rejected() {
        let (base_url, _reactions) =
            spawn_fake_slack(r#"{"ok":false,"error":"invalid_auth"}"#.to_string()).await;

        let result = bootstrap_with_config(config(base_url)).await;

        let error = result.err().expect("bootstrap should fail");
        assert!(matches!(error, BootstrapError::Session(_)));
        assert!(error.to_string().contains("invalid_auth"));
    }

    #[tokio::test]
    async fn bootstrap_fails_when_websocket_cannot_be_dialed() {
        let listener =
            tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("listener should bind");
        let address = listener.local_addr().expect("listener should have an address");
        drop(listener);
        let (base_url, _reactions) =
            spawn_fake_slack(format!(r#"{{"ok":true,"url":"ws://{address}"}}"#)).await;

        let result = bootstrap_with_config(config(base_url)).await;

        assert!(matches!(result, Err(BootstrapError::Connect(_))));
    }

    #[tokio::test]
    async fn end_to_end_reacts_to_matching_messages() {
        let rtm_url = spawn_fake_rtm(vec![
            r#"{"type":"hello"}"#,
            r#"{"type":"message","channel":"C1","text":"wow, much amaze","ts":"1.0"}"#,
            r#"{"type":"message","channel":"C1","text":"wowwee","ts":"2.0"}"#,
            r#"{"type":"message","subtype":"message_changed","channel":"C2","message":{"text":"such doge","ts":"3.0"}}"#,
        ])
        .await;
        let (base_url, reactions) =
            spawn_fake_slack(format!(r#"{{"ok":true,"url":"{rtm_url}"}}"#)).await;

        let app = bootstrap_with_config(config(base_url)).await.expect("bootstrap should succeed");
        let heartbeat = app.heartbeat.spawn();
        let termination = app.runner.run(app.liveness).await;
        heartbeat.abort();

        assert_eq!(termination, Termination::StreamClosed);
        assert_eq!(
            app.metrics.snapshot(),
            CounterSnapshot { ignored: 0, regular: 2, changed: 1, matched: 2 }
        );

        let reactions = reactions.lock().await;
        let mut targets: Vec<_> = reactions
            .iter()
            .map(|fields| {
                assert_eq!(fields.get("name").map(String::as_str), Some("doge"));
                assert_eq!(fields.get("token").map(String::as_str), Some("xoxb-test"));
                (fields["channel"].clone(), fields["timestamp"].clone())
            })
            .collect();
        targets.sort();
        assert_eq!(
            targets,
            vec![("C1".to_owned(), "1.0".to_owned()), ("C2".to_owned(), "3.0".to_owned())]
        );
    }
}
