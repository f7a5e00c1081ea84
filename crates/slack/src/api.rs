use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("slack api request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// `ok` was false. The raw body is kept for callers that need the detail.
    #[error("slack api response contained error: {code}")]
    Slack { code: String, body: Vec<u8> },
}

impl ApiError {
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Slack { code, .. } => Some(code),
            Self::Transport(_) => None,
        }
    }

    pub fn body(&self) -> Option<&[u8]> {
        match self {
            Self::Slack { body, .. } => Some(body),
            Self::Transport(_) => None,
        }
    }
}

/// Slack Web API: `POST <base>/<method>` with form-encoded arguments.
#[async_trait]
pub trait SlackApi: Send + Sync {
    /// `arguments` is a flat key/value list; an unpaired trailing key is sent
    /// with an empty value.
    async fn call(&self, method: &str, arguments: &[&str]) -> Result<Vec<u8>, ApiError>;
}

pub struct HttpSlackApi {
    client: Client,
    base_url: String,
    token: SecretString,
}

impl HttpSlackApi {
    pub fn new(base_url: impl Into<String>, token: SecretString) -> Self {
        Self::with_client(Client::new(), base_url, token)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>, token: SecretString) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { client, base_url, token }
    }

    pub fn method_url(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }
}

#[async_trait]
impl SlackApi for HttpSlackApi {
    async fn call(&self, method: &str, arguments: &[&str]) -> Result<Vec<u8>, ApiError> {
        let mut form = form_fields(arguments);
        let argument_keys: Vec<&str> = form.iter().map(|(key, _)| *key).collect();
        debug!(event_name = "egress.slack.api_call", method, ?argument_keys, "calling slack api");
        form.push(("token", self.token.expose_secret()));

        let response = self.client.post(self.method_url(method)).form(&form).send().await?;
        let body = response.bytes().await?.to_vec();

        check_envelope(body)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Envelope {
    ok: bool,
    error: String,
}

/// Unparseable bodies decode as `ok = false` with an empty error code.
pub fn check_envelope(body: Vec<u8>) -> Result<Vec<u8>, ApiError> {
    let envelope = serde_json::from_slice::<Envelope>(&body).unwrap_or_default();
    if envelope.ok {
        Ok(body)
    } else {
        Err(ApiError::Slack { code: envelope.error, body })
    }
}

pub fn form_fields<'a>(arguments: &[&'a str]) -> Vec<(&'a str, &'a str)> {
    arguments.chunks(2).map(|pair| (pair[0], pair.get(1).copied().unwrap_or(""))).collect()
}
