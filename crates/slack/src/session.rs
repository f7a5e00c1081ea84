use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::api::{ApiError, SlackApi};

pub const RTM_START_METHOD: &str = "rtm.start";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("rtm session start failed: {0}")]
    Api(#[from] ApiError),
    #[error("rtm session start returned an unreadable body: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("rtm session start response did not include a websocket url")]
    MissingUrl,
}

#[derive(Debug, Deserialize)]
struct StartResponse {
    #[serde(default)]
    url: String,
}

/// Returns the one-time websocket URL for the realtime session.
pub async fn start(api: &dyn SlackApi) -> Result<String, SessionError> {
    let body = api.call(RTM_START_METHOD, &[]).await?;
    let response =
        serde_json::from_slice::<StartResponse>(&body).map_err(SessionError::Decode)?;

    if response.url.is_empty() {
        return Err(SessionError::MissingUrl);
    }

    info!(event_name = "system.bootstrap.rtm_started", "rtm session endpoint obtained");
    Ok(response.url)
}
