use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::api::SlackApi;

pub const REACTIONS_ADD_METHOD: &str = "reactions.add";
pub const ALREADY_REACTED: &str = "already_reacted";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReactionOutcome {
    Added,
    AlreadyReacted,
    /// Logged where it happened; never retried.
    Failed,
}

#[async_trait]
pub trait Reactor: Send + Sync {
    async fn react(&self, channel: &str, timestamp: &str) -> ReactionOutcome;
}

/// Attaches one fixed emoji through `reactions.add`.
pub struct EmojiReactor {
    api: Arc<dyn SlackApi>,
    emoji: String,
}

impl EmojiReactor {
    pub fn new(api: Arc<dyn SlackApi>, emoji: impl Into<String>) -> Self {
        Self { api, emoji: emoji.into() }
    }
}

#[async_trait]
impl Reactor for EmojiReactor {
    async fn react(&self, channel: &str, timestamp: &str) -> ReactionOutcome {
        let arguments = ["name", self.emoji.as_str(), "channel", channel, "timestamp", timestamp];

        match self.api.call(REACTIONS_ADD_METHOD, &arguments).await {
            Ok(_) => {
                info!(
                    event_name = "egress.slack.reaction_added",
                    channel,
                    timestamp,
                    emoji = %self.emoji,
                    "reaction added"
                );
                ReactionOutcome::Added
            }
            Err(error) if error.code() == Some(ALREADY_REACTED) => {
                debug!(
                    event_name = "egress.slack.reaction_present",
                    channel,
                    timestamp,
                    "reaction already present"
                );
                ReactionOutcome::AlreadyReacted
            }
            Err(error) => {
                warn!(
                    event_name = "egress.slack.reaction_failed",
                    channel,
                    timestamp,
                    error = %error,
                    "unable to add reaction"
                );
                ReactionOutcome::Failed
            }
        }
    }
}
