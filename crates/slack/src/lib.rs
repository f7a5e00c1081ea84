//! Slack RTM integration for dogebot.
//!
//! - **Web API** (`api`) - form-encoded RPC calls against `https://slack.com/api/<method>`
//! - **Session** (`session`) - `rtm.start` bootstrap that yields the websocket URL
//! - **Events** (`events`) - frame discriminator and `message` event model
//! - **Classifier** (`classifier`) - pattern matching over regular and edited messages
//! - **Reaction** (`reaction`) - `reactions.add` with `already_reacted` treated as success
//! - **Heartbeat** (`heartbeat`) - periodic counter report and liveness signal
//! - **Socket** (`socket`) - websocket transport and the RTM read loop
//!
//! # Architecture
//!
//! ```text
//! rtm.start → URL → RtmRunner ─ message frames → MessageClassifier → EmojiReactor → reactions.add
//!                       ↑
//!              Heartbeat (liveness signal → ping)
//! ```

pub mod api;
pub mod classifier;
pub mod events;
pub mod heartbeat;
pub mod reaction;
pub mod session;
pub mod socket;
