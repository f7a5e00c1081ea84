use std::sync::Arc;

use dogebot_core::{Counter, MetricsSink, PatternSet};
use tracing::{debug, warn};

use crate::{
    events::{EffectiveMessage, MessageCategory, MessageEvent},
    reaction::{ReactionOutcome, Reactor},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClassifyOutcome {
    Malformed,
    Ignored,
    NoMatch,
    Reacted(ReactionOutcome),
}

/// Decides whether a `message` frame earns a reaction.
pub struct MessageClassifier {
    patterns: PatternSet,
    metrics: Arc<dyn MetricsSink>,
    reactor: Arc<dyn Reactor>,
}

impl MessageClassifier {
    pub fn new(patterns: PatternSet, metrics: Arc<dyn MetricsSink>, reactor: Arc<dyn Reactor>) -> Self {
        Self { patterns, metrics, reactor }
    }

    pub async fn classify(&self, frame: &str) -> ClassifyOutcome {
        let event = match MessageEvent::parse(frame) {
            Ok(event) => event,
            Err(error) => {
                warn!(event_name = "ingress.rtm.message_malformed", error = %error, "dropping unparseable message event");
                return ClassifyOutcome::Malformed;
            }
        };

        let EffectiveMessage { text, timestamp } = match event.categorize() {
            MessageCategory::Regular(effective) => {
                self.metrics.increment(Counter::Regular);
                effective
            }
            MessageCategory::Changed(effective) => {
                self.metrics.increment(Counter::Changed);
                effective
            }
            MessageCategory::Ignored { subtype } => {
                self.metrics.increment(Counter::Ignored);
                debug!(event_name = "ingress.rtm.message_ignored", subtype, "ignoring message subtype");
                return ClassifyOutcome::Ignored;
            }
        };

        if !self.patterns.is_match(text) {
            return ClassifyOutcome::NoMatch;
        }

        self.metrics.increment(Counter::Matched);
        debug!(
            event_name = "ingress.rtm.message_matched",
            channel = %event.channel,
            timestamp,
            "message matched pattern set"
        );
        ClassifyOutcome::Reacted(self.reactor.react(&event.channel, timestamp).await)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use dogebot_core::{AtomicCounters, CounterSnapshot, MetricsSink, PatternSet};
    use tokio::sync::Mutex;
    use tokio::task::JoinSet;

    use super::{ClassifyOutcome, MessageClassifier};
    use crate::reaction::{ReactionOutcome, Reactor};

    #[derive(Default)]
    struct RecordingReactor {
        reactions: Mutex<Vec<(String, String)>>,
    }

    impl RecordingReactor {
        async fn reactions(&self) -> Vec<(String, String)> {
            self.reactions.lock().await.clone()
        }
    }

    #[async_trait]
    impl Reactor for RecordingReactor {
        async fn react(&self, channel: &str, timestamp: &str) -> ReactionOutcome {
            self.reactions.lock().await.push((channel.to_owned(), timestamp.to_owned()));
            ReactionOutcome::Added
        }
    }

    fn classifier() -> (MessageClassifier, Arc<AtomicCounters>, Arc<RecordingReactor>) {
        let metrics = Arc::new(AtomicCounters::new());
        let reactor = Arc::new(RecordingReactor::default());
        let classifier = MessageClassifier::new(PatternSet::default(), metrics.clone(), reactor.clone());
        (classifier, metrics, reactor)
    }

    fn message(text: &str, ts: &str) -> String {
        serde_json::json!({"type": "message", "channel": "C1", "text": text, "ts": ts}).to_string()
    }

    #[tokio::test]
    async fn whole_word_match_reacts_once_with_channel_and_timestamp() {
        let (classifier, metrics, reactor) = classifier();

        let outcome = classifier.classify(&message("wow, much amaze", "100.1")).await;

        assert_eq!(outcome, ClassifyOutcome::Reacted(ReactionOutcome::Added));
        assert_eq!(reactor.reactions().await, vec![("C1".to_owned(), "100.1".to_owned())]);
        assert_eq!(
            metrics.snapshot(),
            CounterSnapshot { ignored: 0, regular: 1, changed: 0, matched: 1 }
        );
    }

    #[tokio::test]
    async fn embedded_pattern_does_not_react() {
        let (classifier, metrics, reactor) = classifier();

        assert_eq!(classifier.classify(&message("wowwee", "1.0")).await, ClassifyOutcome::NoMatch);
        assert_eq!(classifier.classify(&message("I was wowed", "2.0")).await, ClassifyOutcome::NoMatch);

        assert!(reactor.reactions().await.is_empty());
        assert_eq!(
            metrics.snapshot(),
            CounterSnapshot { ignored: 0, regular: 2, changed: 0, matched: 0 }
        );
    }

    #[tokio::test]
    async fn edited_message_matches_on_nested_text_and_timestamp() {
        let (classifier, metrics, reactor) = classifier();
        let frame = serde_json::json!({
            "type": "message",
            "subtype": "message_changed",
            "channel": "C9",
            "text": "nothing to see",
            "ts": "200.0",
            "message": {"text": "edited: so DOGE", "ts": "150.5"}
        })
        .to_string();

        let outcome = classifier.classify(&frame).await;

        assert_eq!(outcome, ClassifyOutcome::Reacted(ReactionOutcome::Added));
        assert_eq!(reactor.reactions().await, vec![("C9".to_owned(), "150.5".to_owned())]);
        assert_eq!(
            metrics.snapshot(),
            CounterSnapshot { ignored: 0, regular: 0, changed: 1, matched: 1 }
        );
    }

    #[tokio::test]
    async fn edited_message_ignores_top_level_text() {
        let (classifier, _metrics, reactor) = classifier();
        let frame = serde_json::json!({
            "type": "message",
            "subtype": "message_changed",
            "channel": "C9",
            "text": "wow",
            "ts": "200.0",
            "message": {"text": "plain words", "ts": "150.5"}
        })
        .to_string();

        assert_eq!(classifier.classify(&frame).await, ClassifyOutcome::NoMatch);
        assert!(reactor.reactions().await.is_empty());
    }

    #[tokio::test]
    async fn other_subtypes_count_as_ignored_without_matching() {
        let (classifier, metrics, reactor) = classifier();
        let frame = serde_json::json!({
            "type": "message",
            "subtype": "bot_message",
            "channel": "C1",
            "text": "wow wow wow",
            "ts": "3.0"
        })
        .to_string();

        assert_eq!(classifier.classify(&frame).await, ClassifyOutcome::Ignored);

        assert!(reactor.reactions().await.is_empty());
        assert_eq!(
            metrics.snapshot(),
            CounterSnapshot { ignored: 1, regular: 0, changed: 0, matched: 0 }
        );
    }

    #[tokio::test]
    async fn malformed_event_touches_no_counter() {
        let (classifier, metrics, reactor) = classifier();

        assert_eq!(
            classifier.classify(r#"{"type":"message","text":["not","a","string"]}"#).await,
            ClassifyOutcome::Malformed
        );

        assert!(reactor.reactions().await.is_empty());
        assert_eq!(metrics.snapshot(), CounterSnapshot::default());
    }

    #[tokio::test]
    async fn null_text_counts_as_regular_without_matching() {
        let (classifier, metrics, reactor) = classifier();

        assert_eq!(
            classifier
                .classify(r#"{"type":"message","channel":"C1","text":null,"ts":"1.0"}"#)
                .await,
            ClassifyOutcome::NoMatch
        );

        assert!(reactor.reactions().await.is_empty());
        assert_eq!(metrics.snapshot().regular, 1);
        assert_eq!(metrics.snapshot().matched, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_matches_are_all_counted() {
        let (classifier, metrics, reactor) = classifier();
        let classifier = Arc::new(classifier);
        let words = ["wow", "amaze", "excite", "doge"];

        let mut tasks = JoinSet::new();
        for index in 0..1_000 {
            let classifier = Arc::clone(&classifier);
            let frame = message(&format!("such {} #{index}", words[index % words.len()]), &format!("{index}.0"));
            tasks.spawn(async move { classifier.classify(&frame).await });
        }
        while let Some(outcome) = tasks.join_next().await {
            assert_eq!(outcome.expect("task panicked"), ClassifyOutcome::Reacted(ReactionOutcome::Added));
        }

        assert_eq!(metrics.snapshot().matched, 1_000);
        assert_eq!(metrics.snapshot().regular, 1_000);
        assert_eq!(reactor.reactions().await.len(), 1_000);
    }
}
