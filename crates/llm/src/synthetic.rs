use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::error::{RequestFailedSnafu, SourceError, SourceResult};
use super::source::{ChunkSink, ChunkSource, SourceWorker};

pub const DEFAULT_CANNED_REPLY: &str = "I don't know";
pub const DEFAULT_FAILURE_PROBABILITY: f64 = 0.5;
pub const REQUEST_FAILED_MESSAGE: &str = "the assistant failed to respond";

/// Uniform draws in `[0, 1)` deciding whether a simulated request fails.
pub trait FailureRoll: Send {
    fn roll(&mut self) -> f64;
}

pub struct RandomRoll {
    rng: StdRng,
}

impl RandomRoll {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl FailureRoll for RandomRoll {
    fn roll(&mut self) -> f64 {
        self.rng.r#gen::<f64>()
    }
}

/// Always draws the same value. `FixedRoll(1.0)` never fails, `FixedRoll(0.0)`
/// fails for any non-zero probability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedRoll(pub f64);

impl FailureRoll for FixedRoll {
    fn roll(&mut self) -> f64 {
        self.0
    }
}

/// Streams a fixed text one whitespace-delimited word per tick.
///
/// Each fragment keeps a trailing space, so the concatenation of every
/// fragment is the words joined by single spaces plus one trailing space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordStreamSource {
    text: String,
    interval: Duration,
}

impl WordStreamSource {
    pub fn new(text: impl Into<String>, interval: Duration) -> Self {
        Self {
            text: text.into(),
            interval,
        }
    }

    pub fn fragments(&self) -> Vec<String> {
        self.text
            .split_whitespace()
            .map(|word| format!("{word} "))
            .collect()
    }
}

impl ChunkSource for WordStreamSource {
    fn start(self, mut sink: ChunkSink) -> SourceWorker {
        async move {
            for fragment in self.fragments() {
                tokio::time::sleep(self.interval).await;
                if !sink.chunk(fragment) {
                    tracing::debug!(
                        source_id = %sink.source_id(),
                        state = ?sink.state(),
                        emitted = sink.emitted(),
                        "every consumer detached; ending word stream early"
                    );
                    break;
                }
            }
            sink.complete();
        }
        .boxed()
    }
}

/// Emits a fixed list of fragments, then completes or fails as scripted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedSource {
    fragments: Vec<String>,
    interval: Duration,
    failure: Option<SourceError>,
}

impl ScriptedSource {
    pub fn completing<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fragments: fragments.into_iter().map(Into::into).collect(),
            interval: Duration::ZERO,
            failure: None,
        }
    }

    pub fn failing<I, S>(fragments: I, error: SourceError) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            failure: Some(error),
            ..Self::completing(fragments)
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

impl ChunkSource for ScriptedSource {
    fn start(self, mut sink: ChunkSink) -> SourceWorker {
        async move {
            for fragment in self.fragments {
                if !self.interval.is_zero() {
                    tokio::time::sleep(self.interval).await;
                }
                sink.chunk(fragment);
            }

            match self.failure {
                Some(error) => sink.fail(error),
                None => sink.complete(),
            }
        }
        .boxed()
    }
}

/// Non-streaming backend: one full reply after a fixed delay, or a failure.
#[derive(Debug, Clone, PartialEq)]
pub struct DelayedReplySource {
    delay: Duration,
    canned_reply: String,
    failure_probability: f64,
}

impl DelayedReplySource {
    pub fn new(delay: Duration, canned_reply: impl Into<String>, failure_probability: f64) -> Self {
        Self {
            delay,
            canned_reply: canned_reply.into(),
            failure_probability: clamp_probability(failure_probability),
        }
    }

    /// Draws the outcome now and delivers it once the delay has elapsed.
    pub fn respond(&self, roll: &mut dyn FailureRoll) -> BoxFuture<'static, SourceResult<String>> {
        let drawn = roll.roll();
        let fails = drawn < self.failure_probability;
        let delay = self.delay;
        let reply = self.canned_reply.clone();

        tracing::debug!(
            drawn,
            failure_probability = self.failure_probability,
            fails,
            delay = ?delay,
            "simulated reply scheduled"
        );

        async move {
            tokio::time::sleep(delay).await;
            if fails {
                return RequestFailedSnafu {
                    stage: "delayed-reply",
                    message: REQUEST_FAILED_MESSAGE,
                }
                .fail();
            }
            Ok(reply)
        }
        .boxed()
    }
}

impl Default for DelayedReplySource {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(1_500),
            DEFAULT_CANNED_REPLY,
            DEFAULT_FAILURE_PROBABILITY,
        )
    }
}

pub fn clamp_probability(probability: f64) -> f64 {
    if probability.is_nan() {
        return DEFAULT_FAILURE_PROBABILITY;
    }
    probability.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc;

    use super::*;
    use crate::ids::SourceId;
    use crate::source::ChunkEvent;

    struct CountingRoll {
        value: f64,
        calls: usize,
    }

    impl FailureRoll for CountingRoll {
        fn roll(&mut self) -> f64 {
            self.calls += 1;
            self.value
        }
    }

    #[test]
    fn word_fragments_keep_trailing_spaces() {
        let source = WordStreamSource::new("  hello   streaming\nworld ", Duration::ZERO);

        assert_eq!(
            source.fragments(),
            vec!["hello ", "streaming ", "world "]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn word_stream_emits_one_fragment_per_tick() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = ChunkSink::new(SourceId::new_v7(), vec![tx]);
        let source = WordStreamSource::new("a b", Duration::from_millis(100));
        let worker = tokio::spawn(source.start(sink));

        let start = tokio::time::Instant::now();
        assert_eq!(rx.recv().await, Some(ChunkEvent::Fragment("a ".to_string())));
        assert!(start.elapsed() >= Duration::from_millis(100));
        assert!(start.elapsed() < Duration::from_millis(200));
        assert_eq!(rx.recv().await, Some(ChunkEvent::Fragment("b ".to_string())));
        assert!(start.elapsed() >= Duration::from_millis(200));
        assert_eq!(rx.recv().await, Some(ChunkEvent::Completed));
        assert_eq!(rx.recv().await, None);

        worker.await.expect("worker finishes");
    }

    #[tokio::test]
    async fn scripted_failure_follows_its_fragments() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let error = SourceError::StreamFailed {
            stage: "test",
            message: "boom".to_string(),
        };
        let source = ScriptedSource::failing(["x "], error.clone());
        source
            .start(ChunkSink::new(SourceId::new_v7(), vec![tx]))
            .await;

        assert_eq!(rx.recv().await, Some(ChunkEvent::Fragment("x ".to_string())));
        assert_eq!(rx.recv().await, Some(ChunkEvent::Failed(error)));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_reply_resolves_after_the_delay() {
        let source = DelayedReplySource::new(Duration::from_secs(2), "I don't know", 0.5);
        let mut roll = FixedRoll(0.9);

        let start = tokio::time::Instant::now();
        let reply = source.respond(&mut roll).await;

        assert_eq!(reply, Ok("I don't know".to_string()));
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn low_roll_fails_with_a_descriptive_error() {
        let source = DelayedReplySource::new(Duration::from_millis(10), "unused", 0.5);
        let mut roll = CountingRoll {
            value: 0.1,
            calls: 0,
        };

        let error = source
            .respond(&mut roll)
            .await
            .expect_err("roll below probability fails");

        assert_eq!(error.user_message(), REQUEST_FAILED_MESSAGE);
        assert_eq!(roll.calls, 1);
    }

    #[test]
    fn probability_is_clamped() {
        assert_eq!(clamp_probability(-0.3), 0.0);
        assert_eq!(clamp_probability(7.0), 1.0);
        assert_eq!(clamp_probability(f64::NAN), DEFAULT_FAILURE_PROBABILITY);
        assert_eq!(
            DelayedReplySource::new(Duration::ZERO, "x", 2.0),
            DelayedReplySource::new(Duration::ZERO, "x", 1.0)
        );
    }

    #[test]
    fn seeded_rolls_are_reproducible_and_in_range() {
        let mut first = RandomRoll::seeded(7);
        let mut second = RandomRoll::seeded(7);

        for _ in 0..32 {
            let value = first.roll();
            assert!((0.0..1.0).contains(&value));
            assert_eq!(value, second.roll());
        }
    }
}
