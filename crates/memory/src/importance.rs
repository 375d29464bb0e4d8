//! Importance assessment for new observations.
//!
//! The generator is asked for a bare 1–10 rating. Its reply is parsed for the
//! first integer; anything unusable (no backend, error, timeout, no number)
//! degrades to a neutral default instead of failing the insert.

use std::sync::Arc;
use std::time::Duration;

use glimpse_core::generation::{ContextBundle, TextGenerator};
use glimpse_core::memory::clamp_importance;
use tracing::{debug, warn};

/// Rating used whenever assessment cannot produce one.
pub const DEFAULT_IMPORTANCE: u8 = 5;

const ASSESS_INSTRUCTION: &str = "You rate how important an observation of a user's \
computer session is for remembering what they are working on. Reply with a single \
integer from 1 (irrelevant noise) to 10 (critical), and nothing else.";

/// First integer token in `reply`, with an optional leading minus sign.
///
/// `"Rating: 7/10"` parses as `7`, `"-3"` as `-3`, `"high"` as `None`.
pub fn parse_importance(reply: &str) -> Option<i64> {
    let bytes = reply.as_bytes();
    let start = bytes.iter().position(u8::is_ascii_digit)?;
    let end = bytes[start..]
        .iter()
        .position(|b| !b.is_ascii_digit())
        .map_or(bytes.len(), |len| start + len);
    let negative = start > 0 && bytes[start - 1] == b'-';

    // Saturate absurdly long digit runs; they clamp to the top anyway.
    let magnitude = reply[start..end].parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -magnitude } else { magnitude })
}

/// Maps an observation to an importance in `[1, 10]`.
pub struct ImportanceAssessor {
    generator: Arc<dyn TextGenerator>,
    timeout: Duration,
    default_importance: u8,
}

impl ImportanceAssessor {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            timeout: Duration::from_secs(30),
            default_importance: DEFAULT_IMPORTANCE,
        }
    }

    /// Bound each assessment call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the fallback rating (clamped into range).
    pub fn with_default(mut self, importance: u8) -> Self {
        self.default_importance = clamp_importance(importance as i64);
        self
    }

    /// Rate `content`. Never fails.
    pub async fn assess(&self, content: &str) -> u8 {
        let bundle = ContextBundle::prompt(format!("Observation:\n{content}\n\nRating:"))
            .with_system(ASSESS_INSTRUCTION);

        let reply = match tokio::time::timeout(self.timeout, self.generator.generate_text(bundle))
            .await
        {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) if e.is_unavailable() => {
                debug!(error = %e, "Importance assessor unavailable, using default");
                return self.default_importance;
            }
            Ok(Err(e)) => {
                warn!(generator = %self.generator.name(), error = %e, "Importance assessment failed");
                return self.default_importance;
            }
            Err(_) => {
                warn!(
                    generator = %self.generator.name(),
                    timeout_secs = self.timeout.as_secs(),
                    "Importance assessment timed out"
                );
                return self.default_importance;
            }
        };

        match parse_importance(&reply) {
            Some(raw) => clamp_importance(raw),
            None => {
                debug!(reply = %reply, "Unparseable importance rating, using default");
                self.default_importance
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use glimpse_core::error::GenerationError;

    struct Reply(Result<String, GenerationError>);

    #[async_trait]
    impl TextGenerator for Reply {
        fn name(&self) -> &str {
            "reply"
        }

        async fn generate_text(&self, _bundle: ContextBundle) -> Result<String, GenerationError> {
            self.0.clone()
        }
    }

    struct Stalled;

    #[async_trait]
    impl TextGenerator for Stalled {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn generate_text(&self, _bundle: ContextBundle) -> Result<String, GenerationError> {
            std::future::pending().await
        }
    }

    async fn rate(reply: Result<&str, GenerationError>) -> u8 {
        let generator = Arc::new(Reply(reply.map(str::to_string)));
        ImportanceAssessor::new(generator).assess("opened a terminal").await
    }

    #[test]
    fn parser_takes_first_integer() {
        assert_eq!(parse_importance("7"), Some(7));
        assert_eq!(parse_importance("  8.\n"), Some(8));
        assert_eq!(parse_importance("Rating: 6/10"), Some(6));
        assert_eq!(parse_importance("-3"), Some(-3));
        assert_eq!(parse_importance("about 42 or 9"), Some(42));
        assert_eq!(parse_importance("very important"), None);
        assert_eq!(parse_importance(""), None);
    }

    #[test]
    fn parser_saturates_huge_numbers() {
        assert_eq!(parse_importance("99999999999999999999999"), Some(i64::MAX));
    }

    #[tokio::test]
    async fn numeric_reply_is_used() {
        assert_eq!(rate(Ok("9")).await, 9);
    }

    #[tokio::test]
    async fn out_of_range_replies_are_clamped() {
        assert_eq!(rate(Ok("15")).await, 10);
        assert_eq!(rate(Ok("0")).await, 1);
        assert_eq!(rate(Ok("-4")).await, 1);
        assert_eq!(rate(Ok("99999999999999999999999")).await, 10);
    }

    #[tokio::test]
    async fn non_numeric_reply_defaults() {
        assert_eq!(rate(Ok("quite important")).await, DEFAULT_IMPORTANCE);
    }

    #[tokio::test]
    async fn failures_default() {
        assert_eq!(
            rate(Err(GenerationError::Network("reset".into()))).await,
            DEFAULT_IMPORTANCE
        );
        assert_eq!(
            rate(Err(GenerationError::NotConfigured("no key".into()))).await,
            DEFAULT_IMPORTANCE
        );
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_defaults() {
        let assessor =
            ImportanceAssessor::new(Arc::new(Stalled)).with_timeout(Duration::from_secs(2));
        assert_eq!(assessor.assess("anything").await, DEFAULT_IMPORTANCE);
    }

    #[tokio::test]
    async fn custom_default_is_clamped() {
        let generator = Arc::new(Reply(Ok("n/a".into())));
        let assessor = ImportanceAssessor::new(generator).with_default(0);
        assert_eq!(assessor.assess("x").await, 1);
    }
}
