//! Grounded answer synthesis.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use stockrag_core::{StockRagError, TextGenerator};

use crate::prompts::{answer_context, answer_prompt};

const FALLBACK_HEADER: &str =
    "Automated answer synthesis is unavailable. The most relevant recent news summaries are:";

/// Summaries listed by the extractive fallback.
const FALLBACK_SUMMARIES: usize = 3;

/// Writes the answer from the question and the fused summaries only.
pub struct AnswerSynthesizer {
    generator: Arc<dyn TextGenerator>,
    timeout: Duration,
}

impl AnswerSynthesizer {
    pub fn new(generator: Arc<dyn TextGenerator>, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    /// Generate the answer text.
    ///
    /// A generator error, a timeout or a blank reply yields the extractive
    /// answer instead.
    pub async fn synthesize(&self, question: &str, summaries: &[&str]) -> String {
        let prompt = answer_prompt(&answer_context(question, summaries));

        let reply = tokio::time::timeout(self.timeout, self.generator.generate(&prompt))
            .await
            .unwrap_or_else(|_| {
                Err(StockRagError::timeout("answer generation", self.timeout.as_millis() as u64))
            });

        match reply {
            Ok(text) if !text.trim().is_empty() => {
                debug!("Synthesized answer with {}", self.generator.name());
                text.trim().to_string()
            }
            Ok(_) => {
                warn!("Answer generation returned no text, using extractive answer");
                extractive_answer(summaries)
            }
            Err(e) => {
                warn!("Answer generation failed, using extractive answer: {}", e);
                extractive_answer(summaries)
            }
        }
    }
}

/// Answer made of the leading distinct summaries, verbatim.
pub fn extractive_answer(summaries: &[&str]) -> String {
    let mut answer = FALLBACK_HEADER.to_string();
    let mut listed: Vec<&str> = Vec::new();
    for summary in summaries {
        if listed.len() == FALLBACK_SUMMARIES {
            break;
        }
        if !listed.contains(summary) {
            listed.push(summary);
            answer.push_str("\n- ");
            answer.push_str(summary);
        }
    }
    answer
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockrag_llm::ScriptedGenerator;

    #[tokio::test]
    async fn test_synthesize_returns_trimmed_reply() {
        let generator = Arc::new(ScriptedGenerator::new().with_reply("\n ACME rose on earnings. \n"));
        let synth = AnswerSynthesizer::new(generator.clone(), Duration::from_secs(1));

        let answer = synth
            .synthesize("How is ACME doing?", &["ACME rises.", "ACME gains."])
            .await;
        assert_eq!(answer, "ACME rose on earnings.");

        let prompt = &generator.prompts()[0];
        assert!(prompt.contains("User Question:\nHow is ACME doing?"));
        assert!(prompt.contains("1. ACME rises.\n2. ACME gains."));
    }

    #[tokio::test]
    async fn test_synthesize_falls_back_on_failure() {
        let generator = Arc::new(ScriptedGenerator::new().with_error("503").with_reply("   "));
        let synth = AnswerSynthesizer::new(generator, Duration::from_secs(1));

        for _ in 0..2 {
            let answer = synth.synthesize("q", &["ACME rises."]).await;
            assert!(answer.starts_with(FALLBACK_HEADER));
            assert!(answer.contains("- ACME rises."));
        }
    }

    #[tokio::test]
    async fn test_synthesize_falls_back_on_timeout() {
        let generator = Arc::new(
            ScriptedGenerator::new()
                .with_reply("late")
                .with_delay(Duration::from_millis(200)),
        );
        let synth = AnswerSynthesizer::new(generator, Duration::from_millis(10));
        let answer = synth.synthesize("q", &["ACME rises."]).await;
        assert!(answer.starts_with(FALLBACK_HEADER));
    }

    #[test]
    fn test_extractive_answer_lists_distinct_leading_summaries() {
        let answer = extractive_answer(&["a", "a", "b", "c", "d"]);
        assert_eq!(answer, format!("{}\n- a\n- b\n- c", FALLBACK_HEADER));
    }
}
