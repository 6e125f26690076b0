//! Deterministic generator for tests and offline runs.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use stockrag_core::{Result, StockRagError, TextGenerator};

enum Reply {
    Text(String),
    Error(String),
}

/// Replays queued replies in order and records every prompt it receives.
///
/// Once the queue is drained every call fails with a generation error.
#[derive(Default)]
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Reply>>,
    prompts: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply.
    pub fn with_reply(self, text: impl Into<String>) -> Self {
        self.push(Reply::Text(text.into()));
        self
    }

    /// Queue a failure.
    pub fn with_error(self, message: impl Into<String>) -> Self {
        self.push(Reply::Error(message.into()));
        self
    }

    /// Sleep before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    fn push(&self, reply: Reply) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let reply = self
            .replies
            .lock()
            .map_err(|e| StockRagError::internal(e.to_string()))?
            .pop_front();

        match reply {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Error(message)) => Err(StockRagError::generation(message)),
            None => Err(StockRagError::generation("no scripted reply left")),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replies_in_order_then_fails() {
        let generator = ScriptedGenerator::new()
            .with_reply("first")
            .with_error("upstream 503");

        assert_eq!(generator.generate("a").await.unwrap(), "first");
        assert_eq!(
            generator.generate("b").await.unwrap_err().error_code(),
            "GENERATION_ERROR"
        );
        assert!(generator.generate("c").await.is_err());
        assert_eq!(generator.prompts(), vec!["a", "b", "c"]);
    }
}
