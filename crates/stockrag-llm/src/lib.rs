//! stockrag-llm - text generation clients
//!
//! Implementations of [`TextGenerator`]:
//!
//! - [`OpenAiGenerator`]: OpenAI-compatible chat completions (Groq by default)
//! - [`DisabledGenerator`]: always fails, used when no API key is configured
//! - [`ScriptedGenerator`]: replays queued replies and records prompts

mod disabled;
mod openai;
mod scripted;

use std::sync::Arc;

use tracing::warn;

pub use disabled::DisabledGenerator;
pub use openai::OpenAiGenerator;
pub use scripted::ScriptedGenerator;

// Re-export the TextGenerator trait for convenience
pub use stockrag_core::TextGenerator;

use stockrag_core::LlmConfig;

/// Build the generator for a configuration.
///
/// Without an API key in the configured environment variable every
/// generation fails, and callers fall back to their degraded paths.
pub fn build_generator(config: &LlmConfig) -> Arc<dyn TextGenerator> {
    let Some(api_key) = config.api_key() else {
        warn!(
            "{} is not set; query expansion and answer synthesis are disabled",
            config.api_key_env
        );
        return Arc::new(DisabledGenerator::new(format!(
            "{} is not set",
            config.api_key_env
        )));
    };

    match OpenAiGenerator::new(config, &api_key) {
        Ok(generator) => Arc::new(generator),
        Err(e) => {
            warn!("Text generation unavailable: {}", e);
            Arc::new(DisabledGenerator::new(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_key_builds_disabled_generator() {
        let config = LlmConfig {
            api_key_env: "STOCKRAG_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..LlmConfig::default()
        };
        let generator = build_generator(&config);
        assert_eq!(generator.name(), "disabled");
        let err = generator.generate("hello").await.unwrap_err();
        assert_eq!(err.error_code(), "GENERATION_ERROR");
    }
}
