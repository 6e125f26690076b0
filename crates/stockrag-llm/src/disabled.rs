use async_trait::async_trait;

use stockrag_core::{Result, StockRagError, TextGenerator};

/// Generator that refuses every request.
pub struct DisabledGenerator {
    reason: String,
}

impl DisabledGenerator {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl TextGenerator for DisabledGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        Err(StockRagError::generation(format!(
            "text generation disabled: {}",
            self.reason
        )))
    }

    fn name(&self) -> &str {
        "disabled"
    }
}
