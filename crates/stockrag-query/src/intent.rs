//! Rule-based question intent classification.

use serde::{Deserialize, Serialize};

use stockrag_core::IntentConfig;

/// What a question is asking about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    /// Recent price action ("how is X performing today").
    Performance,
    /// Drivers of a move ("why did X fall").
    Cause,
    /// Forward-looking questions.
    Outlook,
    General,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Performance => "performance",
            Self::Cause => "cause",
            Self::Outlook => "outlook",
            Self::General => "general",
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keyword classifier. Keyword sets are checked in the order performance,
/// cause, outlook; the first set with a substring hit wins.
#[derive(Debug, Clone)]
pub struct IntentClassifier {
    performance: Vec<String>,
    cause: Vec<String>,
    outlook: Vec<String>,
}

impl IntentClassifier {
    pub fn new(config: &IntentConfig) -> Self {
        let lower = |terms: &[String]| terms.iter().map(|t| t.to_lowercase()).collect();
        Self {
            performance: lower(&config.performance),
            cause: lower(&config.cause),
            outlook: lower(&config.outlook),
        }
    }

    pub fn classify(&self, query: &str) -> Intent {
        let query = query.to_lowercase();
        let hit = |terms: &[String]| terms.iter().any(|t| !t.is_empty() && query.contains(t.as_str()));

        if hit(&self.performance) {
            Intent::Performance
        } else if hit(&self.cause) {
            Intent::Cause
        } else if hit(&self.outlook) {
            Intent::Outlook
        } else {
            Intent::General
        }
    }
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new(&IntentConfig::default())
    }
}
