//! Query expansion through the text generator.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use stockrag_core::{StockRagError, TextGenerator};

use crate::prompts::expansion_prompt;

/// Lines of this many characters or fewer are discarded as fragments.
const MIN_QUERY_CHARS: usize = 10;

/// Ordered, case-insensitively distinct search queries, the original first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandedQuerySet {
    queries: Vec<String>,
}

impl ExpandedQuerySet {
    /// A set holding only the original query.
    pub fn original_only(query: &str) -> Self {
        Self {
            queries: vec![query.trim().to_string()],
        }
    }

    pub fn original(&self) -> &str {
        &self.queries[0]
    }

    pub fn queries(&self) -> &[String] {
        &self.queries
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    /// Never true: the original query is always present.
    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.queries.iter().map(String::as_str)
    }
}

/// Parse a generator response into an expanded query set.
///
/// Each line is stripped of surrounding bullet markers (`-`, `•`, `*`) and
/// whitespace; lines longer than ten characters are kept. The original query
/// goes first, duplicates are dropped case-insensitively (first occurrence
/// wins) and the set is capped at `max_queries` (at least one).
pub fn parse_expansion(original: &str, response: &str, max_queries: usize) -> ExpandedQuerySet {
    let mut set = ExpandedQuerySet::original_only(original);
    let max_queries = max_queries.max(1);
    let mut seen = vec![set.queries[0].to_lowercase()];

    let candidates = response
        .lines()
        .map(|line| line.trim_matches(|c: char| c == '-' || c == '•' || c == '*' || c.is_whitespace()))
        .filter(|line| line.chars().count() > MIN_QUERY_CHARS);

    for candidate in candidates {
        if set.queries.len() >= max_queries {
            break;
        }
        let key = candidate.to_lowercase();
        if !seen.contains(&key) {
            seen.push(key);
            set.queries.push(candidate.to_string());
        }
    }

    set
}

/// Asks the generator for paraphrases of a question.
///
/// Failures never propagate: a generator error, a timeout or an unusable
/// response all yield the original query alone.
pub struct QueryExpander {
    generator: Arc<dyn TextGenerator>,
    max_queries: usize,
    timeout: Duration,
}

impl QueryExpander {
    pub fn new(generator: Arc<dyn TextGenerator>, max_queries: usize, timeout: Duration) -> Self {
        Self {
            generator,
            max_queries: max_queries.max(1),
            timeout,
        }
    }

    pub async fn expand(&self, query: &str) -> ExpandedQuerySet {
        if self.max_queries == 1 {
            return ExpandedQuerySet::original_only(query);
        }

        let prompt = expansion_prompt(query);
        let reply = tokio::time::timeout(self.timeout, self.generator.generate(&prompt))
            .await
            .unwrap_or_else(|_| {
                Err(StockRagError::timeout("query expansion", self.timeout.as_millis() as u64))
            });

        let response = match reply {
            Ok(text) => text,
            Err(e) => {
                warn!("Query expansion failed, using original query: {}", e);
                return ExpandedQuerySet::original_only(query);
            }
        };

        let set = parse_expansion(query, &response, self.max_queries);
        if set.len() == 1 {
            warn!("Query expansion produced no usable queries");
        } else {
            debug!("Expanded into {} queries: {:?}", set.len(), set.queries());
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockrag_llm::ScriptedGenerator;

    #[test]
    fn test_parse_strips_bullets_and_short_lines() {
        let response = "- ACME share price movement\n• ACME stock trend recently\n* ok\n\n  *ACME investor sentiment*  \n";
        let set = parse_expansion("How is ACME doing?", response, 5);
        assert_eq!(
            set.queries(),
            &[
                "How is ACME doing?".to_string(),
                "ACME share price movement".to_string(),
                "ACME stock trend recently".to_string(),
                "ACME investor sentiment".to_string(),
            ]
        );
    }

    #[test]
    fn test_parse_dedups_case_insensitively_and_caps() {
        let response = "how is acme doing?\nACME recent performance\nacme RECENT performance\nACME market reaction\nACME trading momentum\nACME analyst views\nACME stock news";
        let set = parse_expansion("How is ACME doing?", response, 5);
        assert_eq!(set.len(), 5);
        assert_eq!(set.original(), "How is ACME doing?");
        assert_eq!(set.queries()[1], "ACME recent performance");
        assert_eq!(set.queries()[2], "ACME market reaction");

        let lowered: Vec<String> = set.iter().map(str::to_lowercase).collect();
        for (i, q) in lowered.iter().enumerate() {
            assert!(!lowered[i + 1..].contains(q));
        }
    }

    #[test]
    fn test_parse_garbage_yields_original() {
        let set = parse_expansion("ACME?", "\n- \n***\nshort\n", 5);
        assert_eq!(set, ExpandedQuerySet::original_only("ACME?"));
        assert!(!set.is_empty());
    }

    #[test]
    fn test_parse_zero_cap_keeps_original() {
        let set = parse_expansion("ACME?", "ACME recent performance", 0);
        assert_eq!(set.len(), 1);
    }

    #[tokio::test]
    async fn test_expand_uses_generator() {
        let generator = Arc::new(
            ScriptedGenerator::new().with_reply("1) junk\nACME quarterly results\nACME guidance update"),
        );
        let expander = QueryExpander::new(generator.clone(), 5, Duration::from_secs(1));

        let set = expander.expand("ACME outlook").await;
        assert_eq!(set.original(), "ACME outlook");
        assert_eq!(set.len(), 3);
        assert!(generator.prompts()[0].contains("\"ACME outlook\""));
    }

    #[tokio::test]
    async fn test_expand_degrades_on_error() {
        let generator = Arc::new(ScriptedGenerator::new().with_error("503"));
        let expander = QueryExpander::new(generator, 5, Duration::from_secs(1));
        let set = expander.expand("ACME outlook").await;
        assert_eq!(set, ExpandedQuerySet::original_only("ACME outlook"));
    }

    #[tokio::test]
    async fn test_expand_degrades_on_timeout() {
        let generator = Arc::new(
            ScriptedGenerator::new()
                .with_reply("ACME quarterly results")
                .with_delay(Duration::from_millis(200)),
        );
        let expander = QueryExpander::new(generator, 5, Duration::from_millis(10));
        let set = expander.expand("ACME outlook").await;
        assert_eq!(set.len(), 1);
    }
}
