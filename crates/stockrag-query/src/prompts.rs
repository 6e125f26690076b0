//! Prompt templates sent to the text generator.

const EXPANSION_TEMPLATE: &str = r#"You are helping expand a search query.

Generate alternative search queries that:
- Mean the same thing as the original query
- Use different wording or investor language
- Do NOT add new facts
- Do NOT speculate
- Do NOT mention prices or numbers

Original query:
"{query}"

Return 4 to 6 short search queries.
Each query should be on a new line."#;

const ANSWER_TEMPLATE: &str = r#"You are a financial assistant.

Answer the user's question using ONLY the information present
in the provided news summaries.

Rules:
- Do NOT add facts not present in the summaries.
- Do NOT speculate beyond what is stated.
- If information is incomplete or uncertain, say so clearly.
- Focus on recent performance and investor-relevant implications.
- Keep the answer concise and factual.

{context}

Final Answer:"#;

const HEADLINE_SUMMARY_TEMPLATE: &str = r#"You are a financial news analyst.

Summarize the news STRICTLY based on the headline below.
Do NOT add information not implied by the headline.
Do NOT speculate or invent details.
If details are unclear, state them cautiously.

Headline:
"{title}"

Publisher: {publisher}
Date: {date}

Write a concise 2-3 sentence summary focused on:
- What the news is about
- Why it may matter to investors"#;

/// Prompt asking for paraphrased search queries, one per line.
pub fn expansion_prompt(query: &str) -> String {
    EXPANSION_TEMPLATE.replace("{query}", query.trim())
}

/// Grounding context: the question followed by numbered summaries.
pub fn answer_context(question: &str, summaries: &[&str]) -> String {
    let mut context = format!("User Question:\n{}\n\nRecent News Summaries:\n", question.trim());
    for (i, summary) in summaries.iter().enumerate() {
        context.push_str(&format!("{}. {}\n", i + 1, summary));
    }
    context
}

/// Prompt asking for an answer grounded only in `context`.
pub fn answer_prompt(context: &str) -> String {
    ANSWER_TEMPLATE.replace("{context}", context.trim_end())
}

/// Prompt asking for a cautious summary written from a headline alone.
pub fn headline_summary_prompt(title: &str, publisher: &str, date: &str) -> String {
    HEADLINE_SUMMARY_TEMPLATE
        .replace("{title}", title.trim())
        .replace("{publisher}", publisher.trim())
        .replace("{date}", date.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_context_numbers_summaries() {
        let context = answer_context(" How is ACME doing? ", &["ACME rises.", "ACME gains."]);
        assert_eq!(
            context,
            "User Question:\nHow is ACME doing?\n\nRecent News Summaries:\n1. ACME rises.\n2. ACME gains.\n"
        );
    }

    #[test]
    fn test_prompts_embed_inputs() {
        let prompt = expansion_prompt("ACME outlook");
        assert!(prompt.contains("\"ACME outlook\""));
        assert!(prompt.contains("4 to 6"));

        let prompt = answer_prompt("User Question:\nq\n");
        assert!(prompt.contains("ONLY"));
        assert!(prompt.ends_with("User Question:\nq\n\nFinal Answer:"));

        let prompt = headline_summary_prompt("ACME jumps", "Wire", "2026-10-15 09:30:00");
        assert!(prompt.contains("\"ACME jumps\""));
        assert!(prompt.contains("Publisher: Wire"));
        assert!(prompt.contains("Date: 2026-10-15 09:30:00"));
    }
}
