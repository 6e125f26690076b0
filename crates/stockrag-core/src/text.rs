//! Line-oriented document text helpers.
//!
//! Stored documents look like:
//!
//! ```text
//! Asset: ACME
//! Title: ACME shares jump after earnings beat
//! Summary: ACME gains 4% as revenue growth surprises analysts.
//! ```
//!
//! Only the `Summary:` line feeds sentiment scoring and evidence.

const SUMMARY_PREFIX: &str = "Summary:";
const TITLE_PREFIX: &str = "Title:";
const ASSET_PREFIX: &str = "Asset:";

/// Return the trimmed text of the first `Summary:` line.
///
/// `None` when the line is missing or carries no text.
pub fn extract_summary(text: &str) -> Option<&str> {
    extract_field(text, SUMMARY_PREFIX)
}

/// Return the trimmed text of the first `Title:` line.
pub fn extract_title(text: &str) -> Option<&str> {
    extract_field(text, TITLE_PREFIX)
}

/// Render the canonical text of a news document.
pub fn render_news_text(symbol: &str, title: &str, summary: &str) -> String {
    format!(
        "{ASSET_PREFIX} {symbol}\n{TITLE_PREFIX} {}\n{SUMMARY_PREFIX} {}",
        title.trim(),
        summary.trim()
    )
    .trim()
    .to_string()
}

fn extract_field<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    text.lines()
        .find_map(|line| line.strip_prefix(prefix))
        .map(str::trim)
        .filter(|value| !value.is_empty())
}
