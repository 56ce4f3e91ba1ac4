use tracing::warn;

use super::planner::SearchItem;
use crate::models::message::Message;
use crate::providers::base::Provider;

const INSTRUCTIONS: &str =
    "You are a research assistant. Given a search term, you search the web for that term and \
     produce a concise summary of the results. The summary must 2-3 paragraphs and less than 300 \
     words. Capture the main points. Write succinctly, no need to have complete sentences or good \
     grammar. This will be consumed by someone synthesizing a report, so its vital you capture the \
     essence and ignore any fluff. Do not include any additional commentary other than the summary \
     itself.";

/// Execute a single search and summarize the results. Failures are
/// swallowed: a unit that errors contributes no summary and must never
/// abort its siblings.
pub async fn search(provider: &dyn Provider, item: &SearchItem) -> Option<String> {
    let input = format!(
        "Search term: {}\nReason for searching: {}",
        item.query, item.reason
    );
    let messages = vec![Message::user().with_text(input)];

    match provider.complete(INSTRUCTIONS, &messages, &[]).await {
        Ok((message, _usage)) => Some(message.text()),
        Err(e) => {
            warn!(error = %e, query = %item.query, "search unit failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::mock::MockProvider;

    #[tokio::test]
    async fn test_search_returns_summary_text() {
        let provider =
            MockProvider::new(vec![Message::assistant().with_text("a concise summary")]);
        let item = SearchItem {
            reason: "background".to_string(),
            query: "rust futures".to_string(),
        };

        let result = search(&provider, &item).await;
        assert_eq!(result, Some("a concise summary".to_string()));
    }
}
