use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::models::message::Message;
use crate::providers::base::{OutputSchema, Provider};

/// Number of searches to plan for each query
pub const HOW_MANY_SEARCHES: usize = 5;

/// A single search to perform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchItem {
    /// Why this search is important to the query
    pub reason: String,
    /// The term to search the web for
    pub query: String,
}

/// A complete search strategy for a research query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPlan {
    pub searches: Vec<SearchItem>,
}

fn instructions() -> String {
    format!(
        "You are a helpful research assistant. Given a query, come up with a set of web \
         searches to perform to best answer the query. Output {} terms to query for.",
        HOW_MANY_SEARCHES
    )
}

fn schema() -> OutputSchema {
    OutputSchema::new(
        "web_search_plan",
        json!({
            "type": "object",
            "properties": {
                "searches": {
                    "type": "array",
                    "description": "A list of web searches to perform to best answer the query.",
                    "items": {
                        "type": "object",
                        "properties": {
                            "reason": {
                                "type": "string",
                                "description": "Your reasoning for why this search is important to the query."
                            },
                            "query": {
                                "type": "string",
                                "description": "The search term to use for the web search."
                            }
                        },
                        "required": ["reason", "query"],
                        "additionalProperties": false
                    }
                }
            },
            "required": ["searches"],
            "additionalProperties": false
        }),
    )
}

/// Ask the model to decompose the query into independent search tasks.
/// An output that does not match the plan shape is fatal for the run.
pub async fn plan(provider: &dyn Provider, query: &str) -> Result<SearchPlan> {
    let messages = vec![Message::user().with_text(format!("Query: {}", query))];

    let (value, _usage) = provider
        .complete_structured(&instructions(), &messages, &schema())
        .await?;

    let plan: SearchPlan =
        serde_json::from_value(value).context("planner output did not match the search plan shape")?;

    info!(searches = plan.searches.len(), "search plan ready");
    Ok(plan)
}
