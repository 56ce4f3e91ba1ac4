use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::models::message::Message;
use crate::providers::base::{OutputSchema, Provider};

const INSTRUCTIONS: &str =
    "You are a senior researcher tasked with writing a cohesive report for a research query. \
     You will be provided with the original query, and some initial research done by a research \
     assistant.\nYou should first come up with an outline for the report that describes the \
     structure and flow of the report. Then, generate the report and return that as your final \
     output.\nThe final output should be in markdown format, and it should be lengthy and \
     detailed. Aim for 5-10 pages of content, at least 1000 words.";

/// The complete research report. Immutable once produced; the email stage
/// only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// A short 2-3 sentence summary of the findings
    pub short_summary: String,
    /// The final report in markdown format
    pub markdown_report: String,
    /// Suggested topics to research further
    pub follow_up_questions: Vec<String>,
}

fn schema() -> OutputSchema {
    OutputSchema::new(
        "report_data",
        json!({
            "type": "object",
            "properties": {
                "short_summary": {
                    "type": "string",
                    "description": "A short 2-3 sentence summary of the findings."
                },
                "markdown_report": {
                    "type": "string",
                    "description": "The final report in markdown format"
                },
                "follow_up_questions": {
                    "type": "array",
                    "description": "Suggested topics to research further",
                    "items": {"type": "string"}
                }
            },
            "required": ["short_summary", "markdown_report", "follow_up_questions"],
            "additionalProperties": false
        }),
    )
}

/// Fold the collected search summaries into one structured report.
/// An output that does not match the report shape is fatal for the run.
pub async fn write(provider: &dyn Provider, query: &str, summaries: &[String]) -> Result<Report> {
    let input = format!(
        "Original query: {}\nSummarized search results: {:?}",
        query, summaries
    );
    let messages = vec![Message::user().with_text(input)];

    let (value, _usage) = provider
        .complete_structured(INSTRUCTIONS, &messages, &schema())
        .await?;

    let report: Report =
        serde_json::from_value(value).context("writer output did not match the report shape")?;

    info!(
        follow_ups = report.follow_up_questions.len(),
        "report written"
    );
    Ok(report)
}
