use std::sync::Arc;

use anyhow::Result;
use futures::stream::{BoxStream, FuturesUnordered, StreamExt};
use tracing::info;
use uuid::Uuid;

use super::email::{self, Mailer};
use super::planner::{self, SearchPlan};
use super::search;
use super::writer;
use crate::providers::base::Provider;

/// Sequences the research pipeline for one query: plan, search, write,
/// send. Stages never overlap; concurrency exists only inside the search
/// stage.
pub struct ResearchManager {
    provider: Arc<dyn Provider>,
    mailer: Arc<Mailer>,
}

impl ResearchManager {
    pub fn new(provider: Arc<dyn Provider>, mailer: Arc<Mailer>) -> Self {
        Self { provider, mailer }
    }

    /// Run the pipeline, yielding one status event after each completed
    /// stage and a final event carrying the report markdown. A fatal error
    /// in any stage ends the stream; events already yielded stay with the
    /// observer.
    pub fn run(&self, query: &str) -> BoxStream<'_, Result<String>> {
        let query = query.to_string();

        Box::pin(async_stream::try_stream! {
            let run_id = Uuid::new_v4();
            info!(%run_id, query = %query, "starting research run");

            let plan = planner::plan(self.provider.as_ref(), &query).await?;
            yield "Searches planned, starting to search...".to_string();

            let summaries = self.perform_searches(&plan).await;
            yield "Searches complete, writing report...".to_string();

            let report = writer::write(self.provider.as_ref(), &query, &summaries).await?;
            yield "Report written, sending email...".to_string();

            email::send_report(self.provider.clone(), self.mailer.clone(), &report).await?;
            yield "Email sent, research complete".to_string();

            yield report.markdown_report;
        })
    }

    /// Launch every planned search at once and collect summaries as the
    /// units complete. Order among results carries no meaning. A failed
    /// unit contributes nothing; a plan whose units all fail simply yields
    /// an empty list.
    pub async fn perform_searches(&self, plan: &SearchPlan) -> Vec<String> {
        let total = plan.searches.len();
        let mut units: FuturesUnordered<_> = plan
            .searches
            .iter()
            .map(|item| search::search(self.provider.as_ref(), item))
            .collect();

        let mut completed = 0;
        let mut summaries = Vec::new();
        while let Some(result) = units.next().await {
            completed += 1;
            info!(completed, total, "search unit finished");
            if let Some(summary) = result {
                summaries.push(summary);
            }
        }

        info!(collected = summaries.len(), total, "finished searching");
        summaries
    }
}
