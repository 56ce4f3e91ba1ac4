use std::env;
use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use dotenv::dotenv;
use futures::TryStreamExt;
use tracing_subscriber::EnvFilter;

use emissary::notify::Notifier;
use emissary::persona::Persona;
use emissary::providers::base::Provider;
use emissary::providers::configs::{OllamaProviderConfig, OpenAiProviderConfig, ProviderConfig};
use emissary::providers::factory::get_provider;
use emissary::providers::ollama::OLLAMA_HOST;
use emissary::providers::openai::OPENAI_HOST;
use emissary::research::email::Mailer;
use emissary::research::ResearchManager;

mod session;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Provider option (openai or ollama)
    #[arg(short, long, default_value = "open-ai")]
    #[arg(value_enum)]
    provider: ProviderVariant,

    /// OpenAI API Key (can also be set via OPENAI_API_KEY environment variable)
    #[arg(long)]
    api_key: Option<String>,

    /// Model to use
    #[arg(short, long, default_value = "gpt-4o-mini")]
    model: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum ProviderVariant {
    OpenAi,
    Ollama,
}

#[derive(Subcommand)]
enum Command {
    /// Chat with the persona agent
    Chat {
        /// Name the persona answers as
        #[arg(long)]
        name: String,

        /// Text file with the persona's background summary
        #[arg(long, default_value = "me/summary.txt")]
        summary_file: String,

        /// Text file with the persona's profile document
        #[arg(long, default_value = "me/profile.txt")]
        profile_file: String,
    },
    /// Run the deep research pipeline for a query
    Research {
        /// The topic to research
        query: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("emissary=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let provider = build_provider(&cli)?;

    match &cli.command {
        Command::Chat {
            name,
            summary_file,
            profile_file,
        } => {
            // Unreadable persona documents fold in as empty sections
            let summary = fs::read_to_string(summary_file).unwrap_or_default();
            let profile = fs::read_to_string(profile_file).unwrap_or_default();
            let persona = Persona::new(name.as_str(), summary, profile);
            let agent = persona.into_agent(provider, Arc::new(Notifier::from_env()))?;
            session::run(agent).await
        }
        Command::Research { query } => run_research(provider, query).await,
    }
}

fn build_provider(cli: &Cli) -> Result<Arc<dyn Provider>> {
    let config = match cli.provider {
        ProviderVariant::OpenAi => {
            let api_key = cli
                .api_key
                .clone()
                .or_else(|| env::var("OPENAI_API_KEY").ok())
                .context(
                    "API key must be provided via --api-key or OPENAI_API_KEY environment variable",
                )?;

            ProviderConfig::OpenAi(OpenAiProviderConfig {
                host: OPENAI_HOST.to_string(),
                api_key,
                model: cli.model.clone(),
                temperature: None,
                max_tokens: None,
            })
        }
        ProviderVariant::Ollama => ProviderConfig::Ollama(OllamaProviderConfig {
            host: env::var("OLLAMA_HOST").unwrap_or_else(|_| OLLAMA_HOST.to_string()),
            model: cli.model.clone(),
        }),
    };

    get_provider(config)
}

async fn run_research(provider: Arc<dyn Provider>, query: &str) -> Result<()> {
    let manager = ResearchManager::new(provider, Arc::new(Mailer::from_env()));
    let mut stream = manager.run(query);

    // Every event but the last is a status line; the last is the report
    let mut last: Option<String> = None;
    while let Some(event) = stream.try_next().await? {
        if let Some(status) = last.replace(event) {
            println!("{}", style(status).dim());
        }
    }

    if let Some(report) = last {
        session::render_markdown(&report).await;
    }
    Ok(())
}
