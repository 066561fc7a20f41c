use askpg::{Config, QueryAgent};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "askpg=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!(provider = %config.llm.provider, model = %config.llm.model, "Configuration loaded");

    // Connect to database
    let pool = askpg::db::create_pool(&config.database).await?;
    info!("Database connection established");

    let agent = QueryAgent::from_config(pool, &config)?;

    info!("Starting askpg CLI");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("\nEnter your question (or 'quit' to exit): ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break; // stdin closed
        };

        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question.to_lowercase().as_str(), "quit" | "exit" | "q") {
            break;
        }

        println!("\nProcessing your question...");
        let response = agent.query_database(question).await;
        println!("\nResponse: {}", response);
    }

    Ok(())
}
