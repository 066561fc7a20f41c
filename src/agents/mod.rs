//! Agent System
//!
//! This module contains the steps that turn a plain-language question into a
//! database-backed answer:
//!
//! - **Planner**: formulates the initial SQL from the question and schema
//! - **Evaluator**: decides whether more data is needed and supplies follow-up SQL
//! - **Formatter**: renders accumulated rows into a human-readable answer
//!
//! ## Pipeline Overview
//!
//! ```text
//! Question
//!     │
//!     ▼
//! ┌──────────┐
//! │ Planner  │  → initial SQL, executed once
//! └──────────┘
//!     │
//!     ▼
//! ┌──────────┐
//! │Evaluator │  → follow-up SQL or COMPLETE
//! └──────────┘  (repeats while iteration and result budgets remain)
//!     │
//!     ▼
//! ┌──────────┐
//! │Formatter │  → final answer
//! └──────────┘
//! ```

pub mod evaluator;
pub mod formatter;
pub mod planner;

pub use evaluator::{Evaluation, Evaluator};
pub use formatter::Formatter;
pub use planner::Planner;

use crate::config::{AgentConfig, Config, LLMConfig};
use crate::db::executor::{PgExecutor, Row, SqlExecutor};
use crate::db::schema::SchemaCache;
use crate::llm::provider::{LLM, LLMProviderConfig};
use crate::types::{AppResult, LLMMessage, LLMRequest};
use sqlx::postgres::PgPool;
use std::sync::Arc;
use tracing::{error, info, warn};

/// `information_schema` query the planner and evaluator prompts suggest for
/// relationship questions.
pub(crate) const FK_QUERY_HINT: &str = "\
SELECT
    kcu.table_name,
    kcu.column_name,
    ccu.table_name AS foreign_table_name,
    ccu.column_name AS foreign_column_name
FROM
    information_schema.table_constraints AS tc
    JOIN information_schema.key_column_usage AS kcu
        ON tc.constraint_name = kcu.constraint_name
    JOIN information_schema.constraint_column_usage AS ccu
        ON ccu.constraint_name = tc.constraint_name
WHERE tc.constraint_type = 'FOREIGN KEY'";

const SYSTEM_INSTRUCTION: &str = "You are a PostgreSQL database query expert with deep knowledge \
of information_schema views, table relationships, and data analysis. You break complex questions \
into precise queries and combine results into comprehensive answers.";

/// Build the single-message request used by every step.
pub(crate) fn step_request(llm_config: &LLMConfig, prompt: String) -> LLMRequest {
    LLMRequest {
        provider: llm_config.provider.clone(),
        model: llm_config.model.clone(),
        messages: vec![LLMMessage::user(prompt)],
        max_tokens: Some(4096),
        temperature: Some(llm_config.temperature),
        system_instruction: Some(SYSTEM_INSTRUCTION.to_string()),
    }
}

/// Trim a step output and remove one surrounding markdown code fence, with an
/// optional language tag. The only defensive parsing applied to LLM output.
pub(crate) fn strip_code_fences(raw: &str) -> String {
    let text = raw.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text.to_string();
    };
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    let rest = match rest.split_once('\n') {
        Some((tag, body)) if tag.trim().chars().all(|c| c.is_ascii_alphanumeric()) => body,
        _ => rest,
    };
    rest.trim().to_string()
}

/// JSON rendering of accumulated rows for prompt embedding.
pub(crate) fn render_rows(rows: &[Row]) -> String {
    serde_json::to_string(rows).unwrap_or_else(|_| "[]".to_string())
}

/// Append a follow-up batch without exceeding `max_results`. Returns true if
/// the cap was hit (batch truncated or no capacity left).
fn absorb_batch(accumulated: &mut Vec<Row>, batch: Vec<Row>, max_results: usize) -> bool {
    let remaining = max_results.saturating_sub(accumulated.len());
    // No capacity left counts as capped even for an empty batch.
    let capped = remaining == 0 || batch.len() > remaining;
    accumulated.extend(batch.into_iter().take(remaining));
    capped
}

/// One agent per logical session: owns the executor, the LLM handle, the
/// iteration/result budgets, and the schema cache. Not shared across
/// concurrent questions.
pub struct QueryAgent {
    executor: Arc<dyn SqlExecutor>,
    llm: LLM,
    llm_config: LLMConfig,
    limits: AgentConfig,
    schema_cache: SchemaCache,
}

impl QueryAgent {
    pub fn new(
        executor: Arc<dyn SqlExecutor>,
        llm: LLM,
        llm_config: LLMConfig,
        limits: AgentConfig,
    ) -> Self {
        Self {
            executor,
            llm,
            llm_config,
            limits,
            schema_cache: SchemaCache::new(),
        }
    }

    /// Wire up a Postgres-backed agent from loaded configuration.
    pub fn from_config(pool: PgPool, config: &Config) -> AppResult<Self> {
        let executor = Arc::new(PgExecutor::new(pool, config.agent.sql_read_only));
        let llm = LLM::new(LLMProviderConfig {
            name: config.llm.provider.clone(),
            api_key: config.llm.api_key.clone(),
            base_url: config.llm.base_url.clone(),
        })?;
        Ok(Self::new(
            executor,
            llm,
            config.llm.clone(),
            config.agent.clone(),
        ))
    }

    /// Answer a question. Every failure inside the pipeline is converted to
    /// an `"Error: {message}"` string at this boundary; no partial answer is
    /// ever returned.
    pub async fn query_database(&self, question: &str) -> String {
        info!(question, "Processing question");
        match self.run(question).await {
            Ok(answer) => answer,
            Err(e) => {
                error!(error = %e, "Error processing question");
                format!("Error: {}", e)
            }
        }
    }

    async fn run(&self, question: &str) -> AppResult<String> {
        let schema = self.schema_cache.get_or_fetch(self.executor.as_ref()).await;

        let mut accumulated: Vec<Row> = Vec::new();

        let initial_sql =
            Planner::initial_sql(&self.llm, &self.llm_config, question, &schema).await?;
        let initial_rows = self.executor.execute(&initial_sql).await?;
        accumulated.extend(initial_rows.into_iter().take(self.limits.max_results));

        let mut iteration_count: u32 = 1;

        while iteration_count < self.limits.max_iterations {
            info!(
                iteration = iteration_count,
                max_iterations = self.limits.max_iterations,
                "Evaluating results"
            );

            match Evaluator::evaluate(
                &self.llm,
                &self.llm_config,
                question,
                &schema,
                &accumulated,
            )
            .await?
            {
                Evaluation::Complete => {
                    info!("Evaluation complete, no more queries needed");
                    return Formatter::format_answer(
                        &self.llm,
                        &self.llm_config,
                        question,
                        &accumulated,
                    )
                    .await;
                }
                Evaluation::Continue { sql } => {
                    info!("Executing follow-up query");
                    let batch = self.executor.execute(&sql).await?;

                    if absorb_batch(&mut accumulated, batch, self.limits.max_results) {
                        warn!(max_results = self.limits.max_results, "Result limit reached");
                        return Ok(format!(
                            "Note: Results limited to {} records. \
                             Consider refining your query to be more specific.",
                            self.limits.max_results
                        ));
                    }

                    iteration_count += 1;
                }
            }
        }

        warn!(
            max_iterations = self.limits.max_iterations,
            "Maximum iterations reached"
        );
        Ok(format!(
            "Note: Query processing limited to {} iterations. \
             Consider refining your query to be more specific.",
            self.limits.max_iterations
        ))
    }
}
