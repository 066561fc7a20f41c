//! Planner step: turns a question and the cached schema into the initial
//! SQL query via a single LLM call.

use crate::agents::{step_request, strip_code_fences, FK_QUERY_HINT};
use crate::config::LLMConfig;
use crate::db::schema::{render_schema, SchemaInfo};
use crate::llm::provider::LLM;
use crate::types::AppResult;
use tracing::info;

pub struct Planner;

impl Planner {
    /// Produce the initial SQL for a question. The output is trimmed and
    /// fence-stripped but otherwise trusted; malformed SQL fails downstream
    /// in the executor.
    pub async fn initial_sql(
        llm: &LLM,
        llm_config: &LLMConfig,
        question: &str,
        schema: &SchemaInfo,
    ) -> AppResult<String> {
        info!("Planning initial query");
        let prompt = Self::create_prompt(question, schema);
        let response = llm
            .create_chat_completion(&step_request(llm_config, prompt))
            .await?;
        Ok(strip_code_fences(&response.content))
    }

    fn create_prompt(question: &str, schema: &SchemaInfo) -> String {
        format!(
            "Plan how to answer this question: \"{question}\"\n\
             \n\
             Available tables and their schemas:\n\
             {schema}\n\
             For queries about table relationships and foreign keys, use this structure\n\
             (return just the raw SQL without any markdown formatting):\n\
             \n\
             {hint}\n\
             \n\
             1. Formulate an initial PostgreSQL query to gather necessary information\n\
             2. Return ONLY the SQL query string, nothing else",
            question = question,
            schema = render_schema(schema),
            hint = FK_QUERY_HINT,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::ColumnInfo;

    #[test]
    fn test_prompt_embeds_question_and_schema() {
        let mut schema = SchemaInfo::new();
        schema.insert(
            "orders".to_string(),
            vec![ColumnInfo {
                name: "total".to_string(),
                data_type: "numeric".to_string(),
            }],
        );

        let prompt = Planner::create_prompt("how many orders are there?", &schema);
        assert!(prompt.contains("how many orders are there?"));
        assert!(prompt.contains("orders\n"));
        assert!(prompt.contains("  - total (numeric)"));
        assert!(prompt.contains("FOREIGN KEY"));
        assert!(prompt.contains("Return ONLY the SQL query string"));
    }

    #[test]
    fn test_prompt_with_empty_schema() {
        let prompt = Planner::create_prompt("anything", &SchemaInfo::new());
        assert!(prompt.contains("(no schema information available)"));
    }
}
