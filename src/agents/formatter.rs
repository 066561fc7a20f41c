//! Formatter step: renders the accumulated rows into the final
//! human-readable answer.

use crate::agents::{render_rows, step_request};
use crate::config::LLMConfig;
use crate::db::executor::Row;
use crate::llm::provider::LLM;
use crate::types::AppResult;
use tracing::info;

pub struct Formatter;

impl Formatter {
    pub async fn format_answer(
        llm: &LLM,
        llm_config: &LLMConfig,
        question: &str,
        results: &[Row],
    ) -> AppResult<String> {
        info!(rows = results.len(), "Formatting final response");
        let prompt = Self::create_prompt(question, results);
        let response = llm
            .create_chat_completion(&step_request(llm_config, prompt))
            .await?;
        Ok(response.content.trim().to_string())
    }

    fn create_prompt(question: &str, results: &[Row]) -> String {
        format!(
            "Format these database results into a response:\n\
             Question: {question}\n\
             Combined Results: {results}\n\
             \n\
             Apply one of these formatting templates based on the query type:\n\
             \n\
             1. For table schema/structure queries:\n\
             [table name]\n\
             - [column name] ([data type])\n\
             \n\
             Example:\n\
             users\n\
             - id (integer)\n\
             - email (varchar)\n\
             - created_at (timestamp)\n\
             \n\
             2. For table relationship queries:\n\
             [table name]\n\
             Relationships:\n\
               → [related table] via [column] = [foreign column]\n\
                 Type: [relationship type]\n\
             \n\
             Example:\n\
             stocks\n\
             Relationships:\n\
               → price_history via symbol = symbol\n\
                 Type: One-to-Many\n\
               → stock_news via symbol = symbol\n\
                 Type: One-to-Many\n\
             \n\
             3. For data queries:\n\
             Provide a natural language response that synthesizes the information.\n\
             \n\
             Determine the query type from the question and format accordingly.",
            question = question,
            results = render_rows(results),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_question_and_results() {
        let rows = vec![serde_json::json!({"count": 42})
            .as_object()
            .cloned()
            .unwrap()];
        let prompt = Formatter::create_prompt("how many users?", &rows);
        assert!(prompt.contains("Question: how many users?"));
        assert!(prompt.contains("\"count\":42"));
        assert!(prompt.contains("formatting templates"));
    }
}
