//! Evaluator step: decides whether the accumulated rows answer the question
//! or another query is needed.

use crate::agents::{render_rows, step_request, strip_code_fences, FK_QUERY_HINT};
use crate::config::LLMConfig;
use crate::db::executor::Row;
use crate::db::schema::{render_schema, SchemaInfo};
use crate::llm::provider::LLM;
use crate::types::AppResult;
use tracing::info;

/// Outcome of one evaluator round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    /// Another query is needed.
    Continue { sql: String },
    /// The accumulated results are sufficient.
    Complete,
}

pub struct Evaluator;

impl Evaluator {
    pub async fn evaluate(
        llm: &LLM,
        llm_config: &LLMConfig,
        question: &str,
        schema: &SchemaInfo,
        results: &[Row],
    ) -> AppResult<Evaluation> {
        info!(accumulated = results.len(), "Evaluating results");
        let prompt = Self::create_prompt(question, schema, results);
        let response = llm
            .create_chat_completion(&step_request(llm_config, prompt))
            .await?;
        Ok(Self::parse(&response.content))
    }

    /// The model is instructed to answer with the literal word COMPLETE or a
    /// bare SQL string; everything that is not COMPLETE is treated as SQL.
    pub(crate) fn parse(raw: &str) -> Evaluation {
        let text = strip_code_fences(raw);
        if text == "COMPLETE" {
            Evaluation::Complete
        } else {
            Evaluation::Continue { sql: text }
        }
    }

    fn create_prompt(question: &str, schema: &SchemaInfo, results: &[Row]) -> String {
        format!(
            "Analyze these results for the question: \"{question}\"\n\
             \n\
             Current results: {results}\n\
             Available schema:\n\
             {schema}\n\
             For queries about table relationships and foreign keys, use this structure\n\
             (return just the raw SQL without any markdown formatting):\n\
             \n\
             {hint}\n\
             \n\
             Determine if additional queries are needed to fully answer the question.\n\
             If yes, provide ONLY a new SQL query string.\n\
             If no, respond with \"COMPLETE\".",
            question = question,
            results = render_rows(results),
            schema = render_schema(schema),
            hint = FK_QUERY_HINT,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_complete() {
        assert_eq!(Evaluator::parse("COMPLETE"), Evaluation::Complete);
        assert_eq!(Evaluator::parse("  COMPLETE\n"), Evaluation::Complete);
    }

    #[test]
    fn test_parse_sql() {
        assert_eq!(
            Evaluator::parse("SELECT * FROM users"),
            Evaluation::Continue {
                sql: "SELECT * FROM users".to_string()
            }
        );
        // Not the exact sentinel, so it goes to the database as-is
        assert!(matches!(
            Evaluator::parse("complete"),
            Evaluation::Continue { .. }
        ));
    }

    #[test]
    fn test_parse_strips_fences() {
        assert_eq!(
            Evaluator::parse("```sql\nSELECT count(*) FROM orders\n```"),
            Evaluation::Continue {
                sql: "SELECT count(*) FROM orders".to_string()
            }
        );
    }

    #[test]
    fn test_prompt_embeds_rows() {
        let rows = vec![serde_json::json!({"id": 1, "email": "a@b.c"})
            .as_object()
            .cloned()
            .unwrap()];
        let prompt = Evaluator::create_prompt("who signed up?", &SchemaInfo::new(), &rows);
        assert!(prompt.contains("who signed up?"));
        assert!(prompt.contains("a@b.c"));
        assert!(prompt.contains("respond with \"COMPLETE\""));
    }
}
