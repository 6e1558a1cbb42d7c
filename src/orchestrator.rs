//! Conversation orchestration.
//!
//! One `ask` call is one round: send the prompt plus dataset context to the
//! text generator, extract directive candidates from the raw reply, validate
//! and render each one, reassemble the cleaned answer with per-directive
//! error notices, log the round, and return the answer with every chart
//! that rendered. Only transport failures abort a round; a bad directive
//! degrades to a notice line.

use serde_json::Value;
use tracing::{error, info, warn};

use crate::chart::{self, ResolvedChart};
use crate::directive;
use crate::llm::TextGenerator;
use crate::session::{ChatTurn, LogEntry, Session};
use crate::types::{ChatMessage, ChatRequest};

pub struct Orchestrator<G> {
    generator: G,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl<G: TextGenerator> Orchestrator<G> {
    pub fn new(generator: G, model: impl Into<String>, max_tokens: u32, temperature: f32) -> Self {
        Self {
            generator,
            model: model.into(),
            max_tokens,
            temperature,
        }
    }

    /// Run one full round against the session's dataset.
    pub async fn ask(&self, prompt: &str, session: &mut Session) -> (String, Vec<ResolvedChart>) {
        session.push_turn(ChatTurn::user(prompt));

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::user(format!(
                "{}\n\nUser request: {prompt}",
                data_context(session)
            ))],
            max_tokens: Some(self.max_tokens),
            temperature: Some(self.temperature),
            system_instruction: Some(system_prompt(session)),
        };

        let raw = match self.generator.generate(&request).await {
            Ok(response) => response.content,
            Err(e) => {
                error!(error = %e, "Text generation failed");
                let answer = format!("Error communicating with the text service: {e}");
                session.log.append(LogEntry::new(prompt, answer.clone(), None));
                session.push_turn(ChatTurn::assistant(answer.clone(), Vec::new()));
                return (answer, Vec::new());
            }
        };

        let (candidates, cleaned) = directive::extract_directives(&raw);
        info!(
            prompt_len = prompt.len(),
            response_len = raw.len(),
            candidates = candidates.len(),
            "Received response"
        );

        let resolver = session.dataset.resolver();
        let mut charts = Vec::new();
        let mut notices = Vec::new();
        let mut logged_directives = Vec::new();

        for candidate in &candidates {
            // Keep the raw span in the log even when it fails to parse;
            // extraction already removed it from the displayed text.
            let logged = serde_json::from_str::<Value>(&candidate.raw)
                .unwrap_or_else(|_| Value::String(candidate.raw.clone()));
            logged_directives.push(logged);

            match directive::validate_candidate(candidate, &resolver) {
                Ok(bound) => match chart::render(&bound, &session.dataset) {
                    Some(chart) => charts.push(chart),
                    // Render failure degrades to "no chart"; the validator
                    // already said everything worth saying.
                    None => warn!(title = bound.title(), "Chart construction failed"),
                },
                Err(reason) => {
                    warn!(%reason, raw = %candidate.raw, "Rejected directive");
                    notices.push(reason.to_string());
                }
            }
        }

        let mut answer = cleaned;
        for notice in &notices {
            if !answer.is_empty() {
                answer.push_str("\n\n");
            }
            answer.push_str("Error: ");
            answer.push_str(notice);
        }

        let directives = match logged_directives.len() {
            0 => None,
            1 => Some(logged_directives.remove(0)),
            _ => Some(Value::Array(logged_directives)),
        };
        session.log.append(LogEntry::new(prompt, answer.clone(), directives));
        session.push_turn(ChatTurn::assistant(answer.clone(), charts.clone()));

        info!(charts = charts.len(), notices = notices.len(), "Round complete");
        (answer, charts)
    }

    /// One-shot dataset summary round. No directive extraction; the reply
    /// is plain prose, logged like any other round.
    pub async fn overview(&self, session: &mut Session) -> String {
        let stats = session.dataset.stats();
        let dtypes = session
            .dataset
            .dtypes()
            .into_iter()
            .map(|(name, kind)| format!("{name}: {kind:?}"))
            .collect::<Vec<_>>()
            .join(", ");

        let prompt = format!(
            "Given this dataset information, provide a brief overview of what \
             the data appears to be about:\n\
             Columns: {}\n\
             Types: {dtypes}\n\
             Shape: {} rows x {} columns\n\
             Sample:\n{}\n\
             Please provide a concise summary that explains the nature of the \
             dataset and its potential use cases.",
            session.dataset.column_names().join(", "),
            stats.total_rows,
            stats.total_columns,
            session.dataset.head_preview(5),
        );

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::user(prompt.clone())],
            max_tokens: Some(self.max_tokens.min(500)),
            temperature: Some(self.temperature),
            system_instruction: None,
        };

        let answer = match self.generator.generate(&request).await {
            Ok(response) => response.content,
            Err(e) => {
                error!(error = %e, "Overview generation failed");
                format!("Error getting data overview: {e}")
            }
        };

        session.log.append(LogEntry::new(prompt, answer.clone(), None));
        answer
    }
}

fn system_prompt(session: &Session) -> String {
    format!(
        r#"You are a data analysis assistant that helps analyze data and create visualizations.

When creating visualizations, you MUST return a JSON object in your response using this exact format:
{{"chart_type": "bar"|"line"|"scatter"|"pie", "x_column": "column_name", "y_column": "column_name", "title": "chart_title"}}

For word clouds over a text column, use this format instead:
{{"chart_type": "word_cloud", "text_column": "column_name", "title": "chart_title"}}

For count-based visualizations (e.g., counting occurrences of categories), set y_column to "count".

Available chart types are:
- "bar" for bar charts (good for categorical comparisons or counts)
- "line" for line charts (good for trends over time)
- "scatter" for scatter plots (good for relationship between variables)
- "pie" for pie charts (good for showing proportions)
- "word_cloud" for term-frequency visualizations of free text

Always include the JSON when the user asks for a chart or visualization. Here are the exact column names:
{}"#,
        session.dataset.column_names().join(", ")
    )
}

fn data_context(session: &Session) -> String {
    format!(
        "Available columns in the dataset: {}\n\
         Data shape: {} rows x {} columns\n\
         Sample data:\n{}",
        session.dataset.column_names().join(", "),
        session.dataset.row_count(),
        session.dataset.column_names().len(),
        session.dataset.head_preview(5),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;
    use crate::types::{AppError, AppResult, ChatResponse, TokenUsage};
    use async_trait::async_trait;

    /// Scripted generator: either a canned reply or a transport failure.
    struct Scripted {
        reply: Option<String>,
    }

    impl Scripted {
        fn replies(content: &str) -> Self {
            Self { reply: Some(content.to_string()) }
        }

        fn fails() -> Self {
            Self { reply: None }
        }
    }

    #[async_trait]
    impl TextGenerator for Scripted {
        async fn generate(&self, _request: &ChatRequest) -> AppResult<ChatResponse> {
            match &self.reply {
                Some(content) => Ok(ChatResponse {
                    content: content.clone(),
                    finish_reason: "stop".to_string(),
                    usage: TokenUsage::default(),
                }),
                None => Err(AppError::Transport("connection refused".to_string())),
            }
        }
    }

    fn session() -> Session {
        let csv = "region,sales\nnorth,10\nsouth,20\nnorth,5\n";
        Session::new(Dataset::from_reader(csv.as_bytes()).unwrap())
    }

    fn orchestrator(generator: Scripted) -> Orchestrator<Scripted> {
        Orchestrator::new(generator, "test-model", 1000, 0.7)
    }

    #[tokio::test]
    async fn test_round_with_one_chart() {
        let reply = r#"Here is the chart you asked for:
{"chart_type":"bar","x_column":"Region","y_column":"Sales","title":"Sales by Region"}
Let me know if you need anything else."#;
        let orchestrator = orchestrator(Scripted::replies(reply));
        let mut session = session();

        let (answer, charts) = orchestrator.ask("show sales by region", &mut session).await;

        assert_eq!(charts.len(), 1);
        assert_eq!(charts[0].title, "Sales by Region");
        assert!(!answer.contains('{'));
        assert!(answer.contains("Here is the chart"));
        assert_eq!(session.conversation().len(), 2);
        assert_eq!(session.log.len(), 1);
        assert!(session.log.read_all()[0].directives.is_some());
    }

    #[tokio::test]
    async fn test_one_bad_directive_never_blocks_others() {
        let reply = r#"Two charts:
{"chart_type":"bar","x_column":"Profit","y_column":"sales","title":"Bad"}
{"chart_type":"bar","x_column":"region","y_column":"count","title":"Good"}"#;
        let orchestrator = orchestrator(Scripted::replies(reply));
        let mut session = session();

        let (answer, charts) = orchestrator.ask("two charts please", &mut session).await;

        assert_eq!(charts.len(), 1);
        assert_eq!(charts[0].title, "Good");
        assert!(answer.contains("Error: Column 'Profit' not found"));
        assert!(answer.contains("region, sales"));
    }

    #[tokio::test]
    async fn test_multiple_valid_directives_all_render() {
        let reply = r#"{"chart_type":"bar","x_column":"region","y_column":"count","title":"A"}
{"chart_type":"pie","x_column":"region","y_column":"count","title":"B"}"#;
        let orchestrator = orchestrator(Scripted::replies(reply));
        let mut session = session();

        let (_, charts) = orchestrator.ask("charts", &mut session).await;
        assert_eq!(charts.len(), 2);
        assert_eq!(charts[0].title, "A");
        assert_eq!(charts[1].title, "B");
    }

    #[tokio::test]
    async fn test_transport_failure_logs_one_entry() {
        let orchestrator = orchestrator(Scripted::fails());
        let mut session = session();

        let (answer, charts) = orchestrator.ask("anything", &mut session).await;

        assert!(answer.contains("Error communicating with the text service"));
        assert!(charts.is_empty());
        assert_eq!(session.log.len(), 1);
        assert!(session.log.read_all()[0].directives.is_none());
    }

    #[tokio::test]
    async fn test_unparsable_directive_appends_notice() {
        let reply = "Sure: {this is not json}";
        let orchestrator = orchestrator(Scripted::replies(reply));
        let mut session = session();

        let (answer, charts) = orchestrator.ask("chart", &mut session).await;

        assert!(charts.is_empty());
        assert!(answer.contains("Error: Could not parse chart specification."));
    }

    #[tokio::test]
    async fn test_unparsable_span_is_still_logged() {
        let orchestrator = orchestrator(Scripted::replies("Sure: {this is not json}"));
        let mut session = session();

        orchestrator.ask("chart", &mut session).await;

        // The span is stripped from the answer, so the log must keep it.
        let entry = &session.log.read_all()[0];
        assert_eq!(
            entry.directives,
            Some(Value::String("{this is not json}".to_string()))
        );
        assert!(!entry.response.contains("{this is not json}"));
    }

    #[tokio::test]
    async fn test_case_insensitive_binding_renders() {
        let reply = r#"{"chart_type":"bar","x_column":"REGION","y_column":"Sales","title":"T"}"#;
        let orchestrator = orchestrator(Scripted::replies(reply));
        let mut session = session();

        let (answer, charts) = orchestrator.ask("chart", &mut session).await;
        assert_eq!(charts.len(), 1);
        assert!(!answer.contains("Error"));
    }

    #[tokio::test]
    async fn test_overview_logs_round() {
        let orchestrator = orchestrator(Scripted::replies("This dataset tracks sales."));
        let mut session = session();

        let answer = orchestrator.overview(&mut session).await;
        assert_eq!(answer, "This dataset tracks sales.");
        assert_eq!(session.log.len(), 1);
        assert!(session.log.read_all()[0].prompt.contains("brief overview"));
    }
}
