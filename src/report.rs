//! Markdown report assembled from a session's answers.

use crate::analysis::AnalysisKind;
use crate::llm::{Message, MessageRole};

/// Download name of the report.
pub const REPORT_FILENAME: &str = "report_bilancio.md";

/// Content type of the report.
pub const REPORT_CONTENT_TYPE: &str = "text/markdown; charset=utf-8";

const REPORT_TITLE: &str = "# Report di analisi del bilancio";

/// Render every answered question as a Markdown section.
///
/// Returns `None` when the history holds no assistant message yet.
pub fn render_report(messages: &[Message]) -> Option<String> {
    let mut out = String::from(REPORT_TITLE);
    out.push('\n');

    let mut question: Option<&str> = None;
    let mut sections = 0usize;

    for message in messages {
        match message.role() {
            MessageRole::User => question = Some(message.content()),
            MessageRole::Assistant => {
                sections += 1;
                let heading = question.take().map_or_else(
                    || format!("Risposta {sections}"),
                    heading_for,
                );
                out.push_str(&format!("\n## {heading}\n\n{}\n", message.content().trim_end()));
            }
        }
    }

    (sections > 0).then_some(out)
}

/// Presets are titled by their label, free questions by their first line.
fn heading_for(question: &str) -> String {
    if let Some(kind) = AnalysisKind::from_prompt(question) {
        return kind.label().to_string();
    }
    question
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("Domanda")
        .to_string()
}
