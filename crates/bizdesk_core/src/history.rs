//! crates/bizdesk_core/src/history.rs
//!
//! The conversation history of one document-desk session.

use serde::Serialize;

pub const HISTORY_EXPORT_FILENAME: &str = "conversation_history.txt";

/// Ordered summaries and question/answer pairs. Lives only as long as the
/// session that produced it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversationHistory {
    entries: Vec<String>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_summary(&mut self, summary: &str) {
        self.entries.push(format!("Summary: {summary}"));
    }

    pub fn record_answer(&mut self, question: &str, answer: &str) {
        self.entries.push(format!("Q: {question}\nA: {answer}"));
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries separated by a blank line.
    pub fn export_text(&self) -> String {
        self.entries.join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_keep_order_and_format() {
        let mut history = ConversationHistory::new();
        assert!(history.is_empty());
        history.record_summary("Quarterly results were strong.");
        history.record_answer("Who audited?", "Not stated in the document.");

        assert_eq!(
            history.entries(),
            [
                "Summary: Quarterly results were strong.".to_string(),
                "Q: Who audited?\nA: Not stated in the document.".to_string(),
            ]
        );
        assert_eq!(
            history.export_text(),
            "Summary: Quarterly results were strong.\n\nQ: Who audited?\nA: Not stated in the document."
        );
    }

    #[test]
    fn test_empty_history_exports_empty_text() {
        assert_eq!(ConversationHistory::new().export_text(), "");
    }
}
