//! Instruction bundle composition.
//!
//! A bundle is what every provider receives: the behavioral preamble and
//! grounding as system text, the transcript and current utterance as the
//! user turn.

use frontdesk_core::types::{ChatMessage, KnowledgeDocument, SenderKind};

/// One grounding document as it is shown to the provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroundingSnippet {
    pub title: String,
    pub content: String,
}

/// Everything a provider needs to answer one visitor turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstructionBundle {
    pub preamble: String,
    pub grounding: Vec<GroundingSnippet>,
    pub transcript: String,
    pub utterance: String,
}

impl InstructionBundle {
    pub fn compose(
        preamble: &str,
        documents: &[&KnowledgeDocument],
        history: &[ChatMessage],
        utterance: &str,
    ) -> Self {
        Self {
            preamble: preamble.trim().to_string(),
            grounding: documents
                .iter()
                .map(|d| GroundingSnippet {
                    title: d.title.clone(),
                    content: d.content.trim().to_string(),
                })
                .collect(),
            transcript: render_transcript(history),
            utterance: utterance.trim().to_string(),
        }
    }

    /// Preamble followed by the reference material, if any.
    pub fn system_prompt(&self) -> String {
        let mut prompt = self.preamble.clone();
        if !self.grounding.is_empty() {
            prompt.push_str("\n\nReference material:");
            for snippet in &self.grounding {
                prompt.push_str(&format!("\n\n### {}\n{}", snippet.title, snippet.content));
            }
        }
        prompt
    }

    /// Transcript followed by the utterance to answer.
    pub fn user_prompt(&self) -> String {
        let current = format!(
            "{}: {}",
            SenderKind::Visitor.transcript_label(),
            self.utterance
        );
        if self.transcript.is_empty() {
            current
        } else {
            format!(
                "Conversation so far:\n{}\n\nLatest message:\n{}",
                self.transcript, current
            )
        }
    }

    /// Titles of the grounding documents, for reply metadata.
    pub fn source_titles(&self) -> Vec<String> {
        self.grounding.iter().map(|g| g.title.clone()).collect()
    }
}

/// Render messages as `Label: content` lines in the given order.
pub fn render_transcript(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.sender_kind.transcript_label(), m.content.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}
