// LLM module
// Chat model clients, prompt templates and grounded answer generation

pub mod groq;
pub mod prompt;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Result;
use crate::session::ChatTurn;

pub use groq::GroqClient;
pub use prompt::{BUILTIN_TEMPLATES, PromptTemplate, join_context};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[inline]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[inline]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A hosted chat completion model
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;

    fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Produces an answer to a question from retrieved context
pub trait AnswerGenerator: Send + Sync {
    /// `history` is ordered oldest first
    fn generate(&self, question: &str, context: &[String], history: &[ChatTurn])
    -> Result<String>;
}

/// Renders a prompt template and sends it to a chat model
pub struct PromptedGenerator<M> {
    model: M,
    template: PromptTemplate,
    history_turns: usize,
}

impl<M: ChatModel> PromptedGenerator<M> {
    #[inline]
    pub fn new(model: M, template: PromptTemplate) -> Self {
        Self {
            model,
            template,
            history_turns: 0,
        }
    }

    /// Send up to `turns` previous exchanges along with each question
    #[inline]
    pub fn with_history_turns(mut self, turns: usize) -> Self {
        self.history_turns = turns;
        self
    }

    #[inline]
    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    /// Messages sent to the model for one question
    pub fn messages(
        &self,
        question: &str,
        context: &[String],
        history: &[ChatTurn],
    ) -> Vec<ChatMessage> {
        let (system, human) = self.template.render(&join_context(context), question);

        let skip = history.len().saturating_sub(self.history_turns);
        let recent = &history[skip..];

        let mut messages = Vec::with_capacity(2 + recent.len() * 2);
        messages.push(ChatMessage::system(system));
        for turn in recent {
            messages.push(ChatMessage::user(turn.question.clone()));
            messages.push(ChatMessage::assistant(turn.answer.clone()));
        }
        messages.push(ChatMessage::user(human));
        messages
    }
}

impl<M: ChatModel> AnswerGenerator for PromptedGenerator<M> {
    fn generate(
        &self,
        question: &str,
        context: &[String],
        history: &[ChatTurn],
    ) -> Result<String> {
        let messages = self.messages(question, context, history);
        debug!(
            "Generating answer with {} using template '{}' ({} messages, {} context documents)",
            self.model.model_name(),
            self.template.name,
            messages.len(),
            context.len()
        );
        self.model.complete(&messages)
    }
}
