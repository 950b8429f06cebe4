//! Chat sessions: a bounded, ordered history of question/answer turns,
//! optionally mirrored into the metadata database.

#[cfg(test)]
mod tests;

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::database::Database;
use crate::database::models::{NewTurn, StoredTurn};
use crate::{RagError, Result};

/// One completed exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub question: String,
    pub answer: String,
    pub asked_at: DateTime<Utc>,
}

impl ChatTurn {
    #[inline]
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            asked_at: Utc::now(),
        }
    }
}

impl From<StoredTurn> for ChatTurn {
    #[inline]
    fn from(turn: StoredTurn) -> Self {
        Self {
            question: turn.question,
            answer: turn.answer,
            asked_at: turn.asked_at,
        }
    }
}

/// In-memory turn history that evicts the oldest turn once full
#[derive(Debug, Clone)]
pub struct Conversation {
    id: String,
    max_turns: usize,
    turns: VecDeque<ChatTurn>,
    evicted: usize,
}

impl Conversation {
    #[inline]
    pub fn new(max_turns: usize) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), max_turns)
    }

    #[inline]
    pub fn with_id(id: impl Into<String>, max_turns: usize) -> Self {
        let max_turns = max_turns.max(1);
        Self {
            id: id.into(),
            max_turns,
            turns: VecDeque::with_capacity(max_turns.min(64)),
            evicted: 0,
        }
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Turns dropped from memory so far
    #[inline]
    pub fn evicted(&self) -> usize {
        self.evicted
    }

    /// Append a turn, returning the one evicted to make room
    #[inline]
    pub fn push(&mut self, turn: ChatTurn) -> Option<ChatTurn> {
        let evicted = if self.turns.len() == self.max_turns {
            self.evicted += 1;
            self.turns.pop_front()
        } else {
            None
        };
        self.turns.push_back(turn);
        evicted
    }

    /// Turns in chronological order
    #[inline]
    pub fn turns(&self) -> impl Iterator<Item = &ChatTurn> {
        self.turns.iter()
    }

    /// The last `n` turns, oldest first
    #[inline]
    pub fn recent(&self, n: usize) -> Vec<ChatTurn> {
        let skip = self.turns.len().saturating_sub(n);
        self.turns.iter().skip(skip).cloned().collect()
    }

    /// Chronological transcript followed by the exchange in flight
    ///
    /// The in-flight answer is `None` while the question is being answered.
    pub fn transcript(&self, pending: Option<(&str, Option<&str>)>) -> String {
        let mut out = String::new();

        for turn in &self.turns {
            push_exchange(&mut out, &turn.question, Some(&turn.answer));
        }
        if let Some((question, answer)) = pending {
            push_exchange(&mut out, question, answer);
        }

        out
    }
}

fn push_exchange(out: &mut String, question: &str, answer: Option<&str>) {
    out.push_str("You: ");
    out.push_str(question);
    out.push('\n');
    out.push_str("Assistant: ");
    out.push_str(answer.unwrap_or("..."));
    out.push_str("\n\n");
}

/// A conversation that writes each turn through to the database
#[derive(Debug)]
pub struct ChatSession {
    conversation: Conversation,
    database: Option<Database>,
}

impl ChatSession {
    /// Start a new session, persisted when a database is given
    pub async fn start(
        database: Option<Database>,
        max_turns: usize,
        title: Option<&str>,
    ) -> Result<Self> {
        let conversation = Conversation::new(max_turns);

        if let Some(db) = &database {
            db.create_session(conversation.id(), title).await?;
            info!("Started chat session {}", conversation.id());
        } else {
            debug!("Started in-memory chat session {}", conversation.id());
        }

        Ok(Self {
            conversation,
            database,
        })
    }

    /// Reload the most recent turns of a stored session
    pub async fn resume(database: Database, id: &str, max_turns: usize) -> Result<Self> {
        if database.get_session(id).await?.is_none() {
            return Err(RagError::Config(format!("Unknown chat session: {}", id)));
        }

        let mut conversation = Conversation::with_id(id, max_turns);
        let stored = database.list_turns(id, conversation.max_turns()).await?;
        let restored = stored.len();
        for turn in stored {
            conversation.push(ChatTurn::from(turn));
        }

        info!("Resumed chat session {} with {} turns", id, restored);
        Ok(Self {
            conversation,
            database: Some(database),
        })
    }

    #[inline]
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    #[inline]
    pub fn is_persistent(&self) -> bool {
        self.database.is_some()
    }

    /// Store a completed turn
    pub async fn record(&mut self, turn: ChatTurn) -> Result<()> {
        if let Some(db) = &self.database {
            db.append_turn(&NewTurn {
                session_id: self.conversation.id().to_string(),
                question: turn.question.clone(),
                answer: turn.answer.clone(),
                asked_at: turn.asked_at,
            })
            .await?;
        }

        if let Some(evicted) = self.conversation.push(turn) {
            debug!("Evicted turn asked at {} from memory", evicted.asked_at);
        }
        Ok(())
    }
}
