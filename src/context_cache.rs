//! Per-recipient conversation history, capped and LRU-bounded.

use std::collections::HashMap;
use std::sync::Mutex;

use log::debug;
use serde::{Deserialize, Serialize};

/// A conversation history is trimmed to this many turns after each
/// assistant reply.
pub const MAX_TURNS: usize = 20;

/// Speaker role of a conversation turn.
///
/// Serializes to the lowercase role tags the Messages API expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message exchanged in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug)]
struct History {
    turns: Vec<Turn>,
    last_used: u64,
}

#[derive(Debug, Default)]
struct Inner {
    histories: HashMap<String, History>,
    tick: u64,
}

/// Conversation context shared across webhook requests.
///
/// Holds at most `max_recipients` distinct recipients; creating a history
/// beyond that bound evicts the least-recently-used recipient first.
#[derive(Debug)]
pub struct ContextCache {
    max_recipients: usize,
    inner: Mutex<Inner>,
}

impl ContextCache {
    pub fn new(max_recipients: usize) -> Self {
        Self {
            max_recipients: max_recipients.max(1),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Appends a user turn, creating the recipient's history on first contact.
    pub fn append_user_turn(&self, recipient: &str, text: impl Into<String>) {
        self.append(recipient, Turn::user(text));
    }

    /// Appends an assistant turn, then trims the history to its most recent
    /// [`MAX_TURNS`] entries, oldest dropped first.
    pub fn append_assistant_turn(&self, recipient: &str, text: impl Into<String>) {
        let mut inner = self.lock();
        let history = Self::entry(&mut inner, self.max_recipients, recipient);
        history.turns.push(Turn::assistant(text));
        if history.turns.len() > MAX_TURNS {
            let excess = history.turns.len() - MAX_TURNS;
            history.turns.drain(..excess);
        }
    }

    /// Returns the recipient's history in insertion order, empty if absent.
    /// Does not create an entry.
    pub fn get(&self, recipient: &str) -> Vec<Turn> {
        let mut inner = self.lock();
        let tick = Self::next_tick(&mut inner);
        match inner.histories.get_mut(recipient) {
            Some(history) => {
                history.last_used = tick;
                history.turns.clone()
            }
            None => Vec::new(),
        }
    }

    /// Removes the recipient's history entirely.
    pub fn clear(&self, recipient: &str) {
        self.lock().histories.remove(recipient);
    }

    /// Number of distinct recipients currently held.
    pub fn recipient_count(&self) -> usize {
        self.lock().histories.len()
    }

    fn append(&self, recipient: &str, turn: Turn) {
        let mut inner = self.lock();
        Self::entry(&mut inner, self.max_recipients, recipient)
            .turns
            .push(turn);
    }

    fn entry<'a>(inner: &'a mut Inner, max_recipients: usize, recipient: &str) -> &'a mut History {
        let tick = Self::next_tick(inner);
        if !inner.histories.contains_key(recipient) && inner.histories.len() >= max_recipients {
            Self::evict_lru(inner);
        }
        let history = inner
            .histories
            .entry(recipient.to_string())
            .or_insert_with(|| History {
                turns: Vec::new(),
                last_used: tick,
            });
        history.last_used = tick;
        history
    }

    fn evict_lru(inner: &mut Inner) {
        let oldest = inner
            .histories
            .iter()
            .min_by_key(|(_, history)| history.last_used)
            .map(|(recipient, _)| recipient.clone());
        if let Some(recipient) = oldest {
            debug!("Evicting conversation history for {recipient}");
            inner.histories.remove(&recipient);
        }
    }

    fn next_tick(inner: &mut Inner) -> u64 {
        inner.tick += 1;
        inner.tick
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
