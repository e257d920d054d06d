//! Ordered conversation log.
//!
//! The store is shared between the chat controller and every in-flight send.
//! Its lock is only ever taken for the duration of a single append, never
//! across an await point, so any number of pending replies may land in any
//! order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    User,
    Agent,
}

impl Origin {
    /// Label shown next to the message
    pub fn label(&self) -> &'static str {
        match self {
            Origin::User => "You",
            Origin::Agent => "Bot",
        }
    }
}

/// A single log entry. Immutable once created.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Message {
    origin: Origin,
    text: String,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            origin: Origin::User,
            text: text.into(),
        }
    }

    pub fn agent(text: impl Into<String>) -> Self {
        Self {
            origin: Origin::Agent,
            text: text.into(),
        }
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Where agent replies land relative to each other
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReplyOrdering {
    /// Append each reply as soon as its request settles
    #[default]
    Completion,
    /// Hold early replies until every earlier send has been answered
    Sent,
}

impl FromStr for ReplyOrdering {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "completion" => Ok(ReplyOrdering::Completion),
            "sent" => Ok(ReplyOrdering::Sent),
            other => Err(format!("unknown reply ordering '{}'", other)),
        }
    }
}

/// What became of a reply handed to the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Appended to the log
    Appended(Message),
    /// Waiting in `Sent` ordering for an earlier reply to land first
    Held(Message),
    /// The conversation was discarded; nothing was appended
    Dropped,
    /// The send task died before it could report; a network-error reply
    /// took its place in the log
    Aborted,
}

impl Delivery {
    /// The agent message, if one was appended or is held
    pub fn message(&self) -> Option<&Message> {
        match self {
            Delivery::Appended(message) | Delivery::Held(message) => Some(message),
            Delivery::Dropped | Delivery::Aborted => None,
        }
    }

    pub fn is_appended(&self) -> bool {
        matches!(self, Delivery::Appended(_))
    }
}

/// Handle issued for every optimistic user append; redeemed by the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    epoch: u64,
    seq: u64,
}

impl Ticket {
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

#[derive(Debug, Default)]
struct LogState {
    messages: Vec<Message>,
    /// Bumped on discard; tickets from an older epoch are stale
    epoch: u64,
    next_seq: u64,
    /// Sequence number of the next reply allowed through in `Sent` mode
    next_reply: u64,
    held: BTreeMap<u64, Message>,
}

pub struct ConversationStore {
    state: Mutex<LogState>,
    ordering: ReplyOrdering,
    revision: watch::Sender<u64>,
}

impl ConversationStore {
    pub fn new(ordering: ReplyOrdering) -> Self {
        let (revision, _rx) = watch::channel(0);
        Self {
            state: Mutex::new(LogState::default()),
            ordering,
            revision,
        }
    }

    fn state(&self) -> MutexGuard<'_, LogState> {
        // A panic while holding the lock cannot leave the log half-written
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn bump(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }

    pub fn ordering(&self) -> ReplyOrdering {
        self.ordering
    }

    /// Append a user message at the tail and hand out the ticket its reply
    /// must present.
    pub fn append_user(&self, text: impl Into<String>) -> Ticket {
        let ticket = {
            let mut state = self.state();
            let ticket = Ticket {
                epoch: state.epoch,
                seq: state.next_seq,
            };
            state.next_seq += 1;
            state.messages.push(Message::user(text));
            ticket
        };
        self.bump();
        ticket
    }

    /// Record the agent reply for `ticket`.
    ///
    /// A ticket from a discarded log gets [`Delivery::Dropped`]. In `Sent`
    /// ordering a reply that overtook an earlier one gets [`Delivery::Held`]
    /// and reaches the log once the gap is filled.
    pub fn append_reply(&self, ticket: Ticket, text: impl Into<String>) -> Delivery {
        let message = Message::agent(text);
        {
            let mut state = self.state();
            if state.epoch != ticket.epoch {
                tracing::debug!(
                    "Dropping reply #{} for discarded conversation (epoch {} != {})",
                    ticket.seq,
                    ticket.epoch,
                    state.epoch
                );
                return Delivery::Dropped;
            }

            match self.ordering {
                ReplyOrdering::Completion => state.messages.push(message.clone()),
                ReplyOrdering::Sent => {
                    state.held.insert(ticket.seq, message.clone());
                    let released = release_in_order(&mut state);
                    if released == 0 {
                        tracing::debug!(
                            "Holding reply #{} until #{} settles",
                            ticket.seq,
                            state.next_reply
                        );
                        return Delivery::Held(message);
                    }
                }
            }
        }
        self.bump();
        Delivery::Appended(message)
    }

    /// Drop every message and invalidate outstanding tickets
    pub fn discard(&self) {
        {
            let mut state = self.state();
            let epoch = state.epoch + 1;
            *state = LogState {
                epoch,
                ..LogState::default()
            };
        }
        self.bump();
    }

    /// Snapshot of the log in display order
    pub fn messages(&self) -> Vec<Message> {
        self.state().messages.clone()
    }

    pub fn len(&self) -> usize {
        self.state().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of replies waiting for an earlier reply (`Sent` ordering only)
    pub fn held_replies(&self) -> usize {
        self.state().held.len()
    }

    /// Incremented by every discard
    pub fn epoch(&self) -> u64 {
        self.state().epoch
    }

    /// Monotonic change counter; bumps on every visible mutation
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// Subscribe to revision changes
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new(ReplyOrdering::default())
    }
}

/// Move consecutive held replies into the log; returns how many moved
fn release_in_order(state: &mut LogState) -> usize {
    let mut released = 0;
    while let Some(message) = state.held.remove(&state.next_reply) {
        state.messages.push(message);
        state.next_reply += 1;
        released += 1;
    }
    released
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_appends_keep_insertion_order() {
        let store = ConversationStore::default();
        let a = store.append_user("first");
        let b = store.append_user("second");
        store.append_reply(b, "reply to second");
        store.append_reply(a, "reply to first");

        assert_eq!(
            store.messages(),
            vec![
                Message::user("first"),
                Message::user("second"),
                Message::agent("reply to second"),
                Message::agent("reply to first"),
            ]
        );
    }

    #[test]
    fn test_sent_ordering_holds_early_replies() {
        let store = ConversationStore::new(ReplyOrdering::Sent);
        let a = store.append_user("A");
        let b = store.append_user("B");

        assert_eq!(
            store.append_reply(b, "reply B"),
            Delivery::Held(Message::agent("reply B"))
        );
        assert_eq!(store.len(), 2);
        assert_eq!(store.held_replies(), 1);

        assert!(store.append_reply(a, "reply A").is_appended());
        assert_eq!(store.held_replies(), 0);
        assert_eq!(
            store.messages(),
            vec![
                Message::user("A"),
                Message::user("B"),
                Message::agent("reply A"),
                Message::agent("reply B"),
            ]
        );
    }

    #[test]
    fn test_discard_drops_stale_replies() {
        let store = ConversationStore::default();
        let ticket = store.append_user("Hello");
        store.discard();

        assert!(store.is_empty());
        assert_eq!(store.append_reply(ticket, "late"), Delivery::Dropped);
        assert!(store.is_empty());

        // A fresh send after discard works normally
        let fresh = store.append_user("Again");
        assert!(store.append_reply(fresh, "ok").is_appended());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_revision_bumps_on_every_visible_change() {
        let store = ConversationStore::new(ReplyOrdering::Sent);
        assert_eq!(store.revision(), 0);

        let a = store.append_user("A");
        let b = store.append_user("B");
        assert_eq!(store.revision(), 2);

        // Held reply is not visible yet
        store.append_reply(b, "reply B");
        assert_eq!(store.revision(), 2);

        store.append_reply(a, "reply A");
        assert_eq!(store.revision(), 3);

        store.discard();
        assert_eq!(store.revision(), 4);
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let store = ConversationStore::default();
        let mut rx = store.subscribe();

        store.append_user("Hello");
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 1);
    }

    #[test]
    fn test_reply_ordering_from_str() {
        assert_eq!(
            "completion".parse::<ReplyOrdering>().unwrap(),
            ReplyOrdering::Completion
        );
        assert_eq!(" Sent ".parse::<ReplyOrdering>().unwrap(), ReplyOrdering::Sent);
        assert!("random".parse::<ReplyOrdering>().is_err());
    }

    #[test]
    fn test_origin_labels() {
        assert_eq!(Message::user("x").origin().label(), "You");
        assert_eq!(Message::agent("x").origin().label(), "Bot");
    }
}
