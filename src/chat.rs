//! Chat message lifecycle: optimistic append, one request per message,
//! reply (or fallback) appended whenever that request settles.

use crate::conversation::{ConversationStore, Delivery, Message, ReplyOrdering, Ticket};
use crate::transport::{ChatReply, Transport};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

/// Agent text shown when the chat request never produced a usable answer
pub const NETWORK_ERROR_TEXT: &str = "Network error";

/// One in-flight chat request.
///
/// The request is already running on the tokio runtime when this exists and
/// the user message is already in the log. Dropping it detaches the request;
/// its reply still lands. Pending sends are independent of each other and
/// may be settled in any order.
pub struct PendingSend {
    ticket: Ticket,
    handle: JoinHandle<Delivery>,
}

impl PendingSend {
    /// Sequence number of the user message this send belongs to
    pub fn seq(&self) -> u64 {
        self.ticket.seq()
    }

    /// Wait for the request to settle and report what became of its reply
    pub async fn settle(self) -> Delivery {
        match self.handle.await {
            Ok(delivery) => delivery,
            Err(e) => {
                tracing::warn!("Chat #{} task ended early: {}", self.ticket.seq(), e);
                Delivery::Aborted
            }
        }
    }
}

/// Reply slot for one ticket. If the send task dies before filling it, the
/// slot is filled with the network-error text so later replies in `Sent`
/// ordering are not held forever.
struct ReplySlot {
    store: Arc<ConversationStore>,
    ticket: Ticket,
    filled: bool,
}

impl ReplySlot {
    fn fill(mut self, text: String) -> Delivery {
        self.filled = true;
        self.store.append_reply(self.ticket, text)
    }
}

impl Drop for ReplySlot {
    fn drop(&mut self) {
        if !self.filled {
            tracing::warn!("Chat #{} abandoned before its reply", self.ticket.seq());
            self.store.append_reply(self.ticket, NETWORK_ERROR_TEXT);
        }
    }
}

/// Drives the conversation: the only writer of its [`ConversationStore`].
pub struct ChatController {
    store: Arc<ConversationStore>,
    transport: Arc<dyn Transport>,
    draft: Mutex<String>,
}

impl ChatController {
    pub fn new(transport: Arc<dyn Transport>, ordering: ReplyOrdering) -> Self {
        Self {
            store: Arc::new(ConversationStore::new(ordering)),
            transport,
            draft: Mutex::new(String::new()),
        }
    }

    /// Read access to the log this controller writes
    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    pub fn messages(&self) -> Vec<Message> {
        self.store.messages()
    }

    /// Current contents of the input field
    pub fn draft(&self) -> String {
        self.draft.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn set_draft(&self, text: impl Into<String>) {
        *self.draft.lock().unwrap_or_else(|e| e.into_inner()) = text.into();
    }

    /// Send whatever is in the input field.
    ///
    /// The field is cleared as soon as the message is accepted, without
    /// waiting for the reply. A blank draft is left untouched.
    pub fn submit_draft(&self) -> Option<PendingSend> {
        let draft = self.draft();
        let pending = self.send_message(&draft)?;
        self.set_draft(String::new());
        Some(pending)
    }

    /// Append `raw` (trimmed) as a user message and issue its request.
    ///
    /// Blank input is ignored: nothing is appended and no request is made.
    /// Must be called from within a tokio runtime.
    pub fn send_message(&self, raw: &str) -> Option<PendingSend> {
        let text = raw.trim();
        if text.is_empty() {
            return None;
        }

        let ticket = self.store.append_user(text);
        tracing::debug!("Sending message #{} ({} chars)", ticket.seq(), text.len());

        let slot = ReplySlot {
            store: self.store.clone(),
            ticket,
            filled: false,
        };
        let transport = self.transport.clone();
        let text = text.to_string();

        let handle = tokio::spawn(async move {
            let reply = match transport.chat(&text).await {
                Ok(ChatReply::Reply(reply)) => reply,
                Ok(ChatReply::Error(error)) => {
                    tracing::info!("Chat #{} rejected by backend: {}", ticket.seq(), error);
                    error
                }
                Err(e) => {
                    tracing::warn!(
                        "Chat #{} failed via {} transport: {}",
                        ticket.seq(),
                        transport.name(),
                        e
                    );
                    NETWORK_ERROR_TEXT.to_string()
                }
            };
            slot.fill(reply)
        });

        Some(PendingSend { ticket, handle })
    }

    /// Throw the log away; replies still in flight will be dropped
    pub fn discard(&self) {
        self.store.discard();
        self.set_draft(String::new());
    }
}
