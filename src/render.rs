//! Message rendering.
//!
//! A [`Renderer`] is a pure function of message text. [`LogView`] keeps the
//! rendered blocks for one conversation and only calls the renderer when the
//! store's revision has moved.

use crate::conversation::{ConversationStore, Message, Origin};
use termimad::MadSkin;

/// Text in, visual block out. Implementations keep no per-message state.
pub trait Renderer {
    fn render(&self, text: &str) -> String;
}

/// Leaves text untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainRenderer;

impl Renderer for PlainRenderer {
    fn render(&self, text: &str) -> String {
        text.to_string()
    }
}

/// Terminal markdown via termimad
pub struct MarkdownRenderer {
    skin: MadSkin,
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        let mut skin = MadSkin::default_dark();
        skin.inline_code
            .set_fg(termimad::crossterm::style::Color::Yellow);
        Self { skin }
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for MarkdownRenderer {
    fn render(&self, text: &str) -> String {
        self.skin.term_text(text).to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub origin: Origin,
    pub body: String,
}

impl RenderedMessage {
    pub fn label(&self) -> &'static str {
        self.origin.label()
    }
}

/// Rendered copy of a conversation log
#[derive(Debug, Default)]
pub struct LogView {
    revision: Option<u64>,
    epoch: u64,
    blocks: Vec<RenderedMessage>,
}

impl LogView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blocks(&self) -> &[RenderedMessage] {
        &self.blocks
    }

    /// Catch up with `store`; returns the blocks rendered by this call.
    ///
    /// The log is append-only, so only messages past the last rendered one
    /// go through the renderer. The view starts over whenever the log was
    /// discarded.
    pub fn refresh(
        &mut self,
        store: &ConversationStore,
        renderer: &dyn Renderer,
    ) -> Vec<RenderedMessage> {
        let revision = store.revision();
        if self.revision == Some(revision) {
            return Vec::new();
        }
        self.revision = Some(revision);

        let epoch = store.epoch();
        let messages = store.messages();
        if epoch != self.epoch || messages.len() < self.blocks.len() {
            self.epoch = epoch;
            self.blocks.clear();
        }

        let fresh: Vec<RenderedMessage> = messages[self.blocks.len()..]
            .iter()
            .map(|message| render_message(message, renderer))
            .collect();
        self.blocks.extend(fresh.iter().cloned());
        fresh
    }
}

pub fn render_message(message: &Message, renderer: &dyn Renderer) -> RenderedMessage {
    RenderedMessage {
        origin: message.origin(),
        body: renderer.render(message.text()),
    }
}
