//! Scripted chat cycler.

use std::time::Duration;

use super::{send_action, DriverContext};
use crate::transport::Action;

/// One step of the cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatLine {
    Text(String),
    /// Entry at this index is blank after trimming.
    Blank(usize),
}

/// Ordered list of chat lines with a wrapping cursor.
#[derive(Debug, Clone)]
pub struct ChatCycler {
    messages: Vec<String>,
    cursor: usize,
}

impl ChatCycler {
    /// Returns `None` when there is nothing to cycle through.
    pub fn new(messages: Vec<String>) -> Option<Self> {
        if messages.is_empty() {
            return None;
        }
        Some(Self { messages, cursor: 0 })
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Take the line under the cursor and move to the next one.
    pub fn advance(&mut self) -> ChatLine {
        let index = self.cursor;
        self.cursor = (self.cursor + 1) % self.messages.len();

        let text = self.messages[index].trim();
        if text.is_empty() {
            ChatLine::Blank(index)
        } else {
            ChatLine::Text(text.to_string())
        }
    }
}

pub(super) async fn run(ctx: DriverContext, mut cycler: ChatCycler, period: Duration) {
    let mut ticker = super::ticker(period);
    loop {
        tokio::select! {
            _ = ctx.token.cancelled() => break,
            _ = ticker.tick() => {
                if !ctx.gate.is_open() {
                    continue;
                }
                match cycler.advance() {
                    ChatLine::Blank(index) => {
                        tracing::warn!(server = %ctx.label, index, "Empty chat message, skipping");
                    }
                    ChatLine::Text(text) => {
                        if send_action(&ctx, &Action::Chat(text.clone())) {
                            tracing::info!(server = %ctx.label, message = %text, "Sent chat message");
                        } else {
                            tracing::error!(server = %ctx.label, message = %text, "Failed to send chat message");
                        }
                    }
                }
            }
        }
    }
}
