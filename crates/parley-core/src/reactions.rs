use std::collections::HashMap;

use crate::event::ReactionAdded;

/// Reaction counts per message, in the order each emoji first appeared.
#[derive(Debug, Default, Clone)]
pub struct ReactionBoard {
    by_message: HashMap<i64, Vec<(String, u32)>>,
}

impl ReactionBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a server-side count. The server sends the full count for the
    /// emoji, so this overwrites rather than increments; zero removes it.
    pub fn apply(&mut self, event: &ReactionAdded) {
        let entries = self.by_message.entry(event.message_id).or_default();
        match entries.iter().position(|(emoji, _)| *emoji == event.emoji) {
            Some(index) if event.count == 0 => {
                entries.remove(index);
            }
            Some(index) => entries[index].1 = event.count,
            None if event.count > 0 => entries.push((event.emoji.clone(), event.count)),
            None => {}
        }

        if entries.is_empty() {
            self.by_message.remove(&event.message_id);
        }
    }

    pub fn reactions(&self, message_id: i64) -> &[(String, u32)] {
        self.by_message
            .get(&message_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Renders e.g. `👍 2  🎉 1`.
    pub fn label(&self, message_id: i64) -> Option<String> {
        let reactions = self.reactions(message_id);
        if reactions.is_empty() {
            return None;
        }
        Some(
            reactions
                .iter()
                .map(|(emoji, count)| format!("{emoji} {count}"))
                .collect::<Vec<_>>()
                .join("  "),
        )
    }
}
