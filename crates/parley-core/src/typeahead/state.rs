use crate::typeahead::provider::{SearchRequest, SearchResponse, Suggestion};
use crate::typeahead::trigger::{detect_mention, splice_mention};

/// Keys the typeahead reacts to while its list is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeaheadKey {
    Up,
    Down,
    Enter,
    Escape,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    /// The typeahead did not use the key; the input should handle it.
    Ignored,
    /// The key only changed typeahead state.
    Handled,
    /// A suggestion was committed; the input must become this text.
    Committed(String),
}

/// Mention typeahead for a single input.
///
/// The state is plain data: the owner feeds it input changes and search
/// responses and acts on what it returns. Searches are tagged with a
/// monotonically increasing sequence number and only a response for the most
/// recent request is ever applied.
#[derive(Debug, Default)]
pub struct MentionTypeahead {
    suggestions: Vec<Suggestion>,
    selected_index: Option<usize>,
    visible: bool,
    last_seq: u64,
    pending_seq: Option<u64>,
}

impl MentionTypeahead {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call after every edit of the input. Returns the search to run when the
    /// input ends in a mention; otherwise hides and clears the list.
    pub fn on_input(&mut self, input: &str) -> Option<SearchRequest> {
        let Some(trigger) = detect_mention(input) else {
            self.clear();
            return None;
        };

        self.last_seq = self.last_seq.wrapping_add(1);
        self.pending_seq = Some(self.last_seq);
        Some(SearchRequest {
            seq: self.last_seq,
            query: trigger.partial.to_string(),
        })
    }

    /// Applies a search response. Returns `false` (and changes nothing) when
    /// the response is for anything but the latest outstanding request.
    pub fn apply_response(&mut self, response: SearchResponse) -> bool {
        if self.pending_seq != Some(response.seq) {
            tracing::debug!(
                seq = response.seq,
                latest = self.last_seq,
                "discarding stale search response"
            );
            return false;
        }

        self.pending_seq = None;
        self.suggestions = response.suggestions;
        self.selected_index = None;
        self.visible = true;
        true
    }

    pub fn handle_key(&mut self, key: TypeaheadKey, input: &str) -> KeyOutcome {
        if !self.is_navigable() {
            return KeyOutcome::Ignored;
        }

        match key {
            TypeaheadKey::Down => {
                let last = self.suggestions.len() - 1;
                self.selected_index = Some(match self.selected_index {
                    None => 0,
                    Some(index) => (index + 1).min(last),
                });
                KeyOutcome::Handled
            }
            TypeaheadKey::Up => {
                self.selected_index = match self.selected_index {
                    None | Some(0) => None,
                    Some(index) => Some(index - 1),
                };
                KeyOutcome::Handled
            }
            TypeaheadKey::Enter => match self.selected_index {
                Some(index) => self
                    .select(index, input)
                    .map_or(KeyOutcome::Ignored, KeyOutcome::Committed),
                None => KeyOutcome::Ignored,
            },
            TypeaheadKey::Escape => {
                // Hide only: the selection survives until new results arrive.
                self.visible = false;
                KeyOutcome::Handled
            }
        }
    }

    /// Commits the suggestion at `index`, returning the new input text.
    /// Out-of-range indices are ignored.
    pub fn select(&mut self, index: usize, input: &str) -> Option<String> {
        let suggestion = self.suggestions.get(index)?;
        let spliced = splice_mention(input, &suggestion.username)?;
        self.clear();
        Some(spliced)
    }

    /// Suggestions to draw, or `None` while the list is hidden.
    pub fn visible_suggestions(&self) -> Option<&[Suggestion]> {
        self.visible.then_some(self.suggestions.as_slice())
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected_index
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// True while a search for the current trigger has not come back yet.
    pub fn is_searching(&self) -> bool {
        self.pending_seq.is_some()
    }

    fn is_navigable(&self) -> bool {
        self.visible && !self.suggestions.is_empty()
    }

    fn clear(&mut self) {
        self.suggestions.clear();
        self.selected_index = None;
        self.visible = false;
        self.pending_seq = None;
    }
}
