pub mod provider;
pub mod state;
pub mod trigger;

pub use provider::{SearchRequest, SearchResponse, SearchWorker, Suggestion, UserSearch};
pub use state::{KeyOutcome, MentionTypeahead, TypeaheadKey};
pub use trigger::{MentionTrigger, detect_mention, splice_mention};
