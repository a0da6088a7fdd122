pub mod composer;
pub mod error;
pub mod event;
pub mod notify;
pub mod reactions;
pub mod typeahead;

pub use composer::{OutgoingMessage, TypingThrottle, compose_message};
pub use error::{Error, Result};
pub use event::{
    AddReaction, ClientEvent, JoinChannel, NewMention, NewMessage, ReactionAdded, SendMessage,
    ServerEvent, Typing, UserJoined, UserTyping,
};
pub use notify::{GateAction, Notification, NotificationGate, Permission};
pub use reactions::ReactionBoard;
pub use typeahead::{
    KeyOutcome, MentionTrigger, MentionTypeahead, SearchRequest, SearchResponse, SearchWorker,
    Suggestion, TypeaheadKey, UserSearch, detect_mention, splice_mention,
};
