use std::collections::HashMap;
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use parley_core::{
    AddReaction, ClientEvent, GateAction, JoinChannel, KeyOutcome, MentionTypeahead, NewMessage,
    Notification, NotificationGate, Permission, ReactionBoard, SearchRequest, SearchResponse,
    ServerEvent, TypeaheadKey, Typing, TypingThrottle, UserTyping, compose_message,
};
use ratatui::layout::{Position, Rect};

const TYPING_INDICATOR_TTL: Duration = Duration::from_secs(4);
const BANNER_TTL: Duration = Duration::from_secs(8);
const STATUS_TTL: Duration = Duration::from_secs(5);
pub const MAX_SUGGESTION_ROWS: usize = 5;
const REACT_COMMAND: &str = "/react";

// ---------------------------------------------------------------------------
// Display messages (what the UI renders)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayMessage {
    pub id: i64,
    pub user_id: Option<i64>,
    pub content: String,
    pub timestamp: Option<String>,
}

/// One-line notice shown above the separator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    PermissionPrompt,
    Mention(Notification),
    Typing,
    Status(String),
}

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

pub struct App {
    pub channel_id: i64,
    pub channel_name: Option<String>,
    pub user_id: Option<i64>,
    pub messages: Vec<DisplayMessage>,
    pub reactions: ReactionBoard,
    pub input: String,
    pub cursor_pos: usize,
    pub scroll_offset: u16,
    /// Maximum scroll offset (set by the renderer each frame).
    pub max_scroll: u16,
    pub should_quit: bool,
    /// Where the suggestion rows were drawn last frame, for mouse hits.
    pub suggestion_area: Option<Rect>,
    typeahead: MentionTypeahead,
    typing: TypingThrottle,
    notifications: NotificationGate,
    usernames: HashMap<i64, String>,
    banner: Option<(Notification, Instant)>,
    someone_typing: Option<Instant>,
    status: Option<(String, Instant)>,
    disconnected: bool,
    bell: bool,
    outgoing: Vec<ClientEvent>,
    searches: Vec<SearchRequest>,
}

impl App {
    pub fn new(
        channel_id: i64,
        user_id: Option<i64>,
        username: Option<String>,
        permission: Permission,
    ) -> Self {
        let mut usernames = HashMap::new();
        if let (Some(id), Some(name)) = (user_id, username) {
            usernames.insert(id, name);
        }

        Self {
            channel_id,
            channel_name: None,
            user_id,
            messages: Vec::new(),
            reactions: ReactionBoard::new(),
            input: String::new(),
            cursor_pos: 0,
            scroll_offset: 0,
            max_scroll: 0,
            should_quit: false,
            suggestion_area: None,
            typeahead: MentionTypeahead::new(),
            typing: TypingThrottle::default(),
            notifications: NotificationGate::new(permission),
            usernames,
            banner: None,
            someone_typing: None,
            status: None,
            disconnected: false,
            bell: false,
            outgoing: vec![ClientEvent::JoinChannel(JoinChannel { channel_id })],
            searches: Vec::new(),
        }
    }

    /// Handle a keyboard event. Returns true if the event was consumed.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return true;
        }

        if self.notifications.is_asking() && self.handle_permission_key(key) {
            return true;
        }

        let typeahead_key = match key.code {
            KeyCode::Up => Some(TypeaheadKey::Up),
            KeyCode::Down => Some(TypeaheadKey::Down),
            KeyCode::Enter => Some(TypeaheadKey::Enter),
            KeyCode::Esc => Some(TypeaheadKey::Escape),
            _ => None,
        };
        if let Some(typeahead_key) = typeahead_key {
            match self.typeahead.handle_key(typeahead_key, &self.input) {
                KeyOutcome::Committed(text) => {
                    self.replace_input(text);
                    return true;
                }
                KeyOutcome::Handled => return true,
                KeyOutcome::Ignored => {}
            }
        }

        match key.code {
            KeyCode::Enter => {
                self.submit();
                true
            }
            KeyCode::Esc => {
                self.banner = None;
                true
            }

            // Text input
            KeyCode::Char(c) => {
                self.insert_char(c);
                self.input_changed(Instant::now());
                true
            }
            KeyCode::Backspace => {
                if let Some(prev) = self.prev_char_boundary() {
                    self.input.remove(prev);
                    self.cursor_pos = prev;
                    self.input_changed(Instant::now());
                }
                true
            }
            KeyCode::Delete => {
                if self.cursor_pos < self.input.len() {
                    self.input.remove(self.cursor_pos);
                    self.input_changed(Instant::now());
                }
                true
            }
            KeyCode::Left => {
                if let Some(prev) = self.prev_char_boundary() {
                    self.cursor_pos = prev;
                }
                true
            }
            KeyCode::Right => {
                if let Some(c) = self.input[self.cursor_pos..].chars().next() {
                    self.cursor_pos += c.len_utf8();
                }
                true
            }
            KeyCode::Home => {
                self.cursor_pos = 0;
                true
            }
            KeyCode::End => {
                self.cursor_pos = self.input.len();
                true
            }

            // Scroll history
            KeyCode::PageUp | KeyCode::Up => {
                self.scroll_offset = self.scroll_offset.saturating_add(10).min(self.max_scroll);
                true
            }
            KeyCode::PageDown | KeyCode::Down => {
                self.scroll_offset = self.scroll_offset.saturating_sub(10);
                true
            }

            _ => false,
        }
    }

    /// Handle a mouse event.
    pub fn handle_mouse(&mut self, mouse: MouseEvent) {
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                let Some(area) = self.suggestion_area else {
                    return;
                };
                if self.suggestions().is_none()
                    || !area.contains(Position::new(mouse.column, mouse.row))
                {
                    return;
                }
                let index = self.suggestion_window_start() + (mouse.row - area.y) as usize;
                if let Some(text) = self.typeahead.select(index, &self.input) {
                    self.replace_input(text);
                }
            }
            MouseEventKind::ScrollUp => {
                self.scroll_offset = self.scroll_offset.saturating_add(3).min(self.max_scroll);
            }
            MouseEventKind::ScrollDown => {
                self.scroll_offset = self.scroll_offset.saturating_sub(3);
            }
            _ => {}
        }
    }

    pub fn handle_search_response(&mut self, response: SearchResponse) {
        for suggestion in &response.suggestions {
            if let Some(id) = suggestion.id {
                self.usernames.insert(id, suggestion.username.clone());
            }
        }
        if !self.typeahead.apply_response(response) {
            tracing::debug!("discarding stale search response");
        }
    }

    pub fn handle_server_event(&mut self, event: ServerEvent, now: Instant) {
        match event {
            ServerEvent::NewMention(mention) => match self.notifications.on_mention(&mention) {
                GateAction::Show(notification) => self.show_notification(notification, now),
                GateAction::RequestPermission => {
                    tracing::debug!("asking for notification permission");
                }
                GateAction::Deferred => {}
                GateAction::Drop => tracing::debug!("mention notification suppressed"),
            },
            ServerEvent::NewMessage(message) => self.push_message(message),
            ServerEvent::ReactionAdded(reaction) => self.reactions.apply(&reaction),
            ServerEvent::UserTyping(typing) => self.on_user_typing(&typing, now),
            ServerEvent::UserJoined(joined) => {
                tracing::info!(channel_id = ?joined.channel_id, "user joined");
            }
        }
    }

    /// The disconnect notice stays up; nothing reconnects.
    pub fn connection_lost(&mut self) {
        self.disconnected = true;
        self.someone_typing = None;
    }

    /// Shows a transient status line. It expires after a few seconds or
    /// on the next edit.
    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = Some((status.into(), Instant::now()));
    }

    /// Expires transient notices.
    pub fn on_tick(&mut self, now: Instant) {
        if self
            .someone_typing
            .is_some_and(|since| now.saturating_duration_since(since) >= TYPING_INDICATOR_TTL)
        {
            self.someone_typing = None;
        }
        if self
            .banner
            .as_ref()
            .is_some_and(|(_, since)| now.saturating_duration_since(*since) >= BANNER_TTL)
        {
            self.banner = None;
        }
        if self
            .status
            .as_ref()
            .is_some_and(|(_, since)| now.saturating_duration_since(*since) >= STATUS_TTL)
        {
            self.status = None;
        }
    }

    pub fn take_outgoing(&mut self) -> Vec<ClientEvent> {
        std::mem::take(&mut self.outgoing)
    }

    pub fn take_search_requests(&mut self) -> Vec<SearchRequest> {
        std::mem::take(&mut self.searches)
    }

    /// Returns true once per notification that should ring the bell.
    pub fn take_bell(&mut self) -> bool {
        std::mem::take(&mut self.bell)
    }

    pub fn notice(&self) -> Option<Notice> {
        if self.notifications.is_asking() {
            return Some(Notice::PermissionPrompt);
        }
        if let Some((notification, _)) = &self.banner {
            return Some(Notice::Mention(notification.clone()));
        }
        if let Some((status, _)) = &self.status {
            return Some(Notice::Status(status.clone()));
        }
        if self.disconnected {
            return Some(Notice::Status("Disconnected from server".to_string()));
        }
        self.someone_typing.map(|_| Notice::Typing)
    }

    pub fn suggestions(&self) -> Option<&[parley_core::Suggestion]> {
        self.typeahead
            .visible_suggestions()
            .filter(|suggestions| !suggestions.is_empty())
    }

    pub fn selected_suggestion(&self) -> Option<usize> {
        self.typeahead.selected_index()
    }

    /// First suggestion drawn when the list is longer than the popup. The
    /// popup height is whatever the last frame managed to draw.
    pub fn suggestion_window_start(&self) -> usize {
        let rows = self
            .suggestion_area
            .map_or(MAX_SUGGESTION_ROWS, |area| usize::from(area.height))
            .max(1);
        let count = self.suggestions().map_or(0, <[_]>::len);
        let selected = self.selected_suggestion().unwrap_or(0);
        selected
            .saturating_sub(rows - 1)
            .min(count.saturating_sub(rows))
    }

    /// A mention search is still out.
    pub fn is_searching(&self) -> bool {
        self.typeahead.is_searching()
    }

    pub fn author_label(&self, user_id: Option<i64>) -> String {
        match user_id {
            Some(id) if Some(id) == self.user_id => "You".to_string(),
            Some(id) => self
                .usernames
                .get(&id)
                .cloned()
                .unwrap_or_else(|| format!("user #{id}")),
            None => "unknown".to_string(),
        }
    }

    fn handle_permission_key(&mut self, key: KeyEvent) -> bool {
        let granted = match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => true,
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => false,
            _ => return false,
        };
        if let Some(notification) = self.notifications.resolve(granted) {
            self.show_notification(notification, Instant::now());
        }
        true
    }

    fn show_notification(&mut self, notification: Notification, now: Instant) {
        self.banner = Some((notification, now));
        self.bell = true;
    }

    fn push_message(&mut self, message: NewMessage) {
        if message
            .channel_id
            .is_some_and(|channel_id| channel_id != self.channel_id)
        {
            return;
        }
        if message.user_id != self.user_id {
            self.someone_typing = None;
        }
        self.messages.push(DisplayMessage {
            id: message.id,
            user_id: message.user_id,
            content: message.content,
            timestamp: message.timestamp,
        });
    }

    fn on_user_typing(&mut self, typing: &UserTyping, now: Instant) {
        if typing.user_id.is_some() && typing.user_id == self.user_id {
            return;
        }
        if typing
            .channel_id
            .is_some_and(|channel_id| channel_id != self.channel_id)
        {
            return;
        }
        self.someone_typing = Some(now);
    }

    fn submit(&mut self) {
        if let Some(emoji) = react_argument(&self.input) {
            let emoji = emoji.to_string();
            self.react_to_latest(&emoji);
            self.replace_input(String::new());
            self.typeahead.on_input("");
            return;
        }

        let Some(message) = compose_message(&mut self.input, Some(self.channel_id), self.user_id)
        else {
            return;
        };
        self.cursor_pos = 0;
        self.typing.reset();
        self.typeahead.on_input(&self.input);
        self.status = None;
        self.outgoing.push(ClientEvent::SendMessage(message));
    }

    fn react_to_latest(&mut self, emoji: &str) {
        let Some(user_id) = self.user_id else {
            self.set_status("Reactions need a logged-in user id");
            return;
        };
        let Some(message_id) = self.messages.last().map(|message| message.id) else {
            self.set_status("Nothing to react to yet");
            return;
        };
        self.outgoing.push(ClientEvent::AddReaction(AddReaction {
            message_id,
            emoji: emoji.to_string(),
            user_id,
        }));
    }

    fn input_changed(&mut self, now: Instant) {
        self.status = None;
        if let Some(request) = self.typeahead.on_input(&self.input) {
            self.searches.push(request);
        }
        if !self.input.is_empty() && self.typing.should_emit(now) {
            self.outgoing.push(ClientEvent::Typing(Typing {
                user_id: self.user_id,
                channel_id: Some(self.channel_id),
            }));
        }
    }

    fn replace_input(&mut self, text: String) {
        self.input = text;
        self.cursor_pos = self.input.len();
    }

    fn insert_char(&mut self, c: char) {
        self.input.insert(self.cursor_pos, c);
        self.cursor_pos += c.len_utf8();
    }

    fn prev_char_boundary(&self) -> Option<usize> {
        self.input[..self.cursor_pos]
            .char_indices()
            .next_back()
            .map(|(index, _)| index)
    }
}

fn react_argument(input: &str) -> Option<&str> {
    let rest = input.trim().strip_prefix(REACT_COMMAND)?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let emoji = rest.trim();
    (!emoji.is_empty()).then_some(emoji)
}
