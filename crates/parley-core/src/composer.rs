use std::time::{Duration, Instant};

use crate::event::SendMessage;

pub const TYPING_INTERVAL: Duration = Duration::from_secs(3);

pub type OutgoingMessage = SendMessage;

/// Turns the current input into a message for `channel_id`.
///
/// Returns `None` (leaving the input alone) when the trimmed text is empty or
/// no channel is selected; otherwise the input is cleared.
pub fn compose_message(
    input: &mut String,
    channel_id: Option<i64>,
    user_id: Option<i64>,
) -> Option<OutgoingMessage> {
    let content = input.trim();
    let channel_id = channel_id?;
    if content.is_empty() {
        return None;
    }

    let message = SendMessage {
        content: content.to_string(),
        channel_id,
        user_id,
    };
    input.clear();
    Some(message)
}

/// Rate limits `typing` notifications.
#[derive(Debug, Clone)]
pub struct TypingThrottle {
    interval: Duration,
    last_sent: Option<Instant>,
}

impl Default for TypingThrottle {
    fn default() -> Self {
        Self::new(TYPING_INTERVAL)
    }
}

impl TypingThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_sent: None,
        }
    }

    /// Returns true (and records the send) when a notification is due.
    pub fn should_emit(&mut self, now: Instant) -> bool {
        let due = self
            .last_sent
            .is_none_or(|last| now.saturating_duration_since(last) >= self.interval);
        if due {
            self.last_sent = Some(now);
        }
        due
    }

    pub fn reset(&mut self) {
        self.last_sent = None;
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::{TypingThrottle, compose_message};

    #[test]
    fn compose_trims_and_clears_input() {
        let mut input = "  hello @alice  ".to_string();
        let message = compose_message(&mut input, Some(4), Some(9)).expect("message");
        assert_eq!(message.content, "hello @alice");
        assert_eq!(message.channel_id, 4);
        assert_eq!(message.user_id, Some(9));
        assert!(input.is_empty());
    }

    #[test]
    fn compose_skips_blank_input() {
        let mut input = "   ".to_string();
        assert!(compose_message(&mut input, Some(4), None).is_none());
        assert_eq!(input, "   ");
    }

    #[test]
    fn compose_requires_channel() {
        let mut input = "hello".to_string();
        assert!(compose_message(&mut input, None, Some(1)).is_none());
        assert_eq!(input, "hello");
    }

    #[test]
    fn throttle_emits_once_per_interval() {
        let mut throttle = TypingThrottle::new(Duration::from_secs(3));
        let start = Instant::now();
        assert!(throttle.should_emit(start));
        assert!(!throttle.should_emit(start + Duration::from_secs(1)));
        assert!(throttle.should_emit(start + Duration::from_secs(3)));

        throttle.reset();
        assert!(throttle.should_emit(start + Duration::from_secs(4)));
    }
}
