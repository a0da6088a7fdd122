use serde::{Deserialize, Serialize};

use crate::event::NewMention;

pub const MENTION_TITLE: &str = "You were mentioned";
const BODY_MAX_CHARS: usize = 100;

/// Whether mention notifications may be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Granted,
    Denied,
    #[default]
    Undetermined,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
}

impl Notification {
    pub fn for_mention(mention: &NewMention) -> Self {
        Self {
            title: MENTION_TITLE.to_string(),
            body: mention.content.chars().take(BODY_MAX_CHARS).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateAction {
    Show(Notification),
    /// Ask the user once; the notification is held until [`NotificationGate::resolve`].
    RequestPermission,
    /// Waiting on an earlier request; the newest notification replaced the held one.
    Deferred,
    Drop,
}

/// Decides what happens to mention notifications.
///
/// The permission is asked for at most once per gate; after that the answer
/// sticks for the lifetime of the gate.
#[derive(Debug, Default)]
pub struct NotificationGate {
    permission: Permission,
    asking: bool,
    held: Option<Notification>,
}

impl NotificationGate {
    pub fn new(permission: Permission) -> Self {
        Self {
            permission,
            asking: false,
            held: None,
        }
    }

    pub fn permission(&self) -> Permission {
        self.permission
    }

    pub fn is_asking(&self) -> bool {
        self.asking
    }

    pub fn on_mention(&mut self, mention: &NewMention) -> GateAction {
        let notification = Notification::for_mention(mention);
        match self.permission {
            Permission::Granted => GateAction::Show(notification),
            Permission::Denied => GateAction::Drop,
            Permission::Undetermined => {
                self.held = Some(notification);
                if self.asking {
                    GateAction::Deferred
                } else {
                    self.asking = true;
                    GateAction::RequestPermission
                }
            }
        }
    }

    /// Records the user's answer. Returns the held notification when access
    /// was granted.
    pub fn resolve(&mut self, granted: bool) -> Option<Notification> {
        self.asking = false;
        self.permission = if granted {
            Permission::Granted
        } else {
            Permission::Denied
        };

        let held = self.held.take();
        if granted { held } else { None }
    }
}
