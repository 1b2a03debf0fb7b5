//! crates/chatbot_builder_core/src/policy.rs
//!
//! Resource access-control policy.
//!
//! Authorization always resolves through a chatbot's owner. Rows that hang off
//! a chatbot are never trusted to describe their own ownership: the caller
//! loads the governing chatbot (and, for messages, the conversation) into a
//! [`Guard`] and the decision is made against that.

use std::fmt;

use crate::domain::{Caller, Chatbot, Conversation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    List,
    Read,
    Create,
    Update,
    Delete,
}

impl Action {
    fn verb(self) -> &'static str {
        match self {
            Action::List | Action::Read => "access",
            Action::Create | Action::Update => "modify",
            Action::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Chatbot,
    Source,
    Conversation,
    Message,
    Integration,
}

impl ResourceKind {
    pub fn label(self) -> &'static str {
        match self {
            ResourceKind::Chatbot => "chatbot",
            ResourceKind::Source => "source",
            ResourceKind::Conversation => "conversation",
            ResourceKind::Message => "message",
            ResourceKind::Integration => "integration",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The loaded ownership chain a request is checked against.
#[derive(Debug, Clone, Copy)]
pub enum Guard<'a> {
    /// Top-level chatbot collection of the caller.
    Account,
    Chatbot(&'a Chatbot),
    Conversation {
        conversation: &'a Conversation,
        chatbot: &'a Chatbot,
    },
}

impl Guard<'_> {
    fn label(&self) -> &'static str {
        match self {
            Guard::Account => "account",
            Guard::Chatbot(_) => "chatbot",
            Guard::Conversation { .. } => "conversation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(String),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

pub fn authorize(
    caller: Caller,
    action: Action,
    kind: ResourceKind,
    guard: &Guard<'_>,
) -> Decision {
    let allowed = match (guard, kind) {
        (Guard::Account, ResourceKind::Chatbot) => {
            matches!(action, Action::List | Action::Create) && caller.account_id().is_some()
        }
        (Guard::Chatbot(chatbot), ResourceKind::Chatbot) => match action {
            Action::Read => is_owner(caller, chatbot) || chatbot.is_public,
            Action::Update | Action::Delete => is_owner(caller, chatbot),
            Action::List | Action::Create => false,
        },
        (Guard::Chatbot(chatbot), ResourceKind::Source | ResourceKind::Integration) => {
            is_owner(caller, chatbot)
        }
        (Guard::Chatbot(chatbot), ResourceKind::Conversation) => match action {
            Action::List => is_owner(caller, chatbot),
            Action::Create => {
                is_owner(caller, chatbot) || (chatbot.is_public && caller.account_id().is_some())
            }
            // Single conversations are checked against their own guard.
            Action::Read | Action::Update | Action::Delete => false,
        },
        (Guard::Conversation { conversation, chatbot }, ResourceKind::Conversation) => {
            is_participant(caller, conversation) || is_owner(caller, chatbot)
        }
        (Guard::Conversation { conversation, chatbot }, ResourceKind::Message) => match action {
            Action::List | Action::Read | Action::Create => {
                is_participant(caller, conversation) || is_owner(caller, chatbot)
            }
            // Messages are append-only.
            Action::Update | Action::Delete => false,
        },
        _ => false,
    };

    if allowed {
        Decision::Allow
    } else {
        let object = match action {
            Action::List | Action::Create => guard.label(),
            Action::Read | Action::Update | Action::Delete => kind.label(),
        };
        Decision::Deny(format!(
            "You do not have permission to {} this {}",
            action.verb(),
            object
        ))
    }
}

fn is_owner(caller: Caller, chatbot: &Chatbot) -> bool {
    caller.is_account(chatbot.owner_account_id)
}

fn is_participant(caller: Caller, conversation: &Conversation) -> bool {
    match (caller.account_id(), conversation.account_id) {
        (Some(caller_id), Some(account_id)) => caller_id == account_id,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn chatbot(owner: Uuid, is_public: bool) -> Chatbot {
        Chatbot {
            id: Uuid::new_v4(),
            owner_account_id: owner,
            name: "Bot".into(),
            description: String::new(),
            welcome_message: String::new(),
            instructions: String::new(),
            avatar_url: None,
            primary_color: "#6366F1".into(),
            model_name: "gpt-3.5-turbo".into(),
            temperature: 0.7,
            is_public,
            max_tokens: 1000,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn conversation(chatbot: &Chatbot, account_id: Option<Uuid>) -> Conversation {
        Conversation {
            id: Uuid::new_v4(),
            chatbot_id: chatbot.id,
            account_id,
            visitor_id: None,
            title: "New conversation".into(),
            is_active: true,
            metadata: json!({}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn allows(caller: Caller, action: Action, kind: ResourceKind, guard: &Guard<'_>) -> bool {
        authorize(caller, action, kind, guard).is_allowed()
    }

    #[test]
    fn private_chatbot_is_closed_to_strangers() {
        let owner = Uuid::new_v4();
        let stranger = Caller::Account(Uuid::new_v4());
        let bot = chatbot(owner, false);
        let guard = Guard::Chatbot(&bot);

        for action in [Action::Read, Action::Update, Action::Delete] {
            assert!(
                !allows(stranger, action, ResourceKind::Chatbot, &guard),
                "{action:?} should be denied"
            );
            assert!(
                allows(Caller::Account(owner), action, ResourceKind::Chatbot, &guard),
                "{action:?} should be allowed for the owner"
            );
        }
    }

    #[test]
    fn public_chatbot_is_readable_but_not_writable_by_anyone() {
        let bot = chatbot(Uuid::new_v4(), true);
        let guard = Guard::Chatbot(&bot);
        let stranger = Caller::Account(Uuid::new_v4());

        assert!(allows(Caller::Anonymous, Action::Read, ResourceKind::Chatbot, &guard));
        assert!(allows(stranger, Action::Read, ResourceKind::Chatbot, &guard));
        assert_eq!(
            authorize(stranger, Action::Update, ResourceKind::Chatbot, &guard),
            Decision::Deny("You do not have permission to modify this chatbot".into())
        );
    }

    #[test]
    fn sources_and_integrations_follow_the_chatbot_owner_even_when_public() {
        let owner = Uuid::new_v4();
        let bot = chatbot(owner, true);
        let guard = Guard::Chatbot(&bot);
        let stranger = Caller::Account(Uuid::new_v4());
        let actions = [Action::List, Action::Read, Action::Create, Action::Update, Action::Delete];

        for kind in [ResourceKind::Source, ResourceKind::Integration] {
            for action in actions {
                assert!(!allows(stranger, action, kind, &guard));
                assert!(allows(Caller::Account(owner), action, kind, &guard));
            }
        }
    }

    #[test]
    fn creating_chatbots_requires_an_account() {
        let account = Caller::Account(Uuid::new_v4());
        assert!(allows(account, Action::Create, ResourceKind::Chatbot, &Guard::Account));
        assert!(!allows(Caller::Anonymous, Action::Create, ResourceKind::Chatbot, &Guard::Account));
    }

    #[test]
    fn conversation_access_for_participant_and_owner_only() {
        let owner = Uuid::new_v4();
        let participant = Uuid::new_v4();
        let bot = chatbot(owner, true);
        let convo = conversation(&bot, Some(participant));
        let guard = Guard::Conversation { conversation: &convo, chatbot: &bot };
        let kind = ResourceKind::Conversation;

        assert!(allows(Caller::Account(participant), Action::Read, kind, &guard));
        assert!(allows(Caller::Account(owner), Action::Delete, kind, &guard));
        assert!(!allows(Caller::Account(Uuid::new_v4()), Action::Read, kind, &guard));
    }

    #[test]
    fn anonymous_caller_never_matches_an_unattributed_conversation() {
        let bot = chatbot(Uuid::new_v4(), true);
        let convo = conversation(&bot, None);
        let guard = Guard::Conversation { conversation: &convo, chatbot: &bot };

        assert!(!allows(Caller::Anonymous, Action::List, ResourceKind::Message, &guard));
    }

    #[test]
    fn public_chatbot_accepts_conversations_from_any_account() {
        let bot = chatbot(Uuid::new_v4(), true);
        let private = chatbot(Uuid::new_v4(), false);
        let visitor = Caller::Account(Uuid::new_v4());
        let kind = ResourceKind::Conversation;

        assert!(allows(visitor, Action::Create, kind, &Guard::Chatbot(&bot)));
        assert!(!allows(visitor, Action::Create, kind, &Guard::Chatbot(&private)));
        assert!(!allows(visitor, Action::List, kind, &Guard::Chatbot(&bot)));
    }

    #[test]
    fn messages_are_never_editable() {
        let owner = Uuid::new_v4();
        let bot = chatbot(owner, false);
        let convo = conversation(&bot, Some(owner));
        let guard = Guard::Conversation { conversation: &convo, chatbot: &bot };

        assert!(!allows(Caller::Account(owner), Action::Update, ResourceKind::Message, &guard));
        assert!(allows(Caller::Account(owner), Action::Create, ResourceKind::Message, &guard));
    }
}
