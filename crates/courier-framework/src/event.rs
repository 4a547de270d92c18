//! Event kinds and update classification.

use std::fmt;
use std::str::FromStr;

use crate::error::DispatchError;
use crate::model::Update;

/// The kinds of event a handler can subscribe to.
///
/// `Ready` fires once after the bot has identified itself. Every other kind
/// is derived from an incoming [`Update`] by [`EventKind::classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Ready,
    Update,
    Text,
    Audio,
    Document,
    Photo,
    Sticker,
    Video,
    Voice,
    Contact,
    Location,
    NewChatParticipant,
    LeftChatParticipant,
    NewChatTitle,
    NewChatPhoto,
    DeleteChatPhoto,
    GroupChatCreated,
    SupergroupChatCreated,
    ChannelChatCreated,
    InlineQuery,
}

impl EventKind {
    /// Kinds selected by a message field, in the order handlers are scheduled.
    pub const MESSAGE_KINDS: [EventKind; 17] = [
        Self::Text,
        Self::Audio,
        Self::Document,
        Self::Photo,
        Self::Sticker,
        Self::Video,
        Self::Voice,
        Self::Contact,
        Self::Location,
        Self::NewChatParticipant,
        Self::LeftChatParticipant,
        Self::NewChatTitle,
        Self::NewChatPhoto,
        Self::DeleteChatPhoto,
        Self::GroupChatCreated,
        Self::SupergroupChatCreated,
        Self::ChannelChatCreated,
    ];

    /// Every kind, `Ready` first.
    pub const ALL: [EventKind; 20] = [
        Self::Ready,
        Self::Update,
        Self::Text,
        Self::Audio,
        Self::Document,
        Self::Photo,
        Self::Sticker,
        Self::Video,
        Self::Voice,
        Self::Contact,
        Self::Location,
        Self::NewChatParticipant,
        Self::LeftChatParticipant,
        Self::NewChatTitle,
        Self::NewChatPhoto,
        Self::DeleteChatPhoto,
        Self::GroupChatCreated,
        Self::SupergroupChatCreated,
        Self::ChannelChatCreated,
        Self::InlineQuery,
    ];

    /// Returns the snake_case tag. For message kinds this is also the name
    /// of the message field that selects them.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Update => "update",
            Self::Text => "text",
            Self::Audio => "audio",
            Self::Document => "document",
            Self::Photo => "photo",
            Self::Sticker => "sticker",
            Self::Video => "video",
            Self::Voice => "voice",
            Self::Contact => "contact",
            Self::Location => "location",
            Self::NewChatParticipant => "new_chat_participant",
            Self::LeftChatParticipant => "left_chat_participant",
            Self::NewChatTitle => "new_chat_title",
            Self::NewChatPhoto => "new_chat_photo",
            Self::DeleteChatPhoto => "delete_chat_photo",
            Self::GroupChatCreated => "group_chat_created",
            Self::SupergroupChatCreated => "supergroup_chat_created",
            Self::ChannelChatCreated => "channel_chat_created",
            Self::InlineQuery => "inline_query",
        }
    }

    /// Returns `true` for kinds whose handlers receive a message.
    pub fn is_message_kind(&self) -> bool {
        Self::MESSAGE_KINDS.contains(self)
    }

    /// Returns the kinds an update fires, in scheduling order.
    ///
    /// `Update` always comes first. Message kinds follow in the fixed order of
    /// [`MESSAGE_KINDS`](Self::MESSAGE_KINDS), one for each truthy field of
    /// the message. `InlineQuery` comes last.
    pub fn classify(update: &Update) -> Vec<EventKind> {
        let mut kinds = vec![Self::Update];

        if let Some(message) = &update.message {
            kinds.extend(
                Self::MESSAGE_KINDS
                    .into_iter()
                    .filter(|kind| message.has_field(kind.as_str())),
            );
        }

        if update.has_inline_query() {
            kinds.push(Self::InlineQuery);
        }

        kinds
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| DispatchError::UnknownEventKind(s.to_string()))
    }
}
