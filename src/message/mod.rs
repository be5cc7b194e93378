pub mod compile;
pub mod split;

/// Hard per-message text limit imposed by the platform.
pub const TEXT_LIMIT: usize = 640;

/// A card button. `target` is either a URL (anything starting with "http")
/// or an opaque postback token; when absent the label doubles as the token.
#[derive(Debug, Clone, PartialEq)]
pub struct Button {
    pub label: String,
    pub target: Option<String>,
}

impl Button {
    pub fn postback(label: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            target: Some(payload.into()),
        }
    }

    pub fn url(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            target: Some(url.into()),
        }
    }
}

/// One quick-reply option shown under a prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct QuickReply {
    pub label: String,
    pub payload: String,
}

impl QuickReply {
    pub fn new(label: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            payload: payload.into(),
        }
    }
}

/// Platform-agnostic description of one outbound message unit.
///
/// Flow handlers and the NLU client both emit sequences of these; the
/// compiler turns them into platform message objects.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageDescriptor {
    Text {
        text: String,
    },
    /// Consecutive cards are grouped into a single carousel at compile time.
    Card {
        title: String,
        image_url: String,
        subtitle: Option<String>,
        buttons: Vec<Button>,
    },
    QuickReplies {
        title: Option<String>,
        options: Vec<QuickReply>,
    },
    Image {
        url: Option<String>,
    },
    /// Escape hatch: sent to the platform verbatim.
    Custom {
        raw: serde_json::Value,
    },
    /// A control message (e.g. "typing_on"), not a content message.
    SenderAction {
        kind: String,
    },
}

impl MessageDescriptor {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn quick_replies(title: impl Into<String>, options: Vec<QuickReply>) -> Self {
        Self::QuickReplies {
            title: Some(title.into()),
            options,
        }
    }
}

/// Platform-ready output of the compiler. Content messages get the typing
/// pre-roll and pacing delay on delivery; actions are dispatched directly.
#[derive(Debug, Clone, PartialEq)]
pub enum CompiledMessage {
    Content(serde_json::Value),
    Action(String),
}
