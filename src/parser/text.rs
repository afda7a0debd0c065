//! Message text that may be a plain string or a list of styled spans.
//!
//! Exports such as Telegram's encode `text` either as a string or as an array
//! mixing bare strings with tagged objects (`{"type": "bold", "text": "hi"}`).
//! Both shapes resolve here into [`MessageText`] so that business logic never
//! inspects raw JSON types.

use serde::Deserialize;
use serde_json::Value;

/// The styling carried by a span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpanKind {
    /// Unstyled text.
    Plain,
    /// Bold.
    Bold,
    /// Italic.
    Italic,
    /// Underline.
    Underline,
    /// Strikethrough.
    Strikethrough,
    /// Inline code.
    Code,
    /// Preformatted block.
    Pre {
        /// Language hint, if any.
        language: Option<String>,
    },
    /// Link with custom text.
    TextLink {
        /// Link target.
        href: String,
    },
    /// Bare URL.
    Link,
    /// `#hashtag`.
    Hashtag,
    /// `$CASHTAG`.
    Cashtag,
    /// `@handle` mention.
    Mention,
    /// Mention of a user without a public handle.
    MentionName {
        /// Provider user ID.
        user_id: String,
    },
    /// Email address.
    Email,
    /// Phone number.
    Phone,
    /// `/command`.
    BotCommand,
    /// Spoiler.
    Spoiler,
    /// Block quote.
    Blockquote,
    /// A tag this crate does not know.
    Unknown(String),
}

impl SpanKind {
    fn from_tag(tag: &str, href: Option<String>, user_id: Option<String>, language: Option<String>) -> Self {
        match tag {
            "plain" | "" => Self::Plain,
            "bold" => Self::Bold,
            "italic" => Self::Italic,
            "underline" => Self::Underline,
            "strikethrough" => Self::Strikethrough,
            "code" => Self::Code,
            "pre" => Self::Pre { language },
            "text_link" => match href {
                Some(href) => Self::TextLink { href },
                None => Self::Link,
            },
            "link" => Self::Link,
            "hashtag" => Self::Hashtag,
            "cashtag" => Self::Cashtag,
            "mention" => Self::Mention,
            "mention_name" => match user_id {
                Some(user_id) => Self::MentionName { user_id },
                None => Self::Mention,
            },
            "email" => Self::Email,
            "phone" => Self::Phone,
            "bot_command" => Self::BotCommand,
            "spoiler" => Self::Spoiler,
            "blockquote" => Self::Blockquote,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// A run of text with one style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    /// Styling.
    pub kind: SpanKind,
    /// The text.
    pub text: String,
}

impl Span {
    /// Create an unstyled span.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            kind: SpanKind::Plain,
            text: text.into(),
        }
    }

    /// Create a span of the given kind.
    pub fn new(kind: SpanKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// Resolved message text.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawText")]
pub enum MessageText {
    /// A plain string.
    PlainText(String),
    /// A sequence of styled spans.
    Spans(Vec<Span>),
}

impl Default for MessageText {
    fn default() -> Self {
        Self::PlainText(String::new())
    }
}

impl MessageText {
    /// Concatenate all text, dropping styling.
    #[must_use]
    pub fn flatten(&self) -> String {
        match self {
            Self::PlainText(s) => s.clone(),
            Self::Spans(spans) => spans.iter().map(|s| s.text.as_str()).collect(),
        }
    }

    /// Collapse spans into a plain string.
    #[must_use]
    pub fn into_plain(self) -> Self {
        match self {
            Self::PlainText(_) => self,
            Self::Spans(_) => Self::PlainText(self.flatten()),
        }
    }

    /// Whether the text is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::PlainText(s) => s.is_empty(),
            Self::Spans(spans) => spans.iter().all(|s| s.text.is_empty()),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawText {
    Plain(String),
    Parts(Vec<RawPart>),
    Null(()),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPart {
    Plain(String),
    Tagged(RawSpan),
    Other(Value),
}

#[derive(Deserialize)]
struct RawSpan {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    href: Option<String>,
    #[serde(default)]
    user_id: Option<Value>,
    #[serde(default)]
    language: Option<String>,
}

impl From<RawText> for MessageText {
    fn from(raw: RawText) -> Self {
        match raw {
            RawText::Plain(s) => Self::PlainText(s),
            RawText::Null(()) => Self::default(),
            RawText::Parts(parts) => Self::Spans(
                parts
                    .into_iter()
                    .filter_map(|part| match part {
                        RawPart::Plain(s) => Some(Span::plain(s)),
                        RawPart::Tagged(span) => {
                            let user_id = span.user_id.map(|v| match v {
                                Value::String(s) => s,
                                other => other.to_string(),
                            });
                            let kind = SpanKind::from_tag(&span.kind, span.href, user_id, span.language);
                            Some(Span::new(kind, span.text))
                        }
                        RawPart::Other(_) => None,
                    })
                    .collect(),
            ),
        }
    }
}
