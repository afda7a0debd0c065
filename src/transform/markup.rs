//! Inline styling conversion to the target markdown dialect.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::parser::{MessageText, Span, SpanKind};

use super::mentions::{rewrite_slack_tokens, NameIndex};

static SLACK_BOLD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(^|[\s(\[{])\*([^*\n]+?)\*").expect("valid regex"));
static SLACK_STRIKE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(^|[\s(\[{])~([^~\n]+?)~").expect("valid regex"));

fn unescape_slack(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Convert Slack message text.
///
/// Styling (`*bold*`, `~strike~`) is converted first, then `<...>` tokens,
/// then HTML entities. With `skip_markup` only mentions are rewritten.
#[must_use]
pub fn convert_slack_text(text: &str, index: &NameIndex, skip_markup: bool) -> String {
    if skip_markup {
        return unescape_slack(&rewrite_slack_tokens(text, index, false));
    }
    let styled = SLACK_BOLD.replace_all(text, "$1**$2**");
    let styled = SLACK_STRIKE.replace_all(&styled, "$1~~$2~~");
    unescape_slack(&rewrite_slack_tokens(&styled, index, true))
}

/// Wrap the non-whitespace core of `text`, keeping surrounding spaces outside
/// the delimiters.
fn wrap(text: &str, open: &str, close: &str) -> String {
    let core = text.trim();
    if core.is_empty() {
        return text.to_string();
    }
    let start = text.len() - text.trim_start().len();
    let end = start + core.len();
    format!("{}{open}{core}{close}{}", &text[..start], &text[end..])
}

fn render_span(span: &Span, index: &NameIndex) -> String {
    let text = span.text.as_str();
    match &span.kind {
        SpanKind::Plain
        | SpanKind::Underline
        | SpanKind::Spoiler
        | SpanKind::Link
        | SpanKind::Hashtag
        | SpanKind::Cashtag
        | SpanKind::Mention
        | SpanKind::Email
        | SpanKind::Phone
        | SpanKind::BotCommand => text.to_string(),
        SpanKind::Bold => wrap(text, "**", "**"),
        SpanKind::Italic => wrap(text, "_", "_"),
        SpanKind::Strikethrough => wrap(text, "~~", "~~"),
        SpanKind::Code => wrap(text, "`", "`"),
        SpanKind::Pre { language } => {
            let language = language.as_deref().unwrap_or_default();
            format!("```{language}\n{}\n```", text.trim_end_matches('\n'))
        }
        SpanKind::TextLink { href } => format!("[{text}]({href})"),
        SpanKind::Blockquote => text
            .lines()
            .map(|line| format!("> {line}"))
            .collect::<Vec<_>>()
            .join("\n"),
        SpanKind::MentionName { user_id } => {
            let key = if user_id.starts_with("user") {
                user_id.clone()
            } else {
                format!("user{user_id}")
            };
            match index.username(&key) {
                Some(username) => format!("@{username}"),
                None => {
                    warn!(user_id = %user_id, "Unresolved mention, keeping provider ID");
                    format!("@{key}")
                }
            }
        }
        SpanKind::Unknown(tag) => {
            warn!(tag = %tag, "Unknown text entity, keeping plain text");
            text.to_string()
        }
    }
}

/// Render Telegram message text as markdown.
#[must_use]
pub fn render_telegram_text(text: &MessageText, index: &NameIndex, skip_markup: bool) -> String {
    match text {
        MessageText::PlainText(s) => s.clone(),
        MessageText::Spans(_) if skip_markup => text.flatten(),
        MessageText::Spans(spans) => spans.iter().map(|span| render_span(span, index)).collect(),
    }
}
