//! Emoji name lookup.
//!
//! The table is built once and handed to the transformer by reference.
//! Reactions carry either a Unicode emoji (Telegram) or a short name
//! (Slack); both resolve to the target platform's canonical name here.
//! Names the target spells differently are listed below; every other
//! standard emoji resolves through the `emojis` shortcode database.

use std::collections::{HashMap, HashSet};

/// Unicode emoji whose canonical name differs from the first shortcode.
const UNICODE_NAMES: &[(&str, &str)] = &[
    ("👍", "+1"),
    ("👎", "-1"),
    ("❤", "heart"),
    ("🔥", "fire"),
    ("🥰", "smiling_face_with_3_hearts"),
    ("👏", "clap"),
    ("😁", "grin"),
    ("🤔", "thinking_face"),
    ("🤯", "exploding_head"),
    ("😱", "scream"),
    ("🤬", "face_with_symbols_on_mouth"),
    ("😢", "cry"),
    ("🎉", "tada"),
    ("🤩", "star-struck"),
    ("🤮", "face_vomiting"),
    ("💩", "hankey"),
    ("🙏", "pray"),
    ("👌", "ok_hand"),
    ("🕊", "dove_of_peace"),
    ("🤡", "clown_face"),
    ("🥱", "yawning_face"),
    ("🥴", "woozy_face"),
    ("😍", "heart_eyes"),
    ("🐳", "whale"),
    ("🌚", "new_moon_with_face"),
    ("🌭", "hotdog"),
    ("💯", "100"),
    ("🤣", "rolling_on_the_floor_laughing"),
    ("⚡", "zap"),
    ("🍌", "banana"),
    ("🏆", "trophy"),
    ("💔", "broken_heart"),
    ("🤨", "face_with_raised_eyebrow"),
    ("😐", "neutral_face"),
    ("🍓", "strawberry"),
    ("🍾", "champagne"),
    ("💋", "kiss"),
    ("🖕", "middle_finger"),
    ("😈", "smiling_imp"),
    ("😴", "sleeping"),
    ("😭", "sob"),
    ("🤓", "nerd_face"),
    ("👻", "ghost"),
    ("👀", "eyes"),
    ("🎃", "jack_o_lantern"),
    ("🙈", "see_no_evil"),
    ("😇", "innocent"),
    ("😨", "fearful"),
    ("🤝", "handshake"),
    ("✍", "writing_hand"),
    ("🤗", "hugging_face"),
    ("🫡", "saluting_face"),
    ("🎅", "santa"),
    ("🎄", "christmas_tree"),
    ("☃", "snowman"),
    ("💅", "nail_care"),
    ("🤪", "zany_face"),
    ("🗿", "moyai"),
    ("🆒", "cool"),
    ("💘", "cupid"),
    ("🙉", "hear_no_evil"),
    ("🦄", "unicorn_face"),
    ("😘", "kissing_heart"),
    ("💊", "pill"),
    ("🙊", "speak_no_evil"),
    ("😎", "sunglasses"),
    ("👾", "space_invader"),
    ("🤷", "shrug"),
    ("😡", "rage"),
    ("😂", "joy"),
    ("😀", "grinning"),
    ("😃", "smiley"),
    ("😄", "smile"),
    ("😅", "sweat_smile"),
    ("😆", "laughing"),
    ("😉", "wink"),
    ("😊", "blush"),
    ("🙂", "slightly_smiling_face"),
    ("🙃", "upside_down_face"),
    ("😮", "open_mouth"),
    ("😕", "confused"),
    ("🚀", "rocket"),
    ("✅", "white_check_mark"),
    ("❌", "x"),
    ("⭐", "star"),
    ("👋", "wave"),
    ("💪", "muscle"),
    ("🙌", "raised_hands"),
];

/// Short-name aliases mapped to their canonical name.
const ALIASES: &[(&str, &str)] = &[
    ("thumbsup", "+1"),
    ("thumbsdown", "-1"),
    ("poop", "hankey"),
    ("shit", "hankey"),
    ("simple_smile", "slightly_smiling_face"),
    ("heavy_check_mark", "white_check_mark"),
    ("laughing", "laughing"),
    ("satisfied", "laughing"),
    ("thinking", "thinking_face"),
    ("party_popper", "tada"),
    ("hugs", "hugging_face"),
    ("clown", "clown_face"),
    ("unicorn", "unicorn_face"),
    ("red_heart", "heart"),
    ("pleading_face", "pleading_face"),
    ("slightly_frowning_face", "slightly_frowning_face"),
    ("white_frowning_face", "slightly_frowning_face"),
];

/// Immutable emoji lookup.
#[derive(Debug, Clone)]
pub struct EmojiTable {
    by_unicode: HashMap<&'static str, &'static str>,
    aliases: HashMap<&'static str, &'static str>,
    names: HashSet<&'static str>,
}

impl EmojiTable {
    /// The built-in table.
    #[must_use]
    pub fn builtin() -> Self {
        let by_unicode: HashMap<_, _> = UNICODE_NAMES.iter().copied().collect();
        let aliases: HashMap<_, _> = ALIASES.iter().copied().collect();
        let names = UNICODE_NAMES
            .iter()
            .map(|(_, name)| *name)
            .chain(aliases.values().copied())
            .collect();
        Self {
            by_unicode,
            aliases,
            names,
        }
    }

    /// Canonical name for a Unicode emoji.
    ///
    /// Variation selectors and skin-tone modifiers are ignored.
    #[must_use]
    pub fn name_for_unicode(&self, emoji: &str) -> Option<&'static str> {
        if let Some(name) = self.by_unicode.get(emoji) {
            return Some(*name);
        }
        let base: String = emoji
            .chars()
            .filter(|c| !matches!(*c, '\u{FE0F}' | '\u{1F3FB}'..='\u{1F3FF}'))
            .collect();
        if let Some(name) = self.by_unicode.get(base.as_str()) {
            return Some(*name);
        }
        emojis::get(&base)
            .or_else(|| emojis::get(emoji))
            .and_then(|found| found.shortcode())
    }

    /// Canonical name for a short name such as `thumbsup` or
    /// `+1::skin-tone-2`.
    ///
    /// Returns `None` for names the table does not know, which includes every
    /// workspace-specific custom emoji.
    #[must_use]
    pub fn canonical_name(&self, name: &str) -> Option<&'static str> {
        let base = name.split("::").next().unwrap_or(name).trim_matches(':');
        if let Some(alias) = self.aliases.get(base) {
            return Some(*alias);
        }
        if let Some(name) = self.names.get(base) {
            return Some(*name);
        }
        let emoji = emojis::get_by_shortcode(base)?;
        self.by_unicode
            .get(emoji.as_str())
            .copied()
            .or_else(|| emoji.shortcode())
    }

    /// Number of Unicode emoji in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_unicode.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_unicode.is_empty()
    }
}

impl Default for EmojiTable {
    fn default() -> Self {
        Self::builtin()
    }
}
