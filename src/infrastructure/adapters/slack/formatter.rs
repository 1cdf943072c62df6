//! Slack message markup decoding
//!
//! Slack encodes mentions and links inline as `<TYPE LINK|LABEL>`:
//!
//! ```text
//! link   = '<' sigil? target ( '|' label )? '>'
//! sigil  = '@' | '#' | '!'
//! target = [^>|]+
//! label  = [^>]+
//! ```
//!
//! Decoding renders every link to plain text, then unescapes `&lt;`, `&gt;`
//! and `&amp;` over the whole result.

use once_cell::sync::Lazy;
use regex_lite::Regex;

use super::events::Attachment;
use crate::domain::traits::EntityLookup;

static LINK_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<([@#!])?([^>|]+)(?:\|([^>]+))?>").expect("link pattern is a valid regex")
});

/// Keywords allowed after `!`
const SPECIAL_MENTIONS: [&str; 3] = ["channel", "group", "everyone"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sigil {
    User,
    Channel,
    Special,
}

impl Sigil {
    fn from_char(c: &str) -> Option<Self> {
        match c {
            "@" => Some(Sigil::User),
            "#" => Some(Sigil::Channel),
            "!" => Some(Sigil::Special),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link<'a> {
    pub sigil: Option<Sigil>,
    pub target: &'a str,
    pub label: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    Text(&'a str),
    Link(Link<'a>),
}

/// Splits text into plain runs and inline links
pub fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut last = 0;

    for caps in LINK_PATTERN.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        let Some(target) = caps.get(2) else { continue };

        if whole.start() > last {
            tokens.push(Token::Text(&text[last..whole.start()]));
        }
        tokens.push(Token::Link(Link {
            sigil: caps.get(1).and_then(|m| Sigil::from_char(m.as_str())),
            target: target.as_str(),
            label: caps.get(3).map(|m| m.as_str()),
        }));
        last = whole.end();
    }

    if last < text.len() {
        tokens.push(Token::Text(&text[last..]));
    }
    tokens
}

/// Renders a single link as plain text; may be empty
pub fn render_link(link: &Link<'_>, lookup: &dyn EntityLookup) -> String {
    match link.sigil {
        Some(Sigil::User) => match link.label {
            Some(label) => label.to_string(),
            None => match lookup.user_mention_name(link.target) {
                Some(mention_name) => format!("@{}", mention_name),
                None => format!("@{}", link.target),
            },
        },
        Some(Sigil::Channel) => match link.label {
            Some(label) if label.starts_with('#') => label.to_string(),
            Some(label) => format!("#{}", label),
            None => match lookup.room_name(link.target) {
                Some(name) => format!("#{}", name),
                None => format!("#{}", link.target),
            },
        },
        Some(Sigil::Special) => {
            if SPECIAL_MENTIONS.contains(&link.target) {
                format!("@{}", link.target)
            } else {
                String::new()
            }
        }
        None => {
            let target = link.target.strip_prefix("mailto:").unwrap_or(link.target);
            match link.label {
                Some(label) if !target.contains(label) => format!("{} ({})", label, target),
                Some(label) => label.to_string(),
                None => target.to_string(),
            }
        }
    }
}

pub fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Decodes all inline links, then unescapes HTML entities once
pub fn remove_formatting(text: &str, lookup: &dyn EntityLookup) -> String {
    let rendered: String = tokenize(text)
        .iter()
        .map(|token| match token {
            Token::Text(text) => (*text).to_string(),
            Token::Link(link) => render_link(link, lookup),
        })
        .collect();
    unescape(&rendered)
}

/// Rewrites a leading `<@ROBOT_ID>` into `@mention_name`
pub fn replace_robot_mention(text: &str, robot_id: &str, mention_name: &str) -> String {
    let trimmed = text.trim_start();
    let mention = format!("<@{}>", robot_id);
    match trimmed.strip_prefix(&mention) {
        Some(rest) if !robot_id.is_empty() => format!("@{}{}", mention_name, rest),
        _ => text.to_string(),
    }
}

/// Builds the plain-text body of a message event
pub fn normalize(
    text: Option<&str>,
    attachments: &[Attachment],
    robot_id: &str,
    mention_name: &str,
    lookup: &dyn EntityLookup,
) -> String {
    let primary = text.map(|text| {
        remove_formatting(&replace_robot_mention(text, robot_id, mention_name), lookup)
    });

    primary
        .into_iter()
        .chain(attachments.iter().filter_map(|a| a.content().map(str::to_string)))
        .filter(|piece| !piece.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
