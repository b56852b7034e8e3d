//! Autolink recognizer.
//!
//! Finds bare `http://` / `https://` URLs and marks them up with a pair of
//! zero-length events: a START carrying the `url` attribute at the link
//! start, and an END at the link end. The URL text itself stays element
//! content, so the round-trip property holds without rewriting the input.
//!
//! The raw match is too greedy for prose, so trailing punctuation is
//! stripped before the events are emitted. A trailing `)` survives only when
//! the URL contains an unmatched `(`, which keeps Wikipedia-style
//! `…_(disambiguation)` links whole.

use crate::schema::PluginConfig;
use crate::{PatternMatch, TagEvent};

use super::Recognizer;

/// Plugin configuration with the standard pattern.
///
/// Square brackets are excluded from the URL run so a link inside bracketed
/// markup does not swallow the closing tag.
pub fn plugin_config() -> PluginConfig {
    PluginConfig::new("Autolink", regex!(r"https?://[^\s\[\]]+").clone())
}

pub struct Autolink {
    tag_name: String,
    attr_name: String,
}

impl Default for Autolink {
    fn default() -> Self {
        Autolink { tag_name: "URL".to_string(), attr_name: "url".to_string() }
    }
}

impl Autolink {
    pub fn new(tag_name: impl Into<String>, attr_name: impl Into<String>) -> Self {
        Autolink { tag_name: tag_name.into(), attr_name: attr_name.into() }
    }
}

impl Recognizer for Autolink {
    fn get_tags(&self, _text: &str, matches: &[Vec<PatternMatch>]) -> Vec<TagEvent> {
        let mut events = Vec::new();
        for m in matches.iter().flatten() {
            let url = trim_url(&m.whole.text);
            if url.is_empty() {
                continue;
            }
            let start = TagEvent::start(self.tag_name.clone(), m.whole.start, 0)
                .with_attr(self.attr_name.clone(), url);
            let end = TagEvent::end(self.tag_name.clone(), m.whole.start + url.len(), 0);
            events.push(start);
            events.push(end);
        }
        events
    }
}

/// Strip trailing punctuation that belongs to the surrounding prose.
fn trim_url(raw: &str) -> &str {
    let mut url = raw;
    loop {
        let Some(last) = url.chars().last() else { return url };
        match last {
            '.' | ',' | '!' | '?' | ';' | ':' | '\'' | '"' | '<' | '>' | ']' => {
                url = &url[..url.len() - last.len_utf8()];
            }
            ')' => {
                let opens = url.matches('(').count();
                let closes = url.matches(')').count();
                if closes > opens {
                    url = &url[..url.len() - 1];
                } else {
                    return url;
                }
            }
            _ => return url,
        }
    }
}
