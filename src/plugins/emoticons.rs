//! Emoticon recognizer.
//!
//! The pattern is an alternation of the configured emoticon strings; every
//! match becomes one self-closing event of the configured tag. The matched
//! text is the emoticon itself, so the event span carries all the renderer
//! will ever need.

use regex::Regex;

use crate::schema::PluginConfig;
use crate::{PatternMatch, TagEvent};

use super::Recognizer;

/// Plugin configuration matching the given emoticon strings.
pub fn plugin_config<I, S>(emoticons: I) -> PluginConfig
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let alternation: Vec<String> = emoticons.into_iter().map(|e| regex::escape(e.as_ref())).collect();
    let re = if alternation.is_empty() {
        // Never matches; the engine then skips the plugin entirely.
        regex!(r"[^\s\S]").clone()
    } else {
        // An escaped literal alternation always compiles.
        Regex::new(&alternation.join("|")).unwrap_or_else(|_| regex!(r"[^\s\S]").clone())
    };
    PluginConfig::new("Emoticons", re)
}

pub struct Emoticons {
    tag_name: String,
}

impl Default for Emoticons {
    fn default() -> Self {
        Emoticons { tag_name: "E".to_string() }
    }
}

impl Emoticons {
    pub fn new(tag_name: impl Into<String>) -> Self {
        Emoticons { tag_name: tag_name.into() }
    }
}

impl Recognizer for Emoticons {
    fn get_tags(&self, _text: &str, matches: &[Vec<PatternMatch>]) -> Vec<TagEvent> {
        matches
            .iter()
            .flatten()
            .map(|m| TagEvent::self_closing(self.tag_name.clone(), m.whole.start, m.whole.text.len()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MatchGroup, TagKind};

    #[test]
    fn config_escapes_metacharacters() {
        let config = plugin_config([":)", ":("]);
        assert!(config.regexps[0].is_match("hi :)"));
        assert!(config.regexps[0].is_match(":("));
        assert!(!config.regexps[0].is_match(":|"));
    }

    #[test]
    fn each_match_becomes_a_self_closing_event() {
        let m = PatternMatch {
            whole: MatchGroup { text: ":)".to_string(), start: 4 },
            groups: Vec::new(),
        };
        let events = Emoticons::default().get_tags("hey :)", &[vec![m]]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "E");
        assert_eq!(events[0].kind, TagKind::SELF_CLOSING);
        assert_eq!((events[0].pos, events[0].len), (4, 2));
    }
}
