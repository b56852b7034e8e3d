//! HTML entity recognizer.
//!
//! Each named, decimal, or hexadecimal character reference that actually
//! decodes becomes a self-closing event carrying the decoded character in the
//! `char` attribute. Strings that merely look like entities (`&nope;`) decode
//! to themselves and are left alone.

use crate::schema::PluginConfig;
use crate::{PatternMatch, TagEvent};

use super::Recognizer;

/// Plugin configuration with the standard pattern.
pub fn plugin_config() -> PluginConfig {
    PluginConfig::new("HtmlEntities", regex!(r"&(?:[A-Za-z][A-Za-z0-9]*|#\d+|#[Xx][0-9A-Fa-f]+);").clone())
}

pub struct HtmlEntities {
    tag_name: String,
    attr_name: String,
}

impl Default for HtmlEntities {
    fn default() -> Self {
        HtmlEntities { tag_name: "HE".to_string(), attr_name: "char".to_string() }
    }
}

impl HtmlEntities {
    pub fn new(tag_name: impl Into<String>, attr_name: impl Into<String>) -> Self {
        HtmlEntities { tag_name: tag_name.into(), attr_name: attr_name.into() }
    }
}

impl Recognizer for HtmlEntities {
    fn get_tags(&self, _text: &str, matches: &[Vec<PatternMatch>]) -> Vec<TagEvent> {
        let mut events = Vec::new();
        for m in matches.iter().flatten() {
            let decoded = html_escape::decode_html_entities(&m.whole.text);
            if decoded == m.whole.text {
                continue;
            }
            events.push(
                TagEvent::self_closing(self.tag_name.clone(), m.whole.start, m.whole.text.len())
                    .with_attr(self.attr_name.clone(), decoded.into_owned()),
            );
        }
        events
    }
}
