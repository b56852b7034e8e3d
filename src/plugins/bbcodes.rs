//! BBCode recognizer.
//!
//! The seed pattern only finds `[`-prefixed name candidates; the real parsing
//! happens here, byte by byte from each candidate position. Anything
//! malformed emits nothing and stays literal text.
//!
//! Recognized forms:
//!
//! ```text
//! [b]        [B:123]          start (optional pairing suffix)
//! [/b]       [/B:123]         end
//! [br/]                       self-closing
//! [url=http://x]              default attribute, named after the tag
//! [quote="John" cite=x]      named attributes, quoting optional
//! [*]                         alias, mapped through the alias table
//! ```

use std::collections::BTreeMap;
use std::collections::HashMap;

use crate::schema::PluginConfig;
use crate::{PatternMatch, TagEvent, TagKind};

use super::Recognizer;

/// Plugin configuration with the standard seed pattern.
pub fn plugin_config() -> PluginConfig {
    PluginConfig::new("BBCodes", regex!(r"\[/?(?:\*|[-\w]+)").clone())
}

pub struct BbCodes {
    /// Maps a typed name to the tag it stands for ("*" to "LI" by default).
    aliases: HashMap<String, String>,
}

impl Default for BbCodes {
    fn default() -> Self {
        let mut aliases = HashMap::new();
        aliases.insert("*".to_string(), "LI".to_string());
        BbCodes { aliases }
    }
}

impl BbCodes {
    pub fn with_aliases(aliases: HashMap<String, String>) -> Self {
        BbCodes { aliases }
    }

    fn canonical(&self, name: &str) -> String {
        match self.aliases.get(name) {
            Some(target) => target.clone(),
            None => name.to_uppercase(),
        }
    }
}

impl Recognizer for BbCodes {
    fn get_tags(&self, text: &str, matches: &[Vec<PatternMatch>]) -> Vec<TagEvent> {
        let mut events = Vec::new();
        for m in matches.iter().flatten() {
            if let Some(event) = self.parse_at(text, m.whole.start) {
                events.push(event);
            }
        }
        events
    }
}

impl BbCodes {
    /// Parse one bracketed tag starting at `pos` (which points at `[`).
    fn parse_at(&self, text: &str, pos: usize) -> Option<TagEvent> {
        let bytes = text.as_bytes();
        let mut i = pos;

        if bytes.get(i) != Some(&b'[') {
            return None;
        }
        i += 1;

        let closing = bytes.get(i) == Some(&b'/');
        if closing {
            i += 1;
        }

        let name_start = i;
        if bytes.get(i) == Some(&b'*') {
            i += 1;
        } else {
            while i < bytes.len() && is_name_byte(bytes[i]) {
                i += 1;
            }
        }
        if i == name_start {
            return None;
        }
        let typed_name = &text[name_start..i];
        let name = self.canonical(typed_name);

        let suffix = parse_suffix(bytes, &mut i);

        if closing {
            if bytes.get(i) != Some(&b']') {
                return None;
            }
            i += 1;
            let mut event = TagEvent::end(name, pos, i - pos);
            event.suffix = suffix;
            return Some(event);
        }

        let mut attrs = BTreeMap::new();
        let mut kind = TagKind::START;

        // Default attribute: `[url=...]` puts the value under the tag's own
        // lowercased name.
        if bytes.get(i) == Some(&b'=') {
            i += 1;
            let value = parse_value(text, &mut i, true)?;
            attrs.insert(name.to_lowercase(), value);
        }

        loop {
            while bytes.get(i).is_some_and(u8::is_ascii_whitespace) {
                i += 1;
            }
            match bytes.get(i) {
                Some(b']') => {
                    i += 1;
                    break;
                }
                Some(b'/') if bytes.get(i + 1) == Some(&b']') => {
                    kind = TagKind::SELF_CLOSING;
                    i += 2;
                    break;
                }
                Some(&b) if is_name_byte(b) => {
                    let attr_start = i;
                    while i < bytes.len() && is_name_byte(bytes[i]) {
                        i += 1;
                    }
                    if bytes.get(i) != Some(&b'=') {
                        return None;
                    }
                    let attr_name = text[attr_start..i].to_lowercase();
                    i += 1;
                    let value = parse_value(text, &mut i, false)?;
                    attrs.insert(attr_name, value);
                }
                _ => return None,
            }
        }

        let mut event = TagEvent::new(kind, name, pos, i - pos);
        event.attrs = attrs;
        event.suffix = suffix;
        Some(event)
    }
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

/// Parse an optional `:ident` pairing suffix, colon included in the result.
fn parse_suffix(bytes: &[u8], i: &mut usize) -> String {
    if bytes.get(*i) != Some(&b':') {
        return String::new();
    }
    let start = *i;
    let mut j = *i + 1;
    while j < bytes.len() && bytes[j].is_ascii_alphanumeric() {
        j += 1;
    }
    if j == *i + 1 {
        return String::new();
    }
    *i = j;
    // Suffix bytes are ASCII, the slice is valid UTF-8.
    String::from_utf8_lossy(&bytes[start..j]).into_owned()
}

/// Parse an attribute value at `*i`.
///
/// Quoted values (`"..."` or `'...'`) understand backslash escapes. Unquoted
/// values run to `]` for the default attribute and to whitespace, `/]` or `]`
/// for named attributes.
fn parse_value(text: &str, i: &mut usize, is_default: bool) -> Option<String> {
    let bytes = text.as_bytes();
    match bytes.get(*i) {
        Some(&(q @ (b'"' | b'\''))) => {
            *i += 1;
            let mut value = String::new();
            loop {
                match bytes.get(*i) {
                    None => return None,
                    Some(&b) if b == q => {
                        *i += 1;
                        return Some(value);
                    }
                    Some(b'\\') => {
                        let next = *bytes.get(*i + 1)?;
                        value.push(char::from(next));
                        *i += 2;
                    }
                    Some(_) => {
                        // Advance one whole character, not one byte.
                        let rest = &text[*i..];
                        let c = rest.chars().next()?;
                        value.push(c);
                        *i += c.len_utf8();
                    }
                }
            }
        }
        Some(_) => {
            let start = *i;
            while let Some(&b) = bytes.get(*i) {
                if b == b']' || (!is_default && (b.is_ascii_whitespace() || (b == b'/' && bytes.get(*i + 1) == Some(&b']')))) {
                    break;
                }
                *i += 1;
            }
            if *i == start {
                return None;
            }
            Some(text.get(start..*i)?.to_string())
        }
        None => None,
    }
}
