//! Plugin recognizers.
//!
//! A plugin contributes candidate tag events to a parse. The engine runs the
//! plugin's regular expression(s) over the input (see `engine::dispatch`) and,
//! when anything matched, hands the text plus the match structure to the
//! plugin's [`Recognizer`]. The recognizer owns everything regex-specific:
//! re-parsing the matched region, stripping trailing punctuation, decoding
//! entities, and emitting zero or more [`TagEvent`]s.
//!
//! Recognizers are plain trait objects held in a registry built eagerly when
//! the engine is constructed. There is no loading by class name or file path;
//! custom recognizers are registered on the engine by plugin name.
//!
//! Built-ins:
//!
//! - [`BbCodes`]: bracketed `[tag]` markup with attributes and suffixes.
//! - [`Autolink`]: bare `http(s)://` URLs.
//! - [`Emoticons`]: configured emoticon strings.
//! - [`HtmlEntities`]: `&amp;`-style character references.

pub mod autolink;
pub mod bbcodes;
pub mod emoticons;
pub mod htmlentities;

pub use autolink::Autolink;
pub use bbcodes::BbCodes;
pub use emoticons::Emoticons;
pub use htmlentities::HtmlEntities;

use crate::{PatternMatch, TagEvent};

/// A plugin recognizer: turns the match structure of one plugin into
/// candidate tag events.
///
/// The engine assumes nothing about purity across calls, and tolerates
/// duplicate or overlapping events in the result; resolution reconciles them.
pub trait Recognizer: Send + Sync {
    /// `matches[p][m]` is match `m` of the plugin's pattern `p`.
    fn get_tags(&self, text: &str, matches: &[Vec<PatternMatch>]) -> Vec<TagEvent>;
}

/// Default recognizer for a built-in plugin name, if there is one.
pub fn builtin(name: &str) -> Option<Box<dyn Recognizer>> {
    match name {
        "BBCodes" => Some(Box::new(BbCodes::default())),
        "Autolink" => Some(Box::new(Autolink::default())),
        "Emoticons" => Some(Box::new(Emoticons::default())),
        "HtmlEntities" => Some(Box::new(HtmlEntities::default())),
        _ => None,
    }
}
