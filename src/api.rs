use once_cell::sync::Lazy;

use crate::engine::{Engine, EngineError};
use crate::plugins::{autolink, bbcodes, emoticons, htmlentities};
use crate::schema::{AttrConfig, Schema, TagConfig};

pub use crate::engine::Parsed;

static DEFAULT_ENGINE: Lazy<Engine> = Lazy::new(|| Engine::new(default_schema()));

/// A forum-style schema wired to the built-in plugins.
///
/// Covers the common BBCode set (bold/italic/underline/strikethrough, links,
/// colors, sizes, quotes, code, lists), plus autolinked URLs, a small
/// emoticon set, and HTML entity replacement. [`parse`] uses this schema;
/// callers with their own tag set build a [`Schema`] and an [`Engine`]
/// directly.
pub fn default_schema() -> Schema {
    Schema::new()
        .tag("b", TagConfig::new())
        .tag("i", TagConfig::new())
        .tag("u", TagConfig::new())
        .tag("s", TagConfig::new())
        .tag("br", TagConfig::new())
        .tag("url", TagConfig::new().attr("url", AttrConfig::new("url").required()))
        .tag("email", TagConfig::new().attr("email", AttrConfig::new("email").required()))
        .tag("color", TagConfig::new().attr("color", AttrConfig::new("color").required()))
        .tag("size", TagConfig::new().attr("size", AttrConfig::new("range").range(8, 20).required()))
        .tag(
            "quote",
            TagConfig::new()
                .attr("quote", AttrConfig::new("simpletext"))
                .trim_surrounding(),
        )
        .tag("code", TagConfig::new())
        .tag("list", TagConfig::new().trim_surrounding())
        .tag(
            "li",
            TagConfig::new()
                .require_parent("list")
                .close_parent(["li"])
                .trim_surrounding(),
        )
        .tag("e", TagConfig::new())
        .tag("he", TagConfig::new().attr("char", AttrConfig::new("text").required()))
        .plugin(bbcodes::plugin_config())
        .plugin(autolink::plugin_config())
        .plugin(emoticons::plugin_config([":)", ":(", ";)", ":D", ":P"]))
        .plugin(htmlentities::plugin_config())
}

/// Parse `text` with the default schema.
///
/// # Example
/// ```
/// let out = markwright::parse("[b]hi[/b]").unwrap();
/// assert!(out.is_rich());
/// assert_eq!(out.to_xml(), "<rt><B><st>[b]</st>hi<et>[/b]</et></B></rt>");
/// ```
pub fn parse(text: &str) -> Result<Parsed, EngineError> {
    DEFAULT_ENGINE.parse(text)
}

/// Parse `text` with a caller-built engine.
pub fn parse_with(text: &str, engine: &Engine) -> Result<Parsed, EngineError> {
    engine.parse(text)
}
