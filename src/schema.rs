//! Parse schema: the read-only configuration consumed by the engine.
//!
//! A [`Schema`] bundles three mappings:
//!
//! - `tags`: per-tag rules (allowed descendants, nesting/total limits,
//!   required parent/ascendant, auto-close, trim directives, attributes).
//! - `plugins`: ordered plugin configurations (patterns + match limits).
//!   The order is contractual: dispatch runs plugins in this order.
//! - filter configuration: URL scheme/host policy and per-type filter
//!   overrides.
//!
//! The schema is immutable during a parse and may be shared freely across
//! concurrent engines. Construction is plain typed structs with a few
//! builder-style helpers; producing a schema from user input (template
//! storage, tag-name validation) is a concern of an external configuration
//! builder, not of this crate.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use regex::Regex;

/// Unary transform applied to a single attribute value before or after the
/// typed filter.
pub type AttrTransform = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Transform applied to a tag's whole attribute map before or after
/// per-attribute filtering.
pub type TagTransform = Arc<dyn Fn(&mut BTreeMap<String, String>) + Send + Sync>;

/// Replacement for a built-in typed filter, keyed by filter name.
///
/// Returns the canonical value, or `None` for invalid.
pub type FilterCallback = Arc<dyn Fn(&str, &AttrConfig) -> Option<String> + Send + Sync>;

/// Structural rules of a tag.
#[derive(Debug, Clone, Default)]
pub struct TagRules {
    /// If the innermost open tag's name is in this list, opening this tag
    /// first synthesizes an END for it ("[*]" closing a previous "[*]").
    pub close_parent: Vec<String>,
    /// The innermost open tag must have exactly this name.
    pub require_parent: Option<String>,
    /// Every listed name must be open somewhere on the ancestor chain.
    pub require_ascendant: Vec<String>,
}

/// Per-tag configuration.
#[derive(Clone)]
pub struct TagConfig {
    /// Tag names permitted inside this tag. `None` puts no restriction; a
    /// set is intersected with the inherited allow-set, so restrictions
    /// accumulate down the stack.
    pub allow: Option<HashSet<String>>,
    /// Maximum simultaneously open instances on one ancestor chain.
    pub nesting_limit: usize,
    /// Maximum total occurrences in one parse.
    pub tag_limit: usize,
    pub rules: TagRules,
    /// Absorb whitespace before the start tag.
    pub trim_before: bool,
    /// Absorb whitespace after the start tag (start of content).
    pub ltrim_content: bool,
    /// Absorb whitespace before the end tag (end of content).
    pub rtrim_content: bool,
    /// Absorb whitespace after the end tag.
    pub trim_after: bool,
    pub attrs: BTreeMap<String, AttrConfig>,
    /// Tag-level transforms over the whole attribute map, run before
    /// per-attribute filtering.
    pub pre_filter: Vec<TagTransform>,
    /// Tag-level transforms over the final attribute map.
    pub post_filter: Vec<TagTransform>,
}

impl Default for TagConfig {
    fn default() -> Self {
        TagConfig {
            allow: None,
            nesting_limit: 10,
            tag_limit: 1000,
            rules: TagRules::default(),
            trim_before: false,
            ltrim_content: false,
            rtrim_content: false,
            trim_after: false,
            attrs: BTreeMap::new(),
            pre_filter: Vec::new(),
            post_filter: Vec::new(),
        }
    }
}

impl fmt::Debug for TagConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagConfig")
            .field("allow", &self.allow)
            .field("nesting_limit", &self.nesting_limit)
            .field("tag_limit", &self.tag_limit)
            .field("rules", &self.rules)
            .field("attrs", &self.attrs)
            .field("pre_filter", &format_args!("<{} fn>", self.pre_filter.len()))
            .field("post_filter", &format_args!("<{} fn>", self.post_filter.len()))
            .finish()
    }
}

impl TagConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict this tag's content to the given tag names.
    pub fn allow_only<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allow = Some(names.into_iter().map(|n| n.into().to_uppercase()).collect());
        self
    }

    pub fn nesting_limit(mut self, limit: usize) -> Self {
        self.nesting_limit = limit;
        self
    }

    pub fn tag_limit(mut self, limit: usize) -> Self {
        self.tag_limit = limit;
        self
    }

    pub fn close_parent<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rules.close_parent = names.into_iter().map(|n| n.into().to_uppercase()).collect();
        self
    }

    pub fn require_parent(mut self, name: impl Into<String>) -> Self {
        self.rules.require_parent = Some(name.into().to_uppercase());
        self
    }

    pub fn require_ascendant<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rules.require_ascendant = names.into_iter().map(|n| n.into().to_uppercase()).collect();
        self
    }

    /// Enable all four trim directives.
    pub fn trim_surrounding(mut self) -> Self {
        self.trim_before = true;
        self.ltrim_content = true;
        self.rtrim_content = true;
        self.trim_after = true;
        self
    }

    pub fn attr(mut self, name: impl Into<String>, config: AttrConfig) -> Self {
        self.attrs.insert(name.into().to_lowercase(), config);
        self
    }

    pub fn pre_filter(mut self, f: TagTransform) -> Self {
        self.pre_filter.push(f);
        self
    }

    pub fn post_filter(mut self, f: TagTransform) -> Self {
        self.post_filter.push(f);
        self
    }
}

/// Per-attribute configuration: the typed filter, requiredness, default, and
/// the pre/post transform chains around the filter.
#[derive(Clone)]
pub struct AttrConfig {
    /// Typed filter name ("url", "int", "range", ...). Unknown names are
    /// reported at debug severity and reject every value.
    pub filter: String,
    pub is_required: bool,
    /// Fallback substituted when the value is absent or filters as invalid.
    pub default: Option<String>,
    pub pre_filter: Vec<AttrTransform>,
    pub post_filter: Vec<AttrTransform>,
    /// Lower clamp bound for the `range` filter.
    pub min: Option<i64>,
    /// Upper clamp bound for the `range` filter.
    pub max: Option<i64>,
    /// Pattern the `regexp` filter matches values against.
    pub regexp: Option<Regex>,
    /// Replacement template for the `regexp` filter; `$N` inserts capture N.
    pub replace: Option<String>,
}

impl AttrConfig {
    pub fn new(filter: impl Into<String>) -> Self {
        AttrConfig {
            filter: filter.into().to_lowercase(),
            is_required: false,
            default: None,
            pre_filter: Vec::new(),
            post_filter: Vec::new(),
            min: None,
            max: None,
            regexp: None,
            replace: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.is_required = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn range(mut self, min: i64, max: i64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn regexp(mut self, re: Regex) -> Self {
        self.regexp = Some(re);
        self
    }

    pub fn replace(mut self, template: impl Into<String>) -> Self {
        self.replace = Some(template.into());
        self
    }

    pub fn pre_filter(mut self, f: AttrTransform) -> Self {
        self.pre_filter.push(f);
        self
    }

    pub fn post_filter(mut self, f: AttrTransform) -> Self {
        self.post_filter.push(f);
        self
    }
}

impl fmt::Debug for AttrConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttrConfig")
            .field("filter", &self.filter)
            .field("is_required", &self.is_required)
            .field("default", &self.default)
            .field("min", &self.min)
            .field("max", &self.max)
            .field("regexp", &self.regexp.as_ref().map(Regex::as_str))
            .field("replace", &self.replace)
            .field("pre_filter", &format_args!("<{} fn>", self.pre_filter.len()))
            .field("post_filter", &format_args!("<{} fn>", self.post_filter.len()))
            .finish()
    }
}

/// What to do when a plugin's running match count exceeds `regexp_limit`.
///
/// Any action string other than "abort" or "ignore" is treated as `Warn`, so
/// the engine stays total over every configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LimitAction {
    /// Fail the whole parse with a configuration-exceeded error.
    Abort,
    /// Drop excess matches, log at debug.
    Ignore,
    /// Drop excess matches, log at warning.
    #[default]
    Warn,
}

impl LimitAction {
    pub fn from_name(name: &str) -> Self {
        match name {
            "abort" => LimitAction::Abort,
            "ignore" => LimitAction::Ignore,
            _ => LimitAction::Warn,
        }
    }
}

/// Per-plugin configuration: the pattern set and its match budget.
#[derive(Debug, Clone)]
pub struct PluginConfig {
    /// Capitalized plugin identifier ("BBCodes", "Autolink", ...). Doubles as
    /// the sort tiebreaker and the default suffix source.
    pub name: String,
    /// One or more patterns, matched in order with global set-order-with-
    /// offsets semantics.
    pub regexps: Vec<Regex>,
    /// Maximum number of matches across all patterns of this plugin.
    pub regexp_limit: usize,
    pub limit_action: LimitAction,
}

impl PluginConfig {
    pub fn new(name: impl Into<String>, regexp: Regex) -> Self {
        PluginConfig {
            name: name.into(),
            regexps: vec![regexp],
            regexp_limit: 10_000,
            limit_action: LimitAction::default(),
        }
    }

    pub fn with_regexps(name: impl Into<String>, regexps: Vec<Regex>) -> Self {
        PluginConfig {
            name: name.into(),
            regexps,
            regexp_limit: 10_000,
            limit_action: LimitAction::default(),
        }
    }

    pub fn regexp_limit(mut self, limit: usize) -> Self {
        self.regexp_limit = limit;
        self
    }

    pub fn limit_action(mut self, action: LimitAction) -> Self {
        self.limit_action = action;
        self
    }
}

/// Global URL filter policy.
#[derive(Debug, Clone)]
pub struct UrlConfig {
    /// Schemes accepted by the `url` filter.
    pub allowed_schemes: Regex,
    /// Hosts rejected by the `url` filter.
    pub disallowed_hosts: Option<Regex>,
}

impl Default for UrlConfig {
    fn default() -> Self {
        UrlConfig {
            allowed_schemes: Regex::new("(?i)^https?$").unwrap(),
            disallowed_hosts: None,
        }
    }
}

/// The full parse schema.
#[derive(Clone, Default)]
pub struct Schema {
    /// Tag configurations keyed by canonical (uppercase) name.
    pub tags: HashMap<String, TagConfig>,
    /// Plugins in dispatch order.
    pub plugins: Vec<PluginConfig>,
    /// Tag names permitted at the document root. `None` allows every tag.
    pub root_allow: Option<HashSet<String>>,
    pub url: UrlConfig,
    /// Typed-filter replacements keyed by filter name.
    pub filter_overrides: HashMap<String, FilterCallback>,
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("tags", &self.tags)
            .field("plugins", &self.plugins)
            .field("root_allow", &self.root_allow)
            .field("url", &self.url)
            .field("filter_overrides", &format_args!("<{} fn>", self.filter_overrides.len()))
            .finish()
    }
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tag under its canonical uppercase name.
    pub fn tag(mut self, name: impl Into<String>, config: TagConfig) -> Self {
        self.tags.insert(name.into().to_uppercase(), config);
        self
    }

    /// Append a plugin. Dispatch order is insertion order.
    pub fn plugin(mut self, config: PluginConfig) -> Self {
        self.plugins.push(config);
        self
    }

    pub fn url_config(mut self, url: UrlConfig) -> Self {
        self.url = url;
        self
    }

    pub fn filter_override(mut self, name: impl Into<String>, callback: FilterCallback) -> Self {
        self.filter_overrides.insert(name.into().to_lowercase(), callback);
        self
    }

    pub fn tag_config(&self, name: &str) -> Option<&TagConfig> {
        self.tags.get(name)
    }

    /// The allow-set active at the document root: the configured root set, or
    /// every registered tag.
    pub fn root_allow_set(&self) -> HashSet<String> {
        match &self.root_allow {
            Some(set) => set.clone(),
            None => self.tags.keys().cloned().collect(),
        }
    }
}
