//! The parse engine: candidate collection, sorting, and resolution.
//!
//! This module is the operational core. A parse is a pipeline over a single
//! immutable text buffer:
//!
//! ```text
//! plugins ── dispatch ──► candidate events          (dispatch.rs)
//!                              │
//!                              ▼
//!                    normalize + sort ──► pop-stack (earliest event on top)
//!                              │
//!                              ▼
//!                         Resolver loop
//!                           - skip events invalidated by the cursor
//!                           - closeParent preflight (synthesized closers)
//!                           - limits / allow / requireParent / requireAscendant
//!                           - attribute pipeline (filters.rs)
//!                           - whitespace trimming + append
//!                              │
//!                              ▼
//!                       Vec<TagEvent> in document order
//! ```
//!
//! The resolver never fails: malformed candidates are dropped and logged, and
//! the output is always a well-nested tag list (every END appended pairs with
//! an earlier appended START of the same name and suffix). The only fatal
//! path is the plugin match budget, raised in dispatch before resolution
//! starts.
//!
//! ## Key invariants maintained by the loop
//!
//! - `tags` is ordered by position; spans never overlap.
//! - `open_count` counts open stack entries per `(name, suffix)`; `cnt_open`
//!   per name (for `nesting_limit`); `cnt_total` per name (for `tag_limit`).
//! - `allow` is the intersection of the allow-sets of every open tag, seeded
//!   from the schema's root allow-set; each stack entry snapshots the set
//!   that was active before it opened so closing restores context exactly.
//! - The cursor is the right edge of the last appended tag. Whitespace
//!   absorption never reaches past it, so two tags cannot claim the same
//!   bytes.

use std::collections::{HashMap, HashSet};

use crate::engine::dispatch::{self, EngineError};
use crate::engine::log::{ParseLog, Severity};
use crate::filters::{self, FilterContext};
use crate::plugins::{self, Recognizer};
use crate::schema::{Schema, TagConfig};
use crate::serializer::{Emitter, XmlEmitter};
use crate::{TagEvent, TagKind, is_trimmable_ws};

/// The parse engine.
///
/// Holds the schema and the recognizer registry, both immutable after
/// construction, so one engine can serve any number of sequential parses and
/// be shared across threads. All per-parse state lives inside [`Engine::parse`].
pub struct Engine {
    schema: Schema,
    recognizers: HashMap<String, Box<dyn Recognizer>>,
}

impl Engine {
    /// Build an engine, eagerly wiring built-in recognizers to the schema's
    /// plugin names.
    pub fn new(schema: Schema) -> Self {
        let mut recognizers = HashMap::new();
        for plugin in &schema.plugins {
            if let Some(recognizer) = plugins::builtin(&plugin.name) {
                recognizers.insert(plugin.name.clone(), recognizer);
            }
        }
        Engine { schema, recognizers }
    }

    /// Register (or replace) the recognizer for a plugin name.
    pub fn with_recognizer(mut self, name: impl Into<String>, recognizer: Box<dyn Recognizer>) -> Self {
        self.recognizers.insert(name.into(), recognizer);
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Parse `text` into processed tags plus the parse log.
    ///
    /// Total over any input: the only error is the plugin match budget under
    /// the abort policy.
    pub fn parse(&self, text: &str) -> Result<Parsed, EngineError> {
        let mut log = ParseLog::new();
        let candidates = dispatch::run_plugins(text, &self.schema, &self.recognizers, &mut log)?;

        let mut resolver = Resolver::new(text, &self.schema, log);
        resolver.resolve(candidates);

        Ok(Parsed { text: text.to_string(), tags: resolver.tags, log: resolver.log })
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("schema", &self.schema)
            .field("recognizers", &format_args!("<{} recognizer(s)>", self.recognizers.len()))
            .finish()
    }
}

/// Outcome of one parse: the input, the processed tags in document order, and
/// the log.
#[derive(Debug, Clone)]
pub struct Parsed {
    pub text: String,
    pub tags: Vec<TagEvent>,
    pub log: ParseLog,
}

impl Parsed {
    /// Serialize with the default XML emitter.
    pub fn to_xml(&self) -> String {
        XmlEmitter.emit(&self.text, &self.tags)
    }

    /// True when at least one tag survived resolution.
    pub fn is_rich(&self) -> bool {
        !self.tags.is_empty()
    }
}

/// One open START on the resolution stack.
struct OpenTag {
    name: String,
    suffix: String,
    /// The allow-set active immediately before this tag opened.
    allow: HashSet<String>,
}

/// Per-parse mutable state. Created on entry to `parse`, released on exit.
struct Resolver<'a> {
    text: &'a str,
    schema: &'a Schema,
    log: ParseLog,
    /// Candidates sorted so the next event to process is last.
    pending: Vec<TagEvent>,
    /// Processed events in document order.
    tags: Vec<TagEvent>,
    open_stack: Vec<OpenTag>,
    /// Open instances per (name, suffix), for END pairing.
    open_count: HashMap<(String, String), usize>,
    /// Open instances per name, for nesting limits and requireAscendant.
    cnt_open: HashMap<String, usize>,
    /// Total accepted per name, for tag limits.
    cnt_total: HashMap<String, usize>,
    /// Tag names permitted in the current context.
    allow: HashSet<String>,
    /// Right edge of the last appended tag.
    cursor: usize,
}

impl<'a> Resolver<'a> {
    fn new(text: &'a str, schema: &'a Schema, log: ParseLog) -> Self {
        Resolver {
            text,
            schema,
            log,
            pending: Vec::new(),
            tags: Vec::new(),
            open_stack: Vec::new(),
            open_count: HashMap::new(),
            cnt_open: HashMap::new(),
            cnt_total: HashMap::new(),
            allow: schema.root_allow_set(),
            cursor: 0,
        }
    }

    fn resolve(&mut self, candidates: Vec<TagEvent>) {
        self.pending = self.normalize_and_sort(candidates);

        while let Some(event) = self.pending.pop() {
            if self.cursor > event.pos {
                self.log.add(Severity::Debug, "Tag skipped", Some(event.pos), Some(&event.name), None);
                continue;
            }
            if event.kind.contains(TagKind::START) {
                self.process_start(event);
            } else {
                self.process_end(event);
            }
        }

        log::trace!("resolved {} tag(s), {} left open at EOF", self.tags.len(), self.open_stack.len());
    }

    /// Canonicalize names, drop events the schema does not know or whose span
    /// does not fit the text, and order the survivors into a pop-stack.
    fn normalize_and_sort(&mut self, candidates: Vec<TagEvent>) -> Vec<TagEvent> {
        let mut events = Vec::with_capacity(candidates.len());

        for mut event in candidates {
            event.name = event.name.to_uppercase();
            if self.schema.tag_config(&event.name).is_none() {
                self.log.add(
                    Severity::Debug,
                    format!("Unknown tag removed (origin: {})", event.plugin_name),
                    Some(event.pos),
                    Some(&event.name),
                    None,
                );
                continue;
            }
            if event.end_pos() > self.text.len()
                || !self.text.is_char_boundary(event.pos)
                || !self.text.is_char_boundary(event.end_pos())
            {
                self.log.add(
                    Severity::Debug,
                    "Tag span does not fit the text",
                    Some(event.pos),
                    Some(&event.name),
                    None,
                );
                continue;
            }
            events.push(event);
        }

        // Highest key first, so popping from the end yields: position
        // ascending, then START < END < SELF_CLOSING, then plugin name.
        events.sort_by(|a, b| {
            (b.pos, b.kind.rank(), b.plugin_name.as_str())
                .cmp(&(a.pos, a.kind.rank(), a.plugin_name.as_str()))
        });
        events
    }

    fn process_start(&mut self, mut event: TagEvent) {
        let schema = self.schema;
        let Some(config) = schema.tag_config(&event.name) else {
            return;
        };

        // closeParent preflight: as long as the innermost open tag is in this
        // tag's close list, synthesize a zero-length END for it. Cascading is
        // allowed; the budget bounds it by the stack depth at entry.
        if !config.rules.close_parent.is_empty() {
            let mut budget = self.open_stack.len();
            while budget > 0 {
                let Some(top) = self.open_stack.last() else { break };
                if !config.rules.close_parent.contains(&top.name) {
                    break;
                }
                budget -= 1;
                let mut closer = TagEvent::end(top.name.clone(), event.pos, 0);
                closer.suffix = top.suffix.clone();
                closer.plugin_name = event.plugin_name.clone();
                self.process_end(closer);
            }
            if self.cursor > event.pos {
                self.log.add(Severity::Debug, "Tag skipped", Some(event.pos), Some(&event.name), None);
                return;
            }
        }

        let name = event.name.clone();

        // Limits are enforced silently.
        if self.cnt_open.get(&name).copied().unwrap_or(0) >= config.nesting_limit
            || self.cnt_total.get(&name).copied().unwrap_or(0) >= config.tag_limit
        {
            return;
        }

        if !self.allow.contains(&name) {
            self.log.add(
                Severity::Debug,
                "Tag is not allowed in this context",
                Some(event.pos),
                Some(&name),
                None,
            );
            return;
        }

        if let Some(parent) = &config.rules.require_parent {
            let ok = self.open_stack.last().is_some_and(|top| &top.name == parent);
            if !ok {
                self.log.add(
                    Severity::Error,
                    format!("Tag requires {parent} as parent"),
                    Some(event.pos),
                    Some(&name),
                    None,
                );
                return;
            }
        }

        for ancestor in &config.rules.require_ascendant {
            if self.cnt_open.get(ancestor).copied().unwrap_or(0) == 0 {
                self.log.add(
                    Severity::Debug,
                    format!("Tag requires {ancestor} as ascendant"),
                    Some(event.pos),
                    Some(&name),
                    None,
                );
                return;
            }
        }

        // Declared defaults are merged before filtering so a required
        // attribute with a default can never be reported missing.
        for (attr_name, attr_conf) in &config.attrs {
            if let Some(default) = &attr_conf.default {
                event.attrs.entry(attr_name.clone()).or_insert_with(|| default.clone());
            }
        }
        if !self.filter_attributes(&mut event, config) {
            return;
        }

        let suffix = event.suffix.clone();
        let self_closing = event.is_end_tag();
        self.append_tag(event, config);
        *self.cnt_total.entry(name.clone()).or_insert(0) += 1;

        if self_closing {
            return;
        }

        *self.cnt_open.entry(name.clone()).or_insert(0) += 1;
        *self.open_count.entry((name.clone(), suffix.clone())).or_insert(0) += 1;
        let inherited = self.allow.clone();
        if let Some(set) = &config.allow {
            self.allow.retain(|n| set.contains(n));
        }
        self.open_stack.push(OpenTag { name, suffix, allow: inherited });
    }

    fn process_end(&mut self, event: TagEvent) {
        let key = event.pair_key();
        if self.open_count.get(&key).copied().unwrap_or(0) == 0 {
            self.log.add(Severity::Debug, "Unmatched end tag", Some(event.pos), Some(&event.name), None);
            return;
        }

        let schema = self.schema;

        // Unwind the open stack down to the matching START. Anything in the
        // way gets a synthesized zero-length END so the output stays nested.
        while let Some(top) = self.open_stack.pop() {
            self.allow = top.allow;
            if let Some(n) = self.cnt_open.get_mut(&top.name) {
                *n = n.saturating_sub(1);
            }
            let top_key = (top.name.clone(), top.suffix.clone());
            if let Some(n) = self.open_count.get_mut(&top_key) {
                *n = n.saturating_sub(1);
            }

            if top.name == event.name && top.suffix == event.suffix {
                break;
            }

            let mut closer = TagEvent::end(top.name.clone(), event.pos, 0);
            closer.suffix = top.suffix;
            closer.plugin_name = event.plugin_name.clone();
            if let Some(config) = schema.tag_config(&closer.name) {
                self.append_tag(closer, config);
            }
        }

        if let Some(config) = schema.tag_config(&event.name) {
            self.append_tag(event, config);
        }
    }

    /// Run the tag's attribute pipeline: tag-level pre-filters,
    /// per-attribute chains (pre-filters, typed filter, post-filters,
    /// fallback policy), undeclared removal, required check, tag-level
    /// post-filters.
    ///
    /// Returns false when the tag must be dropped (required attribute
    /// missing or invalid without default).
    fn filter_attributes(&mut self, event: &mut TagEvent, config: &TagConfig) -> bool {
        for f in &config.pre_filter {
            f(&mut event.attrs);
        }

        for (attr_name, attr_conf) in &config.attrs {
            let Some(raw) = event.attrs.get(attr_name).cloned() else {
                continue;
            };

            let mut value = raw.clone();
            for f in &attr_conf.pre_filter {
                value = f(&value);
            }

            let mut ctx = FilterContext {
                log: &mut self.log,
                tag_name: &event.name,
                attr_name,
                pos: event.pos,
                url: &self.schema.url,
                overrides: &self.schema.filter_overrides,
            };
            let filtered = filters::filter_value(&value, attr_conf, &mut ctx);

            match filtered {
                Some(mut canonical) => {
                    for f in &attr_conf.post_filter {
                        canonical = f(&canonical);
                    }
                    if canonical != raw {
                        self.log.add(
                            Severity::Debug,
                            "Attribute value was altered by the filter",
                            Some(event.pos),
                            Some(&event.name),
                            Some(attr_name),
                        );
                    }
                    event.attrs.insert(attr_name.clone(), canonical);
                }
                None => {
                    if let Some(default) = &attr_conf.default {
                        self.log.add(
                            Severity::Debug,
                            "Using default value",
                            Some(event.pos),
                            Some(&event.name),
                            Some(attr_name),
                        );
                        event.attrs.insert(attr_name.clone(), default.clone());
                    } else {
                        event.attrs.remove(attr_name);
                        if attr_conf.is_required {
                            self.log.add(
                                Severity::Error,
                                "Missing required attribute",
                                Some(event.pos),
                                Some(&event.name),
                                Some(attr_name),
                            );
                            return false;
                        }
                    }
                }
            }
        }

        // Attributes the schema does not declare never reach the output.
        let undeclared: Vec<String> =
            event.attrs.keys().filter(|k| !config.attrs.contains_key(*k)).cloned().collect();
        for attr_name in undeclared {
            event.attrs.remove(&attr_name);
            self.log.add(
                Severity::Debug,
                "Undeclared attribute removed",
                Some(event.pos),
                Some(&event.name),
                Some(&attr_name),
            );
        }

        for (attr_name, attr_conf) in &config.attrs {
            if attr_conf.is_required && !event.attrs.contains_key(attr_name) {
                self.log.add(
                    Severity::Error,
                    "Missing required attribute",
                    Some(event.pos),
                    Some(&event.name),
                    Some(attr_name),
                );
                return false;
            }
        }

        for f in &config.post_filter {
            f(&mut event.attrs);
        }

        true
    }

    /// Absorb surrounding whitespace per the tag's trim directives, append
    /// the event, and advance the cursor to its right edge.
    fn append_tag(&mut self, mut event: TagEvent, config: &TagConfig) {
        let bytes = self.text.as_bytes();

        let absorb_before = (event.kind.contains(TagKind::START) && config.trim_before)
            || (event.kind.contains(TagKind::END) && config.rtrim_content);
        if absorb_before {
            let mut n = 0;
            while event.pos - n > self.cursor && is_trimmable_ws(bytes[event.pos - n - 1]) {
                n += 1;
            }
            event.trim_before += n;
            event.pos -= n;
            event.len += n;
        }

        let absorb_after = (event.kind.contains(TagKind::START) && config.ltrim_content)
            || (event.kind.contains(TagKind::END) && config.trim_after);
        if absorb_after {
            let end = event.end_pos();
            let mut n = 0;
            while end + n < bytes.len() && is_trimmable_ws(bytes[end + n]) {
                n += 1;
            }
            event.trim_after += n;
            event.len += n;
        }

        self.cursor = event.end_pos();
        self.tags.push(event);
    }
}
