//! Typed attribute filters.
//!
//! Every attribute value runs through a chain: attribute-level pre-filters,
//! then the typed filter dispatched by name, then attribute-level
//! post-filters. The typed filter produces a canonical string or rejects the
//! value; rejection is reported through the parse log and handled by the
//! resolver (default substitution, removal, or dropping the whole tag when
//! the attribute is required).
//!
//! Dispatch goes through a table: the schema's override map first (a caller
//! may replace any filter by name), then the built-in set. Unknown names are
//! reported at debug severity and reject every value.
//!
//! Context for log enrichment (current tag, current attribute, position) is
//! threaded through [`FilterContext`] instead of living as mutable engine
//! state.

use crate::engine::{ParseLog, Severity};
use crate::schema::{AttrConfig, FilterCallback, UrlConfig};
use std::collections::HashMap;

/// Everything a typed filter needs besides the value itself.
pub struct FilterContext<'a> {
    pub log: &'a mut ParseLog,
    pub tag_name: &'a str,
    pub attr_name: &'a str,
    /// Position of the tag being filtered, for log entries.
    pub pos: usize,
    pub url: &'a UrlConfig,
    pub overrides: &'a HashMap<String, FilterCallback>,
}

impl FilterContext<'_> {
    fn log(&mut self, severity: Severity, msg: impl Into<String>) {
        self.log.add(severity, msg, Some(self.pos), Some(self.tag_name), Some(self.attr_name));
    }
}

/// Run the typed filter named by `conf.filter` over `value`.
///
/// Returns the canonical value, or `None` for invalid. Rejections are logged
/// here (specific messages where the filter has one, a generic error
/// otherwise), so callers only handle the fallback policy.
pub fn filter_value(value: &str, conf: &AttrConfig, ctx: &mut FilterContext) -> Option<String> {
    if let Some(callback) = ctx.overrides.get(&conf.filter) {
        let result = callback(value, conf);
        if result.is_none() {
            ctx.log(Severity::Error, "Invalid attribute value");
        }
        return result;
    }

    match conf.filter.as_str() {
        "url" => filter_url(value, ctx),
        // ASCII classes throughout: `\w`/`\d` are Unicode-aware in this regex
        // engine and would accept values the filters must reject.
        "identifier" | "id" => {
            reject_unless(regex!(r"^[A-Za-z0-9_-]+$").is_match(value), value, ctx)
        }
        "simpletext" => reject_unless(regex!(r"^[A-Za-z0-9\-+.,_ ]+$").is_match(value), value, ctx),
        "text" => Some(value.to_string()),
        "email" => reject_unless(
            regex!(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").is_match(value),
            value,
            ctx,
        ),
        "int" | "integer" => filter_int(value, ctx),
        "float" => filter_float(value, ctx),
        "number" | "uint" => reject_unless(regex!(r"^[0-9]+$").is_match(value), value, ctx),
        "range" => filter_range(value, conf, ctx),
        "color" => reject_unless(
            regex!(r"^(?:#[0-9a-fA-F]{3,6}|[A-Za-z]+)$").is_match(value),
            value,
            ctx,
        ),
        "regexp" => filter_regexp(value, conf, ctx),
        other => {
            ctx.log(Severity::Debug, format!("Unknown filter '{other}'"));
            None
        }
    }
}

fn reject_unless(valid: bool, value: &str, ctx: &mut FilterContext) -> Option<String> {
    if valid {
        Some(value.to_string())
    } else {
        ctx.log(Severity::Error, "Invalid attribute value");
        None
    }
}

/// Absolute-URL filter: scheme allow-list, host deny-list, quote encoding.
fn filter_url(value: &str, ctx: &mut FilterContext) -> Option<String> {
    let Some(caps) = regex!(r"^([A-Za-z][A-Za-z0-9+.-]*):").captures(value) else {
        ctx.log(Severity::Error, "Invalid URL");
        return None;
    };
    let scheme = &caps[1];
    if !ctx.url.allowed_schemes.is_match(scheme) {
        ctx.log(Severity::Error, format!("URL scheme {scheme} is not allowed"));
        return None;
    }

    if let Some(disallowed) = &ctx.url.disallowed_hosts
        && let Some(host) = regex!(r"^[A-Za-z][A-Za-z0-9+.-]*://(?:[^@/?#]*@)?([^/:?#]+)")
            .captures(value)
            .map(|c| c.get(1).map_or("", |m| m.as_str()).to_string())
        && disallowed.is_match(&host)
    {
        ctx.log(Severity::Error, format!("URL host {host} is not allowed"));
        return None;
    }

    // Quotes are percent-encoded so the value can sit inside any attribute
    // quoting style downstream.
    Some(value.replace('\'', "%27").replace('"', "%22"))
}

fn filter_int(value: &str, ctx: &mut FilterContext) -> Option<String> {
    match value.parse::<i64>() {
        Ok(n) => Some(n.to_string()),
        Err(_) => {
            ctx.log(Severity::Error, "Invalid attribute value");
            None
        }
    }
}

fn filter_float(value: &str, ctx: &mut FilterContext) -> Option<String> {
    if !regex!(r"^-?[0-9]+(?:\.[0-9]+)?(?:[eE][+-]?[0-9]+)?$").is_match(value) {
        ctx.log(Severity::Error, "Invalid attribute value");
        return None;
    }
    match value.parse::<f64>() {
        Ok(f) if f.is_finite() => Some(f.to_string()),
        _ => {
            ctx.log(Severity::Error, "Invalid attribute value");
            None
        }
    }
}

/// Integer clamped to `[conf.min, conf.max]`, with a warning when adjusted.
fn filter_range(value: &str, conf: &AttrConfig, ctx: &mut FilterContext) -> Option<String> {
    let Ok(n) = value.parse::<i64>() else {
        ctx.log(Severity::Error, "Invalid attribute value");
        return None;
    };
    if let Some(min) = conf.min
        && n < min
    {
        ctx.log(Severity::Warning, format!("Minimum range value adjusted to {min}"));
        return Some(min.to_string());
    }
    if let Some(max) = conf.max
        && n > max
    {
        ctx.log(Severity::Warning, format!("Maximum range value adjusted to {max}"));
        return Some(max.to_string());
    }
    Some(n.to_string())
}

/// Match against `conf.regexp`, optionally producing a `$N` replacement.
fn filter_regexp(value: &str, conf: &AttrConfig, ctx: &mut FilterContext) -> Option<String> {
    let Some(re) = &conf.regexp else {
        ctx.log(Severity::Error, "Invalid attribute value");
        return None;
    };
    let Some(caps) = re.captures(value) else {
        ctx.log(Severity::Error, "Invalid attribute value");
        return None;
    };
    match &conf.replace {
        Some(template) => Some(expand_replacement(template, &caps)),
        None => Some(value.to_string()),
    }
}

/// Expand a replacement template: `$N` inserts capture N, `\$` is a literal
/// dollar sign, `\\` halves to a single backslash.
fn expand_replacement(template: &str, caps: &regex::Captures) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('\\') => out.push('\\'),
                Some('$') => out.push('$'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            },
            '$' => {
                let mut digits = String::new();
                while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                    digits.push(d);
                    chars.next();
                }
                if digits.is_empty() {
                    out.push('$');
                } else if let Ok(n) = digits.parse::<usize>() {
                    if let Some(group) = caps.get(n) {
                        out.push_str(group.as_str());
                    }
                }
            }
            other => out.push(other),
        }
    }

    out
}
